//! Sub repository.

use std::sync::Arc;

use super::map_unique_violation;
use crate::entities::{Sub, sub};
use readit_common::{AppError, AppResult};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter,
    sea_query::{Expr, Func},
};

/// Sub repository for database operations.
#[derive(Clone)]
pub struct SubRepository {
    db: Arc<DatabaseConnection>,
}

impl SubRepository {
    /// Create a new sub repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find a sub by its exact name.
    pub async fn find_by_name(&self, name: &str) -> AppResult<Option<sub::Model>> {
        Sub::find()
            .filter(sub::Column::Name.eq(name))
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Get a sub by name, returning an error if not found.
    pub async fn get_by_name(&self, name: &str) -> AppResult<sub::Model> {
        self.find_by_name(name)
            .await?
            .ok_or_else(|| AppError::SubNotFound(name.to_string()))
    }

    /// Find a sub whose name matches ignoring case.
    pub async fn find_by_name_ignore_case(&self, name: &str) -> AppResult<Option<sub::Model>> {
        Sub::find()
            .filter(Expr::expr(Func::lower(Expr::col(sub::Column::Name))).eq(name.to_lowercase()))
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Create a new sub.
    ///
    /// A name already taken, in any letter case, yields
    /// [`AppError::Conflict`].
    pub async fn create(&self, model: sub::ActiveModel) -> AppResult<sub::Model> {
        model
            .insert(self.db.as_ref())
            .await
            .map_err(map_unique_violation)
    }
}
