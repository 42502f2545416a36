//! Post repository.

use std::sync::Arc;

use crate::entities::{Post, post};
use readit_common::{AppError, AppResult};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect,
};

/// Post repository for database operations.
#[derive(Clone)]
pub struct PostRepository {
    db: Arc<DatabaseConnection>,
}

impl PostRepository {
    /// Create a new post repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find a post by its public identifier and slug.
    pub async fn find_by_identifier_and_slug(
        &self,
        identifier: &str,
        slug: &str,
    ) -> AppResult<Option<post::Model>> {
        Post::find()
            .filter(post::Column::Identifier.eq(identifier))
            .filter(post::Column::Slug.eq(slug))
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Get a post by identifier and slug, returning an error if not found.
    pub async fn get_by_identifier_and_slug(
        &self,
        identifier: &str,
        slug: &str,
    ) -> AppResult<post::Model> {
        self.find_by_identifier_and_slug(identifier, slug)
            .await?
            .ok_or_else(|| AppError::PostNotFound(format!("{identifier}/{slug}")))
    }

    /// Get posts, newest first.
    pub async fn find_recent(&self, limit: u64) -> AppResult<Vec<post::Model>> {
        Post::find()
            .order_by_desc(post::Column::CreatedAt)
            .limit(limit)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Get the posts filed under a sub, newest first.
    pub async fn find_by_sub(&self, sub_name: &str) -> AppResult<Vec<post::Model>> {
        Post::find()
            .filter(post::Column::SubName.eq(sub_name))
            .order_by_desc(post::Column::CreatedAt)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Create a new post.
    pub async fn create(&self, model: post::ActiveModel) -> AppResult<post::Model> {
        model
            .insert(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}
