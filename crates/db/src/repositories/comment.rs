//! Comment repository.

use std::sync::Arc;

use crate::entities::{Comment, comment};
use readit_common::{AppError, AppResult};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
};

/// Comment repository for database operations.
#[derive(Clone)]
pub struct CommentRepository {
    db: Arc<DatabaseConnection>,
}

impl CommentRepository {
    /// Create a new comment repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find a comment by identifier, restricted to one post.
    pub async fn find_by_identifier_in_post(
        &self,
        identifier: &str,
        post_id: &str,
    ) -> AppResult<Option<comment::Model>> {
        Comment::find()
            .filter(comment::Column::Identifier.eq(identifier))
            .filter(comment::Column::PostId.eq(post_id))
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Get a post's comments, newest first.
    pub async fn find_by_post(&self, post_id: &str) -> AppResult<Vec<comment::Model>> {
        Comment::find()
            .filter(comment::Column::PostId.eq(post_id))
            .order_by_desc(comment::Column::CreatedAt)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Get the comments of several posts at once.
    pub async fn find_by_posts(&self, post_ids: &[String]) -> AppResult<Vec<comment::Model>> {
        if post_ids.is_empty() {
            return Ok(vec![]);
        }

        Comment::find()
            .filter(comment::Column::PostId.is_in(post_ids.iter().cloned()))
            .order_by_desc(comment::Column::CreatedAt)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Create a new comment.
    pub async fn create(&self, model: comment::ActiveModel) -> AppResult<comment::Model> {
        model
            .insert(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}
