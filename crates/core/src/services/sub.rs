//! Sub service.

use chrono::Utc;
use readit_common::{AppError, AppResult, IdGenerator};
use readit_db::entities::sub;
use readit_db::repositories::{PostRepository, SubRepository};
use sea_orm::Set;
use serde::{Deserialize, Serialize};
use tracing::info;
use validator::Validate;

use crate::services::post::PostService;
use crate::services::projection::ProjectedPost;

/// Input for creating a sub.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateSubInput {
    #[validate(length(min = 1, max = 64))]
    pub name: String,
    #[validate(length(min = 1, max = 255))]
    pub title: String,
    #[validate(length(max = 2048))]
    pub description: Option<String>,
}

/// A sub with its posts.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubWithPosts {
    #[serde(flatten)]
    pub sub: sub::Model,
    pub post_count: usize,
    pub posts: Vec<ProjectedPost>,
}

/// Sub service for business logic.
#[derive(Clone)]
pub struct SubService {
    sub_repo: SubRepository,
    post_repo: PostRepository,
    post_service: PostService,
    id_gen: IdGenerator,
}

impl SubService {
    /// Create a new sub service.
    #[must_use]
    pub const fn new(
        sub_repo: SubRepository,
        post_repo: PostRepository,
        post_service: PostService,
    ) -> Self {
        Self {
            sub_repo,
            post_repo,
            post_service,
            id_gen: IdGenerator::new(),
        }
    }

    /// Create a sub. Names are unique ignoring case.
    pub async fn create_sub(&self, owner: &str, input: CreateSubInput) -> AppResult<sub::Model> {
        input.validate()?;

        if input.name.trim().is_empty() {
            return Err(AppError::Validation("Name must not be empty".to_string()));
        }
        if input.title.trim().is_empty() {
            return Err(AppError::Validation("Title must not be empty".to_string()));
        }

        if self
            .sub_repo
            .find_by_name_ignore_case(&input.name)
            .await?
            .is_some()
        {
            return Err(AppError::Conflict("Sub already exists".to_string()));
        }

        let now = Utc::now();
        let model = sub::ActiveModel {
            id: Set(self.id_gen.generate()),
            name: Set(input.name),
            title: Set(input.title),
            description: Set(input.description),
            username: Set(owner.to_string()),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
        };

        // A racing create with a case variant is caught by the unique index.
        let sub = self.sub_repo.create(model).await.map_err(|e| match e {
            AppError::Conflict(_) => AppError::Conflict("Sub already exists".to_string()),
            other => other,
        })?;
        info!(name = %sub.name, owner, "Sub created");
        Ok(sub)
    }

    /// Get a sub and its posts, newest first, projected for `viewer`.
    pub async fn get_sub(&self, name: &str, viewer: Option<&str>) -> AppResult<SubWithPosts> {
        let sub = self.sub_repo.get_by_name(name).await?;
        let posts = self.post_repo.find_by_sub(&sub.name).await?;
        let posts = self.post_service.project_posts(posts, viewer).await?;

        Ok(SubWithPosts {
            post_count: posts.len(),
            posts,
            sub,
        })
    }
}
