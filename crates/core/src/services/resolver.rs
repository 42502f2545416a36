//! Vote target resolution.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use readit_db::repositories::{CommentRepository, PostRepository};
use serde::Deserialize;

use crate::services::vote::{VoteError, VoteTarget};

/// Identifies a post, or a comment under a post, as clients address them.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetRef {
    /// Public identifier of the post.
    pub identifier: String,
    /// Slug of the post.
    pub slug: String,
    /// Public identifier of a comment on that post.
    #[serde(default)]
    pub comment_identifier: Option<String>,
}

impl TargetRef {
    /// Reference a post.
    #[must_use]
    pub fn post(identifier: impl Into<String>, slug: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            slug: slug.into(),
            comment_identifier: None,
        }
    }

    /// Reference a comment on a post.
    #[must_use]
    pub fn comment(
        identifier: impl Into<String>,
        slug: impl Into<String>,
        comment_identifier: impl Into<String>,
    ) -> Self {
        Self {
            identifier: identifier.into(),
            slug: slug.into(),
            comment_identifier: Some(comment_identifier.into()),
        }
    }

    /// The comment identifier, treating an empty string as absent.
    #[must_use]
    pub fn comment_identifier(&self) -> Option<&str> {
        self.comment_identifier.as_deref().filter(|c| !c.is_empty())
    }
}

/// Locates the post or comment a vote is cast on.
#[async_trait]
pub trait TargetResolver: Send + Sync {
    /// Resolve `target` to a post (no comment identifier) or to a comment
    /// belonging to that post. Fails with [`VoteError::TargetNotFound`] if
    /// either does not exist.
    async fn resolve(&self, target: &TargetRef) -> Result<VoteTarget, VoteError>;
}

/// Resolver backed by the post and comment tables.
#[derive(Clone)]
pub struct RepositoryTargetResolver {
    post_repo: PostRepository,
    comment_repo: CommentRepository,
}

impl RepositoryTargetResolver {
    /// Create a new resolver.
    #[must_use]
    pub const fn new(post_repo: PostRepository, comment_repo: CommentRepository) -> Self {
        Self {
            post_repo,
            comment_repo,
        }
    }
}

#[async_trait]
impl TargetResolver for RepositoryTargetResolver {
    async fn resolve(&self, target: &TargetRef) -> Result<VoteTarget, VoteError> {
        let post = self
            .post_repo
            .find_by_identifier_and_slug(&target.identifier, &target.slug)
            .await
            .map_err(VoteError::from_storage)?
            .ok_or(VoteError::TargetNotFound)?;

        let Some(comment_identifier) = target.comment_identifier() else {
            return Ok(VoteTarget::Post(post.id));
        };

        let comment = self
            .comment_repo
            .find_by_identifier_in_post(comment_identifier, &post.id)
            .await
            .map_err(VoteError::from_storage)?
            .ok_or(VoteError::TargetNotFound)?;

        Ok(VoteTarget::Comment(comment.id))
    }
}

#[derive(Default)]
struct MemoryTargets {
    posts: HashMap<(String, String), String>,
    comments: HashMap<(String, String), String>,
}

/// In-process resolver over registered posts and comments.
#[derive(Clone, Default)]
pub struct MemoryTargetResolver {
    targets: Arc<RwLock<MemoryTargets>>,
}

impl MemoryTargetResolver {
    /// Create an empty resolver.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a post under its identifier and slug.
    pub fn add_post(&self, post_id: &str, identifier: &str, slug: &str) {
        self.targets
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .posts
            .insert((identifier.to_string(), slug.to_string()), post_id.to_string());
    }

    /// Register a comment on a post.
    pub fn add_comment(&self, comment_id: &str, identifier: &str, post_id: &str) {
        self.targets
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .comments
            .insert((post_id.to_string(), identifier.to_string()), comment_id.to_string());
    }
}

#[async_trait]
impl TargetResolver for MemoryTargetResolver {
    async fn resolve(&self, target: &TargetRef) -> Result<VoteTarget, VoteError> {
        let targets = self.targets.read().unwrap_or_else(PoisonError::into_inner);

        let post_id = targets
            .posts
            .get(&(target.identifier.clone(), target.slug.clone()))
            .ok_or(VoteError::TargetNotFound)?;

        match target.comment_identifier() {
            None => Ok(VoteTarget::Post(post_id.clone())),
            Some(comment_identifier) => targets
                .comments
                .get(&(post_id.clone(), comment_identifier.to_string()))
                .map(|id| VoteTarget::Comment(id.clone()))
                .ok_or(VoteError::TargetNotFound),
        }
    }
}
