//! Post service.

use std::collections::HashMap;

use chrono::Utc;
use readit_common::{AppError, AppResult, IdGenerator};
use readit_db::entities::{comment, post, vote};
use readit_db::repositories::{CommentRepository, PostRepository, SubRepository, VoteRepository};
use sea_orm::Set;
use serde::Deserialize;
use tracing::info;
use validator::Validate;

use crate::services::projection::{
    project_comment, project_post, ProjectedComment, ProjectedPost, VoteIndex,
};
use crate::services::vote::Vote;

/// Maximum number of posts returned by a listing.
const MAX_LIST_POSTS: u64 = 100;

/// Input for creating a post.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreatePostInput {
    #[validate(length(min = 1, max = 255))]
    pub title: String,
    pub body: Option<String>,
    /// Name of the sub to file the post under.
    #[validate(length(min = 1))]
    pub sub: String,
    #[validate(length(min = 1, max = 255))]
    pub slug: String,
}

/// Post service for business logic.
#[derive(Clone)]
pub struct PostService {
    post_repo: PostRepository,
    comment_repo: CommentRepository,
    sub_repo: SubRepository,
    vote_repo: VoteRepository,
    base_path: String,
    id_gen: IdGenerator,
}

impl PostService {
    /// Create a new post service.
    #[must_use]
    pub const fn new(
        post_repo: PostRepository,
        comment_repo: CommentRepository,
        sub_repo: SubRepository,
        vote_repo: VoteRepository,
    ) -> Self {
        Self {
            post_repo,
            comment_repo,
            sub_repo,
            vote_repo,
            base_path: String::new(),
            id_gen: IdGenerator::new(),
        }
    }

    /// Set the prefix of generated post URLs.
    #[must_use]
    pub fn with_base_path(mut self, base_path: impl Into<String>) -> Self {
        self.base_path = base_path.into();
        self
    }

    /// Create a post in an existing sub.
    pub async fn create_post(
        &self,
        author: &str,
        input: CreatePostInput,
    ) -> AppResult<post::Model> {
        input.validate()?;

        if input.title.trim().is_empty() {
            return Err(AppError::Validation("Title cannot be empty".to_string()));
        }

        let sub = self.sub_repo.get_by_name(&input.sub).await?;

        let now = Utc::now();
        let model = post::ActiveModel {
            id: Set(self.id_gen.generate()),
            identifier: Set(self.id_gen.generate_public_id()),
            slug: Set(input.slug),
            title: Set(input.title),
            body: Set(input.body),
            sub_name: Set(sub.name),
            username: Set(author.to_string()),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
        };

        let post = self.post_repo.create(model).await?;
        info!(
            identifier = %post.identifier,
            sub = %post.sub_name,
            author,
            "Post created"
        );
        Ok(post)
    }

    /// List posts, newest first, projected for `viewer`.
    pub async fn list_posts(&self, viewer: Option<&str>) -> AppResult<Vec<ProjectedPost>> {
        let posts = self.post_repo.find_recent(MAX_LIST_POSTS).await?;
        self.project_posts(posts, viewer).await
    }

    /// Get a post with its comments, projected for `viewer`.
    pub async fn get_post(
        &self,
        identifier: &str,
        slug: &str,
        viewer: Option<&str>,
    ) -> AppResult<ProjectedPost> {
        let post = self
            .post_repo
            .get_by_identifier_and_slug(identifier, slug)
            .await?;
        let comments = self.comment_repo.find_by_post(&post.id).await?;
        let index = self
            .load_votes(std::slice::from_ref(&post), &comments)
            .await?;

        Ok(project_post(
            post,
            comments,
            &index,
            viewer,
            &self.base_path,
            true,
        ))
    }

    /// Comment on a post.
    pub async fn comment_on_post(
        &self,
        author: &str,
        identifier: &str,
        slug: &str,
        body: &str,
    ) -> AppResult<comment::Model> {
        if body.trim().is_empty() {
            return Err(AppError::Validation(
                "Comment body cannot be empty".to_string(),
            ));
        }

        let post = self
            .post_repo
            .get_by_identifier_and_slug(identifier, slug)
            .await?;

        let now = Utc::now();
        let model = comment::ActiveModel {
            id: Set(self.id_gen.generate()),
            identifier: Set(self.id_gen.generate_public_id()),
            body: Set(body.to_string()),
            username: Set(author.to_string()),
            post_id: Set(post.id),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
        };

        self.comment_repo.create(model).await
    }

    /// List a post's comments, newest first, projected for `viewer`.
    pub async fn list_comments(
        &self,
        identifier: &str,
        slug: &str,
        viewer: Option<&str>,
    ) -> AppResult<Vec<ProjectedComment>> {
        let post = self
            .post_repo
            .get_by_identifier_and_slug(identifier, slug)
            .await?;
        let comments = self.comment_repo.find_by_post(&post.id).await?;
        let index = self.load_votes(&[], &comments).await?;

        Ok(comments
            .into_iter()
            .map(|comment| project_comment(comment, &index, viewer))
            .collect())
    }

    /// Project a batch of posts for a listing (comments counted, not
    /// included).
    pub async fn project_posts(
        &self,
        posts: Vec<post::Model>,
        viewer: Option<&str>,
    ) -> AppResult<Vec<ProjectedPost>> {
        let post_ids: Vec<String> = posts.iter().map(|p| p.id.clone()).collect();
        let mut comments_by_post: HashMap<String, Vec<comment::Model>> = HashMap::new();
        for comment in self.comment_repo.find_by_posts(&post_ids).await? {
            comments_by_post
                .entry(comment.post_id.clone())
                .or_default()
                .push(comment);
        }
        let index = self.load_votes(&posts, &[]).await?;

        Ok(posts
            .into_iter()
            .map(|post| {
                let comments = comments_by_post.remove(&post.id).unwrap_or_default();
                project_post(post, comments, &index, viewer, &self.base_path, false)
            })
            .collect())
    }

    async fn load_votes(
        &self,
        posts: &[post::Model],
        comments: &[comment::Model],
    ) -> AppResult<VoteIndex> {
        let post_ids: Vec<String> = posts.iter().map(|p| p.id.clone()).collect();
        let comment_ids: Vec<String> = comments.iter().map(|c| c.id.clone()).collect();

        let mut models = self
            .vote_repo
            .find_by_targets(vote::TargetKind::Post, &post_ids)
            .await?;
        models.extend(
            self.vote_repo
                .find_by_targets(vote::TargetKind::Comment, &comment_ids)
                .await?,
        );

        let votes = models
            .into_iter()
            .map(Vote::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(VoteIndex::new(votes))
    }
}
