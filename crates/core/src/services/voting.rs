//! Vote service: the ledger behind the application error type.

use std::sync::Arc;

use readit_common::{AppError, AppResult, Config};
use readit_db::repositories::{CommentRepository, PostRepository, VoteRepository};

use crate::services::ledger::VoteLedger;
use crate::services::post::PostService;
use crate::services::projection::ProjectedPost;
use crate::services::resolver::{RepositoryTargetResolver, TargetRef};

/// Vote service for business logic.
#[derive(Clone)]
pub struct VoteService {
    ledger: VoteLedger,
    post_service: PostService,
}

impl VoteService {
    /// Create a new vote service.
    #[must_use]
    pub const fn new(ledger: VoteLedger, post_service: PostService) -> Self {
        Self {
            ledger,
            post_service,
        }
    }

    /// Wire a database-backed ledger using the configured retry count.
    #[must_use]
    pub fn from_repositories(
        vote_repo: VoteRepository,
        post_repo: PostRepository,
        comment_repo: CommentRepository,
        post_service: PostService,
        config: &Config,
    ) -> Self {
        let resolver = RepositoryTargetResolver::new(post_repo, comment_repo);
        let ledger = VoteLedger::new(Arc::new(vote_repo), Arc::new(resolver))
            .with_conflict_retries(config.voting.conflict_retries);
        Self::new(ledger, post_service)
    }

    /// Cast a vote.
    pub async fn cast(&self, voter: &str, target: &TargetRef, value: i32) -> AppResult<()> {
        self.ledger
            .cast_vote(voter, target, value)
            .await
            .map_err(AppError::from)
    }

    /// Cast a vote and return the post it landed on (with comments),
    /// projected for the voter.
    pub async fn cast_and_project(
        &self,
        voter: &str,
        target: &TargetRef,
        value: i32,
    ) -> AppResult<ProjectedPost> {
        self.cast(voter, target, value).await?;
        self.post_service
            .get_post(&target.identifier, &target.slug, Some(voter))
            .await
    }
}
