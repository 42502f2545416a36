//! Business logic services.

#![allow(missing_docs)]

pub mod ledger;
pub mod post;
pub mod projection;
pub mod resolver;
pub mod store;
pub mod sub;
pub mod vote;
pub mod voting;

pub use ledger::{VoteLedger, DEFAULT_CONFLICT_RETRIES};
pub use post::{CreatePostInput, PostService};
pub use projection::{
    post_url, project_comment, project_post, score, viewer_vote, ProjectedComment, ProjectedPost,
    VoteIndex,
};
pub use resolver::{MemoryTargetResolver, RepositoryTargetResolver, TargetRef, TargetResolver};
pub use store::{MemoryVoteStore, VoteScope, VoteStore};
pub use sub::{CreateSubInput, SubService, SubWithPosts};
pub use vote::{
    decide, Direction, Transition, Vote, VoteError, VoteKey, VoteTarget, VoteValue,
};
pub use voting::VoteService;
