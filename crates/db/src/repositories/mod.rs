//! Repositories wrapping entity queries.

mod comment;
mod post;
mod sub;
mod vote;

pub use comment::CommentRepository;
pub use post::PostRepository;
pub use sub::SubRepository;
pub use vote::{VoteRepository, VoteTransaction};

use readit_common::AppError;
use sea_orm::{DbErr, SqlErr};

/// Map a write error, turning unique index violations into
/// [`AppError::Conflict`].
pub(crate) fn map_unique_violation(err: DbErr) -> AppError {
    match err.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(detail)) => AppError::Conflict(detail),
        _ => AppError::Database(err.to_string()),
    }
}
