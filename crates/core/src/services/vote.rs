//! Vote records and the cast decision table.
//!
//! A persisted [`Vote`] is an immutable record: voter, target and a
//! direction. Derived values (score, the viewer's own vote) live in
//! [`crate::services::projection`] and are never stored.

use std::fmt;

use readit_common::AppError;
use readit_db::entities::vote;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors produced while casting a vote.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VoteError {
    /// The requested value is not one of -1, 0 or 1.
    #[error("Value must be -1, 0, or 1 (got {0})")]
    InvalidValue(i32),

    /// The post or comment does not exist.
    #[error("Vote target not found")]
    TargetNotFound,

    /// A reset (value 0) was requested but the voter has no vote here.
    #[error("Vote not found, nothing to reset")]
    NothingToUndo,

    /// Another cast for the same voter and target won a race.
    #[error("Vote was modified concurrently")]
    ConcurrentModification,

    /// Persistence failure.
    #[error("Storage error: {0}")]
    Storage(String),
}

impl VoteError {
    /// Classify a repository error.
    ///
    /// Conflicts raised by the vote table are races on the same
    /// `(voter, target)`; everything else is opaque storage failure.
    #[must_use]
    pub fn from_storage(err: AppError) -> Self {
        match err {
            AppError::Conflict(_) => Self::ConcurrentModification,
            other => Self::Storage(other.to_string()),
        }
    }
}

impl From<VoteError> for AppError {
    fn from(err: VoteError) -> Self {
        match err {
            VoteError::InvalidValue(_) => Self::Validation(err.to_string()),
            VoteError::TargetNotFound => Self::NotFound(err.to_string()),
            VoteError::NothingToUndo => Self::BadRequest(err.to_string()),
            VoteError::ConcurrentModification => Self::Unavailable(err.to_string()),
            VoteError::Storage(msg) => Self::Database(msg),
        }
    }
}

/// Requested vote value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VoteValue {
    /// -1
    Down,
    /// 0, removes an existing vote
    Clear,
    /// +1
    Up,
}

impl VoteValue {
    /// The direction to store, or `None` for a reset.
    #[must_use]
    pub const fn direction(self) -> Option<Direction> {
        match self {
            Self::Down => Some(Direction::Down),
            Self::Clear => None,
            Self::Up => Some(Direction::Up),
        }
    }
}

impl TryFrom<i32> for VoteValue {
    type Error = VoteError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            -1 => Ok(Self::Down),
            0 => Ok(Self::Clear),
            1 => Ok(Self::Up),
            other => Err(VoteError::InvalidValue(other)),
        }
    }
}

/// Direction of a stored vote. There is no stored "zero".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// +1
    Up,
    /// -1
    Down,
}

impl Direction {
    /// Numeric value as summed into a score.
    #[must_use]
    pub const fn value(self) -> i32 {
        match self {
            Self::Up => 1,
            Self::Down => -1,
        }
    }

    /// Parse a stored column value.
    #[must_use]
    pub const fn from_value(value: i32) -> Option<Self> {
        match value {
            1 => Some(Self::Up),
            -1 => Some(Self::Down),
            _ => None,
        }
    }
}

/// The post or comment a vote applies to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "lowercase")]
pub enum VoteTarget {
    /// A post, by primary key.
    Post(String),
    /// A comment, by primary key.
    Comment(String),
}

impl VoteTarget {
    /// Storage discriminator for this target.
    #[must_use]
    pub const fn kind(&self) -> vote::TargetKind {
        match self {
            Self::Post(_) => vote::TargetKind::Post,
            Self::Comment(_) => vote::TargetKind::Comment,
        }
    }

    /// Primary key of the target row.
    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            Self::Post(id) | Self::Comment(id) => id,
        }
    }

    /// Rebuild a target from its stored columns.
    #[must_use]
    pub fn from_parts(kind: vote::TargetKind, id: String) -> Self {
        match kind {
            vote::TargetKind::Post => Self::Post(id),
            vote::TargetKind::Comment => Self::Comment(id),
        }
    }
}

impl fmt::Display for VoteTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Post(id) => write!(f, "post:{id}"),
            Self::Comment(id) => write!(f, "comment:{id}"),
        }
    }
}

/// The `(voter, target)` pair a vote is unique on.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VoteKey {
    /// Username of the voter.
    pub voter: String,
    /// What is being voted on.
    pub target: VoteTarget,
}

impl VoteKey {
    /// Create a key.
    #[must_use]
    pub fn new(voter: impl Into<String>, target: VoteTarget) -> Self {
        Self {
            voter: voter.into(),
            target,
        }
    }
}

/// A persisted vote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Vote {
    /// Row ID.
    pub id: String,
    /// Username of the voter.
    pub voter: String,
    /// What was voted on.
    pub target: VoteTarget,
    /// Up or down.
    pub direction: Direction,
}

impl Vote {
    /// Numeric value of this vote.
    #[must_use]
    pub const fn value(&self) -> i32 {
        self.direction.value()
    }
}

impl TryFrom<vote::Model> for Vote {
    type Error = VoteError;

    fn try_from(model: vote::Model) -> Result<Self, Self::Error> {
        let direction = Direction::from_value(model.value).ok_or_else(|| {
            VoteError::Storage(format!(
                "vote {} has out-of-range value {}",
                model.id, model.value
            ))
        })?;

        Ok(Self {
            id: model.id,
            voter: model.username,
            target: VoteTarget::from_parts(model.target_kind, model.target_id),
            direction,
        })
    }
}

/// Outcome of applying a requested value to the current state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// No vote yet: create one.
    Insert(Direction),
    /// Vote exists with a different direction: overwrite it.
    Update {
        /// The stored vote.
        vote: Vote,
        /// The new direction.
        to: Direction,
    },
    /// Vote exists and a reset was requested: delete it.
    Delete(Vote),
    /// Vote exists with the requested direction: nothing to write.
    Unchanged,
}

impl Transition {
    /// Whether applying this transition writes to storage.
    #[must_use]
    pub const fn writes(&self) -> bool {
        !matches!(self, Self::Unchanged)
    }
}

/// Decide what a cast does given the voter's current vote on the target.
pub fn decide(existing: Option<Vote>, requested: VoteValue) -> Result<Transition, VoteError> {
    match (existing, requested.direction()) {
        (None, None) => Err(VoteError::NothingToUndo),
        (None, Some(direction)) => Ok(Transition::Insert(direction)),
        (Some(vote), None) => Ok(Transition::Delete(vote)),
        (Some(vote), Some(direction)) if vote.direction == direction => Ok(Transition::Unchanged),
        (Some(vote), Some(direction)) => Ok(Transition::Update { vote, to: direction }),
    }
}
