//! Vote persistence seam.
//!
//! The ledger talks to storage through [`VoteStore`]: it opens a
//! [`VoteScope`] for one `(voter, target)` pair, reads the existing vote,
//! performs at most one write and commits. Whatever the scope does before
//! `commit` must be invisible to others if the scope is dropped.
//!
//! Two backends are provided: [`VoteRepository`] (a database transaction
//! with a row lock, conflicts surfaced by the unique index) and
//! [`MemoryVoteStore`] (a per-key async mutex with staged writes).

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use chrono::Utc;
use readit_common::IdGenerator;
use readit_db::entities::vote;
use readit_db::repositories::{VoteRepository, VoteTransaction};
use sea_orm::Set;
use tokio::sync::OwnedMutexGuard;

use crate::services::vote::{Direction, Vote, VoteError, VoteKey, VoteTarget};

/// Opens exclusive scopes over single `(voter, target)` pairs.
#[async_trait]
pub trait VoteStore: Send + Sync {
    /// Open a scope for `key`.
    ///
    /// Two scopes for the same key never observe each other's uncommitted
    /// state, and at most one of two racing inserts may commit.
    async fn scope(&self, key: &VoteKey) -> Result<Box<dyn VoteScope>, VoteError>;
}

/// A transaction / lock scope over one `(voter, target)` pair.
#[async_trait]
pub trait VoteScope: Send {
    /// The voter's current vote on the target, if any.
    async fn find_vote(&mut self) -> Result<Option<Vote>, VoteError>;

    /// Create the vote.
    async fn insert_vote(&mut self, direction: Direction) -> Result<(), VoteError>;

    /// Overwrite the direction of `vote`.
    async fn update_vote(&mut self, vote: &Vote, direction: Direction) -> Result<(), VoteError>;

    /// Remove `vote`.
    async fn delete_vote(&mut self, vote: &Vote) -> Result<(), VoteError>;

    /// Make the scope's write visible.
    async fn commit(self: Box<Self>) -> Result<(), VoteError>;
}

// ==================== Database backend ====================

struct DbVoteScope {
    txn: VoteTransaction,
    key: VoteKey,
    /// Row returned by the last `find_vote`, locked until commit.
    found: Option<vote::Model>,
    id_gen: IdGenerator,
}

#[async_trait]
impl VoteStore for VoteRepository {
    async fn scope(&self, key: &VoteKey) -> Result<Box<dyn VoteScope>, VoteError> {
        let txn = self.begin().await.map_err(VoteError::from_storage)?;
        Ok(Box::new(DbVoteScope {
            txn,
            key: key.clone(),
            found: None,
            id_gen: IdGenerator::new(),
        }))
    }
}

#[async_trait]
impl VoteScope for DbVoteScope {
    async fn find_vote(&mut self) -> Result<Option<Vote>, VoteError> {
        self.found = self
            .txn
            .find(&self.key.voter, self.key.target.kind(), self.key.target.id())
            .await
            .map_err(VoteError::from_storage)?;
        self.found.clone().map(Vote::try_from).transpose()
    }

    async fn insert_vote(&mut self, direction: Direction) -> Result<(), VoteError> {
        let now = Utc::now();
        let model = vote::ActiveModel {
            id: Set(self.id_gen.generate()),
            username: Set(self.key.voter.clone()),
            target_kind: Set(self.key.target.kind()),
            target_id: Set(self.key.target.id().to_string()),
            value: Set(direction.value()),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
        };

        self.txn
            .insert(model)
            .await
            .map_err(VoteError::from_storage)?;
        Ok(())
    }

    async fn update_vote(&mut self, vote: &Vote, direction: Direction) -> Result<(), VoteError> {
        let existing = self
            .found
            .take()
            .filter(|model| model.id == vote.id)
            .ok_or(VoteError::ConcurrentModification)?;

        self.txn
            .update_value(existing, direction.value())
            .await
            .map_err(VoteError::from_storage)?;
        Ok(())
    }

    async fn delete_vote(&mut self, vote: &Vote) -> Result<(), VoteError> {
        self.txn
            .delete(&vote.id)
            .await
            .map_err(VoteError::from_storage)
    }

    async fn commit(self: Box<Self>) -> Result<(), VoteError> {
        self.txn.commit().await.map_err(VoteError::from_storage)
    }
}

// ==================== In-memory backend ====================

#[derive(Default)]
struct MemoryInner {
    rows: Mutex<HashMap<VoteKey, Vote>>,
    locks: Mutex<HashMap<VoteKey, Arc<tokio::sync::Mutex<()>>>>,
    writes: AtomicUsize,
    id_gen: IdGenerator,
}

/// In-process vote store.
///
/// Casts for the same key serialize on a per-key async mutex; casts for
/// different keys proceed independently.
#[derive(Clone, Default)]
pub struct MemoryVoteStore {
    inner: Arc<MemoryInner>,
}

impl MemoryVoteStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of committed writes (inserts, updates and deletes).
    #[must_use]
    pub fn write_count(&self) -> usize {
        self.inner.writes.load(Ordering::SeqCst)
    }

    /// Committed votes on `target`, in no particular order.
    #[must_use]
    pub fn votes_for(&self, target: &VoteTarget) -> Vec<Vote> {
        self.inner
            .rows
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter(|vote| &vote.target == target)
            .cloned()
            .collect()
    }

    /// Every committed vote.
    #[must_use]
    pub fn all_votes(&self) -> Vec<Vote> {
        self.inner
            .rows
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect()
    }

    fn lease(&self, key: &VoteKey) -> KeyLease {
        let mut locks = self
            .inner
            .locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        KeyLease {
            store: self.clone(),
            key: key.clone(),
            lock: Arc::clone(locks.entry(key.clone()).or_default()),
        }
    }
}

/// A claim on the per-key mutex, held from before waiting until the scope
/// ends. The map entry is removed when the last claim goes away.
struct KeyLease {
    store: MemoryVoteStore,
    key: VoteKey,
    lock: Arc<tokio::sync::Mutex<()>>,
}

impl Drop for KeyLease {
    fn drop(&mut self) {
        let mut locks = self
            .store
            .inner
            .locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        // Claims are only handed out under the map lock, so a count of two
        // (map entry plus this lease) means nobody is queued on the key.
        if Arc::strong_count(&self.lock) == 2
            && locks
                .get(&self.key)
                .is_some_and(|lock| Arc::ptr_eq(lock, &self.lock))
        {
            locks.remove(&self.key);
        }
    }
}

enum PendingWrite {
    Upsert(Vote),
    Delete,
}

// Field order matters: the guard is released before the lease is dropped.
struct MemoryVoteScope {
    pending: Option<PendingWrite>,
    guard: OwnedMutexGuard<()>,
    lease: KeyLease,
}

impl MemoryVoteScope {
    fn stage(&mut self, write: PendingWrite) -> Result<(), VoteError> {
        if self.pending.is_some() {
            return Err(VoteError::Storage(
                "a vote scope accepts a single write".to_string(),
            ));
        }
        self.pending = Some(write);
        Ok(())
    }

    fn current(&self) -> Option<Vote> {
        self.lease
            .store
            .inner
            .rows
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&self.lease.key)
            .cloned()
    }
}

#[async_trait]
impl VoteStore for MemoryVoteStore {
    async fn scope(&self, key: &VoteKey) -> Result<Box<dyn VoteScope>, VoteError> {
        let lease = self.lease(key);
        let guard = Arc::clone(&lease.lock).lock_owned().await;
        Ok(Box::new(MemoryVoteScope {
            pending: None,
            guard,
            lease,
        }))
    }
}

#[async_trait]
impl VoteScope for MemoryVoteScope {
    async fn find_vote(&mut self) -> Result<Option<Vote>, VoteError> {
        Ok(self.current())
    }

    async fn insert_vote(&mut self, direction: Direction) -> Result<(), VoteError> {
        if self.current().is_some() {
            return Err(VoteError::ConcurrentModification);
        }
        let vote = Vote {
            id: self.lease.store.inner.id_gen.generate(),
            voter: self.lease.key.voter.clone(),
            target: self.lease.key.target.clone(),
            direction,
        };
        self.stage(PendingWrite::Upsert(vote))
    }

    async fn update_vote(&mut self, vote: &Vote, direction: Direction) -> Result<(), VoteError> {
        if self.current().as_ref().map(|v| &v.id) != Some(&vote.id) {
            return Err(VoteError::ConcurrentModification);
        }
        self.stage(PendingWrite::Upsert(Vote {
            direction,
            ..vote.clone()
        }))
    }

    async fn delete_vote(&mut self, vote: &Vote) -> Result<(), VoteError> {
        if self.current().as_ref().map(|v| &v.id) != Some(&vote.id) {
            return Err(VoteError::ConcurrentModification);
        }
        self.stage(PendingWrite::Delete)
    }

    async fn commit(self: Box<Self>) -> Result<(), VoteError> {
        let Self {
            pending,
            guard,
            lease,
        } = *self;
        if let Some(write) = pending {
            let mut rows = lease
                .store
                .inner
                .rows
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            match write {
                PendingWrite::Upsert(vote) => {
                    rows.insert(lease.key.clone(), vote);
                }
                PendingWrite::Delete => {
                    rows.remove(&lease.key);
                }
            }
            drop(rows);
            lease.store.inner.writes.fetch_add(1, Ordering::SeqCst);
        }

        drop(guard);
        drop(lease);
        Ok(())
    }
}
