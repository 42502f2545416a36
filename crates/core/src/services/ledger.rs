//! Vote ledger.
//!
//! Applies casts to the vote table: at most one vote per `(voter, target)`,
//! created on the first non-zero cast, overwritten on a different non-zero
//! cast and deleted on a zero cast. Each cast performs zero or one write.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::services::resolver::{TargetRef, TargetResolver};
use crate::services::store::VoteStore;
use crate::services::vote::{decide, Transition, VoteError, VoteKey, VoteValue};

/// Number of times a cast is re-run after losing a race.
pub const DEFAULT_CONFLICT_RETRIES: u32 = 1;

/// Vote ledger.
#[derive(Clone)]
pub struct VoteLedger {
    store: Arc<dyn VoteStore>,
    resolver: Arc<dyn TargetResolver>,
    conflict_retries: u32,
}

impl VoteLedger {
    /// Create a new ledger.
    #[must_use]
    pub fn new(store: Arc<dyn VoteStore>, resolver: Arc<dyn TargetResolver>) -> Self {
        Self {
            store,
            resolver,
            conflict_retries: DEFAULT_CONFLICT_RETRIES,
        }
    }

    /// Override how often a conflicting cast is re-run.
    #[must_use]
    pub const fn with_conflict_retries(mut self, retries: u32) -> Self {
        self.conflict_retries = retries;
        self
    }

    /// Cast `value` (-1, 0 or 1) by `voter` on `target`.
    ///
    /// A repeated cast of the current value succeeds without writing.
    /// Resetting a vote that does not exist fails with
    /// [`VoteError::NothingToUndo`].
    pub async fn cast_vote(
        &self,
        voter: &str,
        target: &TargetRef,
        value: i32,
    ) -> Result<(), VoteError> {
        let requested = VoteValue::try_from(value)?;
        let resolved = self.resolver.resolve(target).await?;
        let key = VoteKey::new(voter, resolved);

        let mut attempt = 0;
        loop {
            match self.apply(&key, requested).await {
                Err(VoteError::ConcurrentModification) if attempt < self.conflict_retries => {
                    attempt += 1;
                    warn!(
                        voter = %key.voter,
                        target = %key.target,
                        attempt,
                        "Vote conflicted with a concurrent cast, retrying"
                    );
                }
                result => return result,
            }
        }
    }

    async fn apply(&self, key: &VoteKey, requested: VoteValue) -> Result<(), VoteError> {
        let mut scope = self.store.scope(key).await?;
        let existing = scope.find_vote().await?;
        let transition = decide(existing, requested)?;

        match &transition {
            Transition::Insert(direction) => scope.insert_vote(*direction).await?,
            Transition::Update { vote, to } => scope.update_vote(vote, *to).await?,
            Transition::Delete(vote) => scope.delete_vote(vote).await?,
            Transition::Unchanged => {}
        }
        scope.commit().await?;

        debug!(
            voter = %key.voter,
            target = %key.target,
            ?transition,
            "Vote applied"
        );
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::services::projection::{score, viewer_vote};
    use crate::services::resolver::MemoryTargetResolver;
    use crate::services::store::{MemoryVoteStore, VoteScope};
    use crate::services::vote::VoteTarget;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn post_target() -> VoteTarget {
        VoteTarget::Post("p1".to_string())
    }

    fn post_ref() -> TargetRef {
        TargetRef::post("abcd1234", "hello")
    }

    fn setup() -> (VoteLedger, MemoryVoteStore) {
        let store = MemoryVoteStore::new();
        let resolver = MemoryTargetResolver::new();
        resolver.add_post("p1", "abcd1234", "hello");
        resolver.add_comment("c1", "cmt00001", "p1");
        let ledger = VoteLedger::new(Arc::new(store.clone()), Arc::new(resolver));
        (ledger, store)
    }

    fn post_score(store: &MemoryVoteStore) -> i64 {
        score(&store.votes_for(&post_target()))
    }

    /// Fails the first `failures` scopes with a conflict.
    struct FlakyStore {
        inner: MemoryVoteStore,
        failures: AtomicU32,
        attempts: AtomicU32,
    }

    #[async_trait]
    impl VoteStore for FlakyStore {
        async fn scope(&self, key: &VoteKey) -> Result<Box<dyn VoteScope>, VoteError> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            let remaining = self.failures.load(Ordering::SeqCst);
            if remaining > 0 {
                self.failures.store(remaining - 1, Ordering::SeqCst);
                return Err(VoteError::ConcurrentModification);
            }
            self.inner.scope(key).await
        }
    }

    fn flaky(failures: u32) -> (VoteLedger, Arc<FlakyStore>) {
        let store = Arc::new(FlakyStore {
            inner: MemoryVoteStore::new(),
            failures: AtomicU32::new(failures),
            attempts: AtomicU32::new(0),
        });
        let resolver = MemoryTargetResolver::new();
        resolver.add_post("p1", "abcd1234", "hello");
        let ledger = VoteLedger::new(store.clone(), Arc::new(resolver));
        (ledger, store)
    }

    #[tokio::test]
    async fn test_alice_scenario() {
        let (ledger, store) = setup();
        assert_eq!(post_score(&store), 0);

        ledger.cast_vote("alice", &post_ref(), 1).await.unwrap();
        assert_eq!(post_score(&store), 1);
        assert_eq!(store.write_count(), 1);

        ledger.cast_vote("alice", &post_ref(), 1).await.unwrap();
        assert_eq!(post_score(&store), 1);
        assert_eq!(store.write_count(), 1);

        ledger.cast_vote("alice", &post_ref(), -1).await.unwrap();
        assert_eq!(post_score(&store), -1);
        assert_eq!(store.write_count(), 2);

        ledger.cast_vote("alice", &post_ref(), 0).await.unwrap();
        assert_eq!(post_score(&store), 0);
        assert_eq!(store.write_count(), 3);
        assert!(store.all_votes().is_empty());
    }

    #[tokio::test]
    async fn test_reset_without_vote_is_nothing_to_undo() {
        let (ledger, store) = setup();

        let result = ledger.cast_vote("alice", &post_ref(), 0).await;

        assert_eq!(result, Err(VoteError::NothingToUndo));
        assert_eq!(store.write_count(), 0);
    }

    #[tokio::test]
    async fn test_invalid_value_checked_before_resolution() {
        let (ledger, store) = setup();

        let result = ledger
            .cast_vote("alice", &TargetRef::post("missing", "missing"), 2)
            .await;

        assert_eq!(result, Err(VoteError::InvalidValue(2)));
        assert_eq!(store.write_count(), 0);
    }

    #[tokio::test]
    async fn test_unknown_target_is_not_found() {
        let (ledger, store) = setup();

        let post = ledger
            .cast_vote("alice", &TargetRef::post("missing", "hello"), 1)
            .await;
        let comment = ledger
            .cast_vote("alice", &TargetRef::comment("abcd1234", "hello", "nope"), 1)
            .await;

        assert_eq!(post, Err(VoteError::TargetNotFound));
        assert_eq!(comment, Err(VoteError::TargetNotFound));
        assert_eq!(store.write_count(), 0);
    }

    #[tokio::test]
    async fn test_comment_votes_are_separate_from_post_votes() {
        let (ledger, store) = setup();
        let comment_ref = TargetRef::comment("abcd1234", "hello", "cmt00001");

        ledger.cast_vote("alice", &post_ref(), 1).await.unwrap();
        ledger.cast_vote("alice", &comment_ref, -1).await.unwrap();

        let comment_votes = store.votes_for(&VoteTarget::Comment("c1".to_string()));
        assert_eq!(score(&comment_votes), -1);
        assert_eq!(post_score(&store), 1);
        assert_eq!(store.all_votes().len(), 2);
    }

    #[tokio::test]
    async fn test_last_write_wins() {
        let (ledger, store) = setup();
        let sequence = [1, -1, -1, 1, -1];

        for value in sequence {
            ledger.cast_vote("alice", &post_ref(), value).await.unwrap();
        }

        let votes = store.votes_for(&post_target());
        assert_eq!(votes.len(), 1);
        assert_eq!(viewer_vote(&votes, Some("alice")), Some(-1));
        // 1 insert, then updates on every change of direction
        assert_eq!(store.write_count(), 4);
    }

    #[tokio::test]
    async fn test_score_sums_across_voters() {
        let (ledger, store) = setup();

        ledger.cast_vote("alice", &post_ref(), 1).await.unwrap();
        ledger.cast_vote("bob", &post_ref(), 1).await.unwrap();
        ledger.cast_vote("carol", &post_ref(), -1).await.unwrap();

        let votes = store.votes_for(&post_target());
        assert_eq!(score(&votes), 1);
        assert_eq!(viewer_vote(&votes, Some("carol")), Some(-1));
        assert_eq!(viewer_vote(&votes, Some("dave")), Some(0));
        assert_eq!(viewer_vote(&votes, None), None);
    }

    #[tokio::test]
    async fn test_concurrent_identical_casts_store_one_vote() {
        let (ledger, store) = setup();

        let casts = (0..8).map(|_| {
            let ledger = ledger.clone();
            tokio::spawn(async move { ledger.cast_vote("alice", &post_ref(), 1).await })
        });
        for result in futures::future::join_all(casts).await {
            assert_eq!(result.unwrap(), Ok(()));
        }

        assert_eq!(store.all_votes().len(), 1);
        assert_eq!(post_score(&store), 1);
        assert_eq!(store.write_count(), 1);
    }

    #[tokio::test]
    async fn test_conflict_is_retried_once() {
        let (ledger, store) = flaky(1);

        ledger.cast_vote("alice", &post_ref(), 1).await.unwrap();

        assert_eq!(store.attempts.load(Ordering::SeqCst), 2);
        assert_eq!(score(&store.inner.votes_for(&post_target())), 1);
    }

    #[tokio::test]
    async fn test_conflict_surfaces_after_retry() {
        let (ledger, store) = flaky(2);

        let result = ledger.cast_vote("alice", &post_ref(), 1).await;

        assert_eq!(result, Err(VoteError::ConcurrentModification));
        assert_eq!(store.attempts.load(Ordering::SeqCst), 2);
        assert_eq!(store.inner.write_count(), 0);
    }

    #[tokio::test]
    async fn test_retry_count_is_configurable() {
        let (ledger, store) = flaky(2);
        let ledger = ledger.with_conflict_retries(2);

        ledger.cast_vote("alice", &post_ref(), -1).await.unwrap();

        assert_eq!(store.attempts.load(Ordering::SeqCst), 3);
    }
}
