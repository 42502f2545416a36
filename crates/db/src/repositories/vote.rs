//! Vote repository.
//!
//! Reads for scoring go straight to the pool. Writes go through a
//! [`VoteTransaction`] so the ledger can read the existing vote, decide and
//! write inside one database transaction.

use std::sync::Arc;

use super::map_unique_violation;
use crate::entities::{Vote, vote};
use readit_common::{AppError, AppResult};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DatabaseTransaction, DbErr, EntityTrait,
    QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};

/// Vote repository for database operations.
#[derive(Clone)]
pub struct VoteRepository {
    db: Arc<DatabaseConnection>,
}

impl VoteRepository {
    /// Create a new vote repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Get all votes on one target.
    pub async fn find_by_target(
        &self,
        kind: vote::TargetKind,
        target_id: &str,
    ) -> AppResult<Vec<vote::Model>> {
        Vote::find()
            .filter(vote::Column::TargetKind.eq(kind))
            .filter(vote::Column::TargetId.eq(target_id))
            .order_by_asc(vote::Column::Id)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Get all votes on several targets of the same kind.
    pub async fn find_by_targets(
        &self,
        kind: vote::TargetKind,
        target_ids: &[String],
    ) -> AppResult<Vec<vote::Model>> {
        if target_ids.is_empty() {
            return Ok(vec![]);
        }

        Vote::find()
            .filter(vote::Column::TargetKind.eq(kind))
            .filter(vote::Column::TargetId.is_in(target_ids.iter().cloned()))
            .order_by_asc(vote::Column::Id)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Open a transaction for a read-decide-write sequence on one vote.
    pub async fn begin(&self) -> AppResult<VoteTransaction> {
        let txn = self
            .db
            .begin()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(VoteTransaction { txn })
    }
}

/// An open transaction over the vote table.
///
/// Dropping it without calling [`VoteTransaction::commit`] rolls back.
pub struct VoteTransaction {
    txn: DatabaseTransaction,
}

impl VoteTransaction {
    /// Find a user's vote on a target, locking the row until commit.
    pub async fn find(
        &self,
        username: &str,
        kind: vote::TargetKind,
        target_id: &str,
    ) -> AppResult<Option<vote::Model>> {
        Vote::find()
            .filter(vote::Column::Username.eq(username))
            .filter(vote::Column::TargetKind.eq(kind))
            .filter(vote::Column::TargetId.eq(target_id))
            .lock_exclusive()
            .one(&self.txn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Insert a new vote.
    ///
    /// Losing the race against another insert for the same
    /// `(username, target)` yields [`AppError::Conflict`].
    pub async fn insert(&self, model: vote::ActiveModel) -> AppResult<vote::Model> {
        model.insert(&self.txn).await.map_err(map_write_err)
    }

    /// Overwrite the value of an existing vote.
    pub async fn update_value(&self, existing: vote::Model, value: i32) -> AppResult<vote::Model> {
        let mut active: vote::ActiveModel = existing.into();
        active.value = Set(value);
        active.updated_at = Set(chrono::Utc::now().into());
        active.update(&self.txn).await.map_err(map_write_err)
    }

    /// Delete a vote by ID.
    ///
    /// A vote that is already gone yields [`AppError::Conflict`].
    pub async fn delete(&self, id: &str) -> AppResult<()> {
        let result = Vote::delete_by_id(id)
            .exec(&self.txn)
            .await
            .map_err(map_write_err)?;

        if result.rows_affected == 0 {
            return Err(AppError::Conflict(format!("vote {id} was already removed")));
        }
        Ok(())
    }

    /// Commit the transaction.
    pub async fn commit(self) -> AppResult<()> {
        self.txn
            .commit()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}

fn map_write_err(err: DbErr) -> AppError {
    if matches!(err, DbErr::RecordNotUpdated) {
        return AppError::Conflict("vote was changed concurrently".to_string());
    }
    map_unique_violation(err)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Utc;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult};

    fn create_test_vote(id: &str, username: &str, target_id: &str, value: i32) -> vote::Model {
        vote::Model {
            id: id.to_string(),
            username: username.to_string(),
            target_kind: vote::TargetKind::Post,
            target_id: target_id.to_string(),
            value,
            created_at: Utc::now().into(),
            updated_at: Utc::now().into(),
        }
    }

    #[tokio::test]
    async fn test_find_by_target() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[
                    create_test_vote("v1", "alice", "p1", 1),
                    create_test_vote("v2", "bob", "p1", -1),
                ]])
                .into_connection(),
        );

        let repo = VoteRepository::new(db);
        let votes = repo
            .find_by_target(vote::TargetKind::Post, "p1")
            .await
            .unwrap();

        assert_eq!(votes.len(), 2);
    }

    #[tokio::test]
    async fn test_find_by_targets_empty_skips_query() {
        let db = Arc::new(MockDatabase::new(DatabaseBackend::Postgres).into_connection());

        let repo = VoteRepository::new(db);
        let votes = repo
            .find_by_targets(vote::TargetKind::Comment, &[])
            .await
            .unwrap();

        assert!(votes.is_empty());
    }

    #[tokio::test]
    async fn test_transaction_find_and_update() {
        let existing = create_test_vote("v1", "alice", "p1", 1);
        let updated = create_test_vote("v1", "alice", "p1", -1);

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[existing]])
                .append_query_results([[updated]])
                .into_connection(),
        );

        let repo = VoteRepository::new(db);
        let txn = repo.begin().await.unwrap();
        let found = txn
            .find("alice", vote::TargetKind::Post, "p1")
            .await
            .unwrap()
            .unwrap();
        let saved = txn.update_value(found, -1).await.unwrap();
        txn.commit().await.unwrap();

        assert_eq!(saved.value, -1);
    }

    #[tokio::test]
    async fn test_transaction_delete() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_exec_results([MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 1,
                }])
                .into_connection(),
        );

        let repo = VoteRepository::new(db);
        let txn = repo.begin().await.unwrap();
        txn.delete("v1").await.unwrap();
        txn.commit().await.unwrap();
    }

    #[tokio::test]
    async fn test_transaction_delete_missing_row_is_conflict() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_exec_results([MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 0,
                }])
                .into_connection(),
        );

        let repo = VoteRepository::new(db);
        let txn = repo.begin().await.unwrap();
        let result = txn.delete("v1").await;

        assert!(matches!(result, Err(AppError::Conflict(_))));
    }

    #[test]
    fn test_map_write_err_record_not_updated() {
        assert!(matches!(
            map_write_err(DbErr::RecordNotUpdated),
            AppError::Conflict(_)
        ));
        assert!(matches!(
            map_write_err(DbErr::Custom("boom".to_string())),
            AppError::Database(_)
        ));
    }
}
