//! Vote ledger against a real database.
//!
//! These tests require a running `PostgreSQL` instance.
//! Run with: `cargo test -p readit-core --test ledger_postgres -- --ignored`

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;

use chrono::Utc;
use readit_core::{
    PostService, RepositoryTargetResolver, TargetRef, VoteError, VoteLedger,
};
use readit_db::entities::{comment, post, sub, user};
use readit_db::repositories::{
    CommentRepository, PostRepository, SubRepository, VoteRepository,
};
use readit_db::test_utils::TestDatabase;
use sea_orm::{ActiveModelTrait, DatabaseConnection, Set};

async fn seed(db: &DatabaseConnection) {
    let now = Utc::now();
    for name in ["alice", "bob"] {
        user::ActiveModel {
            id: Set(format!("u-{name}")),
            username: Set(name.to_string()),
            email: Set(format!("{name}@example.com")),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
        }
        .insert(db)
        .await
        .unwrap();
    }
    sub::ActiveModel {
        id: Set("s1".to_string()),
        name: Set("rust".to_string()),
        title: Set("Rust".to_string()),
        description: Set(None),
        username: Set("alice".to_string()),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
    }
    .insert(db)
    .await
    .unwrap();
    post::ActiveModel {
        id: Set("p1".to_string()),
        identifier: Set("abcd1234".to_string()),
        slug: Set("hello".to_string()),
        title: Set("Hello".to_string()),
        body: Set(None),
        sub_name: Set("rust".to_string()),
        username: Set("alice".to_string()),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
    }
    .insert(db)
    .await
    .unwrap();
    comment::ActiveModel {
        id: Set("c1".to_string()),
        identifier: Set("cmt00001".to_string()),
        body: Set("first".to_string()),
        username: Set("bob".to_string()),
        post_id: Set("p1".to_string()),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
    }
    .insert(db)
    .await
    .unwrap();
}

fn wire(db: &Arc<DatabaseConnection>) -> (VoteLedger, PostService) {
    let resolver = RepositoryTargetResolver::new(
        PostRepository::new(Arc::clone(db)),
        CommentRepository::new(Arc::clone(db)),
    );
    let ledger = VoteLedger::new(
        Arc::new(VoteRepository::new(Arc::clone(db))),
        Arc::new(resolver),
    );
    let posts = PostService::new(
        PostRepository::new(Arc::clone(db)),
        CommentRepository::new(Arc::clone(db)),
        SubRepository::new(Arc::clone(db)),
        VoteRepository::new(Arc::clone(db)),
    );
    (ledger, posts)
}

#[tokio::test]
#[ignore = "requires running PostgreSQL instance"]
async fn test_cast_sequence_on_post_and_comment() {
    let test_db = TestDatabase::create_unique().await.expect("Failed to create");
    seed(test_db.connection()).await;
    let db = Arc::new(test_db.connection().clone());
    let (ledger, posts) = wire(&db);
    let post_ref = TargetRef::post("abcd1234", "hello");
    let comment_ref = TargetRef::comment("abcd1234", "hello", "cmt00001");

    ledger.cast_vote("alice", &post_ref, 1).await.unwrap();
    ledger.cast_vote("alice", &post_ref, 1).await.unwrap();
    ledger.cast_vote("bob", &post_ref, -1).await.unwrap();
    ledger.cast_vote("bob", &post_ref, 1).await.unwrap();
    ledger.cast_vote("alice", &comment_ref, -1).await.unwrap();

    let projected = posts.get_post("abcd1234", "hello", Some("bob")).await.unwrap();
    assert_eq!(projected.vote_score, 2);
    assert_eq!(projected.user_vote, Some(1));
    let comments = projected.comments.unwrap();
    assert_eq!(comments[0].vote_score, -1);
    assert_eq!(comments[0].user_vote, Some(0));

    ledger.cast_vote("alice", &comment_ref, 0).await.unwrap();
    assert_eq!(
        ledger.cast_vote("alice", &comment_ref, 0).await,
        Err(VoteError::NothingToUndo)
    );

    drop(posts);
    drop(ledger);
    drop(db);
    test_db.drop_database().await.unwrap();
}

#[tokio::test]
#[ignore = "requires running PostgreSQL instance"]
async fn test_concurrent_identical_casts_store_one_vote() {
    let test_db = TestDatabase::create_unique().await.expect("Failed to create");
    seed(test_db.connection()).await;
    let db = Arc::new(test_db.connection().clone());
    let (ledger, posts) = wire(&db);

    let casts = (0..4).map(|_| {
        let ledger = ledger.clone();
        tokio::spawn(async move {
            ledger
                .cast_vote("alice", &TargetRef::post("abcd1234", "hello"), 1)
                .await
        })
    });
    for result in futures::future::join_all(casts).await {
        assert_eq!(result.unwrap(), Ok(()));
    }

    let projected = posts.get_post("abcd1234", "hello", Some("alice")).await.unwrap();
    assert_eq!(projected.vote_score, 1);
    assert_eq!(projected.user_vote, Some(1));

    drop(posts);
    drop(ledger);
    drop(db);
    test_db.drop_database().await.unwrap();
}
