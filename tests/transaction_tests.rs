pub mod common;

pub use common::TestContext;
use pretty_assertions::assert_eq;
use sea_orm_graph_sync::{
    SyncConnection, SyncErr, TransactionSession, TransactionTrait, Write, tests_cfg::doc,
};
use serde_json::json;

#[tokio::test]
async fn commit_publishes_every_write() {
    let ctx = TestContext::new().await;
    let sync = ctx.sync.clone();
    let post_id = ctx.first_post_id();
    let desired = doc(json!({
        "id": post_id,
        "title": "committed",
        "comments": [],
        "tags": [{ "slug": "slug5" }],
    }));

    let post = ctx
        .db
        .transaction(|txn| {
            Box::pin(async move { sync.synchronize(txn, "posts", &desired).await })
        })
        .await
        .unwrap();

    assert_eq!(post.get("title"), Some(&json!("committed")));
    assert!(ctx.rows("comments").await.is_empty());
    assert_eq!(ctx.links(&post_id).await.len(), 1);
    assert!(!ctx.writes().await.is_empty());
}

#[tokio::test]
async fn failure_late_in_the_graph_rolls_back_everything() {
    let ctx = TestContext::new().await;
    let sync = ctx.sync.clone();
    let post_id = ctx.first_post_id();
    // the title and comments are written before the tags collide
    let desired = doc(json!({
        "id": post_id,
        "title": "never",
        "comments": [],
        "tags": [{ "slug": "slug3" }],
    }));

    let err = ctx
        .db
        .transaction(|txn| {
            Box::pin(async move { sync.synchronize(txn, "posts", &desired).await })
        })
        .await
        .unwrap_err();

    assert!(err.is_unique_violation());
    let stored = ctx.db.rows_where("posts", [("id", post_id.clone())]).await.unwrap();
    assert_eq!(stored[0]["title"], json!("First Post"));
    assert_eq!(ctx.rows("comments").await.len(), 2);
    assert_eq!(ctx.links(&post_id).await.len(), 2);
    assert_eq!(ctx.writes().await, Vec::<Write>::new());
}

#[tokio::test]
async fn without_a_transaction_earlier_writes_stay() {
    let ctx = TestContext::new().await;
    let post_id = ctx.first_post_id();

    let err = ctx
        .sync
        .synchronize(
            &ctx.db,
            "posts",
            &doc(json!({ "id": post_id, "title": "partial", "tags": [{ "slug": "slug3" }] })),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, SyncErr::UniqueConstraintViolation(_)));
    let stored = ctx.db.rows_where("posts", [("id", post_id)]).await.unwrap();
    assert_eq!(stored[0]["title"], json!("partial"));
}

#[tokio::test]
async fn explicit_begin_and_rollback() {
    let ctx = TestContext::new().await;

    let tags = ctx.sync.schema().entity("tags").unwrap();

    let txn = ctx.db.begin().await.unwrap();
    let tag = ctx
        .sync
        .synchronize(&txn, "tags", &doc(json!({ "slug": "temp" })))
        .await
        .unwrap();
    let id = tag.id().cloned().unwrap();
    assert!(txn.find_row(tags, &id).await.unwrap().is_some());
    txn.rollback().await.unwrap();

    assert!(ctx.db.find_row(tags, &id).await.unwrap().is_none());

    assert!(ctx.db.rows_where("tags", [("slug", json!("temp"))]).await.unwrap().is_empty());
}
