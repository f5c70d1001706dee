pub mod common;

pub use common::TestContext;
use pretty_assertions::assert_eq;
use sea_orm_graph_sync::tests_cfg::doc;
use serde_json::json;

#[tokio::test]
async fn link_existing_author() {
    let ctx = TestContext::new().await;
    let post_id = ctx.second_post.id().cloned().unwrap();
    let ann = ctx.first_post.related_one("author").unwrap().id().cloned().unwrap();

    let post = ctx
        .sync
        .synchronize(
            &ctx.db,
            "posts",
            &doc(json!({ "id": post_id, "author": { "id": ann } })),
        )
        .await
        .unwrap();

    assert_eq!(post.get("author_id"), Some(&ann));
    let stored = ctx.db.rows_where("posts", [("id", post_id)]).await.unwrap();
    assert_eq!(stored[0]["author_id"], ann);
    assert_eq!(ctx.rows("users").await.len(), 1);
}

#[tokio::test]
async fn switch_to_new_author() {
    let ctx = TestContext::new().await;
    let post_id = ctx.first_post_id();
    let ann = ctx.first_post.related_one("author").unwrap().id().cloned().unwrap();

    let post = ctx
        .sync
        .synchronize(
            &ctx.db,
            "posts",
            &doc(json!({ "id": post_id, "author": { "id": 42, "name": "Dan" } })),
        )
        .await
        .unwrap();

    assert_eq!(post.get("author_id"), Some(&json!(42)));
    let users = ctx.rows("users").await;
    assert_eq!(users.len(), 2);
    assert!(users.iter().any(|user| user["id"] == ann));
}

#[tokio::test]
async fn rename_linked_author_without_identifier() {
    let ctx = TestContext::new().await;
    let post_id = ctx.first_post_id();
    let ann = ctx.first_post.related_one("author").unwrap().id().cloned().unwrap();

    ctx.sync
        .synchronize(
            &ctx.db,
            "posts",
            &doc(json!({ "id": post_id, "author": { "name": "Anne" } })),
        )
        .await
        .unwrap();

    let users = ctx.rows("users").await;
    assert_eq!(users.len(), 1);
    assert_eq!(users[0]["id"], ann);
    assert_eq!(users[0]["name"], json!("Anne"));
}

#[tokio::test]
async fn nested_has_one_on_the_author() {
    let ctx = TestContext::new().await;
    let post_id = ctx.first_post_id();

    let post = ctx
        .sync
        .synchronize(
            &ctx.db,
            "posts",
            &doc(json!({
                "id": post_id,
                "author": { "name": "Ann", "profile": { "bio": "writer" } },
            })),
        )
        .await
        .unwrap();

    let author = post.related_one("author").unwrap();
    let profile = author.related_one("profile").unwrap();
    assert_eq!(profile.get("user_id"), author.id());
    assert_eq!(ctx.rows("profiles").await.len(), 1);
}
