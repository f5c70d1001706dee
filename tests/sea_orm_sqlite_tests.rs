#![cfg(feature = "sqlx-sqlite")]

use pretty_assertions::assert_eq;
use sea_orm_graph_sync::{
    SeaOrmConnection, SyncConnection, SyncErr, Synchronizer, TransactionTrait,
    sea_orm::{ConnectionTrait, Database, DatabaseConnection, Statement},
    tests_cfg::{doc, schema},
};
use serde_json::json;

const CREATE_TABLES: &[&str] = &[
    "CREATE TABLE users (id INTEGER PRIMARY KEY AUTOINCREMENT, name TEXT)",
    "CREATE TABLE profiles (id INTEGER PRIMARY KEY AUTOINCREMENT, user_id INTEGER UNIQUE, bio TEXT)",
    "CREATE TABLE posts (id INTEGER PRIMARY KEY AUTOINCREMENT, title TEXT, author_id INTEGER)",
    "CREATE TABLE news (id INTEGER PRIMARY KEY AUTOINCREMENT, post_id INTEGER, keywords TEXT)",
    "CREATE TABLE comments (id INTEGER PRIMARY KEY AUTOINCREMENT, post_id INTEGER, user_id INTEGER, body TEXT)",
    "CREATE TABLE tags (id INTEGER PRIMARY KEY AUTOINCREMENT, slug TEXT UNIQUE)",
    "CREATE TABLE posts_tags (id INTEGER PRIMARY KEY AUTOINCREMENT, post_id INTEGER, tag_id INTEGER, sort_order INTEGER)",
];

async fn setup() -> SeaOrmConnection<DatabaseConnection> {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    for sql in CREATE_TABLES {
        db.execute_unprepared(sql).await.unwrap();
    }
    SeaOrmConnection::new(db)
}

async fn count(db: &SeaOrmConnection<DatabaseConnection>, sql: &str) -> i64 {
    let row = db
        .inner()
        .query_one(Statement::from_string(
            db.inner().get_database_backend(),
            sql.to_owned(),
        ))
        .await
        .unwrap()
        .unwrap();
    row.try_get_by_index::<i64>(0).unwrap()
}

#[tokio::test]
async fn synchronize_against_sqlite() {
    let db = setup().await;
    let sync = Synchronizer::new(schema());

    let post = sync
        .synchronize(
            &db,
            "posts",
            &doc(json!({
                "title": "First Post",
                "author": { "name": "Ann" },
                "news": { "keywords": "future,world,sun-down" },
                "comments": [{ "body": "nice" }],
                "tags": [{ "slug": "slug1" }, { "slug": "slug2" }],
            })),
        )
        .await
        .unwrap();
    let post_id = post.id().cloned().unwrap();
    let tags = post.related_many("tags").unwrap();
    let slug1 = tags[0].id().cloned().unwrap();
    let slug2 = tags[1].id().cloned().unwrap();

    assert_eq!(post.get("author_id"), post.related_one("author").unwrap().id());
    assert_eq!(count(&db, "SELECT COUNT(*) FROM posts_tags").await, 2);

    // reorder and drop a tag, clear the news
    let post = sync
        .synchronize(
            &db,
            "posts",
            &doc(json!({
                "id": post_id,
                "news": {},
                "tags": [{ "id": slug2 }],
            })),
        )
        .await
        .unwrap();

    assert_eq!(count(&db, "SELECT COUNT(*) FROM news").await, 0);
    assert_eq!(count(&db, "SELECT COUNT(*) FROM tags").await, 2);
    assert_eq!(
        count(&db, "SELECT sort_order FROM posts_tags").await,
        0
    );
    let tags = post.related_many("tags").unwrap();
    assert_eq!(tags.len(), 1);
    assert_eq!(tags[0].id(), Some(&slug2));

    let def = sync.schema().entity("tags").unwrap();
    assert!(db.find_row(def, &slug1).await.unwrap().is_some());
}

#[tokio::test]
async fn unique_violation_rolls_back() {
    let db = setup().await;
    let sync = Synchronizer::new(schema());
    let desired = doc(json!({
        "title": "Dup",
        "tags": [{ "slug": "same" }, { "slug": "same" }],
    }));

    let err = db
        .transaction(|txn| {
            let sync = sync.clone();
            Box::pin(async move { sync.synchronize(txn, "posts", &desired).await })
        })
        .await
        .unwrap_err();

    assert!(err.is_unique_violation());
    assert_eq!(count(&db, "SELECT COUNT(*) FROM posts").await, 0);
    assert_eq!(count(&db, "SELECT COUNT(*) FROM tags").await, 0);
}

#[tokio::test]
async fn update_pivot_without_a_link_is_not_updated() {
    let db = setup().await;
    let sync = Synchronizer::new(schema());

    let post = sync
        .synchronize(&db, "posts", &doc(json!({ "title": "a", "tags": [{ "slug": "x" }] })))
        .await
        .unwrap();
    let tag = sync
        .synchronize(&db, "tags", &doc(json!({ "slug": "unlinked" })))
        .await
        .unwrap();
    let relation = sync.schema().describe_relation("posts", "tags").unwrap();

    let err = db
        .update_pivot(&post, relation, &tag, doc(json!({ "sort_order": 3 })))
        .await
        .unwrap_err();
    assert!(matches!(err, SyncErr::RecordNotUpdated));

    let linked = &post.related_many("tags").unwrap()[0];
    db.update_pivot(&post, relation, linked, doc(json!({ "sort_order": 3 })))
        .await
        .unwrap();
    assert_eq!(count(&db, "SELECT sort_order FROM posts_tags").await, 3);
}
