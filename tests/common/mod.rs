#![allow(dead_code)]

use sea_orm_graph_sync::{
    Document, Entity, MemoryDatabase, Synchronizer, SyncOptions, Write,
    tests_cfg::{doc, schema},
};
use serde_json::{Value as JsonValue, json};

pub fn setup_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// A memory store seeded with two posts:
///
/// + "First Post" by Ann, tagged `slug1`, `slug2`, with news and two comments
/// + "Second Post", tagged `slug3`
pub struct TestContext {
    pub db: MemoryDatabase,
    pub sync: Synchronizer,
    pub first_post: Entity,
    pub second_post: Entity,
}

impl TestContext {
    pub async fn new() -> Self {
        Self::with_options(SyncOptions::new()).await
    }

    pub async fn with_options(options: SyncOptions) -> Self {
        setup_tracing();
        let schema = schema();
        let db = MemoryDatabase::new(&schema);
        let sync = Synchronizer::with_options(schema, options);

        let first_post = sync
            .synchronize(
                &db,
                "posts",
                &doc(json!({
                    "title": "First Post",
                    "author": { "name": "Ann" },
                    "news": { "keywords": "future,world,sun-down" },
                    "comments": [{ "body": "nice" }, { "body": "agreed" }],
                    "tags": [{ "slug": "slug1" }, { "slug": "slug2" }],
                })),
            )
            .await
            .unwrap();
        let second_post = sync
            .synchronize(
                &db,
                "posts",
                &doc(json!({ "title": "Second Post", "tags": [{ "slug": "slug3" }] })),
            )
            .await
            .unwrap();
        db.drain_write_log().await;

        Self {
            db,
            sync,
            first_post,
            second_post,
        }
    }

    pub fn first_post_id(&self) -> JsonValue {
        self.first_post.id().cloned().unwrap()
    }

    pub fn tag_id(&self, slug: &str) -> JsonValue {
        let tags = self
            .first_post
            .related_many("tags")
            .into_iter()
            .chain(self.second_post.related_many("tags"))
            .flat_map(|tags| tags.iter());
        for tag in tags {
            if tag.get("slug") == Some(&json!(slug)) {
                return tag.id().cloned().unwrap();
            }
        }
        panic!("no tag {slug}")
    }

    /// The current state of the first post as a desired-state document
    pub fn first_post_document(&self) -> Document {
        let JsonValue::Object(map) = self.first_post.to_json() else {
            unreachable!()
        };
        map
    }

    pub async fn rows(&self, table: &str) -> Vec<Document> {
        self.db.rows(table).await.unwrap()
    }

    /// Pivot rows of a post, ordered by `sort_order`
    pub async fn links(&self, post_id: &JsonValue) -> Vec<Document> {
        let mut links = self
            .db
            .rows_where("posts_tags", [("post_id", post_id.clone())])
            .await
            .unwrap();
        links.sort_by_key(|link| link["sort_order"].as_i64());
        links
    }

    /// `(tag_id, sort_order)` of every link of a post, in order
    pub async fn tag_order(&self, post_id: &JsonValue) -> Vec<(JsonValue, JsonValue)> {
        self.links(post_id)
            .await
            .into_iter()
            .map(|link| (link["tag_id"].clone(), link["sort_order"].clone()))
            .collect()
    }

    pub async fn writes(&self) -> Vec<Write> {
        self.db.drain_write_log().await
    }
}
