#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(
    missing_debug_implementations,
    clippy::print_stderr,
    clippy::print_stdout
)]

//! # SeaORM Graph Sync
//!
//! Reconcile a relational store with a nested, JSON-like description of how an
//! entity and its related entities should look.
//!
//! Given a desired-state document such as
//!
//! ```json
//! {
//!   "id": 1,
//!   "title": "Hello",
//!   "author": { "id": 3 },
//!   "tags": [{ "id": 2 }, { "slug": "new" }]
//! }
//! ```
//!
//! the [`Synchronizer`] inserts, updates, deletes, attaches and detaches rows
//! until the store matches it:
//!
//! + belongs-to: the parent's foreign key is pointed at the target
//! + has-one: the single target is kept, any other row is deleted
//! + has-many: listed rows are kept, unlisted rows are deleted
//! + belongs-to-many: pivot rows are attached, reordered and detached
//!
//! Absent keys and `null` relation values leave a relation untouched.
//!
//! ## Schema
//!
//! Relations are declared up front on a [`Schema`]; a key of a document is a
//! relation only when its entity declares it.
//!
//! ```
//! use sea_orm_graph_sync::{EntityDef, PivotDef, RelationDef, Schema};
//!
//! let schema = Schema::new()
//!     .register(
//!         EntityDef::new("posts")
//!             .relation(RelationDef::belongs_to("author", "users").foreign_key("author_id"))
//!             .relation(
//!                 RelationDef::belongs_to_many("tags", "tags")
//!                     .via(PivotDef::new("posts_tags", "post_id", "tag_id").order_by("sort_order")),
//!             ),
//!     )
//!     .register(EntityDef::new("users"))
//!     .register(EntityDef::new("tags").unique(["slug"]));
//!
//! assert!(schema.describe_relation("posts", "tags").is_some());
//! assert!(schema.describe_relation("posts", "title").is_none());
//! ```
//!
//! ## Synchronize
//!
//! The synchronizer runs against anything implementing [`SyncConnection`]:
//! the bundled [`MemoryDatabase`], or a SeaORM connection wrapped in
//! `SeaOrmConnection` with the `with-sea-orm` feature. Wrap a call in
//! [`TransactionTrait::transaction`] to make it all-or-nothing.
//!
//! ```
//! # use sea_orm_graph_sync::*;
//! # use serde_json::json;
//! # async fn function() -> Result<(), SyncErr> {
//! # let schema = Schema::new()
//! #     .register(EntityDef::new("posts").relation(
//! #         RelationDef::has_many("comments", "comments").foreign_key("post_id"),
//! #     ))
//! #     .register(EntityDef::new("comments"));
//! let db = MemoryDatabase::new(&schema);
//! let sync = Synchronizer::new(schema);
//!
//! let desired = json!({
//!     "title": "Hello",
//!     "comments": [{ "body": "first" }, { "body": "second" }],
//! });
//! let post = sync
//!     .synchronize(&db, "posts", desired.as_object().unwrap())
//!     .await?;
//!
//! assert_eq!(post.related_many("comments").map(|c| c.len()), Some(2));
//! # Ok(())
//! # }
//! ```
mod database;
#[cfg(feature = "with-sea-orm")]
mod driver;
mod entity;
mod error;
mod sync;
#[doc(hidden)]
#[cfg(feature = "tests-cfg")]
pub mod tests_cfg;
mod util;

pub use database::*;
#[cfg(feature = "with-sea-orm")]
pub use driver::*;
pub use entity::*;
pub use error::*;
pub use sync::*;

#[cfg(feature = "with-sea-orm")]
pub use sea_orm;
