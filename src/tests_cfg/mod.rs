//! Configurations for test cases and examples. Not intended for actual use.

pub mod comment;
pub mod news;
pub mod post;
pub mod profile;
pub mod tag;
pub mod user;

use crate::{Document, Schema};
use serde_json::Value as JsonValue;

/// Blog schema: posts with an author, a news item, comments and ordered tags
pub fn schema() -> Schema {
    Schema::new()
        .register(post::def())
        .register(user::def())
        .register(profile::def())
        .register(news::def())
        .register(comment::def())
        .register(tag::def())
}

/// Unwrap a `json!` object literal into a document
pub fn doc(value: JsonValue) -> Document {
    match value {
        JsonValue::Object(map) => map,
        other => panic!("not an object: {other}"),
    }
}
