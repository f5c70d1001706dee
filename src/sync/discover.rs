use crate::{Document, Schema};
use serde_json::Value as JsonValue;

fn join(prefix: &[&str], key: &str) -> String {
    let mut path = prefix.join(".");
    if !path.is_empty() {
        path.push('.');
    }
    path.push_str(key);
    path
}

fn nested(value: &JsonValue) -> Option<Option<&Document>> {
    match value {
        JsonValue::Array(items) => Some(items.first().and_then(JsonValue::as_object)),
        JsonValue::Object(map) => Some(Some(map)),
        _ => None,
    }
}

/// Dotted paths of every object or array valued key of a desired-state node
///
/// This is the shape-only variant: JSON columns are reported too, since no
/// schema is consulted. The synchronizer loads relations through
/// [`discover_relations`] instead.
///
/// Arrays are assumed to hold rows of one shape, so only the first element is
/// inspected. Pure; the order of the result carries no meaning.
pub fn discover(node: &Document) -> Vec<String> {
    fn walk(node: &Document, prefix: &mut Vec<String>, paths: &mut Vec<String>) {
        for (key, value) in node.iter() {
            let Some(child) = nested(value) else {
                continue;
            };
            let segments: Vec<&str> = prefix.iter().map(String::as_str).collect();
            paths.push(join(&segments, key));
            if let Some(child) = child {
                prefix.push(key.clone());
                walk(child, prefix, paths);
                prefix.pop();
            }
        }
    }

    let mut paths = Vec::new();
    walk(node, &mut Vec::new(), &mut paths);
    paths
}

/// Like [`discover`], but keeps only keys declared as relations of `kind`,
/// following each relation to its target kind. Used to build eager-load paths
/// without mistaking JSON columns for relations.
pub fn discover_relations(schema: &Schema, kind: &str, node: &Document) -> Vec<String> {
    fn walk(
        schema: &Schema,
        kind: &str,
        node: &Document,
        prefix: &mut Vec<String>,
        paths: &mut Vec<String>,
    ) {
        for (key, value) in node.iter() {
            let Some(relation) = schema.describe_relation(kind, key) else {
                continue;
            };
            let Some(child) = nested(value) else {
                continue;
            };
            let segments: Vec<&str> = prefix.iter().map(String::as_str).collect();
            paths.push(join(&segments, key));
            if let Some(child) = child {
                prefix.push(key.clone());
                walk(schema, &relation.target, child, prefix, paths);
                prefix.pop();
            }
        }
    }

    let mut paths = Vec::new();
    walk(schema, kind, node, &mut Vec::new(), &mut paths);
    paths
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{EntityDef, PivotDef, RelationDef};
    use serde_json::json;

    fn doc(value: JsonValue) -> Document {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn discover_follows_the_document() {
        let node = doc(json!({
            "title": "a",
            "news": { "keywords": "x", "author": { "name": "b" } },
            "tags": [{ "slug": "a", "owner": { "name": "c" } }, { "slug": "b" }],
            "empty": [],
            "numbers": [1, 2],
        }));

        let mut paths = discover(&node);
        paths.sort();
        assert_eq!(
            paths,
            vec!["empty", "news", "news.author", "numbers", "tags", "tags.owner"]
        );
        assert!(discover(&doc(json!({ "title": "a" }))).is_empty());
    }

    #[test]
    fn discover_relations_skips_json_columns() {
        let schema = crate::Schema::new()
            .register(
                EntityDef::new("posts")
                    .relation(RelationDef::has_one("news", "news").foreign_key("post_id"))
                    .relation(
                        RelationDef::belongs_to_many("tags", "tags")
                            .via(PivotDef::new("posts_tags", "post_id", "tag_id")),
                    ),
            )
            .register(EntityDef::new("news"))
            .register(EntityDef::new("tags"));

        let node = doc(json!({
            "meta": { "seo": true },
            "news": { "keywords": "x", "extra": { "a": 1 } },
            "tags": [{ "slug": "a" }],
        }));

        let mut paths = discover_relations(&schema, "posts", &node);
        paths.sort();
        assert_eq!(paths, vec!["news", "tags"]);
    }
}
