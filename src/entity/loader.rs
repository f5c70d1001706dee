use crate::{Entity, Related, Schema, SyncConnection, SyncErr};
use futures_util::future::{BoxFuture, FutureExt};
use std::collections::BTreeMap;
use tracing::trace;

/// Group dotted paths by their first segment: `["tags", "tags.owner", "news"]`
/// becomes `{"news": [], "tags": ["owner"]}`
fn split_paths(paths: &[String]) -> BTreeMap<&str, Vec<String>> {
    let mut tree: BTreeMap<&str, Vec<String>> = BTreeMap::new();
    for path in paths {
        match path.split_once('.') {
            Some((head, rest)) => tree.entry(head).or_default().push(rest.to_owned()),
            None => {
                tree.entry(path.as_str()).or_default();
            }
        }
    }
    tree
}

/// Load the relations named by dotted paths into the relation cache of
/// `entity`, recursively. Paths that name no declared relation are skipped.
pub(crate) fn load_related<'a, C>(
    conn: &'a C,
    schema: &'a Schema,
    entity: &'a mut Entity,
    paths: &'a [String],
) -> BoxFuture<'a, Result<(), SyncErr>>
where
    C: SyncConnection + ?Sized,
{
    async move {
        for (head, rest) in split_paths(paths) {
            let Some(relation) = schema.describe_relation(entity.kind(), head) else {
                trace!("`{}#{}` is not a relation, not loading", entity.kind(), head);
                continue;
            };
            let target = schema.entity(&relation.target)?;
            let mut collection = conn.fetch_related(entity, relation, target).await?;
            if !rest.is_empty() {
                for model in collection.iter_mut() {
                    load_related(conn, schema, model, &rest).await?;
                }
            }
            let related = if relation.kind.is_to_many() {
                Related::Many(collection)
            } else {
                Related::One(collection.into_iter().next().map(Box::new))
            };
            entity.set_related(head, related);
        }
        Ok(())
    }
    .boxed()
}
