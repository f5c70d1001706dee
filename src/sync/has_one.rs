use super::{Synchronizer, expect_object, owner_id};
use crate::{Entity, RelationDef, Related, SyncConnection, SyncErr, document_id, sync_log};
use futures_util::future::{BoxFuture, FutureExt};
use serde_json::Value as JsonValue;
use tracing::{Instrument, trace_span};

impl Synchronizer {
    /// The target holds the foreign key. `{}` deletes the current target;
    /// otherwise the object is synchronized as the single target and any other
    /// row pointing at the parent is deleted.
    pub(crate) fn has_one<'a, C>(
        &'a self,
        conn: &'a C,
        parent: &'a mut Entity,
        relation: &'a RelationDef,
        value: &'a JsonValue,
    ) -> BoxFuture<'a, Result<(), SyncErr>>
    where
        C: SyncConnection + ?Sized,
    {
        let span = trace_span!("sync.has_one", relation = %relation.name);
        async move {
            let fk = relation.require_foreign_key()?;
            let desired = expect_object(relation, value)?;
            let target_def = self.schema.entity(&relation.target)?;
            let parent_id = owner_id(relation, parent)?;

            if desired.is_empty() {
                let deleted = conn.destroy_where(target_def, fk, &parent_id).await?;
                sync_log!(
                    self.options.sync_logging,
                    "cleared `{}#{}`, {} row(s) deleted",
                    relation.from,
                    relation.name,
                    deleted
                );
                parent.set_related(relation.name.as_str(), Related::One(None));
                return Ok(());
            }

            let candidate =
                Entity::forge(target_def, document_id(desired, &target_def.primary_key).cloned());
            let (target, mode) = self.resolve(conn, target_def, candidate, desired).await?;

            let existing = conn.fetch_related(parent, relation, target_def).await?;
            for stale in existing.iter().filter(|row| row.id() != target.id()) {
                sync_log!(
                    self.options.sync_logging,
                    "replace `{}#{}`, deleting {:?}",
                    relation.from,
                    relation.name,
                    stale.id()
                );
                conn.destroy(stale, target_def).await?;
            }

            let mut desired = desired.clone();
            desired.insert(fk.to_owned(), parent_id);
            let target = self.apply(conn, target_def, target, mode, &desired).await?;
            parent.set_related(relation.name.as_str(), Related::One(Some(Box::new(target))));
            Ok(())
        }
        .instrument(span)
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use crate::{Document, EntityDef, MemoryDatabase, RelationDef, Schema, SyncErr, Synchronizer};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn schema() -> Schema {
        Schema::new()
            .register(
                EntityDef::new("users")
                    .relation(RelationDef::has_one("profile", "profiles").foreign_key("user_id")),
            )
            .register(EntityDef::new("profiles"))
    }

    fn doc(value: serde_json::Value) -> Document {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn replace_and_clear() {
        let schema = schema();
        let db = MemoryDatabase::new(&schema);
        let sync = Synchronizer::new(schema);

        let user = sync
            .synchronize(&db, "users", &doc(json!({ "profile": { "bio": "a" } })))
            .await
            .unwrap();
        let user_id = user.id().cloned().unwrap();
        let first = user.related_one("profile").unwrap().id().cloned().unwrap();

        // a new object without identifier replaces the old row
        let user = sync
            .synchronize(
                &db,
                "users",
                &doc(json!({ "id": user_id, "profile": { "bio": "b" } })),
            )
            .await
            .unwrap();
        let rows = db.rows("profiles").await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("bio"), Some(&json!("b")));
        assert_eq!(rows[0].get("user_id"), Some(&user_id));
        assert!(rows[0].get("id") != Some(&first));
        assert!(user.related_one("profile").is_some());

        sync.synchronize(&db, "users", &doc(json!({ "id": user_id, "profile": {} })))
            .await
            .unwrap();
        assert!(db.rows("profiles").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn missing_foreign_key_is_a_config_error() {
        let schema = Schema::new()
            .register(EntityDef::new("users").relation(RelationDef::has_one("profile", "profiles")))
            .register(EntityDef::new("profiles"));
        let db = MemoryDatabase::new(&schema);
        let sync = Synchronizer::new(schema);

        let err = sync
            .synchronize(&db, "users", &doc(json!({ "profile": { "bio": "a" } })))
            .await
            .unwrap_err();
        assert!(matches!(err, SyncErr::Config(_)));
    }
}
