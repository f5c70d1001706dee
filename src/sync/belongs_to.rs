use super::{Synchronizer, expect_object, target_id};
use crate::{
    Entity, RelationDef, Related, SaveMode, SyncConnection, SyncErr, document_id, sync_log,
};
use futures_util::future::{BoxFuture, FutureExt};
use serde_json::Value as JsonValue;
use tracing::{Instrument, trace_span};

impl Synchronizer {
    /// The parent holds the foreign key. `null` unlinks; an object is
    /// synchronized as the target and linked. Without an identifier in the
    /// object, the currently linked target is updated in place.
    pub(crate) fn belongs_to<'a, C>(
        &'a self,
        conn: &'a C,
        parent: &'a mut Entity,
        relation: &'a RelationDef,
        value: &'a JsonValue,
    ) -> BoxFuture<'a, Result<(), SyncErr>>
    where
        C: SyncConnection + ?Sized,
    {
        let span = trace_span!("sync.belongs_to", relation = %relation.name);
        async move {
            let fk = relation.require_foreign_key()?;
            let parent_def = self.schema.entity(&relation.from)?;

            if value.is_null() {
                if parent.get(fk).is_some_and(|id| !id.is_null()) {
                    sync_log!(
                        self.options.sync_logging,
                        "unlink `{}#{}`",
                        relation.from,
                        relation.name
                    );
                    parent.set(fk, JsonValue::Null);
                }
                parent.set_related(relation.name.as_str(), Related::One(None));
                let mode = SaveMode::for_entity(parent);
                return self.persist(conn, parent_def, parent, mode).await;
            }

            let desired = expect_object(relation, value)?;
            let target_def = self.schema.entity(&relation.target)?;
            let candidate = match document_id(desired, &target_def.primary_key) {
                Some(id) => Entity::forge(target_def, Some(id.clone())),
                None => parent
                    .related_one(&relation.name)
                    .cloned()
                    .unwrap_or_else(|| Entity::new(target_def)),
            };

            let (target, mode) = self.resolve(conn, target_def, candidate, desired).await?;
            let target = self.apply(conn, target_def, target, mode, desired).await?;
            let id = target_id(relation, &target)?;

            if parent.get(fk) != Some(&id) {
                parent.set(fk, id);
            }
            parent.set_related(relation.name.as_str(), Related::One(Some(Box::new(target))));
            let mode = SaveMode::for_entity(parent);
            self.persist(conn, parent_def, parent, mode).await
        }
        .instrument(span)
        .boxed()
    }
}
