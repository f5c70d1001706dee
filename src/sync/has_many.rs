use super::{Synchronizer, expect_rows, owner_id};
use crate::{Entity, RelationDef, Related, SyncConnection, SyncErr, document_id, sync_log};
use futures_util::future::{BoxFuture, FutureExt};
use serde_json::Value as JsonValue;
use tracing::{Instrument, trace_span};

impl Synchronizer {
    /// The targets hold the foreign key. Every row is synchronized and pointed
    /// at the parent unless it names another owner; current members missing
    /// from the list are deleted.
    pub(crate) fn has_many<'a, C>(
        &'a self,
        conn: &'a C,
        parent: &'a mut Entity,
        relation: &'a RelationDef,
        value: &'a JsonValue,
    ) -> BoxFuture<'a, Result<(), SyncErr>>
    where
        C: SyncConnection + ?Sized,
    {
        let span = trace_span!("sync.has_many", relation = %relation.name);
        async move {
            let fk = relation.require_foreign_key()?;
            let rows = expect_rows(relation, value)?;
            let target_def = self.schema.entity(&relation.target)?;
            let parent_id = owner_id(relation, parent)?;

            let rows: Vec<_> = rows
                .into_iter()
                .map(|mut row| {
                    if document_id(&row, fk).is_none() {
                        row.insert(fk.to_owned(), parent_id.clone());
                    }
                    row
                })
                .collect();

            let existing = conn.fetch_related(parent, relation, target_def).await?;
            let targets = self
                .reconcile_collection(conn, target_def, &existing, &rows)
                .await?;

            for stale in existing.iter() {
                if stale.id().is_some_and(|id| targets.contains_id(id)) {
                    continue;
                }
                sync_log!(
                    self.options.sync_logging,
                    "remove {:?} from `{}#{}`",
                    stale.id(),
                    relation.from,
                    relation.name
                );
                conn.destroy(stale, target_def).await?;
            }

            if let Some(hook) = &self.options.after_has_many {
                hook(&existing, &targets)?;
            }
            parent.set_related(relation.name.as_str(), Related::Many(targets));
            Ok(())
        }
        .instrument(span)
        .boxed()
    }
}
