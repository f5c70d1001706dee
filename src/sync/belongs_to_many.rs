use super::{Synchronizer, expect_rows, owner_id, target_id};
use crate::{Document, Entity, RelationDef, Related, SyncConnection, SyncErr, sync_log};
use futures_util::future::{BoxFuture, FutureExt};
use serde_json::Value as JsonValue;
use tracing::{Instrument, trace, trace_span};

impl Synchronizer {
    /// Links live in a pivot table. Every row is synchronized, missing links
    /// are attached, the order column follows list position and links to
    /// targets no longer listed are removed. Targets themselves are never
    /// deleted.
    pub(crate) fn belongs_to_many<'a, C>(
        &'a self,
        conn: &'a C,
        parent: &'a mut Entity,
        relation: &'a RelationDef,
        value: &'a JsonValue,
    ) -> BoxFuture<'a, Result<(), SyncErr>>
    where
        C: SyncConnection + ?Sized,
    {
        let span = trace_span!("sync.belongs_to_many", relation = %relation.name);
        async move {
            let pivot = relation.require_pivot()?;
            let rows = expect_rows(relation, value)?;
            let target_def = self.schema.entity(&relation.target)?;
            let parent_id = owner_id(relation, parent)?;

            let existing = conn.fetch_related(parent, relation, target_def).await?;
            let mut targets = self
                .reconcile_collection(conn, target_def, &existing, &rows)
                .await?;

            // first position of each distinct target
            let mut order: Vec<(JsonValue, usize)> = Vec::new();
            for (position, target) in targets.iter().enumerate() {
                let id = target_id(relation, target)?;
                if !order.iter().any(|(seen, _)| *seen == id) {
                    order.push((id, position));
                }
            }

            let mut attached: Vec<(JsonValue, Document)> = Vec::new();
            for (id, position) in order.iter() {
                if existing.contains_id(id) {
                    continue;
                }
                let Some(target) = targets.find_by_id(id) else {
                    continue;
                };
                let mut link = Document::new();
                if let Some(column) = &pivot.id_column {
                    if let Some(link_id) = self.options.pivot_id.generate() {
                        link.insert(column.clone(), link_id);
                    }
                }
                if let Some(column) = &pivot.order_column {
                    link.insert(column.clone(), JsonValue::from(*position));
                }
                if let Some(hook) = &self.options.before_attach {
                    hook(&*parent, target, &mut link)?;
                }
                sync_log!(
                    self.options.sync_logging,
                    "attach {} to `{}#{}`",
                    id,
                    relation.from,
                    relation.name
                );
                conn.attach(parent, relation, target, link.clone()).await?;
                attached.push((id.clone(), link));
            }

            if let Some(column) = &pivot.order_column {
                for (id, position) in order.iter() {
                    if attached.iter().any(|(linked, _)| linked == id) {
                        continue;
                    }
                    let position = JsonValue::from(*position);
                    let current = existing.find_by_id(id).and_then(|m| m.pivot_value(column));
                    if current == Some(&position) {
                        trace!("{} keeps {} {}", id, column, position);
                        continue;
                    }
                    let Some(target) = targets.find_by_id(id) else {
                        continue;
                    };
                    let mut values = Document::new();
                    values.insert(column.clone(), position);
                    conn.update_pivot(parent, relation, target, values).await?;
                }
            }

            for stale in existing.iter() {
                if stale.id().is_some_and(|id| targets.contains_id(id)) {
                    continue;
                }
                sync_log!(
                    self.options.sync_logging,
                    "detach {:?} from `{}#{}`",
                    stale.id(),
                    relation.from,
                    relation.name
                );
                conn.detach(parent, relation, stale).await?;
            }

            if let Some(hook) = &self.options.after_belongs_to_many {
                hook(&existing, &targets)?;
            }

            for target in targets.iter_mut() {
                let Some(id) = target.id().cloned() else {
                    continue;
                };
                let link = attached
                    .iter()
                    .find(|(linked, _)| *linked == id)
                    .map(|(_, link)| link);
                if let Some(link) = link {
                    for (column, value) in link.iter() {
                        target.set_pivot(column.as_str(), value.clone());
                    }
                }
                if let (Some(column), Some((_, position))) = (
                    &pivot.order_column,
                    order.iter().find(|(seen, _)| *seen == id),
                ) {
                    // a new link keeps what was written, hooks included
                    if !link.is_some_and(|link| link.contains_key(column)) {
                        target.set_pivot(column.as_str(), JsonValue::from(*position));
                    }
                }
                target.set_pivot(pivot.foreign_key.as_str(), parent_id.clone());
                target.set_pivot(pivot.related_key.as_str(), id);
            }
            parent.set_related(relation.name.as_str(), Related::Many(targets));
            Ok(())
        }
        .instrument(span)
        .boxed()
    }
}
