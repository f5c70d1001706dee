use super::Synchronizer;
use crate::{Document, Entity, EntityCollection, EntityDef, SyncConnection, SyncErr, document_id};
use futures_util::future::{BoxFuture, FutureExt};

impl Synchronizer {
    /// Synchronize each row in order, preferring an already loaded member of
    /// `existing` with the same identifier as the starting point. The result
    /// holds one entity per row, in row order.
    pub(crate) fn reconcile_collection<'a, C>(
        &'a self,
        conn: &'a C,
        def: &'a EntityDef,
        existing: &'a EntityCollection,
        rows: &'a [Document],
    ) -> BoxFuture<'a, Result<EntityCollection, SyncErr>>
    where
        C: SyncConnection + ?Sized,
    {
        async move {
            let mut targets = EntityCollection::new(def.name.as_str());
            for desired in rows {
                let candidate = match document_id(desired, &def.primary_key) {
                    Some(id) => existing
                        .find_by_id(id)
                        .cloned()
                        .unwrap_or_else(|| Entity::forge(def, Some(id.clone()))),
                    None => Entity::new(def),
                };
                let (entity, mode) = self.resolve(conn, def, candidate, desired).await?;
                targets.push(self.apply(conn, def, entity, mode, desired).await?);
            }
            Ok(targets)
        }
        .boxed()
    }
}
