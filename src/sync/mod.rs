mod belongs_to;
mod belongs_to_many;
mod classify;
mod collection;
mod discover;
mod has_many;
mod has_one;
mod options;

pub use classify::*;
pub use discover::*;
pub use options::*;

use crate::{
    Document, Entity, EntityDef, PIVOT_PREFIX, RelationDef, RelationKind, SaveMode, Schema,
    SyncConnection, SyncErr, document_id,
    error::{config_err, type_err},
    sync_log,
};
use futures_util::future::{BoxFuture, FutureExt};
use serde_json::Value as JsonValue;
use std::sync::Arc;
use tracing::{instrument, trace};

/// Reconciles a store with nested desired-state documents
///
/// For every entity the order is fixed: scalar attributes are applied, the
/// entity is saved if new or changed, then each relation key is handed to the
/// reconciler of its [`RelationKind`]. Writes are issued one at a time in
/// document order; the first error aborts the call and is returned as is.
///
/// The synchronizer never opens a transaction. Pass a transaction handle as
/// `conn` to make one call atomic; concurrent calls touching the same rows must
/// be serialized by the caller, since nothing here locks between the existence
/// check and the write that follows it.
#[derive(Clone, Debug)]
pub struct Synchronizer {
    schema: Arc<Schema>,
    options: SyncOptions,
}

impl Synchronizer {
    /// A synchronizer with default options
    pub fn new<S>(schema: S) -> Self
    where
        S: Into<Arc<Schema>>,
    {
        Self::with_options(schema, SyncOptions::new())
    }

    /// A synchronizer with the given options
    pub fn with_options<S>(schema: S, options: SyncOptions) -> Self
    where
        S: Into<Arc<Schema>>,
    {
        Self {
            schema: schema.into(),
            options,
        }
    }

    /// The registry relations are looked up in
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// The options every call runs with
    pub fn options(&self) -> &SyncOptions {
        &self.options
    }

    /// Bring the entity of `kind` described by `desired`, and every relation
    /// the document mentions, in line with the document.
    ///
    /// A document with an identifier updates that row if it exists and inserts
    /// it with that identifier otherwise; without an identifier a new row is
    /// inserted. Relation keys holding `null` or missing from the document are
    /// left untouched, while `[]` empties a to-many relation.
    #[instrument(level = "trace", skip_all, fields(kind = %kind))]
    pub async fn synchronize<C>(
        &self,
        conn: &C,
        kind: &str,
        desired: &Document,
    ) -> Result<Entity, SyncErr>
    where
        C: SyncConnection + ?Sized,
    {
        let def = self.schema.entity(kind)?;
        let candidate = Entity::forge(def, document_id(desired, &def.primary_key).cloned());
        let (entity, mode) = self.resolve(conn, def, candidate, desired).await?;
        self.apply(conn, def, entity, mode, desired).await
    }

    /// Reconcile only the relation keys of `relations` on a persisted entity.
    /// Scalar keys and `null` relation values are ignored.
    #[instrument(level = "trace", skip_all, fields(kind = %entity.kind()))]
    pub async fn update_relations<C>(
        &self,
        conn: &C,
        entity: &mut Entity,
        relations: &Document,
    ) -> Result<(), SyncErr>
    where
        C: SyncConnection + ?Sized,
    {
        let def = self.schema.entity(entity.kind())?;
        for (relation, value) in self.relations_of(def, relations) {
            self.dispatch(conn, entity, relation, value).await?;
        }
        Ok(())
    }

    /// Run the reconciler of a single relation. Unlike [`Self::synchronize`],
    /// a `null` value is passed through: for belongs-to it clears the foreign
    /// key, for other kinds it is a no-op.
    #[instrument(level = "trace", skip_all, fields(kind = %entity.kind(), relation = %key))]
    pub async fn reconcile_relation<C>(
        &self,
        conn: &C,
        entity: &mut Entity,
        key: &str,
        value: &JsonValue,
    ) -> Result<(), SyncErr>
    where
        C: SyncConnection + ?Sized,
    {
        let relation = self
            .schema
            .describe_relation(entity.kind(), key)
            .ok_or_else(|| {
                config_err(format!("`{}#{}` is not a declared relation", entity.kind(), key))
            })?;
        if value.is_null() && relation.kind != RelationKind::BelongsTo {
            trace!("`{}#{}` is null, untouched", relation.from, relation.name);
            return Ok(());
        }
        self.dispatch(conn, entity, relation, value).await
    }

    /// Relation keys of a document with non-null values, in document order
    fn relations_of<'a>(
        &'a self,
        def: &EntityDef,
        desired: &'a Document,
    ) -> Vec<(&'a RelationDef, &'a JsonValue)> {
        desired
            .iter()
            .filter_map(|(key, value)| match classify(&self.schema, &def.name, key, value) {
                Classification::Relation(relation) if !value.is_null() => Some((relation, value)),
                _ => None,
            })
            .collect()
    }

    /// Decide between insert and update for `candidate`.
    ///
    /// Without an identifier it is an insert. With one, the row is fetched
    /// together with the relations `desired` mentions; a miss is an insert
    /// that keeps the supplied identifier.
    pub(crate) async fn resolve<C>(
        &self,
        conn: &C,
        def: &EntityDef,
        candidate: Entity,
        desired: &Document,
    ) -> Result<(Entity, SaveMode), SyncErr>
    where
        C: SyncConnection + ?Sized,
    {
        let Some(id) = candidate.id().cloned() else {
            return Ok((candidate, SaveMode::Insert));
        };
        let paths = discover_relations(&self.schema, &def.name, desired);
        match conn.find_by_id(&self.schema, def, &id, &paths).await? {
            Some(mut found) => {
                if !candidate.pivot().is_empty() {
                    found.replace_pivot(candidate.pivot().clone());
                }
                Ok((found, SaveMode::Update))
            }
            None => {
                trace!("`{}` {} not found, inserting", def.name, id);
                Ok((candidate, SaveMode::Insert))
            }
        }
    }

    /// Save unless this is an update with nothing changed
    pub(crate) async fn persist<C>(
        &self,
        conn: &C,
        def: &EntityDef,
        entity: &mut Entity,
        mode: SaveMode,
    ) -> Result<(), SyncErr>
    where
        C: SyncConnection + ?Sized,
    {
        if mode == SaveMode::Update && !entity.has_changed() {
            trace!("`{}` {:?} unchanged", def.name, entity.id());
            return Ok(());
        }
        sync_log!(
            self.options.sync_logging,
            "{:?} `{}` {:?}",
            mode,
            def.name,
            entity.id()
        );
        conn.save(entity, def, mode).await
    }

    /// Apply scalars, persist, then reconcile every relation of `desired`
    pub(crate) fn apply<'a, C>(
        &'a self,
        conn: &'a C,
        def: &'a EntityDef,
        mut entity: Entity,
        mode: SaveMode,
        desired: &'a Document,
    ) -> BoxFuture<'a, Result<Entity, SyncErr>>
    where
        C: SyncConnection + ?Sized,
    {
        async move {
            for (key, value) in desired.iter() {
                if key.starts_with(PIVOT_PREFIX) {
                    continue;
                }
                if let Classification::Scalar = classify(&self.schema, &def.name, key, value) {
                    entity.set(key.as_str(), value.clone());
                }
            }
            self.persist(conn, def, &mut entity, mode).await?;
            for (relation, value) in self.relations_of(def, desired) {
                self.dispatch(conn, &mut entity, relation, value).await?;
            }
            Ok(entity)
        }
        .boxed()
    }

    /// Hand a relation to the reconciler of its kind
    pub(crate) fn dispatch<'a, C>(
        &'a self,
        conn: &'a C,
        parent: &'a mut Entity,
        relation: &'a RelationDef,
        value: &'a JsonValue,
    ) -> BoxFuture<'a, Result<(), SyncErr>>
    where
        C: SyncConnection + ?Sized,
    {
        match relation.kind {
            RelationKind::BelongsTo => self.belongs_to(conn, parent, relation, value),
            RelationKind::HasOne => self.has_one(conn, parent, relation, value),
            RelationKind::HasMany => self.has_many(conn, parent, relation, value),
            RelationKind::BelongsToMany => self.belongs_to_many(conn, parent, relation, value),
        }
    }
}

fn expect_object<'v>(relation: &RelationDef, value: &'v JsonValue) -> Result<&'v Document, SyncErr> {
    value.as_object().ok_or_else(|| {
        type_err(format!(
            "`{}#{}` expects an object, got {}",
            relation.from, relation.name, value
        ))
    })
}

fn expect_rows(relation: &RelationDef, value: &JsonValue) -> Result<Vec<Document>, SyncErr> {
    let items = value.as_array().ok_or_else(|| {
        type_err(format!(
            "`{}#{}` expects an array, got {}",
            relation.from, relation.name, value
        ))
    })?;
    items
        .iter()
        .map(|item| expect_object(relation, item).cloned())
        .collect()
}

fn owner_id(relation: &RelationDef, parent: &Entity) -> Result<JsonValue, SyncErr> {
    parent.id().cloned().ok_or_else(|| {
        SyncErr::MissingIdentifier(format!(
            "`{}#{}` needs a persisted owner",
            relation.from, relation.name
        ))
    })
}

fn target_id(relation: &RelationDef, target: &Entity) -> Result<JsonValue, SyncErr> {
    target.id().cloned().ok_or_else(|| {
        SyncErr::MissingIdentifier(format!(
            "`{}#{}` target was saved without identifier",
            relation.from, relation.name
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{EntityDef, MemoryDatabase, RelationDef};
    use serde_json::json;

    fn schema() -> Schema {
        Schema::new()
            .register(
                EntityDef::new("posts")
                    .relation(RelationDef::has_many("comments", "comments").foreign_key("post_id")),
            )
            .register(EntityDef::new("comments"))
    }

    #[test]
    fn relation_shapes() {
        let schema = schema();
        let rel = schema.describe_relation("posts", "comments").unwrap();
        assert!(expect_rows(rel, &json!([{ "body": "a" }])).is_ok());
        assert!(matches!(expect_rows(rel, &json!({ "body": "a" })), Err(SyncErr::Type(_))));
        assert!(matches!(expect_rows(rel, &json!([1])), Err(SyncErr::Type(_))));
        assert!(matches!(expect_object(rel, &json!([])), Err(SyncErr::Type(_))));
    }

    #[tokio::test]
    async fn unknown_kind_and_relation() {
        let schema = schema();
        let db = MemoryDatabase::new(&schema);
        let sync = Synchronizer::new(schema);

        let err = sync
            .synchronize(&db, "users", &Document::new())
            .await
            .unwrap_err();
        assert!(matches!(err, SyncErr::UnknownEntity(kind) if kind == "users"));

        let mut post = sync.synchronize(&db, "posts", &Document::new()).await.unwrap();
        let err = sync
            .reconcile_relation(&db, &mut post, "tags", &json!([]))
            .await
            .unwrap_err();
        assert!(matches!(err, SyncErr::Config(_)));
    }
}
