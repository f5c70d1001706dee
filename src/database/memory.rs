use crate::{
    Document, Entity, EntityCollection, EntityDef, RelationDef, RelationKind, SaveMode, Schema,
    SyncConnection, SyncErr, TransactionSession, TransactionTrait, error::exec_err,
};
use futures_util::lock::Mutex;
use serde_json::{Value as JsonValue, json};
use std::{collections::BTreeMap, sync::Arc};
use tracing::{debug, instrument};

/// A write applied to a [`MemoryDatabase`]
#[derive(Clone, Debug, PartialEq)]
pub enum Write {
    /// A row was inserted
    Insert {
        /// Table name
        table: String,
        /// The stored row
        values: Document,
    },
    /// Rows matching `filter` were updated
    Update {
        /// Table name
        table: String,
        /// Column equality filter
        filter: Document,
        /// New column values
        values: Document,
    },
    /// Rows matching `filter` were deleted
    Delete {
        /// Table name
        table: String,
        /// Column equality filter
        filter: Document,
        /// Number of rows deleted
        rows_affected: u64,
    },
}

impl Write {
    /// Table written to
    pub fn table(&self) -> &str {
        match self {
            Self::Insert { table, .. } | Self::Update { table, .. } | Self::Delete { table, .. } => {
                table
            }
        }
    }
}

#[derive(Clone, Debug, Default)]
struct Table {
    primary_key: Option<String>,
    unique: Vec<Vec<String>>,
    rows: Vec<Document>,
    sequence: i64,
}

#[derive(Clone, Debug, Default)]
struct Store {
    tables: BTreeMap<String, Table>,
    log: Vec<Write>,
}

fn filter<K>(pairs: impl IntoIterator<Item = (K, JsonValue)>) -> Document
where
    K: Into<String>,
{
    pairs.into_iter().map(|(k, v)| (k.into(), v)).collect()
}

fn matches(row: &Document, filter: &Document) -> bool {
    filter
        .iter()
        .all(|(column, value)| row.get(column).unwrap_or(&JsonValue::Null) == value)
}

impl Table {
    /// Check `row` against `rows`, ignoring the row at `skip`
    fn check_unique(
        &self,
        name: &str,
        rows: &[Document],
        row: &Document,
        skip: Option<usize>,
    ) -> Result<(), SyncErr> {
        use itertools::Itertools;

        let mut constraints: Vec<Vec<String>> = self.unique.clone();
        if let Some(pk) = &self.primary_key {
            constraints.push(vec![pk.clone()]);
        }
        for columns in constraints.iter() {
            let key: Vec<&JsonValue> = columns
                .iter()
                .map(|c| row.get(c).unwrap_or(&JsonValue::Null))
                .collect();
            if key.iter().any(|v| v.is_null()) {
                continue;
            }
            let conflict = rows.iter().enumerate().any(|(i, other)| {
                Some(i) != skip
                    && columns
                        .iter()
                        .zip(key.iter())
                        .all(|(c, v)| other.get(c) == Some(*v))
            });
            if conflict {
                return Err(SyncErr::UniqueConstraintViolation(format!(
                    "UNIQUE constraint failed: {}.{}",
                    name,
                    columns.iter().join(", ")
                )));
            }
        }
        Ok(())
    }
}

impl Store {
    fn from_schema(schema: &Schema) -> Self {
        let mut tables = BTreeMap::new();
        for entity in schema.entities() {
            tables.insert(
                entity.table.clone(),
                Table {
                    primary_key: Some(entity.primary_key.clone()),
                    unique: entity.unique.clone(),
                    ..Default::default()
                },
            );
            for relation in entity.relations.values() {
                if let Some(pivot) = &relation.pivot {
                    tables.entry(pivot.table.clone()).or_insert_with(|| Table {
                        primary_key: pivot.id_column.clone(),
                        ..Default::default()
                    });
                }
            }
        }
        Self {
            tables,
            log: Vec::new(),
        }
    }

    fn table(&self, name: &str) -> Result<&Table, SyncErr> {
        self.tables
            .get(name)
            .ok_or_else(|| exec_err(format!("no such table: {name}")))
    }

    fn table_mut(&mut self, name: &str) -> Result<&mut Table, SyncErr> {
        self.tables
            .get_mut(name)
            .ok_or_else(|| exec_err(format!("no such table: {name}")))
    }

    fn select(&self, name: &str, filter: &Document) -> Result<Vec<Document>, SyncErr> {
        Ok(self
            .table(name)?
            .rows
            .iter()
            .filter(|row| matches(row, filter))
            .cloned()
            .collect())
    }

    fn insert(&mut self, name: &str, mut values: Document) -> Result<Document, SyncErr> {
        let table = self.table_mut(name)?;
        if let Some(pk) = table.primary_key.clone() {
            match values.get(&pk).filter(|v| !v.is_null()) {
                Some(id) => {
                    if let Some(id) = id.as_i64() {
                        table.sequence = table.sequence.max(id);
                    }
                }
                None => {
                    table.sequence += 1;
                    values.insert(pk, json!(table.sequence));
                }
            }
        }
        table.check_unique(name, &table.rows, &values, None)?;
        table.rows.push(values.clone());
        self.log.push(Write::Insert {
            table: name.to_owned(),
            values: values.clone(),
        });
        Ok(values)
    }

    fn update(&mut self, name: &str, filter: Document, values: Document) -> Result<u64, SyncErr> {
        let table = self.table_mut(name)?;
        let positions: Vec<usize> = table
            .rows
            .iter()
            .enumerate()
            .filter(|(_, row)| matches(row, &filter))
            .map(|(i, _)| i)
            .collect();
        let mut staged = table.rows.clone();
        for &i in positions.iter() {
            for (column, value) in values.iter() {
                staged[i].insert(column.clone(), value.clone());
            }
        }
        for &i in positions.iter() {
            table.check_unique(name, &staged, &staged[i], Some(i))?;
        }
        table.rows = staged;
        self.log.push(Write::Update {
            table: name.to_owned(),
            filter,
            values,
        });
        Ok(positions.len() as u64)
    }

    fn delete(&mut self, name: &str, filter: Document) -> Result<u64, SyncErr> {
        let table = self.table_mut(name)?;
        let before = table.rows.len();
        table.rows.retain(|row| !matches(row, &filter));
        let rows_affected = (before - table.rows.len()) as u64;
        self.log.push(Write::Delete {
            table: name.to_owned(),
            filter,
            rows_affected,
        });
        Ok(rows_affected)
    }

    fn find_row(&self, def: &EntityDef, id: &JsonValue) -> Result<Option<Entity>, SyncErr> {
        let rows = self.select(&def.table, &filter([(def.primary_key.as_str(), id.clone())]))?;
        Ok(rows.into_iter().next().map(|row| Entity::from_row(def, row)))
    }

    fn save(&mut self, entity: &mut Entity, def: &EntityDef, mode: SaveMode) -> Result<(), SyncErr> {
        match mode {
            SaveMode::Insert => {
                let row = self.insert(&def.table, entity.attributes().clone())?;
                entity.mark_persisted(row);
            }
            SaveMode::Update => {
                let id = entity.id().cloned().ok_or_else(|| {
                    SyncErr::MissingIdentifier(format!("cannot update `{}` without identifier", def.name))
                })?;
                let changed = entity.changed_attributes();
                if !changed.is_empty() {
                    let pk = filter([(def.primary_key.as_str(), id.clone())]);
                    if self.update(&def.table, pk, changed)? == 0 {
                        return Err(SyncErr::RecordNotUpdated);
                    }
                }
                let row = self
                    .find_row(def, &id)?
                    .ok_or_else(|| SyncErr::RecordNotFound(format!("{}#{}", def.name, id)))?;
                entity.mark_persisted(row.attributes().clone());
            }
        }
        Ok(())
    }

    fn fetch_related(
        &self,
        parent: &Entity,
        relation: &RelationDef,
        target: &EntityDef,
    ) -> Result<EntityCollection, SyncErr> {
        let mut collection = EntityCollection::new(target.name.as_str());
        match relation.kind {
            RelationKind::BelongsTo => {
                let fk = relation.require_foreign_key()?;
                if let Some(id) = parent.get(fk).filter(|v| !v.is_null()) {
                    if let Some(model) = self.find_row(target, id)? {
                        collection.push(model);
                    }
                }
            }
            RelationKind::HasOne | RelationKind::HasMany => {
                let fk = relation.require_foreign_key()?;
                if let Some(id) = parent.id() {
                    for row in self.select(&target.table, &filter([(fk, id.clone())]))? {
                        collection.push(Entity::from_row(target, row));
                    }
                }
            }
            RelationKind::BelongsToMany => {
                let pivot = relation.require_pivot()?;
                let Some(id) = parent.id() else {
                    return Ok(collection);
                };
                let mut links =
                    self.select(&pivot.table, &filter([(pivot.foreign_key.as_str(), id.clone())]))?;
                if let Some(order) = &pivot.order_column {
                    links.sort_by_key(|link| link.get(order).and_then(JsonValue::as_i64).unwrap_or(0));
                }
                for link in links {
                    let Some(related) = link.get(&pivot.related_key) else {
                        continue;
                    };
                    if let Some(mut model) = self.find_row(target, related)? {
                        model.replace_pivot(link.clone());
                        collection.push(model);
                    }
                }
            }
        }
        Ok(collection)
    }

    fn pivot_filter(
        parent: &Entity,
        relation: &RelationDef,
        target: &Entity,
    ) -> Result<(String, Document), SyncErr> {
        let pivot = relation.require_pivot()?;
        let parent_id = parent.id().cloned().ok_or_else(|| {
            SyncErr::MissingIdentifier(format!("`{}#{}` owner", relation.from, relation.name))
        })?;
        let target_id = target.id().cloned().ok_or_else(|| {
            SyncErr::MissingIdentifier(format!("`{}#{}` target", relation.from, relation.name))
        })?;
        Ok((
            pivot.table.clone(),
            filter([
                (pivot.foreign_key.as_str(), parent_id),
                (pivot.related_key.as_str(), target_id),
            ]),
        ))
    }
}

/// An in-memory store implementing every capability the synchronizer needs
///
/// Tables are derived from a [`Schema`]: one per entity plus one per pivot table.
/// Identifiers are auto-incrementing integers; primary keys and declared unique
/// column sets are enforced. Every committed write is kept in a log.
#[derive(derive_more::Debug, Clone)]
pub struct MemoryDatabase {
    #[debug(skip)]
    store: Arc<Mutex<Store>>,
}

/// A snapshot transaction on a [`MemoryDatabase`]
///
/// Writes go to a private copy; commit publishes it, rollback or drop discards it.
/// Concurrent transactions are not isolated from each other: the last commit wins.
#[derive(derive_more::Debug)]
pub struct MemoryTransaction {
    #[debug(skip)]
    target: Arc<Mutex<Store>>,
    #[debug(skip)]
    working: Mutex<Store>,
}

impl MemoryDatabase {
    /// Create empty tables for every entity and pivot table of the schema
    pub fn new(schema: &Schema) -> Self {
        Self {
            store: Arc::new(Mutex::new(Store::from_schema(schema))),
        }
    }

    /// All rows of a table, in insertion order
    pub async fn rows(&self, table: &str) -> Result<Vec<Document>, SyncErr> {
        self.store.lock().await.select(table, &Document::new())
    }

    /// Rows of a table where every `(column, value)` pair matches
    pub async fn rows_where<K>(
        &self,
        table: &str,
        pairs: impl IntoIterator<Item = (K, JsonValue)>,
    ) -> Result<Vec<Document>, SyncErr>
    where
        K: Into<String>,
    {
        self.store.lock().await.select(table, &filter(pairs))
    }

    /// Take the log of committed writes
    pub async fn drain_write_log(&self) -> Vec<Write> {
        std::mem::take(&mut self.store.lock().await.log)
    }
}

macro_rules! impl_sync_connection {
    ($ty: ty, $store: ident) => {
        #[async_trait::async_trait]
        impl SyncConnection for $ty {
            async fn find_row(
                &self,
                def: &EntityDef,
                id: &JsonValue,
            ) -> Result<Option<Entity>, SyncErr> {
                self.$store.lock().await.find_row(def, id)
            }

            async fn save(
                &self,
                entity: &mut Entity,
                def: &EntityDef,
                mode: SaveMode,
            ) -> Result<(), SyncErr> {
                self.$store.lock().await.save(entity, def, mode)
            }

            async fn destroy(&self, entity: &Entity, def: &EntityDef) -> Result<(), SyncErr> {
                let id = entity.id().cloned().ok_or_else(|| {
                    SyncErr::MissingIdentifier(format!("cannot delete `{}` without identifier", def.name))
                })?;
                self.$store
                    .lock()
                    .await
                    .delete(&def.table, filter([(def.primary_key.as_str(), id)]))?;
                Ok(())
            }

            async fn destroy_where(
                &self,
                def: &EntityDef,
                column: &str,
                value: &JsonValue,
            ) -> Result<u64, SyncErr> {
                self.$store
                    .lock()
                    .await
                    .delete(&def.table, filter([(column, value.clone())]))
            }

            async fn fetch_related(
                &self,
                parent: &Entity,
                relation: &RelationDef,
                target: &EntityDef,
            ) -> Result<EntityCollection, SyncErr> {
                self.$store.lock().await.fetch_related(parent, relation, target)
            }

            async fn attach(
                &self,
                parent: &Entity,
                relation: &RelationDef,
                target: &Entity,
                pivot: Document,
            ) -> Result<(), SyncErr> {
                let (table, mut row) = Store::pivot_filter(parent, relation, target)?;
                row.extend(pivot);
                self.$store.lock().await.insert(&table, row)?;
                Ok(())
            }

            async fn detach(
                &self,
                parent: &Entity,
                relation: &RelationDef,
                target: &Entity,
            ) -> Result<(), SyncErr> {
                let (table, filter) = Store::pivot_filter(parent, relation, target)?;
                self.$store.lock().await.delete(&table, filter)?;
                Ok(())
            }

            async fn update_pivot(
                &self,
                parent: &Entity,
                relation: &RelationDef,
                target: &Entity,
                values: Document,
            ) -> Result<(), SyncErr> {
                let (table, filter) = Store::pivot_filter(parent, relation, target)?;
                if self.$store.lock().await.update(&table, filter, values)? == 0 {
                    return Err(SyncErr::RecordNotUpdated);
                }
                Ok(())
            }
        }
    };
}

impl_sync_connection!(MemoryDatabase, store);
impl_sync_connection!(MemoryTransaction, working);

#[async_trait::async_trait]
impl TransactionTrait for MemoryDatabase {
    type Transaction = MemoryTransaction;

    #[instrument(level = "trace")]
    async fn begin(&self) -> Result<MemoryTransaction, SyncErr> {
        let snapshot = self.store.lock().await.clone();
        Ok(MemoryTransaction {
            target: self.store.clone(),
            working: Mutex::new(snapshot),
        })
    }
}

#[async_trait::async_trait]
impl TransactionSession for MemoryTransaction {
    #[instrument(level = "trace")]
    async fn commit(self) -> Result<(), SyncErr> {
        let working = self.working.into_inner();
        debug!("commit: {} writes", working.log.len());
        *self.target.lock().await = working;
        Ok(())
    }

    #[instrument(level = "trace")]
    async fn rollback(self) -> Result<(), SyncErr> {
        debug!("rollback");
        Ok(())
    }
}
