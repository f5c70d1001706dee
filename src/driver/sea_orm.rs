use crate::{
    Document, Entity, EntityCollection, EntityDef, RelationDef, RelationKind, SaveMode,
    SyncConnection, SyncErr, TransactionSession, TransactionTrait, error::exec_err,
};
use sea_orm::{
    ConnectionTrait, DatabaseConnection, DatabaseTransaction, FromQueryResult, QueryResult,
    Statement, StatementBuilder, Value,
    sea_query::{Alias, Asterisk, Condition, Expr, Order, Query, SimpleExpr},
};
use serde_json::Value as JsonValue;
use tracing::instrument;

/// A SeaORM connection or transaction exposed as a [`SyncConnection`]
///
/// Rows are read as JSON and written column by column, so no entity types are
/// needed. Wrap a `DatabaseConnection` to synchronize directly, or call
/// [`TransactionTrait::transaction`] on it to run inside a transaction.
#[derive(Debug, Clone)]
pub struct SeaOrmConnection<C> {
    conn: C,
}

impl<C> SeaOrmConnection<C> {
    /// Wrap a SeaORM connection
    pub fn new(conn: C) -> Self {
        Self { conn }
    }

    /// The wrapped connection
    pub fn inner(&self) -> &C {
        &self.conn
    }

    /// Unwrap the connection
    pub fn into_inner(self) -> C {
        self.conn
    }
}

impl From<DatabaseConnection> for SeaOrmConnection<DatabaseConnection> {
    fn from(conn: DatabaseConnection) -> Self {
        Self::new(conn)
    }
}

/// Convert a JSON attribute into a bind value
fn to_value(value: &JsonValue) -> Value {
    match value {
        JsonValue::Null => Value::from(None::<String>),
        JsonValue::Bool(b) => Value::from(*b),
        JsonValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::from(i)
            } else if let Some(u) = n.as_u64() {
                Value::from(u)
            } else {
                Value::from(n.as_f64())
            }
        }
        JsonValue::String(s) => Value::from(s.clone()),
        JsonValue::Array(_) | JsonValue::Object(_) => Value::from(value.clone()),
    }
}

fn to_document(row: &QueryResult) -> Result<Document, SyncErr> {
    match JsonValue::from_query_result(row, "")? {
        JsonValue::Object(map) => Ok(map),
        other => Err(exec_err(format!("expected a row, got {other}"))),
    }
}

fn condition<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a JsonValue)>) -> Condition {
    pairs.into_iter().fold(Condition::all(), |cond, (column, value)| {
        cond.add(Expr::col(Alias::new(column)).eq(to_value(value)))
    })
}

fn assignments(values: &Document) -> Vec<(Alias, SimpleExpr)> {
    values
        .iter()
        .map(|(column, value)| (Alias::new(column.as_str()), SimpleExpr::from(to_value(value))))
        .collect()
}

fn identifier<'e>(entity: &'e Entity, what: &str) -> Result<&'e JsonValue, SyncErr> {
    entity
        .id()
        .ok_or_else(|| SyncErr::MissingIdentifier(format!("cannot {what} `{}` without identifier", entity.kind())))
}

impl<C> SeaOrmConnection<C>
where
    C: ConnectionTrait,
{
    fn build<S>(&self, stmt: &S) -> Statement
    where
        S: StatementBuilder,
    {
        self.conn.get_database_backend().build(stmt)
    }

    async fn select(
        &self,
        table: &str,
        cond: Condition,
        order_by: Option<&str>,
    ) -> Result<Vec<Document>, SyncErr> {
        let mut stmt = Query::select();
        stmt.column(Asterisk).from(Alias::new(table)).cond_where(cond);
        if let Some(column) = order_by {
            stmt.order_by(Alias::new(column), Order::Asc);
        }
        let rows = self.conn.query_all(self.build(&stmt)).await?;
        rows.iter().map(to_document).collect()
    }

    async fn insert(&self, table: &str, values: &Document, primary_key: Option<&str>) -> Result<Document, SyncErr> {
        let backend = self.conn.get_database_backend();
        let mut stmt = Query::insert();
        stmt.into_table(Alias::new(table));
        let values: Document = values
            .iter()
            .filter(|(_, value)| !value.is_null())
            .map(|(column, value)| (column.clone(), value.clone()))
            .collect();
        if values.is_empty() {
            stmt.or_default_values();
        } else {
            stmt.columns(values.keys().map(|column| Alias::new(column.as_str())));
            stmt.values(values.values().map(|value| SimpleExpr::from(to_value(value))))
                .map_err(exec_err)?;
        }

        if backend.support_returning() {
            stmt.returning_all();
            let row = self
                .conn
                .query_one(self.build(&stmt))
                .await?
                .ok_or_else(|| exec_err(format!("insert into `{table}` returned no row")))?;
            return to_document(&row);
        }

        let res = self.conn.execute(self.build(&stmt)).await?;
        let Some(pk) = primary_key else {
            return Ok(values);
        };
        let id = match values.get(pk) {
            Some(id) => id.clone(),
            None => JsonValue::from(res.last_insert_id()),
        };
        self.select(table, condition([(pk, &id)]), None)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| SyncErr::RecordNotFound(format!("{table}#{id}")))
    }

    async fn update(&self, table: &str, cond: Condition, values: &Document) -> Result<u64, SyncErr> {
        let mut stmt = Query::update();
        stmt.table(Alias::new(table))
            .values(assignments(values))
            .cond_where(cond);
        Ok(self.conn.execute(self.build(&stmt)).await?.rows_affected())
    }

    async fn delete(&self, table: &str, cond: Condition) -> Result<u64, SyncErr> {
        let mut stmt = Query::delete();
        stmt.from_table(Alias::new(table)).cond_where(cond);
        Ok(self.conn.execute(self.build(&stmt)).await?.rows_affected())
    }

    fn pivot_condition(parent: &Entity, relation: &RelationDef, target: &Entity) -> Result<(String, Condition), SyncErr> {
        let pivot = relation.require_pivot()?;
        let parent_id = identifier(parent, "link")?;
        let target_id = identifier(target, "link")?;
        Ok((
            pivot.table.clone(),
            condition([
                (pivot.foreign_key.as_str(), parent_id),
                (pivot.related_key.as_str(), target_id),
            ]),
        ))
    }
}

#[async_trait::async_trait]
impl<C> SyncConnection for SeaOrmConnection<C>
where
    C: ConnectionTrait + Send + Sync,
{
    async fn find_row(&self, def: &EntityDef, id: &JsonValue) -> Result<Option<Entity>, SyncErr> {
        let row = self
            .select(&def.table, condition([(def.primary_key.as_str(), id)]), None)
            .await?
            .into_iter()
            .next();
        Ok(row.map(|row| Entity::from_row(def, row)))
    }

    #[instrument(level = "trace", skip_all, fields(table = %def.table, ?mode))]
    async fn save(&self, entity: &mut Entity, def: &EntityDef, mode: SaveMode) -> Result<(), SyncErr> {
        match mode {
            SaveMode::Insert => {
                let row = self
                    .insert(&def.table, entity.attributes(), Some(&def.primary_key))
                    .await?;
                entity.mark_persisted(row);
            }
            SaveMode::Update => {
                let id = identifier(entity, "update")?.clone();
                let changed = entity.changed_attributes();
                let pk = condition([(def.primary_key.as_str(), &id)]);
                if !changed.is_empty() && self.update(&def.table, pk, &changed).await? == 0 {
                    return Err(SyncErr::RecordNotUpdated);
                }
                let row = self
                    .find_row(def, &id)
                    .await?
                    .ok_or_else(|| SyncErr::RecordNotFound(format!("{}#{}", def.name, id)))?;
                entity.mark_persisted(row.attributes().clone());
            }
        }
        Ok(())
    }

    async fn destroy(&self, entity: &Entity, def: &EntityDef) -> Result<(), SyncErr> {
        let id = identifier(entity, "delete")?;
        self.delete(&def.table, condition([(def.primary_key.as_str(), id)]))
            .await?;
        Ok(())
    }

    async fn destroy_where(
        &self,
        def: &EntityDef,
        column: &str,
        value: &JsonValue,
    ) -> Result<u64, SyncErr> {
        self.delete(&def.table, condition([(column, value)])).await
    }

    async fn fetch_related(
        &self,
        parent: &Entity,
        relation: &RelationDef,
        target: &EntityDef,
    ) -> Result<EntityCollection, SyncErr> {
        let mut collection = EntityCollection::new(target.name.as_str());
        match relation.kind {
            RelationKind::BelongsTo => {
                let fk = relation.require_foreign_key()?;
                if let Some(id) = parent.get(fk).filter(|id| !id.is_null()) {
                    if let Some(model) = self.find_row(target, id).await? {
                        collection.push(model);
                    }
                }
            }
            RelationKind::HasOne | RelationKind::HasMany => {
                let fk = relation.require_foreign_key()?;
                if let Some(id) = parent.id() {
                    let rows = self
                        .select(&target.table, condition([(fk, id)]), Some(&target.primary_key))
                        .await?;
                    for row in rows {
                        collection.push(Entity::from_row(target, row));
                    }
                }
            }
            RelationKind::BelongsToMany => {
                let pivot = relation.require_pivot()?;
                let Some(id) = parent.id() else {
                    return Ok(collection);
                };
                let links = self
                    .select(
                        &pivot.table,
                        condition([(pivot.foreign_key.as_str(), id)]),
                        pivot.order_column.as_deref(),
                    )
                    .await?;
                for link in links {
                    let Some(related) = link.get(&pivot.related_key) else {
                        continue;
                    };
                    if let Some(mut model) = self.find_row(target, related).await? {
                        model.replace_pivot(link.clone());
                        collection.push(model);
                    }
                }
            }
        }
        Ok(collection)
    }

    async fn attach(
        &self,
        parent: &Entity,
        relation: &RelationDef,
        target: &Entity,
        pivot: Document,
    ) -> Result<(), SyncErr> {
        let def = relation.require_pivot()?;
        let mut row = pivot;
        row.insert(def.foreign_key.clone(), identifier(parent, "link")?.clone());
        row.insert(def.related_key.clone(), identifier(target, "link")?.clone());
        self.insert(&def.table, &row, def.id_column.as_deref()).await?;
        Ok(())
    }

    async fn detach(
        &self,
        parent: &Entity,
        relation: &RelationDef,
        target: &Entity,
    ) -> Result<(), SyncErr> {
        let (table, cond) = Self::pivot_condition(parent, relation, target)?;
        self.delete(&table, cond).await?;
        Ok(())
    }

    async fn update_pivot(
        &self,
        parent: &Entity,
        relation: &RelationDef,
        target: &Entity,
        values: Document,
    ) -> Result<(), SyncErr> {
        let (table, cond) = Self::pivot_condition(parent, relation, target)?;
        if self.update(&table, cond, &values).await? == 0 {
            return Err(SyncErr::RecordNotUpdated);
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl TransactionTrait for SeaOrmConnection<DatabaseConnection> {
    type Transaction = SeaOrmConnection<DatabaseTransaction>;

    #[instrument(level = "trace")]
    async fn begin(&self) -> Result<Self::Transaction, SyncErr> {
        let txn = sea_orm::TransactionTrait::begin(&self.conn).await?;
        Ok(SeaOrmConnection::new(txn))
    }
}

/// Nested transactions use savepoints
#[async_trait::async_trait]
impl TransactionTrait for SeaOrmConnection<DatabaseTransaction> {
    type Transaction = SeaOrmConnection<DatabaseTransaction>;

    #[instrument(level = "trace")]
    async fn begin(&self) -> Result<Self::Transaction, SyncErr> {
        let txn = sea_orm::TransactionTrait::begin(&self.conn).await?;
        Ok(SeaOrmConnection::new(txn))
    }
}

#[async_trait::async_trait]
impl TransactionSession for SeaOrmConnection<DatabaseTransaction> {
    #[instrument(level = "trace")]
    async fn commit(self) -> Result<(), SyncErr> {
        self.conn.commit().await?;
        Ok(())
    }

    #[instrument(level = "trace")]
    async fn rollback(self) -> Result<(), SyncErr> {
        self.conn.rollback().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn json_to_bind_values() {
        assert_eq!(to_value(&json!(1)), Value::BigInt(Some(1)));
        assert_eq!(to_value(&json!(true)), Value::Bool(Some(true)));
        assert_eq!(to_value(&json!("a")), Value::String(Some(Box::new("a".to_owned()))));
        assert_eq!(to_value(&json!(null)), Value::String(None));
        assert_eq!(
            to_value(&json!({ "a": 1 })),
            Value::Json(Some(Box::new(json!({ "a": 1 }))))
        );
    }
}
