use crate::{
    Document, Entity, EntityCollection, EntityDef, RelationDef, SaveMode, Schema, SyncErr,
    entity::loader::load_related,
};
use serde_json::Value as JsonValue;
use std::{future::Future, pin::Pin};

/// The capabilities the synchronizer needs from the persistence layer
///
/// Implemented by connections and by open transactions alike. Passing the same
/// `&C` down every recursive call keeps the whole call tree inside whatever
/// transaction `C` represents.
#[async_trait::async_trait]
pub trait SyncConnection: Sync {
    /// Fetch one row by identifier, without relations
    async fn find_row(&self, def: &EntityDef, id: &JsonValue) -> Result<Option<Entity>, SyncErr>;

    /// Fetch one row by identifier and eager-load the dotted relation paths.
    /// A miss is `Ok(None)`, not an error.
    async fn find_by_id(
        &self,
        schema: &Schema,
        def: &EntityDef,
        id: &JsonValue,
        with_related: &[String],
    ) -> Result<Option<Entity>, SyncErr> {
        let Some(mut entity) = self.find_row(def, id).await? else {
            return Ok(None);
        };
        if !with_related.is_empty() {
            load_related(self, schema, &mut entity, with_related).await?;
        }
        Ok(Some(entity))
    }

    /// Write an entity. Insert assigns the identifier when none is set;
    /// update writes the changed attributes only. Either way the entity is
    /// marked persisted with the stored row.
    async fn save(&self, entity: &mut Entity, def: &EntityDef, mode: SaveMode)
    -> Result<(), SyncErr>;

    /// Delete the row of this entity
    async fn destroy(&self, entity: &Entity, def: &EntityDef) -> Result<(), SyncErr>;

    /// Delete every row where `column = value`, returning the number deleted
    async fn destroy_where(
        &self,
        def: &EntityDef,
        column: &str,
        value: &JsonValue,
    ) -> Result<u64, SyncErr>;

    /// Current members of a relation, in stored order. Belongs-to-many members
    /// carry their pivot attributes.
    async fn fetch_related(
        &self,
        parent: &Entity,
        relation: &RelationDef,
        target: &EntityDef,
    ) -> Result<EntityCollection, SyncErr>;

    /// Insert a pivot row linking `parent` and `target`, with extra columns
    async fn attach(
        &self,
        parent: &Entity,
        relation: &RelationDef,
        target: &Entity,
        pivot: Document,
    ) -> Result<(), SyncErr>;

    /// Delete the pivot row linking `parent` and `target`
    async fn detach(
        &self,
        parent: &Entity,
        relation: &RelationDef,
        target: &Entity,
    ) -> Result<(), SyncErr>;

    /// Update columns of the pivot row linking `parent` and `target`
    async fn update_pivot(
        &self,
        parent: &Entity,
        relation: &RelationDef,
        target: &Entity,
        values: Document,
    ) -> Result<(), SyncErr>;
}

/// An open transaction
#[async_trait::async_trait]
pub trait TransactionSession: SyncConnection + Send + Sized {
    /// Commit the transaction
    async fn commit(self) -> Result<(), SyncErr>;

    /// Roll back the transaction
    async fn rollback(self) -> Result<(), SyncErr>;
}

/// Spawn transactions
#[async_trait::async_trait]
pub trait TransactionTrait: Sync {
    /// The transaction handle passed to synchronization calls
    type Transaction: TransactionSession;

    /// Begin a transaction
    async fn begin(&self) -> Result<Self::Transaction, SyncErr>;

    /// Execute the function inside a transaction.
    /// If the function returns an error, the transaction will be rolled back. If it does not return an error, the transaction will be committed.
    async fn transaction<F, T>(&self, callback: F) -> Result<T, SyncErr>
    where
        F: for<'c> FnOnce(
                &'c Self::Transaction,
            ) -> Pin<Box<dyn Future<Output = Result<T, SyncErr>> + Send + 'c>>
            + Send,
        T: Send,
    {
        let txn = self.begin().await?;
        let res = callback(&txn).await;
        match res {
            Ok(value) => {
                txn.commit().await?;
                Ok(value)
            }
            Err(err) => {
                txn.rollback().await?;
                Err(err)
            }
        }
    }
}
