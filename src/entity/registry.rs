use crate::{RelationBuilder, RelationDef, SyncErr};
use std::collections::BTreeMap;
use tracing::debug;

/// Table level metadata of one entity kind
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EntityDef {
    /// Entity kind, used to look up relations
    pub name: String,
    /// Table name
    pub table: String,
    /// Primary key column
    pub primary_key: String,
    /// Declared relations by accessor name
    pub relations: BTreeMap<String, RelationDef>,
    /// Column sets that must be unique
    pub unique: Vec<Vec<String>>,
}

impl EntityDef {
    /// An entity stored in a table of the same name, keyed by `id`
    pub fn new<T>(name: T) -> Self
    where
        T: Into<String>,
    {
        let name = name.into();
        Self {
            table: name.clone(),
            name,
            primary_key: "id".to_owned(),
            relations: BTreeMap::new(),
            unique: Vec::new(),
        }
    }

    /// Store this entity in another table
    pub fn table<T>(mut self, table: T) -> Self
    where
        T: Into<String>,
    {
        self.table = table.into();
        self
    }

    /// Use another primary key column
    pub fn primary_key<T>(mut self, column: T) -> Self
    where
        T: Into<String>,
    {
        self.primary_key = column.into();
        self
    }

    /// Declare a relation
    pub fn relation(mut self, relation: RelationBuilder) -> Self {
        let relation = relation.build(self.name.as_str());
        self.relations.insert(relation.name.clone(), relation);
        self
    }

    /// Declare a unique column set
    pub fn unique<I, T>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.unique
            .push(columns.into_iter().map(Into::into).collect());
        self
    }
}

/// The registry of entity kinds and their relations
///
/// Relation lookup is a map access keyed by (entity kind, field name); it never
/// inspects the shape of a value.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Schema {
    entities: BTreeMap<String, EntityDef>,
}

impl Schema {
    /// An empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an entity
    pub fn register(mut self, entity: EntityDef) -> Self {
        debug!(
            "Registered {} ({} relations)",
            entity.name,
            entity.relations.len()
        );
        self.entities.insert(entity.name.clone(), entity);
        self
    }

    /// Look up an entity kind
    pub fn entity(&self, kind: &str) -> Result<&EntityDef, SyncErr> {
        self.entities
            .get(kind)
            .ok_or_else(|| SyncErr::UnknownEntity(kind.to_owned()))
    }

    /// Relation metadata of `kind#key`, if declared
    pub fn describe_relation(&self, kind: &str, key: &str) -> Option<&RelationDef> {
        self.entities
            .get(kind)
            .and_then(|entity| entity.relations.get(key))
    }

    /// All registered entities
    pub fn entities(&self) -> impl Iterator<Item = &EntityDef> {
        self.entities.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PivotDef;

    #[test]
    fn describe_relation_is_a_lookup() {
        let schema = Schema::new()
            .register(
                EntityDef::new("posts").relation(
                    RelationDef::belongs_to_many("tags", "tags")
                        .via(PivotDef::new("posts_tags", "post_id", "tag_id")),
                ),
            )
            .register(EntityDef::new("tags").unique(["slug"]));

        let rel = schema.describe_relation("posts", "tags").unwrap();
        assert_eq!(rel.from, "posts");
        assert_eq!(rel.target, "tags");
        assert!(schema.describe_relation("posts", "title").is_none());
        assert!(schema.describe_relation("users", "tags").is_none());
        assert_eq!(schema.entity("tags").unwrap().unique, vec![vec!["slug".to_owned()]]);
        assert!(matches!(
            schema.entity("users"),
            Err(SyncErr::UnknownEntity(kind)) if kind == "users"
        ));
    }
}
