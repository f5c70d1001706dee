use crate::{EntityCollection, EntityDef};
use serde_json::{Map, Value as JsonValue};
use std::collections::BTreeMap;

/// A desired-state node, or the attributes of a row
pub type Document = Map<String, JsonValue>;

/// Prefix of pivot-internal fields; such keys are never written as attributes
pub const PIVOT_PREFIX: &str = "_pivot_";

/// Loaded relation of an [`Entity`]
#[derive(Clone, Debug, PartialEq)]
pub enum Related {
    /// belongs-to or has-one; `None` when no row is linked
    One(Option<Box<Entity>>),
    /// has-many or belongs-to-many
    Many(EntityCollection),
}

/// One persisted (or about to be persisted) record
#[derive(Clone, Debug, PartialEq)]
pub struct Entity {
    kind: String,
    primary_key: String,
    attributes: Document,
    persisted: Option<Document>,
    pivot: Document,
    relations: BTreeMap<String, Related>,
}

/// How the backend should write an [`Entity`]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SaveMode {
    /// Insert a new row, keeping the identifier if one is set
    Insert,
    /// Update the row with this identifier
    Update,
}

impl SaveMode {
    /// Insert for never persisted entities, update otherwise
    pub fn for_entity(entity: &Entity) -> Self {
        if entity.is_persisted() {
            Self::Update
        } else {
            Self::Insert
        }
    }
}

/// The non-null identifier of a document
pub fn document_id<'a>(doc: &'a Document, primary_key: &str) -> Option<&'a JsonValue> {
    doc.get(primary_key).filter(|id| !id.is_null())
}

impl Entity {
    /// A bare, never persisted entity
    pub fn new(def: &EntityDef) -> Self {
        Self {
            kind: def.name.clone(),
            primary_key: def.primary_key.clone(),
            attributes: Document::new(),
            persisted: None,
            pivot: Document::new(),
            relations: BTreeMap::new(),
        }
    }

    /// A never persisted entity carrying only an identifier, if any
    pub fn forge(def: &EntityDef, id: Option<JsonValue>) -> Self {
        let mut entity = Self::new(def);
        if let Some(id) = id {
            entity.attributes.insert(def.primary_key.clone(), id);
        }
        entity
    }

    /// An entity read from the store
    pub fn from_row(def: &EntityDef, row: Document) -> Self {
        let mut entity = Self::new(def);
        entity.persisted = Some(row.clone());
        entity.attributes = row;
        entity
    }

    /// Entity kind
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Primary key column
    pub fn primary_key(&self) -> &str {
        &self.primary_key
    }

    /// The identifier, if set and not null
    pub fn id(&self) -> Option<&JsonValue> {
        document_id(&self.attributes, &self.primary_key)
    }

    /// Get an attribute
    pub fn get(&self, column: &str) -> Option<&JsonValue> {
        self.attributes.get(column)
    }

    /// Set an attribute
    pub fn set<T>(&mut self, column: T, value: JsonValue)
    where
        T: Into<String>,
    {
        self.attributes.insert(column.into(), value);
    }

    /// All attributes
    pub fn attributes(&self) -> &Document {
        &self.attributes
    }

    /// Whether the entity was read from or written to the store
    pub fn is_persisted(&self) -> bool {
        self.persisted.is_some()
    }

    /// Attributes that differ from the last persisted state
    pub fn changed_attributes(&self) -> Document {
        match &self.persisted {
            None => self.attributes.clone(),
            Some(persisted) => self
                .attributes
                .iter()
                .filter(|(column, value)| persisted.get(column.as_str()) != Some(*value))
                .map(|(column, value)| (column.clone(), value.clone()))
                .collect(),
        }
    }

    /// Whether anything needs to be written
    pub fn has_changed(&self) -> bool {
        !self.changed_attributes().is_empty()
    }

    /// Record the current attributes as stored
    pub fn mark_persisted(&mut self, row: Document) {
        self.persisted = Some(row.clone());
        self.attributes = row;
    }

    /// Pivot attributes, set when fetched through a belongs-to-many relation
    pub fn pivot(&self) -> &Document {
        &self.pivot
    }

    /// Get a pivot attribute
    pub fn pivot_value(&self, column: &str) -> Option<&JsonValue> {
        self.pivot.get(column)
    }

    /// Set a pivot attribute
    pub fn set_pivot<T>(&mut self, column: T, value: JsonValue)
    where
        T: Into<String>,
    {
        self.pivot.insert(column.into(), value);
    }

    pub(crate) fn replace_pivot(&mut self, pivot: Document) {
        self.pivot = pivot;
    }

    /// A loaded relation
    pub fn related(&self, key: &str) -> Option<&Related> {
        self.relations.get(key)
    }

    /// A loaded to-one relation; `None` when not loaded or not linked
    pub fn related_one(&self, key: &str) -> Option<&Entity> {
        match self.relations.get(key) {
            Some(Related::One(Some(entity))) => Some(entity),
            _ => None,
        }
    }

    /// A loaded to-many relation
    pub fn related_many(&self, key: &str) -> Option<&EntityCollection> {
        match self.relations.get(key) {
            Some(Related::Many(collection)) => Some(collection),
            _ => None,
        }
    }

    /// Cache a loaded relation
    pub fn set_related<T>(&mut self, key: T, related: Related)
    where
        T: Into<String>,
    {
        self.relations.insert(key.into(), related);
    }

    /// Attributes and loaded relations as JSON, pivot attributes under
    /// `_pivot_` prefixed keys
    pub fn to_json(&self) -> JsonValue {
        let mut map = self.attributes.clone();
        for (column, value) in self.pivot.iter() {
            map.insert(format!("{PIVOT_PREFIX}{column}"), value.clone());
        }
        for (key, related) in self.relations.iter() {
            let value = match related {
                Related::One(Some(entity)) => entity.to_json(),
                Related::One(None) => JsonValue::Null,
                Related::Many(collection) => {
                    JsonValue::Array(collection.iter().map(Entity::to_json).collect())
                }
            };
            map.insert(key.clone(), value);
        }
        JsonValue::Object(map)
    }
}

impl serde::Serialize for Entity {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serde::Serialize::serialize(&self.to_json(), serializer)
    }
}
