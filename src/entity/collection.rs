use crate::Entity;
use core::ops::Index;
use serde_json::Value as JsonValue;
use std::slice;

/// Ordered entities of one kind
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EntityCollection {
    kind: String,
    models: Vec<Entity>,
}

impl EntityCollection {
    /// An empty collection
    pub fn new<T>(kind: T) -> Self
    where
        T: Into<String>,
    {
        Self {
            kind: kind.into(),
            models: Vec::new(),
        }
    }

    /// Wrap entities, keeping their order
    pub fn from_models<T>(kind: T, models: Vec<Entity>) -> Self
    where
        T: Into<String>,
    {
        Self {
            kind: kind.into(),
            models,
        }
    }

    /// Entity kind of the members
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Like `Vec::len`
    pub fn len(&self) -> usize {
        self.models.len()
    }

    /// Like `Vec::is_empty`
    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    /// Like `Vec::get`
    pub fn get(&self, index: usize) -> Option<&Entity> {
        self.models.get(index)
    }

    /// Append an entity
    pub fn push(&mut self, model: Entity) {
        self.models.push(model);
    }

    /// Iterate in order
    pub fn iter(&self) -> slice::Iter<'_, Entity> {
        self.models.iter()
    }

    /// Iterate mutably in order
    pub fn iter_mut(&mut self) -> slice::IterMut<'_, Entity> {
        self.models.iter_mut()
    }

    /// First member with this identifier
    pub fn find_by_id(&self, id: &JsonValue) -> Option<&Entity> {
        self.models.iter().find(|model| model.id() == Some(id))
    }

    /// Find within the models by identifier, return true if found
    pub fn contains_id(&self, id: &JsonValue) -> bool {
        self.find_by_id(id).is_some()
    }

    /// Identifiers of the members in order, skipping never persisted ones
    pub fn ids(&self) -> Vec<JsonValue> {
        self.models.iter().filter_map(|m| m.id().cloned()).collect()
    }

    /// Consume self as vector
    pub fn into_vec(self) -> Vec<Entity> {
        self.models
    }
}

impl Index<usize> for EntityCollection {
    type Output = Entity;

    fn index(&self, index: usize) -> &Self::Output {
        self.models.index(index)
    }
}

impl IntoIterator for EntityCollection {
    type Item = Entity;
    type IntoIter = std::vec::IntoIter<Entity>;

    fn into_iter(self) -> Self::IntoIter {
        self.models.into_iter()
    }
}

impl<'a> IntoIterator for &'a EntityCollection {
    type Item = &'a Entity;
    type IntoIter = slice::Iter<'a, Entity>;

    fn into_iter(self) -> Self::IntoIter {
        self.models.iter()
    }
}
