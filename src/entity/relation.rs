use crate::{SyncErr, error::config_err};

/// Defines the type of relationship
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, strum::Display, strum::AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum RelationKind {
    /// The owner holds the foreign key
    BelongsTo,
    /// The target holds the foreign key, at most one target per owner
    HasOne,
    /// The target holds the foreign key
    HasMany,
    /// Linked through a pivot table
    BelongsToMany,
}

impl RelationKind {
    /// True for relations whose desired value is a sequence
    pub fn is_to_many(&self) -> bool {
        matches!(self, Self::HasMany | Self::BelongsToMany)
    }
}

/// Join table of a belongs-to-many relation
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PivotDef {
    /// Pivot table name
    pub table: String,
    /// Column pointing at the owner
    pub foreign_key: String,
    /// Column pointing at the target
    pub related_key: String,
    /// Column holding the zero-based position in the desired sequence
    pub order_column: Option<String>,
    /// Surrogate key of the pivot row, if the table has one
    pub id_column: Option<String>,
}

impl PivotDef {
    /// Create a pivot definition with no order or id column
    pub fn new<T, F, R>(table: T, foreign_key: F, related_key: R) -> Self
    where
        T: Into<String>,
        F: Into<String>,
        R: Into<String>,
    {
        Self {
            table: table.into(),
            foreign_key: foreign_key.into(),
            related_key: related_key.into(),
            order_column: None,
            id_column: None,
        }
    }

    /// Keep the position of every target in this column
    pub fn order_by<T>(mut self, column: T) -> Self
    where
        T: Into<String>,
    {
        self.order_column = Some(column.into());
        self
    }

    /// Name the surrogate key column of pivot rows
    pub fn id_column<T>(mut self, column: T) -> Self
    where
        T: Into<String>,
    {
        self.id_column = Some(column.into());
        self
    }
}

/// Static metadata of one declared relation
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RelationDef {
    /// Accessor name on the owner, also the key in desired-state documents
    pub name: String,
    /// The type of relationship
    pub kind: RelationKind,
    /// Owner entity kind
    pub from: String,
    /// Target entity kind
    pub target: String,
    /// Foreign key column (on the owner for belongs-to, on the target otherwise)
    pub foreign_key: Option<String>,
    /// Pivot table for belongs-to-many
    pub pivot: Option<PivotDef>,
}

/// Builder for [`RelationDef`]; the owner is filled in on registration
#[derive(Debug)]
pub struct RelationBuilder {
    name: String,
    kind: RelationKind,
    target: String,
    foreign_key: Option<String>,
    pivot: Option<PivotDef>,
}

impl RelationDef {
    fn builder<N, T>(kind: RelationKind, name: N, target: T) -> RelationBuilder
    where
        N: Into<String>,
        T: Into<String>,
    {
        RelationBuilder {
            name: name.into(),
            kind,
            target: target.into(),
            foreign_key: None,
            pivot: None,
        }
    }

    /// Declare a belongs-to relation
    pub fn belongs_to<N, T>(name: N, target: T) -> RelationBuilder
    where
        N: Into<String>,
        T: Into<String>,
    {
        Self::builder(RelationKind::BelongsTo, name, target)
    }

    /// Declare a has-one relation
    pub fn has_one<N, T>(name: N, target: T) -> RelationBuilder
    where
        N: Into<String>,
        T: Into<String>,
    {
        Self::builder(RelationKind::HasOne, name, target)
    }

    /// Declare a has-many relation
    pub fn has_many<N, T>(name: N, target: T) -> RelationBuilder
    where
        N: Into<String>,
        T: Into<String>,
    {
        Self::builder(RelationKind::HasMany, name, target)
    }

    /// Declare a belongs-to-many relation
    pub fn belongs_to_many<N, T>(name: N, target: T) -> RelationBuilder
    where
        N: Into<String>,
        T: Into<String>,
    {
        Self::builder(RelationKind::BelongsToMany, name, target)
    }

    /// The foreign key column, or a configuration error naming the relation
    pub fn require_foreign_key(&self) -> Result<&str, SyncErr> {
        self.foreign_key.as_deref().ok_or_else(|| {
            config_err(format!(
                "`{}#{}` {} relation is missing a foreign key",
                self.from, self.name, self.kind
            ))
        })
    }

    /// The pivot table, or a configuration error naming the relation
    pub fn require_pivot(&self) -> Result<&PivotDef, SyncErr> {
        self.pivot.as_ref().ok_or_else(|| {
            config_err(format!(
                "`{}#{}` {} relation is missing a pivot table",
                self.from, self.name, self.kind
            ))
        })
    }
}

impl RelationBuilder {
    /// Set the foreign key column
    pub fn foreign_key<T>(mut self, column: T) -> Self
    where
        T: Into<String>,
    {
        self.foreign_key = Some(column.into());
        self
    }

    /// Set the pivot table
    pub fn via(mut self, pivot: PivotDef) -> Self {
        self.pivot = Some(pivot);
        self
    }

    pub(crate) fn build<T>(self, from: T) -> RelationDef
    where
        T: Into<String>,
    {
        RelationDef {
            name: self.name,
            kind: self.kind,
            from: from.into(),
            target: self.target,
            foreign_key: self.foreign_key,
            pivot: self.pivot,
        }
    }
}
