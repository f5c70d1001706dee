use crate::{Document, Entity, EntityCollection, SyncErr};
use serde_json::Value as JsonValue;
use std::sync::Arc;

/// Called before a pivot row is created with (parent, target, pivot row)
pub type BeforeAttach =
    Arc<dyn Fn(&Entity, &Entity, &mut Document) -> Result<(), SyncErr> + Send + Sync>;

/// Called after a to-many relation is reconciled with (existing, targets)
pub type AfterReconcile =
    Arc<dyn Fn(&EntityCollection, &EntityCollection) -> Result<(), SyncErr> + Send + Sync>;

/// How identifiers of new pivot rows are produced
#[derive(derive_more::Debug, Clone, Default)]
pub enum PivotIdStrategy {
    /// Leave the identifier to the database
    #[default]
    Database,
    /// A random UUID v4, as a string
    Uuid,
    /// A caller supplied generator
    Custom(#[debug(skip)] Arc<dyn Fn() -> JsonValue + Send + Sync>),
}

impl PivotIdStrategy {
    /// The identifier for the next pivot row; `None` lets the database decide
    pub fn generate(&self) -> Option<JsonValue> {
        match self {
            Self::Database => None,
            Self::Uuid => Some(JsonValue::String(uuid::Uuid::new_v4().to_string())),
            Self::Custom(f) => Some(f()),
        }
    }
}

/// Defines the configuration of a synchronization
///
/// Hooks are plain closures; they run inside the caller's transaction and any
/// error they return aborts the whole synchronization.
#[derive(derive_more::Debug, Clone)]
pub struct SyncOptions {
    /// Identifier generation for pivot rows
    pub(crate) pivot_id: PivotIdStrategy,
    /// Pre-creation hook for belongs-to-many pivot rows
    #[debug(skip)]
    pub(crate) before_attach: Option<BeforeAttach>,
    /// Post-reconcile hook for belongs-to-many
    #[debug(skip)]
    pub(crate) after_belongs_to_many: Option<AfterReconcile>,
    /// Post-reconcile hook for has-many
    #[debug(skip)]
    pub(crate) after_has_many: Option<AfterReconcile>,
    /// Log every write at debug level
    pub(crate) sync_logging: bool,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl SyncOptions {
    /// Default options: database assigned pivot identifiers, no hooks, logging on
    pub fn new() -> Self {
        Self {
            pivot_id: PivotIdStrategy::Database,
            before_attach: None,
            after_belongs_to_many: None,
            after_has_many: None,
            sync_logging: true,
        }
    }

    /// Set the pivot identifier strategy
    pub fn pivot_id(&mut self, value: PivotIdStrategy) -> &mut Self {
        self.pivot_id = value;
        self
    }

    /// Get the pivot identifier strategy
    pub fn get_pivot_id(&self) -> &PivotIdStrategy {
        &self.pivot_id
    }

    /// Set the hook run before each pivot row is created
    pub fn before_attach<F>(&mut self, hook: F) -> &mut Self
    where
        F: Fn(&Entity, &Entity, &mut Document) -> Result<(), SyncErr> + Send + Sync + 'static,
    {
        self.before_attach = Some(Arc::new(hook));
        self
    }

    /// Set the hook run after every belongs-to-many reconciliation
    pub fn after_belongs_to_many<F>(&mut self, hook: F) -> &mut Self
    where
        F: Fn(&EntityCollection, &EntityCollection) -> Result<(), SyncErr> + Send + Sync + 'static,
    {
        self.after_belongs_to_many = Some(Arc::new(hook));
        self
    }

    /// Set the hook run after every has-many reconciliation
    pub fn after_has_many<F>(&mut self, hook: F) -> &mut Self
    where
        F: Fn(&EntityCollection, &EntityCollection) -> Result<(), SyncErr> + Send + Sync + 'static,
    {
        self.after_has_many = Some(Arc::new(hook));
        self
    }

    /// Enable or disable per-write logging
    pub fn sync_logging(&mut self, value: bool) -> &mut Self {
        self.sync_logging = value;
        self
    }

    /// Whether per-write logging is enabled
    pub fn get_sync_logging(&self) -> bool {
        self.sync_logging
    }
}
