use thiserror::Error;

/// An error from an unsuccessful synchronization
///
/// Lower-layer failures are carried unchanged; the engine never retries and
/// never continues after the first failure.
#[derive(Error, Debug)]
pub enum SyncErr {
    /// A declared relation is missing required metadata
    #[error("Configuration Error: {0}")]
    Config(String),
    /// The entity kind was never registered on the [`Schema`](crate::Schema)
    #[error("Unknown Entity: {0}")]
    UnknownEntity(String),
    /// A relation value has the wrong shape, e.g. an array for a belongs-to
    #[error("Type Error: {0}")]
    Type(String),
    /// An entity needed an identifier to link a relation but had none
    #[error("Missing Identifier: {0}")]
    MissingIdentifier(String),
    /// A primary key or unique constraint rejected a write
    #[error("Unique Constraint Violation: {0}")]
    UniqueConstraintViolation(String),
    /// An update matched no row
    #[error("None of the records are updated")]
    RecordNotUpdated,
    /// A row expected to exist was not found
    #[error("RecordNotFound Error: {0}")]
    RecordNotFound(String),
    /// Raised by a user supplied hook
    #[error("Hook Error: {0}")]
    Hook(String),
    /// Failure inside a backend that is not a database error
    #[error("Execution Error: {0}")]
    Exec(String),
    /// Error from the SeaORM connection, unchanged
    #[cfg(feature = "with-sea-orm")]
    #[error(transparent)]
    Db(#[from] sea_orm::DbErr),
}

impl SyncErr {
    /// Whether this error reports a unique or primary key violation,
    /// regardless of the backend that raised it
    pub fn is_unique_violation(&self) -> bool {
        match self {
            Self::UniqueConstraintViolation(_) => true,
            #[cfg(feature = "with-sea-orm")]
            Self::Db(err) => matches!(
                err.sql_err(),
                Some(sea_orm::SqlErr::UniqueConstraintViolation(_))
            ),
            _ => false,
        }
    }
}

pub(crate) fn config_err<T>(s: T) -> SyncErr
where
    T: ToString,
{
    SyncErr::Config(s.to_string())
}

pub(crate) fn type_err<T>(s: T) -> SyncErr
where
    T: ToString,
{
    SyncErr::Type(s.to_string())
}

pub(crate) fn exec_err<T>(s: T) -> SyncErr
where
    T: ToString,
{
    SyncErr::Exec(s.to_string())
}
