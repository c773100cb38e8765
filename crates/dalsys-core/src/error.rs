use thiserror::Error;

#[derive(Debug, Error)]
pub enum DalsysError {
    #[error("not initialized: run 'dalsys init'")]
    NotInitialized,

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: u64 },

    #[error("operator not found: {0}")]
    OperatorNameNotFound(String),

    #[error("action has already been committed")]
    AlreadyCommitted,

    #[error("allocation conflict: {0}")]
    AllocationConflict(String),

    #[error("drone {0} is not allocated")]
    NotAllocated(u64),

    #[error("more than one operator is named '{0}'")]
    AmbiguousOperator(String),

    #[error("{store} store cannot perform a {op} action")]
    UnsupportedAction {
        store: &'static str,
        op: &'static str,
    },

    #[error("record has no id: it must be created before it can be updated")]
    MissingId,

    #[error("invalid class '{0}': expected 1 or 2")]
    InvalidClass(String),

    #[error("unknown column '{column}' for table {table}")]
    UnknownColumn { table: &'static str, column: String },

    #[error("corrupt {table} record {id}: {reason}")]
    CorruptRecord {
        table: &'static str,
        id: u64,
        reason: String,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),
}

pub type Result<T> = std::result::Result<T, DalsysError>;
