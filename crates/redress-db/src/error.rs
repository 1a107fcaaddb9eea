use thiserror::Error;

/// Storage-layer error taxonomy. Business-rule violations carry
/// human-readable messages suitable for API responses.
#[derive(Debug, Error)]
pub enum DbError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    InvalidState(String),

    #[error("database lock poisoned")]
    LockPoisoned,

    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),
}

pub type DbResult<T> = Result<T, DbError>;

impl DbError {
    pub(crate) fn not_found(what: &str, id: i64) -> Self {
        DbError::NotFound(format!("{what} not found with ID: {id}"))
    }
}
