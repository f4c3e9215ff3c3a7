use thiserror::Error;

pub type Result<T> = std::result::Result<T, BackendError>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    #[error("Insufficient privilege: {0}")]
    InsufficientPrivilege(String),

    #[error("Schema error: {0}")]
    Schema(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Database error: {0}")]
    Database(String),
}

impl BackendError {
    /// A create lost against a concurrent creator of the same path
    pub fn is_conflict(&self) -> bool {
        matches!(self, BackendError::AlreadyExists(_))
    }
}

// Store-specific errors never leave this crate
impl From<sqlx::Error> for BackendError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Io(e) => BackendError::Connection(e.to_string()),
            pool @ (sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed) => {
                BackendError::Connection(pool.to_string())
            }
            other => BackendError::Database(other.to_string()),
        }
    }
}

impl From<std::io::Error> for BackendError {
    fn from(err: std::io::Error) -> Self {
        BackendError::Connection(err.to_string())
    }
}
