//! Error types for the application root and its databases.

use thiserror::Error;

/// Result type alias for database and registry operations.
pub type DbResult<T> = Result<T, DbError>;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("failed to open database: {0}")]
    Open(String),

    #[error("transaction error: {0}")]
    Transaction(String),

    #[error("table error: {0}")]
    Table(String),

    #[error("read error: {0}")]
    Read(String),

    #[error("write error: {0}")]
    Write(String),

    #[error("serialization error: {0}")]
    Serialize(String),

    #[error("deserialization error: {0}")]
    Deserialize(String),

    #[error("not found: {0}")]
    NotFound(String),

    /// An async utility is already registered under this id.
    #[error("an async utility already exists with id {0}")]
    DuplicateIdentifier(String),

    #[error("no async utility registered with id {0}")]
    UnknownIdentifier(String),

    #[error("unknown utility factory: {0}")]
    UnknownFactory(String),

    #[error("invalid utility settings: {0}")]
    UtilitySettings(String),
}
