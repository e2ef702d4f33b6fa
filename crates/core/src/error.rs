//! Core error types for syncwire

#[derive(thiserror::Error, Debug)]
pub enum SyncError {
    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Property type mismatch: expected {expected}, found {found}")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },

    #[error("Unknown entity id: {0}")]
    UnknownEntity(u16),

    #[error("Unknown template: {0}")]
    UnknownTemplate(String),

    #[error("Authority violation: {0}")]
    AuthorityViolation(String),

    #[error("Schema mismatch: expected digest {expected:#010x}, found {found:#010x}")]
    SchemaMismatch { expected: u32, found: u32 },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, SyncError>;
