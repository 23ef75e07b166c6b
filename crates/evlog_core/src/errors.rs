use thiserror::Error;

#[derive(Debug, Error)]
pub enum LogError {
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON: {0}")]
    SerdeJson(#[from] serde_json::Error),

    #[error("Persist: {0}")]
    Persist(#[from] tempfile::PersistError),

    /// A type code the length table cannot resolve; every later offset would be wrong.
    #[error("unresolved type code 0x{code:02x} at offset {offset}")]
    UnresolvedType { code: u8, offset: u64 },

    #[error("length table declares {declared} bytes for type 0x{code:02x}, decoder needs {expected}")]
    CatalogMismatch { code: u8, declared: u32, expected: u32 },

    #[error("bad index sidecar: {0}")]
    BadSidecar(String),

    #[error("index sidecar does not match the log")]
    StaleSidecar,

    #[error("invalid input: {0}")]
    InvalidInput(String),
}

pub type Result<T> = std::result::Result<T, LogError>;
