use drawx_core::OpError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Encode(#[from] bincode::error::EncodeError),
    #[error("Deserialization error: {0}")]
    Decode(#[from] bincode::error::DecodeError),
    #[error("Compression error: {0}")]
    Compression(String),
    #[error(transparent)]
    Op(#[from] OpError),
    #[error("Corrupt log at record {sequence}: {reason}")]
    Corrupt { sequence: u64, reason: String },
    #[error("Backend not compiled in: {0}")]
    BackendUnavailable(&'static str),
    #[cfg(feature = "rocksdb")]
    #[error("Database error: {0}")]
    Database(#[from] rocksdb::Error),
    #[error("Connect failed after {attempts} attempt(s): {reason}")]
    ConnectFailed { attempts: u32, reason: String },
    #[error("Store is closed")]
    Closed,
}

impl StoreError {
    /// True when the error came from an op targeting a stroke that is gone.
    pub fn is_unknown_stroke(&self) -> bool {
        matches!(self, StoreError::Op(OpError::UnknownStroke(_)))
    }
}
