use std::error::Error;
use thiserror::Error;

/// Result alias for durable store operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Failure reported by a [`ClaimStore`](crate::dao::claim_store::ClaimStore)
/// backend, whatever database sits behind it.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The backend is known to be unreachable; nothing was attempted.
    #[error("{backend} store is offline")]
    Offline { backend: &'static str },
    /// The backend was reached but the operation failed.
    #[error("{backend} store failed: {message}")]
    Backend {
        backend: &'static str,
        message: String,
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },
}

impl StorageError {
    /// Wrap a backend failure, keeping its message for log lines.
    pub fn backend(
        backend: &'static str,
        message: String,
        source: impl Error + Send + Sync + 'static,
    ) -> Self {
        StorageError::Backend {
            backend,
            message,
            source: Box::new(source),
        }
    }
}
