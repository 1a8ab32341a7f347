//! Error types for the store layer.

use std::path::PathBuf;

use chatline_protocol::ProtocolError;

/// Errors that can occur while reading or writing client-side storage.
///
/// Note that *malformed* stored data is not an error; [`SessionStore::load`]
/// treats it as absence. These variants cover the medium itself failing.
///
/// [`SessionStore::load`]: crate::SessionStore::load
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Reading, writing, or renaming the backing file failed.
    #[error("storage I/O failed for {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The backing file's contents could not be serialized.
    #[error("failed to serialize store contents: {0}")]
    Serialize(#[from] serde_json::Error),

    /// A stored value could not be encoded.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
