use crate::git::GitError;

/// Failure of an archive operation.
#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    /// The caller supplied a URL or entry name the archive will not accept.
    #[error("{0}")]
    InvalidInput(String),

    /// git failed; the message is git's own diagnostic output.
    #[error(transparent)]
    ExternalToolFailure(#[from] GitError),

    /// A filesystem operation on the archive failed.
    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    /// A blocking filesystem scan panicked or was cancelled.
    #[error("background scan failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl ArchiveError {
    pub(crate) fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }
}

pub type Result<T, E = ArchiveError> = std::result::Result<T, E>;
