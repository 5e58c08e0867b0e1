use thiserror::Error;

pub type Result<T> = std::result::Result<T, ForensicsError>;

#[derive(Debug, Error)]
pub enum ForensicsError {
    /// History source unreadable, malformed commit data, empty window or timeout.
    #[error("extraction error: {0}")]
    Extraction(String),
    /// Not enough data for one metric; local to the file or metric named by `subject`.
    #[error("insufficient history for {subject}: {reason}")]
    InsufficientHistory { subject: String, reason: String },
    #[error("configuration error: {0}")]
    Configuration(String),
    /// A single historical content lookup failed; the sample is skipped.
    #[error("snapshot retrieval failed for {path}@{commit}: {reason}")]
    SnapshotRetrieval {
        commit: String,
        path: String,
        reason: String,
    },
    #[error("calibration store error: {0}")]
    Calibration(#[from] rusqlite::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ForensicsError {
    pub fn extraction(message: impl Into<String>) -> Self {
        Self::Extraction(message.into())
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    pub fn insufficient(subject: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InsufficientHistory {
            subject: subject.into(),
            reason: reason.into(),
        }
    }

    /// Whole-run fatal errors stop the pipeline; the rest are reported per entity.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            Self::InsufficientHistory { .. } | Self::SnapshotRetrieval { .. }
        )
    }
}

impl From<git2::Error> for ForensicsError {
    fn from(err: git2::Error) -> Self {
        Self::Extraction(format!("Git error: {err}"))
    }
}
