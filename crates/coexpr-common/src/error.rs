use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoexprError {
    /// A required identifier or mode parameter is missing or malformed.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// An identifier matched nothing in the queried collaborator.
    #[error("Entity not found: {0}")]
    NotFound(String),

    /// Transient collaborator failure while fetching one entity.
    #[error("Failed to fetch {entity}: {reason}")]
    FetchFailure { entity: String, reason: String },

    #[error("Vector length mismatch: {left} vs {right}")]
    LengthMismatch { left: usize, right: usize },

    /// The observation or pair source itself could not be reached.
    #[error("Data source error: {0}")]
    Source(String),

    /// The progress consumer went away before processing finished.
    #[error("Request cancelled: progress consumer disconnected")]
    Cancelled,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl CoexprError {
    /// Short machine-friendly kind, used as the `error` field of fatal events.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => "invalid_input",
            Self::NotFound(_) => "not_found",
            Self::FetchFailure { .. } => "fetch_failure",
            Self::LengthMismatch { .. } => "length_mismatch",
            Self::Source(_) => "source_unavailable",
            Self::Cancelled => "cancelled",
            Self::Io(_) | Self::Csv(_) | Self::Serialization(_) => "io",
            Self::Config(_) => "config",
            Self::Other(_) => "internal",
        }
    }

    /// Human-readable details for the `{error, details}` surface.
    pub fn details(&self) -> String {
        self.to_string()
    }

    /// Errors that only affect a single pair and must not abort a page.
    pub fn is_pair_scoped(&self) -> bool {
        matches!(self, Self::NotFound(_) | Self::FetchFailure { .. })
    }
}

pub type Result<T> = std::result::Result<T, CoexprError>;
