use thiserror::Error;

/// Main error type for docdiff operations
#[derive(Error, Debug)]
pub enum DocdiffError {
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Template error: {0}")]
    Template(#[from] tera::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Raised by a single extraction strategy. The extractor absorbs it and
    /// moves on to the next strategy, so callers of the engine never see it.
    #[error("Extraction failed: {0}")]
    Extraction(String),

    /// The content is readable but too large to lay out. The extractor stops
    /// its strategy chain and returns the sentinel.
    #[error("Content too large: {0}")]
    LimitExceeded(String),
}

impl DocdiffError {
    pub fn document_not_found(id: impl Into<String>) -> Self {
        Self::NotFound { entity: "Document", id: id.into() }
    }

    pub fn comment_not_found(id: impl Into<String>) -> Self {
        Self::NotFound { entity: "Comment", id: id.into() }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

pub type Result<T> = std::result::Result<T, DocdiffError>;
