use thiserror::Error;

/// Unified error type for the entire portfolio-dashboard-core library.
/// Every public function returns `Result<T, CoreError>`.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CoreError {
    // ── API / Network ───────────────────────────────────────────────
    #[error("API error ({status}): {}", detail.as_deref().unwrap_or("request failed"))]
    Api {
        status: u16,
        detail: Option<String>,
    },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    // ── Persistence ─────────────────────────────────────────────────
    #[error("Storage error: {0}")]
    Storage(String),

    // ── Client-side checks ──────────────────────────────────────────
    #[error("Validation failed: {0}")]
    ValidationError(String),

    #[error("Invalid file format: {0}")]
    InvalidFileFormat(String),

    #[error("No portfolio selected")]
    NoPortfolioSelected,

    #[error("Not found: {0}")]
    NotFound(String),

    // ── View ────────────────────────────────────────────────────────
    #[error("Render failed: {0}")]
    Render(String),
}

/// Coarse classification used when deciding how a failure is surfaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Transport or server failure. Shown inline for reads, as a notification for writes.
    Remote,
    /// Rejected before any request was sent.
    Validation,
    /// Persisted cache could not be read or written.
    Storage,
    /// A view could not be produced.
    Render,
}

impl CoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CoreError::Api { .. }
            | CoreError::Network(_)
            | CoreError::Serialization(_)
            | CoreError::Deserialization(_) => ErrorKind::Remote,
            CoreError::ValidationError(_)
            | CoreError::InvalidFileFormat(_)
            | CoreError::NoPortfolioSelected
            | CoreError::NotFound(_) => ErrorKind::Validation,
            CoreError::Storage(_) => ErrorKind::Storage,
            CoreError::Render(_) => ErrorKind::Render,
        }
    }

    /// The server-provided detail when there is one, otherwise the display message.
    pub fn user_detail(&self) -> String {
        match self {
            CoreError::Api {
                detail: Some(detail),
                ..
            } => detail.clone(),
            other => other.to_string(),
        }
    }
}

// ── Conversion helpers (From impls) ─────────────────────────────────

impl From<std::io::Error> for CoreError {
    fn from(e: std::io::Error) -> Self {
        CoreError::Storage(e.to_string())
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(e: serde_json::Error) -> Self {
        CoreError::Deserialization(e.to_string())
    }
}

impl From<reqwest::Error> for CoreError {
    fn from(e: reqwest::Error) -> Self {
        // reqwest errors embed the full URL; portfolio ids travel in the query string.
        let msg = e.to_string();
        let sanitized = if let Some(idx) = msg.find('?') {
            format!("{}?<query redacted>", &msg[..idx])
        } else {
            msg
        };
        CoreError::Network(sanitized)
    }
}
