//! Error types for the profile engine.
//!
//! Two error enums, matching the two layers of the system: `EdgarError`
//! covers transport-level failures out of the EDGAR client, and `EngineError`
//! covers aggregation-level failures. Parsers, the relationship extractor,
//! and the metrics engine never return an `Err` to their callers — per §4.C
//! and §7, malformed or missing input becomes an `available: false` partial
//! with a warning, not a propagated error.

use thiserror::Error;

/// Errors produced by the EDGAR HTTP client (component A).
#[derive(Error, Debug)]
pub enum EdgarError {
    #[error("HTTP request failed: {0}")]
    Network(#[from] reqwest::Error),

    #[error("resource not found")]
    NotFound,

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("rate limit exceeded after retries")]
    RateLimited,

    #[error("upstream server error after retries: {0}")]
    Upstream(String),

    #[error("request timed out")]
    Timeout,

    #[error("configuration error: {0}")]
    ConfigError(String),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type EdgarResult<T> = std::result::Result<T, EdgarError>;

/// Failure reason codes recorded by the Quality Gate's failure tracker (§4.G).
///
/// This is a closed enum rather than a string so that batch-retry commands
/// ("retry all failed tickers") can match on reason without parsing text.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum FailureReason {
    #[error("company not found")]
    CompanyNotFound,
    #[error("CIK lookup failed")]
    CikLookupFailed,
    #[error("no filings available")]
    NoFilings,
    #[error("filing fetch error")]
    FilingFetchError,
    #[error("data extraction error")]
    DataExtractionError,
    #[error("insufficient data")]
    InsufficientData,
    #[error("AI analysis failed")]
    AiAnalysisFailed,
    #[error("profile save error")]
    ProfileSaveError,
    #[error("timeout")]
    TimeoutError,
    #[error("cancelled")]
    Cancelled,
    #[error("unknown error")]
    UnknownError,
}

/// Errors produced above the EDGAR client: cache, aggregation, validation,
/// storage, and batch control (components B, F–I).
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("edgar client error: {0}")]
    Edgar(#[from] EdgarError),

    #[error("cache write failed: {0}")]
    CacheWriteFailed(String),

    #[error("ticker failed: {reason:?}: {message}")]
    TickerFailed {
        reason: FailureReason,
        message: String,
    },

    #[error("persistence error: {0}")]
    Storage(String),

    #[error("configuration error: {0}")]
    ConfigError(String),

    #[error("aggregation cancelled")]
    Cancelled,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type EngineResult<T> = std::result::Result<T, EngineError>;

impl EngineError {
    /// Maps an engine error onto the failure reason taxonomy, for recording
    /// in the failure tracker.
    pub fn reason(&self) -> FailureReason {
        match self {
            EngineError::Edgar(EdgarError::NotFound) => FailureReason::CompanyNotFound,
            EngineError::Edgar(_) => FailureReason::FilingFetchError,
            EngineError::Storage(_) => FailureReason::ProfileSaveError,
            EngineError::TickerFailed { reason, .. } => *reason,
            EngineError::Cancelled => FailureReason::Cancelled,
            EngineError::ConfigError(_) => FailureReason::UnknownError,
            EngineError::CacheWriteFailed(_) => FailureReason::UnknownError,
            EngineError::Io(_) | EngineError::Json(_) => FailureReason::DataExtractionError,
        }
    }
}

/// Process exit codes for the batch/CLI surface (§6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
    Success = 0,
    ConfigError = 2,
    StoreUnreachable = 3,
    PartialSuccess = 4,
    Cancelled = 5,
}
