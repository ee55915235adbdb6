use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("{0}")]
    InvalidInput(String),

    #[error("Min {min} texts, got {got}.")]
    TooFewTexts { min: usize, got: usize },

    #[error("Max {max} texts, got {got}.")]
    TooManyTexts { max: usize, got: usize },

    #[error("Unknown granularity '{0}' (expected low, medium or high).")]
    InvalidGranularity(String),

    #[error("Job {0} not found or expired.")]
    JobNotFound(String),

    #[error("Cached job {0} not found or expired.")]
    CachedJobNotFound(String),

    #[error("Concurrent job limit reached ({0}). Wait for running jobs to finish.")]
    QueueFull(usize),

    #[error("Stale write for job {job_id}: expected version {expected}, found {found}.")]
    Conflict { job_id: String, expected: u64, found: u64 },

    #[error("{0}")]
    NotAvailable(String),

    #[error("{0}")]
    BackendRequired(String),

    #[error("Suggestion service unavailable: {0}")]
    LlmUnavailable(String),

    /// Carries a client-safe message only; details go to the log.
    #[error("{0}")]
    Pipeline(String),
}

impl Error {
    /// Wire code of the error taxonomy.
    pub fn code(&self) -> &'static str {
        match self {
            Error::InvalidInput(_) => "INVALID_INPUT",
            Error::TooFewTexts { .. } => "TOO_FEW_TEXTS",
            Error::TooManyTexts { .. } => "TOO_MANY_TEXTS",
            Error::InvalidGranularity(_) => "INVALID_GRANULARITY",
            Error::JobNotFound(_) => "JOB_NOT_FOUND",
            Error::CachedJobNotFound(_) => "CACHED_JOB_NOT_FOUND",
            Error::QueueFull(_) => "QUEUE_FULL",
            Error::Conflict { .. } => "CONFLICT",
            Error::NotAvailable(_) => "NOT_AVAILABLE",
            Error::BackendRequired(_) => "BACKEND_REQUIRED",
            Error::LlmUnavailable(_) => "LLM_UNAVAILABLE",
            Error::Pipeline(_) => "PIPELINE_ERROR",
        }
    }

    pub fn invalid(msg: impl Into<String>) -> Self {
        Error::InvalidInput(msg.into())
    }

    pub fn pipeline(op: &str) -> Self {
        Error::Pipeline(format!("Internal error during {op}."))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
