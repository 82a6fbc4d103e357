use thiserror::Error;

/// 呼叫端可區分的錯誤種類（傳給 ProgressObserver::on_error）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Submission,
    Poll,
    RemoteJobFailed,
    BatchSubmission,
    TimedOut,
    Cancelled,
    Config,
    Transport,
}

#[derive(Error, Debug)]
pub enum EnrichError {
    #[error("Validation error: {message}")]
    ValidationError { message: String },

    #[error("Submission rejected{}: {message}", batch_suffix(.batch_index))]
    SubmissionError {
        batch_index: Option<usize>,
        message: String,
    },

    #[error("Status check failed for job {job_id}{}: {message}", batch_suffix(.batch_index))]
    PollError {
        job_id: String,
        batch_index: Option<usize>,
        message: String,
    },

    #[error("Remote job {job_id}{} failed: {message}", batch_suffix(.batch_index))]
    RemoteJobFailed {
        job_id: String,
        batch_index: Option<usize>,
        message: String,
    },

    #[error("All {attempted} batch submissions failed: {}", .failures.join("; "))]
    BatchSubmissionError {
        attempted: usize,
        failures: Vec<String>,
    },

    #[error("{target} timed out after {attempts} status checks; it may still complete remotely")]
    TimedOut { target: String, attempts: u32 },

    #[error("Polling of {target} was cancelled")]
    Cancelled { target: String },

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Invalid value for {field} ({value}): {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("API returned HTTP {status}: {message}")]
    ApiError { status: u16, message: String },

    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),
}

fn batch_suffix(batch_index: &Option<usize>) -> String {
    batch_index
        .map(|index| format!(" (batch {})", index))
        .unwrap_or_default()
}

impl EnrichError {
    pub fn validation(message: impl Into<String>) -> Self {
        EnrichError::ValidationError {
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            EnrichError::ValidationError { .. } => ErrorKind::Validation,
            EnrichError::SubmissionError { .. } => ErrorKind::Submission,
            EnrichError::PollError { .. } => ErrorKind::Poll,
            EnrichError::RemoteJobFailed { .. } => ErrorKind::RemoteJobFailed,
            EnrichError::BatchSubmissionError { .. } => ErrorKind::BatchSubmission,
            EnrichError::TimedOut { .. } => ErrorKind::TimedOut,
            EnrichError::Cancelled { .. } => ErrorKind::Cancelled,
            EnrichError::ConfigError { .. } | EnrichError::InvalidConfigValueError { .. } => {
                ErrorKind::Config
            }
            EnrichError::ApiError { .. }
            | EnrichError::HttpError(_)
            | EnrichError::IoError(_)
            | EnrichError::SerializationError(_)
            | EnrichError::CsvError(_) => ErrorKind::Transport,
        }
    }

    /// 可在輪詢中重試的錯誤：網路層、無法解析的回應、5xx / 408 / 429。
    /// 其他 4xx（金鑰錯誤、job 不存在）重試也不會改變結果。
    pub fn is_transient(&self) -> bool {
        match self {
            EnrichError::ApiError { status, .. } => {
                *status >= 500 || *status == 408 || *status == 429
            }
            EnrichError::HttpError(_) | EnrichError::SerializationError(_) => true,
            _ => false,
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self.kind() {
            ErrorKind::Validation => "Fix the listed input fields and submit again",
            ErrorKind::Submission | ErrorKind::BatchSubmission => {
                "Check the API key and quota, then retry the submission"
            }
            ErrorKind::Poll => "Check network connectivity; the job may still finish remotely",
            ErrorKind::RemoteJobFailed => "The remote service rejected the job; review the input data",
            ErrorKind::TimedOut => "Increase polling.max_attempts or check the job status later",
            ErrorKind::Cancelled => "Polling was stopped on request",
            ErrorKind::Config => "Review the configuration file",
            ErrorKind::Transport => "Check the API base URL and network connectivity",
        }
    }
}

pub type Result<T> = std::result::Result<T, EnrichError>;
