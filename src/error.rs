//! Error types for each stage of the cross-check pipeline.

use std::path::PathBuf;

use thiserror::Error;

use crate::types::ImageRole;

/// Shown instead of the raw error when the model service reports overload.
pub const OVERLOADED_MESSAGE: &str =
    "The AI service is overloaded right now (error 429). Please wait a few moments and try again.";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error(
        "{0} not set. Create a .env file with:\n\
         AZURE_OPENAI_ENDPOINT=your_endpoint\n\
         AZURE_OPENAI_API_KEY=your_api_key\n\
         AZURE_OPENAI_DEPLOYMENT=gpt-4.1"
    )]
    Missing(&'static str),

    #[error("Invalid value for {var}: {value:?}")]
    InvalidValue { var: &'static str, value: String },
}

/// Failure talking to the vision-language model service.
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Model service is rate limited (429)")]
    RateLimited,

    #[error("Model service rejected the credentials ({0}). Invalid key or endpoint?")]
    Unauthorized(u16),

    #[error("Model service failed ({status}): {message}")]
    Status { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Model service timed out. Check your internet connection and try again.")]
    Timeout,

    #[error("Invalid response from model service: {0}")]
    InvalidResponse(String),

    #[error("Model service returned an empty reply")]
    EmptyReply,
}

impl ServiceError {
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, ServiceError::RateLimited)
    }
}

impl From<reqwest::Error> for ServiceError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ServiceError::Timeout
        } else if e.is_connect() {
            ServiceError::Network("Check your internet connection and try again.".to_string())
        } else if e.is_decode() {
            ServiceError::InvalidResponse(e.to_string())
        } else {
            ServiceError::Network(e.to_string())
        }
    }
}

#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("Image is empty")]
    EmptyImage,

    #[error("Unsupported image format: {0}")]
    UnsupportedFormat(String),

    #[error("Image too large ({bytes} bytes, max {limit})")]
    TooLarge { bytes: u64, limit: u64 },

    #[error("Could not read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Service(#[from] ServiceError),
}

#[derive(Error, Debug)]
pub enum ReconciliationError {
    #[error("{0} extraction text is empty")]
    EmptyInput(ImageRole),

    #[error(transparent)]
    Service(#[from] ServiceError),
}

impl ReconciliationError {
    /// Text to show the user: overload gets a fixed remediation hint,
    /// everything else its own description.
    pub fn user_message(&self) -> String {
        match self {
            ReconciliationError::Service(e) if e.is_rate_limited() => OVERLOADED_MESSAGE.to_string(),
            other => other.to_string(),
        }
    }
}

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Analyze the {0} image first")]
    MissingExtraction(ImageRole),

    #[error("Extraction failed: {0}")]
    Extraction(#[from] ExtractionError),

    #[error("Reconciliation failed: {0}")]
    Reconciliation(#[from] ReconciliationError),
}

impl SessionError {
    pub fn user_message(&self) -> String {
        match self {
            SessionError::Reconciliation(e) => format!("Reconciliation failed: {}", e.user_message()),
            other => other.to_string(),
        }
    }
}

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("Could not write report to {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
