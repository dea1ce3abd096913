//! Error types for vigil operations.
//!
//! Detection and scheduling are infallible; errors surface from the queue
//! stores, configuration loading, the delivery state machine and the
//! collaborators it talks to.

use std::collections::HashMap;
use thiserror::Error;

/// Result type alias for vigil operations.
pub type VigilResult<T> = Result<T, VigilError>;

/// Main error type for all vigil operations.
#[derive(Error, Debug)]
pub enum VigilError {
    /// Input validation failed.
    #[error("Validation error: {message}")]
    Validation {
        message: String,
        code: ErrorCode,
        details: HashMap<String, String>,
        suggestion: Option<String>,
    },

    /// Queue entry or workspace not found.
    #[error("Not found: {message}")]
    NotFound {
        message: String,
        code: ErrorCode,
        entry_id: Option<String>,
    },

    /// Queue store operation failed.
    #[error("Database error: {message}")]
    Database {
        message: String,
        code: ErrorCode,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The delivery state machine rejected an action in its current state.
    #[error("Invalid transition: cannot {action} while {from}")]
    InvalidTransition { from: String, action: String },

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Network error talking to a remote queue or collaborator.
    #[error("Network error: {message}")]
    Network {
        message: String,
        code: ErrorCode,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// External collaborator (handoff, feedback sink) failed.
    #[error("Collaborator error: {message}")]
    Collaborator { message: String, code: ErrorCode },

    /// Parse error.
    #[error("Parse error: {message}")]
    Parse { message: String, code: ErrorCode },

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Error codes for programmatic handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    // Validation (VAL_xxx)
    ValInvalidInput,
    ValMissingField,
    ValInvalidFormat,

    // Queue (QUE_xxx)
    QueEntryNotFound,
    QueWorkspaceNotFound,
    QueCorrupted,

    // Delivery (DLV_xxx)
    DlvInvalidTransition,
    DlvHandoffFailed,

    // Feedback (FBK_xxx)
    FbkMirrorFailed,

    // Database (DB_xxx)
    DbConnectionFailed,
    DbOperationFailed,

    // Network (NET_xxx)
    NetTimeout,
    NetConnectionFailed,

    // Parse (PARSE_xxx)
    ParseInvalidJson,
    ParseInvalidTimestamp,

    // Internal
    Internal,
}

impl ErrorCode {
    /// Get the string representation of the error code.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::ValInvalidInput => "VAL_001",
            ErrorCode::ValMissingField => "VAL_002",
            ErrorCode::ValInvalidFormat => "VAL_003",
            ErrorCode::QueEntryNotFound => "QUE_001",
            ErrorCode::QueWorkspaceNotFound => "QUE_002",
            ErrorCode::QueCorrupted => "QUE_003",
            ErrorCode::DlvInvalidTransition => "DLV_001",
            ErrorCode::DlvHandoffFailed => "DLV_002",
            ErrorCode::FbkMirrorFailed => "FBK_001",
            ErrorCode::DbConnectionFailed => "DB_001",
            ErrorCode::DbOperationFailed => "DB_002",
            ErrorCode::NetTimeout => "NET_001",
            ErrorCode::NetConnectionFailed => "NET_002",
            ErrorCode::ParseInvalidJson => "PARSE_001",
            ErrorCode::ParseInvalidTimestamp => "PARSE_002",
            ErrorCode::Internal => "INT_001",
        }
    }
}

impl VigilError {
    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            code: ErrorCode::ValInvalidInput,
            details: HashMap::new(),
            suggestion: None,
        }
    }

    /// Create a validation error for a missing required field.
    pub fn missing_field(field: &str) -> Self {
        let mut details = HashMap::new();
        details.insert("field".to_string(), field.to_string());
        Self::Validation {
            message: format!("'{}' must not be empty", field),
            code: ErrorCode::ValMissingField,
            details,
            suggestion: Some(format!("Provide a non-empty '{}'", field)),
        }
    }

    /// Create a not found error for a queue entry.
    pub fn not_found(entry_id: impl Into<String>) -> Self {
        let id = entry_id.into();
        Self::NotFound {
            message: format!("Queue entry with id '{}' not found", id),
            code: ErrorCode::QueEntryNotFound,
            entry_id: Some(id),
        }
    }

    /// Create an invalid transition error.
    pub fn invalid_transition(from: impl std::fmt::Display, action: impl Into<String>) -> Self {
        Self::InvalidTransition {
            from: from.to_string(),
            action: action.into(),
        }
    }

    /// Create a database error.
    pub fn database(message: impl Into<String>) -> Self {
        Self::Database {
            message: message.into(),
            code: ErrorCode::DbOperationFailed,
            source: None,
        }
    }

    /// Create a queue corruption error.
    pub fn corrupted(message: impl Into<String>) -> Self {
        Self::Database {
            message: message.into(),
            code: ErrorCode::QueCorrupted,
            source: None,
        }
    }

    /// Create a parse error.
    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse {
            message: message.into(),
            code: ErrorCode::ParseInvalidJson,
        }
    }

    /// Create a timestamp parse error.
    pub fn timestamp(message: impl Into<String>) -> Self {
        Self::Parse {
            message: message.into(),
            code: ErrorCode::ParseInvalidTimestamp,
        }
    }

    /// Create an API/network error.
    pub fn api(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
            code: ErrorCode::NetConnectionFailed,
            source: None,
        }
    }

    /// Create a handoff failure.
    pub fn handoff(message: impl Into<String>) -> Self {
        Self::Collaborator {
            message: message.into(),
            code: ErrorCode::DlvHandoffFailed,
        }
    }

    /// Create a feedback mirror failure.
    pub fn feedback(message: impl Into<String>) -> Self {
        Self::Collaborator {
            message: message.into(),
            code: ErrorCode::FbkMirrorFailed,
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Get the error code.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Validation { code, .. } => *code,
            Self::NotFound { code, .. } => *code,
            Self::Database { code, .. } => *code,
            Self::InvalidTransition { .. } => ErrorCode::DlvInvalidTransition,
            Self::Network { code, .. } => *code,
            Self::Collaborator { code, .. } => *code,
            Self::Parse { code, .. } => *code,
            _ => ErrorCode::Internal,
        }
    }

    /// Get a user-friendly suggestion for resolving this error.
    pub fn suggestion(&self) -> Option<&str> {
        match self {
            Self::Validation { suggestion, .. } => suggestion.as_deref(),
            Self::NotFound { .. } => Some("Please check the entry ID and workspace"),
            Self::InvalidTransition { .. } => Some("Check the bubble state before acting on it"),
            Self::Network { .. } => Some("Please check the queue server address"),
            _ => None,
        }
    }

    /// Convert from HTTP status code (for client errors).
    pub fn from_http_status(status: u16, body: &str) -> Self {
        match status {
            400 | 422 => Self::Validation {
                message: body.to_string(),
                code: ErrorCode::ValInvalidInput,
                details: HashMap::new(),
                suggestion: Some("Please check your request parameters".to_string()),
            },
            404 => Self::NotFound {
                message: body.to_string(),
                code: ErrorCode::QueEntryNotFound,
                entry_id: None,
            },
            409 => Self::InvalidTransition {
                from: "remote".to_string(),
                action: body.to_string(),
            },
            _ => Self::Internal(format!("HTTP {}: {}", status, body)),
        }
    }
}

impl From<rusqlite::Error> for VigilError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Database {
            message: err.to_string(),
            code: ErrorCode::DbOperationFailed,
            source: Some(Box::new(err)),
        }
    }
}
