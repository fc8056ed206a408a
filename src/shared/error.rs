use super::validation::ValidationFailureKind;
use std::fmt;

const GENERIC_USER_MESSAGE: &str = "Something went wrong!";

#[derive(Debug, Clone, PartialEq)]
pub enum AppError {
    Network(String),
    NotFound(String),
    ValidationError {
        kind: ValidationFailureKind,
        message: String,
    },
    Conflict(String),
    DeserializationError(String),
    ConfigurationError(String),
    Internal(String),
}

impl AppError {
    pub fn validation(kind: ValidationFailureKind, message: impl Into<String>) -> Self {
        AppError::ValidationError {
            kind,
            message: message.into(),
        }
    }

    pub fn validation_kind(&self) -> Option<ValidationFailureKind> {
        match self {
            AppError::ValidationError { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    /// 対象がすでに存在しない場合は無害な no-op として扱う
    pub fn is_benign(&self) -> bool {
        matches!(self, AppError::NotFound(_))
    }

    /// 再試行で回復しうるエラーか
    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::Network(_) | AppError::Conflict(_))
    }

    /// ワンショット通知に表示する文言
    pub fn user_message(&self) -> String {
        match self {
            AppError::ValidationError { message, .. } => message.clone(),
            AppError::Conflict(_) => "Please wait for the previous action to finish".to_string(),
            AppError::NotFound(_) => "This item is no longer available".to_string(),
            _ => GENERIC_USER_MESSAGE.to_string(),
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Network(msg) => write!(f, "Network error: {}", msg),
            AppError::NotFound(msg) => write!(f, "Not found: {}", msg),
            AppError::ValidationError { kind, message } => {
                write!(f, "Validation error ({}): {}", kind, message)
            }
            AppError::Conflict(msg) => write!(f, "Conflict: {}", msg),
            AppError::DeserializationError(msg) => write!(f, "Deserialization error: {}", msg),
            AppError::ConfigurationError(msg) => write!(f, "Configuration error: {}", msg),
            AppError::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for AppError {}

impl From<String> for AppError {
    fn from(err: String) -> Self {
        AppError::Internal(err)
    }
}

impl From<&str> for AppError {
    fn from(err: &str) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::DeserializationError(err.to_string())
    }
}

impl From<tokio::task::JoinError> for AppError {
    fn from(err: tokio::task::JoinError) -> Self {
        AppError::Internal(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
