use std::fmt;

#[derive(Debug)]
pub enum AppError {
    // Database errors
    Database(sqlx::Error),
    DatabaseError(String), // String-based database error

    // Validation errors
    ValidationError(String),

    // Business logic errors
    NotFound(String),
    Conflict(String),

    // Remote service errors
    Upstream {
        status: Option<u16>,
        message: String,
        body: Option<serde_json::Value>,
    },
    QuotaExceeded(String),
    Transient(String),

    // Internal errors
    InternalError(String),
    ConfigError(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Database(e) => write!(f, "Database error: {}", e),
            AppError::DatabaseError(msg) => write!(f, "Database error: {}", msg),
            AppError::ValidationError(msg) => write!(f, "Validation error: {}", msg),
            AppError::NotFound(msg) => write!(f, "Not found: {}", msg),
            AppError::Conflict(msg) => write!(f, "Conflict: {}", msg),
            AppError::Upstream { status, message, .. } => match status {
                Some(code) => write!(f, "Upstream error ({}): {}", code, message),
                None => write!(f, "Upstream error: {}", message),
            },
            AppError::QuotaExceeded(msg) => write!(f, "Quota exceeded: {}", msg),
            AppError::Transient(msg) => write!(f, "Transient error: {}", msg),
            AppError::InternalError(msg) => write!(f, "Internal error: {}", msg),
            AppError::ConfigError(msg) => write!(f, "Configuration error: {}", msg),
        }
    }
}

impl std::error::Error for AppError {}

impl AppError {
    /// Upstream error from a status code and parsed response body.
    pub fn upstream(status: Option<u16>, message: impl Into<String>, body: Option<serde_json::Value>) -> Self {
        AppError::Upstream {
            status,
            message: message.into(),
            body,
        }
    }

    /// Whether a retry at the transport layer may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, AppError::Transient(_))
    }

    pub fn is_quota(&self) -> bool {
        matches!(self, AppError::QuotaExceeded(_))
    }
}

// From implementations for common error types
impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::Database(err)
    }
}

impl From<std::env::VarError> for AppError {
    fn from(err: std::env::VarError) -> Self {
        AppError::ConfigError(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::InternalError(format!("JSON decode failed: {}", err))
    }
}

/// Transport-level noise (resets, aborted connections) is classified here so
/// domain code only ever sees `Transient`; platform-specific messages such as
/// "connection reset" or "network name is no longer available" never leak out.
fn is_connection_noise(message: &str) -> bool {
    let lower = message.to_lowercase();
    lower.contains("connection reset")
        || lower.contains("connection aborted")
        || lower.contains("network name is no longer available")
        || lower.contains("broken pipe")
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            return AppError::Transient(format!("request timed out: {}", err));
        }
        if err.is_connect() {
            return AppError::Transient(format!("connection failed: {}", err));
        }
        if let Some(status) = err.status() {
            if status.as_u16() == 429 {
                return AppError::QuotaExceeded(err.to_string());
            }
            return AppError::Upstream {
                status: Some(status.as_u16()),
                message: err.to_string(),
                body: None,
            };
        }
        let message = err.to_string();
        if is_connection_noise(&message) {
            tracing::debug!(error = %message, "suppressing transport noise");
            return AppError::Transient(message);
        }
        AppError::Upstream {
            status: None,
            message,
            body: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_upstream_with_status() {
        let err = AppError::upstream(Some(500), "boom", None);
        assert_eq!(err.to_string(), "Upstream error (500): boom");
    }

    #[test]
    fn test_display_upstream_without_status() {
        let err = AppError::upstream(None, "boom", None);
        assert_eq!(err.to_string(), "Upstream error: boom");
    }

    #[test]
    fn test_connection_noise_detection() {
        assert!(is_connection_noise("Connection reset by peer"));
        assert!(is_connection_noise("The specified network name is no longer available"));
        assert!(!is_connection_noise("404 not found"));
    }

    #[test]
    fn test_transient_predicate() {
        assert!(AppError::Transient("x".into()).is_transient());
        assert!(!AppError::NotFound("x".into()).is_transient());
    }
}
