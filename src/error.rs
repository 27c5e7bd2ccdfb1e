//! Error types shared by the HTTP client, the query cache and mutations.

use thiserror::Error;

/// Error type for API requests, queries and mutations.
///
/// The type is `Clone` because a single in-flight request is shared by every
/// subscriber of its key, and each of them receives its own copy of the
/// outcome.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// No response was received (connection refused, timeout, broken body).
    #[error("Network error: {0}")]
    Network(String),

    /// The server answered with a non-2xx status.
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    /// The server answered 2xx but reported `success: false`.
    #[error("Request failed: {0}")]
    Application(String),

    /// The response body did not have the expected shape.
    #[error("Decode error: {0}")]
    Decode(String),

    /// A required input was missing.
    #[error("Missing required input: {0}")]
    MissingInput(&'static str),

    /// The query client was disposed before the request settled.
    #[error("Query client disposed")]
    Disposed,
}

impl ApiError {
    /// Returns `true` for failures that a read is allowed to retry once.
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Network(_) | Self::Http { .. } | Self::Application(_)
        )
    }

    /// Returns the HTTP status code, if the error came from one.
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Localized message for inline error states.
    pub fn user_message(&self) -> String {
        match self {
            Self::Network(_) => "Não foi possível conectar ao servidor. Tente novamente.".to_string(),
            Self::Http { status, .. } if *status >= 500 => {
                format!("Erro no servidor ({status}). Tente novamente mais tarde.")
            }
            Self::Http { status, .. } => format!("Erro ao carregar dados ({status})."),
            Self::Application(msg) => format!("Erro ao processar a requisição: {msg}"),
            Self::Decode(_) => "Resposta inesperada do servidor.".to_string(),
            Self::MissingInput(field) => format!("Campo obrigatório ausente: {field}"),
            Self::Disposed => "Operação cancelada.".to_string(),
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if let Some(status) = err.status() {
            Self::Http {
                status: status.as_u16(),
                message: err.to_string(),
            }
        } else if err.is_decode() {
            Self::Decode(err.to_string())
        } else {
            Self::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(err.to_string())
    }
}

/// Error type for configuration loading.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var} is not a valid URL: {value}")]
    InvalidUrl { var: &'static str, value: String },

    #[error("{var} must be a number of milliseconds, got {value}")]
    InvalidDuration { var: &'static str, value: String },

    #[error("{var} must be `production` or `development`, got {value}")]
    InvalidProfile { var: &'static str, value: String },
}

/// Failure to read or write a [`crate::persist::KeyValueStore`].
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("store file is not a JSON object")]
    NotAnObject,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ApiError::Network("connection refused".to_string());
        assert_eq!(err.to_string(), "Network error: connection refused");

        let err = ApiError::Http {
            status: 502,
            message: "bad gateway".to_string(),
        };
        assert_eq!(err.to_string(), "HTTP 502: bad gateway");

        let err = ApiError::Application("Failed to fetch retry data".to_string());
        assert_eq!(err.to_string(), "Request failed: Failed to fetch retry data");
    }

    #[test]
    fn test_retryable() {
        assert!(ApiError::Network("x".into()).is_retryable());
        assert!(
            ApiError::Http {
                status: 500,
                message: String::new()
            }
            .is_retryable()
        );
        assert!(ApiError::Application("x".into()).is_retryable());
        assert!(!ApiError::Decode("x".into()).is_retryable());
        assert!(!ApiError::MissingInput("telefone").is_retryable());
        assert!(!ApiError::Disposed.is_retryable());
    }

    #[test]
    fn test_status() {
        let err = ApiError::Http {
            status: 404,
            message: "not found".into(),
        };
        assert_eq!(err.status(), Some(404));
        assert_eq!(ApiError::Network("x".into()).status(), None);
    }

    #[test]
    fn test_user_message_is_localized() {
        let err = ApiError::Http {
            status: 503,
            message: String::new(),
        };
        assert!(err.user_message().contains("Erro no servidor (503)"));
        assert!(
            ApiError::MissingInput("telefone")
                .user_message()
                .ends_with("telefone")
        );
    }
}
