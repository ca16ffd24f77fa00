//! Ride API client error types.

use std::fmt;

/// Errors from the ride backend HTTP client.
#[derive(Debug)]
pub enum ApiError {
    /// No connectivity. Reported before any request is attempted; consumes
    /// no retries.
    NetworkUnavailable,

    /// A transient failure (timeout, connection error, 5xx) that survived
    /// the full retry budget. Carries the last underlying error.
    Transient {
        attempts: u32,
        message: String,
    },

    /// Authentication could not be recovered: the 401 persisted after a
    /// token refresh, or no refresh token was available.
    AuthExpired,

    /// HTTP request failed outside the retry loop.
    Http(reqwest::Error),

    /// API returned a non-retryable error status code.
    Api { status: u16, message: String },

    /// JSON deserialization failed.
    Json { message: String },
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::NetworkUnavailable => write!(f, "network unavailable"),
            ApiError::Transient { attempts, message } => {
                write!(f, "transient failure after {attempts} attempts: {message}")
            }
            ApiError::AuthExpired => write!(f, "authentication expired"),
            ApiError::Http(e) => write!(f, "HTTP error: {e}"),
            ApiError::Api { status, message } => write!(f, "API error {status}: {message}"),
            ApiError::Json { message } => write!(f, "JSON parse error: {message}"),
        }
    }
}

impl std::error::Error for ApiError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ApiError::Http(e) => Some(e),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        ApiError::Http(err)
    }
}

impl ApiError {
    /// Whether the caller should suggest "check your connection" rather
    /// than "try again". Search exhaustion and timeouts are not `ApiError`s
    /// at all, so everything here except auth failures is connectivity.
    pub fn is_connectivity(&self) -> bool {
        matches!(
            self,
            ApiError::NetworkUnavailable | ApiError::Transient { .. } | ApiError::Http(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        assert_eq!(
            ApiError::NetworkUnavailable.to_string(),
            "network unavailable"
        );

        let err = ApiError::Transient {
            attempts: 3,
            message: "timed out".into(),
        };
        assert_eq!(
            err.to_string(),
            "transient failure after 3 attempts: timed out"
        );

        let err = ApiError::Api {
            status: 500,
            message: "Internal Server Error".into(),
        };
        assert_eq!(err.to_string(), "API error 500: Internal Server Error");
    }

    #[test]
    fn connectivity_classification() {
        assert!(ApiError::NetworkUnavailable.is_connectivity());
        assert!(
            ApiError::Transient {
                attempts: 3,
                message: "503".into()
            }
            .is_connectivity()
        );
        assert!(!ApiError::AuthExpired.is_connectivity());
        assert!(
            !ApiError::Api {
                status: 404,
                message: String::new()
            }
            .is_connectivity()
        );
    }
}
