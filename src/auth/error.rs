// Authentication Error Types
// Error handling for session decoding, provider calls, and cookie transport

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuthError {
    // Claim/token errors
    #[error("Invalid session token: {0}")]
    InvalidToken(String),

    #[error("Session token expired")]
    TokenExpired,

    #[error("Missing required claim: {0}")]
    MissingClaim(String),

    // Provider errors
    #[error("Identity provider rejected the credentials")]
    InvalidCredentials,

    #[error("Identity provider error: {0}")]
    ProviderError(String),

    #[error("One-time token verification failed: {0}")]
    OtpVerificationFailed(String),

    // Session errors
    #[error("No session present")]
    NoSession,

    #[error("Invalid session cookie")]
    InvalidSessionCookie,

    // Cookie transport errors, fatal to identity persistence for the request
    #[error("Cookie transport error: {0}")]
    CookieTransport(String),

    // Configuration errors
    #[error("Missing required configuration: {0}")]
    MissingConfig(String),

    #[error("Invalid configuration value for {key}: {reason}")]
    InvalidConfig { key: String, reason: String },

    // Network/HTTP errors
    #[error("HTTP request failed: {0}")]
    HttpError(String),

    #[error("JSON parsing error: {0}")]
    JsonError(String),

    #[error("Provider communication timeout")]
    Timeout,

    // General errors
    #[error("Internal authentication error: {0}")]
    Internal(String),
}

// Conversion from reqwest errors
impl From<reqwest::Error> for AuthError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            AuthError::Timeout
        } else {
            AuthError::HttpError(err.to_string())
        }
    }
}

// Conversion from serde_json errors
impl From<serde_json::Error> for AuthError {
    fn from(err: serde_json::Error) -> Self {
        AuthError::JsonError(err.to_string())
    }
}

// HTTP status code mapping for error responses
impl AuthError {
    pub fn status_code(&self) -> u16 {
        match self {
            AuthError::InvalidToken(_)
            | AuthError::TokenExpired
            | AuthError::MissingClaim(_)
            | AuthError::InvalidCredentials
            | AuthError::NoSession
            | AuthError::InvalidSessionCookie => 401,

            AuthError::CookieTransport(_)
            | AuthError::MissingConfig(_)
            | AuthError::InvalidConfig { .. }
            | AuthError::Internal(_) => 500,

            AuthError::Timeout => 504,

            _ => 400,
        }
    }

    /// True for failures that leave the request anonymous rather than failed.
    /// The pipeline resolves these to a `(None, None)` identity; only
    /// transport and configuration faults escalate into hard errors.
    pub fn is_verification_failure(&self) -> bool {
        !matches!(
            self,
            AuthError::CookieTransport(_)
                | AuthError::MissingConfig(_)
                | AuthError::InvalidConfig { .. }
                | AuthError::Internal(_)
        )
    }
}
