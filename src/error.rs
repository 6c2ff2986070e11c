//! Error types for the crate.
//!
//! The taxonomy follows the operational split the runtime cares about:
//! transient transport failures ([`Error::Network`], [`Error::RateLimit`])
//! which the [`RetryingExecutor`](crate::runtime::RetryingExecutor) retries,
//! and everything else, which propagates on first occurrence.

use std::time::Duration;

use thiserror::Error;

/// Configuration-related errors with structured variants.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing required field: {field}")]
    MissingField { field: &'static str },

    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },

    #[error("failed to read config file: {0}")]
    ReadFile(#[source] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[source] toml::de::Error),
}

/// Domain invariant violations on value-object construction.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DomainError {
    #[error("price for '{outcome}' must be within [0, 1], got {price}")]
    PriceOutOfRange {
        outcome: String,
        price: rust_decimal::Decimal,
    },

    #[error("tick size must be positive, got {0}")]
    NonPositiveTickSize(rust_decimal::Decimal),

    #[error("market has no outcomes")]
    EmptyOutcomes,

    #[error("filled quantity {filled} exceeds order size {size}")]
    OverFilled {
        filled: rust_decimal::Decimal,
        size: rust_decimal::Decimal,
    },

    #[error("position size must be non-negative, got {0}")]
    NegativePositionSize(rust_decimal::Decimal),
}

#[derive(Error, Debug)]
pub enum Error {
    /// Timeouts and connection failures. Retryable.
    #[error("network error: {0}")]
    Network(String),

    /// Venue throttling (HTTP 429 and friends). Retryable, optionally with a
    /// server-suggested delay.
    #[error("rate limited: {message}")]
    RateLimit {
        message: String,
        retry_after: Option<Duration>,
    },

    /// Missing or invalid credentials. Fatal, never retried.
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// Order failed client- or venue-side validation. Fatal per call.
    #[error("invalid order: {0}")]
    InvalidOrder(String),

    #[error("market not found: {0}")]
    MarketNotFound(String),

    /// The adapter does not implement an optional capability.
    #[error("{0} is not supported by this exchange")]
    NotSupported(&'static str),

    /// Catch-all venue failure. Not retried.
    #[error("exchange error: {0}")]
    Exchange(String),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("WebSocket error: {0}")]
    WebSocket(Box<tokio_tungstenite::tungstenite::Error>),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Whether the [`RetryingExecutor`](crate::runtime::RetryingExecutor)
    /// may retry the failed call.
    ///
    /// Only transient transport classes qualify; everything else surfaces
    /// immediately.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Network(_) | Self::RateLimit { .. })
    }

    /// Server-suggested retry delay, if the venue provided one.
    #[must_use]
    pub const fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimit { retry_after, .. } => *retry_after,
            _ => None,
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() || err.is_connect() {
            return Self::Network(err.to_string());
        }
        if let Some(status) = err.status() {
            if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                return Self::RateLimit {
                    message: err.to_string(),
                    retry_after: None,
                };
            }
            if status == reqwest::StatusCode::UNAUTHORIZED
                || status == reqwest::StatusCode::FORBIDDEN
            {
                return Self::Authentication(err.to_string());
            }
        }
        Self::Exchange(err.to_string())
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for Error {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        Self::WebSocket(Box::new(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_network_is_retryable() {
        assert!(Error::Network("timeout".into()).is_retryable());
    }

    #[test]
    fn test_rate_limit_is_retryable() {
        let err = Error::RateLimit {
            message: "429".into(),
            retry_after: Some(Duration::from_secs(1)),
        };
        assert!(err.is_retryable());
        assert_eq!(err.retry_after(), Some(Duration::from_secs(1)));
    }

    #[test]
    fn test_fatal_classes_are_not_retryable() {
        assert!(!Error::Authentication("bad key".into()).is_retryable());
        assert!(!Error::InvalidOrder("price out of range".into()).is_retryable());
        assert!(!Error::MarketNotFound("m1".into()).is_retryable());
        assert!(!Error::Exchange("boom".into()).is_retryable());
    }
}
