//! Error types for the market data engine

use thiserror::Error;

/// Errors a single quote source can report
///
/// These never leave the fallback chain: every variant means
/// "try the next source".
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// The call did not complete within the per-call timeout
    #[error("Request timeout")]
    Timeout,

    /// The provider signalled throttling (HTTP 429 or a throttling body)
    #[error("Rate limit exceeded")]
    RateLimited,

    /// The provider does not know this symbol
    #[error("Symbol not found: {0}")]
    NotFound(String),

    /// The response arrived but could not be interpreted
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// Missing credentials or the provider refused the session
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Transport failure other than a timeout
    #[error("Network error: {0}")]
    Network(String),
}

impl FetchError {
    /// Creates a NotFound error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Creates a MalformedResponse error
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedResponse(msg.into())
    }

    /// Creates an Unauthorized error
    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::Unauthorized(msg.into())
    }

    /// Whether a repeated attempt could plausibly succeed
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Timeout | Self::Network(_))
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if err.is_decode() {
            Self::MalformedResponse(err.to_string())
        } else {
            Self::Network(err.to_string())
        }
    }
}

/// Errors surfaced to callers of the engine
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum QuoteError {
    /// No live source and no static fallback knows the symbol
    #[error("data temporarily unavailable for {symbol}")]
    QuoteUnavailable { symbol: String },

    /// The input could not be turned into a canonical symbol
    #[error("Invalid symbol: {0:?}")]
    InvalidSymbol(String),
}

impl QuoteError {
    /// Creates a QuoteUnavailable error
    pub fn unavailable(symbol: impl Into<String>) -> Self {
        Self::QuoteUnavailable {
            symbol: symbol.into(),
        }
    }

    /// Creates an InvalidSymbol error
    pub fn invalid_symbol(input: impl Into<String>) -> Self {
        Self::InvalidSymbol(input.into())
    }
}

/// Errors raised while reading configuration from the environment
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A variable is present but its value cannot be parsed
    #[error("Invalid value for {var}: {value:?}")]
    InvalidValue { var: String, value: String },

    /// The HTTP client could not be constructed
    #[error("Failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),

    /// A built-in selector or pattern failed to compile
    #[error("Invalid page pattern {pattern:?}: {reason}")]
    Pattern { pattern: String, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_unavailable_message() {
        let err = QuoteError::unavailable("NSE:NOPE");
        assert_eq!(err.to_string(), "data temporarily unavailable for NSE:NOPE");
    }

    #[test]
    fn test_transient_classification() {
        assert!(FetchError::Timeout.is_transient());
        assert!(FetchError::Network("reset".into()).is_transient());
        assert!(!FetchError::RateLimited.is_transient());
        assert!(!FetchError::malformed("layout").is_transient());
    }
}
