//! HTTP plumbing shared by the network-backed sources

use crate::error::{ConfigError, FetchError};
use reqwest::{Client, Response, StatusCode};
use std::time::Duration;

/// Longest response excerpt carried in an error message
const ERROR_BODY_EXCERPT: usize = 200;

/// Builds a client with a per-request timeout and user agent
pub(crate) fn build_client(timeout: Duration, user_agent: &str) -> Result<Client, ConfigError> {
    Ok(Client::builder()
        .timeout(timeout)
        .user_agent(user_agent)
        .gzip(true)
        .build()?)
}

/// Maps an HTTP status onto the source error taxonomy
pub(crate) fn classify_status(status: StatusCode) -> Result<(), FetchError> {
    match status {
        s if s.is_success() => Ok(()),
        StatusCode::TOO_MANY_REQUESTS => Err(FetchError::RateLimited),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            Err(FetchError::unauthorized(format!("HTTP {status}")))
        }
        StatusCode::NOT_FOUND => Err(FetchError::not_found(format!("HTTP {status}"))),
        s => Err(FetchError::Network(format!("HTTP {s}"))),
    }
}

/// Checks the status and reads the body as text
pub(crate) async fn read_body(response: Response) -> Result<String, FetchError> {
    let status = response.status();
    if let Err(err) = classify_status(status) {
        let body = response.text().await.unwrap_or_default();
        tracing::debug!(%status, body = %excerpt(&body), "Unsuccessful response");
        return Err(err);
    }

    Ok(response.text().await?)
}

/// The first few hundred characters of a body, for logs and errors
pub(crate) fn excerpt(body: &str) -> &str {
    match body.char_indices().nth(ERROR_BODY_EXCERPT) {
        Some((idx, _)) => &body[..idx],
        None => body,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        assert!(classify_status(StatusCode::OK).is_ok());
        assert_eq!(
            classify_status(StatusCode::TOO_MANY_REQUESTS),
            Err(FetchError::RateLimited)
        );
        assert!(matches!(
            classify_status(StatusCode::FORBIDDEN),
            Err(FetchError::Unauthorized(_))
        ));
        assert!(matches!(
            classify_status(StatusCode::NOT_FOUND),
            Err(FetchError::NotFound(_))
        ));

        let server_error = classify_status(StatusCode::BAD_GATEWAY).unwrap_err();
        assert!(server_error.is_transient());
    }

    #[test]
    fn test_excerpt_respects_char_boundaries() {
        let body = "₹".repeat(300);
        assert_eq!(excerpt(&body).chars().count(), ERROR_BODY_EXCERPT);
        assert_eq!(excerpt("short"), "short");
    }
}
