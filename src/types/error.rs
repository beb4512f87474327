use thiserror::Error;

/// Errors that can occur when using the realtime client.
///
/// Only construction-time failures (a malformed endpoint, an open timeout)
/// are ever returned from public operations. Transport anomalies after a
/// connection is established are recovered internally and surface as
/// lifecycle events instead.
#[derive(Error, Debug)]
pub enum RealtimeError {
    /// WebSocket protocol error (handshake failed, invalid frame, etc.)
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// URL parsing error (malformed endpoint)
    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    /// JSON serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// General connection error with descriptive message
    #[error("Connection error: {0}")]
    Connection(String),

    /// The transport open call did not complete within the configured timeout
    #[error("Connection attempt timed out")]
    ConnectTimeout,
}

/// Convenience type alias for `Result<T, RealtimeError>`.
pub type Result<T> = std::result::Result<T, RealtimeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_connection() {
        let err = RealtimeError::Connection("writer gone".to_string());
        assert_eq!(err.to_string(), "Connection error: writer gone");
    }

    #[test]
    fn display_timeout() {
        assert_eq!(
            RealtimeError::ConnectTimeout.to_string(),
            "Connection attempt timed out"
        );
    }

    #[test]
    fn from_url_parse() {
        let parse_err = url::Url::parse("not a url").unwrap_err();
        let err = RealtimeError::from(parse_err);
        assert!(matches!(err, RealtimeError::UrlParse(_)));
    }

    #[test]
    fn from_serde_json() {
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err = RealtimeError::from(json_err);
        assert!(matches!(err, RealtimeError::Serialization(_)));
    }
}
