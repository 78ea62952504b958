use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScopeError {
    #[error("Malformed payload: {0}")]
    Payload(String),

    #[error("Unsupported content type: {0}")]
    UnsupportedContentType(String),

    #[error("Unsupported content encoding: {0}")]
    UnsupportedEncoding(String),

    #[error("Corrupt gzip body: {0}")]
    Gzip(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Protobuf decode error: {0}")]
    ProtoDecode(#[from] prost::DecodeError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Result type alias for otelscope operations
pub type Result<T> = std::result::Result<T, ScopeError>;

impl ScopeError {
    /// Creates a new malformed payload error
    pub fn payload<S: Into<String>>(msg: S) -> Self {
        Self::Payload(msg.into())
    }

    /// Creates a new configuration error
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::Config(msg.into())
    }

    /// Creates a new network error
    pub fn network<S: Into<String>>(msg: S) -> Self {
        Self::Network(msg.into())
    }

    /// Creates a new bad-request error
    pub fn bad_request<S: Into<String>>(msg: S) -> Self {
        Self::BadRequest(msg.into())
    }

    /// Returns true if the error was caused by the sender's payload
    /// rather than by this process.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::Payload(_)
                | Self::UnsupportedContentType(_)
                | Self::UnsupportedEncoding(_)
                | Self::Gzip(_)
                | Self::NotFound(_)
                | Self::BadRequest(_)
                | Self::ProtoDecode(_)
                | Self::Serialization(_)
        )
    }

    /// Returns the error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            Self::Payload(_) | Self::ProtoDecode(_) | Self::Gzip(_) => "payload",
            Self::UnsupportedContentType(_) | Self::UnsupportedEncoding(_) => "content",
            Self::Config(_) | Self::Yaml(_) => "config",
            Self::Network(_) => "network",
            Self::NotFound(_) => "not_found",
            Self::BadRequest(_) => "validation",
            Self::Io(_) => "io",
            Self::Serialization(_) => "serialization",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = ScopeError::payload("trace id has 3 bytes");
        assert_eq!(err.to_string(), "Malformed payload: trace id has 3 bytes");
        assert_eq!(err.category(), "payload");
    }

    #[test]
    fn test_client_errors() {
        assert!(ScopeError::payload("bad").is_client_error());
        assert!(ScopeError::UnsupportedContentType("text/plain".into()).is_client_error());
        assert!(!ScopeError::network("bind failed").is_client_error());
        assert!(!ScopeError::config("ui port").is_client_error());
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::AddrInUse, "in use");
        let err: ScopeError = io.into();
        assert_eq!(err.category(), "io");
    }
}
