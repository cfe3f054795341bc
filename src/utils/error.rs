use thiserror::Error;

#[derive(Error, Debug)]
pub enum CollectorError {
    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Communication error: {0}")]
    CommunicationError(String),

    #[error("Modbus exception from unit {unit_id}: {message}")]
    ProtocolException { unit_id: u8, message: String },

    #[error("Timeout occurred")]
    Timeout,

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Metrics error: {0}")]
    MetricsError(String),

    #[error("Publish error: {0}")]
    PublishError(String),
}

impl CollectorError {
    /// Errors after which the request/response stream of a Modbus session can
    /// no longer be trusted (a late reply may still be in flight).
    pub fn poisons_session(&self) -> bool {
        matches!(
            self,
            CollectorError::Timeout | CollectorError::CommunicationError(_)
        )
    }
}

impl From<serde_json::Error> for CollectorError {
    fn from(err: serde_json::Error) -> Self {
        CollectorError::SerializationError(format!("JSON error: {}", err))
    }
}

impl From<toml::de::Error> for CollectorError {
    fn from(err: toml::de::Error) -> Self {
        CollectorError::SerializationError(format!("TOML error: {}", err))
    }
}

impl From<std::io::Error> for CollectorError {
    fn from(err: std::io::Error) -> Self {
        CollectorError::CommunicationError(format!("IO error: {}", err))
    }
}

impl From<prometheus::Error> for CollectorError {
    fn from(err: prometheus::Error) -> Self {
        CollectorError::MetricsError(err.to_string())
    }
}

#[cfg(feature = "push")]
impl From<reqwest::Error> for CollectorError {
    fn from(err: reqwest::Error) -> Self {
        CollectorError::PublishError(err.to_string())
    }
}

impl From<tokio::time::error::Elapsed> for CollectorError {
    fn from(_: tokio::time::error::Elapsed) -> Self {
        CollectorError::Timeout
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_maps_to_communication_error() {
        let err: CollectorError =
            std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused").into();
        assert!(matches!(err, CollectorError::CommunicationError(_)));
        assert!(err.to_string().contains("refused"));
    }

    #[test]
    fn test_transport_errors_poison_session() {
        assert!(CollectorError::Timeout.poisons_session());
        assert!(CollectorError::CommunicationError("reset".to_string()).poisons_session());
        assert!(!CollectorError::ProtocolException {
            unit_id: 1,
            message: "IllegalDataAddress".to_string(),
        }
        .poisons_session());
    }

    #[test]
    fn test_protocol_exception_display() {
        let err = CollectorError::ProtocolException {
            unit_id: 3,
            message: "IllegalDataAddress".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Modbus exception from unit 3: IllegalDataAddress"
        );
    }
}
