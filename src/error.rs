// src/error.rs
//! Error types for the GNSS bridge

pub type Result<T> = std::result::Result<T, BridgeError>;

#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[cfg(target_os = "linux")]
    #[error("Bluetooth error: {0}")]
    Bluetooth(#[from] bluer::Error),

    /// No Bluetooth adapter is present. Fatal at startup.
    #[error("No Bluetooth adapter found")]
    NoAdapter,

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Checksum mismatch: expected {expected:#04x}, got {actual:#04x}")]
    Checksum { expected: u8, actual: u8 },

    /// GGA sentence without a position (receiver has no fix yet)
    #[error("Sentence carries no position")]
    NoPosition,

    /// The receiver handle became unusable while streaming
    #[error("Receiver lost: {0}")]
    DeviceLost(String),

    #[error("Client disconnected")]
    ClientDisconnected,

    #[error("Configuration error: {0}")]
    Config(String),
}

impl BridgeError {
    /// Sentence-level errors only cost the current line.
    pub fn is_recoverable_sentence_error(&self) -> bool {
        matches!(
            self,
            BridgeError::Parse(_) | BridgeError::Checksum { .. } | BridgeError::NoPosition
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sentence_errors_are_recoverable() {
        assert!(BridgeError::Parse("bad".into()).is_recoverable_sentence_error());
        assert!(BridgeError::Checksum { expected: 1, actual: 2 }.is_recoverable_sentence_error());
        assert!(BridgeError::NoPosition.is_recoverable_sentence_error());
        assert!(!BridgeError::DeviceLost("eof".into()).is_recoverable_sentence_error());
    }

    #[test]
    fn test_checksum_display() {
        let err = BridgeError::Checksum { expected: 0x47, actual: 0x0a };
        assert_eq!(err.to_string(), "Checksum mismatch: expected 0x47, got 0x0a");
    }
}
