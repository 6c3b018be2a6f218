//! Error types for the protocol crate.

use thiserror::Error;

/// Protocol error type covering frame encoding and decoding failures.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// A control frame failed to parse as a known JSON message.
    #[error("malformed control frame: {0}")]
    MalformedFrame(String),

    /// A data frame is shorter than the fixed-width file-id prefix.
    #[error("data frame too short: {len} bytes, need at least the 36-byte id prefix")]
    FrameTooShort {
        /// Length of the offending frame.
        len: usize,
    },

    /// A file id is unusable as a data-frame prefix.
    #[error("invalid file id in data frame: {file_id:?}")]
    InvalidFileId {
        /// The offending id, lossily decoded.
        file_id: String,
    },
}

/// Result type alias for protocol operations.
pub type Result<T> = std::result::Result<T, ProtocolError>;

impl From<serde_json::Error> for ProtocolError {
    fn from(err: serde_json::Error) -> Self {
        ProtocolError::MalformedFrame(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_malformed_frame_display() {
        let err = ProtocolError::MalformedFrame("unknown variant `nope`".to_string());
        assert_eq!(
            err.to_string(),
            "malformed control frame: unknown variant `nope`"
        );
    }

    #[test]
    fn test_frame_too_short_display() {
        let err = ProtocolError::FrameTooShort { len: 12 };
        assert_eq!(
            err.to_string(),
            "data frame too short: 12 bytes, need at least the 36-byte id prefix"
        );
    }

    #[test]
    fn test_from_serde_json_error() {
        let json_err = serde_json::from_str::<i32>("not a number").unwrap_err();
        let err: ProtocolError = json_err.into();
        assert!(matches!(err, ProtocolError::MalformedFrame(_)));
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<ProtocolError>();
    }
}
