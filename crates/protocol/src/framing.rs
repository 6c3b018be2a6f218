//! Binary data-frame codec.
//!
//! # Frame Format
//!
//! ```text
//! offset 0..35   : 36 ASCII bytes, file id, right-padded with space (0x20)
//! offset 36..N-1 : raw file bytes
//! ```
//!
//! The 36-byte width matches the textual form of the file ids minted by
//! [`crate::ids::new_file_id`], so a full-length id needs no padding. The
//! width is a wire-format commitment: senders always emit exactly 36 bytes
//! and receivers strip trailing spaces before matching.

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::ProtocolError;

/// Fixed width of the file-id prefix on every data frame.
pub const FILE_ID_WIDTH: usize = 36;

/// Chunk size the hub uses when streaming downloads (64 KiB).
///
/// The last chunk of a file may be shorter. Clients may upload with any
/// chunk size up to the transport's per-frame cap.
pub const DOWNLOAD_CHUNK_SIZE: usize = 64 * 1024;

/// Per-frame payload cap enforced at the transport layer (100 MiB).
pub const MAX_FRAME_SIZE: usize = 100 * 1024 * 1024;

/// A decoded data frame: the target file id and its payload bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataFrame {
    /// File id with the space padding stripped.
    pub file_id: String,
    /// Raw file bytes; shares the backing buffer of the input frame.
    pub payload: Bytes,
}

/// Encode a data frame: 36-byte space-padded id prefix followed by payload.
///
/// # Errors
/// Fails if the id is empty, longer than [`FILE_ID_WIDTH`], or not ASCII.
pub fn encode_data_frame(file_id: &str, payload: &[u8]) -> Result<Bytes, ProtocolError> {
    if file_id.is_empty() || file_id.len() > FILE_ID_WIDTH || !file_id.is_ascii() {
        return Err(ProtocolError::InvalidFileId {
            file_id: file_id.to_string(),
        });
    }

    let mut buf = BytesMut::with_capacity(FILE_ID_WIDTH + payload.len());
    buf.put_slice(file_id.as_bytes());
    buf.put_bytes(b' ', FILE_ID_WIDTH - file_id.len());
    buf.put_slice(payload);
    Ok(buf.freeze())
}

/// Decode a data frame into its file id and payload.
///
/// The payload is a zero-copy slice of the input buffer.
///
/// # Errors
/// Fails if the frame is shorter than the id prefix or the prefix is not
/// printable ASCII.
pub fn decode_data_frame(frame: Bytes) -> Result<DataFrame, ProtocolError> {
    if frame.len() < FILE_ID_WIDTH {
        return Err(ProtocolError::FrameTooShort { len: frame.len() });
    }

    let prefix = &frame[..FILE_ID_WIDTH];
    if !prefix.iter().all(|b| b.is_ascii_graphic() || *b == b' ') {
        return Err(ProtocolError::InvalidFileId {
            file_id: String::from_utf8_lossy(prefix).into_owned(),
        });
    }

    let file_id = String::from_utf8_lossy(prefix).trim_end().to_string();
    if file_id.is_empty() {
        return Err(ProtocolError::InvalidFileId { file_id });
    }

    let payload = frame.slice(FILE_ID_WIDTH..);
    Ok(DataFrame { file_id, payload })
}
