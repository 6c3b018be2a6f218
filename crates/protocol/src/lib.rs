//! # Beamdrop Protocol Library
//!
//! This crate provides the wire protocol for the Beamdrop file-relay hub.
//!
//! ## Overview
//!
//! Beamdrop multiplexes two kinds of frames over a single duplex WebSocket
//! channel:
//!
//! - **Control frames**: UTF-8 JSON objects tagged by a required `type`
//!   field, defined in [`messages`].
//! - **Data frames**: binary frames whose first 36 bytes are the ASCII file
//!   id (right-padded with spaces) and whose remainder is raw file bytes,
//!   defined in [`framing`].
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │   Control frames (JSON, `type`-tagged)  │
//! ├─────────────────────────────────────────┤
//! │   Data frames (36-byte id prefix)       │
//! ├─────────────────────────────────────────┤
//! │   Transport (WebSocket text / binary)   │
//! └─────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`messages`]: control-frame definitions
//! - [`framing`]: binary data-frame codec
//! - [`ids`]: device/file id and session-code generation
//! - [`error`]: error types

pub mod error;
pub mod framing;
pub mod ids;
pub mod messages;

pub use error::{ProtocolError, Result};
pub use framing::{
    decode_data_frame, encode_data_frame, DataFrame, DOWNLOAD_CHUNK_SIZE, FILE_ID_WIDTH,
    MAX_FRAME_SIZE,
};
pub use ids::{
    new_device_id, new_file_id, new_session_code, normalize_session_code, ID_LEN,
    SESSION_CODE_ALPHABET, SESSION_CODE_LEN,
};
pub use messages::{ClientFrame, DeviceType, FileMeta, ServerFrame};
