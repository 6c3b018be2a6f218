//! Control-frame definitions for the Beamdrop protocol.
//!
//! Control frames are UTF-8 JSON objects carried in WebSocket text frames.
//! Every frame has a `type` field with a snake_case tag; payload fields use
//! camelCase on the wire so browser clients can consume them directly.

use serde::{Deserialize, Serialize};

/// Platform hint reported by a connecting device.
///
/// Unrecognised values deserialize to [`DeviceType::Unknown`] so that newer
/// clients never break an older hub.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum DeviceType {
    Iphone,
    Android,
    Mac,
    Windows,
    #[default]
    Unknown,
}

impl From<String> for DeviceType {
    fn from(s: String) -> Self {
        match s.as_str() {
            "iphone" => DeviceType::Iphone,
            "android" => DeviceType::Android,
            "mac" => DeviceType::Mac,
            "windows" => DeviceType::Windows,
            _ => DeviceType::Unknown,
        }
    }
}

/// Metadata describing a buffered file.
///
/// This is the shape exposed in `existing_files` and `new_file`; file bytes
/// are only ever delivered through data frames in response to
/// `request_file`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileMeta {
    /// Opaque 36-character file identifier.
    pub id: String,
    /// Name the uploader gave the file.
    pub original_name: String,
    /// Declared size in bytes.
    pub size: u64,
    /// MIME type declared by the uploader.
    pub mimetype: String,
    /// Upload wall-clock timestamp, milliseconds since the Unix epoch.
    pub uploaded_at: u64,
    /// Device id of the uploader.
    pub uploader_id: String,
}

// ============================================================================
// Client → hub frames
// ============================================================================

/// Control frames sent by a client to the hub.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientFrame {
    /// Create a new session with this device as its first member.
    #[serde(rename_all = "camelCase")]
    CreateSession {
        device_name: String,
        #[serde(default)]
        device_type: DeviceType,
    },
    /// Join an existing session by its 6-character code.
    ///
    /// The code is matched case-insensitively.
    #[serde(rename_all = "camelCase")]
    JoinSession {
        session_code: String,
        device_name: String,
        #[serde(default)]
        device_type: DeviceType,
    },
    /// Announce an upload; the hub replies with a freshly minted file id.
    #[serde(rename_all = "camelCase")]
    FileStart {
        file_name: String,
        file_size: u64,
        mime_type: String,
    },
    /// Declare an upload finished; validated against the declared size.
    #[serde(rename_all = "camelCase")]
    FileComplete { file_id: String },
    /// Ask the hub to stream a file back on this connection.
    #[serde(rename_all = "camelCase")]
    RequestFile { file_id: String },
    /// Remove a file from the session.
    #[serde(rename_all = "camelCase")]
    DeleteFile { file_id: String },
    /// Keepalive; answered with `pong`.
    Ping,
}

impl ClientFrame {
    /// Parse a control frame from its JSON wire form.
    pub fn from_json(text: &str) -> crate::Result<Self> {
        Ok(serde_json::from_str(text)?)
    }
}

// ============================================================================
// Hub → client frames
// ============================================================================

/// Control frames sent by the hub to a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerFrame {
    /// Reply to `create_session`.
    #[serde(rename_all = "camelCase")]
    SessionCreated {
        session_code: String,
        device_id: String,
        connected_devices: usize,
    },
    /// Reply to a successful `join_session`.
    #[serde(rename_all = "camelCase")]
    SessionJoined {
        session_code: String,
        device_id: String,
        connected_devices: usize,
    },
    /// Reply to a failed `join_session`; the connection stays open.
    SessionError { error: String },
    /// Broadcast to peers when a device joins.
    #[serde(rename_all = "camelCase")]
    DeviceJoined {
        device_id: String,
        device_name: String,
        device_type: DeviceType,
        total_devices: usize,
    },
    /// Broadcast to peers when a device disconnects.
    #[serde(rename_all = "camelCase")]
    DeviceLeft {
        device_id: String,
        total_devices: usize,
    },
    /// Sent to a joiner when the session already holds completed files.
    ExistingFiles { files: Vec<FileMeta> },
    /// Broadcast to peers when an upload completes.
    NewFile { file: FileMeta },
    /// Broadcast when a file is deleted or expired.
    #[serde(rename_all = "camelCase")]
    FileRemoved { file_id: String },
    /// Reply to `file_start` carrying the minted file id.
    #[serde(rename_all = "camelCase")]
    FileStartAck { file_id: String, file_name: String },
    /// Reply to each ingested upload chunk.
    #[serde(rename_all = "camelCase")]
    UploadProgress {
        file_id: String,
        /// Integer percent, `round(received / total * 100)`.
        progress: u32,
        received: u64,
        total: u64,
    },
    /// Reply to a validated `file_complete`.
    #[serde(rename_all = "camelCase")]
    FileCompleteAck { file_id: String },
    /// Announces a download; data frames follow, then the completion frame.
    #[serde(rename_all = "camelCase")]
    FileDownloadStart {
        file_id: String,
        file_name: String,
        file_size: u64,
        mime_type: String,
    },
    /// Terminates a download after the last data frame.
    #[serde(rename_all = "camelCase")]
    FileDownloadComplete { file_id: String },
    /// Reply to `ping`.
    Pong,
}

impl ServerFrame {
    /// Serialize this frame to its JSON wire form.
    pub fn to_json(&self) -> crate::Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}
