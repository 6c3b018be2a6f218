//! Frame dispatch: the hub side of the transfer protocol.
//!
//! Error policy follows the wire contract: malformed frames and frames
//! sent in the wrong state are logged and ignored, file-scoped frames
//! naming unknown ids are silently dropped, and nothing a client sends
//! ever closes its connection from here.

use std::sync::Arc;

use axum::extract::ws::Message;
use bytes::Bytes;
use tracing::{debug, info, warn};

use protocol::framing::{decode_data_frame, encode_data_frame};
use protocol::messages::{ClientFrame, DeviceType, ServerFrame};

use crate::hub::Hub;
use crate::net::broadcast::broadcast;
use crate::net::connection::{ConnHandle, ConnState};
use crate::session::store::StoreError;
use crate::session::Device;

/// Dispatch one inbound control frame according to the connection state.
pub(crate) async fn handle_control(
    hub: &Arc<Hub>,
    handle: &ConnHandle,
    device_id: &str,
    state: &mut ConnState,
    text: &str,
) {
    let frame = match ClientFrame::from_json(text) {
        Ok(frame) => frame,
        Err(e) => {
            debug!(device_id = %device_id, error = %e, "ignoring malformed control frame");
            return;
        }
    };

    match frame {
        ClientFrame::Ping => {
            handle.send(&ServerFrame::Pong).await;
        }
        ClientFrame::CreateSession {
            device_name,
            device_type,
        } => {
            create_session(hub, handle, device_id, state, &device_name, device_type).await;
        }
        ClientFrame::JoinSession {
            session_code,
            device_name,
            device_type,
        } => {
            join_session(
                hub,
                handle,
                device_id,
                state,
                &session_code,
                &device_name,
                device_type,
            )
            .await;
        }
        ClientFrame::FileStart {
            file_name,
            file_size,
            mime_type,
        } => {
            file_start(hub, handle, device_id, state, &file_name, file_size, &mime_type).await;
        }
        ClientFrame::FileComplete { file_id } => {
            file_complete(hub, handle, device_id, state, &file_id).await;
        }
        ClientFrame::RequestFile { file_id } => {
            request_file(hub, handle, device_id, state, &file_id).await;
        }
        ClientFrame::DeleteFile { file_id } => {
            delete_file(hub, device_id, state, &file_id);
        }
    }
}

/// Handle a binary upload chunk.
pub(crate) async fn handle_binary(
    hub: &Arc<Hub>,
    handle: &ConnHandle,
    device_id: &str,
    state: &ConnState,
    data: Bytes,
) {
    if *state == ConnState::Unregistered {
        debug!(device_id = %device_id, "ignoring data frame from unregistered connection");
        return;
    }

    let frame = match decode_data_frame(data) {
        Ok(frame) => frame,
        Err(e) => {
            debug!(device_id = %device_id, error = %e, "ignoring undecodable data frame");
            return;
        }
    };

    let Some(session) = hub.registry.lookup(device_id) else {
        debug!(device_id = %device_id, "ignoring data frame from device without a session");
        return;
    };

    match session.with_files(|files| files.append(&frame.file_id, frame.payload)) {
        Ok((received, total)) => {
            handle
                .send(&ServerFrame::UploadProgress {
                    file_id: frame.file_id,
                    progress: percent(received, total),
                    received,
                    total,
                })
                .await;
        }
        Err(e @ StoreError::Overflow { .. }) => {
            warn!(
                device_id = %device_id,
                file_id = %frame.file_id,
                error = %e,
                "dropping upload chunk"
            );
        }
        Err(e) => {
            debug!(file_id = %frame.file_id, error = %e, "dropping data frame");
        }
    }
}

async fn create_session(
    hub: &Arc<Hub>,
    handle: &ConnHandle,
    device_id: &str,
    state: &mut ConnState,
    device_name: &str,
    device_type: DeviceType,
) {
    if let ConnState::InSession(code) = state {
        debug!(device_id = %device_id, session_code = %code, "already in a session, ignoring create_session");
        return;
    }

    let device = Device::new(device_id.to_string(), device_name, device_type, handle.clone());
    let session = hub.registry.create(device);
    *state = ConnState::InSession(session.code.clone());
    hub.stats.record_session_created();

    handle
        .send(&ServerFrame::SessionCreated {
            session_code: session.code.clone(),
            device_id: device_id.to_string(),
            connected_devices: session.device_count(),
        })
        .await;
}

async fn join_session(
    hub: &Arc<Hub>,
    handle: &ConnHandle,
    device_id: &str,
    state: &mut ConnState,
    session_code: &str,
    device_name: &str,
    device_type: DeviceType,
) {
    if let ConnState::InSession(code) = state {
        debug!(device_id = %device_id, session_code = %code, "already in a session, ignoring join_session");
        return;
    }

    let device = Device::new(device_id.to_string(), device_name, device_type, handle.clone());
    let session = match hub.registry.join(session_code, device) {
        Ok(session) => session,
        Err(e) => {
            debug!(device_id = %device_id, session_code = %session_code, error = %e, "join failed");
            handle
                .send(&ServerFrame::SessionError {
                    error: "Session not found. Check the code and try again.".to_string(),
                })
                .await;
            return;
        }
    };

    *state = ConnState::InSession(session.code.clone());
    hub.stats.record_session_joined();

    let connected_devices = session.device_count();
    handle
        .send(&ServerFrame::SessionJoined {
            session_code: session.code.clone(),
            device_id: device_id.to_string(),
            connected_devices,
        })
        .await;

    // Only completed files are advertised; an empty list is not sent.
    let files = session.with_files(|files| files.complete_metas());
    if !files.is_empty() {
        handle.send(&ServerFrame::ExistingFiles { files }).await;
    }

    broadcast(
        &session,
        &ServerFrame::DeviceJoined {
            device_id: device_id.to_string(),
            device_name: device_name.to_string(),
            device_type,
            total_devices: connected_devices,
        },
        Some(device_id),
    );
}

async fn file_start(
    hub: &Arc<Hub>,
    handle: &ConnHandle,
    device_id: &str,
    state: &ConnState,
    file_name: &str,
    file_size: u64,
    mime_type: &str,
) {
    if !require_session(device_id, state, "file_start") {
        return;
    }
    let Some(session) = hub.registry.lookup(device_id) else {
        return;
    };

    let file_id =
        session.with_files(|files| files.begin(device_id, file_name, file_size, mime_type));

    info!(
        session_code = %session.code,
        device_id = %device_id,
        file_id = %file_id,
        file_name = %file_name,
        file_size,
        "upload started"
    );

    handle
        .send(&ServerFrame::FileStartAck {
            file_id,
            file_name: file_name.to_string(),
        })
        .await;
}

async fn file_complete(
    hub: &Arc<Hub>,
    handle: &ConnHandle,
    device_id: &str,
    state: &ConnState,
    file_id: &str,
) {
    if !require_session(device_id, state, "file_complete") {
        return;
    }
    let Some(session) = hub.registry.lookup(device_id) else {
        return;
    };

    match session.with_files(|files| files.complete(file_id)) {
        Ok(meta) => {
            info!(
                session_code = %session.code,
                file_id = %file_id,
                size = meta.size,
                "upload complete"
            );
            broadcast(&session, &ServerFrame::NewFile { file: meta }, Some(device_id));
            handle
                .send(&ServerFrame::FileCompleteAck {
                    file_id: file_id.to_string(),
                })
                .await;
        }
        Err(e @ StoreError::SizeMismatch { .. }) => {
            // No ack: the client keeps waiting, the janitor reclaims the
            // half-delivered file at its TTL.
            warn!(file_id = %file_id, error = %e, "upload completion rejected");
        }
        Err(e) => {
            debug!(file_id = %file_id, error = %e, "ignoring file_complete");
        }
    }
}

async fn request_file(
    hub: &Arc<Hub>,
    handle: &ConnHandle,
    device_id: &str,
    state: &ConnState,
    file_id: &str,
) {
    if !require_session(device_id, state, "request_file") {
        return;
    }
    let Some(session) = hub.registry.lookup(device_id) else {
        return;
    };

    // Open files are not served; an in-flight id is as good as unknown.
    let Some((meta, bytes)) = session.with_files(|files| {
        files
            .get(file_id)
            .and_then(|f| f.bytes().map(|b| (f.meta(), b)))
    }) else {
        debug!(device_id = %device_id, file_id = %file_id, "ignoring request for unknown file");
        return;
    };

    let chunk_size = hub.config.transfer.download_chunk_size;
    let mut frames = Vec::with_capacity(2 + bytes.len().div_ceil(chunk_size.max(1)));

    let Some(start) = text_frame(&ServerFrame::FileDownloadStart {
        file_id: meta.id.clone(),
        file_name: meta.original_name.clone(),
        file_size: meta.size,
        mime_type: meta.mimetype.clone(),
    }) else {
        return;
    };
    frames.push(start);

    let mut offset = 0;
    while offset < bytes.len() {
        let end = (offset + chunk_size).min(bytes.len());
        match encode_data_frame(&meta.id, &bytes[offset..end]) {
            Ok(frame) => frames.push(Message::Binary(frame.to_vec())),
            Err(e) => {
                warn!(file_id = %meta.id, error = %e, "aborting download");
                return;
            }
        }
        offset = end;
    }

    if let Some(done) = text_frame(&ServerFrame::FileDownloadComplete {
        file_id: meta.id.clone(),
    }) {
        frames.push(done);
    }

    info!(
        session_code = %session.code,
        device_id = %device_id,
        file_id = %meta.id,
        size = meta.size,
        frames = frames.len(),
        "streaming download"
    );

    // One batch: the writer task sends it back-to-back, so no broadcast
    // can land between the start and completion frames.
    handle.send_batch(frames).await;
}

fn delete_file(hub: &Arc<Hub>, device_id: &str, state: &ConnState, file_id: &str) {
    if !require_session(device_id, state, "delete_file") {
        return;
    }
    let Some(session) = hub.registry.lookup(device_id) else {
        return;
    };

    if session.with_files(|files| files.remove(file_id)).is_none() {
        debug!(file_id = %file_id, "ignoring delete of unknown file");
        return;
    }

    info!(session_code = %session.code, file_id = %file_id, "file deleted");

    // Everyone hears about the removal, the deleter included.
    broadcast(
        &session,
        &ServerFrame::FileRemoved {
            file_id: file_id.to_string(),
        },
        None,
    );
}

fn require_session(device_id: &str, state: &ConnState, frame_kind: &str) -> bool {
    if matches!(state, ConnState::InSession(_)) {
        true
    } else {
        debug!(device_id = %device_id, frame = frame_kind, "ignoring frame from unregistered connection");
        false
    }
}

fn text_frame(frame: &ServerFrame) -> Option<Message> {
    match frame.to_json() {
        Ok(text) => Some(Message::Text(text)),
        Err(e) => {
            warn!(error = %e, "failed to serialize frame");
            None
        }
    }
}

/// Integer upload percentage, `round(received / total * 100)`.
fn percent(received: u64, total: u64) -> u32 {
    if total == 0 {
        return 100;
    }
    ((received as f64 / total as f64) * 100.0).round() as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percent_rounds_to_nearest() {
        assert_eq!(percent(5, 5), 100);
        assert_eq!(percent(1, 3), 33);
        assert_eq!(percent(2, 3), 67);
        assert_eq!(percent(0, 10), 0);
        assert_eq!(percent(1, 200), 1);
    }

    #[test]
    fn test_percent_of_zero_total_is_complete() {
        assert_eq!(percent(0, 0), 100);
    }
}
