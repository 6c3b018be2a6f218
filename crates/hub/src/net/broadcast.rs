//! One-to-many delivery of control frames to a session's members.

use tracing::{debug, error};

use protocol::messages::ServerFrame;

use crate::session::Session;

/// Send `frame` to every member of `session`, optionally excluding one
/// device (typically the originator of the event).
///
/// The frame is serialized once. Membership is snapshotted under the
/// session lock and the sends happen after it is released, so the lock is
/// never held across network I/O. A peer whose queue is gone or full is
/// skipped; its own close path deals with it.
pub fn broadcast(session: &Session, frame: &ServerFrame, exclude_device_id: Option<&str>) {
    let text = match frame.to_json() {
        Ok(text) => text,
        Err(e) => {
            error!(error = %e, "failed to serialize broadcast frame");
            return;
        }
    };

    for (device_id, handle) in session.members() {
        if exclude_device_id == Some(device_id.as_str()) {
            continue;
        }
        if !handle.try_send_text(text.clone()) {
            debug!(
                device_id = %device_id,
                session_code = %session.code,
                "skipping broadcast to unwritable connection"
            );
        }
    }
}
