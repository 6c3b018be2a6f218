//! Background reclamation of expired files and abandoned sessions.
//!
//! Two redundant mechanisms, both idempotent: a periodic sweep that
//! expires old files and long-empty sessions, and a one-shot check
//! scheduled whenever a session loses its last member.

use std::sync::Arc;
use std::time::{Instant, SystemTime};

use tracing::{debug, info};

use protocol::messages::ServerFrame;

use crate::hub::Hub;
use crate::net::broadcast::broadcast;

/// Spawn the periodic sweep task.
pub fn start(hub: Arc<Hub>) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(hub.config.cleanup.sweep_interval());
        // The first tick fires immediately; skip it.
        interval.tick().await;
        loop {
            interval.tick().await;
            sweep(&hub, SystemTime::now(), Instant::now());
        }
    });
}

/// One sweep pass over every live session, against the given clocks.
///
/// Files older than the TTL are dropped with a `file_removed` broadcast to
/// every remaining member. Sessions that have sat empty for the TTL are
/// deleted.
pub fn sweep(hub: &Hub, now: SystemTime, mono_now: Instant) {
    let ttl = hub.config.cleanup.file_ttl();
    let mut expired_files = 0usize;
    let mut removed_sessions = 0usize;

    for session in hub.registry.sessions_snapshot() {
        let expired = session.with_files(|files| files.expire_older_than(ttl, now));
        for meta in expired {
            info!(
                session_code = %session.code,
                file_id = %meta.id,
                "expired file"
            );
            broadcast(&session, &ServerFrame::FileRemoved { file_id: meta.id }, None);
            expired_files += 1;
        }

        let empty_long_enough = session
            .empty_for(mono_now)
            .map(|idle| idle >= ttl)
            .unwrap_or(false);
        if empty_long_enough && hub.registry.remove_if_empty(&session.code) {
            removed_sessions += 1;
        }
    }

    if expired_files > 0 || removed_sessions > 0 {
        info!(expired_files, removed_sessions, "janitor sweep finished");
    } else {
        debug!("janitor sweep found nothing to reclaim");
    }
}

/// Schedule the one-shot check that deletes a freshly emptied session.
///
/// Redundant with the periodic sweep; deletion is idempotent either way,
/// and a device rejoining before the check fires simply keeps the session.
pub fn schedule_empty_check(hub: Arc<Hub>, code: String) {
    let grace = hub.config.cleanup.empty_session_grace();
    tokio::spawn(async move {
        tokio::time::sleep(grace).await;
        if hub.registry.remove_if_empty(&code) {
            debug!(session_code = %code, "one-shot check removed empty session");
        }
    });
}
