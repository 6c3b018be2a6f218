//! Session registry: the authoritative map of live sessions.
//!
//! The registry owns two maps: session code → session, and the derived
//! device id → session code index that gives every inbound frame an O(1)
//! route to its session. Index entries are only ever written while holding
//! the owning session's state lock, immediately next to the membership
//! change, so the two structures cannot be observed out of sync.

use std::sync::Arc;
use std::time::Instant;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use thiserror::Error;

use protocol::ids::{new_session_code, normalize_session_code};

use super::{Device, Session};

/// Errors from registry operations.
#[derive(Debug, Error, PartialEq)]
pub enum RegistryError {
    /// No live session has this code.
    #[error("session not found: {0}")]
    SessionNotFound(String),
}

/// Result of removing a device from its session.
#[derive(Debug)]
pub struct LeaveOutcome {
    /// The session the device left.
    pub session: Arc<Session>,
    /// Members remaining after the departure.
    pub remaining: usize,
    /// Whether this departure emptied the session.
    pub became_empty: bool,
}

/// Thread-safe registry of live sessions.
pub struct SessionRegistry {
    /// Session code → session.
    sessions: DashMap<String, Arc<Session>>,
    /// Device id → session code, maintained in lockstep with membership.
    index: DashMap<String, String>,
}

impl SessionRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            sessions: DashMap::new(),
            index: DashMap::new(),
        }
    }

    /// Create a new session with `device` as its first member.
    ///
    /// Mints codes until one is free; with ~30 bits of entropy per code a
    /// retry is already rare at any realistic session count.
    pub fn create(&self, device: Device) -> Arc<Session> {
        loop {
            let code = new_session_code();
            match self.sessions.entry(code.clone()) {
                Entry::Occupied(_) => {
                    tracing::debug!(session_code = %code, "session code collision, retrying");
                }
                Entry::Vacant(slot) => {
                    let session = Arc::new(Session::new(code.clone()));
                    let device_id = device.id.clone();
                    {
                        let mut state = session.lock_state();
                        state.devices.push(device);
                        self.index.insert(device_id.clone(), code.clone());
                    }
                    slot.insert(Arc::clone(&session));

                    tracing::info!(
                        session_code = %code,
                        device_id = %device_id,
                        "Created new session"
                    );
                    return session;
                }
            }
        }
    }

    /// Add `device` to the session with the given code.
    ///
    /// The code is matched case-insensitively. An unknown code is an error
    /// for the caller to report; the connection is not affected.
    pub fn join(&self, code: &str, device: Device) -> Result<Arc<Session>, RegistryError> {
        let code = normalize_session_code(code);
        let session = self
            .sessions
            .get(&code)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| RegistryError::SessionNotFound(code.clone()))?;

        let device_id = device.id.clone();
        {
            let mut state = session.lock_state();
            if state.closed {
                return Err(RegistryError::SessionNotFound(code));
            }
            state.devices.push(device);
            state.empty_at = None;
            self.index.insert(device_id.clone(), code.clone());
        }

        tracing::info!(
            session_code = %code,
            device_id = %device_id,
            members = session.device_count(),
            "Device joined session"
        );
        Ok(session)
    }

    /// Remove a device from its session, if it is in one.
    ///
    /// A session that becomes empty is only marked, not deleted; the
    /// janitor owns deletion.
    pub fn leave(&self, device_id: &str) -> Option<LeaveOutcome> {
        let code = self.index.get(device_id).map(|entry| entry.value().clone())?;
        let session = self
            .sessions
            .get(&code)
            .map(|entry| Arc::clone(entry.value()))?;

        let (remaining, became_empty) = {
            let mut state = session.lock_state();
            let before = state.devices.len();
            state.devices.retain(|d| d.id != device_id);
            self.index.remove(device_id);

            let remaining = state.devices.len();
            let became_empty = remaining == 0 && before > 0;
            if became_empty {
                state.empty_at = Some(Instant::now());
            }
            (remaining, became_empty)
        };

        tracing::info!(
            session_code = %code,
            device_id = %device_id,
            remaining,
            "Device left session"
        );
        Some(LeaveOutcome {
            session,
            remaining,
            became_empty,
        })
    }

    /// Find the session a device currently belongs to.
    pub fn lookup(&self, device_id: &str) -> Option<Arc<Session>> {
        let code = self.index.get(device_id).map(|entry| entry.value().clone())?;
        self.sessions
            .get(&code)
            .map(|entry| Arc::clone(entry.value()))
    }

    /// Delete a session if it currently has no members. Idempotent.
    ///
    /// Both the janitor sweep and the one-shot empty check funnel through
    /// here, so the two mechanisms cannot step on each other.
    pub fn remove_if_empty(&self, code: &str) -> bool {
        if let Entry::Occupied(entry) = self.sessions.entry(code.to_string()) {
            let mut state = entry.get().lock_state();
            if state.devices.is_empty() {
                state.closed = true;
                drop(state);
                entry.remove();
                tracing::info!(session_code = %code, "Removed empty session");
                return true;
            }
        }
        false
    }

    /// Snapshot of every live session, for the janitor sweep.
    pub fn sessions_snapshot(&self) -> Vec<Arc<Session>> {
        self.sessions
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect()
    }

    /// Number of live sessions.
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Number of devices currently in any session.
    pub fn device_count(&self) -> usize {
        self.index.len()
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
