//! Session and device types.
//!
//! A session is an ephemeral group of connected devices sharing a
//! 6-character code. It owns the devices' membership records and the
//! in-memory file buffers; the actual WebSocket connections belong to the
//! network layer and are reachable through each device's [`ConnHandle`].

pub mod registry;
pub mod store;

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant, SystemTime};

use protocol::messages::DeviceType;

use crate::net::connection::ConnHandle;

pub use registry::{RegistryError, SessionRegistry};
pub use store::{FileStore, StoreError, StoredFile};

/// Upper bound on device display names; longer names are truncated.
pub const MAX_DEVICE_NAME_LEN: usize = 64;

/// A connected device. Lives exactly as long as its connection.
#[derive(Debug, Clone)]
pub struct Device {
    /// Opaque 36-character id, fresh per connection.
    pub id: String,
    /// Display name reported by the client, truncated to
    /// [`MAX_DEVICE_NAME_LEN`].
    pub name: String,
    /// Platform hint reported by the client.
    pub device_type: DeviceType,
    /// Wall-clock connection timestamp.
    pub connected_at: SystemTime,
    /// Outbound queue of the device's connection.
    pub handle: ConnHandle,
}

impl Device {
    /// Create a device record for a registered connection.
    pub fn new(id: String, name: &str, device_type: DeviceType, handle: ConnHandle) -> Self {
        let mut name = name.trim().to_string();
        if name.len() > MAX_DEVICE_NAME_LEN {
            // Truncate on a char boundary; names are free-form UTF-8.
            let mut end = MAX_DEVICE_NAME_LEN;
            while !name.is_char_boundary(end) {
                end -= 1;
            }
            name.truncate(end);
        }
        Self {
            id,
            name,
            device_type,
            connected_at: SystemTime::now(),
            handle,
        }
    }
}

/// Mutable session state, guarded by the session lock.
///
/// Lock order is registry map, then this lock, then a connection's outbound
/// queue. Nothing here performs I/O while the lock is held.
#[derive(Debug)]
pub(crate) struct SessionState {
    /// Members in insertion order; ids are unique.
    pub(crate) devices: Vec<Device>,
    /// File buffers owned by this session.
    pub(crate) files: FileStore,
    /// Set when the last member leaves, cleared on join.
    pub(crate) empty_at: Option<Instant>,
    /// Set once the registry has dropped the session; late joiners bounce.
    pub(crate) closed: bool,
}

/// An ephemeral group of devices sharing a session code.
#[derive(Debug)]
pub struct Session {
    /// The 6-character code; the only identifier end-users ever see.
    pub code: String,
    /// Wall-clock creation timestamp.
    pub created_at: SystemTime,
    state: Mutex<SessionState>,
}

impl Session {
    pub(crate) fn new(code: String) -> Self {
        Self {
            code,
            created_at: SystemTime::now(),
            state: Mutex::new(SessionState {
                devices: Vec::new(),
                files: FileStore::default(),
                empty_at: None,
                closed: false,
            }),
        }
    }

    /// Lock the session state. Poisoning is recovered: a panicking handler
    /// must not wedge the whole session.
    pub(crate) fn lock_state(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run `f` against the session's file store under the session lock.
    pub fn with_files<T>(&self, f: impl FnOnce(&mut FileStore) -> T) -> T {
        let mut state = self.lock_state();
        f(&mut state.files)
    }

    /// Number of devices currently in the session.
    pub fn device_count(&self) -> usize {
        self.lock_state().devices.len()
    }

    /// Whether the session has no members.
    pub fn is_empty(&self) -> bool {
        self.lock_state().devices.is_empty()
    }

    /// Snapshot of (device id, connection handle) pairs, in join order.
    ///
    /// Broadcasts iterate this snapshot after the lock is released so the
    /// session lock is never held across network sends.
    pub fn members(&self) -> Vec<(String, ConnHandle)> {
        self.lock_state()
            .devices
            .iter()
            .map(|d| (d.id.clone(), d.handle.clone()))
            .collect()
    }

    /// How long the session has been empty, if it is.
    pub fn empty_for(&self, now: Instant) -> Option<Duration> {
        self.lock_state()
            .empty_at
            .map(|at| now.saturating_duration_since(at))
    }
}
