//! # Beamdrop Hub Library
//!
//! This crate provides the hub (server) functionality for Beamdrop,
//! a LAN-local file relay for ad-hoc phone-to-laptop transfers.
//!
//! ## Overview
//!
//! The hub is a single process on the local network. Devices connect over
//! WebSocket, group into short-lived sessions addressed by 6-character
//! codes, and relay files through in-memory buffers:
//!
//! - **Session Registry**: session creation, joining by code, membership
//! - **File Buffer Store**: chunked uploads buffered per session
//! - **Transfer Protocol**: handshake, upload/download streaming, deletes
//! - **Broadcaster**: fan-out of session events to peers
//! - **Janitor**: TTL-based reclamation of files and empty sessions
//! - **HTTP/WS Facade**: one port for the WebSocket upgrade and the
//!   read-only JSON API (QR code, hub info, stats, feedback)
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                       HTTP/WS Facade                         │
//! ├──────────────────────────────────────────────────────────────┤
//! │                                                              │
//! │  ┌────────────────┐   per connection   ┌──────────────────┐  │
//! │  │   Read loop    │ ─── handlers ───▶  │  Writer task     │  │
//! │  └────────────────┘                    └──────────────────┘  │
//! │          │                                      ▲            │
//! │          ▼                                      │            │
//! │  ┌──────────────────────────────┐    ┌───────────────────┐   │
//! │  │  Session Registry + Files    │───▶│   Broadcaster     │   │
//! │  └──────────────────────────────┘    └───────────────────┘   │
//! │          ▲                                                   │
//! │  ┌───────────────┐                                           │
//! │  │    Janitor    │                                           │
//! │  └───────────────┘                                           │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`config`]: configuration loading and defaults
//! - [`hub`]: shared state wiring
//! - [`session`]: session registry and in-memory file buffers
//! - [`net`]: connections, frame dispatch, broadcast, HTTP/WS facade
//! - [`janitor`]: TTL sweeps and empty-session reclamation
//! - [`stats`]: persisted usage counters and feedback log
//! - [`qr`]: QR code rendering for the join URL

pub mod config;
pub mod hub;
pub mod janitor;
pub mod net;
pub mod qr;
pub mod session;
pub mod stats;

// Re-export the types the binary and tests reach for most.
pub use config::Config;
pub use hub::Hub;
pub use net::Server;
pub use session::{Device, FileStore, Session, SessionRegistry};
pub use stats::{FeedbackLog, StatsStore, UsageStats};
