//! Connection handling, frame dispatch, and the HTTP/WebSocket facade.

pub mod broadcast;
pub mod connection;
pub mod handlers;
pub mod info;
pub mod server;

pub use connection::ConnHandle;
pub use server::Server;
