//! WebSocket JSON control endpoint.
//!
//! ```text
//! client (JSON text frames)
//!     ↕
//! ws_server   accept loop, one task per session
//!     ↕
//! handler     parse → validate → enqueue Command / answer query
//!     ↕
//! CommandSender (write)   watch::Receiver<ManagerStatus> (read)
//! ```
//!
//! The control layer never touches manager state: writes go through the
//! command queue and reads come from the published status.

pub mod handler;
pub mod messages;
pub mod ws_server;

pub use handler::ControlHandler;
pub use messages::{ControlError, ControlRequest, ControlResponse, Query};
pub use ws_server::{bind, serve};
