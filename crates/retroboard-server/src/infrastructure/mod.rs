//! Infrastructure layer of the server.
//!
//! Contains the adapters that touch the outside world: the JSON state file,
//! the TOML configuration file, the built-in visual programs and the
//! WebSocket control endpoint.
//!
//! **Dependency rule**: this layer may depend on `application` and
//! `retroboard_core`, but MUST NOT be imported by the `application` layer.

pub mod control;
pub mod programs;
pub mod storage;
