//! Storage infrastructure: server configuration and durable manager state.
//!
//! - `config` reads and writes the TOML [`ServerConfig`](config::ServerConfig).
//! - `state_store` implements the manager's
//!   [`StateRepository`](crate::application::persistence::StateRepository)
//!   port on top of an atomically replaced JSON file.

pub mod config;
pub mod state_store;
