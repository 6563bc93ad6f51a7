//! Application layer of the server.
//!
//! Everything here depends on `retroboard_core` and on the traits declared in
//! this layer, never on files, sockets or a concrete display driver.
//!
//! # Sub-modules
//!
//! - **`command_queue`** – The unbounded FIFO that producers enqueue
//!   [`Command`](retroboard_core::Command)s into and the manager drains once
//!   per tick.
//!
//! - **`manager`** – The application manager: single-writer run loop, command
//!   dispatch, program lifecycle, carousel evaluation and crash isolation.
//!
//! - **`persistence`** – The [`StateRepository`](persistence::StateRepository)
//!   port the manager writes snapshots through.
//!
//! - **`status`** – The read-only [`ManagerStatus`](status::ManagerStatus)
//!   view published after every state change.

pub mod command_queue;
pub mod manager;
pub mod persistence;
pub mod status;
