//! # retroboard-core
//!
//! Shared library for Retroboard containing the command vocabulary, the
//! carousel scheduler, the persisted snapshot schema, the display surface
//! contract and the program lifecycle contract.
//!
//! This crate is used by the server binary and by anything that wants to
//! implement a visual program.  It has no dependencies on sockets, files or an
//! async runtime.
//!
//! # Architecture overview
//!
//! Retroboard drives one shared pixel display.  Exactly one *program* (a
//! clock, scrolling text, a star field...) owns the display at a time.  An
//! application manager in the server crate owns all mutable state and applies
//! [`Command`]s that external producers enqueue.
//!
//! - **`domain`** – Commands, global settings, the carousel (timed rotation
//!   through a playlist) and the snapshot that is written to disk.
//!
//! - **`display`** – The [`DisplaySurface`] trait every driver implements, the
//!   [`FrameBuffer`] used for double-buffering and an in-memory
//!   [`SimulatedSurface`].
//!
//! - **`program`** – The [`Program`] trait, its error types, the cooperative
//!   stop signal and the name→factory [`ProgramRegistry`].

pub mod display;
pub mod domain;
pub mod program;

pub use display::{DisplaySurface, FrameBuffer, Rgb, SimulatedSurface};
pub use domain::carousel::{Carousel, CarouselState, PlaylistEntry};
pub use domain::command::Command;
pub use domain::settings::GlobalSettings;
pub use domain::snapshot::{PersistedCarousel, PersistedSnapshot};
pub use program::registry::{ProgramFactory, ProgramRegistry};
pub use program::{
    merge_config, Program, ProgramConfig, ProgramContext, RuntimeError, SetupError, StopHandle,
    StopSignal,
};
