//! Domain types shared by the manager, the state store and the control
//! transport.
//!
//! Nothing in here performs I/O.  The carousel takes the current instant as
//! an argument so rotation can be driven by simulated time in tests.

pub mod carousel;
pub mod command;
pub mod settings;
pub mod snapshot;
