//! Module definitions for the capposix interface
//!
//! ## Interface Module
//!
//! Everything below the descriptor layer lives here: the `Substrate` trait
//! that names the capability-handle primitives the translation core is
//! allowed to call, the POSIX errno table and its translation from substrate
//! failures, sockaddr wire marshalling, and `MemSubstrate`, the in-memory
//! runtime used by default and by the test suite.
//!
//! The translation core in `safeposix` only reaches the runtime through the
//! `Substrate` trait, which keeps the set of host primitives small and
//! auditable.

mod comm;
pub mod errnos;
mod file;
mod memsub;
mod misc;
mod net;
mod pipe;
pub mod substrate;
mod timer;
pub mod types;
pub use comm::*;
pub use errnos::*;
pub use file::*;
pub use memsub::*;
pub use misc::*;
pub use net::*;
pub use pipe::*;
pub use substrate::*;
pub use timer::*;
pub use types::*;
