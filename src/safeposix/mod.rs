//! This module translates POSIX descriptor calls onto a capability-handle
//! substrate.
//!
//! ## top-level features:
//!
//! - ### Dispatcher:
//!     - The dispatcher receives numbered call requests over a raw argument
//!       union, decodes the arguments, calls the method on the process
//!       object and turns negative results into `-1` plus the last-error
//!       cell.
//!
//! - ### Process Object:
//!     - A process binds one descriptor table to one substrate, resolves the
//!       root preopened directory and owns the stdio descriptors.
//!
//! - ### File Descriptor Table:
//!     - An arena of per-slot locked entries mapping small integers to
//!       substrate handles. Entries are an enum over the descriptor kinds
//!       (File, Dir, Socket, Pipe, Event, Unknown) and share their handle
//!       with every duplicate of the same open file description.
//!
//! - ### System Calls:
//!     - The process object has public methods corresponding to each system
//!       call, split into filesystem, network and readiness calls in their
//!       respective files.

pub mod dispatcher;
pub mod fdtable;
pub mod process;
pub mod syscall_numbers;
pub mod syscalls;
