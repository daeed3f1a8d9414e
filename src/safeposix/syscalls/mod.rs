//! This module acts a wrapper for all system calls in the capposix
//! environment, with methods for each system call divided into three
//! categories: filesystem, network and readiness
//!
//! ## System Calls
//!
//! Process objects have methods for system calls. They return a non-negative
//! result or a negated value from the `errno` enum.
//!

pub mod fs_calls;
pub mod fs_constants;
pub mod net_calls;
pub mod net_constants;
pub mod poll_calls;
pub mod sys_constants;
pub use fs_calls::*;
pub use fs_constants::*;
pub use net_calls::*;
pub use net_constants::*;
pub use poll_calls::*;
pub use sys_constants::*;
