// Timer functions for Rust interface.

use std::thread;
pub use std::time::Duration as RustDuration;
pub use std::time::Instant as RustInstant;

// Granularity of the sleep used by substrate waiting loops
pub const BLOCK_TIME: RustDuration = RustDuration::from_micros(100);

pub fn starttimer() -> RustInstant {
    RustInstant::now()
}

pub fn readtimer(now: RustInstant) -> RustDuration {
    now.elapsed()
}

pub fn sleep(dur: RustDuration) {
    thread::sleep(dur);
}

// Converts a poll(2) style millisecond timeout, negative meaning forever
pub fn duration_from_millis(ms: i32) -> Option<RustDuration> {
    if ms < 0 {
        None
    } else {
        Some(RustDuration::from_millis(ms as u64))
    }
}

// Converts a select(2) style timeval, None if the timeval is malformed
pub fn duration_from_timeval(sec: i64, usec: i64) -> Option<RustDuration> {
    if sec < 0 || !(0..1_000_000).contains(&usec) {
        return None;
    }
    Some(RustDuration::from_secs(sec as u64) + RustDuration::from_micros(usec as u64))
}
