// Misc functions for interface
// Locks, collections, yield, etc.

pub use dashmap::{mapref::entry::Entry as RustHashEntry, DashMap as RustHashMap};
pub use parking_lot::{
    Condvar as RustCondvar, Mutex as RustMutex, RwLock as RustLock,
    RwLockReadGuard as RustLockReadGuard, RwLockWriteGuard as RustLockWriteGuard,
};
pub use std::collections::{BTreeMap as RustBTreeMap, VecDeque as RustDeque};
pub use std::sync::atomic::{
    AtomicBool as RustAtomicBool, AtomicI32 as RustAtomicI32, AtomicU16 as RustAtomicU16,
    AtomicU32 as RustAtomicU32, AtomicU64 as RustAtomicU64, AtomicUsize as RustAtomicUsize,
    Ordering as RustAtomicOrdering,
};
pub use std::sync::{Arc as RustRfc, LazyLock as RustLazyGlobal, Weak as RustWeak};

use std::sync::OnceLock;

pub static VERBOSE: OnceLock<isize> = OnceLock::new();

/// Verbosity the process was initialized with, 0 if never set
pub fn verbosity() -> isize {
    *VERBOSE.get().unwrap_or(&0)
}

pub fn new_hashmap<K: std::cmp::Eq + std::hash::Hash, V>() -> RustHashMap<K, V> {
    RustHashMap::new()
}

// we yield while spinning on an unready resource so other threads can make progress
pub fn cap_yield() {
    std::thread::yield_now();
}
