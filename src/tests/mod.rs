mod networking_tests;
mod pipe_tests;
mod poll_tests;

use crate::interface;
use crate::interface::MemSubstrate;
use crate::safeposix::process::{Process, ProcessConfig};

// logs go to the test harness capture, run with RUST_LOG=debug to see them
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// A process over a fresh in-memory substrate, stdio installed at 0, 1 and 2
pub fn setup() -> (interface::RustRfc<MemSubstrate>, Process) {
    setup_with(ProcessConfig::default())
}

pub fn setup_with(config: ProcessConfig) -> (interface::RustRfc<MemSubstrate>, Process) {
    init_logging();
    let substrate = interface::RustRfc::new(MemSubstrate::new());
    let process = Process::new(substrate.clone(), config);
    (substrate, process)
}

/// A process with an empty descriptor table of `maxfd` slots
pub fn setup_bare(maxfd: usize) -> (interface::RustRfc<MemSubstrate>, Process) {
    setup_with(ProcessConfig {
        maxfd: maxfd,
        verbosity: 0,
        install_stdio: false,
    })
}

pub fn cbuf2str(buf: &[u8]) -> &str {
    std::str::from_utf8(buf).unwrap()
}
