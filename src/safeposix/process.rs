//! The process object every syscall method hangs off
//!
//! A [`Process`] binds one descriptor table to one substrate. It resolves the
//! root preopen once at construction, optionally installs the substrate's
//! stdio handles at 0, 1 and 2, and on teardown releases every handle the
//! table still owns.

use crate::interface;
use crate::interface::substrate::{Handle, HandleKind, Rights, Substrate};
use crate::safeposix::fdtable::*;
use crate::safeposix::syscalls::fs_constants::*;
use crate::safeposix::syscalls::sys_constants::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessConfig {
    /// Size of the descriptor table
    pub maxfd: usize,
    pub verbosity: isize,
    /// Put the substrate's stdio handles at descriptors 0, 1 and 2
    pub install_stdio: bool,
}

impl Default for ProcessConfig {
    fn default() -> Self {
        ProcessConfig {
            maxfd: MAXFD as usize,
            verbosity: 0,
            install_stdio: true,
        }
    }
}

impl ProcessConfig {
    /// Defaults overridden by CAPPOSIX_MAXFD and CAPPOSIX_VERBOSE when set and parseable
    pub fn from_env() -> ProcessConfig {
        let mut config = ProcessConfig::default();
        if let Some(maxfd) = std::env::var(MAXFD_ENV).ok().and_then(|v| v.parse::<usize>().ok()) {
            if maxfd > 0 {
                config.maxfd = maxfd;
            }
        }
        if let Some(verbosity) = std::env::var(VERBOSE_ENV).ok().and_then(|v| v.parse::<isize>().ok()) {
            config.verbosity = verbosity;
        }
        config
    }
}

pub struct Process {
    pub fdtable: FdTable,
    substrate: interface::RustRfc<dyn Substrate>,
    root: Option<Handle>,
    config: ProcessConfig,
}

impl Process {
    pub fn new(substrate: interface::RustRfc<dyn Substrate>, config: ProcessConfig) -> Process {
        let preopens = substrate.preopens();
        // absolute paths resolve under "/" when it is granted, else under the first preopen
        let root = preopens
            .iter()
            .find(|p| p.path == "/")
            .or_else(|| preopens.first())
            .map(|p| p.handle);
        if root.is_none() {
            log::warn!("substrate granted no preopened directory, paths will not resolve");
        }

        let process = Process {
            fdtable: FdTable::new(config.maxfd),
            substrate: substrate,
            root: root,
            config: config,
        };
        if config.install_stdio {
            process.install_stdio();
        }
        log::info!(
            "process up: maxfd {}, root {:?}, {} descriptors open",
            config.maxfd,
            root,
            process.fdtable.open_count()
        );
        process
    }

    fn install_stdio(&self) {
        let handles = match self.substrate.stdio() {
            Some(handles) => handles,
            None => return,
        };
        let layout = [
            (STDIN_FILENO, O_RDONLY, Rights::stream_read()),
            (STDOUT_FILENO, O_WRONLY, Rights::stream_write()),
            (STDERR_FILENO, O_WRONLY, Rights::stream_write()),
        ];
        for (handle, (fd, flags, rights)) in handles.iter().zip(layout) {
            let kind = match self.substrate.stat(*handle) {
                Ok(stat) => stat.kind,
                Err(_) => HandleKind::Unknown,
            };
            let entry = FileDescriptor::Unknown(StreamDesc {
                handle: OwnedHandle::new(*handle, self.substrate.clone()),
                kind: kind,
                flags: flags,
                rights: rights,
            });
            if let Ok(Some(displaced)) = self.fdtable.install_at(fd, entry) {
                drop(displaced);
            }
        }
    }

    pub fn substrate(&self) -> &interface::RustRfc<dyn Substrate> {
        &self.substrate
    }

    pub fn root_handle(&self) -> Option<Handle> {
        self.root
    }

    pub fn config(&self) -> &ProcessConfig {
        &self.config
    }

    /// Wraps a fresh substrate handle so it is closed when its last descriptor goes
    pub fn own(&self, handle: Handle) -> HandleRef {
        OwnedHandle::new(handle, self.substrate.clone())
    }

    /// Closes every descriptor still open, returning how many there were
    pub fn teardown(&self) -> usize {
        let entries = self.fdtable.drain();
        let count = entries.len();
        for entry in entries {
            if let Err(e) = close_entry(entry) {
                log::debug!("teardown close failed: {}", e);
            }
        }
        log::info!("process torn down, {} descriptors closed", count);
        count
    }
}

impl Drop for Process {
    fn drop(&mut self) {
        if self.fdtable.open_count() > 0 {
            self.teardown();
        }
    }
}
