//! The per-process descriptor table
//!
//! ## Handle Registry
//!
//! POSIX descriptors are small integers; substrate handles are not. The
//! table is an arena of `maxfd` slots, each behind its own reader/writer
//! lock, mapping a descriptor number to a [`FileDescriptor`] entry.
//!
//! Rules every caller relies on:
//!
//! - Claiming, releasing and replacing a number all happen inside that
//!   slot's write lock.
//! - No method holds two slot locks at once.
//! - Entries leave the table by value (cheap `Arc` clones), so blocking
//!   substrate calls never run under a slot lock, and displaced entries are
//!   dropped only after the lock is gone.
//!
//! An entry owns its substrate handle through a shared [`OwnedHandle`]. The
//! handle is closed exactly once, when the last descriptor sharing that open
//! file description goes away.

use crate::interface;
use crate::interface::errnos::Errno;
use crate::interface::substrate::{Handle, HandleKind, Rights, Substrate, SubstrateResult};
use crate::safeposix::syscalls::fs_constants::*;
use crate::safeposix::syscalls::net_constants::*;
use std::fmt;

/// A substrate handle together with the runtime that can close it
pub struct OwnedHandle {
    handle: Handle,
    substrate: interface::RustRfc<dyn Substrate>,
    released: interface::RustAtomicBool,
}

pub type HandleRef = interface::RustRfc<OwnedHandle>;

impl OwnedHandle {
    pub fn new(handle: Handle, substrate: interface::RustRfc<dyn Substrate>) -> HandleRef {
        interface::RustRfc::new(OwnedHandle {
            handle: handle,
            substrate: substrate,
            released: interface::RustAtomicBool::new(false),
        })
    }

    pub fn handle(&self) -> Handle {
        self.handle
    }

    /// Closes the handle now and reports how the substrate took it. Only the
    /// first call reaches the substrate.
    pub fn close(&self) -> SubstrateResult<()> {
        if self.released.swap(true, interface::RustAtomicOrdering::AcqRel) {
            return Ok(());
        }
        log::trace!("releasing {}", self.handle);
        self.substrate.close(self.handle)
    }
}

impl Drop for OwnedHandle {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            log::debug!("close of {} on drop failed: {}", self.handle, e);
        }
    }
}

impl fmt::Debug for OwnedHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OwnedHandle")
            .field("handle", &self.handle)
            .field("released", &self.released)
            .finish()
    }
}

/// Per socket state shared by every descriptor of one open socket
#[derive(Debug, Clone)]
pub struct SocketState {
    pub state: ConnState,
    pub localaddr: Option<interface::Endpoint>,
    pub remoteaddr: Option<interface::Endpoint>,
    //SOL_SOCKET boolean options, one bit per option number
    pub options: u32,
    //IPPROTO_TCP boolean options
    pub tcpoptions: u32,
    pub sndbuf: i32,
    pub rcvbuf: i32,
    pub errno: i32,
}

impl Default for SocketState {
    fn default() -> Self {
        SocketState {
            state: ConnState::NotConnected,
            localaddr: None,
            remoteaddr: None,
            options: 0,
            tcpoptions: 0,
            sndbuf: DEFAULT_SNDBUF,
            rcvbuf: DEFAULT_RCVBUF,
            errno: 0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct FileDesc {
    pub handle: HandleRef,
    pub position: interface::RustRfc<interface::RustMutex<u64>>,
    pub flags: i32,
    pub rights: Rights,
}

#[derive(Debug, Clone)]
pub struct DirDesc {
    pub handle: HandleRef,
    //substrate readdir cookie of the next entry
    pub cursor: interface::RustRfc<interface::RustMutex<u64>>,
    pub flags: i32,
    pub rights: Rights,
}

#[derive(Debug, Clone)]
pub struct SocketDesc {
    pub handle: HandleRef,
    pub domain: i32,
    pub socktype: i32,
    pub protocol: i32,
    pub state: interface::RustRfc<interface::RustLock<SocketState>>,
    pub flags: i32,
    pub rights: Rights,
}

#[derive(Debug, Clone)]
pub struct PipeDesc {
    pub handle: HandleRef,
    pub flags: i32,
    pub rights: Rights,
}

#[derive(Debug, Clone)]
pub struct EventDesc {
    pub handle: HandleRef,
    pub flags: i32,
    pub rights: Rights,
}

/// Anything the substrate hands us that has no more specific kind, stdio included
#[derive(Debug, Clone)]
pub struct StreamDesc {
    pub handle: HandleRef,
    pub kind: HandleKind,
    pub flags: i32,
    pub rights: Rights,
}

#[derive(Debug, Clone)]
pub enum FileDescriptor {
    File(FileDesc),
    Dir(DirDesc),
    Socket(SocketDesc),
    Pipe(PipeDesc),
    Event(EventDesc),
    Unknown(StreamDesc),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DescriptorKind {
    RegularFile,
    Directory,
    SocketStream,
    SocketDatagram,
    Pipe,
    Event,
    Unknown,
}

impl FileDescriptor {
    pub fn handle(&self) -> &HandleRef {
        match self {
            FileDescriptor::File(f) => &f.handle,
            FileDescriptor::Dir(d) => &d.handle,
            FileDescriptor::Socket(s) => &s.handle,
            FileDescriptor::Pipe(p) => &p.handle,
            FileDescriptor::Event(e) => &e.handle,
            FileDescriptor::Unknown(u) => &u.handle,
        }
    }

    pub fn into_handle(self) -> HandleRef {
        match self {
            FileDescriptor::File(f) => f.handle,
            FileDescriptor::Dir(d) => d.handle,
            FileDescriptor::Socket(s) => s.handle,
            FileDescriptor::Pipe(p) => p.handle,
            FileDescriptor::Event(e) => e.handle,
            FileDescriptor::Unknown(u) => u.handle,
        }
    }

    pub fn flags(&self) -> i32 {
        match self {
            FileDescriptor::File(f) => f.flags,
            FileDescriptor::Dir(d) => d.flags,
            FileDescriptor::Socket(s) => s.flags,
            FileDescriptor::Pipe(p) => p.flags,
            FileDescriptor::Event(e) => e.flags,
            FileDescriptor::Unknown(u) => u.flags,
        }
    }

    pub fn flags_mut(&mut self) -> &mut i32 {
        match self {
            FileDescriptor::File(f) => &mut f.flags,
            FileDescriptor::Dir(d) => &mut d.flags,
            FileDescriptor::Socket(s) => &mut s.flags,
            FileDescriptor::Pipe(p) => &mut p.flags,
            FileDescriptor::Event(e) => &mut e.flags,
            FileDescriptor::Unknown(u) => &mut u.flags,
        }
    }

    pub fn rights(&self) -> Rights {
        match self {
            FileDescriptor::File(f) => f.rights,
            FileDescriptor::Dir(d) => d.rights,
            FileDescriptor::Socket(s) => s.rights,
            FileDescriptor::Pipe(p) => p.rights,
            FileDescriptor::Event(e) => e.rights,
            FileDescriptor::Unknown(u) => u.rights,
        }
    }

    pub fn rights_mut(&mut self) -> &mut Rights {
        match self {
            FileDescriptor::File(f) => &mut f.rights,
            FileDescriptor::Dir(d) => &mut d.rights,
            FileDescriptor::Socket(s) => &mut s.rights,
            FileDescriptor::Pipe(p) => &mut p.rights,
            FileDescriptor::Event(e) => &mut e.rights,
            FileDescriptor::Unknown(u) => &mut u.rights,
        }
    }

    pub fn kind(&self) -> DescriptorKind {
        match self {
            FileDescriptor::File(_) => DescriptorKind::RegularFile,
            FileDescriptor::Dir(_) => DescriptorKind::Directory,
            FileDescriptor::Socket(s) if s.socktype == SOCK_DGRAM => DescriptorKind::SocketDatagram,
            FileDescriptor::Socket(_) => DescriptorKind::SocketStream,
            FileDescriptor::Pipe(_) => DescriptorKind::Pipe,
            FileDescriptor::Event(_) => DescriptorKind::Event,
            FileDescriptor::Unknown(_) => DescriptorKind::Unknown,
        }
    }

    /// The substrate's name for this kind, used to ask about readiness
    pub fn handle_kind(&self) -> HandleKind {
        match self {
            FileDescriptor::File(_) => HandleKind::RegularFile,
            FileDescriptor::Dir(_) => HandleKind::Directory,
            FileDescriptor::Socket(s) if s.socktype == SOCK_DGRAM => HandleKind::SocketDatagram,
            FileDescriptor::Socket(_) => HandleKind::SocketStream,
            FileDescriptor::Pipe(_) => HandleKind::Pipe,
            FileDescriptor::Event(_) => HandleKind::Event,
            FileDescriptor::Unknown(u) => u.kind,
        }
    }

    pub fn is_nonblocking(&self) -> bool {
        self.flags() & O_NONBLOCK != 0
    }

    /// Fails with EACCES unless every right in `needed` is held
    pub fn require(&self, needed: Rights) -> Result<(), Errno> {
        if self.rights().contains(needed) {
            Ok(())
        } else {
            Err(Errno::EACCES)
        }
    }

    /// Copy for a new descriptor sharing this open file description.
    /// Close-on-exec is per descriptor and is only set when asked for.
    pub fn duplicate(&self, cloexec: bool) -> FileDescriptor {
        let mut dup = self.clone();
        let flags = dup.flags_mut();
        if cloexec {
            *flags |= O_CLOEXEC;
        } else {
            *flags &= !O_CLOEXEC;
        }
        dup
    }
}

type Slot = interface::RustLock<Option<FileDescriptor>>;

pub struct FdTable {
    slots: Vec<Slot>,
}

impl FdTable {
    pub fn new(maxfd: usize) -> FdTable {
        let mut slots = Vec::with_capacity(maxfd);
        slots.resize_with(maxfd, || interface::RustLock::new(None));
        FdTable { slots: slots }
    }

    pub fn maxfd(&self) -> i32 {
        self.slots.len() as i32
    }

    fn slot(&self, fd: i32) -> Result<&Slot, Errno> {
        if fd < 0 {
            return Err(Errno::EBADF);
        }
        self.slots.get(fd as usize).ok_or(Errno::EBADF)
    }

    /// ### Description
    ///
    /// Finds the lowest free number at or above `startfd` and returns it with
    /// its slot still write locked, so the caller can fill it in before
    /// anyone else can claim it. Slots are taken one at a time; a slot found
    /// occupied is unlocked before the next one is tried.
    ///
    /// ### Errors
    ///
    /// * EMFILE - every number from `startfd` up is in use
    fn get_next_fd(
        &self,
        startfd: i32,
    ) -> Result<(i32, interface::RustLockWriteGuard<'_, Option<FileDescriptor>>), Errno> {
        let start = startfd.max(STARTINGFD) as usize;
        for (fd, slot) in self.slots.iter().enumerate().skip(start) {
            let guard = slot.write();
            if guard.is_none() {
                return Ok((fd as i32, guard));
            }
        }
        Err(Errno::EMFILE)
    }

    /// Whether some number at or above `startfd` is free right now. Another
    /// thread may take it before the caller does, so this only lets a call
    /// fail early with EMFILE before it asks the substrate for anything.
    pub fn has_free(&self, startfd: i32) -> bool {
        let start = startfd.max(STARTINGFD) as usize;
        self.slots.iter().skip(start).any(|slot| slot.read().is_none())
    }

    /// Places an entry at the lowest free number at or above `startfd`
    pub fn allocate(&self, entry: FileDescriptor, startfd: i32) -> Result<i32, Errno> {
        let (fd, mut guard) = self.get_next_fd(startfd)?;
        Self::fill(fd, &mut guard, entry);
        Ok(fd)
    }

    /// Fills a slot claimed through `get_next_fd`
    fn fill(
        fd: i32,
        guard: &mut interface::RustLockWriteGuard<'_, Option<FileDescriptor>>,
        entry: FileDescriptor,
    ) {
        if guard.is_some() {
            log::error!("descriptor {} was claimed while already occupied", fd);
            panic!("descriptor table corrupted at {}", fd);
        }
        log::trace!("fd {} -> {}", fd, entry.handle().handle());
        **guard = Some(entry);
    }

    /// Clone of the entry at `fd`; the slot is unlocked again on return
    pub fn resolve(&self, fd: i32) -> Result<FileDescriptor, Errno> {
        self.slot(fd)?.read().clone().ok_or(Errno::EBADF)
    }

    /// Takes the entry out of `fd`, leaving the number free
    pub fn release(&self, fd: i32) -> Result<FileDescriptor, Errno> {
        let entry = self.slot(fd)?.write().take().ok_or(Errno::EBADF)?;
        log::trace!("fd {} released", fd);
        Ok(entry)
    }

    /// New descriptor at the lowest free number at or above `startfd`
    /// sharing `fd`'s open file description
    pub fn duplicate(&self, fd: i32, startfd: i32, cloexec: bool) -> Result<i32, Errno> {
        let entry = self.resolve(fd)?;
        self.allocate(entry.duplicate(cloexec), startfd)
    }

    /// Puts `entry` at `fd` in one step, returning whatever was there. The
    /// caller drops the displaced entry after this returns.
    pub fn install_at(&self, fd: i32, entry: FileDescriptor) -> Result<Option<FileDescriptor>, Errno> {
        let mut guard = self.slot(fd)?.write();
        log::trace!("fd {} replaced with {}", fd, entry.handle().handle());
        Ok(guard.replace(entry))
    }

    /// Runs `f` on the entry at `fd` under its write lock. `f` must not block.
    pub fn with_entry_mut<R>(&self, fd: i32, f: impl FnOnce(&mut FileDescriptor) -> R) -> Result<R, Errno> {
        let mut guard = self.slot(fd)?.write();
        match &mut *guard {
            Some(entry) => Ok(f(entry)),
            None => Err(Errno::EBADF),
        }
    }

    /// Empties the table, returning every entry that was in it
    pub fn drain(&self) -> Vec<FileDescriptor> {
        self.slots.iter().filter_map(|slot| slot.write().take()).collect()
    }

    pub fn open_count(&self) -> usize {
        self.slots.iter().filter(|slot| slot.read().is_some()).count()
    }
}

/// Closes the handle if `entry` was the last descriptor using it
pub fn close_entry(entry: FileDescriptor) -> SubstrateResult<()> {
    match interface::RustRfc::try_unwrap(entry.into_handle()) {
        Ok(owned) => owned.close(),
        // someone else still has it open, dropping our reference is all
        Err(_shared) => Ok(()),
    }
}
