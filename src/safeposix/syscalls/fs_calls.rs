//! This module contains all descriptor lifecycle and I/O system calls.
//!
//! ## Notes:
//!
//! - These calls are implementations of the [`Process`] struct in the
//!   [`safeposix`](crate::safeposix) crate. They have been split into their
//!   own module for maintainability, so this module's rustdoc may turn up
//!   empty; they are listed below for documentation purposes.
//!
//! ## File System Calls
//!
//! Processes have methods for filesystem-related calls. They return a
//! non-negative result or a negated value from the `errno` enum.
//!
//! - [open_syscall](crate::safeposix::process::Process::open_syscall)
//! - [close_syscall](crate::safeposix::process::Process::close_syscall)
//! - [dup_syscall](crate::safeposix::process::Process::dup_syscall)
//! - [dup2_syscall](crate::safeposix::process::Process::dup2_syscall)
//! - [dup3_syscall](crate::safeposix::process::Process::dup3_syscall)
//! - [fcntl_syscall](crate::safeposix::process::Process::fcntl_syscall)
//! - [pipe_syscall](crate::safeposix::process::Process::pipe_syscall)
//! - [pipe2_syscall](crate::safeposix::process::Process::pipe2_syscall)
//! - [eventfd_syscall](crate::safeposix::process::Process::eventfd_syscall)
//! - [mkdir_syscall](crate::safeposix::process::Process::mkdir_syscall)
//! - [symlink_syscall](crate::safeposix::process::Process::symlink_syscall)
//! - [opendir_syscall](crate::safeposix::process::Process::opendir_syscall)
//! - [readdir_syscall](crate::safeposix::process::Process::readdir_syscall)
//! - [closedir_syscall](crate::safeposix::process::Process::closedir_syscall)
//! - [read_syscall](crate::safeposix::process::Process::read_syscall)
//! - [write_syscall](crate::safeposix::process::Process::write_syscall)
//! - [pread_syscall](crate::safeposix::process::Process::pread_syscall)
//! - [pwrite_syscall](crate::safeposix::process::Process::pwrite_syscall)
//! - [readv_syscall](crate::safeposix::process::Process::readv_syscall)
//! - [writev_syscall](crate::safeposix::process::Process::writev_syscall)
//! - [lseek_syscall](crate::safeposix::process::Process::lseek_syscall)
//! - [ftruncate_syscall](crate::safeposix::process::Process::ftruncate_syscall)
//! - [fstat_syscall](crate::safeposix::process::Process::fstat_syscall)
//! - [ioctl_syscall](crate::safeposix::process::Process::ioctl_syscall)
//! - [getdents_syscall](crate::safeposix::process::Process::getdents_syscall)

// File system related system calls
use super::fs_constants::*;
use crate::interface;
use crate::interface::errnos::{substrate_error, syscall_error, Errno};
use crate::interface::substrate::*;
use crate::interface::types::{PipeArray, StatData};
use crate::safeposix::fdtable::{FileDescriptor::*, *};
use crate::safeposix::process::Process;

// d_ino, d_off, d_reclen and d_type ahead of the name
const DIRENT_HEADER_SIZE: usize = 19;

/// One directory entry as readdir hands it back
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReaddirEntry {
    pub d_ino: u64,
    /// cookie of the entry after this one
    pub d_off: u64,
    pub d_type: u8,
    pub d_name: String,
}

fn d_type_of(kind: HandleKind) -> u8 {
    match kind {
        HandleKind::RegularFile => DT_REG,
        HandleKind::Directory => DT_DIR,
        HandleKind::SymbolicLink => DT_LNK,
        HandleKind::SocketStream | HandleKind::SocketDatagram => DT_SOCK,
        HandleKind::Pipe => DT_FIFO,
        HandleKind::CharacterDevice => DT_CHR,
        HandleKind::Event | HandleKind::Unknown => DT_UNKNOWN,
    }
}

fn mode_of(kind: HandleKind) -> u32 {
    match kind {
        HandleKind::RegularFile => S_IFREG | 0o644,
        HandleKind::Directory => S_IFDIR | 0o755,
        HandleKind::SymbolicLink => S_IFLNK | 0o777,
        HandleKind::SocketStream | HandleKind::SocketDatagram => S_IFSOCK | 0o777,
        HandleKind::Pipe => S_IFIFO | 0o600,
        HandleKind::CharacterDevice => S_IFCHR | 0o620,
        // eventfd reports an anonymous inode with no type bits
        HandleKind::Event | HandleKind::Unknown => 0o600,
    }
}

// Every path is resolved under the root preopen, absolute or not
fn relative_to_root(path: &str) -> &str {
    let trimmed = path.trim_start_matches('/');
    if trimmed.is_empty() {
        "."
    } else {
        trimmed
    }
}

// Syscalls report byte counts as i32
fn clamp_len(len: usize) -> usize {
    len.min(i32::MAX as usize)
}

impl Process {
    pub(crate) fn get_entry(&self, fd: i32, syscall: &str) -> Result<FileDescriptor, i32> {
        self.fdtable
            .resolve(fd)
            .map_err(|e| syscall_error(e, syscall, "invalid file descriptor"))
    }

    /// ### Description
    ///
    /// Asks the substrate, without waiting, whether `entry` could make
    /// progress on `interest` right now.
    ///
    /// ### Returns
    ///
    /// `Some(nbytes)` when ready, where nbytes is what the substrate says is
    /// readable or writable (0 when unknown or when the peer hung up), `None`
    /// when the call would suspend. Kinds the substrate cannot poll are
    /// always ready.
    pub(crate) fn ready_now(&self, entry: &FileDescriptor, interest: Interest, syscall: &str) -> Result<Option<u64>, i32> {
        if !self.substrate().has_readiness(entry.handle_kind()) {
            return Ok(Some(0));
        }
        let subscription = Subscription {
            userdata: 0,
            handle: entry.handle().handle(),
            interest: interest,
        };
        let events = self
            .substrate()
            .poll_oneoff(&[subscription], Some(interface::RustDuration::ZERO))
            .map_err(|e| substrate_error(e, syscall))?;
        Ok(events.first().map(|event| {
            if event.error.is_some() || event.hangup {
                0
            } else {
                event.nbytes
            }
        }))
    }

    fn stream_read(&self, entry: &FileDescriptor, buf: &mut [u8], syscall: &str) -> i32 {
        if entry.is_nonblocking() {
            match self.ready_now(entry, Interest::Read, syscall) {
                Err(e) => return e,
                Ok(None) => return syscall_error(Errno::EAGAIN, syscall, "there is no data available right now, try again later"),
                Ok(Some(_)) => {}
            }
        }
        match self.substrate().read_stream(entry.handle().handle(), buf, entry.is_nonblocking()) {
            Ok(count) => count as i32,
            Err(e) => substrate_error(e, syscall),
        }
    }

    fn stream_write(&self, entry: &FileDescriptor, buf: &[u8], syscall: &str) -> i32 {
        let mut buf = buf;
        if entry.is_nonblocking() {
            match self.ready_now(entry, Interest::Write, syscall) {
                Err(e) => return e,
                Ok(None) => return syscall_error(Errno::EAGAIN, syscall, "there is no room to write right now, try again later"),
                // a pipe may take less than asked, write only what fits so the call cannot suspend
                Ok(Some(room)) if room > 0 && entry.kind() == DescriptorKind::Pipe => {
                    let room = room.min(buf.len() as u64) as usize;
                    buf = &buf[..room];
                }
                Ok(Some(_)) => {}
            }
        }
        match self.substrate().write_stream(entry.handle().handle(), buf, entry.is_nonblocking()) {
            Ok(count) => count as i32,
            Err(e) => substrate_error(e, syscall),
        }
    }

    fn open_entry(&self, path: &str, flags: i32) -> Result<FileDescriptor, i32> {
        let root = match self.root_handle() {
            Some(root) => root,
            None => return Err(syscall_error(Errno::EACCES, "open", "no preopened directory to resolve the path under")),
        };
        let accmode = flags & O_RDWRFLAGS;

        let mut lookup = LookupFlags::empty();
        if flags & O_NOFOLLOW == 0 {
            lookup |= LookupFlags::SYMLINK_FOLLOW;
        }
        let mut oflags = OpenFlags::empty();
        if flags & O_CREAT != 0 {
            oflags |= OpenFlags::CREATE;
        }
        if flags & O_EXCL != 0 {
            oflags |= OpenFlags::EXCLUSIVE;
        }
        if flags & O_DIRECTORY != 0 {
            oflags |= OpenFlags::DIRECTORY;
        }
        // O_TRUNC on a read-only open is unspecified, we leave the file alone
        if flags & O_TRUNC != 0 && accmode != O_RDONLY {
            oflags |= OpenFlags::TRUNCATE;
        }

        // ask for everything the access mode allows, the kind decides what sticks
        let mut rights = Rights::directory();
        if accmode != O_WRONLY {
            rights |= Rights::file_read();
        }
        if accmode != O_RDONLY {
            rights |= Rights::file_write();
        }

        let handle = self
            .substrate()
            .open_at(root, relative_to_root(path), lookup, oflags, rights)
            .map_err(|e| substrate_error(e, "open"))?;
        // from here on dropping `owned` gives the handle back
        let owned = self.own(handle);
        let stat = self.substrate().stat(handle).map_err(|e| substrate_error(e, "open"))?;
        let kept = flags & O_KEPTFLAGS;

        match stat.kind {
            HandleKind::Directory => {
                if accmode != O_RDONLY {
                    return Err(syscall_error(Errno::EISDIR, "open", "a directory cannot be opened for writing"));
                }
                Ok(Dir(DirDesc {
                    handle: owned,
                    cursor: interface::RustRfc::new(interface::RustMutex::new(0)),
                    flags: kept,
                    rights: rights & Rights::directory(),
                }))
            }
            _ if flags & O_DIRECTORY != 0 => Err(syscall_error(Errno::ENOTDIR, "open", "path is not a directory")),
            HandleKind::RegularFile => Ok(File(FileDesc {
                handle: owned,
                position: interface::RustRfc::new(interface::RustMutex::new(0)),
                flags: kept,
                rights: rights & (Rights::file_read() | Rights::file_write()),
            })),
            kind => Ok(Unknown(StreamDesc {
                handle: owned,
                kind: kind,
                flags: kept,
                rights: rights & (Rights::stream_read() | Rights::stream_write()),
            })),
        }
    }

    /// ## ------------------OPEN SYSCALL------------------
    /// ### Description
    ///
    /// The `open_syscall()` resolves `path` under the root preopened
    /// directory, obtains a substrate handle for it and binds the handle to
    /// the lowest free descriptor number. The number is claimed before the
    /// substrate is touched, so a full table fails without side effects.
    ///
    /// ### Function Arguments
    ///
    /// * `path` - the file to open. Absolute paths are taken relative to the
    ///   root preopen; `..` may never climb above it.
    /// * `flags` - access mode plus O_CREAT, O_EXCL, O_TRUNC, O_APPEND,
    ///   O_NONBLOCK, O_DIRECTORY, O_NOFOLLOW and O_CLOEXEC.
    /// * `_mode` - permission bits for a created file. Capabilities replace
    ///   permission bits, so they are accepted and ignored.
    ///
    /// ### Returns
    ///
    /// The new file descriptor.
    ///
    /// ### Errors
    ///
    /// * ENOENT - the path is empty or does not exist without O_CREAT
    /// * EINVAL - the access mode is not one of O_RDONLY, O_WRONLY, O_RDWR
    /// * EMFILE - every descriptor number is in use
    /// * ENFILE - the substrate has no room for another handle
    /// * EACCES - the path escapes the root or the root lacks the rights
    /// * ELOOP - too many symbolic links, or O_NOFOLLOW on a final symlink
    /// * EISDIR - a directory was opened for writing
    /// * ENOTDIR - O_DIRECTORY on something that is not a directory
    /// * EEXIST - O_CREAT | O_EXCL and the path exists
    ///
    /// For more detailed description of all the commands and return values, see
    /// [open(2)](https://man7.org/linux/man-pages/man2/open.2.html)
    pub fn open_syscall(&self, path: &str, flags: i32, _mode: u32) -> i32 {
        // Check that the given input path is not empty
        if path.is_empty() {
            return syscall_error(Errno::ENOENT, "open", "given path was null");
        }
        if flags & O_RDWRFLAGS == O_RDWRFLAGS {
            return syscall_error(Errno::EINVAL, "open", "invalid access mode");
        }

        // a full table fails before anything is created
        if !self.fdtable.has_free(STARTINGFD) {
            return syscall_error(Errno::EMFILE, "open", "no available file descriptor number could be found");
        }
        // no slot is held while the substrate works, the entry closes its
        // handle if the table filled up in the meantime
        let entry = match self.open_entry(path, flags) {
            Ok(entry) => entry,
            Err(e) => return e,
        };
        match self.fdtable.allocate(entry, STARTINGFD) {
            Ok(fd) => fd,
            Err(e) => syscall_error(e, "open", "no available file descriptor number could be found"),
        }
    }

    /// ## ------------------CLOSE SYSCALL------------------
    /// ### Description
    ///
    /// Frees the descriptor number. The substrate handle is released when
    /// this was the last descriptor sharing it; a substrate failure on that
    /// release is reported, but the number is free either way.
    ///
    /// ### Errors
    ///
    /// * EBADF - `fd` is not open. A second close of the same number lands here
    ///   and never reaches the substrate.
    ///
    /// [close(2)](https://man7.org/linux/man-pages/man2/close.2.html)
    pub fn close_syscall(&self, fd: i32) -> i32 {
        let entry = match self.fdtable.release(fd) {
            Ok(entry) => entry,
            Err(e) => return syscall_error(e, "close", "invalid file descriptor"),
        };
        match close_entry(entry) {
            Ok(()) => 0,
            Err(e) => substrate_error(e, "close"),
        }
    }

    /// ## ------------------DUP SYSCALL------------------
    /// ### Description
    ///
    /// Creates a new descriptor, the lowest free number at or above
    /// `start_desc` (0 when None), sharing `fd`'s open file description:
    /// handle, offset and socket state. The copy does not inherit
    /// close-on-exec.
    ///
    /// ### Errors
    ///
    /// * EBADF - `fd` is not open
    /// * EMFILE - no free number
    ///
    /// [dup(2)](https://man7.org/linux/man-pages/man2/dup.2.html)
    pub fn dup_syscall(&self, fd: i32, start_desc: Option<i32>) -> i32 {
        let start = start_desc.unwrap_or(STARTINGFD);
        match self.fdtable.duplicate(fd, start, false) {
            Ok(newfd) => newfd,
            Err(e) => syscall_error(e, "dup", "could not duplicate the file descriptor"),
        }
    }

    fn install_dup(&self, entry: FileDescriptor, newfd: i32, syscall: &str) -> i32 {
        match self.fdtable.install_at(newfd, entry) {
            Ok(displaced) => {
                // the old occupant is closed silently, as dup2 does
                if let Some(displaced) = displaced {
                    if let Err(e) = close_entry(displaced) {
                        log::debug!("{}: closing displaced descriptor {} failed: {}", syscall, newfd, e);
                    }
                }
                newfd
            }
            Err(e) => syscall_error(e, syscall, "invalid new file descriptor"),
        }
    }

    /// ## ------------------DUP2 SYSCALL------------------
    /// ### Description
    ///
    /// Makes `newfd` refer to `oldfd`'s open file description. Whatever
    /// `newfd` referred to before is replaced in one step under that slot's
    /// lock, so no other thread can observe `newfd` closed in between, and
    /// is closed afterwards.
    ///
    /// ### Errors
    ///
    /// * EBADF - `oldfd` is not open or `newfd` is out of range
    ///
    /// [dup2(2)](https://man7.org/linux/man-pages/man2/dup2.2.html)
    pub fn dup2_syscall(&self, oldfd: i32, newfd: i32) -> i32 {
        //checking if the new fd is out of range
        if newfd < 0 || newfd >= self.fdtable.maxfd() {
            return syscall_error(Errno::EBADF, "dup2", "provided file descriptor is out of range");
        }
        let entry = match self.get_entry(oldfd, "dup2") {
            Ok(entry) => entry,
            Err(e) => return e,
        };
        //if the file descriptors are equal, return the new one
        if oldfd == newfd {
            return newfd;
        }
        self.install_dup(entry.duplicate(false), newfd, "dup2")
    }

    /// ## ------------------DUP3 SYSCALL------------------
    /// ### Description
    ///
    /// dup2 with an O_CLOEXEC option, and without the `oldfd == newfd`
    /// shortcut.
    ///
    /// ### Errors
    ///
    /// * EINVAL - flags other than O_CLOEXEC, or `oldfd == newfd`
    /// * EBADF - `oldfd` is not open or `newfd` is out of range
    ///
    /// [dup3(2)](https://man7.org/linux/man-pages/man2/dup3.2.html)
    pub fn dup3_syscall(&self, oldfd: i32, newfd: i32, flags: i32) -> i32 {
        if flags & !O_CLOEXEC != 0 {
            return syscall_error(Errno::EINVAL, "dup3", "only O_CLOEXEC may be passed");
        }
        if oldfd == newfd {
            return syscall_error(Errno::EINVAL, "dup3", "old and new descriptors are the same");
        }
        if newfd < 0 || newfd >= self.fdtable.maxfd() {
            return syscall_error(Errno::EBADF, "dup3", "provided file descriptor is out of range");
        }
        let entry = match self.get_entry(oldfd, "dup3") {
            Ok(entry) => entry,
            Err(e) => return e,
        };
        self.install_dup(entry.duplicate(flags & O_CLOEXEC != 0), newfd, "dup3")
    }

    /// ## ------------------FCNTL SYSCALL------------------
    /// ### Description
    ///
    /// Descriptor control. Supported commands:
    ///
    /// * F_DUPFD / F_DUPFD_CLOEXEC - dup to the lowest free number >= `arg`
    /// * F_GETFD / F_SETFD - the FD_CLOEXEC flag
    /// * F_GETFL / F_SETFL - access mode and status flags; only O_NONBLOCK and
    ///   O_APPEND can be changed, and changing them never reaches the substrate
    /// * F_GETRIGHTS - the rights bitmask this descriptor holds
    /// * F_SETRIGHTS - narrow the rights to `arg`. The substrate is asked to
    ///   restrict the handle too; a substrate without that primitive leaves
    ///   the narrowing recorded on the descriptor only.
    ///
    /// ### Errors
    ///
    /// * EBADF - `fd` is not open
    /// * EINVAL - unknown command, or a bad argument for the command
    /// * EPERM - F_SETRIGHTS asked for a right the descriptor does not hold
    /// * EMFILE - F_DUPFD found no free number
    ///
    /// [fcntl(2)](https://man7.org/linux/man-pages/man2/fcntl.2.html)
    pub fn fcntl_syscall(&self, fd: i32, cmd: i32, arg: i32) -> i32 {
        let entry = match self.get_entry(fd, "fcntl") {
            Ok(entry) => entry,
            Err(e) => return e,
        };

        //matching the tuple
        match (cmd, arg) {
            (F_DUPFD, arg) | (F_DUPFD_CLOEXEC, arg) => {
                if arg < 0 || arg >= self.fdtable.maxfd() {
                    return syscall_error(Errno::EINVAL, "fcntl", "starting descriptor out of range");
                }
                match self.fdtable.allocate(entry.duplicate(cmd == F_DUPFD_CLOEXEC), arg) {
                    Ok(newfd) => newfd,
                    Err(e) => syscall_error(e, "fcntl", "no available file descriptor number could be found"),
                }
            }
            //currently, O_CLOEXEC is the only defined file descriptor flag
            (F_GETFD, ..) => {
                if entry.flags() & O_CLOEXEC != 0 {
                    FD_CLOEXEC
                } else {
                    0
                }
            }
            (F_SETFD, arg) => {
                let changed = self.fdtable.with_entry_mut(fd, |entry| {
                    let flags = entry.flags_mut();
                    if arg & FD_CLOEXEC != 0 {
                        *flags |= O_CLOEXEC;
                    } else {
                        *flags &= !O_CLOEXEC;
                    }
                });
                match changed {
                    Ok(()) => 0,
                    Err(e) => syscall_error(e, "fcntl", "invalid file descriptor"),
                }
            }
            //F_GETFL returns access mode and status flags, close-on-exec belongs to F_GETFD
            (F_GETFL, ..) => entry.flags() & !O_CLOEXEC,
            (F_SETFL, arg) => {
                let changed = self.fdtable.with_entry_mut(fd, |entry| {
                    let flags = entry.flags_mut();
                    *flags = (*flags & !O_SETFLFLAGS) | (arg & O_SETFLFLAGS);
                });
                match changed {
                    Ok(()) => 0,
                    Err(e) => syscall_error(e, "fcntl", "invalid file descriptor"),
                }
            }
            (F_GETRIGHTS, ..) => entry.rights().bits() as i32,
            (F_SETRIGHTS, arg) => self.narrow_rights(fd, &entry, arg),
            _ => {
                let err_msg = format!("Arguments pair ({}, {}) does not match implemented parameters", cmd, arg);
                syscall_error(Errno::EINVAL, "fcntl", &err_msg)
            }
        }
    }

    fn narrow_rights(&self, fd: i32, entry: &FileDescriptor, arg: i32) -> i32 {
        let wanted = match Rights::from_bits(arg as u32) {
            Some(wanted) => wanted,
            None => return syscall_error(Errno::EINVAL, "fcntl", "unknown rights bits"),
        };
        if !entry.rights().contains(wanted) {
            return syscall_error(Errno::EPERM, "fcntl", "rights can only be narrowed");
        }
        match self.substrate().restrict_rights(entry.handle().handle(), wanted) {
            Ok(()) => {}
            Err(SubstrateError::NotSup) => {
                log::debug!("fcntl: substrate cannot restrict rights, recording on fd {} only", fd);
            }
            Err(e) => return substrate_error(e, "fcntl"),
        }
        match self.fdtable.with_entry_mut(fd, |entry| *entry.rights_mut() = wanted) {
            Ok(()) => 0,
            Err(e) => syscall_error(e, "fcntl", "descriptor was closed during the call"),
        }
    }

    /// ## ------------------PIPE SYSCALL------------------
    /// ### Description
    ///
    /// Creates a substrate pipe and binds its read end and write end to the
    /// two lowest free descriptors.
    ///
    /// [pipe(2)](https://man7.org/linux/man-pages/man2/pipe.2.html)
    pub fn pipe_syscall(&self, pipefd: &mut PipeArray) -> i32 {
        self.pipe2_syscall(pipefd, 0)
    }

    /// ## ------------------PIPE2 SYSCALL------------------
    /// ### Description
    ///
    /// pipe with O_NONBLOCK and O_CLOEXEC applied to both ends.
    ///
    /// ### Errors
    ///
    /// * EINVAL - any other flag
    /// * EMFILE - fewer than two free numbers
    /// * ENFILE - the substrate has no room for the handles
    ///
    /// [pipe2(2)](https://man7.org/linux/man-pages/man2/pipe2.2.html)
    pub fn pipe2_syscall(&self, pipefd: &mut PipeArray, flags: i32) -> i32 {
        let flagsmask = O_CLOEXEC | O_NONBLOCK;
        if flags & !flagsmask != 0 {
            return syscall_error(Errno::EINVAL, "pipe2", "invalid flags");
        }
        let actualflags = flags & flagsmask;

        let (readhandle, writehandle) = match self.substrate().pipe() {
            Ok(ends) => ends,
            Err(e) => return substrate_error(e, "pipe"),
        };
        let readend = Pipe(PipeDesc {
            handle: self.own(readhandle),
            flags: O_RDONLY | actualflags,
            rights: Rights::stream_read(),
        });
        let writeend = Pipe(PipeDesc {
            handle: self.own(writehandle),
            flags: O_WRONLY | actualflags,
            rights: Rights::stream_write(),
        });

        let readfd = match self.fdtable.allocate(readend, STARTINGFD) {
            Ok(fd) => fd,
            Err(e) => return syscall_error(e, "pipe", "no available file descriptor number could be found"),
        };
        let writefd = match self.fdtable.allocate(writeend, STARTINGFD) {
            Ok(fd) => fd,
            Err(e) => {
                if let Ok(entry) = self.fdtable.release(readfd) {
                    let _ = close_entry(entry);
                }
                return syscall_error(e, "pipe", "no available file descriptor number could be found");
            }
        };

        pipefd.readfd = readfd;
        pipefd.writefd = writefd;
        0 // success
    }

    /// ## ------------------EVENTFD SYSCALL------------------
    /// ### Description
    ///
    /// Creates an event counter starting at `initval`. Reads and writes move
    /// 8-byte native integers; with EFD_SEMAPHORE each read takes 1.
    ///
    /// ### Errors
    ///
    /// * EINVAL - flags other than EFD_SEMAPHORE, EFD_NONBLOCK, EFD_CLOEXEC
    /// * EMFILE / ENFILE - no room in the table or the substrate
    ///
    /// [eventfd(2)](https://man7.org/linux/man-pages/man2/eventfd.2.html)
    pub fn eventfd_syscall(&self, initval: u32, flags: i32) -> i32 {
        if flags & !(EFD_SEMAPHORE | EFD_NONBLOCK | EFD_CLOEXEC) != 0 {
            return syscall_error(Errno::EINVAL, "eventfd", "invalid flags");
        }
        let handle = match self.substrate().event_create(initval as u64, flags & EFD_SEMAPHORE != 0) {
            Ok(handle) => handle,
            Err(e) => return substrate_error(e, "eventfd"),
        };
        let entry = FileDescriptor::Event(EventDesc {
            handle: self.own(handle),
            flags: O_RDWR | (flags & (O_NONBLOCK | O_CLOEXEC)),
            rights: Rights::stream_read() | Rights::stream_write(),
        });
        match self.fdtable.allocate(entry, STARTINGFD) {
            Ok(fd) => fd,
            Err(e) => syscall_error(e, "eventfd", "no available file descriptor number could be found"),
        }
    }

    /// ## ------------------MKDIR SYSCALL------------------
    ///
    /// Creates a directory under the root preopen. `_mode` is ignored.
    ///
    /// [mkdir(2)](https://man7.org/linux/man-pages/man2/mkdir.2.html)
    pub fn mkdir_syscall(&self, path: &str, _mode: u32) -> i32 {
        if path.is_empty() {
            return syscall_error(Errno::ENOENT, "mkdir", "given path was null");
        }
        let root = match self.root_handle() {
            Some(root) => root,
            None => return syscall_error(Errno::EACCES, "mkdir", "no preopened directory"),
        };
        match self.substrate().create_directory_at(root, relative_to_root(path)) {
            Ok(()) => 0,
            Err(e) => substrate_error(e, "mkdir"),
        }
    }

    /// ## ------------------SYMLINK SYSCALL------------------
    ///
    /// Creates `linkpath` pointing at `target`. The target is stored as is and
    /// only resolved when the link is followed.
    ///
    /// [symlink(2)](https://man7.org/linux/man-pages/man2/symlink.2.html)
    pub fn symlink_syscall(&self, target: &str, linkpath: &str) -> i32 {
        if target.is_empty() || linkpath.is_empty() {
            return syscall_error(Errno::ENOENT, "symlink", "given path was null");
        }
        let root = match self.root_handle() {
            Some(root) => root,
            None => return syscall_error(Errno::EACCES, "symlink", "no preopened directory"),
        };
        match self.substrate().create_symlink_at(root, target, relative_to_root(linkpath)) {
            Ok(()) => 0,
            Err(e) => substrate_error(e, "symlink"),
        }
    }

    /// Opens a directory stream, open(path, O_RDONLY | O_DIRECTORY)
    pub fn opendir_syscall(&self, path: &str) -> i32 {
        self.open_syscall(path, O_RDONLY | O_DIRECTORY, 0)
    }

    /// ## ------------------READDIR SYSCALL------------------
    /// ### Description
    ///
    /// Fills `out` with the next entry of the directory stream and advances
    /// the shared cursor. `.` and `..` are not reported. `lseek(fd, 0,
    /// SEEK_SET)` rewinds.
    ///
    /// ### Returns
    ///
    /// 1 when an entry was read, 0 at the end of the directory.
    ///
    /// ### Errors
    ///
    /// * EBADF - `fd` is not open
    /// * ENOTDIR - `fd` is not a directory
    /// * EACCES - the descriptor lacks the readdir right
    pub fn readdir_syscall(&self, fd: i32, out: &mut ReaddirEntry) -> i32 {
        let entry = match self.get_entry(fd, "readdir") {
            Ok(entry) => entry,
            Err(e) => return e,
        };
        let dirdesc = match &entry {
            Dir(dirdesc) => dirdesc,
            _ => return syscall_error(Errno::ENOTDIR, "readdir", "file descriptor does not refer to a directory"),
        };
        if let Err(e) = entry.require(Rights::FD_READDIR) {
            return syscall_error(e, "readdir", "descriptor lacks the readdir right");
        }

        let mut cursor = dirdesc.cursor.lock();
        match self.substrate().readdir(dirdesc.handle.handle(), *cursor) {
            Ok(Some((dirent, next))) => {
                out.d_ino = dirent.ino;
                out.d_off = next;
                out.d_type = d_type_of(dirent.kind);
                out.d_name = dirent.name;
                *cursor = next;
                1
            }
            Ok(None) => 0,
            Err(e) => substrate_error(e, "readdir"),
        }
    }

    /// Closes a directory stream opened with opendir
    pub fn closedir_syscall(&self, fd: i32) -> i32 {
        match self.get_entry(fd, "closedir") {
            Ok(Dir(_)) => self.close_syscall(fd),
            Ok(_) => syscall_error(Errno::ENOTDIR, "closedir", "file descriptor does not refer to a directory"),
            Err(e) => e,
        }
    }

    /// ## ------------------READ SYSCALL------------------
    /// ### Description
    ///
    /// Reads up to `buf.len()` bytes. Regular files read at the shared
    /// offset and advance it; sockets behave as recv with no flags; pipes,
    /// event counters and other streams read from the stream.
    ///
    /// A non-blocking descriptor first asks the substrate, without waiting,
    /// whether the read would suspend, and fails with EAGAIN if so. Blocking
    /// descriptors go straight to the substrate and never see EAGAIN.
    ///
    /// ### Returns
    ///
    /// Bytes read, 0 at end of file or when `buf` is empty.
    ///
    /// ### Errors
    ///
    /// * EBADF - `fd` is not open
    /// * EISDIR - `fd` is a directory
    /// * EACCES - the descriptor was not opened for reading
    /// * EAGAIN - non-blocking and nothing to read
    ///
    /// [read(2)](https://man7.org/linux/man-pages/man2/read.2.html)
    pub fn read_syscall(&self, fd: i32, buf: &mut [u8]) -> i32 {
        let entry = match self.get_entry(fd, "read") {
            Ok(entry) => entry,
            Err(e) => return e,
        };
        let len = clamp_len(buf.len());
        let buf = &mut buf[..len];

        match &entry {
            Dir(_) => syscall_error(Errno::EISDIR, "read", "attempted to read from a directory"),
            Socket(_) => match self.recv_entry(&entry, buf, 0, "read") {
                Ok((count, _)) => count as i32,
                Err(e) => e,
            },
            _ => {
                if let Err(e) = entry.require(Rights::FD_READ) {
                    return syscall_error(e, "read", "descriptor was not opened for reading");
                }
                if buf.is_empty() {
                    return 0;
                }
                match &entry {
                    File(filedesc) => {
                        let mut position = filedesc.position.lock();
                        match self.substrate().read_at(filedesc.handle.handle(), buf, *position) {
                            Ok(count) => {
                                *position += count as u64;
                                count as i32
                            }
                            Err(e) => substrate_error(e, "read"),
                        }
                    }
                    _ => self.stream_read(&entry, buf, "read"),
                }
            }
        }
    }

    /// ## ------------------WRITE SYSCALL------------------
    /// ### Description
    ///
    /// Writes `buf`. Regular files write at the shared offset, or at the end
    /// of file when the descriptor has O_APPEND; sockets behave as send with
    /// no flags; other kinds write to the stream. A non-blocking pipe write
    /// only writes what fits right now.
    ///
    /// ### Errors
    ///
    /// * EBADF - `fd` is not open
    /// * EISDIR - `fd` is a directory
    /// * EACCES - the descriptor was not opened for writing; nothing is written
    /// * EAGAIN - non-blocking and no room
    /// * EPIPE - no reader is left on a pipe
    ///
    /// [write(2)](https://man7.org/linux/man-pages/man2/write.2.html)
    pub fn write_syscall(&self, fd: i32, buf: &[u8]) -> i32 {
        let entry = match self.get_entry(fd, "write") {
            Ok(entry) => entry,
            Err(e) => return e,
        };
        let buf = &buf[..clamp_len(buf.len())];

        match &entry {
            Dir(_) => syscall_error(Errno::EISDIR, "write", "attempted to write to a directory"),
            Socket(_) => self.send_entry(&entry, buf, 0, None, "write"),
            _ => {
                if let Err(e) = entry.require(Rights::FD_WRITE) {
                    return syscall_error(e, "write", "descriptor was not opened for writing");
                }
                if buf.is_empty() {
                    return 0;
                }
                match &entry {
                    File(filedesc) => {
                        let handle = filedesc.handle.handle();
                        let mut position = filedesc.position.lock();
                        if entry.flags() & O_APPEND != 0 {
                            match self.substrate().append(handle, buf) {
                                Ok((count, end)) => {
                                    *position = end;
                                    count as i32
                                }
                                Err(e) => substrate_error(e, "write"),
                            }
                        } else {
                            match self.substrate().write_at(handle, buf, *position) {
                                Ok(count) => {
                                    *position += count as u64;
                                    count as i32
                                }
                                Err(e) => substrate_error(e, "write"),
                            }
                        }
                    }
                    _ => self.stream_write(&entry, buf, "write"),
                }
            }
        }
    }

    /// ## ------------------PREAD SYSCALL------------------
    ///
    /// Reads at `offset` without moving the shared offset. Regular files only.
    ///
    /// ### Errors
    ///
    /// * ESPIPE - `fd` is not a regular file
    /// * EINVAL - `offset` is negative
    ///
    /// [pread(2)](https://man7.org/linux/man-pages/man2/pread.2.html)
    pub fn pread_syscall(&self, fd: i32, buf: &mut [u8], offset: i64) -> i32 {
        let entry = match self.get_entry(fd, "pread") {
            Ok(entry) => entry,
            Err(e) => return e,
        };
        let filedesc = match &entry {
            File(filedesc) => filedesc,
            _ => return syscall_error(Errno::ESPIPE, "pread", "file descriptor is not seekable"),
        };
        if offset < 0 {
            return syscall_error(Errno::EINVAL, "pread", "negative offset");
        }
        if let Err(e) = entry.require(Rights::FD_READ) {
            return syscall_error(e, "pread", "descriptor was not opened for reading");
        }
        let len = clamp_len(buf.len());
        if len == 0 {
            return 0;
        }
        match self.substrate().read_at(filedesc.handle.handle(), &mut buf[..len], offset as u64) {
            Ok(count) => count as i32,
            Err(e) => substrate_error(e, "pread"),
        }
    }

    /// ## ------------------PWRITE SYSCALL------------------
    ///
    /// Writes at `offset` without moving the shared offset. Regular files only.
    ///
    /// [pwrite(2)](https://man7.org/linux/man-pages/man2/pwrite.2.html)
    pub fn pwrite_syscall(&self, fd: i32, buf: &[u8], offset: i64) -> i32 {
        let entry = match self.get_entry(fd, "pwrite") {
            Ok(entry) => entry,
            Err(e) => return e,
        };
        let filedesc = match &entry {
            File(filedesc) => filedesc,
            _ => return syscall_error(Errno::ESPIPE, "pwrite", "file descriptor is not seekable"),
        };
        if offset < 0 {
            return syscall_error(Errno::EINVAL, "pwrite", "negative offset");
        }
        if let Err(e) = entry.require(Rights::FD_WRITE) {
            return syscall_error(e, "pwrite", "descriptor was not opened for writing");
        }
        let len = clamp_len(buf.len());
        if len == 0 {
            return 0;
        }
        match self.substrate().write_at(filedesc.handle.handle(), &buf[..len], offset as u64) {
            Ok(count) => count as i32,
            Err(e) => substrate_error(e, "pwrite"),
        }
    }

    /// ## ------------------READV SYSCALL------------------
    ///
    /// One read spread over `iovs` in order.
    ///
    /// [readv(2)](https://man7.org/linux/man-pages/man2/readv.2.html)
    pub fn readv_syscall(&self, fd: i32, iovs: &mut [&mut [u8]]) -> i32 {
        let total: usize = iovs.iter().map(|iov| iov.len()).sum();
        let mut gathered = vec![0u8; clamp_len(total)];
        let count = self.read_syscall(fd, &mut gathered);
        if count <= 0 {
            return count;
        }

        let mut remaining = &gathered[..count as usize];
        for iov in iovs.iter_mut() {
            if remaining.is_empty() {
                break;
            }
            let take = iov.len().min(remaining.len());
            iov[..take].copy_from_slice(&remaining[..take]);
            remaining = &remaining[take..];
        }
        count
    }

    /// ## ------------------WRITEV SYSCALL------------------
    ///
    /// One write of `iovs` concatenated, so a pipe reader never sees the
    /// pieces interleaved with another writer's.
    ///
    /// [writev(2)](https://man7.org/linux/man-pages/man2/writev.2.html)
    pub fn writev_syscall(&self, fd: i32, iovs: &[&[u8]]) -> i32 {
        let gathered: Vec<u8> = iovs.concat();
        self.write_syscall(fd, &gathered)
    }

    /// ## ------------------LSEEK SYSCALL------------------
    /// ### Description
    ///
    /// Moves the shared offset of a regular file. On a directory only a
    /// rewind to 0 is accepted, which restarts readdir.
    ///
    /// ### Returns
    ///
    /// The new offset.
    ///
    /// ### Errors
    ///
    /// * ESPIPE - pipes, sockets, event counters and streams
    /// * EINVAL - bad `whence`, or the result would be negative
    ///
    /// [lseek(2)](https://man7.org/linux/man-pages/man2/lseek.2.html)
    pub fn lseek_syscall(&self, fd: i32, offset: i64, whence: i32) -> i64 {
        let entry = match self.get_entry(fd, "lseek") {
            Ok(entry) => entry,
            Err(e) => return e as i64,
        };

        match &entry {
            File(filedesc) => {
                if let Err(e) = entry.require(Rights::FD_SEEK) {
                    return syscall_error(e, "lseek", "descriptor lacks the seek right") as i64;
                }
                let mut position = filedesc.position.lock();
                let base = match whence {
                    SEEK_SET => 0,
                    SEEK_CUR => *position as i64,
                    SEEK_END => match self.substrate().stat(filedesc.handle.handle()) {
                        Ok(stat) => stat.size as i64,
                        Err(e) => return substrate_error(e, "lseek") as i64,
                    },
                    _ => return syscall_error(Errno::EINVAL, "lseek", "unknown whence") as i64,
                };
                match base.checked_add(offset) {
                    Some(newpos) if newpos >= 0 => {
                        *position = newpos as u64;
                        newpos
                    }
                    _ => syscall_error(Errno::EINVAL, "lseek", "seek to a negative offset") as i64,
                }
            }
            Dir(dirdesc) => {
                if whence == SEEK_SET && offset == 0 {
                    *dirdesc.cursor.lock() = 0;
                    0
                } else {
                    syscall_error(Errno::EINVAL, "lseek", "directories can only be rewound") as i64
                }
            }
            _ => syscall_error(Errno::ESPIPE, "lseek", "file descriptor is associated with a pipe, socket, or stream") as i64,
        }
    }

    /// ## ------------------FTRUNCATE SYSCALL------------------
    ///
    /// Sets a regular file's size, zero filling when it grows.
    ///
    /// ### Errors
    ///
    /// * EISDIR - `fd` is a directory
    /// * EINVAL - negative length, or `fd` is not a regular file
    /// * EACCES - the descriptor lacks the set-size right
    ///
    /// [ftruncate(2)](https://man7.org/linux/man-pages/man2/ftruncate.2.html)
    pub fn ftruncate_syscall(&self, fd: i32, length: i64) -> i32 {
        let entry = match self.get_entry(fd, "ftruncate") {
            Ok(entry) => entry,
            Err(e) => return e,
        };
        match &entry {
            File(filedesc) => {
                if length < 0 {
                    return syscall_error(Errno::EINVAL, "ftruncate", "negative length");
                }
                if let Err(e) = entry.require(Rights::FD_SET_SIZE) {
                    return syscall_error(e, "ftruncate", "descriptor lacks the set-size right");
                }
                match self.substrate().set_size(filedesc.handle.handle(), length as u64) {
                    Ok(()) => 0,
                    Err(e) => substrate_error(e, "ftruncate"),
                }
            }
            Dir(_) => syscall_error(Errno::EISDIR, "ftruncate", "cannot truncate a directory"),
            _ => syscall_error(Errno::EINVAL, "ftruncate", "file descriptor is not a regular file"),
        }
    }

    /// ## ------------------FSTAT SYSCALL------------------
    ///
    /// Fills `statbuf` from the substrate's stat of the handle. Type bits come
    /// from the handle kind; there are no owners or timestamps to report.
    ///
    /// [fstat(2)](https://man7.org/linux/man-pages/man2/fstat.2.html)
    pub fn fstat_syscall(&self, fd: i32, statbuf: &mut StatData) -> i32 {
        let entry = match self.get_entry(fd, "fstat") {
            Ok(entry) => entry,
            Err(e) => return e,
        };
        if let Err(e) = entry.require(Rights::FD_STAT) {
            return syscall_error(e, "fstat", "descriptor lacks the stat right");
        }
        let stat = match self.substrate().stat(entry.handle().handle()) {
            Ok(stat) => stat,
            Err(e) => return substrate_error(e, "fstat"),
        };

        *statbuf = StatData::default();
        statbuf.st_ino = stat.ino as usize;
        statbuf.st_mode = mode_of(stat.kind);
        statbuf.st_nlink = stat.nlink as u32;
        statbuf.st_size = stat.size as usize;
        statbuf.st_blksize = BLOCK_SIZE;
        statbuf.st_blocks = ((stat.size + 511) / 512) as usize;
        0
    }

    /// ## ------------------IOCTL SYSCALL------------------
    /// ### Description
    ///
    /// * FIONBIO - `*arg` non-zero sets O_NONBLOCK, zero clears it
    /// * FIONREAD - stores in `*arg` the bytes readable without blocking
    /// * FIOCLEX / FIONCLEX - set or clear close-on-exec
    ///
    /// ### Errors
    ///
    /// * EBADF - `fd` is not open
    /// * EFAULT - FIONBIO or FIONREAD without an argument
    /// * ENOTTY - any other request
    ///
    /// [ioctl(2)](https://man7.org/linux/man-pages/man2/ioctl.2.html)
    pub fn ioctl_syscall(&self, fd: i32, request: u32, arg: Option<&mut i32>) -> i32 {
        let entry = match self.get_entry(fd, "ioctl") {
            Ok(entry) => entry,
            Err(e) => return e,
        };

        let setflag = |set: bool, bit: i32| -> i32 {
            let changed = self.fdtable.with_entry_mut(fd, |entry| {
                let flags = entry.flags_mut();
                if set {
                    *flags |= bit;
                } else {
                    *flags &= !bit;
                }
            });
            match changed {
                Ok(()) => 0,
                Err(e) => syscall_error(e, "ioctl", "invalid file descriptor"),
            }
        };

        match request {
            FIONBIO => match arg {
                Some(arg) => setflag(*arg != 0, O_NONBLOCK),
                None => syscall_error(Errno::EFAULT, "ioctl", "FIONBIO needs an argument"),
            },
            FIOCLEX => setflag(true, O_CLOEXEC),
            FIONCLEX => setflag(false, O_CLOEXEC),
            FIONREAD => {
                let arg = match arg {
                    Some(arg) => arg,
                    None => return syscall_error(Errno::EFAULT, "ioctl", "FIONREAD needs an argument"),
                };
                let readable = match &entry {
                    File(filedesc) => match self.substrate().stat(filedesc.handle.handle()) {
                        Ok(stat) => stat.size.saturating_sub(*filedesc.position.lock()),
                        Err(e) => return substrate_error(e, "ioctl"),
                    },
                    Dir(_) => return syscall_error(Errno::ENOTTY, "ioctl", "FIONREAD on a directory"),
                    _ => match self.ready_now(&entry, Interest::Read, "ioctl") {
                        Ok(ready) => ready.unwrap_or(0),
                        Err(e) => return e,
                    },
                };
                *arg = readable.min(i32::MAX as u64) as i32;
                0
            }
            _ => syscall_error(Errno::ENOTTY, "ioctl", "unsupported ioctl request"),
        }
    }

    /// ## ------------------GETDENTS SYSCALL------------------
    /// ### Description
    ///
    /// Packs as many directory records as fit into `dirp`, starting at the
    /// directory cursor. Each record is laid out as `d_ino: u64`, `d_off:
    /// u64`, `d_reclen: u16`, `d_type: u8`, the NUL-terminated name, padded
    /// to a multiple of 8 bytes.
    ///
    /// ### Returns
    ///
    /// Bytes written, 0 at the end of the directory.
    ///
    /// ### Errors
    ///
    /// * ENOTDIR - `fd` is not a directory
    /// * EINVAL - the buffer cannot hold the next record
    ///
    /// [getdents(2)](https://man7.org/linux/man-pages/man2/getdents.2.html)
    pub fn getdents_syscall(&self, fd: i32, dirp: &mut [u8]) -> i32 {
        let entry = match self.get_entry(fd, "getdents") {
            Ok(entry) => entry,
            Err(e) => return e,
        };
        let dirdesc = match &entry {
            Dir(dirdesc) => dirdesc,
            _ => return syscall_error(Errno::ENOTDIR, "getdents", "file descriptor does not refer to a directory"),
        };
        if let Err(e) = entry.require(Rights::FD_READDIR) {
            return syscall_error(e, "getdents", "descriptor lacks the readdir right");
        }

        let bufsize = clamp_len(dirp.len());
        let mut cursor = dirdesc.cursor.lock();
        let mut bufcount = 0;
        loop {
            let (dirent, next) = match self.substrate().readdir(dirdesc.handle.handle(), *cursor) {
                Ok(Some(found)) => found,
                Ok(None) => break,
                Err(e) => return substrate_error(e, "getdents"),
            };

            let name = dirent.name.as_bytes();
            // pad to the next highest 8 byte boundary
            let reclen = (DIRENT_HEADER_SIZE + name.len() + 1 + 7) / 8 * 8;
            if bufcount + reclen > bufsize {
                if bufcount == 0 {
                    return syscall_error(Errno::EINVAL, "getdents", "Result buffer is too small.");
                }
                break;
            }

            let record = &mut dirp[bufcount..bufcount + reclen];
            record.fill(0);
            record[0..8].copy_from_slice(&dirent.ino.to_ne_bytes());
            record[8..16].copy_from_slice(&next.to_ne_bytes());
            record[16..18].copy_from_slice(&(reclen as u16).to_ne_bytes());
            record[18] = d_type_of(dirent.kind);
            record[DIRENT_HEADER_SIZE..DIRENT_HEADER_SIZE + name.len()].copy_from_slice(name);

            bufcount += reclen;
            *cursor = next;
        }
        bufcount as i32
    }
}
