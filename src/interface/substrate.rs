//! The capability-handle substrate boundary
//!
//! ## Substrate Module
//!
//! The runtime underneath the descriptor layer hands out handles: opaque,
//! strongly typed, never reused references to open resources, each carrying
//! the set of rights it was granted. This module names the primitives the
//! translation core is allowed to call on such a runtime. Nothing in
//! `safeposix` touches a resource except through [`Substrate`].
//!
//! Every primitive returns a [`SubstrateResult`]; the core translates the
//! [`SubstrateError`] tag into an errno at the call boundary.

use bitflags::bitflags;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Opaque reference to a substrate resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Handle(pub u32);

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "handle#{}", self.0)
    }
}

/// What the substrate says a handle refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandleKind {
    RegularFile,
    Directory,
    SymbolicLink,
    SocketStream,
    SocketDatagram,
    Pipe,
    Event,
    CharacterDevice,
    Unknown,
}

/// Typed failures reported by the substrate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum SubstrateError {
    #[error("access denied")]
    Access,
    #[error("handle lacks the rights for this operation")]
    NotCapable,
    #[error("operation not permitted")]
    Perm,
    #[error("address in use")]
    AddrInUse,
    #[error("address not available")]
    AddrNotAvail,
    #[error("address family not supported")]
    AfNoSupport,
    #[error("resource unavailable, try again")]
    Again,
    #[error("operation already in progress")]
    Already,
    #[error("unknown handle")]
    BadHandle,
    #[error("resource busy")]
    Busy,
    #[error("operation canceled")]
    Canceled,
    #[error("connection aborted")]
    ConnAborted,
    #[error("connection refused")]
    ConnRefused,
    #[error("connection reset")]
    ConnReset,
    #[error("destination address required")]
    DestAddrReq,
    #[error("already exists")]
    Exist,
    #[error("file too large")]
    FileTooBig,
    #[error("host unreachable")]
    HostUnreach,
    #[error("operation in progress")]
    InProgress,
    #[error("interrupted")]
    Interrupted,
    #[error("invalid argument")]
    Invalid,
    #[error("i/o error")]
    Io,
    #[error("already connected")]
    IsConn,
    #[error("is a directory")]
    IsDir,
    #[error("too many levels of symbolic links")]
    Loop,
    #[error("message too large")]
    MsgSize,
    #[error("name too long")]
    NameTooLong,
    #[error("network down")]
    NetDown,
    #[error("network unreachable")]
    NetUnreach,
    #[error("no buffer space available")]
    NoBufs,
    #[error("no such file or directory")]
    NoEnt,
    #[error("out of memory")]
    NoMem,
    #[error("no space left")]
    NoSpace,
    #[error("not connected")]
    NotConn,
    #[error("not a directory")]
    NotDir,
    #[error("directory not empty")]
    NotEmpty,
    #[error("not a socket")]
    NotSock,
    #[error("not supported")]
    NotSup,
    #[error("broken pipe")]
    Pipe,
    #[error("read-only filesystem")]
    ReadOnlyFs,
    #[error("invalid seek")]
    SeekPipe,
    #[error("handle table full")]
    TableFull,
    #[error("timed out")]
    TimedOut,
    #[error("unrecognized substrate error code {0}")]
    Other(u16),
}

pub type SubstrateResult<T> = Result<T, SubstrateError>;

bitflags! {
    /// Operations a handle is authorized to perform
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Rights: u32 {
        const FD_READ = 1 << 0;
        const FD_WRITE = 1 << 1;
        const FD_SEEK = 1 << 2;
        const FD_SET_FLAGS = 1 << 3;
        const FD_SET_SIZE = 1 << 4;
        const FD_READDIR = 1 << 5;
        const FD_STAT = 1 << 6;
        const PATH_OPEN = 1 << 7;
        const PATH_CREATE = 1 << 8;
        const POLL = 1 << 9;
        const SOCK_ACCEPT = 1 << 10;
        const SOCK_SHUTDOWN = 1 << 11;
    }
}

impl Rights {
    pub fn file_read() -> Rights {
        Rights::FD_READ | Rights::FD_SEEK | Rights::FD_STAT | Rights::FD_SET_FLAGS | Rights::POLL
    }

    pub fn file_write() -> Rights {
        Rights::FD_WRITE
            | Rights::FD_SEEK
            | Rights::FD_STAT
            | Rights::FD_SET_FLAGS
            | Rights::FD_SET_SIZE
            | Rights::POLL
    }

    pub fn directory() -> Rights {
        Rights::FD_READDIR
            | Rights::FD_SEEK
            | Rights::FD_STAT
            | Rights::FD_SET_FLAGS
            | Rights::PATH_OPEN
            | Rights::PATH_CREATE
    }

    pub fn socket() -> Rights {
        Rights::FD_READ
            | Rights::FD_WRITE
            | Rights::FD_STAT
            | Rights::FD_SET_FLAGS
            | Rights::POLL
            | Rights::SOCK_ACCEPT
            | Rights::SOCK_SHUTDOWN
    }

    pub fn stream_read() -> Rights {
        Rights::FD_READ | Rights::FD_STAT | Rights::FD_SET_FLAGS | Rights::POLL
    }

    pub fn stream_write() -> Rights {
        Rights::FD_WRITE | Rights::FD_STAT | Rights::FD_SET_FLAGS | Rights::POLL
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct LookupFlags: u32 {
        const SYMLINK_FOLLOW = 1 << 0;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct OpenFlags: u32 {
        const CREATE = 1 << 0;
        const DIRECTORY = 1 << 1;
        const EXCLUSIVE = 1 << 2;
        const TRUNCATE = 1 << 3;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandleStat {
    pub kind: HandleKind,
    pub ino: u64,
    pub size: u64,
    pub nlink: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    pub kind: HandleKind,
    pub ino: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressFamily {
    Inet,
    Inet6,
    Unix,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SocketType {
    Stream,
    Datagram,
}

/// A socket address as the substrate understands it, ports in host order
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Endpoint {
    V4 {
        addr: [u8; 4],
        port: u16,
    },
    V6 {
        addr: [u8; 16],
        port: u16,
        flowinfo: u32,
        scope_id: u32,
    },
    Unix {
        path: String,
    },
}

impl Endpoint {
    pub fn unspecified(family: AddressFamily) -> Endpoint {
        match family {
            AddressFamily::Inet => Endpoint::V4 {
                addr: [0; 4],
                port: 0,
            },
            AddressFamily::Inet6 => Endpoint::V6 {
                addr: [0; 16],
                port: 0,
                flowinfo: 0,
                scope_id: 0,
            },
            AddressFamily::Unix => Endpoint::Unix {
                path: String::new(),
            },
        }
    }

    pub fn family(&self) -> AddressFamily {
        match self {
            Endpoint::V4 { .. } => AddressFamily::Inet,
            Endpoint::V6 { .. } => AddressFamily::Inet6,
            Endpoint::Unix { .. } => AddressFamily::Unix,
        }
    }

    pub fn port(&self) -> u16 {
        match self {
            Endpoint::V4 { port, .. } | Endpoint::V6 { port, .. } => *port,
            Endpoint::Unix { .. } => 0,
        }
    }

    pub fn set_port(&mut self, newport: u16) {
        match self {
            Endpoint::V4 { port, .. } | Endpoint::V6 { port, .. } => *port = newport,
            Endpoint::Unix { .. } => {}
        }
    }

    pub fn is_unspecified(&self) -> bool {
        match self {
            Endpoint::V4 { addr, .. } => *addr == [0; 4],
            Endpoint::V6 { addr, .. } => *addr == [0; 16],
            Endpoint::Unix { path } => path.is_empty(),
        }
    }

    pub fn is_loopback(&self) -> bool {
        match self {
            Endpoint::V4 { addr, .. } => addr[0] == 127,
            Endpoint::V6 { addr, .. } => {
                let mut lo = [0u8; 16];
                lo[15] = 1;
                *addr == lo
            }
            Endpoint::Unix { .. } => false,
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::V4 { addr, port } => {
                write!(f, "{}:{}", std::net::Ipv4Addr::from(*addr), port)
            }
            Endpoint::V6 { addr, port, .. } => {
                write!(f, "[{}]:{}", std::net::Ipv6Addr::from(*addr), port)
            }
            Endpoint::Unix { path } => write!(f, "unix:{}", path),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shutdown {
    Read,
    Write,
    Both,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SocketOption {
    ReuseAddr,
    KeepAlive,
    Broadcast,
    NoDelay,
    SendBufferSize,
    RecvBufferSize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Interest {
    Read,
    Write,
}

/// One readiness interest registered with `poll_oneoff`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Subscription {
    pub userdata: u64,
    pub handle: Handle,
    pub interest: Interest,
}

/// A subscription that fired
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Event {
    pub userdata: u64,
    pub interest: Interest,
    pub error: Option<SubstrateError>,
    /// bytes available to read, or free space to write, when known
    pub nbytes: u64,
    pub hangup: bool,
}

/// A directory handle granted to the process at startup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Preopen {
    pub handle: Handle,
    pub path: String,
}

/// The primitives of a capability-handle runtime
///
/// Blocking primitives (`read_stream`, `write_stream`, `socket_accept`,
/// `socket_send`, `socket_recv`) suspend the calling thread until they can
/// make progress. `read_stream` and `write_stream` take a `nonblocking` flag
/// and return `Again` instead of suspending on pipes and event counters.
/// Otherwise the only way to learn whether a call would suspend is
/// `poll_oneoff`, and only for kinds where `has_readiness` is true.
pub trait Substrate: Send + Sync {
    /// Directories the process may resolve paths under
    fn preopens(&self) -> Vec<Preopen>;

    /// Handles for stdin, stdout and stderr, if the runtime provides them
    fn stdio(&self) -> Option<[Handle; 3]> {
        None
    }

    fn open_at(
        &self,
        dir: Handle,
        path: &str,
        lookup: LookupFlags,
        oflags: OpenFlags,
        rights: Rights,
    ) -> SubstrateResult<Handle>;

    fn create_directory_at(&self, dir: Handle, path: &str) -> SubstrateResult<()>;

    fn create_symlink_at(&self, _dir: Handle, _target: &str, _path: &str) -> SubstrateResult<()> {
        Err(SubstrateError::NotSup)
    }

    /// Releases a handle. A handle is never valid again after this returns.
    fn close(&self, handle: Handle) -> SubstrateResult<()>;

    fn stat(&self, handle: Handle) -> SubstrateResult<HandleStat>;

    fn read_at(&self, handle: Handle, buf: &mut [u8], offset: u64) -> SubstrateResult<usize>;

    fn write_at(&self, handle: Handle, buf: &[u8], offset: u64) -> SubstrateResult<usize>;

    /// Writes at the current end of file, returning bytes written and the new end
    fn append(&self, handle: Handle, buf: &[u8]) -> SubstrateResult<(usize, u64)>;

    fn set_size(&self, handle: Handle, size: u64) -> SubstrateResult<()>;

    /// Returns the entry at `cookie` and the cookie of the entry after it
    fn readdir(&self, handle: Handle, cookie: u64) -> SubstrateResult<Option<(DirEntry, u64)>>;

    fn read_stream(&self, handle: Handle, buf: &mut [u8], nonblocking: bool) -> SubstrateResult<usize>;

    fn write_stream(&self, handle: Handle, buf: &[u8], nonblocking: bool) -> SubstrateResult<usize>;

    /// Creates a pipe, returning (read end, write end)
    fn pipe(&self) -> SubstrateResult<(Handle, Handle)>;

    fn event_create(&self, initval: u64, semaphore: bool) -> SubstrateResult<Handle>;

    fn socket_create(&self, family: AddressFamily, socktype: SocketType) -> SubstrateResult<Handle>;

    fn socket_bind(&self, handle: Handle, local: &Endpoint) -> SubstrateResult<()>;

    fn socket_connect(&self, handle: Handle, remote: &Endpoint) -> SubstrateResult<()>;

    fn socket_listen(&self, handle: Handle, backlog: u32) -> SubstrateResult<()>;

    fn socket_accept(&self, handle: Handle) -> SubstrateResult<(Handle, Endpoint)>;

    fn socket_send(&self, handle: Handle, buf: &[u8], dest: Option<&Endpoint>) -> SubstrateResult<usize>;

    fn socket_recv(
        &self,
        handle: Handle,
        buf: &mut [u8],
        peek: bool,
    ) -> SubstrateResult<(usize, Option<Endpoint>)>;

    fn socket_shutdown(&self, handle: Handle, how: Shutdown) -> SubstrateResult<()>;

    fn socket_local_addr(&self, handle: Handle) -> SubstrateResult<Endpoint>;

    fn socket_peer_addr(&self, handle: Handle) -> SubstrateResult<Endpoint>;

    fn socket_set_option(&self, _handle: Handle, _option: SocketOption, _value: u64) -> SubstrateResult<()> {
        Err(SubstrateError::NotSup)
    }

    /// Drops rights from a handle; rights can never be added back
    fn restrict_rights(&self, _handle: Handle, _rights: Rights) -> SubstrateResult<()> {
        Err(SubstrateError::NotSup)
    }

    /// Whether `poll_oneoff` reports meaningful readiness for this kind
    fn has_readiness(&self, kind: HandleKind) -> bool;

    /// Waits until at least one subscription is ready or the timeout passes.
    /// A timeout of zero checks once without waiting; `None` waits forever.
    /// With no subscriptions this only sleeps. Returns the subscriptions that
    /// fired, empty on timeout, or `Interrupted` if the wait was cut short.
    fn poll_oneoff(
        &self,
        subscriptions: &[Subscription],
        timeout: Option<Duration>,
    ) -> SubstrateResult<Vec<Event>>;
}
