//! POSIX error numbers and their translation from substrate failures
//!
//! Every failure that leaves the translation layer is exactly one value of
//! [`Errno`]. Failures reported by the substrate arrive as a
//! [`SubstrateError`] and are normalized with `Errno::from`, a static and
//! total mapping: tags with no POSIX counterpart collapse to `EIO`.

use crate::interface::substrate::SubstrateError;
use std::cell::Cell;

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
#[repr(i32)]
pub enum Errno {
    EPERM = 1,            // Operation not permitted
    ENOENT = 2,           // No such file or directory
    ESRCH = 3,            // No such process
    EINTR = 4,            // Interrupted system call
    EIO = 5,              // I/O error
    ENXIO = 6,            // No such device or address
    E2BIG = 7,            // Argument list too long
    ENOEXEC = 8,          // Exec format error
    EBADF = 9,            // Bad file number
    ECHILD = 10,          // No child processes
    EAGAIN = 11,          // Try again
    ENOMEM = 12,          // Out of memory
    EACCES = 13,          // Permission denied
    EFAULT = 14,          // Bad address
    ENOTBLK = 15,         // Block device required
    EBUSY = 16,           // Device or resource busy
    EEXIST = 17,          // File exists
    EXDEV = 18,           // Cross-device link
    ENODEV = 19,          // No such device
    ENOTDIR = 20,         // Not a directory
    EISDIR = 21,          // Is a directory
    EINVAL = 22,          // Invalid argument
    ENFILE = 23,          // File table overflow
    EMFILE = 24,          // Too many open files
    ENOTTY = 25,          // Not a typewriter
    ETXTBSY = 26,         // Text file busy
    EFBIG = 27,           // File too large
    ENOSPC = 28,          // No space left on device
    ESPIPE = 29,          // Illegal seek
    EROFS = 30,           // Read-only file system
    EMLINK = 31,          // Too many links
    EPIPE = 32,           // Broken pipe
    EDOM = 33,            // Math argument out of domain of func
    ERANGE = 34,          // Math result not representable
    EDEADLK = 35,         // Resource deadlock would occur
    ENAMETOOLONG = 36,    // File name too long
    ENOLCK = 37,          // No record locks available
    ENOSYS = 38,          // Invalid system call number
    ENOTEMPTY = 39,       // Directory not empty
    ELOOP = 40,           // Too many symbolic links encountered
    EOVERFLOW = 75,       // Value too large for defined data type
    EILSEQ = 84,          // Illegal byte sequence
    ENOTSOCK = 88,        // Socket operation on non-socket
    EDESTADDRREQ = 89,    // Destination address required
    EMSGSIZE = 90,        // Message too long
    EPROTOTYPE = 91,      // Protocol wrong type for socket
    ENOPROTOOPT = 92,     // Protocol not available
    EPROTONOSUPPORT = 93, // Protocol not supported
    EOPNOTSUPP = 95,      // Operation not supported on transport endpoint
    EAFNOSUPPORT = 97,    // Address family not supported by protocol
    EADDRINUSE = 98,      // Address already in use
    EADDRNOTAVAIL = 99,   // Cannot assign requested address
    ENETDOWN = 100,       // Network is down
    ENETUNREACH = 101,    // Network is unreachable
    ECONNABORTED = 103,   // Software caused connection abort
    ECONNRESET = 104,     // Connection reset by peer
    ENOBUFS = 105,        // No buffer space available
    EISCONN = 106,        // Transport endpoint is already connected
    ENOTCONN = 107,       // Transport endpoint is not connected
    ETIMEDOUT = 110,      // Connection timed out
    ECONNREFUSED = 111,   // Connection refused
    EHOSTUNREACH = 113,   // No route to host
    EALREADY = 114,       // Operation already in progress
    EINPROGRESS = 115,    // Operation now in progress
    ECANCELED = 125,      // Operation Canceled
}

impl From<SubstrateError> for Errno {
    fn from(err: SubstrateError) -> Errno {
        match err {
            SubstrateError::Access => Errno::EACCES,
            SubstrateError::NotCapable => Errno::EACCES,
            SubstrateError::Perm => Errno::EPERM,
            SubstrateError::AddrInUse => Errno::EADDRINUSE,
            SubstrateError::AddrNotAvail => Errno::EADDRNOTAVAIL,
            SubstrateError::AfNoSupport => Errno::EAFNOSUPPORT,
            SubstrateError::Again => Errno::EAGAIN,
            SubstrateError::Already => Errno::EALREADY,
            SubstrateError::BadHandle => Errno::EBADF,
            SubstrateError::Busy => Errno::EBUSY,
            SubstrateError::Canceled => Errno::ECANCELED,
            SubstrateError::ConnAborted => Errno::ECONNABORTED,
            SubstrateError::ConnRefused => Errno::ECONNREFUSED,
            SubstrateError::ConnReset => Errno::ECONNRESET,
            SubstrateError::DestAddrReq => Errno::EDESTADDRREQ,
            SubstrateError::Exist => Errno::EEXIST,
            SubstrateError::FileTooBig => Errno::EFBIG,
            SubstrateError::HostUnreach => Errno::EHOSTUNREACH,
            SubstrateError::InProgress => Errno::EINPROGRESS,
            SubstrateError::Interrupted => Errno::EINTR,
            SubstrateError::Invalid => Errno::EINVAL,
            SubstrateError::Io => Errno::EIO,
            SubstrateError::IsConn => Errno::EISCONN,
            SubstrateError::IsDir => Errno::EISDIR,
            SubstrateError::Loop => Errno::ELOOP,
            SubstrateError::MsgSize => Errno::EMSGSIZE,
            SubstrateError::NameTooLong => Errno::ENAMETOOLONG,
            SubstrateError::NetDown => Errno::ENETDOWN,
            SubstrateError::NetUnreach => Errno::ENETUNREACH,
            SubstrateError::NoBufs => Errno::ENOBUFS,
            SubstrateError::NoEnt => Errno::ENOENT,
            SubstrateError::NoMem => Errno::ENOMEM,
            SubstrateError::NoSpace => Errno::ENOSPC,
            SubstrateError::NotConn => Errno::ENOTCONN,
            SubstrateError::NotDir => Errno::ENOTDIR,
            SubstrateError::NotEmpty => Errno::ENOTEMPTY,
            SubstrateError::NotSock => Errno::ENOTSOCK,
            SubstrateError::NotSup => Errno::EOPNOTSUPP,
            SubstrateError::Pipe => Errno::EPIPE,
            SubstrateError::ReadOnlyFs => Errno::EROFS,
            SubstrateError::SeekPipe => Errno::ESPIPE,
            SubstrateError::TableFull => Errno::ENFILE,
            SubstrateError::TimedOut => Errno::ETIMEDOUT,
            SubstrateError::Other(_) => Errno::EIO,
        }
    }
}

impl Errno {
    /// Recovers an errno from a negative syscall return value
    pub fn from_retval(retval: i32) -> Option<Errno> {
        ALL_ERRNOS.iter().copied().find(|e| -(*e as i32) == retval)
    }
}

const ALL_ERRNOS: &[Errno] = &[
    Errno::EPERM,
    Errno::ENOENT,
    Errno::ESRCH,
    Errno::EINTR,
    Errno::EIO,
    Errno::ENXIO,
    Errno::E2BIG,
    Errno::ENOEXEC,
    Errno::EBADF,
    Errno::ECHILD,
    Errno::EAGAIN,
    Errno::ENOMEM,
    Errno::EACCES,
    Errno::EFAULT,
    Errno::ENOTBLK,
    Errno::EBUSY,
    Errno::EEXIST,
    Errno::EXDEV,
    Errno::ENODEV,
    Errno::ENOTDIR,
    Errno::EISDIR,
    Errno::EINVAL,
    Errno::ENFILE,
    Errno::EMFILE,
    Errno::ENOTTY,
    Errno::ETXTBSY,
    Errno::EFBIG,
    Errno::ENOSPC,
    Errno::ESPIPE,
    Errno::EROFS,
    Errno::EMLINK,
    Errno::EPIPE,
    Errno::EDOM,
    Errno::ERANGE,
    Errno::EDEADLK,
    Errno::ENAMETOOLONG,
    Errno::ENOLCK,
    Errno::ENOSYS,
    Errno::ENOTEMPTY,
    Errno::ELOOP,
    Errno::EOVERFLOW,
    Errno::EILSEQ,
    Errno::ENOTSOCK,
    Errno::EDESTADDRREQ,
    Errno::EMSGSIZE,
    Errno::EPROTOTYPE,
    Errno::ENOPROTOOPT,
    Errno::EPROTONOSUPPORT,
    Errno::EOPNOTSUPP,
    Errno::EAFNOSUPPORT,
    Errno::EADDRINUSE,
    Errno::EADDRNOTAVAIL,
    Errno::ENETDOWN,
    Errno::ENETUNREACH,
    Errno::ECONNABORTED,
    Errno::ECONNRESET,
    Errno::ENOBUFS,
    Errno::EISCONN,
    Errno::ENOTCONN,
    Errno::ETIMEDOUT,
    Errno::ECONNREFUSED,
    Errno::EHOSTUNREACH,
    Errno::EALREADY,
    Errno::EINPROGRESS,
    Errno::ECANCELED,
];

/// Logs a failed call and produces its return value, the negated errno
pub fn syscall_error(e: Errno, syscall: &str, message: &str) -> i32 {
    log::debug!("{}: {:?}: {}", syscall, e, message);
    -(e as i32)
}

/// Same as `syscall_error` but for substrate failures, which are translated first
pub fn substrate_error(err: SubstrateError, syscall: &str) -> i32 {
    let e = Errno::from(err);
    log::debug!("{}: {:?}: substrate reported {}", syscall, e, err);
    -(e as i32)
}

// The last-error cell. Like C errno it is per thread, so concurrent callers
// never observe each other's failures.
thread_local! {
    static LAST_ERRNO: Cell<i32> = const { Cell::new(0) };
}

pub fn set_errno(errno: i32) {
    LAST_ERRNO.with(|cell| cell.set(errno));
}

pub fn get_errno() -> i32 {
    LAST_ERRNO.with(|cell| cell.get())
}

#[cfg(test)]
mod errno_tests {
    use super::*;

    #[test]
    fn ut_errno_translation_keeps_network_failures_distinct() {
        let refused = Errno::from(SubstrateError::ConnRefused);
        let inuse = Errno::from(SubstrateError::AddrInUse);
        let unreach = Errno::from(SubstrateError::NetUnreach);
        assert_eq!(refused, Errno::ECONNREFUSED);
        assert_eq!(inuse, Errno::EADDRINUSE);
        assert_eq!(unreach, Errno::ENETUNREACH);
        assert_ne!(refused, inuse);
        assert_ne!(inuse, unreach);
    }

    #[test]
    fn ut_errno_translation_unmapped_code_is_eio() {
        assert_eq!(Errno::from(SubstrateError::Other(0xbeef)), Errno::EIO);
        assert_eq!(Errno::from(SubstrateError::Io), Errno::EIO);
    }

    #[test]
    fn ut_errno_translation_rights_failures() {
        assert_eq!(Errno::from(SubstrateError::NotCapable), Errno::EACCES);
        assert_eq!(Errno::from(SubstrateError::Perm), Errno::EPERM);
        assert_eq!(Errno::from(SubstrateError::TableFull), Errno::ENFILE);
    }

    #[test]
    fn ut_errno_syscall_error_negates() {
        assert_eq!(syscall_error(Errno::EBADF, "close", "test"), -9);
        assert_eq!(Errno::from_retval(-9), Some(Errno::EBADF));
        assert_eq!(Errno::from_retval(-10000), None);
    }

    #[test]
    fn ut_errno_cell_is_per_thread() {
        set_errno(Errno::EAGAIN as i32);
        let other = std::thread::spawn(get_errno).join().unwrap();
        assert_eq!(other, 0);
        assert_eq!(get_errno(), Errno::EAGAIN as i32);
    }
}
