#![allow(dead_code)]
// C-style entry surface: numbered dispatch over raw arguments, process init and teardown

use super::process::{Process, ProcessConfig};
use super::syscall_numbers::*;
use crate::interface;
use crate::interface::errnos::*;
use crate::interface::types::*;
use crate::interface::{AddressFamily, Endpoint, GenSockaddr, MemSubstrate, Substrate};

// the process every dispatched call runs against, set up by capposixinit
static PROCESS: interface::RustLazyGlobal<interface::RustLock<Option<interface::RustRfc<Process>>>> =
    interface::RustLazyGlobal::new(|| interface::RustLock::new(None));

macro_rules! get_onearg {
    ($arg: expr) => {
        match (move || Ok($arg?))() {
            Ok(okval) => okval,
            Err(e) => return e,
        }
    };
}

//this macro takes in a syscall invocation name (i.e. process.open_syscall), and all of the arguments
//to the syscall. Then it unwraps the arguments, returning the error if any one of them is an error
//value, and returning the value of the function if not. It does this by using the ? operator in
//the body of a closure within the variadic macro
macro_rules! check_and_dispatch {
    ( $process:ident . $func:ident, $($arg:expr),* ) => {
        match (|| Ok($process.$func( $($arg?),* )))() {
            Ok(i) => i, Err(i) => i
        }
    };
}

/// The process installed by `capposixinit`, if any
pub fn current_process() -> Option<interface::RustRfc<Process>> {
    PROCESS.read().clone()
}

fn iovecs_mut<'a>(iovs: &[IovecStruct]) -> Result<Vec<&'a mut [u8]>, i32> {
    iovs.iter()
        .map(|iov| -> Result<&'a mut [u8], i32> {
            if iov.iov_len == 0 {
                return Ok(&mut []);
            }
            if iov.iov_base.is_null() {
                return Err(syscall_error(Errno::EFAULT, "dispatcher", "null iovec base"));
            }
            Ok(unsafe { std::slice::from_raw_parts_mut(iov.iov_base, iov.iov_len) })
        })
        .collect()
}

fn iovecs<'a>(iovs: &[IovecStruct]) -> Result<Vec<&'a [u8]>, i32> {
    iovs.iter()
        .map(|iov| -> Result<&'a [u8], i32> {
            if iov.iov_len == 0 {
                return Ok(&[]);
            }
            if iov.iov_base.is_null() {
                return Err(syscall_error(Errno::EFAULT, "dispatcher", "null iovec base"));
            }
            Ok(unsafe { std::slice::from_raw_parts(iov.iov_base as *const u8, iov.iov_len) })
        })
        .collect()
}

fn placeholder_sockaddr() -> GenSockaddr {
    GenSockaddr::from(&Endpoint::unspecified(AddressFamily::Inet))
}

// copies an address back out the way accept and recvfrom do, truncating to the caller's buffer
fn copy_out_sockaddr(out: Option<(&mut [u8], &mut u32)>, addr: &GenSockaddr) {
    if let Some((buf, addrlen)) = out {
        *addrlen = addr.write_to(buf);
    }
}

/// ### Description
///
/// Runs call `callnum` against the current process.
///
/// ### Returns
///
/// The call's non-negative result, or -1 with the errno stored in the
/// calling thread's last-error cell (see [`capposix_errno`]).
#[no_mangle]
pub extern "C" fn dispatcher(callnum: i32, arg1: Arg, arg2: Arg, arg3: Arg, arg4: Arg, arg5: Arg, arg6: Arg) -> i32 {
    let process = match current_process() {
        Some(process) => process,
        None => {
            log::error!("call {} dispatched before capposixinit", callnum);
            set_errno(Errno::ENOSYS as i32);
            return -1;
        }
    };

    let retval = dispatch_call(&process, callnum, arg1, arg2, arg3, arg4, arg5, arg6);
    if retval < 0 {
        set_errno(-retval);
        -1
    } else {
        retval
    }
}

fn dispatch_call(process: &Process, callnum: i32, arg1: Arg, arg2: Arg, arg3: Arg, arg4: Arg, arg5: Arg, arg6: Arg) -> i32 {
    match callnum {
        OPEN_SYSCALL => {
            check_and_dispatch!(process.open_syscall, interface::get_cstr(arg1), interface::get_int(arg2), interface::get_uint(arg3))
        }
        CLOSE_SYSCALL => {
            check_and_dispatch!(process.close_syscall, interface::get_int(arg1))
        }
        READ_SYSCALL => {
            let count = get_onearg!(interface::get_usize(arg3));
            check_and_dispatch!(process.read_syscall, interface::get_int(arg1), interface::get_mutcbuf(arg2, count))
        }
        WRITE_SYSCALL => {
            let count = get_onearg!(interface::get_usize(arg3));
            check_and_dispatch!(process.write_syscall, interface::get_int(arg1), interface::get_cbuf(arg2, count))
        }
        PREAD_SYSCALL => {
            let count = get_onearg!(interface::get_usize(arg3));
            check_and_dispatch!(process.pread_syscall, interface::get_int(arg1), interface::get_mutcbuf(arg2, count), interface::get_long(arg4))
        }
        PWRITE_SYSCALL => {
            let count = get_onearg!(interface::get_usize(arg3));
            check_and_dispatch!(process.pwrite_syscall, interface::get_int(arg1), interface::get_cbuf(arg2, count), interface::get_long(arg4))
        }
        READV_SYSCALL => {
            let iovcnt = get_onearg!(interface::get_int(arg3));
            let iovs = get_onearg!(interface::get_iovecs(arg2, iovcnt));
            let mut bufs = get_onearg!(iovecs_mut(iovs));
            check_and_dispatch!(process.readv_syscall, interface::get_int(arg1), Ok::<&mut [&mut [u8]], i32>(&mut bufs))
        }
        WRITEV_SYSCALL => {
            let iovcnt = get_onearg!(interface::get_int(arg3));
            let iovs = get_onearg!(interface::get_iovecs(arg2, iovcnt));
            let bufs = get_onearg!(iovecs(iovs));
            check_and_dispatch!(process.writev_syscall, interface::get_int(arg1), Ok::<&[&[u8]], i32>(&bufs))
        }
        LSEEK_SYSCALL => {
            let fd = get_onearg!(interface::get_int(arg1));
            let offset = get_onearg!(interface::get_long(arg2));
            let whence = get_onearg!(interface::get_int(arg3));
            let offset = process.lseek_syscall(fd, offset, whence);
            if offset < 0 {
                return offset as i32;
            }
            if offset > i32::MAX as i64 {
                return syscall_error(Errno::EOVERFLOW, "lseek", "resulting offset does not fit the return value");
            }
            offset as i32
        }
        IOCTL_SYSCALL => {
            check_and_dispatch!(process.ioctl_syscall, interface::get_int(arg1), interface::get_uint(arg2), interface::get_optional_intptr(arg3))
        }
        FXSTAT_SYSCALL => {
            check_and_dispatch!(process.fstat_syscall, interface::get_int(arg1), interface::get_statdatastruct(arg2))
        }
        FTRUNCATE_SYSCALL => {
            check_and_dispatch!(process.ftruncate_syscall, interface::get_int(arg1), interface::get_long(arg2))
        }
        GETDENTS_SYSCALL => {
            let count = get_onearg!(interface::get_usize(arg3));
            check_and_dispatch!(process.getdents_syscall, interface::get_int(arg1), interface::get_mutcbuf(arg2, count))
        }
        DUP_SYSCALL => {
            check_and_dispatch!(process.dup_syscall, interface::get_int(arg1), Ok::<Option<i32>, i32>(None))
        }
        DUP2_SYSCALL => {
            check_and_dispatch!(process.dup2_syscall, interface::get_int(arg1), interface::get_int(arg2))
        }
        DUP3_SYSCALL => {
            check_and_dispatch!(process.dup3_syscall, interface::get_int(arg1), interface::get_int(arg2), interface::get_int(arg3))
        }
        FCNTL_SYSCALL => {
            check_and_dispatch!(process.fcntl_syscall, interface::get_int(arg1), interface::get_int(arg2), interface::get_int(arg3))
        }
        PIPE_SYSCALL => {
            check_and_dispatch!(process.pipe_syscall, interface::get_pipearray(arg1))
        }
        PIPE2_SYSCALL => {
            check_and_dispatch!(process.pipe2_syscall, interface::get_pipearray(arg1), interface::get_int(arg2))
        }
        EVENTFD_SYSCALL => {
            check_and_dispatch!(process.eventfd_syscall, interface::get_uint(arg1), interface::get_int(arg2))
        }
        MKDIR_SYSCALL => {
            check_and_dispatch!(process.mkdir_syscall, interface::get_cstr(arg1), interface::get_uint(arg2))
        }
        SYMLINK_SYSCALL => {
            check_and_dispatch!(process.symlink_syscall, interface::get_cstr(arg1), interface::get_cstr(arg2))
        }
        SOCKET_SYSCALL => {
            check_and_dispatch!(process.socket_syscall, interface::get_int(arg1), interface::get_int(arg2), interface::get_int(arg3))
        }
        BIND_SYSCALL => {
            let addrlen = get_onearg!(interface::get_uint(arg3));
            let addr = get_onearg!(interface::get_sockaddr(arg2, addrlen));
            check_and_dispatch!(process.bind_syscall, interface::get_int(arg1), Ok::<&GenSockaddr, i32>(&addr))
        }
        CONNECT_SYSCALL => {
            let addrlen = get_onearg!(interface::get_uint(arg3));
            let addr = get_onearg!(interface::get_sockaddr(arg2, addrlen));
            check_and_dispatch!(process.connect_syscall, interface::get_int(arg1), Ok::<&GenSockaddr, i32>(&addr))
        }
        LISTEN_SYSCALL => {
            check_and_dispatch!(process.listen_syscall, interface::get_int(arg1), interface::get_int(arg2))
        }
        ACCEPT_SYSCALL | ACCEPT4_SYSCALL => {
            let flags = if callnum == ACCEPT4_SYSCALL { get_onearg!(interface::get_int(arg4)) } else { 0 };
            let out = get_onearg!(interface::get_sockaddr_out(arg2, arg3));
            let mut addr = placeholder_sockaddr();
            let rv = check_and_dispatch!(process.accept4_syscall, interface::get_int(arg1), Ok::<Option<&mut GenSockaddr>, i32>(Some(&mut addr)), Ok::<i32, i32>(flags));
            if rv >= 0 {
                copy_out_sockaddr(out, &addr);
            }
            rv
        }
        SEND_SYSCALL => {
            let count = get_onearg!(interface::get_usize(arg3));
            check_and_dispatch!(process.send_syscall, interface::get_int(arg1), interface::get_cbuf(arg2, count), interface::get_int(arg4))
        }
        SENDTO_SYSCALL => {
            let count = get_onearg!(interface::get_usize(arg3));
            let addrlen = get_onearg!(interface::get_uint(arg6));
            let addr = get_onearg!(interface::get_sockaddr(arg5, addrlen));
            check_and_dispatch!(process.sendto_syscall, interface::get_int(arg1), interface::get_cbuf(arg2, count), interface::get_int(arg4), Ok::<&GenSockaddr, i32>(&addr))
        }
        RECV_SYSCALL => {
            let count = get_onearg!(interface::get_usize(arg3));
            check_and_dispatch!(process.recv_syscall, interface::get_int(arg1), interface::get_mutcbuf(arg2, count), interface::get_int(arg4))
        }
        RECVFROM_SYSCALL => {
            let count = get_onearg!(interface::get_usize(arg3));
            let out = get_onearg!(interface::get_sockaddr_out(arg5, arg6));
            let mut addr = placeholder_sockaddr();
            let rv = check_and_dispatch!(process.recvfrom_syscall, interface::get_int(arg1), interface::get_mutcbuf(arg2, count), interface::get_int(arg4), Ok::<Option<&mut GenSockaddr>, i32>(Some(&mut addr)));
            if rv >= 0 {
                copy_out_sockaddr(out, &addr);
            }
            rv
        }
        SHUTDOWN_SYSCALL => {
            check_and_dispatch!(process.shutdown_syscall, interface::get_int(arg1), interface::get_int(arg2))
        }
        GETSOCKOPT_SYSCALL => {
            let optval = get_onearg!(interface::get_intptr(arg4));
            let optlen = get_onearg!(interface::get_socklen_t_ptr(arg5));
            if (*optlen as usize) < std::mem::size_of::<i32>() {
                return syscall_error(Errno::EINVAL, "getsockopt", "Invalid optlen passed");
            }
            let rv = check_and_dispatch!(process.getsockopt_syscall, interface::get_int(arg1), interface::get_int(arg2), interface::get_int(arg3), Ok::<&mut i32, i32>(optval));
            //we take it as a given that the length is 4 on the way out
            if rv >= 0 {
                *optlen = std::mem::size_of::<i32>() as u32;
            }
            rv
        }
        SETSOCKOPT_SYSCALL => {
            if (get_onearg!(interface::get_uint(arg5)) as usize) < std::mem::size_of::<i32>() {
                return syscall_error(Errno::EINVAL, "setsockopt", "Invalid optlen passed");
            }
            let optval = *get_onearg!(interface::get_intptr(arg4));
            check_and_dispatch!(process.setsockopt_syscall, interface::get_int(arg1), interface::get_int(arg2), interface::get_int(arg3), Ok::<i32, i32>(optval))
        }
        GETSOCKNAME_SYSCALL | GETPEERNAME_SYSCALL => {
            let out = get_onearg!(interface::get_sockaddr_out(arg2, arg3));
            if out.is_none() {
                return syscall_error(Errno::EFAULT, "getsockname", "Either the address or the length were null");
            }
            let mut addr = placeholder_sockaddr();
            let rv = if callnum == GETSOCKNAME_SYSCALL {
                check_and_dispatch!(process.getsockname_syscall, interface::get_int(arg1), Ok::<&mut GenSockaddr, i32>(&mut addr))
            } else {
                check_and_dispatch!(process.getpeername_syscall, interface::get_int(arg1), Ok::<&mut GenSockaddr, i32>(&mut addr))
            };
            if rv >= 0 {
                copy_out_sockaddr(out, &addr);
            }
            rv
        }
        SELECT_SYSCALL => {
            let timeout = match get_onearg!(interface::get_timeval(arg5)) {
                None => None,
                Some(tv) => match interface::duration_from_timeval(tv.tv_sec, tv.tv_usec) {
                    Some(duration) => Some(duration),
                    None => return syscall_error(Errno::EINVAL, "select", "malformed timeout"),
                },
            };
            check_and_dispatch!(process.select_syscall, interface::get_int(arg1), interface::get_fdset(arg2), interface::get_fdset(arg3), interface::get_fdset(arg4), Ok::<Option<interface::RustDuration>, i32>(timeout))
        }
        POLL_SYSCALL => {
            let nfds = get_onearg!(interface::get_usize(arg2));
            check_and_dispatch!(process.poll_syscall, interface::get_pollstruct_slice(arg1, nfds), interface::get_int(arg3))
        }
        _ => syscall_error(Errno::ENOSYS, "dispatcher", "unknown call number"),
    }
}

fn level_for(verbosity: isize) -> log::LevelFilter {
    match verbosity {
        v if v <= 0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    }
}

/// Builds the process over `substrate`, replacing (and tearing down) any
/// process already installed
pub fn capposix_install(substrate: interface::RustRfc<dyn Substrate>, config: ProcessConfig) {
    let process = interface::RustRfc::new(Process::new(substrate, config));
    let previous = PROCESS.write().replace(process);
    if let Some(previous) = previous {
        previous.teardown();
    }
}

/// ### Description
///
/// Sets the log level from `verbosity` and installs a fresh process over an
/// in-memory substrate. CAPPOSIX_MAXFD, when set, sizes the descriptor
/// table. Installing a logger is left to the embedder.
#[no_mangle]
pub extern "C" fn capposixinit(verbosity: isize) {
    let _ = interface::VERBOSE.set(verbosity); //assigned to suppress unused result warning
    log::set_max_level(level_for(verbosity));

    let mut config = ProcessConfig::from_env();
    config.verbosity = verbosity;
    capposix_install(interface::RustRfc::new(MemSubstrate::new()), config);
}

/// Tears the current process down, releasing every handle it still owns
#[no_mangle]
pub extern "C" fn capposixfinalize() {
    let process = PROCESS.write().take();
    if let Some(process) = process {
        process.teardown();
    }
}

/// The errno of the last failed dispatch on this thread
#[no_mangle]
pub extern "C" fn capposix_errno() -> i32 {
    get_errno()
}
