use crate::interface::comm::GenSockaddr;
use crate::interface::errnos::{syscall_error, Errno};
use std::ffi::{c_char, CStr};

pub const FD_SET_WORDS: usize = 16;

//redefining the StatData struct in this file so that we maintain flow of program
//derive eq attributes for testing whether the structs equal other statdata structs from fstat
#[derive(Debug, Eq, PartialEq, Default, Clone, Copy)]
#[repr(C)]
pub struct StatData {
    pub st_dev: u64,
    pub st_ino: usize,
    pub st_mode: u32,
    pub st_nlink: u32,
    pub st_uid: u32,
    pub st_gid: u32,
    pub st_rdev: u64,
    pub st_size: usize,
    pub st_blksize: isize,
    pub st_blocks: usize,
    //the substrate has no timestamps for us, these stay zero
    pub st_atim: (u64, u64),
    pub st_mtim: (u64, u64),
    pub st_ctim: (u64, u64),
}

#[derive(Debug, Eq, PartialEq, Default, Clone, Copy)]
#[repr(C)]
pub struct PipeArray {
    pub readfd: i32,
    pub writefd: i32,
}

#[derive(Debug, Eq, PartialEq, Default, Clone, Copy)]
#[repr(C)]
pub struct PollStruct {
    pub fd: i32,
    pub events: i16,
    pub revents: i16,
}

#[derive(Debug, Eq, PartialEq, Default, Clone, Copy)]
#[repr(C)]
pub struct TimeVal {
    pub tv_sec: i64,
    pub tv_usec: i64,
}

#[derive(Debug, Clone, Copy)]
#[repr(C)]
pub struct IovecStruct {
    pub iov_base: *mut u8,
    pub iov_len: usize,
}

/// fd_set as a plain bitmask, one bit per descriptor below FD_SETSIZE
#[derive(Debug, Eq, PartialEq, Default, Clone, Copy)]
#[repr(C)]
pub struct FdSet {
    pub fds_bits: [u64; FD_SET_WORDS],
}

impl FdSet {
    pub fn new() -> FdSet {
        FdSet::default()
    }

    pub fn set(&mut self, fd: i32) {
        let fd = fd as usize;
        self.fds_bits[fd / 64] |= 1 << (fd % 64);
    }

    pub fn clear(&mut self, fd: i32) {
        let fd = fd as usize;
        self.fds_bits[fd / 64] &= !(1 << (fd % 64));
    }

    pub fn is_set(&self, fd: i32) -> bool {
        let fd = fd as usize;
        self.fds_bits[fd / 64] & (1 << (fd % 64)) != 0
    }

    pub fn zero(&mut self) {
        self.fds_bits = [0; FD_SET_WORDS];
    }

    pub fn count(&self) -> usize {
        self.fds_bits.iter().map(|word| word.count_ones() as usize).sum()
    }

    /// Descriptors below `nfds` that are in the set
    pub fn members(&self, nfds: i32) -> Vec<i32> {
        (0..nfds).filter(|fd| self.is_set(*fd)).collect()
    }
}

//redefining the Arg union to maintain the flow of the program
#[repr(C)]
#[derive(Clone, Copy)]
pub union Arg {
    pub dispatch_int: i32,
    pub dispatch_uint: u32,
    pub dispatch_ulong: u64,
    pub dispatch_long: i64,
    pub dispatch_usize: usize, //For types not specified to be a given length, but often set to word size (i.e. size_t)
    pub dispatch_isize: isize, //For types not specified to be a given length, but often set to word size (i.e. off_t)
    pub dispatch_cbuf: *const u8, //Typically corresponds to an immutable void* pointer as in write
    pub dispatch_mutcbuf: *mut u8, //Typically corresponds to a mutable void* pointer as in read
    pub dispatch_cstr: *const c_char, //Typically corresponds to a passed in string of type char*, as in open
    pub dispatch_constsockaddr: *const u8, //const struct sockaddr*, decoded by family tag
    pub dispatch_sockaddr: *mut u8, //struct sockaddr* filled in by accept/getsockname
    pub dispatch_socklen_t_ptr: *mut u32,
    pub dispatch_intptr: *mut i32,
    pub dispatch_pollstructarray: *mut PollStruct,
    pub dispatch_fdset: *mut FdSet,
    pub dispatch_structtimeval: *mut TimeVal,
    pub dispatch_statdatastruct: *mut StatData,
    pub dispatch_pipearray: *mut PipeArray,
    pub dispatch_constiovecstruct: *const IovecStruct,
}

impl Arg {
    pub fn int(value: i32) -> Arg {
        // zero the full word first so no byte of the union is left uninitialized
        let mut arg = Arg { dispatch_ulong: 0 };
        arg.dispatch_int = value;
        arg
    }

    pub fn null() -> Arg {
        Arg { dispatch_ulong: 0 }
    }
}

pub fn get_int(union_argument: Arg) -> Result<i32, i32> {
    //C callers pass the int in the low half of the word, like the kernel ABI we truncate
    Ok(unsafe { union_argument.dispatch_int })
}

pub fn get_uint(union_argument: Arg) -> Result<u32, i32> {
    Ok(unsafe { union_argument.dispatch_uint })
}

pub fn get_long(union_argument: Arg) -> Result<i64, i32> {
    Ok(unsafe { union_argument.dispatch_long }) //this should not return error
}

pub fn get_ulong(union_argument: Arg) -> Result<u64, i32> {
    Ok(unsafe { union_argument.dispatch_ulong })
}

pub fn get_usize(union_argument: Arg) -> Result<usize, i32> {
    Ok(unsafe { union_argument.dispatch_usize })
}

pub fn get_isize(union_argument: Arg) -> Result<isize, i32> {
    Ok(unsafe { union_argument.dispatch_isize })
}

pub fn get_cbuf<'a>(union_argument: Arg, len: usize) -> Result<&'a [u8], i32> {
    let data = unsafe { union_argument.dispatch_cbuf };
    if len == 0 {
        return Ok(&[]);
    }
    if !data.is_null() {
        return Ok(unsafe { std::slice::from_raw_parts(data, len) });
    }
    Err(syscall_error(Errno::EFAULT, "dispatcher", "input data not valid"))
}

pub fn get_mutcbuf<'a>(union_argument: Arg, len: usize) -> Result<&'a mut [u8], i32> {
    let data = unsafe { union_argument.dispatch_mutcbuf };
    if len == 0 {
        return Ok(&mut []);
    }
    if !data.is_null() {
        return Ok(unsafe { std::slice::from_raw_parts_mut(data, len) });
    }
    Err(syscall_error(Errno::EFAULT, "dispatcher", "input data not valid"))
}

pub fn get_cstr<'a>(union_argument: Arg) -> Result<&'a str, i32> {
    //first we check that the pointer is not null
    //and then we check so that we can get data from the memory
    let pointer = unsafe { union_argument.dispatch_cstr };
    if pointer.is_null() {
        return Err(syscall_error(Errno::EFAULT, "dispatcher", "input data not valid"));
    }
    match unsafe { CStr::from_ptr(pointer) }.to_str() {
        Ok(ret_data) => Ok(ret_data),
        Err(_) => Err(syscall_error(
            Errno::EILSEQ,
            "dispatcher",
            "could not parse input data to a string",
        )),
    }
}

pub fn get_sockaddr(union_argument: Arg, addrlen: u32) -> Result<GenSockaddr, i32> {
    let pointer = unsafe { union_argument.dispatch_constsockaddr };
    if pointer.is_null() {
        return Err(syscall_error(Errno::EFAULT, "dispatcher", "input data not valid"));
    }
    let bytes = unsafe { std::slice::from_raw_parts(pointer, addrlen as usize) };
    GenSockaddr::decode(bytes).map_err(|e| syscall_error(e, "dispatcher", "malformed socket address"))
}

/// Output sockaddr buffer and its in/out length, both optional per POSIX
pub fn get_sockaddr_out<'a>(
    addr_argument: Arg,
    len_argument: Arg,
) -> Result<Option<(&'a mut [u8], &'a mut u32)>, i32> {
    let addr = unsafe { addr_argument.dispatch_sockaddr };
    let lenptr = unsafe { len_argument.dispatch_socklen_t_ptr };
    if addr.is_null() || lenptr.is_null() {
        return Ok(None);
    }
    let addrlen = unsafe { &mut *lenptr };
    let buf = unsafe { std::slice::from_raw_parts_mut(addr, *addrlen as usize) };
    Ok(Some((buf, addrlen)))
}

pub fn get_socklen_t_ptr<'a>(union_argument: Arg) -> Result<&'a mut u32, i32> {
    let pointer = unsafe { union_argument.dispatch_socklen_t_ptr };
    if !pointer.is_null() {
        return Ok(unsafe { &mut *pointer });
    }
    Err(syscall_error(Errno::EFAULT, "dispatcher", "input data not valid"))
}

pub fn get_intptr<'a>(union_argument: Arg) -> Result<&'a mut i32, i32> {
    let pointer = unsafe { union_argument.dispatch_intptr };
    if !pointer.is_null() {
        return Ok(unsafe { &mut *pointer });
    }
    Err(syscall_error(Errno::EFAULT, "dispatcher", "input data not valid"))
}

//ioctl's third argument is optional for requests that take none
pub fn get_optional_intptr<'a>(union_argument: Arg) -> Result<Option<&'a mut i32>, i32> {
    let pointer = unsafe { union_argument.dispatch_intptr };
    if pointer.is_null() {
        return Ok(None);
    }
    Ok(Some(unsafe { &mut *pointer }))
}

pub fn get_pollstruct_slice<'a>(union_argument: Arg, nfds: usize) -> Result<&'a mut [PollStruct], i32> {
    let pointer = unsafe { union_argument.dispatch_pollstructarray };
    if nfds == 0 {
        return Ok(&mut []);
    }
    if !pointer.is_null() {
        return Ok(unsafe { std::slice::from_raw_parts_mut(pointer, nfds) });
    }
    Err(syscall_error(Errno::EFAULT, "dispatcher", "input data not valid"))
}

//select accepts a null set, meaning not interested
pub fn get_fdset<'a>(union_argument: Arg) -> Result<Option<&'a mut FdSet>, i32> {
    let pointer = unsafe { union_argument.dispatch_fdset };
    if pointer.is_null() {
        return Ok(None);
    }
    Ok(Some(unsafe { &mut *pointer }))
}

pub fn get_timeval<'a>(union_argument: Arg) -> Result<Option<&'a mut TimeVal>, i32> {
    let pointer = unsafe { union_argument.dispatch_structtimeval };
    if pointer.is_null() {
        return Ok(None);
    }
    Ok(Some(unsafe { &mut *pointer }))
}

pub fn get_statdatastruct<'a>(union_argument: Arg) -> Result<&'a mut StatData, i32> {
    let pointer = unsafe { union_argument.dispatch_statdatastruct };
    if !pointer.is_null() {
        return Ok(unsafe { &mut *pointer });
    }
    Err(syscall_error(Errno::EFAULT, "dispatcher", "input data not valid"))
}

pub fn get_pipearray<'a>(union_argument: Arg) -> Result<&'a mut PipeArray, i32> {
    let pointer = unsafe { union_argument.dispatch_pipearray };
    if !pointer.is_null() {
        return Ok(unsafe { &mut *pointer });
    }
    Err(syscall_error(Errno::EFAULT, "dispatcher", "input data not valid"))
}

pub fn get_iovecs<'a>(union_argument: Arg, iovcnt: i32) -> Result<&'a [IovecStruct], i32> {
    if iovcnt < 0 {
        return Err(syscall_error(Errno::EINVAL, "dispatcher", "negative iovec count"));
    }
    if iovcnt == 0 {
        return Ok(&[]);
    }
    let pointer = unsafe { union_argument.dispatch_constiovecstruct };
    if !pointer.is_null() {
        return Ok(unsafe { std::slice::from_raw_parts(pointer, iovcnt as usize) });
    }
    Err(syscall_error(Errno::EFAULT, "dispatcher", "input data not valid"))
}

#[cfg(test)]
mod types_tests {
    use super::*;

    #[test]
    fn ut_fdset_bits() {
        let mut set = FdSet::new();
        set.set(0);
        set.set(65);
        set.set(1023);
        assert!(set.is_set(65));
        assert!(!set.is_set(64));
        assert_eq!(set.count(), 3);
        assert_eq!(set.members(100), vec![0, 65]);
        set.clear(65);
        assert_eq!(set.count(), 2);
        set.zero();
        assert_eq!(set, FdSet::default());
    }

    #[test]
    fn ut_null_pointers_fault() {
        assert_eq!(get_cstr(Arg::null()), Err(-(Errno::EFAULT as i32)));
        assert_eq!(get_cbuf(Arg::null(), 0).map(|b| b.len()), Ok(0));
        assert!(get_fdset(Arg::null()).unwrap().is_none());
        assert_eq!(get_int(Arg::int(-1)), Ok(-1));
    }
}
