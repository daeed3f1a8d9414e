// Define all syscall numbers
#![allow(dead_code)]

// Define constants using static or const
// Numbers shared with the old dispatcher table keep their values

pub const MAX_SYSCALL_NUMBER: usize = 256;

pub const OPEN_SYSCALL: i32 = 10;
pub const CLOSE_SYSCALL: i32 = 11;
pub const READ_SYSCALL: i32 = 12;
pub const WRITE_SYSCALL: i32 = 13;
pub const LSEEK_SYSCALL: i32 = 14;
pub const IOCTL_SYSCALL: i32 = 15;
pub const FXSTAT_SYSCALL: i32 = 17;
pub const FTRUNCATE_SYSCALL: i32 = 18;
pub const GETDENTS_SYSCALL: i32 = 23;
pub const DUP_SYSCALL: i32 = 24;
pub const DUP2_SYSCALL: i32 = 25;
pub const FCNTL_SYSCALL: i32 = 28;

pub const BIND_SYSCALL: i32 = 33;
pub const SEND_SYSCALL: i32 = 34;
pub const SENDTO_SYSCALL: i32 = 35;
pub const RECV_SYSCALL: i32 = 36;
pub const RECVFROM_SYSCALL: i32 = 37;
pub const CONNECT_SYSCALL: i32 = 38;
pub const LISTEN_SYSCALL: i32 = 39;
pub const ACCEPT_SYSCALL: i32 = 40;

pub const GETSOCKOPT_SYSCALL: i32 = 43;
pub const SETSOCKOPT_SYSCALL: i32 = 44;
pub const SHUTDOWN_SYSCALL: i32 = 45;
pub const SELECT_SYSCALL: i32 = 46;
pub const POLL_SYSCALL: i32 = 48;

pub const PIPE_SYSCALL: i32 = 66;
pub const PIPE2_SYSCALL: i32 = 67;

pub const PREAD_SYSCALL: i32 = 126;
pub const PWRITE_SYSCALL: i32 = 127;
pub const MKDIR_SYSCALL: i32 = 131;

pub const SOCKET_SYSCALL: i32 = 136;

pub const GETSOCKNAME_SYSCALL: i32 = 144;
pub const GETPEERNAME_SYSCALL: i32 = 145;

pub const DUP3_SYSCALL: i32 = 150;
pub const ACCEPT4_SYSCALL: i32 = 151;
pub const READV_SYSCALL: i32 = 152;
pub const WRITEV_SYSCALL: i32 = 153;
pub const EVENTFD_SYSCALL: i32 = 154;
pub const SYMLINK_SYSCALL: i32 = 155;
