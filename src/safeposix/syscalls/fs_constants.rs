// File system related constants
#![allow(dead_code)]

// Define constants using static or const
// Imported into fs_calls file

pub const STARTINGFD: i32 = 0;
pub const MAXFD: i32 = 1024;

pub const O_RDONLY: i32 = 0o0;
pub const O_WRONLY: i32 = 0o1;
pub const O_RDWR: i32 = 0o2;
pub const O_RDWRFLAGS: i32 = 0o3;

pub const O_CREAT: i32 = 0o100;
pub const O_EXCL: i32 = 0o200;
pub const O_NOCTTY: i32 = 0o400;
pub const O_TRUNC: i32 = 0o1000;
pub const O_APPEND: i32 = 0o2000;
pub const O_NONBLOCK: i32 = 0o4000;
// O_NDELAY=O_NONBLOCK
pub const O_DIRECTORY: i32 = 0o200000;
pub const O_NOFOLLOW: i32 = 0o400000;
pub const O_CLOEXEC: i32 = 0o2000000;

// flags an entry remembers after open
pub const O_KEPTFLAGS: i32 = O_RDWRFLAGS | O_APPEND | O_NONBLOCK | O_CLOEXEC;
// flags F_SETFL may change
pub const O_SETFLFLAGS: i32 = O_APPEND | O_NONBLOCK;

//Standard flag combinations
pub const S_IRWXA: u32 = 0o777;
pub const S_IRWXU: u32 = 0o700;
pub const S_IRUSR: u32 = 0o400;
pub const S_IWUSR: u32 = 0o200;
pub const S_IRGRP: u32 = 0o040;
pub const S_IROTH: u32 = 0o004;

//Commands for FCNTL
pub const F_DUPFD: i32 = 0;
pub const F_GETFD: i32 = 1;
pub const F_SETFD: i32 = 2;
pub const F_GETFL: i32 = 3;
pub const F_SETFL: i32 = 4;
pub const F_DUPFD_CLOEXEC: i32 = 1030;
//rights narrowing, outside the range Linux uses
pub const F_GETRIGHTS: i32 = 1100;
pub const F_SETRIGHTS: i32 = 1101;

pub const FD_CLOEXEC: i32 = 1;

//File types for stat etc.
pub const S_IFBLK: u32 = 0o60000;
pub const S_IFCHR: u32 = 0o20000;
pub const S_IFDIR: u32 = 0o40000;
pub const S_IFIFO: u32 = 0o10000;
pub const S_IFLNK: u32 = 0o120000;
pub const S_IFREG: u32 = 0o100000;
pub const S_IFSOCK: u32 = 0o140000;
pub const S_FILETYPEFLAGS: u32 = 0o170000;

pub const SEEK_SET: i32 = 0;
pub const SEEK_CUR: i32 = 1;
pub const SEEK_END: i32 = 2;

//ioctl requests
pub const FIONREAD: u32 = 0x541B;
pub const FIONBIO: u32 = 0x5421;
pub const FIONCLEX: u32 = 0x5450;
pub const FIOCLEX: u32 = 0x5451;

//eventfd flags
pub const EFD_SEMAPHORE: i32 = 1;
pub const EFD_CLOEXEC: i32 = O_CLOEXEC;
pub const EFD_NONBLOCK: i32 = O_NONBLOCK;

//d_type values for getdents/readdir
pub const DT_UNKNOWN: u8 = 0;
pub const DT_FIFO: u8 = 1;
pub const DT_CHR: u8 = 2;
pub const DT_DIR: u8 = 4;
pub const DT_REG: u8 = 8;
pub const DT_LNK: u8 = 10;
pub const DT_SOCK: u8 = 12;

pub const BLOCK_SIZE: isize = 4096;
