// Network related constants
#![allow(dead_code)]

// Define constants using static or const
// Imported into net_calls and poll_calls files

pub const SOCK_STREAM: i32 = 1; //stream socket
pub const SOCK_DGRAM: i32 = 2; //datagram socket
pub const SOCK_RAW: i32 = 3; //raw protocol interface
pub const SOCK_SEQPACKET: i32 = 5; //sequenced packet stream
pub const SOCK_CLOEXEC: i32 = 0o2000000;
pub const SOCK_NONBLOCK: i32 = 0o4000;
// the modifiers ride in the type argument next to the type itself
pub const SOCK_TYPEMASK: i32 = 0xf;

/* Supported address families. */
pub const AF_UNSPEC: i32 = 0;
pub const AF_UNIX: i32 = 1; /* Unix domain sockets   */
pub const AF_LOCAL: i32 = 1; /* POSIX name for AF_UNIX */
pub const AF_INET: i32 = 2; /* Internet IP Protocol  */
pub const AF_INET6: i32 = 10; /* IP version 6   */

/* Protocol families, same as address families. */
pub const PF_UNIX: i32 = AF_UNIX;
pub const PF_INET: i32 = AF_INET;
pub const PF_INET6: i32 = AF_INET6;

pub const IPPROTO_IP: i32 = 0;
pub const IPPROTO_TCP: i32 = 6;
pub const IPPROTO_UDP: i32 = 17;
pub const IPPROTO_IPV6: i32 = 41;

pub const SOL_SOCKET: i32 = 1;

pub const SO_DEBUG: i32 = 1;
pub const SO_REUSEADDR: i32 = 2;
pub const SO_TYPE: i32 = 3;
pub const SO_ERROR: i32 = 4;
pub const SO_DONTROUTE: i32 = 5;
pub const SO_BROADCAST: i32 = 6;
pub const SO_SNDBUF: i32 = 7;
pub const SO_RCVBUF: i32 = 8;
pub const SO_KEEPALIVE: i32 = 9;
pub const SO_OOBINLINE: i32 = 10;
pub const SO_LINGER: i32 = 13;
pub const SO_ACCEPTCONN: i32 = 30;
pub const SO_PROTOCOL: i32 = 38;
pub const SO_DOMAIN: i32 = 39;

pub const TCP_NODELAY: i32 = 1;

pub const MSG_OOB: i32 = 1;
pub const MSG_PEEK: i32 = 2;
pub const MSG_DONTWAIT: i32 = 0x40;
pub const MSG_NOSIGNAL: i32 = 0x4000;

pub const SHUT_RD: i32 = 0;
pub const SHUT_WR: i32 = 1;
pub const SHUT_RDWR: i32 = 2;

pub const DEFAULT_SNDBUF: i32 = 131072;
pub const DEFAULT_RCVBUF: i32 = 131072;
pub const MIN_SOCKBUF: i32 = 4608;

//poll events
pub const POLLIN: i16 = 0o1; // There is data to read.
pub const POLLPRI: i16 = 0o2; //There is urgent data to read.
pub const POLLOUT: i16 = 0o4; // Writing now will not block.
pub const POLLERR: i16 = 0o10; // Error condition.
pub const POLLHUP: i16 = 0o20; // Hung up.
pub const POLLNVAL: i16 = 0o40; // Invalid polling request.
pub const POLLRDNORM: i16 = 0o100;
pub const POLLWRNORM: i16 = 0o400;

pub const FD_SETSIZE: i32 = 1024;

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum ConnState {
    NotConnected,
    Connected,
    ConnRdOnly,
    ConnWrOnly,
    // both directions shut down, still attached to the peer
    ConnShut,
    Listen,
}
