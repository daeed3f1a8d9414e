// Network related system calls
// outlines and implements all of the networking system calls that are translated onto substrate sockets

use super::fs_constants::*;
use super::net_constants::*;
use crate::interface;
use crate::interface::errnos::{substrate_error, syscall_error, Errno};
use crate::interface::substrate::*;
use crate::interface::GenSockaddr;
use crate::safeposix::fdtable::{FileDescriptor::*, *};
use crate::safeposix::process::Process;

// flags send and recv know what to do with
const MSG_KNOWNFLAGS: i32 = MSG_PEEK | MSG_DONTWAIT | MSG_NOSIGNAL;

fn family_of(domain: i32) -> Option<AddressFamily> {
    match domain {
        AF_INET => Some(AddressFamily::Inet),
        AF_INET6 => Some(AddressFamily::Inet6),
        AF_UNIX => Some(AddressFamily::Unix),
        _ => None,
    }
}

fn as_socket<'a>(entry: &'a FileDescriptor, syscall: &str) -> Result<&'a SocketDesc, i32> {
    match entry {
        Socket(sockdesc) => Ok(sockdesc),
        _ => Err(syscall_error(Errno::ENOTSOCK, syscall, "file descriptor is not a socket")),
    }
}

fn is_stream(sockdesc: &SocketDesc) -> bool {
    sockdesc.socktype == SOCK_STREAM
}

// The boolean SOL_SOCKET options kept as one bit each
fn sol_flag_option(optname: i32) -> bool {
    matches!(optname, SO_REUSEADDR | SO_KEEPALIVE | SO_BROADCAST | SO_LINGER)
}

impl Process {
    /// ### Description
    ///
    /// The shared receive path of read, recv and recvfrom.
    ///
    /// ### Returns
    ///
    /// Bytes received and the sender, when the substrate names one.
    pub(crate) fn recv_entry(
        &self,
        entry: &FileDescriptor,
        buf: &mut [u8],
        flags: i32,
        syscall: &str,
    ) -> Result<(usize, Option<Endpoint>), i32> {
        let sockdesc = as_socket(entry, syscall)?;
        if flags & !MSG_KNOWNFLAGS != 0 {
            return Err(syscall_error(Errno::EOPNOTSUPP, syscall, "unsupported message flags"));
        }
        entry
            .require(Rights::FD_READ)
            .map_err(|e| syscall_error(e, syscall, "socket lacks the read right"))?;

        if is_stream(sockdesc) {
            match sockdesc.state.read().state {
                ConnState::NotConnected | ConnState::Listen => {
                    return Err(syscall_error(Errno::ENOTCONN, syscall, "The descriptor is not connected"));
                }
                // the read side was shut down, that reads as end of stream
                ConnState::ConnWrOnly | ConnState::ConnShut => return Ok((0, None)),
                ConnState::Connected | ConnState::ConnRdOnly => {}
            }
        }
        if buf.is_empty() {
            return Ok((0, None));
        }

        if entry.is_nonblocking() || flags & MSG_DONTWAIT != 0 {
            if self.ready_now(entry, Interest::Read, syscall)?.is_none() {
                return Err(syscall_error(Errno::EAGAIN, syscall, "there is no data available right now, try again later"));
            }
        }

        self.substrate()
            .socket_recv(sockdesc.handle.handle(), buf, flags & MSG_PEEK != 0)
            .map_err(|e| substrate_error(e, syscall))
    }

    /// ### Description
    ///
    /// The shared send path of write, send and sendto. `dest` is the
    /// explicit destination of sendto, if any.
    pub(crate) fn send_entry(
        &self,
        entry: &FileDescriptor,
        buf: &[u8],
        flags: i32,
        dest: Option<&Endpoint>,
        syscall: &str,
    ) -> i32 {
        let sockdesc = match as_socket(entry, syscall) {
            Ok(sockdesc) => sockdesc,
            Err(e) => return e,
        };
        if flags & !MSG_KNOWNFLAGS != 0 {
            return syscall_error(Errno::EOPNOTSUPP, syscall, "unsupported message flags");
        }
        if let Err(e) = entry.require(Rights::FD_WRITE) {
            return syscall_error(e, syscall, "socket lacks the write right");
        }

        if is_stream(sockdesc) {
            let state = sockdesc.state.read().state;
            if dest.is_some() {
                return match state {
                    ConnState::NotConnected | ConnState::Listen => {
                        syscall_error(Errno::ENOTCONN, syscall, "The descriptor is not connected")
                    }
                    _ => syscall_error(Errno::EISCONN, syscall, "The descriptor is connected"),
                };
            }
            match state {
                ConnState::NotConnected | ConnState::Listen => {
                    return syscall_error(Errno::ENOTCONN, syscall, "The descriptor is not connected");
                }
                ConnState::ConnRdOnly | ConnState::ConnShut => {
                    return syscall_error(Errno::EPIPE, syscall, "The write side of the socket was shut down");
                }
                ConnState::Connected | ConnState::ConnWrOnly => {}
            }
        } else if dest.is_none() && sockdesc.state.read().remoteaddr.is_none() {
            return syscall_error(Errno::EDESTADDRREQ, syscall, "no destination and no default peer");
        }
        if buf.is_empty() {
            return 0;
        }

        let mut buf = buf;
        if entry.is_nonblocking() || flags & MSG_DONTWAIT != 0 {
            match self.ready_now(entry, Interest::Write, syscall) {
                Err(e) => return e,
                Ok(None) => return syscall_error(Errno::EAGAIN, syscall, "there is no room to send right now, try again later"),
                // a stream takes what fits, write only that so the call cannot suspend
                Ok(Some(room)) if room > 0 && is_stream(sockdesc) => {
                    let room = room.min(buf.len() as u64) as usize;
                    buf = &buf[..room];
                }
                Ok(Some(_)) => {}
            }
        }

        let handle = sockdesc.handle.handle();
        let sent = match self.substrate().socket_send(handle, buf, dest) {
            Ok(sent) => sent,
            Err(e) => return substrate_error(e, syscall),
        };
        // a datagram sent from an unbound socket picks up an address on the way
        if !is_stream(sockdesc) {
            let mut state = sockdesc.state.write();
            if state.localaddr.is_none() {
                state.localaddr = self.substrate().socket_local_addr(handle).ok();
            }
        }
        sent as i32
    }

    /// ## ------------------SOCKET SYSCALL------------------
    /// ### Description
    ///
    /// Creates a substrate socket and binds it to the lowest free descriptor.
    /// The descriptor number is claimed first, so a full table fails before
    /// any substrate resource exists.
    ///
    /// ### Function Arguments
    ///
    /// * `domain` - AF_INET, AF_INET6 or AF_UNIX
    /// * `socktype` - SOCK_STREAM or SOCK_DGRAM, optionally or'ed with
    ///   SOCK_NONBLOCK and SOCK_CLOEXEC
    /// * `protocol` - 0, or IPPROTO_TCP for streams and IPPROTO_UDP for
    ///   datagrams on the internet families
    ///
    /// ### Errors
    ///
    /// * EAFNOSUPPORT - unknown domain
    /// * EINVAL - unknown type or modifier
    /// * EPROTONOSUPPORT - protocol does not match the type
    /// * EMFILE / ENFILE - no room in the table or the substrate
    ///
    /// [socket(2)](https://man7.org/linux/man-pages/man2/socket.2.html)
    pub fn socket_syscall(&self, domain: i32, socktype: i32, protocol: i32) -> i32 {
        let family = match family_of(domain) {
            Some(family) => family,
            None => return syscall_error(Errno::EAFNOSUPPORT, "socket", "The address family is not supported"),
        };
        if socktype & !(SOCK_TYPEMASK | SOCK_NONBLOCK | SOCK_CLOEXEC) != 0 {
            return syscall_error(Errno::EINVAL, "socket", "unknown socket type modifiers");
        }
        let real_socktype = socktype & SOCK_TYPEMASK;
        let (kind, inet_protocol) = match real_socktype {
            SOCK_STREAM => (SocketType::Stream, IPPROTO_TCP),
            SOCK_DGRAM => (SocketType::Datagram, IPPROTO_UDP),
            _ => return syscall_error(Errno::EINVAL, "socket", "trying to use an unimplemented socket type"),
        };
        let protocol = match (family, protocol) {
            (AddressFamily::Unix, 0) => 0,
            (AddressFamily::Unix, _) => {
                return syscall_error(Errno::EPROTONOSUPPORT, "socket", "unix sockets take no protocol")
            }
            (_, 0) => inet_protocol,
            (_, p) if p == inet_protocol => p,
            _ => return syscall_error(Errno::EPROTONOSUPPORT, "socket", "The protocol does not match the socket type"),
        };
        let mut flags = O_RDWR;
        if socktype & SOCK_NONBLOCK != 0 {
            flags |= O_NONBLOCK;
        }
        if socktype & SOCK_CLOEXEC != 0 {
            flags |= O_CLOEXEC;
        }

        if !self.fdtable.has_free(STARTINGFD) {
            return syscall_error(Errno::EMFILE, "socket", "no available file descriptor number could be found");
        }
        let handle = match self.substrate().socket_create(family, kind) {
            Ok(handle) => handle,
            Err(e) => return substrate_error(e, "socket"),
        };
        let sockdesc = SocketDesc {
            handle: self.own(handle),
            domain: domain,
            socktype: real_socktype,
            protocol: protocol,
            state: interface::RustRfc::new(interface::RustLock::new(SocketState::default())),
            flags: flags,
            rights: Rights::socket(),
        };
        match self.fdtable.allocate(Socket(sockdesc), STARTINGFD) {
            Ok(fd) => fd,
            Err(e) => syscall_error(e, "socket", "no available file descriptor number could be found"),
        }
    }

    /// ## ------------------BIND SYSCALL------------------
    /// ### Description
    ///
    /// Assigns a local address. A zero port asks the substrate for an
    /// ephemeral one; getsockname reports what was picked.
    ///
    /// ### Errors
    ///
    /// * EBADF / ENOTSOCK - `fd` is not an open socket
    /// * EINVAL - the address family differs from the socket's, or the socket
    ///   is already bound
    /// * EADDRINUSE - another socket holds the address
    /// * EADDRNOTAVAIL - the address is not local
    ///
    /// [bind(2)](https://man7.org/linux/man-pages/man2/bind.2.html)
    pub fn bind_syscall(&self, fd: i32, localaddr: &GenSockaddr) -> i32 {
        let entry = match self.get_entry(fd, "bind") {
            Ok(entry) => entry,
            Err(e) => return e,
        };
        let sockdesc = match as_socket(&entry, "bind") {
            Ok(sockdesc) => sockdesc,
            Err(e) => return e,
        };
        if Some(localaddr.address_family()) != family_of(sockdesc.domain) {
            return syscall_error(Errno::EINVAL, "bind", "An address with an invalid family for the given domain was specified");
        }
        if sockdesc.state.read().localaddr.is_some() {
            return syscall_error(Errno::EINVAL, "bind", "The socket is already bound to an address");
        }

        let handle = sockdesc.handle.handle();
        if let Err(e) = self.substrate().socket_bind(handle, &localaddr.to_endpoint()) {
            return substrate_error(e, "bind");
        }
        sockdesc.state.write().localaddr = self.substrate().socket_local_addr(handle).ok();
        0
    }

    /// ## ------------------CONNECT SYSCALL------------------
    /// ### Description
    ///
    /// Streams are connected to a listener. Datagram sockets only record the
    /// default peer used by send and the sender filter of recv.
    ///
    /// ### Errors
    ///
    /// * EAFNOSUPPORT - the address family differs from the socket's
    /// * EISCONN - the stream is already connected
    /// * EINVAL - the stream is listening
    /// * ECONNREFUSED - nobody listens at the address
    /// * ENETUNREACH - the address is not reachable
    ///
    /// [connect(2)](https://man7.org/linux/man-pages/man2/connect.2.html)
    pub fn connect_syscall(&self, fd: i32, remoteaddr: &GenSockaddr) -> i32 {
        let entry = match self.get_entry(fd, "connect") {
            Ok(entry) => entry,
            Err(e) => return e,
        };
        let sockdesc = match as_socket(&entry, "connect") {
            Ok(sockdesc) => sockdesc,
            Err(e) => return e,
        };
        if Some(remoteaddr.address_family()) != family_of(sockdesc.domain) {
            return syscall_error(Errno::EAFNOSUPPORT, "connect", "An address with an invalid family for the given domain was specified");
        }
        if is_stream(sockdesc) {
            match sockdesc.state.read().state {
                ConnState::NotConnected => {}
                ConnState::Listen => return syscall_error(Errno::EINVAL, "connect", "The socket is listening"),
                _ => return syscall_error(Errno::EISCONN, "connect", "The descriptor is already connected"),
            }
        }

        let handle = sockdesc.handle.handle();
        let remote = remoteaddr.to_endpoint();
        if let Err(e) = self.substrate().socket_connect(handle, &remote) {
            let translated = substrate_error(e, "connect");
            sockdesc.state.write().errno = -translated;
            return translated;
        }

        let mut state = sockdesc.state.write();
        if is_stream(sockdesc) {
            state.state = ConnState::Connected;
        }
        state.remoteaddr = Some(remote);
        state.localaddr = self.substrate().socket_local_addr(handle).ok();
        0
    }

    /// ## ------------------LISTEN SYSCALL------------------
    ///
    /// Marks a stream socket as accepting connections, binding it to an
    /// ephemeral port first if it is unbound.
    ///
    /// ### Errors
    ///
    /// * EOPNOTSUPP - datagram sockets
    /// * EINVAL - the socket is connected
    ///
    /// [listen(2)](https://man7.org/linux/man-pages/man2/listen.2.html)
    pub fn listen_syscall(&self, fd: i32, backlog: i32) -> i32 {
        let entry = match self.get_entry(fd, "listen") {
            Ok(entry) => entry,
            Err(e) => return e,
        };
        let sockdesc = match as_socket(&entry, "listen") {
            Ok(sockdesc) => sockdesc,
            Err(e) => return e,
        };
        if !is_stream(sockdesc) {
            return syscall_error(Errno::EOPNOTSUPP, "listen", "listen not supported for datagram sockets");
        }
        match sockdesc.state.read().state {
            ConnState::NotConnected => {}
            //if it's already listening, just return 0
            ConnState::Listen => return 0,
            _ => return syscall_error(Errno::EINVAL, "listen", "The socket is already connected"),
        }

        let handle = sockdesc.handle.handle();
        if let Err(e) = self.substrate().socket_listen(handle, backlog.max(0) as u32) {
            return substrate_error(e, "listen");
        }
        let mut state = sockdesc.state.write();
        state.state = ConnState::Listen;
        state.localaddr = self.substrate().socket_local_addr(handle).ok();
        0
    }

    /// ## ------------------ACCEPT SYSCALL------------------
    ///
    /// accept4 with no flags.
    ///
    /// [accept(2)](https://man7.org/linux/man-pages/man2/accept.2.html)
    pub fn accept_syscall(&self, fd: i32, addr: Option<&mut GenSockaddr>) -> i32 {
        self.accept4_syscall(fd, addr, 0)
    }

    /// ## ------------------ACCEPT4 SYSCALL------------------
    /// ### Description
    ///
    /// Takes the next pending connection off a listening socket and binds it
    /// to the lowest free descriptor. The new descriptor is non-blocking or
    /// close-on-exec only if `flags` asks for it, whatever the listener has.
    /// The peer address is written to `addr` when given.
    ///
    /// ### Errors
    ///
    /// * EINVAL - the socket is not listening, or unknown flags
    /// * EOPNOTSUPP - datagram sockets
    /// * EAGAIN - non-blocking listener and nothing pending
    /// * EMFILE - no free descriptor for the connection, which is then dropped
    ///
    /// [accept4(2)](https://man7.org/linux/man-pages/man2/accept4.2.html)
    pub fn accept4_syscall(&self, fd: i32, addr: Option<&mut GenSockaddr>, flags: i32) -> i32 {
        if flags & !(SOCK_NONBLOCK | SOCK_CLOEXEC) != 0 {
            return syscall_error(Errno::EINVAL, "accept", "invalid flags");
        }
        let entry = match self.get_entry(fd, "accept") {
            Ok(entry) => entry,
            Err(e) => return e,
        };
        let sockdesc = match as_socket(&entry, "accept") {
            Ok(sockdesc) => sockdesc,
            Err(e) => return e,
        };
        if !is_stream(sockdesc) {
            return syscall_error(Errno::EOPNOTSUPP, "accept", "accept not supported for datagram sockets");
        }
        if sockdesc.state.read().state != ConnState::Listen {
            return syscall_error(Errno::EINVAL, "accept", "Socket must be listening before accept is called");
        }

        if entry.is_nonblocking() {
            match self.ready_now(&entry, Interest::Read, "accept") {
                Err(e) => return e,
                Ok(None) => return syscall_error(Errno::EAGAIN, "accept", "host system accept call failed"),
                Ok(Some(_)) => {}
            }
        }

        // the substrate may block here, no slot is held yet
        let (newhandle, peer) = match self.substrate().socket_accept(sockdesc.handle.handle()) {
            Ok(accepted) => accepted,
            Err(e) => return substrate_error(e, "accept"),
        };
        let owned = self.own(newhandle);
        let state = SocketState {
            state: ConnState::Connected,
            localaddr: self.substrate().socket_local_addr(newhandle).ok(),
            remoteaddr: Some(peer.clone()),
            ..SocketState::default()
        };
        let mut newflags = O_RDWR;
        if flags & SOCK_NONBLOCK != 0 {
            newflags |= O_NONBLOCK;
        }
        if flags & SOCK_CLOEXEC != 0 {
            newflags |= O_CLOEXEC;
        }
        let newsock = SocketDesc {
            handle: owned,
            domain: sockdesc.domain,
            socktype: sockdesc.socktype,
            protocol: sockdesc.protocol,
            state: interface::RustRfc::new(interface::RustLock::new(state)),
            flags: newflags,
            rights: entry.rights() - Rights::SOCK_ACCEPT,
        };

        let newfd = match self.fdtable.allocate(Socket(newsock), STARTINGFD) {
            Ok(newfd) => newfd,
            Err(e) => return syscall_error(e, "accept", "no available file descriptor number could be found"),
        };
        if let Some(addr) = addr {
            *addr = GenSockaddr::from(&peer);
        }
        newfd
    }

    /// ## ------------------SEND SYSCALL------------------
    ///
    /// Sends on a connected stream, or to the default peer of a datagram
    /// socket. MSG_DONTWAIT makes this one call non-blocking.
    ///
    /// ### Errors
    ///
    /// * ENOTCONN - the stream is not connected
    /// * EPIPE - the write side was shut down or the peer is gone
    /// * EDESTADDRREQ - datagram socket with no default peer
    /// * EAGAIN - non-blocking and no room
    ///
    /// [send(2)](https://man7.org/linux/man-pages/man2/send.2.html)
    pub fn send_syscall(&self, fd: i32, buf: &[u8], flags: i32) -> i32 {
        let entry = match self.get_entry(fd, "send") {
            Ok(entry) => entry,
            Err(e) => return e,
        };
        self.send_entry(&entry, buf, flags, None, "send")
    }

    /// ## ------------------SENDTO SYSCALL------------------
    ///
    /// send with an explicit destination. On a stream socket the destination
    /// is an error: EISCONN when connected, ENOTCONN when not.
    ///
    /// [sendto(2)](https://man7.org/linux/man-pages/man2/sendto.2.html)
    pub fn sendto_syscall(&self, fd: i32, buf: &[u8], flags: i32, dest_addr: &GenSockaddr) -> i32 {
        let entry = match self.get_entry(fd, "sendto") {
            Ok(entry) => entry,
            Err(e) => return e,
        };
        let dest = dest_addr.to_endpoint();
        self.send_entry(&entry, buf, flags, Some(&dest), "sendto")
    }

    /// ## ------------------RECV SYSCALL------------------
    ///
    /// Receives from a connected stream or a datagram socket. MSG_PEEK
    /// leaves the data queued; MSG_DONTWAIT makes this one call non-blocking.
    /// Returns 0 once the peer has shut down its side and everything sent
    /// has been read.
    ///
    /// [recv(2)](https://man7.org/linux/man-pages/man2/recv.2.html)
    pub fn recv_syscall(&self, fd: i32, buf: &mut [u8], flags: i32) -> i32 {
        self.recvfrom_syscall(fd, buf, flags, None)
    }

    /// ## ------------------RECVFROM SYSCALL------------------
    ///
    /// recv that also reports the sender in `addr`, when the substrate knows
    /// it.
    ///
    /// [recvfrom(2)](https://man7.org/linux/man-pages/man2/recvfrom.2.html)
    pub fn recvfrom_syscall(&self, fd: i32, buf: &mut [u8], flags: i32, addr: Option<&mut GenSockaddr>) -> i32 {
        let entry = match self.get_entry(fd, "recvfrom") {
            Ok(entry) => entry,
            Err(e) => return e,
        };
        let len = buf.len().min(i32::MAX as usize);
        match self.recv_entry(&entry, &mut buf[..len], flags, "recvfrom") {
            Ok((count, source)) => {
                if let (Some(addr), Some(source)) = (addr, source) {
                    *addr = GenSockaddr::from(&source);
                }
                count as i32
            }
            Err(e) => e,
        }
    }

    /// ## ------------------SHUTDOWN SYSCALL------------------
    /// ### Description
    ///
    /// Shuts down one or both directions of a connection. The peer reads end
    /// of stream once the write side is shut.
    ///
    /// ### Errors
    ///
    /// * EINVAL - `how` is not SHUT_RD, SHUT_WR or SHUT_RDWR
    /// * ENOTCONN - the stream is not connected
    ///
    /// [shutdown(2)](https://man7.org/linux/man-pages/man2/shutdown.2.html)
    pub fn shutdown_syscall(&self, fd: i32, how: i32) -> i32 {
        let direction = match how {
            SHUT_RD => Shutdown::Read,
            SHUT_WR => Shutdown::Write,
            SHUT_RDWR => Shutdown::Both,
            _ => return syscall_error(Errno::EINVAL, "shutdown", "the shutdown how argument passed is not supported"),
        };
        let entry = match self.get_entry(fd, "shutdown") {
            Ok(entry) => entry,
            Err(e) => return e,
        };
        let sockdesc = match as_socket(&entry, "shutdown") {
            Ok(sockdesc) => sockdesc,
            Err(e) => return e,
        };
        if let Err(e) = entry.require(Rights::SOCK_SHUTDOWN) {
            return syscall_error(e, "shutdown", "socket lacks the shutdown right");
        }
        if is_stream(sockdesc) {
            if let ConnState::NotConnected | ConnState::Listen = sockdesc.state.read().state {
                return syscall_error(Errno::ENOTCONN, "shutdown", "The descriptor is not connected");
            }
        }

        if let Err(e) = self.substrate().socket_shutdown(sockdesc.handle.handle(), direction) {
            return substrate_error(e, "shutdown");
        }
        if is_stream(sockdesc) {
            let mut state = sockdesc.state.write();
            state.state = match (state.state, direction) {
                (_, Shutdown::Both) => ConnState::ConnShut,
                (ConnState::Connected, Shutdown::Read) => ConnState::ConnWrOnly,
                (ConnState::Connected, Shutdown::Write) => ConnState::ConnRdOnly,
                (ConnState::ConnRdOnly, Shutdown::Read) | (ConnState::ConnWrOnly, Shutdown::Write) => {
                    ConnState::ConnShut
                }
                (unchanged, _) => unchanged,
            };
        }
        0
    }

    /// ## ------------------GETSOCKOPT SYSCALL------------------
    /// ### Description
    ///
    /// Reads one socket option into `optval`.
    ///
    /// SOL_SOCKET: SO_TYPE, SO_DOMAIN, SO_PROTOCOL, SO_ERROR (which is
    /// cleared by reading it), SO_ACCEPTCONN, SO_REUSEADDR, SO_KEEPALIVE,
    /// SO_BROADCAST, SO_SNDBUF, SO_RCVBUF and SO_LINGER, of which only the
    /// on/off flag is kept. IPPROTO_TCP: TCP_NODELAY on stream sockets.
    ///
    /// ### Errors
    ///
    /// * ENOPROTOOPT - unknown level or option
    ///
    /// [getsockopt(2)](https://man7.org/linux/man-pages/man2/getsockopt.2.html)
    pub fn getsockopt_syscall(&self, fd: i32, level: i32, optname: i32, optval: &mut i32) -> i32 {
        let entry = match self.get_entry(fd, "getsockopt") {
            Ok(entry) => entry,
            Err(e) => return e,
        };
        let sockdesc = match as_socket(&entry, "getsockopt") {
            Ok(sockdesc) => sockdesc,
            Err(e) => return e,
        };

        let value = match level {
            SOL_SOCKET => match optname {
                SO_TYPE => sockdesc.socktype,
                SO_DOMAIN => sockdesc.domain,
                SO_PROTOCOL => sockdesc.protocol,
                SO_ERROR => std::mem::take(&mut sockdesc.state.write().errno),
                SO_ACCEPTCONN => (sockdesc.state.read().state == ConnState::Listen) as i32,
                SO_SNDBUF => sockdesc.state.read().sndbuf,
                SO_RCVBUF => sockdesc.state.read().rcvbuf,
                name if sol_flag_option(name) => (sockdesc.state.read().options & (1 << name) != 0) as i32,
                _ => return syscall_error(Errno::ENOPROTOOPT, "getsockopt", "unknown socket option"),
            },
            IPPROTO_TCP if is_stream(sockdesc) => match optname {
                TCP_NODELAY => (sockdesc.state.read().tcpoptions & (1 << optname) != 0) as i32,
                _ => return syscall_error(Errno::ENOPROTOOPT, "getsockopt", "unknown tcp option"),
            },
            _ => return syscall_error(Errno::ENOPROTOOPT, "getsockopt", "unknown option level"),
        };
        *optval = value;
        0
    }

    /// ## ------------------SETSOCKOPT SYSCALL------------------
    /// ### Description
    ///
    /// Sets one socket option. The substrate is told about the options it has
    /// a primitive for; one that does not support them leaves the value
    /// recorded on the socket only. Buffer sizes are doubled and floored the
    /// way Linux reports them back.
    ///
    /// ### Errors
    ///
    /// * ENOPROTOOPT - unknown option, or a read-only one such as SO_TYPE
    ///
    /// [setsockopt(2)](https://man7.org/linux/man-pages/man2/setsockopt.2.html)
    pub fn setsockopt_syscall(&self, fd: i32, level: i32, optname: i32, optval: i32) -> i32 {
        let entry = match self.get_entry(fd, "setsockopt") {
            Ok(entry) => entry,
            Err(e) => return e,
        };
        let sockdesc = match as_socket(&entry, "setsockopt") {
            Ok(sockdesc) => sockdesc,
            Err(e) => return e,
        };

        let substrate_option = match (level, optname) {
            (SOL_SOCKET, SO_REUSEADDR) => Some(SocketOption::ReuseAddr),
            (SOL_SOCKET, SO_KEEPALIVE) => Some(SocketOption::KeepAlive),
            (SOL_SOCKET, SO_BROADCAST) => Some(SocketOption::Broadcast),
            (SOL_SOCKET, SO_SNDBUF) => Some(SocketOption::SendBufferSize),
            (SOL_SOCKET, SO_RCVBUF) => Some(SocketOption::RecvBufferSize),
            (SOL_SOCKET, SO_LINGER) => None,
            (SOL_SOCKET, SO_TYPE | SO_DOMAIN | SO_PROTOCOL | SO_ERROR | SO_ACCEPTCONN) => {
                return syscall_error(Errno::ENOPROTOOPT, "setsockopt", "option is read only");
            }
            (IPPROTO_TCP, TCP_NODELAY) if is_stream(sockdesc) => Some(SocketOption::NoDelay),
            _ => return syscall_error(Errno::ENOPROTOOPT, "setsockopt", "unknown socket option"),
        };

        let bufsize = optval.max(0).saturating_mul(2).max(MIN_SOCKBUF);
        if let Some(option) = substrate_option {
            let raw = match option {
                SocketOption::SendBufferSize | SocketOption::RecvBufferSize => bufsize as u64,
                _ => (optval != 0) as u64,
            };
            match self.substrate().socket_set_option(sockdesc.handle.handle(), option, raw) {
                Ok(()) | Err(SubstrateError::NotSup) => {}
                Err(e) => return substrate_error(e, "setsockopt"),
            }
        }

        let mut state = sockdesc.state.write();
        match (level, optname) {
            (SOL_SOCKET, SO_SNDBUF) => state.sndbuf = bufsize,
            (SOL_SOCKET, SO_RCVBUF) => state.rcvbuf = bufsize,
            (SOL_SOCKET, name) => {
                if optval != 0 {
                    state.options |= 1 << name;
                } else {
                    state.options &= !(1 << name);
                }
            }
            (_, name) => {
                if optval != 0 {
                    state.tcpoptions |= 1 << name;
                } else {
                    state.tcpoptions &= !(1 << name);
                }
            }
        }
        0
    }

    /// ## ------------------GETSOCKNAME SYSCALL------------------
    ///
    /// The socket's local address. An unbound socket reports its family's
    /// unspecified address with port 0.
    ///
    /// [getsockname(2)](https://man7.org/linux/man-pages/man2/getsockname.2.html)
    pub fn getsockname_syscall(&self, fd: i32, ret_addr: &mut GenSockaddr) -> i32 {
        let entry = match self.get_entry(fd, "getsockname") {
            Ok(entry) => entry,
            Err(e) => return e,
        };
        let sockdesc = match as_socket(&entry, "getsockname") {
            Ok(sockdesc) => sockdesc,
            Err(e) => return e,
        };
        let family = match family_of(sockdesc.domain) {
            Some(family) => family,
            None => return syscall_error(Errno::EAFNOSUPPORT, "getsockname", "unknown socket domain"),
        };

        let cached = sockdesc.state.read().localaddr.clone();
        let local = match cached {
            Some(local) => local,
            None => self
                .substrate()
                .socket_local_addr(sockdesc.handle.handle())
                .unwrap_or_else(|_| Endpoint::unspecified(family)),
        };
        *ret_addr = GenSockaddr::from(&local);
        0
    }

    /// ## ------------------GETPEERNAME SYSCALL------------------
    ///
    /// The connected peer's address.
    ///
    /// ### Errors
    ///
    /// * ENOTCONN - the socket is not connected
    ///
    /// [getpeername(2)](https://man7.org/linux/man-pages/man2/getpeername.2.html)
    pub fn getpeername_syscall(&self, fd: i32, ret_addr: &mut GenSockaddr) -> i32 {
        let entry = match self.get_entry(fd, "getpeername") {
            Ok(entry) => entry,
            Err(e) => return e,
        };
        let sockdesc = match as_socket(&entry, "getpeername") {
            Ok(sockdesc) => sockdesc,
            Err(e) => return e,
        };
        let state = sockdesc.state.read();
        if is_stream(sockdesc) && matches!(state.state, ConnState::NotConnected | ConnState::Listen) {
            return syscall_error(Errno::ENOTCONN, "getpeername", "the socket is not connected");
        }
        match &state.remoteaddr {
            Some(remote) => {
                *ret_addr = GenSockaddr::from(remote);
                0
            }
            None => syscall_error(Errno::ENOTCONN, "getpeername", "the socket is not connected"),
        }
    }
}
