#[cfg(test)]
pub mod net_tests {
    use super::super::*;
    use crate::interface::errnos::Errno;
    use crate::interface::substrate::Endpoint;
    use crate::interface::{new_sockaddr_unix, GenSockaddr, EPHEMERAL_PORT_START};
    use crate::safeposix::process::Process;
    use crate::safeposix::syscalls::fs_constants::*;
    use crate::safeposix::syscalls::net_constants::*;

    fn inet(addr: [u8; 4], port: u16) -> GenSockaddr {
        GenSockaddr::from(&Endpoint::V4 { addr: addr, port: port })
    }

    fn loopback(port: u16) -> GenSockaddr {
        inet([127, 0, 0, 1], port)
    }

    fn unspecified() -> GenSockaddr {
        inet([0, 0, 0, 0], 0)
    }

    // a listening server, a connected client and the accepted end
    fn connected_pair(process: &Process, port: u16) -> (i32, i32, i32) {
        let server = process.socket_syscall(AF_INET, SOCK_STREAM, 0);
        assert!(server >= 0);
        assert_eq!(process.bind_syscall(server, &loopback(port)), 0);
        assert_eq!(process.listen_syscall(server, 10), 0);

        let client = process.socket_syscall(AF_INET, SOCK_STREAM, 0);
        assert_eq!(process.connect_syscall(client, &loopback(port)), 0);
        let accepted = process.accept_syscall(server, None);
        assert!(accepted >= 0);
        (server, client, accepted)
    }

    #[test]
    pub fn ut_capposix_net_socket_arguments() {
        let (_sub, process) = setup();

        assert_eq!(process.socket_syscall(99, SOCK_STREAM, 0), -(Errno::EAFNOSUPPORT as i32));
        assert_eq!(process.socket_syscall(AF_INET, SOCK_RAW, 0), -(Errno::EINVAL as i32));
        assert_eq!(process.socket_syscall(AF_INET, SOCK_STREAM | 0o100, 0), -(Errno::EINVAL as i32));
        assert_eq!(process.socket_syscall(AF_INET, SOCK_STREAM, IPPROTO_UDP), -(Errno::EPROTONOSUPPORT as i32));
        assert_eq!(process.socket_syscall(AF_UNIX, SOCK_STREAM, IPPROTO_TCP), -(Errno::EPROTONOSUPPORT as i32));

        let fd = process.socket_syscall(AF_INET, SOCK_DGRAM | SOCK_NONBLOCK | SOCK_CLOEXEC, 0);
        assert_eq!(fd, 3);
        assert_eq!(process.fcntl_syscall(fd, F_GETFL, 0), O_RDWR | O_NONBLOCK);
        assert_eq!(process.fcntl_syscall(fd, F_GETFD, 0), FD_CLOEXEC);

        let mut optval = 0;
        assert_eq!(process.getsockopt_syscall(fd, SOL_SOCKET, SO_TYPE, &mut optval), 0);
        assert_eq!(optval, SOCK_DGRAM);
        assert_eq!(process.getsockopt_syscall(fd, SOL_SOCKET, SO_DOMAIN, &mut optval), 0);
        assert_eq!(optval, AF_INET);
        assert_eq!(process.getsockopt_syscall(fd, SOL_SOCKET, SO_PROTOCOL, &mut optval), 0);
        assert_eq!(optval, IPPROTO_UDP);

        let tcp = process.socket_syscall(AF_INET6, SOCK_STREAM, IPPROTO_TCP);
        assert_eq!(process.getsockopt_syscall(tcp, SOL_SOCKET, SO_PROTOCOL, &mut optval), 0);
        assert_eq!(optval, IPPROTO_TCP);
    }

    #[test]
    pub fn ut_capposix_net_tcp_round_trip() {
        let (_sub, process) = setup();

        let server = process.socket_syscall(AF_INET, SOCK_STREAM, 0);
        assert_eq!(process.bind_syscall(server, &loopback(8080)), 0);
        assert_eq!(process.listen_syscall(server, 4), 0);
        let mut optval = 0;
        assert_eq!(process.getsockopt_syscall(server, SOL_SOCKET, SO_ACCEPTCONN, &mut optval), 0);
        assert_eq!(optval, 1);

        let client = process.socket_syscall(AF_INET, SOCK_STREAM, 0);
        assert_eq!(process.connect_syscall(client, &loopback(8080)), 0);

        let mut peer = unspecified();
        let accepted = process.accept_syscall(server, Some(&mut peer));
        assert!(accepted >= 0);

        let mut clientname = unspecified();
        assert_eq!(process.getsockname_syscall(client, &mut clientname), 0);
        assert_eq!(clientname, peer);
        assert!(clientname.port() >= EPHEMERAL_PORT_START);

        let mut serverpeer = unspecified();
        assert_eq!(process.getpeername_syscall(client, &mut serverpeer), 0);
        assert_eq!(serverpeer, loopback(8080));

        assert_eq!(process.send_syscall(client, b"ping", 0), 4);
        let mut buf = [0u8; 16];
        assert_eq!(process.recv_syscall(accepted, &mut buf, 0), 4);
        assert_eq!(&buf[..4], b"ping");

        // read and write on a socket are recv and send
        assert_eq!(process.write_syscall(accepted, b"pong"), 4);
        assert_eq!(process.read_syscall(client, &mut buf), 4);
        assert_eq!(&buf[..4], b"pong");

        assert_eq!(process.close_syscall(client), 0);
        assert_eq!(process.recv_syscall(accepted, &mut buf, 0), 0);
    }

    #[test]
    pub fn ut_capposix_net_bind_errors() {
        let (_sub, process) = setup();

        let first = process.socket_syscall(AF_INET, SOCK_STREAM, 0);
        assert_eq!(process.bind_syscall(first, &loopback(9000)), 0);
        assert_eq!(process.bind_syscall(first, &loopback(9001)), -(Errno::EINVAL as i32));

        let second = process.socket_syscall(AF_INET, SOCK_STREAM, 0);
        assert_eq!(process.bind_syscall(second, &loopback(9000)), -(Errno::EADDRINUSE as i32));
        assert_eq!(process.bind_syscall(second, &unspecified()), 0);

        let third = process.socket_syscall(AF_INET, SOCK_STREAM, 0);
        assert_eq!(
            process.bind_syscall(third, &inet([10, 0, 0, 1], 9002)),
            -(Errno::EADDRNOTAVAIL as i32)
        );
        let unixaddr = GenSockaddr::Unix(new_sockaddr_unix(b"/tmp/wrong").unwrap());
        assert_eq!(process.bind_syscall(third, &unixaddr), -(Errno::EINVAL as i32));

        // a datagram socket may share a stream socket's port
        let udp = process.socket_syscall(AF_INET, SOCK_DGRAM, 0);
        assert_eq!(process.bind_syscall(udp, &loopback(9000)), 0);

        let file = process.open_syscall("/plain", O_CREAT | O_RDWR, S_IRWXA);
        assert_eq!(process.bind_syscall(file, &loopback(9003)), -(Errno::ENOTSOCK as i32));
        assert_eq!(process.bind_syscall(77, &loopback(9003)), -(Errno::EBADF as i32));
    }

    #[test]
    pub fn ut_capposix_net_reuseaddr() {
        let (_sub, process) = setup();

        let first = process.socket_syscall(AF_INET, SOCK_DGRAM, 0);
        let second = process.socket_syscall(AF_INET, SOCK_DGRAM, 0);
        for fd in [first, second] {
            assert_eq!(process.setsockopt_syscall(fd, SOL_SOCKET, SO_REUSEADDR, 1), 0);
        }
        let mut optval = 0;
        assert_eq!(process.getsockopt_syscall(first, SOL_SOCKET, SO_REUSEADDR, &mut optval), 0);
        assert_eq!(optval, 1);

        assert_eq!(process.bind_syscall(first, &loopback(7000)), 0);
        assert_eq!(process.bind_syscall(second, &loopback(7000)), 0);
    }

    #[test]
    pub fn ut_capposix_net_connect_errors() {
        let (_sub, process) = setup();

        let client = process.socket_syscall(AF_INET, SOCK_STREAM, 0);
        assert_eq!(process.connect_syscall(client, &loopback(6000)), -(Errno::ECONNREFUSED as i32));

        // the failure is kept for SO_ERROR, and reading it clears it
        let mut optval = 0;
        assert_eq!(process.getsockopt_syscall(client, SOL_SOCKET, SO_ERROR, &mut optval), 0);
        assert_eq!(optval, Errno::ECONNREFUSED as i32);
        assert_eq!(process.getsockopt_syscall(client, SOL_SOCKET, SO_ERROR, &mut optval), 0);
        assert_eq!(optval, 0);

        assert_eq!(
            process.connect_syscall(client, &inet([10, 1, 2, 3], 6000)),
            -(Errno::ENETUNREACH as i32)
        );
        let unixaddr = GenSockaddr::Unix(new_sockaddr_unix(b"/tmp/x").unwrap());
        assert_eq!(process.connect_syscall(client, &unixaddr), -(Errno::EAFNOSUPPORT as i32));

        let (server, connected, _accepted) = connected_pair(&process, 6001);
        assert_eq!(process.connect_syscall(connected, &loopback(6001)), -(Errno::EISCONN as i32));
        assert_eq!(process.connect_syscall(server, &loopback(6001)), -(Errno::EINVAL as i32));
    }

    #[test]
    pub fn ut_capposix_net_listen_and_accept() {
        let (_sub, process) = setup();

        let udp = process.socket_syscall(AF_INET, SOCK_DGRAM, 0);
        assert_eq!(process.listen_syscall(udp, 5), -(Errno::EOPNOTSUPP as i32));
        assert_eq!(process.accept_syscall(udp, None), -(Errno::EOPNOTSUPP as i32));

        let server = process.socket_syscall(AF_INET, SOCK_STREAM, 0);
        assert_eq!(process.accept_syscall(server, None), -(Errno::EINVAL as i32));

        // listening unbound picks an ephemeral port
        assert_eq!(process.listen_syscall(server, 5), 0);
        assert_eq!(process.listen_syscall(server, 5), 0);
        let mut name = unspecified();
        assert_eq!(process.getsockname_syscall(server, &mut name), 0);
        assert!(name.port() >= EPHEMERAL_PORT_START);

        assert_eq!(process.fcntl_syscall(server, F_SETFL, O_NONBLOCK), 0);
        assert_eq!(process.accept_syscall(server, None), -(Errno::EAGAIN as i32));
        assert_eq!(process.accept4_syscall(server, None, O_APPEND), -(Errno::EINVAL as i32));

        let client = process.socket_syscall(AF_INET, SOCK_STREAM, 0);
        assert_eq!(process.connect_syscall(client, &loopback(name.port())), 0);

        // the accepted socket does not inherit the listener's O_NONBLOCK
        let accepted = process.accept_syscall(server, None);
        assert!(accepted >= 0);
        assert_eq!(process.fcntl_syscall(accepted, F_GETFL, 0), O_RDWR);
        let mut optval = 0;
        assert_eq!(process.getsockopt_syscall(accepted, SOL_SOCKET, SO_ACCEPTCONN, &mut optval), 0);
        assert_eq!(optval, 0);

        let client2 = process.socket_syscall(AF_INET, SOCK_STREAM, 0);
        assert_eq!(process.connect_syscall(client2, &loopback(name.port())), 0);
        let accepted2 = process.accept4_syscall(server, None, SOCK_NONBLOCK | SOCK_CLOEXEC);
        assert!(accepted2 >= 0);
        assert_eq!(process.fcntl_syscall(accepted2, F_GETFL, 0), O_RDWR | O_NONBLOCK);
        assert_eq!(process.fcntl_syscall(accepted2, F_GETFD, 0), FD_CLOEXEC);

        assert_eq!(process.listen_syscall(accepted2, 5), -(Errno::EINVAL as i32));
    }

    #[test]
    pub fn ut_capposix_net_send_recv_errors() {
        let (_sub, process) = setup();

        let lonely = process.socket_syscall(AF_INET, SOCK_STREAM, 0);
        let mut buf = [0u8; 8];
        assert_eq!(process.recv_syscall(lonely, &mut buf, 0), -(Errno::ENOTCONN as i32));
        assert_eq!(process.send_syscall(lonely, b"x", 0), -(Errno::ENOTCONN as i32));
        assert_eq!(process.sendto_syscall(lonely, b"x", 0, &loopback(1)), -(Errno::ENOTCONN as i32));

        let (_server, client, accepted) = connected_pair(&process, 5500);
        assert_eq!(process.sendto_syscall(client, b"x", 0, &loopback(5500)), -(Errno::EISCONN as i32));
        assert_eq!(process.send_syscall(client, b"x", MSG_OOB), -(Errno::EOPNOTSUPP as i32));
        assert_eq!(process.recv_syscall(accepted, &mut buf, MSG_DONTWAIT), -(Errno::EAGAIN as i32));

        // MSG_PEEK leaves the data for the next recv
        assert_eq!(process.send_syscall(client, b"peekaboo", 0), 8);
        assert_eq!(process.recv_syscall(accepted, &mut buf, MSG_PEEK), 8);
        assert_eq!(&buf, b"peekaboo");
        let mut again = [0u8; 8];
        assert_eq!(process.recv_syscall(accepted, &mut again, 0), 8);
        assert_eq!(&again, b"peekaboo");

        assert_eq!(process.fcntl_syscall(accepted, F_SETFL, O_NONBLOCK), 0);
        assert_eq!(process.read_syscall(accepted, &mut buf), -(Errno::EAGAIN as i32));
        assert_eq!(process.recv_syscall(accepted, &mut [], 0), 0);

        assert_eq!(process.lseek_syscall(accepted, 0, SEEK_SET), -(Errno::ESPIPE as i64));
    }

    #[test]
    pub fn ut_capposix_net_shutdown() {
        let (_sub, process) = setup();

        let lonely = process.socket_syscall(AF_INET, SOCK_STREAM, 0);
        assert_eq!(process.shutdown_syscall(lonely, SHUT_RDWR), -(Errno::ENOTCONN as i32));
        assert_eq!(process.shutdown_syscall(lonely, 7), -(Errno::EINVAL as i32));

        let (_server, client, accepted) = connected_pair(&process, 5600);
        assert_eq!(process.send_syscall(client, b"bye", 0), 3);
        assert_eq!(process.shutdown_syscall(client, SHUT_WR), 0);
        assert_eq!(process.send_syscall(client, b"more", 0), -(Errno::EPIPE as i32));

        // the peer drains what was sent, then reads end of stream
        let mut buf = [0u8; 8];
        assert_eq!(process.recv_syscall(accepted, &mut buf, 0), 3);
        assert_eq!(process.recv_syscall(accepted, &mut buf, 0), 0);

        // the other direction still works
        assert_eq!(process.send_syscall(accepted, b"ack", 0), 3);
        assert_eq!(process.recv_syscall(client, &mut buf, 0), 3);
        assert_eq!(&buf[..3], b"ack");

        assert_eq!(process.shutdown_syscall(client, SHUT_RD), 0);
        assert_eq!(process.recv_syscall(client, &mut buf, 0), 0);
        assert_eq!(process.send_syscall(client, b"x", 0), -(Errno::EPIPE as i32));

        assert_eq!(process.shutdown_syscall(accepted, SHUT_RDWR), 0);
        assert_eq!(process.recv_syscall(accepted, &mut buf, 0), 0);
        assert_eq!(process.send_syscall(accepted, b"x", 0), -(Errno::EPIPE as i32));
    }

    #[test]
    pub fn ut_capposix_net_udp() {
        let (_sub, process) = setup();

        let receiver = process.socket_syscall(AF_INET, SOCK_DGRAM, 0);
        assert_eq!(process.bind_syscall(receiver, &loopback(5000)), 0);
        let sender = process.socket_syscall(AF_INET, SOCK_DGRAM, 0);
        assert_eq!(process.bind_syscall(sender, &loopback(5001)), 0);

        assert_eq!(process.send_syscall(sender, b"x", 0), -(Errno::EDESTADDRREQ as i32));
        assert_eq!(process.sendto_syscall(sender, b"hello", 0, &loopback(5000)), 5);

        let mut buf = [0u8; 32];
        let mut source = unspecified();
        assert_eq!(process.recvfrom_syscall(receiver, &mut buf, 0, Some(&mut source)), 5);
        assert_eq!(&buf[..5], b"hello");
        assert_eq!(source, loopback(5001));
        assert_eq!(process.recv_syscall(receiver, &mut buf, MSG_DONTWAIT), -(Errno::EAGAIN as i32));

        // an unbound sender is given an address on its first datagram
        let anonymous = process.socket_syscall(AF_INET, SOCK_DGRAM, 0);
        assert_eq!(process.sendto_syscall(anonymous, b"who", 0, &loopback(5000)), 3);
        let mut name = unspecified();
        assert_eq!(process.getsockname_syscall(anonymous, &mut name), 0);
        assert!(name.port() >= EPHEMERAL_PORT_START);
        assert_eq!(process.recvfrom_syscall(receiver, &mut buf, 0, Some(&mut source)), 3);
        assert_eq!(source.port(), name.port());

        // connect sets the default peer
        assert_eq!(process.connect_syscall(anonymous, &loopback(5000)), 0);
        assert_eq!(process.send_syscall(anonymous, b"again", 0), 5);
        let mut peer = unspecified();
        assert_eq!(process.getpeername_syscall(anonymous, &mut peer), 0);
        assert_eq!(peer, loopback(5000));
        // a datagram longer than the buffer is cut short
        let mut small = [0u8; 2];
        assert_eq!(process.recv_syscall(receiver, &mut small, 0), 2);
        assert_eq!(&small, b"ag");
        assert_eq!(process.recv_syscall(receiver, &mut buf, MSG_DONTWAIT), -(Errno::EAGAIN as i32));

        let mut optval = 0;
        assert_eq!(process.setsockopt_syscall(receiver, IPPROTO_TCP, TCP_NODELAY, 1), -(Errno::ENOPROTOOPT as i32));
        assert_eq!(process.getsockopt_syscall(receiver, IPPROTO_TCP, TCP_NODELAY, &mut optval), -(Errno::ENOPROTOOPT as i32));
    }

    #[test]
    pub fn ut_capposix_net_socket_options() {
        let (_sub, process) = setup();

        let fd = process.socket_syscall(AF_INET, SOCK_STREAM, 0);
        let mut optval = 0;
        assert_eq!(process.getsockopt_syscall(fd, SOL_SOCKET, SO_SNDBUF, &mut optval), 0);
        assert_eq!(optval, DEFAULT_SNDBUF);

        assert_eq!(process.setsockopt_syscall(fd, SOL_SOCKET, SO_SNDBUF, 1000), 0);
        assert_eq!(process.getsockopt_syscall(fd, SOL_SOCKET, SO_SNDBUF, &mut optval), 0);
        assert_eq!(optval, MIN_SOCKBUF);
        assert_eq!(process.setsockopt_syscall(fd, SOL_SOCKET, SO_RCVBUF, 10000), 0);
        assert_eq!(process.getsockopt_syscall(fd, SOL_SOCKET, SO_RCVBUF, &mut optval), 0);
        assert_eq!(optval, 20000);

        assert_eq!(process.setsockopt_syscall(fd, SOL_SOCKET, SO_KEEPALIVE, 1), 0);
        assert_eq!(process.getsockopt_syscall(fd, SOL_SOCKET, SO_KEEPALIVE, &mut optval), 0);
        assert_eq!(optval, 1);
        assert_eq!(process.setsockopt_syscall(fd, SOL_SOCKET, SO_KEEPALIVE, 0), 0);
        assert_eq!(process.getsockopt_syscall(fd, SOL_SOCKET, SO_KEEPALIVE, &mut optval), 0);
        assert_eq!(optval, 0);

        assert_eq!(process.setsockopt_syscall(fd, IPPROTO_TCP, TCP_NODELAY, 1), 0);
        assert_eq!(process.getsockopt_syscall(fd, IPPROTO_TCP, TCP_NODELAY, &mut optval), 0);
        assert_eq!(optval, 1);

        assert_eq!(process.setsockopt_syscall(fd, SOL_SOCKET, SO_TYPE, 2), -(Errno::ENOPROTOOPT as i32));
        assert_eq!(process.setsockopt_syscall(fd, SOL_SOCKET, 999, 1), -(Errno::ENOPROTOOPT as i32));
        assert_eq!(process.getsockopt_syscall(fd, 77, SO_TYPE, &mut optval), -(Errno::ENOPROTOOPT as i32));

        // options live on the open socket, every duplicate sees them
        let dupfd = process.dup_syscall(fd, None);
        assert_eq!(process.getsockopt_syscall(dupfd, SOL_SOCKET, SO_RCVBUF, &mut optval), 0);
        assert_eq!(optval, 20000);

        let file = process.open_syscall("/notasocket", O_CREAT | O_RDWR, S_IRWXA);
        assert_eq!(process.getsockopt_syscall(file, SOL_SOCKET, SO_TYPE, &mut optval), -(Errno::ENOTSOCK as i32));
    }

    #[test]
    pub fn ut_capposix_net_names() {
        let (_sub, process) = setup();

        let fd = process.socket_syscall(AF_INET, SOCK_STREAM, 0);
        let mut name = loopback(1234);
        assert_eq!(process.getsockname_syscall(fd, &mut name), 0);
        assert_eq!(name, unspecified());
        assert_eq!(process.getpeername_syscall(fd, &mut name), -(Errno::ENOTCONN as i32));

        let udp = process.socket_syscall(AF_INET, SOCK_DGRAM, 0);
        assert_eq!(process.getpeername_syscall(udp, &mut name), -(Errno::ENOTCONN as i32));
    }

    #[test]
    pub fn ut_capposix_net_unix_stream() {
        let (_sub, process) = setup();

        let path = GenSockaddr::Unix(new_sockaddr_unix(b"/tmp/capposix.sock").unwrap());
        let server = process.socket_syscall(AF_UNIX, SOCK_STREAM, 0);
        assert_eq!(process.bind_syscall(server, &path), 0);
        assert_eq!(process.listen_syscall(server, 1), 0);

        let client = process.socket_syscall(AF_UNIX, SOCK_STREAM, 0);
        let missing = GenSockaddr::Unix(new_sockaddr_unix(b"/tmp/missing.sock").unwrap());
        assert_eq!(process.connect_syscall(client, &missing), -(Errno::ENOENT as i32));
        assert_eq!(process.connect_syscall(client, &path), 0);

        let accepted = process.accept_syscall(server, None);
        assert!(accepted >= 0);
        assert_eq!(process.send_syscall(accepted, b"local", 0), 5);
        let mut buf = [0u8; 5];
        assert_eq!(process.recv_syscall(client, &mut buf, 0), 5);
        assert_eq!(&buf, b"local");

        let mut peer = unspecified();
        assert_eq!(process.getpeername_syscall(client, &mut peer), 0);
        assert_eq!(peer.path(), Some("/tmp/capposix.sock"));

        // the path is not a file
        assert_eq!(process.open_syscall("/tmp/capposix.sock", O_RDONLY, 0), -(Errno::ENOENT as i32));
    }
}
