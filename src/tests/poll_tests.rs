#[cfg(test)]
pub mod poll_tests {
    use super::super::*;
    use crate::interface::errnos::Errno;
    use crate::interface::types::{FdSet, PipeArray, PollStruct};
    use crate::interface::RustDuration;
    use crate::safeposix::syscalls::fs_constants::*;
    use crate::safeposix::syscalls::net_constants::*;
    use crate::safeposix::syscalls::sys_constants::STDOUT_FILENO;

    fn pollfd(fd: i32, events: i16) -> PollStruct {
        PollStruct {
            fd: fd,
            events: events,
            revents: 0,
        }
    }

    #[test]
    pub fn ut_capposix_poll_pipe_readiness() {
        let (_sub, process) = setup();

        let mut pipefds = PipeArray::default();
        assert_eq!(process.pipe_syscall(&mut pipefds), 0);

        // an empty pipe is writable but not readable
        let mut fds = [pollfd(pipefds.readfd, POLLIN), pollfd(pipefds.writefd, POLLOUT)];
        assert_eq!(process.poll_syscall(&mut fds, 0), 1);
        assert_eq!(fds[0].revents, 0);
        assert_eq!(fds[1].revents, POLLOUT);

        assert_eq!(process.write_syscall(pipefds.writefd, b"data"), 4);
        assert_eq!(process.poll_syscall(&mut fds, 0), 2);
        assert_eq!(fds[0].revents, POLLIN);

        // the writer going away is a hangup, buffered data still reads
        assert_eq!(process.close_syscall(pipefds.writefd), 0);
        let mut fds = [pollfd(pipefds.readfd, POLLIN)];
        assert_eq!(process.poll_syscall(&mut fds, -1), 1);
        assert_eq!(fds[0].revents, POLLIN | POLLHUP);
    }

    #[test]
    pub fn ut_capposix_poll_timeout() {
        let (_sub, process) = setup();

        let mut pipefds = PipeArray::default();
        assert_eq!(process.pipe_syscall(&mut pipefds), 0);
        let mut fds = [pollfd(pipefds.readfd, POLLIN)];

        let start = interface::starttimer();
        assert_eq!(process.poll_syscall(&mut fds, 20), 0);
        assert!(interface::readtimer(start) >= RustDuration::from_millis(20));
        assert_eq!(fds[0].revents, 0);

        assert_eq!(process.poll_syscall(&mut [], 0), 0);
    }

    #[test]
    pub fn ut_capposix_poll_wakes_on_write() {
        let (_sub, process) = setup();

        let mut pipefds = PipeArray::default();
        assert_eq!(process.pipe_syscall(&mut pipefds), 0);

        std::thread::scope(|scope| {
            let process = &process;
            scope.spawn(move || {
                interface::sleep(RustDuration::from_millis(10));
                assert_eq!(process.write_syscall(pipefds.writefd, b"wake"), 4);
            });
            let mut fds = [pollfd(pipefds.readfd, POLLIN)];
            assert_eq!(process.poll_syscall(&mut fds, -1), 1);
            assert_eq!(fds[0].revents, POLLIN);
        });
    }

    #[test]
    pub fn ut_capposix_poll_invalid_and_skipped() {
        let (_sub, process) = setup();

        let mut fds = [pollfd(-1, POLLIN), pollfd(99, POLLIN), pollfd(STDOUT_FILENO, POLLOUT)];
        fds[0].revents = POLLERR;
        assert_eq!(process.poll_syscall(&mut fds, -1), 2);
        assert_eq!(fds[0].revents, 0);
        assert_eq!(fds[1].revents, POLLNVAL);
        assert_eq!(fds[2].revents, POLLOUT);
    }

    #[test]
    pub fn ut_capposix_poll_degraded_readiness_files_always_ready() {
        let (_sub, process) = setup();

        // approximation: kinds the substrate cannot poll are reported ready,
        // which is exact for regular files and optimistic for other streams

        let fd = process.open_syscall("/ready", O_CREAT | O_RDWR, S_IRWXA);
        assert_eq!(process.mkdir_syscall("/polldir", S_IRWXA), 0);
        let dirfd = process.opendir_syscall("/polldir");
        let mut fds = [pollfd(fd, POLLIN | POLLOUT), pollfd(dirfd, POLLIN)];
        assert_eq!(process.poll_syscall(&mut fds, -1), 2);
        assert_eq!(fds[0].revents, POLLIN | POLLOUT);
        assert_eq!(fds[1].revents, POLLIN);

        // no events asked about, nothing reported
        let mut fds = [pollfd(fd, 0)];
        assert_eq!(process.poll_syscall(&mut fds, 0), 0);
    }

    #[test]
    pub fn ut_capposix_poll_eventfd() {
        let (_sub, process) = setup();

        let efd = process.eventfd_syscall(0, EFD_NONBLOCK);
        let mut fds = [pollfd(efd, POLLIN | POLLOUT)];
        assert_eq!(process.poll_syscall(&mut fds, 0), 1);
        assert_eq!(fds[0].revents, POLLOUT);

        assert_eq!(process.write_syscall(efd, &3u64.to_ne_bytes()), 8);
        assert_eq!(process.poll_syscall(&mut fds, 0), 1);
        assert_eq!(fds[0].revents, POLLIN | POLLOUT);
    }

    #[test]
    pub fn ut_capposix_poll_sockets() {
        let (_sub, process) = setup();

        let server = process.socket_syscall(AF_INET, SOCK_STREAM, 0);
        assert_eq!(process.listen_syscall(server, 4), 0);
        let mut name = interface::GenSockaddr::from(&interface::Endpoint::unspecified(interface::AddressFamily::Inet));
        assert_eq!(process.getsockname_syscall(server, &mut name), 0);

        let mut fds = [pollfd(server, POLLIN)];
        assert_eq!(process.poll_syscall(&mut fds, 0), 0);

        // a pending connection makes the listener readable
        let client = process.socket_syscall(AF_INET, SOCK_STREAM, 0);
        let target = interface::GenSockaddr::from(&interface::Endpoint::V4 {
            addr: [127, 0, 0, 1],
            port: name.port(),
        });
        assert_eq!(process.connect_syscall(client, &target), 0);
        assert_eq!(process.poll_syscall(&mut fds, 0), 1);
        assert_eq!(fds[0].revents, POLLIN);

        let accepted = process.accept_syscall(server, None);
        let mut fds = [pollfd(accepted, POLLIN | POLLOUT), pollfd(client, POLLOUT)];
        assert_eq!(process.poll_syscall(&mut fds, 0), 2);
        assert_eq!(fds[0].revents, POLLOUT);
        assert_eq!(fds[1].revents, POLLOUT);

        assert_eq!(process.send_syscall(client, b"hi", 0), 2);
        assert_eq!(process.poll_syscall(&mut fds, 0), 2);
        assert_eq!(fds[0].revents, POLLIN | POLLOUT);
    }

    #[test]
    pub fn ut_capposix_poll_nothing_to_watch_waits_for_interrupt() {
        let (sub, process) = setup();

        std::thread::scope(|scope| {
            let process = &process;
            let waiter = scope.spawn(move || {
                let mut fds = [pollfd(-1, POLLIN), pollfd(-5, POLLOUT)];
                process.poll_syscall(&mut fds, -1)
            });
            interface::sleep(RustDuration::from_millis(30));
            assert!(!waiter.is_finished());
            sub.interrupt();
            assert_eq!(waiter.join().unwrap(), -(Errno::EINTR as i32));
        });

        // a bounded wait over nothing is a sleep
        let start = interface::starttimer();
        assert_eq!(process.poll_syscall(&mut [pollfd(-1, POLLIN)], 10), 0);
        assert!(interface::readtimer(start) >= RustDuration::from_millis(10));
    }

    #[test]
    pub fn ut_capposix_select_empty_sets_wait_for_interrupt() {
        let (sub, process) = setup();

        std::thread::scope(|scope| {
            let process = &process;
            let waiter = scope.spawn(move || process.select_syscall(0, None, None, None, None));
            interface::sleep(RustDuration::from_millis(30));
            assert!(!waiter.is_finished());
            sub.interrupt();
            assert_eq!(waiter.join().unwrap(), -(Errno::EINTR as i32));
        });

        assert_eq!(process.select_syscall(0, None, None, None, Some(RustDuration::ZERO)), 0);
    }

    #[test]
    pub fn ut_capposix_select_arguments() {
        let (_sub, process) = setup();

        let mut readfds = FdSet::new();
        assert_eq!(process.select_syscall(-1, None, None, None, None), -(Errno::EINVAL as i32));
        assert_eq!(
            process.select_syscall(FD_SETSIZE + 1, Some(&mut readfds), None, None, None),
            -(Errno::EINVAL as i32)
        );

        readfds.set(40);
        assert_eq!(
            process.select_syscall(41, Some(&mut readfds), None, None, Some(RustDuration::ZERO)),
            -(Errno::EBADF as i32)
        );
        // descriptors at or above nfds are not looked at
        assert_eq!(process.select_syscall(40, Some(&mut readfds), None, None, Some(RustDuration::ZERO)), 0);
        assert!(!readfds.is_set(40));
    }

    #[test]
    pub fn ut_capposix_select_rewrites_sets() {
        let (_sub, process) = setup();

        let mut pipefds = PipeArray::default();
        assert_eq!(process.pipe_syscall(&mut pipefds), 0);
        let file = process.open_syscall("/selected", O_CREAT | O_RDWR, S_IRWXA);

        let mut readfds = FdSet::new();
        readfds.set(pipefds.readfd);
        readfds.set(file);
        let mut writefds = FdSet::new();
        writefds.set(pipefds.writefd);
        let mut exceptfds = FdSet::new();
        exceptfds.set(file);

        let nfds = file + 1;
        let ready = process.select_syscall(
            nfds,
            Some(&mut readfds),
            Some(&mut writefds),
            Some(&mut exceptfds),
            Some(RustDuration::ZERO),
        );
        assert_eq!(ready, 2);
        assert!(!readfds.is_set(pipefds.readfd));
        assert!(readfds.is_set(file));
        assert!(writefds.is_set(pipefds.writefd));
        assert_eq!(exceptfds.count(), 0);

        // once data is buffered the read end joins the set
        assert_eq!(process.write_syscall(pipefds.writefd, b"x"), 1);
        let mut readfds = FdSet::new();
        readfds.set(pipefds.readfd);
        assert_eq!(process.select_syscall(nfds, Some(&mut readfds), None, None, None), 1);
        assert!(readfds.is_set(pipefds.readfd));
    }

    #[test]
    pub fn ut_capposix_select_timeout() {
        let (_sub, process) = setup();

        let mut pipefds = PipeArray::default();
        assert_eq!(process.pipe_syscall(&mut pipefds), 0);
        let mut readfds = FdSet::new();
        readfds.set(pipefds.readfd);

        let start = interface::starttimer();
        let ready = process.select_syscall(
            pipefds.readfd + 1,
            Some(&mut readfds),
            None,
            None,
            Some(RustDuration::from_millis(15)),
        );
        assert_eq!(ready, 0);
        assert!(interface::readtimer(start) >= RustDuration::from_millis(15));
        assert_eq!(readfds.count(), 0);
    }
}
