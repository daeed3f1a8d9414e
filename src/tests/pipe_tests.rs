#[cfg(test)]
pub mod pipe_tests {
    use super::super::*;
    use crate::interface::errnos::Errno;
    use crate::interface::types::PipeArray;
    use crate::interface::DEFAULT_PIPE_CAPACITY;
    use crate::safeposix::syscalls::fs_constants::*;

    #[test]
    pub fn ut_capposix_pipe_write_then_read() {
        let (_sub, process) = setup();

        let mut pipefds = PipeArray::default();
        assert_eq!(process.pipe_syscall(&mut pipefds), 0);
        assert_eq!((pipefds.readfd, pipefds.writefd), (3, 4));

        assert_eq!(process.write_syscall(pipefds.writefd, b"through the pipe"), 16);
        let mut buf = [0u8; 7];
        assert_eq!(process.read_syscall(pipefds.readfd, &mut buf), 7);
        assert_eq!(cbuf2str(&buf), "through");
        let mut rest = [0u8; 32];
        assert_eq!(process.read_syscall(pipefds.readfd, &mut rest), 9);
        assert_eq!(cbuf2str(&rest[..9]), " the pipe");

        // ends only go one way
        assert_eq!(process.write_syscall(pipefds.readfd, b"x"), -(Errno::EACCES as i32));
        assert_eq!(process.read_syscall(pipefds.writefd, &mut buf), -(Errno::EACCES as i32));
        assert_eq!(process.fcntl_syscall(pipefds.readfd, F_GETFL, 0), O_RDONLY);
        assert_eq!(process.fcntl_syscall(pipefds.writefd, F_GETFL, 0), O_WRONLY);
    }

    #[test]
    pub fn ut_capposix_pipe_eof_after_writer_closes() {
        let (_sub, process) = setup();

        let mut pipefds = PipeArray::default();
        assert_eq!(process.pipe_syscall(&mut pipefds), 0);
        assert_eq!(process.write_syscall(pipefds.writefd, b"last words"), 10);
        assert_eq!(process.close_syscall(pipefds.writefd), 0);

        // buffered data is still delivered before end of file
        let mut buf = [0u8; 64];
        assert_eq!(process.read_syscall(pipefds.readfd, &mut buf), 10);
        assert_eq!(process.read_syscall(pipefds.readfd, &mut buf), 0);
        assert_eq!(process.read_syscall(pipefds.readfd, &mut buf), 0);
    }

    #[test]
    pub fn ut_capposix_pipe_eof_waits_for_every_writer() {
        let (_sub, process) = setup();

        let mut pipefds = PipeArray::default();
        assert_eq!(process.pipe_syscall(&mut pipefds), 0);
        let second_writer = process.dup_syscall(pipefds.writefd, None);
        assert_eq!(process.close_syscall(pipefds.writefd), 0);

        // the duplicate still holds the write end open
        assert_eq!(process.fcntl_syscall(pipefds.readfd, F_SETFL, O_NONBLOCK), 0);
        let mut buf = [0u8; 8];
        assert_eq!(process.read_syscall(pipefds.readfd, &mut buf), -(Errno::EAGAIN as i32));

        assert_eq!(process.close_syscall(second_writer), 0);
        assert_eq!(process.read_syscall(pipefds.readfd, &mut buf), 0);
    }

    #[test]
    pub fn ut_capposix_pipe_broken() {
        let (_sub, process) = setup();

        let mut pipefds = PipeArray::default();
        assert_eq!(process.pipe_syscall(&mut pipefds), 0);
        assert_eq!(process.close_syscall(pipefds.readfd), 0);
        assert_eq!(process.write_syscall(pipefds.writefd, b"nobody listens"), -(Errno::EPIPE as i32));
        // an empty write does not reach the pipe
        assert_eq!(process.write_syscall(pipefds.writefd, b""), 0);
    }

    #[test]
    pub fn ut_capposix_pipe_nonblocking() {
        let (_sub, process) = setup();

        let mut pipefds = PipeArray::default();
        assert_eq!(process.pipe2_syscall(&mut pipefds, O_NONBLOCK), 0);
        assert_eq!(process.fcntl_syscall(pipefds.readfd, F_GETFL, 0), O_RDONLY | O_NONBLOCK);

        let mut buf = vec![0u8; DEFAULT_PIPE_CAPACITY];
        assert_eq!(process.read_syscall(pipefds.readfd, &mut buf), -(Errno::EAGAIN as i32));

        // only what fits is taken, the rest is left to the caller
        let big = vec![b'z'; DEFAULT_PIPE_CAPACITY + 100];
        assert_eq!(process.write_syscall(pipefds.writefd, &big), DEFAULT_PIPE_CAPACITY as i32);
        assert_eq!(process.write_syscall(pipefds.writefd, b"more"), -(Errno::EAGAIN as i32));

        assert_eq!(process.read_syscall(pipefds.readfd, &mut buf), DEFAULT_PIPE_CAPACITY as i32);
        assert!(buf.iter().all(|b| *b == b'z'));
        assert_eq!(process.write_syscall(pipefds.writefd, b"more"), 4);

        // switching back to blocking is a descriptor flag change only
        assert_eq!(process.fcntl_syscall(pipefds.readfd, F_SETFL, 0), 0);
        assert_eq!(process.read_syscall(pipefds.readfd, &mut buf), 4);
    }

    #[test]
    pub fn ut_capposix_pipe2_flags() {
        let (_sub, process) = setup();

        let mut pipefds = PipeArray::default();
        assert_eq!(process.pipe2_syscall(&mut pipefds, O_APPEND), -(Errno::EINVAL as i32));
        assert_eq!(process.pipe2_syscall(&mut pipefds, O_CLOEXEC), 0);
        assert_eq!(process.fcntl_syscall(pipefds.readfd, F_GETFD, 0), FD_CLOEXEC);
        assert_eq!(process.fcntl_syscall(pipefds.writefd, F_GETFD, 0), FD_CLOEXEC);
        assert_eq!(process.fcntl_syscall(pipefds.readfd, F_GETFL, 0), O_RDONLY);
    }

    #[test]
    pub fn ut_capposix_pipe_table_full_releases_both_ends() {
        let (sub, process) = setup_bare(1);

        let live = sub.live_handles();
        let mut pipefds = PipeArray { readfd: -1, writefd: -1 };
        assert_eq!(process.pipe_syscall(&mut pipefds), -(Errno::EMFILE as i32));
        assert_eq!(sub.live_handles(), live);
        assert_eq!(process.fdtable.open_count(), 0);
        assert_eq!(pipefds, PipeArray { readfd: -1, writefd: -1 });
    }

    #[test]
    pub fn ut_capposix_pipe_threads() {
        let (_sub, process) = setup();

        let mut pipefds = PipeArray::default();
        assert_eq!(process.pipe_syscall(&mut pipefds), 0);
        let total: usize = 1 << 20;
        let chunk: usize = 4096;

        let received = std::thread::scope(|scope| {
            let process = &process;
            scope.spawn(move || {
                let buf = vec![b'A'; chunk];
                let mut sent = 0;
                while sent < total {
                    let count = process.write_syscall(pipefds.writefd, &buf);
                    assert!(count > 0);
                    sent += count as usize;
                }
                assert_eq!(process.close_syscall(pipefds.writefd), 0);
            });

            let reader = scope.spawn(move || {
                let mut buf = vec![0u8; chunk * 3];
                let mut received = 0;
                loop {
                    let count = process.read_syscall(pipefds.readfd, &mut buf);
                    assert!(count >= 0);
                    if count == 0 {
                        break;
                    }
                    assert!(buf[..count as usize].iter().all(|b| *b == b'A'));
                    received += count as usize;
                }
                received
            });
            reader.join().unwrap()
        });
        assert_eq!(received, total);
    }

    #[test]
    pub fn ut_capposix_pipe_dup2_onto_stdin() {
        let (_sub, process) = setup();

        let mut pipefds = PipeArray::default();
        assert_eq!(process.pipe_syscall(&mut pipefds), 0);
        assert_eq!(process.dup2_syscall(pipefds.readfd, 0), 0);
        assert_eq!(process.close_syscall(pipefds.readfd), 0);

        assert_eq!(process.write_syscall(pipefds.writefd, b"piped in"), 8);
        let mut buf = [0u8; 8];
        assert_eq!(process.read_syscall(0, &mut buf), 8);
        assert_eq!(&buf, b"piped in");
    }
}
