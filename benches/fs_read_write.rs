/* Benchmarks for the translation layer.  Results are only checked where a
 * failure would make the timing meaningless. */

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};

use capposix::interface;
use capposix::safeposix::process::{Process, ProcessConfig};
use capposix::safeposix::syscalls::fs_constants::*;

use std::ffi::CString;


// rewind once this much has been written so the file stays small
const RESET_LENGTH: usize = 1024 * 1024 * 4;

pub fn run_benchmark(c: &mut Criterion) {
    let process = Process::new(
        interface::RustRfc::new(interface::MemSubstrate::new()),
        ProcessConfig::default(),
    );

    let mut group = c.benchmark_group("Compare fs:write+read");
    group.plot_config(
        criterion::PlotConfiguration::default().summary_scale(criterion::AxisScale::Linear),
    );

    for buflen in [1usize, 64, 1024, 65536].iter() {
        let source = vec![b'X'; *buflen];
        let mut sink = vec![0u8; *buflen];

        let fd = process.open_syscall("/foo", O_CREAT | O_TRUNC | O_RDWR, S_IRWXA);
        // fill the file once so every read below has data behind it
        let mut filled = 0;
        while filled < RESET_LENGTH {
            assert_eq!(process.write_syscall(fd, &source), *buflen as i32);
            filled += *buflen;
        }
        assert_eq!(process.lseek_syscall(fd, 0, SEEK_SET), 0);

        let mut pos = 0;
        group.bench_with_input(BenchmarkId::new("TF02: capposix write", buflen), buflen, |b, buflen| {
            b.iter(|| {
                pos += *buflen;
                if pos > RESET_LENGTH {
                    process.lseek_syscall(fd, 0, SEEK_SET);
                    pos = *buflen;
                }
                assert_eq!(process.write_syscall(fd, &source), *buflen as i32);
            })
        });

        process.lseek_syscall(fd, 0, SEEK_SET);
        pos = 0;
        group.bench_with_input(BenchmarkId::new("TF02: capposix read", buflen), buflen, |b, buflen| {
            b.iter(|| {
                pos += *buflen;
                if pos > RESET_LENGTH {
                    process.lseek_syscall(fd, 0, SEEK_SET);
                    pos = *buflen;
                }
                assert_eq!(process.read_syscall(fd, &mut sink), *buflen as i32);
            })
        });

        // positioned I/O never touches the shared offset
        group.bench_with_input(BenchmarkId::new("TF02: capposix pread", buflen), buflen, |b, buflen| {
            b.iter(|| {
                assert_eq!(process.pread_syscall(fd, &mut sink, 0), *buflen as i32);
            })
        });
        assert_eq!(process.close_syscall(fd), 0);
    }

    let path = CString::new("/tmp/capposix-bench-rw").unwrap();
    for buflen in [1usize, 64, 1024, 65536].iter() {
        let source = vec![b'X'; *buflen];
        let mut sink = vec![0u8; *buflen];
        let fd = unsafe { libc::open(path.as_ptr(), libc::O_CREAT | libc::O_TRUNC | libc::O_RDWR, 0o777) };
        assert!(fd > 2);

        group.bench_with_input(BenchmarkId::new("TF02: Native write", buflen), buflen, |b, buflen| {
            b.iter(|| unsafe {
                assert_eq!(libc::write(fd, source.as_ptr() as *const libc::c_void, *buflen), *buflen as isize);
            })
        });

        let file_length = unsafe { libc::lseek(fd, 0, libc::SEEK_CUR) } as usize;
        unsafe {
            libc::lseek(fd, 0, libc::SEEK_SET);
        }
        let mut pos = 0;
        group.bench_with_input(BenchmarkId::new("TF02: Native read", buflen), buflen, |b, buflen| {
            b.iter(|| unsafe {
                pos += *buflen;
                if pos > file_length {
                    libc::lseek(fd, 0, libc::SEEK_SET);
                    pos = *buflen;
                }
                assert_eq!(libc::read(fd, sink.as_mut_ptr() as *mut libc::c_void, *buflen), *buflen as isize);
            })
        });

        unsafe {
            libc::close(fd);
            libc::unlink(path.as_ptr());
        }
    }
    group.finish();

    process.teardown();
}

criterion_group!(name=benches;
                 config=global_criterion_settings::get_criterion();
                 targets=run_benchmark);
criterion_main!(benches);
