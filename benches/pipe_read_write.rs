/* Pipe throughput through the translation layer against the host kernel. */

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use capposix::interface;
use capposix::interface::types::PipeArray;
use capposix::safeposix::process::{Process, ProcessConfig};


pub fn run_benchmark(c: &mut Criterion) {
    let process = Process::new(
        interface::RustRfc::new(interface::MemSubstrate::new()),
        ProcessConfig::default(),
    );

    let mut group = c.benchmark_group("Compare pipe:write+read");

    for buflen in [64usize, 4096, 32768].iter() {
        group.throughput(Throughput::Bytes(*buflen as u64));
        let source = vec![b'P'; *buflen];
        let mut sink = vec![0u8; *buflen];

        let mut pipefds = PipeArray::default();
        assert_eq!(process.pipe_syscall(&mut pipefds), 0);
        group.bench_with_input(BenchmarkId::new("TP01: capposix pipe", buflen), buflen, |b, buflen| {
            b.iter(|| {
                assert_eq!(process.write_syscall(pipefds.writefd, &source), *buflen as i32);
                assert_eq!(process.read_syscall(pipefds.readfd, &mut sink), *buflen as i32);
            })
        });
        process.close_syscall(pipefds.readfd);
        process.close_syscall(pipefds.writefd);

        let mut hostfds = [0 as libc::c_int; 2];
        assert_eq!(unsafe { libc::pipe(hostfds.as_mut_ptr()) }, 0);
        group.bench_with_input(BenchmarkId::new("TP01: Native pipe", buflen), buflen, |b, buflen| {
            b.iter(|| unsafe {
                assert_eq!(libc::write(hostfds[1], source.as_ptr() as *const libc::c_void, *buflen), *buflen as isize);
                assert_eq!(libc::read(hostfds[0], sink.as_mut_ptr() as *mut libc::c_void, *buflen), *buflen as isize);
            })
        });
        unsafe {
            libc::close(hostfds[0]);
            libc::close(hostfds[1]);
        }
    }
    group.finish();

    process.teardown();
}

criterion_group!(name=benches;
                 config=global_criterion_settings::get_criterion();
                 targets=run_benchmark);
criterion_main!(benches);
