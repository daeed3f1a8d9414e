//! In-memory capability substrate
//!
//! ## MemSubstrate
//!
//! A complete `Substrate` that keeps everything in process memory: an inode
//! tree preopened at `/`, ring buffer pipes, event counters, a loopback
//! network and three stdio streams. Handles are numbered from a counter that
//! never goes backwards, so a released handle is never valid again.
//!
//! It is the runtime `capposixinit` installs and the one the test suite and
//! benchmarks drive.

use crate::interface;
use crate::interface::file::{Inode, MemFs};
use crate::interface::misc::{
    RustAtomicBool, RustAtomicOrdering, RustAtomicU32, RustAtomicUsize, RustDeque, RustHashMap, RustLock, RustMutex,
    RustRfc,
};
use crate::interface::net::{MemNet, MemSocket};
use crate::interface::pipe::{new_pipe, EmulatedPipe, PipeEnd};
use crate::interface::substrate::*;
use std::time::Duration;

pub const DEFAULT_PIPE_CAPACITY: usize = 65536;
pub const DEFAULT_MAX_HANDLES: usize = 4096;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemConfig {
    /// Bytes buffered per pipe and per stream connection direction
    pub pipe_capacity: usize,
    /// Handles that may be live at once, including the preopen and stdio
    pub max_handles: usize,
}

impl Default for MemConfig {
    fn default() -> Self {
        MemConfig {
            pipe_capacity: DEFAULT_PIPE_CAPACITY,
            max_handles: DEFAULT_MAX_HANDLES,
        }
    }
}

/// eventfd-style counter
#[derive(Debug)]
pub struct EventCounter {
    value: RustMutex<u64>,
    semaphore: bool,
}

const EVENT_MAX: u64 = u64::MAX - 1;

impl EventCounter {
    fn new(initval: u64, semaphore: bool) -> EventCounter {
        EventCounter {
            value: RustMutex::new(initval),
            semaphore: semaphore,
        }
    }

    fn read(&self, buf: &mut [u8], nonblocking: bool) -> SubstrateResult<usize> {
        if buf.len() < 8 {
            return Err(SubstrateError::Invalid);
        }
        loop {
            {
                let mut value = self.value.lock();
                if *value > 0 {
                    let out = if self.semaphore { 1 } else { *value };
                    *value -= out;
                    buf[..8].copy_from_slice(&out.to_ne_bytes());
                    return Ok(8);
                }
            }
            if nonblocking {
                return Err(SubstrateError::Again);
            }
            interface::sleep(interface::BLOCK_TIME);
        }
    }

    /// Adds the 8 byte value in `buf`, waiting while the sum would pass
    /// EVENT_MAX unless `nonblocking`
    fn write(&self, buf: &[u8], nonblocking: bool) -> SubstrateResult<usize> {
        if buf.len() < 8 {
            return Err(SubstrateError::Invalid);
        }
        let mut raw = [0u8; 8];
        raw.copy_from_slice(&buf[..8]);
        let add = u64::from_ne_bytes(raw);
        if add == u64::MAX {
            return Err(SubstrateError::Invalid);
        }
        loop {
            {
                let mut value = self.value.lock();
                if *value <= EVENT_MAX - add {
                    *value += add;
                    return Ok(8);
                }
            }
            if nonblocking {
                return Err(SubstrateError::Again);
            }
            interface::sleep(interface::BLOCK_TIME);
        }
    }

    fn readable(&self) -> bool {
        *self.value.lock() > 0
    }

    fn writable(&self) -> bool {
        *self.value.lock() < EVENT_MAX
    }
}

#[derive(Debug)]
enum ObjectBody {
    File(RustRfc<Inode>),
    Dir(RustRfc<Inode>),
    PipeRead(EmulatedPipe),
    PipeWrite(EmulatedPipe),
    Event(RustRfc<EventCounter>),
    Socket(RustRfc<MemSocket>),
    Input(RustRfc<RustMutex<RustDeque<u8>>>),
    Output(RustRfc<RustMutex<Vec<u8>>>),
}

#[derive(Debug)]
struct MemObject {
    rights: RustLock<Rights>,
    body: ObjectBody,
}

impl MemObject {
    fn require(&self, needed: Rights) -> SubstrateResult<()> {
        if self.rights.read().contains(needed) {
            Ok(())
        } else {
            Err(SubstrateError::NotCapable)
        }
    }

    fn kind(&self) -> HandleKind {
        match &self.body {
            ObjectBody::File(_) => HandleKind::RegularFile,
            ObjectBody::Dir(_) => HandleKind::Directory,
            ObjectBody::PipeRead(_) | ObjectBody::PipeWrite(_) => HandleKind::Pipe,
            ObjectBody::Event(_) => HandleKind::Event,
            ObjectBody::Socket(sock) => match sock.socktype {
                SocketType::Stream => HandleKind::SocketStream,
                SocketType::Datagram => HandleKind::SocketDatagram,
            },
            ObjectBody::Input(_) | ObjectBody::Output(_) => HandleKind::CharacterDevice,
        }
    }
}

pub struct MemSubstrate {
    config: MemConfig,
    fs: MemFs,
    net: MemNet,
    handles: RustHashMap<u32, RustRfc<MemObject>>,
    nexthandle: RustAtomicU32,
    root: Handle,
    stdio: [Handle; 3],
    stdin: RustRfc<RustMutex<RustDeque<u8>>>,
    stdout: RustRfc<RustMutex<Vec<u8>>>,
    stderr: RustRfc<RustMutex<Vec<u8>>>,
    released: RustAtomicUsize,
    double_releases: RustAtomicUsize,
    interrupt_pending: RustAtomicBool,
}

impl Default for MemSubstrate {
    fn default() -> Self {
        Self::new()
    }
}

impl MemSubstrate {
    pub fn new() -> MemSubstrate {
        Self::with_config(MemConfig::default())
    }

    pub fn with_config(config: MemConfig) -> MemSubstrate {
        let mut sub = MemSubstrate {
            config: config,
            fs: MemFs::new(),
            net: MemNet::new(config.pipe_capacity),
            handles: interface::new_hashmap(),
            nexthandle: RustAtomicU32::new(1),
            root: Handle(0),
            stdio: [Handle(0); 3],
            stdin: RustRfc::new(RustMutex::new(RustDeque::new())),
            stdout: RustRfc::new(RustMutex::new(Vec::new())),
            stderr: RustRfc::new(RustMutex::new(Vec::new())),
            released: RustAtomicUsize::new(0),
            double_releases: RustAtomicUsize::new(0),
            interrupt_pending: RustAtomicBool::new(false),
        };

        // a fresh table always has room for these four
        sub.stdio = [
            sub.insert_unchecked(Rights::stream_read(), ObjectBody::Input(sub.stdin.clone())),
            sub.insert_unchecked(Rights::stream_write(), ObjectBody::Output(sub.stdout.clone())),
            sub.insert_unchecked(Rights::stream_write(), ObjectBody::Output(sub.stderr.clone())),
        ];
        sub.root = sub.insert_unchecked(Rights::directory(), ObjectBody::Dir(sub.fs.root()));
        sub
    }

    fn insert_unchecked(&self, rights: Rights, body: ObjectBody) -> Handle {
        let id = self.nexthandle.fetch_add(1, RustAtomicOrdering::Relaxed);
        self.handles.insert(
            id,
            RustRfc::new(MemObject {
                rights: RustLock::new(rights),
                body: body,
            }),
        );
        Handle(id)
    }

    fn insert(&self, rights: Rights, body: ObjectBody) -> SubstrateResult<Handle> {
        if self.handles.len() >= self.config.max_handles {
            // undo whatever the body was holding on to
            self.teardown_body(&body);
            return Err(SubstrateError::TableFull);
        }
        Ok(self.insert_unchecked(rights, body))
    }

    // clone the object out so no map shard stays locked while we block on it
    fn object(&self, handle: Handle) -> SubstrateResult<RustRfc<MemObject>> {
        self.handles
            .get(&handle.0)
            .map(|obj| obj.clone())
            .ok_or(SubstrateError::BadHandle)
    }

    fn socket(&self, handle: Handle) -> SubstrateResult<(RustRfc<MemObject>, RustRfc<MemSocket>)> {
        let obj = self.object(handle)?;
        let sock = match &obj.body {
            ObjectBody::Socket(sock) => sock.clone(),
            _ => return Err(SubstrateError::NotSock),
        };
        Ok((obj, sock))
    }

    fn teardown_body(&self, body: &ObjectBody) {
        match body {
            ObjectBody::PipeRead(pipe) => pipe.decr_ref(PipeEnd::Read),
            ObjectBody::PipeWrite(pipe) => pipe.decr_ref(PipeEnd::Write),
            ObjectBody::Socket(sock) => self.net.close(sock),
            _ => {}
        }
    }

    /// Handles currently live, the preopen and stdio included
    pub fn live_handles(&self) -> usize {
        self.handles.len()
    }

    /// Handles released so far
    pub fn released_handles(&self) -> usize {
        self.released.load(RustAtomicOrdering::SeqCst)
    }

    /// Close requests for handles that were already released
    pub fn double_releases(&self) -> usize {
        self.double_releases.load(RustAtomicOrdering::SeqCst)
    }

    /// Makes the current or next blocking `poll_oneoff` fail with
    /// `Interrupted`, the way a caught signal would
    pub fn interrupt(&self) {
        self.interrupt_pending.store(true, RustAtomicOrdering::SeqCst);
    }

    pub fn push_stdin(&self, data: &[u8]) {
        self.stdin.lock().extend(data.iter().copied());
    }

    pub fn stdout_contents(&self) -> Vec<u8> {
        self.stdout.lock().clone()
    }

    pub fn stderr_contents(&self) -> Vec<u8> {
        self.stderr.lock().clone()
    }

    fn readiness(&self, obj: &MemObject, interest: Interest) -> Option<(u64, bool)> {
        match (&obj.body, interest) {
            (ObjectBody::PipeRead(pipe), Interest::Read) => {
                if pipe.check_select_read() {
                    Some((pipe.bytes_available() as u64, pipe.is_eof()))
                } else {
                    None
                }
            }
            (ObjectBody::PipeWrite(pipe), Interest::Write) => {
                if pipe.check_select_write() {
                    Some((pipe.space_available() as u64, pipe.get_read_ref() == 0))
                } else {
                    None
                }
            }
            (ObjectBody::PipeRead(_), Interest::Write) | (ObjectBody::PipeWrite(_), Interest::Read) => None,
            (ObjectBody::Event(counter), Interest::Read) => counter.readable().then_some((8, false)),
            (ObjectBody::Event(counter), Interest::Write) => counter.writable().then_some((8, false)),
            (ObjectBody::Socket(sock), interest) => sock.readiness(interest).map(|r| (r.nbytes, r.hangup)),
            (ObjectBody::File(inode), Interest::Read) => Some((inode.size(), false)),
            (ObjectBody::Input(input), Interest::Read) => Some((input.lock().len() as u64, false)),
            _ => Some((0, false)),
        }
    }
}

impl Substrate for MemSubstrate {
    fn preopens(&self) -> Vec<Preopen> {
        vec![Preopen {
            handle: self.root,
            path: "/".to_string(),
        }]
    }

    fn stdio(&self) -> Option<[Handle; 3]> {
        Some(self.stdio)
    }

    fn open_at(
        &self,
        dir: Handle,
        path: &str,
        lookup: LookupFlags,
        oflags: OpenFlags,
        rights: Rights,
    ) -> SubstrateResult<Handle> {
        let obj = self.object(dir)?;
        let start = match &obj.body {
            ObjectBody::Dir(inode) => inode.clone(),
            _ => return Err(SubstrateError::NotDir),
        };
        obj.require(Rights::PATH_OPEN)?;
        if oflags.contains(OpenFlags::CREATE) {
            obj.require(Rights::PATH_CREATE)?;
        }

        let follow = lookup.contains(LookupFlags::SYMLINK_FOLLOW);
        let node = self.fs.open(&start, path, follow, oflags)?;
        match &*node {
            Inode::Dir(_) => self.insert(rights & Rights::directory(), ObjectBody::Dir(node.clone())),
            _ => self.insert(
                rights & (Rights::file_read() | Rights::file_write()),
                ObjectBody::File(node.clone()),
            ),
        }
    }

    fn create_directory_at(&self, dir: Handle, path: &str) -> SubstrateResult<()> {
        let obj = self.object(dir)?;
        match &obj.body {
            ObjectBody::Dir(inode) => {
                obj.require(Rights::PATH_CREATE)?;
                self.fs.mkdir(inode, path)
            }
            _ => Err(SubstrateError::NotDir),
        }
    }

    fn create_symlink_at(&self, dir: Handle, target: &str, path: &str) -> SubstrateResult<()> {
        let obj = self.object(dir)?;
        match &obj.body {
            ObjectBody::Dir(inode) => {
                obj.require(Rights::PATH_CREATE)?;
                self.fs.symlink(inode, target, path)
            }
            _ => Err(SubstrateError::NotDir),
        }
    }

    fn close(&self, handle: Handle) -> SubstrateResult<()> {
        match self.handles.remove(&handle.0) {
            Some((_, obj)) => {
                self.teardown_body(&obj.body);
                self.released.fetch_add(1, RustAtomicOrdering::SeqCst);
                Ok(())
            }
            None => {
                self.double_releases.fetch_add(1, RustAtomicOrdering::SeqCst);
                Err(SubstrateError::BadHandle)
            }
        }
    }

    fn stat(&self, handle: Handle) -> SubstrateResult<HandleStat> {
        let obj = self.object(handle)?;
        let (ino, size, nlink) = match &obj.body {
            ObjectBody::File(inode) | ObjectBody::Dir(inode) => (inode.ino(), inode.size(), inode.nlink()),
            ObjectBody::PipeRead(pipe) => (handle.0 as u64, pipe.bytes_available() as u64, 1),
            _ => (handle.0 as u64, 0, 1),
        };
        Ok(HandleStat {
            kind: obj.kind(),
            ino: ino,
            size: size,
            nlink: nlink,
        })
    }

    fn read_at(&self, handle: Handle, buf: &mut [u8], offset: u64) -> SubstrateResult<usize> {
        let obj = self.object(handle)?;
        match &obj.body {
            ObjectBody::File(inode) => {
                obj.require(Rights::FD_READ)?;
                match &**inode {
                    Inode::File(f) => Ok(f.read_at(buf, offset)),
                    _ => Err(SubstrateError::Io),
                }
            }
            ObjectBody::Dir(_) => Err(SubstrateError::IsDir),
            _ => Err(SubstrateError::SeekPipe),
        }
    }

    fn write_at(&self, handle: Handle, buf: &[u8], offset: u64) -> SubstrateResult<usize> {
        let obj = self.object(handle)?;
        match &obj.body {
            ObjectBody::File(inode) => {
                obj.require(Rights::FD_WRITE)?;
                match &**inode {
                    Inode::File(f) => Ok(f.write_at(buf, offset)),
                    _ => Err(SubstrateError::Io),
                }
            }
            ObjectBody::Dir(_) => Err(SubstrateError::IsDir),
            _ => Err(SubstrateError::SeekPipe),
        }
    }

    fn append(&self, handle: Handle, buf: &[u8]) -> SubstrateResult<(usize, u64)> {
        let obj = self.object(handle)?;
        match &obj.body {
            ObjectBody::File(inode) => {
                obj.require(Rights::FD_WRITE)?;
                match &**inode {
                    Inode::File(f) => Ok(f.append(buf)),
                    _ => Err(SubstrateError::Io),
                }
            }
            ObjectBody::Dir(_) => Err(SubstrateError::IsDir),
            _ => Err(SubstrateError::SeekPipe),
        }
    }

    fn set_size(&self, handle: Handle, size: u64) -> SubstrateResult<()> {
        let obj = self.object(handle)?;
        match &obj.body {
            ObjectBody::File(inode) => {
                obj.require(Rights::FD_SET_SIZE)?;
                match &**inode {
                    Inode::File(f) => {
                        f.set_size(size);
                        Ok(())
                    }
                    _ => Err(SubstrateError::Io),
                }
            }
            ObjectBody::Dir(_) => Err(SubstrateError::IsDir),
            _ => Err(SubstrateError::Invalid),
        }
    }

    fn readdir(&self, handle: Handle, cookie: u64) -> SubstrateResult<Option<(DirEntry, u64)>> {
        let obj = self.object(handle)?;
        match &obj.body {
            ObjectBody::Dir(inode) => {
                obj.require(Rights::FD_READDIR)?;
                match &**inode {
                    Inode::Dir(d) => Ok(d.entry_at(cookie).map(|entry| (entry, cookie + 1))),
                    _ => Err(SubstrateError::Io),
                }
            }
            _ => Err(SubstrateError::NotDir),
        }
    }

    fn read_stream(&self, handle: Handle, buf: &mut [u8], nonblocking: bool) -> SubstrateResult<usize> {
        let obj = self.object(handle)?;
        obj.require(Rights::FD_READ)?;
        match &obj.body {
            ObjectBody::PipeRead(pipe) => pipe.read_from_pipe(buf, nonblocking),
            ObjectBody::Event(counter) => counter.read(buf, nonblocking),
            ObjectBody::Socket(sock) => self.net.recv(sock, buf, false).map(|(count, _)| count),
            ObjectBody::Input(input) => {
                let mut input = input.lock();
                let count = buf.len().min(input.len());
                for (slot, byte) in buf.iter_mut().zip(input.drain(..count)) {
                    *slot = byte;
                }
                Ok(count)
            }
            ObjectBody::Dir(_) => Err(SubstrateError::IsDir),
            _ => Err(SubstrateError::Invalid),
        }
    }

    fn write_stream(&self, handle: Handle, buf: &[u8], nonblocking: bool) -> SubstrateResult<usize> {
        let obj = self.object(handle)?;
        obj.require(Rights::FD_WRITE)?;
        match &obj.body {
            ObjectBody::PipeWrite(pipe) => pipe.write_to_pipe(buf, nonblocking),
            ObjectBody::Event(counter) => counter.write(buf, nonblocking),
            ObjectBody::Socket(sock) => self.net.send(sock, buf, None),
            ObjectBody::Output(output) => {
                output.lock().extend_from_slice(buf);
                Ok(buf.len())
            }
            ObjectBody::Dir(_) => Err(SubstrateError::IsDir),
            _ => Err(SubstrateError::Invalid),
        }
    }

    fn pipe(&self) -> SubstrateResult<(Handle, Handle)> {
        let pipe = new_pipe(self.config.pipe_capacity);
        let writer = pipe.clone();
        let read_end = match self.insert(Rights::stream_read(), ObjectBody::PipeRead(pipe)) {
            Ok(handle) => handle,
            Err(e) => {
                writer.decr_ref(PipeEnd::Write);
                return Err(e);
            }
        };
        match self.insert(Rights::stream_write(), ObjectBody::PipeWrite(writer)) {
            Ok(write_end) => Ok((read_end, write_end)),
            Err(e) => {
                let _ = self.close(read_end);
                Err(e)
            }
        }
    }

    fn event_create(&self, initval: u64, semaphore: bool) -> SubstrateResult<Handle> {
        let counter = RustRfc::new(EventCounter::new(initval, semaphore));
        self.insert(
            Rights::stream_read() | Rights::stream_write(),
            ObjectBody::Event(counter),
        )
    }

    fn socket_create(&self, family: AddressFamily, socktype: SocketType) -> SubstrateResult<Handle> {
        self.insert(Rights::socket(), ObjectBody::Socket(MemSocket::new(family, socktype)))
    }

    fn socket_bind(&self, handle: Handle, local: &Endpoint) -> SubstrateResult<()> {
        let (_, sock) = self.socket(handle)?;
        self.net.bind(&sock, local)
    }

    fn socket_connect(&self, handle: Handle, remote: &Endpoint) -> SubstrateResult<()> {
        let (_, sock) = self.socket(handle)?;
        self.net.connect(&sock, remote)
    }

    fn socket_listen(&self, handle: Handle, backlog: u32) -> SubstrateResult<()> {
        let (obj, sock) = self.socket(handle)?;
        obj.require(Rights::SOCK_ACCEPT)?;
        self.net.listen(&sock, backlog)
    }

    fn socket_accept(&self, handle: Handle) -> SubstrateResult<(Handle, Endpoint)> {
        let (obj, sock) = self.socket(handle)?;
        obj.require(Rights::SOCK_ACCEPT)?;
        let (conn, peer) = self.net.accept(&sock)?;
        let rights = *obj.rights.read() & (Rights::socket() - Rights::SOCK_ACCEPT);
        let newhandle = self.insert(rights, ObjectBody::Socket(conn))?;
        Ok((newhandle, peer))
    }

    fn socket_send(&self, handle: Handle, buf: &[u8], dest: Option<&Endpoint>) -> SubstrateResult<usize> {
        let (obj, sock) = self.socket(handle)?;
        obj.require(Rights::FD_WRITE)?;
        self.net.send(&sock, buf, dest)
    }

    fn socket_recv(&self, handle: Handle, buf: &mut [u8], peek: bool) -> SubstrateResult<(usize, Option<Endpoint>)> {
        let (obj, sock) = self.socket(handle)?;
        obj.require(Rights::FD_READ)?;
        self.net.recv(&sock, buf, peek)
    }

    fn socket_shutdown(&self, handle: Handle, how: Shutdown) -> SubstrateResult<()> {
        let (obj, sock) = self.socket(handle)?;
        obj.require(Rights::SOCK_SHUTDOWN)?;
        self.net.shutdown(&sock, how)
    }

    fn socket_local_addr(&self, handle: Handle) -> SubstrateResult<Endpoint> {
        let (_, sock) = self.socket(handle)?;
        Ok(sock.local_addr())
    }

    fn socket_peer_addr(&self, handle: Handle) -> SubstrateResult<Endpoint> {
        let (_, sock) = self.socket(handle)?;
        sock.peer_addr()
    }

    fn socket_set_option(&self, handle: Handle, option: SocketOption, value: u64) -> SubstrateResult<()> {
        let (_, sock) = self.socket(handle)?;
        self.net.set_option(&sock, option, value)
    }

    fn restrict_rights(&self, handle: Handle, rights: Rights) -> SubstrateResult<()> {
        let obj = self.object(handle)?;
        let mut current = obj.rights.write();
        if !current.contains(rights) {
            return Err(SubstrateError::NotCapable);
        }
        *current = rights;
        Ok(())
    }

    fn has_readiness(&self, kind: HandleKind) -> bool {
        matches!(
            kind,
            HandleKind::SocketStream | HandleKind::SocketDatagram | HandleKind::Pipe | HandleKind::Event
        )
    }

    fn poll_oneoff(&self, subscriptions: &[Subscription], timeout: Option<Duration>) -> SubstrateResult<Vec<Event>> {
        let start_time = interface::starttimer();
        loop {
            let mut events = Vec::new();
            for sub in subscriptions {
                let fired = match self.object(sub.handle) {
                    Ok(obj) => self.readiness(&obj, sub.interest).map(|(nbytes, hangup)| Event {
                        userdata: sub.userdata,
                        interest: sub.interest,
                        error: None,
                        nbytes: nbytes,
                        hangup: hangup,
                    }),
                    Err(e) => Some(Event {
                        userdata: sub.userdata,
                        interest: sub.interest,
                        error: Some(e),
                        nbytes: 0,
                        hangup: false,
                    }),
                };
                events.extend(fired);
            }

            if !events.is_empty() {
                return Ok(events);
            }
            if let Some(limit) = timeout {
                if interface::readtimer(start_time) >= limit {
                    return Ok(events);
                }
            }
            if self.interrupt_pending.swap(false, RustAtomicOrdering::SeqCst) {
                return Err(SubstrateError::Interrupted);
            }
            interface::sleep(interface::BLOCK_TIME);
        }
    }
}

#[cfg(test)]
mod memsub_tests {
    use super::*;

    #[test]
    fn ut_memsub_handles_never_reused() {
        let sub = MemSubstrate::new();
        let (r1, w1) = sub.pipe().unwrap();
        sub.close(r1).unwrap();
        sub.close(w1).unwrap();
        let (r2, w2) = sub.pipe().unwrap();
        assert!(r2.0 > w1.0 && w2.0 > w1.0);
        assert_eq!(sub.close(r1), Err(SubstrateError::BadHandle));
        assert_eq!(sub.double_releases(), 1);
    }

    #[test]
    fn ut_memsub_restrict_rights_only_narrows() {
        let sub = MemSubstrate::new();
        let root = sub.preopens()[0].handle;
        let file = sub
            .open_at(
                root,
                "f",
                LookupFlags::SYMLINK_FOLLOW,
                OpenFlags::CREATE,
                Rights::file_read() | Rights::file_write(),
            )
            .unwrap();
        sub.restrict_rights(file, Rights::file_read()).unwrap();
        assert_eq!(sub.write_at(file, b"x", 0), Err(SubstrateError::NotCapable));
        assert_eq!(
            sub.restrict_rights(file, Rights::file_write()),
            Err(SubstrateError::NotCapable)
        );
    }

    #[test]
    fn ut_memsub_zero_timeout_poll_returns_empty() {
        let sub = MemSubstrate::new();
        let (r, _w) = sub.pipe().unwrap();
        let subs = [Subscription {
            userdata: 7,
            handle: r,
            interest: Interest::Read,
        }];
        assert!(sub.poll_oneoff(&subs, Some(Duration::ZERO)).unwrap().is_empty());
        // no subscriptions is a plain sleep
        assert!(sub.poll_oneoff(&[], Some(Duration::from_millis(1))).unwrap().is_empty());
    }

    #[test]
    fn ut_memsub_interrupt_ends_unbounded_wait() {
        let sub = MemSubstrate::new();
        // a pending interrupt does not disturb a check that cannot wait
        sub.interrupt();
        assert!(sub.poll_oneoff(&[], Some(Duration::ZERO)).unwrap().is_empty());
        assert_eq!(sub.poll_oneoff(&[], None), Err(SubstrateError::Interrupted));
        assert!(sub.poll_oneoff(&[], Some(Duration::ZERO)).unwrap().is_empty());
    }

    #[test]
    fn ut_memsub_event_counter_nonblocking() {
        let counter = EventCounter::new(EVENT_MAX - 1, false);
        assert_eq!(counter.write(&1u64.to_ne_bytes(), true), Ok(8));
        assert_eq!(counter.write(&1u64.to_ne_bytes(), true), Err(SubstrateError::Again));
        let mut buf = [0u8; 8];
        assert_eq!(counter.read(&mut buf, true), Ok(8));
        assert_eq!(u64::from_ne_bytes(buf), EVENT_MAX);
        assert_eq!(counter.read(&mut buf, true), Err(SubstrateError::Again));
    }

    #[test]
    fn ut_memsub_event_counter_blocking_read_wakes() {
        let counter = EventCounter::new(0, false);
        std::thread::scope(|scope| {
            let counter = &counter;
            scope.spawn(move || {
                interface::sleep(Duration::from_millis(10));
                assert_eq!(counter.write(&5u64.to_ne_bytes(), false), Ok(8));
            });
            let mut buf = [0u8; 8];
            assert_eq!(counter.read(&mut buf, false), Ok(8));
            assert_eq!(u64::from_ne_bytes(buf), 5);
        });
    }

    #[test]
    fn ut_memsub_table_full() {
        let sub = MemSubstrate::with_config(MemConfig {
            pipe_capacity: 64,
            max_handles: 5,
        });
        // four are taken by the preopen and stdio
        assert_eq!(sub.pipe(), Err(SubstrateError::TableFull));
        assert_eq!(sub.live_handles(), 4);
    }
}
