// Network related interface
//
// A loopback-only network for the MemSubstrate. Stream connections are a
// pair of EmulatedPipes, one per direction, handed to both ends at connect
// time; datagrams are queued on the receiving socket with their source.

use crate::interface;
use crate::interface::misc::{RustDeque, RustMutex, RustRfc};
use crate::interface::pipe::{new_pipe, EmulatedPipe, PipeEnd};
use crate::interface::substrate::{
    AddressFamily, Endpoint, Interest, Shutdown, SocketOption, SocketType, SubstrateError,
    SubstrateResult,
};
use std::cmp::min;

pub const EPHEMERAL_PORT_START: u16 = 49152;
pub const MAX_DATAGRAM_SIZE: usize = 65507;
// datagrams beyond this are dropped, the way a full receive buffer would
const MAX_QUEUED_DATAGRAMS: usize = 1024;

#[derive(Debug, Clone)]
struct Connection {
    tx: EmulatedPipe,
    rx: EmulatedPipe,
}

#[derive(Debug, Default)]
struct SocketInner {
    local: Option<Endpoint>,
    peer: Option<Endpoint>,
    listening: bool,
    backlog: usize,
    pending: RustDeque<RustRfc<MemSocket>>,
    conn: Option<Connection>,
    datagrams: RustDeque<(Vec<u8>, Endpoint)>,
    reuseaddr: bool,
    shut_read: bool,
    shut_write: bool,
    closed: bool,
}

/// One in-memory socket, shared between the handle table and the bindings
#[derive(Debug)]
pub struct MemSocket {
    pub family: AddressFamily,
    pub socktype: SocketType,
    inner: RustMutex<SocketInner>,
    // bytes pulled off the stream by MSG_PEEK that a later recv must see first
    last_peek: RustMutex<Vec<u8>>,
}

/// Readiness of a socket for one interest
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SocketReadiness {
    pub nbytes: u64,
    pub hangup: bool,
}

impl MemSocket {
    pub fn new(family: AddressFamily, socktype: SocketType) -> RustRfc<MemSocket> {
        RustRfc::new(MemSocket {
            family: family,
            socktype: socktype,
            inner: RustMutex::new(SocketInner::default()),
            last_peek: RustMutex::new(Vec::new()),
        })
    }

    fn connected(family: AddressFamily, local: Endpoint, peer: Endpoint, conn: Connection) -> RustRfc<MemSocket> {
        let sock = MemSocket::new(family, SocketType::Stream);
        {
            let mut inner = sock.inner.lock();
            inner.local = Some(local);
            inner.peer = Some(peer);
            inner.conn = Some(conn);
        }
        sock
    }

    pub fn local_addr(&self) -> Endpoint {
        self.inner
            .lock()
            .local
            .clone()
            .unwrap_or_else(|| Endpoint::unspecified(self.family))
    }

    pub fn peer_addr(&self) -> SubstrateResult<Endpoint> {
        self.inner.lock().peer.clone().ok_or(SubstrateError::NotConn)
    }

    pub fn is_listening(&self) -> bool {
        self.inner.lock().listening
    }

    pub fn readiness(&self, interest: Interest) -> Option<SocketReadiness> {
        let inner = self.inner.lock();
        let ready = |nbytes: usize, hangup: bool| Some(SocketReadiness { nbytes: nbytes as u64, hangup: hangup });

        match (self.socktype, interest) {
            (SocketType::Stream, Interest::Read) if inner.listening => {
                if inner.pending.is_empty() {
                    None
                } else {
                    ready(inner.pending.len(), false)
                }
            }
            (SocketType::Stream, Interest::Write) if inner.listening => None,
            (SocketType::Stream, _) if inner.conn.is_none() => ready(0, true),
            (SocketType::Stream, Interest::Read) => {
                let conn = inner.conn.as_ref()?;
                let buffered = self.last_peek.lock().len() + conn.rx.bytes_available();
                if inner.shut_read || conn.rx.is_eof() {
                    ready(buffered, conn.rx.is_eof())
                } else if buffered > 0 {
                    ready(buffered, false)
                } else {
                    None
                }
            }
            (SocketType::Stream, Interest::Write) => {
                let conn = inner.conn.as_ref()?;
                let peer_gone = conn.tx.get_read_ref() == 0;
                if inner.shut_write || peer_gone {
                    ready(0, peer_gone)
                } else if conn.tx.check_select_write() {
                    ready(conn.tx.space_available(), false)
                } else {
                    None
                }
            }
            (SocketType::Datagram, Interest::Read) => match inner.datagrams.front() {
                Some((data, _)) => ready(data.len(), false),
                None if inner.shut_read => ready(0, false),
                None => None,
            },
            (SocketType::Datagram, Interest::Write) => ready(MAX_DATAGRAM_SIZE, false),
        }
    }
}

struct Binding {
    socktype: SocketType,
    endpoint: Endpoint,
    socket: RustRfc<MemSocket>,
}

// two endpoints of the same family collide if their ports (or paths) match
// and either address is the wildcard or both are equal
fn overlaps(a: &Endpoint, b: &Endpoint) -> bool {
    match (a, b) {
        (Endpoint::Unix { path: pa }, Endpoint::Unix { path: pb }) => pa == pb,
        _ if a.family() != b.family() => false,
        _ => a.port() == b.port() && (a.is_unspecified() || b.is_unspecified() || a == b),
    }
}

// a wildcard-bound socket talks from the interface its peer was reached on
fn source_for(local: Endpoint, remote: &Endpoint) -> Endpoint {
    if !local.is_unspecified() || local.family() == AddressFamily::Unix {
        return local;
    }
    let mut source = if remote.is_unspecified() {
        match remote.family() {
            AddressFamily::Inet => Endpoint::V4 {
                addr: [127, 0, 0, 1],
                port: 0,
            },
            _ => {
                let mut addr = [0u8; 16];
                addr[15] = 1;
                Endpoint::V6 {
                    addr: addr,
                    port: 0,
                    flowinfo: 0,
                    scope_id: 0,
                }
            }
        }
    } else {
        remote.clone()
    };
    source.set_port(local.port());
    source
}

// the in-memory network only has loopback interfaces
fn is_local(ep: &Endpoint) -> bool {
    match ep {
        Endpoint::Unix { path } => !path.is_empty(),
        _ => ep.is_loopback() || ep.is_unspecified(),
    }
}

pub struct MemNet {
    bindings: RustMutex<Vec<Binding>>,
    pipe_capacity: usize,
}

impl MemNet {
    pub fn new(pipe_capacity: usize) -> MemNet {
        MemNet {
            bindings: RustMutex::new(Vec::new()),
            pipe_capacity: pipe_capacity,
        }
    }

    fn ephemeral_port(bindings: &[Binding], socktype: SocketType, template: &Endpoint) -> SubstrateResult<u16> {
        for port in EPHEMERAL_PORT_START..=u16::MAX {
            let mut candidate = template.clone();
            candidate.set_port(port);
            if !bindings.iter().any(|b| b.socktype == socktype && overlaps(&b.endpoint, &candidate)) {
                return Ok(port);
            }
        }
        Err(SubstrateError::AddrInUse)
    }

    pub fn bind(&self, sock: &RustRfc<MemSocket>, local: &Endpoint) -> SubstrateResult<()> {
        if local.family() != sock.family {
            return Err(SubstrateError::AfNoSupport);
        }
        if !is_local(local) {
            return Err(SubstrateError::AddrNotAvail);
        }

        let mut bindings = self.bindings.lock();
        let mut inner = sock.inner.lock();
        if inner.local.is_some() {
            return Err(SubstrateError::Invalid);
        }

        let mut endpoint = local.clone();
        if sock.family != AddressFamily::Unix && endpoint.port() == 0 {
            let port = Self::ephemeral_port(&bindings, sock.socktype, &endpoint)?;
            endpoint.set_port(port);
        }

        for binding in bindings.iter() {
            if binding.socktype != sock.socktype || !overlaps(&binding.endpoint, &endpoint) {
                continue;
            }
            let both_reuse = inner.reuseaddr && binding.socket.inner.lock().reuseaddr;
            if !both_reuse || sock.family == AddressFamily::Unix {
                return Err(SubstrateError::AddrInUse);
            }
        }

        bindings.push(Binding {
            socktype: sock.socktype,
            endpoint: endpoint.clone(),
            socket: sock.clone(),
        });
        inner.local = Some(endpoint);
        Ok(())
    }

    // sockets that send or connect without binding get a wildcard ephemeral address
    fn autobind(&self, sock: &RustRfc<MemSocket>) -> SubstrateResult<()> {
        if sock.inner.lock().local.is_some() || sock.family == AddressFamily::Unix {
            return Ok(());
        }
        match self.bind(sock, &Endpoint::unspecified(sock.family)) {
            // lost a race with another bind of the same socket
            Err(SubstrateError::Invalid) => Ok(()),
            other => other,
        }
    }

    fn find_bound(&self, socktype: SocketType, remote: &Endpoint) -> Option<RustRfc<MemSocket>> {
        let bindings = self.bindings.lock();
        let exact = bindings
            .iter()
            .find(|b| b.socktype == socktype && b.endpoint == *remote);
        exact
            .or_else(|| bindings.iter().find(|b| b.socktype == socktype && overlaps(&b.endpoint, remote)))
            .map(|b| b.socket.clone())
    }

    pub fn listen(&self, sock: &RustRfc<MemSocket>, backlog: u32) -> SubstrateResult<()> {
        if sock.socktype != SocketType::Stream {
            return Err(SubstrateError::NotSup);
        }
        self.autobind(sock)?;
        let mut inner = sock.inner.lock();
        if inner.conn.is_some() {
            return Err(SubstrateError::IsConn);
        }
        if sock.family == AddressFamily::Unix && inner.local.is_none() {
            return Err(SubstrateError::Invalid);
        }
        inner.listening = true;
        inner.backlog = (backlog as usize).max(1);
        Ok(())
    }

    pub fn connect(&self, sock: &RustRfc<MemSocket>, remote: &Endpoint) -> SubstrateResult<()> {
        if remote.family() != sock.family {
            return Err(SubstrateError::AfNoSupport);
        }
        if !is_local(remote) {
            return Err(match remote {
                Endpoint::Unix { .. } => SubstrateError::NoEnt,
                _ => SubstrateError::NetUnreach,
            });
        }

        if sock.socktype == SocketType::Datagram {
            self.autobind(sock)?;
            sock.inner.lock().peer = Some(remote.clone());
            return Ok(());
        }

        {
            let inner = sock.inner.lock();
            if inner.conn.is_some() {
                return Err(SubstrateError::IsConn);
            }
            if inner.listening {
                return Err(SubstrateError::Invalid);
            }
        }

        let listener = match self.find_bound(SocketType::Stream, remote) {
            Some(listener) => listener,
            None if sock.family == AddressFamily::Unix => return Err(SubstrateError::NoEnt),
            None => return Err(SubstrateError::ConnRefused),
        };
        self.autobind(sock)?;

        let to_server = new_pipe(self.pipe_capacity);
        let to_client = new_pipe(self.pipe_capacity);
        let client_local = source_for(sock.local_addr(), remote);

        let mut listener_inner = listener.inner.lock();
        if !listener_inner.listening || listener_inner.closed {
            return Err(SubstrateError::ConnRefused);
        }
        if listener_inner.pending.len() >= listener_inner.backlog {
            return Err(SubstrateError::ConnRefused);
        }

        // the accepted end reports the concrete address that was dialed
        let mut server_local = listener_inner
            .local
            .clone()
            .unwrap_or_else(|| remote.clone());
        if server_local.is_unspecified() {
            server_local = remote.clone();
        }
        let server = MemSocket::connected(
            sock.family,
            server_local,
            client_local.clone(),
            Connection {
                tx: to_client.clone(),
                rx: to_server.clone(),
            },
        );
        listener_inner.pending.push_back(server);
        drop(listener_inner);

        let mut inner = sock.inner.lock();
        inner.local = Some(client_local);
        inner.peer = Some(remote.clone());
        inner.conn = Some(Connection {
            tx: to_server,
            rx: to_client,
        });
        Ok(())
    }

    /// Blocks until a connection is pending on the listener
    pub fn accept(&self, sock: &RustRfc<MemSocket>) -> SubstrateResult<(RustRfc<MemSocket>, Endpoint)> {
        loop {
            {
                let mut inner = sock.inner.lock();
                if !inner.listening {
                    return Err(SubstrateError::Invalid);
                }
                if let Some(conn) = inner.pending.pop_front() {
                    drop(inner);
                    let peer = conn.peer_addr()?;
                    return Ok((conn, peer));
                }
            }
            interface::sleep(interface::BLOCK_TIME);
        }
    }

    pub fn send(&self, sock: &RustRfc<MemSocket>, buf: &[u8], dest: Option<&Endpoint>) -> SubstrateResult<usize> {
        match sock.socktype {
            SocketType::Stream => {
                let conn = {
                    let inner = sock.inner.lock();
                    if dest.is_some() && inner.conn.is_some() {
                        return Err(SubstrateError::IsConn);
                    }
                    if inner.shut_write {
                        return Err(SubstrateError::Pipe);
                    }
                    inner.conn.clone().ok_or(SubstrateError::NotConn)?
                };
                conn.tx.write_to_pipe(buf, false)
            }
            SocketType::Datagram => {
                if buf.len() > MAX_DATAGRAM_SIZE {
                    return Err(SubstrateError::MsgSize);
                }
                let target = match dest {
                    Some(dest) => dest.clone(),
                    None => sock.inner.lock().peer.clone().ok_or(SubstrateError::DestAddrReq)?,
                };
                if target.family() != sock.family {
                    return Err(SubstrateError::AfNoSupport);
                }
                if !is_local(&target) {
                    return Err(SubstrateError::NetUnreach);
                }
                if sock.inner.lock().shut_write {
                    return Err(SubstrateError::Pipe);
                }
                self.autobind(sock)?;
                let source = source_for(sock.local_addr(), &target);

                // nobody listening on that port just drops the datagram
                if let Some(receiver) = self.find_bound(SocketType::Datagram, &target) {
                    let mut rinner = receiver.inner.lock();
                    if rinner.datagrams.len() < MAX_QUEUED_DATAGRAMS && !rinner.closed {
                        rinner.datagrams.push_back((buf.to_vec(), source));
                    }
                }
                Ok(buf.len())
            }
        }
    }

    pub fn recv(&self, sock: &RustRfc<MemSocket>, buf: &mut [u8], peek: bool) -> SubstrateResult<(usize, Option<Endpoint>)> {
        match sock.socktype {
            SocketType::Stream => {
                let (conn, peer) = {
                    let inner = sock.inner.lock();
                    if inner.shut_read {
                        return Ok((0, inner.peer.clone()));
                    }
                    (inner.conn.clone().ok_or(SubstrateError::NotConn)?, inner.peer.clone())
                };

                {
                    let mut stash = sock.last_peek.lock();
                    if !stash.is_empty() {
                        let count = min(buf.len(), stash.len());
                        buf[..count].copy_from_slice(&stash[..count]);
                        if !peek {
                            stash.drain(..count);
                        }
                        return Ok((count, peer));
                    }
                }

                if !peek {
                    let count = conn.rx.read_from_pipe(buf, false)?;
                    return Ok((count, peer));
                }

                let mut tmp = vec![0u8; buf.len()];
                let count = conn.rx.read_from_pipe(&mut tmp, false)?;
                buf[..count].copy_from_slice(&tmp[..count]);
                sock.last_peek.lock().extend_from_slice(&tmp[..count]);
                Ok((count, peer))
            }
            SocketType::Datagram => loop {
                {
                    let mut inner = sock.inner.lock();
                    let popped = if peek {
                        inner.datagrams.front().cloned()
                    } else {
                        inner.datagrams.pop_front()
                    };
                    if let Some((data, source)) = popped {
                        // the rest of a datagram that does not fit is discarded
                        let count = min(buf.len(), data.len());
                        buf[..count].copy_from_slice(&data[..count]);
                        return Ok((count, Some(source)));
                    }
                    if inner.shut_read {
                        return Ok((0, None));
                    }
                }
                interface::sleep(interface::BLOCK_TIME);
            },
        }
    }

    pub fn shutdown(&self, sock: &RustRfc<MemSocket>, how: Shutdown) -> SubstrateResult<()> {
        let mut inner = sock.inner.lock();
        if sock.socktype == SocketType::Stream && inner.conn.is_none() {
            return Err(SubstrateError::NotConn);
        }
        if matches!(how, Shutdown::Read | Shutdown::Both) {
            inner.shut_read = true;
        }
        if matches!(how, Shutdown::Write | Shutdown::Both) && !inner.shut_write {
            inner.shut_write = true;
            if let Some(conn) = &inner.conn {
                // the peer drains what was sent and then reads EOF
                conn.tx.set_eof();
            }
        }
        Ok(())
    }

    pub fn set_option(&self, sock: &RustRfc<MemSocket>, option: SocketOption, value: u64) -> SubstrateResult<()> {
        match option {
            SocketOption::ReuseAddr => {
                sock.inner.lock().reuseaddr = value != 0;
                Ok(())
            }
            // accepted and ignored, the loopback has no buffers or timers to tune
            _ => Ok(()),
        }
    }

    /// Tears down a socket whose last handle was released
    pub fn close(&self, sock: &RustRfc<MemSocket>) {
        self.bindings.lock().retain(|b| !RustRfc::ptr_eq(&b.socket, sock));

        let (conn, pending) = {
            let mut inner = sock.inner.lock();
            inner.closed = true;
            inner.listening = false;
            (inner.conn.take(), std::mem::take(&mut inner.pending))
        };
        if let Some(conn) = conn {
            conn.tx.decr_ref(PipeEnd::Write);
            conn.rx.decr_ref(PipeEnd::Read);
        }
        // connections nobody accepted are reset so their clients see EOF
        for orphan in pending {
            self.close(&orphan);
        }
    }
}

#[cfg(test)]
mod memnet_tests {
    use super::*;

    fn v4(port: u16) -> Endpoint {
        Endpoint::V4 {
            addr: [127, 0, 0, 1],
            port: port,
        }
    }

    #[test]
    fn ut_memnet_stream_roundtrip() {
        let net = MemNet::new(1024);
        let listener = MemSocket::new(AddressFamily::Inet, SocketType::Stream);
        net.bind(&listener, &v4(5000)).unwrap();
        net.listen(&listener, 4).unwrap();

        let client = MemSocket::new(AddressFamily::Inet, SocketType::Stream);
        net.connect(&client, &v4(5000)).unwrap();
        let (server, peer) = net.accept(&listener).unwrap();
        assert_eq!(peer, client.local_addr());

        assert_eq!(net.send(&client, b"ping", None), Ok(4));
        let mut buf = [0u8; 8];
        assert_eq!(net.recv(&server, &mut buf, true).unwrap().0, 4);
        assert_eq!(net.recv(&server, &mut buf, false).unwrap().0, 4);
        assert_eq!(&buf[..4], b"ping");
        assert!(server.readiness(Interest::Read).is_none());
    }

    #[test]
    fn ut_memnet_bind_conflicts() {
        let net = MemNet::new(1024);
        let a = MemSocket::new(AddressFamily::Inet, SocketType::Stream);
        let b = MemSocket::new(AddressFamily::Inet, SocketType::Stream);
        let c = MemSocket::new(AddressFamily::Inet, SocketType::Datagram);
        net.bind(&a, &v4(6000)).unwrap();
        assert_eq!(net.bind(&b, &v4(6000)), Err(SubstrateError::AddrInUse));
        assert_eq!(net.bind(&c, &v4(6000)), Ok(()));
        let remote = Endpoint::V4 {
            addr: [10, 0, 0, 1],
            port: 80,
        };
        assert_eq!(net.bind(&b, &remote), Err(SubstrateError::AddrNotAvail));
    }

    #[test]
    fn ut_memnet_connect_failures() {
        let net = MemNet::new(1024);
        let client = MemSocket::new(AddressFamily::Inet, SocketType::Stream);
        assert_eq!(net.connect(&client, &v4(7000)), Err(SubstrateError::ConnRefused));
        let remote = Endpoint::V4 {
            addr: [192, 168, 1, 1],
            port: 7000,
        };
        assert_eq!(net.connect(&client, &remote), Err(SubstrateError::NetUnreach));
    }
}
