// Socket address wire structures
//
// The POSIX sockaddr layouts applications pass across the call boundary, and
// the conversions between them and substrate endpoints. Decoding always looks
// at the family tag first and checks the length for that family before any
// other field is read.

use crate::interface::errnos::Errno;
use crate::interface::substrate::{AddressFamily, Endpoint};
use std::mem::size_of;
use std::str::from_utf8;

pub const FAMILY_UNIX: u16 = 1;
pub const FAMILY_INET: u16 = 2;
pub const FAMILY_INET6: u16 = 10;

pub const UNIX_PATH_MAX: usize = 108;
// sizeof(struct sockaddr_storage)
pub const MAX_SOCKADDR_LEN: usize = 128;

#[repr(C)]
#[derive(Debug, Hash, PartialEq, Eq, Clone, Copy, Default)]
pub struct V4Addr {
    pub s_addr: [u8; 4],
}

#[repr(C)]
#[derive(Debug, Hash, PartialEq, Eq, Clone, Copy, Default)]
pub struct SockaddrV4 {
    pub sin_family: u16,
    /// network byte order
    pub sin_port: u16,
    pub sin_addr: V4Addr,
    pub padding: u64,
}

#[repr(C)]
#[derive(Debug, Hash, PartialEq, Eq, Clone, Copy, Default)]
pub struct V6Addr {
    pub s6_addr: [u8; 16],
}

#[repr(C)]
#[derive(Debug, Hash, PartialEq, Eq, Clone, Copy, Default)]
pub struct SockaddrV6 {
    pub sin6_family: u16,
    /// network byte order
    pub sin6_port: u16,
    pub sin6_flowinfo: u32,
    pub sin6_addr: V6Addr,
    pub sin6_scope_id: u32,
}

#[repr(C)]
#[derive(Debug, Hash, PartialEq, Eq, Clone, Copy)]
pub struct SockaddrUnix {
    pub sun_family: u16,
    pub sun_path: [u8; UNIX_PATH_MAX],
}

impl Default for SockaddrUnix {
    fn default() -> Self {
        SockaddrUnix {
            sun_family: FAMILY_UNIX,
            sun_path: [0; UNIX_PATH_MAX],
        }
    }
}

pub fn new_sockaddr_unix(path: &[u8]) -> Result<SockaddrUnix, Errno> {
    // room for the terminating NUL
    if path.len() >= UNIX_PATH_MAX {
        return Err(Errno::EINVAL);
    }
    let mut sun_path = [0u8; UNIX_PATH_MAX];
    sun_path[..path.len()].copy_from_slice(path);
    Ok(SockaddrUnix {
        sun_family: FAMILY_UNIX,
        sun_path: sun_path,
    })
}

#[derive(Debug, Hash, PartialEq, Eq, Clone, Copy)]
pub enum GenSockaddr {
    Unix(SockaddrUnix),
    V4(SockaddrV4),
    V6(SockaddrV6),
}

impl GenSockaddr {
    pub fn get_family(&self) -> u16 {
        match self {
            GenSockaddr::Unix(unixaddr) => unixaddr.sun_family,
            GenSockaddr::V4(v4addr) => v4addr.sin_family,
            GenSockaddr::V6(v6addr) => v6addr.sin6_family,
        }
    }

    /// Port in host byte order, 0 for unix addresses
    pub fn port(&self) -> u16 {
        match self {
            GenSockaddr::Unix(_) => 0,
            GenSockaddr::V4(v4addr) => u16::from_be(v4addr.sin_port),
            GenSockaddr::V6(v6addr) => u16::from_be(v6addr.sin6_port),
        }
    }

    /// Path of a unix address up to its first NUL
    pub fn path(&self) -> Option<&str> {
        match self {
            GenSockaddr::Unix(unixaddr) => {
                let end = unixaddr
                    .sun_path
                    .iter()
                    .position(|b| *b == 0)
                    .unwrap_or(UNIX_PATH_MAX);
                from_utf8(&unixaddr.sun_path[..end]).ok()
            }
            _ => None,
        }
    }

    /// Size of the wire structure for this family
    pub fn wire_len(&self) -> usize {
        match self {
            GenSockaddr::Unix(_) => size_of::<SockaddrUnix>(),
            GenSockaddr::V4(_) => size_of::<SockaddrV4>(),
            GenSockaddr::V6(_) => size_of::<SockaddrV6>(),
        }
    }

    /// ### Description
    ///
    /// Decodes a caller supplied sockaddr. The family tag is read first, then
    /// the buffer length is checked against that family's layout, and only
    /// then are the remaining fields interpreted.
    ///
    /// ### Errors
    ///
    /// * `EINVAL` - the buffer is shorter than the tag or the family's
    ///   structure, longer than a sockaddr_storage, or the unix path is not
    ///   valid UTF-8
    /// * `EAFNOSUPPORT` - the family tag is not one we know, or the unix
    ///   address is in the abstract namespace (a NUL then a name). Unix
    ///   endpoints are string paths, so neither abstract names nor non UTF-8
    ///   paths can be carried.
    pub fn decode(bytes: &[u8]) -> Result<GenSockaddr, Errno> {
        if bytes.len() < size_of::<u16>() || bytes.len() > MAX_SOCKADDR_LEN {
            return Err(Errno::EINVAL);
        }
        let family = u16::from_ne_bytes([bytes[0], bytes[1]]);

        match family {
            FAMILY_INET => {
                if bytes.len() < size_of::<SockaddrV4>() {
                    return Err(Errno::EINVAL);
                }
                let mut addr = [0u8; 4];
                addr.copy_from_slice(&bytes[4..8]);
                Ok(GenSockaddr::V4(SockaddrV4 {
                    sin_family: family,
                    sin_port: u16::from_ne_bytes([bytes[2], bytes[3]]),
                    sin_addr: V4Addr { s_addr: addr },
                    padding: 0,
                }))
            }
            FAMILY_INET6 => {
                if bytes.len() < size_of::<SockaddrV6>() {
                    return Err(Errno::EINVAL);
                }
                let mut addr = [0u8; 16];
                addr.copy_from_slice(&bytes[8..24]);
                Ok(GenSockaddr::V6(SockaddrV6 {
                    sin6_family: family,
                    sin6_port: u16::from_ne_bytes([bytes[2], bytes[3]]),
                    sin6_flowinfo: u32::from_ne_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]),
                    sin6_addr: V6Addr { s6_addr: addr },
                    sin6_scope_id: u32::from_ne_bytes([bytes[24], bytes[25], bytes[26], bytes[27]]),
                }))
            }
            FAMILY_UNIX => {
                // sun_path need not fill the structure, but must fit in it
                let pathbytes = &bytes[2..];
                if pathbytes.first() == Some(&0) && pathbytes.iter().any(|b| *b != 0) {
                    return Err(Errno::EAFNOSUPPORT);
                }
                let end = pathbytes.iter().position(|b| *b == 0).unwrap_or(pathbytes.len());
                if end >= UNIX_PATH_MAX {
                    return Err(Errno::EINVAL);
                }
                let sockaddr = new_sockaddr_unix(&pathbytes[..end])?;
                let decoded = GenSockaddr::Unix(sockaddr);
                if decoded.path().is_none() {
                    return Err(Errno::EINVAL);
                }
                Ok(decoded)
            }
            _ => Err(Errno::EAFNOSUPPORT),
        }
    }

    /// ### Description
    ///
    /// Writes the wire structure into `out`, truncating to the caller's buffer
    /// the way getsockname/accept do. Returns the full length of the
    /// structure, which may exceed what was written.
    pub fn write_to(&self, out: &mut [u8]) -> u32 {
        let mut wire = [0u8; size_of::<SockaddrUnix>()];
        let len = self.wire_len();
        match self {
            GenSockaddr::V4(v4addr) => {
                wire[0..2].copy_from_slice(&v4addr.sin_family.to_ne_bytes());
                wire[2..4].copy_from_slice(&v4addr.sin_port.to_ne_bytes());
                wire[4..8].copy_from_slice(&v4addr.sin_addr.s_addr);
            }
            GenSockaddr::V6(v6addr) => {
                wire[0..2].copy_from_slice(&v6addr.sin6_family.to_ne_bytes());
                wire[2..4].copy_from_slice(&v6addr.sin6_port.to_ne_bytes());
                wire[4..8].copy_from_slice(&v6addr.sin6_flowinfo.to_ne_bytes());
                wire[8..24].copy_from_slice(&v6addr.sin6_addr.s6_addr);
                wire[24..28].copy_from_slice(&v6addr.sin6_scope_id.to_ne_bytes());
            }
            GenSockaddr::Unix(unixaddr) => {
                wire[0..2].copy_from_slice(&unixaddr.sun_family.to_ne_bytes());
                wire[2..len].copy_from_slice(&unixaddr.sun_path);
            }
        }
        let copied = len.min(out.len());
        out[..copied].copy_from_slice(&wire[..copied]);
        len as u32
    }

    /// Family as the substrate names it
    pub fn address_family(&self) -> AddressFamily {
        match self {
            GenSockaddr::Unix(_) => AddressFamily::Unix,
            GenSockaddr::V4(_) => AddressFamily::Inet,
            GenSockaddr::V6(_) => AddressFamily::Inet6,
        }
    }

    pub fn to_endpoint(&self) -> Endpoint {
        match self {
            GenSockaddr::V4(v4addr) => Endpoint::V4 {
                addr: v4addr.sin_addr.s_addr,
                port: self.port(),
            },
            GenSockaddr::V6(v6addr) => Endpoint::V6 {
                addr: v6addr.sin6_addr.s6_addr,
                port: self.port(),
                flowinfo: v6addr.sin6_flowinfo,
                scope_id: v6addr.sin6_scope_id,
            },
            GenSockaddr::Unix(_) => Endpoint::Unix {
                path: self.path().unwrap_or_default().to_string(),
            },
        }
    }
}

impl From<&Endpoint> for GenSockaddr {
    fn from(endpoint: &Endpoint) -> GenSockaddr {
        match endpoint {
            Endpoint::V4 { addr, port } => GenSockaddr::V4(SockaddrV4 {
                sin_family: FAMILY_INET,
                sin_port: port.to_be(),
                sin_addr: V4Addr { s_addr: *addr },
                padding: 0,
            }),
            Endpoint::V6 {
                addr,
                port,
                flowinfo,
                scope_id,
            } => GenSockaddr::V6(SockaddrV6 {
                sin6_family: FAMILY_INET6,
                sin6_port: port.to_be(),
                sin6_flowinfo: *flowinfo,
                sin6_addr: V6Addr { s6_addr: *addr },
                sin6_scope_id: *scope_id,
            }),
            // substrate paths are bounded by the same limit on the way in
            Endpoint::Unix { path } => {
                let bytes = path.as_bytes();
                let keep = bytes.len().min(UNIX_PATH_MAX - 1);
                let mut sun_path = [0u8; UNIX_PATH_MAX];
                sun_path[..keep].copy_from_slice(&bytes[..keep]);
                GenSockaddr::Unix(SockaddrUnix {
                    sun_family: FAMILY_UNIX,
                    sun_path: sun_path,
                })
            }
        }
    }
}

/// Builds the wire bytes for an IPv4 address, as a C caller would lay them out
pub fn encode_v4(addr: [u8; 4], port: u16) -> [u8; 16] {
    let mut out = [0u8; 16];
    GenSockaddr::from(&Endpoint::V4 { addr: addr, port: port }).write_to(&mut out);
    out
}
