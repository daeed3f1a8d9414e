// File related interface
//
// The in-memory inode tree behind the MemSubstrate filesystem. Paths are
// always resolved relative to a directory inode the caller already holds,
// and resolution may never climb above that directory.

use crate::interface::misc::{RustAtomicOrdering, RustAtomicU64, RustBTreeMap, RustDeque, RustLock, RustRfc};
use crate::interface::substrate::{DirEntry, HandleKind, OpenFlags, SubstrateError, SubstrateResult};
use std::cmp::min;

pub const MAX_SYMLINK_HOPS: usize = 40;
pub const MAX_FILENAME_LENGTH: usize = 255;
const ROOT_INODE: u64 = 1;

#[derive(Debug)]
pub enum Inode {
    File(FileInode),
    Dir(DirInode),
    Symlink(SymlinkInode),
}

#[derive(Debug)]
pub struct FileInode {
    pub ino: u64,
    data: RustLock<Vec<u8>>,
}

#[derive(Debug)]
pub struct DirInode {
    pub ino: u64,
    entries: RustLock<RustBTreeMap<String, RustRfc<Inode>>>,
}

#[derive(Debug)]
pub struct SymlinkInode {
    pub ino: u64,
    pub target: String,
}

impl FileInode {
    pub fn size(&self) -> u64 {
        self.data.read().len() as u64
    }

    pub fn read_at(&self, buf: &mut [u8], offset: u64) -> usize {
        let data = self.data.read();
        let offset = offset as usize;
        if offset >= data.len() {
            return 0;
        }
        let count = min(buf.len(), data.len() - offset);
        buf[..count].copy_from_slice(&data[offset..offset + count]);
        count
    }

    // writing past the end zero-fills the gap, like a sparse file reads back
    pub fn write_at(&self, buf: &[u8], offset: u64) -> usize {
        let mut data = self.data.write();
        let offset = offset as usize;
        let end = offset + buf.len();
        if end > data.len() {
            data.resize(end, 0);
        }
        data[offset..end].copy_from_slice(buf);
        buf.len()
    }

    pub fn append(&self, buf: &[u8]) -> (usize, u64) {
        let mut data = self.data.write();
        data.extend_from_slice(buf);
        (buf.len(), data.len() as u64)
    }

    pub fn set_size(&self, size: u64) {
        self.data.write().resize(size as usize, 0);
    }
}

impl DirInode {
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    pub fn lookup(&self, name: &str) -> Option<RustRfc<Inode>> {
        self.entries.read().get(name).cloned()
    }

    /// Entry number `cookie` in name order
    pub fn entry_at(&self, cookie: u64) -> Option<DirEntry> {
        let entries = self.entries.read();
        entries.iter().nth(cookie as usize).map(|(name, inode)| DirEntry {
            name: name.clone(),
            kind: inode.kind(),
            ino: inode.ino(),
        })
    }
}

impl Inode {
    pub fn ino(&self) -> u64 {
        match self {
            Inode::File(f) => f.ino,
            Inode::Dir(d) => d.ino,
            Inode::Symlink(l) => l.ino,
        }
    }

    pub fn kind(&self) -> HandleKind {
        match self {
            Inode::File(_) => HandleKind::RegularFile,
            Inode::Dir(_) => HandleKind::Directory,
            Inode::Symlink(_) => HandleKind::SymbolicLink,
        }
    }

    pub fn size(&self) -> u64 {
        match self {
            Inode::File(f) => f.size(),
            Inode::Dir(d) => d.len() as u64,
            Inode::Symlink(l) => l.target.len() as u64,
        }
    }

    pub fn nlink(&self) -> u64 {
        match self {
            Inode::Dir(_) => 2,
            _ => 1,
        }
    }
}

// Result of walking a path: the directory holding the last component, the
// component name (None when the path named the start directory or a dot
// entry), and the inode it names if there is one.
struct Walked {
    parent: RustRfc<Inode>,
    name: Option<String>,
    found: Option<RustRfc<Inode>>,
}

#[derive(Debug)]
pub struct MemFs {
    root: RustRfc<Inode>,
    nextino: RustAtomicU64,
}

impl Default for MemFs {
    fn default() -> Self {
        Self::new()
    }
}

impl MemFs {
    pub fn new() -> MemFs {
        MemFs {
            root: RustRfc::new(Inode::Dir(DirInode {
                ino: ROOT_INODE,
                entries: RustLock::new(RustBTreeMap::new()),
            })),
            nextino: RustAtomicU64::new(ROOT_INODE + 1),
        }
    }

    pub fn root(&self) -> RustRfc<Inode> {
        self.root.clone()
    }

    fn next_ino(&self) -> u64 {
        self.nextino.fetch_add(1, RustAtomicOrdering::Relaxed)
    }

    fn walk(&self, start: &RustRfc<Inode>, path: &str, follow_final: bool) -> SubstrateResult<Walked> {
        if path.is_empty() {
            return Err(SubstrateError::NoEnt);
        }
        if path.starts_with('/') {
            return Err(SubstrateError::NotCapable);
        }

        // directories walked so far, popping below the start is an escape
        let mut stack: Vec<RustRfc<Inode>> = vec![start.clone()];
        let mut pending: RustDeque<String> = path
            .split('/')
            .filter(|c| !c.is_empty())
            .map(String::from)
            .collect();
        let mut hops = 0;

        while let Some(component) = pending.pop_front() {
            let is_last = pending.is_empty();
            let dir = stack[stack.len() - 1].clone();

            match component.as_str() {
                "." => continue,
                ".." => {
                    if stack.len() == 1 {
                        return Err(SubstrateError::NotCapable);
                    }
                    stack.pop();
                    continue;
                }
                name => {
                    if name.len() > MAX_FILENAME_LENGTH {
                        return Err(SubstrateError::NameTooLong);
                    }
                    let dirinode = match &*dir {
                        Inode::Dir(d) => d,
                        _ => return Err(SubstrateError::NotDir),
                    };
                    let child = match dirinode.lookup(name) {
                        Some(child) => child,
                        None if is_last => {
                            return Ok(Walked {
                                parent: dir.clone(),
                                name: Some(name.to_string()),
                                found: None,
                            })
                        }
                        None => return Err(SubstrateError::NoEnt),
                    };

                    match &*child {
                        Inode::Symlink(link) if !is_last || follow_final => {
                            hops += 1;
                            if hops > MAX_SYMLINK_HOPS {
                                return Err(SubstrateError::Loop);
                            }
                            if link.target.starts_with('/') {
                                return Err(SubstrateError::NotCapable);
                            }
                            if link.target.is_empty() {
                                return Err(SubstrateError::NoEnt);
                            }
                            for part in link.target.split('/').rev().filter(|c| !c.is_empty()) {
                                pending.push_front(part.to_string());
                            }
                        }
                        Inode::Dir(_) if !is_last => stack.push(child.clone()),
                        _ if is_last => {
                            return Ok(Walked {
                                parent: dir.clone(),
                                name: Some(name.to_string()),
                                found: Some(child.clone()),
                            })
                        }
                        _ => return Err(SubstrateError::NotDir),
                    }
                }
            }
        }

        // the path ended on a dot entry, it names the directory we are in
        let here = stack[stack.len() - 1].clone();
        Ok(Walked {
            parent: here.clone(),
            name: None,
            found: Some(here),
        })
    }

    /// Resolves `path` under `start`, creating a regular file if asked to
    pub fn open(
        &self,
        start: &RustRfc<Inode>,
        path: &str,
        follow: bool,
        oflags: OpenFlags,
    ) -> SubstrateResult<RustRfc<Inode>> {
        let walked = self.walk(start, path, follow)?;

        if let Some(node) = walked.found {
            if oflags.contains(OpenFlags::CREATE | OpenFlags::EXCLUSIVE) {
                return Err(SubstrateError::Exist);
            }
            return Self::open_existing(node, oflags);
        }

        if !oflags.contains(OpenFlags::CREATE) {
            return Err(SubstrateError::NoEnt);
        }
        if oflags.contains(OpenFlags::DIRECTORY) {
            return Err(SubstrateError::Invalid);
        }
        let name = walked.name.ok_or(SubstrateError::Exist)?;
        let parent = match &*walked.parent {
            Inode::Dir(d) => d,
            _ => return Err(SubstrateError::NotDir),
        };

        // someone may have created it since the walk, decide under the lock
        let mut entries = parent.entries.write();
        if let Some(existing) = entries.get(&name).cloned() {
            drop(entries);
            if oflags.contains(OpenFlags::EXCLUSIVE) {
                return Err(SubstrateError::Exist);
            }
            return Self::open_existing(existing, oflags);
        }
        let node = RustRfc::new(Inode::File(FileInode {
            ino: self.next_ino(),
            data: RustLock::new(Vec::new()),
        }));
        entries.insert(name, node.clone());
        Ok(node)
    }

    fn open_existing(node: RustRfc<Inode>, oflags: OpenFlags) -> SubstrateResult<RustRfc<Inode>> {
        match &*node {
            // only reachable with symlink following off
            Inode::Symlink(_) => Err(SubstrateError::Loop),
            Inode::File(_) if oflags.contains(OpenFlags::DIRECTORY) => Err(SubstrateError::NotDir),
            Inode::File(f) => {
                if oflags.contains(OpenFlags::TRUNCATE) {
                    f.set_size(0);
                }
                Ok(node.clone())
            }
            Inode::Dir(_) => Ok(node.clone()),
        }
    }

    fn insert_new(&self, start: &RustRfc<Inode>, path: &str, make: impl FnOnce(u64) -> Inode) -> SubstrateResult<()> {
        let walked = self.walk(start, path, false)?;
        if walked.found.is_some() {
            return Err(SubstrateError::Exist);
        }
        let name = walked.name.ok_or(SubstrateError::Exist)?;
        let parent = match &*walked.parent {
            Inode::Dir(d) => d,
            _ => return Err(SubstrateError::NotDir),
        };
        let mut entries = parent.entries.write();
        if entries.contains_key(&name) {
            return Err(SubstrateError::Exist);
        }
        entries.insert(name, RustRfc::new(make(self.next_ino())));
        Ok(())
    }

    pub fn mkdir(&self, start: &RustRfc<Inode>, path: &str) -> SubstrateResult<()> {
        self.insert_new(start, path, |ino| {
            Inode::Dir(DirInode {
                ino: ino,
                entries: RustLock::new(RustBTreeMap::new()),
            })
        })
    }

    pub fn symlink(&self, start: &RustRfc<Inode>, target: &str, path: &str) -> SubstrateResult<()> {
        if target.is_empty() {
            return Err(SubstrateError::NoEnt);
        }
        let target = target.to_string();
        self.insert_new(start, path, |ino| {
            Inode::Symlink(SymlinkInode {
                ino: ino,
                target: target,
            })
        })
    }
}

#[cfg(test)]
mod memfs_tests {
    use super::*;

    #[test]
    fn ut_memfs_create_and_reopen() {
        let fs = MemFs::new();
        let root = fs.root();
        fs.mkdir(&root, "dir").unwrap();
        let created = fs.open(&root, "dir/a.txt", true, OpenFlags::CREATE).unwrap();
        let reopened = fs.open(&root, "./dir/../dir/a.txt", true, OpenFlags::empty()).unwrap();
        assert_eq!(created.ino(), reopened.ino());
        assert_eq!(
            fs.open(&root, "dir/a.txt", true, OpenFlags::CREATE | OpenFlags::EXCLUSIVE).unwrap_err(),
            SubstrateError::Exist
        );
    }

    #[test]
    fn ut_memfs_rejects_escape() {
        let fs = MemFs::new();
        let root = fs.root();
        fs.mkdir(&root, "sub").unwrap();
        assert_eq!(fs.open(&root, "sub/../..", true, OpenFlags::empty()).unwrap_err(), SubstrateError::NotCapable);
        assert_eq!(fs.open(&root, "/etc", true, OpenFlags::empty()).unwrap_err(), SubstrateError::NotCapable);
    }

    #[test]
    fn ut_memfs_symlink_loop_and_follow() {
        let fs = MemFs::new();
        let root = fs.root();
        fs.open(&root, "target", true, OpenFlags::CREATE).unwrap();
        fs.symlink(&root, "target", "link").unwrap();
        fs.symlink(&root, "loop_b", "loop_a").unwrap();
        fs.symlink(&root, "loop_a", "loop_b").unwrap();

        let through = fs.open(&root, "link", true, OpenFlags::empty()).unwrap();
        assert_eq!(through.kind(), HandleKind::RegularFile);
        assert_eq!(fs.open(&root, "link", false, OpenFlags::empty()).unwrap_err(), SubstrateError::Loop);
        assert_eq!(fs.open(&root, "loop_a", true, OpenFlags::empty()).unwrap_err(), SubstrateError::Loop);
    }

    #[test]
    fn ut_memfs_file_data() {
        let fs = MemFs::new();
        let root = fs.root();
        let node = fs.open(&root, "data", true, OpenFlags::CREATE).unwrap();
        if let Inode::File(f) = &*node {
            assert_eq!(f.write_at(b"abc", 2), 3);
            let mut buf = [9u8; 8];
            assert_eq!(f.read_at(&mut buf, 0), 5);
            assert_eq!(&buf[..5], &[0, 0, b'a', b'b', b'c']);
            assert_eq!(f.append(b"d"), (1, 6));
        } else {
            panic!("expected a regular file");
        }
    }
}
