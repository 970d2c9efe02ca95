//! File and directory handles (C7).

use crate::consts::{FileType, Mode, S_IFMT};
use crate::dir::{self, DirEntry};
use crate::error::Result;
use crate::fs::FileSystem;
use crate::inode::Inode;

/// Owner name or, when the host has no matching passwd/group entry, the raw
/// numeric id — the same "resolve or fall back to the raw value" shape as
/// passwd/group lookups elsewhere in this ecosystem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Owner {
    Name(String),
    Id(u32),
}

impl std::fmt::Display for Owner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Owner::Name(n) => write!(f, "{n}"),
            Owner::Id(id) => write!(f, "{id}"),
        }
    }
}

/// Metadata shared by file and directory handles.
#[derive(Debug, Clone)]
pub struct Metadata {
    pub inode_no: u32,
    pub path: String,
    pub mode: Mode,
    pub mode_str: String,
    pub mode_octal: u32,
    pub size: u64,
    pub blocks: u64,
    pub links: u16,
    pub uid: u32,
    pub gid: u32,
    pub atime: u32,
    pub mtime: u32,
    pub ctime: u32,
    pub crtime: u32,
    pub file_acl: u64,
}

impl Metadata {
    fn from_inode(inode_no: u32, path: String, inode: &Inode) -> Self {
        Self {
            inode_no,
            path,
            mode: inode.mode,
            mode_str: format_mode_str(inode.mode),
            mode_octal: format_mode_octal(inode.mode),
            size: inode.size,
            blocks: inode.blocks,
            links: inode.links_count,
            uid: inode.uid,
            gid: inode.gid,
            atime: inode.atime,
            mtime: inode.mtime,
            ctime: inode.ctime,
            crtime: inode.crtime,
            file_acl: inode.file_acl,
        }
    }

    pub fn name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }

    /// Resolves `uid` against the host's passwd database, falling back to the
    /// numeric id if there's no matching entry.
    pub fn owner(&self) -> Owner {
        lookup_user_name(self.uid).map(Owner::Name).unwrap_or(Owner::Id(self.uid))
    }

    /// Resolves `gid` against the host's group database, falling back to the
    /// numeric id if there's no matching entry.
    pub fn group(&self) -> Owner {
        lookup_group_name(self.gid).map(Owner::Name).unwrap_or(Owner::Id(self.gid))
    }
}

/// `rwx`-style mode string, e.g. `drwxr-xr-x`.
fn format_mode_str(mode: Mode) -> String {
    let bits = mode.bits();
    let mut s = String::with_capacity(10);
    s.push(if bits & S_IFMT == Mode::S_IFDIR.bits() { 'd' } else { '-' });
    let triplet = |r: u16, w: u16, x: u16| -> [char; 3] {
        [
            if bits & r != 0 { 'r' } else { '-' },
            if bits & w != 0 { 'w' } else { '-' },
            if bits & x != 0 { 'x' } else { '-' },
        ]
    };
    s.extend(triplet(Mode::S_IRUSR.bits(), Mode::S_IWUSR.bits(), Mode::S_IXUSR.bits()));
    s.extend(triplet(Mode::S_IRGRP.bits(), Mode::S_IWGRP.bits(), Mode::S_IXGRP.bits()));
    s.extend(triplet(Mode::S_IROTH.bits(), Mode::S_IWOTH.bits(), Mode::S_IXOTH.bits()));
    s
}

/// Octal permission bits, e.g. `0o755`.
fn format_mode_octal(mode: Mode) -> u32 {
    let bits = mode.bits();
    let mut n = 0u32;
    let bit = |flag: u16, value: u32| -> u32 { if bits & flag != 0 { value } else { 0 } };
    n += bit(Mode::S_IRUSR.bits(), 4 * 64) + bit(Mode::S_IWUSR.bits(), 2 * 64) + bit(Mode::S_IXUSR.bits(), 64);
    n += bit(Mode::S_IRGRP.bits(), 4 * 8) + bit(Mode::S_IWGRP.bits(), 2 * 8) + bit(Mode::S_IXGRP.bits(), 8);
    n += bit(Mode::S_IROTH.bits(), 4) + bit(Mode::S_IWOTH.bits(), 2) + bit(Mode::S_IXOTH.bits(), 1);
    n
}

fn lookup_user_name(uid: u32) -> Option<String> {
    let mut buf = vec![0i8; 16384];
    let mut pwd: libc::passwd = unsafe { std::mem::zeroed() };
    let mut result: *mut libc::passwd = std::ptr::null_mut();
    let ret = unsafe {
        libc::getpwuid_r(uid, &mut pwd, buf.as_mut_ptr(), buf.len(), &mut result)
    };
    if ret != 0 || result.is_null() {
        return None;
    }
    let name = unsafe { std::ffi::CStr::from_ptr(pwd.pw_name) };
    Some(name.to_string_lossy().into_owned())
}

fn lookup_group_name(gid: u32) -> Option<String> {
    let mut buf = vec![0i8; 16384];
    let mut grp: libc::group = unsafe { std::mem::zeroed() };
    let mut result: *mut libc::group = std::ptr::null_mut();
    let ret = unsafe {
        libc::getgrgid_r(gid, &mut grp, buf.as_mut_ptr(), buf.len(), &mut result)
    };
    if ret != 0 || result.is_null() {
        return None;
    }
    let name = unsafe { std::ffi::CStr::from_ptr(grp.gr_name) };
    Some(name.to_string_lossy().into_owned())
}

/// Strips trailing zero bytes, matching `del_trailing_zeros` in the original
/// tool: file content is read in whole blocks, and the final block is
/// zero-padded past the logical file size.
pub fn trim_trailing_zeros(data: &mut Vec<u8>) {
    while data.last() == Some(&0) {
        data.pop();
    }
}

/// A handle onto a regular file: metadata plus a lazily-read byte stream.
pub struct FileHandle<'fs> {
    fs: &'fs FileSystem,
    pub metadata: Metadata,
}

impl<'fs> FileHandle<'fs> {
    pub(crate) fn new(fs: &'fs FileSystem, inode_no: u32, path: String, inode: &Inode) -> Self {
        Self {
            fs,
            metadata: Metadata::from_inode(inode_no, path, inode),
        }
    }

    /// Reads the whole file, with the final block's zero padding trimmed.
    pub fn read(&self) -> Result<Vec<u8>> {
        let inode = self.fs.open_inode(self.metadata.inode_no)?;
        let mut data = self.fs.extract_file_bytes(&inode)?;
        trim_trailing_zeros(&mut data);
        Ok(data)
    }

    /// Reads the file and decodes it with `encoding`, splitting on `\n`.
    pub fn read_lines(&self, decode: impl Fn(&[u8]) -> String) -> Result<Vec<String>> {
        let data = self.read()?;
        Ok(decode(&data).split('\n').map(str::to_string).collect())
    }
}

/// A handle onto a directory: metadata plus entry listing/lookup.
pub struct DirHandle<'fs> {
    fs: &'fs FileSystem,
    pub metadata: Metadata,
}

impl<'fs> DirHandle<'fs> {
    pub(crate) fn new(fs: &'fs FileSystem, inode_no: u32, path: String, inode: &Inode) -> Self {
        Self {
            fs,
            metadata: Metadata::from_inode(inode_no, path, inode),
        }
    }

    /// All entries, including `.` and `..`.
    pub fn entries(&self) -> Result<Vec<DirEntry>> {
        let inode = self.fs.open_inode(self.metadata.inode_no)?;
        let blocks = self.fs.extract_file_blocks(&inode)?;
        dir::parse_blocks(blocks.iter().map(|b| b.as_slice()))
    }

    /// Entries whose inode's mode indicates a regular file.
    pub fn files(&self) -> Result<Vec<DirEntry>> {
        self.filter_by_type(FileType::Regular)
    }

    /// Entries whose inode's mode indicates a directory.
    pub fn directories(&self) -> Result<Vec<DirEntry>> {
        self.filter_by_type(FileType::Directory)
    }

    fn filter_by_type(&self, wanted: FileType) -> Result<Vec<DirEntry>> {
        Ok(self
            .entries()?
            .into_iter()
            .filter(|e| e.file_type == wanted)
            .collect())
    }

    /// Looks up an entry by exact byte-equal name.
    pub fn get(&self, name: &[u8]) -> Option<DirEntry> {
        self.entries().ok().and_then(|es| dir::find(&es, name).cloned())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::consts::Mode;

    #[test]
    fn formats_rwxr_xr_x_directory() {
        let mode = Mode::S_IFDIR
            | Mode::S_IRUSR
            | Mode::S_IWUSR
            | Mode::S_IXUSR
            | Mode::S_IRGRP
            | Mode::S_IXGRP
            | Mode::S_IROTH
            | Mode::S_IXOTH;
        assert_eq!(format_mode_str(mode), "drwxr-xr-x");
        assert_eq!(format_mode_octal(mode), 0o755);
    }

    #[test]
    fn trims_trailing_zeros() {
        let mut data = vec![1, 2, 3, 0, 0, 0];
        trim_trailing_zeros(&mut data);
        assert_eq!(data, vec![1, 2, 3]);
    }
}
