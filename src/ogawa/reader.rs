//! Container reader: header, groups and data blocks.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;
use std::sync::Arc;

use memmap2::Mmap;
use parking_lot::Mutex;
use tracing::debug;

use super::format::*;
use crate::util::{Error, Result};

/// Input streams over one archive file.
/// Supports both memory-mapped and buffered I/O modes.
pub struct IStreams {
    inner: StreamsInner,
    version: u16,
    frozen: bool,
    size: u64,
}

enum StreamsInner {
    Mmap(Mmap),
    File(Mutex<File>),
}

impl IStreams {
    /// Open with memory mapping.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_opts(path, true)
    }

    /// Open, optionally memory mapping the file.
    pub fn open_opts(path: impl AsRef<Path>, use_mmap: bool) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::FileNotFound(path.to_path_buf())
            } else {
                Error::Io(e)
            }
        })?;

        let size = file.metadata()?.len();
        if size < HEADER_SIZE as u64 {
            return Err(Error::UnexpectedEof(size));
        }

        let inner = if use_mmap {
            // Safety: the file is opened read-only; archives are immutable once sealed.
            let mmap = unsafe { Mmap::map(&file) }.map_err(|e| Error::MmapFailed(e.to_string()))?;
            StreamsInner::Mmap(mmap)
        } else {
            StreamsInner::File(Mutex::new(file))
        };

        let mut header = [0u8; HEADER_SIZE];
        read_at(&inner, 0, &mut header)?;
        let (version, frozen) = Self::parse_header(&header)?;
        debug!(path = %path.display(), size, version, mmap = use_mmap, "opened archive streams");

        Ok(Self { inner, version, frozen, size })
    }

    /// Validate magic and version; returns `(version, frozen)`.
    fn parse_header(data: &[u8]) -> Result<(u16, bool)> {
        if data.len() < HEADER_SIZE {
            return Err(Error::UnexpectedEof(data.len() as u64));
        }
        if &data[0..5] != OGAWA_MAGIC {
            return Err(Error::InvalidMagic);
        }
        let frozen = data[FROZEN_OFFSET] == FROZEN_FLAG;
        let version = u16::from_le_bytes([data[VERSION_OFFSET], data[VERSION_OFFSET + 1]]);
        if version != CURRENT_VERSION {
            return Err(Error::UnsupportedVersion(version));
        }
        Ok((version, frozen))
    }

    /// Whether the writer sealed the file.
    #[inline]
    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    /// Container version from the header.
    #[inline]
    pub fn version(&self) -> u16 {
        self.version
    }

    /// File size in bytes.
    #[inline]
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Root group position from the header.
    pub fn root_pos(&self) -> Result<u64> {
        self.read_u64(ROOT_POS_OFFSET as u64)
    }

    /// Root group of a sealed archive.
    pub fn root(self: &Arc<Self>) -> Result<IGroup> {
        if !self.frozen {
            return Err(Error::malformed("archive was never sealed"));
        }
        IGroup::new(Arc::clone(self), self.root_pos()?)
    }

    fn check_range(&self, pos: u64, len: usize) -> Result<()> {
        match pos.checked_add(len as u64) {
            Some(end) if end <= self.size => Ok(()),
            _ => Err(Error::UnexpectedEof(pos.saturating_add(len as u64))),
        }
    }

    /// Read `len` bytes at `pos`.
    pub fn read_bytes(&self, pos: u64, len: usize) -> Result<Vec<u8>> {
        self.check_range(pos, len)?;
        let mut buf = vec![0u8; len];
        read_at(&self.inner, pos, &mut buf)?;
        Ok(buf)
    }

    pub fn read_into(&self, pos: u64, buf: &mut [u8]) -> Result<()> {
        self.check_range(pos, buf.len())?;
        read_at(&self.inner, pos, buf)
    }

    /// Little-endian u64 at `pos`.
    pub fn read_u64(&self, pos: u64) -> Result<u64> {
        let mut buf = [0u8; 8];
        self.read_into(pos, &mut buf)?;
        Ok(u64::from_le_bytes(buf))
    }
}

fn read_at(inner: &StreamsInner, pos: u64, buf: &mut [u8]) -> Result<()> {
    match inner {
        StreamsInner::Mmap(mmap) => {
            let start = pos as usize;
            let src = mmap
                .get(start..start + buf.len())
                .ok_or(Error::UnexpectedEof(pos + buf.len() as u64))?;
            buf.copy_from_slice(src);
        }
        StreamsInner::File(file) => {
            let mut f = file.lock();
            f.seek(SeekFrom::Start(pos))?;
            f.read_exact(buf)?;
        }
    }
    Ok(())
}

/// A group: an ordered list of child offsets.
#[derive(Clone)]
pub struct IGroup {
    streams: Arc<IStreams>,
    pos: u64,
    child_offsets: Vec<u64>,
}

impl IGroup {
    /// Read the group at `pos`; position 0 is the empty group.
    pub fn new(streams: Arc<IStreams>, pos: u64) -> Result<Self> {
        let child_offsets = if pos == 0 {
            Vec::new()
        } else {
            let count = streams.read_u64(pos)?;
            let bytes = count
                .checked_mul(8)
                .filter(|b| *b <= streams.size())
                .ok_or_else(|| Error::malformed(format!("group at {pos} claims {count} children")))?;
            let raw = streams.read_bytes(pos + 8, bytes as usize)?;
            raw.chunks_exact(8)
                .map(|c| u64::from_le_bytes([c[0], c[1], c[2], c[3], c[4], c[5], c[6], c[7]]))
                .collect()
        };
        Ok(Self { streams, pos, child_offsets })
    }

    #[inline]
    pub fn pos(&self) -> u64 {
        self.pos
    }

    /// Number of child slots.
    #[inline]
    pub fn num_children(&self) -> u64 {
        self.child_offsets.len() as u64
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.child_offsets.is_empty()
    }

    #[inline]
    pub fn streams(&self) -> &Arc<IStreams> {
        &self.streams
    }

    /// Raw offset for a child (with group/data flag).
    pub fn child_offset(&self, index: u64) -> Result<u64> {
        self.child_offsets.get(index as usize).copied().ok_or_else(|| {
            Error::malformed(format!(
                "group at {} has {} children, wanted child {}",
                self.pos,
                self.child_offsets.len(),
                index
            ))
        })
    }

    /// Child `index` is a group.
    pub fn is_child_group(&self, index: u64) -> Result<bool> {
        Ok(is_group_offset(self.child_offset(index)?))
    }

    /// Child `index` is a data block.
    pub fn is_child_data(&self, index: u64) -> Result<bool> {
        Ok(is_data_offset(self.child_offset(index)?))
    }

    /// Open child `index` as a group.
    pub fn group(&self, index: u64) -> Result<IGroup> {
        let offset = self.child_offset(index)?;
        if !is_group_offset(offset) {
            return Err(Error::malformed(format!(
                "child {index} of group at {} is data, expected a group",
                self.pos
            )));
        }
        IGroup::new(Arc::clone(&self.streams), extract_offset(offset))
    }

    /// Open child `index` as a data block.
    pub fn data(&self, index: u64) -> Result<IData> {
        let offset = self.child_offset(index)?;
        if !is_data_offset(offset) {
            return Err(Error::malformed(format!(
                "child {index} of group at {} is a group, expected data",
                self.pos
            )));
        }
        IData::new(Arc::clone(&self.streams), extract_offset(offset))
    }
}

/// A sized data block.
pub struct IData {
    streams: Arc<IStreams>,
    pos: u64,
    size: u64,
}

impl IData {
    /// Read the block header at `pos`; position 0 is the empty block.
    pub fn new(streams: Arc<IStreams>, pos: u64) -> Result<Self> {
        let size = if pos == 0 { 0 } else { streams.read_u64(pos)? };
        Ok(Self { streams, pos, size })
    }

    /// Position of the block (its size word).
    #[inline]
    pub fn pos(&self) -> u64 {
        self.pos
    }

    /// Payload size, excluding the length prefix.
    #[inline]
    pub fn size(&self) -> u64 {
        self.size
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// The whole payload.
    pub fn read_all(&self) -> Result<Vec<u8>> {
        if self.size == 0 {
            return Ok(Vec::new());
        }
        let len = usize::try_from(self.size).map_err(|_| Error::UnexpectedEof(self.size))?;
        self.streams.read_bytes(self.pos + 8, len)
    }

    /// Fill `buf` from the start of the block.
    pub fn read_prefix(&self, buf: &mut [u8]) -> Result<()> {
        if buf.len() as u64 > self.size {
            return Err(Error::UnexpectedEof(self.pos + 8 + self.size));
        }
        self.streams.read_into(self.pos + 8, buf)
    }

    /// The whole block as UTF-8.
    pub fn read_string(&self) -> Result<String> {
        Ok(String::from_utf8(self.read_all()?)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_parsing() {
        let mut header = [0u8; 16];
        header[0..5].copy_from_slice(OGAWA_MAGIC);
        header[FROZEN_OFFSET] = FROZEN_FLAG;
        header[VERSION_OFFSET] = 1;

        let (version, frozen) = IStreams::parse_header(&header).unwrap();
        assert_eq!(version, 1);
        assert!(frozen);
    }

    #[test]
    fn test_invalid_magic() {
        assert!(matches!(IStreams::parse_header(&[0u8; 16]), Err(Error::InvalidMagic)));
    }

    #[test]
    fn test_unsupported_version() {
        let mut header = [0u8; 16];
        header[0..5].copy_from_slice(OGAWA_MAGIC);
        header[VERSION_OFFSET] = 9;
        assert!(matches!(IStreams::parse_header(&header), Err(Error::UnsupportedVersion(9))));
    }
}
