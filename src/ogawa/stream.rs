//! Buffered append-only output stream with header patching.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::Path;

use byteorder::{LittleEndian, WriteBytesExt};

use super::format::*;
use crate::util::Result;

/// Output stream for one archive file.
pub struct OStream {
    writer: BufWriter<File>,
    pos: u64,
}

impl OStream {
    /// Create (truncating) and write an unsealed header.
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;

        let mut stream = Self {
            writer: BufWriter::with_capacity(2 * 1024 * 1024, file),
            pos: 0,
        };
        stream.write_bytes(OGAWA_MAGIC)?;
        stream.write_u8(NOT_FROZEN_FLAG)?;
        stream.write_u16(CURRENT_VERSION)?;
        stream.write_u64(0)?;
        Ok(stream)
    }

    /// Current write position.
    #[inline]
    pub fn pos(&self) -> u64 {
        self.pos
    }

    /// Append raw bytes.
    pub fn write_bytes(&mut self, data: &[u8]) -> Result<()> {
        self.writer.write_all(data)?;
        self.pos += data.len() as u64;
        Ok(())
    }

    pub fn write_u64(&mut self, value: u64) -> Result<()> {
        self.writer.write_u64::<LittleEndian>(value)?;
        self.pos += 8;
        Ok(())
    }

    pub fn write_u16(&mut self, value: u16) -> Result<()> {
        self.writer.write_u16::<LittleEndian>(value)?;
        self.pos += 2;
        Ok(())
    }

    pub fn write_u8(&mut self, value: u8) -> Result<()> {
        self.writer.write_u8(value)?;
        self.pos += 1;
        Ok(())
    }

    /// Data block from parts: size word then each part. Returns the data
    /// offset, or the empty-data offset when there are no bytes.
    pub fn write_data(&mut self, parts: &[&[u8]]) -> Result<u64> {
        let size: usize = parts.iter().map(|p| p.len()).sum();
        if size == 0 {
            return Ok(EMPTY_DATA);
        }
        let pos = self.pos;
        self.write_u64(size as u64)?;
        for part in parts {
            self.write_bytes(part)?;
        }
        Ok(make_data_offset(pos))
    }

    /// Group block. Returns the group offset, or 0 for no children.
    pub fn write_group(&mut self, children: &[u64]) -> Result<u64> {
        if children.is_empty() {
            return Ok(0);
        }
        let pos = self.pos;
        self.write_u64(children.len() as u64)?;
        for &child in children {
            self.write_u64(child)?;
        }
        Ok(make_group_offset(pos))
    }

    /// Point the header at the root group and mark the file frozen.
    pub fn seal(&mut self, root_pos: u64) -> Result<()> {
        self.writer.flush()?;
        let file = self.writer.get_mut();
        file.seek(SeekFrom::Start(ROOT_POS_OFFSET as u64))?;
        file.write_u64::<LittleEndian>(root_pos)?;
        file.seek(SeekFrom::Start(FROZEN_OFFSET as u64))?;
        file.write_u8(FROZEN_FLAG)?;
        file.seek(SeekFrom::Start(self.pos))?;
        file.sync_all()?;
        Ok(())
    }

    /// Flush buffered writes to the file.
    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}
