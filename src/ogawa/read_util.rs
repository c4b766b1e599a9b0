//! Decoding of the archive tables and header blocks.

use byteorder::{LittleEndian, ReadBytesExt};

use super::format::{info, INLINE_METADATA};
use crate::core::{Digest, MetaData, PropertyHeader, PropertyType, TimeSampling};
use crate::util::{DataType, Error, PlainOldDataType, Result};

/// Little-endian cursor whose failures are malformed-archive errors.
pub(crate) struct ByteReader<'a> {
    buf: &'a [u8],
    what: &'static str,
}

impl<'a> ByteReader<'a> {
    pub fn new(buf: &'a [u8], what: &'static str) -> Self {
        Self { buf, what }
    }

    fn truncated(&self) -> Error {
        Error::malformed(format!("{} truncated", self.what))
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    #[inline]
    pub fn remaining(&self) -> usize {
        self.buf.len()
    }

    pub fn u8(&mut self) -> Result<u8> {
        self.buf.read_u8().map_err(|_| self.truncated())
    }

    pub fn u32(&mut self) -> Result<u32> {
        self.buf.read_u32::<LittleEndian>().map_err(|_| self.truncated())
    }

    pub fn i32(&mut self) -> Result<i32> {
        self.buf.read_i32::<LittleEndian>().map_err(|_| self.truncated())
    }

    pub fn f64(&mut self) -> Result<f64> {
        self.buf.read_f64::<LittleEndian>().map_err(|_| self.truncated())
    }

    pub fn bytes(&mut self, len: usize) -> Result<&'a [u8]> {
        if len > self.buf.len() {
            return Err(self.truncated());
        }
        let (head, tail) = self.buf.split_at(len);
        self.buf = tail;
        Ok(head)
    }

    /// u32 length then UTF-8 bytes.
    pub fn string(&mut self) -> Result<String> {
        let len = self.u32()? as usize;
        let bytes = self.bytes(len)?;
        Ok(String::from_utf8(bytes.to_vec())?)
    }

    /// Metadata index, then inline text when the index is 0xFF.
    pub fn meta(&mut self, indexed: &[MetaData]) -> Result<MetaData> {
        let index = self.u8()?;
        if index == INLINE_METADATA {
            return Ok(MetaData::parse(&self.string()?));
        }
        indexed
            .get(index as usize)
            .cloned()
            .ok_or_else(|| Error::malformed(format!("metadata index {index} outside table of {}", indexed.len())))
    }
}

/// Single i32 version blocks in the root group.
pub fn read_version(bytes: &[u8]) -> Result<i32> {
    ByteReader::new(bytes, "version block").i32()
}

/// Time-sampling table with the max sample count recorded for each entry.
pub fn read_time_samplings(bytes: &[u8]) -> Result<Vec<(TimeSampling, u32)>> {
    let mut r = ByteReader::new(bytes, "time sampling table");
    let mut out = Vec::new();
    while !r.is_empty() {
        let max_samples = r.u32()?;
        let tpc = r.f64()?;
        let count = r.u32()? as usize;
        if count == 0 || count.saturating_mul(8) > r.remaining() {
            return Err(Error::malformed(format!("time sampling with {count} stored times")));
        }
        let times = (0..count).map(|_| r.f64()).collect::<Result<Vec<_>>>()?;
        out.push((TimeSampling::from_stored(tpc, times)?, max_samples));
    }
    if out.is_empty() {
        out.push((TimeSampling::identity(), 0));
    }
    Ok(out)
}

/// Shared metadata strings. Entry 0 is always empty metadata.
pub fn read_indexed_metadata(bytes: &[u8]) -> Result<Vec<MetaData>> {
    let mut r = ByteReader::new(bytes, "indexed metadata table");
    let mut out = vec![MetaData::new()];
    while !r.is_empty() {
        let len = r.u8()? as usize;
        let text = std::str::from_utf8(r.bytes(len)?)
            .map_err(|e| Error::malformed(format!("indexed metadata: {e}")))?;
        out.push(MetaData::parse(text));
    }
    Ok(out)
}

/// Child headers of one object plus the object's own recorded hashes.
#[derive(Clone, Debug, Default)]
pub struct ObjectHeadersBlock {
    pub children: Vec<(String, MetaData)>,
    /// `(properties hash, children hash)` when digests are recorded.
    pub hashes: Option<(Digest, Digest)>,
}

pub fn read_object_headers(bytes: &[u8], indexed: &[MetaData], has_digests: bool) -> Result<ObjectHeadersBlock> {
    let (body, hashes) = if has_digests {
        let split = bytes
            .len()
            .checked_sub(2 * Digest::SIZE)
            .ok_or_else(|| Error::malformed("object headers missing hashes"))?;
        let (body, tail) = bytes.split_at(split);
        let props = Digest::from_slice(&tail[..Digest::SIZE]);
        let children = Digest::from_slice(&tail[Digest::SIZE..]);
        (body, props.zip(children))
    } else {
        (bytes, None)
    };

    let mut r = ByteReader::new(body, "object headers");
    let mut children = Vec::new();
    while !r.is_empty() {
        let name = r.string()?;
        if name.is_empty() {
            return Err(Error::malformed("object with empty name"));
        }
        let meta = r.meta(indexed)?;
        children.push((name, meta));
    }
    Ok(ObjectHeadersBlock { children, hashes })
}

/// A property header with its sample bookkeeping.
#[derive(Clone, Debug, PartialEq)]
pub struct PropertyRecord {
    pub header: PropertyHeader,
    pub num_samples: u32,
    pub first_changed: u32,
    pub last_changed: u32,
    /// All array samples had the same element count.
    pub homogeneous: bool,
}

impl PropertyRecord {
    pub fn compound(header: PropertyHeader) -> Self {
        Self {
            header,
            num_samples: 0,
            first_changed: 0,
            last_changed: 0,
            homogeneous: false,
        }
    }

    /// Stored child slot holding the sample at `index` (already clamped).
    pub fn stored_slot(&self, index: u32) -> u32 {
        if self.first_changed == 0 || index < self.first_changed {
            0
        } else if index >= self.last_changed {
            self.last_changed - self.first_changed + 1
        } else {
            index - self.first_changed + 1
        }
    }

    /// Number of distinct stored sample slots.
    pub fn num_stored(&self) -> u32 {
        match self.num_samples {
            0 => 0,
            _ if self.first_changed == 0 => 1,
            _ => self.last_changed - self.first_changed + 2,
        }
    }
}

pub fn read_property_headers(bytes: &[u8], indexed: &[MetaData]) -> Result<Vec<PropertyRecord>> {
    let mut r = ByteReader::new(bytes, "property headers");
    let mut out = Vec::new();
    while !r.is_empty() {
        let word = r.u32()?;
        let kind = PropertyType::from_u8((word & info::KIND_MASK) as u8)
            .ok_or_else(|| Error::malformed(format!("property kind {}", word & info::KIND_MASK)))?;

        let record = if kind == PropertyType::Compound {
            let name = r.string()?;
            let meta = r.meta(indexed)?;
            PropertyRecord::compound(PropertyHeader::compound(name, meta))
        } else {
            let pod = PlainOldDataType::from_u8(((word >> info::POD_SHIFT) & info::POD_MASK) as u8);
            let extent = ((word >> info::EXTENT_SHIFT) & info::EXTENT_MASK) as u8;
            if pod == PlainOldDataType::Unknown || extent == 0 {
                return Err(Error::malformed(format!("property info word {word:#x}")));
            }
            let num_samples = r.u32()?;
            let first_changed = r.u32()?;
            let last_changed = r.u32()?;
            let ts_index = r.u32()?;
            if first_changed > last_changed || last_changed >= num_samples.max(1) {
                return Err(Error::malformed(format!(
                    "changed range {first_changed}..{last_changed} for {num_samples} samples"
                )));
            }
            let name = r.string()?;
            let meta = r.meta(indexed)?;
            let data_type = DataType::new(pod, extent);
            let header = if kind == PropertyType::Scalar {
                PropertyHeader::scalar(name, data_type, ts_index, meta)
            } else {
                PropertyHeader::array(name, data_type, ts_index, meta)
            };
            PropertyRecord {
                header,
                num_samples,
                first_changed,
                last_changed,
                homogeneous: word & info::HOMOGENEOUS != 0,
            }
        };
        if record.header.name.is_empty() {
            return Err(Error::malformed("property with empty name"));
        }
        out.push(record);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(num: u32, first: u32, last: u32) -> PropertyRecord {
        PropertyRecord {
            header: PropertyHeader::scalar("x", DataType::FLOAT32, 0, MetaData::new()),
            num_samples: num,
            first_changed: first,
            last_changed: last,
            homogeneous: true,
        }
    }

    #[test]
    fn test_stored_slot_mapping() {
        // Constant: one stored slot.
        let constant = record(5, 0, 0);
        assert_eq!(constant.num_stored(), 1);
        assert!((0..5).all(|i| constant.stored_slot(i) == 0));

        // 0 0 1 2 2 2: first change at 2, last change at 3.
        let r = record(6, 2, 3);
        assert_eq!(r.num_stored(), 3);
        let slots: Vec<_> = (0..6).map(|i| r.stored_slot(i)).collect();
        assert_eq!(slots, vec![0, 0, 1, 2, 2, 2]);
    }

    #[test]
    fn test_reader_truncation_is_malformed() {
        let mut r = ByteReader::new(&[1, 2], "test block");
        assert!(matches!(r.u32(), Err(Error::MalformedArchive(_))));
    }

    #[test]
    fn test_bad_metadata_index() {
        let mut r = ByteReader::new(&[3], "test block");
        assert!(r.meta(&[MetaData::new()]).is_err());
    }
}
