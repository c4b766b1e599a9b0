//! Encoding of the archive tables and header blocks.

use std::collections::HashMap;

use byteorder::{LittleEndian, WriteBytesExt};

use super::format::{info, INLINE_METADATA, LIBRARY_VERSION, MAX_INDEXED_METADATA, MAX_INDEXED_METADATA_LEN};
use super::read_util::PropertyRecord;
use crate::core::{Digest, MetaData, PropertyType, TimeSampling};

/// Library version string, e.g. `abcstore 0.1.0 (built Oct 19 2026 10:00:00)`.
pub fn library_version_string() -> String {
    let major = LIBRARY_VERSION / 10000;
    let minor = (LIBRARY_VERSION / 100) % 100;
    let patch = LIBRARY_VERSION % 100;
    let date = option_env!("ABCSTORE_BUILD_DATE").unwrap_or("unknown");
    let time = option_env!("ABCSTORE_BUILD_TIME").unwrap_or("unknown");
    format!("abcstore {major}.{minor}.{patch} (built {date} {time})")
}

/// Shared metadata strings, filled while writing headers.
#[derive(Default)]
pub struct MetaIndex {
    strings: Vec<String>,
    lookup: HashMap<String, u8>,
}

impl MetaIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Table index for `serialized`, or `None` when it has to be inlined.
    pub fn index_of(&mut self, serialized: &str) -> Option<u8> {
        if serialized.is_empty() {
            return Some(0);
        }
        if let Some(&i) = self.lookup.get(serialized) {
            return Some(i);
        }
        if serialized.len() > MAX_INDEXED_METADATA_LEN || self.strings.len() >= MAX_INDEXED_METADATA {
            return None;
        }
        self.strings.push(serialized.to_owned());
        let index = self.strings.len() as u8;
        self.lookup.insert(serialized.to_owned(), index);
        Some(index)
    }

    /// Table block; entry 0 (empty) is implicit.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        for s in &self.strings {
            out.push(s.len() as u8);
            out.extend_from_slice(s.as_bytes());
        }
        out
    }

    /// Number of distinct metadata entries indexed.
    pub fn len(&self) -> usize {
        self.strings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }
}

fn push_string(buf: &mut Vec<u8>, s: &str) {
    let _ = buf.write_u32::<LittleEndian>(s.len() as u32);
    buf.extend_from_slice(s.as_bytes());
}

fn push_meta(buf: &mut Vec<u8>, meta: &MetaData, index: &mut MetaIndex) {
    let serialized = meta.serialize();
    match index.index_of(&serialized) {
        Some(i) => buf.push(i),
        None => {
            buf.push(INLINE_METADATA);
            push_string(buf, &serialized);
        }
    }
}

/// The version data block.
pub fn encode_version(version: i32) -> Vec<u8> {
    version.to_le_bytes().to_vec()
}

/// Time-sampling table; one `(sampling, max samples)` pair per entry.
pub fn encode_time_samplings(entries: &[(TimeSampling, u32)]) -> Vec<u8> {
    let mut out = Vec::new();
    for (ts, max_samples) in entries {
        let times = ts.stored_times();
        let _ = out.write_u32::<LittleEndian>(*max_samples);
        let _ = out.write_f64::<LittleEndian>(ts.time_per_cycle());
        let _ = out.write_u32::<LittleEndian>(times.len() as u32);
        for &t in times {
            let _ = out.write_f64::<LittleEndian>(t);
        }
    }
    out
}

/// Child headers of one object, followed by its own hashes when recorded.
pub fn encode_object_headers<'a>(
    children: impl IntoIterator<Item = (&'a str, &'a MetaData)>,
    hashes: Option<(Digest, Digest)>,
    index: &mut MetaIndex,
) -> Vec<u8> {
    let mut out = Vec::new();
    for (name, meta) in children {
        push_string(&mut out, name);
        push_meta(&mut out, meta, index);
    }
    if let Some((props, kids)) = hashes {
        out.extend_from_slice(props.as_bytes());
        out.extend_from_slice(kids.as_bytes());
    }
    out
}

/// Header block of a compound property's children.
pub fn encode_property_headers<'a>(records: impl IntoIterator<Item = &'a PropertyRecord>, index: &mut MetaIndex) -> Vec<u8> {
    let mut out = Vec::new();
    for rec in records {
        let h = &rec.header;
        let mut word = h.property_type as u32;
        if h.property_type != PropertyType::Compound {
            word |= (h.data_type.pod as u32 & info::POD_MASK) << info::POD_SHIFT;
            word |= (h.data_type.extent as u32) << info::EXTENT_SHIFT;
            if rec.homogeneous {
                word |= info::HOMOGENEOUS;
            }
            if h.time_sampling_index != 0 {
                word |= info::EXPLICIT_TIME_SAMPLING;
            }
        }
        let _ = out.write_u32::<LittleEndian>(word);
        if h.property_type != PropertyType::Compound {
            for v in [rec.num_samples, rec.first_changed, rec.last_changed, h.time_sampling_index] {
                let _ = out.write_u32::<LittleEndian>(v);
            }
        }
        push_string(&mut out, &h.name);
        push_meta(&mut out, &h.meta_data, index);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{content_key, PropertyHeader};
    use crate::ogawa::read_util::{read_indexed_metadata, read_object_headers, read_property_headers, read_time_samplings};
    use crate::util::DataType;

    #[test]
    fn test_meta_index() {
        let mut index = MetaIndex::new();
        assert_eq!(index.index_of(""), Some(0));
        assert_eq!(index.index_of("schema=A"), Some(1));
        assert_eq!(index.index_of("schema=B"), Some(2));
        assert_eq!(index.index_of("schema=A"), Some(1));
        assert_eq!(index.index_of(&"x".repeat(300)), None);

        let table = read_indexed_metadata(&index.encode()).unwrap();
        assert_eq!(table.len(), 3);
        assert_eq!(table[2].schema(), Some("B"));
    }

    #[test]
    fn test_meta_index_capacity() {
        let mut index = MetaIndex::new();
        for i in 0..MAX_INDEXED_METADATA {
            assert!(index.index_of(&format!("k={i}")).is_some());
        }
        assert_eq!(index.index_of("k=overflow"), None);
        assert_eq!(index.len(), MAX_INDEXED_METADATA);
    }

    #[test]
    fn test_time_sampling_table() {
        let entries = vec![
            (TimeSampling::identity(), 1),
            (TimeSampling::cyclic(3.0, vec![1.0, 2.0, 3.0]), 3),
            (TimeSampling::acyclic(vec![0.0, 0.5, 4.0]), 3),
        ];
        let back = read_time_samplings(&encode_time_samplings(&entries)).unwrap();
        assert_eq!(back, entries);
    }

    #[test]
    fn test_object_headers() {
        let mut index = MetaIndex::new();
        let long = MetaData::new().with("note", "y".repeat(400));
        let xform = MetaData::new().with("schema", "AbcGeom_Xform_v3");
        let hashes = (content_key(b"p"), content_key(b"c"));
        let bytes = encode_object_headers([("a", &xform), ("b", &long)], Some(hashes), &mut index);

        let table = read_indexed_metadata(&index.encode()).unwrap();
        let block = read_object_headers(&bytes, &table, true).unwrap();
        assert_eq!(block.children.len(), 2);
        assert_eq!(block.children[0].1, xform);
        assert_eq!(block.children[1].1, long);
        assert_eq!(block.hashes, Some(hashes));
    }

    #[test]
    fn test_property_headers() {
        let mut index = MetaIndex::new();
        let records = vec![
            PropertyRecord::compound(PropertyHeader::compound(".geom", MetaData::new().with("schema", "S"))),
            PropertyRecord {
                header: PropertyHeader::array("P", DataType::VEC3F, 2, MetaData::new().with("interpretation", "point")),
                num_samples: 4,
                first_changed: 1,
                last_changed: 3,
                homogeneous: true,
            },
        ];
        let bytes = encode_property_headers(&records, &mut index);
        let table = read_indexed_metadata(&index.encode()).unwrap();
        assert_eq!(read_property_headers(&bytes, &table).unwrap(), records);
    }
}
