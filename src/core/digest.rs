//! Content digests for samples, properties and objects.
//!
//! Sample keys are xxh3-128 over the uncompressed payload. Property and
//! object hashes are built from headers and sample keys with
//! [`DigestBuilder`]; the writer records them at seal time and the reader
//! recomputes them for layered trees, so both sides must feed identical
//! byte sequences.

use std::fmt;

use xxhash_rust::xxh3::{xxh3_128, Xxh3};

use super::{MetaData, PropertyHeader, PropertyType, TimeSampling};

/// 128-bit digest.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Digest(pub [u8; 16]);

impl Digest {
    pub const SIZE: usize = 16;

    /// `None` unless `bytes` is exactly 16 long.
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        bytes.try_into().ok().map(Self)
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }

    /// Lowercase hex, 32 characters.
    pub fn to_hex(&self) -> String {
        self.0.iter().map(|b| format!("{b:02x}")).collect()
    }
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Digest({})", self.to_hex())
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Key of one sample payload.
#[inline]
pub fn content_key(payload: &[u8]) -> Digest {
    Digest(xxh3_128(payload).to_le_bytes())
}

/// Streaming digest with length-prefixed fields, so adjacent strings
/// cannot alias each other.
pub struct DigestBuilder {
    inner: Xxh3,
}

impl DigestBuilder {
    pub fn new() -> Self {
        Self { inner: Xxh3::new() }
    }

    pub fn u8(&mut self, v: u8) -> &mut Self {
        self.inner.update(&[v]);
        self
    }

    pub fn u32(&mut self, v: u32) -> &mut Self {
        self.inner.update(&v.to_le_bytes());
        self
    }

    pub fn f64(&mut self, v: f64) -> &mut Self {
        self.inner.update(&v.to_le_bytes());
        self
    }

    /// Length-prefixed string.
    pub fn str(&mut self, s: &str) -> &mut Self {
        self.u32(s.len() as u32);
        self.inner.update(s.as_bytes());
        self
    }

    pub fn digest(&mut self, d: &Digest) -> &mut Self {
        self.inner.update(&d.0);
        self
    }

    /// Metadata in its serialized form.
    pub fn meta(&mut self, meta: &MetaData) -> &mut Self {
        self.str(&meta.serialize())
    }

    /// A sampling by value, not by table index.
    pub fn time_sampling(&mut self, ts: &TimeSampling) -> &mut Self {
        self.f64(ts.time_per_cycle());
        self.u32(ts.stored_times().len() as u32);
        for t in ts.stored_times() {
            self.f64(*t);
        }
        self
    }

    pub fn finish(&self) -> Digest {
        Digest(self.inner.digest128().to_le_bytes())
    }
}

impl Default for DigestBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Hash of a scalar or array property: header, sampling by value, and the
/// key of every sample index in order.
pub fn leaf_property_hash(
    header: &PropertyHeader,
    ts: &TimeSampling,
    sample_keys: impl ExactSizeIterator<Item = Digest>,
) -> Digest {
    let mut b = DigestBuilder::new();
    b.u8(header.property_type as u8)
        .str(&header.name)
        .meta(&header.meta_data)
        .u8(header.data_type.pod as u8)
        .u8(header.data_type.extent)
        .time_sampling(ts)
        .u32(sample_keys.len() as u32);
    for key in sample_keys {
        b.digest(&key);
    }
    b.finish()
}

/// Hash of a compound property from its children's hashes.
pub fn compound_property_hash(name: &str, meta: &MetaData, children: impl IntoIterator<Item = Digest>) -> Digest {
    let mut b = DigestBuilder::new();
    b.u8(PropertyType::Compound as u8).str(name).meta(meta);
    for child in children {
        b.digest(&child);
    }
    b.finish()
}

/// An object's properties hash: its top-level property hashes in order.
/// Object name and placement do not participate.
pub fn properties_hash(top_level: impl IntoIterator<Item = Digest>) -> Digest {
    let mut b = DigestBuilder::new();
    for child in top_level {
        b.digest(&child);
    }
    b.finish()
}

/// Identity of one child as seen by its parent's children hash.
pub struct ChildDigest<'a> {
    pub name: &'a str,
    pub meta: &'a MetaData,
    pub properties: Digest,
    pub children: Digest,
}

/// Hash of an object's children, in order.
pub fn children_hash<'a>(children: impl IntoIterator<Item = ChildDigest<'a>>) -> Digest {
    let mut b = DigestBuilder::new();
    for c in children {
        b.str(c.name).meta(c.meta).digest(&c.properties).digest(&c.children);
    }
    b.finish()
}
