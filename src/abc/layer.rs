//! One archive file of a layered read.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::debug;

use crate::core::{decompress, Digest, MetaData, TimeSampling};
use crate::ogawa::format::{root, FLAG_COMPRESSED, FLAG_DIGESTS};
use crate::ogawa::read_util::{
    read_indexed_metadata, read_object_headers, read_property_headers, read_time_samplings, read_version,
    ObjectHeadersBlock, PropertyRecord,
};
use crate::ogawa::{IData, IGroup, IStreams};
use crate::util::{Error, Result};

/// A parsed archive file. Immutable once opened.
pub(crate) struct Layer {
    pub index: u32,
    pub path: PathBuf,
    pub format_version: i32,
    pub library_version: i32,
    pub archive_meta: MetaData,
    pub time_samplings: Vec<(TimeSampling, u32)>,
    pub indexed_meta: Vec<MetaData>,
    pub flags: u32,
    top: IGroup,
}

impl Layer {
    pub fn open(path: &Path, index: u32, use_mmap: bool) -> Result<Self> {
        let streams = Arc::new(IStreams::open_opts(path, use_mmap)?);
        let root_group = streams.root()?;
        if root_group.num_children() < root::COUNT {
            return Err(Error::malformed(format!(
                "root group has {} children, expected {}",
                root_group.num_children(),
                root::COUNT
            )));
        }

        let format_version = read_version(&root_group.data(root::FORMAT_VERSION)?.read_all()?)?;
        let library_version = read_version(&root_group.data(root::LIBRARY_VERSION)?.read_all()?)?;
        let archive_meta = MetaData::parse(&root_group.data(root::ARCHIVE_METADATA)?.read_string()?);
        let time_samplings = read_time_samplings(&root_group.data(root::TIME_SAMPLINGS)?.read_all()?)?;
        let indexed_meta = read_indexed_metadata(&root_group.data(root::INDEXED_METADATA)?.read_all()?)?;
        let flag_bytes = root_group.data(root::FLAGS)?.read_all()?;
        let flags = match flag_bytes.as_slice() {
            [a, b, c, d] => u32::from_le_bytes([*a, *b, *c, *d]),
            _ => return Err(Error::malformed("archive flags truncated")),
        };
        let top = root_group.group(root::TOP_OBJECT)?;

        debug!(
            path = %path.display(),
            layer = index,
            format_version,
            time_samplings = time_samplings.len(),
            flags,
            "opened layer"
        );
        Ok(Self {
            index,
            path: path.to_path_buf(),
            format_version,
            library_version,
            archive_meta,
            time_samplings,
            indexed_meta,
            flags,
            top,
        })
    }

    pub fn has_digests(&self) -> bool {
        self.flags & FLAG_DIGESTS != 0
    }

    pub fn is_compressed(&self) -> bool {
        self.flags & FLAG_COMPRESSED != 0
    }

    /// Directives are honored only above the base layer.
    pub fn honors_directives(&self) -> bool {
        self.index > 0
    }

    /// Split a stored sample block into its key and decoded payload bytes.
    pub fn sample_payload(&self, data: &IData) -> Result<(Option<Digest>, Vec<u8>)> {
        let mut bytes = data.read_all()?;
        let key = if self.has_digests() {
            if bytes.len() < Digest::SIZE {
                return Err(Error::malformed(format!("sample block at {} missing key", data.pos())));
            }
            let body = bytes.split_off(Digest::SIZE);
            let key = Digest::from_slice(&bytes);
            bytes = body;
            key
        } else {
            None
        };
        if self.is_compressed() && !bytes.is_empty() {
            bytes = decompress(&bytes)?;
        }
        Ok((key, bytes))
    }

    /// Key of a stored sample block without decoding the payload.
    pub fn sample_key(&self, data: &IData) -> Result<Option<Digest>> {
        if !self.has_digests() {
            return Ok(None);
        }
        if data.size() < Digest::SIZE as u64 {
            return Err(Error::malformed(format!("sample block at {} missing key", data.pos())));
        }
        let mut key = [0u8; Digest::SIZE];
        data.read_prefix(&mut key)?;
        Ok(Some(Digest(key)))
    }
}

/// One layer's stored definition of an object.
#[derive(Clone)]
pub(crate) struct ObjectSource {
    pub layer: Arc<Layer>,
    pub group: IGroup,
}

/// A child slot of a stored object.
pub(crate) enum ChildSlot {
    Stored(ObjectSource),
    /// Instance root; holds the source's full path.
    Instance(String),
}

impl ObjectSource {
    pub fn top(layer: &Arc<Layer>) -> Self {
        Self {
            layer: Arc::clone(layer),
            group: layer.top.clone(),
        }
    }

    fn headers_index(&self) -> Result<u64> {
        self.group
            .num_children()
            .checked_sub(1)
            .filter(|&i| i >= 1)
            .ok_or_else(|| Error::malformed(format!("object group at {} is truncated", self.group.pos())))
    }

    pub fn headers(&self) -> Result<ObjectHeadersBlock> {
        let bytes = self.group.data(self.headers_index()?)?.read_all()?;
        let block = read_object_headers(&bytes, &self.layer.indexed_meta, self.layer.has_digests())?;
        let slots = self.headers_index()? - 1;
        if block.children.len() as u64 != slots {
            return Err(Error::malformed(format!(
                "object group at {} has {} child slots but {} headers",
                self.group.pos(),
                slots,
                block.children.len()
            )));
        }
        Ok(block)
    }

    /// Child `index` in header order.
    pub fn child(&self, index: usize) -> Result<ChildSlot> {
        let slot = index as u64 + 1;
        if self.group.is_child_group(slot)? {
            Ok(ChildSlot::Stored(ObjectSource {
                layer: Arc::clone(&self.layer),
                group: self.group.group(slot)?,
            }))
        } else {
            let path = self.group.data(slot)?.read_string()?;
            if !path.starts_with('/') {
                return Err(Error::malformed(format!("instance source path {path:?} is not absolute")));
            }
            Ok(ChildSlot::Instance(path))
        }
    }

    pub fn properties(&self) -> Result<CompoundSource> {
        Ok(CompoundSource {
            layer: Arc::clone(&self.layer),
            group: self.group.group(0)?,
        })
    }
}

/// One layer's stored compound property.
#[derive(Clone)]
pub(crate) struct CompoundSource {
    pub layer: Arc<Layer>,
    pub group: IGroup,
}

/// One layer's stored scalar or array property.
#[derive(Clone)]
pub(crate) struct LeafSource {
    pub layer: Arc<Layer>,
    pub group: IGroup,
    pub record: PropertyRecord,
}

pub(crate) enum PropertySource {
    Compound(PropertyRecord, CompoundSource),
    Leaf(LeafSource),
}

impl CompoundSource {
    /// Child properties in stored order.
    pub fn children(&self) -> Result<Vec<PropertySource>> {
        if self.group.is_empty() {
            return Ok(Vec::new());
        }
        let last = self.group.num_children() - 1;
        let records = read_property_headers(&self.group.data(last)?.read_all()?, &self.layer.indexed_meta)?;
        if records.len() as u64 != last {
            return Err(Error::malformed(format!(
                "compound group at {} has {} children but {} headers",
                self.group.pos(),
                last,
                records.len()
            )));
        }
        records
            .into_iter()
            .enumerate()
            .map(|(i, record)| {
                let group = self.group.group(i as u64)?;
                let layer = Arc::clone(&self.layer);
                Ok(if record.header.is_compound() {
                    PropertySource::Compound(record, CompoundSource { layer, group })
                } else {
                    PropertySource::Leaf(LeafSource { layer, group, record })
                })
            })
            .collect()
    }
}

impl LeafSource {
    /// Data block of stored slot `slot`.
    pub fn slot_data(&self, slot: u32) -> Result<IData> {
        let index = if self.record.header.is_array() { 2 * slot } else { slot };
        self.group.data(index as u64)
    }

    /// Element count recorded next to an array slot, if any.
    pub fn slot_count(&self, slot: u32) -> Result<Option<u64>> {
        if !self.record.header.is_array() {
            return Ok(None);
        }
        let dims = self.group.data(2 * slot as u64 + 1)?;
        if dims.is_empty() {
            return Ok(None);
        }
        let mut buf = [0u8; 8];
        dims.read_prefix(&mut buf)?;
        Ok(Some(u64::from_le_bytes(buf)))
    }
}
