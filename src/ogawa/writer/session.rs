//! Shared state of one write session.
//!
//! Objects and properties live in two arenas indexed by id; handles hold
//! the session plus an id. Sample payloads are appended to the stream as
//! they arrive, groups are written bottom-up at seal.

use std::collections::HashMap;

use tracing::{debug, trace, warn};

use super::options::WriteOptions;
use crate::core::{
    child_path, children_hash, compound_property_hash, compress, content_key, leaf_property_hash, properties_hash,
    ChildDigest, Digest, MetaData, PropertyHeader, Sample, TimeSampling,
};
use crate::ogawa::format::*;
use crate::ogawa::read_util::PropertyRecord;
use crate::ogawa::stream::OStream;
use crate::ogawa::write_util::{encode_object_headers, encode_property_headers, encode_time_samplings, encode_version, MetaIndex};
use crate::util::{Error, PlainOldDataType, Result};

pub(crate) type ObjectId = usize;
pub(crate) type PropId = usize;

pub(crate) const TOP: ObjectId = 0;

pub(crate) struct ObjectNode {
    pub name: String,
    pub full_name: String,
    pub meta: MetaData,
    pub parent: Option<ObjectId>,
    pub properties: PropId,
    pub children: Vec<ObjectId>,
    /// Set on instance roots.
    pub instance_of: Option<ObjectId>,
}

pub(crate) enum PropBody {
    Compound(Vec<PropId>),
    Leaf(LeafState),
}

pub(crate) struct PropNode {
    pub header: PropertyHeader,
    pub owner: ObjectId,
    pub body: PropBody,
}

/// Sample bookkeeping of a scalar or array property.
#[derive(Default)]
pub(crate) struct LeafState {
    num_samples: u32,
    first_changed: u32,
    last_changed: u32,
    /// `(data offset, dims offset)` per stored slot.
    slots: Vec<(u64, u64)>,
    slot_keys: Vec<Digest>,
    element_count: Option<usize>,
    heterogeneous: bool,
}

impl LeafState {
    pub fn num_samples(&self) -> u32 {
        self.num_samples
    }

    fn record(&self, header: &PropertyHeader) -> PropertyRecord {
        PropertyRecord {
            header: header.clone(),
            num_samples: self.num_samples,
            first_changed: self.first_changed,
            last_changed: self.last_changed,
            homogeneous: !self.heterogeneous,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum SessionState {
    Writing,
    Sealed,
}

pub(crate) struct WriteSession {
    pub options: WriteOptions,
    stream: OStream,
    pub state: SessionState,
    pub objects: Vec<ObjectNode>,
    pub props: Vec<PropNode>,
    time_samplings: Vec<(TimeSampling, u32)>,
    dedup: HashMap<Digest, u64>,
    pub archive_meta: MetaData,
}

impl WriteSession {
    pub fn new(stream: OStream, options: WriteOptions, archive_meta: MetaData) -> Self {
        let mut session = Self {
            options,
            stream,
            state: SessionState::Writing,
            objects: Vec::new(),
            props: Vec::new(),
            time_samplings: vec![(TimeSampling::identity(), 0)],
            dedup: HashMap::new(),
            archive_meta,
        };
        let top_props = session.push_prop(PropertyHeader::compound("", MetaData::new()), TOP, PropBody::Compound(Vec::new()));
        session.objects.push(ObjectNode {
            name: String::new(),
            full_name: "/".into(),
            meta: MetaData::new(),
            parent: None,
            properties: top_props,
            children: Vec::new(),
            instance_of: None,
        });
        session
    }

    fn push_prop(&mut self, header: PropertyHeader, owner: ObjectId, body: PropBody) -> PropId {
        self.props.push(PropNode { header, owner, body });
        self.props.len() - 1
    }

    pub fn ensure_writing(&self) -> Result<()> {
        match self.state {
            SessionState::Writing => Ok(()),
            SessionState::Sealed => Err(Error::invalid_state("archive is sealed")),
        }
    }

    // ----- time sampling table -----

    /// Register a sampling, reusing an equal entry.
    pub fn add_time_sampling(&mut self, ts: TimeSampling) -> Result<u32> {
        self.ensure_writing()?;
        ts.validate()?;
        if let Some(i) = self.time_samplings.iter().position(|(t, _)| *t == ts) {
            return Ok(i as u32);
        }
        self.time_samplings.push((ts, 0));
        Ok((self.time_samplings.len() - 1) as u32)
    }

    pub fn num_time_samplings(&self) -> usize {
        self.time_samplings.len()
    }

    pub fn time_sampling(&self, index: u32) -> Option<&TimeSampling> {
        self.time_samplings.get(index as usize).map(|(ts, _)| ts)
    }

    // ----- structure -----

    fn check_name(name: &str, what: &str) -> Result<()> {
        if name.is_empty() || name.contains('/') {
            return Err(Error::invalid_state(format!("invalid {what} name {name:?}")));
        }
        Ok(())
    }

    fn check_not_instance(&self, id: ObjectId) -> Result<()> {
        let obj = &self.objects[id];
        if obj.instance_of.is_some() {
            return Err(Error::invalid_state(format!(
                "{} is an instance root and owns no storage",
                obj.full_name
            )));
        }
        Ok(())
    }

    fn check_child_free(&self, parent: ObjectId, name: &str) -> Result<()> {
        let taken = self.objects[parent]
            .children
            .iter()
            .any(|&c| self.objects[c].name == name);
        if taken {
            return Err(Error::invalid_state(format!(
                "{} already has a child named {name}",
                self.objects[parent].full_name
            )));
        }
        Ok(())
    }

    pub fn add_object(&mut self, parent: ObjectId, name: &str, meta: MetaData) -> Result<ObjectId> {
        self.ensure_writing()?;
        Self::check_name(name, "object")?;
        self.check_not_instance(parent)?;
        self.check_child_free(parent, name)?;

        let id = self.objects.len();
        let props = self.push_prop(PropertyHeader::compound("", MetaData::new()), id, PropBody::Compound(Vec::new()));
        self.objects.push(ObjectNode {
            name: name.to_owned(),
            full_name: child_path(&self.objects[parent].full_name, name),
            meta,
            parent: Some(parent),
            properties: props,
            children: Vec::new(),
            instance_of: None,
        });
        self.objects[parent].children.push(id);
        Ok(id)
    }

    /// True when `target` can be reached from `from` by walking children
    /// and following instance roots to their sources.
    fn reaches(&self, from: ObjectId, target: ObjectId) -> bool {
        let mut seen = vec![false; self.objects.len()];
        let mut stack = vec![from];
        while let Some(id) = stack.pop() {
            if id == target {
                return true;
            }
            if std::mem::replace(&mut seen[id], true) {
                continue;
            }
            let node = &self.objects[id];
            stack.extend(node.instance_of);
            stack.extend(node.children.iter().copied());
        }
        false
    }

    pub fn add_instance(&mut self, parent: ObjectId, source: ObjectId, name: &str) -> Result<ObjectId> {
        self.ensure_writing()?;
        Self::check_name(name, "instance")?;
        self.check_not_instance(parent)?;
        if source == TOP {
            return Err(Error::invalid_state("the top object cannot be instanced"));
        }
        // The new root hashes through `source`, so `parent` must not be
        // reachable from it.
        if self.reaches(source, parent) {
            return Err(Error::invalid_state(format!(
                "instancing {} under {} would create a cycle",
                self.objects[source].full_name, self.objects[parent].full_name
            )));
        }
        self.check_child_free(parent, name)?;

        let id = self.objects.len();
        let props = self.push_prop(PropertyHeader::compound("", MetaData::new()), id, PropBody::Compound(Vec::new()));
        let meta = self.objects[source].meta.clone();
        self.objects.push(ObjectNode {
            name: name.to_owned(),
            full_name: child_path(&self.objects[parent].full_name, name),
            meta,
            parent: Some(parent),
            properties: props,
            children: Vec::new(),
            instance_of: Some(source),
        });
        self.objects[parent].children.push(id);
        debug!(instance = %self.objects[id].full_name, source = %self.objects[source].full_name, "added instance");
        Ok(id)
    }

    pub fn add_property(&mut self, parent: PropId, header: PropertyHeader) -> Result<PropId> {
        self.ensure_writing()?;
        Self::check_name(&header.name, "property")?;
        let owner = self.props[parent].owner;
        self.check_not_instance(owner)?;

        if !header.is_compound() {
            let dt = header.data_type;
            if dt.pod == PlainOldDataType::Unknown || dt.extent == 0 {
                return Err(Error::invalid_state(format!("property {} has invalid data type {dt}", header.name)));
            }
            if header.time_sampling_index as usize >= self.time_samplings.len() {
                return Err(Error::invalid_state(format!(
                    "time sampling index {} not registered",
                    header.time_sampling_index
                )));
            }
        }

        let PropBody::Compound(siblings) = &self.props[parent].body else {
            return Err(Error::invalid_state("properties can only be added to compounds"));
        };
        if siblings.iter().any(|&p| self.props[p].header.name == header.name) {
            return Err(Error::invalid_state(format!("duplicate property {}", header.name)));
        }

        let body = if header.is_compound() {
            PropBody::Compound(Vec::new())
        } else {
            PropBody::Leaf(LeafState::default())
        };
        let id = self.push_prop(header, owner, body);
        if let PropBody::Compound(children) = &mut self.props[parent].body {
            children.push(id);
        }
        Ok(id)
    }

    // ----- samples -----

    /// Append the next sample of a scalar or array property.
    pub fn append_sample(&mut self, prop: PropId, sample: &Sample) -> Result<()> {
        self.ensure_writing()?;
        let Self { props, stream, dedup, options, time_samplings, .. } = self;
        let node = &mut props[prop];
        let header = &node.header;
        let PropBody::Leaf(leaf) = &mut node.body else {
            return Err(Error::invalid_state("samples can only be set on scalar or array properties"));
        };
        if sample.data_type() != header.data_type {
            return Err(Error::type_mismatch(header.data_type, sample.data_type()));
        }
        sample.values().check_strings()?;
        let count = sample.num_elements();
        if header.is_scalar() && count != 1 {
            return Err(Error::type_mismatch(
                format!("one {} element", header.data_type),
                format!("{count} elements"),
            ));
        }

        let payload = sample.encode();
        let key = content_key(&payload);
        let index = leaf.num_samples;
        let unchanged = leaf.slot_keys.last() == Some(&key);

        if !unchanged {
            let data = write_payload(stream, dedup, options, key, &payload)?;
            let dims = if header.is_array() && header.data_type.pod.is_string() {
                stream.write_data(&[&(count as u64).to_le_bytes()])?
            } else {
                EMPTY_DATA
            };
            if index > 0 {
                if leaf.first_changed == 0 {
                    leaf.first_changed = index;
                } else if let (Some(&slot), Some(&k)) = (leaf.slots.last(), leaf.slot_keys.last()) {
                    for _ in leaf.last_changed + 1..index {
                        leaf.slots.push(slot);
                        leaf.slot_keys.push(k);
                    }
                }
                leaf.last_changed = index;
            }
            leaf.slots.push((data, dims));
            leaf.slot_keys.push(key);
        }

        match leaf.element_count {
            Some(c) if c != count => leaf.heterogeneous = true,
            None => leaf.element_count = Some(count),
            _ => {}
        }
        leaf.num_samples = index + 1;
        trace!(prop = %header.name, index, unchanged, "appended sample");

        let max = &mut time_samplings[header.time_sampling_index as usize].1;
        *max = (*max).max(index + 1);
        Ok(())
    }

    // ----- seal -----

    /// Write all groups and tables, then freeze the header.
    pub fn seal(&mut self) -> Result<()> {
        self.ensure_writing()?;
        // No writes are accepted from here on, even if sealing fails.
        self.state = SessionState::Sealed;

        let hashes = self.options.records_digests().then(|| {
            let mut pass = HashPass::new(self);
            (0..self.objects.len()).map(|id| pass.object(id)).collect::<Vec<_>>()
        });

        let mut meta_index = MetaIndex::new();
        let top = self.write_object(TOP, hashes.as_deref(), &mut meta_index)?;

        let mut flags = 0;
        if self.options.records_digests() {
            flags |= FLAG_DIGESTS;
        }
        if self.options.compression.is_some() {
            flags |= FLAG_COMPRESSED;
        }

        let archive_meta = self.archive_meta.serialize();
        let children = [
            self.stream.write_data(&[&encode_version(ARCHIVE_FORMAT_VERSION)])?,
            self.stream.write_data(&[&encode_version(LIBRARY_VERSION)])?,
            top,
            self.stream.write_data(&[archive_meta.as_bytes()])?,
            self.stream.write_data(&[&encode_time_samplings(&self.time_samplings)])?,
            self.stream.write_data(&[&meta_index.encode()])?,
            self.stream.write_data(&[&flags.to_le_bytes()])?,
        ];
        let root = self.stream.write_group(&children)?;
        self.stream.seal(extract_offset(root))?;

        debug!(
            objects = self.objects.len(),
            properties = self.props.len(),
            time_samplings = self.time_samplings.len(),
            indexed_metadata = meta_index.len(),
            stored_payloads = self.dedup.len(),
            "sealed archive"
        );
        Ok(())
    }

    fn write_object(&mut self, id: ObjectId, hashes: Option<&[(Digest, Digest)]>, index: &mut MetaIndex) -> Result<u64> {
        let props = self.write_compound(self.objects[id].properties, index)?;
        let mut group = vec![props];
        for c in self.objects[id].children.clone() {
            let slot = match self.objects[c].instance_of {
                Some(source) => {
                    let path = self.objects[source].full_name.clone();
                    self.stream.write_data(&[path.as_bytes()])?
                }
                None => self.write_object(c, hashes, index)?,
            };
            group.push(slot);
        }

        let node = &self.objects[id];
        let headers = encode_object_headers(
            node.children.iter().map(|&c| (self.objects[c].name.as_str(), &self.objects[c].meta)),
            hashes.map(|h| h[id]),
            index,
        );
        group.push(self.stream.write_data(&[&headers])?);
        self.stream.write_group(&group)
    }

    fn write_compound(&mut self, id: PropId, index: &mut MetaIndex) -> Result<u64> {
        let PropBody::Compound(children) = &self.props[id].body else {
            return Err(Error::invalid_state("expected a compound property"));
        };
        let children = children.clone();
        let mut group = Vec::with_capacity(children.len() + 1);
        let mut records = Vec::with_capacity(children.len());
        for c in children {
            let (record, offsets) = match &self.props[c].body {
                PropBody::Compound(_) => (PropertyRecord::compound(self.props[c].header.clone()), None),
                PropBody::Leaf(leaf) => {
                    let header = &self.props[c].header;
                    let offsets: Vec<u64> = if header.is_array() {
                        leaf.slots.iter().flat_map(|&(d, dims)| [d, dims]).collect()
                    } else {
                        leaf.slots.iter().map(|&(d, _)| d).collect()
                    };
                    (leaf.record(header), Some(offsets))
                }
            };
            records.push(record);
            let offset = match offsets {
                Some(offsets) => self.stream.write_group(&offsets)?,
                None => self.write_compound(c, index)?,
            };
            group.push(offset);
        }
        let headers = encode_property_headers(&records, index);
        group.push(self.stream.write_data(&[&headers])?);
        self.stream.write_group(&group)
    }
}

/// Write a sample data block (key + payload), reusing identical blocks.
fn write_payload(
    stream: &mut OStream,
    dedup: &mut HashMap<Digest, u64>,
    options: &WriteOptions,
    key: Digest,
    payload: &[u8],
) -> Result<u64> {
    if options.deduplicate {
        if let Some(&offset) = dedup.get(&key) {
            trace!(key = %key, "dedup hit");
            return Ok(offset);
        }
    }
    let body = match options.compression {
        Some(level) => compress(payload, level)?,
        None => payload.to_vec(),
    };
    let offset = if options.records_digests() {
        stream.write_data(&[key.as_bytes(), &body])?
    } else {
        stream.write_data(&[&body])?
    };
    if options.deduplicate {
        dedup.insert(key, offset);
    }
    Ok(offset)
}

/// Memoized hash computation over the arena.
struct HashPass<'a> {
    session: &'a WriteSession,
    props: Vec<Option<Digest>>,
    objects: Vec<Option<(Digest, Digest)>>,
    visiting: Vec<bool>,
}

impl<'a> HashPass<'a> {
    fn new(session: &'a WriteSession) -> Self {
        Self {
            session,
            props: vec![None; session.props.len()],
            objects: vec![None; session.objects.len()],
            visiting: vec![false; session.objects.len()],
        }
    }

    fn prop(&mut self, id: PropId) -> Digest {
        if let Some(d) = self.props[id] {
            return d;
        }
        let session = self.session;
        let node = &session.props[id];
        let digest = match &node.body {
            PropBody::Compound(children) => {
                let hashes: Vec<_> = children.iter().map(|&c| self.prop(c)).collect();
                compound_property_hash(&node.header.name, &node.header.meta_data, hashes)
            }
            PropBody::Leaf(leaf) => {
                let record = leaf.record(&node.header);
                let ts = session
                    .time_sampling(node.header.time_sampling_index)
                    .cloned()
                    .unwrap_or_default();
                let keys = (0..record.num_samples).map(|i| leaf.slot_keys[record.stored_slot(i) as usize]);
                leaf_property_hash(&node.header, &ts, keys)
            }
        };
        self.props[id] = Some(digest);
        digest
    }

    /// `(properties hash, children hash)` of an object; instance roots
    /// report their source's.
    fn object(&mut self, id: ObjectId) -> (Digest, Digest) {
        if let Some(h) = self.objects[id] {
            return h;
        }
        // `add_instance` refuses cycles; stop on one rather than recurse forever.
        if std::mem::replace(&mut self.visiting[id], true) {
            warn!(object = %self.session.objects[id].full_name, "instance cycle while hashing");
            return (Digest::default(), Digest::default());
        }
        let session = self.session;
        let node = &session.objects[id];
        let hashes = match node.instance_of {
            Some(source) => self.object(source),
            None => {
                let top = match &session.props[node.properties].body {
                    PropBody::Compound(children) => children.clone(),
                    PropBody::Leaf(_) => Vec::new(),
                };
                let props = properties_hash(top.iter().map(|&p| self.prop(p)).collect::<Vec<_>>());
                let child_hashes: Vec<_> = node.children.iter().map(|&c| (c, self.object(c))).collect();
                let children = children_hash(child_hashes.iter().map(|&(c, (p, k))| ChildDigest {
                    name: &session.objects[c].name,
                    meta: &session.objects[c].meta,
                    properties: p,
                    children: k,
                }));
                (props, children)
            }
        };
        self.objects[id] = Some(hashes);
        hashes
    }
}
