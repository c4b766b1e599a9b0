//! Property read side.
//!
//! A compound merges the same-named compound from every layer that
//! defines its owner; a scalar or array property comes from the last
//! layer defining it. Children are resolved on first access.

use std::sync::{Arc, OnceLock};

use tracing::trace;

use super::archive::ArchiveShared;
use super::layer::{CompoundSource, LeafSource, PropertySource};
use crate::core::{
    compound_property_hash, leaf_property_hash, Digest, MetaData, PropertyHeader, PropertyType, Sample,
    SampleBlockKey, SampleSelector, TimeSampling,
};
use crate::util::{DataType, Error, PlainOldDataType, PodElement, Result};

pub(crate) struct CompoundReader {
    header: PropertyHeader,
    sources: Vec<CompoundSource>,
    children: OnceLock<Arc<[PropEntry]>>,
    hash: OnceLock<Option<Digest>>,
}

#[derive(Clone)]
pub(crate) enum PropEntry {
    Compound(Arc<CompoundReader>),
    Leaf(Arc<LeafReader>),
}

impl PropEntry {
    fn header(&self) -> &PropertyHeader {
        match self {
            Self::Compound(c) => &c.header,
            Self::Leaf(l) => &l.header,
        }
    }

    fn hash(&self, shared: &ArchiveShared) -> Result<Option<Digest>> {
        match self {
            Self::Compound(c) => c.hash(shared),
            Self::Leaf(l) => l.hash(),
        }
    }
}

/// Merge state of one child name while walking the layers.
enum Pending {
    Compound {
        header: PropertyHeader,
        sources: Vec<CompoundSource>,
        decided: bool,
    },
    Leaf {
        source: LeafSource,
        decided: bool,
    },
    Pruned,
}

impl Pending {
    fn decided(&self) -> bool {
        match self {
            Self::Compound { decided, .. } | Self::Leaf { decided, .. } => *decided,
            Self::Pruned => true,
        }
    }

    /// Marks an entry that a replace directive has settled.
    fn settle(mut self) -> Self {
        if let Self::Compound { decided, .. } | Self::Leaf { decided, .. } = &mut self {
            *decided = true;
        }
        self
    }
}

impl CompoundReader {
    pub fn new(header: PropertyHeader, sources: Vec<CompoundSource>) -> Self {
        Self {
            header,
            sources,
            children: OnceLock::new(),
            hash: OnceLock::new(),
        }
    }

    /// The top compound of an object defined by `sources`.
    pub fn top(sources: Vec<CompoundSource>) -> Self {
        Self::new(PropertyHeader::compound("", MetaData::new()), sources)
    }

    pub fn header(&self) -> &PropertyHeader {
        &self.header
    }

    /// Merged children, built once.
    pub fn children(&self, shared: &ArchiveShared) -> Result<Arc<[PropEntry]>> {
        if let Some(children) = self.children.get() {
            return Ok(Arc::clone(children));
        }
        let merged = self.merge(shared)?;
        Ok(Arc::clone(self.children.get_or_init(|| merged)))
    }

    fn merge(&self, shared: &ArchiveShared) -> Result<Arc<[PropEntry]>> {
        let mut order: Vec<(String, Pending)> = Vec::new();
        for source in &self.sources {
            let directives = source.layer.honors_directives();
            for child in source.children()? {
                let (record_header, incoming) = match child {
                    PropertySource::Compound(record, compound) => {
                        let header = record.header;
                        (
                            header.clone(),
                            Pending::Compound {
                                header,
                                sources: vec![compound],
                                decided: false,
                            },
                        )
                    }
                    PropertySource::Leaf(leaf) => (
                        leaf.record.header.clone(),
                        Pending::Leaf {
                            source: leaf,
                            decided: false,
                        },
                    ),
                };
                let prune = directives && record_header.meta_data.is_prune();
                let replace = directives && record_header.meta_data.is_replace();

                let Some(pos) = order.iter().position(|(n, _)| *n == record_header.name) else {
                    let entry = match incoming {
                        _ if prune => Pending::Pruned,
                        other if replace => other.settle(),
                        other => other,
                    };
                    order.push((record_header.name.clone(), entry));
                    continue;
                };

                let current = std::mem::replace(&mut order[pos].1, Pending::Pruned);
                let decided = current.decided();
                order[pos].1 = match (current, incoming) {
                    (Pending::Pruned, _) => Pending::Pruned,
                    (_, _) if prune && !decided => Pending::Pruned,
                    // Only the first directive at a path counts.
                    (current, _) if prune => current,
                    (_, Pending::Compound { sources, .. }) if replace && !decided => Pending::Compound {
                        header: record_header,
                        sources,
                        decided: true,
                    },
                    (
                        Pending::Compound {
                            mut header,
                            mut sources,
                            decided,
                        },
                        Pending::Compound { sources: more, .. },
                    ) => {
                        header.meta_data.merge_from(&record_header.meta_data);
                        sources.extend(more);
                        Pending::Compound { header, sources, decided }
                    }
                    (_, incoming) if replace || decided => incoming.settle(),
                    (_, incoming) => incoming,
                };
            }
        }

        let mut children = Vec::with_capacity(order.len());
        for (_, pending) in order {
            match pending {
                Pending::Pruned => {}
                Pending::Compound { header, sources, .. } => {
                    children.push(PropEntry::Compound(Arc::new(CompoundReader::new(header, sources))))
                }
                Pending::Leaf { source, .. } => {
                    children.push(PropEntry::Leaf(Arc::new(LeafReader::new(shared, source)?)))
                }
            }
        }
        trace!(name = %self.header.name, children = children.len(), "merged compound");
        Ok(children.into())
    }

    /// Hash of this compound; `None` unless every contributing layer
    /// records digests.
    pub fn hash(&self, shared: &ArchiveShared) -> Result<Option<Digest>> {
        if let Some(h) = self.hash.get() {
            return Ok(*h);
        }
        let hashes = self.child_hashes(shared)?;
        let hash = hashes.map(|h| compound_property_hash(&self.header.name, &self.header.meta_data, h));
        Ok(*self.hash.get_or_init(|| hash))
    }

    /// Hashes of the direct children, in order.
    pub fn child_hashes(&self, shared: &ArchiveShared) -> Result<Option<Vec<Digest>>> {
        let mut out = Vec::new();
        for child in self.children(shared)?.iter() {
            match child.hash(shared)? {
                Some(h) => out.push(h),
                None => return Ok(None),
            }
        }
        Ok(Some(out))
    }
}

/// A merged scalar or array property.
pub(crate) struct LeafReader {
    /// Time sampling index remapped into the merged table.
    header: PropertyHeader,
    source: LeafSource,
    time_sampling: TimeSampling,
    hash: OnceLock<Option<Digest>>,
}

impl LeafReader {
    fn new(shared: &ArchiveShared, source: LeafSource) -> Result<Self> {
        let mut header = source.record.header.clone();
        let index = shared.merged_time_sampling_index(source.layer.index, header.time_sampling_index)?;
        header.time_sampling_index = index;
        let time_sampling = shared
            .time_sampling(index as usize)
            .cloned()
            .ok_or_else(|| Error::malformed(format!("time sampling {index} missing from merged table")))?;
        Ok(Self {
            header,
            source,
            time_sampling,
            hash: OnceLock::new(),
        })
    }

    fn num_samples(&self) -> usize {
        self.source.record.num_samples as usize
    }

    /// Stored slot for `index`, past-the-end indices holding the last value.
    fn slot(&self, index: usize) -> Result<u32> {
        let count = self.num_samples();
        if count == 0 {
            return Err(Error::OutOfRange {
                what: "sample",
                index,
                count,
            });
        }
        let clamped = index.min(count - 1) as u32;
        Ok(self.source.record.stored_slot(clamped))
    }

    fn sample(&self, shared: &ArchiveShared, index: usize) -> Result<Arc<Sample>> {
        let slot = self.slot(index)?;
        let data = self.source.slot_data(slot)?;
        let key = SampleBlockKey::new(self.source.layer.index, data.pos());
        if let Some(hit) = shared.cache.get(&key) {
            return Ok(hit);
        }

        let (_, payload) = self.source.layer.sample_payload(&data)?;
        let sample = Sample::decode(self.header.data_type, &payload)?;
        if let Some(expected) = self.source.slot_count(slot)? {
            if expected != sample.num_elements() as u64 {
                return Err(Error::malformed(format!(
                    "property {:?} sample {} decodes to {} elements, {} recorded",
                    self.header.name,
                    index,
                    sample.num_elements(),
                    expected
                )));
            }
        }
        let sample = Arc::new(sample);
        if shared.cache.is_enabled() {
            shared.cache.insert(key, Arc::clone(&sample), payload.len());
        }
        Ok(sample)
    }

    fn sample_key(&self, index: usize) -> Result<Option<Digest>> {
        let data = self.source.slot_data(self.slot(index)?)?;
        self.source.layer.sample_key(&data)
    }

    fn hash(&self) -> Result<Option<Digest>> {
        if let Some(h) = self.hash.get() {
            return Ok(*h);
        }
        let hash = if self.source.layer.has_digests() {
            let record = &self.source.record;
            let mut stored = Vec::with_capacity(record.num_stored() as usize);
            for slot in 0..record.num_stored() {
                let key = self.source.layer.sample_key(&self.source.slot_data(slot)?)?;
                stored.push(key.ok_or_else(|| Error::malformed("sample block missing key"))?);
            }
            let keys = (0..record.num_samples).map(|i| stored[record.stored_slot(i) as usize]);
            Some(leaf_property_hash(&self.header, &self.time_sampling, keys))
        } else {
            None
        };
        Ok(*self.hash.get_or_init(|| hash))
    }
}

/// Any property handle.
#[derive(Clone)]
pub enum IProperty {
    Compound(ICompoundProperty),
    Scalar(IScalarProperty),
    Array(IArrayProperty),
}

impl IProperty {
    fn from_entry(shared: &Arc<ArchiveShared>, entry: &PropEntry) -> Self {
        match entry {
            PropEntry::Compound(c) => Self::Compound(ICompoundProperty::new(Arc::clone(shared), Arc::clone(c))),
            PropEntry::Leaf(l) if l.header.is_array() => Self::Array(IArrayProperty {
                shared: Arc::clone(shared),
                reader: Arc::clone(l),
            }),
            PropEntry::Leaf(l) => Self::Scalar(IScalarProperty {
                shared: Arc::clone(shared),
                reader: Arc::clone(l),
            }),
        }
    }

    /// Header of this property.
    pub fn header(&self) -> &PropertyHeader {
        match self {
            Self::Compound(p) => p.header(),
            Self::Scalar(p) => p.header(),
            Self::Array(p) => p.header(),
        }
    }

    /// Property name.
    pub fn name(&self) -> &str {
        &self.header().name
    }

    /// Compound, scalar or array.
    pub fn property_type(&self) -> PropertyType {
        self.header().property_type
    }

    /// The compound behind this handle, or `TypeMismatch`.
    pub fn into_compound(self) -> Result<ICompoundProperty> {
        match self {
            Self::Compound(p) => Ok(p),
            other => Err(kind_mismatch(PropertyType::Compound, other.property_type())),
        }
    }

    /// The scalar behind this handle, or `TypeMismatch`.
    pub fn into_scalar(self) -> Result<IScalarProperty> {
        match self {
            Self::Scalar(p) => Ok(p),
            other => Err(kind_mismatch(PropertyType::Scalar, other.property_type())),
        }
    }

    /// The array behind this handle, or `TypeMismatch`.
    pub fn into_array(self) -> Result<IArrayProperty> {
        match self {
            Self::Array(p) => Ok(p),
            other => Err(kind_mismatch(PropertyType::Array, other.property_type())),
        }
    }

    /// Hash of this property; `None` when digests are not recorded.
    pub fn hash(&self) -> Result<Option<Digest>> {
        match self {
            Self::Compound(p) => p.reader.hash(&p.shared),
            Self::Scalar(p) => p.reader.hash(),
            Self::Array(p) => p.reader.hash(),
        }
    }
}

fn kind_mismatch(expected: PropertyType, actual: PropertyType) -> Error {
    Error::type_mismatch(expected.name(), actual.name())
}

/// A compound property being read.
#[derive(Clone)]
pub struct ICompoundProperty {
    shared: Arc<ArchiveShared>,
    reader: Arc<CompoundReader>,
}

impl ICompoundProperty {
    pub(crate) fn new(shared: Arc<ArchiveShared>, reader: Arc<CompoundReader>) -> Self {
        Self { shared, reader }
    }

    /// Header of this property.
    pub fn header(&self) -> &PropertyHeader {
        &self.reader.header
    }

    /// Property name.
    pub fn name(&self) -> &str {
        &self.reader.header.name
    }

    /// Property metadata.
    pub fn meta_data(&self) -> &MetaData {
        &self.reader.header.meta_data
    }

    /// Number of merged child properties.
    pub fn num_properties(&self) -> Result<usize> {
        Ok(self.reader.children(&self.shared)?.len())
    }

    /// Headers of the children, in order.
    pub fn property_headers(&self) -> Result<Vec<PropertyHeader>> {
        Ok(self.reader.children(&self.shared)?.iter().map(|c| c.header().clone()).collect())
    }

    /// Names of the children, in order.
    pub fn property_names(&self) -> Result<Vec<String>> {
        Ok(self.reader.children(&self.shared)?.iter().map(|c| c.header().name.clone()).collect())
    }

    /// Whether a child called `name` exists.
    pub fn has_property(&self, name: &str) -> Result<bool> {
        Ok(self.reader.children(&self.shared)?.iter().any(|c| c.header().name == name))
    }

    /// Child by name; `NotFound` when absent.
    pub fn property(&self, name: &str) -> Result<IProperty> {
        let children = self.reader.children(&self.shared)?;
        children
            .iter()
            .find(|c| c.header().name == name)
            .map(|c| IProperty::from_entry(&self.shared, c))
            .ok_or_else(|| Error::not_found(format!("property {name:?} in compound {:?}", self.name())))
    }

    /// Child by position; `OutOfRange` past the end.
    pub fn property_at(&self, index: usize) -> Result<IProperty> {
        let children = self.reader.children(&self.shared)?;
        children
            .get(index)
            .map(|c| IProperty::from_entry(&self.shared, c))
            .ok_or(Error::OutOfRange {
                what: "property",
                index,
                count: children.len(),
            })
    }

    /// All children, in order.
    pub fn properties(&self) -> Result<Vec<IProperty>> {
        let children = self.reader.children(&self.shared)?;
        Ok(children.iter().map(|c| IProperty::from_entry(&self.shared, c)).collect())
    }

    /// Child compound by name.
    pub fn compound(&self, name: &str) -> Result<ICompoundProperty> {
        self.property(name)?.into_compound()
    }

    /// Child scalar property by name.
    pub fn scalar(&self, name: &str) -> Result<IScalarProperty> {
        self.property(name)?.into_scalar()
    }

    /// Child array property by name.
    pub fn array(&self, name: &str) -> Result<IArrayProperty> {
        self.property(name)?.into_array()
    }

    /// Like [`property`](Self::property) but absence is `Ok(None)`.
    pub fn find(&self, name: &str) -> Result<Option<IProperty>> {
        match self.property(name) {
            Ok(p) => Ok(Some(p)),
            Err(Error::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Hash over the merged children.
    pub fn hash(&self) -> Result<Option<Digest>> {
        self.reader.hash(&self.shared)
    }
}

macro_rules! leaf_common {
    () => {
        /// Header of this property.
        pub fn header(&self) -> &PropertyHeader {
            &self.reader.header
        }

        /// Property name.
        pub fn name(&self) -> &str {
            &self.reader.header.name
        }

        /// Property metadata.
        pub fn meta_data(&self) -> &MetaData {
            &self.reader.header.meta_data
        }

        /// Data type of every sample.
        pub fn data_type(&self) -> DataType {
            self.reader.header.data_type
        }

        /// Number of samples written.
        pub fn num_samples(&self) -> usize {
            self.reader.num_samples()
        }

        /// True when every sample index reads the same stored value.
        pub fn is_constant(&self) -> bool {
            self.reader.source.record.num_stored() <= 1
        }

        /// Time sampling this property follows.
        pub fn time_sampling(&self) -> &TimeSampling {
            &self.reader.time_sampling
        }

        /// Index into the merged time sampling table.
        pub fn time_sampling_index(&self) -> u32 {
            self.reader.header.time_sampling_index
        }

        /// Decoded sample; indices past the last repeat the last value.
        pub fn sample(&self, index: usize) -> Result<Arc<Sample>> {
            self.reader.sample(&self.shared, index)
        }

        /// Sample chosen by `selector`.
        pub fn sample_at(&self, selector: impl Into<SampleSelector>) -> Result<Arc<Sample>> {
            self.sample(self.resolve(selector))
        }

        /// Content key of the stored sample; `None` without digests.
        pub fn sample_key(&self, index: usize) -> Result<Option<Digest>> {
            self.reader.sample_key(index)
        }

        /// Lazily decode every sample in order.
        pub fn samples(&self) -> Samples<'_> {
            Samples {
                shared: &self.shared,
                reader: &self.reader,
                next: 0,
            }
        }

        /// Hash of header, sampling and sample keys.
        pub fn hash(&self) -> Result<Option<Digest>> {
            self.reader.hash()
        }

        fn resolve(&self, selector: impl Into<SampleSelector>) -> usize {
            selector.into().resolve(&self.reader.time_sampling, self.num_samples())
        }

        fn check_element<T: PodElement>(&self) -> Result<()> {
            if T::DATA_TYPE != self.reader.header.data_type {
                return Err(Error::type_mismatch(
                    T::DATA_TYPE.to_string(),
                    self.reader.header.data_type.to_string(),
                ));
            }
            Ok(())
        }

        fn check_string(&self) -> Result<()> {
            match self.reader.header.data_type.pod {
                PlainOldDataType::String | PlainOldDataType::Wstring => Ok(()),
                _ => Err(Error::type_mismatch("string", self.reader.header.data_type.to_string())),
            }
        }
    };
}

/// A scalar property being read: one element per sample.
#[derive(Clone)]
pub struct IScalarProperty {
    shared: Arc<ArchiveShared>,
    reader: Arc<LeafReader>,
}

impl IScalarProperty {
    leaf_common!();

    /// Typed value of sample `index`.
    pub fn value<T: PodElement>(&self, index: usize) -> Result<T> {
        self.check_element::<T>()?;
        let sample = self.sample(index)?;
        sample
            .elements::<T>()?
            .into_iter()
            .next()
            .ok_or_else(|| Error::malformed(format!("scalar property {:?} sample has no value", self.name())))
    }

    /// Typed value of the sample chosen by `selector`.
    pub fn value_at<T: PodElement>(&self, selector: impl Into<SampleSelector>) -> Result<T> {
        self.value(self.resolve(selector))
    }

    /// String value of sample `index`.
    pub fn string(&self, index: usize) -> Result<String> {
        self.check_string()?;
        let sample = self.sample(index)?;
        sample
            .strings()
            .and_then(|s| s.first().cloned())
            .ok_or_else(|| Error::malformed(format!("scalar property {:?} sample has no value", self.name())))
    }
}

/// An array property being read: any number of elements per sample.
#[derive(Clone)]
pub struct IArrayProperty {
    shared: Arc<ArchiveShared>,
    reader: Arc<LeafReader>,
}

impl IArrayProperty {
    leaf_common!();

    /// Typed values of sample `index`.
    pub fn values<T: PodElement>(&self, index: usize) -> Result<Vec<T>> {
        self.check_element::<T>()?;
        self.sample(index)?.elements::<T>()
    }

    /// Typed values of the sample chosen by `selector`.
    pub fn values_at<T: PodElement>(&self, selector: impl Into<SampleSelector>) -> Result<Vec<T>> {
        self.values(self.resolve(selector))
    }

    /// String values of sample `index`.
    pub fn strings(&self, index: usize) -> Result<Vec<String>> {
        self.check_string()?;
        let sample = self.sample(index)?;
        Ok(sample.strings().map(<[String]>::to_vec).unwrap_or_default())
    }

    /// Whether every sample has the same element count.
    pub fn is_homogeneous(&self) -> bool {
        self.reader.source.record.homogeneous
    }
}

/// Restartable iterator over a property's samples; call
/// [`IArrayProperty::samples`] again to start over.
pub struct Samples<'a> {
    shared: &'a ArchiveShared,
    reader: &'a LeafReader,
    next: usize,
}

impl Iterator for Samples<'_> {
    type Item = Result<Arc<Sample>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.reader.num_samples() {
            return None;
        }
        let index = self.next;
        self.next += 1;
        Some(self.reader.sample(self.shared, index))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = self.reader.num_samples().saturating_sub(self.next);
        (left, Some(left))
    }
}

impl ExactSizeIterator for Samples<'_> {}
