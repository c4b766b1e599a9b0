//! Archive read side: one or more layers merged into one tree.

use std::path::Path;
use std::sync::Arc;

use parking_lot::RwLock;
use rayon::prelude::*;
use tracing::{debug, instrument};

use super::layer::{Layer, ObjectSource};
use super::object::{IObject, ObjectNode, TOP};
use crate::core::{MetaData, SampleCache, TimeSampling};
use crate::ogawa::format::archive_info;
use crate::util::{Error, Result};

/// Options for opening archives.
#[derive(Clone, Debug)]
pub struct ReadOptions {
    /// Memory-map layer files instead of reading through a file handle.
    /// Defaults to on with the `mmap` feature.
    pub use_mmap: bool,
    /// Resolve every instance at open and fail on dangling sources.
    pub validate_instances: bool,
    /// Capacity of the decoded-sample cache; 0 disables it.
    pub sample_cache_bytes: usize,
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self {
            use_mmap: cfg!(feature = "mmap"),
            validate_instances: true,
            sample_cache_bytes: 64 * 1024 * 1024,
        }
    }
}

impl ReadOptions {
    /// Defaults: mmap per the `mmap` feature, instance validation on.
    pub fn new() -> Self {
        Self::default()
    }

    /// Map layers into memory instead of reading through a file handle.
    pub fn with_mmap(mut self, use_mmap: bool) -> Self {
        self.use_mmap = use_mmap;
        self
    }

    /// Resolve every instance source while opening.
    pub fn with_validate_instances(mut self, validate: bool) -> Self {
        self.validate_instances = validate;
        self
    }

    /// Byte budget of the decoded-sample cache; 0 disables it.
    pub fn with_sample_cache_bytes(mut self, bytes: usize) -> Self {
        self.sample_cache_bytes = bytes;
        self
    }
}

/// Who wrote an archive, and when.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ArchiveInfo {
    pub app_name: String,
    pub library_version: String,
    pub when_written: String,
    pub user_description: String,
}

impl ArchiveInfo {
    fn from_meta(meta: &MetaData) -> Self {
        let get = |key| meta.get(key).unwrap_or_default().to_string();
        Self {
            app_name: get(archive_info::APP_NAME),
            library_version: get(archive_info::LIBRARY_VERSION),
            when_written: get(archive_info::WHEN_WRITTEN),
            user_description: get(archive_info::USER_DESCRIPTION),
        }
    }
}

/// State shared by every handle of one read archive.
pub(crate) struct ArchiveShared {
    pub layers: Vec<Arc<Layer>>,
    time_samplings: Vec<(TimeSampling, u32)>,
    /// Per layer: layer table index -> merged table index.
    ts_maps: Vec<Vec<u32>>,
    pub cache: SampleCache,
    pub nodes: RwLock<Vec<Arc<ObjectNode>>>,
}

impl ArchiveShared {
    /// Merged time sampling at `index`.
    pub fn time_sampling(&self, index: usize) -> Option<&TimeSampling> {
        self.time_samplings.get(index).map(|(ts, _)| ts)
    }

    /// Map a layer-local time sampling index into the merged table.
    pub fn merged_time_sampling_index(&self, layer: u32, index: u32) -> Result<u32> {
        self.ts_maps
            .get(layer as usize)
            .and_then(|map| map.get(index as usize))
            .copied()
            .ok_or_else(|| Error::malformed(format!("layer {layer} has no time sampling {index}")))
    }

    pub fn all_digests(&self) -> bool {
        self.layers.iter().all(|l| l.has_digests())
    }
}

/// Union of the layers' time-sampling tables, equal samplings sharing an
/// index. The base layer keeps its indices.
fn merge_time_samplings(layers: &[Arc<Layer>]) -> (Vec<(TimeSampling, u32)>, Vec<Vec<u32>>) {
    let mut merged: Vec<(TimeSampling, u32)> = Vec::new();
    let mut maps = Vec::with_capacity(layers.len());
    for layer in layers {
        let map = layer
            .time_samplings
            .iter()
            .map(|(ts, max_samples)| match merged.iter().position(|(m, _)| m == ts) {
                Some(i) => {
                    merged[i].1 = merged[i].1.max(*max_samples);
                    i as u32
                }
                None => {
                    merged.push((ts.clone(), *max_samples));
                    (merged.len() - 1) as u32
                }
            })
            .collect();
        maps.push(map);
    }
    if merged.is_empty() {
        merged.push((TimeSampling::identity(), 0));
    }
    (merged, maps)
}

/// An archive opened for reading.
///
/// With several layers the first is the base and later layers override
/// it: objects union by path, later scalar and array properties win, and
/// `prune`/`replace` metadata in override layers removes or resets a
/// subtree.
#[derive(Clone)]
pub struct IArchive {
    shared: Arc<ArchiveShared>,
}

impl IArchive {
    /// Open a single archive.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with(path, ReadOptions::default())
    }

    /// Open a single archive with explicit options.
    pub fn open_with(path: impl AsRef<Path>, options: ReadOptions) -> Result<Self> {
        Self::open_layers_with(&[path.as_ref()], options)
    }

    /// Open `paths` as one layered archive, base layer first.
    pub fn open_layers<P: AsRef<Path> + Sync>(paths: &[P]) -> Result<Self> {
        Self::open_layers_with(paths, ReadOptions::default())
    }

    /// Open several archives as layers, base first, with explicit options.
    #[instrument(skip_all, fields(layers = paths.len()))]
    pub fn open_layers_with<P: AsRef<Path> + Sync>(paths: &[P], options: ReadOptions) -> Result<Self> {
        if paths.is_empty() {
            return Err(Error::invalid_state("at least one layer is required"));
        }
        let layers = paths
            .par_iter()
            .enumerate()
            .map(|(i, path)| Layer::open(path.as_ref(), i as u32, options.use_mmap).map(Arc::new))
            .collect::<Result<Vec<_>>>()?;

        let (time_samplings, ts_maps) = merge_time_samplings(&layers);
        let top = ObjectNode::top(layers.iter().map(ObjectSource::top).collect());
        let shared = Arc::new(ArchiveShared {
            time_samplings,
            ts_maps,
            cache: SampleCache::new(options.sample_cache_bytes),
            nodes: RwLock::new(vec![Arc::new(top)]),
            layers,
        });

        if options.validate_instances {
            let instances = shared.validate_instances()?;
            debug!(instances, "validated instances");
        }
        debug!(
            layers = shared.layers.len(),
            time_samplings = shared.time_samplings.len(),
            digests = shared.all_digests(),
            "opened archive"
        );
        Ok(Self { shared })
    }

    /// Path of the base layer.
    pub fn path(&self) -> &Path {
        &self.shared.layers[0].path
    }

    /// Paths of every layer, base first.
    pub fn layer_paths(&self) -> Vec<&Path> {
        self.shared.layers.iter().map(|l| l.path.as_path()).collect()
    }

    /// Number of layers.
    pub fn layer_count(&self) -> usize {
        self.shared.layers.len()
    }

    /// The root object `/`.
    pub fn top(&self) -> IObject {
        IObject::new(Arc::clone(&self.shared), TOP)
    }

    /// Object at a full path such as `/a/b`; an invalid handle when absent.
    pub fn find_object(&self, path: &str) -> Result<IObject> {
        Ok(match self.shared.find(path)? {
            Some(id) => IObject::new(Arc::clone(&self.shared), id),
            None => IObject::invalid(Arc::clone(&self.shared)),
        })
    }

    /// Size of the merged time sampling table.
    pub fn num_time_samplings(&self) -> usize {
        self.shared.time_samplings.len()
    }

    /// Merged time sampling at `index`.
    pub fn time_sampling(&self, index: usize) -> Option<&TimeSampling> {
        self.shared.time_sampling(index)
    }

    /// Merged time samplings in table order.
    pub fn time_samplings(&self) -> impl Iterator<Item = &TimeSampling> {
        self.shared.time_samplings.iter().map(|(ts, _)| ts)
    }

    /// Most samples any property written with sampling `index` holds.
    pub fn max_num_samples_for_time_sampling_index(&self, index: usize) -> Option<u32> {
        self.shared.time_samplings.get(index).map(|(_, max)| *max)
    }

    /// Archive metadata of the base layer.
    pub fn archive_metadata(&self) -> &MetaData {
        &self.shared.layers[0].archive_meta
    }

    /// Writer info of the base layer.
    pub fn archive_info(&self) -> ArchiveInfo {
        ArchiveInfo::from_meta(self.archive_metadata())
    }

    /// Info of every layer, base first.
    pub fn layer_infos(&self) -> Vec<ArchiveInfo> {
        self.shared.layers.iter().map(|l| ArchiveInfo::from_meta(&l.archive_meta)).collect()
    }

    /// Format version of the base layer.
    pub fn format_version(&self) -> i32 {
        self.shared.layers[0].format_version
    }

    /// Library version that wrote the base layer.
    pub fn library_version(&self) -> i32 {
        self.shared.layers[0].library_version
    }

    /// Whether every layer records digests, so hash queries answer.
    pub fn has_digests(&self) -> bool {
        self.shared.all_digests()
    }

    /// Bytes held by the sample cache.
    pub fn cache_size(&self) -> usize {
        self.shared.cache.size()
    }

    /// Drop every cached sample.
    pub fn clear_cache(&self) {
        self.shared.cache.clear();
    }
}

impl std::fmt::Debug for IArchive {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IArchive")
            .field("layers", &self.layer_paths())
            .field("time_samplings", &self.num_time_samplings())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ogawa::OArchive;
    use tempfile::NamedTempFile;

    #[test]
    fn test_time_sampling_tables_merge_by_value() -> Result<()> {
        let base = NamedTempFile::new()?;
        let over = NamedTempFile::new()?;
        let fps24 = TimeSampling::uniform(1.0 / 24.0, 0.0);
        let fps30 = TimeSampling::uniform(1.0 / 30.0, 0.0);
        {
            let archive = OArchive::create(base.path())?;
            let ts = archive.add_time_sampling(fps24.clone())?;
            let p = archive.top().properties().add_scalar("a", crate::util::DataType::INT32, ts, MetaData::new())?;
            for i in 0..3 {
                p.set_value(&i)?;
            }
        }
        {
            let archive = OArchive::create(over.path())?;
            let t30 = archive.add_time_sampling(fps30.clone())?;
            let t24 = archive.add_time_sampling(fps24.clone())?;
            assert_eq!((t30, t24), (1, 2));
            let props = archive.top().properties();
            let p = props.add_scalar("b", crate::util::DataType::INT32, t24, MetaData::new())?;
            for i in 0..5 {
                p.set_value(&i)?;
            }
            props.add_scalar("c", crate::util::DataType::INT32, t30, MetaData::new())?.set_value(&0)?;
        }

        let archive = IArchive::open_layers(&[base.path(), over.path()])?;
        assert_eq!(archive.num_time_samplings(), 3);
        assert_eq!(archive.time_sampling(1), Some(&fps24));
        assert_eq!(archive.time_sampling(2), Some(&fps30));
        assert_eq!(archive.max_num_samples_for_time_sampling_index(1), Some(5));
        assert_eq!(archive.max_num_samples_for_time_sampling_index(9), None);

        let props = archive.top().properties()?;
        assert_eq!(props.scalar("b")?.time_sampling_index(), 1);
        assert_eq!(props.scalar("c")?.time_sampling_index(), 2);
        Ok(())
    }

    #[test]
    fn test_open_requires_a_layer() {
        let none: [&Path; 0] = [];
        assert!(matches!(IArchive::open_layers(&none), Err(Error::InvalidState(_))));
    }

    #[test]
    fn test_archive_info() -> Result<()> {
        let temp = NamedTempFile::new()?;
        let options = crate::ogawa::WriteOptions::new()
            .with_app_name("unit test")
            .with_user_description("info check");
        OArchive::create_with(temp.path(), options)?.close()?;

        let archive = IArchive::open(temp.path())?;
        let info = archive.archive_info();
        assert_eq!(info.app_name, "unit test");
        assert_eq!(info.user_description, "info check");
        assert!(info.library_version.starts_with("abcstore"));
        assert!(!info.when_written.is_empty());
        assert_eq!(archive.layer_count(), 1);
        Ok(())
    }
}
