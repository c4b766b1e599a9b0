//! Geometry parameters: per-element attributes such as UVs, normals and
//! colors.
//!
//! A non-indexed parameter is a single array property. An indexed one is
//! a compound holding the distinct values in `.vals` and one `u32` per
//! element in `.indices`; expanding gathers `.vals` through `.indices` and
//! yields exactly what a non-indexed write of the same data holds.

use std::marker::PhantomData;

use crate::abc::{IArrayProperty, ICompoundProperty, IProperty};
use crate::core::{GeometryScope, MetaData, Sample, TimeSampling};
use crate::ogawa::{OArrayProperty, OCompoundProperty};
use crate::util::{DataType, Error, PodElement, Result};

/// Metadata key for the element scope.
pub const GEOM_SCOPE_KEY: &str = "geoScope";
/// Marks a property or compound as a geometry parameter.
pub const IS_GEOM_PARAM_KEY: &str = "isGeomParam";
pub const POD_NAME_KEY: &str = "podName";
pub const POD_EXTENT_KEY: &str = "podExtent";

pub const VALS_PROPERTY_NAME: &str = ".vals";
pub const INDICES_PROPERTY_NAME: &str = ".indices";

/// One sample of a geometry parameter.
#[derive(Clone, Debug, PartialEq)]
pub struct GeomParamSample<T> {
    pub values: Vec<T>,
    /// Per-element indices into `values`, for indexed parameters.
    pub indices: Option<Vec<u32>>,
    pub scope: GeometryScope,
}

impl<T: PodElement> GeomParamSample<T> {
    /// Plain values, one per element.
    pub fn new(values: Vec<T>, scope: GeometryScope) -> Self {
        Self {
            values,
            indices: None,
            scope,
        }
    }

    /// Values shared through `indices`.
    pub fn indexed(values: Vec<T>, indices: Vec<u32>, scope: GeometryScope) -> Self {
        Self {
            values,
            indices: Some(indices),
            scope,
        }
    }

    pub fn is_indexed(&self) -> bool {
        self.indices.is_some()
    }

    /// One value per element.
    pub fn expanded(&self) -> Result<Vec<T>> {
        let Some(indices) = &self.indices else {
            return Ok(self.values.clone());
        };
        indices
            .iter()
            .map(|&i| {
                self.values.get(i as usize).copied().ok_or(Error::OutOfRange {
                    what: "indexed value",
                    index: i as usize,
                    count: self.values.len(),
                })
            })
            .collect()
    }
}

fn param_meta(data_type: DataType, scope: GeometryScope, interpretation: Option<&str>, is_uv: bool) -> MetaData {
    let mut meta = MetaData::new()
        .with(IS_GEOM_PARAM_KEY, "true")
        .with(POD_NAME_KEY, data_type.pod.name())
        .with(POD_EXTENT_KEY, data_type.extent.to_string())
        .with(GEOM_SCOPE_KEY, scope.as_str());
    if let Some(interpretation) = interpretation {
        meta.set(MetaData::INTERPRETATION, interpretation);
    }
    if is_uv {
        meta.set(MetaData::IS_UV, "1");
    }
    meta
}

enum OParamStorage {
    Plain(OArrayProperty),
    Indexed { vals: OArrayProperty, indices: OArrayProperty },
}

/// Writer of a geometry parameter of element type `T`.
pub struct OGeomParam<T> {
    storage: OParamStorage,
    _element: PhantomData<T>,
}

impl<T: PodElement> OGeomParam<T> {
    /// Create under `parent`. Whether the parameter is indexed is fixed
    /// here; samples are converted to match.
    pub fn new(
        parent: &OCompoundProperty,
        name: &str,
        indexed: bool,
        scope: GeometryScope,
        time_sampling: u32,
        interpretation: Option<&str>,
    ) -> Result<Self> {
        Self::create(parent, name, indexed, scope, time_sampling, interpretation, false)
    }

    /// A texture-coordinate parameter, tagged `isUV`.
    pub fn uv(parent: &OCompoundProperty, name: &str, indexed: bool, scope: GeometryScope, time_sampling: u32) -> Result<Self> {
        Self::create(parent, name, indexed, scope, time_sampling, Some("vector"), true)
    }

    fn create(
        parent: &OCompoundProperty,
        name: &str,
        indexed: bool,
        scope: GeometryScope,
        time_sampling: u32,
        interpretation: Option<&str>,
        is_uv: bool,
    ) -> Result<Self> {
        let meta = param_meta(T::DATA_TYPE, scope, interpretation, is_uv);
        let storage = if indexed {
            let compound = parent.add_compound(name, meta)?;
            let vals = compound.add_array(VALS_PROPERTY_NAME, T::DATA_TYPE, time_sampling, MetaData::new())?;
            let indices = compound.add_array(INDICES_PROPERTY_NAME, DataType::UINT32, time_sampling, MetaData::new())?;
            OParamStorage::Indexed { vals, indices }
        } else {
            OParamStorage::Plain(parent.add_array(name, T::DATA_TYPE, time_sampling, meta)?)
        };
        Ok(Self {
            storage,
            _element: PhantomData,
        })
    }

    /// Written as values plus indices.
    pub fn is_indexed(&self) -> bool {
        matches!(self.storage, OParamStorage::Indexed { .. })
    }

    /// Append a sample; plain params store the expanded values.
    pub fn set(&self, sample: &GeomParamSample<T>) -> Result<()> {
        match &self.storage {
            OParamStorage::Plain(prop) => prop.set_values(&sample.expanded()?),
            OParamStorage::Indexed { vals, indices } => {
                let identity: Vec<u32>;
                let idx = match &sample.indices {
                    Some(i) => i,
                    None => {
                        identity = (0..sample.values.len() as u32).collect();
                        &identity
                    }
                };
                vals.set_values(&sample.values)?;
                indices.set_values(idx)
            }
        }
    }

    /// Write `count` empty samples.
    pub(crate) fn fill_empty(&self, count: usize) -> Result<()> {
        let empty = Sample::from_elements::<T>(&[])?;
        for _ in 0..count {
            match &self.storage {
                OParamStorage::Plain(prop) => prop.set_sample(&empty)?,
                OParamStorage::Indexed { vals, indices } => {
                    vals.set_sample(&empty)?;
                    indices.set_values::<u32>(&[])?;
                }
            }
        }
        Ok(())
    }

    /// Number of samples written.
    pub fn num_samples(&self) -> usize {
        match &self.storage {
            OParamStorage::Plain(prop) => prop.num_samples(),
            OParamStorage::Indexed { vals, .. } => vals.num_samples(),
        }
    }
}

#[derive(Clone)]
enum IParamStorage {
    Plain(IArrayProperty),
    Indexed { vals: IArrayProperty, indices: IArrayProperty },
}

/// Reader of a geometry parameter.
#[derive(Clone)]
pub struct IGeomParam {
    name: String,
    meta: MetaData,
    storage: IParamStorage,
}

impl IGeomParam {
    /// Open `name` under `parent`, indexed or not.
    pub fn open(parent: &ICompoundProperty, name: &str) -> Result<Self> {
        match parent.property(name)? {
            IProperty::Array(prop) => Ok(Self {
                name: name.to_string(),
                meta: prop.meta_data().clone(),
                storage: IParamStorage::Plain(prop),
            }),
            IProperty::Compound(compound) => Ok(Self {
                name: name.to_string(),
                meta: compound.meta_data().clone(),
                storage: IParamStorage::Indexed {
                    vals: compound.array(VALS_PROPERTY_NAME)?,
                    indices: compound.array(INDICES_PROPERTY_NAME)?,
                },
            }),
            IProperty::Scalar(_) => Err(Error::type_mismatch("geometry parameter", "scalar property")),
        }
    }

    /// Like [`open`](Self::open), `None` when `name` is absent.
    pub fn find(parent: &ICompoundProperty, name: &str) -> Result<Option<Self>> {
        if !parent.has_property(name)? {
            return Ok(None);
        }
        Self::open(parent, name).map(Some)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Metadata of the param property.
    pub fn meta_data(&self) -> &MetaData {
        &self.meta
    }

    /// Stored as values plus indices.
    pub fn is_indexed(&self) -> bool {
        matches!(self.storage, IParamStorage::Indexed { .. })
    }

    /// Carries the `isUV` flag.
    pub fn is_uv(&self) -> bool {
        self.meta.flag(MetaData::IS_UV)
    }

    /// Scope from `geoScope`; constant when absent.
    pub fn scope(&self) -> GeometryScope {
        self.meta
            .get(GEOM_SCOPE_KEY)
            .and_then(GeometryScope::parse)
            .unwrap_or_default()
    }

    fn values_prop(&self) -> &IArrayProperty {
        match &self.storage {
            IParamStorage::Plain(p) => p,
            IParamStorage::Indexed { vals, .. } => vals,
        }
    }

    /// Data type of the values.
    pub fn data_type(&self) -> DataType {
        self.values_prop().data_type()
    }

    /// Number of samples.
    pub fn num_samples(&self) -> usize {
        self.values_prop().num_samples()
    }

    /// Time sampling of the values.
    pub fn time_sampling(&self) -> &TimeSampling {
        self.values_prop().time_sampling()
    }

    /// Values and indices as stored.
    pub fn indexed_sample<T: PodElement>(&self, index: usize) -> Result<GeomParamSample<T>> {
        let scope = self.scope();
        Ok(match &self.storage {
            IParamStorage::Plain(p) => GeomParamSample::new(p.values(index)?, scope),
            IParamStorage::Indexed { vals, indices } => {
                GeomParamSample::indexed(vals.values(index)?, indices.values(index)?, scope)
            }
        })
    }

    /// One value per element.
    pub fn expanded_sample<T: PodElement>(&self, index: usize) -> Result<Vec<T>> {
        self.indexed_sample::<T>(index)?.expanded()
    }

    /// Expanded values as an untyped sample.
    pub fn expanded_raw(&self, index: usize) -> Result<Sample> {
        match &self.storage {
            IParamStorage::Plain(p) => Ok(p.sample(index)?.as_ref().clone()),
            IParamStorage::Indexed { vals, indices } => vals.sample(index)?.gather(&indices.values::<u32>(index)?),
        }
    }
}
