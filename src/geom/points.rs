//! Points schema: particles with ids, optional velocities and widths.

use glam::Vec3;

use super::geom_param::{GeomParamSample, IGeomParam, OGeomParam};
use super::polymesh::{P, SELF_BNDS, VELOCITIES};
use super::util::{bounds_meta, read_optional, SchemaReader, SchemaWriter};
use super::SchemaView;
use crate::abc::{IArrayProperty, ICompoundProperty, IObject, IScalarProperty};
use crate::core::{GeometryScope, MetaData, SampleSelector, TimeSampling};
use crate::ogawa::{OArrayProperty, OCompoundProperty, OObject, OScalarProperty};
use crate::util::{BBox3d, DataType, Result};

const POINT_IDS: &str = ".pointIds";
const WIDTHS: &str = ".widths";

/// Point cloud sample.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PointsSample {
    pub positions: Vec<Vec3>,
    /// One id per point.
    pub ids: Vec<u64>,
    pub velocities: Option<Vec<Vec3>>,
    /// Per-point widths, expanded.
    pub widths: Option<Vec<f32>>,
    pub self_bounds: Option<BBox3d>,
}

impl PointsSample {
    /// Points with explicit ids.
    pub fn new(positions: Vec<Vec3>, ids: Vec<u64>) -> Self {
        Self {
            positions,
            ids,
            ..Default::default()
        }
    }

    /// Ids `0..n` for `n` positions.
    pub fn sequential(positions: Vec<Vec3>) -> Self {
        let ids = (0..positions.len() as u64).collect();
        Self::new(positions, ids)
    }

    /// Attach per-point widths.
    pub fn with_widths(mut self, widths: Vec<f32>) -> Self {
        self.widths = Some(widths);
        self
    }

    /// Attach per-point velocities.
    pub fn with_velocities(mut self, velocities: Vec<Vec3>) -> Self {
        self.velocities = Some(velocities);
        self
    }

    /// Number of points.
    pub fn num_points(&self) -> usize {
        self.positions.len()
    }

    /// Ids match positions one to one.
    pub fn is_valid(&self) -> bool {
        self.ids.len() == self.positions.len()
    }

    /// Bounds of the positions, grown by half the widest point.
    pub fn compute_bounds(&self) -> BBox3d {
        let mut bounds = BBox3d::from_points(&self.positions);
        let radius = self
            .widths
            .iter()
            .flatten()
            .fold(0.0f32, |acc, &w| acc.max(w))
            * 0.5;
        if radius > 0.0 && !bounds.is_empty() {
            let pad = glam::DVec3::splat(f64::from(radius));
            bounds.min -= pad;
            bounds.max += pad;
        }
        bounds
    }
}

/// Points writer.
pub struct OPoints {
    base: SchemaWriter,
    self_bnds: OScalarProperty,
    positions: OArrayProperty,
    ids: OArrayProperty,
    velocities: Option<OArrayProperty>,
    widths: Option<OGeomParam<f32>>,
}

impl OPoints {
    /// Add the object under `parent` on sampling `time_sampling`.
    pub fn new(parent: &OObject, name: &str, time_sampling: u32) -> Result<Self> {
        let base = SchemaWriter::new(parent, name, SchemaView::Points, time_sampling)?;
        let self_bnds = base.scalar(SELF_BNDS, DataType::BOX3D, bounds_meta())?;
        let positions = base.array(P, DataType::VEC3F, MetaData::new().with(MetaData::INTERPRETATION, "point"))?;
        let ids = base.array(POINT_IDS, DataType::UINT64, MetaData::new())?;
        Ok(Self {
            base,
            self_bnds,
            positions,
            ids,
            velocities: None,
            widths: None,
        })
    }

    /// The underlying object.
    pub fn object(&self) -> &OObject {
        &self.base.object
    }

    /// The `.arbGeomParams` compound, created on first use.
    pub fn arb_geom_params(&mut self) -> Result<&OCompoundProperty> {
        self.base.arb_geom_params()
    }

    /// Append the next sample.
    pub fn set(&mut self, sample: &PointsSample) -> Result<()> {
        let bounds = sample.self_bounds.unwrap_or_else(|| sample.compute_bounds());
        self.self_bnds.set_value(&bounds)?;
        self.positions.set_values(&sample.positions)?;
        self.ids.set_values(&sample.ids)?;

        if let Some(velocities) = &sample.velocities {
            self.base
                .optional_array(&mut self.velocities, VELOCITIES, DataType::VEC3F, MetaData::new())?
                .set_values(velocities)?;
        } else if let Some(prop) = &self.velocities {
            prop.set_values::<Vec3>(&[])?;
        }

        if let Some(widths) = &sample.widths {
            self.base
                .optional_param(&mut self.widths, |parent, ts| {
                    OGeomParam::new(parent, WIDTHS, false, GeometryScope::Varying, ts, None)
                })?
                .set(&GeomParamSample::new(widths.clone(), GeometryScope::Varying))?;
        } else if let Some(param) = &self.widths {
            param.fill_empty(1)?;
        }

        self.base.num_samples += 1;
        Ok(())
    }

    /// Samples written so far.
    pub fn num_samples(&self) -> usize {
        self.base.num_samples
    }
}

/// Points reader.
#[derive(Clone)]
pub struct IPoints {
    base: SchemaReader,
    positions: IArrayProperty,
    ids: IArrayProperty,
    self_bnds: Option<IScalarProperty>,
    velocities: Option<IArrayProperty>,
    widths: Option<IGeomParam>,
}

impl IPoints {
    /// View `object` through this schema; `TypeMismatch` for any other.
    pub fn new(object: &IObject) -> Result<Self> {
        let base = SchemaReader::open(object, SchemaView::Points)?;
        Ok(Self {
            positions: base.array(P)?,
            ids: base.array(POINT_IDS)?,
            self_bnds: base.opt_scalar(SELF_BNDS)?,
            velocities: base.opt_array(VELOCITIES)?,
            widths: IGeomParam::find(&base.schema, WIDTHS)?,
            base,
        })
    }

    /// The underlying object.
    pub fn object(&self) -> &IObject {
        &self.base.object
    }

    /// Number of samples.
    pub fn num_samples(&self) -> usize {
        self.positions.num_samples()
    }

    /// True with at most one distinct sample.
    pub fn is_constant(&self) -> bool {
        self.positions.is_constant() && self.ids.is_constant()
    }

    /// Time sampling of the schema.
    pub fn time_sampling(&self) -> &TimeSampling {
        self.positions.time_sampling()
    }

    /// The widths GeomParam, if written.
    pub fn widths(&self) -> Option<&IGeomParam> {
        self.widths.as_ref()
    }

    /// The `.arbGeomParams` compound, if written.
    pub fn arb_geom_params(&self) -> Result<Option<ICompoundProperty>> {
        self.base.arb_geom_params()
    }

    /// Sample `index`; later indices read the last sample.
    pub fn sample(&self, index: usize) -> Result<PointsSample> {
        let widths = match &self.widths {
            Some(p) if p.num_samples() > 0 => Some(p.expanded_sample::<f32>(index)?).filter(|w| !w.is_empty()),
            _ => None,
        };
        Ok(PointsSample {
            positions: self.positions.values(index)?,
            ids: self.ids.values(index)?,
            velocities: read_optional(&self.velocities, index)?,
            widths,
            self_bounds: self.self_bnds.as_ref().map(|p| p.value::<BBox3d>(index)).transpose()?,
        })
    }

    /// Sample chosen by `selector`.
    pub fn sample_at(&self, selector: impl Into<SampleSelector>) -> Result<PointsSample> {
        let index = selector.into().resolve(self.time_sampling(), self.num_samples());
        self.sample(index)
    }
}
