//! NuPatch (NURBS surface) schema.

use glam::{Vec2, Vec3};

use super::geom_param::{GeomParamSample, IGeomParam, OGeomParam};
use super::polymesh::{P, SELF_BNDS, VELOCITIES};
use super::util::{bounds_meta, read_optional, SchemaReader, SchemaWriter};
use super::SchemaView;
use crate::abc::{IArrayProperty, ICompoundProperty, IObject, IScalarProperty};
use crate::core::{MetaData, SampleSelector, TimeSampling};
use crate::ogawa::{OArrayProperty, OCompoundProperty, OObject, OScalarProperty};
use crate::util::{BBox3d, DataType, Result};

const NU: &str = "nu";
const NV: &str = "nv";
const U_ORDER: &str = "uOrder";
const V_ORDER: &str = "vOrder";
const U_KNOT: &str = "uKnot";
const V_KNOT: &str = "vKnot";
const WEIGHTS: &str = "w";
const UV: &str = "uv";
const N: &str = "N";

/// NURBS patch sample.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct NuPatchSample {
    /// Control points, `num_u * num_v` of them, u varying fastest.
    pub positions: Vec<Vec3>,
    pub num_u: i32,
    pub num_v: i32,
    pub u_order: i32,
    pub v_order: i32,
    pub u_knots: Vec<f32>,
    pub v_knots: Vec<f32>,
    /// Rational weights, one per control point.
    pub weights: Option<Vec<f32>>,
    pub velocities: Option<Vec<Vec3>>,
    pub uvs: Option<GeomParamSample<Vec2>>,
    pub normals: Option<GeomParamSample<Vec3>>,
    pub self_bounds: Option<BBox3d>,
}

impl NuPatchSample {
    /// Patch from control points, counts, orders and knots.
    pub fn new(
        positions: Vec<Vec3>,
        (num_u, num_v): (i32, i32),
        (u_order, v_order): (i32, i32),
        u_knots: Vec<f32>,
        v_knots: Vec<f32>,
    ) -> Self {
        Self {
            positions,
            num_u,
            num_v,
            u_order,
            v_order,
            u_knots,
            v_knots,
            ..Default::default()
        }
    }

    /// Attach rational weights, one per control point.
    pub fn with_weights(mut self, weights: Vec<f32>) -> Self {
        self.weights = Some(weights);
        self
    }

    /// Control point count matches `num_u * num_v` and each knot vector
    /// has `num + order` entries.
    pub fn is_valid(&self) -> bool {
        let count = i64::from(self.num_u) * i64::from(self.num_v);
        count > 0
            && self.positions.len() as i64 == count
            && self.u_knots.len() as i64 == i64::from(self.num_u) + i64::from(self.u_order)
            && self.v_knots.len() as i64 == i64::from(self.num_v) + i64::from(self.v_order)
            && self.weights.as_ref().map_or(true, |w| w.len() as i64 == count)
    }

    /// Bounds of the control points.
    pub fn compute_bounds(&self) -> BBox3d {
        BBox3d::from_points(&self.positions)
    }
}

/// NuPatch writer.
pub struct ONuPatch {
    base: SchemaWriter,
    self_bnds: OScalarProperty,
    positions: OArrayProperty,
    nu: OScalarProperty,
    nv: OScalarProperty,
    u_order: OScalarProperty,
    v_order: OScalarProperty,
    u_knot: OArrayProperty,
    v_knot: OArrayProperty,
    weights: Option<OArrayProperty>,
    velocities: Option<OArrayProperty>,
    uvs: Option<OGeomParam<Vec2>>,
    normals: Option<OGeomParam<Vec3>>,
}

impl ONuPatch {
    /// Add the object under `parent` on sampling `time_sampling`.
    pub fn new(parent: &OObject, name: &str, time_sampling: u32) -> Result<Self> {
        let base = SchemaWriter::new(parent, name, SchemaView::NuPatch, time_sampling)?;
        Ok(Self {
            self_bnds: base.scalar(SELF_BNDS, DataType::BOX3D, bounds_meta())?,
            positions: base.array(P, DataType::VEC3F, MetaData::new().with(MetaData::INTERPRETATION, "point"))?,
            nu: base.scalar(NU, DataType::INT32, MetaData::new())?,
            nv: base.scalar(NV, DataType::INT32, MetaData::new())?,
            u_order: base.scalar(U_ORDER, DataType::INT32, MetaData::new())?,
            v_order: base.scalar(V_ORDER, DataType::INT32, MetaData::new())?,
            u_knot: base.array(U_KNOT, DataType::FLOAT32, MetaData::new())?,
            v_knot: base.array(V_KNOT, DataType::FLOAT32, MetaData::new())?,
            weights: None,
            velocities: None,
            uvs: None,
            normals: None,
            base,
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
    pub fn set(&mut self, sample: &NuPatchSample) -> Result<()> {
        let bounds = sample.self_bounds.unwrap_or_else(|| sample.compute_bounds());
        self.self_bnds.set_value(&bounds)?;
        self.positions.set_values(&sample.positions)?;
        self.nu.set_value(&sample.num_u)?;
        self.nv.set_value(&sample.num_v)?;
        self.u_order.set_value(&sample.u_order)?;
        self.v_order.set_value(&sample.v_order)?;
        self.u_knot.set_values(&sample.u_knots)?;
        self.v_knot.set_values(&sample.v_knots)?;

        if let Some(weights) = &sample.weights {
            self.base
                .optional_array(&mut self.weights, WEIGHTS, DataType::FLOAT32, MetaData::new())?
                .set_values(weights)?;
        } else if let Some(prop) = &self.weights {
            prop.set_values::<f32>(&[])?;
        }

        if let Some(velocities) = &sample.velocities {
            self.base
                .optional_array(&mut self.velocities, VELOCITIES, DataType::VEC3F, MetaData::new())?
                .set_values(velocities)?;
        } else if let Some(prop) = &self.velocities {
            prop.set_values::<Vec3>(&[])?;
        }

        if let Some(uvs) = &sample.uvs {
            self.base
                .optional_param(&mut self.uvs, |parent, ts| {
                    OGeomParam::uv(parent, UV, uvs.is_indexed(), uvs.scope, ts)
                })?
                .set(uvs)?;
        } else if let Some(param) = &self.uvs {
            param.fill_empty(1)?;
        }

        if let Some(normals) = &sample.normals {
            self.base
                .optional_param(&mut self.normals, |parent, ts| {
                    OGeomParam::new(parent, N, normals.is_indexed(), normals.scope, ts, Some("normal"))
                })?
                .set(normals)?;
        } else if let Some(param) = &self.normals {
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

/// NuPatch reader.
#[derive(Clone)]
pub struct INuPatch {
    base: SchemaReader,
    positions: IArrayProperty,
    nu: IScalarProperty,
    nv: IScalarProperty,
    u_order: IScalarProperty,
    v_order: IScalarProperty,
    u_knot: IArrayProperty,
    v_knot: IArrayProperty,
    self_bnds: Option<IScalarProperty>,
    weights: Option<IArrayProperty>,
    velocities: Option<IArrayProperty>,
}

impl INuPatch {
    /// View `object` through this schema; `TypeMismatch` for any other.
    pub fn new(object: &IObject) -> Result<Self> {
        let base = SchemaReader::open(object, SchemaView::NuPatch)?;
        Ok(Self {
            positions: base.array(P)?,
            nu: base.scalar(NU)?,
            nv: base.scalar(NV)?,
            u_order: base.scalar(U_ORDER)?,
            v_order: base.scalar(V_ORDER)?,
            u_knot: base.array(U_KNOT)?,
            v_knot: base.array(V_KNOT)?,
            self_bnds: base.opt_scalar(SELF_BNDS)?,
            weights: base.opt_array(WEIGHTS)?,
            velocities: base.opt_array(VELOCITIES)?,
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
        self.positions.is_constant() && self.u_knot.is_constant() && self.v_knot.is_constant()
    }

    /// Time sampling of the schema.
    pub fn time_sampling(&self) -> &TimeSampling {
        self.positions.time_sampling()
    }

    /// The `uv` GeomParam, if written.
    pub fn uvs(&self) -> Result<Option<IGeomParam>> {
        IGeomParam::find(&self.base.schema, UV)
    }

    /// The `N` GeomParam, if written.
    pub fn normals(&self) -> Result<Option<IGeomParam>> {
        IGeomParam::find(&self.base.schema, N)
    }

    /// The `.arbGeomParams` compound, if written.
    pub fn arb_geom_params(&self) -> Result<Option<ICompoundProperty>> {
        self.base.arb_geom_params()
    }

    /// Sample `index`; later indices read the last sample.
    pub fn sample(&self, index: usize) -> Result<NuPatchSample> {
        let uvs = match self.uvs()? {
            Some(p) if p.num_samples() > 0 => Some(p.indexed_sample::<Vec2>(index)?).filter(|s| !s.values.is_empty()),
            _ => None,
        };
        let normals = match self.normals()? {
            Some(p) if p.num_samples() > 0 => Some(p.indexed_sample::<Vec3>(index)?).filter(|s| !s.values.is_empty()),
            _ => None,
        };
        Ok(NuPatchSample {
            positions: self.positions.values(index)?,
            num_u: self.nu.value(index)?,
            num_v: self.nv.value(index)?,
            u_order: self.u_order.value(index)?,
            v_order: self.v_order.value(index)?,
            u_knots: self.u_knot.values(index)?,
            v_knots: self.v_knot.values(index)?,
            weights: read_optional(&self.weights, index)?,
            velocities: read_optional(&self.velocities, index)?,
            uvs,
            normals,
            self_bounds: self.self_bnds.as_ref().map(|p| p.value::<BBox3d>(index)).transpose()?,
        })
    }

    /// Sample chosen by `selector`.
    pub fn sample_at(&self, selector: impl Into<SampleSelector>) -> Result<NuPatchSample> {
        let index = selector.into().resolve(self.time_sampling(), self.num_samples());
        self.sample(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bilinear() -> NuPatchSample {
        NuPatchSample::new(
            vec![Vec3::ZERO, Vec3::X, Vec3::Y, Vec3::new(1.0, 1.0, 0.0)],
            (2, 2),
            (2, 2),
            vec![0.0, 0.0, 1.0, 1.0],
            vec![0.0, 0.0, 1.0, 1.0],
        )
    }

    #[test]
    fn test_validity() {
        assert!(bilinear().is_valid());
        assert!(!bilinear().with_weights(vec![1.0; 3]).is_valid());

        let mut short = bilinear();
        short.u_knots.pop();
        assert!(!short.is_valid());
        assert!(!NuPatchSample::default().is_valid());
    }
}
