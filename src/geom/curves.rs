//! Curves schema: a batch of curves sharing one basis.
//!
//! `curveBasisAndType` packs `[type, periodicity, basis, 0]` into one
//! `uint8[4]` scalar.

use glam::Vec3;

use super::geom_param::{GeomParamSample, IGeomParam, OGeomParam};
use super::polymesh::{P, SELF_BNDS, VELOCITIES};
use super::util::{bounds_meta, read_optional, SchemaReader, SchemaWriter};
use super::SchemaView;
use crate::abc::{IArrayProperty, ICompoundProperty, IObject, IScalarProperty};
use crate::core::{MetaData, SampleSelector, TimeSampling};
use crate::ogawa::{OArrayProperty, OCompoundProperty, OObject, OScalarProperty};
use crate::util::{BBox3d, DataType, Error, PlainOldDataType, Result};

const N_VERTICES: &str = "nVertices";
const BASIS_AND_TYPE: &str = "curveBasisAndType";
const WIDTH: &str = "width";
const ORDERS: &str = ".orders";
const KNOTS: &str = ".knots";

macro_rules! u8_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident = $value:literal),* $(,)? }) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
        pub enum $name {
            #[default]
            $($variant = $value),*
        }

        impl $name {
            /// Decode the packed byte.
            pub fn from_u8(value: u8) -> Option<Self> {
                match value {
                    $($value => Some(Self::$variant),)*
                    _ => None,
                }
            }

            /// Packed byte as stored.
            pub fn to_u8(self) -> u8 {
                self as u8
            }
        }
    };
}

u8_enum! {
    /// Polynomial degree of the curves.
    CurveType { Cubic = 0, Linear = 1, VariableOrder = 2 }
}

u8_enum! {
    /// Whether curves close on themselves.
    CurvePeriodicity { NonPeriodic = 0, Periodic = 1 }
}

u8_enum! {
    /// Interpolation basis of cubic curves.
    BasisType { NoBasis = 0, Bezier = 1, Bspline = 2, CatmullRom = 3, Hermite = 4, Power = 5 }
}

/// Curves sample.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CurvesSample {
    pub positions: Vec<Vec3>,
    /// Vertex count of each curve.
    pub num_vertices: Vec<i32>,
    pub curve_type: CurveType,
    pub periodicity: CurvePeriodicity,
    pub basis: BasisType,
    pub velocities: Option<Vec<Vec3>>,
    pub widths: Option<GeomParamSample<f32>>,
    /// Per-curve order, for [`CurveType::VariableOrder`].
    pub orders: Option<Vec<u8>>,
    pub knots: Option<Vec<f32>>,
    pub self_bounds: Option<BBox3d>,
}

impl CurvesSample {
    /// Curves of the given type, without a basis, non-periodic.
    pub fn new(positions: Vec<Vec3>, num_vertices: Vec<i32>, curve_type: CurveType) -> Self {
        Self {
            positions,
            num_vertices,
            curve_type,
            ..Default::default()
        }
    }

    /// Set the basis.
    pub fn with_basis(mut self, basis: BasisType) -> Self {
        self.basis = basis;
        self
    }

    /// Set the wrap mode.
    pub fn with_periodicity(mut self, periodicity: CurvePeriodicity) -> Self {
        self.periodicity = periodicity;
        self
    }

    /// Attach widths.
    pub fn with_widths(mut self, widths: GeomParamSample<f32>) -> Self {
        self.widths = Some(widths);
        self
    }

    /// Number of curves.
    pub fn num_curves(&self) -> usize {
        self.num_vertices.len()
    }

    /// Vertex counts add up to the number of positions.
    pub fn is_valid(&self) -> bool {
        let total: i64 = self.num_vertices.iter().map(|&n| i64::from(n)).sum();
        total == self.positions.len() as i64 && self.num_vertices.iter().all(|&n| n > 0)
    }

    /// Bounds of the control points.
    pub fn compute_bounds(&self) -> BBox3d {
        BBox3d::from_points(&self.positions)
    }

    fn packed_basis_and_type(&self) -> [u8; 4] {
        [self.curve_type.to_u8(), self.periodicity.to_u8(), self.basis.to_u8(), 0]
    }
}

/// Curves writer.
pub struct OCurves {
    base: SchemaWriter,
    self_bnds: OScalarProperty,
    positions: OArrayProperty,
    num_vertices: OArrayProperty,
    basis_and_type: OScalarProperty,
    velocities: Option<OArrayProperty>,
    widths: Option<OGeomParam<f32>>,
    orders: Option<OArrayProperty>,
    knots: Option<OArrayProperty>,
}

impl OCurves {
    /// Add the object under `parent` on sampling `time_sampling`.
    pub fn new(parent: &OObject, name: &str, time_sampling: u32) -> Result<Self> {
        let base = SchemaWriter::new(parent, name, SchemaView::Curves, time_sampling)?;
        let self_bnds = base.scalar(SELF_BNDS, DataType::BOX3D, bounds_meta())?;
        let positions = base.array(P, DataType::VEC3F, MetaData::new().with(MetaData::INTERPRETATION, "point"))?;
        let num_vertices = base.array(N_VERTICES, DataType::INT32, MetaData::new())?;
        let basis_and_type = base.scalar(
            BASIS_AND_TYPE,
            DataType::new(PlainOldDataType::Uint8, 4),
            MetaData::new(),
        )?;
        Ok(Self {
            base,
            self_bnds,
            positions,
            num_vertices,
            basis_and_type,
            velocities: None,
            widths: None,
            orders: None,
            knots: None,
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
    pub fn set(&mut self, sample: &CurvesSample) -> Result<()> {
        let bounds = sample.self_bounds.unwrap_or_else(|| sample.compute_bounds());
        self.self_bnds.set_value(&bounds)?;
        self.positions.set_values(&sample.positions)?;
        self.num_vertices.set_values(&sample.num_vertices)?;
        self.basis_and_type.set_value(&sample.packed_basis_and_type())?;

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
                    OGeomParam::new(parent, WIDTH, widths.is_indexed(), widths.scope, ts, None)
                })?
                .set(widths)?;
        } else if let Some(param) = &self.widths {
            param.fill_empty(1)?;
        }

        if let Some(orders) = &sample.orders {
            self.base
                .optional_array(&mut self.orders, ORDERS, DataType::UINT8, MetaData::new())?
                .set_values(orders)?;
        } else if let Some(prop) = &self.orders {
            prop.set_values::<u8>(&[])?;
        }

        if let Some(knots) = &sample.knots {
            self.base
                .optional_array(&mut self.knots, KNOTS, DataType::FLOAT32, MetaData::new())?
                .set_values(knots)?;
        } else if let Some(prop) = &self.knots {
            prop.set_values::<f32>(&[])?;
        }

        self.base.num_samples += 1;
        Ok(())
    }

    /// Samples written so far.
    pub fn num_samples(&self) -> usize {
        self.base.num_samples
    }
}

/// Curves reader.
#[derive(Clone)]
pub struct ICurves {
    base: SchemaReader,
    positions: IArrayProperty,
    num_vertices: IArrayProperty,
    basis_and_type: IScalarProperty,
    self_bnds: Option<IScalarProperty>,
    velocities: Option<IArrayProperty>,
    widths: Option<IGeomParam>,
    orders: Option<IArrayProperty>,
    knots: Option<IArrayProperty>,
}

impl ICurves {
    /// View `object` through this schema; `TypeMismatch` for any other.
    pub fn new(object: &IObject) -> Result<Self> {
        let base = SchemaReader::open(object, SchemaView::Curves)?;
        Ok(Self {
            positions: base.array(P)?,
            num_vertices: base.array(N_VERTICES)?,
            basis_and_type: base.scalar(BASIS_AND_TYPE)?,
            self_bnds: base.opt_scalar(SELF_BNDS)?,
            velocities: base.opt_array(VELOCITIES)?,
            widths: IGeomParam::find(&base.schema, WIDTH)?,
            orders: base.opt_array(ORDERS)?,
            knots: base.opt_array(KNOTS)?,
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
        self.positions.is_constant() && self.num_vertices.is_constant()
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
    pub fn sample(&self, index: usize) -> Result<CurvesSample> {
        let [ty, wrap, basis, _] = self.basis_and_type.value::<[u8; 4]>(index)?;
        let bad = |what: &str, v: u8| Error::malformed(format!("{what} {v} in {}", self.object().full_name()));
        let widths = match &self.widths {
            Some(p) if p.num_samples() > 0 => Some(p.indexed_sample::<f32>(index)?).filter(|w| !w.values.is_empty()),
            _ => None,
        };
        Ok(CurvesSample {
            positions: self.positions.values(index)?,
            num_vertices: self.num_vertices.values(index)?,
            curve_type: CurveType::from_u8(ty).ok_or_else(|| bad("curve type", ty))?,
            periodicity: CurvePeriodicity::from_u8(wrap).ok_or_else(|| bad("periodicity", wrap))?,
            basis: BasisType::from_u8(basis).ok_or_else(|| bad("basis", basis))?,
            velocities: read_optional(&self.velocities, index)?,
            widths,
            orders: read_optional(&self.orders, index)?,
            knots: read_optional(&self.knots, index)?,
            self_bounds: self.self_bnds.as_ref().map(|p| p.value::<BBox3d>(index)).transpose()?,
        })
    }

    /// Sample chosen by `selector`.
    pub fn sample_at(&self, selector: impl Into<SampleSelector>) -> Result<CurvesSample> {
        let index = selector.into().resolve(self.time_sampling(), self.num_samples());
        self.sample(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_u8_codes() {
        assert_eq!(CurveType::from_u8(2), Some(CurveType::VariableOrder));
        assert_eq!(CurveType::from_u8(9), None);
        assert_eq!(BasisType::CatmullRom.to_u8(), 3);
        assert_eq!(CurvePeriodicity::default(), CurvePeriodicity::NonPeriodic);
    }

    #[test]
    fn test_sample_validity() {
        let s = CurvesSample::new(vec![Vec3::ZERO; 7], vec![4, 3], CurveType::Linear);
        assert!(s.is_valid());
        assert_eq!(s.num_curves(), 2);
        assert_eq!(
            s.clone().with_basis(BasisType::Bspline).packed_basis_and_type(),
            [1, 0, 2, 0]
        );
        assert!(!CurvesSample::new(vec![Vec3::ZERO; 6], vec![4, 3], CurveType::Linear).is_valid());
    }
}
