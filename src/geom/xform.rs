//! Xform (transform) schema.
//!
//! `.xform/.vals` holds the local matrix, `.xform/.inherits` whether the
//! parent transform applies.

use glam::{DMat4, DQuat, DVec3};

use super::util::{SchemaReader, SchemaWriter};
use super::SchemaView;
use crate::abc::{IObject, IScalarProperty};
use crate::core::{MetaData, SampleSelector, TimeSampling};
use crate::ogawa::{OObject, OScalarProperty};
use crate::util::{Bool, Chrono, DataType, Result};

const VALS: &str = ".vals";
const INHERITS: &str = ".inherits";

/// Local transform of one sample.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct XformSample {
    pub matrix: DMat4,
    pub inherits: bool,
}

impl Default for XformSample {
    fn default() -> Self {
        Self {
            matrix: DMat4::IDENTITY,
            inherits: true,
        }
    }
}

impl XformSample {
    /// Identity transform, inheriting.
    pub fn identity() -> Self {
        Self::default()
    }

    /// Inheriting transform from a matrix.
    pub fn from_matrix(matrix: DMat4) -> Self {
        Self { matrix, inherits: true }
    }

    /// Inheriting translation.
    pub fn from_translation(t: DVec3) -> Self {
        Self::from_matrix(DMat4::from_translation(t))
    }

    /// Scale, then rotate, then translate.
    pub fn from_srt(scale: DVec3, rotation: DQuat, translation: DVec3) -> Self {
        Self::from_matrix(DMat4::from_scale_rotation_translation(scale, rotation, translation))
    }

    /// Set whether the parent transform applies.
    pub fn with_inherits(mut self, inherits: bool) -> Self {
        self.inherits = inherits;
        self
    }

    /// Translation part of the matrix.
    pub fn translation(&self) -> DVec3 {
        self.matrix.w_axis.truncate()
    }
}

/// Xform writer.
pub struct OXform {
    base: SchemaWriter,
    vals: OScalarProperty,
    inherits: OScalarProperty,
}

impl OXform {
    /// Add the object under `parent` on sampling `time_sampling`.
    pub fn new(parent: &OObject, name: &str, time_sampling: u32) -> Result<Self> {
        let base = SchemaWriter::new(parent, name, SchemaView::Xform, time_sampling)?;
        let vals = base.scalar(VALS, DataType::MAT44D, MetaData::new())?;
        let inherits = base.scalar(INHERITS, DataType::BOOL, MetaData::new())?;
        Ok(Self { base, vals, inherits })
    }

    /// The transform object, for adding children below it.
    pub fn object(&self) -> &OObject {
        &self.base.object
    }

    /// Append the next sample.
    pub fn set(&mut self, sample: &XformSample) -> Result<()> {
        self.vals.set_value(&sample.matrix)?;
        self.inherits.set_value(&Bool::from(sample.inherits))?;
        self.base.num_samples += 1;
        Ok(())
    }

    /// Samples written so far.
    pub fn num_samples(&self) -> usize {
        self.base.num_samples
    }
}

/// Xform reader.
#[derive(Clone)]
pub struct IXform {
    base: SchemaReader,
    vals: IScalarProperty,
    inherits: Option<IScalarProperty>,
}

impl IXform {
    /// View `object` through this schema; `TypeMismatch` for any other.
    pub fn new(object: &IObject) -> Result<Self> {
        let base = SchemaReader::open(object, SchemaView::Xform)?;
        let vals = base.scalar(VALS)?;
        let inherits = base.opt_scalar(INHERITS)?;
        Ok(Self { base, vals, inherits })
    }

    /// The underlying object.
    pub fn object(&self) -> &IObject {
        &self.base.object
    }

    /// Number of samples.
    pub fn num_samples(&self) -> usize {
        self.vals.num_samples()
    }

    /// True with at most one distinct sample.
    pub fn is_constant(&self) -> bool {
        self.vals.is_constant() && self.inherits.as_ref().map_or(true, |p| p.is_constant())
    }

    /// Time sampling of the schema.
    pub fn time_sampling(&self) -> &TimeSampling {
        self.vals.time_sampling()
    }

    /// Sample `index`; later indices read the last sample.
    pub fn sample(&self, index: usize) -> Result<XformSample> {
        let matrix = self.vals.value::<DMat4>(index)?;
        let inherits = match &self.inherits {
            Some(p) if p.num_samples() > 0 => p.value::<Bool>(index)?.get(),
            _ => true,
        };
        Ok(XformSample { matrix, inherits })
    }

    /// Sample chosen by `selector`.
    pub fn sample_at(&self, selector: impl Into<SampleSelector>) -> Result<XformSample> {
        let index = selector.into().resolve(self.time_sampling(), self.num_samples());
        self.sample(index)
    }

    /// Local matrix composed with every inherited ancestor transform at
    /// `time`.
    pub fn world_matrix_at(&self, time: Chrono) -> Result<DMat4> {
        let local = self.sample_at(SampleSelector::Near(time))?;
        let mut world = local.matrix;
        let mut inherits = local.inherits;
        let mut parent = self.object().parent();
        while inherits && parent.valid() {
            if SchemaView::of(&parent) == Some(SchemaView::Xform) {
                let up = IXform::new(&parent)?.sample_at(SampleSelector::Near(time))?;
                world = up.matrix * world;
                inherits = up.inherits;
            }
            parent = parent.parent();
        }
        Ok(world)
    }
}
