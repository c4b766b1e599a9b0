//! Light schema.
//!
//! Alembic defines no light types of its own: a light may carry an
//! embedded camera compound for its projection and the bounds of its
//! children, and everything else goes in user properties.

use super::camera::{add_core, read_core, CameraSample, CHILD_BNDS, CORE};
use super::util::{bounds_meta, SchemaReader, SchemaWriter};
use super::SchemaView;
use crate::abc::{ICompoundProperty, IObject, IScalarProperty};
use crate::core::{SampleSelector, TimeSampling};
use crate::ogawa::{OCompoundProperty, OObject, OScalarProperty};
use crate::util::{BBox3d, DataType, Result};

/// Name of the embedded camera compound.
const CAMERA: &str = ".camera";

/// Light writer.
pub struct OLight {
    base: SchemaWriter,
    camera: Option<OScalarProperty>,
    child_bnds: Option<OScalarProperty>,
}

impl OLight {
    /// Add the object under `parent` on sampling `time_sampling`.
    pub fn new(parent: &OObject, name: &str, time_sampling: u32) -> Result<Self> {
        Ok(Self {
            base: SchemaWriter::new(parent, name, SchemaView::Light, time_sampling)?,
            camera: None,
            child_bnds: None,
        })
    }

    /// The underlying object.
    pub fn object(&self) -> &OObject {
        &self.base.object
    }

    /// The `.userProperties` compound, created on first use.
    pub fn user_properties(&mut self) -> Result<&OCompoundProperty> {
        self.base.user_properties()
    }

    /// The `.arbGeomParams` compound, created on first use.
    pub fn arb_geom_params(&mut self) -> Result<&OCompoundProperty> {
        self.base.arb_geom_params()
    }

    /// Append a camera sample, creating the camera compound on first use.
    pub fn set_camera(&mut self, sample: &CameraSample) -> Result<()> {
        if self.camera.is_none() {
            let compound = self
                .base
                .schema
                .add_compound(CAMERA, SchemaView::Camera.compound_meta())?;
            self.camera = Some(add_core(&compound, self.base.time_sampling)?);
        }
        if let Some(core) = &self.camera {
            core.set_value(&sample.to_core())?;
        }
        self.base.num_samples = self.base.num_samples.max(self.camera.as_ref().map_or(0, |c| c.num_samples()));
        Ok(())
    }

    /// Append a child bounds sample.
    pub fn set_child_bounds(&mut self, bounds: &BBox3d) -> Result<()> {
        if self.child_bnds.is_none() {
            self.child_bnds = Some(self.base.scalar(CHILD_BNDS, DataType::BOX3D, bounds_meta())?);
        }
        if let Some(prop) = &self.child_bnds {
            prop.set_value(bounds)?;
        }
        Ok(())
    }
}

/// Light reader.
#[derive(Clone)]
pub struct ILight {
    base: SchemaReader,
    camera: Option<IScalarProperty>,
    child_bnds: Option<IScalarProperty>,
}

impl ILight {
    /// View `object` through this schema; `TypeMismatch` for any other.
    pub fn new(object: &IObject) -> Result<Self> {
        let base = SchemaReader::open(object, SchemaView::Light)?;
        let camera = match base.compound(CAMERA)? {
            Some(compound) => Some(compound.scalar(CORE)?),
            None => None,
        };
        Ok(Self {
            camera,
            child_bnds: base.opt_scalar(CHILD_BNDS)?,
            base,
        })
    }

    /// The underlying object.
    pub fn object(&self) -> &IObject {
        &self.base.object
    }

    /// Whether a camera compound was written.
    pub fn has_camera(&self) -> bool {
        self.camera.is_some()
    }

    /// Samples of the embedded camera, 0 without one.
    pub fn num_samples(&self) -> usize {
        self.camera.as_ref().map_or(0, |c| c.num_samples())
    }

    /// Time sampling of the embedded camera.
    pub fn time_sampling(&self) -> Option<&TimeSampling> {
        self.camera.as_ref().map(|c| c.time_sampling())
    }

    /// Camera sample `index`, `None` without a camera.
    pub fn camera_sample(&self, index: usize) -> Result<Option<CameraSample>> {
        self.camera.as_ref().map(|c| read_core(c, index)).transpose()
    }

    /// Camera sample chosen by `selector`.
    pub fn camera_sample_at(&self, selector: impl Into<SampleSelector>) -> Result<Option<CameraSample>> {
        let Some(core) = &self.camera else {
            return Ok(None);
        };
        let index = selector.into().resolve(core.time_sampling(), core.num_samples());
        read_core(core, index).map(Some)
    }

    /// Child bounds at `index`, if written.
    pub fn child_bounds(&self, index: usize) -> Result<Option<BBox3d>> {
        self.child_bnds.as_ref().map(|p| p.value::<BBox3d>(index)).transpose()
    }

    /// The `.userProperties` compound, if written.
    pub fn user_properties(&self) -> Result<Option<ICompoundProperty>> {
        self.base.user_properties()
    }

    /// The `.arbGeomParams` compound, if written.
    pub fn arb_geom_params(&self) -> Result<Option<ICompoundProperty>> {
        self.base.arb_geom_params()
    }
}
