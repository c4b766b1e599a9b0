//! Camera schema.
//!
//! Lens and film parameters are packed into one `float64[16]` scalar,
//! `.camera/.core`, in the order of [`CameraSample::to_core`].

use super::util::{bounds_meta, SchemaReader, SchemaWriter};
use super::SchemaView;
use crate::abc::{ICompoundProperty, IObject, IScalarProperty};
use crate::core::{MetaData, SampleSelector, TimeSampling};
use crate::ogawa::{OCompoundProperty, OObject, OScalarProperty};
use crate::util::{BBox3d, DataType, Result};

pub(crate) const CORE: &str = ".core";
pub(crate) const CHILD_BNDS: &str = ".childBnds";

const CORE_TYPE: DataType = DataType::new(crate::util::PlainOldDataType::Float64, 16);

/// Camera parameters of one sample.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CameraSample {
    /// Millimeters.
    pub focal_length: f64,
    /// Centimeters, as are the film offsets.
    pub horizontal_aperture: f64,
    pub horizontal_film_offset: f64,
    pub vertical_aperture: f64,
    pub vertical_film_offset: f64,
    pub lens_squeeze_ratio: f64,
    pub overscan_left: f64,
    pub overscan_right: f64,
    pub overscan_top: f64,
    pub overscan_bottom: f64,
    pub f_stop: f64,
    pub focus_distance: f64,
    /// Fractions of a frame.
    pub shutter_open: f64,
    pub shutter_close: f64,
    pub near_clipping_plane: f64,
    pub far_clipping_plane: f64,
}

impl Default for CameraSample {
    fn default() -> Self {
        Self {
            focal_length: 35.0,
            horizontal_aperture: 3.6,
            horizontal_film_offset: 0.0,
            vertical_aperture: 2.4,
            vertical_film_offset: 0.0,
            lens_squeeze_ratio: 1.0,
            overscan_left: 0.0,
            overscan_right: 0.0,
            overscan_top: 0.0,
            overscan_bottom: 0.0,
            f_stop: 5.6,
            focus_distance: 5.0,
            shutter_open: 0.0,
            shutter_close: 0.020833333333333332,
            near_clipping_plane: 0.1,
            far_clipping_plane: 100000.0,
        }
    }
}

impl CameraSample {
    /// Sample with default lens and film back.
    pub fn new() -> Self {
        Self::default()
    }

    /// Pack into the 16 doubles of `.core`.
    pub fn to_core(&self) -> [f64; 16] {
        [
            self.focal_length,
            self.horizontal_aperture,
            self.horizontal_film_offset,
            self.vertical_aperture,
            self.vertical_film_offset,
            self.lens_squeeze_ratio,
            self.overscan_left,
            self.overscan_right,
            self.overscan_top,
            self.overscan_bottom,
            self.f_stop,
            self.focus_distance,
            self.shutter_open,
            self.shutter_close,
            self.near_clipping_plane,
            self.far_clipping_plane,
        ]
    }

    /// Unpack the 16 doubles of `.core`.
    pub fn from_core(c: [f64; 16]) -> Self {
        Self {
            focal_length: c[0],
            horizontal_aperture: c[1],
            horizontal_film_offset: c[2],
            vertical_aperture: c[3],
            vertical_film_offset: c[4],
            lens_squeeze_ratio: c[5],
            overscan_left: c[6],
            overscan_right: c[7],
            overscan_top: c[8],
            overscan_bottom: c[9],
            f_stop: c[10],
            focus_distance: c[11],
            shutter_open: c[12],
            shutter_close: c[13],
            near_clipping_plane: c[14],
            far_clipping_plane: c[15],
        }
    }

    /// Horizontal field of view in radians.
    pub fn horizontal_fov(&self) -> f64 {
        2.0 * (self.horizontal_aperture * 10.0 / (2.0 * self.focal_length)).atan()
    }

    /// Vertical field of view in radians.
    pub fn vertical_fov(&self) -> f64 {
        2.0 * (self.vertical_aperture * 10.0 / (2.0 * self.focal_length)).atan()
    }

    /// Film back aspect ratio, squeeze included.
    pub fn aspect_ratio(&self) -> f64 {
        self.horizontal_aperture * self.lens_squeeze_ratio / self.vertical_aperture
    }
}

/// The `.core` scalar of a camera compound.
pub(crate) fn add_core(compound: &OCompoundProperty, time_sampling: u32) -> Result<OScalarProperty> {
    compound.add_scalar(CORE, CORE_TYPE, time_sampling, MetaData::new())
}

pub(crate) fn read_core(core: &IScalarProperty, index: usize) -> Result<CameraSample> {
    core.value::<[f64; 16]>(index).map(CameraSample::from_core)
}

/// Camera writer.
pub struct OCamera {
    base: SchemaWriter,
    core: OScalarProperty,
    child_bnds: Option<OScalarProperty>,
}

impl OCamera {
    /// Add the object under `parent` on sampling `time_sampling`.
    pub fn new(parent: &OObject, name: &str, time_sampling: u32) -> Result<Self> {
        let base = SchemaWriter::new(parent, name, SchemaView::Camera, time_sampling)?;
        let core = add_core(&base.schema, time_sampling)?;
        Ok(Self {
            base,
            core,
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

    /// Append the next sample.
    pub fn set(&mut self, sample: &CameraSample) -> Result<()> {
        self.core.set_value(&sample.to_core())?;
        self.base.num_samples += 1;
        Ok(())
    }

    /// Bounds of everything below the camera, written alongside the
    /// camera samples.
    pub fn set_child_bounds(&mut self, bounds: &BBox3d) -> Result<()> {
        if self.child_bnds.is_none() {
            self.child_bnds = Some(self.base.scalar(CHILD_BNDS, DataType::BOX3D, bounds_meta())?);
        }
        match &self.child_bnds {
            Some(prop) => prop.set_value(bounds),
            None => Ok(()),
        }
    }

    /// Samples written so far.
    pub fn num_samples(&self) -> usize {
        self.base.num_samples
    }
}

/// Camera reader.
#[derive(Clone)]
pub struct ICamera {
    base: SchemaReader,
    core: IScalarProperty,
    child_bnds: Option<IScalarProperty>,
}

impl ICamera {
    /// View `object` through this schema; `TypeMismatch` for any other.
    pub fn new(object: &IObject) -> Result<Self> {
        let base = SchemaReader::open(object, SchemaView::Camera)?;
        Ok(Self {
            core: base.scalar(CORE)?,
            child_bnds: base.opt_scalar(CHILD_BNDS)?,
            base,
        })
    }

    /// The underlying object.
    pub fn object(&self) -> &IObject {
        &self.base.object
    }

    /// Number of samples.
    pub fn num_samples(&self) -> usize {
        self.core.num_samples()
    }

    /// True with at most one distinct sample.
    pub fn is_constant(&self) -> bool {
        self.core.is_constant()
    }

    /// Time sampling of the schema.
    pub fn time_sampling(&self) -> &TimeSampling {
        self.core.time_sampling()
    }

    /// Sample `index`; later indices read the last sample.
    pub fn sample(&self, index: usize) -> Result<CameraSample> {
        read_core(&self.core, index)
    }

    /// Sample chosen by `selector`.
    pub fn sample_at(&self, selector: impl Into<SampleSelector>) -> Result<CameraSample> {
        read_core(&self.core, selector.into().resolve(self.time_sampling(), self.num_samples()))
    }

    /// Bounds of everything below the camera at `index`, if written.
    pub fn child_bounds(&self, index: usize) -> Result<Option<BBox3d>> {
        self.child_bnds.as_ref().map(|p| p.value::<BBox3d>(index)).transpose()
    }

    /// The `.userProperties` compound, if written.
    pub fn user_properties(&self) -> Result<Option<ICompoundProperty>> {
        self.base.user_properties()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_core_layout() {
        let mut cam = CameraSample::new();
        cam.focal_length = 50.0;
        cam.far_clipping_plane = 1000.0;
        let core = cam.to_core();
        assert_eq!(core[0], 50.0);
        assert_eq!(core[15], 1000.0);
        assert_eq!(CameraSample::from_core(core), cam);
    }

    #[test]
    fn test_field_of_view() {
        let cam = CameraSample::default();
        let fov = cam.horizontal_fov().to_degrees();
        assert!((fov - 54.43).abs() < 0.01, "{fov}");
        assert!((cam.aspect_ratio() - 1.5).abs() < 1e-12);
    }
}
