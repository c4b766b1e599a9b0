//! FaceSet schema: a named group of faces of the parent mesh.
//!
//! A face set is a child object of the mesh holding `.faces`, the face
//! indices, and `.facesExclusive`, whether a face may belong to other
//! sets too.

use std::collections::BTreeSet;

use super::polymesh::SELF_BNDS;
use super::util::{bounds_meta, SchemaReader, SchemaWriter};
use super::SchemaView;
use crate::abc::{IArrayProperty, IObject, IScalarProperty};
use crate::core::{MetaData, SampleSelector, TimeSampling};
use crate::ogawa::{OArrayProperty, OObject, OScalarProperty};
use crate::util::{BBox3d, DataType, Result};

const FACES: &str = ".faces";
const FACES_EXCLUSIVE: &str = ".facesExclusive";

/// Whether faces may belong to more than one set.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum FaceSetExclusivity {
    #[default]
    NonExclusive,
    Exclusive,
}

impl FaceSetExclusivity {
    /// Decode the stored flag; any nonzero value is exclusive.
    pub fn from_u32(v: u32) -> Self {
        if v == 0 {
            Self::NonExclusive
        } else {
            Self::Exclusive
        }
    }

    /// Flag as stored.
    pub fn to_u32(self) -> u32 {
        match self {
            Self::NonExclusive => 0,
            Self::Exclusive => 1,
        }
    }
}

/// Faces of one sample.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FaceSetSample {
    pub faces: Vec<i32>,
    pub self_bounds: Option<BBox3d>,
}

impl FaceSetSample {
    /// Sample over the given face indices.
    pub fn new(faces: Vec<i32>) -> Self {
        Self {
            faces,
            self_bounds: None,
        }
    }

    /// Number of faces in the set.
    pub fn num_faces(&self) -> usize {
        self.faces.len()
    }

    /// Whether `face` is in the set.
    pub fn contains(&self, face: i32) -> bool {
        self.faces.contains(&face)
    }

    /// Faces sorted and deduplicated.
    pub fn face_set(&self) -> BTreeSet<i32> {
        self.faces.iter().copied().collect()
    }
}

/// FaceSet writer.
pub struct OFaceSet {
    base: SchemaWriter,
    faces: OArrayProperty,
    exclusive: OScalarProperty,
    self_bnds: Option<OScalarProperty>,
    exclusivity: FaceSetExclusivity,
}

impl OFaceSet {
    /// Create below `mesh`, normally a PolyMesh object.
    pub fn new(mesh: &OObject, name: &str, exclusivity: FaceSetExclusivity, time_sampling: u32) -> Result<Self> {
        let base = SchemaWriter::new(mesh, name, SchemaView::FaceSet, time_sampling)?;
        let faces = base.array(FACES, DataType::INT32, MetaData::new())?;
        let exclusive = base.schema.add_scalar(FACES_EXCLUSIVE, DataType::UINT32, 0, MetaData::new())?;
        Ok(Self {
            base,
            faces,
            exclusive,
            self_bnds: None,
            exclusivity,
        })
    }

    /// The underlying object.
    pub fn object(&self) -> &OObject {
        &self.base.object
    }

    /// Exclusivity written with the set.
    pub fn exclusivity(&self) -> FaceSetExclusivity {
        self.exclusivity
    }

    /// Append the next sample.
    pub fn set(&mut self, sample: &FaceSetSample) -> Result<()> {
        if self.exclusive.num_samples() == 0 {
            self.exclusive.set_value(&self.exclusivity.to_u32())?;
        }
        self.faces.set_values(&sample.faces)?;
        if let Some(bounds) = &sample.self_bounds {
            if self.self_bnds.is_none() {
                self.self_bnds = Some(self.base.scalar(SELF_BNDS, DataType::BOX3D, bounds_meta())?);
            }
            if let Some(prop) = &self.self_bnds {
                prop.set_value(bounds)?;
            }
        }
        self.base.num_samples += 1;
        Ok(())
    }

    /// Samples written so far.
    pub fn num_samples(&self) -> usize {
        self.base.num_samples
    }
}

/// FaceSet reader.
#[derive(Clone)]
pub struct IFaceSet {
    base: SchemaReader,
    faces: IArrayProperty,
    exclusive: Option<IScalarProperty>,
    self_bnds: Option<IScalarProperty>,
}

impl IFaceSet {
    /// View `object` through this schema; `TypeMismatch` for any other.
    pub fn new(object: &IObject) -> Result<Self> {
        let base = SchemaReader::open(object, SchemaView::FaceSet)?;
        Ok(Self {
            faces: base.array(FACES)?,
            exclusive: base.opt_scalar(FACES_EXCLUSIVE)?,
            self_bnds: base.opt_scalar(SELF_BNDS)?,
            base,
        })
    }

    /// The underlying object.
    pub fn object(&self) -> &IObject {
        &self.base.object
    }

    /// Name of the face set object.
    pub fn name(&self) -> &str {
        self.base.object.name()
    }

    /// Number of samples.
    pub fn num_samples(&self) -> usize {
        self.faces.num_samples()
    }

    /// True with at most one distinct sample.
    pub fn is_constant(&self) -> bool {
        self.faces.is_constant()
    }

    /// Time sampling of the schema.
    pub fn time_sampling(&self) -> &TimeSampling {
        self.faces.time_sampling()
    }

    /// Exclusivity as stored; non-exclusive when absent.
    pub fn exclusivity(&self) -> Result<FaceSetExclusivity> {
        match &self.exclusive {
            Some(p) if p.num_samples() > 0 => Ok(FaceSetExclusivity::from_u32(p.value::<u32>(0)?)),
            _ => Ok(FaceSetExclusivity::NonExclusive),
        }
    }

    /// Sample `index`; later indices read the last sample.
    pub fn sample(&self, index: usize) -> Result<FaceSetSample> {
        Ok(FaceSetSample {
            faces: self.faces.values(index)?,
            self_bounds: match &self.self_bnds {
                Some(p) if p.num_samples() > 0 => Some(p.value::<BBox3d>(index)?),
                _ => None,
            },
        })
    }

    /// Sample chosen by `selector`.
    pub fn sample_at(&self, selector: impl Into<SampleSelector>) -> Result<FaceSetSample> {
        let index = selector.into().resolve(self.time_sampling(), self.num_samples());
        self.sample(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exclusivity_codes() {
        assert_eq!(FaceSetExclusivity::from_u32(0), FaceSetExclusivity::NonExclusive);
        assert_eq!(FaceSetExclusivity::from_u32(7), FaceSetExclusivity::Exclusive);
        assert_eq!(FaceSetExclusivity::Exclusive.to_u32(), 1);
    }

    #[test]
    fn test_sample_membership() {
        let s = FaceSetSample::new(vec![4, 1, 4, 2]);
        assert!(s.contains(1));
        assert!(!s.contains(3));
        assert_eq!(s.face_set().into_iter().collect::<Vec<_>>(), vec![1, 2, 4]);
    }
}
