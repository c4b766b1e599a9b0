//! PolyMesh (polygon mesh) schema.
//!
//! Properties under `.geom`:
//! - `P` - vertex positions
//! - `.faceIndices` / `.faceCounts` - topology
//! - `.selfBnds` - bounds, computed from `P` when not given
//! - `.velocities` - optional
//! - `uv`, `N` - optional geometry parameters
//!
//! Face sets are child objects; see [`IPolyMesh::face_sets`].

use glam::{Vec2, Vec3};

use super::faceset::{FaceSetExclusivity, IFaceSet, OFaceSet};
use super::geom_param::{GeomParamSample, IGeomParam, OGeomParam};
use super::util::{bounds_meta, read_optional, SchemaReader, SchemaWriter};
use super::SchemaView;
use crate::abc::{IArrayProperty, ICompoundProperty, IObject, IScalarProperty};
use crate::core::{MetaData, SampleSelector, TimeSampling, TopologyVariance};
use crate::ogawa::{OArrayProperty, OCompoundProperty, OObject, OScalarProperty};
use crate::util::{BBox3d, DataType, Error, Result};

pub(crate) const P: &str = "P";
const FACE_INDICES: &str = ".faceIndices";
const FACE_COUNTS: &str = ".faceCounts";
pub(crate) const SELF_BNDS: &str = ".selfBnds";
pub(crate) const VELOCITIES: &str = ".velocities";
const UV: &str = "uv";
const N: &str = "N";

/// Polygon mesh sample.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PolyMeshSample {
    pub positions: Vec<Vec3>,
    /// Vertex count of each face.
    pub face_counts: Vec<i32>,
    /// Indices into `positions`, face after face.
    pub face_indices: Vec<i32>,
    pub velocities: Option<Vec<Vec3>>,
    pub uvs: Option<GeomParamSample<Vec2>>,
    pub normals: Option<GeomParamSample<Vec3>>,
    /// Stored bounds; computed from positions on write when `None`.
    pub self_bounds: Option<BBox3d>,
}

impl PolyMeshSample {
    /// Mesh from positions, face counts and face indices.
    pub fn new(positions: Vec<Vec3>, face_counts: Vec<i32>, face_indices: Vec<i32>) -> Self {
        Self {
            positions,
            face_counts,
            face_indices,
            ..Default::default()
        }
    }

    /// Attach UVs.
    pub fn with_uvs(mut self, uvs: GeomParamSample<Vec2>) -> Self {
        self.uvs = Some(uvs);
        self
    }

    /// Attach normals.
    pub fn with_normals(mut self, normals: GeomParamSample<Vec3>) -> Self {
        self.normals = Some(normals);
        self
    }

    /// Attach per-vertex velocities.
    pub fn with_velocities(mut self, velocities: Vec<Vec3>) -> Self {
        self.velocities = Some(velocities);
        self
    }

    /// Number of positions.
    pub fn num_vertices(&self) -> usize {
        self.positions.len()
    }

    /// Number of faces.
    pub fn num_faces(&self) -> usize {
        self.face_counts.len()
    }

    /// Positions and topology present, every index in range.
    pub fn is_valid(&self) -> bool {
        let total: i64 = self.face_counts.iter().map(|&c| i64::from(c)).sum();
        !self.positions.is_empty()
            && !self.face_counts.is_empty()
            && total == self.face_indices.len() as i64
            && self
                .face_indices
                .iter()
                .all(|&i| i >= 0 && (i as usize) < self.positions.len())
    }

    /// Bounds of the positions.
    pub fn compute_bounds(&self) -> BBox3d {
        BBox3d::from_points(&self.positions)
    }

    /// One normal per face from its first three vertices. Degenerate or
    /// out-of-range faces get +Y.
    pub fn compute_face_normals(&self) -> Vec<Vec3> {
        let mut normals = Vec::with_capacity(self.face_counts.len());
        let mut start = 0usize;
        for &count in &self.face_counts {
            let count = count.max(0) as usize;
            let corner = |k: usize| {
                self.face_indices
                    .get(start + k)
                    .and_then(|&i| usize::try_from(i).ok())
                    .and_then(|i| self.positions.get(i))
                    .copied()
            };
            let normal = match (count >= 3, corner(0), corner(1), corner(2)) {
                (true, Some(v0), Some(v1), Some(v2)) => (v1 - v0).cross(v2 - v0).try_normalize(),
                _ => None,
            };
            normals.push(normal.unwrap_or(Vec3::Y));
            start += count;
        }
        normals
    }
}

/// PolyMesh writer.
pub struct OPolyMesh {
    base: SchemaWriter,
    self_bnds: OScalarProperty,
    positions: OArrayProperty,
    face_indices: OArrayProperty,
    face_counts: OArrayProperty,
    velocities: Option<OArrayProperty>,
    uvs: Option<OGeomParam<Vec2>>,
    normals: Option<OGeomParam<Vec3>>,
}

impl OPolyMesh {
    /// Add the object under `parent` on sampling `time_sampling`.
    pub fn new(parent: &OObject, name: &str, time_sampling: u32) -> Result<Self> {
        let base = SchemaWriter::new(parent, name, SchemaView::PolyMesh, time_sampling)?;
        let self_bnds = base.scalar(SELF_BNDS, DataType::BOX3D, bounds_meta())?;
        let positions = base.array(P, DataType::VEC3F, MetaData::new().with(MetaData::INTERPRETATION, "point"))?;
        let face_indices = base.array(FACE_INDICES, DataType::INT32, MetaData::new())?;
        let face_counts = base.array(FACE_COUNTS, DataType::INT32, MetaData::new())?;
        Ok(Self {
            base,
            self_bnds,
            positions,
            face_indices,
            face_counts,
            velocities: None,
            uvs: None,
            normals: None,
        })
    }

    /// The underlying object.
    pub fn object(&self) -> &OObject {
        &self.base.object
    }

    /// Arbitrary geometry parameters such as colors.
    pub fn arb_geom_params(&mut self) -> Result<&OCompoundProperty> {
        self.base.arb_geom_params()
    }

    /// The `.userProperties` compound, created on first use.
    pub fn user_properties(&mut self) -> Result<&OCompoundProperty> {
        self.base.user_properties()
    }

    /// A face set child sharing the mesh's time sampling.
    pub fn add_face_set(&self, name: &str, exclusivity: FaceSetExclusivity) -> Result<OFaceSet> {
        OFaceSet::new(&self.base.object, name, exclusivity, self.base.time_sampling)
    }

    /// Append the next sample.
    pub fn set(&mut self, sample: &PolyMeshSample) -> Result<()> {
        let bounds = sample.self_bounds.unwrap_or_else(|| sample.compute_bounds());
        self.self_bnds.set_value(&bounds)?;
        self.positions.set_values(&sample.positions)?;
        self.face_indices.set_values(&sample.face_indices)?;
        self.face_counts.set_values(&sample.face_counts)?;

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

/// PolyMesh reader.
#[derive(Clone)]
pub struct IPolyMesh {
    base: SchemaReader,
    positions: IArrayProperty,
    face_indices: IArrayProperty,
    face_counts: IArrayProperty,
    self_bnds: Option<IScalarProperty>,
    velocities: Option<IArrayProperty>,
}

impl IPolyMesh {
    /// View `object` through this schema; `TypeMismatch` for any other.
    pub fn new(object: &IObject) -> Result<Self> {
        let base = SchemaReader::open(object, SchemaView::PolyMesh)?;
        Ok(Self {
            positions: base.array(P)?,
            face_indices: base.array(FACE_INDICES)?,
            face_counts: base.array(FACE_COUNTS)?,
            self_bnds: base.opt_scalar(SELF_BNDS)?,
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
        self.topology_variance() == TopologyVariance::Static
    }

    /// Time sampling of the schema.
    pub fn time_sampling(&self) -> &TimeSampling {
        self.positions.time_sampling()
    }

    /// How much the mesh changes across samples.
    pub fn topology_variance(&self) -> TopologyVariance {
        if !self.face_indices.is_constant() || !self.face_counts.is_constant() {
            TopologyVariance::Heterogeneous
        } else if !self.positions.is_constant() {
            TopologyVariance::Homogeneous
        } else {
            TopologyVariance::Static
        }
    }

    /// Sample `index`; later indices read the last sample.
    pub fn sample(&self, index: usize) -> Result<PolyMeshSample> {
        let uvs = match self.uvs()? {
            Some(p) if p.num_samples() > 0 => Some(p.indexed_sample::<Vec2>(index)?).filter(|s| !s.values.is_empty()),
            _ => None,
        };
        let normals = match self.normals()? {
            Some(p) if p.num_samples() > 0 => Some(p.indexed_sample::<Vec3>(index)?).filter(|s| !s.values.is_empty()),
            _ => None,
        };
        Ok(PolyMeshSample {
            positions: self.positions.values(index)?,
            face_counts: self.face_counts.values(index)?,
            face_indices: self.face_indices.values(index)?,
            velocities: read_optional(&self.velocities, index)?,
            uvs,
            normals,
            self_bounds: self.self_bnds.as_ref().map(|p| p.value::<BBox3d>(index)).transpose()?,
        })
    }

    /// Sample chosen by `selector`.
    pub fn sample_at(&self, selector: impl Into<SampleSelector>) -> Result<PolyMeshSample> {
        let index = selector.into().resolve(self.time_sampling(), self.num_samples());
        self.sample(index)
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

    /// The `.userProperties` compound, if written.
    pub fn user_properties(&self) -> Result<Option<ICompoundProperty>> {
        self.base.user_properties()
    }

    /// Child objects carrying the FaceSet schema.
    pub fn face_sets(&self) -> Result<Vec<IFaceSet>> {
        self.object()
            .children()?
            .iter()
            .filter(|child| SchemaView::of(child) == Some(SchemaView::FaceSet))
            .map(IFaceSet::new)
            .collect()
    }

    /// Face set child by name.
    pub fn face_set(&self, name: &str) -> Result<IFaceSet> {
        let child = self.object().child(name)?;
        if !child.valid() {
            return Err(Error::not_found(format!("face set {name} under {}", self.object().full_name())));
        }
        IFaceSet::new(&child)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::vec3;

    fn triangle() -> PolyMeshSample {
        PolyMeshSample::new(
            vec![vec3(0.0, 0.0, 0.0), vec3(1.0, 0.0, 0.0), vec3(0.0, 1.0, 0.0)],
            vec![3],
            vec![0, 1, 2],
        )
    }

    #[test]
    fn test_sample_validity() {
        assert!(!PolyMeshSample::default().is_valid());
        assert!(triangle().is_valid());

        let mut broken = triangle();
        broken.face_indices[2] = 7;
        assert!(!broken.is_valid());
        broken.face_counts = vec![4];
        assert!(!broken.is_valid());
    }

    #[test]
    fn test_face_normals() {
        let normals = triangle().compute_face_normals();
        assert_eq!(normals, vec![Vec3::Z]);

        let mut degenerate = triangle();
        degenerate.positions[2] = vec3(2.0, 0.0, 0.0);
        assert_eq!(degenerate.compute_face_normals(), vec![Vec3::Y]);
    }

    #[test]
    fn test_bounds() {
        let mut s = triangle();
        s.positions.push(vec3(-1.0, -2.0, -3.0));
        let b = s.compute_bounds();
        assert_eq!(b.min, glam::DVec3::new(-1.0, -2.0, -3.0));
        assert_eq!(b.max, glam::DVec3::new(1.0, 1.0, 0.0));
    }
}
