//! Geometry schemas built on the generic object and property tree.
//!
//! Each schema is an object tagged by its `schema` metadata with a
//! compound of well-known child properties:
//! - [`OXform`] / [`IXform`] - transforms
//! - [`OPolyMesh`] / [`IPolyMesh`] - polygon meshes
//! - [`OPoints`] / [`IPoints`] - point clouds
//! - [`OCurves`] / [`ICurves`] - curves
//! - [`ONuPatch`] / [`INuPatch`] - NURBS patches
//! - [`OCamera`] / [`ICamera`] - cameras
//! - [`OLight`] / [`ILight`] - lights
//! - [`OFaceSet`] / [`IFaceSet`] - face groupings below a mesh
//! - [`OMaterial`] / [`IMaterial`] - shader assignments, plus
//!   [`assign_material`] / [`material_assignment`]
//!
//! [`SchemaView`] maps an object's tag to the matching view.

use crate::abc::IObject;
use crate::core::MetaData;

pub mod camera;
pub mod curves;
pub mod faceset;
pub mod geom_param;
pub mod light;
pub mod material;
pub mod nupatch;
pub mod points;
pub mod polymesh;
mod util;
pub mod xform;

pub use camera::{CameraSample, ICamera, OCamera};
pub use curves::{BasisType, CurvePeriodicity, CurveType, CurvesSample, ICurves, OCurves};
pub use faceset::{FaceSetExclusivity, FaceSetSample, IFaceSet, OFaceSet};
pub use geom_param::{GeomParamSample, IGeomParam, OGeomParam};
pub use light::{ILight, OLight};
pub use material::{assign_material, material_assignment, IMaterial, OMaterial, MATERIAL_ASSIGN};
pub use nupatch::{INuPatch, NuPatchSample, ONuPatch};
pub use points::{IPoints, OPoints, PointsSample};
pub use polymesh::{IPolyMesh, OPolyMesh, PolyMeshSample};
pub use xform::{IXform, OXform, XformSample};

/// `schemaBaseType` of every geometric schema.
pub const GEOM_BASE_TYPE: &str = "AbcGeom_GeomBase_v1";

/// Known schemas.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SchemaView {
    Xform,
    PolyMesh,
    Points,
    Curves,
    NuPatch,
    Camera,
    Light,
    FaceSet,
    Material,
}

impl SchemaView {
    pub const ALL: [SchemaView; 9] = [
        Self::Xform,
        Self::PolyMesh,
        Self::Points,
        Self::Curves,
        Self::NuPatch,
        Self::Camera,
        Self::Light,
        Self::FaceSet,
        Self::Material,
    ];

    /// The `schema` metadata value.
    pub fn tag(self) -> &'static str {
        match self {
            Self::Xform => "AbcGeom_Xform_v3",
            Self::PolyMesh => "AbcGeom_PolyMesh_v1",
            Self::Points => "AbcGeom_Points_v1",
            Self::Curves => "AbcGeom_Curve_v2",
            Self::NuPatch => "AbcGeom_NuPatch_v2",
            Self::Camera => "AbcGeom_Camera_v1",
            Self::Light => "AbcGeom_Light_v1",
            Self::FaceSet => "AbcGeom_FaceSet_v1",
            Self::Material => "AbcMaterial_Material_v1",
        }
    }

    /// Name of the compound holding the schema's properties.
    pub fn compound(self) -> &'static str {
        match self {
            Self::Xform => ".xform",
            Self::Camera => ".camera",
            Self::Material => ".material",
            Self::FaceSet => ".faceset",
            _ => ".geom",
        }
    }

    /// Whether the schema derives from the geometric base.
    pub fn is_geometric(self) -> bool {
        !matches!(self, Self::Xform | Self::Camera | Self::Light | Self::Material)
    }

    /// View for a schema tag such as `AbcGeom_PolyMesh_v1`.
    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.tag() == tag)
    }

    /// View matching an object's schema tag.
    pub fn of(object: &IObject) -> Option<Self> {
        object.schema().and_then(Self::from_tag)
    }

    /// Metadata of an object carrying this schema.
    pub fn object_meta(self) -> MetaData {
        let mut meta = self.compound_meta();
        meta.set(MetaData::SCHEMA_OBJ_TITLE, format!("{}:{}", self.tag(), self.compound()));
        meta
    }

    /// Metadata of the schema compound.
    pub fn compound_meta(self) -> MetaData {
        let mut meta = MetaData::new().with(MetaData::SCHEMA, self.tag());
        if self.is_geometric() {
            meta.set(MetaData::SCHEMA_BASE_TYPE, GEOM_BASE_TYPE);
        }
        meta
    }
}

impl std::fmt::Display for SchemaView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.tag())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tags_round_trip() {
        for view in SchemaView::ALL {
            assert_eq!(SchemaView::from_tag(view.tag()), Some(view));
        }
        assert_eq!(SchemaView::from_tag("AbcGeom_SubD_v1"), None);
    }

    #[test]
    fn test_object_meta() {
        let meta = SchemaView::PolyMesh.object_meta();
        assert_eq!(meta.schema(), Some("AbcGeom_PolyMesh_v1"));
        assert_eq!(meta.get(MetaData::SCHEMA_OBJ_TITLE), Some("AbcGeom_PolyMesh_v1:.geom"));
        assert_eq!(meta.get(MetaData::SCHEMA_BASE_TYPE), Some(GEOM_BASE_TYPE));

        let xform = SchemaView::Xform.object_meta();
        assert_eq!(xform.get(MetaData::SCHEMA_OBJ_TITLE), Some("AbcGeom_Xform_v3:.xform"));
        assert!(!xform.contains(MetaData::SCHEMA_BASE_TYPE));
    }
}
