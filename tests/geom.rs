//! Schema views written through the geometry writers and read back.

use abcstore::core::TopologyVariance;
use abcstore::geom::*;
use abcstore::prelude::*;
use abcstore::util::{DMat4, DVec3};
use tempfile::NamedTempFile;

/// Write, close and reopen; the temp file lives as long as the reader.
fn write(build: impl FnOnce(&OArchive) -> Result<()>) -> Result<(NamedTempFile, IArchive)> {
    let temp = NamedTempFile::new()?;
    let archive = OArchive::create(temp.path())?;
    build(&archive)?;
    archive.close()?;
    let read = IArchive::open(temp.path())?;
    Ok((temp, read))
}

fn quad() -> PolyMeshSample {
    PolyMeshSample::new(
        vec![
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(1.0, 1.0, 0.0),
            Vec3::new(0.0, 1.0, 0.0),
            Vec3::new(2.0, 0.0, 0.0),
            Vec3::new(2.0, 1.0, 0.0),
        ],
        vec![4, 4],
        vec![0, 1, 2, 3, 1, 4, 5, 2],
    )
}

#[test]
fn test_xform_hierarchy() -> Result<()> {
    let (_file, archive) = write(|a| {
        let ts = a.add_time_sampling(TimeSampling::uniform(1.0, 0.0))?;
        let mut root = OXform::new(&a.top(), "root", ts)?;
        root.set(&XformSample::from_translation(DVec3::new(10.0, 0.0, 0.0)))?;
        root.set(&XformSample::from_translation(DVec3::new(20.0, 0.0, 0.0)))?;

        let mut child = OXform::new(root.object(), "child", 0)?;
        child.set(&XformSample::from_translation(DVec3::new(0.0, 1.0, 0.0)))?;

        let mut loose = OXform::new(root.object(), "loose", 0)?;
        loose.set(&XformSample::from_translation(DVec3::new(0.0, 0.0, 5.0)).with_inherits(false))?;
        Ok(())
    })?;

    let root = IXform::new(&archive.find_object("/root")?)?;
    assert_eq!(root.num_samples(), 2);
    assert!(!root.is_constant());
    assert_eq!(root.sample(1)?.translation(), DVec3::new(20.0, 0.0, 0.0));

    let child = IXform::new(&archive.find_object("/root/child")?)?;
    assert!(child.is_constant());
    assert_eq!(
        child.world_matrix_at(1.0)?,
        DMat4::from_translation(DVec3::new(20.0, 1.0, 0.0))
    );
    assert_eq!(
        child.world_matrix_at(0.0)?,
        DMat4::from_translation(DVec3::new(10.0, 1.0, 0.0))
    );

    let loose = IXform::new(&archive.find_object("/root/loose")?)?;
    assert!(!loose.sample(0)?.inherits);
    assert_eq!(loose.world_matrix_at(1.0)?, DMat4::from_translation(DVec3::new(0.0, 0.0, 5.0)));
    Ok(())
}

#[test]
fn test_polymesh_params_and_face_sets() -> Result<()> {
    let uv_values = vec![Vec2::new(0.0, 0.0), Vec2::new(1.0, 0.0), Vec2::new(1.0, 1.0), Vec2::new(0.0, 1.0)];
    let uv_indices = vec![0, 1, 2, 3, 0, 1, 2, 3];
    let (_file, archive) = write(|a| {
        let ts = a.add_time_sampling(TimeSampling::uniform(1.0 / 24.0, 0.0))?;
        let mut mesh = OPolyMesh::new(&a.top(), "mesh", ts)?;
        mesh.user_properties()?
            .add_scalar("artist", DataType::STRING, 0, MetaData::new())?
            .set_string("nobody")?;
        mesh.arb_geom_params()?
            .add_array("Cd", DataType::VEC3F, ts, MetaData::new())?
            .set_values(&[Vec3::ONE, Vec3::ZERO])?;

        mesh.set(&quad())?;

        let mut moved = quad().with_uvs(GeomParamSample::indexed(
            uv_values.clone(),
            uv_indices.clone(),
            GeometryScope::FaceVarying,
        ));
        moved.positions[0].z = 1.0;
        moved.normals = Some(GeomParamSample::new(vec![Vec3::Z; 6], GeometryScope::Vertex));
        mesh.set(&moved)?;

        let mut left = mesh.add_face_set("left", FaceSetExclusivity::Exclusive)?;
        left.set(&FaceSetSample::new(vec![0]))?;
        let mut both = mesh.add_face_set("both", FaceSetExclusivity::NonExclusive)?;
        both.set(&FaceSetSample::new(vec![0, 1]))?;
        Ok(())
    })?;

    let object = archive.find_object("/mesh")?;
    assert_eq!(SchemaView::of(&object), Some(SchemaView::PolyMesh));
    let mesh = IPolyMesh::new(&object)?;
    assert_eq!(mesh.num_samples(), 2);
    assert_eq!(mesh.topology_variance(), TopologyVariance::Homogeneous);

    // UVs first appear at sample 1; sample 0 reads as having none.
    let first = mesh.sample(0)?;
    assert_eq!(first.positions, quad().positions);
    assert!(first.uvs.is_none());
    assert!(first.normals.is_none());
    assert_eq!(first.self_bounds, Some(quad().compute_bounds()));

    let second = mesh.sample_at(SampleSelector::Near(1.0 / 24.0))?;
    assert_eq!(second.positions[0].z, 1.0);
    let uvs = second.uvs.as_ref().ok_or_else(|| Error::not_found("uvs"))?;
    assert_eq!(uvs.values, uv_values);
    assert_eq!(uvs.indices.as_deref(), Some(uv_indices.as_slice()));
    assert_eq!(uvs.scope, GeometryScope::FaceVarying);
    assert_eq!(second.normals.as_ref().map(|n| n.values.len()), Some(6));

    // Expanding an indexed parameter gives what a plain write would hold.
    let uv_param = mesh.uvs()?.ok_or_else(|| Error::not_found("uv param"))?;
    assert!(uv_param.is_indexed());
    assert!(uv_param.is_uv());
    let expanded: Vec<Vec2> = uv_indices.iter().map(|&i| uv_values[i as usize]).collect();
    assert_eq!(uv_param.expanded_sample::<Vec2>(1)?, expanded);
    assert_eq!(uv_param.expanded_raw(1)?, Sample::from_elements(&expanded)?);

    let normals = mesh.normals()?.ok_or_else(|| Error::not_found("normals"))?;
    assert!(!normals.is_indexed());
    assert_eq!(normals.scope(), GeometryScope::Vertex);

    let user = mesh.user_properties()?.ok_or_else(|| Error::not_found("user properties"))?;
    assert_eq!(user.scalar("artist")?.string(0)?, "nobody");
    let arb = mesh.arb_geom_params()?.ok_or_else(|| Error::not_found("arb params"))?;
    assert_eq!(arb.array("Cd")?.values::<Vec3>(0)?, vec![Vec3::ONE, Vec3::ZERO]);

    let sets = mesh.face_sets()?;
    assert_eq!(sets.iter().map(|s| s.name()).collect::<Vec<_>>(), vec!["left", "both"]);
    let left = mesh.face_set("left")?;
    assert_eq!(left.exclusivity()?, FaceSetExclusivity::Exclusive);
    assert_eq!(left.sample(0)?.faces, vec![0]);
    assert_eq!(mesh.face_set("both")?.exclusivity()?, FaceSetExclusivity::NonExclusive);
    assert!(matches!(mesh.face_set("right"), Err(Error::NotFound(_))));
    Ok(())
}

#[test]
fn test_wrong_schema_is_refused() -> Result<()> {
    let (_file, archive) = write(|a| {
        let mut xform = OXform::new(&a.top(), "x", 0)?;
        xform.set(&XformSample::identity())?;
        Ok(())
    })?;
    let object = archive.find_object("/x")?;
    assert!(IPolyMesh::new(&object).is_err());
    assert!(IXform::new(&object).is_ok());
    Ok(())
}

#[test]
fn test_points() -> Result<()> {
    let (_file, archive) = write(|a| {
        let mut points = OPoints::new(&a.top(), "pts", 0)?;
        points.set(&PointsSample::sequential(vec![Vec3::ZERO, Vec3::X]))?;
        points.set(
            &PointsSample::new(vec![Vec3::ZERO, Vec3::X, Vec3::Y], vec![0, 1, 7])
                .with_widths(vec![0.5, 0.5, 2.0])
                .with_velocities(vec![Vec3::Z; 3]),
        )?;
        Ok(())
    })?;

    let points = IPoints::new(&archive.find_object("/pts")?)?;
    assert_eq!(points.num_samples(), 2);
    assert!(!points.is_constant());

    let first = points.sample(0)?;
    assert_eq!(first.ids, vec![0, 1]);
    assert!(first.widths.is_none());
    assert!(first.velocities.is_none());

    let second = points.sample(1)?;
    assert_eq!(second.num_points(), 3);
    assert_eq!(second.ids, vec![0, 1, 7]);
    assert_eq!(second.widths, Some(vec![0.5, 0.5, 2.0]));
    assert_eq!(second.velocities, Some(vec![Vec3::Z; 3]));
    let bounds = second.self_bounds.ok_or_else(|| Error::not_found("bounds"))?;
    assert_eq!(bounds.max, DVec3::new(2.0, 2.0, 1.0));
    Ok(())
}

#[test]
fn test_curves() -> Result<()> {
    let positions: Vec<Vec3> = (0..7).map(|i| Vec3::new(i as f32, 0.0, 0.0)).collect();
    let (_file, archive) = write(|a| {
        let mut curves = OCurves::new(&a.top(), "hair", 0)?;
        curves.set(
            &CurvesSample::new(positions.clone(), vec![4, 3], CurveType::Cubic)
                .with_basis(BasisType::CatmullRom)
                .with_periodicity(CurvePeriodicity::Periodic)
                .with_widths(GeomParamSample::new(vec![0.1; 7], GeometryScope::Vertex)),
        )?;
        Ok(())
    })?;

    let curves = ICurves::new(&archive.find_object("/hair")?)?;
    let s = curves.sample(0)?;
    assert_eq!(s.positions, positions);
    assert_eq!(s.num_curves(), 2);
    assert_eq!(s.curve_type, CurveType::Cubic);
    assert_eq!(s.basis, BasisType::CatmullRom);
    assert_eq!(s.periodicity, CurvePeriodicity::Periodic);
    assert_eq!(s.widths.map(|w| w.values), Some(vec![0.1; 7]));
    assert!(s.orders.is_none());
    assert!(curves.widths().is_some());
    Ok(())
}

#[test]
fn test_nupatch() -> Result<()> {
    let patch = NuPatchSample::new(
        vec![Vec3::ZERO, Vec3::X, Vec3::Y, Vec3::new(1.0, 1.0, 0.0)],
        (2, 2),
        (2, 2),
        vec![0.0, 0.0, 1.0, 1.0],
        vec![0.0, 0.0, 1.0, 1.0],
    )
    .with_weights(vec![1.0, 0.5, 0.5, 1.0]);
    let (_file, archive) = write(|a| {
        let mut out = ONuPatch::new(&a.top(), "patch", 0)?;
        out.set(&patch)?;
        Ok(())
    })?;

    let read = INuPatch::new(&archive.find_object("/patch")?)?.sample(0)?;
    assert!(read.is_valid());
    assert_eq!(read.positions, patch.positions);
    assert_eq!((read.num_u, read.num_v, read.u_order, read.v_order), (2, 2, 2, 2));
    assert_eq!(read.u_knots, patch.u_knots);
    assert_eq!(read.weights, patch.weights);
    assert!(read.uvs.is_none());
    Ok(())
}

#[test]
fn test_camera_and_light() -> Result<()> {
    let lens = CameraSample {
        focal_length: 50.0,
        f_stop: 2.8,
        ..CameraSample::default()
    };
    let (_file, archive) = write(|a| {
        let ts = a.add_time_sampling(TimeSampling::uniform(0.5, 0.0))?;
        let mut camera = OCamera::new(&a.top(), "cam", ts)?;
        camera.set(&CameraSample::default())?;
        camera.set(&lens)?;

        let mut light = OLight::new(&a.top(), "key", ts)?;
        light.set_camera(&lens)?;
        light.user_properties()?
            .add_scalar("intensity", DataType::FLOAT32, 0, MetaData::new())?
            .set_value(&3.5f32)?;

        OLight::new(&a.top(), "bare", 0)?;
        Ok(())
    })?;

    let camera = ICamera::new(&archive.find_object("/cam")?)?;
    assert_eq!(camera.num_samples(), 2);
    assert_eq!(camera.sample(0)?, CameraSample::default());
    assert_eq!(camera.sample_at(SampleSelector::Floor(0.7))?, lens);
    assert!(camera.child_bounds(0)?.is_none());

    let light = ILight::new(&archive.find_object("/key")?)?;
    assert!(light.has_camera());
    assert_eq!(light.camera_sample(0)?, Some(lens));
    let user = light.user_properties()?.ok_or_else(|| Error::not_found("user properties"))?;
    assert_eq!(user.scalar("intensity")?.value::<f32>(0)?, 3.5);

    let bare = ILight::new(&archive.find_object("/bare")?)?;
    assert!(!bare.has_camera());
    assert_eq!(bare.num_samples(), 0);
    assert_eq!(bare.camera_sample_at(1.0)?, None);
    Ok(())
}

#[test]
fn test_material_assignment() -> Result<()> {
    let (_file, archive) = write(|a| {
        let looks = a.top().add_child("looks", MetaData::new())?;
        let mut material = OMaterial::new(&looks, "metal")?;
        material.set_shader("arnold", "surface", "standard_surface");
        material.set_shader("arnold", "displacement", "noise");
        material.set_shader("prman", "bxdf", "PxrSurface");
        material.set_param("arnold", "surface", "base_color", &Sample::from_elements(&[[0.8f32, 0.1, 0.1]])?)?;
        material.set_param("arnold", "surface", "ramp", &Sample::from_elements(&[0.0f32, 0.5, 1.0])?)?;
        material.finish()?;

        let mesh = OPolyMesh::new(&a.top(), "mesh", 0)?;
        assign_material(mesh.object(), "/looks/metal")?;
        assert!(assign_material(mesh.object(), "relative").is_err());
        Ok(())
    })?;

    let material = IMaterial::new(&archive.find_object("/looks/metal")?)?;
    assert_eq!(material.targets(), vec!["arnold", "prman"]);
    assert_eq!(material.shader_types("arnold"), vec!["displacement", "surface"]);
    assert_eq!(material.shader("arnold", "surface"), Some("standard_surface"));
    assert_eq!(material.shader("prman", "surface"), None);

    let params = material.params("arnold", "surface")?;
    assert_eq!(params.len(), 2);
    assert_eq!(params["base_color"].elements::<[f32; 3]>()?, vec![[0.8, 0.1, 0.1]]);
    assert_eq!(params["ramp"].elements::<f32>()?, vec![0.0, 0.5, 1.0]);
    assert!(material.params("prman", "bxdf")?.is_empty());

    let mesh = archive.find_object("/mesh")?;
    assert_eq!(material_assignment(&mesh)?.as_deref(), Some("/looks/metal"));
    assert_eq!(material_assignment(&archive.find_object("/looks")?)?, None);
    Ok(())
}
