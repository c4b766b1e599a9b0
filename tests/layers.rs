//! Layered reads of geometry, instancing through layers, and time
//! sampling tables merged across files.

use abcstore::geom::{IPolyMesh, IXform, OPolyMesh, OXform, PolyMeshSample, XformSample};
use abcstore::prelude::*;
use abcstore::util::DVec3;
use tempfile::NamedTempFile;

fn write(build: impl FnOnce(&OArchive) -> Result<()>) -> Result<NamedTempFile> {
    let temp = NamedTempFile::new()?;
    let archive = OArchive::create(temp.path())?;
    build(&archive)?;
    archive.close()?;
    Ok(temp)
}

fn triangle(z: f32) -> PolyMeshSample {
    PolyMeshSample::new(
        vec![Vec3::new(0.0, 0.0, z), Vec3::new(1.0, 0.0, z), Vec3::new(0.0, 1.0, z)],
        vec![3],
        vec![0, 1, 2],
    )
}

fn base_scene(a: &OArchive) -> Result<()> {
    let ts = a.add_time_sampling(TimeSampling::uniform(1.0 / 24.0, 0.0))?;
    let mut world = OXform::new(&a.top(), "world", ts)?;
    world.set(&XformSample::identity())?;
    let mut mesh = OPolyMesh::new(world.object(), "mesh", ts)?;
    mesh.set(&triangle(0.0))?;
    mesh.set(&triangle(1.0))?;
    world.object().add_child_instance(mesh.object(), "copy")?;
    a.top().add_child("scratch", MetaData::new())?;
    Ok(())
}

#[test]
fn test_override_mesh_in_later_layer() -> Result<()> {
    let base = write(base_scene)?;
    let fix = write(|a| {
        // Different sampling in the fix layer; it lands in its own slot.
        let ts = a.add_time_sampling(TimeSampling::acyclic(vec![0.0, 10.0]))?;
        let world = a.top().add_child("world", SchemaView::Xform.object_meta())?;
        let mut mesh = OPolyMesh::new(&world, "mesh", ts)?;
        mesh.set(&triangle(5.0))?;
        mesh.set(&triangle(6.0))?;
        a.top().add_child("scratch", MetaData::new().with(MetaData::PRUNE, "1"))?;
        Ok(())
    })?;

    let archive = IArchive::open_layers(&[base.path(), fix.path()])?;
    assert_eq!(archive.layer_count(), 2);
    assert_eq!(archive.num_time_samplings(), 3);
    assert_eq!(archive.top().child_names()?, vec!["world"]);

    let world = IXform::new(&archive.find_object("/world")?)?;
    assert_eq!(world.sample(0)?.translation(), DVec3::ZERO);

    let mesh = IPolyMesh::new(&archive.find_object("/world/mesh")?)?;
    assert!(mesh.time_sampling().is_acyclic());
    assert_eq!(mesh.sample(0)?.positions[0].z, 5.0);
    assert_eq!(mesh.sample_at(SampleSelector::Floor(9.0))?.positions[0].z, 5.0);
    assert_eq!(mesh.sample_at(SampleSelector::Ceil(9.0))?.positions[0].z, 6.0);

    // The instance follows its source as merged.
    let copy = archive.find_object("/world/copy")?;
    assert!(copy.is_instance_root());
    assert_eq!(copy.instance_source_path(), Some("/world/mesh"));
    let copy = IPolyMesh::new(&copy)?;
    assert_eq!(copy.sample(1)?.positions[0].z, 6.0);
    Ok(())
}

#[test]
fn test_single_layer_matches_plain_open() -> Result<()> {
    let base = write(base_scene)?;
    let plain = IArchive::open(base.path())?;
    let layered = IArchive::open_layers(&[base.path()])?;
    for path in ["/", "/world", "/world/mesh", "/world/copy", "/scratch"] {
        let a = plain.find_object(path)?;
        let b = layered.find_object(path)?;
        assert_eq!(a.child_names()?, b.child_names()?, "{path}");
        assert_eq!(a.properties_hash()?, b.properties_hash()?, "{path}");
        assert_eq!(a.children_hash()?, b.children_hash()?, "{path}");
    }
    Ok(())
}

#[test]
fn test_repeated_layer_keeps_hashes() -> Result<()> {
    let base = write(base_scene)?;
    let again = write(base_scene)?;
    let single = IArchive::open(base.path())?;
    let stacked = IArchive::open_layers(&[base.path(), again.path()])?;

    let top_a = single.top();
    let top_b = stacked.top();
    assert!(top_a.children_hash()?.is_some());
    assert_eq!(top_a.children_hash()?, top_b.children_hash()?);
    assert_eq!(stacked.num_time_samplings(), single.num_time_samplings());
    Ok(())
}

#[test]
fn test_edit_changes_ancestor_hashes() -> Result<()> {
    let base = write(base_scene)?;
    let fix = write(|a| {
        let world = a.top().add_child("world", SchemaView::Xform.object_meta())?;
        let mut mesh = OPolyMesh::new(&world, "mesh", 0)?;
        mesh.set(&triangle(9.0))?;
        Ok(())
    })?;
    let single = IArchive::open(base.path())?;
    let edited = IArchive::open_layers(&[base.path(), fix.path()])?;

    let mesh_a = single.find_object("/world/mesh")?;
    let mesh_b = edited.find_object("/world/mesh")?;
    assert_ne!(mesh_a.properties_hash()?, mesh_b.properties_hash()?);
    assert_ne!(single.top().children_hash()?, edited.top().children_hash()?);
    assert_eq!(
        single.find_object("/scratch")?.properties_hash()?,
        edited.find_object("/scratch")?.properties_hash()?
    );
    Ok(())
}

#[test]
fn test_missing_layer_fails() -> Result<()> {
    let base = write(base_scene)?;
    let missing = base.path().with_extension("missing.abc");
    assert!(matches!(
        IArchive::open_layers(&[base.path(), missing.as_path()]),
        Err(Error::FileNotFound(_))
    ));
    assert!(IArchive::open_layers::<&std::path::Path>(&[]).is_err());
    Ok(())
}
