use super::*;
use crate::core::{MetaData, SampleSelector, TimeSampling};
use crate::ogawa::{Encoding, OArchive, WriteOptions};
use crate::util::{DataType, Error, Result};
use tempfile::NamedTempFile;

fn write(build: impl FnOnce(&OArchive) -> Result<()>) -> Result<NamedTempFile> {
    write_with(WriteOptions::new(), build)
}

fn write_with(options: WriteOptions, build: impl FnOnce(&OArchive) -> Result<()>) -> Result<NamedTempFile> {
    let temp = NamedTempFile::new()?;
    let archive = OArchive::create_with(temp.path(), options)?;
    build(&archive)?;
    archive.close()?;
    Ok(temp)
}

#[test]
fn test_retained_value_policy() -> Result<()> {
    let file = write(|a| {
        let props = a.top().properties();
        let p = props.add_array("p", DataType::FLOAT32, 0, MetaData::new())?;
        p.set_values(&[1.0f32, 2.0])?;
        p.set_values(&[1.0f32, 2.0])?;
        p.set_values(&[3.0f32])?;
        p.set_values(&[3.0f32])?;
        props.add_array("empty", DataType::INT32, 0, MetaData::new())?;
        Ok(())
    })?;

    let archive = IArchive::open(file.path())?;
    let props = archive.top().properties()?;
    let p = props.array("p")?;
    assert_eq!(p.num_samples(), 4);
    assert!(!p.is_constant());
    assert!(!p.is_homogeneous());
    assert_eq!(p.values::<f32>(0)?, vec![1.0, 2.0]);
    assert_eq!(p.values::<f32>(1)?, vec![1.0, 2.0]);
    assert_eq!(p.values::<f32>(3)?, vec![3.0]);
    // Past the end the last written value holds.
    assert_eq!(p.values::<f32>(100)?, vec![3.0]);

    let empty = props.array("empty")?;
    assert_eq!(empty.num_samples(), 0);
    assert!(matches!(empty.sample(0), Err(Error::OutOfRange { .. })));
    assert_eq!(empty.samples().count(), 0);
    Ok(())
}

#[test]
fn test_constant_property_stores_once() -> Result<()> {
    let file = write(|a| {
        let p = a.top().properties().add_scalar("c", DataType::VEC3F, 0, MetaData::new())?;
        for _ in 0..10 {
            p.set_value(&[1.0f32, 2.0, 3.0])?;
        }
        Ok(())
    })?;

    let archive = IArchive::open(file.path())?;
    let c = archive.top().properties()?.scalar("c")?;
    assert_eq!(c.num_samples(), 10);
    assert!(c.is_constant());
    assert_eq!(c.value::<[f32; 3]>(7)?, [1.0, 2.0, 3.0]);
    assert_eq!(c.sample_key(0)?, c.sample_key(9)?);
    Ok(())
}

#[test]
fn test_samples_iterator_restarts() -> Result<()> {
    let file = write(|a| {
        let p = a.top().properties().add_scalar("i", DataType::INT64, 0, MetaData::new())?;
        for v in [5i64, 6, 6, 7] {
            p.set_value(&v)?;
        }
        Ok(())
    })?;

    let archive = IArchive::open(file.path())?;
    let p = archive.top().properties()?.scalar("i")?;
    let read = |p: &IScalarProperty| -> Result<Vec<i64>> {
        p.samples().map(|s| s?.elements::<i64>().map(|v| v[0])).collect()
    };
    assert_eq!(p.samples().len(), 4);
    assert_eq!(read(&p)?, vec![5, 6, 6, 7]);
    assert_eq!(read(&p)?, vec![5, 6, 6, 7]);
    Ok(())
}

#[test]
fn test_time_selectors() -> Result<()> {
    let file = write(|a| {
        let ts = a.add_time_sampling(TimeSampling::uniform(0.5, 1.0))?;
        let p = a.top().properties().add_scalar("v", DataType::FLOAT64, ts, MetaData::new())?;
        for v in [10.0f64, 20.0, 30.0] {
            p.set_value(&v)?;
        }
        Ok(())
    })?;

    let archive = IArchive::open(file.path())?;
    let v = archive.top().properties()?.scalar("v")?;
    assert_eq!(v.value_at::<f64>(SampleSelector::Floor(1.7))?, 20.0);
    assert_eq!(v.value_at::<f64>(SampleSelector::Ceil(1.1))?, 20.0);
    assert_eq!(v.value_at::<f64>(SampleSelector::Near(1.8))?, 30.0);
    assert_eq!(v.value_at::<f64>(SampleSelector::Floor(-5.0))?, 10.0);
    assert_eq!(v.value_at::<f64>(SampleSelector::Index(2))?, 30.0);
    Ok(())
}

#[test]
fn test_lookup_errors() -> Result<()> {
    let file = write(|a| {
        let top = a.top();
        top.add_child("a", MetaData::new())?;
        let props = top.properties();
        props.add_scalar("s", DataType::INT32, 0, MetaData::new())?.set_value(&1i32)?;
        props.add_array("names", DataType::STRING, 0, MetaData::new())?.set_strings(&["x", "y"])?;
        Ok(())
    })?;

    let archive = IArchive::open(file.path())?;
    let top = archive.top();
    assert!(!top.child("missing")?.valid());
    assert!(matches!(top.child_at(1), Err(Error::OutOfRange { index: 1, count: 1, .. })));
    assert!(matches!(top.child("missing")?.properties(), Err(Error::NotFound(_))));
    assert!(!top.parent().valid());
    assert!(!archive.find_object("/a/b")?.valid());
    assert_eq!(archive.find_object("/a")?.full_name(), "/a");

    let props = top.properties()?;
    assert!(matches!(props.property("nope"), Err(Error::NotFound(_))));
    assert!(matches!(props.property_at(2), Err(Error::OutOfRange { .. })));
    assert!(matches!(props.array("s"), Err(Error::TypeMismatch { .. })));
    assert!(matches!(props.compound("s"), Err(Error::TypeMismatch { .. })));
    assert!(props.find("nope")?.is_none());

    let s = props.scalar("s")?;
    assert!(matches!(s.value::<f32>(0), Err(Error::TypeMismatch { .. })));
    assert!(matches!(s.string(0), Err(Error::TypeMismatch { .. })));
    assert_eq!(s.value::<i32>(0)?, 1);
    assert_eq!(props.array("names")?.strings(0)?, vec!["x", "y"]);
    Ok(())
}

#[test]
fn test_instances_alias_source() -> Result<()> {
    let file = write(|a| {
        let root = a.top().add_child("a", MetaData::new())?;
        let b = root.add_child("b", MetaData::new().with("k", "v"))?;
        b.properties().add_scalar("x", DataType::INT32, 0, MetaData::new())?.set_value(&42i32)?;
        let d = b.add_child("d", MetaData::new())?;
        d.add_child("e", MetaData::new())?;
        root.add_child_instance(&b, "c")?;
        Ok(())
    })?;

    let archive = IArchive::open(file.path())?;
    let c = archive.find_object("/a/c")?;
    assert!(c.valid());
    assert!(c.is_instance_root());
    assert!(!c.is_instance_descendant());
    assert_eq!(c.instance_source_path(), Some("/a/b"));
    assert_eq!(c.meta_data().get("k"), Some("v"));
    assert_eq!(c.properties()?.scalar("x")?.value::<i32>(0)?, 42);

    let e = archive.find_object("/a/c/d/e")?;
    assert!(e.valid());
    assert_eq!(e.full_name(), "/a/c/d/e");
    assert!(e.is_instance_descendant());
    assert!(!e.is_instance_root());
    assert_eq!(e.instance_source_path(), None);
    assert_eq!(e.content_object()?.full_name(), "/a/b/d/e");
    assert_eq!(e.parent().full_name(), "/a/c/d");

    let source = archive.find_object("/a/b")?;
    assert!(!source.is_instance_descendant());
    assert_eq!(c.properties_hash()?, source.properties_hash()?);
    assert_eq!(c.children_hash()?, source.children_hash()?);
    Ok(())
}

#[test]
fn test_prune_and_replace() -> Result<()> {
    let base = write(|a| {
        let top = a.top();
        let keep = top.add_child("keep", MetaData::new())?;
        keep.properties().add_scalar("v", DataType::INT32, 0, MetaData::new())?.set_value(&1i32)?;
        keep.add_child("old", MetaData::new())?;
        top.add_child("gone", MetaData::new())?;
        top.add_child("swap", MetaData::new())?.add_child("inner", MetaData::new())?;
        Ok(())
    })?;
    let over = write(|a| {
        let top = a.top();
        let keep = top.add_child("keep", MetaData::new())?;
        keep.properties().add_scalar("v", DataType::INT32, 0, MetaData::new())?.set_value(&2i32)?;
        keep.add_child("new", MetaData::new())?;
        top.add_child("gone", MetaData::new().with(MetaData::PRUNE, "1"))?;
        top.add_child("swap", MetaData::new().with(MetaData::REPLACE, "1"))?
            .add_child("fresh", MetaData::new())?;
        top.add_child("added", MetaData::new())?;
        Ok(())
    })?;
    let late = write(|a| {
        // A prune is terminal, and a later directive cannot undo a replace.
        a.top().add_child("gone", MetaData::new())?;
        a.top().add_child("swap", MetaData::new().with(MetaData::PRUNE, "1"))?;
        Ok(())
    })?;

    let archive = IArchive::open_layers(&[base.path(), over.path(), late.path()])?;
    let top = archive.top();
    assert_eq!(top.child_names()?, vec!["keep", "swap", "added"]);

    let keep = top.child("keep")?;
    assert_eq!(keep.child_names()?, vec!["old", "new"]);
    assert_eq!(keep.properties()?.scalar("v")?.value::<i32>(0)?, 2);

    let swap = top.child("swap")?;
    assert!(swap.valid());
    assert_eq!(swap.child_names()?, vec!["fresh"]);
    Ok(())
}

#[test]
fn test_directives_in_base_are_ignored() -> Result<()> {
    let base = write(|a| {
        a.top().add_child("p", MetaData::new().with(MetaData::PRUNE, "1"))?;
        Ok(())
    })?;
    let archive = IArchive::open(base.path())?;
    assert!(archive.find_object("/p")?.valid());
    Ok(())
}

#[test]
fn test_property_directives() -> Result<()> {
    let base = write(|a| {
        let props = a.top().properties();
        let c = props.add_compound("c", MetaData::new())?;
        c.add_scalar("x", DataType::INT32, 0, MetaData::new())?.set_value(&1i32)?;
        c.add_scalar("y", DataType::INT32, 0, MetaData::new())?.set_value(&1i32)?;
        props.add_scalar("drop", DataType::INT32, 0, MetaData::new())?.set_value(&1i32)?;
        Ok(())
    })?;
    let over = write(|a| {
        let props = a.top().properties();
        let c = props.add_compound("c", MetaData::new().with(MetaData::REPLACE, "1"))?;
        c.add_scalar("z", DataType::INT32, 0, MetaData::new())?.set_value(&3i32)?;
        props.add_scalar("drop", DataType::INT32, 0, MetaData::new().with(MetaData::PRUNE, "1"))?;
        Ok(())
    })?;

    let archive = IArchive::open_layers(&[base.path(), over.path()])?;
    let props = archive.top().properties()?;
    assert_eq!(props.property_names()?, vec!["c"]);
    assert_eq!(props.compound("c")?.property_names()?, vec!["z"]);

    // The first directive on a leaf settles it; a later prune is ignored
    // but a later plain value still overrides.
    let leaf = |value: i32, meta: MetaData| {
        write(move |a| {
            a.top()
                .properties()
                .add_scalar("p", DataType::INT32, 0, meta)?
                .set_value(&value)?;
            Ok(())
        })
    };
    let first = leaf(1, MetaData::new())?;
    let replaced = leaf(2, MetaData::new().with(MetaData::REPLACE, "1"))?;
    let pruned = leaf(3, MetaData::new().with(MetaData::PRUNE, "1"))?;
    let plain = leaf(4, MetaData::new())?;

    let archive = IArchive::open_layers(&[first.path(), replaced.path(), pruned.path()])?;
    let props = archive.top().properties()?;
    assert!(props.has_property("p")?);
    assert_eq!(props.scalar("p")?.value::<i32>(0)?, 2);

    let archive = IArchive::open_layers(&[first.path(), replaced.path(), pruned.path(), plain.path()])?;
    assert_eq!(archive.top().properties()?.scalar("p")?.value::<i32>(0)?, 4);

    let archive = IArchive::open_layers(&[first.path(), pruned.path(), replaced.path()])?;
    assert!(!archive.top().properties()?.has_property("p")?);
    Ok(())
}

#[test]
fn test_override_below_instance_is_ignored() -> Result<()> {
    let base = write(|a| {
        let src = a.top().add_child("src", MetaData::new())?;
        src.add_child("leaf", MetaData::new())?;
        a.top().add_child_instance(&src, "inst")?;
        Ok(())
    })?;
    let over = write(|a| {
        a.top().add_child("inst", MetaData::new())?.add_child("extra", MetaData::new())?;
        Ok(())
    })?;

    let archive = IArchive::open_layers(&[base.path(), over.path()])?;
    let inst = archive.find_object("/inst")?;
    assert!(inst.is_instance_root());
    assert_eq!(inst.child_names()?, vec!["leaf"]);
    Ok(())
}

#[test]
fn test_replace_at_instance_path() -> Result<()> {
    let base = write(|a| {
        let src = a.top().add_child("src", MetaData::new())?;
        src.add_child("leaf", MetaData::new())?;
        a.top().add_child_instance(&src, "inst")?;
        Ok(())
    })?;
    let over = write(|a| {
        a.top()
            .add_child("inst", MetaData::new().with(MetaData::REPLACE, "1"))?
            .add_child("own", MetaData::new())?;
        Ok(())
    })?;

    let archive = IArchive::open_layers(&[base.path(), over.path()])?;
    let inst = archive.find_object("/inst")?;
    assert!(!inst.is_instance_root());
    assert_eq!(inst.child_names()?, vec!["own"]);
    assert_eq!(archive.find_object("/src")?.child_names()?, vec!["leaf"]);
    Ok(())
}

#[test]
fn test_noop_override_keeps_hashes() -> Result<()> {
    let build = |a: &OArchive| -> Result<()> {
        let obj = a.top().add_child("obj", MetaData::new())?;
        let ts = a.add_time_sampling(TimeSampling::uniform(1.0 / 24.0, 0.0))?;
        let p = obj.properties().add_array("p", DataType::VEC3F, ts, MetaData::new())?;
        p.set_values(&[[0.0f32; 3]; 4])?;
        p.set_values(&[[1.0f32; 3]; 4])?;
        obj.add_child("kid", MetaData::new())?;
        Ok(())
    };
    let base = write(build)?;
    let same = write(build)?;

    let single = IArchive::open(base.path())?;
    let layered = IArchive::open_layers(&[base.path(), same.path()])?;
    for path in ["/", "/obj", "/obj/kid"] {
        let a = single.find_object(path)?;
        let b = layered.find_object(path)?;
        assert!(a.properties_hash()?.is_some());
        assert_eq!(a.properties_hash()?, b.properties_hash()?, "{path}");
        assert_eq!(a.children_hash()?, b.children_hash()?, "{path}");
    }
    Ok(())
}

#[test]
fn test_compact_encoding_has_no_hashes() -> Result<()> {
    let file = write_with(WriteOptions::new().with_encoding(Encoding::Compact), |a| {
        let p = a.top().properties().add_scalar("x", DataType::UINT8, 0, MetaData::new())?;
        p.set_value(&7u8)?;
        Ok(())
    })?;
    let archive = IArchive::open(file.path())?;
    assert!(!archive.has_digests());
    assert_eq!(archive.top().properties_hash()?, None);
    assert_eq!(archive.top().children_hash()?, None);
    let x = archive.top().properties()?.scalar("x")?;
    assert_eq!(x.sample_key(0)?, None);
    assert_eq!(x.value::<u8>(0)?, 7);
    Ok(())
}

#[test]
fn test_reads_with_and_without_mmap_or_cache() -> Result<()> {
    let file = write_with(WriteOptions::new().with_compression(6), |a| {
        let p = a.top().properties().add_array("p", DataType::UINT16, 0, MetaData::new())?;
        p.set_values(&(0..1000u16).collect::<Vec<_>>())?;
        Ok(())
    })?;
    for options in [
        ReadOptions::new(),
        ReadOptions::new().with_mmap(false),
        ReadOptions::new().with_sample_cache_bytes(0),
    ] {
        let archive = IArchive::open_with(file.path(), options)?;
        let p = archive.top().properties()?.array("p")?;
        let values = p.values::<u16>(0)?;
        assert_eq!(values.len(), 1000);
        assert_eq!(values[999], 999);
    }
    Ok(())
}
