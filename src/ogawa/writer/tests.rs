use super::*;
use crate::core::{MetaData, TimeSampling};
use crate::ogawa::format::*;
use crate::util::{DataType, Error};
use std::fs::File;
use std::io::Read;
use tempfile::NamedTempFile;

#[test]
fn test_write_empty_archive() -> crate::util::Result<()> {
    let temp = NamedTempFile::new()?;
    let archive = OArchive::create(temp.path())?;
    archive.close()?;

    let mut header = [0u8; HEADER_SIZE];
    File::open(temp.path())?.read_exact(&mut header)?;
    assert_eq!(&header[0..5], OGAWA_MAGIC);
    assert_eq!(header[FROZEN_OFFSET], FROZEN_FLAG);
    assert_eq!(u16::from_le_bytes([header[VERSION_OFFSET], header[VERSION_OFFSET + 1]]), CURRENT_VERSION);
    Ok(())
}

#[test]
fn test_drop_seals() -> crate::util::Result<()> {
    let temp = NamedTempFile::new()?;
    {
        let archive = OArchive::create(temp.path())?;
        archive.top().add_child("a", MetaData::new())?;
    }
    let mut header = [0u8; HEADER_SIZE];
    File::open(temp.path())?.read_exact(&mut header)?;
    assert_eq!(header[FROZEN_OFFSET], FROZEN_FLAG);
    Ok(())
}

#[test]
fn test_writes_after_seal_fail() -> crate::util::Result<()> {
    let temp = NamedTempFile::new()?;
    let archive = OArchive::create(temp.path())?;
    let top = archive.top();
    let child = top.add_child("a", MetaData::new())?;
    let prop = child.properties().add_scalar("x", DataType::INT32, 0, MetaData::new())?;
    prop.set_value(&1i32)?;
    archive.close()?;

    assert!(matches!(top.add_child("b", MetaData::new()), Err(Error::InvalidState(_))));
    assert!(matches!(prop.set_value(&2i32), Err(Error::InvalidState(_))));
    assert!(matches!(
        child.properties().add_compound("c", MetaData::new()),
        Err(Error::InvalidState(_))
    ));
    assert_eq!(prop.num_samples(), 1);
    Ok(())
}

#[test]
fn test_duplicate_names_rejected() -> crate::util::Result<()> {
    let temp = NamedTempFile::new()?;
    let archive = OArchive::create(temp.path())?;
    let top = archive.top();
    top.add_child("a", MetaData::new())?;
    assert!(matches!(top.add_child("a", MetaData::new()), Err(Error::InvalidState(_))));
    assert!(top.add_child("", MetaData::new()).is_err());
    assert!(top.add_child("x/y", MetaData::new()).is_err());

    let props = top.properties();
    props.add_compound("p", MetaData::new())?;
    assert!(matches!(
        props.add_scalar("p", DataType::FLOAT32, 0, MetaData::new()),
        Err(Error::InvalidState(_))
    ));
    Ok(())
}

#[test]
fn test_instance_rules() -> crate::util::Result<()> {
    let temp = NamedTempFile::new()?;
    let archive = OArchive::create(temp.path())?;
    let a = archive.top().add_child("a", MetaData::new())?;
    let b = a.add_child("b", MetaData::new())?;
    let d = b.add_child("d", MetaData::new())?;

    let c = a.add_child_instance(&b, "c")?;
    assert!(c.is_instance_root());
    assert_eq!(c.full_name(), "/a/c");

    // Into its own subtree, or onto itself.
    assert!(matches!(d.add_child_instance(&b, "loop"), Err(Error::InvalidState(_))));
    assert!(matches!(b.add_child_instance(&b, "self"), Err(Error::InvalidState(_))));
    // Instance roots own no storage.
    assert!(matches!(c.add_child("x", MetaData::new()), Err(Error::InvalidState(_))));
    assert!(matches!(
        c.properties().add_compound("x", MetaData::new()),
        Err(Error::InvalidState(_))
    ));

    let other_tmp = NamedTempFile::new()?;
    let other = OArchive::create(other_tmp.path())?;
    assert!(other.top().add_child_instance(&b, "foreign").is_err());
    Ok(())
}

#[test]
fn test_mutual_instances_are_refused() -> crate::util::Result<()> {
    let temp = NamedTempFile::new()?;
    let archive = OArchive::create(temp.path())?;
    let a = archive.top().add_child("a", MetaData::new())?;
    let b = archive.top().add_child("b", MetaData::new())?;
    let deep = b.add_child("deep", MetaData::new())?;

    a.add_child_instance(&b, "x")?;
    // /a now reaches /b and everything below it through the instance.
    assert!(matches!(b.add_child_instance(&a, "y"), Err(Error::InvalidState(_))));
    assert!(matches!(deep.add_child_instance(&a, "y"), Err(Error::InvalidState(_))));

    // A chain of instances without a loop is fine.
    let c = archive.top().add_child("c", MetaData::new())?;
    c.add_child_instance(&a, "z")?;
    archive.close()?;

    let read = crate::abc::IArchive::open(temp.path())?;
    let z = read.find_object("/c/z")?;
    assert_eq!(z.instance_source_path(), Some("/a"));
    assert_eq!(z.child_names()?, vec!["x"]);
    Ok(())
}

#[test]
fn test_sample_type_checks() -> crate::util::Result<()> {
    let temp = NamedTempFile::new()?;
    let archive = OArchive::create(temp.path())?;
    let props = archive.top().properties();

    let scalar = props.add_scalar("s", DataType::VEC3F, 0, MetaData::new())?;
    assert!(matches!(scalar.set_value(&1.0f32), Err(Error::TypeMismatch { .. })));
    assert!(matches!(
        scalar.set_sample(&crate::core::Sample::from_elements(&[[0.0f32; 3]; 2])?),
        Err(Error::TypeMismatch { .. })
    ));
    scalar.set_value(&[1.0f32, 2.0, 3.0])?;

    let array = props.add_array("a", DataType::INT32, 0, MetaData::new())?;
    array.set_values(&[1i32, 2, 3])?;
    array.set_values::<i32>(&[])?;
    assert!(array.set_strings(&["nope"]).is_err());
    assert_eq!(array.num_samples(), 2);

    assert!(props.add_array("bad_ts", DataType::INT32, 7, MetaData::new()).is_err());
    assert!(props.add_array("bad_type", DataType::UNKNOWN, 0, MetaData::new()).is_err());
    Ok(())
}

#[test]
fn test_strings_with_nul_are_refused() -> crate::util::Result<()> {
    let temp = NamedTempFile::new()?;
    let archive = OArchive::create(temp.path())?;
    let props = archive.top().properties();

    let name = props.add_scalar("name", DataType::STRING, 0, MetaData::new())?;
    assert!(matches!(name.set_string("a\0b"), Err(Error::InvalidState(_))));
    assert_eq!(name.num_samples(), 0);
    name.set_string("ab")?;

    let tags = props.add_array("tags", DataType::STRING, 0, MetaData::new())?;
    assert!(matches!(tags.set_strings(&["x\0y"]), Err(Error::InvalidState(_))));
    tags.set_strings(&["", "x", ""])?;
    assert_eq!(tags.num_samples(), 1);
    archive.close()?;

    let read = crate::abc::IArchive::open(temp.path())?;
    let props = read.top().properties()?;
    assert_eq!(props.scalar("name")?.string(0)?, "ab");
    assert_eq!(props.array("tags")?.strings(0)?, vec!["", "x", ""]);
    Ok(())
}

#[test]
fn test_time_sampling_dedup() -> crate::util::Result<()> {
    let temp = NamedTempFile::new()?;
    let archive = OArchive::create(temp.path())?;
    assert_eq!(archive.add_time_sampling(TimeSampling::identity())?, 0);
    let a = archive.add_time_sampling(TimeSampling::uniform(1.0 / 24.0, 0.0))?;
    let b = archive.add_time_sampling(TimeSampling::cyclic(3.0, vec![1.0, 2.0, 3.0]))?;
    assert_eq!((a, b), (1, 2));
    assert_eq!(archive.add_time_sampling(TimeSampling::uniform(1.0 / 24.0, 0.0))?, 1);
    assert_eq!(archive.num_time_samplings(), 3);
    assert!(archive.add_time_sampling(TimeSampling::uniform(-1.0, 0.0)).is_err());
    Ok(())
}

#[test]
fn test_dedup_shrinks_file() -> crate::util::Result<()> {
    let payload: Vec<f32> = (0..4096).map(|i| i as f32).collect();
    let write = |options: WriteOptions| -> crate::util::Result<u64> {
        let temp = NamedTempFile::new()?;
        let archive = OArchive::create_with(temp.path(), options)?;
        let props = archive.top().properties();
        for name in ["a", "b", "c"] {
            props.add_array(name, DataType::FLOAT32, 0, MetaData::new())?.set_values(&payload)?;
        }
        archive.close()?;
        Ok(std::fs::metadata(temp.path())?.len())
    };
    let deduped = write(WriteOptions::new())?;
    let full = write(WriteOptions::new().with_deduplicate(false))?;
    let compressed = write(WriteOptions::new().with_deduplicate(false).with_compression(9))?;
    assert!(deduped + 2 * 4096 * 4 <= full);
    assert!(compressed < full);
    Ok(())
}
