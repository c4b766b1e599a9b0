//! # abcstore
//!
//! Storage engine for layered, time-sampled scene archives in the Ogawa
//! container format.
//!
//! An archive is a tree of objects, each owning a tree of properties.
//! Leaf properties hold one value (scalar) or one array of values per
//! sample, and every leaf follows a time sampling stored once per
//! archive. Readers can stack several archives as layers, later layers
//! overriding, pruning or replacing parts of earlier ones, and follow
//! instances to their source objects.
//!
//! ## Modules
//!
//! - [`util`] - POD kinds, data types, errors, math types
//! - [`core`] - time sampling, metadata, headers, samples, digests
//! - [`ogawa`] - the container format and the archive writer
//! - [`abc`] - the archive reader, single file or layered
//! - [`geom`] - schema views (Xform, PolyMesh, Camera...), GeomParams,
//!   face sets and materials
//!
//! ## Example
//!
//! ```no_run
//! use abcstore::prelude::*;
//!
//! let archive = OArchive::create("cube.abc")?;
//! let ts = archive.add_time_sampling(TimeSampling::uniform(1.0 / 24.0, 0.0))?;
//! let obj = archive.top().add_child("cube", MetaData::new())?;
//! let p = obj.properties().add_array("P", DataType::VEC3F, ts, MetaData::new())?;
//! p.set_values(&[Vec3::ZERO, Vec3::ONE])?;
//! archive.close()?;
//!
//! let read = IArchive::open("cube.abc")?;
//! let cube = read.find_object("/cube")?;
//! let values: Vec<Vec3> = cube.properties()?.array("P")?.values(0)?;
//! # Ok::<(), abcstore::Error>(())
//! ```

pub mod util;
pub mod core;
pub mod ogawa;
pub mod abc;
pub mod geom;

pub use util::{DataType, Error, PlainOldDataType, Result};

/// Common imports.
pub mod prelude {
    pub use crate::abc::{IArchive, IArrayProperty, ICompoundProperty, IObject, IProperty, IScalarProperty, ReadOptions};
    pub use crate::core::{GeometryScope, MetaData, Sample, SampleSelector, TimeSampling};
    pub use crate::geom::SchemaView;
    pub use crate::ogawa::{Encoding, OArchive, OArrayProperty, OCompoundProperty, OObject, OScalarProperty, WriteOptions};
    pub use crate::util::{BBox3d, DataType, Error, PlainOldDataType, Result, Vec2, Vec3};
}
