//! Reading archives.
//!
//! - [`IArchive`] - one file, or several merged as layers
//! - [`IObject`] - objects of the merged tree, including instances
//! - [`ICompoundProperty`], [`IScalarProperty`], [`IArrayProperty`] - properties
//!
//! ## Example
//!
//! ```no_run
//! use abcstore::abc::IArchive;
//!
//! let archive = IArchive::open_layers(&["base.abc", "fix.abc"])?;
//! let mesh = archive.find_object("/world/mesh")?;
//! if mesh.valid() {
//!     let p = mesh.properties()?.compound(".geom")?.array("P")?;
//!     println!("{} samples", p.num_samples());
//! }
//! # Ok::<(), abcstore::Error>(())
//! ```

mod archive;
mod layer;
mod object;
mod property;

pub use archive::{ArchiveInfo, IArchive, ReadOptions};
pub use object::IObject;
pub use property::{IArrayProperty, ICompoundProperty, IProperty, IScalarProperty, Samples};

#[cfg(test)]
mod tests;
