//! Archive writer.
//!
//! One [`OArchive`] owns a write session shared by all of its object and
//! property handles. Samples are appended in order; the structure is
//! written bottom-up when the archive is sealed.

mod archive;
mod object;
mod options;
mod property;
mod session;

pub use archive::OArchive;
pub use object::OObject;
pub use options::{Encoding, WriteOptions};
pub use property::{OArrayProperty, OCompoundProperty, OScalarProperty};

#[cfg(test)]
mod tests;
