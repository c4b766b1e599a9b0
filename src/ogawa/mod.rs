//! Append-only container and the archive writer built on it.
//!
//! ## File Structure
//!
//! ```text
//! +------------------+
//! | Magic: "Ogawa"   |  5 bytes
//! +------------------+
//! | Frozen flag      |  1 byte (0x00 or 0xFF)
//! +------------------+
//! | Version          |  2 bytes (u16 LE)
//! +------------------+
//! | Root Group Pos   |  8 bytes (u64 LE)
//! +------------------+
//! | ... Data ...     |
//! +------------------+
//! ```
//!
//! Everything after the header is data blocks and groups of child
//! offsets; see [`format`] for the layout of the archive inside them.

pub mod format;
mod reader;
mod stream;
pub(crate) mod read_util;
pub(crate) mod write_util;
pub mod writer;

pub use reader::{IData, IGroup, IStreams};
pub use stream::OStream;
pub use writer::{Encoding, OArchive, OArrayProperty, OCompoundProperty, OObject, OScalarProperty, WriteOptions};
