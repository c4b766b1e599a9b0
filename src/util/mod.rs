//! Fundamental types shared by every layer of the engine:
//! - [`PlainOldDataType`] and [`DataType`] describe element layout
//! - [`PodElement`] ties Rust types to a DataType for typed access
//! - [`Error`] / [`Result`] for error handling
//! - math re-exports and bounding boxes

mod pod;
mod data_type;
mod error;
mod math;

pub use pod::*;
pub use data_type::*;
pub use error::*;
pub use math::*;
