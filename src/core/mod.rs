//! Core value types shared by the reader and writer.
//!
//! - [`TimeSampling`] and [`SampleSelector`] for time lookups
//! - [`MetaData`] for object and property tags
//! - [`ObjectHeader`] / [`PropertyHeader`]
//! - [`Sample`] / [`PodArray`] for decoded values
//! - [`Digest`] and the hash builders

mod time_sampling;
mod metadata;
mod header;
mod sample;
mod pod_array;
mod digest;
mod cache;
mod compression;

pub use time_sampling::{TimeSampling, TimeSamplingType, ACYCLIC_TIME_PER_CYCLE};
pub use metadata::MetaData;
pub use header::{child_path, ObjectHeader, PropertyHeader, PropertyType};
pub use sample::{GeometryScope, SampleInterp, SampleSelector, TopologyVariance};
pub use pod_array::{PodArray, Sample};
pub use digest::{
    children_hash, compound_property_hash, content_key, leaf_property_hash, properties_hash,
    ChildDigest, Digest, DigestBuilder,
};
pub use cache::{SampleBlockKey, SampleCache};
pub use compression::{compress, decompress};
