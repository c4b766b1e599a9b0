//! DataType: a POD kind plus a fixed extent.

use super::{Bool, PlainOldDataType, PodScalar};
use bytemuck::Pod;
use std::fmt;

/// Element type of every scalar and array property.
///
/// Extent 1 is a plain scalar; extent N is a fixed tuple such as a
/// 3-float point (`Float32 x 3`) or a 4x4 double matrix (`Float64 x 16`).
/// Fixed once the property is created.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DataType {
    pub pod: PlainOldDataType,
    pub extent: u8,
}

impl DataType {
    #[inline]
    pub const fn new(pod: PlainOldDataType, extent: u8) -> Self {
        Self { pod, extent }
    }

    #[inline]
    pub const fn scalar(pod: PlainOldDataType) -> Self {
        Self { pod, extent: 1 }
    }

    /// Encoded size of one element, 0 for strings.
    #[inline]
    pub const fn num_bytes(&self) -> usize {
        self.pod.num_bytes() * self.extent as usize
    }

    #[inline]
    pub const fn is_valid(&self) -> bool {
        !matches!(self.pod, PlainOldDataType::Unknown) && self.extent > 0
    }

    pub const UNKNOWN: Self = Self::new(PlainOldDataType::Unknown, 0);

    pub const BOOL: Self = Self::scalar(PlainOldDataType::Boolean);
    pub const UINT8: Self = Self::scalar(PlainOldDataType::Uint8);
    pub const INT8: Self = Self::scalar(PlainOldDataType::Int8);
    pub const UINT16: Self = Self::scalar(PlainOldDataType::Uint16);
    pub const INT16: Self = Self::scalar(PlainOldDataType::Int16);
    pub const UINT32: Self = Self::scalar(PlainOldDataType::Uint32);
    pub const INT32: Self = Self::scalar(PlainOldDataType::Int32);
    pub const UINT64: Self = Self::scalar(PlainOldDataType::Uint64);
    pub const INT64: Self = Self::scalar(PlainOldDataType::Int64);
    pub const FLOAT16: Self = Self::scalar(PlainOldDataType::Float16);
    pub const FLOAT32: Self = Self::scalar(PlainOldDataType::Float32);
    pub const FLOAT64: Self = Self::scalar(PlainOldDataType::Float64);
    pub const STRING: Self = Self::scalar(PlainOldDataType::String);
    pub const WSTRING: Self = Self::scalar(PlainOldDataType::Wstring);

    pub const VEC2F: Self = Self::new(PlainOldDataType::Float32, 2);
    pub const VEC3F: Self = Self::new(PlainOldDataType::Float32, 3);
    pub const VEC4F: Self = Self::new(PlainOldDataType::Float32, 4);
    pub const VEC2D: Self = Self::new(PlainOldDataType::Float64, 2);
    pub const VEC3D: Self = Self::new(PlainOldDataType::Float64, 3);
    pub const VEC3I: Self = Self::new(PlainOldDataType::Int32, 3);

    pub const MAT44F: Self = Self::new(PlainOldDataType::Float32, 16);
    pub const MAT44D: Self = Self::new(PlainOldDataType::Float64, 16);

    /// min + max corners.
    pub const BOX3F: Self = Self::new(PlainOldDataType::Float32, 6);
    pub const BOX3D: Self = Self::new(PlainOldDataType::Float64, 6);
}

impl Default for DataType {
    fn default() -> Self {
        Self::UNKNOWN
    }
}

impl fmt::Debug for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.extent == 1 {
            write!(f, "{}", self.pod.name())
        } else {
            write!(f, "{}[{}]", self.pod.name(), self.extent)
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// A Rust value that is exactly one element of some [`DataType`].
///
/// Typed property accessors compare `DATA_TYPE` against the stored type
/// and refuse mismatches.
pub trait PodElement: Pod {
    const DATA_TYPE: DataType;
}

macro_rules! impl_scalar_element {
    ($($t:ty),*) => {
        $(impl PodElement for $t {
            const DATA_TYPE: DataType = DataType::scalar(<$t as PodScalar>::POD);
        })*
    };
}

impl_scalar_element!(Bool, u8, i8, u16, i16, u32, i32, u64, i64, half::f16, f32, f64);

impl<T: PodScalar, const N: usize> PodElement for [T; N] {
    const DATA_TYPE: DataType = DataType::new(T::POD, N as u8);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_type_sizes() {
        assert_eq!(DataType::BOOL.num_bytes(), 1);
        assert_eq!(DataType::VEC3F.num_bytes(), 12);
        assert_eq!(DataType::MAT44D.num_bytes(), 128);
        assert_eq!(DataType::BOX3D.num_bytes(), 48);
        assert_eq!(DataType::STRING.num_bytes(), 0);
    }

    #[test]
    fn test_data_type_display() {
        assert_eq!(DataType::FLOAT32.to_string(), "float32_t");
        assert_eq!(DataType::VEC3F.to_string(), "float32_t[3]");
        assert_eq!(DataType::new(PlainOldDataType::String, 2).to_string(), "string[2]");
    }

    #[test]
    fn test_element_types() {
        assert_eq!(<f32 as PodElement>::DATA_TYPE, DataType::FLOAT32);
        assert_eq!(<[f32; 3] as PodElement>::DATA_TYPE, DataType::VEC3F);
        assert_eq!(<[f64; 16] as PodElement>::DATA_TYPE, DataType::MAT44D);
        assert_eq!(<Bool as PodElement>::DATA_TYPE, DataType::BOOL);
    }

    #[test]
    fn test_validity() {
        assert!(DataType::VEC3F.is_valid());
        assert!(!DataType::UNKNOWN.is_valid());
        assert!(!DataType::new(PlainOldDataType::Float32, 0).is_valid());
    }
}
