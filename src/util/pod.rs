//! Plain old data kinds: the scalar element types a property can hold.

use bytemuck::{Pod, Zeroable};
use half::f16;
use std::fmt;

/// Scalar element kind of a [`DataType`](super::DataType).
///
/// The discriminant is the on-disk tag (4 bits in a property header).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum PlainOldDataType {
    Boolean = 0,
    Uint8 = 1,
    Int8 = 2,
    Uint16 = 3,
    Int16 = 4,
    Uint32 = 5,
    Int32 = 6,
    Uint64 = 7,
    Int64 = 8,
    Float16 = 9,
    Float32 = 10,
    Float64 = 11,
    /// UTF-8 string, NUL-terminated on disk.
    String = 12,
    /// Wide string; held as UTF-8 in memory and on disk.
    Wstring = 13,
    #[default]
    Unknown = 127,
}

/// (kind, bytes per element, canonical name)
const POD_TABLE: [(PlainOldDataType, usize, &str); 14] = [
    (PlainOldDataType::Boolean, 1, "bool_t"),
    (PlainOldDataType::Uint8, 1, "uint8_t"),
    (PlainOldDataType::Int8, 1, "int8_t"),
    (PlainOldDataType::Uint16, 2, "uint16_t"),
    (PlainOldDataType::Int16, 2, "int16_t"),
    (PlainOldDataType::Uint32, 4, "uint32_t"),
    (PlainOldDataType::Int32, 4, "int32_t"),
    (PlainOldDataType::Uint64, 8, "uint64_t"),
    (PlainOldDataType::Int64, 8, "int64_t"),
    (PlainOldDataType::Float16, 2, "float16_t"),
    (PlainOldDataType::Float32, 4, "float32_t"),
    (PlainOldDataType::Float64, 8, "float64_t"),
    (PlainOldDataType::String, 0, "string"),
    (PlainOldDataType::Wstring, 0, "wstring"),
];

impl PlainOldDataType {
    /// Number of known kinds.
    pub const COUNT: usize = POD_TABLE.len();

    /// All known kinds in tag order.
    pub fn all() -> impl Iterator<Item = Self> {
        POD_TABLE.iter().map(|(pod, _, _)| *pod)
    }

    /// Fixed byte size of one element; 0 for strings and `Unknown`,
    /// whose encoded size depends on content.
    #[inline]
    pub const fn num_bytes(self) -> usize {
        if (self as usize) < POD_TABLE.len() {
            POD_TABLE[self as usize].1
        } else {
            0
        }
    }

    /// Canonical type name (`float32_t`, `string`, ...).
    #[inline]
    pub const fn name(self) -> &'static str {
        if (self as usize) < POD_TABLE.len() {
            POD_TABLE[self as usize].2
        } else {
            "UNKNOWN"
        }
    }

    /// Parse a POD name such as `float32_t`; unknown names give `Unknown`.
    pub fn from_name(name: &str) -> Self {
        POD_TABLE
            .iter()
            .find(|(_, _, n)| *n == name)
            .map(|(pod, _, _)| *pod)
            .unwrap_or(Self::Unknown)
    }

    /// Decode an on-disk tag.
    pub const fn from_u8(v: u8) -> Self {
        if (v as usize) < POD_TABLE.len() {
            POD_TABLE[v as usize].0
        } else {
            Self::Unknown
        }
    }

    #[inline]
    pub const fn is_integer(self) -> bool {
        matches!(
            self,
            Self::Uint8
                | Self::Int8
                | Self::Uint16
                | Self::Int16
                | Self::Uint32
                | Self::Int32
                | Self::Uint64
                | Self::Int64
        )
    }

    #[inline]
    pub const fn is_float(self) -> bool {
        matches!(self, Self::Float16 | Self::Float32 | Self::Float64)
    }

    #[inline]
    pub const fn is_numeric(self) -> bool {
        self.is_integer() || self.is_float()
    }

    #[inline]
    pub const fn is_string(self) -> bool {
        matches!(self, Self::String | Self::Wstring)
    }
}

impl fmt::Display for PlainOldDataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A Rust scalar with a fixed-width POD encoding.
pub trait PodScalar: Pod + Default + PartialEq + fmt::Debug {
    const POD: PlainOldDataType;
}

macro_rules! impl_pod_scalar {
    ($($t:ty => $pod:ident),* $(,)?) => {
        $(impl PodScalar for $t {
            const POD: PlainOldDataType = PlainOldDataType::$pod;
        })*
    };
}

impl_pod_scalar! {
    u8 => Uint8,
    i8 => Int8,
    u16 => Uint16,
    i16 => Int16,
    u32 => Uint32,
    i32 => Int32,
    u64 => Uint64,
    i64 => Int64,
    f16 => Float16,
    f32 => Float32,
    f64 => Float64,
}

/// One-byte boolean, matching the on-disk `bool_t` layout.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, Pod, Zeroable)]
#[repr(transparent)]
pub struct Bool(u8);

impl Bool {
    pub const TRUE: Self = Self(1);
    pub const FALSE: Self = Self(0);

    #[inline]
    pub const fn new(v: bool) -> Self {
        Self(v as u8)
    }

    #[inline]
    pub const fn get(self) -> bool {
        self.0 != 0
    }
}

impl From<bool> for Bool {
    #[inline]
    fn from(v: bool) -> Self {
        Self::new(v)
    }
}

impl From<Bool> for bool {
    #[inline]
    fn from(v: Bool) -> Self {
        v.get()
    }
}

impl fmt::Debug for Bool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.get())
    }
}

impl PodScalar for Bool {
    const POD: PlainOldDataType = PlainOldDataType::Boolean;
}
