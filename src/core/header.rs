//! Headers describing objects and properties without their contents.

use super::MetaData;
use crate::util::DataType;
use std::fmt;

/// Name, path and metadata of an object.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ObjectHeader {
    pub name: String,
    /// `/`-joined path from the root; the root itself is `/`.
    pub full_name: String,
    pub meta_data: MetaData,
}

impl ObjectHeader {
    pub fn new(name: impl Into<String>, full_name: impl Into<String>, meta_data: MetaData) -> Self {
        Self {
            name: name.into(),
            full_name: full_name.into(),
            meta_data,
        }
    }

    /// Header of the implicit root.
    pub fn root() -> Self {
        Self::new("", "/", MetaData::new())
    }

    /// The `schema` metadata value, if any.
    pub fn schema(&self) -> Option<&str> {
        self.meta_data.schema()
    }
}

/// Join a parent path and a child name.
pub fn child_path(parent: &str, name: &str) -> String {
    if parent.is_empty() || parent == "/" {
        format!("/{name}")
    } else {
        format!("{parent}/{name}")
    }
}

/// Property kind; the discriminant is the on-disk tag.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PropertyType {
    Compound = 0,
    Scalar = 1,
    Array = 2,
}

impl PropertyType {
    /// Decode the on-disk tag.
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(Self::Compound),
            1 => Some(Self::Scalar),
            2 => Some(Self::Array),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Compound => "compound",
            Self::Scalar => "scalar",
            Self::Array => "array",
        }
    }
}

impl fmt::Display for PropertyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Header of a property: everything but the samples.
#[derive(Clone, Debug, PartialEq)]
pub struct PropertyHeader {
    pub name: String,
    pub property_type: PropertyType,
    /// `DataType::UNKNOWN` for compounds.
    pub data_type: DataType,
    /// Index into the archive time-sampling table; 0 is static.
    pub time_sampling_index: u32,
    pub meta_data: MetaData,
}

impl PropertyHeader {
    /// Header of a compound property.
    pub fn compound(name: impl Into<String>, meta_data: MetaData) -> Self {
        Self {
            name: name.into(),
            property_type: PropertyType::Compound,
            data_type: DataType::UNKNOWN,
            time_sampling_index: 0,
            meta_data,
        }
    }

    /// Header of a scalar property.
    pub fn scalar(name: impl Into<String>, data_type: DataType, time_sampling_index: u32, meta_data: MetaData) -> Self {
        Self {
            name: name.into(),
            property_type: PropertyType::Scalar,
            data_type,
            time_sampling_index,
            meta_data,
        }
    }

    /// Header of an array property.
    pub fn array(name: impl Into<String>, data_type: DataType, time_sampling_index: u32, meta_data: MetaData) -> Self {
        Self {
            property_type: PropertyType::Array,
            ..Self::scalar(name, data_type, time_sampling_index, meta_data)
        }
    }

    #[inline]
    pub fn is_compound(&self) -> bool {
        self.property_type == PropertyType::Compound
    }

    #[inline]
    pub fn is_scalar(&self) -> bool {
        self.property_type == PropertyType::Scalar
    }

    #[inline]
    pub fn is_array(&self) -> bool {
        self.property_type == PropertyType::Array
    }
}
