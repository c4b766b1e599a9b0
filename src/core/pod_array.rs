//! Decoded sample values.
//!
//! A [`Sample`] is what a scalar or array property stores at one index:
//! a flat run of POD values, `extent` values per element. Scalar samples
//! hold exactly one element; array samples hold any number.

use bytemuck::pod_collect_to_vec;
use half::f16;

use crate::util::{DataType, Error, PlainOldDataType, PodElement, Result};

/// Flat typed values, one variant per POD kind.
#[derive(Clone, Debug, PartialEq)]
pub enum PodArray {
    Boolean(Vec<bool>),
    Uint8(Vec<u8>),
    Int8(Vec<i8>),
    Uint16(Vec<u16>),
    Int16(Vec<i16>),
    Uint32(Vec<u32>),
    Int32(Vec<i32>),
    Uint64(Vec<u64>),
    Int64(Vec<i64>),
    Float16(Vec<f16>),
    Float32(Vec<f32>),
    Float64(Vec<f64>),
    String(Vec<String>),
    Wstring(Vec<String>),
}

/// Apply one expression to the vector inside any variant.
macro_rules! with_vec {
    ($arr:expr, $v:ident => $body:expr) => {
        match $arr {
            PodArray::Boolean($v) => $body,
            PodArray::Uint8($v) => $body,
            PodArray::Int8($v) => $body,
            PodArray::Uint16($v) => $body,
            PodArray::Int16($v) => $body,
            PodArray::Uint32($v) => $body,
            PodArray::Int32($v) => $body,
            PodArray::Uint64($v) => $body,
            PodArray::Int64($v) => $body,
            PodArray::Float16($v) => $body,
            PodArray::Float32($v) => $body,
            PodArray::Float64($v) => $body,
            PodArray::String($v) => $body,
            PodArray::Wstring($v) => $body,
        }
    };
}

/// Same, rebuilding the same variant from the expression's result.
macro_rules! map_vec {
    ($arr:expr, $v:ident => $body:expr) => {
        match $arr {
            PodArray::Boolean($v) => PodArray::Boolean($body),
            PodArray::Uint8($v) => PodArray::Uint8($body),
            PodArray::Int8($v) => PodArray::Int8($body),
            PodArray::Uint16($v) => PodArray::Uint16($body),
            PodArray::Int16($v) => PodArray::Int16($body),
            PodArray::Uint32($v) => PodArray::Uint32($body),
            PodArray::Int32($v) => PodArray::Int32($body),
            PodArray::Uint64($v) => PodArray::Uint64($body),
            PodArray::Int64($v) => PodArray::Int64($body),
            PodArray::Float16($v) => PodArray::Float16($body),
            PodArray::Float32($v) => PodArray::Float32($body),
            PodArray::Float64($v) => PodArray::Float64($body),
            PodArray::String($v) => PodArray::String($body),
            PodArray::Wstring($v) => PodArray::Wstring($body),
        }
    };
}

impl PodArray {
    /// POD kind of the values.
    pub fn pod(&self) -> PlainOldDataType {
        match self {
            Self::Boolean(_) => PlainOldDataType::Boolean,
            Self::Uint8(_) => PlainOldDataType::Uint8,
            Self::Int8(_) => PlainOldDataType::Int8,
            Self::Uint16(_) => PlainOldDataType::Uint16,
            Self::Int16(_) => PlainOldDataType::Int16,
            Self::Uint32(_) => PlainOldDataType::Uint32,
            Self::Int32(_) => PlainOldDataType::Int32,
            Self::Uint64(_) => PlainOldDataType::Uint64,
            Self::Int64(_) => PlainOldDataType::Int64,
            Self::Float16(_) => PlainOldDataType::Float16,
            Self::Float32(_) => PlainOldDataType::Float32,
            Self::Float64(_) => PlainOldDataType::Float64,
            Self::String(_) => PlainOldDataType::String,
            Self::Wstring(_) => PlainOldDataType::Wstring,
        }
    }

    /// Number of POD values (not elements).
    pub fn len(&self) -> usize {
        with_vec!(self, v => v.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Little-endian payload; strings are NUL-terminated.
    pub fn encode(&self) -> Vec<u8> {
        match self {
            Self::Boolean(v) => v.iter().map(|&b| u8::from(b)).collect(),
            Self::Uint8(v) => v.clone(),
            Self::Int8(v) => bytemuck::cast_slice(v).to_vec(),
            Self::Uint16(v) => bytemuck::cast_slice(v).to_vec(),
            Self::Int16(v) => bytemuck::cast_slice(v).to_vec(),
            Self::Uint32(v) => bytemuck::cast_slice(v).to_vec(),
            Self::Int32(v) => bytemuck::cast_slice(v).to_vec(),
            Self::Uint64(v) => bytemuck::cast_slice(v).to_vec(),
            Self::Int64(v) => bytemuck::cast_slice(v).to_vec(),
            Self::Float16(v) => bytemuck::cast_slice(v).to_vec(),
            Self::Float32(v) => bytemuck::cast_slice(v).to_vec(),
            Self::Float64(v) => bytemuck::cast_slice(v).to_vec(),
            Self::String(v) | Self::Wstring(v) => {
                let mut out = Vec::with_capacity(v.iter().map(|s| s.len() + 1).sum());
                for s in v {
                    out.extend_from_slice(s.as_bytes());
                    out.push(0);
                }
                out
            }
        }
    }

    /// Decode a payload written by [`encode`](Self::encode).
    pub fn decode(pod: PlainOldDataType, bytes: &[u8]) -> Result<Self> {
        let size = pod.num_bytes();
        if size > 0 && bytes.len() % size != 0 {
            return Err(Error::malformed(format!(
                "{} payload of {} bytes is not a whole number of values",
                pod,
                bytes.len()
            )));
        }
        Ok(match pod {
            PlainOldDataType::Boolean => Self::Boolean(bytes.iter().map(|&b| b != 0).collect()),
            PlainOldDataType::Uint8 => Self::Uint8(bytes.to_vec()),
            PlainOldDataType::Int8 => Self::Int8(pod_collect_to_vec(bytes)),
            PlainOldDataType::Uint16 => Self::Uint16(pod_collect_to_vec(bytes)),
            PlainOldDataType::Int16 => Self::Int16(pod_collect_to_vec(bytes)),
            PlainOldDataType::Uint32 => Self::Uint32(pod_collect_to_vec(bytes)),
            PlainOldDataType::Int32 => Self::Int32(pod_collect_to_vec(bytes)),
            PlainOldDataType::Uint64 => Self::Uint64(pod_collect_to_vec(bytes)),
            PlainOldDataType::Int64 => Self::Int64(pod_collect_to_vec(bytes)),
            PlainOldDataType::Float16 => Self::Float16(pod_collect_to_vec(bytes)),
            PlainOldDataType::Float32 => Self::Float32(pod_collect_to_vec(bytes)),
            PlainOldDataType::Float64 => Self::Float64(pod_collect_to_vec(bytes)),
            PlainOldDataType::String => Self::String(decode_strings(bytes)?),
            PlainOldDataType::Wstring => Self::Wstring(decode_strings(bytes)?),
            PlainOldDataType::Unknown => {
                return Err(Error::malformed("sample with unknown POD type"));
            }
        })
    }

    /// Fails when a string value holds a NUL, which would split it on disk.
    pub fn check_strings(&self) -> Result<()> {
        let (Self::String(v) | Self::Wstring(v)) = self else {
            return Ok(());
        };
        match v.iter().position(|s| s.contains('\0')) {
            Some(i) => Err(Error::invalid_state(format!("string value {i} contains a NUL character"))),
            None => Ok(()),
        }
    }

    /// Pick `extent`-sized groups by index, in index order.
    pub fn gather(&self, extent: usize, indices: &[u32]) -> Result<Self> {
        let count = if extent == 0 { 0 } else { self.len() / extent };
        if let Some(&bad) = indices.iter().find(|&&i| i as usize >= count) {
            return Err(Error::OutOfRange {
                what: "indexed value",
                index: bad as usize,
                count,
            });
        }
        Ok(map_vec!(self, v => {
            let mut out = Vec::with_capacity(indices.len() * extent);
            for &i in indices {
                let start = i as usize * extent;
                out.extend_from_slice(&v[start..start + extent]);
            }
            out
        }))
    }
}

fn decode_strings(bytes: &[u8]) -> Result<Vec<String>> {
    let body = bytes.strip_suffix(&[0]).unwrap_or(bytes);
    if bytes.is_empty() {
        return Ok(Vec::new());
    }
    body.split(|&b| b == 0)
        .map(|s| Ok(String::from_utf8(s.to_vec())?))
        .collect()
}

/// One decoded sample.
#[derive(Clone, Debug, PartialEq)]
pub struct Sample {
    data_type: DataType,
    values: PodArray,
}

impl Sample {
    /// Wrap values; the POD kinds must agree and the value count must be a
    /// multiple of the extent.
    pub fn new(data_type: DataType, values: PodArray) -> Result<Self> {
        if values.pod() != data_type.pod {
            return Err(Error::type_mismatch(data_type.pod, values.pod()));
        }
        if data_type.extent == 0 || values.len() % data_type.extent as usize != 0 {
            return Err(Error::type_mismatch(
                data_type,
                format!("{} values", values.len()),
            ));
        }
        Ok(Self { data_type, values })
    }

    /// Build from typed elements. Fails only for an element type whose
    /// POD kind has no fixed size.
    pub fn from_elements<T: PodElement>(elements: &[T]) -> Result<Self> {
        let data_type = T::DATA_TYPE;
        if data_type.pod.num_bytes() == 0 {
            return Err(Error::type_mismatch("a fixed-size POD", data_type));
        }
        let values = PodArray::decode(data_type.pod, bytemuck::cast_slice(elements))?;
        Ok(Self { data_type, values })
    }

    /// String values; ones holding a NUL are refused when written.
    pub fn from_strings<S: AsRef<str>>(strings: &[S]) -> Self {
        Self {
            data_type: DataType::STRING,
            values: PodArray::String(strings.iter().map(|s| s.as_ref().to_owned()).collect()),
        }
    }

    /// Wide string values; ones holding a NUL are refused when written.
    pub fn from_wstrings<S: AsRef<str>>(strings: &[S]) -> Self {
        Self {
            data_type: DataType::WSTRING,
            values: PodArray::Wstring(strings.iter().map(|s| s.as_ref().to_owned()).collect()),
        }
    }

    /// Decode a stored payload as `data_type`.
    pub(crate) fn decode(data_type: DataType, payload: &[u8]) -> Result<Self> {
        Self::new(data_type, PodArray::decode(data_type.pod, payload)?)
    }

    #[inline]
    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    /// Values, flattened.
    #[inline]
    pub fn values(&self) -> &PodArray {
        &self.values
    }

    pub fn into_values(self) -> PodArray {
        self.values
    }

    /// Number of `extent`-sized elements.
    pub fn num_elements(&self) -> usize {
        self.values.len() / self.data_type.extent.max(1) as usize
    }

    /// Payload bytes as stored.
    pub fn encode(&self) -> Vec<u8> {
        self.values.encode()
    }

    /// Reinterpret as typed elements; the type must match exactly.
    pub fn elements<T: PodElement>(&self) -> Result<Vec<T>> {
        if T::DATA_TYPE != self.data_type {
            return Err(Error::type_mismatch(self.data_type, T::DATA_TYPE));
        }
        Ok(pod_collect_to_vec(&self.values.encode()))
    }

    /// String values, for string and wstring samples.
    pub fn strings(&self) -> Option<&[String]> {
        match &self.values {
            PodArray::String(v) | PodArray::Wstring(v) => Some(v),
            _ => None,
        }
    }

    /// Elements picked through an index array.
    pub fn gather(&self, indices: &[u32]) -> Result<Self> {
        Ok(Self {
            data_type: self.data_type,
            values: self.values.gather(self.data_type.extent as usize, indices)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::Bool;

    #[test]
    fn test_numeric_payload_roundtrip() {
        let arrays = [
            PodArray::Boolean(vec![true, false, true]),
            PodArray::Int8(vec![-1, 0, 127]),
            PodArray::Uint16(vec![1, 65535]),
            PodArray::Int64(vec![i64::MIN, 7]),
            PodArray::Float16(vec![f16::from_f32(0.5), f16::from_f32(-2.0)]),
            PodArray::Float64(vec![1.0, f64::MAX]),
        ];
        for arr in arrays {
            let back = PodArray::decode(arr.pod(), &arr.encode()).unwrap();
            assert_eq!(back, arr);
        }
    }

    #[test]
    fn test_string_payloads() {
        let arr = PodArray::String(vec!["a".into(), String::new(), "héllo".into()]);
        assert_eq!(arr.encode(), b"a\0\0h\xc3\xa9llo\0");
        assert_eq!(PodArray::decode(PlainOldDataType::String, &arr.encode()).unwrap(), arr);
        assert_eq!(PodArray::decode(PlainOldDataType::Wstring, b"").unwrap(), PodArray::Wstring(vec![]));
        assert_eq!(
            PodArray::decode(PlainOldDataType::String, b"\0").unwrap(),
            PodArray::String(vec![String::new()])
        );
    }

    #[test]
    fn test_ragged_payload_is_malformed() {
        assert!(matches!(
            PodArray::decode(PlainOldDataType::Float32, &[0, 0, 0]),
            Err(Error::MalformedArchive(_))
        ));
    }

    #[test]
    fn test_typed_elements() {
        let pts = [[0.0f32, 1.0, 2.0], [3.0, 4.0, 5.0]];
        let s = Sample::from_elements(&pts).unwrap();
        assert_eq!(s.data_type(), DataType::VEC3F);
        assert_eq!(s.num_elements(), 2);
        assert_eq!(s.elements::<[f32; 3]>().unwrap(), pts.to_vec());
        assert!(matches!(s.elements::<f32>(), Err(Error::TypeMismatch { .. })));

        let flags = Sample::from_elements(&[Bool::TRUE, Bool::FALSE]).unwrap();
        assert_eq!(flags.values(), &PodArray::Boolean(vec![true, false]));
    }

    #[test]
    fn test_sample_new_checks_shape() {
        assert!(Sample::new(DataType::VEC3F, PodArray::Float32(vec![0.0; 4])).is_err());
        assert!(Sample::new(DataType::VEC3F, PodArray::Float64(vec![0.0; 3])).is_err());
        assert!(Sample::new(DataType::VEC3F, PodArray::Float32(vec![0.0; 6])).is_ok());
    }

    #[test]
    fn test_gather() {
        let vals = Sample::from_elements(&[[0.0f32, 0.0], [1.0, 1.0]]).unwrap();
        let out = vals.gather(&[1, 0, 1]).unwrap();
        assert_eq!(out.elements::<[f32; 2]>().unwrap(), vec![[1.0, 1.0], [0.0, 0.0], [1.0, 1.0]]);
        assert!(matches!(vals.gather(&[2]), Err(Error::OutOfRange { .. })));

        let names = Sample::from_strings(&["x", "y"]);
        assert_eq!(names.gather(&[1, 1]).unwrap().strings().unwrap(), &["y", "y"]);
    }
}
