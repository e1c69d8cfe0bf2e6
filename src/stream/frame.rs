//! Image frame decoding
//!
//! An image message has two parts: a JSON header carrying at least `dtype`
//! and `shape`, followed by the raw pixel buffer. Both keys are removed from
//! the header; whatever remains is forwarded as frame metadata.

use std::str::FromStr;

use bytes::Bytes;
use serde_json::{Map, Value};

use crate::error::{Error, Result, StreamError};

/// Element kind of a pixel buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarKind {
    Unsigned,
    Signed,
    Float,
}

/// Byte order of multi-byte elements
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteOrder {
    Little,
    Big,
    /// Whatever this machine uses (also used for single-byte types)
    Native,
}

/// Element type of a pixel buffer, parsed from a numpy dtype string.
///
/// Accepts names (`uint8`, `int16`, `float32`, ...) and type strings with an
/// optional byte-order prefix (`<u2`, `>f4`, `|u1`, `=i4`, `u1`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DType {
    pub kind: ScalarKind,
    /// Bytes per element
    pub size: usize,
    pub order: ByteOrder,
}

impl DType {
    /// Bytes per element
    pub fn itemsize(&self) -> usize {
        self.size
    }

    fn named(name: &str) -> Option<(ScalarKind, usize)> {
        Some(match name {
            "uint8" => (ScalarKind::Unsigned, 1),
            "uint16" => (ScalarKind::Unsigned, 2),
            "uint32" => (ScalarKind::Unsigned, 4),
            "uint64" => (ScalarKind::Unsigned, 8),
            "int8" => (ScalarKind::Signed, 1),
            "int16" => (ScalarKind::Signed, 2),
            "int32" => (ScalarKind::Signed, 4),
            "int64" => (ScalarKind::Signed, 8),
            "float32" => (ScalarKind::Float, 4),
            "float64" => (ScalarKind::Float, 8),
            _ => return None,
        })
    }

    fn typestr(code: &str) -> Option<(ScalarKind, usize)> {
        let mut chars = code.chars();
        let kind = match chars.next()? {
            'u' => ScalarKind::Unsigned,
            'i' => ScalarKind::Signed,
            'f' => ScalarKind::Float,
            _ => return None,
        };
        let size: usize = chars.as_str().parse().ok()?;

        let valid = match kind {
            ScalarKind::Float => matches!(size, 4 | 8),
            _ => matches!(size, 1 | 2 | 4 | 8),
        };
        valid.then_some((kind, size))
    }
}

impl FromStr for DType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let (order, rest) = match s.chars().next() {
            Some('<') => (ByteOrder::Little, &s[1..]),
            Some('>') => (ByteOrder::Big, &s[1..]),
            Some('|') | Some('=') => (ByteOrder::Native, &s[1..]),
            _ => (ByteOrder::Native, s),
        };

        let (kind, size) = Self::named(rest)
            .or_else(|| Self::typestr(rest))
            .ok_or_else(|| StreamError::CorruptFrame(format!("unsupported dtype '{}'", s)))?;

        Ok(Self { kind, size, order })
    }
}

impl std::fmt::Display for DType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let order = match self.order {
            ByteOrder::Little => "<",
            ByteOrder::Big => ">",
            ByteOrder::Native => "|",
        };
        let kind = match self.kind {
            ScalarKind::Unsigned => 'u',
            ScalarKind::Signed => 'i',
            ScalarKind::Float => 'f',
        };
        write!(f, "{}{}{}", order, kind, self.size)
    }
}

/// Typed view of a frame's pixels, flattened in row-major order
#[derive(Debug, Clone, PartialEq)]
pub enum Pixels {
    U8(Vec<u8>),
    U16(Vec<u16>),
    U32(Vec<u32>),
    U64(Vec<u64>),
    I8(Vec<i8>),
    I16(Vec<i16>),
    I32(Vec<i32>),
    I64(Vec<i64>),
    F32(Vec<f32>),
    F64(Vec<f64>),
}

impl Pixels {
    /// Number of elements
    pub fn len(&self) -> usize {
        match self {
            Pixels::U8(v) => v.len(),
            Pixels::U16(v) => v.len(),
            Pixels::U32(v) => v.len(),
            Pixels::U64(v) => v.len(),
            Pixels::I8(v) => v.len(),
            Pixels::I16(v) => v.len(),
            Pixels::I32(v) => v.len(),
            Pixels::I64(v) => v.len(),
            Pixels::F32(v) => v.len(),
            Pixels::F64(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn convert<T, const N: usize>(
    data: &[u8],
    order: ByteOrder,
    from_le: fn([u8; N]) -> T,
    from_be: fn([u8; N]) -> T,
) -> Vec<T> {
    let little = match order {
        ByteOrder::Little => true,
        ByteOrder::Big => false,
        ByteOrder::Native => cfg!(target_endian = "little"),
    };
    data.chunks_exact(N)
        .filter_map(|chunk| <[u8; N]>::try_from(chunk).ok())
        .map(|bytes| if little { from_le(bytes) } else { from_be(bytes) })
        .collect()
}

/// A decoded image frame
#[derive(Debug, Clone)]
pub struct Frame {
    data: Bytes,
    dtype: DType,
    shape: Vec<usize>,
    metadata: Map<String, Value>,
}

impl Frame {
    /// Decode a two-part image message.
    ///
    /// Fails with [`StreamError::CorruptFrame`] if the header is not a JSON
    /// object, lacks `dtype` or `shape`, or if the payload length is not
    /// `product(shape) * itemsize(dtype)`.
    pub fn decode(header: &[u8], data: Bytes) -> Result<Self> {
        let mut metadata = match serde_json::from_slice(header) {
            Ok(Value::Object(map)) => map,
            Ok(_) => return Err(corrupt("metadata is not a JSON object")),
            Err(e) => return Err(corrupt(format!("metadata is not valid JSON: {}", e))),
        };

        let dtype: DType = match metadata.remove("dtype") {
            Some(Value::String(s)) => s.parse()?,
            Some(other) => return Err(corrupt(format!("invalid dtype {}", other))),
            None => return Err(corrupt("missing dtype")),
        };

        let shape = match metadata.remove("shape") {
            Some(Value::Array(dims)) => dims
                .iter()
                .map(|d| {
                    d.as_u64()
                        .and_then(|d| usize::try_from(d).ok())
                        .ok_or_else(|| corrupt(format!("invalid dimension {}", d)))
                })
                .collect::<Result<Vec<usize>>>()?,
            Some(other) => return Err(corrupt(format!("invalid shape {}", other))),
            None => return Err(corrupt("missing shape")),
        };

        let expected = shape
            .iter()
            .try_fold(dtype.itemsize(), |acc, &d| acc.checked_mul(d))
            .ok_or_else(|| corrupt(format!("shape {:?} overflows", shape)))?;

        if data.len() != expected {
            return Err(corrupt(format!(
                "payload is {} bytes, shape {:?} of {} needs {}",
                data.len(),
                shape,
                dtype,
                expected
            )));
        }

        Ok(Self {
            data,
            dtype,
            shape,
            metadata,
        })
    }

    /// Decode from the parts of a multi-part message
    pub fn from_parts(parts: Vec<Bytes>) -> Result<Self> {
        let mut parts = parts.into_iter();
        match (parts.next(), parts.next(), parts.next()) {
            (Some(header), Some(data), None) => Self::decode(&header, data),
            _ => Err(corrupt("expected a two-part message")),
        }
    }

    /// Raw pixel bytes
    pub fn data(&self) -> &Bytes {
        &self.data
    }

    pub fn dtype(&self) -> DType {
        self.dtype
    }

    /// Dimensions, outermost first
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Header fields other than `dtype` and `shape`
    pub fn metadata(&self) -> &Map<String, Value> {
        &self.metadata
    }

    /// Number of elements
    pub fn len(&self) -> usize {
        self.data.len() / self.dtype.itemsize()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Capture timestamp, if the recorder sent one
    pub fn timestamp(&self) -> Option<f64> {
        self.metadata.get("timestamp").and_then(Value::as_f64)
    }

    /// Frame number, if the recorder sent one
    pub fn frame_number(&self) -> Option<u64> {
        self.metadata.get("frame_number").and_then(Value::as_u64)
    }

    /// Pixels converted to their element type
    pub fn pixels(&self) -> Pixels {
        let data = &self.data[..];
        let order = self.dtype.order;
        match (self.dtype.kind, self.dtype.size) {
            (ScalarKind::Unsigned, 1) => Pixels::U8(data.to_vec()),
            (ScalarKind::Unsigned, 2) => Pixels::U16(convert(data, order, u16::from_le_bytes, u16::from_be_bytes)),
            (ScalarKind::Unsigned, 4) => Pixels::U32(convert(data, order, u32::from_le_bytes, u32::from_be_bytes)),
            (ScalarKind::Unsigned, _) => Pixels::U64(convert(data, order, u64::from_le_bytes, u64::from_be_bytes)),
            (ScalarKind::Signed, 1) => Pixels::I8(data.iter().map(|&b| b as i8).collect()),
            (ScalarKind::Signed, 2) => Pixels::I16(convert(data, order, i16::from_le_bytes, i16::from_be_bytes)),
            (ScalarKind::Signed, 4) => Pixels::I32(convert(data, order, i32::from_le_bytes, i32::from_be_bytes)),
            (ScalarKind::Signed, _) => Pixels::I64(convert(data, order, i64::from_le_bytes, i64::from_be_bytes)),
            (ScalarKind::Float, 4) => Pixels::F32(convert(data, order, f32::from_le_bytes, f32::from_be_bytes)),
            (ScalarKind::Float, _) => Pixels::F64(convert(data, order, f64::from_le_bytes, f64::from_be_bytes)),
        }
    }

    /// Split into raw bytes, shape and metadata
    pub fn into_parts(self) -> (Bytes, Vec<usize>, Map<String, Value>) {
        (self.data, self.shape, self.metadata)
    }
}

fn corrupt(msg: impl Into<String>) -> Error {
    StreamError::CorruptFrame(msg.into()).into()
}
