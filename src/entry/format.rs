//! Wire format and semantic type codes.
//!
//! A field carries two descriptions of the same bytes. The wire format is a
//! struct-style code describing how the bytes are walked when a single record
//! is unpacked (`H`, `24s`, `3x`, `256B`). The semantic type is a numpy-style
//! code describing how the bytes are viewed in a columnar batch (`uint16`,
//! `24uint8`, `(64,2)i2`). The two usually agree on width; they must agree on
//! the total width of a record.
//!
//! All multi-byte values are little-endian.

use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, LazyLock};

use arrow::datatypes::{DataType, Field};
use regex::Regex;

use crate::error::{LogError, Result};

/// Widest field a code may describe: one whole record payload, whose length
/// the record header stores as a `u16`.
pub const MAX_FIELD_SIZE: usize = u16::MAX as usize;

/// Optional repeat count followed by a single struct code character.
static WIRE_CODE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(\d+)?\s*([xcbBhHiIqQfds])\s*$").expect("Invalid wire code regex pattern")
});

/// Optional shape (`N` or `(a,b,..)`) followed by an element type name.
static SEMANTIC_CODE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(?:\(\s*(\d+(?:\s*,\s*\d+)*)\s*,?\s*\)|(\d+))?\s*([a-z]+[0-9]*)\s*$")
        .expect("Invalid semantic code regex pattern")
});

/// Fixed-width numeric element type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ScalarType {
    I8,
    U8,
    I16,
    U16,
    I32,
    U32,
    I64,
    U64,
    F32,
    F64,
}

impl ScalarType {
    pub const fn size(self) -> usize {
        match self {
            ScalarType::I8 | ScalarType::U8 => 1,
            ScalarType::I16 | ScalarType::U16 => 2,
            ScalarType::I32 | ScalarType::U32 | ScalarType::F32 => 4,
            ScalarType::I64 | ScalarType::U64 | ScalarType::F64 => 8,
        }
    }

    pub const fn is_signed(self) -> bool {
        matches!(
            self,
            ScalarType::I8 | ScalarType::I16 | ScalarType::I32 | ScalarType::I64
        )
    }

    pub const fn is_float(self) -> bool {
        matches!(self, ScalarType::F32 | ScalarType::F64)
    }

    /// Numpy-style name used in semantic type codes.
    pub const fn name(self) -> &'static str {
        match self {
            ScalarType::I8 => "int8",
            ScalarType::U8 => "uint8",
            ScalarType::I16 => "int16",
            ScalarType::U16 => "uint16",
            ScalarType::I32 => "int32",
            ScalarType::U32 => "uint32",
            ScalarType::I64 => "int64",
            ScalarType::U64 => "uint64",
            ScalarType::F32 => "float32",
            ScalarType::F64 => "float64",
        }
    }

    /// Struct-style character used in wire format codes.
    pub const fn wire_char(self) -> char {
        match self {
            ScalarType::I8 => 'b',
            ScalarType::U8 => 'B',
            ScalarType::I16 => 'h',
            ScalarType::U16 => 'H',
            ScalarType::I32 => 'i',
            ScalarType::U32 => 'I',
            ScalarType::I64 => 'q',
            ScalarType::U64 => 'Q',
            ScalarType::F32 => 'f',
            ScalarType::F64 => 'd',
        }
    }

    fn from_wire_char(c: char) -> Option<Self> {
        Some(match c {
            'b' => ScalarType::I8,
            'B' => ScalarType::U8,
            'h' => ScalarType::I16,
            'H' => ScalarType::U16,
            'i' => ScalarType::I32,
            'I' => ScalarType::U32,
            'q' => ScalarType::I64,
            'Q' => ScalarType::U64,
            'f' => ScalarType::F32,
            'd' => ScalarType::F64,
            _ => return None,
        })
    }

    fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "int8" | "i1" => ScalarType::I8,
            "uint8" | "u1" => ScalarType::U8,
            "int16" | "i2" => ScalarType::I16,
            "uint16" | "u2" => ScalarType::U16,
            "int32" | "i4" => ScalarType::I32,
            "uint32" | "u4" => ScalarType::U32,
            "int64" | "i8" => ScalarType::I64,
            "uint64" | "u8" => ScalarType::U64,
            "float32" | "f4" => ScalarType::F32,
            "float64" | "f8" => ScalarType::F64,
            _ => return None,
        })
    }

    pub fn arrow_type(self) -> DataType {
        match self {
            ScalarType::I8 => DataType::Int8,
            ScalarType::U8 => DataType::UInt8,
            ScalarType::I16 => DataType::Int16,
            ScalarType::U16 => DataType::UInt16,
            ScalarType::I32 => DataType::Int32,
            ScalarType::U32 => DataType::UInt32,
            ScalarType::I64 => DataType::Int64,
            ScalarType::U64 => DataType::UInt64,
            ScalarType::F32 => DataType::Float32,
            ScalarType::F64 => DataType::Float64,
        }
    }
}

/// How a field's bytes are walked when unpacking a single record.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum WireFormat {
    /// `x` / `Nx`: bytes that are skipped on unpack and zero-filled on pack.
    Pad(usize),
    /// A single numeric value.
    Scalar(ScalarType),
    /// `c` / `Ns`: an opaque byte string.
    Bytes(usize),
    /// `NT`: N consecutive numeric values unpacked as a list.
    Repeated { count: usize, elem: ScalarType },
}

impl WireFormat {
    pub fn size(&self) -> usize {
        match self {
            WireFormat::Pad(n) | WireFormat::Bytes(n) => *n,
            WireFormat::Scalar(t) => t.size(),
            WireFormat::Repeated { count, elem } => count.saturating_mul(elem.size()),
        }
    }

    pub fn is_padding(&self) -> bool {
        matches!(self, WireFormat::Pad(_))
    }
}

impl FromStr for WireFormat {
    type Err = LogError;

    fn from_str(code: &str) -> Result<Self> {
        let invalid = |reason: &str| LogError::InvalidFormat {
            code: code.to_string(),
            reason: reason.to_string(),
        };
        let caps = WIRE_CODE_RE.captures(code).ok_or_else(|| {
            invalid("expected an optional count followed by one of xcbBhHiIqQfds")
        })?;
        let count = match caps.get(1) {
            Some(m) => m
                .as_str()
                .parse::<usize>()
                .map_err(|_| invalid("repeat count out of range"))?,
            None => 1,
        };
        if count == 0 {
            return Err(invalid("repeat count must be positive"));
        }
        // The regex guarantees exactly one code character.
        let c = caps[2].chars().next().unwrap_or('x');
        let width = ScalarType::from_wire_char(c).map_or(1, ScalarType::size);
        check_width(count.checked_mul(width)).map_err(invalid)?;
        Ok(match c {
            'x' => WireFormat::Pad(count),
            'c' | 's' => WireFormat::Bytes(count),
            _ => {
                let elem = ScalarType::from_wire_char(c).ok_or_else(|| invalid("unknown code"))?;
                if caps.get(1).is_some() {
                    WireFormat::Repeated { count, elem }
                } else {
                    WireFormat::Scalar(elem)
                }
            }
        })
    }
}

impl fmt::Display for WireFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WireFormat::Pad(1) => write!(f, "x"),
            WireFormat::Pad(n) => write!(f, "{n}x"),
            WireFormat::Scalar(t) => write!(f, "{}", t.wire_char()),
            WireFormat::Bytes(n) => write!(f, "{n}s"),
            WireFormat::Repeated { count, elem } => write!(f, "{count}{}", elem.wire_char()),
        }
    }
}

/// How a field's bytes are viewed in a columnar batch.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum SemanticType {
    Scalar(ScalarType),
    /// Fixed-size byte array (`Nuint8`).
    Bytes(usize),
    /// Multi-dimensional numeric array, outermost dimension first.
    Array { elem: ScalarType, shape: Vec<usize> },
}

impl SemanticType {
    pub fn size(&self) -> usize {
        match self {
            SemanticType::Scalar(t) => t.size(),
            SemanticType::Bytes(n) => *n,
            SemanticType::Array { elem, shape } => shape
                .iter()
                .fold(elem.size(), |size, dim| size.saturating_mul(*dim)),
        }
    }

    /// Arrow data type of the column holding this field.
    pub fn arrow_type(&self) -> DataType {
        match self {
            SemanticType::Scalar(t) => t.arrow_type(),
            SemanticType::Bytes(n) => DataType::FixedSizeBinary(arrow_width(*n)),
            SemanticType::Array { elem, shape } => {
                shape.iter().rev().fold(elem.arrow_type(), |inner, dim| {
                    let item = Arc::new(Field::new("item", inner, false));
                    DataType::FixedSizeList(item, arrow_width(*dim))
                })
            }
        }
    }
}

impl FromStr for SemanticType {
    type Err = LogError;

    fn from_str(code: &str) -> Result<Self> {
        let invalid = |reason: &str| LogError::InvalidFormat {
            code: code.to_string(),
            reason: reason.to_string(),
        };
        let caps = SEMANTIC_CODE_RE
            .captures(code)
            .ok_or_else(|| invalid("expected [N|(a,b,..)]<type name>"))?;
        let elem =
            ScalarType::from_name(&caps[3]).ok_or_else(|| invalid("unknown element type"))?;

        let dims = caps.get(1).or_else(|| caps.get(2));
        let Some(dims) = dims else {
            return Ok(SemanticType::Scalar(elem));
        };
        let shape = dims
            .as_str()
            .split(',')
            .map(|d| d.trim().parse::<usize>())
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|_| invalid("dimension out of range"))?;
        if shape.iter().any(|&d| d == 0) {
            return Err(invalid("dimensions must be positive"));
        }
        let size = shape
            .iter()
            .try_fold(elem.size(), |size, dim| size.checked_mul(*dim));
        check_width(size).map_err(invalid)?;

        if shape.len() == 1 && elem == ScalarType::U8 {
            Ok(SemanticType::Bytes(shape[0]))
        } else {
            Ok(SemanticType::Array { elem, shape })
        }
    }
}

/// Reject a field width that overflowed or exceeds [`MAX_FIELD_SIZE`].
fn check_width(size: Option<usize>) -> std::result::Result<usize, &'static str> {
    match size {
        Some(size) if size <= MAX_FIELD_SIZE => Ok(size),
        _ => Err("field is wider than a record payload"),
    }
}

/// Arrow stores fixed widths as `i32`. Parsed codes never exceed
/// [`MAX_FIELD_SIZE`]; a wider hand-built type saturates and then fails the
/// array length checks instead of wrapping.
fn arrow_width(n: usize) -> i32 {
    i32::try_from(n).unwrap_or(i32::MAX)
}

impl fmt::Display for SemanticType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SemanticType::Scalar(t) => write!(f, "{}", t.name()),
            SemanticType::Bytes(n) => write!(f, "{n}uint8"),
            SemanticType::Array { elem, shape } if shape.len() == 1 => {
                write!(f, "{}{}", shape[0], elem.name())
            }
            SemanticType::Array { elem, shape } => {
                let dims: Vec<String> = shape.iter().map(|d| d.to_string()).collect();
                write!(f, "({}){}", dims.join(","), elem.name())
            }
        }
    }
}
