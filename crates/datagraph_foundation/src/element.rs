//! The closed set of element types stored in arrays and lists.
//!
//! [`ElementType`] is the runtime tag, [`Element`] the compile-time side.
//! [`for_each_element!`](crate::for_each_element) expands a callback macro
//! once with the full type list; downstream crates generate their
//! type-erased enums from it.

// Element conversions through f64 intentionally lose precision for 64-bit ints
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_lossless)]

use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Invokes `$callback!` with the full `Variant => type` list of element types.
///
/// ```
/// macro_rules! count {
///     ($($variant:ident => $ty:ty),* $(,)?) => { [$(stringify!($variant)),*].len() };
/// }
/// assert_eq!(datagraph_foundation::for_each_element!(count), 11);
/// ```
#[macro_export]
macro_rules! for_each_element {
    ($callback:ident) => {
        $callback! {
            Int8 => i8,
            Int16 => i16,
            Int32 => i32,
            Int64 => i64,
            UInt8 => u8,
            UInt16 => u16,
            UInt32 => u32,
            UInt64 => u64,
            Float32 => f32,
            Float64 => f64,
            Bool => bool,
        }
    };
}

/// Runtime tag of an element type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ElementType {
    /// Signed 8-bit integer.
    Int8,
    /// Signed 16-bit integer.
    Int16,
    /// Signed 32-bit integer.
    Int32,
    /// Signed 64-bit integer.
    Int64,
    /// Unsigned 8-bit integer.
    UInt8,
    /// Unsigned 16-bit integer.
    UInt16,
    /// Unsigned 32-bit integer.
    UInt32,
    /// Unsigned 64-bit integer.
    UInt64,
    /// 32-bit float.
    Float32,
    /// 64-bit float.
    Float64,
    /// Boolean, stored as one byte.
    Bool,
}

impl ElementType {
    /// Every element type, in declaration order.
    pub const ALL: [Self; 11] = [
        Self::Int8,
        Self::Int16,
        Self::Int32,
        Self::Int64,
        Self::UInt8,
        Self::UInt16,
        Self::UInt32,
        Self::UInt64,
        Self::Float32,
        Self::Float64,
        Self::Bool,
    ];

    /// Returns the canonical name used in type tags, e.g. `"float32"`.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Int8 => "int8",
            Self::Int16 => "int16",
            Self::Int32 => "int32",
            Self::Int64 => "int64",
            Self::UInt8 => "uint8",
            Self::UInt16 => "uint16",
            Self::UInt32 => "uint32",
            Self::UInt64 => "uint64",
            Self::Float32 => "float32",
            Self::Float64 => "float64",
            Self::Bool => "bool",
        }
    }

    /// Parses a canonical name.
    ///
    /// Also accepts the C-style aliases found in older files
    /// (`int32_t`, `float`, `double`, ...).
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        let ty = match name {
            "int8" | "int8_t" => Self::Int8,
            "int16" | "int16_t" => Self::Int16,
            "int32" | "int32_t" => Self::Int32,
            "int64" | "int64_t" => Self::Int64,
            "uint8" | "uint8_t" => Self::UInt8,
            "uint16" | "uint16_t" => Self::UInt16,
            "uint32" | "uint32_t" => Self::UInt32,
            "uint64" | "uint64_t" => Self::UInt64,
            "float32" | "float" => Self::Float32,
            "float64" | "double" => Self::Float64,
            "bool" => Self::Bool,
            _ => return None,
        };
        Some(ty)
    }

    /// Size of one element in bytes.
    #[must_use]
    pub const fn size(self) -> usize {
        match self {
            Self::Int8 | Self::UInt8 | Self::Bool => 1,
            Self::Int16 | Self::UInt16 => 2,
            Self::Int32 | Self::UInt32 | Self::Float32 => 4,
            Self::Int64 | Self::UInt64 | Self::Float64 => 8,
        }
    }

    /// Returns true for the floating point types.
    #[must_use]
    pub const fn is_float(self) -> bool {
        matches!(self, Self::Float32 | Self::Float64)
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A value that can live in a typed store.
///
/// Encoding is always little-endian. Equality for round-trip checks is
/// bit-exact, so `NaN` payloads and signed zeros are preserved.
pub trait Element: Copy + Default + PartialEq + fmt::Debug + Send + Sync + 'static {
    /// The runtime tag of this type.
    const TYPE: ElementType;

    /// Appends the little-endian encoding of `values` to `out`.
    fn encode(values: &[Self], out: &mut Vec<u8>);

    /// Decodes one element from exactly `TYPE.size()` bytes.
    fn decode_one(bytes: &[u8]) -> Self;

    /// Bit-exact equality.
    fn bits_eq(self, other: Self) -> bool;

    /// Lossy conversion to `f64`.
    fn to_f64(self) -> f64;

    /// Lossy, saturating conversion from `f64`.
    fn from_f64(value: f64) -> Self;

    /// Decodes a packed little-endian buffer.
    ///
    /// # Errors
    ///
    /// Returns an error if the buffer length is not a multiple of the
    /// element size.
    fn decode(bytes: &[u8]) -> Result<Vec<Self>> {
        let size = Self::TYPE.size();
        if bytes.len() % size != 0 {
            return Err(Error::invalid_format(format!(
                "{} payload of {} bytes is not a multiple of {size}",
                Self::TYPE,
                bytes.len()
            )));
        }
        Ok(bytes.chunks_exact(size).map(Self::decode_one).collect())
    }
}

macro_rules! impl_int_element {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl Element for $ty {
                const TYPE: ElementType = ElementType::$variant;

                fn encode(values: &[Self], out: &mut Vec<u8>) {
                    out.reserve(values.len() * std::mem::size_of::<$ty>());
                    for v in values {
                        out.extend_from_slice(&v.to_le_bytes());
                    }
                }

                fn decode_one(bytes: &[u8]) -> Self {
                    let mut buf = [0u8; std::mem::size_of::<$ty>()];
                    buf.copy_from_slice(bytes);
                    <$ty>::from_le_bytes(buf)
                }

                fn bits_eq(self, other: Self) -> bool {
                    self == other
                }

                fn to_f64(self) -> f64 {
                    self as f64
                }

                fn from_f64(value: f64) -> Self {
                    value as $ty
                }
            }
        )*
    };
}

macro_rules! impl_float_element {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl Element for $ty {
                const TYPE: ElementType = ElementType::$variant;

                fn encode(values: &[Self], out: &mut Vec<u8>) {
                    out.reserve(values.len() * std::mem::size_of::<$ty>());
                    for v in values {
                        out.extend_from_slice(&v.to_le_bytes());
                    }
                }

                fn decode_one(bytes: &[u8]) -> Self {
                    let mut buf = [0u8; std::mem::size_of::<$ty>()];
                    buf.copy_from_slice(bytes);
                    <$ty>::from_le_bytes(buf)
                }

                fn bits_eq(self, other: Self) -> bool {
                    self.to_bits() == other.to_bits()
                }

                fn to_f64(self) -> f64 {
                    self as f64
                }

                fn from_f64(value: f64) -> Self {
                    value as $ty
                }
            }
        )*
    };
}

impl_int_element! {
    i8 => Int8,
    i16 => Int16,
    i32 => Int32,
    i64 => Int64,
    u8 => UInt8,
    u16 => UInt16,
    u32 => UInt32,
    u64 => UInt64,
}

impl_float_element! {
    f32 => Float32,
    f64 => Float64,
}

impl Element for bool {
    const TYPE: ElementType = ElementType::Bool;

    fn encode(values: &[Self], out: &mut Vec<u8>) {
        out.extend(values.iter().map(|&b| u8::from(b)));
    }

    fn decode_one(bytes: &[u8]) -> Self {
        bytes[0] != 0
    }

    fn bits_eq(self, other: Self) -> bool {
        self == other
    }

    fn to_f64(self) -> f64 {
        f64::from(u8::from(self))
    }

    fn from_f64(value: f64) -> Self {
        value != 0.0
    }
}

/// Bit-exact comparison of two slices.
#[must_use]
pub fn slices_bits_eq<T: Element>(a: &[T], b: &[T]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.bits_eq(*y))
}
