//! Element types and their persisted tags

use std::fmt;
use std::str::FromStr;

use bytes::{Buf, BufMut};
use serde::{Deserialize, Serialize};

use crate::error::MatrixError;

/// Element type tag recorded in matrix headers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dtype {
    /// 32-bit IEEE float
    #[serde(alias = "<class 'numpy.float32'>")]
    Float32,
    /// 64-bit IEEE float
    #[serde(alias = "<class 'numpy.float64'>")]
    Float64,
    /// 32-bit signed integer
    #[serde(alias = "<class 'numpy.int32'>")]
    Int32,
    /// 64-bit signed integer
    #[serde(alias = "<class 'numpy.int64'>")]
    Int64,
}

impl Dtype {
    /// Lowercase tag, as written to headers
    pub fn name(self) -> &'static str {
        match self {
            Dtype::Float32 => "float32",
            Dtype::Float64 => "float64",
            Dtype::Int32 => "int32",
            Dtype::Int64 => "int64",
        }
    }

    /// NumPy array-protocol descriptor (little-endian)
    pub fn descr(self) -> &'static str {
        match self {
            Dtype::Float32 => "<f4",
            Dtype::Float64 => "<f8",
            Dtype::Int32 => "<i4",
            Dtype::Int64 => "<i8",
        }
    }

    /// Bytes per element
    pub fn size(self) -> usize {
        match self {
            Dtype::Float32 | Dtype::Int32 => 4,
            Dtype::Float64 | Dtype::Int64 => 8,
        }
    }

    /// Dtype for a NumPy descriptor; `=` and `<` are both little-endian here
    pub fn from_descr(descr: &str) -> Option<Self> {
        let body = descr.strip_prefix(&['<', '='][..]).unwrap_or(descr);
        match body {
            "f4" => Some(Dtype::Float32),
            "f8" => Some(Dtype::Float64),
            "i4" => Some(Dtype::Int32),
            "i8" => Some(Dtype::Int64),
            _ => None,
        }
    }
}

impl fmt::Display for Dtype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Dtype {
    type Err = MatrixError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "float32" | "f32" => Ok(Dtype::Float32),
            "float64" | "f64" => Ok(Dtype::Float64),
            "int32" | "i32" => Ok(Dtype::Int32),
            "int64" | "i64" => Ok(Dtype::Int64),
            other => Err(MatrixError::Config(format!("unknown dtype: {other}"))),
        }
    }
}

/// Rust element type storable in a matrix
pub trait Element: Copy + PartialEq + fmt::Debug + Send + Sync + 'static {
    /// Persisted tag
    const DTYPE: Dtype;

    /// Additive identity, used to allocate dense output
    const ZERO: Self;

    /// Append the little-endian encoding
    fn put_le<B: BufMut>(self, buf: &mut B);

    /// Consume one little-endian element
    fn get_le<B: Buf>(buf: &mut B) -> Self;
}

macro_rules! impl_element {
    ($ty:ty, $dtype:ident, $zero:expr, $put:ident, $get:ident) => {
        impl Element for $ty {
            const DTYPE: Dtype = Dtype::$dtype;
            const ZERO: Self = $zero;

            fn put_le<B: BufMut>(self, buf: &mut B) {
                buf.$put(self);
            }

            fn get_le<B: Buf>(buf: &mut B) -> Self {
                buf.$get()
            }
        }
    };
}

impl_element!(f32, Float32, 0.0, put_f32_le, get_f32_le);
impl_element!(f64, Float64, 0.0, put_f64_le, get_f64_le);
impl_element!(i32, Int32, 0, put_i32_le, get_i32_le);
impl_element!(i64, Int64, 0, put_i64_le, get_i64_le);
