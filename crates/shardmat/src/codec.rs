//! Shard payload codec
//!
//! Shards are stored in the NumPy `.npy` format, so objects written here
//! load directly with `numpy.load` and vice versa:
//!
//! ```text
//! ┌──────────────┬─────────┬────────────┬──────────────────────────┬──────────────┐
//! │ \x93NUMPY    │ 1 0     │ header len │ {'descr': '<f8',         │ element data │
//! │ (6 bytes)    │ version │ (u16 LE)   │  'fortran_order': False, │ little-endian│
//! │              │         │            │  'shape': (2, 3), } ...\n│ C order      │
//! └──────────────┴─────────┴────────────┴──────────────────────────┴──────────────┘
//! ```
//!
//! The preamble plus header is padded with spaces to a multiple of 64
//! bytes. Writes always use version 1.0 and C order; reads also accept
//! version 2.0/3.0 preambles and Fortran-ordered data.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use ndarray::{ArrayD, ArrayViewD, IxDyn};

use crate::dtype::{Dtype, Element};
use crate::error::{MatrixError, MatrixResult};

/// Magic string opening every `.npy` payload
const NPY_MAGIC: &[u8; 6] = b"\x93NUMPY";

/// Preamble and header are padded to this alignment
const NPY_ALIGN: usize = 64;

/// Serialize a block, in whatever memory layout, as C-ordered `.npy`
pub fn encode<T: Element>(block: &ArrayViewD<'_, T>) -> Bytes {
    let header = npy_header(T::DTYPE, block.shape());
    let mut buf = BytesMut::with_capacity(header.len() + block.len() * T::DTYPE.size());
    buf.put_slice(&header);
    for &value in block.iter() {
        value.put_le(&mut buf);
    }
    buf.freeze()
}

/// Parse a `.npy` payload into an array of `T`
pub fn decode<T: Element>(data: &[u8]) -> MatrixResult<ArrayD<T>> {
    if data.len() < NPY_MAGIC.len() + 4 || &data[..NPY_MAGIC.len()] != NPY_MAGIC {
        return Err(MatrixError::Codec("missing .npy magic".to_string()));
    }

    let mut buf = &data[NPY_MAGIC.len()..];
    let major = buf.get_u8();
    let _minor = buf.get_u8();
    let header_len = match major {
        1 => usize::from(buf.get_u16_le()),
        2 | 3 if buf.remaining() >= 4 => buf.get_u32_le() as usize,
        _ => {
            return Err(MatrixError::Codec(format!(
                "unsupported .npy version {major}"
            )))
        }
    };

    if buf.remaining() < header_len {
        return Err(MatrixError::Codec("truncated .npy header".to_string()));
    }
    let header = std::str::from_utf8(&buf[..header_len])
        .map_err(|_| MatrixError::Codec(".npy header is not UTF-8".to_string()))?;
    let meta = NpyMeta::parse(header)?;
    buf.advance(header_len);

    let dtype = Dtype::from_descr(&meta.descr)
        .ok_or_else(|| MatrixError::Codec(format!("unsupported descr {}", meta.descr)))?;
    if dtype != T::DTYPE {
        return Err(MatrixError::InvalidDtype {
            expected: T::DTYPE,
            actual: dtype,
        });
    }

    let too_large = || MatrixError::Codec(format!("shape {:?} overflows usize", meta.shape));
    let count = meta
        .shape
        .iter()
        .try_fold(1usize, |acc, &dim| acc.checked_mul(dim))
        .ok_or_else(too_large)?;
    let expected_bytes = count.checked_mul(dtype.size()).ok_or_else(too_large)?;
    if buf.remaining() != expected_bytes {
        return Err(MatrixError::Codec(format!(
            "expected {expected_bytes} data bytes for shape {:?}, found {}",
            meta.shape,
            buf.remaining()
        )));
    }

    let values: Vec<T> = (0..count).map(|_| T::get_le(&mut buf)).collect();

    if meta.fortran_order {
        let reversed: Vec<usize> = meta.shape.iter().rev().copied().collect();
        let array = ArrayD::from_shape_vec(IxDyn(&reversed), values)
            .map_err(|e| MatrixError::Codec(e.to_string()))?;
        Ok(array.reversed_axes())
    } else {
        ArrayD::from_shape_vec(IxDyn(&meta.shape), values)
            .map_err(|e| MatrixError::Codec(e.to_string()))
    }
}

fn npy_header(dtype: Dtype, shape: &[usize]) -> Vec<u8> {
    let shape_text = match shape {
        [] => "()".to_string(),
        [n] => format!("({n},)"),
        dims => format!(
            "({})",
            dims.iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", ")
        ),
    };
    let mut dict = format!(
        "{{'descr': '{}', 'fortran_order': False, 'shape': {}, }}",
        dtype.descr(),
        shape_text
    );

    let unpadded = NPY_MAGIC.len() + 2 + 2 + dict.len() + 1;
    let padding = (NPY_ALIGN - unpadded % NPY_ALIGN) % NPY_ALIGN;
    dict.push_str(&" ".repeat(padding));
    dict.push('\n');

    let mut out = Vec::with_capacity(NPY_MAGIC.len() + 4 + dict.len());
    out.extend_from_slice(NPY_MAGIC);
    out.extend_from_slice(&[1, 0]);
    // The dict is a few dozen bytes plus padding; it always fits a u16.
    out.extend_from_slice(&(dict.len() as u16).to_le_bytes());
    out.extend_from_slice(dict.as_bytes());
    out
}

/// Fields of the header dict
#[derive(Debug, PartialEq, Eq)]
struct NpyMeta {
    descr: String,
    fortran_order: bool,
    shape: Vec<usize>,
}

impl NpyMeta {
    fn parse(header: &str) -> MatrixResult<Self> {
        let descr = {
            let value = value_after(header, "descr")?;
            let quote = value
                .chars()
                .next()
                .filter(|c| *c == '\'' || *c == '"')
                .ok_or_else(|| malformed("descr"))?;
            let rest = &value[1..];
            let end = rest.find(quote).ok_or_else(|| malformed("descr"))?;
            rest[..end].to_string()
        };

        let fortran_order = {
            let value = value_after(header, "fortran_order")?;
            if value.starts_with("True") {
                true
            } else if value.starts_with("False") {
                false
            } else {
                return Err(malformed("fortran_order"));
            }
        };

        let shape = {
            let value = value_after(header, "shape")?;
            let inner = value.strip_prefix('(').ok_or_else(|| malformed("shape"))?;
            let end = inner.find(')').ok_or_else(|| malformed("shape"))?;
            inner[..end]
                .split(',')
                .map(str::trim)
                .filter(|dim| !dim.is_empty())
                .map(|dim| {
                    dim.trim_end_matches('L')
                        .parse::<usize>()
                        .map_err(|_| malformed("shape"))
                })
                .collect::<MatrixResult<Vec<usize>>>()?
        };

        Ok(Self {
            descr,
            fortran_order,
            shape,
        })
    }
}

/// Text following `'field':` in the header dict
fn value_after<'a>(header: &'a str, field: &str) -> MatrixResult<&'a str> {
    let single = format!("'{field}'");
    let double = format!("\"{field}\"");
    let (pos, len) = header
        .find(&single)
        .map(|pos| (pos, single.len()))
        .or_else(|| header.find(&double).map(|pos| (pos, double.len())))
        .ok_or_else(|| MatrixError::Codec(format!(".npy header lacks {field}")))?;

    let rest = header[pos + len..].trim_start();
    let rest = rest.strip_prefix(':').ok_or_else(|| malformed(field))?;
    Ok(rest.trim_start())
}

fn malformed(field: &str) -> MatrixError {
    MatrixError::Codec(format!("malformed .npy header field {field}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{arr1, arr2, Array};

    #[test]
    fn test_header_matches_numpy() {
        // Same preamble numpy.save writes for np.zeros((2, 3)).
        let header = npy_header(Dtype::Float64, &[2, 3]);
        assert_eq!(header.len(), 128);
        assert_eq!(&header[..8], b"\x93NUMPY\x01\x00");
        assert_eq!(u16::from_le_bytes([header[8], header[9]]), 118);

        let text = std::str::from_utf8(&header[10..]).unwrap();
        assert!(text.starts_with("{'descr': '<f8', 'fortran_order': False, 'shape': (2, 3), }"));
        assert!(text.ends_with(" \n"));
    }

    #[test]
    fn test_shape_text() {
        let one_d = npy_header(Dtype::Int32, &[5]);
        assert!(std::str::from_utf8(&one_d).unwrap().contains("'shape': (5,)"));
        assert_eq!(one_d.len() % NPY_ALIGN, 0);
    }

    #[test]
    fn test_encode_decode() {
        let block = arr2(&[[1.0f64, 2.0, 3.0], [4.0, 5.0, 6.0]]).into_dyn();
        let bytes = encode(&block.view());
        assert_eq!(bytes.len(), 128 + 6 * 8);

        let decoded: ArrayD<f64> = decode(&bytes).unwrap();
        assert_eq!(decoded, block);
    }

    #[test]
    fn test_encode_transposed_view_is_c_order() {
        let block = arr2(&[[1i64, 2], [3, 4]]).into_dyn();
        let transposed = block.view().reversed_axes();
        let decoded: ArrayD<i64> = decode(&encode(&transposed)).unwrap();
        assert_eq!(decoded, arr2(&[[1i64, 3], [2, 4]]).into_dyn());
    }

    #[test]
    fn test_decode_fortran_order() {
        let mut payload = b"\x93NUMPY\x01\x00".to_vec();
        let mut dict = "{'descr': '<i4', 'fortran_order': True, 'shape': (2, 2), }".to_string();
        let padding = (NPY_ALIGN - (10 + dict.len() + 1) % NPY_ALIGN) % NPY_ALIGN;
        dict.push_str(&" ".repeat(padding));
        dict.push('\n');
        payload.extend_from_slice(&(dict.len() as u16).to_le_bytes());
        payload.extend_from_slice(dict.as_bytes());
        for v in [1i32, 3, 2, 4] {
            payload.extend_from_slice(&v.to_le_bytes());
        }

        let decoded: ArrayD<i32> = decode(&payload).unwrap();
        assert_eq!(decoded, arr2(&[[1i32, 2], [3, 4]]).into_dyn());
    }

    #[test]
    fn test_decode_dtype_mismatch() {
        let bytes = encode(&arr1(&[1.0f32, 2.0]).into_dyn().view());
        assert!(matches!(
            decode::<f64>(&bytes),
            Err(MatrixError::InvalidDtype {
                expected: Dtype::Float64,
                actual: Dtype::Float32
            })
        ));
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(matches!(decode::<f64>(b"nope"), Err(MatrixError::Codec(_))));

        let mut bytes = encode(&Array::from_elem(IxDyn(&[2, 2]), 1.0f64).view()).to_vec();
        bytes.truncate(bytes.len() - 1);
        assert!(matches!(decode::<f64>(&bytes), Err(MatrixError::Codec(_))));
    }

    #[test]
    fn test_decode_rejects_overflowing_shape() {
        let mut payload = b"\x93NUMPY\x01\x00".to_vec();
        let mut dict = format!(
            "{{'descr': '<f8', 'fortran_order': False, 'shape': ({}, {}), }}",
            usize::MAX,
            4
        );
        let padding = (NPY_ALIGN - (10 + dict.len() + 1) % NPY_ALIGN) % NPY_ALIGN;
        dict.push_str(&" ".repeat(padding));
        dict.push('\n');
        payload.extend_from_slice(&(dict.len() as u16).to_le_bytes());
        payload.extend_from_slice(dict.as_bytes());

        assert!(matches!(decode::<f64>(&payload), Err(MatrixError::Codec(_))));

        let mut huge = b"\x93NUMPY\x01\x00".to_vec();
        let mut dict = format!(
            "{{'descr': '<f8', 'fortran_order': False, 'shape': ({},), }}",
            usize::MAX / 2
        );
        let padding = (NPY_ALIGN - (10 + dict.len() + 1) % NPY_ALIGN) % NPY_ALIGN;
        dict.push_str(&" ".repeat(padding));
        dict.push('\n');
        huge.extend_from_slice(&(dict.len() as u16).to_le_bytes());
        huge.extend_from_slice(dict.as_bytes());

        assert!(matches!(decode::<f64>(&huge), Err(MatrixError::Codec(_))));
    }

    #[test]
    fn test_parse_meta() {
        let meta = NpyMeta::parse("{'descr': '<f8', 'fortran_order': False, 'shape': (3L, 1L), }").unwrap();
        assert_eq!(
            meta,
            NpyMeta {
                descr: "<f8".to_string(),
                fortran_order: false,
                shape: vec![3, 1],
            }
        );
        let scalar = NpyMeta::parse("{'descr': '<f8', 'fortran_order': False, 'shape': (), }").unwrap();
        assert!(scalar.shape.is_empty());
    }
}
