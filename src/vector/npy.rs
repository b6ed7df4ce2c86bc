//! NumPy `.npy` matrix files for the dense backend.
//!
//! Only the subset the dense backend needs is supported: a two-dimensional,
//! C-ordered, little-endian `f32` (`<f4`) array. Files are written as format
//! version 1.0; versions 2.0 and 3.0 are accepted on read.

use std::io::Write;
use std::path::Path;

use crate::vector::storage::{BYTES_PER_F32, read_f32s, write_atomic, write_f32s};
use crate::vector::{VectorError, VectorResult};

const NPY_MAGIC: &[u8; 6] = b"\x93NUMPY";

/// Header blocks are padded so the data starts on this alignment.
const HEADER_ALIGN: usize = 64;

/// Writes a row-major `rows x cols` matrix.
pub fn write_npy(path: &Path, rows: usize, cols: usize, data: &[f32]) -> VectorResult<()> {
    debug_assert_eq!(data.len(), rows * cols);

    let dict = format!("{{'descr': '<f4', 'fortran_order': False, 'shape': ({rows}, {cols}), }}");
    // magic(6) + version(2) + header_len(2) + dict + padding + '\n'
    let unpadded = NPY_MAGIC.len() + 2 + 2 + dict.len() + 1;
    let padding = (HEADER_ALIGN - unpadded % HEADER_ALIGN) % HEADER_ALIGN;
    let header = format!("{dict}{}\n", " ".repeat(padding));
    let header_len = u16::try_from(header.len())
        .map_err(|_| VectorError::Serialization("npy header too long".to_string()))?;

    write_atomic(path, |writer| {
        writer.write_all(NPY_MAGIC)?;
        writer.write_all(&[1, 0])?;
        writer.write_all(&header_len.to_le_bytes())?;
        writer.write_all(header.as_bytes())?;
        write_f32s(writer, data)
    })
}

/// Reads a matrix written by [`write_npy`] (or by `numpy.save`).
///
/// Returns `(rows, cols, data)`.
pub fn read_npy(path: &Path) -> VectorResult<(usize, usize, Vec<f32>)> {
    if !path.exists() {
        return Err(VectorError::MissingArtifact {
            path: path.to_path_buf(),
        });
    }

    let bytes = std::fs::read(path)?;
    let corrupt = |reason: String| VectorError::CorruptArtifact {
        path: path.to_path_buf(),
        reason,
    };

    if bytes.len() < 10 || &bytes[0..6] != NPY_MAGIC {
        return Err(corrupt("Not an npy file".to_string()));
    }

    let major = bytes[6];
    let (header_len, header_start) = match major {
        1 => (u16::from_le_bytes([bytes[8], bytes[9]]) as usize, 10),
        2 | 3 => {
            if bytes.len() < 12 {
                return Err(corrupt("Truncated npy header".to_string()));
            }
            (
                u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]) as usize,
                12,
            )
        }
        other => return Err(corrupt(format!("Unsupported npy version {other}"))),
    };

    let data_start = header_start + header_len;
    if bytes.len() < data_start {
        return Err(corrupt("Truncated npy header".to_string()));
    }
    let header = std::str::from_utf8(&bytes[header_start..data_start])
        .map_err(|_| corrupt("npy header is not valid text".to_string()))?;

    let descr = dict_value(header, "descr").ok_or_else(|| corrupt("Missing descr".to_string()))?;
    if descr.trim_matches(|c| c == '\'' || c == '"') != "<f4" {
        return Err(corrupt(format!("Unsupported dtype {descr}, expected <f4")));
    }

    let fortran = dict_value(header, "fortran_order")
        .ok_or_else(|| corrupt("Missing fortran_order".to_string()))?;
    if fortran != "False" {
        return Err(corrupt("Fortran-ordered arrays are not supported".to_string()));
    }

    let shape = parse_shape(header).ok_or_else(|| corrupt("Malformed shape".to_string()))?;
    let (rows, cols) = match shape.as_slice() {
        [rows, cols] => (*rows, *cols),
        _ => {
            return Err(corrupt(format!(
                "Expected a 2-D matrix, found shape {shape:?}"
            )));
        }
    };

    let expected = rows
        .checked_mul(cols)
        .and_then(|n| n.checked_mul(BYTES_PER_F32))
        .ok_or_else(|| corrupt("Shape overflows".to_string()))?;
    let payload = &bytes[data_start..];
    if payload.len() != expected {
        return Err(corrupt(format!(
            "Expected {expected} data bytes for shape ({rows}, {cols}), found {}",
            payload.len()
        )));
    }

    Ok((rows, cols, read_f32s(payload)))
}

/// Raw text of a scalar entry in the header dict, e.g. `'<f4'` or `False`.
fn dict_value<'a>(header: &'a str, key: &str) -> Option<&'a str> {
    let needle = format!("'{key}':");
    let start = header.find(&needle)? + needle.len();
    let rest = header[start..].trim_start();
    let end = rest.find([',', '}'])?;
    Some(rest[..end].trim())
}

fn parse_shape(header: &str) -> Option<Vec<usize>> {
    let start = header.find("'shape':")?;
    let rest = &header[start..];
    let open = rest.find('(')?;
    let close = rest.find(')')?;
    if close < open {
        return None;
    }
    rest[open + 1..close]
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| part.parse::<usize>().ok())
        .collect()
}
