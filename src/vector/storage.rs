//! On-disk vector store formats and atomic artifact writes.
//!
//! An index at base path `<path>` owns up to three files:
//!
//! | File          | Written by        | Contents                         |
//! |---------------|-------------------|----------------------------------|
//! | `<path>`      | native backend    | flat binary matrix (this module) |
//! | `<path>.npy`  | dense backend     | NumPy v1.0 matrix (`npy` module) |
//! | `<path>.meta` | every save        | JSON item list and index facts   |
//!
//! # Native format
//!
//! - Header (16 bytes): magic `KMVX`, version, dimension, row count (all u32 LE)
//! - Rows: `count * dimension` contiguous f32 values in little-endian order
//!
//! Rows carry no ids: row `i` belongs to metadata item `i`.
//!
//! Every write lands in a temp file in the destination directory and is then
//! renamed over the target, so a failed save never leaves a half-written
//! artifact in place of a good one.

use std::ffi::OsString;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use memmap2::MmapOptions;
use tempfile::NamedTempFile;

use crate::vector::{VectorDimension, VectorError, VectorResult};

/// Current native storage format version.
const STORAGE_VERSION: u32 = 1;

/// Size of the storage header in bytes.
const HEADER_SIZE: usize = 16;

/// Magic bytes to identify native vector files.
const MAGIC_BYTES: &[u8; 4] = b"KMVX";

/// Number of bytes per f32 value.
pub(crate) const BYTES_PER_F32: usize = 4;

/// Paths of every artifact belonging to one index base path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPaths {
    /// Native vector store (`<path>`)
    pub native: PathBuf,
    /// Dense matrix store (`<path>.npy`)
    pub dense: PathBuf,
    /// Item metadata (`<path>.meta`)
    pub meta: PathBuf,
}

impl ArtifactPaths {
    #[must_use]
    pub fn new(base: &Path) -> Self {
        Self {
            native: base.to_path_buf(),
            dense: with_suffix(base, ".npy"),
            meta: with_suffix(base, ".meta"),
        }
    }
}

/// Appends `suffix` to the final path component (`index.bin` -> `index.bin.meta`).
fn with_suffix(base: &Path, suffix: &str) -> PathBuf {
    let mut name: OsString = base.as_os_str().to_owned();
    name.push(suffix);
    PathBuf::from(name)
}

/// Writes `path` through a temp file in the same directory plus a rename.
///
/// Creates the destination directory if it does not exist.
pub fn write_atomic<F>(path: &Path, write: F) -> VectorResult<()>
where
    F: FnOnce(&mut dyn Write) -> io::Result<()>,
{
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;

    let mut tmp = NamedTempFile::new_in(dir)?;
    {
        let mut writer = BufWriter::new(tmp.as_file_mut());
        write(&mut writer)?;
        writer.flush()?;
    }
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| VectorError::Storage(e.error))?;
    Ok(())
}

/// Removes `path` if present; a missing file is not an error.
pub fn remove_if_exists(path: &Path) -> VectorResult<()> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

/// Writes little-endian f32 values.
pub(crate) fn write_f32s(writer: &mut dyn Write, values: &[f32]) -> io::Result<()> {
    for &value in values {
        writer.write_all(&value.to_le_bytes())?;
    }
    Ok(())
}

/// Decodes little-endian f32 values; `bytes.len()` must be a multiple of 4.
pub(crate) fn read_f32s(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(BYTES_PER_F32)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

/// Writes a row-major matrix in the native format.
pub fn write_native(
    path: &Path,
    dimension: VectorDimension,
    rows: usize,
    data: &[f32],
) -> VectorResult<()> {
    debug_assert_eq!(data.len(), rows * dimension.get());
    let dim = u32::try_from(dimension.get()).map_err(|_| VectorError::InvalidDimension {
        dimension: dimension.get(),
        reason: "Vector dimension must fit in 32 bits",
    })?;
    let count = u32::try_from(rows).map_err(|_| {
        VectorError::Serialization(format!("Too many rows for native format: {rows}"))
    })?;

    write_atomic(path, |writer| {
        writer.write_all(MAGIC_BYTES)?;
        writer.write_all(&STORAGE_VERSION.to_le_bytes())?;
        writer.write_all(&dim.to_le_bytes())?;
        writer.write_all(&count.to_le_bytes())?;
        write_f32s(writer, data)
    })
}

/// Reads a native-format matrix, returning its dimension, row count and data.
pub fn read_native(path: &Path) -> VectorResult<(VectorDimension, usize, Vec<f32>)> {
    if !path.exists() {
        return Err(VectorError::MissingArtifact {
            path: path.to_path_buf(),
        });
    }

    let corrupt = |reason: String| VectorError::CorruptArtifact {
        path: path.to_path_buf(),
        reason,
    };

    let file = File::open(path)?;
    let file_len = file.metadata()?.len() as usize;
    if file_len < HEADER_SIZE {
        return Err(corrupt("File too small to contain header".to_string()));
    }

    let mmap = unsafe { MmapOptions::new().map(&file)? };

    if &mmap[0..4] != MAGIC_BYTES {
        return Err(corrupt("Invalid magic bytes".to_string()));
    }

    let version = u32::from_le_bytes([mmap[4], mmap[5], mmap[6], mmap[7]]);
    if version != STORAGE_VERSION {
        return Err(VectorError::VersionMismatch {
            expected: STORAGE_VERSION,
            actual: version,
        });
    }

    let dim_value = u32::from_le_bytes([mmap[8], mmap[9], mmap[10], mmap[11]]) as usize;
    let dimension =
        VectorDimension::new(dim_value).map_err(|e| corrupt(format!("Bad dimension: {e}")))?;
    let rows = u32::from_le_bytes([mmap[12], mmap[13], mmap[14], mmap[15]]) as usize;

    let expected_len = rows
        .checked_mul(dimension.get())
        .and_then(|n| n.checked_mul(BYTES_PER_F32))
        .and_then(|n| n.checked_add(HEADER_SIZE))
        .ok_or_else(|| corrupt("Header sizes overflow".to_string()))?;
    if mmap.len() != expected_len {
        return Err(corrupt(format!(
            "Expected {expected_len} bytes for {rows} rows, found {}",
            mmap.len()
        )));
    }

    let data = read_f32s(&mmap[HEADER_SIZE..]);
    Ok((dimension, rows, data))
}
