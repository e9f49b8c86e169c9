use super::schema::ColumnSpec;
use crate::core::Tensor;
use crate::error::StorageError;
use memmap2::MmapMut;
use std::fs::{File, OpenOptions};
use std::ops::Range;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Memory-mapped, fixed-stride storage for one output column.
///
/// Row `i` occupies bytes `[i * stride, (i + 1) * stride)`. A freshly
/// created or grown region reads as zero, which is the pending state.
pub(crate) struct ColumnFile {
    spec: ColumnSpec,
    path: PathBuf,
    file: File,
    map: Option<MmapMut>,
    rows: u64,
}

impl ColumnFile {
    pub fn path_for(root: &Path, name: &str) -> PathBuf {
        root.join(format!("{}.bin", name))
    }

    pub fn create(path: PathBuf, spec: ColumnSpec, rows: u64) -> Result<Self, StorageError> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(&path)?;
        file.set_len(rows * spec.row_bytes() as u64)?;

        let mut column = Self {
            spec,
            path,
            file,
            map: None,
            rows,
        };
        column.remap()?;
        Ok(column)
    }

    pub fn open(path: PathBuf, spec: ColumnSpec, rows: u64) -> Result<Self, StorageError> {
        let file = match OpenOptions::new().read(true).write(true).open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StorageError::NotFound(path));
            }
            Err(e) => return Err(e.into()),
        };

        let stride = spec.row_bytes() as u64;
        let expected = rows * stride;
        let actual = file.metadata()?.len();
        if actual < expected && stride > 0 && actual % stride == 0 {
            // Records were appended but the column never grew: the new rows are pending
            warn!(
                path = %path.display(),
                rows_on_disk = actual / stride,
                rows,
                "extending short column with zeroed rows"
            );
            file.set_len(expected)?;
        } else if actual != expected {
            return Err(StorageError::Corrupt {
                path,
                expected,
                actual,
            });
        }

        let mut column = Self {
            spec,
            path,
            file,
            map: None,
            rows,
        };
        column.remap()?;
        Ok(column)
    }

    pub fn spec(&self) -> &ColumnSpec {
        &self.spec
    }

    fn byte_len(&self) -> u64 {
        self.rows * self.spec.row_bytes() as u64
    }

    fn remap(&mut self) -> Result<(), StorageError> {
        self.map = if self.byte_len() == 0 {
            None
        } else {
            // The file length only changes in `grow`, which unmaps first.
            Some(unsafe { MmapMut::map_mut(&self.file)? })
        };
        Ok(())
    }

    /// Extends the column by `additional` zeroed rows.
    pub fn grow(&mut self, additional: u64) -> Result<(), StorageError> {
        self.flush()?;
        self.map = None;
        self.rows += additional;
        self.file.set_len(self.byte_len())?;
        self.remap()
    }

    fn row_range(&self, index: u64) -> Range<usize> {
        let stride = self.spec.row_bytes();
        let start = index as usize * stride;
        start..start + stride
    }

    /// Raw little-endian bytes of one row. Callers bound-check `index`.
    pub fn row(&self, index: u64) -> &[u8] {
        let range = self.row_range(index);
        match &self.map {
            Some(map) => &map[range],
            None => &[],
        }
    }

    pub fn read(&self, index: u64) -> Result<Tensor, StorageError> {
        Tensor::from_le_bytes(self.spec.kind, &self.spec.shape, self.row(index)).map_err(|e| {
            StorageError::FieldMismatch {
                column: self.spec.name.clone(),
                expected: format!("{}{:?}", self.spec.kind.name(), self.spec.shape),
                actual: e.to_string(),
            }
        })
    }

    pub fn is_zero(&self, index: u64) -> bool {
        self.spec.kind.all_zero(self.row(index))
    }

    /// Overwrites one row. `value` must already be validated against the spec.
    pub fn write_row(&mut self, index: u64, value: &Tensor) {
        let range = self.row_range(index);
        if let Some(map) = self.map.as_mut() {
            value.write_le(&mut map[range]);
        }
    }

    pub fn flush(&self) -> Result<(), StorageError> {
        if let Some(map) = &self.map {
            map.flush()?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for ColumnFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ColumnFile")
            .field("name", &self.spec.name)
            .field("path", &self.path)
            .field("rows", &self.rows)
            .finish()
    }
}
