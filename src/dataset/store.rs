use super::column::ColumnFile;
use super::schema::{ColumnSpec, Schema};
use crate::core::{OutputFields, SegmentMeta, Tensor};
use crate::error::StorageError;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::warn;

const SCHEMA_FILE: &str = "schema.json";
const RECORDS_FILE: &str = "records.jsonl";

/// Directory-backed dataset of video segments and their encoder outputs.
///
/// Layout:
/// - `records.jsonl`: one `SegmentMeta` per line, line number is the record index
/// - `schema.json`: declared output columns
/// - `<column>.bin`: memory-mapped rows for each output column
///
/// Only one owner may write. The pool hands the dataset to the uploader for
/// the whole run, so no locking happens here.
#[derive(Debug)]
pub struct Dataset {
    root: PathBuf,
    schema: Schema,
    records: Vec<SegmentMeta>,
    columns: Vec<ColumnFile>,
}

/// Read-only view of one record
#[derive(Debug, Clone, Copy)]
pub struct Record<'a> {
    index: u64,
    meta: &'a SegmentMeta,
    dataset: &'a Dataset,
}

impl<'a> Record<'a> {
    pub fn index(&self) -> u64 {
        self.index
    }

    pub fn meta(&self) -> &'a SegmentMeta {
        self.meta
    }

    pub fn field(&self, column: &str) -> Result<Tensor, StorageError> {
        self.dataset.read_field(self.index, column)
    }
}

/// Iterator over every record in index order
pub struct Records<'a> {
    dataset: &'a Dataset,
    next: u64,
}

impl<'a> Iterator for Records<'a> {
    type Item = Record<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let record = self.dataset.record(self.next).ok()?;
        self.next += 1;
        Some(record)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.dataset.len().saturating_sub(self.next) as usize;
        (remaining, Some(remaining))
    }
}

impl Dataset {
    /// True if `path` holds a dataset
    pub fn exists(path: impl AsRef<Path>) -> bool {
        path.as_ref().join(RECORDS_FILE).is_file()
    }

    /// Creates an empty dataset and zero-initialised columns for `schema`.
    pub fn create(path: impl AsRef<Path>, schema: Schema) -> Result<Self, StorageError> {
        let root = path.as_ref().to_path_buf();
        if Self::exists(&root) {
            return Err(StorageError::AlreadyExists(root));
        }

        fs::create_dir_all(&root)?;
        File::create(root.join(RECORDS_FILE))?;

        let mut dataset = Self {
            root,
            schema: Schema::default(),
            records: Vec::new(),
            columns: Vec::new(),
        };
        for spec in schema.columns {
            dataset.add_column(spec)?;
        }
        dataset.save_schema()?;
        Ok(dataset)
    }

    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let root = path.as_ref().to_path_buf();
        if !Self::exists(&root) {
            return Err(StorageError::NotFound(root));
        }

        let schema = match fs::read_to_string(root.join(SCHEMA_FILE)) {
            Ok(json) => serde_json::from_str(&json)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Schema::default(),
            Err(e) => return Err(e.into()),
        };
        let records = read_records(&root.join(RECORDS_FILE))?;

        let rows = records.len() as u64;
        let columns = schema
            .columns
            .iter()
            .map(|spec| {
                ColumnFile::open(ColumnFile::path_for(&root, &spec.name), spec.clone(), rows)
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            root,
            schema,
            records,
            columns,
        })
    }

    /// Opens an existing dataset and makes sure every column of `schema` exists.
    ///
    /// Missing columns are added zero-filled; differently shaped ones are a conflict.
    pub fn open_with_schema(path: impl AsRef<Path>, schema: Schema) -> Result<Self, StorageError> {
        let mut dataset = Self::open(path)?;
        for spec in schema.columns {
            dataset.add_column(spec)?;
        }
        Ok(dataset)
    }

    /// Copies the segment records of `input` into a new dataset at `output`
    /// and declares zero-filled output columns for `schema`.
    pub fn create_from(
        input: impl AsRef<Path>,
        output: impl AsRef<Path>,
        schema: Schema,
    ) -> Result<Self, StorageError> {
        let output = output.as_ref();
        if Self::exists(output) {
            return Err(StorageError::AlreadyExists(output.to_path_buf()));
        }
        let source = Self::open(input)?;

        // Built aside and renamed into place, so `output` only ever holds a
        // complete dataset
        let staging = staging_path(output);
        if staging.exists() {
            warn!(path = %staging.display(), "removing unfinished dataset from an earlier run");
            fs::remove_dir_all(&staging)?;
        }
        {
            let mut dataset = Self::create(&staging, Schema::default())?;
            dataset.append_all(source.records.iter().cloned())?;
            for spec in schema.columns {
                dataset.add_column(spec)?;
            }
            dataset.flush()?;
        }
        fs::rename(&staging, output)?;
        Self::open(output)
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn len(&self) -> u64 {
        self.records.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Declares a new output column, zero-filled for every existing record.
    pub fn add_column(&mut self, spec: ColumnSpec) -> Result<(), StorageError> {
        let mut schema = self.schema.clone();
        if !schema.declare(spec.clone())? {
            return Ok(());
        }

        let path = ColumnFile::path_for(&self.root, &spec.name);
        if path.exists() {
            // Left by an add that never reached schema.json; nothing was written to it
            warn!(path = %path.display(), "replacing column file missing from the schema");
            fs::remove_file(&path)?;
        }
        let column = ColumnFile::create(path, spec, self.len())?;
        self.schema = schema;
        self.columns.push(column);
        self.save_schema()
    }

    pub fn append(&mut self, meta: SegmentMeta) -> Result<u64, StorageError> {
        let index = self.len();
        self.append_all(std::iter::once(meta))?;
        Ok(index)
    }

    /// Appends records with zeroed outputs. Returns how many were added.
    pub fn append_all<I>(&mut self, metas: I) -> Result<usize, StorageError>
    where
        I: IntoIterator<Item = SegmentMeta>,
    {
        let added: Vec<SegmentMeta> = metas.into_iter().collect();
        if added.is_empty() {
            return Ok(0);
        }

        let file = OpenOptions::new()
            .append(true)
            .open(self.root.join(RECORDS_FILE))?;
        let mut writer = BufWriter::new(file);
        for meta in &added {
            serde_json::to_writer(&mut writer, meta)?;
            writer.write_all(b"\n")?;
        }
        writer.flush()?;
        writer.get_ref().sync_data()?;

        for column in &mut self.columns {
            column.grow(added.len() as u64)?;
        }

        let count = added.len();
        self.records.extend(added);
        Ok(count)
    }

    pub fn record(&self, index: u64) -> Result<Record<'_>, StorageError> {
        let meta = self
            .records
            .get(index as usize)
            .ok_or(StorageError::IndexOutOfRange {
                index,
                len: self.len(),
            })?;
        Ok(Record {
            index,
            meta,
            dataset: self,
        })
    }

    /// Restartable traversal; column values are read from the mapped files
    /// on every pass.
    pub fn iter(&self) -> Records<'_> {
        Records {
            dataset: self,
            next: 0,
        }
    }

    /// True iff every checked output column of `record` is still zero.
    pub fn is_pending(&self, record: &Record<'_>) -> bool {
        self.columns
            .iter()
            .filter(|c| c.spec().checked)
            .all(|c| c.is_zero(record.index))
    }

    pub fn read_field(&self, index: u64, column: &str) -> Result<Tensor, StorageError> {
        self.check_index(index)?;
        let column = self
            .columns
            .iter()
            .find(|c| c.spec().name == column)
            .ok_or_else(|| StorageError::UnknownColumn(column.to_string()))?;
        column.read(index)
    }

    /// Writes every output column of one record.
    ///
    /// All fields are validated before any byte is written, so a rejected
    /// write leaves the record untouched.
    pub fn write(&mut self, index: u64, fields: &OutputFields) -> Result<(), StorageError> {
        self.validate(index, fields)?;

        for position in self.commit_order() {
            let column = &mut self.columns[position];
            if let Some(value) = fields.get(&column.spec().name) {
                column.write_row(index, value);
            }
        }
        Ok(())
    }

    /// Checks that `fields` is a complete, well-shaped write of record `index`.
    pub fn validate(&self, index: u64, fields: &OutputFields) -> Result<(), StorageError> {
        self.check_index(index)?;

        for name in fields.keys() {
            if self.schema.get(name).is_none() {
                return Err(StorageError::UnknownColumn(name.clone()));
            }
        }
        for spec in &self.schema.columns {
            let value = fields.get(&spec.name).ok_or_else(|| StorageError::MissingField {
                index,
                column: spec.name.clone(),
            })?;
            spec.validate(value)?;
        }
        Ok(())
    }

    /// Forces every write so far to durable storage.
    ///
    /// Checked columns are synced last: a record never reads as done on disk
    /// while its other outputs are still zero.
    pub fn flush(&mut self) -> Result<(), StorageError> {
        for position in self.commit_order() {
            self.columns[position].flush()?;
        }
        Ok(())
    }

    /// Column names in the order `write` and `flush` touch them
    pub fn commit_columns(&self) -> Vec<&str> {
        self.commit_order()
            .into_iter()
            .map(|position| self.columns[position].spec().name.as_str())
            .collect()
    }

    fn commit_order(&self) -> Vec<usize> {
        let (checked, unchecked): (Vec<usize>, Vec<usize>) =
            (0..self.columns.len()).partition(|&i| self.columns[i].spec().checked);
        unchecked.into_iter().chain(checked).collect()
    }

    fn check_index(&self, index: u64) -> Result<(), StorageError> {
        if index >= self.len() {
            return Err(StorageError::IndexOutOfRange {
                index,
                len: self.len(),
            });
        }
        Ok(())
    }

    fn save_schema(&self) -> Result<(), StorageError> {
        let json = serde_json::to_string_pretty(&self.schema)?;

        // Write to temporary file first, then rename over the old schema
        let path = self.root.join(SCHEMA_FILE);
        let temp_path = path.with_extension("tmp");
        fs::write(&temp_path, json)?;
        fs::rename(&temp_path, &path)?;
        Ok(())
    }
}

fn read_records(path: &Path) -> Result<Vec<SegmentMeta>, StorageError> {
    let text = fs::read_to_string(path)?;
    let mut records = Vec::new();
    let mut committed = 0usize;

    for (line_no, line) in text.split_inclusive('\n').enumerate() {
        if !line.ends_with('\n') {
            // Last line of an interrupted append: keep it if it parses, cut it otherwise
            let mut file = OpenOptions::new().write(true).open(path)?;
            match serde_json::from_str::<SegmentMeta>(line.trim()) {
                Ok(meta) => {
                    records.push(meta);
                    file.seek(SeekFrom::End(0))?;
                    file.write_all(b"\n")?;
                    file.sync_data()?;
                }
                Err(_) => {
                    warn!(
                        path = %path.display(),
                        line = line_no + 1,
                        "dropping torn record at end of file"
                    );
                    file.set_len(committed as u64)?;
                    file.sync_data()?;
                }
            }
            break;
        }
        committed += line.len();

        if line.trim().is_empty() {
            continue;
        }
        let meta = serde_json::from_str(line.trim()).map_err(|source| {
            StorageError::MalformedRecord {
                line: line_no + 1,
                source,
            }
        })?;
        records.push(meta);
    }

    Ok(records)
}

/// Sibling directory a new dataset is built in before being renamed to `output`
fn staging_path(output: &Path) -> PathBuf {
    let mut name = output
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".partial");
    output.with_file_name(name)
}
