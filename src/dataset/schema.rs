use crate::core::{ElementKind, Tensor};
use crate::error::StorageError;
use serde::{Deserialize, Serialize};

pub const POOLED_EMBEDDING: &str = "clip_pooled_embedding";
pub const LAST_HIDDEN_STATES: &str = "clip_last_hidden_states";
pub const FRAMES: &str = "frames";
pub const TIMESTAMP: &str = "timestamp";

/// Declaration of one fixed-stride output column
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSpec {
    pub name: String,
    pub kind: ElementKind,

    /// Per-record shape. Empty for scalars.
    pub shape: Vec<usize>,

    /// Whether this column decides if a record is still pending
    #[serde(default)]
    pub checked: bool,
}

impl ColumnSpec {
    pub fn new(name: impl Into<String>, kind: ElementKind, shape: &[usize]) -> Self {
        Self {
            name: name.into(),
            kind,
            shape: shape.to_vec(),
            checked: false,
        }
    }

    pub fn checked(mut self) -> Self {
        self.checked = true;
        self
    }

    pub fn elements(&self) -> usize {
        self.shape.iter().product()
    }

    pub fn row_bytes(&self) -> usize {
        self.elements() * self.kind.size()
    }

    /// Rejects a value whose kind or shape differs from the declaration.
    pub fn validate(&self, value: &Tensor) -> Result<(), StorageError> {
        if value.kind() != self.kind || value.shape() != self.shape.as_slice() {
            return Err(StorageError::FieldMismatch {
                column: self.name.clone(),
                expected: format!("{}{:?}", self.kind.name(), self.shape),
                actual: format!("{}{:?}", value.kind().name(), value.shape()),
            });
        }
        Ok(())
    }
}

/// Ordered set of output columns
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    pub columns: Vec<ColumnSpec>,
}

impl Schema {
    pub fn new(columns: Vec<ColumnSpec>) -> Self {
        Self { columns }
    }

    pub fn get(&self, name: &str) -> Option<&ColumnSpec> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn checked_columns(&self) -> impl Iterator<Item = &ColumnSpec> {
        self.columns.iter().filter(|c| c.checked)
    }

    /// Adds a column. Re-declaring an identical column is a no-op.
    ///
    /// Returns true if the column was new.
    pub fn declare(&mut self, spec: ColumnSpec) -> Result<bool, StorageError> {
        match self.get(&spec.name) {
            Some(existing) if *existing == spec => Ok(false),
            Some(_) => Err(StorageError::SchemaConflict(spec.name)),
            None => {
                self.columns.push(spec);
                Ok(true)
            }
        }
    }
}

/// Output dimensions of the encode stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputShape {
    pub embedding_dim: usize,
    pub hidden_len: usize,
    pub frame_height: usize,
    pub frame_width: usize,
}

impl Default for OutputShape {
    fn default() -> Self {
        Self {
            embedding_dim: 1024,
            hidden_len: 577,
            frame_height: 360,
            frame_width: 640,
        }
    }
}

impl OutputShape {
    pub fn pooled(&self) -> [usize; 1] {
        [self.embedding_dim]
    }

    pub fn hidden_states(&self) -> [usize; 2] {
        [self.hidden_len, self.embedding_dim]
    }

    pub fn frame(&self) -> [usize; 3] {
        [self.frame_height, self.frame_width, 3]
    }

    /// Columns written by the encode stage. Only the pooled embedding is checked.
    pub fn schema(&self) -> Schema {
        Schema::new(vec![
            ColumnSpec::new(POOLED_EMBEDDING, ElementKind::F32, &self.pooled()).checked(),
            ColumnSpec::new(LAST_HIDDEN_STATES, ElementKind::F32, &self.hidden_states()),
            ColumnSpec::new(FRAMES, ElementKind::U8, &self.frame()),
            ColumnSpec::new(TIMESTAMP, ElementKind::F64, &[]),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_schema_layout() {
        let schema = OutputShape::default().schema();
        assert_eq!(schema.columns.len(), 4);
        assert_eq!(schema.get(POOLED_EMBEDDING).unwrap().row_bytes(), 1024 * 4);
        assert_eq!(schema.get(TIMESTAMP).unwrap().elements(), 1);

        let checked: Vec<_> = schema.checked_columns().map(|c| c.name.as_str()).collect();
        assert_eq!(checked, vec![POOLED_EMBEDDING]);
    }

    #[test]
    fn test_declare_conflicting_column() {
        let mut schema = Schema::default();
        assert!(schema
            .declare(ColumnSpec::new("x", ElementKind::F32, &[4]))
            .unwrap());
        assert!(!schema
            .declare(ColumnSpec::new("x", ElementKind::F32, &[4]))
            .unwrap());

        let err = schema
            .declare(ColumnSpec::new("x", ElementKind::F32, &[8]))
            .unwrap_err();
        assert!(matches!(err, StorageError::SchemaConflict(name) if name == "x"));
    }

    #[test]
    fn test_validate_rejects_wrong_shape() {
        let spec = ColumnSpec::new(TIMESTAMP, ElementKind::F64, &[]);
        assert!(spec.validate(&Tensor::scalar(1.0)).is_ok());

        let wrong = Tensor::F32(ndarray::ArrayD::zeros(ndarray::IxDyn(&[2])));
        assert!(spec.validate(&wrong).is_err());
    }
}
