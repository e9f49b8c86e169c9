use super::record::OutputFields;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One segment to encode: where to sample and where to write the result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchEntry {
    /// Midpoint of the segment, in seconds
    pub timestamp: f64,

    /// Stable index of the target record in the dataset
    pub record_index: u64,

    /// Caption handed to the encoder alongside the frames
    #[serde(default)]
    pub caption: String,
}

/// Fixed-size unit of work, grouped by source file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Batch {
    /// Sequence number assigned at assembly time
    pub id: u64,

    /// Entries keyed by source video path
    pub sources: BTreeMap<String, Vec<BatchEntry>>,
}

impl Batch {
    pub fn new(id: u64) -> Self {
        Self {
            id,
            sources: BTreeMap::new(),
        }
    }

    pub fn push(&mut self, source: &str, entry: BatchEntry) {
        self.sources
            .entry(source.to_string())
            .or_default()
            .push(entry);
    }

    /// Total entries across all source files
    pub fn len(&self) -> usize {
        self.sources.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn record_indices(&self) -> impl Iterator<Item = u64> + '_ {
        self.sources
            .values()
            .flat_map(|entries| entries.iter().map(|e| e.record_index))
    }

    pub fn source_files(&self) -> Vec<&str> {
        self.sources.keys().map(String::as_str).collect()
    }

    pub fn timestamps(&self) -> Vec<f64> {
        self.sources
            .values()
            .flat_map(|entries| entries.iter().map(|e| e.timestamp))
            .collect()
    }
}

/// Encoder output for a single record
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedRecord {
    pub record_index: u64,
    pub timestamp: f64,
    pub fields: OutputFields,
}

/// Whole result for one batch. Never pushed partially.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedBatch {
    pub batch_id: u64,
    pub records: Vec<EncodedRecord>,
}

impl EncodedBatch {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(index: u64) -> BatchEntry {
        BatchEntry {
            timestamp: index as f64 + 0.5,
            record_index: index,
            caption: String::new(),
        }
    }

    #[test]
    fn test_len_sums_across_sources() {
        let mut batch = Batch::new(0);
        batch.push("a.mp4", entry(0));
        batch.push("a.mp4", entry(1));
        batch.push("b.mp4", entry(2));

        assert_eq!(batch.len(), 3);
        assert_eq!(batch.source_files(), vec!["a.mp4", "b.mp4"]);
        assert_eq!(batch.record_indices().collect::<Vec<_>>(), vec![0, 1, 2]);
    }

    #[test]
    fn test_empty_batch() {
        let batch = Batch::new(7);
        assert!(batch.is_empty());
        assert!(batch.timestamps().is_empty());
    }
}
