//! Builds an input dataset from transcript segments and a directory of videos.

use crate::core::SegmentMeta;
use crate::dataset::{Dataset, Schema};
use crate::error::StorageError;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// One transcribed segment of a video
#[derive(Debug, Clone, Deserialize)]
pub struct TranscriptSegment {
    pub video_filename_stem: String,
    pub start: f64,
    pub end: f64,
    #[serde(default, alias = "text")]
    pub caption: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestReport {
    pub segments_total: u64,
    pub segments_added: u64,
    /// No file in the video directory has the segment's stem
    pub segments_missing_video: u64,
    /// Non-finite or inverted time ranges
    pub segments_invalid: u64,
}

/// Maps file stem to path for every regular file directly under `video_dir`
pub fn index_videos(video_dir: &Path) -> Result<HashMap<String, PathBuf>, StorageError> {
    let mut videos = HashMap::new();
    for entry in fs::read_dir(video_dir)? {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
            videos.insert(stem.to_string(), path.clone());
        }
    }
    Ok(videos)
}

/// Parses one transcript line.
///
/// A line holds a segment object, an array of them, or a JSON string that
/// itself encodes one of those.
pub fn parse_transcript_line(line: &str) -> Result<Vec<TranscriptSegment>, serde_json::Error> {
    let mut value: Value = serde_json::from_str(line)?;
    if let Value::String(inner) = &value {
        value = serde_json::from_str(inner)?;
    }
    match value {
        Value::Array(items) => items.into_iter().map(serde_json::from_value).collect(),
        other => Ok(vec![serde_json::from_value(other)?]),
    }
}

/// Creates a new dataset at `output` with one record per usable segment.
pub fn ingest_segments(
    transcripts: &Path,
    video_dir: &Path,
    output: &Path,
) -> Result<(Dataset, IngestReport), StorageError> {
    let videos = index_videos(video_dir)?;
    info!(videos = videos.len(), dir = %video_dir.display(), "indexed video directory");

    let reader = BufReader::new(File::open(transcripts)?);
    let mut report = IngestReport::default();
    let mut records = Vec::new();

    for (i, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let segments = parse_transcript_line(&line)
            .map_err(|source| StorageError::MalformedRecord { line: i + 1, source })?;

        for segment in segments {
            report.segments_total += 1;

            if !segment.start.is_finite() || !segment.end.is_finite() || segment.end < segment.start {
                report.segments_invalid += 1;
                continue;
            }
            let Some(video) = videos.get(&segment.video_filename_stem) else {
                report.segments_missing_video += 1;
                continue;
            };

            records.push(
                SegmentMeta::new(video.to_string_lossy(), segment.start, segment.end)
                    .with_caption(segment.caption),
            );
        }
    }

    let mut dataset = Dataset::create(output, Schema::default())?;
    report.segments_added = dataset.append_all(records)? as u64;

    if report.segments_missing_video > 0 || report.segments_invalid > 0 {
        warn!(
            missing_video = report.segments_missing_video,
            invalid = report.segments_invalid,
            "skipped segments during ingest"
        );
    }
    info!(
        total = report.segments_total,
        added = report.segments_added,
        output = %output.display(),
        "ingest complete"
    );
    Ok((dataset, report))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    #[test]
    fn test_parse_line_forms() {
        let object = r#"{"video_filename_stem": "a", "start": 0.0, "end": 2.0, "caption": "hi"}"#;
        assert_eq!(parse_transcript_line(object).unwrap().len(), 1);

        let array = format!("[{},{}]", object, object);
        assert_eq!(parse_transcript_line(&array).unwrap().len(), 2);

        let encoded = serde_json::to_string(&array).unwrap();
        let segments = parse_transcript_line(&encoded).unwrap();
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].caption, "hi");
    }

    #[test]
    fn test_ingest_matches_stems() {
        let dir = TempDir::new().unwrap();
        let videos = dir.path().join("videos");
        fs::create_dir(&videos).unwrap();
        fs::write(videos.join("talk.mp4"), b"").unwrap();

        let transcripts = dir.path().join("segments.jsonl");
        let line = concat!(
            r#"[{"video_filename_stem": "talk", "start": 0.0, "end": 4.0, "caption": "one"},"#,
            r#"{"video_filename_stem": "talk", "start": 4.0, "end": 3.0, "caption": "bad"},"#,
            r#"{"video_filename_stem": "gone", "start": 0.0, "end": 1.0, "caption": "two"}]"#,
        );
        let mut file = File::create(&transcripts).unwrap();
        writeln!(file, "{}", line).unwrap();
        drop(file);

        let (dataset, report) =
            ingest_segments(&transcripts, &videos, &dir.path().join("input")).unwrap();

        assert_eq!(
            report,
            IngestReport {
                segments_total: 3,
                segments_added: 1,
                segments_missing_video: 1,
                segments_invalid: 1,
            }
        );
        let record = dataset.record(0).unwrap();
        assert!(record.meta().video_filepath.ends_with("talk.mp4"));
        assert_eq!(record.meta().caption, "one");
    }
}
