use anyhow::{bail, Context, Result};
use clipqueue::{ingest, logging};
use std::path::PathBuf;

fn main() -> Result<()> {
    logging::init_tracing();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let [transcripts, video_dir, output] = args.as_slice() else {
        bail!("usage: clipqueue-ingest <segments.jsonl> <video_dir> <output_dataset>");
    };
    let output = PathBuf::from(output);

    let (_dataset, report) = ingest::ingest_segments(
        &PathBuf::from(transcripts),
        &PathBuf::from(video_dir),
        &output,
    )
    .with_context(|| format!("ingesting {} into {}", transcripts, output.display()))?;

    println!(
        "{} segments: {} added, {} without video, {} invalid",
        report.segments_total,
        report.segments_added,
        report.segments_missing_video,
        report.segments_invalid
    );
    Ok(())
}
