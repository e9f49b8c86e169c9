use clipqueue::core::{OutputFields, SegmentMeta, Tensor};
use clipqueue::dataset::{FRAMES, LAST_HIDDEN_STATES, POOLED_EMBEDDING, TIMESTAMP};
use clipqueue::engine::BatchAssembler;
use clipqueue::{Dataset, OutputShape};
use ndarray::ArrayD;
use std::collections::HashSet;
use tempfile::TempDir;

fn shape() -> OutputShape {
    OutputShape {
        embedding_dim: 4,
        hidden_len: 2,
        frame_height: 2,
        frame_width: 2,
    }
}

/// `count` records spread over five source files, ten segments per file in a row
fn dataset(dir: &TempDir, count: usize) -> Dataset {
    let mut ds = Dataset::create(dir.path().join("ds"), shape().schema()).unwrap();
    ds.append_all((0..count).map(|i| {
        let source = format!("/videos/{}.mp4", (i / 10) % 5);
        let start = (i % 10) as f64 * 2.0;
        SegmentMeta::new(source, start, start + 2.0).with_caption(format!("segment {}", i))
    }))
    .unwrap();
    ds
}

fn filled(timestamp: f64) -> OutputFields {
    let shape = shape();
    let mut fields = OutputFields::new();
    fields.insert(
        POOLED_EMBEDDING.to_string(),
        Tensor::F32(ArrayD::from_elem(shape.pooled().to_vec(), 0.5)),
    );
    fields.insert(
        LAST_HIDDEN_STATES.to_string(),
        Tensor::F32(ArrayD::from_elem(shape.hidden_states().to_vec(), 0.5)),
    );
    fields.insert(
        FRAMES.to_string(),
        Tensor::U8(ArrayD::from_elem(shape.frame().to_vec(), 7)),
    );
    fields.insert(TIMESTAMP.to_string(), Tensor::scalar(timestamp));
    fields
}

#[test]
fn test_scenario_fresh_run_splits_into_full_batches() {
    let dir = TempDir::new().unwrap();
    let ds = dataset(&dir, 250);

    let assembly = BatchAssembler::new(100, false).unwrap().assemble(&ds);

    let sizes: Vec<usize> = assembly.batches.iter().map(|b| b.len()).collect();
    assert_eq!(sizes, vec![100, 100, 50]);
    assert_eq!(assembly.scanned, 250);
    assert_eq!(assembly.already_done, 0);
    assert_eq!(assembly.included, 250);

    let ids: Vec<u64> = assembly.batches.iter().map(|b| b.id).collect();
    assert_eq!(ids, vec![0, 1, 2]);
}

#[test]
fn test_scenario_resume_skips_completed_records() {
    let dir = TempDir::new().unwrap();
    let mut ds = dataset(&dir, 250);
    for index in 0..100 {
        ds.write(index, &filled(1.0)).unwrap();
    }
    ds.flush().unwrap();

    let assembly = BatchAssembler::new(100, true).unwrap().assemble(&ds);

    let sizes: Vec<usize> = assembly.batches.iter().map(|b| b.len()).collect();
    assert_eq!(sizes, vec![100, 50]);
    assert_eq!(assembly.already_done, 100);

    let indices: Vec<u64> = assembly
        .batches
        .iter()
        .flat_map(|b| b.record_indices().collect::<Vec<_>>())
        .collect();
    let expected: HashSet<u64> = (100..250).collect();
    assert_eq!(indices.len(), 150);
    assert_eq!(indices.into_iter().collect::<HashSet<_>>(), expected);
}

#[test]
fn test_resume_disabled_reprocesses_everything() {
    let dir = TempDir::new().unwrap();
    let mut ds = dataset(&dir, 30);
    for index in 0..30 {
        ds.write(index, &filled(1.0)).unwrap();
    }

    let resumed = BatchAssembler::new(8, true).unwrap().assemble(&ds);
    assert!(resumed.is_empty());
    let err = resumed.require_work().unwrap_err();
    assert_eq!(err.scanned, 30);
    assert_eq!(err.already_done, 30);

    let fresh = BatchAssembler::new(8, false).unwrap().assemble(&ds);
    assert_eq!(fresh.included, 30);
    assert_eq!(fresh.batches.len(), 4);
}

#[test]
fn test_batch_size_bound_and_source_grouping() {
    let dir = TempDir::new().unwrap();
    let ds = dataset(&dir, 97);

    let assembly = BatchAssembler::new(13, true).unwrap().assemble(&ds);
    let (last, full) = assembly.batches.split_last().unwrap();

    assert!(full.iter().all(|b| b.len() == 13));
    assert!(last.len() >= 1 && last.len() <= 13);

    for batch in &assembly.batches {
        for (source, entries) in &batch.sources {
            for entry in entries {
                let record = ds.record(entry.record_index).unwrap();
                assert_eq!(&record.meta().video_filepath, source);
                assert_eq!(entry.timestamp, record.meta().midpoint());
            }
        }
    }
}

#[test]
fn test_every_pending_record_in_exactly_one_batch() {
    let dir = TempDir::new().unwrap();
    let mut ds = dataset(&dir, 64);
    for index in (0..64).step_by(3) {
        ds.write(index, &filled(0.0)).unwrap();
    }

    let assembly = BatchAssembler::new(7, true).unwrap().assemble(&ds);
    let mut seen = HashSet::new();
    for batch in &assembly.batches {
        for index in batch.record_indices() {
            assert!(seen.insert(index), "record {} assembled twice", index);
        }
    }

    let pending: HashSet<u64> = (0..64).filter(|i| i % 3 != 0).collect();
    assert_eq!(seen, pending);
}

#[test]
fn test_assembly_is_repeatable_on_partly_done_dataset() {
    let dir = TempDir::new().unwrap();
    let mut ds = dataset(&dir, 77);
    // Done: all of source 0, and every fourth record of the rest
    for index in (0..10).chain((10..77).step_by(4)) {
        ds.write(index, &filled(1.0)).unwrap();
    }
    ds.flush().unwrap();

    let assembler = BatchAssembler::new(10, true).unwrap();
    let first = assembler.assemble(&ds);
    let second = assembler.assemble(&ds);

    assert_eq!(first, second);
    assert_eq!(first.already_done, 27);
    assert_eq!(first.included, 50);
    let sizes: Vec<usize> = first.batches.iter().map(|b| b.len()).collect();
    assert_eq!(sizes, vec![10, 10, 10, 10, 10]);
    assert!(first.batches.iter().any(|b| b.sources.len() > 1));
}
