mod common;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use jamprep_lib::artifact::{read_artifact, Artifact};
use jamprep_lib::config::{Config, SuffixPair};
use jamprep_lib::dataset::{run_batch, BatchJob, CancelToken, FileTransform, Outcome};
use jamprep_lib::error::{ErrorKind, PipelineError, Result};
use jamprep_lib::pipeline::{preprocess, preview_index_roll, run_stage, stage_root, StageKind};

use common::{endless_note_bytes, melody_bytes, put, tempos};

fn test_config(source_root: &Path, output_root: &Path) -> Config {
    let mut config = Config::default();
    config.dataset.source_root = source_root.to_path_buf();
    config.dataset.output_root = output_root.to_path_buf();
    config.runner.workers = 2;
    config
}

#[test]
fn tempo_stage_mirrors_tree_and_pins_tempo() {
    let dir = tempfile::tempdir().unwrap();
    let src = dir.path().join("lmd_matched");
    let dst = dir.path().join("tempo_changed");
    put(&src, "A/B/C/TRAAAGR128F425B14B/song.mid", &melody_bytes(&[(60, 4)], 1_000_000));
    put(&src, "A/B/D/TRAAAEF128F4273421/other.mid", &melody_bytes(&[(67, 2)], 400_000));
    put(&src, "A/B/D/TRAAAEF128F4273421/readme.txt", b"not a track");

    let config = test_config(&src, dir.path());
    let report = run_stage(StageKind::Tempo, &src, &dst, &config, &CancelToken::new()).unwrap();

    assert_eq!(report.produced(), 2);
    assert!(report.is_clean());
    assert_eq!(report.leaf_dirs, 2);

    let first = dst.join("A/B/C/TRAAAGR128F425B14B/song.mid");
    let second = dst.join("A/B/D/TRAAAEF128F4273421/other.mid");
    assert_eq!(tempos(&first), vec![500_000]);
    assert_eq!(tempos(&second), vec![500_000]);
    assert!(!dst.join("A/B/D/TRAAAEF128F4273421/readme.txt").exists());
}

#[test]
fn corrupt_file_is_isolated() {
    let dir = tempfile::tempdir().unwrap();
    let src = dir.path().join("src");
    let dst = dir.path().join("dst");
    for i in 0..3 {
        put(&src, &format!("X/Y/Z/TRACK{}/ok.mid", i), &melody_bytes(&[(60, 1)], 500_000));
    }
    put(&src, "X/Y/Z/TRACK1/broken.mid", b"definitely not midi");

    let config = test_config(&src, dir.path());
    let report = run_stage(StageKind::Histogram, &src, &dst, &config, &CancelToken::new()).unwrap();

    assert_eq!(report.produced(), 3);
    assert_eq!(report.failure_count(), 1);
    let failed = report.failures().next().unwrap();
    assert!(failed.source.ends_with("TRACK1/broken.mid"));
    assert!(matches!(failed.outcome, Outcome::Failed { kind: ErrorKind::Decode, .. }));
    assert!(!dst.join("X/Y/Z/TRACK1/broken.histo").exists());
    assert!(dst.join("X/Y/Z/TRACK1/ok.histo").exists());
}

#[test]
fn full_chain_produces_every_tree() {
    let dir = tempfile::tempdir().unwrap();
    let src = dir.path().join("lmd_matched");
    let out = dir.path().join("dataset");
    // Two seconds of C4 then two seconds of E4 at 120 BPM
    put(&src, "A/A/A/TRAAAAW128F429D538/song.mid", &melody_bytes(&[(60, 4), (64, 4)], 500_000));

    let config = test_config(&src, &out);
    let report = preprocess(&config, &CancelToken::new()).unwrap();

    let stages: Vec<&str> = report.stages.iter().map(|s| s.stage.as_str()).collect();
    assert_eq!(stages, vec!["tempo", "histogram", "indexroll", "chords"]);
    assert!(report.is_clean());

    let track = "A/A/A/TRAAAAW128F429D538";
    let histogram = read_artifact(&stage_root(&config, StageKind::Histogram).join(track).join("song.histo"))
        .unwrap()
        .into_histogram()
        .unwrap();
    // 4 s at 32 Hz = 128 columns = 16 bars of 8
    assert_eq!(histogram.shape(), &[12, 16]);
    assert_eq!(histogram[[0, 0]], 800.0);
    assert_eq!(histogram[[4, 15]], 800.0);
    assert_eq!(histogram.column(0).sum(), 800.0);

    let melody = read_artifact(&stage_root(&config, StageKind::IndexRoll).join(track).join("song.indexroll"))
        .unwrap()
        .into_index_roll()
        .unwrap();
    assert_eq!(melody.len(), 16);
    assert!(melody[..8].iter().all(|p| *p == Some(60)));
    assert!(melody[8..].iter().all(|p| *p == Some(64)));

    let chords = read_artifact(&stage_root(&config, StageKind::Chords).join(track).join("song.chords"))
        .unwrap()
        .into_chords()
        .unwrap();
    assert_eq!(chords.len(), 16);
    assert_eq!(chords[0], vec![0, 1, 2]);
    assert_eq!(chords[15], vec![0, 1, 4]);
}

#[test]
fn cancelled_run_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let src = dir.path().join("src");
    put(&src, "A/B/C/TRACK/one.mid", &melody_bytes(&[(60, 1)], 500_000));

    let config = test_config(&src, &dir.path().join("out"));
    let cancel = CancelToken::new();
    cancel.cancel();

    let report = preprocess(&config, &cancel).unwrap();
    assert!(report.stages.is_empty());
    assert!(!stage_root(&config, StageKind::Tempo).join("A/B/C/TRACK/one.mid").exists());
}

#[test]
fn panicking_transform_does_not_stop_the_batch() {
    let dir = tempfile::tempdir().unwrap();
    let src = dir.path().join("src");
    let dst = dir.path().join("dst");
    put(&src, "A/TRACK/a.mid", b"a");
    put(&src, "A/TRACK/b.mid", b"b");
    put(&src, "A/TRACK/c.mid", b"c");

    let transform: Arc<dyn FileTransform> = Arc::new(|source: &Path| -> Result<Artifact> {
        if source.ends_with("b.mid") {
            panic!("bad file");
        }
        Ok(Artifact::IndexRoll(vec![Some(60), None]))
    });
    let suffixes = SuffixPair::new("mid", "indexroll");
    let job = BatchJob {
        stage: "custom",
        source_root: &src,
        destination_root: &dst,
        suffixes: &suffixes,
    };
    let report = run_batch(&job, transform, &Config::default().runner, &CancelToken::new()).unwrap();

    assert_eq!(report.produced(), 2);
    let failed: Vec<_> = report.failures().collect();
    assert_eq!(failed.len(), 1);
    assert!(matches!(failed[0].outcome, Outcome::Failed { kind: ErrorKind::Panic, .. }));
    assert!(dst.join("A/TRACK/a.indexroll").exists());
    assert!(!dst.join("A/TRACK/b.indexroll").exists());
}

#[test]
fn missing_source_root_fails_the_stage() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path(), dir.path());
    let result = run_stage(
        StageKind::Tempo,
        &dir.path().join("absent"),
        &dir.path().join("dst"),
        &config,
        &CancelToken::new(),
    );
    assert!(matches!(result, Err(PipelineError::Io(_))));
    assert!(!dir.path().join("dst").exists());
}

#[test]
fn preview_renders_index_roll_as_midi() {
    let dir = tempfile::tempdir().unwrap();
    let src = dir.path().join("src");
    let dst = dir.path().join("dst");
    put(&src, "A/TRACK/tune.mid", &melody_bytes(&[(62, 2), (65, 2)], 500_000));

    let config = test_config(&src, dir.path());
    run_stage(StageKind::IndexRoll, &src, &dst, &config, &CancelToken::new()).unwrap();

    let preview = dir.path().join("tune_preview.mid");
    let notes = preview_index_roll(&dst.join("A/TRACK/tune.indexroll"), &preview, 0.25).unwrap();
    assert_eq!(notes, 8);
    assert_eq!(tempos(&preview), vec![500_000]);
}

#[test]
fn overlong_piece_fails_alone() {
    let dir = tempfile::tempdir().unwrap();
    let src = dir.path().join("src");
    let dst = dir.path().join("dst");
    put(&src, "A/B/C/TRACK/endless.mid", &endless_note_bytes());
    put(&src, "A/B/C/TRACK/good.mid", &melody_bytes(&[(60, 4)], 500_000));

    let config = test_config(&src, dir.path());
    for kind in [StageKind::IndexRoll, StageKind::Histogram] {
        let report = run_stage(kind, &src, &dst, &config, &CancelToken::new()).unwrap();

        assert_eq!(report.produced(), 1);
        let failed: Vec<_> = report.failures().collect();
        assert_eq!(failed.len(), 1);
        assert!(failed[0].source.ends_with("endless.mid"));
        assert!(matches!(failed[0].outcome, Outcome::Failed { kind: ErrorKind::Shape, .. }));
    }
}

#[test]
fn timed_out_file_is_recorded_and_never_written() {
    let dir = tempfile::tempdir().unwrap();
    let src = dir.path().join("src");
    let dst = dir.path().join("dst");
    put(&src, "A/TRACK/fast.mid", b"f");
    put(&src, "A/TRACK/slow.mid", b"s");

    let transform: Arc<dyn FileTransform> = Arc::new(|source: &Path| -> Result<Artifact> {
        if source.ends_with("slow.mid") {
            std::thread::sleep(Duration::from_secs(3));
        }
        Ok(Artifact::IndexRoll(vec![Some(60)]))
    });
    let suffixes = SuffixPair::new("mid", "indexroll");
    let job = BatchJob {
        stage: "custom",
        source_root: &src,
        destination_root: &dst,
        suffixes: &suffixes,
    };
    let mut runner = Config::default().runner;
    runner.workers = 2;
    runner.file_timeout_secs = Some(1);

    let report = run_batch(&job, transform, &runner, &CancelToken::new()).unwrap();

    assert_eq!(report.produced(), 1);
    let failed: Vec<_> = report.failures().collect();
    assert_eq!(failed.len(), 1);
    assert!(failed[0].source.ends_with("slow.mid"));
    assert!(matches!(failed[0].outcome, Outcome::Failed { kind: ErrorKind::Timeout, .. }));

    // The abandoned transform finishes later; its result is still dropped
    std::thread::sleep(Duration::from_secs(3));
    assert!(dst.join("A/TRACK/fast.indexroll").exists());
    assert!(!dst.join("A/TRACK/slow.indexroll").exists());
}

#[test]
fn cancelling_mid_batch_skips_remaining_files() {
    let dir = tempfile::tempdir().unwrap();
    let src = dir.path().join("src");
    let dst = dir.path().join("dst");
    for name in ["a", "b", "c", "d"] {
        put(&src, &format!("A/TRACK/{}.mid", name), name.as_bytes());
    }

    let cancel = CancelToken::new();
    let trigger = cancel.clone();
    let transform: Arc<dyn FileTransform> = Arc::new(move |_: &Path| -> Result<Artifact> {
        trigger.cancel();
        Ok(Artifact::IndexRoll(vec![None]))
    });
    let suffixes = SuffixPair::new("mid", "indexroll");
    let job = BatchJob {
        stage: "custom",
        source_root: &src,
        destination_root: &dst,
        suffixes: &suffixes,
    };
    let mut runner = Config::default().runner;
    runner.workers = 1;

    let report = run_batch(&job, transform, &runner, &cancel).unwrap();

    assert!(report.cancelled);
    assert_eq!(report.outcomes.len(), 4);
    assert_eq!(report.produced(), 1);
    assert!(report.outcomes[0].is_produced());
    assert!(report
        .failures()
        .all(|o| matches!(o.outcome, Outcome::Failed { kind: ErrorKind::Cancelled, .. })));
    assert!(!dst.join("A/TRACK/d.indexroll").exists());
}
