use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, mpsc};

use seqcache::{
    CacheConfig, CacheLocator, CancelToken, Pipeline, PipelineOpts, ProgressSnapshot, RunOutcome,
    ScriptedTranscoder, SeqCacheError,
};

fn scratch_dir(name: &str) -> PathBuf {
    let dir = PathBuf::from("target").join("pipeline_run").join(name);
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(dir.join("plates")).unwrap();
    dir
}

/// Write `shot_0001.exr` .. `shot_<count>.exr` and return the first frame's path.
fn write_sequence(dir: &Path, count: u64) -> PathBuf {
    for n in 1..=count {
        std::fs::write(dir.join("plates").join(format!("shot_{n:04}.exr")), b"").unwrap();
    }
    dir.join("plates").join("shot_0001.exr")
}

fn pipeline(t: &Arc<ScriptedTranscoder>, workers: usize) -> Pipeline {
    Pipeline::new(
        Arc::clone(t) as Arc<dyn seqcache::FrameTranscoder>,
        PipelineOpts {
            workers: Some(workers),
        },
    )
    .unwrap()
}

fn no_progress(_: ProgressSnapshot) {}

#[test]
fn converts_every_frame_into_destination() {
    let dir = scratch_dir("converts_every_frame");
    let sample = write_sequence(&dir, 10);
    let t = Arc::new(ScriptedTranscoder::new());
    let dest = dir.join("out");

    let outcome = pipeline(&t, 3)
        .run(&sample, "beauty", &dest, &no_progress, &CancelToken::new())
        .unwrap();

    let RunOutcome::Completed(summary) = outcome else {
        panic!("expected completed, got {outcome:?}");
    };
    assert_eq!(summary.total_frames, 10);
    assert_eq!(summary.completed_frames, 10);
    assert_eq!(summary.skipped_duplicates, 0);
    for n in 1..=10 {
        let f = dest.join(format!("shot_{n:04}.exr"));
        assert_eq!(
            std::fs::read_to_string(&f).unwrap(),
            "beauty.R,beauty.G,beauty.B"
        );
    }
}

#[test]
fn duplicate_frame_numbers_run_once() {
    let dir = scratch_dir("duplicate_frame_numbers");
    let sample = write_sequence(&dir, 10);
    std::fs::write(dir.join("plates").join("shot_005.exr"), b"").unwrap();
    let t = Arc::new(ScriptedTranscoder::new());

    let outcome = pipeline(&t, 4)
        .run(
            &sample,
            "beauty",
            &dir.join("out"),
            &no_progress,
            &CancelToken::new(),
        )
        .unwrap();

    let calls = t.calls();
    assert_eq!(calls.iter().filter(|&&f| f == 5).count(), 1);
    assert_eq!(calls.len(), 10);

    let summary = outcome.summary().copied().unwrap();
    assert!(outcome.is_completed());
    assert_eq!(summary.total_frames, 10);
    assert_eq!(summary.skipped_duplicates, 1);
}

#[test]
fn units_are_submitted_in_frame_order() {
    let dir = scratch_dir("submission_order");
    let sample = write_sequence(&dir, 6);
    let t = Arc::new(ScriptedTranscoder::new());

    pipeline(&t, 1)
        .run(
            &sample,
            "beauty",
            &dir.join("out"),
            &no_progress,
            &CancelToken::new(),
        )
        .unwrap();
    assert_eq!(t.calls(), vec![1, 2, 3, 4, 5, 6]);
}

#[test]
fn second_run_while_active_is_rejected() {
    let dir = scratch_dir("second_run_rejected");
    let sample = write_sequence(&dir, 4);

    let (started_tx, started_rx) = mpsc::channel::<u64>();
    let (release_tx, release_rx) = mpsc::channel::<()>();
    let started_tx = Mutex::new(started_tx);
    let release_rx = Mutex::new(release_rx);
    let t = Arc::new(ScriptedTranscoder::new().on_start(move |frame| {
        let _ = started_tx.lock().unwrap().send(frame);
        let _ = release_rx.lock().unwrap().recv();
    }));
    let p = Arc::new(pipeline(&t, 1));

    let first = {
        let p = Arc::clone(&p);
        let sample = sample.clone();
        let dest = dir.join("out");
        std::thread::spawn(move || {
            p.run(&sample, "beauty", &dest, &no_progress, &CancelToken::new())
        })
    };

    started_rx.recv().unwrap();
    assert!(p.is_running());
    let second = p
        .run(
            &sample,
            "beauty",
            &dir.join("out2"),
            &no_progress,
            &CancelToken::new(),
        )
        .unwrap();
    assert!(matches!(second, RunOutcome::Rejected));
    assert!(!dir.join("out2").exists());

    // Closing the channel lets every blocked unit through.
    drop(release_tx);
    let first = first.join().unwrap().unwrap();
    assert!(first.is_completed());
    assert!(!p.is_running());
    assert_eq!(t.calls().len(), 4);
}

#[test]
fn cancel_after_three_starts_ends_cancelled_and_allows_rerun() {
    let dir = scratch_dir("cancel_after_three");
    let sample = write_sequence(&dir, 10);
    let cancel = CancelToken::new();

    let started = Arc::new(AtomicUsize::new(0));
    let hook_cancel = cancel.clone();
    let hook_started = Arc::clone(&started);
    let t = Arc::new(ScriptedTranscoder::new().on_start(move |_| {
        if hook_started.fetch_add(1, Ordering::SeqCst) + 1 == 3 {
            hook_cancel.cancel();
        }
    }));
    let p = pipeline(&t, 1);

    let outcome = p
        .run(&sample, "beauty", &dir.join("out"), &no_progress, &cancel)
        .unwrap();
    let RunOutcome::Cancelled(summary) = outcome else {
        panic!("expected cancelled, got {outcome:?}");
    };
    assert_eq!(t.calls(), vec![1, 2, 3]);
    assert_eq!(summary.completed_frames, 2);
    assert!(!p.is_running());

    let rerun = p
        .run(
            &sample,
            "beauty",
            &dir.join("out"),
            &no_progress,
            &CancelToken::new(),
        )
        .unwrap();
    assert!(rerun.is_completed());
    assert_eq!(rerun.summary().unwrap().completed_frames, 10);
}

#[test]
fn failure_does_not_stop_dispatched_siblings() {
    let dir = scratch_dir("fail_together");
    let sample = write_sequence(&dir, 10);
    let t = Arc::new(ScriptedTranscoder::new().fail_on(3).fail_on(7));
    let p = pipeline(&t, 2);

    let outcome = p
        .run(
            &sample,
            "beauty",
            &dir.join("out"),
            &no_progress,
            &CancelToken::new(),
        )
        .unwrap();

    let mut calls = t.calls();
    calls.sort_unstable();
    assert_eq!(calls, (1..=10).collect::<Vec<_>>());

    let RunOutcome::Failed { summary, error } = outcome else {
        panic!("expected failed, got {outcome:?}");
    };
    assert_eq!(summary.completed_frames, 8);
    assert!(matches!(
        error,
        SeqCacheError::ExternalTool { frame: 3 | 7, .. }
    ));
    // Frames that succeeded stay in place.
    assert!(dir.join("out").join("shot_0001.exr").exists());
    assert!(!dir.join("out").join("shot_0003.exr").exists());
    assert!(!p.is_running());
}

#[test]
fn progress_is_monotonic_and_ends_at_hundred() {
    let dir = scratch_dir("progress_monotonic");
    let sample = write_sequence(&dir, 24);
    let t = Arc::new(ScriptedTranscoder::new());
    let seen = Mutex::new(Vec::<ProgressSnapshot>::new());
    let on_progress = |p: ProgressSnapshot| seen.lock().unwrap().push(p);

    let outcome = pipeline(&t, 4)
        .run(
            &sample,
            "beauty",
            &dir.join("out"),
            &on_progress,
            &CancelToken::new(),
        )
        .unwrap();
    assert!(outcome.is_completed());

    let seen = seen.into_inner().unwrap();
    assert_eq!(seen.len(), 24);
    for pair in seen.windows(2) {
        assert!(pair[0].current_frame < pair[1].current_frame);
        assert!(pair[0].percentage() <= pair[1].percentage());
    }
    for snap in &seen[..seen.len() - 1] {
        assert!(snap.percentage() < 100.0);
    }
    let last = seen.last().unwrap();
    assert_eq!(last.current_frame, last.total_frames);
    assert_eq!(last.percentage(), 100.0);
}

#[test]
fn discovery_errors_are_returned_and_release_the_guard() {
    let dir = scratch_dir("discovery_errors");
    let t = Arc::new(ScriptedTranscoder::new());
    let p = pipeline(&t, 1);

    let err = p
        .run(
            &dir.join("plates").join("no_digits_here.exr"),
            "beauty",
            &dir.join("out"),
            &no_progress,
            &CancelToken::new(),
        )
        .unwrap_err();
    assert!(matches!(err, SeqCacheError::Format(_)));
    assert!(!p.is_running());

    let err = p
        .run(
            &dir.join("plates").join("missing_0001.exr"),
            "beauty",
            &dir.join("out"),
            &no_progress,
            &CancelToken::new(),
        )
        .unwrap_err();
    assert!(matches!(err, SeqCacheError::Format(_)));
    assert!(t.calls().is_empty());

    let sample = write_sequence(&dir, 2);
    assert!(
        p.run(
            &sample,
            "beauty",
            &dir.join("out"),
            &no_progress,
            &CancelToken::new()
        )
        .unwrap()
        .is_completed()
    );
}

#[test]
fn run_to_cache_populates_cache_layout() {
    let dir = scratch_dir("run_to_cache");
    let sample = write_sequence(&dir, 5);
    let locator = CacheLocator::new(CacheConfig::new(
        dir.join("cache"),
        dir.join("config").join("cache.json"),
    ));
    let t = Arc::new(ScriptedTranscoder::new());

    let (dest, outcome) = pipeline(&t, 2)
        .run_to_cache(&locator, &sample, "beauty", &no_progress, &CancelToken::new())
        .unwrap();
    assert!(outcome.is_completed());
    assert_eq!(dest, dir.join("cache").join("shot").join("beauty"));
    assert!(dest.join("shot_0003.exr").is_file());
    assert_eq!(
        locator.cached_frames("shot", "beauty", "exr").unwrap().len(),
        5
    );
}

#[test]
fn rejected_cache_run_leaves_cache_untouched() {
    let dir = scratch_dir("cache_run_rejected");
    let sample = write_sequence(&dir, 2);
    std::fs::write(dir.join("plates").join("other_0001.exr"), b"").unwrap();
    let locator = CacheLocator::new(CacheConfig::new(
        dir.join("cache"),
        dir.join("config").join("cache.json"),
    ));

    let (started_tx, started_rx) = mpsc::channel::<u64>();
    let (release_tx, release_rx) = mpsc::channel::<()>();
    let started_tx = Mutex::new(started_tx);
    let release_rx = Mutex::new(release_rx);
    let t = Arc::new(ScriptedTranscoder::new().on_start(move |frame| {
        let _ = started_tx.lock().unwrap().send(frame);
        let _ = release_rx.lock().unwrap().recv();
    }));
    let p = Arc::new(pipeline(&t, 1));

    let first = {
        let p = Arc::clone(&p);
        let dest = dir.join("out");
        std::thread::spawn(move || {
            p.run(&sample, "beauty", &dest, &no_progress, &CancelToken::new())
        })
    };
    started_rx.recv().unwrap();

    let (dest, outcome) = p
        .run_to_cache(
            &locator,
            &dir.join("plates").join("other_0001.exr"),
            "fx",
            &no_progress,
            &CancelToken::new(),
        )
        .unwrap();
    assert!(matches!(outcome, RunOutcome::Rejected));
    assert_eq!(dest, PathBuf::new());
    assert!(!dir.join("cache").join("other").join("fx").exists());
    assert!(!dir.join("cache").exists());

    drop(release_tx);
    assert!(first.join().unwrap().unwrap().is_completed());
    assert!(!p.is_running());
}
