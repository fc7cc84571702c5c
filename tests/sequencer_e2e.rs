//! End-to-end tests for the capture sequencer against the mock camera.
//!
//! Time is paused, so the 500 ms settle delays run instantly while keeping
//! their relative order.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use enroll_capture::camera::{CameraSettings, MockCamera, Resolution};
use enroll_capture::notify::{RecordingSink, Severity};
use enroll_capture::{CaptureBatch, CaptureSequencer, CaptureSettings, SequencerError};

const SMALL: Resolution = Resolution {
    width: 32,
    height: 24,
};

fn build(camera: &MockCamera) -> (CaptureSequencer, Arc<RecordingSink>) {
    let sink = Arc::new(RecordingSink::new());
    let seq = CaptureSequencer::new(
        Arc::new(camera.clone().with_native_resolution(SMALL)),
        CameraSettings::default(),
        CaptureSettings::default(),
        sink.clone(),
    );
    (seq, sink)
}

/// Run a capture and collect every batch handed to the callback.
async fn capture(seq: &CaptureSequencer, count: u32) -> (usize, Vec<CaptureBatch>) {
    let delivered = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&delivered);
    let captured = seq
        .capture_batch(count, move |batch| sink.lock().unwrap().push(batch))
        .await
        .expect("capture should run");
    let batches = delivered.lock().unwrap().clone();
    (captured, batches)
}

#[tokio::test(start_paused = true)]
async fn test_five_frames_happy_path() {
    let camera = MockCamera::new();
    let (seq, sink) = build(&camera);
    seq.start_session().unwrap();

    let (captured, batches) = capture(&seq, 5).await;

    assert_eq!(captured, 5);
    assert_eq!(batches.len(), 1, "callback fires exactly once");
    let batch = &batches[0];
    assert_eq!(batch.len(), 5);
    assert!(batch.is_complete());

    let sequences: Vec<u32> = batch.iter().map(|f| f.sequence()).collect();
    assert_eq!(sequences, vec![1, 2, 3, 4, 5]);

    let payloads: HashSet<String> = batch.data_urls().into_iter().collect();
    assert_eq!(payloads.len(), 5, "payloads are distinct");
    for frame in batch {
        assert!(!frame.jpeg().is_empty());
        assert_eq!((frame.width(), frame.height()), (32, 24));
    }

    let notes = sink.notifications();
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0].severity, Severity::Success);
    assert_eq!(notes[0].title, "Capture Complete");
    assert!(notes[0].description.contains("captured 5 images"));

    assert_eq!(seq.last_batch().as_ref(), Some(batch));
}

#[tokio::test(start_paused = true)]
async fn test_failed_grabs_shorten_batch() {
    let camera = MockCamera::new().fail_grabs([2, 4]);
    let (seq, sink) = build(&camera);
    seq.start_session().unwrap();

    let (captured, batches) = capture(&seq, 5).await;

    assert_eq!(captured, 3);
    let sequences: Vec<u32> = batches[0].iter().map(|f| f.sequence()).collect();
    assert_eq!(sequences, vec![1, 3, 5]);
    assert_eq!(batches[0].requested(), 5);
    assert!(sink.notifications()[0].description.contains("captured 3 images"));
}

#[tokio::test(start_paused = true)]
async fn test_empty_batch_still_delivered() {
    let camera = MockCamera::new().fail_grabs(1..=3);
    let (seq, _sink) = build(&camera);
    seq.start_session().unwrap();

    let (captured, batches) = capture(&seq, 3).await;
    assert_eq!(captured, 0);
    assert_eq!(batches.len(), 1);
    assert!(batches[0].is_empty());

    let (captured, batches) = capture(&seq, 0).await;
    assert_eq!(captured, 0);
    assert_eq!(batches.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_repeated_captures_are_independent() {
    let camera = MockCamera::new();
    let (seq, sink) = build(&camera);
    seq.start_session().unwrap();

    let (_, first) = capture(&seq, 2).await;
    let (_, second) = capture(&seq, 3).await;

    assert_eq!(first[0].len(), 2);
    assert_eq!(second[0].len(), 3);
    assert_ne!(first[0].frames()[0], second[0].frames()[0]);
    assert_eq!(sink.notifications().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_progress_counts_up_then_resets() {
    let camera = MockCamera::new();
    let (seq, _sink) = build(&camera);
    seq.start_session().unwrap();

    let mut progress = seq.subscribe_progress();
    let runner = seq.clone();
    let task = tokio::spawn(async move { runner.capture_batch(5, |_| {}).await });

    let mut observed = Vec::new();
    while progress.changed().await.is_ok() {
        let value = *progress.borrow_and_update();
        observed.push(value);
        if value == 0 {
            break;
        }
    }

    task.await.unwrap().unwrap();
    assert_eq!(observed, vec![1, 2, 3, 4, 5, 0]);
    assert_eq!(seq.progress(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_settle_delay_between_frames() {
    let camera = MockCamera::new();
    let (seq, _sink) = build(&camera);
    seq.start_session().unwrap();

    let started = tokio::time::Instant::now();
    capture(&seq, 4).await;
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_millis(2000), "elapsed {:?}", elapsed);
    assert!(elapsed < Duration::from_millis(2100), "elapsed {:?}", elapsed);
}

#[tokio::test(start_paused = true)]
async fn test_stop_mid_capture_drops_remaining_frames() {
    let camera = MockCamera::new();
    let (seq, _sink) = build(&camera);
    seq.start_session().unwrap();

    let delivered = Arc::new(Mutex::new(None));
    let slot = Arc::clone(&delivered);
    let runner = seq.clone();
    let task = tokio::spawn(async move {
        runner
            .capture_batch(5, move |batch| *slot.lock().unwrap() = Some(batch))
            .await
    });

    // Grabs happen at 500 ms and 1000 ms; stop before the third.
    tokio::time::sleep(Duration::from_millis(1200)).await;
    seq.stop_session();
    assert_eq!(camera.live_sources(), 0);

    assert_eq!(task.await.unwrap().unwrap(), 2);
    let batch = delivered.lock().unwrap().take().unwrap();
    assert_eq!(batch.len(), 2);
    assert_eq!(batch.requested(), 5);
}

#[tokio::test(start_paused = true)]
async fn test_denied_camera_then_capture() {
    let camera = MockCamera::new().deny_access();
    let (seq, sink) = build(&camera);

    let err = seq.start_session().unwrap_err();
    assert!(matches!(err, SequencerError::DeviceUnavailable(_)));
    assert!(!seq.is_active());

    let notes = sink.notifications();
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0].severity, Severity::Error);
    assert_eq!(notes[0].title, "Camera Error");

    let result = seq.capture_batch(5, |_| panic!("no batch without a session")).await;
    assert!(matches!(result, Err(SequencerError::NoActiveSession)));
    assert_eq!(sink.notifications().len(), 1);
}

#[test]
fn test_stop_then_start_reacquires_fresh_session() {
    let camera = MockCamera::new();
    let (seq, _sink) = build(&camera);

    seq.start_session().unwrap();
    assert_eq!(camera.live_sources(), 1);

    seq.stop_session();
    assert_eq!(camera.live_sources(), 0);
    assert!(!seq.is_active());

    // The mock refuses a second concurrent open, so this only succeeds if
    // the first session's tracks were released.
    seq.start_session().unwrap();
    assert!(seq.is_active());
    assert_eq!(camera.open_count(), 2);
    assert_eq!(camera.live_sources(), 1);
}

#[test]
fn test_second_sequencer_sees_busy_device() {
    let camera = MockCamera::new();
    let (first, _) = build(&camera);
    let (second, sink) = build(&camera);

    first.start_session().unwrap();
    assert!(matches!(
        second.start_session(),
        Err(SequencerError::DeviceUnavailable(_))
    ));
    assert_eq!(sink.notifications().len(), 1);

    drop(first);
    second.start_session().unwrap();
}
