mod common;

use common::{BrokenIds, FailingStore, SequentialIds};
use ingestlab::core::{run_stage, AttributeTable, FaceSet, Frame, Outlet, Stage, StageKind, ThumbnailTemplate};
use ingestlab::observability::ProgressCounters;
use ingestlab::error::PipelineError;
use ingestlab::stages::{AgeInference, ExcitementScoring, FaceDetection, GenderInference, StageContext};
use ingestlab::store::{MemoryStore, RecordStore, StoreLocation};
use std::sync::Arc;
use tokio::sync::mpsc;

fn location() -> StoreLocation {
    StoreLocation::new("test", "search-engine")
}

fn context(store: Arc<dyn RecordStore>) -> StageContext {
    StageContext::new(store, location(), Arc::new(AttributeTable::builtin()))
}

fn frame(stream_index: u32) -> Frame {
    Frame::new(stream_index, 1_700_000_000, &ThumbnailTemplate::new("http://thumbs/"))
}

#[tokio::test]
async fn test_face_detection_persists_and_emits_faces() {
    let store = Arc::new(MemoryStore::new());
    let detector = FaceDetection::new(context(store.clone()), Arc::new(SequentialIds::default()));
    assert_eq!(detector.kind(), StageKind::FaceDetection);

    let faces = detector.process(frame(8)).await.unwrap().unwrap();
    assert_eq!(faces.face_ids, vec!["face-000000", "face-000001"]);

    let record = store.get(&location().key("8:1700000000")).await.unwrap().unwrap();
    let stored = record.bin("faceIds").and_then(|b| b.as_str_list()).unwrap();
    assert_eq!(stored, faces.face_ids.as_slice());
}

#[tokio::test]
async fn test_run_stage_fans_out_to_every_consumer() {
    let store = Arc::new(MemoryStore::new());
    let (frame_tx, frame_rx) = mpsc::channel(4);
    let (age_tx, mut age_rx) = mpsc::channel(4);
    let (gender_tx, mut gender_rx) = mpsc::channel(4);
    let counters = Arc::new(ProgressCounters::new());
    let detector = FaceDetection::new(context(store.clone()), Arc::new(SequentialIds::default()));

    frame_tx.send(frame(8)).await.unwrap();
    frame_tx.send(frame(0)).await.unwrap();
    drop(frame_tx);

    let outlet = Outlet::new("faces", vec![age_tx, gender_tx]);
    let processed = run_stage(detector, frame_rx, outlet, counters.clone()).await.unwrap();
    assert_eq!(processed, 2);
    assert_eq!(counters.snapshot().face_detected, 2);

    for _ in 0..2 {
        let to_age = age_rx.recv().await.unwrap();
        let to_gender = gender_rx.recv().await.unwrap();
        assert_eq!(to_age, to_gender);

        let record = store.get(&location().key(&to_age.record_key)).await.unwrap();
        assert!(record.is_some(), "faces published before they were stored");
    }

    // The stage closed its outlet when its inlet drained.
    assert!(age_rx.recv().await.is_none());
    assert!(gender_rx.recv().await.is_none());
}

#[tokio::test]
async fn test_face_detection_fails_on_id_error() {
    let store = Arc::new(MemoryStore::new());
    let detector = FaceDetection::new(context(store.clone()), Arc::new(BrokenIds));

    let err = detector.process(frame(0)).await.unwrap_err();
    assert!(matches!(
        err.downcast_ref::<PipelineError>(),
        Some(PipelineError::IdentifierGeneration { .. })
    ));
    assert!(store.is_empty().await);
}

#[tokio::test]
async fn test_run_stage_reports_closed_consumer() {
    let store = Arc::new(MemoryStore::new());
    let (frame_tx, frame_rx) = mpsc::channel(1);
    let (tx, rx) = mpsc::channel::<FaceSet>(1);
    drop(rx);
    let counters = Arc::new(ProgressCounters::new());
    let detector = FaceDetection::new(context(store), Arc::new(SequentialIds::default()));

    frame_tx.send(frame(1)).await.unwrap();
    drop(frame_tx);

    let err = run_stage(detector, frame_rx, Outlet::new("faces", vec![tx]), counters.clone())
        .await
        .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<PipelineError>(),
        Some(PipelineError::Disconnected { port }) if port == "faces"
    ));
    // Counted before the hand-off was attempted.
    assert_eq!(counters.snapshot().face_detected, 1);
}

#[tokio::test]
async fn test_excitement_score_is_row_index() {
    let store = Arc::new(MemoryStore::new());
    let scorer = ExcitementScoring::new(context(store.clone()));

    for stream_index in [0, 8, 13, 999] {
        let f = frame(stream_index);
        assert_eq!(scorer.score(&f), i64::from(stream_index % 10));
        scorer.process(f.clone()).await.unwrap();

        let record = store.get(&location().key(&f.record_key)).await.unwrap().unwrap();
        assert_eq!(record.bin("exLevel").and_then(|b| b.as_int()), Some(i64::from(stream_index % 10)));
    }
}

#[tokio::test]
async fn test_excitement_write_error_is_fatal() {
    let store = Arc::new(FailingStore::on_bin("exLevel"));
    let scorer = ExcitementScoring::new(context(store));

    let err = scorer.process(frame(2)).await.unwrap_err();
    assert!(matches!(err.downcast_ref::<PipelineError>(), Some(PipelineError::Write { .. })));
}

#[tokio::test]
async fn test_age_and_gender_align_with_face_order() {
    let store = Arc::new(MemoryStore::new());
    let faces = FaceSet::from_frame(&frame(8), vec!["first".to_string(), "second".to_string()]);

    let ages = AgeInference::new(context(store.clone()));
    let genders = GenderInference::new(context(store.clone()));

    let age_map = ages.infer(&faces);
    let gender_map = genders.infer(&faces);
    assert_eq!(age_map["first"], 26);
    assert_eq!(age_map["second"], 27);
    assert_eq!(gender_map["first"], "male");
    assert_eq!(gender_map["second"], "female");

    ages.process(faces.clone()).await.unwrap();
    genders.process(faces.clone()).await.unwrap();

    let record = store.get(&location().key(&faces.record_key)).await.unwrap().unwrap();
    assert_eq!(record.bin("ages").and_then(|b| b.as_int_map()), Some(&age_map));
    assert_eq!(record.bin("genders").and_then(|b| b.as_str_map()), Some(&gender_map));
    assert_eq!(record.generation, 2);
}

#[tokio::test]
async fn test_inference_writes_do_not_clobber_other_bins() {
    let store = Arc::new(MemoryStore::new());
    let ctx = context(store.clone());
    let f = frame(0);

    ExcitementScoring::new(ctx.clone()).process(f.clone()).await.unwrap();
    let faces = FaceSet::from_frame(&f, vec!["only".to_string()]);
    AgeInference::new(ctx.clone()).process(faces.clone()).await.unwrap();
    GenderInference::new(ctx).process(faces).await.unwrap();

    let record = store.get(&location().key(&f.record_key)).await.unwrap().unwrap();
    assert_eq!(record.bins.len(), 3);
    assert_eq!(record.bin("exLevel").and_then(|b| b.as_int()), Some(0));
}
