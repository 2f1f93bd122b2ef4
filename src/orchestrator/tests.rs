use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::auth::StaticCredentials;
use crate::config::{ApiConfig, Config, PollConfig};
use crate::error::{Error, SubmissionError, ValidationError};
use crate::store::MemorySessionStore;
use crate::types::{
    AssetDescriptor, OperationOutcome, OperationStage, ProcessingStatus, ProgressEvent,
    RecordingSession, SessionId,
};

use super::UploadOrchestrator;

fn test_config(server: &MockServer) -> Config {
    let mut config = Config {
        api: ApiConfig {
            base_url: server.uri(),
            request_timeout: Duration::from_secs(5),
        },
        poll: PollConfig {
            interval: Duration::from_millis(10),
            max_attempts: 10,
        },
        ..Default::default()
    };
    config.cancel_grace = Duration::from_secs(2);
    config
}

fn session(id: &str, duration_seconds: i64) -> RecordingSession {
    let start = Utc::now() - chrono::Duration::seconds(duration_seconds);
    RecordingSession {
        local_id: SessionId::new(id),
        start_time: start,
        end_time: Some(start + chrono::Duration::seconds(duration_seconds)),
        target_duration_minutes: None,
        device_info: None,
        environment: None,
        notes: None,
    }
}

fn asset(id: &str, bytes: &[u8]) -> (AssetDescriptor, Vec<u8>) {
    (
        AssetDescriptor {
            local_file_id: id.to_string(),
            file_name: format!("{id}.wav"),
            size_bytes: bytes.len() as u64,
            duration_seconds: 30,
            captured_at: Utc::now(),
            checksum: None,
        },
        bytes.to_vec(),
    )
}

async fn store_with(
    session: RecordingSession,
    assets: Vec<(AssetDescriptor, Vec<u8>)>,
) -> Arc<MemorySessionStore> {
    let store = MemorySessionStore::new();
    store.insert_session(session, assets).await;
    Arc::new(store)
}

fn orchestrator(config: Config, store: Arc<MemorySessionStore>) -> UploadOrchestrator {
    UploadOrchestrator::new(config, store, Arc::new(StaticCredentials::anonymous()))
        .expect("test config must validate")
}

fn plan_json(server: &MockServer, file_ids: &[&str]) -> serde_json::Value {
    let targets: Vec<_> = file_ids
        .iter()
        .map(|id| {
            json!({
                "localFileId": id,
                "uploadURL": format!("{}/oss/{id}", server.uri()),
                "storageKey": format!("sessions/1/{id}.wav"),
            })
        })
        .collect();
    json!({
        "jobId": 7,
        "uploadId": "up-1",
        "processingStatus": "queued",
        "assetUploadTargets": targets,
    })
}

fn job_json(status: &str, progress: u8) -> serde_json::Value {
    json!({
        "uploadId": "up-1",
        "processingStatus": status,
        "progress": progress,
    })
}

async fn drain_events(handle: &mut super::UploadHandle) -> Vec<ProgressEvent> {
    let mut events = Vec::new();
    while let Some(event) = handle.next_event().await {
        let finished = matches!(event, ProgressEvent::Finished(_));
        events.push(event);
        if finished {
            break;
        }
    }
    events
}

#[tokio::test]
async fn full_operation_reaches_completed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/sessions/batch-upload"))
        .respond_with(ResponseTemplate::new(200).set_body_json(plan_json(&server, &["f-1", "f-2"])))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(200))
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(job_json("processing", 50)))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(job_json("completed", 100)))
        .mount(&server)
        .await;

    let store = store_with(
        session("s-1", 3600),
        vec![asset("f-1", b"aaa"), asset("f-2", b"bbb")],
    )
    .await;
    let orchestrator = orchestrator(test_config(&server), store);

    let mut handle = orchestrator.start(SessionId::new("s-1")).await.unwrap();
    let events = drain_events(&mut handle).await;
    let outcome = handle.wait().await;

    match &outcome {
        OperationOutcome::Completed(job) => {
            assert_eq!(job.processing_status, ProcessingStatus::Completed);
            assert_eq!(job.progress, 100);
        }
        other => panic!("expected Completed, got {:?}", other),
    }

    // Stages appear in order
    let stages: Vec<_> = events
        .iter()
        .filter_map(|e| match e {
            ProgressEvent::StageChanged(stage) => Some(*stage),
            _ => None,
        })
        .collect();
    assert_eq!(
        stages,
        vec![
            OperationStage::Validating,
            OperationStage::Submitting,
            OperationStage::UploadingAssets,
            OperationStage::Polling,
        ]
    );

    // One progress update per settled asset
    let uploads: Vec<_> = events
        .iter()
        .filter(|e| matches!(e, ProgressEvent::AssetUploaded { .. }))
        .collect();
    assert_eq!(uploads.len(), 2);

    // Two polls, then Finished carrying the same outcome as wait()
    let ticks: Vec<_> = events
        .iter()
        .filter(|e| matches!(e, ProgressEvent::PollTick { .. }))
        .collect();
    assert_eq!(ticks.len(), 2);
    assert_eq!(
        events.last(),
        Some(&ProgressEvent::Finished(outcome.clone()))
    );
}

#[tokio::test]
async fn short_session_is_rejected_without_any_network_call() {
    let server = MockServer::start().await;
    let store = store_with(session("s-short", 30), vec![asset("f-1", b"x")]).await;
    let orchestrator = orchestrator(test_config(&server), store);

    let handle = orchestrator.start(SessionId::new("s-short")).await.unwrap();
    let outcome = handle.wait().await;

    match outcome {
        OperationOutcome::ValidationRejected(ValidationError::SessionTooShort {
            actual_seconds,
            required_seconds,
            ..
        }) => {
            assert_eq!(actual_seconds, 30);
            assert_eq!(required_seconds, 60);
        }
        other => panic!("expected ValidationRejected, got {:?}", other),
    }

    assert!(
        server.received_requests().await.unwrap().is_empty(),
        "an ineligible session must not touch the network"
    );
}

#[tokio::test]
async fn unfinished_session_is_rejected() {
    let server = MockServer::start().await;
    let mut unfinished = session("s-open", 3600);
    unfinished.end_time = None;
    let store = store_with(unfinished, vec![]).await;
    let orchestrator = orchestrator(test_config(&server), store);

    let handle = orchestrator.start(SessionId::new("s-open")).await.unwrap();
    match handle.wait().await {
        OperationOutcome::ValidationRejected(ValidationError::NotFinalized { id }) => {
            assert_eq!(id.as_str(), "s-open");
        }
        other => panic!("expected NotFinalized rejection, got {:?}", other),
    }
}

#[tokio::test]
async fn plan_mismatch_aborts_before_any_upload() {
    let server = MockServer::start().await;
    // Two assets submitted, plan only covers one
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(plan_json(&server, &["f-1"])))
        .mount(&server)
        .await;

    let store = store_with(
        session("s-1", 3600),
        vec![asset("f-1", b"a"), asset("f-2", b"b")],
    )
    .await;
    let orchestrator = orchestrator(test_config(&server), store);

    let handle = orchestrator.start(SessionId::new("s-1")).await.unwrap();
    match handle.wait().await {
        OperationOutcome::SubmissionAborted(SubmissionError::PlanMismatch {
            submitted,
            returned,
        }) => {
            assert_eq!(submitted, 2);
            assert_eq!(returned, 1);
        }
        other => panic!("expected PlanMismatch abort, got {:?}", other),
    }

    let puts = server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .filter(|r| r.method.as_str() == "PUT")
        .count();
    assert_eq!(puts, 0, "no asset upload may start without a valid plan");
}

#[tokio::test]
async fn transport_failure_on_submission_aborts_operation() {
    let server = MockServer::start().await;
    let store = store_with(session("s-1", 3600), vec![]).await;
    let mut config = test_config(&server);
    // Point at a port with nothing listening
    let dead = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    config.api.base_url = format!("http://{}", dead.local_addr().unwrap());
    drop(dead);
    config.api.request_timeout = Duration::from_secs(1);

    let orchestrator = orchestrator(config, store);
    let handle = orchestrator.start(SessionId::new("s-1")).await.unwrap();
    match handle.wait().await {
        OperationOutcome::SubmissionAborted(SubmissionError::Transport { .. }) => {}
        other => panic!("expected Transport abort, got {:?}", other),
    }
}

#[tokio::test]
async fn all_uploads_failing_still_polls_to_completion() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(plan_json(&server, &["f-1", "f-2"])))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(job_json("completed", 100)))
        .mount(&server)
        .await;

    let store = store_with(
        session("s-1", 3600),
        vec![asset("f-1", b"a"), asset("f-2", b"b")],
    )
    .await;
    let orchestrator = orchestrator(test_config(&server), store);

    let mut handle = orchestrator.start(SessionId::new("s-1")).await.unwrap();
    let events = drain_events(&mut handle).await;
    let outcome = handle.wait().await;

    assert!(
        matches!(outcome, OperationOutcome::Completed(_)),
        "job creation is independent of asset upload success, got {:?}",
        outcome
    );

    let last_upload = events
        .iter()
        .rev()
        .find_map(|e| match e {
            ProgressEvent::AssetUploaded {
                succeeded, failed, ..
            } => Some((*succeeded, *failed)),
            _ => None,
        })
        .unwrap();
    assert_eq!(last_upload, (0, 2), "both assets should settle as failed");
}

#[tokio::test]
async fn poll_budget_exhaustion_is_not_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(plan_json(&server, &[])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(job_json("processing", 60)))
        .mount(&server)
        .await;

    let store = store_with(session("s-1", 3600), vec![]).await;
    let mut config = test_config(&server);
    config.poll.max_attempts = 4;
    let orchestrator = orchestrator(config, store);

    let mut handle = orchestrator.start(SessionId::new("s-1")).await.unwrap();
    let events = drain_events(&mut handle).await;
    let outcome = handle.wait().await;

    match outcome {
        OperationOutcome::Exhausted(Some(job)) => {
            assert_eq!(job.processing_status, ProcessingStatus::Processing);
        }
        other => panic!("expected Exhausted (still working), got {:?}", other),
    }

    let ticks = events
        .iter()
        .filter(|e| matches!(e, ProgressEvent::PollTick { .. }))
        .count();
    assert_eq!(ticks, 4, "exactly max_attempts polls before giving up");
}

#[tokio::test]
async fn cancel_mid_upload_yields_cancelled_and_no_poll_events() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(plan_json(&server, &["f-1"])))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(30)))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(job_json("completed", 100)))
        .mount(&server)
        .await;

    let store = store_with(session("s-1", 3600), vec![asset("f-1", b"a")]).await;
    let orchestrator = orchestrator(test_config(&server), store);

    let mut handle = orchestrator.start(SessionId::new("s-1")).await.unwrap();

    // Wait until the upload stage is underway, then cancel
    let mut events = Vec::new();
    while let Some(event) = handle.next_event().await {
        let at_uploads = matches!(
            event,
            ProgressEvent::StageChanged(OperationStage::UploadingAssets)
        );
        events.push(event);
        if at_uploads {
            break;
        }
    }
    handle.cancel();

    let remaining =
        tokio::time::timeout(Duration::from_secs(5), async { drain_events(&mut handle).await })
            .await
            .expect("cancellation must settle within the grace period");
    events.extend(remaining);

    let outcome = handle.wait().await;
    assert_eq!(outcome, OperationOutcome::Cancelled);

    assert!(
        !events
            .iter()
            .any(|e| matches!(e, ProgressEvent::PollTick { .. })),
        "no polling progress may be emitted after cancellation"
    );
    assert!(
        !events
            .iter()
            .any(|e| matches!(e, ProgressEvent::StageChanged(OperationStage::Polling))),
        "the operation must not enter Polling after cancellation"
    );
}

#[tokio::test]
async fn second_start_for_same_session_is_rejected_while_in_flight() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(plan_json(&server, &[]))
                .set_delay(Duration::from_millis(500)),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(job_json("completed", 100)))
        .mount(&server)
        .await;

    let store = store_with(session("s-1", 3600), vec![]).await;
    let orchestrator = orchestrator(test_config(&server), store);

    let first = orchestrator.start(SessionId::new("s-1")).await.unwrap();
    assert!(orchestrator.is_active(&SessionId::new("s-1")).await);

    match orchestrator.start(SessionId::new("s-1")).await {
        Err(Error::OperationInProgress(id)) => assert_eq!(id.as_str(), "s-1"),
        other => panic!(
            "expected OperationInProgress for concurrent start, got {:?}",
            other.map(|h| h.session_id().clone())
        ),
    }

    // Once the first operation finishes, the guard is released
    let outcome = first.wait().await;
    assert!(matches!(outcome, OperationOutcome::Completed(_)));
    assert!(!orchestrator.is_active(&SessionId::new("s-1")).await);
    assert!(orchestrator.start(SessionId::new("s-1")).await.is_ok());
}

#[tokio::test]
async fn unknown_session_fails_fast() {
    let server = MockServer::start().await;
    let store = Arc::new(MemorySessionStore::new());
    let orchestrator = UploadOrchestrator::new(
        test_config(&server),
        store,
        Arc::new(StaticCredentials::anonymous()),
    )
    .unwrap();

    match orchestrator.start(SessionId::new("ghost")).await {
        Err(Error::SessionNotFound(id)) => assert_eq!(id.as_str(), "ghost"),
        other => panic!(
            "expected SessionNotFound, got {:?}",
            other.map(|h| h.session_id().clone())
        ),
    }
}

#[tokio::test]
async fn orchestrator_level_cancel_reaches_the_operation() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(plan_json(&server, &[]))
                .set_delay(Duration::from_secs(30)),
        )
        .mount(&server)
        .await;

    let store = store_with(session("s-1", 3600), vec![]).await;
    let orchestrator = orchestrator(test_config(&server), store);

    let handle = orchestrator.start(SessionId::new("s-1")).await.unwrap();
    assert!(orchestrator.cancel(&SessionId::new("s-1")).await);

    let outcome = tokio::time::timeout(Duration::from_secs(5), handle.wait())
        .await
        .expect("cancelled operation must wind down promptly");
    assert_eq!(outcome, OperationOutcome::Cancelled);
    assert!(!orchestrator.cancel(&SessionId::new("s-1")).await);
}
