//! Tests for the delivery worker pool.

use std::net::TcpListener;
use std::time::Duration;

use rstest::{fixture, rstest};

use crate::assembler::{ErrorReport, Event};
use crate::config::LogtreeConfig;
use crate::payload::{Outgoing, TrackPayload};
use crate::reported_error::ReportedError;
use crate::test_utils::mock_server::{MockServer, RECV_TIMEOUT};

use super::{DeliveryError, Dispatcher, Job, classify_status};

#[fixture]
fn tcp_listener() -> TcpListener {
    TcpListener::bind(("127.0.0.1", 0)).expect("bind ephemeral listener")
}

fn config_for(base_url: String) -> LogtreeConfig {
    LogtreeConfig::new("pk_test", "sk_test")
        .with_base_url(base_url)
        .with_connect_timeout(Duration::from_secs(2))
        .with_request_timeout(Duration::from_secs(2))
}

fn event_job(content: &str) -> Job {
    Job::Ready(Outgoing::Event(Event::new(content, "/tests").assemble()))
}

#[rstest]
fn posts_events_with_credentials() {
    let server = MockServer::start(200);
    let dispatcher = Dispatcher::spawn(&config_for(server.base_url()));

    assert!(
        dispatcher
            .dispatch(event_job("hello"))
            .wait_timeout(RECV_TIMEOUT)
    );
    let captured = server.next_request();
    assert_eq!(captured.method, "POST");
    assert_eq!(captured.path, "/api/v1/logs");
    assert_eq!(captured.header("x-logtree-key"), Some("pk_test"));
    assert_eq!(captured.header("authorization"), Some("sk_test"));
    assert_eq!(captured.header("content-type"), Some("application/json"));
    assert_eq!(
        captured.json(),
        serde_json::json!({"content": "hello", "folderPath": "/tests"})
    );
}

#[rstest]
fn posts_tracking_to_track_endpoint() {
    let server = MockServer::start(200);
    let dispatcher = Dispatcher::spawn(&config_for(server.base_url()));

    dispatcher
        .dispatch(Job::Ready(Outgoing::Track(TrackPayload {
            path: "/orders".into(),
            error_code: Some(503),
        })))
        .wait();
    let captured = server.next_request();
    assert_eq!(captured.path, "/api/v1/track");
    assert_eq!(
        captured.json(),
        serde_json::json!({"path": "/orders", "errorCode": 503})
    );
}

#[rstest]
fn resolves_error_trace_on_worker() {
    let server = MockServer::start(200);
    let dispatcher = Dispatcher::spawn(&config_for(server.base_url()));

    let pending = ErrorReport::new(ReportedError::new("boom")).assemble();
    dispatcher.dispatch(Job::Error(pending)).wait();
    let body = server.next_request().json();
    assert_eq!(body["content"], "boom");
    assert_eq!(body["folderPath"], "/errors");
    let trace = body["additionalContext"]["stacktrace"]
        .as_str()
        .expect("stacktrace is a string");
    assert!(!trace.is_empty());
    assert!(trace.contains('\n'), "expected several frames: {trace}");
}

#[rstest]
#[case(400)]
#[case(500)]
fn rejected_payloads_still_complete(#[case] status: u16) {
    let server = MockServer::start(status);
    let dispatcher =
        Dispatcher::spawn(&config_for(server.base_url()).with_should_log_errors(false));

    assert!(
        dispatcher
            .dispatch(event_job("rejected"))
            .wait_timeout(RECV_TIMEOUT)
    );
    assert_eq!(server.next_request().path, "/api/v1/logs");
}

#[rstest]
fn unreachable_endpoint_completes_without_panicking() {
    let addr = {
        let listener = TcpListener::bind(("127.0.0.1", 0)).expect("bind");
        listener.local_addr().expect("address")
    };
    let dispatcher =
        Dispatcher::spawn(&config_for(format!("http://{addr}")).with_should_log_errors(false));
    assert!(
        dispatcher
            .dispatch(event_job("nobody home"))
            .wait_timeout(RECV_TIMEOUT)
    );
}

#[rstest]
fn full_queue_drops_immediately(tcp_listener: TcpListener) {
    let addr = tcp_listener.local_addr().expect("address");
    // The listener never answers, so the single worker stays busy.
    let config = config_for(format!("http://{addr}"))
        .with_workers(1)
        .with_capacity(1)
        .with_request_timeout(Duration::from_millis(500))
        .with_should_log_errors(false);
    let dispatcher = Dispatcher::spawn(&config);

    let _first = dispatcher.dispatch(event_job("first"));
    let _second = dispatcher.dispatch(event_job("second"));
    let third = dispatcher.dispatch(event_job("third"));
    assert!(third.wait_timeout(Duration::ZERO));
    drop(dispatcher);
    drop(tcp_listener);
}

#[rstest]
fn drop_drains_accepted_jobs() {
    let server = MockServer::start(200);
    let dispatcher = Dispatcher::spawn(&config_for(server.base_url()).with_workers(1));
    for n in 0..3 {
        let _ = dispatcher.dispatch(event_job(&format!("queued {n}")));
    }
    drop(dispatcher);

    let mut contents: Vec<String> = server
        .received()
        .into_iter()
        .map(|request| request.json()["content"].as_str().unwrap_or_default().to_owned())
        .collect();
    contents.sort();
    assert_eq!(contents, vec!["queued 0", "queued 1", "queued 2"]);
}

#[rstest]
#[case(200, true)]
#[case(201, true)]
#[case(204, true)]
#[case(301, false)]
#[case(400, false)]
#[case(401, false)]
#[case(429, false)]
#[case(500, false)]
#[case(503, false)]
fn status_classification(#[case] status: u16, #[case] success: bool) {
    let result = classify_status(status);
    assert_eq!(result.is_ok(), success);
    if let Err(err) = result {
        assert!(matches!(err, DeliveryError::Status { code } if code == status));
    }
}
