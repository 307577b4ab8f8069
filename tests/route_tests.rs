//! Route-call tracking against a mock server.

mod test_utils;

use std::time::Duration;

use logtree::{DEFAULT_ERROR_CODE, RequestParts};
use rstest::{fixture, rstest};
use serde_json::json;

use test_utils::{MockServer, RECV_TIMEOUT, client_for, unreachable_client};

#[fixture]
fn server() -> MockServer {
    MockServer::start(200)
}

#[rstest]
fn on_request_tracks_path_without_query(server: MockServer) {
    let tracker = client_for(&server, true).route_tracker();
    let request = RequestParts::new("GET", "/orders/9?expand=items");

    let connection = tracker.on_request(&request);

    assert_eq!(connection.path(), "/orders/9");
    let captured = server.next_request();
    assert_eq!(captured.path, "/api/v1/track");
    assert_eq!(captured.header("x-logtree-key"), Some("pk_test"));
    assert_eq!(captured.json(), json!({"path": "/orders/9"}));
}

#[rstest]
#[case(Some(404), 404)]
#[case(None, DEFAULT_ERROR_CODE)]
fn on_error_tracks_status(server: MockServer, #[case] status: Option<u16>, #[case] expected: u16) {
    let tracker = client_for(&server, true).route_tracker();
    let connection = tracker.on_request(&RequestParts::new("POST", "/checkout"));
    let _ = server.next_request();

    assert!(connection.on_error(status).wait_timeout(RECV_TIMEOUT));

    assert_eq!(
        server.next_request().json(),
        json!({"path": "/checkout", "errorCode": expected})
    );
}

#[rstest]
fn middleware_runs_next_and_returns_its_result(server: MockServer) {
    let tracker = client_for(&server, true).route_tracker();
    let request = RequestParts::new("GET", "/health");
    let mut calls = 0;

    let status = tracker.middleware(&request, || {
        calls += 1;
        204
    });

    assert_eq!(status, 204);
    assert_eq!(calls, 1);
    assert_eq!(server.next_request().json(), json!({"path": "/health"}));
    server.assert_idle(Duration::from_millis(100));
}

#[rstest]
fn middleware_is_unaffected_by_delivery_failure() {
    let tracker = unreachable_client(false).route_tracker();
    let request = RequestParts::new("GET", "/health");

    let result: Result<&str, &str> = tracker.middleware(&request, || Err("handler failed"));

    assert_eq!(result, Err("handler failed"));
}
