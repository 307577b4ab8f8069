//! Client fixtures shared by the integration tests.

#![allow(dead_code)]

use std::net::TcpListener;
use std::time::Duration;

use logtree::{Logtree, LogtreeConfig};

pub use logtree::test_utils::mock_server::{MockServer, RECV_TIMEOUT};

/// Client pointed at `server` with short timeouts.
pub fn client_for(server: &MockServer, should_log_errors: bool) -> Logtree {
    Logtree::with_config(
        LogtreeConfig::new("pk_test", "sk_test")
            .with_base_url(server.base_url())
            .with_should_log_errors(should_log_errors)
            .with_connect_timeout(Duration::from_secs(2))
            .with_request_timeout(Duration::from_secs(2)),
    )
    .expect("valid config")
}

/// Client pointed at a port nothing listens on.
pub fn unreachable_client(should_log_errors: bool) -> Logtree {
    let addr = {
        let listener = TcpListener::bind(("127.0.0.1", 0)).expect("bind");
        listener.local_addr().expect("address")
    };
    Logtree::with_config(
        LogtreeConfig::new("pk_test", "sk_test")
            .with_base_url(format!("http://{addr}/api/v1"))
            .with_should_log_errors(should_log_errors)
            .with_connect_timeout(Duration::from_millis(500))
            .with_request_timeout(Duration::from_secs(1)),
    )
    .expect("valid config")
}
