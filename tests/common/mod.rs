// tests/common/mod.rs
//
// Local upstream stand-in: an axum router bound to an ephemeral port.
#![allow(dead_code)]

use axum::Router;
use std::time::Duration;

use packers_pulse::ingest::fetch::FetchClient;

/// Serve `app` on 127.0.0.1 and return its base URL (no trailing slash).
pub async fn serve(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind mock upstream");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("mock upstream");
    });
    format!("http://{addr}")
}

/// Fast client for tests: short timeout, tiny retry pause.
pub fn client(retries: u8) -> FetchClient {
    FetchClient::new("PackersPulse-test/1.0")
        .expect("client")
        .with_timeout(Duration::from_millis(300))
        .with_retries(retries)
        .with_pause(Duration::from_millis(10))
}

pub fn fixture(name: &str) -> String {
    std::fs::read_to_string(format!("tests/fixtures/{name}")).expect("fixture")
}
