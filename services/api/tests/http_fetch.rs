//! The reqwest-backed `DocumentFetcher` against a mock upstream.

mod common;

use api_lib::adapters::ReqwestFetcher;
use common::PDF_BYTES;
use shelf_core::ports::{DocumentFetcher, ErrorKind, PortError};
use std::time::Duration;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn probe_reports_status_and_cors_headers() {
    let server = MockServer::start().await;
    Mock::given(method("HEAD"))
        .and(path("/dune.pdf"))
        .and(header("origin", "http://localhost:5173"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "application/pdf")
                .insert_header("access-control-allow-origin", "*"),
        )
        .mount(&server)
        .await;

    let fetcher = common::fetcher();
    let probe = fetcher
        .probe(&format!("{}/dune.pdf", server.uri()), Some("http://localhost:5173"))
        .await
        .unwrap();
    assert_eq!(probe.status, 200);
    assert_eq!(probe.content_type.as_deref(), Some("application/pdf"));
    assert_eq!(probe.allow_origin.as_deref(), Some("*"));

    // Non-2xx probes are data, not errors.
    let missing = fetcher
        .probe(&format!("{}/missing.pdf", server.uri()), None)
        .await
        .unwrap();
    assert_eq!(missing.status, 404);
}

#[tokio::test]
async fn fetch_buffers_the_body_and_forwards_the_token() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/private.pdf"))
        .and(header("authorization", "Bearer s3cret"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "application/pdf")
                .set_body_bytes(PDF_BYTES),
        )
        .expect(1)
        .mount(&server)
        .await;

    let body = common::fetcher()
        .fetch(&format!("{}/private.pdf", server.uri()), None, Some("s3cret"))
        .await
        .unwrap();
    assert_eq!(&body.bytes[..], PDF_BYTES);
    assert_eq!(body.content_type.as_deref(), Some("application/pdf"));
}

#[tokio::test]
async fn fetch_tags_upstream_failures() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/locked.pdf"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;

    let fetcher = common::fetcher();
    let missing = fetcher
        .fetch(&format!("{}/gone.pdf", server.uri()), None, None)
        .await
        .unwrap_err();
    assert!(matches!(missing, PortError::HttpStatus { status: 404, .. }));

    let locked = fetcher
        .fetch(&format!("{}/locked.pdf", server.uri()), None, None)
        .await
        .unwrap_err();
    assert_eq!(locked.kind(), ErrorKind::Auth);
}

#[tokio::test]
async fn fetch_refuses_oversized_bodies() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/huge.pdf"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![b'x'; 4096]))
        .mount(&server)
        .await;

    let fetcher = ReqwestFetcher::new(Duration::from_secs(5), 1024).unwrap();
    let err = fetcher
        .fetch(&format!("{}/huge.pdf", server.uri()), None, None)
        .await
        .unwrap_err();
    assert!(matches!(err, PortError::HttpStatus { status: 413, .. }));
}

#[tokio::test]
async fn slow_upstreams_time_out() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/slow.pdf"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
        .mount(&server)
        .await;

    let fetcher = ReqwestFetcher::new(Duration::from_millis(200), 1024).unwrap();
    let err = fetcher
        .fetch(&format!("{}/slow.pdf", server.uri()), None, None)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Timeout);
}
