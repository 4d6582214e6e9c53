//! Pipeline tests with an in-process forwarder standing in for the origin.

use super::*;
use crate::record::{
    Call, HeaderMultiMap, Mapping, Request as RecordRequest, Response as RecordResponse,
};
use crate::store::Stores;
use async_trait::async_trait;
use bytes::Bytes;
use flate2::write::GzEncoder;
use flate2::Compression;
use http_body_util::{BodyExt, Full};
use hyper::http::uri::Scheme;
use hyper::{Request, Response, StatusCode};
use std::io::Write;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Counts calls and answers with a fixed response.
struct CountingForwarder {
    calls: AtomicUsize,
    status: u16,
    headers: Vec<(&'static str, &'static str)>,
    body: Bytes,
}

impl CountingForwarder {
    fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            status,
            headers: vec![("content-type", "text/plain")],
            body: body.into(),
        }
    }

    fn with_header(mut self, name: &'static str, value: &'static str) -> Self {
        self.headers.push((name, value));
        self
    }

    fn count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Forward for CountingForwarder {
    async fn forward(&self, _req: &Request<Bytes>) -> Result<Response<ProxyBody>, ForwardError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut builder = Response::builder().status(self.status);
        for (name, value) in &self.headers {
            builder = builder.header(*name, *value);
        }
        Ok(builder.body(full_body(self.body.clone())).unwrap())
    }
}

struct TimeoutForwarder;

#[async_trait]
impl Forward for TimeoutForwarder {
    async fn forward(&self, _req: &Request<Bytes>) -> Result<Response<ProxyBody>, ForwardError> {
        Err(ForwardError::Timeout(30))
    }
}

fn pipeline(stores: &Arc<Stores>, forwarder: Arc<dyn Forward>) -> Pipeline {
    Pipeline::new("test", Arc::clone(stores), forwarder, true)
}

fn get(uri: &str) -> Request<Full<Bytes>> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Full::new(Bytes::new()))
        .unwrap()
}

async fn body_of(response: Response<ProxyBody>) -> Bytes {
    response.into_body().collect().await.unwrap().to_bytes()
}

fn gzip(data: &[u8]) -> Bytes {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).unwrap();
    Bytes::from(encoder.finish().unwrap())
}

#[tokio::test]
async fn test_miss_forwards_once_and_captures() {
    let stores = Arc::new(Stores::default());
    let forwarder = Arc::new(CountingForwarder::new(200, "from origin"));
    let pipeline = pipeline(&stores, forwarder.clone());

    let response = pipeline
        .handle(get("http://origin.test/a?x=1"), Scheme::HTTP, None)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(forwarder.count(), 1);

    let call_id = response
        .headers()
        .get(&X_CASSETTE_CALL_ID)
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert_eq!(body_of(response).await.as_ref(), b"from origin");

    assert_eq!(stores.calls.len(), 1);
    let call = stores.calls.get(&call_id).unwrap();
    assert_eq!(call.request.url, "http://origin.test/a?x=1");
    assert_eq!(call.request.form["x"], vec!["1"]);
    assert_eq!(call.response.body, "from origin");
}

#[tokio::test]
async fn test_hit_never_contacts_origin() {
    let stores = Arc::new(Stores::default());
    let mut header = HeaderMultiMap::new();
    header.append("X-Stub", "yes");
    let mut response = RecordResponse::captured(418, header, Bytes::new());
    response.set_decoded_body(Bytes::from_static(b"stubbed"));
    stores
        .mappings
        .put(
            "m1",
            Mapping::new("m1", RecordRequest::new("GET", "http://origin.test/a"), response),
        )
        .unwrap();

    let forwarder = Arc::new(CountingForwarder::new(200, "origin"));
    let pipeline = pipeline(&stores, forwarder.clone());

    let response = pipeline
        .handle(get("http://origin.test/a"), Scheme::HTTP, None)
        .await;
    assert_eq!(response.status(), StatusCode::IM_A_TEAPOT);
    assert_eq!(response.headers().get("x-stub").unwrap(), "yes");
    assert_eq!(
        response.headers().get(&X_CASSETTE_MAPPING_ID).unwrap(),
        "m1"
    );
    assert_eq!(body_of(response).await.as_ref(), b"stubbed");

    assert_eq!(forwarder.count(), 0);
    assert!(stores.calls.is_empty());
}

#[tokio::test]
async fn test_method_must_match() {
    let stores = Arc::new(Stores::default());
    stores
        .mappings
        .put(
            "m1",
            Mapping::new(
                "m1",
                RecordRequest::new("POST", "http://origin.test/a"),
                RecordResponse::default(),
            ),
        )
        .unwrap();
    let forwarder = Arc::new(CountingForwarder::new(200, ""));
    let pipeline = pipeline(&stores, forwarder.clone());

    pipeline
        .handle(get("http://origin.test/a"), Scheme::HTTP, None)
        .await;
    assert_eq!(forwarder.count(), 1);
}

#[tokio::test]
async fn test_promoted_gzip_call_replays_plain_body() {
    let stores = Arc::new(Stores::default());
    let forwarder = Arc::new(
        CountingForwarder::new(200, gzip(b"hello")).with_header("content-encoding", "gzip"),
    );
    let pipeline = pipeline(&stores, forwarder.clone());

    let first = pipeline
        .handle(get("http://origin.test/greeting"), Scheme::HTTP, None)
        .await;
    let call_id = first
        .headers()
        .get(&X_CASSETTE_CALL_ID)
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();

    stores.promote(&call_id).unwrap();

    let second = pipeline
        .handle(get("http://origin.test/greeting"), Scheme::HTTP, None)
        .await;
    assert_eq!(forwarder.count(), 1);
    assert!(second.headers().get("content-encoding").is_none());
    assert_eq!(second.headers().get(&X_CASSETTE_MAPPING_ID).unwrap(), call_id.as_str());
    assert_eq!(body_of(second).await.as_ref(), b"hello");
}

#[tokio::test]
async fn test_missing_host_is_local_error() {
    let stores = Arc::new(Stores::default());
    let forwarder = Arc::new(CountingForwarder::new(200, ""));
    let pipeline = pipeline(&stores, forwarder.clone());

    let response = pipeline.handle(get("/no-host"), Scheme::HTTP, None).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(response.headers().get(&X_CASSETTE_ERROR).unwrap(), "missing-host");
    assert_eq!(forwarder.count(), 0);
    assert!(stores.calls.is_empty());
}

#[tokio::test]
async fn test_timeout_becomes_504_without_capture() {
    let stores = Arc::new(Stores::default());
    let pipeline = pipeline(&stores, Arc::new(TimeoutForwarder));

    let response = pipeline
        .handle(get("http://slow.test/"), Scheme::HTTP, None)
        .await;
    assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
    assert_eq!(
        response.headers().get(&X_CASSETTE_ERROR).unwrap(),
        "upstream-timeout"
    );
    let body: serde_json::Value = serde_json::from_slice(&body_of(response).await).unwrap();
    assert!(body["error"].as_str().unwrap().contains("30s"));
    assert!(stores.calls.is_empty());
}

/// Origin that promises a 10 byte body, sends 3 bytes and then stalls.
async fn start_stalled_origin() -> std::net::SocketAddr {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                let mut buf = [0u8; 1024];
                let _ = socket.read(&mut buf).await;
                let _ = socket
                    .write_all(b"HTTP/1.1 200 OK\r\ncontent-length: 10\r\n\r\nabc")
                    .await;
                tokio::time::sleep(std::time::Duration::from_secs(5)).await;
            });
        }
    });
    addr
}

#[tokio::test]
async fn test_stalled_body_becomes_504_without_capture() {
    let addr = start_stalled_origin().await;
    let mut config = crate::config::Config::default();
    config.forward.timeout_secs = 1;
    config.forward.retries = 0;
    let forwarder = HttpForwarder::direct(&config).unwrap();

    let stores = Arc::new(Stores::default());
    let pipeline = pipeline(&stores, Arc::new(forwarder));

    let response = pipeline
        .handle(get(&format!("http://{addr}/slow-body")), Scheme::HTTP, None)
        .await;
    assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
    assert_eq!(
        response.headers().get(&X_CASSETTE_ERROR).unwrap(),
        "upstream-timeout"
    );
    assert!(stores.calls.is_empty());
}

#[tokio::test]
async fn test_unavailable_upstream_reported_per_request() {
    let stores = Arc::new(Stores::default());
    let pipeline = pipeline(&stores, Arc::new(UnavailableForwarder::new("bad port")));

    for _ in 0..2 {
        let response = pipeline
            .handle(get("http://origin.test/"), Scheme::HTTP, None)
            .await;
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(
            response.headers().get(&X_CASSETTE_ERROR).unwrap(),
            "invalid-upstream"
        );
    }
}

#[tokio::test]
async fn test_most_recent_mapping_wins() {
    let stores = Arc::new(Stores::default());
    for (id, status) in [("older", 201), ("newer", 202)] {
        let mut response = RecordResponse::default();
        response.status_code = status;
        stores
            .mappings
            .put(
                id,
                Mapping::new(id, RecordRequest::new("GET", "http://origin.test/dup"), response),
            )
            .unwrap();
    }
    let pipeline = pipeline(&stores, Arc::new(CountingForwarder::new(200, "")));

    let response = pipeline
        .handle(get("http://origin.test/dup"), Scheme::HTTP, None)
        .await;
    assert_eq!(response.status().as_u16(), 202);
}

#[tokio::test]
async fn test_https_scheme_and_connect_authority() {
    let stores = Arc::new(Stores::default());
    let forwarder = Arc::new(CountingForwarder::new(200, "secure"));
    let pipeline = pipeline(&stores, forwarder.clone());

    let response = pipeline
        .handle(get("/inner?q=1"), Scheme::HTTPS, Some("secure.test:443"))
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let calls: Vec<Call> = stores.calls.list().into_values().collect();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].request.url, "https://secure.test:443/inner?q=1");
}

#[tokio::test]
async fn test_post_form_recorded() {
    let stores = Arc::new(Stores::default());
    let pipeline = pipeline(&stores, Arc::new(CountingForwarder::new(201, "")));

    let req = Request::builder()
        .method("POST")
        .uri("http://origin.test/submit?src=q")
        .header("content-type", "application/x-www-form-urlencoded")
        .body(Full::new(Bytes::from_static(b"name=cassette&src=b")))
        .unwrap();
    pipeline.handle(req, Scheme::HTTP, None).await;

    let call = stores.calls.list().into_values().next().unwrap();
    assert_eq!(call.request.method, "POST");
    assert_eq!(call.request.post_form["name"], vec!["cassette"]);
    assert_eq!(call.request.form["src"], vec!["b", "q"]);
}
