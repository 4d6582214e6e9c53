//! End-to-end record and replay through real listeners.
//!
//! Each test starts an in-process origin, a proxy listener and the admin API
//! on ephemeral ports and drives them with `reqwest`.

use bytes::Bytes;
use cassette_proxy::admin_api::{AdminApiServer, AdminState};
use cassette_proxy::config::{Config, ConnectMode};
use cassette_proxy::proxy::{CertificateAuthority, HttpForwarder, Pipeline, ProxyServer};
use cassette_proxy::store::Stores;
use flate2::write::GzEncoder;
use flate2::Compression;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response};
use hyper_util::rt::TokioIo;
use serde_json::{json, Value};
use std::convert::Infallible;
use std::io::Write;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

struct Harness {
    proxy_url: String,
    admin_url: String,
    origin_url: String,
    origin_hits: Arc<AtomicUsize>,
    ca_pem: String,
    admin: reqwest::Client,
}

impl Harness {
    async fn start() -> Self {
        let (origin_url, origin_hits) = start_origin().await;

        let config = Config::default();
        let stores = Arc::new(Stores::new(config.mappings.on_conflict));
        let ca = Arc::new(CertificateAuthority::generate().unwrap());
        let forwarder = Arc::new(HttpForwarder::direct(&config).unwrap());

        let proxy_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let proxy_url = format!("http://{}", proxy_listener.local_addr().unwrap());
        let server = ProxyServer::new(
            Pipeline::new("proxy", Arc::clone(&stores), forwarder, true),
            Arc::clone(&ca),
            ConnectMode::Intercept,
        );
        tokio::spawn(server.serve(proxy_listener));

        let admin_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let admin_url = format!("http://{}", admin_listener.local_addr().unwrap());
        let admin = AdminApiServer::new(AdminState::new(Arc::clone(&stores), ca.cert_pem()));
        tokio::spawn(admin.serve(admin_listener));

        Self {
            proxy_url,
            admin_url,
            origin_url,
            origin_hits,
            ca_pem: ca.cert_pem().to_string(),
            admin: reqwest::Client::builder()
                .no_proxy()
                .timeout(Duration::from_secs(10))
                .build()
                .unwrap(),
        }
    }

    fn proxied_client(&self) -> reqwest::Client {
        reqwest::Client::builder()
            .proxy(reqwest::Proxy::http(&self.proxy_url).unwrap())
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap()
    }

    fn hits(&self) -> usize {
        self.origin_hits.load(Ordering::SeqCst)
    }

    async fn admin_json(&self, method: reqwest::Method, path: &str) -> (u16, Value) {
        let response = self
            .admin
            .request(method, format!("{}{}", self.admin_url, path))
            .send()
            .await
            .unwrap();
        let status = response.status().as_u16();
        (status, response.json().await.unwrap_or(Value::Null))
    }
}

fn gzip(data: &[u8]) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

fn origin_response(path: &str) -> Response<Full<Bytes>> {
    match path {
        "/gz" => Response::builder()
            .header("content-type", "text/plain")
            .header("content-encoding", "gzip")
            .body(Full::new(Bytes::from(gzip(b"compressed hello"))))
            .unwrap(),
        _ => Response::builder()
            .header("content-type", "text/plain")
            .header("x-origin", "live")
            .body(Full::new(Bytes::from(format!("origin saw {path}"))))
            .unwrap(),
    }
}

async fn start_origin() -> (String, Arc<AtomicUsize>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&hits);

    tokio::spawn(async move {
        loop {
            let Ok((stream, _)) = listener.accept().await else {
                return;
            };
            let counter = Arc::clone(&counter);
            tokio::spawn(async move {
                let service = service_fn(move |req: Request<Incoming>| {
                    counter.fetch_add(1, Ordering::SeqCst);
                    let response = origin_response(req.uri().path());
                    async move { Ok::<_, Infallible>(response) }
                });
                let _ = http1::Builder::new()
                    .serve_connection(TokioIo::new(stream), service)
                    .await;
            });
        }
    });

    (url, hits)
}

#[tokio::test]
async fn test_capture_promote_replay() {
    let harness = Harness::start().await;
    let client = harness.proxied_client();
    let url = format!("{}/greeting", harness.origin_url);

    let live = client.get(&url).send().await.unwrap();
    assert_eq!(live.status(), 200);
    let call_id = live
        .headers()
        .get("x-cassette-call-id")
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert_eq!(live.text().await.unwrap(), "origin saw /greeting");
    assert_eq!(harness.hits(), 1);

    let (status, calls) = harness.admin_json(reqwest::Method::GET, "/requests").await;
    assert_eq!(status, 200);
    assert_eq!(calls["count"], 1);
    assert_eq!(calls["data"][&call_id]["request"]["url"], url);

    let (status, promoted) = harness
        .admin_json(reqwest::Method::POST, &format!("/recordings/{call_id}"))
        .await;
    assert_eq!(status, 200);
    assert_eq!(promoted["data"]["id"], call_id);

    let replayed = client.get(&url).send().await.unwrap();
    assert_eq!(replayed.status(), 200);
    assert_eq!(
        replayed.headers().get("x-cassette-mapping-id").unwrap(),
        call_id.as_str()
    );
    assert_eq!(replayed.headers().get("x-origin").unwrap(), "live");
    assert_eq!(replayed.text().await.unwrap(), "origin saw /greeting");
    assert_eq!(harness.hits(), 1);
}

#[tokio::test]
async fn test_captured_gzip_promotes_to_plain_body() {
    let harness = Harness::start().await;
    let client = harness.proxied_client();
    let url = format!("{}/gz", harness.origin_url);

    let live = client.get(&url).send().await.unwrap();
    let call_id = live
        .headers()
        .get("x-cassette-call-id")
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();

    let (status, _) = harness
        .admin_json(reqwest::Method::POST, &format!("/recordings/{call_id}"))
        .await;
    assert_eq!(status, 200);

    let file = harness
        .admin
        .get(format!("{}/files/{}", harness.admin_url, call_id))
        .send()
        .await
        .unwrap();
    assert_eq!(file.headers().get("content-type").unwrap(), "text/plain");
    assert_eq!(file.text().await.unwrap(), "compressed hello");

    let (_, mapping) = harness
        .admin_json(reqwest::Method::GET, &format!("/mappings/{call_id}"))
        .await;
    assert!(mapping["data"]["response"]["header"]
        .get("Content-Encoding")
        .is_none());
}

#[tokio::test]
async fn test_imported_gzip_call_promotes() {
    let harness = Harness::start().await;
    let body = gzip(b"hello");
    let call = json!({
        "id": "abc",
        "request": {"url": "http://x/test", "method": "GET"},
        "response": {
            "status_code": 200,
            "header": {"Content-Encoding": ["gzip"]},
            "body_base64": base64::Engine::encode(&base64::engine::general_purpose::STANDARD, &body)
        }
    });

    let imported = harness
        .admin
        .post(format!("{}/requests", harness.admin_url))
        .json(&call)
        .send()
        .await
        .unwrap();
    assert_eq!(imported.status(), 200);

    let duplicate = harness
        .admin
        .post(format!("{}/requests", harness.admin_url))
        .json(&call)
        .send()
        .await
        .unwrap();
    assert_eq!(duplicate.status(), 409);

    let (status, _) = harness
        .admin_json(reqwest::Method::POST, "/recordings/abc")
        .await;
    assert_eq!(status, 200);

    let file = harness
        .admin
        .get(format!("{}/files/abc", harness.admin_url))
        .send()
        .await
        .unwrap();
    assert_eq!(file.text().await.unwrap(), "hello");

    // the stub answers without any origin behind http://x
    let replayed = harness
        .proxied_client()
        .get("http://x/test")
        .send()
        .await
        .unwrap();
    assert_eq!(replayed.status(), 200);
    assert!(replayed.headers().get("content-encoding").is_none());
    assert_eq!(replayed.text().await.unwrap(), "hello");
}

#[tokio::test]
async fn test_mapping_id_mismatch_rejected() {
    let harness = Harness::start().await;

    let response = harness
        .admin
        .put(format!("{}/mappings/one", harness.admin_url))
        .json(&json!({
            "id": "two",
            "request": {"url": "http://x/a", "method": "GET"},
            "response": {"status_code": 200, "body": "stub"}
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);
    let errors: Value = response.json().await.unwrap();
    assert_eq!(errors["errors"][0]["code"], "400");

    let (_, mappings) = harness.admin_json(reqwest::Method::GET, "/mappings").await;
    assert_eq!(mappings["count"], 0);
}

#[tokio::test]
async fn test_put_mapping_then_replace_body() {
    let harness = Harness::start().await;

    let response = harness
        .admin
        .put(format!("{}/mappings/m1", harness.admin_url))
        .json(&json!({
            "id": "m1",
            "request": {"url": "http://stub.test/doc", "method": "GET"},
            "response": {
                "status_code": 201,
                "header": {"Content-Type": ["application/json"]},
                "body": "{\"v\":1}"
            }
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let stored: Value = response.json().await.unwrap();
    assert_eq!(stored["data"]["id"], "m1");
    assert_eq!(stored["data"]["response"]["status_code"], 201);
    assert_eq!(stored["data"]["request"]["url"], "http://stub.test/doc");

    let client = harness.proxied_client();
    let stub = client.get("http://stub.test/doc").send().await.unwrap();
    assert_eq!(stub.status(), 201);
    assert_eq!(stub.text().await.unwrap(), "{\"v\":1}");

    let put = harness
        .admin
        .put(format!("{}/files/m1", harness.admin_url))
        .body("{\"v\":2}")
        .send()
        .await
        .unwrap();
    assert_eq!(put.status(), 200);

    let stub = client.get("http://stub.test/doc").send().await.unwrap();
    assert_eq!(stub.text().await.unwrap(), "{\"v\":2}");

    let (status, _) = harness
        .admin_json(reqwest::Method::DELETE, "/mappings/m1")
        .await;
    assert_eq!(status, 200);
    let (status, _) = harness
        .admin_json(reqwest::Method::DELETE, "/mappings/m1")
        .await;
    assert_eq!(status, 404);
}

#[tokio::test]
async fn test_clearing_calls_keeps_mappings() {
    let harness = Harness::start().await;
    let client = harness.proxied_client();

    let live = client
        .get(format!("{}/kept", harness.origin_url))
        .send()
        .await
        .unwrap();
    let call_id = live
        .headers()
        .get("x-cassette-call-id")
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    harness
        .admin_json(reqwest::Method::POST, &format!("/recordings/{call_id}"))
        .await;

    let (status, body) = harness.admin_json(reqwest::Method::DELETE, "/requests").await;
    assert_eq!(status, 200);
    assert_eq!(body["status"], "ok");

    let (_, calls) = harness.admin_json(reqwest::Method::GET, "/requests").await;
    assert_eq!(calls["count"], 0);
    let (_, mappings) = harness.admin_json(reqwest::Method::GET, "/mappings").await;
    assert_eq!(mappings["count"], 1);

    let (status, _) = harness
        .admin_json(reqwest::Method::GET, &format!("/requests/{call_id}"))
        .await;
    assert_eq!(status, 404);
}

#[tokio::test]
async fn test_unknown_ids_are_not_found() {
    let harness = Harness::start().await;
    for path in ["/requests/nope", "/mappings/nope", "/files/nope"] {
        let (status, _) = harness.admin_json(reqwest::Method::GET, path).await;
        assert_eq!(status, 404, "{path}");
    }
    let (status, _) = harness
        .admin_json(reqwest::Method::POST, "/recordings/nope")
        .await;
    assert_eq!(status, 404);
}

#[tokio::test]
async fn test_https_interception_replays_stub() {
    let harness = Harness::start().await;

    let response = harness
        .admin
        .put(format!("{}/mappings/secure", harness.admin_url))
        .json(&json!({
            "id": "secure",
            "request": {"url": "https://secure.test/hello", "method": "GET"},
            "response": {"status_code": 200, "body": "intercepted"}
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    let ca = harness
        .admin
        .get(format!("{}/ca.crt", harness.admin_url))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert_eq!(ca, harness.ca_pem);

    let client = reqwest::Client::builder()
        .proxy(reqwest::Proxy::https(&harness.proxy_url).unwrap())
        .add_root_certificate(reqwest::Certificate::from_pem(ca.as_bytes()).unwrap())
        .timeout(Duration::from_secs(10))
        .build()
        .unwrap();

    let stub = client.get("https://secure.test/hello").send().await.unwrap();
    assert_eq!(stub.status(), 200);
    assert_eq!(stub.headers().get("x-cassette-mapping-id").unwrap(), "secure");
    assert_eq!(stub.text().await.unwrap(), "intercepted");
    assert_eq!(harness.hits(), 0);
}

#[tokio::test]
async fn test_health_and_metrics() {
    let harness = Harness::start().await;
    let (status, health) = harness.admin_json(reqwest::Method::GET, "/health").await;
    assert_eq!(status, 200);
    assert_eq!(health["status"], "ok");

    let metrics = harness
        .admin
        .get(format!("{}/metrics", harness.admin_url))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(metrics.contains("cassette_store_entries"));
}
