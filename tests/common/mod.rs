//! Shared utilities for gateway integration tests.
#![allow(dead_code)]

use axum::body::{Body, Bytes};
use axum::http::{HeaderMap, Method, Request, Uri};
use axum::response::Response;
use axum::Router;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;

use api_gateway::config::{GatewayConfig, RouteConfig};
use api_gateway::{HttpServer, Shutdown};

/// What a mock backend saw for one request.
#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: Method,
    pub uri: Uri,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// Requests received by a mock backend, in arrival order.
#[derive(Debug, Clone, Default)]
pub struct Recorder {
    inner: Arc<Mutex<Vec<Recorded>>>,
}

impl Recorder {
    fn push(&self, recorded: Recorded) {
        self.inner.lock().unwrap().push(recorded);
    }

    pub fn count(&self) -> usize {
        self.inner.lock().unwrap().len()
    }

    pub fn last(&self) -> Recorded {
        self.inner
            .lock()
            .unwrap()
            .last()
            .cloned()
            .expect("backend received no request")
    }
}

/// Start an axum backend on an ephemeral port that records every request
/// and answers with `respond`.
pub async fn start_recording_backend<F>(respond: F) -> (SocketAddr, Recorder)
where
    F: Fn(&Recorded) -> Response + Clone + Send + Sync + 'static,
{
    let recorder = Recorder::default();
    let handler_recorder = recorder.clone();

    let app = Router::new().fallback(move |request: Request<Body>| {
        let recorder = handler_recorder.clone();
        let respond = respond.clone();
        async move {
            let (parts, body) = request.into_parts();
            let body = axum::body::to_bytes(body, usize::MAX).await.unwrap_or_default();
            let recorded = Recorded {
                method: parts.method,
                uri: parts.uri,
                headers: parts.headers,
                body,
            };
            let response = respond(&recorded);
            recorder.push(recorded);
            response
        }
    });

    (serve(app).await, recorder)
}

/// Serve an arbitrary axum app on an ephemeral port.
pub async fn serve(app: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    addr
}

/// A backend that accepts connections and never answers.
pub async fn start_silent_backend() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });
    addr
}

/// An address nothing listens on.
pub async fn closed_port() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr
}

/// A running gateway. Shuts down when dropped.
pub struct TestGateway {
    pub addr: SocketAddr,
    pub updates: mpsc::UnboundedSender<GatewayConfig>,
    shutdown: Shutdown,
}

impl TestGateway {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

impl Drop for TestGateway {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

/// Config with the given routes and test-friendly timeouts.
pub fn config_with(routes: Vec<RouteConfig>) -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.listener.bind_address = "127.0.0.1:0".to_string();
    config.routes = routes;
    config.timeouts.connect_secs = 2;
    config.timeouts.upstream_secs = 5;
    config.observability.metrics_enabled = false;
    config
}

pub async fn start_gateway(routes: Vec<RouteConfig>) -> TestGateway {
    start_gateway_with(config_with(routes)).await
}

pub async fn start_gateway_with(config: GatewayConfig) -> TestGateway {
    let listener = TcpListener::bind(&config.listener.bind_address).await.unwrap();
    let addr = listener.local_addr().unwrap();

    let server = HttpServer::new(config).unwrap();
    let shutdown = Shutdown::new();
    let (updates, config_updates) = mpsc::unbounded_channel();
    let server_shutdown = shutdown.subscribe();

    tokio::spawn(async move {
        let _ = server.run(listener, config_updates, server_shutdown).await;
    });

    TestGateway {
        addr,
        updates,
        shutdown,
    }
}

/// Write one chunk of a hand-framed chunked HTTP/1.1 body, so a test controls
/// when each chunk leaves the client.
pub async fn write_chunk(stream: &mut TcpStream, chunk: &[u8]) {
    stream
        .write_all(format!("{:x}\r\n", chunk.len()).as_bytes())
        .await
        .unwrap();
    stream.write_all(chunk).await.unwrap();
    stream.write_all(b"\r\n").await.unwrap();
    stream.flush().await.unwrap();
}

/// Terminate a chunked body.
pub async fn finish_chunks(stream: &mut TcpStream) {
    stream.write_all(b"0\r\n\r\n").await.unwrap();
    stream.flush().await.unwrap();
}

/// Route `service` to `http://<addr>/<service>`, the way the backends mount.
pub fn route_to(service: &str, addr: SocketAddr) -> RouteConfig {
    RouteConfig::new(service, format!("http://{}/{}", addr, service))
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .no_proxy()
        .timeout(Duration::from_secs(15))
        .build()
        .unwrap()
}
