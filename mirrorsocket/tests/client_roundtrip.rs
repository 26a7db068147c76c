//! End-to-end tests: real sockets, a tungstenite client, and a rustls client
//! that trusts the generated self-signed certificate.

#![cfg(feature = "server")]

use futures_util::{SinkExt, StreamExt};
use mirrorsocket::prelude::*;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::net::TcpStream;
use tokio_rustls::client::TlsStream;
use tokio_rustls::TlsConnector;
use tokio_tungstenite::client_async;
use tokio_tungstenite::tungstenite::Message;

const INDEX: &str = "<!doctype html><title>echo</title>";
const SCRIPT: &str = "const socket = new WebSocket('ws://localhost:8080');";

fn site() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(dir.path().join("public/js")).unwrap();
    std::fs::write(dir.path().join("public/index.html"), INDEX).unwrap();
    std::fs::write(dir.path().join("public/js/echo.js"), SCRIPT).unwrap();
    std::fs::write(dir.path().join("private.txt"), "keep out").unwrap();
    dir
}

fn plain(dir: &TempDir, sink: Arc<MemorySink>) -> EchoServer {
    EchoServer::builder()
        .bind("127.0.0.1", 0)
        .base_dir(dir.path())
        .event_sink(sink)
        .build_plain()
        .unwrap()
}

fn secure(dir: &TempDir) -> EchoServer {
    let tls = TlsConfig::in_dir(dir.path());
    EchoServer::builder()
        .bind("127.0.0.1", 0)
        .base_dir(dir.path())
        .tls(tls.cert_file, tls.key_file)
        .event_sink(Arc::new(MemorySink::new()))
        .build_secure()
        .unwrap()
}

struct AcceptAnyCert;

impl rustls::client::ServerCertVerifier for AcceptAnyCert {
    fn verify_server_cert(
        &self,
        _end_entity: &rustls::Certificate,
        _intermediates: &[rustls::Certificate],
        _server_name: &rustls::ServerName,
        _scts: &mut dyn Iterator<Item = &[u8]>,
        _ocsp_response: &[u8],
        _now: std::time::SystemTime,
    ) -> std::result::Result<rustls::client::ServerCertVerified, rustls::Error> {
        Ok(rustls::client::ServerCertVerified::assertion())
    }
}

async fn tls_connect(addr: SocketAddr) -> TlsStream<TcpStream> {
    let config = rustls::ClientConfig::builder()
        .with_safe_defaults()
        .with_custom_certificate_verifier(Arc::new(AcceptAnyCert))
        .with_no_client_auth();
    let connector = TlsConnector::from(Arc::new(config));
    let tcp = TcpStream::connect(addr).await.unwrap();
    let name = rustls::ServerName::try_from("localhost").unwrap();
    connector.connect(name, tcp).await.unwrap()
}

async fn exchange<S>(mut stream: S, request: &str) -> String
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    stream.write_all(request.as_bytes()).await.unwrap();
    let mut response = Vec::new();
    stream.read_to_end(&mut response).await.unwrap();
    String::from_utf8_lossy(&response).into_owned()
}

#[tokio::test]
async fn ws_echo_roundtrip() {
    let dir = site();
    let sink = Arc::new(MemorySink::new());
    let server = plain(&dir, sink.clone());
    let addr = server.start().await.unwrap();

    let tcp = TcpStream::connect(addr).await.unwrap();
    let (mut ws, response) = client_async(format!("ws://{}/", addr), tcp).await.unwrap();
    assert_eq!(response.status(), 101);

    ws.send(Message::Text("ping".into())).await.unwrap();
    assert_eq!(ws.next().await.unwrap().unwrap(), Message::Text("ping".into()));

    // Nothing else arrives for a single message.
    let extra = tokio::time::timeout(Duration::from_millis(200), ws.next()).await;
    assert!(extra.is_err());

    for word in ["one", "two", "three"] {
        ws.send(Message::Text(word.into())).await.unwrap();
    }
    for word in ["one", "two", "three"] {
        assert_eq!(ws.next().await.unwrap().unwrap(), Message::Text(word.into()));
    }

    ws.close(None).await.unwrap();
    while ws.next().await.is_some() {}
    server.stop().await.unwrap();

    let lines = sink.lines();
    assert!(lines.contains(&"[WebSocket connection opened]".to_string()));
    assert!(lines.contains(&"=> \"ping\"".to_string()));
    assert!(lines.contains(&"<= \"ping\"".to_string()));
    assert!(lines.contains(&"[WebSocket connection closed]".to_string()));
}

#[tokio::test]
async fn wss_echo_roundtrip() {
    let dir = site();
    let server = secure(&dir);
    assert_eq!(server.name(), "HTTPS Server");
    let addr = server.start().await.unwrap();

    let tls = tls_connect(addr).await;
    let (mut ws, _) = client_async("wss://localhost/", tls).await.unwrap();

    ws.send(Message::Text("ping".into())).await.unwrap();
    assert_eq!(ws.next().await.unwrap().unwrap(), Message::Text("ping".into()));

    ws.send(Message::Binary(vec![0, 159, 146, 150])).await.unwrap();
    assert_eq!(
        ws.next().await.unwrap().unwrap(),
        Message::Binary(vec![0, 159, 146, 150])
    );

    ws.close(None).await.unwrap();
    while ws.next().await.is_some() {}
    server.stop().await.unwrap();
}

#[tokio::test]
async fn https_serves_public_files() {
    let dir = site();
    let server = secure(&dir);
    let addr = server.start().await.unwrap();

    let response = exchange(
        tls_connect(addr).await,
        "GET / HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n",
    )
    .await;
    assert!(response.starts_with("HTTP/1.1 200 OK\r\n"));
    assert!(response.contains("Content-Type: text/html\r\n"));
    assert!(response.contains(&format!("Content-Length: {}\r\n", INDEX.len())));
    assert!(response.ends_with(INDEX));

    server.stop().await.unwrap();
}

#[tokio::test]
async fn http_static_surface() {
    let dir = site();
    let server = plain(&dir, Arc::new(MemorySink::new()));
    let addr = server.start().await.unwrap();

    let script = exchange(
        TcpStream::connect(addr).await.unwrap(),
        "GET /public/js/echo.js HTTP/1.1\r\nHost: x\r\nConnection: close\r\n\r\n",
    )
    .await;
    assert!(script.starts_with("HTTP/1.1 200 OK\r\n"));
    assert!(script.contains("Content-Type: application/javascript\r\n"));
    assert!(script.ends_with(SCRIPT));

    for target in ["/private.txt", "/public/../private.txt", "/../../etc/passwd", "/nonexistent"] {
        let response = exchange(
            TcpStream::connect(addr).await.unwrap(),
            &format!("GET {} HTTP/1.1\r\nHost: x\r\nConnection: close\r\n\r\n", target),
        )
        .await;
        assert!(response.starts_with("HTTP/1.1 404 Not Found\r\n"), "{}: {}", target, response);
    }

    for method in ["POST", "PUT", "DELETE", "HEAD"] {
        let response = exchange(
            TcpStream::connect(addr).await.unwrap(),
            &format!("{} /public/index.html HTTP/1.1\r\nHost: x\r\n\r\n", method),
        )
        .await;
        assert!(response.starts_with("HTTP/1.1 405 Method Not Allowed\r\n"));
        assert!(response.contains("Content-Type: text/plain\r\n"));
        assert!(response.ends_with("Try GET /"));
    }

    server.stop().await.unwrap();
}

#[tokio::test]
async fn repeated_fetch_is_served_from_cache() {
    let dir = site();
    let server = plain(&dir, Arc::new(MemorySink::new()));
    let addr = server.start().await.unwrap();
    let request = "GET /public/index.html HTTP/1.1\r\nHost: x\r\nConnection: close\r\n\r\n";

    let first = exchange(TcpStream::connect(addr).await.unwrap(), request).await;
    std::fs::remove_file(dir.path().join("public/index.html")).unwrap();
    let second = exchange(TcpStream::connect(addr).await.unwrap(), request).await;
    assert_eq!(first, second);

    server.stop().await.unwrap();
}

#[tokio::test]
async fn stop_closes_open_sessions() {
    let dir = site();
    let server = plain(&dir, Arc::new(MemorySink::new()));
    let addr = server.start().await.unwrap();

    let tcp = TcpStream::connect(addr).await.unwrap();
    let (mut ws, _) = client_async(format!("ws://{}/", addr), tcp).await.unwrap();
    ws.send(Message::Text("hello".into())).await.unwrap();
    ws.next().await.unwrap().unwrap();
    assert_eq!(server.active_sessions().await, 1);

    let client = tokio::spawn(async move {
        let mut saw_close = false;
        while let Some(Ok(message)) = ws.next().await {
            saw_close |= message.is_close();
        }
        saw_close
    });

    server.stop().await.unwrap();
    assert!(client.await.unwrap());
    assert!(TcpStream::connect(addr).await.is_err());
}

#[tokio::test]
async fn tls_material_is_generated_once() {
    let dir = site();
    let tls = TlsConfig::in_dir(dir.path());

    drop(secure(&dir));
    let cert = std::fs::read(&tls.cert_file).unwrap();
    let key = std::fs::read(&tls.key_file).unwrap();
    assert!(!cert.is_empty());
    assert!(!key.is_empty());

    let sink = Arc::new(MemorySink::new());
    let _again = EchoServer::builder()
        .base_dir(dir.path())
        .tls(&tls.cert_file, &tls.key_file)
        .event_sink(sink.clone())
        .build_secure()
        .unwrap();
    assert_eq!(std::fs::read(&tls.cert_file).unwrap(), cert);
    assert_eq!(std::fs::read(&tls.key_file).unwrap(), key);
    assert!(!sink.contains(|e| *e == ServerEvent::GeneratingCertificate));
}
