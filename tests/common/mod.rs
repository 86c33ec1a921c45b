//! Shared utilities for integration and load testing.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use caching_proxy::config::ProxyConfig;
use caching_proxy::net::Listener;
use caching_proxy::{ObjectCache, ProxyServer, Shutdown};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};

/// A mock origin server that counts the connections it receives.
pub struct MockOrigin {
    pub addr: SocketAddr,
    connections: Arc<AtomicUsize>,
}

impl MockOrigin {
    pub fn connections(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

/// Start an origin that answers each request with `respond(request_line)`,
/// then closes the connection.
pub async fn start_origin<F>(respond: F) -> MockOrigin
where
    F: Fn(&str) -> Vec<u8> + Send + Sync + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let connections = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&connections);
    let respond = Arc::new(respond);

    tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            counter.fetch_add(1, Ordering::SeqCst);
            let respond = Arc::clone(&respond);
            tokio::spawn(async move {
                let mut reader = BufReader::new(socket);
                let mut request_line = String::new();
                if reader.read_line(&mut request_line).await.is_err() {
                    return;
                }
                let mut line = String::new();
                loop {
                    line.clear();
                    match reader.read_line(&mut line).await {
                        Ok(0) | Err(_) => break,
                        Ok(_) if line == "\r\n" => break,
                        Ok(_) => {}
                    }
                }
                let response = (*respond)(request_line.trim_end());
                let mut socket = reader.into_inner();
                let _ = socket.write_all(&response).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    MockOrigin { addr, connections }
}

/// Build an HTTP/1.0 response with the given body.
pub fn http_response(body: &[u8]) -> Vec<u8> {
    let mut out = format!(
        "HTTP/1.0 200 OK\r\nContent-Type: text/plain\r\nContent-Length: {}\r\n\r\n",
        body.len()
    )
    .into_bytes();
    out.extend_from_slice(body);
    out
}

/// A running proxy bound to an ephemeral port.
pub struct TestProxy {
    pub addr: SocketAddr,
    pub cache: Arc<ObjectCache>,
    pub shutdown: Shutdown,
}

pub async fn start_proxy(config: ProxyConfig) -> TestProxy {
    let listener = Listener::from(TcpListener::bind("127.0.0.1:0").await.unwrap());
    let addr = listener.local_addr().unwrap();
    let server = ProxyServer::new(&config);
    let cache = server.cache();
    let shutdown = Shutdown::new();
    tokio::spawn(server.run(listener, shutdown.subscribe()));
    TestProxy {
        addr,
        cache,
        shutdown,
    }
}

/// Send `request` verbatim and read until the proxy closes the connection.
pub async fn send_raw(proxy: SocketAddr, request: &str) -> Vec<u8> {
    let mut stream = TcpStream::connect(proxy).await.unwrap();
    stream.write_all(request.as_bytes()).await.unwrap();
    let mut response = Vec::new();
    stream.read_to_end(&mut response).await.unwrap();
    response
}

pub async fn get(proxy: SocketAddr, url: &str) -> Vec<u8> {
    send_raw(
        proxy,
        &format!("GET {} HTTP/1.0\r\nHost: proxy\r\nUser-Agent: test\r\n\r\n", url),
    )
    .await
}
