//! Per-connection request pipeline.
//!
//! # States
//! ```text
//! ReadRequest → ParseURI → CacheLookup ─hit──▶ write cached body ─────────────▶ Closed
//!                                      └miss─▶ Connect → Forward → Relay → MaybeInsert → Closed
//! ```
//! Any failure jumps straight to `Closed`, after a diagnostic response when
//! nothing has been sent to the client yet.
//!
//! A cached body is written under the slot's read lock, so that write is
//! bounded by the hit write timeout. On a miss the client is released as soon
//! as the relay finishes; `MaybeInsert` runs after the client has its answer.

use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufRead, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};

use crate::cache::ObjectCache;
use crate::error::ProxyError;
use crate::http::{parse_target, read_request};
use crate::observability::metrics;
use crate::origin::OriginConnector;
use crate::proxy::relay::relay;

/// How a successfully handled connection was served.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Body written straight from a cache slot.
    CacheHit { bytes: u64 },
    /// Relayed from the origin; `cached` says whether it was stored.
    Forwarded { bytes: u64, cached: bool },
}

/// Default bound on writing a cached body to the client.
pub const DEFAULT_HIT_WRITE_TIMEOUT: Duration = Duration::from_secs(10);

/// Runs the request pipeline for one client connection at a time. Shared by
/// every connection task.
#[derive(Debug)]
pub struct ConnectionHandler {
    cache: Arc<ObjectCache>,
    connector: OriginConnector,
    hit_write_timeout: Duration,
}

impl ConnectionHandler {
    pub fn new(cache: Arc<ObjectCache>, connector: OriginConnector) -> Self {
        Self {
            cache,
            connector,
            hit_write_timeout: DEFAULT_HIT_WRITE_TIMEOUT,
        }
    }

    pub fn with_hit_write_timeout(mut self, timeout: Duration) -> Self {
        self.hit_write_timeout = timeout;
        self
    }

    pub fn cache(&self) -> &Arc<ObjectCache> {
        &self.cache
    }

    /// Serve one request on `stream`, then shut down its write side.
    ///
    /// The origin connection, if one was opened, is closed before this returns.
    pub async fn serve<S>(&self, stream: S) -> Result<Outcome, ProxyError>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let (reader, mut writer) = tokio::io::split(stream);
        let mut reader = BufReader::new(reader);

        let result = self.process(&mut reader, &mut writer).await;

        if let Err(err) = &result {
            if let Some(diagnostic) = err.diagnostic() {
                let response = diagnostic.render(&err.to_string());
                match writer.write_all(&response).await {
                    Ok(()) => {
                        let _ = writer.flush().await;
                    }
                    Err(e) => tracing::debug!(error = %e, "Could not send diagnostic response"),
                }
            }
        }
        let _ = writer.shutdown().await;

        result
    }

    async fn process<R, W>(&self, reader: &mut R, writer: &mut W) -> Result<Outcome, ProxyError>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let head = read_request(reader).await?;
        tracing::info!(
            method = %head.method,
            uri = %head.uri,
            version = %head.version,
            "Request received"
        );

        if !head.is_get() {
            metrics::record_rejected("method");
            return Err(ProxyError::UnsupportedMethod(head.method));
        }

        let target = parse_target(&head.uri).inspect_err(|_| metrics::record_rejected("target"))?;

        if let Some(hit) = self.cache.lookup(&head.uri).await {
            let slot = hit.slot();
            let bytes = hit.body().len() as u64;
            let written = tokio::time::timeout(self.hit_write_timeout, async {
                writer.write_all(hit.body()).await?;
                writer.flush().await?;
                Ok::<_, std::io::Error>(())
            })
            .await;
            drop(hit);

            match written {
                Ok(result) => result.map_err(ProxyError::ClientWrite)?,
                Err(_) => {
                    tracing::warn!(slot, "Client stalled on cached response, releasing slot");
                    return Err(ProxyError::ClientStalled {
                        secs: self.hit_write_timeout.as_secs(),
                    });
                }
            }
            tracing::info!(slot, bytes, "Served from cache");
            metrics::record_relayed_bytes("cache", bytes);
            return Ok(Outcome::CacheHit { bytes });
        }

        let mut origin = self
            .connector
            .connect(&target)
            .await
            .inspect_err(|e| metrics::record_origin_error(e.kind()))?;
        self.connector
            .forward(&mut origin, &head.method, &target)
            .await
            .inspect_err(|e| metrics::record_origin_error(e.kind()))?;

        let relayed = relay(&mut origin, writer, self.cache.max_object_size()).await?;
        drop(origin);
        if let Err(e) = writer.shutdown().await {
            tracing::debug!(error = %e, "Client shutdown after relay failed");
        }
        metrics::record_relayed_bytes("origin", relayed.bytes);

        let cached = match relayed.captured {
            Some(body) if body.is_empty() => {
                metrics::record_cache_skipped("empty");
                false
            }
            Some(body) => match self.cache.insert(&head.uri, body).await {
                Ok(_) => true,
                Err(e) => {
                    tracing::debug!(error = %e, "Response not cached");
                    metrics::record_cache_skipped("oversize");
                    false
                }
            },
            None => {
                metrics::record_cache_skipped("oversize");
                false
            }
        };

        tracing::info!(bytes = relayed.bytes, cached, "Relayed from origin");
        Ok(Outcome::Forwarded {
            bytes: relayed.bytes,
            cached,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OriginConfig;
    use crate::http::RequestError;
    use crate::proxy::relay::RelayError;
    use std::net::SocketAddr;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::io::{AsyncReadExt, DuplexStream};
    use tokio::net::TcpListener;

    /// Origin that answers every connection with `response` and counts connections.
    async fn spawn_origin(response: Vec<u8>) -> (SocketAddr, Arc<AtomicUsize>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                counter.fetch_add(1, Ordering::SeqCst);
                let response = response.clone();
                tokio::spawn(async move {
                    let mut request = vec![0u8; 1024];
                    let _ = socket.read(&mut request).await;
                    let _ = socket.write_all(&response).await;
                    let _ = socket.shutdown().await;
                });
            }
        });
        (addr, hits)
    }

    fn handler(slots: usize, max_object_size: usize) -> ConnectionHandler {
        ConnectionHandler::new(
            Arc::new(ObjectCache::new(slots, max_object_size)),
            OriginConnector::new(&OriginConfig::default()),
        )
    }

    async fn exchange(
        handler: &ConnectionHandler,
        request: impl AsRef<[u8]>,
    ) -> (Result<Outcome, ProxyError>, Vec<u8>) {
        let (mut client, proxy_side): (DuplexStream, DuplexStream) = tokio::io::duplex(64 * 1024);
        client.write_all(request.as_ref()).await.unwrap();
        client.shutdown().await.unwrap();

        let (result, received) = tokio::join!(handler.serve(proxy_side), async move {
            let mut received = Vec::new();
            client.read_to_end(&mut received).await.unwrap();
            received
        });
        (result, received)
    }

    fn get(uri: &str) -> String {
        format!("GET {} HTTP/1.0\r\nHost: ignored\r\n\r\n", uri)
    }

    #[tokio::test]
    async fn miss_then_hit() {
        let response = b"HTTP/1.0 200 OK\r\n\r\nhello".to_vec();
        let (addr, origin_hits) = spawn_origin(response.clone()).await;
        let handler = handler(10, 1024);
        let uri = format!("http://{}/hello", addr);

        let (first, body) = exchange(&handler, get(&uri)).await;
        assert_eq!(
            first.unwrap(),
            Outcome::Forwarded {
                bytes: response.len() as u64,
                cached: true
            }
        );
        assert_eq!(body, response);

        let (second, body) = exchange(&handler, get(&uri)).await;
        assert_eq!(
            second.unwrap(),
            Outcome::CacheHit {
                bytes: response.len() as u64
            }
        );
        assert_eq!(body, response);
        assert_eq!(origin_hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn oversized_response_delivered_but_not_cached() {
        let mut response = b"HTTP/1.0 200 OK\r\n\r\n".to_vec();
        response.extend(std::iter::repeat(b'z').take(4096));
        let (addr, _) = spawn_origin(response.clone()).await;
        let handler = handler(10, 1024);
        let uri = format!("http://{}/big", addr);

        let (result, body) = exchange(&handler, get(&uri)).await;
        assert!(matches!(result.unwrap(), Outcome::Forwarded { cached: false, .. }));
        assert_eq!(body, response);
        assert!(handler.cache().lookup(&uri).await.is_none());
    }

    #[tokio::test]
    async fn non_get_never_contacts_origin() {
        let (addr, origin_hits) = spawn_origin(b"HTTP/1.0 200 OK\r\n\r\n".to_vec()).await;
        let handler = handler(10, 1024);
        let request = format!("POST http://{}/form HTTP/1.0\r\n\r\n", addr);

        let (result, body) = exchange(&handler, request).await;
        assert!(matches!(result, Err(ProxyError::UnsupportedMethod(ref m)) if m == "POST"));
        assert!(body.starts_with(b"HTTP/1.0 501 Not Implemented\r\n"));
        assert_eq!(origin_hits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn target_without_scheme_is_bad_request() {
        let handler = handler(10, 1024);
        let (result, body) = exchange(&handler, get("/index.html")).await;
        assert!(matches!(result, Err(ProxyError::Target(_))));
        assert!(body.starts_with(b"HTTP/1.0 400 Bad Request\r\n"));
    }

    #[tokio::test]
    async fn unreachable_origin_leaves_cache_untouched() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let handler = handler(4, 1024);
        let (result, body) = exchange(&handler, get(&format!("http://127.0.0.1:{}/", port))).await;
        assert!(matches!(result, Err(ProxyError::Origin(_))));
        assert!(body.starts_with(b"HTTP/1.0 502 Bad Gateway\r\n"));
        assert!(handler
            .cache()
            .snapshot()
            .await
            .iter()
            .all(|slot| slot.key.is_none()));
    }

    #[tokio::test]
    async fn silent_client_is_closed_without_response() {
        let handler = handler(1, 1024);
        let (result, body) = exchange(&handler, String::new()).await;
        assert!(matches!(result, Err(ProxyError::Request(RequestError::Closed))));
        assert!(body.is_empty());
    }

    #[tokio::test]
    async fn empty_origin_response_not_cached() {
        let (addr, _) = spawn_origin(Vec::new()).await;
        let handler = handler(1, 1024);
        let uri = format!("http://{}/", addr);

        let (result, body) = exchange(&handler, get(&uri)).await;
        assert_eq!(result.unwrap(), Outcome::Forwarded { bytes: 0, cached: false });
        assert!(body.is_empty());
    }

    #[tokio::test]
    async fn non_utf8_header_still_forwarded() {
        let response = b"HTTP/1.0 200 OK\r\n\r\nbonjour".to_vec();
        let (addr, origin_hits) = spawn_origin(response.clone()).await;
        let handler = handler(2, 1024);
        let mut request = format!("GET http://{}/ HTTP/1.0\r\n", addr).into_bytes();
        request.extend_from_slice(b"X-Name: caf\xe9\r\n\r\n");

        let (result, body) = exchange(&handler, request).await;
        assert!(matches!(result.unwrap(), Outcome::Forwarded { cached: true, .. }));
        assert_eq!(body, response);
        assert_eq!(origin_hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn stalled_hit_client_releases_slot() {
        let uri = "http://example.com/big";
        let handler = handler(1, 1 << 20).with_hit_write_timeout(Duration::from_millis(100));
        handler.cache().insert(uri, vec![b'x'; 256 * 1024]).await.unwrap();

        // small pipe that the client never drains
        let (mut client, proxy_side) = tokio::io::duplex(1024);
        client.write_all(get(uri).as_bytes()).await.unwrap();
        client.shutdown().await.unwrap();

        let result = handler.serve(proxy_side).await;
        assert!(matches!(result, Err(ProxyError::ClientStalled { .. })));
        assert_eq!(handler.cache().active_readers(0), 0);

        tokio::time::timeout(
            Duration::from_secs(1),
            handler.cache().insert(uri, b"new".to_vec()),
        )
        .await
        .expect("slot released after the stalled write")
        .unwrap();
        drop(client);
    }

    #[tokio::test]
    async fn client_gone_mid_relay_leaves_cache_empty() {
        let mut response = b"HTTP/1.0 200 OK\r\n\r\n".to_vec();
        response.extend(std::iter::repeat(b'r').take(256 * 1024));
        let (addr, _) = spawn_origin(response).await;
        let handler = handler(4, 1 << 20);
        let uri = format!("http://{}/partial", addr);

        let (mut client, proxy_side) = tokio::io::duplex(1024);
        client.write_all(get(&uri).as_bytes()).await.unwrap();
        client.shutdown().await.unwrap();

        let (result, ()) = tokio::join!(handler.serve(proxy_side), async move {
            let mut first = [0u8; 512];
            client.read_exact(&mut first).await.unwrap();
            drop(client);
        });

        assert!(matches!(result, Err(ProxyError::Relay(RelayError::Client(_)))));
        assert!(handler
            .cache()
            .snapshot()
            .await
            .iter()
            .all(|slot| slot.key.is_none()));
    }
}
