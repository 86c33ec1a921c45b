//! Accept loop: one detached task per client connection.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tracing::Instrument;

use crate::cache::ObjectCache;
use crate::config::ProxyConfig;
use crate::net::{ConnectionTracker, Listener};
use crate::origin::OriginConnector;
use crate::proxy::handler::{ConnectionHandler, Outcome};

/// Pause after a failed accept so a persistent error (e.g. fd exhaustion)
/// does not spin the loop.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(50);

/// The caching proxy: owns the shared cache and spawns connection handlers.
pub struct ProxyServer {
    handler: Arc<ConnectionHandler>,
    tracker: ConnectionTracker,
}

impl ProxyServer {
    /// Build the cache and origin connector from `config`.
    pub fn new(config: &ProxyConfig) -> Self {
        let cache = Arc::new(ObjectCache::from_config(&config.cache));
        let connector = OriginConnector::new(&config.origin);
        let handler = ConnectionHandler::new(cache, connector)
            .with_hit_write_timeout(Duration::from_secs(config.cache.hit_write_timeout_secs));
        Self {
            handler: Arc::new(handler),
            tracker: ConnectionTracker::new(),
        }
    }

    /// The cache shared by every connection.
    pub fn cache(&self) -> Arc<ObjectCache> {
        Arc::clone(self.handler.cache())
    }

    /// Live-connection tracker, for draining after shutdown.
    pub fn tracker(&self) -> ConnectionTracker {
        self.tracker.clone()
    }

    /// Accept connections until `shutdown` fires.
    ///
    /// Handler failures are logged and never stop the loop. Tasks already
    /// running when shutdown arrives are left to finish.
    pub async fn run(self, listener: Listener, mut shutdown: broadcast::Receiver<()>) {
        match listener.local_addr() {
            Ok(addr) => tracing::info!(address = %addr, "Proxy accepting connections"),
            Err(e) => tracing::warn!(error = %e, "Proxy accepting on unknown address"),
        }

        loop {
            let (stream, peer) = tokio::select! {
                accepted = listener.accept() => match accepted {
                    Ok(conn) => conn,
                    Err(e) => {
                        tracing::warn!(error = %e, "Accept failed");
                        tokio::time::sleep(ACCEPT_BACKOFF).await;
                        continue;
                    }
                },
                _ = shutdown.recv() => {
                    tracing::info!("Shutdown signal received, no longer accepting");
                    break;
                }
            };

            let guard = self.tracker.track();
            let handler = Arc::clone(&self.handler);
            let span = tracing::info_span!(
                "connection",
                connection_id = %guard.id(),
                peer_addr = %peer,
            );

            tokio::spawn(
                async move {
                    match handler.serve(stream).await {
                        Ok(Outcome::CacheHit { bytes }) => {
                            tracing::debug!(bytes, "Connection served from cache")
                        }
                        Ok(Outcome::Forwarded { bytes, cached }) => {
                            tracing::debug!(bytes, cached, "Connection served from origin")
                        }
                        Err(e) if e.is_client_fault() => {
                            tracing::info!(error = %e, "Request rejected")
                        }
                        Err(e) => tracing::warn!(error = %e, "Request failed"),
                    }
                    drop(guard);
                }
                .instrument(span),
            );
        }
    }
}
