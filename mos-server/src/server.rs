//! TCP server (spec §4.7): accept loop, session registry, fan-out broadcast,
//! and graceful shutdown. Grounded on the Go original's `server.Server`.

use crate::config::Config;
use crate::events::EventBus;
use crate::service::MosService;
use crate::session::{Session, SessionHandle};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// The live set of connected sessions, shared between the accept loop and
/// anything that needs to broadcast or shut sessions down.
#[derive(Clone, Default)]
pub struct Registry {
    sessions: Arc<RwLock<HashMap<String, SessionHandle>>>,
}

impl Registry {
    pub async fn register(&self, handle: SessionHandle) {
        self.sessions
            .write()
            .await
            .insert(handle.id.clone(), handle);
    }

    pub async fn unregister(&self, id: &str) {
        self.sessions.write().await.remove(id);
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    /// Writes `data` to every connected session, spawning one write task per
    /// session so a single slow/stuck client can't stall the others.
    pub async fn broadcast(&self, data: String) {
        let handles: Vec<_> = self.sessions.read().await.values().cloned().collect();
        for handle in handles {
            let data = data.clone();
            tokio::spawn(async move {
                if let Err(e) = handle.write(&data).await {
                    error!(session = %handle.id, error = %e, "broadcast write failed");
                }
            });
        }
    }

    pub async fn close_all(&self) {
        for handle in self.sessions.read().await.values() {
            handle.close();
        }
    }
}

pub struct Server {
    config: Arc<Config>,
    service: Arc<MosService>,
    events: EventBus,
    registry: Registry,
}

impl Server {
    pub fn new(config: Config, service: MosService, events: EventBus) -> Self {
        Self {
            config: Arc::new(config),
            service: Arc::new(service),
            events,
            registry: Registry::default(),
        }
    }

    pub fn registry(&self) -> Registry {
        self.registry.clone()
    }

    /// Binds the configured address. Split from `run` so tests can bind an
    /// ephemeral port (`:0`) and read back the assigned address.
    pub async fn bind(&self) -> std::io::Result<TcpListener> {
        let listener = TcpListener::bind(self.config.address()).await?;
        info!(address = %self.config.address(), "mos server listening");
        Ok(listener)
    }

    /// Runs the accept loop until `shutdown` is cancelled, then waits (up to
    /// `server.shutdown_timeout`) for in-flight sessions to drain.
    pub async fn run(&self, shutdown: CancellationToken) -> std::io::Result<()> {
        let listener = self.bind().await?;
        self.serve(listener, shutdown).await
    }

    /// Runs the accept loop against an already-bound listener.
    pub async fn serve(
        &self,
        listener: TcpListener,
        shutdown: CancellationToken,
    ) -> std::io::Result<()> {
        let mut next_id: u64 = 0;
        let mut session_tasks = Vec::new();

        loop {
            if shutdown.is_cancelled() {
                break;
            }

            let accepted = tokio::select! {
                _ = shutdown.cancelled() => break,
                r = tokio::time::timeout(std::time::Duration::from_secs(1), listener.accept()) => r,
            };

            let (stream, addr) = match accepted {
                Err(_elapsed) => continue,
                Ok(Ok(pair)) => pair,
                Ok(Err(e)) => {
                    error!(error = %e, "accept failed");
                    continue;
                }
            };

            next_id += 1;
            let id = format!("session-{next_id}-{addr}");
            info!(session = %id, %addr, "client connected");

            let config = self.config.clone();
            let service = self.service.clone();
            let events = self.events.clone();
            let registry = self.registry.clone();
            let session_shutdown = shutdown.clone();

            session_tasks.push(tokio::spawn(async move {
                Session::run(
                    stream,
                    id,
                    config,
                    service,
                    events,
                    registry,
                    session_shutdown,
                )
                .await;
            }));
        }

        info!("shutting down, closing active sessions");
        self.registry.close_all().await;

        let drain = async {
            for task in session_tasks {
                let _ = task.await;
            }
        };
        if tokio::time::timeout(self.config.server.shutdown_timeout, drain)
            .await
            .is_err()
        {
            error!("shutdown timed out waiting for sessions to drain");
        }

        Ok(())
    }
}
