//! Memoized table of connected remote services.
//!
//! The registry is owned by whoever hosts the pipeline and injected where
//! services are needed. Handles are keyed by `serviceUrl:version`. The first
//! caller for a key runs the connect future; concurrent callers for the same
//! key wait for it and share the result. A failed connect leaves the key
//! empty so the next caller tries again.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use tokio::sync::{Mutex, OnceCell};
use tracing::{debug, info};

pub struct ServiceRegistry<S> {
    services: Mutex<HashMap<String, Arc<OnceCell<Arc<S>>>>>,
}

impl<S> Default for ServiceRegistry<S> {
    fn default() -> Self {
        Self {
            services: Mutex::new(HashMap::new()),
        }
    }
}

impl<S> ServiceRegistry<S> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry key for a service URL and protocol version.
    pub fn key(url: &str, version: &str) -> String {
        format!("{}:{}", url, version)
    }

    /// Return the connected service for (`url`, `version`), running
    /// `connect` if no connection has succeeded yet.
    pub async fn get_or_connect<F, Fut, E>(&self, url: &str, version: &str, connect: F) -> Result<Arc<S>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<S, E>>,
    {
        let key = Self::key(url, version);
        let cell = {
            let mut services = self.services.lock().await;
            services.entry(key.clone()).or_default().clone()
        };

        if let Some(service) = cell.get() {
            debug!(key = %key, "Reusing connected service");
            return Ok(service.clone());
        }

        let service = cell
            .get_or_try_init(move || async move {
                connect().await.map(|service| {
                    info!(key = %key, "Connected service");
                    Arc::new(service)
                })
            })
            .await?;
        Ok(service.clone())
    }

    /// Connected service for the key, if any.
    pub async fn get(&self, url: &str, version: &str) -> Option<Arc<S>> {
        let services = self.services.lock().await;
        services
            .get(&Self::key(url, version))
            .and_then(|cell| cell.get().cloned())
    }

    /// Forget a service so the next request reconnects.
    pub async fn remove(&self, url: &str, version: &str) -> bool {
        self.services
            .lock()
            .await
            .remove(&Self::key(url, version))
            .is_some()
    }

    /// Number of connected services.
    pub async fn len(&self) -> usize {
        let services = self.services.lock().await;
        services.values().filter(|cell| cell.initialized()).count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
