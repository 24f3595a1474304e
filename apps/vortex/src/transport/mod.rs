pub mod memory;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use url::Url;

use crate::error::ShellError;

/// Error reported by the tunnel library.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    #[error("connection refused: {0}")]
    Refused(String),
    #[error("transport worker unavailable: {0}")]
    WorkerUnavailable(String),
    #[error("{0}")]
    Other(String),
}

/// Options forwarded verbatim to the tunnel when selecting a transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendOptions {
    pub wisp: String,
}

/// Which transport module to load and which backend it should dial.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendDescriptor {
    pub transport: String,
    pub options: BackendOptions,
}

impl BackendDescriptor {
    pub fn new(transport: impl Into<String>, wisp: impl Into<String>) -> Self {
        Self {
            transport: transport.into(),
            options: BackendOptions { wisp: wisp.into() },
        }
    }

    /// Wisp endpoint on the shell's own origin: `wss` behind https, `ws`
    /// otherwise.
    pub fn for_origin(
        origin: &Url,
        transport: impl Into<String>,
        wisp_path: &str,
    ) -> Result<Self, ShellError> {
        let scheme = if origin.scheme() == "https" { "wss" } else { "ws" };
        let host = origin.host_str().ok_or_else(|| ShellError::InvalidUrl {
            input: origin.to_string(),
            reason: "origin has no host".into(),
        })?;
        let authority = match origin.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        };
        let path = if wisp_path.starts_with('/') {
            wisp_path.to_string()
        } else {
            format!("/{wisp_path}")
        };
        Ok(Self::new(transport, format!("{scheme}://{authority}{path}")))
    }
}

/// The tunnel library's connection object.
#[async_trait]
pub trait TransportConnection: Send + Sync {
    async fn current_transport(&self) -> Result<Option<String>, TransportError>;

    async fn set_transport(
        &self,
        transport: &str,
        options: &BackendOptions,
    ) -> Result<(), TransportError>;
}

/// Proof that the tunnel was configured for `descriptor`. `generation`
/// counts handles established by the owning bootstrap; `adopted` handles
/// found the tunnel already on the right transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportHandle {
    descriptor: BackendDescriptor,
    generation: u64,
    adopted: bool,
}

impl TransportHandle {
    pub fn descriptor(&self) -> &BackendDescriptor {
        &self.descriptor
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn adopted(&self) -> bool {
        self.adopted
    }
}

#[derive(Default)]
struct BootstrapSlot {
    configured: Option<TransportHandle>,
    setups: u64,
}

impl BootstrapSlot {
    fn record(&mut self, descriptor: &BackendDescriptor, adopted: bool) -> TransportHandle {
        self.setups += 1;
        let handle = TransportHandle {
            descriptor: descriptor.clone(),
            generation: self.setups,
            adopted,
        };
        self.configured = Some(handle.clone());
        handle
    }
}

/// Configures the tunnel lazily and at most once per descriptor.
///
/// Callers serialize on an async mutex that is held across the setup, so
/// concurrent `ensure_ready` calls queue behind the in-flight setup and then
/// find the descriptor already configured.
pub struct TransportBootstrap {
    connection: Arc<dyn TransportConnection>,
    slot: Mutex<BootstrapSlot>,
}

impl TransportBootstrap {
    pub fn new(connection: Arc<dyn TransportConnection>) -> Self {
        Self {
            connection,
            slot: Mutex::new(BootstrapSlot::default()),
        }
    }

    pub async fn ensure_ready(
        &self,
        descriptor: &BackendDescriptor,
    ) -> Result<TransportHandle, ShellError> {
        let mut slot = self.slot.lock().await;
        let switching = slot.configured.is_some();
        if let Some(handle) = slot.configured.as_ref() {
            if handle.descriptor == *descriptor {
                return Ok(handle.clone());
            }
            info!(
                target: "vortex::transport",
                from = %handle.descriptor.transport,
                to = %descriptor.transport,
                wisp = %descriptor.options.wisp,
                "switching backend"
            );
            slot.configured = None;
        }

        let unavailable = |err: TransportError| {
            warn!(
                target: "vortex::transport",
                transport = %descriptor.transport,
                error = %err,
                "transport setup failed"
            );
            ShellError::TransportUnavailable {
                transport: descriptor.transport.clone(),
                reason: err.to_string(),
            }
        };

        // A tunnel set up before this bootstrap existed is trusted as is.
        if !switching {
            let active = self
                .connection
                .current_transport()
                .await
                .map_err(unavailable)?;
            if active.as_deref() == Some(descriptor.transport.as_str()) {
                let handle = slot.record(descriptor, true);
                debug!(
                    target: "vortex::transport",
                    transport = %descriptor.transport,
                    generation = handle.generation,
                    "tunnel already on transport"
                );
                return Ok(handle);
            }
        }

        debug!(
            target: "vortex::transport",
            transport = %descriptor.transport,
            wisp = %descriptor.options.wisp,
            "configuring transport"
        );
        self.connection
            .set_transport(&descriptor.transport, &descriptor.options)
            .await
            .map_err(unavailable)?;

        let active = self
            .connection
            .current_transport()
            .await
            .map_err(unavailable)?;
        if active.as_deref() != Some(descriptor.transport.as_str()) {
            return Err(unavailable(TransportError::Other(format!(
                "tunnel reports transport {:?} after setup",
                active
            ))));
        }

        let handle = slot.record(descriptor, false);
        info!(
            target: "vortex::transport",
            transport = %descriptor.transport,
            generation = handle.generation,
            "transport ready"
        );
        Ok(handle)
    }

    pub async fn configured(&self) -> Option<TransportHandle> {
        self.slot.lock().await.configured.clone()
    }

    /// Handles established so far, adopted ones included. Failed setups do
    /// not count.
    pub async fn setup_count(&self) -> u64 {
        self.slot.lock().await.setups
    }
}

#[cfg(test)]
mod tests {
    use super::memory::MemoryConnection;
    use super::*;
    use std::time::Duration;

    fn backend_a() -> BackendDescriptor {
        BackendDescriptor::new("/epoxy/index.mjs", "wss://a.test/wisp/")
    }

    fn backend_b() -> BackendDescriptor {
        BackendDescriptor::new("/libcurl/index.mjs", "wss://b.test/wisp/")
    }

    #[test_timeout::tokio_timeout_test]
    async fn second_ensure_ready_skips_setup() {
        let connection = Arc::new(MemoryConnection::new());
        let bootstrap = TransportBootstrap::new(connection.clone());

        let first = bootstrap.ensure_ready(&backend_a()).await.expect("ready");
        let second = bootstrap.ensure_ready(&backend_a()).await.expect("ready");

        assert_eq!(first, second);
        assert_eq!(connection.setup_calls(), 1);
        assert_eq!(bootstrap.setup_count().await, 1);
    }

    #[test_timeout::tokio_timeout_test(paused)]
    async fn concurrent_callers_share_one_setup() {
        let connection =
            Arc::new(MemoryConnection::new().with_latency(Duration::from_millis(250)));
        let bootstrap = Arc::new(TransportBootstrap::new(connection.clone()));

        let calls = (0..8).map(|_| {
            let bootstrap = Arc::clone(&bootstrap);
            async move { bootstrap.ensure_ready(&backend_a()).await }
        });
        let results = futures::future::join_all(calls).await;

        assert!(results.iter().all(Result::is_ok));
        assert_eq!(connection.setup_calls(), 1);
        let generations: Vec<u64> = results
            .into_iter()
            .map(|handle| handle.expect("ready").generation())
            .collect();
        assert!(generations.iter().all(|generation| *generation == 1));
    }

    #[test_timeout::tokio_timeout_test]
    async fn different_descriptor_reruns_setup() {
        let connection = Arc::new(MemoryConnection::new());
        let bootstrap = TransportBootstrap::new(connection.clone());

        bootstrap.ensure_ready(&backend_a()).await.expect("ready a");
        let handle = bootstrap.ensure_ready(&backend_b()).await.expect("ready b");

        assert_eq!(connection.setup_calls(), 2);
        assert_eq!(handle.descriptor(), &backend_b());
        assert_eq!(handle.generation(), 2);
        assert_eq!(
            connection.active().map(|(transport, _)| transport),
            Some("/libcurl/index.mjs".to_string())
        );
    }

    #[test_timeout::tokio_timeout_test]
    async fn tunnel_already_on_transport_is_adopted() {
        let connection = Arc::new(
            MemoryConnection::new().with_active("/epoxy/index.mjs", backend_a().options),
        );
        let bootstrap = TransportBootstrap::new(connection.clone());

        let handle = bootstrap.ensure_ready(&backend_a()).await.expect("ready");
        assert!(handle.adopted());
        assert_eq!(connection.setup_calls(), 0);

        bootstrap.ensure_ready(&backend_a()).await.expect("ready");
        assert_eq!(connection.setup_calls(), 0);

        let switched = bootstrap.ensure_ready(&backend_b()).await.expect("ready b");
        assert!(!switched.adopted());
        assert_eq!(connection.setup_calls(), 1);
    }

    #[test_timeout::tokio_timeout_test]
    async fn tunnel_on_other_transport_is_reconfigured() {
        let connection = Arc::new(
            MemoryConnection::new().with_active("/libcurl/index.mjs", backend_b().options),
        );
        let bootstrap = TransportBootstrap::new(connection.clone());

        let handle = bootstrap.ensure_ready(&backend_a()).await.expect("ready");
        assert!(!handle.adopted());
        assert_eq!(connection.setup_calls(), 1);
        assert_eq!(
            connection.active().map(|(transport, _)| transport),
            Some("/epoxy/index.mjs".to_string())
        );
    }

    #[test_timeout::tokio_timeout_test]
    async fn setup_failure_is_transport_unavailable_and_not_cached() {
        let connection = Arc::new(MemoryConnection::new());
        connection.fail_next(TransportError::Refused("backend down".into()));
        let bootstrap = TransportBootstrap::new(connection.clone());

        let err = bootstrap
            .ensure_ready(&backend_a())
            .await
            .expect_err("setup should fail");
        assert!(matches!(
            err,
            ShellError::TransportUnavailable { ref transport, .. } if transport == "/epoxy/index.mjs"
        ));
        assert!(bootstrap.configured().await.is_none());

        bootstrap.ensure_ready(&backend_a()).await.expect("retry succeeds");
        assert_eq!(connection.setup_calls(), 2);
    }

    #[test]
    fn descriptor_for_origin_picks_socket_scheme() {
        let https = Url::parse("https://proxy.test").unwrap();
        let descriptor = BackendDescriptor::for_origin(&https, "/epoxy/index.mjs", "/wisp/").unwrap();
        assert_eq!(descriptor.options.wisp, "wss://proxy.test/wisp/");

        let http = Url::parse("http://localhost:8080").unwrap();
        let descriptor = BackendDescriptor::for_origin(&http, "/epoxy/index.mjs", "wisp/").unwrap();
        assert_eq!(descriptor.options.wisp, "ws://localhost:8080/wisp/");
    }
}
