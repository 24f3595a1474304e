use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use super::{BackendOptions, TransportConnection, TransportError};

/// In-process stand-in for the tunnel library's connection object.
///
/// Counts every `set_transport` call, can fail on demand and can simulate
/// a slow worker handshake.
#[derive(Debug, Default)]
pub struct MemoryConnection {
    active: Mutex<Option<(String, BackendOptions)>>,
    failures: Mutex<VecDeque<TransportError>>,
    setup_calls: AtomicU64,
    latency: Option<Duration>,
}

impl MemoryConnection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Starts out already on `transport`, as a tunnel configured by an
    /// earlier page would.
    pub fn with_active(self, transport: impl Into<String>, options: BackendOptions) -> Self {
        *self.active.lock() = Some((transport.into(), options));
        self
    }

    /// Queues a failure for the next `set_transport` call.
    pub fn fail_next(&self, err: TransportError) {
        self.failures.lock().push_back(err);
    }

    pub fn setup_calls(&self) -> u64 {
        self.setup_calls.load(Ordering::SeqCst)
    }

    pub fn active(&self) -> Option<(String, BackendOptions)> {
        self.active.lock().clone()
    }
}

#[async_trait]
impl TransportConnection for MemoryConnection {
    async fn current_transport(&self) -> Result<Option<String>, TransportError> {
        Ok(self
            .active
            .lock()
            .as_ref()
            .map(|(transport, _)| transport.clone()))
    }

    async fn set_transport(
        &self,
        transport: &str,
        options: &BackendOptions,
    ) -> Result<(), TransportError> {
        self.setup_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        if let Some(err) = self.failures.lock().pop_front() {
            return Err(err);
        }
        *self.active.lock() = Some((transport.to_string(), options.clone()));
        Ok(())
    }
}
