//! Cleanup of registrations when a client connection drops.

use super::exchanger::Channel;
use super::executor::BoundedExecutor;
use crate::error::ExecutorError;
use crate::metrics::MetaMetrics;
use crate::types::ConnectId;
use std::sync::Arc;
use tracing::{debug, error, info};

/// A registration index that can be queried by connection.
pub trait ConnectIndexed: Send + Sync {
    /// Number of registrations owned by `connect_id`.
    fn count_by_connect_id(&self, connect_id: &ConnectId) -> usize;
}

/// Drops every registration owned by the given connections.
pub trait ClientRegistry: Send + Sync {
    fn cancel(&self, connect_ids: &[ConnectId]);
}

/// Reacts to client connect and disconnect events from the transport.
pub struct ClientConnectionHandler {
    publishers: Arc<dyn ConnectIndexed>,
    subscribers: Arc<dyn ConnectIndexed>,
    watchers: Arc<dyn ConnectIndexed>,
    registry: Arc<dyn ClientRegistry>,
    executor: Arc<BoundedExecutor>,
    metrics: Arc<MetaMetrics>,
}

impl ClientConnectionHandler {
    pub fn new(
        publishers: Arc<dyn ConnectIndexed>,
        subscribers: Arc<dyn ConnectIndexed>,
        watchers: Arc<dyn ConnectIndexed>,
        registry: Arc<dyn ClientRegistry>,
        executor: Arc<BoundedExecutor>,
        metrics: Arc<MetaMetrics>,
    ) -> Self {
        Self {
            publishers,
            subscribers,
            watchers,
            registry,
            executor,
            metrics,
        }
    }

    pub fn connected(&self, channel: &dyn Channel) {
        debug!(
            remote = %channel.remote_addr(),
            local = %channel.local_addr(),
            "Client connected"
        );
    }

    /// Queue cleanup for a dropped connection. Returns at once.
    pub fn disconnected(&self, channel: &dyn Channel) -> Result<(), ExecutorError> {
        let connect_id = ConnectId::of(channel.remote_addr(), channel.local_addr());
        let publishers = Arc::clone(&self.publishers);
        let subscribers = Arc::clone(&self.subscribers);
        let watchers = Arc::clone(&self.watchers);
        let registry = Arc::clone(&self.registry);
        let metrics = Arc::clone(&self.metrics);

        let submitted = self.executor.execute(move || {
            let pubs = publishers.count_by_connect_id(&connect_id);
            let subs = subscribers.count_by_connect_id(&connect_id);
            let wats = watchers.count_by_connect_id(&connect_id);
            info!(%connect_id, pubs, subs, wats, "Client disconnected");

            if pubs + subs + wats > 0 {
                metrics.client_disconnects.inc();
                registry.cancel(&[connect_id]);
            }
        });

        if let Err(e) = &submitted {
            self.metrics.disconnects_rejected.inc();
            error!(%connect_id, error = %e, "Client disconnect cleanup rejected");
        }
        submitted
    }
}

impl std::fmt::Debug for ClientConnectionHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConnectionHandler")
            .field("executor", &self.executor)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{wait_for, MockChannel};
    use parking_lot::Mutex;
    use std::collections::HashMap;
    use std::time::Duration;
    use tokio::runtime::Handle;

    #[derive(Default)]
    struct CountIndex(HashMap<ConnectId, usize>);

    impl ConnectIndexed for CountIndex {
        fn count_by_connect_id(&self, connect_id: &ConnectId) -> usize {
            self.0.get(connect_id).copied().unwrap_or(0)
        }
    }

    #[derive(Default)]
    struct RecordingRegistry(Mutex<Vec<ConnectId>>);

    impl ClientRegistry for RecordingRegistry {
        fn cancel(&self, connect_ids: &[ConnectId]) {
            self.0.lock().extend_from_slice(connect_ids);
        }
    }

    fn handler(
        subscribers: CountIndex,
        registry: Arc<RecordingRegistry>,
        executor: Arc<BoundedExecutor>,
    ) -> ClientConnectionHandler {
        ClientConnectionHandler::new(
            Arc::new(CountIndex::default()),
            Arc::new(subscribers),
            Arc::new(CountIndex::default()),
            registry,
            executor,
            Arc::new(MetaMetrics::new()),
        )
    }

    #[tokio::test]
    async fn test_disconnect_cancels_owned_registrations() {
        let channel = MockChannel::new("10.0.0.9:4000", "10.0.0.1:9600");
        let connect_id = ConnectId::of(channel.remote_addr(), channel.local_addr());

        let mut subscribers = CountIndex::default();
        subscribers.0.insert(connect_id, 2);
        let registry = Arc::new(RecordingRegistry::default());
        let executor = Arc::new(BoundedExecutor::new("client", 1, 8, &Handle::current()));
        let handler = handler(subscribers, registry.clone(), executor);

        handler.disconnected(&channel).unwrap();

        wait_for(
            || !registry.0.lock().is_empty(),
            Duration::from_secs(2),
            Duration::from_millis(5),
        )
        .await
        .unwrap();
        assert_eq!(*registry.0.lock(), vec![connect_id]);
    }

    #[tokio::test]
    async fn test_disconnect_without_registrations_cancels_nothing() {
        let channel = MockChannel::new("10.0.0.9:4001", "10.0.0.1:9600");
        let registry = Arc::new(RecordingRegistry::default());
        let executor = Arc::new(BoundedExecutor::new("client", 1, 8, &Handle::current()));
        let handler = handler(CountIndex::default(), registry.clone(), executor.clone());

        handler.disconnected(&channel).unwrap();
        wait_for(
            || executor.queued() == 0,
            Duration::from_secs(2),
            Duration::from_millis(5),
        )
        .await
        .unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert!(registry.0.lock().is_empty());
    }

    #[tokio::test]
    async fn test_disconnect_rejected_when_queue_full() {
        let channel = MockChannel::new("10.0.0.9:4002", "10.0.0.1:9600");
        let registry = Arc::new(RecordingRegistry::default());
        let executor = Arc::new(BoundedExecutor::new("client", 1, 1, &Handle::current()));
        let handler = handler(CountIndex::default(), registry, executor);

        // current-thread runtime: nothing drains before the second call
        handler.disconnected(&channel).unwrap();
        let result = handler.disconnected(&channel);

        assert!(matches!(result, Err(ExecutorError::Rejected { .. })));
        assert_eq!(handler.metrics.disconnects_rejected.get(), 1);
    }
}
