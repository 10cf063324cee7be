//! Leadership signal fan-out.
//!
//! The election itself lives outside this crate. It reports transitions to a
//! [`LeadershipHub`], which remembers the current role and forwards the call
//! to every registered [`LeaderAware`] component.

use crate::metrics::MetaMetrics;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::info;

/// A component whose behavior depends on meta-server leadership.
///
/// Both calls must be idempotent; elections may repeat a signal.
pub trait LeaderAware: Send + Sync {
    /// Local leadership was gained or reconfirmed.
    fn is_leader(&self);

    /// Local leadership was lost.
    fn not_leader(&self);
}

/// Records the local role and notifies listeners of transitions.
pub struct LeadershipHub {
    leader: AtomicBool,
    listeners: RwLock<Vec<Arc<dyn LeaderAware>>>,
    metrics: Arc<MetaMetrics>,
}

impl LeadershipHub {
    pub fn new(metrics: Arc<MetaMetrics>) -> Self {
        Self {
            leader: AtomicBool::new(false),
            listeners: RwLock::new(Vec::new()),
            metrics,
        }
    }

    /// Register a listener.
    pub fn add_listener(&self, listener: Arc<dyn LeaderAware>) {
        self.listeners.write().push(listener);
    }

    /// Check if this meta server currently believes it is leader.
    pub fn am_i_leader(&self) -> bool {
        self.leader.load(Ordering::Acquire)
    }

    /// Called by the election when this node becomes (or stays) leader.
    pub fn on_leader(&self) {
        let was_leader = self.leader.swap(true, Ordering::AcqRel);
        self.metrics.set_leader(true);
        if !was_leader {
            info!("Became meta leader");
        }
        for listener in self.listeners.read().clone() {
            listener.is_leader();
        }
    }

    /// Called by the election when this node is no longer leader.
    pub fn on_follower(&self) {
        let was_leader = self.leader.swap(false, Ordering::AcqRel);
        self.metrics.set_leader(false);
        if was_leader {
            info!("Lost meta leadership");
        }
        for listener in self.listeners.read().clone() {
            listener.not_leader();
        }
    }
}

impl std::fmt::Debug for LeadershipHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LeadershipHub")
            .field("leader", &self.am_i_leader())
            .field("listeners", &self.listeners.read().len())
            .finish()
    }
}
