//! Node lifecycle state machine shared by every component with a
//! running/not-running duality.
//!
//! ```text
//! Uninitialized ──initialize──▶ Initialized ──start──▶ Started
//!                                    │                 │   ▲
//!                                    │               stop start
//!                                    │                 ▼   │
//!                                    └──dispose──▶ Disposed ◀──dispose── Stopped
//! ```
//!
//! `start` on a started component and `stop` on a stopped one are no-ops, so
//! repeated leadership flaps are tolerated. Every other out-of-order call fails
//! with [`LifecycleError::IllegalState`].

use crate::error::{LifecycleError, Result};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// Lifecycle state of a component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LifecycleState {
    /// Constructed, not yet initialized.
    Uninitialized,
    /// Initialized and ready to start.
    Initialized,
    /// Running.
    Started,
    /// Stopped; can be started again.
    Stopped,
    /// Torn down for good.
    Disposed,
}

impl LifecycleState {
    /// Check if `initialize` is allowed.
    pub fn can_initialize(&self) -> bool {
        *self == LifecycleState::Uninitialized
    }

    /// Check if `start` would start the component.
    pub fn can_start(&self) -> bool {
        matches!(self, LifecycleState::Initialized | LifecycleState::Stopped)
    }

    /// Check if `stop` would stop the component.
    pub fn can_stop(&self) -> bool {
        *self == LifecycleState::Started
    }

    /// Check if `dispose` is allowed.
    pub fn can_dispose(&self) -> bool {
        matches!(self, LifecycleState::Initialized | LifecycleState::Stopped)
    }

    /// Check if the component has been initialized and not disposed.
    pub fn is_initialized(&self) -> bool {
        matches!(
            self,
            LifecycleState::Initialized | LifecycleState::Started | LifecycleState::Stopped
        )
    }

    /// Check if the component is running.
    pub fn is_started(&self) -> bool {
        *self == LifecycleState::Started
    }

    /// Check if the component is stopped.
    pub fn is_stopped(&self) -> bool {
        *self == LifecycleState::Stopped
    }

    /// Check if the component is disposed.
    pub fn is_disposed(&self) -> bool {
        *self == LifecycleState::Disposed
    }
}

impl std::fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LifecycleState::Uninitialized => write!(f, "uninitialized"),
            LifecycleState::Initialized => write!(f, "initialized"),
            LifecycleState::Started => write!(f, "started"),
            LifecycleState::Stopped => write!(f, "stopped"),
            LifecycleState::Disposed => write!(f, "disposed"),
        }
    }
}

/// A component that follows the lifecycle state machine.
pub trait Lifecycle: Send + Sync {
    /// Current lifecycle state.
    fn lifecycle_state(&self) -> LifecycleState;

    /// Uninitialized → Initialized.
    fn initialize(&self) -> Result<()>;

    /// Initialized/Stopped → Started. No-op when already started.
    fn start(&self) -> Result<()>;

    /// Started → Stopped. No-op when already stopped.
    fn stop(&self) -> Result<()>;

    /// Initialized/Stopped → Disposed.
    fn dispose(&self) -> Result<()>;
}

/// Outcome of a guarded transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// The transition should run; the cell is now in the target state.
    Apply { from: LifecycleState },
    /// Already in the target state.
    Noop,
}

/// Thread-safe holder of a component's lifecycle state.
///
/// Each `begin_*` call validates and performs the state change atomically and
/// tells the caller whether it has work to do. If that work fails the caller
/// puts the previous state back with [`LifecycleCell::rollback`].
#[derive(Debug)]
pub struct LifecycleCell {
    component: String,
    state: Mutex<LifecycleState>,
}

impl LifecycleCell {
    /// Create a cell in the `Uninitialized` state.
    pub fn new(component: impl Into<String>) -> Self {
        Self {
            component: component.into(),
            state: Mutex::new(LifecycleState::Uninitialized),
        }
    }

    /// Current state.
    pub fn state(&self) -> LifecycleState {
        *self.state.lock()
    }

    /// Component name used in errors and logs.
    pub fn component(&self) -> &str {
        &self.component
    }

    /// Transition to `Initialized`.
    pub fn begin_initialize(&self) -> Result<Transition> {
        self.transition("initialize", LifecycleState::Initialized, |s| s.can_initialize(), false)
    }

    /// Transition to `Started`.
    pub fn begin_start(&self) -> Result<Transition> {
        self.transition("start", LifecycleState::Started, |s| s.can_start(), true)
    }

    /// Transition to `Stopped`.
    pub fn begin_stop(&self) -> Result<Transition> {
        self.transition("stop", LifecycleState::Stopped, |s| s.can_stop(), true)
    }

    /// Transition to `Disposed`.
    pub fn begin_dispose(&self) -> Result<Transition> {
        self.transition("dispose", LifecycleState::Disposed, |s| s.can_dispose(), true)
    }

    /// Restore a state after the work behind a transition failed.
    pub fn rollback(&self, to: LifecycleState) {
        *self.state.lock() = to;
    }

    fn transition(
        &self,
        operation: &'static str,
        target: LifecycleState,
        allowed: impl Fn(&LifecycleState) -> bool,
        idempotent: bool,
    ) -> Result<Transition> {
        let mut state = self.state.lock();
        if idempotent && *state == target {
            return Ok(Transition::Noop);
        }
        if !allowed(&*state) {
            return Err(LifecycleError::IllegalState {
                component: self.component.clone(),
                operation,
                state: *state,
            }
            .into());
        }
        let from = *state;
        *state = target;
        Ok(Transition::Apply { from })
    }
}

/// Initialize the component if it has not been initialized yet.
pub fn initialize_if_possible(component: &dyn Lifecycle) -> Result<()> {
    if component.lifecycle_state().can_initialize() {
        component.initialize()?;
    }
    Ok(())
}

/// Start the component if its state allows it.
pub fn start_if_possible(component: &dyn Lifecycle) -> Result<()> {
    if component.lifecycle_state().can_start() {
        component.start()?;
    }
    Ok(())
}

/// Stop the component if it is running.
pub fn stop_if_possible(component: &dyn Lifecycle) -> Result<()> {
    if component.lifecycle_state().can_stop() {
        component.stop()?;
    }
    Ok(())
}

/// Stop and dispose the component, whatever state it is in.
pub fn dispose_if_possible(component: &dyn Lifecycle) -> Result<()> {
    stop_if_possible(component)?;
    if component.lifecycle_state().can_dispose() {
        component.dispose()?;
    }
    Ok(())
}
