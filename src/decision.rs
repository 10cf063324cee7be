//! Runtime switch for automatic slot rebalancing.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

/// Whether the meta leader may change slot assignment on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DecisionMode {
    /// Automatic rebalancing enabled.
    #[default]
    Running,
    /// Assignment frozen; operators change it by hand.
    Off,
}

impl std::fmt::Display for DecisionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DecisionMode::Running => write!(f, "RUNNING"),
            DecisionMode::Off => write!(f, "OFF"),
        }
    }
}

/// Live decision mode shared by the arranger and the admin surface.
#[derive(Debug, Default)]
pub struct DecisionModeCell {
    mode: RwLock<DecisionMode>,
}

impl DecisionModeCell {
    /// Create a cell holding `mode`.
    pub fn new(mode: DecisionMode) -> Self {
        Self {
            mode: RwLock::new(mode),
        }
    }

    /// Current mode.
    pub fn get(&self) -> DecisionMode {
        *self.mode.read()
    }

    /// Replace the mode, returning the previous one.
    pub fn set(&self, mode: DecisionMode) -> DecisionMode {
        std::mem::replace(&mut *self.mode.write(), mode)
    }

    /// Check if automatic rebalancing is enabled.
    pub fn is_running(&self) -> bool {
        self.get() == DecisionMode::Running
    }
}

/// Outcome of an administrative operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminResult {
    pub success: bool,
    pub message: Option<String>,
}

impl AdminResult {
    /// A successful result.
    pub fn ok() -> Self {
        Self {
            success: true,
            message: None,
        }
    }
}

/// Administrative handle for the decision mode.
#[derive(Debug, Clone)]
pub struct DecisionModeResource {
    cell: Arc<DecisionModeCell>,
}

impl DecisionModeResource {
    pub fn new(cell: Arc<DecisionModeCell>) -> Self {
        Self { cell }
    }

    /// Apply a new decision mode to the live configuration.
    pub fn change_decision_mode(&self, mode: DecisionMode) -> AdminResult {
        let previous = self.cell.set(mode);
        info!(%previous, current = %mode, "Decision mode changed");
        AdminResult::ok()
    }

    /// Current decision mode.
    pub fn decision_mode(&self) -> DecisionMode {
        self.cell.get()
    }
}
