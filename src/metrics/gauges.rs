//! Gauges for values that go up and down.

use dashmap::DashMap;
use std::sync::atomic::{AtomicI64, Ordering};

/// A gauge that can increase or decrease.
#[derive(Debug)]
pub struct Gauge {
    name: &'static str,
    help: &'static str,
    value: AtomicI64,
}

impl Gauge {
    /// Create a new gauge.
    pub const fn new(name: &'static str, help: &'static str) -> Self {
        Self {
            name,
            help,
            value: AtomicI64::new(0),
        }
    }

    /// Metric name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Metric help text.
    pub fn help(&self) -> &'static str {
        self.help
    }

    /// Set the value.
    pub fn set(&self, value: i64) {
        self.value.store(value, Ordering::Relaxed);
    }

    /// Increment by 1.
    pub fn inc(&self) {
        self.value.fetch_add(1, Ordering::Relaxed);
    }

    /// Decrement by 1.
    pub fn dec(&self) {
        self.value.fetch_sub(1, Ordering::Relaxed);
    }

    /// Current value.
    pub fn get(&self) -> i64 {
        self.value.load(Ordering::Relaxed)
    }
}

/// A gauge split by a single label, e.g. data node.
#[derive(Debug)]
pub struct LabeledGauge {
    name: &'static str,
    help: &'static str,
    label: &'static str,
    values: DashMap<String, i64>,
}

impl LabeledGauge {
    /// Create a labeled gauge.
    pub fn new(name: &'static str, help: &'static str, label: &'static str) -> Self {
        Self {
            name,
            help,
            label,
            values: DashMap::new(),
        }
    }

    /// Metric name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Metric help text.
    pub fn help(&self) -> &'static str {
        self.help
    }

    /// Label name.
    pub fn label(&self) -> &'static str {
        self.label
    }

    /// Set the series for `value`.
    pub fn set(&self, value: &str, n: i64) {
        self.values.insert(value.to_string(), n);
    }

    /// Current value of the series for `value`.
    pub fn get(&self, value: &str) -> i64 {
        self.values.get(value).map(|v| *v).unwrap_or(0)
    }

    /// Replace every series at once.
    pub fn replace_all<'a>(&self, series: impl IntoIterator<Item = (&'a str, i64)>) {
        self.values.clear();
        for (value, n) in series {
            self.values.insert(value.to_string(), n);
        }
    }

    /// Number of series.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Check if there are no series.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
