//! Engine configuration.

use serde::{Deserialize, Serialize};

/// Configuration for a [`UnitOfWork`](crate::UnitOfWork) instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UnitOfWorkConfig {
    /// Name attached to every log event emitted by the engine.
    pub label: String,
    /// Maximum number of work items in flight per phase.
    /// `None` starts every item of a phase at once.
    pub phase_concurrency: Option<usize>,
}

impl UnitOfWorkConfig {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            ..Self::default()
        }
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn phase_concurrency(mut self, limit: usize) -> Self {
        self.phase_concurrency = Some(limit);
        self
    }

    /// Effective fan-out for a phase holding `items` work items.
    pub(crate) fn fan_out(&self, items: usize) -> usize {
        self.phase_concurrency.unwrap_or(items).max(1)
    }
}

impl Default for UnitOfWorkConfig {
    fn default() -> Self {
        Self {
            label: "unit-of-work".into(),
            phase_concurrency: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fan_out_defaults_to_all_items() {
        let cfg = UnitOfWorkConfig::default();
        assert_eq!(cfg.fan_out(7), 7);
        assert_eq!(cfg.fan_out(0), 1);
    }

    #[test]
    fn zero_limit_is_clamped() {
        let cfg = UnitOfWorkConfig::new("orders").phase_concurrency(0);
        assert_eq!(cfg.fan_out(10), 1);
        assert_eq!(cfg.label, "orders");
    }

    #[test]
    fn deserialize_partial() {
        let cfg: UnitOfWorkConfig =
            serde_json::from_str(r#"{ "phase_concurrency": 4 }"#).unwrap();
        assert_eq!(cfg.label, "unit-of-work");
        assert_eq!(cfg.phase_concurrency, Some(4));
    }
}
