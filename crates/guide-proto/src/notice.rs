//! One-way user-facing notifications. The transport (telemetry link, GCS
//! popup) is external; the core only decides when a message fires. Rate
//! limiting is the producer's job via edge-triggered episode flags.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notice {
    pub severity: Severity,
    pub text: String,
}

/// Per-cycle notice queue, drained by the driver after each decision cycle.
#[derive(Debug, Default)]
pub struct Notices {
    items: Vec<Notice>,
}

impl Notices {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn info(&mut self, text: impl Into<String>) {
        self.items.push(Notice { severity: Severity::Info, text: text.into() });
    }

    pub fn warning(&mut self, text: impl Into<String>) {
        self.items.push(Notice { severity: Severity::Warning, text: text.into() });
    }

    pub fn critical(&mut self, text: impl Into<String>) {
        self.items.push(Notice { severity: Severity::Critical, text: text.into() });
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Notice> {
        self.items.iter()
    }

    pub fn drain(&mut self) -> Vec<Notice> {
        core::mem::take(&mut self.items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drain_empties_the_queue() {
        let mut n = Notices::new();
        n.info("a");
        n.warning("b");
        assert_eq!(n.len(), 2);
        let out = n.drain();
        assert_eq!(out.len(), 2);
        assert!(n.is_empty());
        assert_eq!(out[1].severity, Severity::Warning);
    }
}
