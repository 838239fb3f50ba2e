//! Per-pass state handed to rule actions.

use std::collections::BTreeMap;

/// Context of one pass run; rule actions record what they did in its counters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassContext {
    pass: String,
    counters: BTreeMap<String, usize>,
}

impl PassContext {
    pub fn new(pass: impl Into<String>) -> Self {
        Self { pass: pass.into(), counters: BTreeMap::new() }
    }

    /// Name used for provenance events and generated node names.
    pub fn pass(&self) -> &str {
        &self.pass
    }

    pub fn bump(&mut self, counter: &str) {
        *self.counters.entry(counter.to_string()).or_default() += 1;
    }

    pub fn counter(&self, counter: &str) -> usize {
        self.counters.get(counter).copied().unwrap_or(0)
    }

    pub fn into_counters(self) -> BTreeMap<String, usize> {
        self.counters
    }
}
