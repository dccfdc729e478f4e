//! Human-readable document numbers ("SO-1042", "INV-1007").
//!
//! Sequences are injected into the service layer and passed explicitly to
//! document construction — never a process-wide mutable counter.

use std::collections::HashMap;
use std::sync::Mutex;

/// Source of per-prefix display ids.
pub trait DisplayIdSequence: Send + Sync {
    fn next(&self, prefix: &str) -> String;
}

/// In-memory per-prefix counters, starting at 1001.
///
/// Production deployments would back this with a database sequence; the
/// contract is only that ids are unique per (tenant deployment, prefix).
#[derive(Debug, Default)]
pub struct InMemorySequences {
    counters: Mutex<HashMap<String, u64>>,
}

impl InMemorySequences {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DisplayIdSequence for InMemorySequences {
    fn next(&self, prefix: &str) -> String {
        let mut counters = match self.counters.lock() {
            Ok(c) => c,
            // Poisoned lock: fall back to a non-colliding unique suffix.
            Err(_) => return format!("{prefix}-{}", uuid::Uuid::now_v7().simple()),
        };
        let counter = counters.entry(prefix.to_string()).or_insert(1000);
        *counter += 1;
        format!("{prefix}-{counter}")
    }
}
