use std::collections::HashMap;
use std::sync::RwLock;

use stockflow_core::{AggregateId, TenantId};

/// Per-stream sequence cursor, shared by every projection.
///
/// Tracks the last applied sequence number per (tenant, aggregate) so
/// duplicate deliveries are skipped and gaps are detected.
#[derive(Debug, Default)]
pub(crate) struct CursorMap {
    inner: RwLock<HashMap<(TenantId, AggregateId), u64>>,
}

/// Decision for an incoming envelope given the stream cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CursorCheck {
    /// Fresh event: apply it, then `advance`.
    Apply,
    /// Already seen (at-least-once delivery): skip silently.
    Duplicate,
    /// Sequence gap or zero: the stream is corrupt from this projection's
    /// point of view.
    Gap { last: u64, found: u64 },
}

impl CursorMap {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn check(
        &self,
        tenant_id: TenantId,
        aggregate_id: AggregateId,
        sequence_number: u64,
    ) -> CursorCheck {
        let last = self
            .inner
            .read()
            .ok()
            .and_then(|m| m.get(&(tenant_id, aggregate_id)).copied())
            .unwrap_or(0);

        if sequence_number == 0 {
            return CursorCheck::Gap {
                last,
                found: sequence_number,
            };
        }
        if sequence_number <= last {
            return CursorCheck::Duplicate;
        }
        if last != 0 && sequence_number != last + 1 {
            return CursorCheck::Gap {
                last,
                found: sequence_number,
            };
        }
        CursorCheck::Apply
    }

    pub(crate) fn advance(
        &self,
        tenant_id: TenantId,
        aggregate_id: AggregateId,
        sequence_number: u64,
    ) {
        if let Ok(mut m) = self.inner.write() {
            m.insert((tenant_id, aggregate_id), sequence_number);
        }
    }

    pub(crate) fn clear_tenant(&self, tenant_id: TenantId) {
        if let Ok(mut m) = self.inner.write() {
            m.retain(|(t, _), _| *t != tenant_id);
        }
    }
}
