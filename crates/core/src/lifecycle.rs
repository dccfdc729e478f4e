//! Document status lifecycles as data-driven transition tables.
//!
//! Each workflow document (sales order, pick list, delivery order, invoice)
//! carries a closed status enum. The legal moves are adjacency sets returned
//! by `allowed_transitions()` — tables, not code, so a new edge is a
//! reviewable one-line diff.

use crate::error::{DomainError, DomainResult};

/// A closed status enum with a static transition table.
///
/// Semantics shared by every document type:
/// - a same-status "transition" is always legal (idempotent re-save);
/// - otherwise the target must be in the current status's adjacency set;
/// - a status with an empty adjacency set is terminal (absorbing).
pub trait StatusLifecycle: Copy + Eq + Sized + 'static {
    /// Stable lowercase name, used in errors, events, and serialization.
    fn as_str(&self) -> &'static str;

    /// Statuses legally reachable from `self` (excluding `self`).
    fn allowed_transitions(&self) -> &'static [Self];

    fn is_terminal(&self) -> bool {
        self.allowed_transitions().is_empty()
    }

    fn can_transition_to(&self, next: Self) -> bool {
        *self == next || self.allowed_transitions().contains(&next)
    }

    /// Membership test as a `Result`, naming both statuses on rejection.
    fn ensure_transition(&self, next: Self) -> DomainResult<()> {
        if self.can_transition_to(next) {
            Ok(())
        } else {
            Err(DomainError::InvalidTransition {
                from: self.as_str(),
                to: next.as_str(),
            })
        }
    }
}
