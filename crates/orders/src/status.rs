use serde::{Deserialize, Serialize};

use stockflow_core::StatusLifecycle;

/// Sales order status lifecycle.
///
/// Cancellation is reversible up to the point of physical fulfillment: an
/// order can be cancelled through `Picking`, but once goods are `Picked` the
/// only way forward is shipment. `Cancelled` reopens to `Draft`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SalesOrderStatus {
    Draft,
    Submitted,
    Confirmed,
    Picking,
    Picked,
    PartialShipped,
    Shipped,
    Delivered,
    Completed,
    Cancelled,
}

impl StatusLifecycle for SalesOrderStatus {
    fn as_str(&self) -> &'static str {
        match self {
            SalesOrderStatus::Draft => "draft",
            SalesOrderStatus::Submitted => "submitted",
            SalesOrderStatus::Confirmed => "confirmed",
            SalesOrderStatus::Picking => "picking",
            SalesOrderStatus::Picked => "picked",
            SalesOrderStatus::PartialShipped => "partial_shipped",
            SalesOrderStatus::Shipped => "shipped",
            SalesOrderStatus::Delivered => "delivered",
            SalesOrderStatus::Completed => "completed",
            SalesOrderStatus::Cancelled => "cancelled",
        }
    }

    fn allowed_transitions(&self) -> &'static [Self] {
        use SalesOrderStatus::*;
        match self {
            Draft => &[Submitted, Cancelled],
            Submitted => &[Confirmed, Draft, Cancelled],
            Confirmed => &[Picking, Cancelled],
            Picking => &[Picked, Cancelled],
            Picked => &[PartialShipped, Shipped],
            PartialShipped => &[Shipped, Cancelled],
            Shipped => &[Delivered],
            Delivered => &[Completed],
            Completed => &[],
            Cancelled => &[Draft],
        }
    }
}

impl core::fmt::Display for SalesOrderStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [SalesOrderStatus; 10] = [
        SalesOrderStatus::Draft,
        SalesOrderStatus::Submitted,
        SalesOrderStatus::Confirmed,
        SalesOrderStatus::Picking,
        SalesOrderStatus::Picked,
        SalesOrderStatus::PartialShipped,
        SalesOrderStatus::Shipped,
        SalesOrderStatus::Delivered,
        SalesOrderStatus::Completed,
        SalesOrderStatus::Cancelled,
    ];

    #[test]
    fn same_status_is_always_a_legal_transition() {
        for status in ALL {
            assert!(status.can_transition_to(status), "{status} -> {status}");
        }
    }

    #[test]
    fn cannot_skip_ahead_from_draft() {
        assert!(!SalesOrderStatus::Draft.can_transition_to(SalesOrderStatus::Picked));
        assert!(!SalesOrderStatus::Draft.can_transition_to(SalesOrderStatus::Shipped));
        assert!(!SalesOrderStatus::Draft.can_transition_to(SalesOrderStatus::Completed));
    }

    #[test]
    fn completed_is_terminal() {
        assert!(SalesOrderStatus::Completed.is_terminal());
        for status in ALL {
            if status != SalesOrderStatus::Completed {
                assert!(!SalesOrderStatus::Completed.can_transition_to(status));
            }
        }
    }

    #[test]
    fn cancellation_is_allowed_while_picking() {
        assert!(SalesOrderStatus::Picking.can_transition_to(SalesOrderStatus::Cancelled));
    }

    #[test]
    fn cancellation_is_not_allowed_once_picked() {
        assert!(!SalesOrderStatus::Picked.can_transition_to(SalesOrderStatus::Cancelled));
        assert!(!SalesOrderStatus::Shipped.can_transition_to(SalesOrderStatus::Cancelled));
    }

    #[test]
    fn cancelled_reopens_to_draft_only() {
        assert_eq!(
            SalesOrderStatus::Cancelled.allowed_transitions(),
            &[SalesOrderStatus::Draft]
        );
    }

    #[test]
    fn happy_path_walks_the_table() {
        let path = [
            SalesOrderStatus::Draft,
            SalesOrderStatus::Submitted,
            SalesOrderStatus::Confirmed,
            SalesOrderStatus::Picking,
            SalesOrderStatus::Picked,
            SalesOrderStatus::Shipped,
            SalesOrderStatus::Delivered,
            SalesOrderStatus::Completed,
        ];
        for pair in path.windows(2) {
            assert!(pair[0].can_transition_to(pair[1]), "{} -> {}", pair[0], pair[1]);
        }
    }
}
