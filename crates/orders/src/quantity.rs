//! The six-counter quantity pipeline on a sales order line.
//!
//! Counters form a monotonic chain:
//! `ordered ≥ allocated ≥ picked ≥ shipped ≥ delivered ≥ invoiced`.
//! No downstream counter may exceed its upstream source, and counters only
//! advance — corrections flow through compensating documents (credit notes),
//! never by decrementing.

use serde::{Deserialize, Serialize};

use stockflow_core::{DomainError, DomainResult};

/// A downstream stage of the pipeline (everything after `ordered`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    Allocated,
    Picked,
    Shipped,
    Delivered,
    Invoiced,
}

impl PipelineStage {
    /// Counter field name, used in conservation errors.
    pub fn field_name(&self) -> &'static str {
        match self {
            PipelineStage::Allocated => "quantity_allocated",
            PipelineStage::Picked => "quantity_picked",
            PipelineStage::Shipped => "quantity_shipped",
            PipelineStage::Delivered => "quantity_delivered",
            PipelineStage::Invoiced => "quantity_invoiced",
        }
    }
}

/// Pure predicate behind every counter update: the proposed value must not
/// regress and must not exceed the upstream counter.
pub fn quantity_advance_valid(current: u32, proposed: u32, upstream_cap: u32) -> bool {
    proposed >= current && proposed <= upstream_cap
}

/// The pipeline counters of one sales order line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuantityPipeline {
    pub ordered: u32,
    pub allocated: u32,
    pub picked: u32,
    pub shipped: u32,
    pub delivered: u32,
    pub invoiced: u32,
}

impl QuantityPipeline {
    /// Fresh pipeline: everything downstream of `ordered` starts at zero.
    pub fn new(ordered: u32) -> Self {
        Self {
            ordered,
            allocated: 0,
            picked: 0,
            shipped: 0,
            delivered: 0,
            invoiced: 0,
        }
    }

    pub fn counter(&self, stage: PipelineStage) -> u32 {
        match stage {
            PipelineStage::Allocated => self.allocated,
            PipelineStage::Picked => self.picked,
            PipelineStage::Shipped => self.shipped,
            PipelineStage::Delivered => self.delivered,
            PipelineStage::Invoiced => self.invoiced,
        }
    }

    /// The counter immediately upstream of `stage`.
    pub fn upstream_cap(&self, stage: PipelineStage) -> u32 {
        match stage {
            PipelineStage::Allocated => self.ordered,
            PipelineStage::Picked => self.allocated,
            PipelineStage::Shipped => self.picked,
            PipelineStage::Delivered => self.shipped,
            PipelineStage::Invoiced => self.delivered,
        }
    }

    /// Validate a proposed counter value and return the advanced pipeline.
    ///
    /// Rejects (rather than clamps) any update that would regress the counter
    /// or exceed its upstream cap, naming the offending field.
    pub fn advance(&self, stage: PipelineStage, proposed: u32) -> DomainResult<Self> {
        let current = self.counter(stage);
        let cap = self.upstream_cap(stage);
        if !quantity_advance_valid(current, proposed, cap) {
            return Err(DomainError::QuantityConservation {
                field: stage.field_name(),
                proposed,
                cap: if proposed < current { current } else { cap },
            });
        }

        let mut next = *self;
        match stage {
            PipelineStage::Allocated => next.allocated = proposed,
            PipelineStage::Picked => next.picked = proposed,
            PipelineStage::Shipped => next.shipped = proposed,
            PipelineStage::Delivered => next.delivered = proposed,
            PipelineStage::Invoiced => next.invoiced = proposed,
        }
        Ok(next)
    }

    /// Set a counter without conservation checks.
    ///
    /// Only for event application — events are accepted facts; validation
    /// happened when the command was handled.
    pub fn set_unchecked(&mut self, stage: PipelineStage, value: u32) {
        match stage {
            PipelineStage::Allocated => self.allocated = value,
            PipelineStage::Picked => self.picked = value,
            PipelineStage::Shipped => self.shipped = value,
            PipelineStage::Delivered => self.delivered = value,
            PipelineStage::Invoiced => self.invoiced = value,
        }
    }

    /// Check the whole chain, naming the first counter that exceeds its cap.
    pub fn validate(&self) -> DomainResult<()> {
        const STAGES: [PipelineStage; 5] = [
            PipelineStage::Allocated,
            PipelineStage::Picked,
            PipelineStage::Shipped,
            PipelineStage::Delivered,
            PipelineStage::Invoiced,
        ];
        for stage in STAGES {
            let value = self.counter(stage);
            let cap = self.upstream_cap(stage);
            if value > cap {
                return Err(DomainError::QuantityConservation {
                    field: stage.field_name(),
                    proposed: value,
                    cap,
                });
            }
        }
        Ok(())
    }

    pub fn fully_shipped(&self) -> bool {
        self.shipped >= self.ordered
    }

    pub fn any_shipped(&self) -> bool {
        self.shipped > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_pipeline_starts_at_zero_downstream() {
        let p = QuantityPipeline::new(10);
        assert_eq!(p.ordered, 10);
        assert_eq!(p.allocated, 0);
        assert_eq!(p.picked, 0);
        assert_eq!(p.shipped, 0);
        assert_eq!(p.delivered, 0);
        assert_eq!(p.invoiced, 0);
    }

    #[test]
    fn shipping_more_than_picked_is_rejected() {
        let p = QuantityPipeline::new(10)
            .advance(PipelineStage::Allocated, 10)
            .unwrap()
            .advance(PipelineStage::Picked, 7)
            .unwrap();

        let err = p.advance(PipelineStage::Shipped, 10).unwrap_err();
        match err {
            DomainError::QuantityConservation {
                field,
                proposed,
                cap,
            } => {
                assert_eq!(field, "quantity_shipped");
                assert_eq!(proposed, 10);
                assert_eq!(cap, 7);
            }
            e => panic!("Expected QuantityConservation, got: {e:?}"),
        }
    }

    #[test]
    fn over_allocation_beyond_ordered_is_rejected() {
        let p = QuantityPipeline::new(10);
        assert!(p.advance(PipelineStage::Allocated, 15).is_err());
    }

    #[test]
    fn exact_matches_walk_the_full_chain() {
        let p = QuantityPipeline::new(10)
            .advance(PipelineStage::Allocated, 10)
            .unwrap()
            .advance(PipelineStage::Picked, 10)
            .unwrap()
            .advance(PipelineStage::Shipped, 10)
            .unwrap()
            .advance(PipelineStage::Delivered, 10)
            .unwrap()
            .advance(PipelineStage::Invoiced, 10)
            .unwrap();

        assert_eq!(p.invoiced, 10);
        assert!(p.validate().is_ok());
    }

    #[test]
    fn partial_flow_keeps_remainders_visible() {
        // 10 ordered, 10 allocated, 7 picked, 5 shipped/delivered/invoiced.
        let p = QuantityPipeline::new(10)
            .advance(PipelineStage::Allocated, 10)
            .unwrap()
            .advance(PipelineStage::Picked, 7)
            .unwrap()
            .advance(PipelineStage::Shipped, 5)
            .unwrap()
            .advance(PipelineStage::Delivered, 5)
            .unwrap()
            .advance(PipelineStage::Invoiced, 5)
            .unwrap();

        assert_eq!(p.allocated - p.picked, 3);
        assert_eq!(p.picked - p.shipped, 2);
        assert_eq!(p.delivered - p.invoiced, 0);
    }

    #[test]
    fn counters_cannot_regress() {
        let p = QuantityPipeline::new(10)
            .advance(PipelineStage::Allocated, 8)
            .unwrap();
        assert!(p.advance(PipelineStage::Allocated, 5).is_err());
        // Re-recording the same value stays legal (idempotent).
        assert!(p.advance(PipelineStage::Allocated, 8).is_ok());
    }

    #[test]
    fn validate_names_the_offending_counter() {
        let p = QuantityPipeline {
            ordered: 10,
            allocated: 10,
            picked: 7,
            shipped: 9,
            delivered: 0,
            invoiced: 0,
        };
        match p.validate().unwrap_err() {
            DomainError::QuantityConservation { field, .. } => {
                assert_eq!(field, "quantity_shipped")
            }
            e => panic!("Expected QuantityConservation, got: {e:?}"),
        }
    }

    #[test]
    fn advance_predicate_matches_the_chain_rules() {
        assert!(quantity_advance_valid(0, 7, 10));
        assert!(quantity_advance_valid(7, 7, 10));
        assert!(!quantity_advance_valid(0, 11, 10));
        assert!(!quantity_advance_valid(7, 5, 10));
    }
}
