use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockflow_core::{
    Aggregate, AggregateId, AggregateRoot, CustomerId, DomainError, ItemId, StatusLifecycle,
    TenantId,
};
use stockflow_events::Event;
use stockflow_orders::SalesOrderId;
use stockflow_picking::PickListId;

/// Delivery order identifier (tenant-scoped via `tenant_id` fields in events/commands).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeliveryOrderId(pub AggregateId);

impl DeliveryOrderId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for DeliveryOrderId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Delivery order status lifecycle.
///
/// `partial` and `delivered` are mutually revisitable so a delivery can be
/// amended after the fact. `returned` only flows into `cancelled`;
/// `cancelled` reopens to `draft`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryOrderStatus {
    Draft,
    Ready,
    Dispatched,
    InTransit,
    Delivered,
    Partial,
    Failed,
    Returned,
    Cancelled,
}

impl StatusLifecycle for DeliveryOrderStatus {
    fn as_str(&self) -> &'static str {
        match self {
            DeliveryOrderStatus::Draft => "draft",
            DeliveryOrderStatus::Ready => "ready",
            DeliveryOrderStatus::Dispatched => "dispatched",
            DeliveryOrderStatus::InTransit => "in_transit",
            DeliveryOrderStatus::Delivered => "delivered",
            DeliveryOrderStatus::Partial => "partial",
            DeliveryOrderStatus::Failed => "failed",
            DeliveryOrderStatus::Returned => "returned",
            DeliveryOrderStatus::Cancelled => "cancelled",
        }
    }

    fn allowed_transitions(&self) -> &'static [Self] {
        use DeliveryOrderStatus::*;
        match self {
            Draft => &[Ready, Cancelled],
            Ready => &[Dispatched, Draft, Cancelled],
            Dispatched => &[InTransit, Delivered, Failed],
            InTransit => &[Delivered, Failed, Partial],
            Delivered => &[Partial],
            Partial => &[Delivered],
            Failed => &[Ready, Returned, Cancelled],
            Returned => &[Cancelled],
            Cancelled => &[Draft],
        }
    }
}

impl core::fmt::Display for DeliveryOrderStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One shipped line, referencing the sales order line it fulfills.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryOrderLine {
    pub line_no: u32,
    pub sales_order_line_no: Option<u32>,
    pub item_id: Option<ItemId>,
    pub item_name: String,
    pub quantity_shipped: u32,
    /// Invariant: `quantity_delivered <= quantity_shipped`.
    pub quantity_delivered: u32,
}

/// Aggregate root: DeliveryOrder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryOrder {
    id: DeliveryOrderId,
    tenant_id: Option<TenantId>,
    display_id: String,
    status: DeliveryOrderStatus,
    sales_order_id: Option<SalesOrderId>,
    pick_list_id: Option<PickListId>,
    customer_id: Option<CustomerId>,
    carrier: Option<String>,
    tracking_number: Option<String>,
    shipping_address: Option<String>,
    dispatched_at: Option<DateTime<Utc>>,
    delivered_at: Option<DateTime<Utc>>,
    lines: Vec<DeliveryOrderLine>,
    version: u64,
    created: bool,
}

impl DeliveryOrder {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: DeliveryOrderId) -> Self {
        Self {
            id,
            tenant_id: None,
            display_id: String::new(),
            status: DeliveryOrderStatus::Draft,
            sales_order_id: None,
            pick_list_id: None,
            customer_id: None,
            carrier: None,
            tracking_number: None,
            shipping_address: None,
            dispatched_at: None,
            delivered_at: None,
            lines: Vec::new(),
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> DeliveryOrderId {
        self.id
    }

    pub fn tenant_id(&self) -> Option<TenantId> {
        self.tenant_id
    }

    pub fn display_id(&self) -> &str {
        &self.display_id
    }

    pub fn status(&self) -> DeliveryOrderStatus {
        self.status
    }

    pub fn sales_order_id(&self) -> Option<SalesOrderId> {
        self.sales_order_id
    }

    pub fn pick_list_id(&self) -> Option<PickListId> {
        self.pick_list_id
    }

    pub fn customer_id(&self) -> Option<CustomerId> {
        self.customer_id
    }

    pub fn shipping_address(&self) -> Option<&str> {
        self.shipping_address.as_deref()
    }

    pub fn carrier(&self) -> Option<&str> {
        self.carrier.as_deref()
    }

    pub fn tracking_number(&self) -> Option<&str> {
        self.tracking_number.as_deref()
    }

    pub fn dispatched_at(&self) -> Option<DateTime<Utc>> {
        self.dispatched_at
    }

    pub fn delivered_at(&self) -> Option<DateTime<Utc>> {
        self.delivered_at
    }

    pub fn lines(&self) -> &[DeliveryOrderLine] {
        &self.lines
    }

    pub fn is_fully_delivered(&self) -> bool {
        !self.lines.is_empty()
            && self
                .lines
                .iter()
                .all(|l| l.quantity_delivered >= l.quantity_shipped)
    }

    fn line(&self, line_no: u32) -> Option<&DeliveryOrderLine> {
        self.lines.iter().find(|l| l.line_no == line_no)
    }
}

impl AggregateRoot for DeliveryOrder {
    type Id = DeliveryOrderId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: CreateDeliveryOrder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateDeliveryOrder {
    pub tenant_id: TenantId,
    pub delivery_order_id: DeliveryOrderId,
    pub display_id: String,
    pub sales_order_id: Option<SalesOrderId>,
    pub pick_list_id: Option<PickListId>,
    pub customer_id: Option<CustomerId>,
    pub shipping_address: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: AddDeliveryLine (only while draft).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddDeliveryLine {
    pub tenant_id: TenantId,
    pub delivery_order_id: DeliveryOrderId,
    pub sales_order_line_no: Option<u32>,
    pub item_id: Option<ItemId>,
    pub item_name: String,
    pub quantity_shipped: u32,
    pub occurred_at: DateTime<Utc>,
}

/// Command: AssignCarrier (before dispatch).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignCarrier {
    pub tenant_id: TenantId,
    pub delivery_order_id: DeliveryOrderId,
    pub carrier: String,
    pub tracking_number: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RecordDelivery — delivered quantity for one line (after dispatch).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordDelivery {
    pub tenant_id: TenantId,
    pub delivery_order_id: DeliveryOrderId,
    pub line_no: u32,
    /// New absolute delivered quantity (not a delta).
    pub quantity_delivered: u32,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ChangeDeliveryStatus (validated against the transition table).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeDeliveryStatus {
    pub tenant_id: TenantId,
    pub delivery_order_id: DeliveryOrderId,
    pub next: DeliveryOrderStatus,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeliveryOrderCommand {
    CreateDeliveryOrder(CreateDeliveryOrder),
    AddDeliveryLine(AddDeliveryLine),
    AssignCarrier(AssignCarrier),
    RecordDelivery(RecordDelivery),
    ChangeDeliveryStatus(ChangeDeliveryStatus),
}

/// Event: DeliveryOrderCreated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryOrderCreated {
    pub tenant_id: TenantId,
    pub delivery_order_id: DeliveryOrderId,
    pub display_id: String,
    pub sales_order_id: Option<SalesOrderId>,
    pub pick_list_id: Option<PickListId>,
    pub customer_id: Option<CustomerId>,
    pub shipping_address: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: DeliveryLineAdded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryLineAdded {
    pub tenant_id: TenantId,
    pub delivery_order_id: DeliveryOrderId,
    pub line_no: u32,
    pub sales_order_line_no: Option<u32>,
    pub item_id: Option<ItemId>,
    pub item_name: String,
    pub quantity_shipped: u32,
    pub occurred_at: DateTime<Utc>,
}

/// Event: CarrierAssigned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CarrierAssigned {
    pub tenant_id: TenantId,
    pub delivery_order_id: DeliveryOrderId,
    pub carrier: String,
    pub tracking_number: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: DeliveryRecorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryRecorded {
    pub tenant_id: TenantId,
    pub delivery_order_id: DeliveryOrderId,
    pub line_no: u32,
    pub quantity_delivered: u32,
    pub occurred_at: DateTime<Utc>,
}

/// Event: DeliveryStatusChanged.
///
/// Carries the sales-order link so downstream consumers (projections, the
/// order-to-cash saga) can correlate without loading the stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryStatusChanged {
    pub tenant_id: TenantId,
    pub delivery_order_id: DeliveryOrderId,
    pub sales_order_id: Option<SalesOrderId>,
    pub from: DeliveryOrderStatus,
    pub to: DeliveryOrderStatus,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeliveryOrderEvent {
    DeliveryOrderCreated(DeliveryOrderCreated),
    DeliveryLineAdded(DeliveryLineAdded),
    CarrierAssigned(CarrierAssigned),
    DeliveryRecorded(DeliveryRecorded),
    DeliveryStatusChanged(DeliveryStatusChanged),
}

impl Event for DeliveryOrderEvent {
    fn event_type(&self) -> &'static str {
        match self {
            DeliveryOrderEvent::DeliveryOrderCreated(_) => "shipping.delivery_order.created",
            DeliveryOrderEvent::DeliveryLineAdded(_) => "shipping.delivery_order.line_added",
            DeliveryOrderEvent::CarrierAssigned(_) => "shipping.delivery_order.carrier_assigned",
            DeliveryOrderEvent::DeliveryRecorded(_) => "shipping.delivery_order.delivery_recorded",
            DeliveryOrderEvent::DeliveryStatusChanged(_) => "shipping.delivery_order.status_changed",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            DeliveryOrderEvent::DeliveryOrderCreated(e) => e.occurred_at,
            DeliveryOrderEvent::DeliveryLineAdded(e) => e.occurred_at,
            DeliveryOrderEvent::CarrierAssigned(e) => e.occurred_at,
            DeliveryOrderEvent::DeliveryRecorded(e) => e.occurred_at,
            DeliveryOrderEvent::DeliveryStatusChanged(e) => e.occurred_at,
        }
    }
}

impl Aggregate for DeliveryOrder {
    type Command = DeliveryOrderCommand;
    type Event = DeliveryOrderEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            DeliveryOrderEvent::DeliveryOrderCreated(e) => {
                self.id = e.delivery_order_id;
                self.tenant_id = Some(e.tenant_id);
                self.display_id = e.display_id.clone();
                self.sales_order_id = e.sales_order_id;
                self.pick_list_id = e.pick_list_id;
                self.customer_id = e.customer_id;
                self.shipping_address = e.shipping_address.clone();
                self.status = DeliveryOrderStatus::Draft;
                self.lines.clear();
                self.created = true;
            }
            DeliveryOrderEvent::DeliveryLineAdded(e) => {
                self.lines.push(DeliveryOrderLine {
                    line_no: e.line_no,
                    sales_order_line_no: e.sales_order_line_no,
                    item_id: e.item_id,
                    item_name: e.item_name.clone(),
                    quantity_shipped: e.quantity_shipped,
                    quantity_delivered: 0,
                });
            }
            DeliveryOrderEvent::CarrierAssigned(e) => {
                self.carrier = Some(e.carrier.clone());
                self.tracking_number = e.tracking_number.clone();
            }
            DeliveryOrderEvent::DeliveryRecorded(e) => {
                if let Some(line) = self.lines.iter_mut().find(|l| l.line_no == e.line_no) {
                    line.quantity_delivered = e.quantity_delivered;
                }
            }
            DeliveryOrderEvent::DeliveryStatusChanged(e) => {
                self.status = e.to;
                // Business timestamps are recorded the first time each
                // milestone is reached; amendments do not rewrite history.
                match e.to {
                    DeliveryOrderStatus::Dispatched if self.dispatched_at.is_none() => {
                        self.dispatched_at = Some(e.occurred_at);
                    }
                    DeliveryOrderStatus::Delivered if self.delivered_at.is_none() => {
                        self.delivered_at = Some(e.occurred_at);
                    }
                    _ => {}
                }
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            DeliveryOrderCommand::CreateDeliveryOrder(cmd) => self.handle_create(cmd),
            DeliveryOrderCommand::AddDeliveryLine(cmd) => self.handle_add_line(cmd),
            DeliveryOrderCommand::AssignCarrier(cmd) => self.handle_assign_carrier(cmd),
            DeliveryOrderCommand::RecordDelivery(cmd) => self.handle_record_delivery(cmd),
            DeliveryOrderCommand::ChangeDeliveryStatus(cmd) => self.handle_change_status(cmd),
        }
    }
}

impl DeliveryOrder {
    fn ensure_tenant(&self, tenant_id: TenantId) -> Result<(), DomainError> {
        if !self.created {
            return Ok(());
        }
        if self.tenant_id != Some(tenant_id) {
            return Err(DomainError::invariant("tenant mismatch"));
        }
        Ok(())
    }

    fn ensure_delivery_order_id(&self, id: DeliveryOrderId) -> Result<(), DomainError> {
        if self.id != id {
            return Err(DomainError::invariant("delivery_order_id mismatch"));
        }
        Ok(())
    }

    fn ensure_created(&self) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        Ok(())
    }

    fn handle_create(
        &self,
        cmd: &CreateDeliveryOrder,
    ) -> Result<Vec<DeliveryOrderEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("delivery order already exists"));
        }
        if cmd.display_id.trim().is_empty() {
            return Err(DomainError::validation("display_id cannot be empty"));
        }

        Ok(vec![DeliveryOrderEvent::DeliveryOrderCreated(
            DeliveryOrderCreated {
                tenant_id: cmd.tenant_id,
                delivery_order_id: cmd.delivery_order_id,
                display_id: cmd.display_id.clone(),
                sales_order_id: cmd.sales_order_id,
                pick_list_id: cmd.pick_list_id,
                customer_id: cmd.customer_id,
                shipping_address: cmd.shipping_address.clone(),
                occurred_at: cmd.occurred_at,
            },
        )])
    }

    fn handle_add_line(&self, cmd: &AddDeliveryLine) -> Result<Vec<DeliveryOrderEvent>, DomainError> {
        self.ensure_created()?;
        self.ensure_tenant(cmd.tenant_id)?;
        self.ensure_delivery_order_id(cmd.delivery_order_id)?;

        if self.status != DeliveryOrderStatus::Draft {
            return Err(DomainError::invariant(
                "lines can only be added while the delivery order is draft",
            ));
        }
        if cmd.item_name.trim().is_empty() {
            return Err(DomainError::validation("item_name cannot be empty"));
        }
        if cmd.quantity_shipped == 0 {
            return Err(DomainError::validation("quantity_shipped must be positive"));
        }

        let next_line_no = self.lines.iter().map(|l| l.line_no).max().unwrap_or(0) + 1;

        Ok(vec![DeliveryOrderEvent::DeliveryLineAdded(
            DeliveryLineAdded {
                tenant_id: cmd.tenant_id,
                delivery_order_id: cmd.delivery_order_id,
                line_no: next_line_no,
                sales_order_line_no: cmd.sales_order_line_no,
                item_id: cmd.item_id,
                item_name: cmd.item_name.clone(),
                quantity_shipped: cmd.quantity_shipped,
                occurred_at: cmd.occurred_at,
            },
        )])
    }

    fn handle_assign_carrier(
        &self,
        cmd: &AssignCarrier,
    ) -> Result<Vec<DeliveryOrderEvent>, DomainError> {
        self.ensure_created()?;
        self.ensure_tenant(cmd.tenant_id)?;
        self.ensure_delivery_order_id(cmd.delivery_order_id)?;

        if !matches!(
            self.status,
            DeliveryOrderStatus::Draft | DeliveryOrderStatus::Ready
        ) {
            return Err(DomainError::invariant(
                "carrier can only be assigned before dispatch",
            ));
        }
        if cmd.carrier.trim().is_empty() {
            return Err(DomainError::validation("carrier cannot be empty"));
        }

        Ok(vec![DeliveryOrderEvent::CarrierAssigned(CarrierAssigned {
            tenant_id: cmd.tenant_id,
            delivery_order_id: cmd.delivery_order_id,
            carrier: cmd.carrier.clone(),
            tracking_number: cmd.tracking_number.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_record_delivery(
        &self,
        cmd: &RecordDelivery,
    ) -> Result<Vec<DeliveryOrderEvent>, DomainError> {
        self.ensure_created()?;
        self.ensure_tenant(cmd.tenant_id)?;
        self.ensure_delivery_order_id(cmd.delivery_order_id)?;

        if !matches!(
            self.status,
            DeliveryOrderStatus::Dispatched
                | DeliveryOrderStatus::InTransit
                | DeliveryOrderStatus::Delivered
                | DeliveryOrderStatus::Partial
        ) {
            return Err(DomainError::invariant(
                "deliveries can only be recorded after dispatch",
            ));
        }

        let line = self.line(cmd.line_no).ok_or_else(|| {
            DomainError::validation(format!("line {} does not exist", cmd.line_no))
        })?;

        // Delivered only advances, and never beyond what was shipped.
        if cmd.quantity_delivered < line.quantity_delivered
            || cmd.quantity_delivered > line.quantity_shipped
        {
            return Err(DomainError::QuantityConservation {
                field: "quantity_delivered",
                proposed: cmd.quantity_delivered,
                cap: if cmd.quantity_delivered < line.quantity_delivered {
                    line.quantity_delivered
                } else {
                    line.quantity_shipped
                },
            });
        }

        if cmd.quantity_delivered == line.quantity_delivered {
            return Ok(vec![]);
        }

        Ok(vec![DeliveryOrderEvent::DeliveryRecorded(DeliveryRecorded {
            tenant_id: cmd.tenant_id,
            delivery_order_id: cmd.delivery_order_id,
            line_no: cmd.line_no,
            quantity_delivered: cmd.quantity_delivered,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_change_status(
        &self,
        cmd: &ChangeDeliveryStatus,
    ) -> Result<Vec<DeliveryOrderEvent>, DomainError> {
        self.ensure_created()?;
        self.ensure_tenant(cmd.tenant_id)?;
        self.ensure_delivery_order_id(cmd.delivery_order_id)?;

        if cmd.next == self.status {
            return Ok(vec![]);
        }

        self.status.ensure_transition(cmd.next)?;

        if cmd.next == DeliveryOrderStatus::Dispatched && self.lines.is_empty() {
            return Err(DomainError::validation(
                "cannot dispatch a delivery order without lines",
            ));
        }

        Ok(vec![DeliveryOrderEvent::DeliveryStatusChanged(
            DeliveryStatusChanged {
                tenant_id: cmd.tenant_id,
                delivery_order_id: cmd.delivery_order_id,
                sales_order_id: self.sales_order_id,
                from: self.status,
                to: cmd.next,
                occurred_at: cmd.occurred_at,
            },
        )])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stockflow_core::AggregateId;
    use stockflow_events::execute;

    fn test_tenant_id() -> TenantId {
        TenantId::new()
    }

    fn test_delivery_id() -> DeliveryOrderId {
        DeliveryOrderId::new(AggregateId::new())
    }

    fn test_time() -> DateTime<Utc> {
        Utc::now()
    }

    fn change_status(
        order: &mut DeliveryOrder,
        tenant_id: TenantId,
        delivery_order_id: DeliveryOrderId,
        next: DeliveryOrderStatus,
    ) -> Result<Vec<DeliveryOrderEvent>, DomainError> {
        execute(
            order,
            &DeliveryOrderCommand::ChangeDeliveryStatus(ChangeDeliveryStatus {
                tenant_id,
                delivery_order_id,
                next,
                occurred_at: test_time(),
            }),
        )
    }

    fn dispatched_order(
        tenant_id: TenantId,
        delivery_order_id: DeliveryOrderId,
        shipped: u32,
    ) -> DeliveryOrder {
        let mut order = DeliveryOrder::empty(delivery_order_id);
        execute(
            &mut order,
            &DeliveryOrderCommand::CreateDeliveryOrder(CreateDeliveryOrder {
                tenant_id,
                delivery_order_id,
                display_id: "DO-1001".to_string(),
                sales_order_id: Some(SalesOrderId::new(AggregateId::new())),
                pick_list_id: Some(PickListId::new(AggregateId::new())),
                customer_id: Some(CustomerId::new()),
                shipping_address: Some("456 Shipping Ave".to_string()),
                occurred_at: test_time(),
            }),
        )
        .unwrap();
        execute(
            &mut order,
            &DeliveryOrderCommand::AddDeliveryLine(AddDeliveryLine {
                tenant_id,
                delivery_order_id,
                sales_order_line_no: Some(1),
                item_id: Some(ItemId::new()),
                item_name: "Widget A".to_string(),
                quantity_shipped: shipped,
                occurred_at: test_time(),
            }),
        )
        .unwrap();
        execute(
            &mut order,
            &DeliveryOrderCommand::AssignCarrier(AssignCarrier {
                tenant_id,
                delivery_order_id,
                carrier: "DHL".to_string(),
                tracking_number: Some("TRK-0001".to_string()),
                occurred_at: test_time(),
            }),
        )
        .unwrap();
        for next in [DeliveryOrderStatus::Ready, DeliveryOrderStatus::Dispatched] {
            change_status(&mut order, tenant_id, delivery_order_id, next).unwrap();
        }
        order
    }

    #[test]
    fn dispatch_stamps_the_dispatch_time_once() {
        let tenant_id = test_tenant_id();
        let delivery_order_id = test_delivery_id();
        let order = dispatched_order(tenant_id, delivery_order_id, 10);

        assert_eq!(order.status(), DeliveryOrderStatus::Dispatched);
        assert!(order.dispatched_at().is_some());
        assert!(order.delivered_at().is_none());
        assert_eq!(order.carrier(), Some("DHL"));
        assert_eq!(order.tracking_number(), Some("TRK-0001"));
    }

    #[test]
    fn delivery_stamps_the_delivery_time() {
        let tenant_id = test_tenant_id();
        let delivery_order_id = test_delivery_id();
        let mut order = dispatched_order(tenant_id, delivery_order_id, 10);

        change_status(&mut order, tenant_id, delivery_order_id, DeliveryOrderStatus::Delivered)
            .unwrap();
        assert!(order.delivered_at().is_some());
    }

    #[test]
    fn delivered_cannot_exceed_shipped() {
        let tenant_id = test_tenant_id();
        let delivery_order_id = test_delivery_id();
        let mut order = dispatched_order(tenant_id, delivery_order_id, 7);

        let err = execute(
            &mut order,
            &DeliveryOrderCommand::RecordDelivery(RecordDelivery {
                tenant_id,
                delivery_order_id,
                line_no: 1,
                quantity_delivered: 10,
                occurred_at: test_time(),
            }),
        )
        .unwrap_err();

        match err {
            DomainError::QuantityConservation { field, cap, .. } => {
                assert_eq!(field, "quantity_delivered");
                assert_eq!(cap, 7);
            }
            e => panic!("Expected QuantityConservation, got: {e:?}"),
        }
    }

    #[test]
    fn deliveries_cannot_be_recorded_before_dispatch() {
        let tenant_id = test_tenant_id();
        let delivery_order_id = test_delivery_id();
        let mut order = DeliveryOrder::empty(delivery_order_id);
        execute(
            &mut order,
            &DeliveryOrderCommand::CreateDeliveryOrder(CreateDeliveryOrder {
                tenant_id,
                delivery_order_id,
                display_id: "DO-1002".to_string(),
                sales_order_id: None,
                pick_list_id: None,
                customer_id: None,
                shipping_address: None,
                occurred_at: test_time(),
            }),
        )
        .unwrap();

        let err = execute(
            &mut order,
            &DeliveryOrderCommand::RecordDelivery(RecordDelivery {
                tenant_id,
                delivery_order_id,
                line_no: 1,
                quantity_delivered: 1,
                occurred_at: test_time(),
            }),
        )
        .unwrap_err();
        assert!(matches!(err, DomainError::InvariantViolation(_)));
    }

    #[test]
    fn partial_and_delivered_are_mutually_revisitable() {
        let tenant_id = test_tenant_id();
        let delivery_order_id = test_delivery_id();
        let mut order = dispatched_order(tenant_id, delivery_order_id, 10);

        for next in [
            DeliveryOrderStatus::InTransit,
            DeliveryOrderStatus::Partial,
            DeliveryOrderStatus::Delivered,
            DeliveryOrderStatus::Partial,
            DeliveryOrderStatus::Delivered,
        ] {
            change_status(&mut order, tenant_id, delivery_order_id, next).unwrap();
            assert_eq!(order.status(), next);
        }
    }

    #[test]
    fn returned_only_flows_into_cancelled() {
        assert_eq!(
            DeliveryOrderStatus::Returned.allowed_transitions(),
            &[DeliveryOrderStatus::Cancelled]
        );
        assert!(!DeliveryOrderStatus::Returned.can_transition_to(DeliveryOrderStatus::Ready));
    }

    #[test]
    fn failed_delivery_can_retry_or_return() {
        let tenant_id = test_tenant_id();
        let delivery_order_id = test_delivery_id();
        let mut order = dispatched_order(tenant_id, delivery_order_id, 10);

        change_status(&mut order, tenant_id, delivery_order_id, DeliveryOrderStatus::Failed)
            .unwrap();
        change_status(&mut order, tenant_id, delivery_order_id, DeliveryOrderStatus::Ready)
            .unwrap();
        assert_eq!(order.status(), DeliveryOrderStatus::Ready);
    }

    #[test]
    fn cancelled_reopens_to_draft() {
        let tenant_id = test_tenant_id();
        let delivery_order_id = test_delivery_id();
        let mut order = DeliveryOrder::empty(delivery_order_id);
        execute(
            &mut order,
            &DeliveryOrderCommand::CreateDeliveryOrder(CreateDeliveryOrder {
                tenant_id,
                delivery_order_id,
                display_id: "DO-1003".to_string(),
                sales_order_id: None,
                pick_list_id: None,
                customer_id: None,
                shipping_address: None,
                occurred_at: test_time(),
            }),
        )
        .unwrap();

        change_status(&mut order, tenant_id, delivery_order_id, DeliveryOrderStatus::Cancelled)
            .unwrap();
        change_status(&mut order, tenant_id, delivery_order_id, DeliveryOrderStatus::Draft)
            .unwrap();
        assert_eq!(order.status(), DeliveryOrderStatus::Draft);
    }

    #[test]
    fn dispatch_requires_lines() {
        let tenant_id = test_tenant_id();
        let delivery_order_id = test_delivery_id();
        let mut order = DeliveryOrder::empty(delivery_order_id);
        execute(
            &mut order,
            &DeliveryOrderCommand::CreateDeliveryOrder(CreateDeliveryOrder {
                tenant_id,
                delivery_order_id,
                display_id: "DO-1004".to_string(),
                sales_order_id: None,
                pick_list_id: None,
                customer_id: None,
                shipping_address: None,
                occurred_at: test_time(),
            }),
        )
        .unwrap();
        change_status(&mut order, tenant_id, delivery_order_id, DeliveryOrderStatus::Ready)
            .unwrap();

        let err = change_status(
            &mut order,
            tenant_id,
            delivery_order_id,
            DeliveryOrderStatus::Dispatched,
        )
        .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }
}
