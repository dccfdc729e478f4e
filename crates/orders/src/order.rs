use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use stockflow_core::{
    Aggregate, AggregateId, AggregateRoot, CustomerId, DomainError, ItemId, StatusLifecycle,
    TenantId,
};
use stockflow_events::Event;
use stockflow_pricing::{DocumentTotals, LineInput, LineTotals, document_totals, line_total};

use crate::quantity::{PipelineStage, QuantityPipeline};
use crate::status::SalesOrderStatus;

/// Sales order identifier (tenant-scoped via `tenant_id` fields in events/commands).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SalesOrderId(pub AggregateId);

impl SalesOrderId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for SalesOrderId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Order line: an item snapshot plus the quantity pipeline.
///
/// Item name/sku/price are copied from the inventory item at add time and do
/// not track later item edits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SalesOrderLine {
    pub line_no: u32,
    pub item_id: Option<ItemId>,
    pub item_name: String,
    pub sku: Option<String>,
    pub unit_price: Decimal,
    /// Percentage, e.g. `10` means 10%.
    pub discount_percent: Decimal,
    /// Percentage, applied after discount.
    pub tax_rate: Decimal,
    pub quantities: QuantityPipeline,
}

impl SalesOrderLine {
    pub fn pricing_input(&self) -> LineInput {
        LineInput {
            quantity: self.quantities.ordered,
            unit_price: self.unit_price,
            discount_percent: self.discount_percent,
            tax_rate: self.tax_rate,
        }
    }

    pub fn totals(&self) -> Result<LineTotals, DomainError> {
        line_total(&self.pricing_input())
    }
}

/// Aggregate root: SalesOrder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SalesOrder {
    id: SalesOrderId,
    tenant_id: Option<TenantId>,
    display_id: String,
    customer_id: Option<CustomerId>,
    status: SalesOrderStatus,
    lines: Vec<SalesOrderLine>,
    /// Link to the pick list staging this order, by aggregate id.
    /// (The typed id lives in the picking crate; linking by `AggregateId`
    /// keeps the domain crates acyclic.)
    pick_list_id: Option<AggregateId>,
    version: u64,
    created: bool,
}

impl SalesOrder {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: SalesOrderId) -> Self {
        Self {
            id,
            tenant_id: None,
            display_id: String::new(),
            customer_id: None,
            status: SalesOrderStatus::Draft,
            lines: Vec::new(),
            pick_list_id: None,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> SalesOrderId {
        self.id
    }

    pub fn tenant_id(&self) -> Option<TenantId> {
        self.tenant_id
    }

    pub fn display_id(&self) -> &str {
        &self.display_id
    }

    pub fn customer_id(&self) -> Option<CustomerId> {
        self.customer_id
    }

    pub fn status(&self) -> SalesOrderStatus {
        self.status
    }

    pub fn lines(&self) -> &[SalesOrderLine] {
        &self.lines
    }

    pub fn pick_list_id(&self) -> Option<AggregateId> {
        self.pick_list_id
    }

    /// Lines can only be added/removed before the order is confirmed.
    pub fn is_modifiable(&self) -> bool {
        matches!(
            self.status,
            SalesOrderStatus::Draft | SalesOrderStatus::Submitted
        )
    }

    /// Monetary totals derived from the lines (never stored).
    pub fn totals(&self) -> Result<DocumentTotals, DomainError> {
        let inputs: Vec<LineInput> = self.lines.iter().map(|l| l.pricing_input()).collect();
        document_totals(&inputs)
    }

    /// Aggregate shipping state derived from the line counters.
    ///
    /// Advisory only: the suggestion still has to pass the transition table
    /// as a regular status change request.
    pub fn derived_shipping_status(&self) -> Option<SalesOrderStatus> {
        if self.lines.is_empty() {
            return None;
        }
        if self.lines.iter().all(|l| l.quantities.fully_shipped()) {
            Some(SalesOrderStatus::Shipped)
        } else if self.lines.iter().any(|l| l.quantities.any_shipped()) {
            Some(SalesOrderStatus::PartialShipped)
        } else {
            None
        }
    }

    fn line(&self, line_no: u32) -> Option<&SalesOrderLine> {
        self.lines.iter().find(|l| l.line_no == line_no)
    }
}

impl AggregateRoot for SalesOrder {
    type Id = SalesOrderId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: CreateSalesOrder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateSalesOrder {
    pub tenant_id: TenantId,
    pub order_id: SalesOrderId,
    pub display_id: String,
    pub customer_id: Option<CustomerId>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: AddLine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddLine {
    pub tenant_id: TenantId,
    pub order_id: SalesOrderId,
    pub item_id: Option<ItemId>,
    pub item_name: String,
    pub sku: Option<String>,
    pub quantity: u32,
    pub unit_price: Decimal,
    pub discount_percent: Decimal,
    pub tax_rate: Decimal,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RemoveLine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoveLine {
    pub tenant_id: TenantId,
    pub order_id: SalesOrderId,
    pub line_no: u32,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ChangeOrderStatus (validated against the transition table).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeOrderStatus {
    pub tenant_id: TenantId,
    pub order_id: SalesOrderId,
    pub next: SalesOrderStatus,
    pub occurred_at: DateTime<Utc>,
}

/// Command: AttachPickList.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachPickList {
    pub tenant_id: TenantId,
    pub order_id: SalesOrderId,
    pub pick_list_id: AggregateId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RecordLineQuantity — a downstream document reporting progress
/// (allocation, pick, shipment, delivery, invoicing) on one line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordLineQuantity {
    pub tenant_id: TenantId,
    pub order_id: SalesOrderId,
    pub line_no: u32,
    pub stage: PipelineStage,
    /// New absolute counter value (not a delta).
    pub quantity: u32,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SalesOrderCommand {
    CreateSalesOrder(CreateSalesOrder),
    AddLine(AddLine),
    RemoveLine(RemoveLine),
    ChangeOrderStatus(ChangeOrderStatus),
    AttachPickList(AttachPickList),
    RecordLineQuantity(RecordLineQuantity),
}

/// Event: SalesOrderCreated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SalesOrderCreated {
    pub tenant_id: TenantId,
    pub order_id: SalesOrderId,
    pub display_id: String,
    pub customer_id: Option<CustomerId>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: LineAdded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineAdded {
    pub tenant_id: TenantId,
    pub order_id: SalesOrderId,
    pub line_no: u32,
    pub item_id: Option<ItemId>,
    pub item_name: String,
    pub sku: Option<String>,
    pub quantity_ordered: u32,
    pub unit_price: Decimal,
    pub discount_percent: Decimal,
    pub tax_rate: Decimal,
    pub occurred_at: DateTime<Utc>,
}

/// Event: LineRemoved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineRemoved {
    pub tenant_id: TenantId,
    pub order_id: SalesOrderId,
    pub line_no: u32,
    pub occurred_at: DateTime<Utc>,
}

/// Event: OrderStatusChanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderStatusChanged {
    pub tenant_id: TenantId,
    pub order_id: SalesOrderId,
    pub from: SalesOrderStatus,
    pub to: SalesOrderStatus,
    pub occurred_at: DateTime<Utc>,
}

/// Event: PickListAttached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PickListAttached {
    pub tenant_id: TenantId,
    pub order_id: SalesOrderId,
    pub pick_list_id: AggregateId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: LineQuantityRecorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineQuantityRecorded {
    pub tenant_id: TenantId,
    pub order_id: SalesOrderId,
    pub line_no: u32,
    pub stage: PipelineStage,
    pub quantity: u32,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SalesOrderEvent {
    SalesOrderCreated(SalesOrderCreated),
    LineAdded(LineAdded),
    LineRemoved(LineRemoved),
    OrderStatusChanged(OrderStatusChanged),
    PickListAttached(PickListAttached),
    LineQuantityRecorded(LineQuantityRecorded),
}

impl Event for SalesOrderEvent {
    fn event_type(&self) -> &'static str {
        match self {
            SalesOrderEvent::SalesOrderCreated(_) => "orders.sales_order.created",
            SalesOrderEvent::LineAdded(_) => "orders.sales_order.line_added",
            SalesOrderEvent::LineRemoved(_) => "orders.sales_order.line_removed",
            SalesOrderEvent::OrderStatusChanged(_) => "orders.sales_order.status_changed",
            SalesOrderEvent::PickListAttached(_) => "orders.sales_order.pick_list_attached",
            SalesOrderEvent::LineQuantityRecorded(e) => match e.stage {
                PipelineStage::Allocated => "orders.sales_order.quantity_allocated",
                PipelineStage::Picked => "orders.sales_order.quantity_picked",
                PipelineStage::Shipped => "orders.sales_order.quantity_shipped",
                PipelineStage::Delivered => "orders.sales_order.quantity_delivered",
                PipelineStage::Invoiced => "orders.sales_order.quantity_invoiced",
            },
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            SalesOrderEvent::SalesOrderCreated(e) => e.occurred_at,
            SalesOrderEvent::LineAdded(e) => e.occurred_at,
            SalesOrderEvent::LineRemoved(e) => e.occurred_at,
            SalesOrderEvent::OrderStatusChanged(e) => e.occurred_at,
            SalesOrderEvent::PickListAttached(e) => e.occurred_at,
            SalesOrderEvent::LineQuantityRecorded(e) => e.occurred_at,
        }
    }
}

impl Aggregate for SalesOrder {
    type Command = SalesOrderCommand;
    type Event = SalesOrderEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            SalesOrderEvent::SalesOrderCreated(e) => {
                self.id = e.order_id;
                self.tenant_id = Some(e.tenant_id);
                self.display_id = e.display_id.clone();
                self.customer_id = e.customer_id;
                self.status = SalesOrderStatus::Draft;
                self.lines.clear();
                self.pick_list_id = None;
                self.created = true;
            }
            SalesOrderEvent::LineAdded(e) => {
                self.lines.push(SalesOrderLine {
                    line_no: e.line_no,
                    item_id: e.item_id,
                    item_name: e.item_name.clone(),
                    sku: e.sku.clone(),
                    unit_price: e.unit_price,
                    discount_percent: e.discount_percent,
                    tax_rate: e.tax_rate,
                    quantities: QuantityPipeline::new(e.quantity_ordered),
                });
            }
            SalesOrderEvent::LineRemoved(e) => {
                self.lines.retain(|l| l.line_no != e.line_no);
            }
            SalesOrderEvent::OrderStatusChanged(e) => {
                self.status = e.to;
            }
            SalesOrderEvent::PickListAttached(e) => {
                self.pick_list_id = Some(e.pick_list_id);
            }
            SalesOrderEvent::LineQuantityRecorded(e) => {
                if let Some(line) = self.lines.iter_mut().find(|l| l.line_no == e.line_no) {
                    line.quantities.set_unchecked(e.stage, e.quantity);
                }
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            SalesOrderCommand::CreateSalesOrder(cmd) => self.handle_create(cmd),
            SalesOrderCommand::AddLine(cmd) => self.handle_add_line(cmd),
            SalesOrderCommand::RemoveLine(cmd) => self.handle_remove_line(cmd),
            SalesOrderCommand::ChangeOrderStatus(cmd) => self.handle_change_status(cmd),
            SalesOrderCommand::AttachPickList(cmd) => self.handle_attach_pick_list(cmd),
            SalesOrderCommand::RecordLineQuantity(cmd) => self.handle_record_quantity(cmd),
        }
    }
}

impl SalesOrder {
    fn ensure_tenant(&self, tenant_id: TenantId) -> Result<(), DomainError> {
        if !self.created {
            return Ok(());
        }
        if self.tenant_id != Some(tenant_id) {
            return Err(DomainError::invariant("tenant mismatch"));
        }
        Ok(())
    }

    fn ensure_order_id(&self, order_id: SalesOrderId) -> Result<(), DomainError> {
        if self.id != order_id {
            return Err(DomainError::invariant("order_id mismatch"));
        }
        Ok(())
    }

    fn ensure_created(&self) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        Ok(())
    }

    fn handle_create(&self, cmd: &CreateSalesOrder) -> Result<Vec<SalesOrderEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("sales order already exists"));
        }
        if cmd.display_id.trim().is_empty() {
            return Err(DomainError::validation("display_id cannot be empty"));
        }

        Ok(vec![SalesOrderEvent::SalesOrderCreated(SalesOrderCreated {
            tenant_id: cmd.tenant_id,
            order_id: cmd.order_id,
            display_id: cmd.display_id.clone(),
            customer_id: cmd.customer_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_add_line(&self, cmd: &AddLine) -> Result<Vec<SalesOrderEvent>, DomainError> {
        self.ensure_created()?;
        self.ensure_tenant(cmd.tenant_id)?;
        self.ensure_order_id(cmd.order_id)?;

        if !self.is_modifiable() {
            return Err(DomainError::invariant(
                "lines can only change while the order is draft or submitted",
            ));
        }
        if cmd.item_name.trim().is_empty() {
            return Err(DomainError::validation("item_name cannot be empty"));
        }

        // Reject bad pricing inputs up front (negative price, discount > 100%, ...).
        line_total(&LineInput {
            quantity: cmd.quantity,
            unit_price: cmd.unit_price,
            discount_percent: cmd.discount_percent,
            tax_rate: cmd.tax_rate,
        })?;

        let next_line_no = self.lines.iter().map(|l| l.line_no).max().unwrap_or(0) + 1;

        Ok(vec![SalesOrderEvent::LineAdded(LineAdded {
            tenant_id: cmd.tenant_id,
            order_id: cmd.order_id,
            line_no: next_line_no,
            item_id: cmd.item_id,
            item_name: cmd.item_name.clone(),
            sku: cmd.sku.clone(),
            quantity_ordered: cmd.quantity,
            unit_price: cmd.unit_price,
            discount_percent: cmd.discount_percent,
            tax_rate: cmd.tax_rate,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_remove_line(&self, cmd: &RemoveLine) -> Result<Vec<SalesOrderEvent>, DomainError> {
        self.ensure_created()?;
        self.ensure_tenant(cmd.tenant_id)?;
        self.ensure_order_id(cmd.order_id)?;

        if !self.is_modifiable() {
            return Err(DomainError::invariant(
                "lines can only change while the order is draft or submitted",
            ));
        }
        if self.line(cmd.line_no).is_none() {
            return Err(DomainError::validation(format!(
                "line {} does not exist",
                cmd.line_no
            )));
        }

        Ok(vec![SalesOrderEvent::LineRemoved(LineRemoved {
            tenant_id: cmd.tenant_id,
            order_id: cmd.order_id,
            line_no: cmd.line_no,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_change_status(
        &self,
        cmd: &ChangeOrderStatus,
    ) -> Result<Vec<SalesOrderEvent>, DomainError> {
        self.ensure_created()?;
        self.ensure_tenant(cmd.tenant_id)?;
        self.ensure_order_id(cmd.order_id)?;

        // Idempotent re-save: same status is always legal and emits nothing.
        if cmd.next == self.status {
            return Ok(vec![]);
        }

        self.status.ensure_transition(cmd.next)?;

        if cmd.next == SalesOrderStatus::Submitted && self.lines.is_empty() {
            return Err(DomainError::validation(
                "cannot submit an order without lines",
            ));
        }

        Ok(vec![SalesOrderEvent::OrderStatusChanged(
            OrderStatusChanged {
                tenant_id: cmd.tenant_id,
                order_id: cmd.order_id,
                from: self.status,
                to: cmd.next,
                occurred_at: cmd.occurred_at,
            },
        )])
    }

    fn handle_attach_pick_list(
        &self,
        cmd: &AttachPickList,
    ) -> Result<Vec<SalesOrderEvent>, DomainError> {
        self.ensure_created()?;
        self.ensure_tenant(cmd.tenant_id)?;
        self.ensure_order_id(cmd.order_id)?;

        if !matches!(
            self.status,
            SalesOrderStatus::Confirmed | SalesOrderStatus::Picking
        ) {
            return Err(DomainError::invariant(
                "pick list can only be attached to a confirmed order",
            ));
        }
        if self.pick_list_id.is_some() {
            return Err(DomainError::conflict("order already has a pick list"));
        }

        Ok(vec![SalesOrderEvent::PickListAttached(PickListAttached {
            tenant_id: cmd.tenant_id,
            order_id: cmd.order_id,
            pick_list_id: cmd.pick_list_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_record_quantity(
        &self,
        cmd: &RecordLineQuantity,
    ) -> Result<Vec<SalesOrderEvent>, DomainError> {
        self.ensure_created()?;
        self.ensure_tenant(cmd.tenant_id)?;
        self.ensure_order_id(cmd.order_id)?;

        // Progress is reported by downstream documents; there is nothing to
        // report before submission or on a dead order.
        if matches!(
            self.status,
            SalesOrderStatus::Draft | SalesOrderStatus::Cancelled
        ) {
            return Err(DomainError::invariant(
                "cannot record fulfillment progress on a draft or cancelled order",
            ));
        }

        let line = self.line(cmd.line_no).ok_or_else(|| {
            DomainError::validation(format!("line {} does not exist", cmd.line_no))
        })?;

        // Same value re-reported is an idempotent no-op.
        if line.quantities.counter(cmd.stage) == cmd.quantity {
            return Ok(vec![]);
        }

        line.quantities.advance(cmd.stage, cmd.quantity)?;

        Ok(vec![SalesOrderEvent::LineQuantityRecorded(
            LineQuantityRecorded {
                tenant_id: cmd.tenant_id,
                order_id: cmd.order_id,
                line_no: cmd.line_no,
                stage: cmd.stage,
                quantity: cmd.quantity,
                occurred_at: cmd.occurred_at,
            },
        )])
    }
}
