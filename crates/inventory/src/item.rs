use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use stockflow_core::{Aggregate, AggregateId, AggregateRoot, DomainError, TenantId};
use stockflow_events::Event;

/// Inventory item identifier (tenant-scoped via `tenant_id` fields in events/commands).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InventoryItemId(pub AggregateId);

impl InventoryItemId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for InventoryItemId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Aggregate root: InventoryItem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InventoryItem {
    id: InventoryItemId,
    tenant_id: Option<TenantId>,
    name: String,
    sku: Option<String>,
    unit_price: Decimal,
    stock: i64,
    version: u64,
    created: bool,
}

impl InventoryItem {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: InventoryItemId) -> Self {
        Self {
            id,
            tenant_id: None,
            name: String::new(),
            sku: None,
            unit_price: Decimal::ZERO,
            stock: 0,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> InventoryItemId {
        self.id
    }

    pub fn tenant_id(&self) -> Option<TenantId> {
        self.tenant_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn sku(&self) -> Option<&str> {
        self.sku.as_deref()
    }

    pub fn unit_price(&self) -> Decimal {
        self.unit_price
    }

    pub fn stock(&self) -> i64 {
        self.stock
    }
}

impl AggregateRoot for InventoryItem {
    type Id = InventoryItemId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: CreateItem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateItem {
    pub tenant_id: TenantId,
    pub item_id: InventoryItemId,
    pub name: String,
    pub sku: Option<String>,
    pub unit_price: Decimal,
    pub occurred_at: DateTime<Utc>,
}

/// Command: AdjustStock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdjustStock {
    pub tenant_id: TenantId,
    pub item_id: InventoryItemId,
    pub delta: i64,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RepriceItem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepriceItem {
    pub tenant_id: TenantId,
    pub item_id: InventoryItemId,
    pub unit_price: Decimal,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InventoryCommand {
    CreateItem(CreateItem),
    AdjustStock(AdjustStock),
    RepriceItem(RepriceItem),
}

/// Event: ItemCreated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemCreated {
    pub tenant_id: TenantId,
    pub item_id: InventoryItemId,
    pub name: String,
    pub sku: Option<String>,
    pub unit_price: Decimal,
    pub occurred_at: DateTime<Utc>,
}

/// Event: StockAdjusted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockAdjusted {
    pub tenant_id: TenantId,
    pub item_id: InventoryItemId,
    pub delta: i64,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ItemRepriced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemRepriced {
    pub tenant_id: TenantId,
    pub item_id: InventoryItemId,
    pub unit_price: Decimal,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InventoryEvent {
    ItemCreated(ItemCreated),
    StockAdjusted(StockAdjusted),
    ItemRepriced(ItemRepriced),
}

impl Event for InventoryEvent {
    fn event_type(&self) -> &'static str {
        match self {
            InventoryEvent::ItemCreated(_) => "inventory.item.created",
            InventoryEvent::StockAdjusted(_) => "inventory.item.stock_adjusted",
            InventoryEvent::ItemRepriced(_) => "inventory.item.repriced",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            InventoryEvent::ItemCreated(e) => e.occurred_at,
            InventoryEvent::StockAdjusted(e) => e.occurred_at,
            InventoryEvent::ItemRepriced(e) => e.occurred_at,
        }
    }
}

impl Aggregate for InventoryItem {
    type Command = InventoryCommand;
    type Event = InventoryEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            InventoryEvent::ItemCreated(e) => {
                self.id = e.item_id;
                self.tenant_id = Some(e.tenant_id);
                self.name = e.name.clone();
                self.sku = e.sku.clone();
                self.unit_price = e.unit_price;
                self.stock = 0;
                self.created = true;
            }
            InventoryEvent::StockAdjusted(e) => {
                self.stock += e.delta;
            }
            InventoryEvent::ItemRepriced(e) => {
                self.unit_price = e.unit_price;
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            InventoryCommand::CreateItem(cmd) => self.handle_create(cmd),
            InventoryCommand::AdjustStock(cmd) => self.handle_adjust(cmd),
            InventoryCommand::RepriceItem(cmd) => self.handle_reprice(cmd),
        }
    }
}

impl InventoryItem {
    fn ensure_tenant(&self, tenant_id: TenantId) -> Result<(), DomainError> {
        if !self.created {
            return Ok(());
        }
        if self.tenant_id != Some(tenant_id) {
            return Err(DomainError::invariant("tenant mismatch"));
        }
        Ok(())
    }

    fn ensure_item_id(&self, item_id: InventoryItemId) -> Result<(), DomainError> {
        if self.id != item_id {
            return Err(DomainError::invariant("item_id mismatch"));
        }
        Ok(())
    }

    fn handle_create(&self, cmd: &CreateItem) -> Result<Vec<InventoryEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("item already exists"));
        }
        if cmd.name.trim().is_empty() {
            return Err(DomainError::validation("name cannot be empty"));
        }
        if cmd.unit_price < Decimal::ZERO {
            return Err(DomainError::validation("unit_price cannot be negative"));
        }
        Ok(vec![InventoryEvent::ItemCreated(ItemCreated {
            tenant_id: cmd.tenant_id,
            item_id: cmd.item_id,
            name: cmd.name.clone(),
            sku: cmd.sku.clone(),
            unit_price: cmd.unit_price,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_adjust(&self, cmd: &AdjustStock) -> Result<Vec<InventoryEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_tenant(cmd.tenant_id)?;
        self.ensure_item_id(cmd.item_id)?;

        if cmd.delta == 0 {
            return Err(DomainError::validation("delta cannot be zero"));
        }

        let new_stock = self.stock + cmd.delta;
        if new_stock < 0 {
            return Err(DomainError::invariant("stock cannot go negative"));
        }

        Ok(vec![InventoryEvent::StockAdjusted(StockAdjusted {
            tenant_id: cmd.tenant_id,
            item_id: cmd.item_id,
            delta: cmd.delta,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_reprice(&self, cmd: &RepriceItem) -> Result<Vec<InventoryEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_tenant(cmd.tenant_id)?;
        self.ensure_item_id(cmd.item_id)?;

        if cmd.unit_price < Decimal::ZERO {
            return Err(DomainError::validation("unit_price cannot be negative"));
        }

        Ok(vec![InventoryEvent::ItemRepriced(ItemRepriced {
            tenant_id: cmd.tenant_id,
            item_id: cmd.item_id,
            unit_price: cmd.unit_price,
            occurred_at: cmd.occurred_at,
        })])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use stockflow_core::AggregateId;
    use stockflow_events::execute;

    fn test_tenant_id() -> TenantId {
        TenantId::new()
    }

    fn test_item_id() -> InventoryItemId {
        InventoryItemId::new(AggregateId::new())
    }

    fn test_time() -> DateTime<Utc> {
        Utc::now()
    }

    fn created_item(tenant_id: TenantId, item_id: InventoryItemId) -> InventoryItem {
        let mut item = InventoryItem::empty(item_id);
        execute(
            &mut item,
            &InventoryCommand::CreateItem(CreateItem {
                tenant_id,
                item_id,
                name: "Widget A".to_string(),
                sku: Some("WID-A".to_string()),
                unit_price: dec!(50),
                occurred_at: test_time(),
            }),
        )
        .unwrap();
        item
    }

    #[test]
    fn create_item_captures_master_data() {
        let tenant_id = test_tenant_id();
        let item_id = test_item_id();
        let item = created_item(tenant_id, item_id);

        assert_eq!(item.name(), "Widget A");
        assert_eq!(item.sku(), Some("WID-A"));
        assert_eq!(item.unit_price(), dec!(50));
        assert_eq!(item.stock(), 0);
        assert_eq!(item.tenant_id(), Some(tenant_id));
    }

    #[test]
    fn stock_adjustments_accumulate() {
        let tenant_id = test_tenant_id();
        let item_id = test_item_id();
        let mut item = created_item(tenant_id, item_id);

        for delta in [5, 10, -3, 7] {
            execute(
                &mut item,
                &InventoryCommand::AdjustStock(AdjustStock {
                    tenant_id,
                    item_id,
                    delta,
                    occurred_at: test_time(),
                }),
            )
            .unwrap();
        }

        assert_eq!(item.stock(), 19);
    }

    #[test]
    fn stock_cannot_go_negative() {
        let tenant_id = test_tenant_id();
        let item_id = test_item_id();
        let mut item = created_item(tenant_id, item_id);

        let err = execute(
            &mut item,
            &InventoryCommand::AdjustStock(AdjustStock {
                tenant_id,
                item_id,
                delta: -1,
                occurred_at: test_time(),
            }),
        )
        .unwrap_err();

        match err {
            DomainError::InvariantViolation(msg) if msg.contains("stock cannot go negative") => {}
            e => panic!("Expected InvariantViolation, got: {e:?}"),
        }
    }

    #[test]
    fn reprice_updates_unit_price_only() {
        let tenant_id = test_tenant_id();
        let item_id = test_item_id();
        let mut item = created_item(tenant_id, item_id);

        execute(
            &mut item,
            &InventoryCommand::RepriceItem(RepriceItem {
                tenant_id,
                item_id,
                unit_price: dec!(75.50),
                occurred_at: test_time(),
            }),
        )
        .unwrap();

        assert_eq!(item.unit_price(), dec!(75.50));
        assert_eq!(item.name(), "Widget A");
    }

    #[test]
    fn commands_from_wrong_tenant_are_rejected() {
        let tenant_id = test_tenant_id();
        let item_id = test_item_id();
        let mut item = created_item(tenant_id, item_id);

        let err = execute(
            &mut item,
            &InventoryCommand::AdjustStock(AdjustStock {
                tenant_id: test_tenant_id(),
                item_id,
                delta: 1,
                occurred_at: test_time(),
            }),
        )
        .unwrap_err();

        match err {
            DomainError::InvariantViolation(msg) if msg.contains("tenant mismatch") => {}
            e => panic!("Expected tenant mismatch, got: {e:?}"),
        }
    }
}
