use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockflow_core::{
    Aggregate, AggregateId, AggregateRoot, DomainError, ItemId, StatusLifecycle, TenantId,
};
use stockflow_events::Event;
use stockflow_orders::SalesOrderId;

/// Pick list identifier (tenant-scoped via `tenant_id` fields in events/commands).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PickListId(pub AggregateId);

impl PickListId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for PickListId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Pick list status lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PickListStatus {
    Draft,
    Pending,
    InProgress,
    Completed,
    Cancelled,
}

impl StatusLifecycle for PickListStatus {
    fn as_str(&self) -> &'static str {
        match self {
            PickListStatus::Draft => "draft",
            PickListStatus::Pending => "pending",
            PickListStatus::InProgress => "in_progress",
            PickListStatus::Completed => "completed",
            PickListStatus::Cancelled => "cancelled",
        }
    }

    fn allowed_transitions(&self) -> &'static [Self] {
        use PickListStatus::*;
        match self {
            Draft => &[Pending, Cancelled],
            Pending => &[InProgress, Cancelled],
            InProgress => &[Completed, Cancelled],
            Completed => &[],
            Cancelled => &[Draft],
        }
    }
}

impl core::fmt::Display for PickListStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One item to pick: requested vs actually picked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PickListItem {
    pub line_no: u32,
    /// Sales order line this pick feeds (`quantity_picked`).
    pub sales_order_line_no: Option<u32>,
    pub item_id: Option<ItemId>,
    pub item_name: String,
    pub requested_quantity: u32,
    pub picked_quantity: u32,
}

impl PickListItem {
    pub fn remaining(&self) -> u32 {
        self.requested_quantity - self.picked_quantity
    }
}

/// Aggregate root: PickList.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PickList {
    id: PickListId,
    tenant_id: Option<TenantId>,
    display_id: String,
    status: PickListStatus,
    sales_order_id: Option<SalesOrderId>,
    items: Vec<PickListItem>,
    version: u64,
    created: bool,
}

impl PickList {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: PickListId) -> Self {
        Self {
            id,
            tenant_id: None,
            display_id: String::new(),
            status: PickListStatus::Draft,
            sales_order_id: None,
            items: Vec::new(),
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> PickListId {
        self.id
    }

    pub fn tenant_id(&self) -> Option<TenantId> {
        self.tenant_id
    }

    pub fn display_id(&self) -> &str {
        &self.display_id
    }

    pub fn status(&self) -> PickListStatus {
        self.status
    }

    pub fn sales_order_id(&self) -> Option<SalesOrderId> {
        self.sales_order_id
    }

    pub fn items(&self) -> &[PickListItem] {
        &self.items
    }

    pub fn is_fully_picked(&self) -> bool {
        !self.items.is_empty() && self.items.iter().all(|i| i.remaining() == 0)
    }

    fn item(&self, line_no: u32) -> Option<&PickListItem> {
        self.items.iter().find(|i| i.line_no == line_no)
    }
}

impl AggregateRoot for PickList {
    type Id = PickListId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: CreatePickList.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatePickList {
    pub tenant_id: TenantId,
    pub pick_list_id: PickListId,
    pub display_id: String,
    pub sales_order_id: Option<SalesOrderId>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: AddPickItem (only while draft).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddPickItem {
    pub tenant_id: TenantId,
    pub pick_list_id: PickListId,
    pub sales_order_line_no: Option<u32>,
    pub item_id: Option<ItemId>,
    pub item_name: String,
    pub requested_quantity: u32,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RecordPick — report the picked quantity for one item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordPick {
    pub tenant_id: TenantId,
    pub pick_list_id: PickListId,
    pub line_no: u32,
    /// New absolute picked quantity (not a delta).
    pub picked_quantity: u32,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ChangePickListStatus (validated against the transition table).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangePickListStatus {
    pub tenant_id: TenantId,
    pub pick_list_id: PickListId,
    pub next: PickListStatus,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PickListCommand {
    CreatePickList(CreatePickList),
    AddPickItem(AddPickItem),
    RecordPick(RecordPick),
    ChangePickListStatus(ChangePickListStatus),
}

/// Event: PickListCreated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PickListCreated {
    pub tenant_id: TenantId,
    pub pick_list_id: PickListId,
    pub display_id: String,
    pub sales_order_id: Option<SalesOrderId>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: PickItemAdded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PickItemAdded {
    pub tenant_id: TenantId,
    pub pick_list_id: PickListId,
    pub line_no: u32,
    pub sales_order_line_no: Option<u32>,
    pub item_id: Option<ItemId>,
    pub item_name: String,
    pub requested_quantity: u32,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ItemPicked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemPicked {
    pub tenant_id: TenantId,
    pub pick_list_id: PickListId,
    pub line_no: u32,
    pub picked_quantity: u32,
    pub occurred_at: DateTime<Utc>,
}

/// Event: PickListStatusChanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PickListStatusChanged {
    pub tenant_id: TenantId,
    pub pick_list_id: PickListId,
    pub from: PickListStatus,
    pub to: PickListStatus,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PickListEvent {
    PickListCreated(PickListCreated),
    PickItemAdded(PickItemAdded),
    ItemPicked(ItemPicked),
    PickListStatusChanged(PickListStatusChanged),
}

impl Event for PickListEvent {
    fn event_type(&self) -> &'static str {
        match self {
            PickListEvent::PickListCreated(_) => "picking.pick_list.created",
            PickListEvent::PickItemAdded(_) => "picking.pick_list.item_added",
            PickListEvent::ItemPicked(_) => "picking.pick_list.item_picked",
            PickListEvent::PickListStatusChanged(_) => "picking.pick_list.status_changed",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            PickListEvent::PickListCreated(e) => e.occurred_at,
            PickListEvent::PickItemAdded(e) => e.occurred_at,
            PickListEvent::ItemPicked(e) => e.occurred_at,
            PickListEvent::PickListStatusChanged(e) => e.occurred_at,
        }
    }
}

impl Aggregate for PickList {
    type Command = PickListCommand;
    type Event = PickListEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            PickListEvent::PickListCreated(e) => {
                self.id = e.pick_list_id;
                self.tenant_id = Some(e.tenant_id);
                self.display_id = e.display_id.clone();
                self.sales_order_id = e.sales_order_id;
                self.status = PickListStatus::Draft;
                self.items.clear();
                self.created = true;
            }
            PickListEvent::PickItemAdded(e) => {
                self.items.push(PickListItem {
                    line_no: e.line_no,
                    sales_order_line_no: e.sales_order_line_no,
                    item_id: e.item_id,
                    item_name: e.item_name.clone(),
                    requested_quantity: e.requested_quantity,
                    picked_quantity: 0,
                });
            }
            PickListEvent::ItemPicked(e) => {
                if let Some(item) = self.items.iter_mut().find(|i| i.line_no == e.line_no) {
                    item.picked_quantity = e.picked_quantity;
                }
            }
            PickListEvent::PickListStatusChanged(e) => {
                self.status = e.to;
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            PickListCommand::CreatePickList(cmd) => self.handle_create(cmd),
            PickListCommand::AddPickItem(cmd) => self.handle_add_item(cmd),
            PickListCommand::RecordPick(cmd) => self.handle_record_pick(cmd),
            PickListCommand::ChangePickListStatus(cmd) => self.handle_change_status(cmd),
        }
    }
}

impl PickList {
    fn ensure_tenant(&self, tenant_id: TenantId) -> Result<(), DomainError> {
        if !self.created {
            return Ok(());
        }
        if self.tenant_id != Some(tenant_id) {
            return Err(DomainError::invariant("tenant mismatch"));
        }
        Ok(())
    }

    fn ensure_pick_list_id(&self, pick_list_id: PickListId) -> Result<(), DomainError> {
        if self.id != pick_list_id {
            return Err(DomainError::invariant("pick_list_id mismatch"));
        }
        Ok(())
    }

    fn handle_create(&self, cmd: &CreatePickList) -> Result<Vec<PickListEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("pick list already exists"));
        }
        if cmd.display_id.trim().is_empty() {
            return Err(DomainError::validation("display_id cannot be empty"));
        }

        Ok(vec![PickListEvent::PickListCreated(PickListCreated {
            tenant_id: cmd.tenant_id,
            pick_list_id: cmd.pick_list_id,
            display_id: cmd.display_id.clone(),
            sales_order_id: cmd.sales_order_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_add_item(&self, cmd: &AddPickItem) -> Result<Vec<PickListEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_tenant(cmd.tenant_id)?;
        self.ensure_pick_list_id(cmd.pick_list_id)?;

        if self.status != PickListStatus::Draft {
            return Err(DomainError::invariant(
                "items can only be added while the pick list is draft",
            ));
        }
        if cmd.item_name.trim().is_empty() {
            return Err(DomainError::validation("item_name cannot be empty"));
        }
        if cmd.requested_quantity == 0 {
            return Err(DomainError::validation(
                "requested_quantity must be positive",
            ));
        }

        let next_line_no = self.items.iter().map(|i| i.line_no).max().unwrap_or(0) + 1;

        Ok(vec![PickListEvent::PickItemAdded(PickItemAdded {
            tenant_id: cmd.tenant_id,
            pick_list_id: cmd.pick_list_id,
            line_no: next_line_no,
            sales_order_line_no: cmd.sales_order_line_no,
            item_id: cmd.item_id,
            item_name: cmd.item_name.clone(),
            requested_quantity: cmd.requested_quantity,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_record_pick(&self, cmd: &RecordPick) -> Result<Vec<PickListEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_tenant(cmd.tenant_id)?;
        self.ensure_pick_list_id(cmd.pick_list_id)?;

        if self.status != PickListStatus::InProgress {
            return Err(DomainError::invariant(
                "picks can only be recorded while the pick list is in progress",
            ));
        }

        let item = self.item(cmd.line_no).ok_or_else(|| {
            DomainError::validation(format!("item {} does not exist", cmd.line_no))
        })?;

        // Picked quantities only advance, and never beyond the request.
        if cmd.picked_quantity < item.picked_quantity
            || cmd.picked_quantity > item.requested_quantity
        {
            return Err(DomainError::QuantityConservation {
                field: "picked_quantity",
                proposed: cmd.picked_quantity,
                cap: if cmd.picked_quantity < item.picked_quantity {
                    item.picked_quantity
                } else {
                    item.requested_quantity
                },
            });
        }

        if cmd.picked_quantity == item.picked_quantity {
            return Ok(vec![]);
        }

        Ok(vec![PickListEvent::ItemPicked(ItemPicked {
            tenant_id: cmd.tenant_id,
            pick_list_id: cmd.pick_list_id,
            line_no: cmd.line_no,
            picked_quantity: cmd.picked_quantity,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_change_status(
        &self,
        cmd: &ChangePickListStatus,
    ) -> Result<Vec<PickListEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_tenant(cmd.tenant_id)?;
        self.ensure_pick_list_id(cmd.pick_list_id)?;

        if cmd.next == self.status {
            return Ok(vec![]);
        }

        self.status.ensure_transition(cmd.next)?;

        if cmd.next == PickListStatus::Pending && self.items.is_empty() {
            return Err(DomainError::validation(
                "cannot release a pick list without items",
            ));
        }

        Ok(vec![PickListEvent::PickListStatusChanged(
            PickListStatusChanged {
                tenant_id: cmd.tenant_id,
                pick_list_id: cmd.pick_list_id,
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

    fn test_pick_list_id() -> PickListId {
        PickListId::new(AggregateId::new())
    }

    fn test_time() -> DateTime<Utc> {
        Utc::now()
    }

    fn in_progress_list(
        tenant_id: TenantId,
        pick_list_id: PickListId,
        requested: u32,
    ) -> PickList {
        let mut list = PickList::empty(pick_list_id);
        execute(
            &mut list,
            &PickListCommand::CreatePickList(CreatePickList {
                tenant_id,
                pick_list_id,
                display_id: "PL-1001".to_string(),
                sales_order_id: Some(SalesOrderId::new(AggregateId::new())),
                occurred_at: test_time(),
            }),
        )
        .unwrap();
        execute(
            &mut list,
            &PickListCommand::AddPickItem(AddPickItem {
                tenant_id,
                pick_list_id,
                sales_order_line_no: Some(1),
                item_id: Some(ItemId::new()),
                item_name: "Widget A".to_string(),
                requested_quantity: requested,
                occurred_at: test_time(),
            }),
        )
        .unwrap();
        for next in [PickListStatus::Pending, PickListStatus::InProgress] {
            execute(
                &mut list,
                &PickListCommand::ChangePickListStatus(ChangePickListStatus {
                    tenant_id,
                    pick_list_id,
                    next,
                    occurred_at: test_time(),
                }),
            )
            .unwrap();
        }
        list
    }

    #[test]
    fn partial_pick_leaves_a_remainder() {
        let tenant_id = test_tenant_id();
        let pick_list_id = test_pick_list_id();
        let mut list = in_progress_list(tenant_id, pick_list_id, 10);

        execute(
            &mut list,
            &PickListCommand::RecordPick(RecordPick {
                tenant_id,
                pick_list_id,
                line_no: 1,
                picked_quantity: 7,
                occurred_at: test_time(),
            }),
        )
        .unwrap();

        let item = &list.items()[0];
        assert_eq!(item.picked_quantity, 7);
        assert_eq!(item.remaining(), 3);
        assert!(!list.is_fully_picked());
    }

    #[test]
    fn picking_beyond_the_request_is_rejected() {
        let tenant_id = test_tenant_id();
        let pick_list_id = test_pick_list_id();
        let mut list = in_progress_list(tenant_id, pick_list_id, 10);

        let err = execute(
            &mut list,
            &PickListCommand::RecordPick(RecordPick {
                tenant_id,
                pick_list_id,
                line_no: 1,
                picked_quantity: 15,
                occurred_at: test_time(),
            }),
        )
        .unwrap_err();

        match err {
            DomainError::QuantityConservation { field, cap, .. } => {
                assert_eq!(field, "picked_quantity");
                assert_eq!(cap, 10);
            }
            e => panic!("Expected QuantityConservation, got: {e:?}"),
        }
    }

    #[test]
    fn picks_require_an_in_progress_list() {
        let tenant_id = test_tenant_id();
        let pick_list_id = test_pick_list_id();
        let mut list = PickList::empty(pick_list_id);
        execute(
            &mut list,
            &PickListCommand::CreatePickList(CreatePickList {
                tenant_id,
                pick_list_id,
                display_id: "PL-1002".to_string(),
                sales_order_id: None,
                occurred_at: test_time(),
            }),
        )
        .unwrap();

        let err = execute(
            &mut list,
            &PickListCommand::RecordPick(RecordPick {
                tenant_id,
                pick_list_id,
                line_no: 1,
                picked_quantity: 1,
                occurred_at: test_time(),
            }),
        )
        .unwrap_err();
        assert!(matches!(err, DomainError::InvariantViolation(_)));
    }

    #[test]
    fn full_pick_completes_cleanly() {
        let tenant_id = test_tenant_id();
        let pick_list_id = test_pick_list_id();
        let mut list = in_progress_list(tenant_id, pick_list_id, 10);

        execute(
            &mut list,
            &PickListCommand::RecordPick(RecordPick {
                tenant_id,
                pick_list_id,
                line_no: 1,
                picked_quantity: 10,
                occurred_at: test_time(),
            }),
        )
        .unwrap();
        assert!(list.is_fully_picked());

        execute(
            &mut list,
            &PickListCommand::ChangePickListStatus(ChangePickListStatus {
                tenant_id,
                pick_list_id,
                next: PickListStatus::Completed,
                occurred_at: test_time(),
            }),
        )
        .unwrap();
        assert_eq!(list.status(), PickListStatus::Completed);
        assert!(list.status().is_terminal());
    }

    #[test]
    fn release_requires_items() {
        let tenant_id = test_tenant_id();
        let pick_list_id = test_pick_list_id();
        let mut list = PickList::empty(pick_list_id);
        execute(
            &mut list,
            &PickListCommand::CreatePickList(CreatePickList {
                tenant_id,
                pick_list_id,
                display_id: "PL-1003".to_string(),
                sales_order_id: None,
                occurred_at: test_time(),
            }),
        )
        .unwrap();

        let err = execute(
            &mut list,
            &PickListCommand::ChangePickListStatus(ChangePickListStatus {
                tenant_id,
                pick_list_id,
                next: PickListStatus::Pending,
                occurred_at: test_time(),
            }),
        )
        .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn completed_pick_list_cannot_move() {
        assert!(PickListStatus::Completed.is_terminal());
        assert!(!PickListStatus::Completed.can_transition_to(PickListStatus::Draft));
    }
}
