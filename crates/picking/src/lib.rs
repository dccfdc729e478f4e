//! Pick lists domain module (event-sourced).
//!
//! A pick list stages the physical picking of a sales order's requested
//! quantities; its picked quantities feed `quantity_picked` on the order's
//! lines.

pub mod pick_list;

pub use pick_list::{
    AddPickItem, ChangePickListStatus, CreatePickList, ItemPicked, PickItemAdded, PickList,
    PickListCommand, PickListCreated, PickListEvent, PickListId, PickListItem, PickListStatus,
    PickListStatusChanged, RecordPick,
};
