mod memory;

pub use memory::InMemoryStore;

use std::fmt;

use crate::model::{
    Machine, MachineStatus, NewQueueRow, QueuePositionUpdate, QueueRow, QueueTimesUpdate,
    QueuedOrder, SchedulableOrder,
};

/// Failure surfaced by a store implementation.
#[derive(Debug)]
pub enum StoreError {
    /// The backing medium rejected or lost the operation.
    Backend(String),
    /// A bulk update referenced queue rows that do not exist; nothing was
    /// applied.
    MissingRows(usize),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Backend(why) => write!(f, "Store backend failure: {why}"),
            StoreError::MissingRows(count) => {
                write!(f, "Bulk update referenced {count} unknown queue rows")
            }
        }
    }
}

impl std::error::Error for StoreError {}

pub type StoreResult<T> = Result<T, StoreError>;

/// Port to the order/machine persistence layer.
///
/// Implementations are the single serialization point for concurrent
/// planning requests. `overwrite_machine_schedule` must replace a machine's
/// queue atomically with respect to readers: they observe either the old or
/// the new queue, never a mixture.
pub trait Store {
    fn get_machine_by_id(&self, machine_id: i64) -> StoreResult<Option<Machine>>;

    fn get_machine_by_name_or_pseudonym(&self, name: &str) -> StoreResult<Option<Machine>>;

    fn get_all_machine_status(&self) -> StoreResult<Vec<Machine>>;

    /// Updates the status and/or working ink-unit count of a machine.
    /// Returns false when the machine does not exist.
    fn update_machine_status(
        &self,
        machine_id: i64,
        status: Option<MachineStatus>,
        functional_inks: Option<u32>,
    ) -> StoreResult<bool>;

    fn get_order_by_id(&self, order_id: i64) -> StoreResult<Option<SchedulableOrder>>;

    fn get_queue_item_by_order_id(&self, order_id: i64) -> StoreResult<Option<QueueRow>>;

    /// A machine's persisted queue, ordered by rank.
    fn get_production_queue_for_machine(&self, machine_id: i64) -> StoreResult<Vec<QueueRow>>;

    fn get_schedulable_orders_for_machine(
        &self,
        machine_id: i64,
    ) -> StoreResult<Vec<SchedulableOrder>>;

    /// Every schedulable order across the fleet; rows carry their current
    /// machine assignment.
    fn get_schedulable_orders_for_all_machines(&self) -> StoreResult<Vec<SchedulableOrder>>;

    /// A machine's queue joined with its order data, ordered by rank; feeds
    /// date recalculation without rewriting positions.
    fn get_queued_orders_for_machine(&self, machine_id: i64) -> StoreResult<Vec<QueuedOrder>>;

    /// Atomically deletes the machine's queue and inserts `rows` in its
    /// place.
    fn overwrite_machine_schedule(
        &self,
        machine_id: i64,
        rows: Vec<NewQueueRow>,
    ) -> StoreResult<bool>;

    /// Bulk rank update, matched strictly by queue row id.
    fn update_production_queue(&self, updates: &[QueuePositionUpdate]) -> StoreResult<bool>;

    /// Bulk date/duration update, matched strictly by queue row id.
    fn update_queue_dates_and_times(&self, updates: &[QueueTimesUpdate]) -> StoreResult<bool>;
}
