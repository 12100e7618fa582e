mod enriched;

pub use enriched::EnrichedOrder;
pub(crate) use enriched::color_count;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Orders with a status above this value have left the printable part of
/// their lifecycle and are never scheduled.
pub const MAX_SCHEDULABLE_STATUS: i32 = 5;

/// Operational state of a printing machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MachineStatus {
    Active,
    Maintenance,
    Error,
    Disabled,
}

/// A flexographic printing machine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Machine {
    pub id: i64,
    pub name: String,
    pub pseudonym: Option<String>,
    /// Nominal number of ink units.
    pub inks: u32,
    /// Ink units currently in working condition; at most `inks`.
    pub functional_inks: u32,
    /// Average printing velocity in meters per hour.
    pub avg_velocity: f64,
    /// Minutes needed to change one printing unit.
    pub time_change_units: f64,
    pub status: MachineStatus,
    /// JSON array of machine ids this machine can exchange roll jobs with.
    pub share_rolls: Option<String>,
}

impl Machine {
    /// Ink units usable for planning.
    ///
    /// A zero `functional_inks` means the working count was never recorded;
    /// the nominal unit count stands in.
    pub fn effective_inks(&self) -> u32 {
        if self.functional_inks == 0 {
            self.inks
        } else {
            self.functional_inks
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == MachineStatus::Active
    }
}

/// The schedulable view of a production order.
///
/// The color, material and customer payloads arrive as opaque JSON strings
/// from the store; [`EnrichedOrder`] parses them once per planning run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulableOrder {
    pub id: i64,
    pub product_id: i64,
    pub product_name: String,
    pub status: i32,
    pub delivery_date: Option<NaiveDateTime>,
    /// Hard delivery commitment; such orders are never reordered.
    pub forced_delivery_date: Option<NaiveDateTime>,
    pub planning_priority: i32,
    /// Days until the soft delivery date; negative when overdue.
    pub days_remaining: Option<i64>,
    pub total_print_meters: f64,
    /// Number of distinct labels printed within the order.
    pub labels: u32,
    pub colors_json: Option<String>,
    pub materials_json: Option<String>,
    pub customer_json: Option<String>,
    pub total_net_weight: f64,
    /// Machine the order is currently assigned to, when known.
    pub machine_id: Option<i64>,
}

impl SchedulableOrder {
    pub fn is_schedulable(&self) -> bool {
        self.status <= MAX_SCHEDULABLE_STATUS
    }
}

/// A persisted position in a machine's production queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueRow {
    pub id: i64,
    pub order_id: i64,
    pub machine_id: i64,
    /// Dense 1-based rank of the row within its machine's queue.
    pub production_order: u32,
    /// Why the order sits at this position.
    pub reason: String,
    pub probable_delivery_date: Option<NaiveDateTime>,
    pub setup_min: f64,
    pub label_changes_min: f64,
    pub print_min: f64,
    pub buffer_min: f64,
    pub total_min: f64,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// Row content for `overwrite_machine_schedule`; row ids and timestamps are
/// assigned by the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewQueueRow {
    pub order_id: i64,
    pub production_order: u32,
    pub reason: String,
    pub probable_delivery_date: NaiveDateTime,
    pub setup_min: f64,
    pub label_changes_min: f64,
    pub print_min: f64,
    pub buffer_min: f64,
    pub total_min: f64,
}

/// One entry of a bulk rank update.
#[derive(Debug, Clone, Copy)]
pub struct QueuePositionUpdate {
    pub queue_row_id: i64,
    pub production_order: u32,
}

/// One entry of a bulk date/duration update; ranks are left untouched.
#[derive(Debug, Clone, Copy)]
pub struct QueueTimesUpdate {
    pub queue_row_id: i64,
    pub probable_delivery_date: NaiveDateTime,
    pub setup_min: f64,
    pub label_changes_min: f64,
    pub print_min: f64,
    pub buffer_min: f64,
    pub total_min: f64,
}

/// A queued order joined with its order data, as needed to recalculate
/// delivery dates over an existing sequence without rewriting ranks.
#[derive(Debug, Clone)]
pub struct QueuedOrder {
    pub queue_row_id: i64,
    pub production_order: u32,
    pub order: SchedulableOrder,
}
