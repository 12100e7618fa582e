use std::sync::{Mutex, MutexGuard};

use chrono::NaiveDateTime;

use crate::model::{
    Machine, MachineStatus, NewQueueRow, QueuePositionUpdate, QueueRow, QueueTimesUpdate,
    QueuedOrder, SchedulableOrder,
};

use super::{Store, StoreError, StoreResult};

/// Mutex-guarded in-memory store.
///
/// Backs the CLI demo and the test suite. The lock makes it the single
/// serialization point, so a queue overwrite is one critical section and
/// readers never observe a half-replaced queue.
#[derive(Debug)]
pub struct InMemoryStore {
    inner: Mutex<Inner>,
}

#[derive(Debug)]
struct Inner {
    machines: Vec<Machine>,
    orders: Vec<SchedulableOrder>,
    queue: Vec<QueueRow>,
    next_queue_row_id: i64,
}

impl InMemoryStore {
    pub fn new(machines: Vec<Machine>, orders: Vec<SchedulableOrder>) -> Self {
        Self {
            inner: Mutex::new(Inner {
                machines,
                orders,
                queue: Vec::new(),
                next_queue_row_id: 1,
            }),
        }
    }

    /// Snapshot of the whole queue table, for reporting.
    pub fn queue_snapshot(&self) -> Vec<QueueRow> {
        self.lock().queue.clone()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().expect("store mutex poisoned")
    }

    fn now() -> NaiveDateTime {
        chrono::Local::now().naive_local()
    }
}

impl Store for InMemoryStore {
    fn get_machine_by_id(&self, machine_id: i64) -> StoreResult<Option<Machine>> {
        Ok(self
            .lock()
            .machines
            .iter()
            .find(|machine| machine.id == machine_id)
            .cloned())
    }

    fn get_machine_by_name_or_pseudonym(&self, name: &str) -> StoreResult<Option<Machine>> {
        Ok(self
            .lock()
            .machines
            .iter()
            .find(|machine| {
                machine.name.eq_ignore_ascii_case(name)
                    || machine
                        .pseudonym
                        .as_deref()
                        .is_some_and(|alias| alias.eq_ignore_ascii_case(name))
            })
            .cloned())
    }

    fn get_all_machine_status(&self) -> StoreResult<Vec<Machine>> {
        Ok(self.lock().machines.clone())
    }

    fn update_machine_status(
        &self,
        machine_id: i64,
        status: Option<MachineStatus>,
        functional_inks: Option<u32>,
    ) -> StoreResult<bool> {
        let mut inner = self.lock();
        let Some(machine) = inner.machines.iter_mut().find(|m| m.id == machine_id) else {
            return Ok(false);
        };
        if let Some(status) = status {
            machine.status = status;
        }
        if let Some(functional_inks) = functional_inks {
            if functional_inks > machine.inks {
                return Err(StoreError::Backend(format!(
                    "machine {machine_id} cannot have {functional_inks} working inks out of {}",
                    machine.inks
                )));
            }
            machine.functional_inks = functional_inks;
        }
        Ok(true)
    }

    fn get_order_by_id(&self, order_id: i64) -> StoreResult<Option<SchedulableOrder>> {
        Ok(self
            .lock()
            .orders
            .iter()
            .find(|order| order.id == order_id)
            .cloned())
    }

    fn get_queue_item_by_order_id(&self, order_id: i64) -> StoreResult<Option<QueueRow>> {
        Ok(self
            .lock()
            .queue
            .iter()
            .find(|row| row.order_id == order_id)
            .cloned())
    }

    fn get_production_queue_for_machine(&self, machine_id: i64) -> StoreResult<Vec<QueueRow>> {
        let mut rows: Vec<QueueRow> = self
            .lock()
            .queue
            .iter()
            .filter(|row| row.machine_id == machine_id)
            .cloned()
            .collect();
        rows.sort_by_key(|row| row.production_order);
        Ok(rows)
    }

    fn get_schedulable_orders_for_machine(
        &self,
        machine_id: i64,
    ) -> StoreResult<Vec<SchedulableOrder>> {
        Ok(self
            .lock()
            .orders
            .iter()
            .filter(|order| order.is_schedulable() && order.machine_id == Some(machine_id))
            .cloned()
            .collect())
    }

    fn get_schedulable_orders_for_all_machines(&self) -> StoreResult<Vec<SchedulableOrder>> {
        Ok(self
            .lock()
            .orders
            .iter()
            .filter(|order| order.is_schedulable() && order.machine_id.is_some())
            .cloned()
            .collect())
    }

    fn get_queued_orders_for_machine(&self, machine_id: i64) -> StoreResult<Vec<QueuedOrder>> {
        let inner = self.lock();
        let mut rows: Vec<&QueueRow> = inner
            .queue
            .iter()
            .filter(|row| row.machine_id == machine_id)
            .collect();
        rows.sort_by_key(|row| row.production_order);

        let mut queued = Vec::with_capacity(rows.len());
        for row in rows {
            match inner.orders.iter().find(|order| order.id == row.order_id) {
                Some(order) => queued.push(QueuedOrder {
                    queue_row_id: row.id,
                    production_order: row.production_order,
                    order: order.clone(),
                }),
                // queue drift: the order vanished since the queue was written
                None => log::warn!(
                    "Queue row {} references unknown order {}; skipping it",
                    row.id,
                    row.order_id
                ),
            }
        }
        Ok(queued)
    }

    fn overwrite_machine_schedule(
        &self,
        machine_id: i64,
        rows: Vec<NewQueueRow>,
    ) -> StoreResult<bool> {
        let now = Self::now();
        let mut inner = self.lock();
        inner.queue.retain(|row| row.machine_id != machine_id);
        for row in rows {
            let id = inner.next_queue_row_id;
            inner.next_queue_row_id += 1;
            inner.queue.push(QueueRow {
                id,
                order_id: row.order_id,
                machine_id,
                production_order: row.production_order,
                reason: row.reason,
                probable_delivery_date: Some(row.probable_delivery_date),
                setup_min: row.setup_min,
                label_changes_min: row.label_changes_min,
                print_min: row.print_min,
                buffer_min: row.buffer_min,
                total_min: row.total_min,
                created_at: now,
                updated_at: now,
            });
        }
        Ok(true)
    }

    fn update_production_queue(&self, updates: &[QueuePositionUpdate]) -> StoreResult<bool> {
        let now = Self::now();
        let mut inner = self.lock();

        let missing = updates
            .iter()
            .filter(|update| !inner.queue.iter().any(|row| row.id == update.queue_row_id))
            .count();
        if missing > 0 {
            return Err(StoreError::MissingRows(missing));
        }

        for update in updates {
            let row = inner
                .queue
                .iter_mut()
                .find(|row| row.id == update.queue_row_id)
                .expect("existence checked above");
            row.production_order = update.production_order;
            row.updated_at = now;
        }
        Ok(true)
    }

    fn update_queue_dates_and_times(&self, updates: &[QueueTimesUpdate]) -> StoreResult<bool> {
        let now = Self::now();
        let mut inner = self.lock();

        let missing = updates
            .iter()
            .filter(|update| !inner.queue.iter().any(|row| row.id == update.queue_row_id))
            .count();
        if missing > 0 {
            return Err(StoreError::MissingRows(missing));
        }

        for update in updates {
            let row = inner
                .queue
                .iter_mut()
                .find(|row| row.id == update.queue_row_id)
                .expect("existence checked above");
            row.probable_delivery_date = Some(update.probable_delivery_date);
            row.setup_min = update.setup_min;
            row.label_changes_min = update.label_changes_min;
            row.print_min = update.print_min;
            row.buffer_min = update.buffer_min;
            row.total_min = update.total_min;
            row.updated_at = now;
        }
        Ok(true)
    }
}

#[cfg(test)]
mod test {
    use chrono::NaiveDate;

    use super::*;
    use crate::helpers::assert_dense_ranks;

    fn machine(id: i64, status: MachineStatus) -> Machine {
        Machine {
            id,
            name: format!("FX-{id}"),
            pseudonym: Some(format!("press {id}")),
            inks: 8,
            functional_inks: 6,
            avg_velocity: 150.0,
            time_change_units: 15.0,
            status,
            share_rolls: None,
        }
    }

    fn order(id: i64, machine_id: i64, status: i32) -> SchedulableOrder {
        SchedulableOrder {
            id,
            product_id: 1,
            product_name: format!("product-{id}"),
            status,
            delivery_date: None,
            forced_delivery_date: None,
            planning_priority: 0,
            days_remaining: Some(10),
            total_print_meters: 500.0,
            labels: 1,
            colors_json: Some(r#"["C", "M"]"#.to_string()),
            materials_json: Some(r#"["BOPP"]"#.to_string()),
            customer_json: None,
            total_net_weight: 10.0,
            machine_id: Some(machine_id),
        }
    }

    fn new_row(order_id: i64, production_order: u32) -> NewQueueRow {
        NewQueueRow {
            order_id,
            production_order,
            reason: String::from("test"),
            probable_delivery_date: NaiveDate::from_ymd_opt(2026, 3, 2)
                .expect("valid test date")
                .and_hms_opt(12, 0, 0)
                .expect("valid test time"),
            setup_min: 10.0,
            label_changes_min: 0.0,
            print_min: 100.0,
            buffer_min: 1.1,
            total_min: 111.1,
        }
    }

    #[test]
    fn test_machine_lookup_by_name_and_pseudonym() {
        let store = InMemoryStore::new(vec![machine(1, MachineStatus::Active)], Vec::new());

        assert!(store
            .get_machine_by_name_or_pseudonym("fx-1")
            .expect("lookup works")
            .is_some());
        assert!(store
            .get_machine_by_name_or_pseudonym("PRESS 1")
            .expect("lookup works")
            .is_some());
        assert!(store
            .get_machine_by_name_or_pseudonym("unknown")
            .expect("lookup works")
            .is_none());
    }

    #[test]
    fn test_schedulable_filter_excludes_finished_orders() {
        let store = InMemoryStore::new(
            vec![machine(1, MachineStatus::Active)],
            vec![order(1, 1, 1), order(2, 1, 6), order(3, 2, 1)],
        );

        let orders = store
            .get_schedulable_orders_for_machine(1)
            .expect("query works");
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].id, 1);
    }

    #[test]
    fn test_overwrite_replaces_only_the_target_machine() {
        let store = InMemoryStore::new(Vec::new(), Vec::new());
        store
            .overwrite_machine_schedule(1, vec![new_row(10, 1), new_row(11, 2)])
            .expect("overwrite works");
        store
            .overwrite_machine_schedule(2, vec![new_row(20, 1)])
            .expect("overwrite works");

        store
            .overwrite_machine_schedule(1, vec![new_row(12, 1)])
            .expect("overwrite works");

        let queue_one = store
            .get_production_queue_for_machine(1)
            .expect("query works");
        assert_eq!(queue_one.len(), 1);
        assert_eq!(queue_one[0].order_id, 12);
        assert_dense_ranks(&queue_one);

        let queue_two = store
            .get_production_queue_for_machine(2)
            .expect("query works");
        assert_eq!(queue_two.len(), 1);
        assert_eq!(queue_two[0].order_id, 20);
    }

    #[test]
    fn test_rank_update_rejects_unknown_rows_without_applying() {
        let store = InMemoryStore::new(Vec::new(), Vec::new());
        store
            .overwrite_machine_schedule(1, vec![new_row(10, 1)])
            .expect("overwrite works");
        let row = store
            .get_queue_item_by_order_id(10)
            .expect("query works")
            .expect("row exists");

        let updates = [
            QueuePositionUpdate {
                queue_row_id: row.id,
                production_order: 5,
            },
            QueuePositionUpdate {
                queue_row_id: 9999,
                production_order: 1,
            },
        ];
        let result = store.update_production_queue(&updates);
        assert!(matches!(result, Err(StoreError::MissingRows(1))));

        // nothing was applied
        let unchanged = store
            .get_queue_item_by_order_id(10)
            .expect("query works")
            .expect("row exists");
        assert_eq!(unchanged.production_order, 1);
    }

    #[test]
    fn test_queued_orders_skip_drifted_rows() {
        let store = InMemoryStore::new(
            vec![machine(1, MachineStatus::Active)],
            vec![order(10, 1, 1)],
        );
        store
            .overwrite_machine_schedule(1, vec![new_row(10, 1), new_row(999, 2)])
            .expect("overwrite works");

        let queued = store.get_queued_orders_for_machine(1).expect("query works");
        assert_eq!(queued.len(), 1);
        assert_eq!(queued[0].order.id, 10);
        assert_eq!(queued[0].production_order, 1);
    }

    #[test]
    fn test_update_machine_status_caps_functional_inks() {
        let store = InMemoryStore::new(vec![machine(1, MachineStatus::Active)], Vec::new());

        assert!(store
            .update_machine_status(1, Some(MachineStatus::Maintenance), Some(4))
            .expect("update works"));
        let updated = store
            .get_machine_by_id(1)
            .expect("query works")
            .expect("machine exists");
        assert_eq!(updated.status, MachineStatus::Maintenance);
        assert_eq!(updated.functional_inks, 4);

        assert!(store.update_machine_status(1, None, Some(9)).is_err());
        assert!(!store
            .update_machine_status(77, Some(MachineStatus::Active), None)
            .expect("update works"));
    }
}
