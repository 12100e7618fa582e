//! Orchestration of the four planning use-cases over the store port.
//!
//! Every use-case returns a uniform [`CommandResponse`] envelope: refusals
//! and store failures become `success = false`, warnings are logged and do
//! not fail the call. Store mutations happen only after sequencing has
//! finished, so an abandoned request never leaves a half-written queue.

use std::collections::HashMap;

use chrono::NaiveDateTime;
use rand::SeedableRng;
use rand_pcg::Pcg64;
use serde::Serialize;
use serde_json::{json, Value};

use crate::config::{GaParams, PlannerSettings};
use crate::cost::CostModel;
use crate::dates::DateCalculator;
use crate::model::{
    EnrichedOrder, Machine, NewQueueRow, QueuePositionUpdate, QueueTimesUpdate, SchedulableOrder,
};
use crate::planner::{reassign_orders, CompatibilityGraph};
use crate::sequencing::priority::PriorityManager;
use crate::sequencing::GeneticSequencer;
use crate::store::{Store, StoreError};

const REASON_FORCED: &str = "Absolute priority by forced delivery date.";
const REASON_OPTIMIZED: &str = "Position computed by the genetic sequencer.";
const REASON_OPTIMIZED_GLOBAL: &str = "Position computed by the fleet-wide genetic sequencer.";

/// Uniform result envelope returned by every use-case.
#[derive(Debug, Clone, Serialize)]
pub struct CommandResponse {
    pub success: bool,
    pub message: String,
    pub action: &'static str,
    pub data: Option<Value>,
}

impl CommandResponse {
    fn ok(action: &'static str, message: impl Into<String>, data: Option<Value>) -> Self {
        Self {
            success: true,
            message: message.into(),
            action,
            data,
        }
    }

    fn refused(action: &'static str, message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            action,
            data: None,
        }
    }

    fn store_failure(action: &'static str, why: StoreError) -> Self {
        log::error!("{action}: {why}");
        Self::refused(action, format!("Store operation failed: {why}"))
    }
}

pub struct SchedulingService<S> {
    store: S,
    settings: PlannerSettings,
}

impl<S: Store> SchedulingService<S> {
    pub fn new(store: S, settings: PlannerSettings) -> Self {
        Self { store, settings }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Builds and persists a fresh optimized queue for one machine.
    ///
    /// Forced-date orders lead the sequence in ascending forced-date order;
    /// the genetic sequencer arranges the rest; the date calculator stamps
    /// the whole thing before anything is written.
    pub fn generate_optimal_schedule(
        &self,
        machine_ref: &str,
        now: NaiveDateTime,
    ) -> CommandResponse {
        const ACTION: &str = "generate_optimal_schedule";

        let machine = match self.resolve_machine(machine_ref) {
            Ok(Some(machine)) => machine,
            Ok(None) => {
                return CommandResponse::refused(
                    ACTION,
                    format!("Machine '{machine_ref}' not found."),
                )
            }
            Err(why) => return CommandResponse::store_failure(ACTION, why),
        };
        if !machine.is_active() {
            return CommandResponse::refused(
                ACTION,
                format!("Machine '{}' is not active.", machine.name),
            );
        }

        let orders = match self.store.get_schedulable_orders_for_machine(machine.id) {
            Ok(orders) => orders,
            Err(why) => return CommandResponse::store_failure(ACTION, why),
        };
        if orders.is_empty() {
            return CommandResponse::ok(
                ACTION,
                format!("No pending orders to schedule on machine {}.", machine.id),
                None,
            );
        }

        let rows = self.plan_machine(&machine, orders, now, &self.settings.ga, REASON_OPTIMIZED);
        let scheduled = rows.len();
        match self.store.overwrite_machine_schedule(machine.id, rows) {
            Ok(true) => CommandResponse::ok(
                ACTION,
                format!(
                    "Optimized schedule generated for machine {}: {scheduled} orders queued.",
                    machine.id
                ),
                Some(json!({ "machine_id": machine.id, "orders_scheduled": scheduled })),
            ),
            Ok(false) => {
                CommandResponse::refused(ACTION, "Failed to persist the new schedule.")
            }
            Err(why) => CommandResponse::store_failure(ACTION, why),
        }
    }

    /// Re-plans every active machine: capacity relief and load balancing
    /// across the compatibility graph first, then per-machine sequencing
    /// and date stamping.
    ///
    /// Partial planning is refused by contract; the only supported mode
    /// rebuilds every queue.
    pub fn generate_optimal_schedule_all_machines(
        &self,
        reoptimize: bool,
        now: NaiveDateTime,
    ) -> CommandResponse {
        const ACTION: &str = "generate_optimal_schedule_all_machines";

        if !reoptimize {
            return CommandResponse::refused(
                ACTION,
                "Partial fleet planning is not supported; pass reoptimize=true to rebuild \
                 every machine queue.",
            );
        }

        let machines: Vec<Machine> = match self.store.get_all_machine_status() {
            Ok(machines) => machines.into_iter().filter(Machine::is_active).collect(),
            Err(why) => return CommandResponse::store_failure(ACTION, why),
        };
        if machines.is_empty() {
            return CommandResponse::refused(ACTION, "No active machines to schedule.");
        }

        let orders = match self.store.get_schedulable_orders_for_all_machines() {
            Ok(orders) => orders,
            Err(why) => return CommandResponse::store_failure(ACTION, why),
        };
        if orders.is_empty() {
            return CommandResponse::ok(ACTION, "No pending orders to schedule on any machine.", None);
        }

        log::info!(
            "Fleet-wide optimization over {} active machines and {} orders",
            machines.len(),
            orders.len()
        );

        let mut orders_by_machine: HashMap<i64, Vec<SchedulableOrder>> = HashMap::new();
        for order in orders {
            match order.machine_id {
                Some(machine_id) => orders_by_machine.entry(machine_id).or_default().push(order),
                None => log::warn!("Order {} has no machine assignment; ignored", order.id),
            }
        }

        let graph = CompatibilityGraph::build(&machines);
        let report = reassign_orders(&mut orders_by_machine, &machines, &graph);

        let machines_by_id: HashMap<i64, &Machine> = machines.iter().map(|m| (m.id, m)).collect();
        let params = GaParams {
            generations: self.settings.ga.all_machines_generations,
            ..self.settings.ga
        };

        let mut machine_ids: Vec<i64> = orders_by_machine.keys().copied().collect();
        machine_ids.sort_unstable();

        let mut machines_updated = 0usize;
        let mut orders_scheduled = 0usize;
        for machine_id in machine_ids {
            let orders = orders_by_machine.remove(&machine_id).unwrap_or_default();
            if orders.is_empty() {
                continue;
            }
            let Some(machine) = machines_by_id.get(&machine_id) else {
                log::warn!(
                    "{} orders are assigned to unknown or inactive machine {machine_id}; skipped",
                    orders.len()
                );
                continue;
            };

            let rows = self.plan_machine(machine, orders, now, &params, REASON_OPTIMIZED_GLOBAL);
            orders_scheduled += rows.len();
            match self.store.overwrite_machine_schedule(machine_id, rows) {
                Ok(true) => machines_updated += 1,
                Ok(false) => log::warn!("Schedule for machine {machine_id} was not persisted"),
                // partial progress is allowed; the failure still aborts the run
                Err(why) => return CommandResponse::store_failure(ACTION, why),
            }
        }

        let mut message = format!(
            "Fleet optimization finished: {machines_updated} machines updated, \
             {orders_scheduled} orders scheduled"
        );
        if !report.moves.is_empty() {
            message.push_str(&format!(
                ", {} orders moved between machines",
                report.moves.len()
            ));
        }
        message.push('.');

        CommandResponse::ok(
            ACTION,
            message,
            Some(json!({
                "machines_updated": machines_updated,
                "orders_scheduled": orders_scheduled,
                "reassignments": report.moves.len(),
                "unresolved_overcapacity": report.unresolved_overcapacity,
            })),
        )
    }

    /// Moves an order to the front of its machine's queue, optionally
    /// re-optimizing the unlocked remainder, and persists the new ranks.
    pub fn prioritize_order(&self, order_id: i64, reoptimize: bool) -> CommandResponse {
        const ACTION: &str = "prioritize_order";

        let queue_item = match self.store.get_queue_item_by_order_id(order_id) {
            Ok(Some(item)) => item,
            Ok(None) => {
                return CommandResponse::refused(
                    ACTION,
                    format!("Order {order_id} is not in any production queue."),
                )
            }
            Err(why) => return CommandResponse::store_failure(ACTION, why),
        };
        if queue_item.production_order == 1 {
            return CommandResponse::ok(
                ACTION,
                format!("Order {order_id} already has top priority."),
                None,
            );
        }

        let machine = match self.store.get_machine_by_id(queue_item.machine_id) {
            Ok(Some(machine)) => machine,
            Ok(None) => {
                return CommandResponse::refused(
                    ACTION,
                    format!("Machine {} of order {order_id} not found.", queue_item.machine_id),
                )
            }
            Err(why) => return CommandResponse::store_failure(ACTION, why),
        };
        if !machine.is_active() {
            return CommandResponse::refused(
                ACTION,
                format!("Machine '{}' is not active.", machine.name),
            );
        }

        let queue = match self.store.get_production_queue_for_machine(machine.id) {
            Ok(queue) => queue,
            Err(why) => return CommandResponse::store_failure(ACTION, why),
        };
        let schedulable = match self.store.get_schedulable_orders_for_machine(machine.id) {
            Ok(orders) => orders,
            Err(why) => return CommandResponse::store_failure(ACTION, why),
        };
        if !schedulable.iter().any(|order| order.id == order_id) {
            log::warn!(
                "Order {order_id} sits in the queue of machine {} but is no longer \
                 schedulable there",
                machine.id
            );
            return CommandResponse::refused(
                ACTION,
                format!(
                    "Order {order_id} can no longer be scheduled on machine {}.",
                    machine.id
                ),
            );
        }

        let product_name = match self.store.get_order_by_id(order_id) {
            Ok(Some(order)) => order.product_name,
            _ => format!("order {order_id}"),
        };

        let orders: HashMap<i64, EnrichedOrder> = schedulable
            .into_iter()
            .map(|order| (order.id, EnrichedOrder::new(order)))
            .collect();
        let current_sequence: Vec<i64> = queue.iter().map(|row| row.order_id).collect();

        log::info!(
            "Prioritizing order {order_id} on machine {} (reoptimize: {reoptimize}, \
             queue length {})",
            machine.id,
            current_sequence.len()
        );

        let mut manager = PriorityManager::new(current_sequence, &orders, &machine);
        let moved = if reoptimize {
            let cost = CostModel::new(self.settings.cost.clone());
            let mut rng = self.sequencer_rng();
            manager.prioritize_with_reoptimization(
                order_id,
                &cost,
                &self.settings.weights,
                &self.settings.ga,
                &mut rng,
            )
        } else {
            manager.prioritize(order_id)
        };
        if !moved {
            return CommandResponse::refused(
                ACTION,
                format!(
                    "Order {order_id} could not be prioritized on machine {}.",
                    machine.id
                ),
            );
        }

        // orders in the new sequence without a backing queue row can appear
        // once cross-machine migrations land; skip them with a trace
        let mut updates = Vec::with_capacity(manager.sequence().len());
        let mut rowless = Vec::new();
        for (position, &id) in manager.sequence().iter().enumerate() {
            match queue.iter().find(|row| row.order_id == id) {
                Some(row) => updates.push(QueuePositionUpdate {
                    queue_row_id: row.id,
                    production_order: (position + 1) as u32,
                }),
                None => rowless.push(id),
            }
        }
        if !rowless.is_empty() {
            log::warn!(
                "{} sequenced orders have no queue row on machine {}: {rowless:?}",
                rowless.len(),
                machine.id
            );
        }
        if updates.is_empty() {
            return CommandResponse::refused(ACTION, "No valid queue updates were produced.");
        }

        match self.store.update_production_queue(&updates) {
            Ok(true) => CommandResponse::ok(
                ACTION,
                format!(
                    "'{product_name}' moved to position 1 on machine {}; {} rows renumbered.",
                    machine.id,
                    updates.len()
                ),
                Some(json!({
                    "order_id": order_id,
                    "machine_id": machine.id,
                    "new_position": 1,
                    "rows_renumbered": updates.len(),
                    "reoptimized": reoptimize,
                })),
            ),
            Ok(false) => {
                CommandResponse::refused(ACTION, "Failed to persist the new queue ranks.")
            }
            Err(why) => CommandResponse::store_failure(ACTION, why),
        }
    }

    /// Recomputes delivery dates and duration fields for a machine's
    /// current queue without touching its ranks; used after manual
    /// re-ordering.
    pub fn recalculate_delivery_dates(
        &self,
        machine_ref: &str,
        now: NaiveDateTime,
    ) -> CommandResponse {
        const ACTION: &str = "recalculate_delivery_dates";

        let machine = match self.resolve_machine(machine_ref) {
            Ok(Some(machine)) => machine,
            Ok(None) => {
                return CommandResponse::refused(
                    ACTION,
                    format!("Machine '{machine_ref}' not found."),
                )
            }
            Err(why) => return CommandResponse::store_failure(ACTION, why),
        };

        let queued = match self.store.get_queued_orders_for_machine(machine.id) {
            Ok(queued) => queued,
            Err(why) => return CommandResponse::store_failure(ACTION, why),
        };
        if queued.is_empty() {
            return CommandResponse::ok(
                ACTION,
                format!("Machine {} has no queued orders to recalculate.", machine.id),
                None,
            );
        }

        log::info!(
            "Recalculating dates for {} queued orders on machine {}",
            queued.len(),
            machine.id
        );

        let sequence: Vec<EnrichedOrder> = queued
            .iter()
            .map(|entry| EnrichedOrder::new(entry.order.clone()))
            .collect();
        let calculator = DateCalculator::new(
            &self.settings.calendar,
            CostModel::new(self.settings.cost.clone()),
        );
        let timings = calculator.compute(&sequence, &machine, now);

        let updates: Vec<QueueTimesUpdate> = queued
            .iter()
            .zip(&timings)
            .map(|(entry, timing)| QueueTimesUpdate {
                queue_row_id: entry.queue_row_id,
                probable_delivery_date: timing.completion,
                setup_min: timing.setup_min,
                label_changes_min: timing.label_changes_min,
                print_min: timing.print_min,
                buffer_min: timing.buffer_min,
                total_min: timing.total_min,
            })
            .collect();

        match self.store.update_queue_dates_and_times(&updates) {
            Ok(true) => CommandResponse::ok(
                ACTION,
                format!(
                    "Delivery dates recalculated for {} orders on machine {}.",
                    updates.len(),
                    machine.id
                ),
                Some(json!({
                    "machine_id": machine.id,
                    "orders_updated": updates.len(),
                    "first_delivery": timings.first().map(|t| t.completion),
                    "last_delivery": timings.last().map(|t| t.completion),
                })),
            ),
            Ok(false) => CommandResponse::refused(ACTION, "Failed to persist the new dates."),
            Err(why) => CommandResponse::store_failure(ACTION, why),
        }
    }

    /// Forced-date orders first (ascending forced date), then the genetic
    /// sequencer's permutation of the rest, with timings stamped over the
    /// concatenated sequence.
    fn plan_machine(
        &self,
        machine: &Machine,
        orders: Vec<SchedulableOrder>,
        now: NaiveDateTime,
        params: &GaParams,
        optimized_reason: &'static str,
    ) -> Vec<NewQueueRow> {
        let (forced, optimizable): (Vec<SchedulableOrder>, Vec<SchedulableOrder>) = orders
            .into_iter()
            .partition(|order| order.forced_delivery_date.is_some());

        let mut forced: Vec<EnrichedOrder> = forced.into_iter().map(EnrichedOrder::new).collect();
        forced.sort_by_key(|order| order.order.forced_delivery_date);
        let optimizable: Vec<EnrichedOrder> =
            optimizable.into_iter().map(EnrichedOrder::new).collect();

        log::info!(
            "Machine {}: {} forced-date orders lead, {} go through the sequencer",
            machine.id,
            forced.len(),
            optimizable.len()
        );

        let cost = CostModel::new(self.settings.cost.clone());
        let optimized_ids: Vec<i64> = if optimizable.len() <= 1 {
            optimizable.iter().map(EnrichedOrder::id).collect()
        } else {
            let mut rng = self.sequencer_rng();
            GeneticSequencer::new(&optimizable, machine, &cost, &self.settings.weights)
                .optimize(params, &mut rng)
        };

        let mut sequence = forced;
        let mut reasons = vec![REASON_FORCED; sequence.len()];
        let mut optimizable_by_id: HashMap<i64, EnrichedOrder> = optimizable
            .into_iter()
            .map(|order| (order.id(), order))
            .collect();
        for id in optimized_ids {
            if let Some(order) = optimizable_by_id.remove(&id) {
                sequence.push(order);
                reasons.push(optimized_reason);
            }
        }

        let calculator = DateCalculator::new(&self.settings.calendar, cost);
        let timings = calculator.compute(&sequence, machine, now);

        sequence
            .iter()
            .zip(reasons)
            .zip(timings)
            .enumerate()
            .map(|(position, ((order, reason), timing))| NewQueueRow {
                order_id: order.id(),
                production_order: (position + 1) as u32,
                reason: reason.to_string(),
                probable_delivery_date: timing.completion,
                setup_min: timing.setup_min,
                label_changes_min: timing.label_changes_min,
                print_min: timing.print_min,
                buffer_min: timing.buffer_min,
                total_min: timing.total_min,
            })
            .collect()
    }

    fn resolve_machine(&self, reference: &str) -> Result<Option<Machine>, StoreError> {
        let reference = reference.trim();
        if let Ok(id) = reference.parse::<i64>() {
            self.store.get_machine_by_id(id)
        } else {
            self.store.get_machine_by_name_or_pseudonym(reference)
        }
    }

    fn sequencer_rng(&self) -> Pcg64 {
        let seed = self.settings.seed.unwrap_or_else(rand::random);
        Pcg64::seed_from_u64(seed)
    }
}

#[cfg(test)]
mod test {
    use chrono::{NaiveDate, NaiveDateTime};
    use float_cmp::approx_eq;

    use super::*;
    use crate::helpers::assert_dense_ranks;
    use crate::model::MachineStatus;
    use crate::store::InMemoryStore;

    fn machine(id: i64, functional_inks: u32, share_rolls: Option<&str>) -> Machine {
        Machine {
            id,
            name: format!("FX-{id}"),
            pseudonym: Some(format!("press {id}")),
            inks: 8,
            functional_inks,
            avg_velocity: 150.0,
            time_change_units: 15.0,
            status: MachineStatus::Active,
            share_rolls: share_rolls.map(String::from),
        }
    }

    fn order(id: i64, machine_id: i64, colors: &str) -> SchedulableOrder {
        SchedulableOrder {
            id,
            product_id: id,
            product_name: format!("product-{id}"),
            status: 1,
            delivery_date: None,
            forced_delivery_date: None,
            planning_priority: 0,
            days_remaining: Some(30),
            total_print_meters: 1000.0,
            labels: 1,
            colors_json: Some(colors.to_string()),
            materials_json: Some(r#"["BOPP"]"#.to_string()),
            customer_json: None,
            total_net_weight: 10.0,
            machine_id: Some(machine_id),
        }
    }

    fn monday_morning() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 3, 2)
            .expect("valid test date")
            .and_hms_opt(8, 0, 0)
            .expect("valid test time")
    }

    fn service(store: InMemoryStore) -> SchedulingService<InMemoryStore> {
        let settings = PlannerSettings {
            seed: Some(42),
            ..PlannerSettings::default()
        };
        SchedulingService::new(store, settings)
    }

    #[test]
    fn test_schedule_refuses_unknown_and_inactive_machines() {
        let mut inactive = machine(2, 6, None);
        inactive.status = MachineStatus::Maintenance;
        let store = InMemoryStore::new(vec![machine(1, 6, None), inactive], Vec::new());
        let service = service(store);

        assert!(!service.generate_optimal_schedule("99", monday_morning()).success);
        assert!(!service.generate_optimal_schedule("FX-2", monday_morning()).success);
    }

    #[test]
    fn test_schedule_resolves_machines_by_pseudonym() {
        let store = InMemoryStore::new(
            vec![machine(1, 6, None)],
            vec![order(10, 1, r#"["C", "M"]"#)],
        );
        let service = service(store);

        let response = service.generate_optimal_schedule("press 1", monday_morning());
        assert!(response.success, "{}", response.message);
        assert_eq!(service.store().queue_snapshot().len(), 1);
    }

    #[test]
    fn test_schedule_places_forced_orders_first_by_forced_date() {
        let mut late_forced = order(12, 1, r#"["C"]"#);
        late_forced.forced_delivery_date = monday_morning().checked_add_days(chrono::Days::new(4));
        let mut early_forced = order(13, 1, r#"["M"]"#);
        early_forced.forced_delivery_date = monday_morning().checked_add_days(chrono::Days::new(2));

        let store = InMemoryStore::new(
            vec![machine(1, 6, None)],
            vec![
                order(10, 1, r#"["C", "M", "Y", "K"]"#),
                order(11, 1, r#"["C", "M"]"#),
                late_forced,
                early_forced,
            ],
        );
        let service = service(store);

        let response = service.generate_optimal_schedule("1", monday_morning());
        assert!(response.success, "{}", response.message);

        let queue = service
            .store()
            .get_production_queue_for_machine(1)
            .expect("queue readable");
        assert_dense_ranks(&queue);
        assert_eq!(queue[0].order_id, 13);
        assert_eq!(queue[1].order_id, 12);
        assert_eq!(queue[0].reason, REASON_FORCED);
        // no forced order after an optimized one
        assert_eq!(queue[2].reason, REASON_OPTIMIZED);
        assert_eq!(queue[3].reason, REASON_OPTIMIZED);
        // the ink-heavy optimizable order leads the optimized block
        assert_eq!(queue[2].order_id, 10);
    }

    #[test]
    fn test_schedule_stamps_monotone_delivery_dates() {
        let store = InMemoryStore::new(
            vec![machine(1, 6, None)],
            vec![
                order(10, 1, r#"["C", "M", "Y", "K"]"#),
                order(11, 1, r#"["C", "M"]"#),
                order(12, 1, r#"["Y"]"#),
            ],
        );
        let service = service(store);

        let response = service.generate_optimal_schedule("1", monday_morning());
        assert!(response.success, "{}", response.message);

        let queue = service
            .store()
            .get_production_queue_for_machine(1)
            .expect("queue readable");
        for pair in queue.windows(2) {
            assert!(pair[1].probable_delivery_date >= pair[0].probable_delivery_date);
        }
        for row in &queue {
            assert!(approx_eq!(
                f64,
                row.total_min,
                row.setup_min + row.label_changes_min + row.print_min + row.buffer_min,
                epsilon = 1e-9
            ));
        }
    }

    #[test]
    fn test_all_machines_refuses_partial_mode() {
        let store = InMemoryStore::new(vec![machine(1, 6, None)], Vec::new());
        let service = service(store);

        let response = service.generate_optimal_schedule_all_machines(false, monday_morning());
        assert!(!response.success);
    }

    #[test]
    fn test_all_machines_relieves_over_capacity_orders() {
        // an order demanding 6 colors sits on a 4-ink machine that shares
        // rolls with an 8-ink one
        let six_colors = r#"["C", "M", "Y", "K", "W", "G"]"#;
        let store = InMemoryStore::new(
            vec![machine(1, 4, Some("[7]")), machine(7, 8, None)],
            vec![order(100, 1, six_colors), order(101, 1, r#"["C", "M"]"#)],
        );
        let service = service(store);

        let response = service.generate_optimal_schedule_all_machines(true, monday_morning());
        assert!(response.success, "{}", response.message);

        let data = response.data.expect("data payload present");
        assert_eq!(data["reassignments"], 1);
        assert_eq!(data["unresolved_overcapacity"], 0);

        let relieved = service
            .store()
            .get_production_queue_for_machine(7)
            .expect("queue readable");
        assert_eq!(relieved.len(), 1);
        assert_eq!(relieved[0].order_id, 100);

        let remaining = service
            .store()
            .get_production_queue_for_machine(1)
            .expect("queue readable");
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].order_id, 101);
        assert_dense_ranks(&remaining);
    }

    #[test]
    fn test_prioritize_moves_order_to_front_and_renumbers() {
        let ids = [10, 11, 12, 13, 14];
        let orders: Vec<SchedulableOrder> =
            ids.iter().map(|&id| order(id, 1, r#"["C", "M"]"#)).collect();
        let store = InMemoryStore::new(vec![machine(1, 6, None)], orders);
        let rows: Vec<NewQueueRow> = ids
            .iter()
            .enumerate()
            .map(|(i, &id)| NewQueueRow {
                order_id: id,
                production_order: (i + 1) as u32,
                reason: String::from("seeded"),
                probable_delivery_date: monday_morning(),
                setup_min: 0.0,
                label_changes_min: 0.0,
                print_min: 0.0,
                buffer_min: 0.0,
                total_min: 0.0,
            })
            .collect();
        store
            .overwrite_machine_schedule(1, rows)
            .expect("seed queue");
        let service = service(store);

        let response = service.prioritize_order(13, false);
        assert!(response.success, "{}", response.message);

        let queue = service
            .store()
            .get_production_queue_for_machine(1)
            .expect("queue readable");
        assert_dense_ranks(&queue);
        let sequence: Vec<i64> = queue.iter().map(|row| row.order_id).collect();
        assert_eq!(sequence, vec![13, 10, 11, 12, 14]);
    }

    #[test]
    fn test_prioritize_is_a_no_op_for_the_queue_head() {
        let store = InMemoryStore::new(
            vec![machine(1, 6, None)],
            vec![order(10, 1, r#"["C"]"#)],
        );
        store
            .overwrite_machine_schedule(
                1,
                vec![NewQueueRow {
                    order_id: 10,
                    production_order: 1,
                    reason: String::from("seeded"),
                    probable_delivery_date: monday_morning(),
                    setup_min: 0.0,
                    label_changes_min: 0.0,
                    print_min: 0.0,
                    buffer_min: 0.0,
                    total_min: 0.0,
                }],
            )
            .expect("seed queue");
        let service = service(store);

        let response = service.prioritize_order(10, false);
        assert!(response.success);
        assert!(response.message.contains("top priority"));
    }

    #[test]
    fn test_prioritize_refuses_unknown_orders() {
        let store = InMemoryStore::new(vec![machine(1, 6, None)], Vec::new());
        let service = service(store);

        assert!(!service.prioritize_order(999, false).success);
    }

    #[test]
    fn test_recalculate_preserves_the_written_decomposition() {
        // round-trip: schedule, then recalculate from the persisted queue
        // with the same start; every duration field must survive unchanged
        let store = InMemoryStore::new(
            vec![machine(1, 6, None)],
            vec![
                order(10, 1, r#"["C", "M", "Y", "K"]"#),
                order(11, 1, r#"["C", "M"]"#),
                order(12, 1, r#"["Y"]"#),
            ],
        );
        let service = service(store);

        let scheduled = service.generate_optimal_schedule("1", monday_morning());
        assert!(scheduled.success, "{}", scheduled.message);
        let before = service
            .store()
            .get_production_queue_for_machine(1)
            .expect("queue readable");

        let recalculated = service.recalculate_delivery_dates("1", monday_morning());
        assert!(recalculated.success, "{}", recalculated.message);
        let after = service
            .store()
            .get_production_queue_for_machine(1)
            .expect("queue readable");

        assert_eq!(before.len(), after.len());
        for (old, new) in before.iter().zip(&after) {
            assert_eq!(old.order_id, new.order_id);
            assert_eq!(old.production_order, new.production_order);
            assert_eq!(old.probable_delivery_date, new.probable_delivery_date);
            assert!(approx_eq!(f64, old.setup_min, new.setup_min, epsilon = 1e-9));
            assert!(approx_eq!(f64, old.total_min, new.total_min, epsilon = 1e-9));
        }
    }

    #[test]
    fn test_recalculate_on_an_empty_queue_reports_success() {
        let store = InMemoryStore::new(vec![machine(1, 6, None)], Vec::new());
        let service = service(store);

        let response = service.recalculate_delivery_dates("1", monday_morning());
        assert!(response.success);
        assert!(response.data.is_none());
    }
}
