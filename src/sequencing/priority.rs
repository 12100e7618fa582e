use std::collections::HashMap;

use rand::Rng;

use crate::config::{FitnessWeights, GaParams};
use crate::cost::CostModel;
use crate::model::{EnrichedOrder, Machine};

use super::GeneticSequencer;

/// Why a sequence position is pinned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockKind {
    /// Moved to the front by hand; never reordered afterwards.
    Forced,
    /// Prioritized with a re-optimization pass behind it.
    High,
}

/// Mutates an existing production sequence to honor manual prioritizations.
///
/// Locks live only for the duration of one prioritization session; they are
/// never persisted. Re-optimization touches only the unlocked tail.
pub struct PriorityManager<'a> {
    sequence: Vec<i64>,
    orders: &'a HashMap<i64, EnrichedOrder>,
    machine: &'a Machine,
    locks: HashMap<i64, LockKind>,
}

impl<'a> PriorityManager<'a> {
    /// Builds the manager over the queue's current order-id sequence.
    ///
    /// Ids without a backing schedulable order are dropped up front: they
    /// belong to orders that migrated to another machine after the queue
    /// was written.
    pub fn new(
        sequence: Vec<i64>,
        orders: &'a HashMap<i64, EnrichedOrder>,
        machine: &'a Machine,
    ) -> Self {
        let (valid, dropped): (Vec<i64>, Vec<i64>) = sequence
            .into_iter()
            .partition(|id| orders.contains_key(id));
        if !dropped.is_empty() {
            log::warn!(
                "Dropping {} queued orders no longer schedulable on machine {}: {dropped:?}",
                dropped.len(),
                machine.id
            );
        }

        Self {
            sequence: valid,
            orders,
            machine,
            locks: HashMap::new(),
        }
    }

    pub fn sequence(&self) -> &[i64] {
        &self.sequence
    }

    pub fn lock_kind(&self, order_id: i64) -> Option<LockKind> {
        self.locks.get(&order_id).copied()
    }

    /// Moves `order_id` to the front, leaving every other relative position
    /// untouched. Returns false when the order cannot be prioritized.
    pub fn prioritize(&mut self, order_id: i64) -> bool {
        if !self.validate_target(order_id) {
            return false;
        }

        self.sequence.retain(|&id| id != order_id);
        self.sequence.insert(0, order_id);
        self.locks.insert(order_id, LockKind::Forced);
        log::info!("Order {order_id} moved to position 1 without re-optimization");
        true
    }

    /// Moves `order_id` directly behind the already-locked block and
    /// re-optimizes the free remainder with the genetic sequencer. Locked
    /// orders keep their relative order.
    pub fn prioritize_with_reoptimization(
        &mut self,
        order_id: i64,
        cost: &CostModel,
        weights: &FitnessWeights,
        params: &GaParams,
        rng: &mut impl Rng,
    ) -> bool {
        if !self.validate_target(order_id) {
            return false;
        }
        self.sequence.retain(|&id| id != order_id);

        let locked: Vec<i64> = self
            .sequence
            .iter()
            .copied()
            .filter(|id| self.locks.contains_key(id))
            .collect();

        // free orders may have migrated to another machine since the queue
        // was read; those are dropped, not re-sequenced
        let mut free = Vec::new();
        let mut migrated = Vec::new();
        for &id in &self.sequence {
            if self.locks.contains_key(&id) {
                continue;
            }
            match self.orders.get(&id) {
                Some(order) => free.push(order.clone()),
                None => migrated.push(id),
            }
        }
        if !migrated.is_empty() {
            log::warn!(
                "Dropping {} orders that migrated off machine {}: {migrated:?}",
                migrated.len(),
                self.machine.id
            );
        }

        let optimized = if free.is_empty() {
            log::info!("No free orders to re-optimize behind order {order_id}");
            Vec::new()
        } else {
            log::info!(
                "Re-optimizing {} free orders behind {} locked ones",
                free.len(),
                locked.len()
            );
            GeneticSequencer::new(&free, self.machine, cost, weights).optimize(params, rng)
        };

        self.sequence = locked
            .into_iter()
            .chain(std::iter::once(order_id))
            .chain(optimized)
            .collect();
        self.locks.insert(order_id, LockKind::High);
        true
    }

    fn validate_target(&self, order_id: i64) -> bool {
        if !self.sequence.contains(&order_id) {
            log::warn!(
                "Order {order_id} is not in the current sequence of machine {}",
                self.machine.id
            );
            return false;
        }
        if !self.orders.contains_key(&order_id) {
            log::error!(
                "Order {order_id} is queued on machine {} but no longer schedulable there",
                self.machine.id
            );
            return false;
        }
        true
    }
}
