//! Cross-machine re-assignment ahead of per-machine sequencing.
//!
//! Two phases over the roll-compatibility graph: capacity relief moves
//! orders that demand more colors than their machine has working ink units;
//! load balancing then evens out long queues. No order moves twice.

use std::collections::{HashMap, HashSet};

use serde_json::Value;

use crate::model::{color_count, Machine, SchedulableOrder};

/// Load ceiling an over-capacity order may still be moved onto.
const RELIEF_LOAD_LIMIT: usize = 50;
/// Minimum queue length before load balancing considers a machine.
const BALANCE_THRESHOLD: usize = 20;
/// Fraction of a machine's load that balancing may move away.
const BALANCE_MOVE_FRACTION: f64 = 0.3;
/// Load a balanced machine is never drained below.
const BALANCE_FLOOR: usize = 15;
/// Minimum load gap that justifies a balancing move.
const BALANCE_MIN_GAP: usize = 5;

/// Undirected machine-compatibility relation derived from `share_rolls`.
///
/// Declarations are potentially one-sided; the symmetric closure is
/// materialized once here so both phases can treat edges as undirected.
/// Self-references are discarded.
#[derive(Debug, Default)]
pub struct CompatibilityGraph {
    edges: HashMap<i64, HashSet<i64>>,
}

impl CompatibilityGraph {
    pub fn build(machines: &[Machine]) -> Self {
        let mut edges: HashMap<i64, HashSet<i64>> =
            machines.iter().map(|m| (m.id, HashSet::new())).collect();

        for machine in machines {
            let Some(raw) = machine.share_rolls.as_deref() else {
                continue;
            };
            let Some(peers) = parse_machine_ids(raw) else {
                log::warn!(
                    "Machine {} declares an unreadable share_rolls value {raw:?}",
                    machine.id
                );
                continue;
            };
            for peer in peers {
                if peer == machine.id {
                    continue;
                }
                edges.entry(machine.id).or_default().insert(peer);
                // the declaration may be one-sided; close it symmetrically
                if let Some(backlinks) = edges.get_mut(&peer) {
                    backlinks.insert(machine.id);
                }
            }
        }

        log::info!("Compatibility graph built over {} machines", edges.len());
        Self { edges }
    }

    /// Neighbor ids of `machine_id`, in ascending order.
    pub fn neighbors(&self, machine_id: i64) -> Vec<i64> {
        let mut peers: Vec<i64> = self
            .edges
            .get(&machine_id)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default();
        peers.sort_unstable();
        peers
    }
}

fn parse_machine_ids(raw: &str) -> Option<Vec<i64>> {
    let values: Vec<Value> = serde_json::from_str(raw).ok()?;
    let mut ids = Vec::with_capacity(values.len());
    for value in values {
        match value {
            Value::Number(number) => ids.push(number.as_i64()?),
            Value::String(text) => ids.push(text.trim().parse().ok()?),
            _ => return None,
        }
    }
    Some(ids)
}

/// One order moved between compatible machines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reassignment {
    pub order_id: i64,
    pub from: i64,
    pub to: i64,
    pub reason: String,
}

/// Outcome of the two re-assignment phases.
#[derive(Debug, Default)]
pub struct ReassignmentReport {
    pub moves: Vec<Reassignment>,
    /// Orders still demanding more colors than their machine's working ink
    /// units after capacity relief found no admissible neighbor.
    pub unresolved_overcapacity: usize,
}

/// Applies capacity relief and load balancing to `orders_by_machine`,
/// mutating the grouping in place and returning the move list.
///
/// Load counters are updated as moves are decided, so every decision sees
/// the loads left behind by the previous one.
pub fn reassign_orders(
    orders_by_machine: &mut HashMap<i64, Vec<SchedulableOrder>>,
    machines: &[Machine],
    graph: &CompatibilityGraph,
) -> ReassignmentReport {
    let machines_by_id: HashMap<i64, &Machine> = machines.iter().map(|m| (m.id, m)).collect();
    let mut loads: HashMap<i64, usize> = orders_by_machine
        .iter()
        .map(|(&id, orders)| (id, orders.len()))
        .collect();
    let mut moved: HashSet<i64> = HashSet::new();
    let mut moves: Vec<Reassignment> = Vec::new();
    let mut unresolved = 0usize;

    let mut machine_ids: Vec<i64> = orders_by_machine.keys().copied().collect();
    machine_ids.sort_unstable();

    // phase 1: capacity relief
    for &machine_id in &machine_ids {
        let Some(machine) = machines_by_id.get(&machine_id) else {
            continue;
        };
        let capacity = machine.effective_inks();

        let order_colors: Vec<(i64, u32)> = orders_by_machine[&machine_id]
            .iter()
            .map(|order| (order.id, color_count(order)))
            .collect();
        for (order_id, colors) in order_colors {
            if moved.contains(&order_id) || colors <= capacity {
                continue;
            }

            // best admissible neighbor: the one with the most working inks
            let mut target: Option<(i64, u32)> = None;
            for peer_id in graph.neighbors(machine_id) {
                let Some(peer) = machines_by_id.get(&peer_id) else {
                    continue;
                };
                let peer_capacity = peer.effective_inks();
                let best_capacity = target.map_or(capacity, |(_, c)| c);
                if colors <= peer_capacity
                    && peer_capacity > best_capacity
                    && loads.get(&peer_id).copied().unwrap_or(0) < RELIEF_LOAD_LIMIT
                {
                    target = Some((peer_id, peer_capacity));
                }
            }

            match target {
                Some((peer_id, peer_capacity)) => {
                    moves.push(Reassignment {
                        order_id,
                        from: machine_id,
                        to: peer_id,
                        reason: format!(
                            "needs {colors} inks (current machine has {capacity} working, \
                             target has {peer_capacity})"
                        ),
                    });
                    moved.insert(order_id);
                    *loads.entry(machine_id).or_insert(1) -= 1;
                    *loads.entry(peer_id).or_insert(0) += 1;
                }
                None => unresolved += 1,
            }
        }
    }

    // phase 2: load balancing, heaviest machines first
    let mut by_load = machine_ids.clone();
    by_load.sort_unstable_by_key(|id| {
        (
            std::cmp::Reverse(loads.get(id).copied().unwrap_or(0)),
            *id,
        )
    });

    for &machine_id in &by_load {
        let mut load = loads.get(&machine_id).copied().unwrap_or(0);
        if load <= BALANCE_THRESHOLD || !machines_by_id.contains_key(&machine_id) {
            continue;
        }

        let max_moves =
            ((load as f64 * BALANCE_MOVE_FRACTION) as usize).min(load.saturating_sub(BALANCE_FLOOR));
        let mut moved_here = 0usize;

        let order_colors: Vec<(i64, u32)> = orders_by_machine[&machine_id]
            .iter()
            .map(|order| (order.id, color_count(order)))
            .collect();
        for (order_id, colors) in order_colors {
            if moved_here >= max_moves {
                break;
            }
            if moved.contains(&order_id) {
                continue;
            }

            // least-loaded neighbor that can host the colors and leaves a
            // meaningful gap
            let mut target: Option<(i64, usize)> = None;
            for peer_id in graph.neighbors(machine_id) {
                let Some(peer) = machines_by_id.get(&peer_id) else {
                    continue;
                };
                let peer_load = loads.get(&peer_id).copied().unwrap_or(0);
                let best_load = target.map_or(load, |(_, l)| l);
                if colors <= peer.effective_inks()
                    && peer_load < best_load
                    && load - peer_load >= BALANCE_MIN_GAP
                {
                    target = Some((peer_id, peer_load));
                }
            }

            if let Some((peer_id, peer_load)) = target {
                moves.push(Reassignment {
                    order_id,
                    from: machine_id,
                    to: peer_id,
                    reason: format!("load balancing ({load} to {peer_load} queued orders)"),
                });
                moved.insert(order_id);
                moved_here += 1;
                *loads.entry(machine_id).or_insert(1) -= 1;
                *loads.entry(peer_id).or_insert(0) += 1;
                load -= 1;
            }
        }
    }

    // apply the decided moves to the grouping
    for reassignment in &moves {
        let Some(source) = orders_by_machine.get_mut(&reassignment.from) else {
            continue;
        };
        let Some(position) = source.iter().position(|o| o.id == reassignment.order_id) else {
            continue;
        };
        let mut order = source.remove(position);
        order.machine_id = Some(reassignment.to);
        orders_by_machine
            .entry(reassignment.to)
            .or_default()
            .push(order);
        log::info!(
            "Order {}: machine {} -> {} ({})",
            reassignment.order_id,
            reassignment.from,
            reassignment.to,
            reassignment.reason
        );
    }

    log::info!(
        "{} re-assignments decided, {} over-capacity orders left unresolved",
        moves.len(),
        unresolved
    );

    ReassignmentReport {
        moves,
        unresolved_overcapacity: unresolved,
    }
}
