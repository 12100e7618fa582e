use crate::config::CostParams;
use crate::model::{EnrichedOrder, Machine};

/// Transition costs between adjacent orders and raw print-time estimates.
///
/// Both the fitness function and the date calculator price changeovers
/// through this one model, so a sequence scores the same minutes it is later
/// stamped with.
#[derive(Debug, Clone)]
pub struct CostModel {
    params: CostParams,
}

impl CostModel {
    pub fn new(params: CostParams) -> Self {
        Self { params }
    }

    /// Changeover minutes when `to` follows `from` on `machine`.
    ///
    /// A material swap costs a multiple of the machine's per-unit change
    /// time; ink churn adds cleaning and mounting minutes and credits every
    /// ink kept on the press; a shared customer discounts the whole
    /// transition. Never negative.
    pub fn transition_cost(&self, from: &EnrichedOrder, to: &EnrichedOrder, machine: &Machine) -> f64 {
        let base = self.base_minutes(machine);

        let mut cost = if from.materials == to.materials {
            base * self.params.material_change_partial_factor
        } else {
            base * self.params.material_change_complete_factor
        };

        let to_remove = from.colors.difference(&to.colors).count() as f64;
        let to_add = to.colors.difference(&from.colors).count() as f64;
        let reused = from.colors.intersection(&to.colors).count() as f64;
        cost += to_remove * self.params.ink_clean_cost;
        cost += to_add * self.params.ink_add_cost;
        cost -= reused * self.params.color_reuse_bonus;

        if let (Some(from_customer), Some(to_customer)) = (&from.customer_id, &to.customer_id) {
            if from_customer == to_customer {
                cost *= self.params.same_customer_bonus_factor;
            }
        }

        cost.max(0.0)
    }

    /// Raw print minutes for an order: meters over velocity, with no
    /// efficiency or calendar adjustment. Fitness accumulates raw wall-time
    /// minutes; the date calculator applies efficiency on its own.
    pub fn raw_print_minutes(&self, order: &EnrichedOrder, machine: &Machine) -> f64 {
        raw_print_minutes(order.order.total_print_meters, machine.avg_velocity)
    }

    /// Per-unit change minutes of the machine, with the configured fallback
    /// for machines that report none.
    pub fn base_minutes(&self, machine: &Machine) -> f64 {
        if machine.time_change_units > 0.0 {
            machine.time_change_units
        } else {
            self.params.base_change_minutes
        }
    }
}

pub fn raw_print_minutes(total_meters: f64, velocity_m_per_hour: f64) -> f64 {
    if total_meters <= 0.0 || velocity_m_per_hour <= 0.0 {
        return 0.0;
    }
    total_meters / (velocity_m_per_hour / 60.0)
}
