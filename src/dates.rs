use chrono::NaiveDateTime;

use crate::calendar::WorkingCalendar;
use crate::config::CalendarConfig;
use crate::cost::{self, CostModel};
use crate::model::{EnrichedOrder, Machine};

/// Duration decomposition and completion timestamp for one sequenced order.
#[derive(Debug, Clone)]
pub struct OrderTiming {
    pub order_id: i64,
    pub setup_min: f64,
    pub label_changes_min: f64,
    pub print_min: f64,
    pub buffer_min: f64,
    pub total_min: f64,
    pub completion: NaiveDateTime,
}

/// Walks an ordered sequence and stamps every order with its duration
/// decomposition and probable completion time under the working calendar.
pub struct DateCalculator {
    calendar: WorkingCalendar,
    cost: CostModel,
    efficiency: f64,
    buffer_fraction: f64,
}

impl DateCalculator {
    pub fn new(config: &CalendarConfig, cost: CostModel) -> Self {
        Self {
            calendar: WorkingCalendar::new(config),
            cost,
            efficiency: config.efficiency,
            buffer_fraction: config.safety_buffer_fraction,
        }
    }

    /// Timings for `sequence` on `machine`, starting the first order at
    /// `start`. Results are positionally aligned with the input.
    ///
    /// Per order: setup is the transition cost from its predecessor (zero
    /// for the head), label changeovers cost one unit-change each, print
    /// time is the raw estimate inflated by the efficiency factor, and the
    /// safety buffer applies once to that whole subtotal.
    pub fn compute(
        &self,
        sequence: &[EnrichedOrder],
        machine: &Machine,
        start: NaiveDateTime,
    ) -> Vec<OrderTiming> {
        let mut timings = Vec::with_capacity(sequence.len());
        let mut current = start;

        for (position, order) in sequence.iter().enumerate() {
            let setup_min = if position == 0 {
                0.0
            } else {
                self.cost
                    .transition_cost(&sequence[position - 1], order, machine)
            };
            let label_changes_min =
                f64::from(order.order.labels.saturating_sub(1)) * self.cost.base_minutes(machine);

            let theoretical =
                cost::raw_print_minutes(order.order.total_print_meters, machine.avg_velocity);
            let print_min = if self.efficiency > 0.0 {
                theoretical / self.efficiency
            } else {
                theoretical
            };

            let subtotal = setup_min + label_changes_min + print_min;
            let buffer_min = subtotal * self.buffer_fraction;
            let total_min = subtotal + buffer_min;

            current = self.calendar.advance(current, total_min);
            log::debug!(
                "Order {}: setup={setup_min:.1}min, labels={label_changes_min:.1}min, \
                 print={print_min:.1}min, buffer={buffer_min:.1}min, total={total_min:.1}min, \
                 done {current}",
                order.id()
            );

            timings.push(OrderTiming {
                order_id: order.id(),
                setup_min,
                label_changes_min,
                print_min,
                buffer_min,
                total_min,
                completion: current,
            });
        }

        timings
    }
}
