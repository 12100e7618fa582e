use serde::{Deserialize, Serialize};

/// Shift calendar configuration.
///
/// Weekdays 0..=6 start at Monday. Saturday (5) has its own shift count and
/// length; every other working day uses the weekday values.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CalendarConfig {
    pub weekday_shifts: u32,
    pub hours_per_weekday_shift: u32,
    pub saturday_shifts: u32,
    pub hours_per_saturday_shift: u32,
    /// Working weekdays, 0 = Monday .. 6 = Sunday.
    pub working_days: Vec<u32>,
    /// Hour at which every working day opens.
    pub day_start_hour: u32,
    /// Real print rate over the theoretical one, in (0, 1].
    pub efficiency: f64,
    /// Fraction of each order's subtotal added as safety buffer.
    pub safety_buffer_fraction: f64,
}

impl Default for CalendarConfig {
    fn default() -> Self {
        Self {
            weekday_shifts: 2,
            hours_per_weekday_shift: 12,
            saturday_shifts: 2,
            hours_per_saturday_shift: 12,
            working_days: vec![0, 1, 2, 3, 4, 5],
            day_start_hour: 7,
            efficiency: 0.95,
            safety_buffer_fraction: 0.01,
        }
    }
}

/// Transition-cost parameters, shared by the fitness function and the date
/// calculator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CostParams {
    /// Fallback per-unit change time for machines that report none.
    pub base_change_minutes: f64,
    /// Multiplier on the base time when the material sets differ.
    pub material_change_complete_factor: f64,
    /// Multiplier on the base time when the material sets match.
    pub material_change_partial_factor: f64,
    /// Minutes per ink that must be cleaned out.
    pub ink_clean_cost: f64,
    /// Minutes per ink that must be mounted and registered.
    pub ink_add_cost: f64,
    /// Minutes credited per ink kept on the machine.
    pub color_reuse_bonus: f64,
    /// Multiplier (< 1) applied when both orders belong to one customer.
    pub same_customer_bonus_factor: f64,
}

impl Default for CostParams {
    fn default() -> Self {
        Self {
            base_change_minutes: 15.0,
            material_change_complete_factor: 1.0,
            material_change_partial_factor: 0.5,
            ink_clean_cost: 5.0,
            ink_add_cost: 25.0,
            color_reuse_bonus: 15.0,
            same_customer_bonus_factor: 0.8,
        }
    }
}

/// Weights of the fitness terms.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct FitnessWeights {
    pub setup_cost_weight: f64,
    /// Lateness weight for orders that are neither overdue nor urgent.
    pub delay_penalty_weight: f64,
    /// Penalty per color beyond the machine's working ink units.
    pub ink_overcapacity_penalty: f64,
    /// Drives ink-heavy orders to the front of the sequence.
    pub high_ink_priority_weight: f64,
    /// Upper bound on the lateness contribution of a single order.
    pub lateness_cap: f64,
}

impl Default for FitnessWeights {
    fn default() -> Self {
        Self {
            setup_cost_weight: 100.0,
            delay_penalty_weight: 10.0,
            ink_overcapacity_penalty: 1000.0,
            high_ink_priority_weight: 50000.0,
            lateness_cap: 500000.0,
        }
    }
}

/// Run parameters of the genetic sequencer.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct GaParams {
    pub population: usize,
    pub generations: usize,
    /// Generation budget when planning the whole fleet at once.
    pub all_machines_generations: usize,
    pub crossover_probability: f64,
    pub mutation_probability: f64,
    /// Per-position swap probability inside the shuffle mutation.
    pub swap_probability: f64,
    pub tournament_size: usize,
}

impl Default for GaParams {
    fn default() -> Self {
        Self {
            population: 100,
            generations: 100,
            all_machines_generations: 200,
            crossover_probability: 0.7,
            mutation_probability: 0.2,
            swap_probability: 0.05,
            tournament_size: 3,
        }
    }
}

/// Complete planner configuration; every field has a production default, so
/// a settings file only needs the overrides.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerSettings {
    pub calendar: CalendarConfig,
    pub cost: CostParams,
    pub weights: FitnessWeights,
    pub ga: GaParams,
    /// Pins the sequencer RNG for reproducible runs.
    pub seed: Option<u64>,
}
