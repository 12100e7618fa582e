pub mod operators;
pub mod priority;

use rand::seq::SliceRandom;
use rand::Rng;

use crate::config::{FitnessWeights, GaParams};
use crate::cost::CostModel;
use crate::model::{EnrichedOrder, Machine};

use operators::{ordered_crossover, shuffle_indexes, tournament_select};

/// Urgency bands on days-remaining, most to least pressing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Urgency {
    CriticallyOverdue,
    Overdue,
    Urgent,
    Upcoming,
    Normal,
}

impl Urgency {
    /// Band for an order `days_remaining` days away from its soft delivery
    /// date (negative = overdue, `None` = far future).
    pub fn classify(days_remaining: Option<i64>) -> Self {
        let days = days_remaining.unwrap_or(999);
        if days < -30 {
            Self::CriticallyOverdue
        } else if days < 0 {
            Self::Overdue
        } else if days <= 3 {
            Self::Urgent
        } else if days <= 7 {
            Self::Upcoming
        } else {
            Self::Normal
        }
    }

    /// Weight of the lateness penalty for this band.
    fn lateness_weight(self, default_weight: f64) -> f64 {
        match self {
            Self::CriticallyOverdue | Self::Overdue => 50.0,
            Self::Urgent => 20.0,
            Self::Upcoming | Self::Normal => default_weight,
        }
    }
}

/// Permutation search over one machine's optimizable orders.
///
/// Individuals are permutations of indices 0..N-1; the index↔id table is
/// fixed at construction, so operators and the fitness loop never touch
/// order ids or hash maps. All run state is owned here; concurrent
/// sequencer runs for different machines cannot interfere.
pub struct GeneticSequencer<'a> {
    orders: &'a [EnrichedOrder],
    machine: &'a Machine,
    cost: &'a CostModel,
    weights: &'a FitnessWeights,
}

impl<'a> GeneticSequencer<'a> {
    pub fn new(
        orders: &'a [EnrichedOrder],
        machine: &'a Machine,
        cost: &'a CostModel,
        weights: &'a FitnessWeights,
    ) -> Self {
        Self {
            orders,
            machine,
            cost,
            weights,
        }
    }

    /// Best-found sequence of order ids after the configured generation
    /// budget.
    ///
    /// An empty input returns an empty sequence without touching any
    /// operator; a single order needs no search. Replacement is
    /// generational with elitism of size one, and the returned individual
    /// is the best ever observed, not merely the best of the last
    /// generation.
    pub fn optimize(&self, params: &GaParams, rng: &mut impl Rng) -> Vec<i64> {
        let n = self.orders.len();
        if n == 0 {
            return Vec::new();
        }
        if n == 1 {
            return vec![self.orders[0].id()];
        }

        log::info!(
            "Sequencing {n} orders on machine {} ({} generations, population {})",
            self.machine.id,
            params.generations,
            params.population
        );

        let mut population: Vec<Vec<usize>> = (0..params.population.max(2))
            .map(|_| random_permutation(n, rng))
            .collect();
        let mut scores: Vec<f64> = population.iter().map(|ind| self.fitness(ind)).collect();

        // hall of fame of size one
        let (mut best, mut best_score) = best_of(&population, &scores);

        for _ in 0..params.generations {
            let mut offspring: Vec<Vec<usize>> = (0..population.len())
                .map(|_| {
                    tournament_select(&population, &scores, params.tournament_size, rng).to_vec()
                })
                .collect();

            for pair in offspring.chunks_mut(2) {
                if pair.len() == 2 && rng.gen::<f64>() < params.crossover_probability {
                    let (left, right) = pair.split_at_mut(1);
                    ordered_crossover(&mut left[0], &mut right[0], rng);
                }
            }

            for individual in offspring.iter_mut() {
                if rng.gen::<f64>() < params.mutation_probability {
                    shuffle_indexes(individual, params.swap_probability, rng);
                }
            }

            let mut offspring_scores: Vec<f64> =
                offspring.iter().map(|ind| self.fitness(ind)).collect();

            // elitism of size one: the best known individual survives every
            // generational replacement
            let worst = worst_of(&offspring_scores);
            offspring[worst] = best.clone();
            offspring_scores[worst] = best_score;

            population = offspring;
            scores = offspring_scores;

            let (generation_best, generation_best_score) = best_of(&population, &scores);
            if generation_best_score < best_score {
                best = generation_best;
                best_score = generation_best_score;
            }
        }

        log::info!("Sequencing finished with fitness {best_score:.0}");
        best.iter().map(|&index| self.orders[index].id()).collect()
    }

    /// Score of a candidate permutation; lower is better.
    ///
    /// Accumulates, per position: the complexity shaping that pulls
    /// ink-heavy orders forward, the weighted setup cost against the
    /// predecessor, the over-capacity penalty, and a capped lateness
    /// penalty against the running raw wall-time.
    pub fn fitness(&self, individual: &[usize]) -> f64 {
        let n = individual.len();
        let mut score = 0.0;
        let mut running_minutes = 0.0;

        for (position, &index) in individual.iter().enumerate() {
            let order = &self.orders[index];
            let color_count = order.num_colors();
            let colors = f64::from(color_count);
            let position_factor = 1.0 - position as f64 / n as f64;
            let shaping = self.weights.high_ink_priority_weight;

            if color_count >= 5 {
                score -= position_factor.powi(2) * colors * shaping;
            } else if color_count >= 3 {
                score -= position_factor * colors * 0.2 * shaping;
            } else {
                score += position_factor * (3.0 - colors) * 0.5 * shaping;
            }

            if position > 0 {
                let previous = &self.orders[individual[position - 1]];
                let change = self.cost.transition_cost(previous, order, self.machine);
                score += change * self.weights.setup_cost_weight;
                running_minutes += change;
            }

            running_minutes += self.cost.raw_print_minutes(order, self.machine);

            let capacity = f64::from(self.machine.effective_inks());
            if colors > capacity {
                score += (colors - capacity) * self.weights.ink_overcapacity_penalty;
            }

            if let Some(days) = order.order.days_remaining {
                let deadline_minutes = days as f64 * 1440.0;
                if running_minutes > deadline_minutes {
                    let overshoot = running_minutes - deadline_minutes;
                    let weight = Urgency::classify(Some(days))
                        .lateness_weight(self.weights.delay_penalty_weight);
                    score += (overshoot * weight).min(self.weights.lateness_cap);
                }
            }
        }

        score
    }
}

fn random_permutation(n: usize, rng: &mut impl Rng) -> Vec<usize> {
    let mut indices: Vec<usize> = (0..n).collect();
    indices.shuffle(rng);
    indices
}

fn best_of(population: &[Vec<usize>], scores: &[f64]) -> (Vec<usize>, f64) {
    let mut best = 0;
    for candidate in 1..scores.len() {
        if scores[candidate] < scores[best] {
            best = candidate;
        }
    }
    (population[best].clone(), scores[best])
}

fn worst_of(scores: &[f64]) -> usize {
    let mut worst = 0;
    for candidate in 1..scores.len() {
        if scores[candidate] > scores[worst] {
            worst = candidate;
        }
    }
    worst
}

#[cfg(test)]
mod test {
    use rand::SeedableRng;
    use rand_pcg::Pcg64;
    use rstest::rstest;

    use super::*;
    use crate::config::CostParams;
    use crate::helpers::assert_same_elements;
    use crate::model::{MachineStatus, SchedulableOrder};

    fn machine(functional_inks: u32) -> Machine {
        Machine {
            id: 1,
            name: String::from("FX-1"),
            pseudonym: None,
            inks: 8,
            functional_inks,
            avg_velocity: 150.0,
            time_change_units: 15.0,
            status: MachineStatus::Active,
            share_rolls: None,
        }
    }

    fn order(id: i64, meters: f64, colors: &str, days_remaining: Option<i64>) -> EnrichedOrder {
        EnrichedOrder::new(SchedulableOrder {
            id,
            product_id: 1,
            product_name: format!("product-{id}"),
            status: 1,
            delivery_date: None,
            forced_delivery_date: None,
            planning_priority: 0,
            days_remaining,
            total_print_meters: meters,
            labels: 1,
            colors_json: Some(colors.to_string()),
            materials_json: Some(r#"["BOPP"]"#.to_string()),
            customer_json: None,
            total_net_weight: 10.0,
            machine_id: None,
        })
    }

    #[rstest]
    #[case(Some(-45), Urgency::CriticallyOverdue)]
    #[case(Some(-30), Urgency::Overdue)]
    #[case(Some(-1), Urgency::Overdue)]
    #[case(Some(0), Urgency::Urgent)]
    #[case(Some(3), Urgency::Urgent)]
    #[case(Some(4), Urgency::Upcoming)]
    #[case(Some(7), Urgency::Upcoming)]
    #[case(Some(8), Urgency::Normal)]
    #[case(None, Urgency::Normal)]
    fn test_urgency_bands(#[case] days: Option<i64>, #[case] expected: Urgency) {
        assert_eq!(Urgency::classify(days), expected);
    }

    #[test]
    fn test_empty_input_returns_empty_sequence() {
        let orders: Vec<EnrichedOrder> = Vec::new();
        let machine = machine(6);
        let cost = CostModel::new(CostParams::default());
        let weights = FitnessWeights::default();
        let sequencer = GeneticSequencer::new(&orders, &machine, &cost, &weights);
        let mut rng = Pcg64::seed_from_u64(42);

        assert!(sequencer.optimize(&GaParams::default(), &mut rng).is_empty());
    }

    #[test]
    fn test_single_order_skips_the_search() {
        let orders = vec![order(31, 1000.0, r#"["C"]"#, Some(10))];
        let machine = machine(6);
        let cost = CostModel::new(CostParams::default());
        let weights = FitnessWeights::default();
        let sequencer = GeneticSequencer::new(&orders, &machine, &cost, &weights);
        let mut rng = Pcg64::seed_from_u64(42);

        assert_eq!(sequencer.optimize(&GaParams::default(), &mut rng), vec![31]);
    }

    #[test]
    fn test_result_is_a_permutation_of_the_input() {
        let orders: Vec<EnrichedOrder> = (0..8)
            .map(|i| order(i + 100, 500.0 * (i + 1) as f64, r#"["C", "M"]"#, Some(15)))
            .collect();
        let machine = machine(6);
        let cost = CostModel::new(CostParams::default());
        let weights = FitnessWeights::default();
        let sequencer = GeneticSequencer::new(&orders, &machine, &cost, &weights);
        let mut rng = Pcg64::seed_from_u64(42);

        let params = GaParams {
            population: 20,
            generations: 10,
            ..GaParams::default()
        };
        let sequence = sequencer.optimize(&params, &mut rng);
        assert_same_elements(sequence, (100..108).collect::<Vec<i64>>());
    }

    #[test]
    fn test_ink_heavy_orders_come_first() {
        // the classic pairing: a four-color job must precede a two-color one
        let orders = vec![
            order(1, 1000.0, r#"["C", "M"]"#, Some(10)),
            order(2, 1000.0, r#"["C", "M", "Y", "K"]"#, Some(10)),
        ];
        let machine = machine(6);
        let cost = CostModel::new(CostParams::default());
        let weights = FitnessWeights::default();
        let sequencer = GeneticSequencer::new(&orders, &machine, &cost, &weights);
        let mut rng = Pcg64::seed_from_u64(42);

        let params = GaParams {
            population: 20,
            generations: 20,
            ..GaParams::default()
        };
        assert_eq!(sequencer.optimize(&params, &mut rng), vec![2, 1]);
    }

    #[test]
    fn test_fitness_prefers_the_heavy_first_permutation() {
        let orders = vec![
            order(1, 1000.0, r#"["C", "M"]"#, Some(10)),
            order(2, 1000.0, r#"["C", "M", "Y", "K"]"#, Some(10)),
        ];
        let machine = machine(6);
        let cost = CostModel::new(CostParams::default());
        let weights = FitnessWeights::default();
        let sequencer = GeneticSequencer::new(&orders, &machine, &cost, &weights);

        assert!(sequencer.fitness(&[1, 0]) < sequencer.fitness(&[0, 1]));
    }

    #[test]
    fn test_overcapacity_is_penalized() {
        let orders = vec![order(1, 100.0, r#"["C", "M", "Y", "K", "W", "G"]"#, Some(30))];
        let cost = CostModel::new(CostParams::default());
        let weights = FitnessWeights::default();

        let wide = machine(6);
        let narrow = machine(4);
        let on_wide = GeneticSequencer::new(&orders, &wide, &cost, &weights).fitness(&[0]);
        let on_narrow = GeneticSequencer::new(&orders, &narrow, &cost, &weights).fitness(&[0]);

        // two colors over capacity at 1000 a piece
        assert_eq!(on_narrow - on_wide, 2000.0);
    }

    #[test]
    fn test_lateness_penalty_is_capped() {
        // hopelessly overdue and far too long to print: the overshoot times
        // its weight dwarfs the cap, so the cap must win
        let orders = vec![order(1, 1.0e9, r#"["C"]"#, Some(-10000))];
        let machine = machine(6);
        let cost = CostModel::new(CostParams::default());
        let weights = FitnessWeights::default();
        let sequencer = GeneticSequencer::new(&orders, &machine, &cost, &weights);

        let with_lateness = sequencer.fitness(&[0]);
        let baseline = {
            let on_time = vec![order(1, 1.0e9, r#"["C"]"#, None)];
            GeneticSequencer::new(&on_time, &machine, &cost, &weights).fitness(&[0])
        };

        assert_eq!(with_lateness - baseline, 500000.0);
    }

    #[test]
    fn test_missing_days_remaining_never_counts_as_late() {
        let orders = vec![order(1, 1.0e9, r#"["C"]"#, None)];
        let machine = machine(6);
        let cost = CostModel::new(CostParams::default());
        let weights = FitnessWeights::default();
        let sequencer = GeneticSequencer::new(&orders, &machine, &cost, &weights);

        // only the shaping term applies at position 0
        let score = sequencer.fitness(&[0]);
        assert_eq!(score, (3.0 - 1.0) * 0.5 * weights.high_ink_priority_weight);
    }

    #[test]
    fn test_seeded_runs_are_reproducible() {
        let orders: Vec<EnrichedOrder> = (0..6)
            .map(|i| order(i, 300.0 * (i + 1) as f64, r#"["C", "M", "Y"]"#, Some(5)))
            .collect();
        let machine = machine(6);
        let cost = CostModel::new(CostParams::default());
        let weights = FitnessWeights::default();
        let sequencer = GeneticSequencer::new(&orders, &machine, &cost, &weights);
        let params = GaParams {
            population: 16,
            generations: 8,
            ..GaParams::default()
        };

        let first = sequencer.optimize(&params, &mut Pcg64::seed_from_u64(9));
        let second = sequencer.optimize(&params, &mut Pcg64::seed_from_u64(9));
        assert_eq!(first, second);
    }
}
