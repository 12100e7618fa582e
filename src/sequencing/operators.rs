//! Genetic operators over index permutations.
//!
//! All operators work on permutations of 0..N-1; translation to order ids
//! happens only at the edges of the sequencer.

use rand::Rng;

/// Ordered crossover on two permutations, in place.
///
/// Each child keeps one parent's slice between two random cut points and
/// receives every remaining index in the order it appears in the other
/// parent, filling positions cyclically from just after the second cut.
pub fn ordered_crossover(first: &mut [usize], second: &mut [usize], rng: &mut impl Rng) {
    let size = first.len().min(second.len());
    if size < 2 {
        return;
    }
    let (low, high) = cut_points(size, rng);

    let child_a = ordered_child(first, second, low, high);
    let child_b = ordered_child(second, first, low, high);
    first[..size].copy_from_slice(&child_a);
    second[..size].copy_from_slice(&child_b);
}

fn ordered_child(keeper: &[usize], donor: &[usize], low: usize, high: usize) -> Vec<usize> {
    let size = keeper.len();
    let mut kept = vec![false; size];
    for &index in &keeper[low..=high] {
        kept[index] = true;
    }

    let mut child = vec![0; size];
    child[low..=high].copy_from_slice(&keeper[low..=high]);

    let mut fill = (high + 1) % size;
    for offset in 0..size {
        let index = donor[(high + 1 + offset) % size];
        if kept[index] {
            continue;
        }
        child[fill] = index;
        fill = (fill + 1) % size;
        while fill >= low && fill <= high {
            fill = (fill + 1) % size;
        }
    }

    child
}

/// Two distinct cut points, returned in ascending order.
fn cut_points(size: usize, rng: &mut impl Rng) -> (usize, usize) {
    let first = rng.gen_range(0..size);
    let mut second = rng.gen_range(0..size - 1);
    if second >= first {
        second += 1;
    }
    (first.min(second), first.max(second))
}

/// Independently swaps each position with another random one with
/// probability `swap_probability`.
pub fn shuffle_indexes(individual: &mut [usize], swap_probability: f64, rng: &mut impl Rng) {
    let size = individual.len();
    if size < 2 {
        return;
    }
    for position in 0..size {
        if rng.gen::<f64>() < swap_probability {
            let mut other = rng.gen_range(0..size - 1);
            if other >= position {
                other += 1;
            }
            individual.swap(position, other);
        }
    }
}

/// Winner of a size-`k` tournament: the lowest-scoring of `k` uniformly
/// drawn individuals (with replacement).
pub fn tournament_select<'a>(
    population: &'a [Vec<usize>],
    scores: &[f64],
    k: usize,
    rng: &mut impl Rng,
) -> &'a [usize] {
    debug_assert!(!population.is_empty() && population.len() == scores.len());

    let mut winner = rng.gen_range(0..population.len());
    for _ in 1..k {
        let challenger = rng.gen_range(0..population.len());
        if scores[challenger] < scores[winner] {
            winner = challenger;
        }
    }
    &population[winner]
}
