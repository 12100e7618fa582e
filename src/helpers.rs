use std::fmt::Debug;

use crate::model::QueueRow;

/// Asserts two collections hold the same elements, ignoring order.
pub fn assert_same_elements<T>(left: impl IntoIterator<Item = T>, right: impl IntoIterator<Item = T>)
where
    T: Ord + Debug,
{
    let mut left: Vec<T> = left.into_iter().collect();
    left.sort();
    let mut right: Vec<T> = right.into_iter().collect();
    right.sort();

    assert_eq!(left, right)
}

/// Asserts a machine's queue ranks are exactly 1..=K.
pub fn assert_dense_ranks(rows: &[QueueRow]) {
    let mut ranks: Vec<u32> = rows.iter().map(|row| row.production_order).collect();
    ranks.sort_unstable();
    let expected: Vec<u32> = (1..=rows.len() as u32).collect();

    assert_eq!(
        ranks, expected,
        "production_order must be a dense 1-based rank"
    );
}
