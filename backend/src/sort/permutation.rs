//! Permutation helpers shared by the columnar and record sorts

use crate::models::agent::AgentRecord;
use rayon::prelude::*;
use std::cmp::Ordering;

/// Indices `0..len` ordered by `compare`
///
/// Position `i` of the result names the element that belongs at `i`. The sort
/// is parallel and unstable: equal elements may come out in any order.
pub(crate) fn sorted_indices<F>(len: usize, compare: F) -> Vec<usize>
where
    F: Fn(usize, usize) -> Ordering + Sync,
{
    let mut order: Vec<usize> = (0..len).collect();
    order.par_sort_unstable_by(|&a, &b| compare(a, b));
    order
}

/// Move each record to its sorted position
///
/// `order` must be a permutation of `0..records.len()`.
pub(crate) fn gather_records(records: Vec<AgentRecord>, order: &[usize]) -> Vec<AgentRecord> {
    let mut slots: Vec<Option<AgentRecord>> = records.into_iter().map(Some).collect();
    order.iter().filter_map(|&i| slots[i].take()).collect()
}

/// True if `order` holds every index of `0..len` exactly once
pub(crate) fn is_permutation(order: &[usize], len: usize) -> bool {
    if order.len() != len {
        return false;
    }
    let mut seen = vec![false; len];
    order.iter().all(|&i| i < len && !std::mem::replace(&mut seen[i], true))
}
