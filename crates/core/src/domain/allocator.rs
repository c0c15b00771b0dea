// Orchestration Allocator - backlog to minimum worker count

/// Minimum workers required to drain the given per-partition orchestration
/// backlogs, where each worker processes at most `max_orchestrations_per_worker`
/// items concurrently.
///
/// Each partition is leased exclusively by one worker at a time, so a
/// partition's backlog cannot be split across workers; one worker may serve
/// several partitions as long as the sum of their backlogs fits its
/// capacity. That makes this bin packing with bin capacity
/// `max_orchestrations_per_worker`, solved here with first-fit-decreasing:
/// deterministic, order-independent (only the multiset of values matters),
/// and within the classic FFD bound of the optimum.
///
/// A partition whose backlog exceeds the capacity still needs exactly one
/// worker: the worker saturates, but workers are never replicated to split
/// a single partition. Zero-backlog partitions need no worker at all.
///
/// `max_orchestrations_per_worker` is validated to be >= 1 upstream.
pub fn required_workers(partition_backlogs: &[u64], max_orchestrations_per_worker: u32) -> u32 {
    let capacity = u64::from(max_orchestrations_per_worker);

    let mut sizes: Vec<u64> = partition_backlogs
        .iter()
        .copied()
        .filter(|&backlog| backlog > 0)
        .collect();
    sizes.sort_unstable_by(|a, b| b.cmp(a));

    // Remaining capacity per opened bin. An oversized partition finds no
    // bin with enough room and opens a saturated one (remaining 0).
    let mut bins: Vec<u64> = Vec::new();
    for size in sizes {
        match bins.iter_mut().find(|remaining| **remaining >= size) {
            Some(remaining) => *remaining -= size,
            None => bins.push(capacity.saturating_sub(size)),
        }
    }
    bins.len() as u32
}
