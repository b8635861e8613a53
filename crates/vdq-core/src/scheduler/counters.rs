//! Observer counters published by the scheduler loop.
//!
//! Display-only: the UI/notification layer reads these; nothing in the
//! scheduling contract depends on them.

use std::collections::HashSet;

use crate::engine::JobId;

/// Snapshot of queue/active totals at the end of a scheduling iteration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueCounters {
    /// Jobs visibly downloading: those the engine already reports plus
    /// instances promoted so recently the engine doesn't list them yet.
    pub active: usize,
    /// Entries still waiting in the queue.
    pub queued: usize,
}

/// Count active jobs without double counting ids known both to the engine
/// and to the instance set.
pub(crate) fn visible_active(
    engine_ids: &HashSet<JobId>,
    instance_ids: impl Iterator<Item = JobId>,
) -> usize {
    let mut count = engine_ids.len();
    for id in instance_ids {
        if !engine_ids.contains(&id) {
            count += 1;
        }
    }
    count
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overlapping_ids_counted_once() {
        let engine: HashSet<JobId> = [1, 2].into_iter().collect();
        // 2 is known to both; 3 was promoted this iteration.
        assert_eq!(visible_active(&engine, [2, 3].into_iter()), 3);
    }

    #[test]
    fn disjoint_sets_sum() {
        let engine: HashSet<JobId> = [1].into_iter().collect();
        assert_eq!(visible_active(&engine, [2, 3].into_iter()), 3);
    }

    #[test]
    fn empty_everything_is_zero() {
        let engine = HashSet::new();
        assert_eq!(visible_active(&engine, std::iter::empty()), 0);
    }
}
