// Queue Usage Snapshot - point-in-time backlog measurement

/// Backlog measured across one task hub at a single point in time.
///
/// `partition_backlogs[i]` is the approximate message count of control
/// queue `i`; its length always equals the hub's partition count at
/// discovery time. Never mutated after construction; produced fresh per
/// request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueUsageSnapshot {
    pub partition_backlogs: Vec<u64>,
    pub activity_backlog: u64,
}

impl QueueUsageSnapshot {
    /// True iff any partition or the shared activity queue has backlog.
    pub fn has_pending_work(&self) -> bool {
        self.activity_backlog > 0 || self.partition_backlogs.iter().any(|&b| b > 0)
    }
}
