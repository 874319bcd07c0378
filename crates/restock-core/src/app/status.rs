//! Status - 1サイクルごとのステータス行

use std::fmt;

use serde::{Deserialize, Serialize};

/// Counters reported at the end of every cycle.
///
/// - `new`: records merged for the first time this cycle
/// - `total`: distinct records ever seen
/// - `sent`: jobs handed to the queue and already taken by the sender
/// - `unsent`: `queued + out_of_stock`
/// - `queued`: jobs still sitting in the queue
/// - `out_of_stock`: pending records whose variant is out of stock
///
/// `lookup_failures` is not part of the status line; variants whose lookup
/// failed are counted in none of the above.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleReport {
    pub cycle: u64,
    pub new: usize,
    pub total: usize,
    pub sent: usize,
    pub unsent: usize,
    pub queued: usize,
    pub out_of_stock: usize,
    pub lookup_failures: usize,
}

impl fmt::Display for CycleReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Status: {} New Notification(s), {} Total, {} Sent, {} Unsent ({} Queued/{} Out of Stock)",
            self.new, self.total, self.sent, self.unsent, self.queued, self.out_of_stock
        )
    }
}
