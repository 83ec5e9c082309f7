use std::collections::{HashSet, VecDeque};

/// Bounded in-memory record of Socket Mode envelope ids already handled.
///
/// Slack redelivers unacknowledged envelopes; ids older than `cap` entries are
/// forgotten oldest-first.
pub(super) struct ProcessedEnvelopeCache {
    cap: usize,
    order: VecDeque<String>,
    index: HashSet<String>,
}

impl ProcessedEnvelopeCache {
    pub(super) fn new(cap: usize) -> Self {
        let cap = cap.max(1);
        Self {
            cap,
            order: VecDeque::with_capacity(cap),
            index: HashSet::with_capacity(cap),
        }
    }

    pub(super) fn contains(&self, envelope_id: &str) -> bool {
        self.index.contains(envelope_id)
    }

    /// Returns false when the id was already recorded.
    pub(super) fn mark_processed(&mut self, envelope_id: &str) -> bool {
        if self.index.contains(envelope_id) {
            return false;
        }
        self.order.push_back(envelope_id.to_string());
        self.index.insert(envelope_id.to_string());
        while self.order.len() > self.cap {
            if let Some(evicted) = self.order.pop_front() {
                self.index.remove(&evicted);
            }
        }
        true
    }

    pub(super) fn len(&self) -> usize {
        self.order.len()
    }
}
