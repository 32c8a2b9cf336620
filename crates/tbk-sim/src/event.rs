//! Next-event queue.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// What happens when an event fires.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EventKind {
    /// The gene flips between inactive and active.
    Switch,
    /// A product is synthesized, unless the active period that scheduled it is over.
    Synthesis {
        /// Active-period counter at scheduling time.
        generation: u64,
    },
    /// A product decays.
    Degradation {
        /// Time the product was synthesized.
        born: f64,
    },
}

/// An event at an absolute simulation time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Scheduled {
    /// Firing time.
    pub time: f64,
    /// Event payload.
    pub kind: EventKind,
}

impl Eq for Scheduled {}

impl Ord for Scheduled {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed: BinaryHeap pops the earliest event first.
        other.time.total_cmp(&self.time)
    }
}

impl PartialOrd for Scheduled {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Min-heap of scheduled events keyed on time.
#[derive(Debug, Default)]
pub struct EventQueue {
    heap: BinaryHeap<Scheduled>,
}

impl EventQueue {
    /// Empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule `kind` at absolute time `time`.
    pub fn push(&mut self, time: f64, kind: EventKind) {
        self.heap.push(Scheduled { time, kind });
    }

    /// Remove and return the earliest event.
    pub fn pop(&mut self) -> Option<Scheduled> {
        self.heap.pop()
    }

    /// Number of pending events.
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    /// Whether no event is pending.
    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pops_in_time_order() {
        let mut q = EventQueue::new();
        q.push(3.0, EventKind::Switch);
        q.push(0.5, EventKind::Degradation { born: 0.1 });
        q.push(1.5, EventKind::Synthesis { generation: 2 });
        assert_eq!(q.len(), 3);

        let times: Vec<f64> = std::iter::from_fn(|| q.pop()).map(|e| e.time).collect();
        assert_eq!(times, vec![0.5, 1.5, 3.0]);
        assert!(q.is_empty());
    }
}
