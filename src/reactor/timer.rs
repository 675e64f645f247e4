// Copyright 2016 Benoît Labaere (benoit.labaere@gmail.com)
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or http://www.apache.org/licenses/LICENSE-2.0>
// or the MIT license <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// This file may not be copied, modified, or distributed except according to those terms.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::time::{Duration, Instant};

use super::TimerEntry;

/// Deadline-ordered timers of one worker. Cancellation is lazy: a stale
/// entry fires and is discarded by its owner through a sequence check,
/// so the heap never needs random removal.
pub struct TimerHeap {
    entries: BinaryHeap<Scheduled>,
    order: u64
}

struct Scheduled {
    at: Instant,
    order: u64,
    entry: TimerEntry
}

impl PartialEq for Scheduled {
    fn eq(&self, other: &Scheduled) -> bool {
        self.at == other.at && self.order == other.order
    }
}

impl Eq for Scheduled {}

impl PartialOrd for Scheduled {
    fn partial_cmp(&self, other: &Scheduled) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Scheduled {
    fn cmp(&self, other: &Scheduled) -> Ordering {
        // BinaryHeap is a max-heap: reverse so the earliest deadline surfaces
        other.at.cmp(&self.at).then(other.order.cmp(&self.order))
    }
}

impl TimerHeap {
    pub fn new() -> TimerHeap {
        TimerHeap {
            entries: BinaryHeap::new(),
            order: 0
        }
    }

    pub fn schedule(&mut self, at: Instant, entry: TimerEntry) {
        let order = self.order;

        self.order += 1;
        self.entries.push(Scheduled {
            at: at,
            order: order,
            entry: entry
        });
    }

    /// How long the worker may sleep before the next deadline.
    pub fn next_timeout(&self, now: Instant) -> Option<Duration> {
        self.entries.peek().map(|scheduled| {
            if scheduled.at > now {
                scheduled.at - now
            } else {
                Duration::from_millis(0)
            }
        })
    }

    pub fn pop_due(&mut self, now: Instant) -> Option<TimerEntry> {
        let due = match self.entries.peek() {
            Some(scheduled) => scheduled.at <= now,
            None => false
        };

        if due {
            self.entries.pop().map(|scheduled| scheduled.entry)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use reactor::TimerEntry;
    use super::TimerHeap;

    #[test]
    fn timers_fire_in_deadline_order() {
        let mut heap = TimerHeap::new();
        let now = Instant::now();

        heap.schedule(now + Duration::from_millis(200), TimerEntry::Handshake(2));
        heap.schedule(now + Duration::from_millis(100), TimerEntry::Handshake(1));

        assert!(heap.pop_due(now).is_none());

        let later = now + Duration::from_millis(150);
        match heap.pop_due(later) {
            Some(TimerEntry::Handshake(token)) => assert_eq!(1, token),
            _ => panic!("expected the earliest timer")
        }
        assert!(heap.pop_due(later).is_none());

        let timeout = heap.next_timeout(later).unwrap();
        assert!(timeout <= Duration::from_millis(50));
    }
}
