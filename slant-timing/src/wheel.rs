use std::fmt::Debug;
use std::time::Duration;

use crate::timer::Timestamp;

#[derive(Debug, Clone)]
struct Entry<K> {
    key: K,
    deadline: Timestamp,
    period: Option<u64>,
}

/// Keyed deadline timers polled from the frame loop. Arming a key that is
/// already armed replaces its deadline.
#[derive(Debug, Clone)]
pub struct TimerWheel<K> {
    entries: Vec<Entry<K>>,
}

impl<K> Default for TimerWheel<K> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<K: Copy + Eq + Debug> TimerWheel<K> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arm_once(&mut self, key: K, now: Timestamp, after: Duration) {
        self.insert(key, now, after, None);
    }

    /// Fires every `period` until cancelled.
    pub fn arm_repeating(&mut self, key: K, now: Timestamp, period: Duration) {
        let period_ns = saturating_nanos(period).max(1);
        self.insert(key, now, period, Some(period_ns));
    }

    pub fn cancel(&mut self, key: K) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| e.key != key);
        before != self.entries.len()
    }

    pub fn cancel_all(&mut self) {
        self.entries.clear();
    }

    pub fn is_armed(&self, key: K) -> bool {
        self.entries.iter().any(|e| e.key == key)
    }

    pub fn deadline(&self, key: K) -> Option<Timestamp> {
        self.entries.iter().find(|e| e.key == key).map(|e| e.deadline)
    }

    /// Keys whose deadline has passed, earliest first. One-shot timers are
    /// removed; a repeating timer fires at most once per poll and is moved to
    /// its next deadline after `now`.
    pub fn poll(&mut self, now: Timestamp) -> Vec<K> {
        let mut due: Vec<(Timestamp, K)> = self
            .entries
            .iter()
            .filter(|e| e.deadline <= now)
            .map(|e| (e.deadline, e.key))
            .collect();
        if due.is_empty() {
            return Vec::new();
        }
        due.sort_by_key(|(deadline, _)| *deadline);

        self.entries.retain_mut(|e| {
            if e.deadline > now {
                return true;
            }
            match e.period {
                Some(period) => {
                    let missed = (now - e.deadline) / period + 1;
                    e.deadline = e.deadline.saturating_add(missed.saturating_mul(period));
                    true
                }
                None => false,
            }
        });

        log::trace!("timers fired at {now}: {due:?}");
        due.into_iter().map(|(_, key)| key).collect()
    }

    fn insert(&mut self, key: K, now: Timestamp, after: Duration, period: Option<u64>) {
        self.cancel(key);
        self.entries.push(Entry {
            key,
            deadline: now.saturating_add(saturating_nanos(after)),
            period,
        });
    }
}

fn saturating_nanos(d: Duration) -> u64 {
    u64::try_from(d.as_nanos()).unwrap_or(u64::MAX)
}
