//! Single-threaded timer service running on virtual time.
//!
//! Callers drive the clock explicitly: the engine pulls due timers with
//! [`Scheduler::next_due`] and dispatches their payloads, so tests can
//! advance time synchronously instead of sleeping.

use std::collections::BTreeMap;
use std::time::Duration;

/// Handle returned when scheduling a timer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(u64);

#[derive(Debug)]
struct Timer<T> {
    due: Duration,
    period: Option<Duration>,
    task: T,
}

/// Timer queue ordered by due time, then by scheduling order
#[derive(Debug)]
pub struct Scheduler<T> {
    now: Duration,
    next_id: u64,
    next_seq: u64,
    // (due, seq) -> timer id; seq keeps same-instant timers FIFO
    queue: BTreeMap<(Duration, u64), TimerId>,
    timers: BTreeMap<TimerId, ((Duration, u64), Timer<T>)>,
    shut_down: bool,
}

impl<T> Default for Scheduler<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Scheduler<T> {
    pub fn new() -> Self {
        Self {
            now: Duration::ZERO,
            next_id: 0,
            next_seq: 0,
            queue: BTreeMap::new(),
            timers: BTreeMap::new(),
            shut_down: false,
        }
    }

    pub fn now(&self) -> Duration {
        self.now
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down
    }

    /// Run `task` once, `delay` from now
    pub fn set_timeout(&mut self, delay: Duration, task: T) -> TimerId {
        self.insert(self.now + delay, None, task)
    }

    /// Run `task` every `period`, first firing one period from now
    pub fn set_interval(&mut self, period: Duration, task: T) -> TimerId {
        let period = period.max(Duration::from_millis(1));
        self.insert(self.now + period, Some(period), task)
    }

    fn insert(&mut self, due: Duration, period: Option<Duration>, task: T) -> TimerId {
        let id = TimerId(self.next_id);
        self.next_id += 1;
        if self.shut_down {
            return id;
        }

        let key = (due, self.next_seq);
        self.next_seq += 1;
        self.queue.insert(key, id);
        self.timers.insert(id, (key, Timer { due, period, task }));
        id
    }

    /// Cancel a pending timer. Returns false if it already fired or was cleared.
    pub fn clear(&mut self, id: TimerId) -> bool {
        match self.timers.remove(&id) {
            Some((key, _)) => {
                self.queue.remove(&key);
                true
            }
            None => false,
        }
    }

    pub fn is_pending(&self, id: TimerId) -> bool {
        self.timers.contains_key(&id)
    }

    pub fn pending_count(&self) -> usize {
        self.timers.len()
    }
}

impl<T: Clone> Scheduler<T> {
    /// Pops the earliest timer due at or before `deadline`, moving the clock
    /// to its due time. Repeating timers are re-armed before being returned,
    /// so the handler may clear the interval it is running in.
    pub fn next_due(&mut self, deadline: Duration) -> Option<(TimerId, T)> {
        let (&key, &id) = self.queue.iter().next()?;
        if key.0 > deadline {
            return None;
        }

        self.queue.remove(&key);
        let (_, timer) = self.timers.remove(&id)?;
        self.now = self.now.max(timer.due);

        let task = match timer.period {
            Some(period) => {
                let task = timer.task.clone();
                let due = timer.due + period;
                let key = (due, self.next_seq);
                self.next_seq += 1;
                self.queue.insert(key, id);
                self.timers.insert(
                    id,
                    (
                        key,
                        Timer {
                            due,
                            period: Some(period),
                            task: timer.task,
                        },
                    ),
                );
                task
            }
            None => timer.task,
        };

        Some((id, task))
    }

    /// Moves the clock forward without firing anything
    pub fn advance_to(&mut self, deadline: Duration) {
        if !self.shut_down {
            self.now = self.now.max(deadline);
        }
    }

    /// Abandons every pending timer; nothing is scheduled afterwards
    pub fn shutdown(&mut self) {
        self.shut_down = true;
        self.queue.clear();
        self.timers.clear();
    }
}
