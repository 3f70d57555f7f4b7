//! Sample-accurate scheduling of one-shot and repeating actions.
//!
//! The [`Scheduler`] keeps pending actions keyed by their absolute due sample.
//! Once per block the engine asks it which actions fall inside the next `n`
//! samples ([`Scheduler::run_due`]) and invokes each with a [`Fire`] carrying
//! the exact offset within the block, so callers can apply changes at the
//! right sample rather than at block granularity.
//!
//! Callbacks run at block boundaries with mutable access to the context that
//! owns the scheduler (for the engine, the whole
//! [`Environment`](crate::Environment)), so they may schedule, cancel, and
//! mutate the graph. Actions scheduled while a block's actions are firing are
//! first considered on the next block.
//!
//! Repeating actions are rescheduled from their *nominal* due time, never the
//! time they actually fired, so block jitter cannot accumulate into drift.
//!
//! # Example
//!
//! ```rust
//! use sonant_core::{HasScheduler, Scheduler, TimeUnit};
//!
//! struct Clock {
//!     scheduler: Scheduler<Clock>,
//!     ticks: Vec<u64>,
//! }
//!
//! impl HasScheduler for Clock {
//!     fn scheduler(&mut self) -> &mut Scheduler<Clock> {
//!         &mut self.scheduler
//!     }
//! }
//!
//! let mut clock = Clock { scheduler: Scheduler::new(1000.0), ticks: Vec::new() };
//! clock.scheduler.repeat(10.0, TimeUnit::Milliseconds, |c: &mut Clock, fire| c.ticks.push(fire.due));
//! for _ in 0..4 {
//!     Scheduler::tick(&mut clock, 8);
//! }
//! assert_eq!(clock.ticks, vec![10, 20, 30]);
//! ```

use std::collections::{BTreeMap, HashMap};

/// Converts a duration in some unit into samples.
pub trait TimeConverter {
    /// Samples in `amount` units at `sample_rate`. Negative or non-finite
    /// durations convert to 0.
    fn to_samples(&self, amount: f64, sample_rate: f64) -> u64;
}

/// Built-in time units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TimeUnit {
    /// Raw samples.
    Samples,
    /// Seconds.
    Seconds,
    /// Milliseconds.
    Milliseconds,
    /// Beats at a tempo. A tempo of 0 converts every duration to 0.
    Beats {
        /// Tempo in beats per minute.
        bpm: f64,
    },
}

impl TimeConverter for TimeUnit {
    fn to_samples(&self, amount: f64, sample_rate: f64) -> u64 {
        let samples = match *self {
            TimeUnit::Samples => amount,
            TimeUnit::Seconds => amount * sample_rate,
            TimeUnit::Milliseconds => amount * sample_rate / 1000.0,
            TimeUnit::Beats { bpm } => {
                if bpm > 0.0 && bpm.is_finite() {
                    amount * 60.0 / bpm * sample_rate
                } else {
                    0.0
                }
            }
        };
        if samples.is_finite() && samples > 0.0 {
            samples.round() as u64
        } else {
            0
        }
    }
}

/// Cancellation handle for a scheduled action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScheduleHandle(u64);

/// Details passed to a firing callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fire {
    /// Handle of the action that fired.
    pub handle: ScheduleHandle,
    /// Nominal absolute due time in samples.
    pub due: u64,
    /// Offset of `due` within the current block (0 if it was already late).
    pub offset: usize,
}

/// Callback invoked when an action fires.
pub type Callback<C> = Box<dyn FnMut(&mut C, Fire) + Send>;

/// A context that owns a scheduler, giving callbacks access to both.
pub trait HasScheduler: Sized {
    /// The scheduler whose actions receive `self`.
    fn scheduler(&mut self) -> &mut Scheduler<Self>;
}

struct Action<C> {
    id: u64,
    interval: Option<u64>,
    callback: Callback<C>,
}

/// State of an action taken out of the queue for the current block.
#[derive(Debug, Clone, Copy)]
struct InFlight {
    interval: Option<u64>,
    cancelled: bool,
    /// A one-shot that has already run its callback.
    fired: bool,
}

struct DueEntry<C> {
    action: Action<C>,
    first_due: u64,
    count: u64,
}

/// Actions taken out of the queue for one block.
struct DueBatch<C> {
    block_start: u64,
    entries: Vec<DueEntry<C>>,
    /// `(due, id, entry)` sorted by due time, then insertion order.
    fires: Vec<(u64, u64, usize)>,
}

/// Sample-clock scheduler generic over the callback context `C`.
pub struct Scheduler<C> {
    sample_rate: f64,
    now: u64,
    next_id: u64,
    pending: BTreeMap<(u64, u64), Action<C>>,
    due_of: HashMap<u64, u64>,
    in_flight: HashMap<u64, InFlight>,
}

impl<C> Scheduler<C> {
    /// Create a scheduler at sample 0.
    pub fn new(sample_rate: f64) -> Self {
        Self {
            sample_rate,
            now: 0,
            next_id: 0,
            pending: BTreeMap::new(),
            due_of: HashMap::new(),
            in_flight: HashMap::new(),
        }
    }

    /// Current time in samples (start of the next block).
    pub fn now(&self) -> u64 {
        self.now
    }

    /// Convert a duration to samples at this scheduler's rate.
    pub fn to_samples(&self, amount: f64, unit: impl TimeConverter) -> u64 {
        unit.to_samples(amount, self.sample_rate)
    }

    /// Number of pending actions.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Whether the action is still scheduled to fire.
    pub fn is_pending(&self, handle: ScheduleHandle) -> bool {
        self.due_of.contains_key(&handle.0)
    }

    /// Run `callback` once, `delay` from now.
    pub fn once<F>(&mut self, delay: f64, unit: impl TimeConverter, callback: F) -> ScheduleHandle
    where
        F: FnMut(&mut C, Fire) + Send + 'static,
    {
        let due = self.now + self.to_samples(delay, unit);
        self.push(due, None, Box::new(callback))
    }

    /// Run `callback` every `interval`, first at now + `interval`.
    ///
    /// Intervals shorter than one sample are raised to one sample.
    pub fn repeat<F>(&mut self, interval: f64, unit: impl TimeConverter, callback: F) -> ScheduleHandle
    where
        F: FnMut(&mut C, Fire) + Send + 'static,
    {
        let interval = self.to_samples(interval, unit).max(1);
        self.push(self.now + interval, Some(interval), Box::new(callback))
    }

    fn push(&mut self, due: u64, interval: Option<u64>, callback: Callback<C>) -> ScheduleHandle {
        let id = self.next_id;
        self.next_id += 1;
        self.pending.insert(
            (due, id),
            Action {
                id,
                interval,
                callback,
            },
        );
        self.due_of.insert(id, due);
        #[cfg(feature = "tracing")]
        tracing::debug!("schedule: action {id} due at {due} (interval {interval:?})");
        ScheduleHandle(id)
    }

    /// Cancel an action. Returns false if it already fired (including a
    /// one-shot whose callback is running now), was already cancelled, or
    /// never existed. A repeat cancelled from inside its own callback fires
    /// no further.
    pub fn clear(&mut self, handle: ScheduleHandle) -> bool {
        if let Some(due) = self.due_of.remove(&handle.0) {
            self.pending.remove(&(due, handle.0));
            #[cfg(feature = "tracing")]
            tracing::debug!("schedule_clear: action {}", handle.0);
            return true;
        }
        match self.in_flight.get_mut(&handle.0) {
            Some(state) if !state.cancelled && !state.fired => {
                state.cancelled = true;
                true
            }
            _ => false,
        }
    }

    /// Cancel every repeating action with this interval. Returns how many
    /// were cancelled.
    pub fn clear_repeat(&mut self, interval: f64, unit: impl TimeConverter) -> usize {
        let interval = Some(self.to_samples(interval, unit).max(1));
        let keys: Vec<(u64, u64)> = self
            .pending
            .iter()
            .filter(|(_, action)| action.interval == interval)
            .map(|(&key, _)| key)
            .collect();
        let mut count = keys.len();
        for key in keys {
            self.pending.remove(&key);
            self.due_of.remove(&key.1);
        }
        for state in self.in_flight.values_mut() {
            if state.interval == interval && !state.cancelled {
                state.cancelled = true;
                count += 1;
            }
        }
        count
    }

    /// Cancel everything, including actions firing right now.
    pub fn clear_all(&mut self) {
        self.pending.clear();
        self.due_of.clear();
        for state in self.in_flight.values_mut() {
            state.cancelled = true;
        }
        #[cfg(feature = "tracing")]
        tracing::debug!("schedule_clear_all");
    }

    /// Cancel everything and rewind the clock to 0.
    pub fn reset(&mut self) {
        self.clear_all();
        self.now = 0;
    }

    /// Advance the clock by `num_samples`.
    pub fn advance(&mut self, num_samples: usize) {
        self.now += num_samples as u64;
    }

    /// Take every action due before `now + num_samples` out of the queue.
    fn take_due(&mut self, num_samples: usize) -> DueBatch<C> {
        let end = self.now + num_samples as u64;
        let mut batch = DueBatch {
            block_start: self.now,
            entries: Vec::new(),
            fires: Vec::new(),
        };
        while let Some(entry) = self.pending.first_entry() {
            let (due, _) = *entry.key();
            if due >= end {
                break;
            }
            let action = entry.remove();
            self.due_of.remove(&action.id);
            let count = match action.interval {
                Some(interval) => (end - 1 - due) / interval + 1,
                None => 1,
            };
            let index = batch.entries.len();
            let step = action.interval.unwrap_or(0);
            for k in 0..count {
                batch.fires.push((due + k * step, action.id, index));
            }
            self.in_flight.insert(
                action.id,
                InFlight {
                    interval: action.interval,
                    cancelled: false,
                    fired: false,
                },
            );
            batch.entries.push(DueEntry {
                action,
                first_due: due,
                count,
            });
        }
        batch.fires.sort_unstable_by_key(|&(due, id, _)| (due, id));
        batch
    }

    /// Put surviving repeats back, rescheduled from their nominal due time.
    fn restore(&mut self, batch: DueBatch<C>) {
        for entry in batch.entries {
            let id = entry.action.id;
            let cancelled = self.in_flight.remove(&id).is_none_or(|state| state.cancelled);
            if cancelled {
                continue;
            }
            if let Some(interval) = entry.action.interval {
                let due = entry.first_due + entry.count * interval;
                self.pending.insert((due, id), entry.action);
                self.due_of.insert(id, due);
            }
        }
        self.in_flight.clear();
    }

    fn is_cancelled(&self, id: u64) -> bool {
        self.in_flight.get(&id).is_none_or(|state| state.cancelled)
    }

    fn mark_fired(&mut self, id: u64) {
        if let Some(state) = self.in_flight.get_mut(&id)
            && state.interval.is_none()
        {
            state.fired = true;
        }
    }
}

impl<C: HasScheduler> Scheduler<C> {
    /// Fire every action of `ctx`'s scheduler due within the next
    /// `num_samples` samples, in due order (ties by insertion order).
    ///
    /// Does not advance the clock.
    pub fn run_due(ctx: &mut C, num_samples: usize) {
        let mut batch = ctx.scheduler().take_due(num_samples);
        if batch.fires.is_empty() {
            return;
        }
        for i in 0..batch.fires.len() {
            let (due, id, entry) = batch.fires[i];
            if ctx.scheduler().is_cancelled(id) {
                continue;
            }
            let fire = Fire {
                handle: ScheduleHandle(id),
                due,
                offset: due.saturating_sub(batch.block_start) as usize,
            };
            ctx.scheduler().mark_fired(id);
            (batch.entries[entry].action.callback)(ctx, fire);
        }
        ctx.scheduler().restore(batch);
    }

    /// [`run_due`](Self::run_due) followed by advancing the clock.
    pub fn tick(ctx: &mut C, num_samples: usize) {
        Self::run_due(ctx, num_samples);
        ctx.scheduler().advance(num_samples);
    }
}
