//! Deterministic, single-threaded event propagation across registered subjects.
//!
//! The dispatcher never runs more than one subject's `dispatch()` concurrently, and always
//! advances the subject(s) reporting the smallest `peek_datetime()` in the order they were
//! registered. Registering the broker before the strategy (see [`crate::strategy`]) is what
//! makes a backtest causal: the broker's reaction to a tick batch is always visible to the
//! strategy callback that runs immediately after.

use chrono::{DateTime, Utc};

/// A participant in the dispatcher's step loop.
pub trait Subject {
    fn start(&mut self) {}
    fn stop(&mut self) {}

    /// The datetime of this subject's next event, or `None` if it has none pending.
    fn peek_datetime(&self) -> Option<DateTime<Utc>>;

    fn eof(&self) -> bool;

    /// Advances this subject by one step, causing it to emit whatever events are due.
    fn dispatch(&mut self);
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum DispatcherEvent {
    Start,
    Idle,
    Stop,
}

/// Runs registered subjects to completion in deterministic, registration-stable order.
pub struct Dispatcher<'a> {
    subjects: Vec<&'a mut dyn Subject>,
}

impl<'a> Dispatcher<'a> {
    pub fn new() -> Self {
        Self { subjects: Vec::new() }
    }

    /// Registers a subject. Registration order is the dispatch tie-break order: when two
    /// subjects report the same `peek_datetime()`, the one registered first dispatches
    /// first.
    pub fn add_subject(&mut self, subject: &'a mut dyn Subject) {
        self.subjects.push(subject);
    }

    /// Runs every subject to `eof`, calling `on_event` for `Start`/`Idle`/`Stop`
    /// transitions. Returns the number of steps taken.
    pub fn run(&mut self, mut on_event: impl FnMut(DispatcherEvent)) -> u64 {
        for subject in self.subjects.iter_mut() {
            subject.start();
        }
        on_event(DispatcherEvent::Start);

        let mut steps = 0u64;
        loop {
            let smallest = self
                .subjects
                .iter()
                .filter(|s| !s.eof())
                .filter_map(|s| s.peek_datetime())
                .min();

            let Some(smallest) = smallest else {
                on_event(DispatcherEvent::Idle);
                break;
            };

            for subject in self.subjects.iter_mut() {
                if !subject.eof() && subject.peek_datetime() == Some(smallest) {
                    subject.dispatch();
                }
            }
            steps += 1;
        }

        for subject in self.subjects.iter_mut() {
            subject.stop();
        }
        on_event(DispatcherEvent::Stop);
        steps
    }
}

impl<'a> Default for Dispatcher<'a> {
    fn default() -> Self {
        Self::new()
    }
}
