//! # Tick Sources
//!
//! One abstraction over "what starts the next background pass": a plain
//! interval timer or an external event feed (e.g. a new-block notifier).
//! The consumer loop is the same either way:
//!
//! ```text
//! loop { tick().await; run_pass().await; coalesce(); }
//! ```
//!
//! Because the loop only asks for the next tick after the pass finished,
//! passes can never overlap; `coalesce` then throws away every trigger that
//! fired while the pass was running, so a burst of triggers produces at most
//! one follow-up pass instead of a queue of them.

use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{self, Interval, MissedTickBehavior};

/// A source of background-pass triggers.
pub enum TickSource {
    /// Fixed-interval timer; sleeps the full period between whole passes.
    Interval(Interval),
    /// Externally fed events; each sent `()` requests a pass.
    Events(mpsc::UnboundedReceiver<()>),
}

impl TickSource {
    /// Timer variant ticking every `period` (measured from pass completion,
    /// not pass start).
    pub fn interval(period: Duration) -> Self {
        let mut interval = time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        TickSource::Interval(interval)
    }

    /// Event variant; the returned sender is handed to whatever observes the
    /// external trigger (a block listener, a test, ...).
    pub fn events() -> (mpsc::UnboundedSender<()>, Self) {
        let (tx, rx) = mpsc::unbounded_channel();
        (tx, TickSource::Events(rx))
    }

    /// Waits for the next trigger. Returns `false` once the source can never
    /// fire again (event sender dropped).
    pub async fn tick(&mut self) -> bool {
        match self {
            TickSource::Interval(interval) => {
                interval.tick().await;
                true
            }
            TickSource::Events(rx) => rx.recv().await.is_some(),
        }
    }

    /// Discards triggers that accumulated while a pass was running. Called by
    /// the consumer after each pass so mid-pass triggers are ignored rather
    /// than queued.
    pub fn coalesce(&mut self) {
        match self {
            TickSource::Interval(interval) => interval.reset(),
            TickSource::Events(rx) => while rx.try_recv().is_ok() {},
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn event_ticks_fired_mid_pass_coalesce_to_one() {
        let (tx, mut ticks) = TickSource::events();
        tx.send(()).unwrap();
        assert!(ticks.tick().await);

        // Three triggers land while the "pass" is running ...
        tx.send(()).unwrap();
        tx.send(()).unwrap();
        tx.send(()).unwrap();
        ticks.coalesce();

        // ... and none of them is still queued afterwards.
        let pending = time::timeout(Duration::from_millis(50), ticks.tick()).await;
        assert!(pending.is_err(), "coalesced ticks must not queue a pass");

        // A fresh trigger still gets through.
        tx.send(()).unwrap();
        assert!(ticks.tick().await);
    }

    #[tokio::test]
    async fn closed_event_source_reports_exhaustion() {
        let (tx, mut ticks) = TickSource::events();
        drop(tx);
        assert!(!ticks.tick().await);
    }

    #[tokio::test]
    async fn interval_source_keeps_ticking() {
        let mut ticks = TickSource::interval(Duration::from_millis(5));
        assert!(ticks.tick().await); // first tick is immediate
        ticks.coalesce();
        assert!(ticks.tick().await);
    }
}
