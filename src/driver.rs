//! Timer-driven stepping for any engine.
//!
//! The driver owns the engine state and at most one schedule. Steps run
//! synchronously while the engine lock is held, so cancelling a schedule can
//! only take effect between steps, never halfway through one.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

use crate::error::{Result, SimError};

/// Anything the driver can step on a timer.
pub trait Engine: Send + 'static {
    type Snapshot: Clone + Send + Sync + 'static;

    fn snapshot(&self) -> Self::Snapshot;

    /// Replace the current state with the next generation.
    fn advance(&mut self) -> Result<()>;

    /// Re-initialize from the engine's current parameters.
    fn reset(&mut self) -> Result<()>;

    /// A fixed point was reached; further steps would change nothing.
    fn is_finished(&self) -> bool {
        false
    }

    fn label(&self) -> &'static str;
}

struct Schedule {
    handle: JoinHandle<()>,
}

impl Schedule {
    fn is_live(&self) -> bool {
        !self.handle.is_finished()
    }
}

pub struct Driver<E: Engine> {
    engine: Arc<Mutex<E>>,
    frames: Arc<watch::Sender<E::Snapshot>>,
    schedule: Option<Schedule>,
    interval: Duration,
}

impl<E: Engine> Driver<E> {
    pub fn new(engine: E, interval: Duration) -> Result<Self> {
        check_interval(interval)?;
        let (frames, _) = watch::channel(engine.snapshot());
        Ok(Self {
            engine: Arc::new(Mutex::new(engine)),
            frames: Arc::new(frames),
            schedule: None,
            interval,
        })
    }

    /// Latest published snapshot.
    pub fn snapshot(&self) -> E::Snapshot {
        self.frames.borrow().clone()
    }

    /// Receives every snapshot published after a step or reset.
    pub fn subscribe(&self) -> watch::Receiver<E::Snapshot> {
        self.frames.subscribe()
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn is_running(&self) -> bool {
        self.schedule.as_ref().is_some_and(Schedule::is_live)
    }

    /// Begin stepping every `interval`. Must be called inside a Tokio
    /// runtime. Fails with `SchedulingConflict` while a schedule is live.
    pub async fn start(&mut self) -> Result<()> {
        if self.is_running() {
            warn!("refusing to start a second step schedule");
            return Err(SimError::SchedulingConflict);
        }
        // A schedule that stopped itself at a fixed point leaves a finished
        // handle behind.
        self.schedule = None;

        let engine = Arc::clone(&self.engine);
        let frames = Arc::clone(&self.frames);
        let interval = self.interval;
        let label = engine.lock().await.label();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // first tick fires immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let mut state = engine.lock().await;
                if state.is_finished() {
                    info!(engine = label, "reached fixed point; schedule stopped");
                    break;
                }
                if let Err(e) = state.advance() {
                    warn!(engine = label, error = %e, "step failed; schedule stopped");
                    break;
                }
                frames.send_replace(state.snapshot());
            }
        });
        info!(engine = label, interval_ms = interval.as_millis() as u64, "schedule started");
        self.schedule = Some(Schedule { handle });
        Ok(())
    }

    /// Cancel the pending schedule and wait until its task has exited.
    /// Returns whether a live schedule was stopped.
    pub async fn pause(&mut self) -> bool {
        let Some(schedule) = self.schedule.take() else {
            return false;
        };
        let was_live = schedule.is_live();
        schedule.handle.abort();
        let _ = schedule.handle.await;
        if was_live {
            info!("schedule paused");
        }
        was_live
    }

    /// Change the cadence. A running schedule is cancelled before the new
    /// one is installed, so two cadences never overlap.
    pub async fn set_interval(&mut self, interval: Duration) -> Result<()> {
        check_interval(interval)?;
        self.interval = interval;
        if self.pause().await {
            info!(interval_ms = interval.as_millis() as u64, "rescheduling");
            self.start().await?;
        }
        Ok(())
    }

    /// Advance by exactly one generation outside the timer.
    pub async fn step_once(&mut self) -> Result<E::Snapshot> {
        if self.is_running() {
            return Err(SimError::SchedulingConflict);
        }
        let mut engine = self.engine.lock().await;
        engine.advance()?;
        let snapshot = engine.snapshot();
        self.frames.send_replace(snapshot.clone());
        Ok(snapshot)
    }

    /// Stop any schedule and re-initialize the engine in one locked section.
    /// The driver is left paused.
    pub async fn reset(&mut self) -> Result<E::Snapshot> {
        self.reset_with(|engine| engine.reset()).await
    }

    /// Stop any schedule, then apply `f` (typically a restart with new
    /// parameters) under the lock and publish the result.
    pub async fn reset_with(&mut self, f: impl FnOnce(&mut E) -> Result<()>) -> Result<E::Snapshot> {
        self.pause().await;
        let mut engine = self.engine.lock().await;
        f(&mut *engine)?;
        let snapshot = engine.snapshot();
        self.frames.send_replace(snapshot.clone());
        info!(engine = engine.label(), "reset");
        Ok(snapshot)
    }

    /// Apply a parameter change that keeps the current grid. Any running
    /// schedule keeps going and sees the change from its next step.
    pub async fn update<R>(&self, f: impl FnOnce(&mut E) -> Result<R>) -> Result<R> {
        let mut engine = self.engine.lock().await;
        f(&mut *engine)
    }
}

impl<E: Engine> Drop for Driver<E> {
    fn drop(&mut self) {
        if let Some(schedule) = self.schedule.take() {
            schedule.handle.abort();
        }
    }
}

fn check_interval(interval: Duration) -> Result<()> {
    if interval.is_zero() {
        return Err(SimError::invalid("step interval must be positive"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Counter {
        generation: u64,
        stop_at: Option<u64>,
    }

    impl Engine for Counter {
        type Snapshot = u64;

        fn snapshot(&self) -> u64 {
            self.generation
        }

        fn advance(&mut self) -> Result<()> {
            self.generation += 1;
            Ok(())
        }

        fn reset(&mut self) -> Result<()> {
            self.generation = 0;
            Ok(())
        }

        fn is_finished(&self) -> bool {
            self.stop_at.is_some_and(|n| self.generation >= n)
        }

        fn label(&self) -> &'static str {
            "counter"
        }
    }

    fn counter(stop_at: Option<u64>) -> Driver<Counter> {
        Driver::new(Counter { generation: 0, stop_at }, Duration::from_millis(100)).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn steps_on_schedule_and_pauses() {
        let mut driver = counter(None);
        driver.start().await.unwrap();
        tokio::time::sleep(Duration::from_millis(350)).await;
        let seen = driver.snapshot();
        assert!((2..=4).contains(&seen), "saw {seen}");

        assert!(driver.pause().await);
        let frozen = driver.snapshot();
        tokio::time::sleep(Duration::from_millis(1_000)).await;
        assert_eq!(driver.snapshot(), frozen);
        assert!(!driver.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn second_start_is_a_conflict() {
        let mut driver = counter(None);
        driver.start().await.unwrap();
        assert_eq!(driver.start().await, Err(SimError::SchedulingConflict));
        assert_eq!(driver.step_once().await, Err(SimError::SchedulingConflict));
        driver.pause().await;
        assert!(driver.start().await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn reset_cancels_pending_steps() {
        let mut driver = counter(None);
        driver.start().await.unwrap();
        tokio::time::sleep(Duration::from_millis(250)).await;
        assert_eq!(driver.reset().await.unwrap(), 0);
        assert!(!driver.is_running());
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(driver.snapshot(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn schedule_stops_at_fixed_point() {
        let mut driver = counter(Some(2));
        driver.start().await.unwrap();
        tokio::time::sleep(Duration::from_millis(1_000)).await;
        assert_eq!(driver.snapshot(), 2);
        assert!(!driver.is_running());
        // a finished schedule does not block a fresh start
        driver.reset().await.unwrap();
        assert!(driver.start().await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn interval_change_reschedules() {
        let mut driver = counter(None);
        driver.start().await.unwrap();
        driver.set_interval(Duration::from_millis(10)).await.unwrap();
        assert!(driver.is_running());
        tokio::time::sleep(Duration::from_millis(105)).await;
        assert!(driver.snapshot() >= 8);
        assert!(driver.set_interval(Duration::ZERO).await.is_err());
    }

    #[tokio::test]
    async fn manual_steps_publish_to_subscribers() {
        let mut driver = counter(None);
        let mut rx = driver.subscribe();
        assert_eq!(driver.step_once().await.unwrap(), 1);
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow(), 1);
        let doubled = driver.update(|c| Ok(c.generation * 2)).await.unwrap();
        assert_eq!(doubled, 2);
    }
}
