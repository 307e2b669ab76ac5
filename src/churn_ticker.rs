//! Timer-driven mocker loop
//!
//! A single tokio task owns the engine and calls `step()` once per
//! `update_interval`. Steps never overlap: a late tick is delayed, not run
//! concurrently. Stopping takes effect after the in-flight step.

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};

use crate::churn_engine::ChurnEngine;
use crate::churn_interface::EventSink;

#[derive(Debug, thiserror::Error)]
pub enum MockerError {
    #[error("mocker task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Handle to a running mocker task
pub struct MockerHandle<S: EventSink> {
    stop: Option<oneshot::Sender<()>>,
    task: JoinHandle<ChurnEngine<S>>,
}

/// Spawn the mocker on the current tokio runtime.
///
/// The first step runs one period after the call. With `limit` set the task
/// ends by itself after that many steps.
pub fn spawn_mocker<S>(mut engine: ChurnEngine<S>, limit: Option<u64>) -> MockerHandle<S>
where
    S: EventSink + Send + 'static,
{
    let (stop_tx, mut stop_rx) = oneshot::channel::<()>();
    let period = engine.config().tick_period();

    let task = tokio::spawn(async move {
        let mut ticker = time::interval_at(time::Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut steps = 0u64;
        loop {
            if limit.is_some_and(|limit| steps >= limit) {
                break;
            }
            tokio::select! {
                // a dropped handle also stops the mocker
                _ = &mut stop_rx => break,
                _ = ticker.tick() => {
                    let report = engine.step();
                    log::trace!("round {} done, {} events", report.round, report.event_count());
                    steps += 1;
                }
            }
        }

        log::info!(
            "mocker {} stopped after {} rounds",
            engine.config().id,
            engine.round()
        );
        engine
    });

    MockerHandle {
        stop: Some(stop_tx),
        task,
    }
}

impl<S: EventSink> MockerHandle<S> {
    /// Stop ticking and hand back the engine
    pub async fn stop(mut self) -> Result<ChurnEngine<S>, MockerError> {
        if let Some(stop) = self.stop.take() {
            // task may already have finished on its own
            let _ = stop.send(());
        }
        Ok(self.task.await?)
    }

    /// Wait for the task to reach its step limit
    pub async fn join(self) -> Result<ChurnEngine<S>, MockerError> {
        let MockerHandle { stop, task } = self;
        let engine = task.await?;
        drop(stop);
        Ok(engine)
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}
