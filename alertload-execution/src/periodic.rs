//! Cancelable periodic sampler
//!
//! The first cycle runs one interval after start. Ticks missed while a cycle
//! is still running are skipped rather than bunched up.

use crate::error::ExecutionError;
use std::future::Future;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info};

pub struct PeriodicSampler;

impl PeriodicSampler {
    /// Spawn a task running `cycle` every `interval` until the returned
    /// handle is cancelled or dropped.
    pub fn start<F, Fut>(cycle: F, interval: Duration) -> SamplerHandle
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        Self::start_named("sampler", cycle, interval)
    }

    pub fn start_named<F, Fut>(name: &str, mut cycle: F, interval: Duration) -> SamplerHandle
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (stop_tx, mut stop_rx) = oneshot::channel::<()>();
        let name = name.to_string();
        // interval_at panics on a zero period
        let interval = interval.max(Duration::from_millis(1));

        let join_handle = tokio::spawn(async move {
            info!(
                sampler = %name,
                interval_ms = interval.as_millis() as u64,
                "starting periodic sampler"
            );

            let mut ticker = interval_at(Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            let mut cycles = 0u64;

            loop {
                // a dropped handle closes the channel, which also ends the loop
                tokio::select! {
                    biased;
                    _ = &mut stop_rx => break,
                    _ = ticker.tick() => {}
                }

                cycles += 1;
                debug!(sampler = %name, cycle = cycles, "sampling");
                // runs to completion; a stop request waits for it
                cycle().await;
            }

            info!(sampler = %name, cycles, "periodic sampler stopped");
            cycles
        });

        SamplerHandle {
            stop_tx,
            join_handle,
        }
    }
}

/// Owner's handle on a running sampler
#[derive(Debug)]
pub struct SamplerHandle {
    stop_tx: oneshot::Sender<()>,
    join_handle: JoinHandle<u64>,
}

impl SamplerHandle {
    /// Stop future ticks and wait for an in-flight cycle to finish.
    ///
    /// Returns the number of cycles that ran. Once this resolves the cycle
    /// closure is never invoked again.
    pub async fn cancel(self) -> Result<u64, ExecutionError> {
        let _ = self.stop_tx.send(());
        Ok(self.join_handle.await?)
    }

    pub fn is_finished(&self) -> bool {
        self.join_handle.is_finished()
    }
}
