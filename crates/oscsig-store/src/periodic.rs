//! Clocked callbacks: idle checks, frame capture and frame playback all run
//! as short closures on a tokio interval until their handle is stopped.

use std::sync::Arc;
use std::time::Duration;

use oscsig_core::TreeView;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::error::{Result, StoreError};

/// Period of one frame at `frame_rate` frames per second.
pub fn frame_period(frame_rate: f64) -> Result<Duration> {
    if !frame_rate.is_finite() || frame_rate <= 0.0 {
        return Err(StoreError::InvalidConfig(format!(
            "frame rate must be a positive number, got {frame_rate}"
        )));
    }
    Duration::try_from_secs_f64(1.0 / frame_rate)
        .ok()
        .filter(|p| !p.is_zero())
        .ok_or_else(|| StoreError::InvalidConfig(format!("frame rate {frame_rate} is too high")))
}

/// Handle to a running periodic task.
pub struct PeriodicHandle {
    name: String,
    period: Duration,
    token: CancellationToken,
    task: JoinHandle<()>,
}

impl PeriodicHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Ask the task to stop after its current callback.
    pub fn stop(&self) {
        self.token.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Stop the task and wait until it has exited.
    pub async fn join(self) -> Result<()> {
        self.token.cancel();
        self.task.await?;
        tracing::debug!("periodic task '{}' stopped", self.name);
        Ok(())
    }
}

/// Run `tick` every `period`, starting immediately.
///
/// Ticks missed because a callback ran long are skipped rather than
/// replayed in a burst. Must be called from within a tokio runtime.
pub fn spawn_periodic<F>(name: &str, period: Duration, mut tick: F) -> Result<PeriodicHandle>
where
    F: FnMut() + Send + 'static,
{
    if period.is_zero() {
        return Err(StoreError::InvalidConfig(format!(
            "period of '{name}' must be non-zero"
        )));
    }
    let token = CancellationToken::new();
    let cancelled = token.clone();
    let task_name = name.to_string();
    let task = tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = cancelled.cancelled() => break,
                _ = interval.tick() => tick(),
            }
        }
        tracing::trace!("periodic task '{task_name}' exiting");
    });
    tracing::debug!("started periodic task '{name}' every {period:?}");
    Ok(PeriodicHandle {
        name: name.to_string(),
        period,
        token,
        task,
    })
}

/// Drive idle decay of `view`'s tree at its configured idle period.
///
/// Returns `None` when the tree has decay disabled.
pub fn start_idle_decay<V>(view: Arc<V>) -> Result<Option<PeriodicHandle>>
where
    V: TreeView + Send + Sync + 'static,
{
    let Some(period) = view.tree().config().idle_period else {
        return Ok(None);
    };
    let handle = spawn_periodic("idle decay", period, move || {
        let report = view.tree().decay_tick();
        tracing::trace!(armed = report.armed, decayed = report.decayed, "idle check");
    })?;
    Ok(Some(handle))
}
