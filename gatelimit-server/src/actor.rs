//! Single-writer ownership of limiter state
//!
//! All mutable limiter state lives inside one task; callers hold a
//! cloneable [`LimiterHandle`] and exchange messages with it. Every
//! check is a single actor turn, so the read-prune-append sequence is
//! atomic without locks, and the periodic sweep runs between messages
//! instead of racing them.

use crate::metrics::Metrics;
use crate::types::Decision;
use anyhow::Result;
use gatelimit::SlidingWindowLimiter;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::sync::{mpsc, oneshot};
use tokio::time::MissedTickBehavior;

/// Message types for the limiter actor
pub enum LimiterMessage {
    Check {
        key: String,
        now: SystemTime,
        reply: oneshot::Sender<Decision>,
    },
    TrackedKeys {
        reply: oneshot::Sender<usize>,
    },
    Shutdown,
}

/// Handle to communicate with the limiter actor
#[derive(Debug, Clone)]
pub struct LimiterHandle {
    tx: mpsc::Sender<LimiterMessage>,
}

impl LimiterHandle {
    /// Take one admission decision for `key` at `now`
    pub async fn check(&self, key: String, now: SystemTime) -> Result<Decision> {
        let (reply, rx) = oneshot::channel();

        self.tx
            .send(LimiterMessage::Check { key, now, reply })
            .await
            .map_err(|_| anyhow::anyhow!("Limiter actor has shut down"))?;

        rx.await
            .map_err(|_| anyhow::anyhow!("Limiter actor dropped reply channel"))
    }

    /// Number of keys currently holding state
    pub async fn tracked_keys(&self) -> Result<usize> {
        let (reply, rx) = oneshot::channel();

        self.tx
            .send(LimiterMessage::TrackedKeys { reply })
            .await
            .map_err(|_| anyhow::anyhow!("Limiter actor has shut down"))?;

        rx.await
            .map_err(|_| anyhow::anyhow!("Limiter actor dropped reply channel"))
    }

    /// Ask the actor to stop
    ///
    /// Checks sent after this resolve to an error. The actor also stops
    /// when every handle has been dropped.
    pub async fn shutdown(&self) {
        let _ = self.tx.send(LimiterMessage::Shutdown).await;
    }
}

/// The limiter actor
pub struct LimiterActor;

impl LimiterActor {
    /// Spawn an actor that owns `limiter` and sweeps it every `sweep_interval`
    pub fn spawn(
        buffer_size: usize,
        limiter: SlidingWindowLimiter,
        sweep_interval: Duration,
        metrics: Arc<Metrics>,
    ) -> LimiterHandle {
        let (tx, rx) = mpsc::channel(buffer_size);

        tokio::spawn(async move {
            run_actor(rx, limiter, sweep_interval, metrics).await;
        });

        LimiterHandle { tx }
    }
}

async fn run_actor(
    mut rx: mpsc::Receiver<LimiterMessage>,
    mut limiter: SlidingWindowLimiter,
    sweep_interval: Duration,
    metrics: Arc<Metrics>,
) {
    let mut sweep = tokio::time::interval(sweep_interval);
    sweep.set_missed_tick_behavior(MissedTickBehavior::Skip);
    // An interval's first tick completes immediately; consume it so the
    // first sweep happens a full interval in.
    sweep.tick().await;

    loop {
        tokio::select! {
            msg = rx.recv() => match msg {
                Some(LimiterMessage::Check { key, now, reply }) => {
                    let decision = handle_check(&mut limiter, &key, now);
                    // Ignore send errors - the caller may have timed out
                    let _ = reply.send(decision);
                }
                Some(LimiterMessage::TrackedKeys { reply }) => {
                    let _ = reply.send(limiter.tracked_keys());
                }
                Some(LimiterMessage::Shutdown) | None => break,
            },
            _ = sweep.tick() => {
                let removed = limiter.sweep(SystemTime::now());
                let active = limiter.tracked_keys();
                metrics.record_sweep(removed, active);
                if removed > 0 {
                    tracing::debug!(removed, active, "Swept idle keys");
                }
            }
        }
    }

    tracing::info!("Limiter actor shutting down");
}

fn handle_check(limiter: &mut SlidingWindowLimiter, key: &str, now: SystemTime) -> Decision {
    let allowed = limiter.check(key, now);
    let info = limiter.info(key, now);
    Decision { allowed, info }
}
