//! All-or-nothing coordination of concurrent device commands.
//!
//! A scan step issues the same kind of command to several devices at
//! once (move every actuator, then grab every detector) and may not
//! proceed until every one of them has acknowledged. The barrier
//! broadcasts the commands, then waits for the full set of
//! acknowledgments under a single deadline. One missing ack fails the
//! whole phase, and the error names the devices still pending.
//!
//! Commands that complete after the deadline are drained by a detached
//! task so their acknowledgments never leak into a later phase.

use std::collections::BTreeSet;

use futures::future::BoxFuture;
use tokio::sync::mpsc;
use tokio::time::{timeout_at, Duration, Instant};
use tracing::{debug, warn};

use modaq_core::error::{ScanError, ScanResult};

/// Broadcasts `commands` concurrently and waits for every acknowledgment.
///
/// Returns the per-device results (in completion order) when all
/// devices acknowledge within `deadline`. Fails with
/// [`ScanError::TimedOut`] listing the devices still pending when the
/// deadline fires, or with [`ScanError::Actor`] as soon as any device
/// reports a hardware error.
pub async fn broadcast_and_wait<T: Send + 'static>(
    phase: &'static str,
    commands: Vec<(String, BoxFuture<'static, anyhow::Result<T>>)>,
    deadline: Duration,
) -> ScanResult<Vec<(String, T)>> {
    let expected = commands.len();
    let (ack_tx, mut ack_rx) = mpsc::channel::<(String, anyhow::Result<T>)>(expected.max(1));

    let mut pending: BTreeSet<String> = BTreeSet::new();
    for (name, command) in commands {
        pending.insert(name.clone());
        let tx = ack_tx.clone();
        tokio::spawn(async move {
            let result = command.await;
            // A closed channel means the barrier already gave up on us.
            let _ = tx.send((name, result)).await;
        });
    }
    drop(ack_tx);

    // One deadline for the whole set, not per acknowledgment.
    let cutoff = Instant::now() + deadline;
    let mut acks = Vec::with_capacity(expected);
    while acks.len() < expected {
        match timeout_at(cutoff, ack_rx.recv()).await {
            Ok(Some((name, Ok(value)))) => {
                pending.remove(&name);
                acks.push((name, value));
            }
            Ok(Some((name, Err(source)))) => {
                pending.remove(&name);
                drain_late_acks(phase, ack_rx);
                return Err(ScanError::Actor { actor: name, source });
            }
            Ok(None) => {
                // Every sender dropped without acknowledging.
                warn!(phase, pending = ?pending, "barrier lost its command tasks");
                return Err(ScanError::TimedOut {
                    phase,
                    pending: pending.into_iter().collect(),
                });
            }
            Err(_) => {
                warn!(phase, pending = ?pending, "barrier deadline elapsed");
                drain_late_acks(phase, ack_rx);
                return Err(ScanError::TimedOut {
                    phase,
                    pending: pending.into_iter().collect(),
                });
            }
        }
    }

    Ok(acks)
}

/// Consumes acknowledgments that arrive after the barrier has already
/// failed, so the commands' tasks can finish without anyone confusing
/// their acks for a later phase's.
fn drain_late_acks<T: Send + 'static>(
    phase: &'static str,
    mut ack_rx: mpsc::Receiver<(String, anyhow::Result<T>)>,
) {
    tokio::spawn(async move {
        while let Some((name, result)) = ack_rx.recv().await {
            debug!(phase, actor = %name, ok = result.is_ok(), "discarding late ack");
        }
    });
}
