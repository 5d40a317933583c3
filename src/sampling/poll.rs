use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

#[derive(Debug)]
pub enum WaitError<E> {
    TimedOut { waited: Duration },
    Cancelled,
    Probe(E),
}

/// Re-run `probe` every `poll_interval` until it yields a value, `timeout` elapses, or
/// `cancel` fires. The probe always runs at least once, and once more right at the deadline
/// if the interval does not divide it evenly.
pub async fn await_condition<T, E, F>(
    mut probe: F,
    timeout: Duration,
    poll_interval: Duration,
    cancel: &CancellationToken,
) -> Result<T, WaitError<E>>
where
    F: FnMut() -> Result<Option<T>, E>,
{
    let started = Instant::now();
    let deadline = started + timeout;

    loop {
        if cancel.is_cancelled() {
            return Err(WaitError::Cancelled);
        }

        if let Some(value) = probe().map_err(WaitError::Probe)? {
            return Ok(value);
        }

        let now = Instant::now();
        if now >= deadline {
            return Err(WaitError::TimedOut {
                waited: now.duration_since(started),
            });
        }

        let nap = poll_interval.min(deadline - now);
        tokio::select! {
            _ = tokio::time::sleep(nap) => {}
            _ = cancel.cancelled() => return Err(WaitError::Cancelled),
        }
    }
}
