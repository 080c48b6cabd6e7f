//! Status polling loop shared by the processing and archive steps.
//!
//! Each round fetches the remote status once, then sleeps one interval.
//! Transient fetch errors are reported and retried on the next round; any other
//! fetch error ends the loop. Cancellation is observed both before each fetch
//! and during the sleep.

use std::future::Future;
use std::time::{Duration, Instant};

use tilepush_api_client::ApiError;
use tokio_util::sync::CancellationToken;

/// Interval and overall deadline for one polling loop.
#[derive(Debug, Clone, Copy)]
pub struct PollSettings {
    pub interval: Duration,
    pub timeout: Duration,
}

/// Classification of one fetched status.
#[derive(Debug)]
pub enum PollStep<T> {
    /// Terminal success.
    Done(T),
    /// Terminal failure, carrying the remote status.
    Failed(String),
    /// Keep polling.
    Pending {
        status: String,
        percent_complete: Option<f64>,
    },
}

/// Non-terminal things that happened during the loop.
#[derive(Debug)]
pub enum PollNotice<'a> {
    Pending {
        status: &'a str,
        percent_complete: Option<f64>,
        elapsed: Duration,
    },
    TransientError(&'a ApiError),
}

#[derive(Debug)]
pub enum PollOutcome<T> {
    Ready(T),
    Failed(String),
    TimedOut(Duration),
    Interrupted,
    Fatal(ApiError),
}

/// Poll `fetch` until it reports a terminal step, the timeout elapses, or
/// `cancel` fires.
pub async fn poll_until<T, F, Fut, N>(
    settings: PollSettings,
    cancel: &CancellationToken,
    mut fetch: F,
    mut notify: N,
) -> PollOutcome<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<PollStep<T>, ApiError>>,
    N: FnMut(PollNotice<'_>),
{
    let start = Instant::now();

    loop {
        if cancel.is_cancelled() {
            return PollOutcome::Interrupted;
        }

        match fetch().await {
            Ok(PollStep::Done(value)) => return PollOutcome::Ready(value),
            Ok(PollStep::Failed(status)) => return PollOutcome::Failed(status),
            Ok(PollStep::Pending {
                status,
                percent_complete,
            }) => notify(PollNotice::Pending {
                status: &status,
                percent_complete,
                elapsed: start.elapsed(),
            }),
            Err(e) if e.is_transient() => notify(PollNotice::TransientError(&e)),
            Err(e) => return PollOutcome::Fatal(e),
        }

        let elapsed = start.elapsed();
        if elapsed >= settings.timeout {
            return PollOutcome::TimedOut(settings.timeout);
        }

        let pause = settings.interval.min(settings.timeout - elapsed);
        tokio::select! {
            _ = cancel.cancelled() => return PollOutcome::Interrupted,
            _ = tokio::time::sleep(pause) => {}
        }
    }
}
