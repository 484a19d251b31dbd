//! Timeout enforcement.
//!
//! # Responsibilities
//! - Wrap upstream calls with a deadline
//! - Cancel the wrapped operation cleanly on timeout (the future is dropped)
//!
//! # Design Decisions
//! - Uses Tokio's timer and `Notify`
//! - Timeout errors are distinct from other errors
//! - Upstream calls use an idle deadline: a slow upload that keeps moving is
//!   never cut, and relayed response bodies stream without a deadline

use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Notify;

/// The wrapped operation did not finish before its deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("deadline of {0:?} elapsed")]
pub struct DeadlineExceeded(pub Duration);

/// Run `future` under a deadline that restarts whenever `progress` is notified.
///
/// While the request body is being sent every frame counts as progress; once it
/// is sent, the remaining deadline bounds the wait for the response head.
pub async fn with_idle_timeout<F>(
    duration: Duration,
    progress: &Notify,
    future: F,
) -> Result<F::Output, DeadlineExceeded>
where
    F: Future,
{
    tokio::pin!(future);

    loop {
        tokio::select! {
            biased;
            output = &mut future => return Ok(output),
            _ = progress.notified() => continue,
            _ = tokio::time::sleep(duration) => return Err(DeadlineExceeded(duration)),
        }
    }
}
