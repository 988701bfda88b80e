// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Time-based flush trigger.
//!
//! The scheduler holds a single deadline. It is armed once at construction and
//! is not periodic: the task started by [`run`] sleeps until the deadline, runs
//! the expiry callback, and then waits for whatever deadline the callback left
//! behind. Every flush calls [`FlushScheduler::rearm`] as its last step, so the
//! idle window always restarts after a delivery attempt, whichever trigger
//! caused it. Under steady load that fills batches by size, the deadline keeps
//! moving and the timer never fires on its own.

use std::future::Future;
use std::ops::ControlFlow;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Upper bound for a deadline, about 30 years out.
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

#[derive(Debug)]
pub(crate) struct FlushScheduler {
    period: Duration,
    deadline: watch::Sender<Instant>,
    cancel: CancellationToken,
}

impl FlushScheduler {
    pub(crate) fn new(period: Duration) -> Self {
        let (deadline, _) = watch::channel(deadline_after(period));
        FlushScheduler {
            period,
            deadline,
            cancel: CancellationToken::new(),
        }
    }

    /// Restarts the idle window. Concurrent callers are fine: the last write wins.
    pub(crate) fn rearm(&self) {
        self.deadline.send_replace(deadline_after(self.period));
    }

    pub(crate) fn deadline(&self) -> Instant {
        *self.deadline.borrow()
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<Instant> {
        self.deadline.subscribe()
    }

    pub(crate) fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub(crate) fn cancel(&self) {
        self.cancel.cancel();
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

/// `now + period`, clamped so that huge periods never overflow the clock.
fn deadline_after(period: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(period.min(FAR_FUTURE)).unwrap_or(now)
}

/// Drives the timer until it is cancelled, the scheduler is dropped, or the
/// expiry callback breaks.
///
/// The callback must re-arm the scheduler before it returns `Continue`.
pub(crate) async fn run<F, Fut>(
    mut deadline: watch::Receiver<Instant>,
    cancel: CancellationToken,
    mut on_expiry: F,
) where
    F: FnMut() -> Fut,
    Fut: Future<Output = ControlFlow<()>>,
{
    debug!("LOGS | Flush scheduler started");

    loop {
        let current = *deadline.borrow_and_update();
        tokio::select! {
            () = cancel.cancelled() => break,
            changed = deadline.changed() => {
                if changed.is_err() {
                    break;
                }
            }
            () = sleep_until(current) => {
                if on_expiry().await.is_break() {
                    break;
                }
            }
        }
    }

    debug!("LOGS | Flush scheduler stopped");
}
