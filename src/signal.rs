use std::time::Duration;

use futures::future::select_all;
use tokio_util::sync::CancellationToken;

/// Cloneable cancellation handle.
///
/// All clones observe the same state: aborting one aborts every clone.
#[derive(Clone, Debug, Default)]
pub struct AbortSignal {
    token: CancellationToken,
}

impl AbortSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fires the signal. Idempotent.
    pub fn abort(&self) {
        self.token.cancel();
    }

    pub fn is_aborted(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Completes once the signal has fired.
    pub async fn aborted(&self) {
        self.token.cancelled().await;
    }
}

/// Completes as soon as any of `signals` fires; never completes for an
/// empty slice.
pub(crate) async fn any_aborted(signals: &[AbortSignal]) {
    if signals.is_empty() {
        return std::future::pending().await;
    }
    let waiters = signals
        .iter()
        .map(|signal| Box::pin(signal.token.cancelled()));
    select_all(waiters).await;
}

/// Completes with `timeout` once it elapses; never completes without one.
pub(crate) async fn expire(timeout: Option<Duration>) -> Duration {
    match timeout {
        Some(timeout) => {
            tokio::time::sleep(timeout).await;
            timeout
        }
        None => std::future::pending().await,
    }
}
