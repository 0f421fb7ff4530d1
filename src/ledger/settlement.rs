//! Settlement helpers shared by expense and return approvals

use serde::{Deserialize, Serialize};
use std::future::Future;
use tracing::warn;

use crate::types::*;

/// Result of a committed approval
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApprovalOutcome {
    /// The advance as committed, including its new balance
    pub advance: Advance,
    /// Whether this approval moved the advance into `Settled`
    pub settled: bool,
}

/// Run `attempt` until it succeeds, fails for a non-conflict reason, or has
/// been retried `max_retries` times.
///
/// Each attempt must re-read its inputs so the delta is reapplied on top of
/// the latest committed state.
pub(crate) async fn with_conflict_retry<T, F, Fut>(
    operation: &str,
    max_retries: u32,
    mut attempt: F,
) -> LedgerResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = LedgerResult<T>>,
{
    let mut retries = 0;
    loop {
        match attempt().await {
            Err(err) if err.is_retryable() && retries < max_retries => {
                retries += 1;
                warn!(operation, attempt = retries, error = %err, "retrying after concurrency conflict");
            }
            Err(err) if err.is_retryable() => {
                warn!(operation, retries, error = %err, "concurrency conflict retries exhausted");
                return Err(err);
            }
            other => return other,
        }
    }
}
