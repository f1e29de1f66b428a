//! Action polling
//!
//! State-changing requests (power cycle, resize, snapshot, IP assignment)
//! execute asynchronously on the backend and hand back an action record. The
//! poller re-fetches that record at a fixed interval until it reaches a
//! terminal status or a wall-clock deadline elapses.
//!
//! There is no cancellation: once submitted, an action can only be awaited or
//! abandoned. A timed-out action therefore still means the mutation happened.

use crate::digitalocean::error::ErrorShape;
use serde_json::Value;
use std::future::Future;
use tokio::time::{sleep, Duration, Instant};

const STATUS_COMPLETED: &str = "completed";
const STATUS_ERRORED: &str = "errored";

/// A submitted asynchronous operation, as last observed on the backend.
///
/// Mutated only by re-fetching; never updated locally.
#[derive(Debug, Clone)]
pub struct ActionHandle {
    pub id: u64,
    /// Backend-defined open status string; `completed` and `errored` are terminal.
    pub status: String,
    pub resource_id: Option<u64>,
    pub resource_type: Option<String>,
    /// The full action record as returned by the API.
    pub raw: Value,
}

impl ActionHandle {
    /// Build a handle from an action record (the object under the `action` key).
    pub fn from_record(record: &Value) -> Result<Self, ErrorShape> {
        let id = record
            .get("id")
            .and_then(|v| v.as_u64())
            .ok_or_else(|| ErrorShape::malformed("action record has no numeric id"))?;

        let status = record
            .get("status")
            .and_then(|v| v.as_str())
            .unwrap_or("in-progress")
            .to_string();

        Ok(Self {
            id,
            status,
            resource_id: record.get("resource_id").and_then(|v| v.as_u64()),
            resource_type: record
                .get("resource_type")
                .and_then(|v| v.as_str())
                .map(str::to_string),
            raw: record.clone(),
        })
    }

    /// Handle for an action known only by id (e.g. from a create response's
    /// `links.actions` entry), not yet observed.
    pub fn pending(id: u64) -> Self {
        Self {
            id,
            status: "in-progress".to_string(),
            resource_id: None,
            resource_type: None,
            raw: Value::Null,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status == STATUS_COMPLETED || self.status == STATUS_ERRORED
    }
}

/// How a polling wait ended.
#[derive(Debug, Clone)]
pub enum PollOutcome {
    /// Action reached `completed`.
    Completed(ActionHandle),
    /// Action reached `errored`. Not an exceptional condition here: the call
    /// site decides whether this is a hard failure.
    Errored(ActionHandle),
    /// Deadline elapsed with the action still non-terminal. The mutation was
    /// accepted by the backend; only confirmation is missing. Callers must
    /// report this as changed-but-unconfirmed, never as "nothing happened".
    TimedOut(ActionHandle),
}

/// Poll `refetch` at a fixed `interval` until the action is terminal or
/// `timeout` has elapsed.
///
/// The deadline is computed once at entry from a monotonic clock and
/// re-checked before each additional wait. Each tick performs exactly one
/// network read. An already-terminal `initial` status returns without any
/// re-fetch.
pub async fn await_terminal<F, Fut>(
    mut refetch: F,
    initial: ActionHandle,
    timeout: Duration,
    interval: Duration,
) -> Result<PollOutcome, ErrorShape>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<ActionHandle, ErrorShape>>,
{
    if let Some(outcome) = classify(&initial) {
        return Ok(outcome);
    }

    let deadline = Instant::now() + timeout;
    let mut handle = initial;

    while Instant::now() < deadline {
        sleep(interval).await;
        handle = refetch().await?;
        tracing::debug!("action {} status: {}", handle.id, handle.status);

        if let Some(outcome) = classify(&handle) {
            return Ok(outcome);
        }
    }

    tracing::warn!(
        "action {} still {:?} at deadline, abandoning poll",
        handle.id,
        handle.status
    );
    Ok(PollOutcome::TimedOut(handle))
}

fn classify(handle: &ActionHandle) -> Option<PollOutcome> {
    match handle.status.as_str() {
        STATUS_COMPLETED => Some(PollOutcome::Completed(handle.clone())),
        STATUS_ERRORED => Some(PollOutcome::Errored(handle.clone())),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::cell::RefCell;

    fn handle(status: &str) -> ActionHandle {
        ActionHandle::from_record(&json!({
            "id": 36804636,
            "status": status,
            "resource_id": 3164444,
            "resource_type": "droplet",
        }))
        .unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn terminal_detection_with_exact_refetch_count() {
        let script = RefCell::new(vec!["completed", "in-progress"]);
        let fetches = RefCell::new(0u32);

        let outcome = await_terminal(
            || {
                *fetches.borrow_mut() += 1;
                let status = script.borrow_mut().pop().unwrap();
                async move { Ok(handle(status)) }
            },
            handle("in-progress"),
            Duration::from_secs(60),
            Duration::from_secs(10),
        )
        .await
        .unwrap();

        assert!(matches!(outcome, PollOutcome::Completed(_)));
        assert_eq!(*fetches.borrow(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn already_terminal_initial_status_skips_polling() {
        let fetches = RefCell::new(0u32);
        let outcome = await_terminal(
            || {
                *fetches.borrow_mut() += 1;
                async move { Ok(handle("in-progress")) }
            },
            handle("errored"),
            Duration::from_secs(60),
            Duration::from_secs(10),
        )
        .await
        .unwrap();

        assert!(matches!(outcome, PollOutcome::Errored(_)));
        assert_eq!(*fetches.borrow(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_elapses_with_non_terminal_status() {
        let outcome = await_terminal(
            || async move { Ok(handle("in-progress")) },
            handle("in-progress"),
            Duration::from_secs(25),
            Duration::from_secs(10),
        )
        .await
        .unwrap();

        match outcome {
            PollOutcome::TimedOut(h) => assert_eq!(h.status, "in-progress"),
            other => panic!("expected timeout, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn refetch_failure_propagates() {
        let result = await_terminal(
            || async move { Err(ErrorShape::from_response(500, "")) },
            handle("in-progress"),
            Duration::from_secs(60),
            Duration::from_secs(10),
        )
        .await;

        assert_eq!(result.unwrap_err().status_code, 500);
    }

    #[test]
    fn record_without_id_is_malformed() {
        let err = ActionHandle::from_record(&json!({"status": "in-progress"})).unwrap_err();
        assert_eq!(err.reason, "malformed response");
    }
}
