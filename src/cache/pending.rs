//! In-flight request records and their waiters.
//!
//! A record owns the producing side of a `watch` channel holding
//! `Option<Outcome>`. Receivers attached before or after resolution both
//! observe the single value written on resolution.

use super::entry::CacheEntry;
use crate::types::FetchResponse;
use crate::{Error, ErrorContext, Result};
use tokio::sync::watch;
use tokio::task::AbortHandle;

/// Result delivered to every caller attached to one in-flight request.
pub type Outcome = Result<FetchResponse>;

/// Handle on the eventual outcome of an in-flight request.
#[derive(Debug, Clone)]
pub struct Waiter {
    key: String,
    rx: watch::Receiver<Option<Outcome>>,
}

impl Waiter {
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn is_resolved(&self) -> bool {
        self.rx.borrow().is_some()
    }

    /// Wait for the outcome. Dropping this future detaches only this caller.
    pub async fn wait(mut self) -> Outcome {
        let resolved = self
            .rx
            .wait_for(Option::is_some)
            .await
            .map(|slot| (*slot).clone());
        match resolved {
            Ok(Some(outcome)) => outcome,
            _ => Err(Error::runtime_with_context(
                "pending request was dropped before it resolved",
                ErrorContext::new()
                    .with_details(self.key)
                    .with_source("pending_request"),
            )),
        }
    }
}

/// Outcome of `register_pending`.
#[derive(Debug, Clone)]
pub enum Registration {
    /// A new record was created; the caller owns the network call.
    Leader(Waiter),
    /// A record already existed; the caller shares its outcome.
    Joined(Waiter),
    /// A fresh entry landed between the caller's lookup and registration.
    Cached(CacheEntry),
}

impl Registration {
    pub fn is_leader(&self) -> bool {
        matches!(self, Registration::Leader(_))
    }

    pub fn waiter(&self) -> Option<&Waiter> {
        match self {
            Registration::Leader(w) | Registration::Joined(w) => Some(w),
            Registration::Cached(_) => None,
        }
    }

    pub fn into_waiter(self) -> Option<Waiter> {
        match self {
            Registration::Leader(w) | Registration::Joined(w) => Some(w),
            Registration::Cached(_) => None,
        }
    }
}

pub(crate) struct PendingRequest {
    pub(crate) id: u64,
    key: String,
    tx: watch::Sender<Option<Outcome>>,
    timer: Option<AbortHandle>,
}

impl PendingRequest {
    pub(crate) fn new(key: String, id: u64) -> (Self, Waiter) {
        let (tx, rx) = watch::channel(None);
        let waiter = Waiter {
            key: key.clone(),
            rx,
        };
        (
            Self {
                id,
                key,
                tx,
                timer: None,
            },
            waiter,
        )
    }

    pub(crate) fn subscribe(&self) -> Waiter {
        Waiter {
            key: self.key.clone(),
            rx: self.tx.subscribe(),
        }
    }

    pub(crate) fn arm(&mut self, timer: AbortHandle) {
        self.timer = Some(timer);
    }

    /// Called from the timer task itself, which must not abort itself.
    pub(crate) fn disarm(&mut self) {
        self.timer = None;
    }

    /// Publish the outcome exactly once and cancel the timer.
    pub(crate) fn resolve(self, outcome: Outcome) {
        if let Some(timer) = &self.timer {
            timer.abort();
        }
        self.tx.send_if_modified(|slot| {
            if slot.is_some() {
                return false;
            }
            *slot = Some(outcome);
            true
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_late_subscriber_sees_resolution() {
        let (record, first) = PendingRequest::new("GET /a @anonymous".into(), 1);
        let second = record.subscribe();
        assert!(!first.is_resolved());

        record.resolve(Ok(FetchResponse::ok(json!({"n": 1}))));

        // Both attached before resolution; the record itself is gone.
        let a = first.wait().await.unwrap();
        let b = second.wait().await.unwrap();
        assert_eq!(a, b);
        assert_eq!(a.body, json!({"n": 1}));
    }

    #[tokio::test]
    async fn test_waiters_pending_until_resolved() {
        let (record, waiter) = PendingRequest::new("k".into(), 1);
        let mut task = tokio_test::task::spawn(waiter.clone().wait());
        tokio_test::assert_pending!(task.poll());

        record.resolve(Err(Error::Remote {
            status: 500,
            class: "server_error".into(),
            message: "boom".into(),
            retryable: true,
        }));

        assert!(task.is_woken());
        let err = tokio_test::assert_ready!(task.poll()).unwrap_err();
        assert_eq!(err.status(), Some(500));
        assert!(waiter.is_resolved());
    }

    #[tokio::test]
    async fn test_dropped_record_without_outcome_errors() {
        let (record, waiter) = PendingRequest::new("k".into(), 1);
        drop(record);
        let err = waiter.wait().await.unwrap_err();
        assert!(matches!(err, Error::Runtime { .. }));
    }
}
