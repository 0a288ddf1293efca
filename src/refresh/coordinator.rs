use std::sync::{Arc, Mutex};

use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::errors::ApiRejection;

/// Settled result of a refresh attempt, delivered to every queued waiter.
#[derive(Clone, Debug)]
pub(crate) enum RefreshOutcome {
    /// New access token; each waiter re-issues its own request with it.
    Token(String),
    /// No usable refresh token; credentials were cleared.
    SessionExpired,
    /// The refresh call itself failed.
    Failed(ApiRejection),
}

#[derive(Default)]
struct FlightState {
    in_flight: bool,
    waiters: Vec<oneshot::Sender<RefreshOutcome>>,
}

/// Single-flight coordination for token refresh. At most one refresh call
/// runs at a time; 401s arriving mid-flight enqueue instead of issuing a
/// second refresh, and receive the settled outcome in insertion order.
///
/// State lives inside the instance so independent gateways never share
/// refresh state. The mutex is only held between await points, never
/// across one.
pub(crate) struct RefreshCoordinator {
    state: Mutex<FlightState>,
}

pub(crate) enum FlightRole {
    /// This caller runs the refresh and settles it for everyone.
    Leader(FlightGuard),
    /// A refresh is already in flight; await its outcome.
    Waiter(oneshot::Receiver<RefreshOutcome>),
}

impl RefreshCoordinator {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(FlightState::default()),
        }
    }

    /// Joins the current flight as a waiter, or starts one as the leader.
    pub fn join(self: &Arc<Self>) -> FlightRole {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if state.in_flight {
            let (tx, rx) = oneshot::channel();
            state.waiters.push(tx);
            debug!(queued = state.waiters.len(), "refresh.flight.enqueued");
            FlightRole::Waiter(rx)
        } else {
            state.in_flight = true;
            FlightRole::Leader(FlightGuard {
                coordinator: Arc::clone(self),
                settled: false,
            })
        }
    }

    #[cfg(test)]
    pub fn in_flight(&self) -> bool {
        self.state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .in_flight
    }

    fn release(&self, outcome: RefreshOutcome) {
        let waiters = {
            let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
            state.in_flight = false;
            std::mem::take(&mut state.waiters)
        };
        for waiter in waiters {
            // A dropped receiver means that caller is gone; nothing to do.
            let _ = waiter.send(outcome.clone());
        }
    }
}

/// Holds the in-flight flag for the leader. The flag is released on every
/// exit path: `settle` on the normal ones, `Drop` if the leader future is
/// dropped mid-refresh, so the flag can never stay set after a flight.
pub(crate) struct FlightGuard {
    coordinator: Arc<RefreshCoordinator>,
    settled: bool,
}

impl FlightGuard {
    pub fn settle(mut self, outcome: RefreshOutcome) {
        self.settled = true;
        self.coordinator.release(outcome);
    }
}

impl Drop for FlightGuard {
    fn drop(&mut self) {
        if !self.settled {
            warn!("refresh leader dropped before settling; releasing flight");
            self.coordinator.release(RefreshOutcome::Failed(ApiRejection {
                status: 0,
                message: "token refresh aborted".to_string(),
                data: serde_json::Value::Null,
            }));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn second_caller_becomes_waiter() {
        let coordinator = Arc::new(RefreshCoordinator::new());
        let FlightRole::Leader(guard) = coordinator.join() else {
            panic!("first caller should lead");
        };
        let FlightRole::Waiter(rx) = coordinator.join() else {
            panic!("second caller should wait");
        };
        guard.settle(RefreshOutcome::Token("fresh".to_string()));
        match rx.await.expect("outcome delivered") {
            RefreshOutcome::Token(token) => assert_eq!(token, "fresh"),
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert!(!coordinator.in_flight());
    }

    #[tokio::test]
    async fn waiters_resolve_in_insertion_order() {
        let coordinator = Arc::new(RefreshCoordinator::new());
        let FlightRole::Leader(guard) = coordinator.join() else {
            panic!("first caller should lead");
        };
        let receivers: Vec<_> = (0..3)
            .map(|_| match coordinator.join() {
                FlightRole::Waiter(rx) => rx,
                FlightRole::Leader(_) => panic!("refresh already in flight"),
            })
            .collect();
        guard.settle(RefreshOutcome::SessionExpired);
        for rx in receivers {
            assert!(matches!(
                rx.await.expect("outcome delivered"),
                RefreshOutcome::SessionExpired
            ));
        }
    }

    #[tokio::test]
    async fn dropped_leader_releases_flight_and_rejects_waiters() {
        let coordinator = Arc::new(RefreshCoordinator::new());
        let FlightRole::Leader(guard) = coordinator.join() else {
            panic!("first caller should lead");
        };
        let FlightRole::Waiter(rx) = coordinator.join() else {
            panic!("second caller should wait");
        };
        drop(guard);
        match rx.await.expect("outcome delivered") {
            RefreshOutcome::Failed(rejection) => {
                assert_eq!(rejection.status, 0);
                assert!(rejection.message.contains("aborted"));
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
        // A new 401 can lead again.
        assert!(matches!(coordinator.join(), FlightRole::Leader(_)));
    }
}
