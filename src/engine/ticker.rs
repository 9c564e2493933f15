// Clock driver: one interval task per riding rental, feeding ticks into the coordinator.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::coordinator::SessionCoordinator;
use super::snapshot::SessionSnapshot;

struct ActiveTimer {
    rental_id: u64,
    token: CancellationToken,
}

pub struct ClockDriver {
    shutdown_token: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl ClockDriver {
    /// Start watching `coordinator` and ticking every `period` while a
    /// rental is riding. Must be called inside a tokio runtime.
    pub fn spawn(coordinator: Arc<SessionCoordinator>, period: Duration) -> Self {
        let shutdown_token = CancellationToken::new();
        let handle = tokio::spawn(Self::supervise(
            coordinator,
            period,
            shutdown_token.clone(),
        ));
        Self {
            shutdown_token,
            handle: Some(handle),
        }
    }

    /// Stop the driver and any running timer, waiting for the supervisor to exit.
    pub async fn shutdown(mut self) {
        self.shutdown_token.cancel();
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }

    async fn supervise(
        coordinator: Arc<SessionCoordinator>,
        period: Duration,
        shutdown_token: CancellationToken,
    ) {
        let mut snapshots = coordinator.subscribe();
        let mut active: Option<ActiveTimer> = None;

        loop {
            let snapshot = snapshots.borrow_and_update().clone();
            Self::reconcile(&coordinator, &snapshot, &mut active, period, &shutdown_token);

            tokio::select! {
                changed = snapshots.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                _ = shutdown_token.cancelled() => break,
            }
        }

        if let Some(timer) = active.take() {
            timer.token.cancel();
        }
        debug!("clock driver stopped");
    }

    /// Make the running timer match the snapshot: start one when a rental
    /// enters `InRide`, keep it through `Ending`, stop it otherwise.
    fn reconcile(
        coordinator: &Arc<SessionCoordinator>,
        snapshot: &SessionSnapshot,
        active: &mut Option<ActiveTimer>,
        period: Duration,
        shutdown_token: &CancellationToken,
    ) {
        let wanted = snapshot
            .rental_id
            .filter(|_| snapshot.rental_state.holds_clock());

        if let Some(timer) = active.as_ref() {
            if wanted == Some(timer.rental_id) {
                return;
            }
        }
        if let Some(timer) = active.take() {
            debug!("stopping clock for rental {}", timer.rental_id);
            timer.token.cancel();
        }

        if let Some(rental_id) = wanted {
            debug!("starting clock for rental {}", rental_id);
            let token = shutdown_token.child_token();
            tokio::spawn(Self::run_timer(
                Arc::clone(coordinator),
                rental_id,
                period,
                token.clone(),
            ));
            *active = Some(ActiveTimer { rental_id, token });
        }
    }

    async fn run_timer(
        coordinator: Arc<SessionCoordinator>,
        rental_id: u64,
        period: Duration,
        token: CancellationToken,
    ) {
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if coordinator.tick_rental(rental_id).is_none() {
                        break;
                    }
                }
                _ = token.cancelled() => break,
            }
        }
    }
}

impl Drop for ClockDriver {
    fn drop(&mut self) {
        self.shutdown_token.cancel();
    }
}
