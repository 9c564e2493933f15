// Session coordinator: the only writer of fleet availability and rental state.
//
// Every operation takes the session lock, validates against the state machine
// and the fleet, performs any lock-controller call, and only then commits.
// A rejected operation leaves both the fleet and the rental untouched.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{Duration, Utc};
use parking_lot::{Mutex, MutexGuard};
use tokio::sync::watch;

use super::clock::{ClockSignal, TickOutcome};
use super::error::{LockAction, RentalError};
use super::events::{NotificationSink, RideEvent};
use super::fleet::{Bike, FleetRegistry};
use super::machine::{RentalStateMachine, Trigger};
use super::rental::{Rental, RentalState, RentalType, SafetyChecklist};
use super::snapshot::{RideReceipt, SessionSnapshot};
use super::stats::{StatsCollector, StatsSnapshot};
use crate::config::EngineConfig;
use crate::lock::traits::{LockController, WheelLockState};

struct SessionState {
    fleet: FleetRegistry,
    rental: Option<Rental>,
    rider_eligible: bool,
}

impl SessionState {
    fn current_state(&self) -> RentalState {
        self.rental
            .as_ref()
            .map_or(RentalState::Idle, |rental| rental.state)
    }

    /// Check `trigger` against the current state without changing anything.
    fn check(&self, trigger: Trigger) -> Result<RentalState, RentalError> {
        RentalStateMachine::transition(self.current_state(), trigger)
    }

    fn rental(&self) -> Result<&Rental, RentalError> {
        self.rental.as_ref().ok_or(RentalError::NoActiveRental)
    }

    fn rental_mut(&mut self) -> Result<&mut Rental, RentalError> {
        self.rental.as_mut().ok_or(RentalError::NoActiveRental)
    }

    fn bike_id(&self) -> Result<String, RentalError> {
        let bike_id = self.rental()?.bike_id.clone();
        if self.fleet.get(&bike_id).is_none() {
            return Err(RentalError::BikeNotFound { bike_id });
        }
        Ok(bike_id)
    }
}

pub struct SessionCoordinator {
    state: Mutex<SessionState>,
    config: EngineConfig,
    lock: Arc<dyn LockController>,
    sink: Arc<dyn NotificationSink>,
    stats: StatsCollector,
    snapshot_tx: watch::Sender<SessionSnapshot>,
    next_rental_id: AtomicU64,
}

impl SessionCoordinator {
    pub fn new(
        config: EngineConfig,
        lock: Arc<dyn LockController>,
        sink: Arc<dyn NotificationSink>,
    ) -> Result<Self, RentalError> {
        config.validate()?;
        let fleet = FleetRegistry::new(&config.fleet);
        let (snapshot_tx, _) = watch::channel(SessionSnapshot::capture(None, &fleet));
        Ok(Self {
            state: Mutex::new(SessionState {
                fleet,
                rental: None,
                rider_eligible: config.rider_eligible,
            }),
            config,
            lock,
            sink,
            stats: StatsCollector::new(),
            snapshot_tx,
            next_rental_id: AtomicU64::new(1),
        })
    }

    /// Assign the best available bike to a new rental.
    pub fn begin_rental(&self, rental_type: RentalType) -> Result<SessionSnapshot, RentalError> {
        let (snapshot, event) = {
            let mut state = self.state.lock();
            if !state.rider_eligible {
                return Err(RentalError::RiderNotEligible);
            }
            let next = state.check(Trigger::Begin)?;
            let bike_id = state
                .fleet
                .best_available(None)
                .map(|bike| bike.id.clone())
                .ok_or(RentalError::NoBikesAvailable)?;

            state.fleet.set_availability(&bike_id, false)?;
            let id = self.next_rental_id.fetch_add(1, Ordering::Relaxed);
            let mut rental = Rental::new(
                id,
                rental_type,
                bike_id.clone(),
                self.config.rental_duration(rental_type),
                self.config.expiry_warning_secs,
                Utc::now(),
            );
            rental.state = next;
            state.rental = Some(rental);

            let event = RideEvent::RentalStarted {
                rental_id: id,
                bike_id,
                rental_type,
            };
            (self.publish(&state), event)
        };
        self.stats.record_started();
        self.sink.notify(event);
        Ok(snapshot)
    }

    /// Swap the assigned bike for the next best one. Only allowed before the
    /// checklist is done. `reason` is recorded on the returned bike.
    pub fn request_different_bike(&self, reason: &str) -> Result<SessionSnapshot, RentalError> {
        let (snapshot, events) = {
            let mut state = self.state.lock();
            let current_state = state.current_state();
            match current_state {
                RentalState::Idle => return Err(RentalError::NoActiveRental),
                RentalState::Assigned => {}
                _ => {
                    return Err(RentalError::NotReady {
                        operation: "request a different bike",
                        state: current_state,
                    })
                }
            }
            let current = state.bike_id()?;
            let replacement = state
                .fleet
                .best_available(Some(&current))
                .map(|bike| bike.id.clone())
                .ok_or(RentalError::NoAlternateBikes)?;

            state.fleet.set_availability(&replacement, false)?;
            state.fleet.set_availability(&current, true)?;
            let reason = reason.trim();
            if !reason.is_empty() {
                state.fleet.set_condition_note(&current, reason)?;
            }
            let rental = state.rental_mut()?;
            rental.bike_id = replacement.clone();
            let rental_id = rental.id;

            let events = [
                RideEvent::AdminNotificationRequested {
                    bike_id: current.clone(),
                    reason: reason.to_string(),
                },
                RideEvent::BikeReassigned {
                    rental_id,
                    from: current,
                    to: replacement,
                },
            ];
            (self.publish(&state), events)
        };
        self.stats.record_reassigned();
        for event in events {
            self.sink.notify(event);
        }
        Ok(snapshot)
    }

    pub fn complete_checklist(
        &self,
        checklist: SafetyChecklist,
    ) -> Result<SessionSnapshot, RentalError> {
        let mut state = self.state.lock();
        let next = state.check(Trigger::CompleteChecklist)?;
        let missing = checklist.missing();
        if !missing.is_empty() {
            return Err(RentalError::ChecklistIncomplete { missing });
        }
        state.rental_mut()?.state = next;
        Ok(self.publish(&state))
    }

    pub fn unlock_chain(&self) -> Result<SessionSnapshot, RentalError> {
        let mut state = self.state.lock();
        let next = state.check(Trigger::UnlockChain)?;
        let bike_id = state.bike_id()?;
        self.lock
            .unlock_chain(&bike_id)
            .map_err(|e| RentalError::lock(LockAction::UnlockChain, e))?;
        state.rental_mut()?.state = next;
        Ok(self.publish(&state))
    }

    /// Rider confirms the unlocked chain is stowed on the bike.
    pub fn confirm_chain_secured(&self, confirmed: bool) -> Result<SessionSnapshot, RentalError> {
        let mut state = self.state.lock();
        let next = state.check(Trigger::ConfirmChainSecured)?;
        if !confirmed {
            return Err(RentalError::ChainNotConfirmed);
        }
        state.rental_mut()?.state = next;
        Ok(self.publish(&state))
    }

    /// Release the wheel and start the ride. `WheelUnlocked` is passed
    /// through under the same lock and never published.
    pub fn unlock_wheel(&self) -> Result<SessionSnapshot, RentalError> {
        let (snapshot, event) = {
            let mut state = self.state.lock();
            let wheel_unlocked = state.check(Trigger::UnlockWheel)?;
            // The wheel state is transient: the ride starts in the same commit.
            let riding = RentalStateMachine::transition(wheel_unlocked, Trigger::StartRide)?;
            let bike_id = state.bike_id()?;
            self.lock
                .unlock_wheel(&bike_id)
                .map_err(|e| RentalError::lock(LockAction::UnlockWheel, e))?;

            let rental = state.rental_mut()?;
            rental.state = riding;
            rental.due = Utc::now() + Duration::seconds(rental.remaining_seconds() as i64);
            let event = RideEvent::RideStarted {
                rental_id: rental.id,
                bike_id,
            };
            (self.publish(&state), event)
        };
        self.sink.notify(event);
        Ok(snapshot)
    }

    /// Lock or unlock the wheel for a stop mid-ride. Never changes state.
    pub fn toggle_wheel_lock(&self) -> Result<WheelLockState, RentalError> {
        let state = self.state.lock();
        let current = state.current_state();
        match current {
            RentalState::Idle => return Err(RentalError::NoActiveRental),
            RentalState::InRide | RentalState::Ending => {}
            _ => {
                return Err(RentalError::NotReady {
                    operation: "toggle the wheel lock",
                    state: current,
                })
            }
        }
        let bike_id = state.bike_id()?;
        self.lock
            .toggle_wheel_lock(&bike_id)
            .map_err(|e| RentalError::lock(LockAction::ToggleWheelLock, e))
    }

    pub fn attempt_end_ride(&self) -> Result<SessionSnapshot, RentalError> {
        let mut state = self.state.lock();
        let next = state.check(Trigger::AttemptEnd)?;
        let rental = state.rental_mut()?;
        rental.state = next;
        rental.chain_verified = false;
        Ok(self.publish(&state))
    }

    /// Finish the ride using the lock controller's chain verification.
    ///
    /// The verification call is made under the session lock, so its answer
    /// always applies to the `Ending` it was asked about. A failing call
    /// leaves the rental in `Ending`; a negative answer rolls it back to
    /// `InRide` and returns [`RentalError::NotVerified`].
    pub fn finalize_end_ride(&self) -> Result<RideReceipt, RentalError> {
        let state = self.state.lock();
        state.check(Trigger::FinalizeVerified)?;
        let bike_id = state.bike_id()?;
        let verified = self
            .lock
            .verify_chain_secured_to_slot(&bike_id)
            .map_err(|e| RentalError::lock(LockAction::VerifyChainSecured, e))?;
        self.finalize_locked(state, verified)
    }

    /// Finish the ride with an externally obtained verification result.
    pub fn finalize_end_ride_with(&self, verified: bool) -> Result<RideReceipt, RentalError> {
        self.finalize_locked(self.state.lock(), verified)
    }

    fn finalize_locked(
        &self,
        mut state: MutexGuard<'_, SessionState>,
        verified: bool,
    ) -> Result<RideReceipt, RentalError> {
        if !verified {
            let next = state.check(Trigger::FinalizeUnverified)?;
            let rental = state.rental_mut()?;
            rental.chain_verified = false;
            rental.state = next;
            let event = RideEvent::EndVerificationFailed {
                rental_id: rental.id,
                bike_id: rental.bike_id.clone(),
            };
            self.publish(&state);
            drop(state);
            self.stats.record_verification_failure();
            self.sink.notify(event);
            return Err(RentalError::NotVerified);
        }

        let next = state.check(Trigger::FinalizeVerified)?;
        let bike_id = state.bike_id()?;
        let rental = state.rental_mut()?;
        rental.chain_verified = true;
        rental.state = next;
        let receipt = RideReceipt::from_rental(rental, Utc::now());

        state.fleet.set_availability(&bike_id, true)?;
        state.rental = None;
        self.publish(&state);
        drop(state);

        self.stats.record_completed();
        self.sink.notify(RideEvent::RideCompleted {
            rental_id: receipt.rental_id,
            bike_id,
        });
        Ok(receipt)
    }

    /// Abandon a rental that has not started riding.
    pub fn cancel_rental(&self) -> Result<SessionSnapshot, RentalError> {
        let (snapshot, event) = {
            let mut state = self.state.lock();
            state.check(Trigger::Cancel)?;
            let bike_id = state.bike_id()?;
            let rental_id = state.rental()?.id;

            state.fleet.set_availability(&bike_id, true)?;
            state.rental = None;
            let event = RideEvent::RentalCanceled { rental_id, bike_id };
            (self.publish(&state), event)
        };
        self.stats.record_canceled();
        self.sink.notify(event);
        Ok(snapshot)
    }

    /// Advance the countdown by one second. A no-op unless the rental is
    /// `InRide`; returns `None` when there is no rental.
    pub fn on_clock_tick(&self) -> Option<TickOutcome> {
        self.tick_if(|_| true)
    }

    /// Like [`SessionCoordinator::on_clock_tick`], but only for the given
    /// rental. Stale timers for a finished rental are ignored.
    pub fn tick_rental(&self, rental_id: u64) -> Option<TickOutcome> {
        self.tick_if(|rental| rental.id == rental_id)
    }

    fn tick_if(&self, select: impl Fn(&Rental) -> bool) -> Option<TickOutcome> {
        let (outcome, event) = {
            let mut state = self.state.lock();
            let rental = state.rental.as_mut().filter(|rental| select(rental))?;
            let outcome = rental.clock.tick(rental.state.is_riding());
            let event = outcome.signal.map(|signal| match signal {
                ClockSignal::EndingSoon => RideEvent::RideEndingSoon {
                    rental_id: rental.id,
                    remaining_seconds: outcome.remaining_seconds,
                },
                ClockSignal::Expired => RideEvent::RideExpired {
                    rental_id: rental.id,
                    bike_id: rental.bike_id.clone(),
                },
            });
            self.publish(&state);
            (outcome, event)
        };
        if let Some(event) = event {
            if matches!(event, RideEvent::RideExpired { .. }) {
                self.stats.record_expired();
            }
            self.sink.notify(event);
        }
        Some(outcome)
    }

    pub fn set_rider_eligible(&self, eligible: bool) {
        self.state.lock().rider_eligible = eligible;
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshot_tx.borrow().clone()
    }

    /// Receiver that sees a new snapshot after every state change.
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshot_tx.subscribe()
    }

    pub fn rental(&self) -> Option<Rental> {
        self.state.lock().rental.clone()
    }

    pub fn list_available_bikes(&self) -> Vec<Bike> {
        self.state.lock().fleet.list_available()
    }

    pub fn bikes(&self) -> Vec<Bike> {
        self.state.lock().fleet.bikes().cloned().collect()
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Publish the current state. Called with the session lock held so
    /// subscribers observe snapshots in commit order.
    fn publish(&self, state: &SessionState) -> SessionSnapshot {
        let snapshot = SessionSnapshot::capture(state.rental.as_ref(), &state.fleet);
        self.snapshot_tx.send_if_modified(|current| {
            if *current == snapshot {
                false
            } else {
                *current = snapshot.clone();
                true
            }
        });
        snapshot
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::events::ChannelSink;
    use crate::lock::mock::MockLockController;

    fn coordinator(lock: Arc<MockLockController>) -> SessionCoordinator {
        let (sink, _rx) = ChannelSink::new();
        SessionCoordinator::new(EngineConfig::default(), lock, Arc::new(sink)).unwrap()
    }

    #[test]
    fn test_lock_failure_leaves_state_unchanged() {
        let lock = Arc::new(MockLockController::default());
        let coord = coordinator(lock.clone());
        coord.begin_rental(RentalType::Regular).unwrap();
        coord.complete_checklist(SafetyChecklist::all_checked()).unwrap();

        lock.fail_next_call("controller offline");
        let err = coord.unlock_chain().unwrap_err();
        assert!(matches!(
            err,
            RentalError::LockController {
                action: LockAction::UnlockChain,
                ..
            }
        ));
        assert_eq!(coord.snapshot().rental_state, RentalState::ChecklistComplete);

        coord.unlock_chain().unwrap();
        assert_eq!(coord.snapshot().rental_state, RentalState::ChainUnlocked);
    }

    #[test]
    fn test_wheel_unlocked_is_not_observable() {
        let lock = Arc::new(MockLockController::default());
        let coord = coordinator(lock);
        let mut rx = coord.subscribe();
        coord.begin_rental(RentalType::Regular).unwrap();
        coord.complete_checklist(SafetyChecklist::all_checked()).unwrap();
        coord.unlock_chain().unwrap();
        coord.confirm_chain_secured(true).unwrap();
        let _ = rx.borrow_and_update();

        let snap = coord.unlock_wheel().unwrap();
        assert_eq!(snap.rental_state, RentalState::InRide);
        assert_eq!(rx.borrow_and_update().rental_state, RentalState::InRide);
    }

    #[test]
    fn test_stale_tick_is_ignored() {
        let lock = Arc::new(MockLockController::default());
        let coord = coordinator(lock);
        let first = coord.begin_rental(RentalType::Regular).unwrap();
        coord.cancel_rental().unwrap();
        let second = coord.begin_rental(RentalType::Regular).unwrap();
        assert_ne!(first.rental_id, second.rental_id);
        assert!(coord.tick_rental(first.rental_id.unwrap()).is_none());
        assert!(coord.tick_rental(second.rental_id.unwrap()).is_some());
    }

    #[test]
    fn test_tick_without_rental() {
        let coord = coordinator(Arc::new(MockLockController::default()));
        assert!(coord.on_clock_tick().is_none());
    }

    #[test]
    fn test_toggle_wheel_lock_requires_ride() {
        let lock = Arc::new(MockLockController::default());
        let coord = coordinator(lock.clone());
        assert_eq!(coord.toggle_wheel_lock(), Err(RentalError::NoActiveRental));
        coord.begin_rental(RentalType::Regular).unwrap();
        assert!(matches!(
            coord.toggle_wheel_lock(),
            Err(RentalError::NotReady { .. })
        ));
        coord.complete_checklist(SafetyChecklist::all_checked()).unwrap();
        coord.unlock_chain().unwrap();
        coord.confirm_chain_secured(true).unwrap();
        coord.unlock_wheel().unwrap();

        assert_eq!(coord.toggle_wheel_lock(), Ok(WheelLockState::Locked));
        assert_eq!(coord.toggle_wheel_lock(), Ok(WheelLockState::Unlocked));
        assert_eq!(coord.snapshot().rental_state, RentalState::InRide);
    }
}
