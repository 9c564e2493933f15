// Rental state machine: the legal transition table.
//
// The machine only knows about states. Rider inputs (checklist flags, the
// chain confirmation) and hardware results are checked by the coordinator
// before it asks for a transition.

use super::error::RentalError;
use super::rental::RentalState;

/// Events that move a rental through its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    Begin,
    CompleteChecklist,
    UnlockChain,
    ConfirmChainSecured,
    UnlockWheel,
    StartRide,
    AttemptEnd,
    FinalizeVerified,
    FinalizeUnverified,
    Cancel,
}

impl Trigger {
    fn operation(self) -> &'static str {
        match self {
            Trigger::Begin => "begin a rental",
            Trigger::CompleteChecklist => "complete the checklist",
            Trigger::UnlockChain => "unlock the chain",
            Trigger::ConfirmChainSecured => "confirm the chain is stowed",
            Trigger::UnlockWheel => "unlock the wheel",
            Trigger::StartRide => "start the ride",
            Trigger::AttemptEnd => "end the ride",
            Trigger::FinalizeVerified | Trigger::FinalizeUnverified => "finalize the ride",
            Trigger::Cancel => "cancel",
        }
    }
}

pub struct RentalStateMachine;

impl RentalStateMachine {
    /// Target state for `trigger` fired from `from`, if the transition exists.
    pub fn next(from: RentalState, trigger: Trigger) -> Option<RentalState> {
        use RentalState::*;
        let to = match (from, trigger) {
            (Idle, Trigger::Begin) => Assigned,
            (Assigned, Trigger::CompleteChecklist) => ChecklistComplete,
            (ChecklistComplete, Trigger::UnlockChain) => ChainUnlocked,
            (ChainUnlocked, Trigger::ConfirmChainSecured) => ChainSecuredConfirmed,
            (ChainSecuredConfirmed, Trigger::UnlockWheel) => WheelUnlocked,
            (WheelUnlocked, Trigger::StartRide) => InRide,
            (InRide, Trigger::AttemptEnd) => Ending,
            (Ending, Trigger::FinalizeVerified) => Completed,
            (Ending, Trigger::FinalizeUnverified) => InRide,
            (state, Trigger::Cancel) if state.is_cancelable() => Idle,
            _ => return None,
        };
        Some(to)
    }

    /// Like [`RentalStateMachine::next`], but reports the rejection.
    pub fn transition(from: RentalState, trigger: Trigger) -> Result<RentalState, RentalError> {
        Self::next(from, trigger).ok_or_else(|| Self::rejection(from, trigger))
    }

    /// True for forward moves along the progression and the single
    /// `Ending -> InRide` rollback.
    pub fn is_permitted_move(from: RentalState, to: RentalState) -> bool {
        to > from || (from == RentalState::Ending && to == RentalState::InRide)
    }

    fn rejection(from: RentalState, trigger: Trigger) -> RentalError {
        match (from, trigger) {
            (_, Trigger::Begin) => RentalError::AlreadyHasRental,
            (RentalState::Idle, _) => RentalError::NoActiveRental,
            (RentalState::InRide | RentalState::Ending, Trigger::Cancel) => {
                RentalError::CannotCancelWhileRiding
            }
            _ => RentalError::NotReady {
                operation: trigger.operation(),
                state: from,
            },
        }
    }
}
