// Rental engine error types.

use std::fmt;

use serde::Serialize;
use thiserror::Error;

use super::rental::RentalState;

/// Hardware action that the lock controller failed to perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockAction {
    UnlockChain,
    UnlockWheel,
    ToggleWheelLock,
    VerifyChainSecured,
}

impl fmt::Display for LockAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LockAction::UnlockChain => "unlock chain",
            LockAction::UnlockWheel => "unlock wheel",
            LockAction::ToggleWheelLock => "toggle wheel lock",
            LockAction::VerifyChainSecured => "verify chain secured",
        };
        f.write_str(name)
    }
}

/// Coarse classification of a [`RentalError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Wrong state or missing rider input for the requested operation.
    Precondition,
    /// No bike (or no alternate bike) left to assign.
    ResourceExhausted,
    /// End of ride attempted without a verified chain placement.
    VerificationFailed,
    /// A referenced bike is not part of the fleet.
    NotFound,
    /// The lock controller reported a failure.
    External,
    /// Engine configuration is unusable.
    Configuration,
}

/// Errors returned by rental operations. None of them leave the engine
/// partially updated.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum RentalError {
    #[error("rider is not eligible to rent")]
    RiderNotEligible,

    #[error("rider already has an active rental")]
    AlreadyHasRental,

    #[error("no active rental")]
    NoActiveRental,

    #[error("no bikes available")]
    NoBikesAvailable,

    #[error("no alternate bikes available")]
    NoAlternateBikes,

    #[error("safety checklist incomplete: missing {}", .missing.join(", "))]
    ChecklistIncomplete {
        /// Names of the checks that were not confirmed.
        missing: Vec<&'static str>,
    },

    #[error("cannot {operation} while rental is {state}")]
    NotReady {
        operation: &'static str,
        state: RentalState,
    },

    #[error("rider did not confirm the chain is stowed")]
    ChainNotConfirmed,

    #[error("cannot cancel a rental while riding")]
    CannotCancelWhileRiding,

    #[error("chain not verified as secured to the slot; ride continues")]
    NotVerified,

    #[error("bike not found: {bike_id}")]
    BikeNotFound { bike_id: String },

    #[error("lock controller failed to {action}: {reason}")]
    LockController { action: LockAction, reason: String },

    #[error("invalid engine config: {reason}")]
    InvalidConfig { reason: String },
}

impl RentalError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RentalError::RiderNotEligible
            | RentalError::AlreadyHasRental
            | RentalError::NoActiveRental
            | RentalError::ChecklistIncomplete { .. }
            | RentalError::NotReady { .. }
            | RentalError::ChainNotConfirmed
            | RentalError::CannotCancelWhileRiding => ErrorKind::Precondition,
            RentalError::NoBikesAvailable | RentalError::NoAlternateBikes => {
                ErrorKind::ResourceExhausted
            }
            RentalError::NotVerified => ErrorKind::VerificationFailed,
            RentalError::BikeNotFound { .. } => ErrorKind::NotFound,
            RentalError::LockController { .. } => ErrorKind::External,
            RentalError::InvalidConfig { .. } => ErrorKind::Configuration,
        }
    }

    pub(crate) fn lock(action: LockAction, err: anyhow::Error) -> Self {
        RentalError::LockController {
            action,
            reason: format!("{:#}", err),
        }
    }
}
