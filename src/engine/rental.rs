// Rental entity: type, lifecycle state, and the rider's safety checklist.

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::clock::CountdownClock;
use crate::config::{COMMUTER_MAX_SECONDS, REGULAR_MAX_SECONDS};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RentalType {
    Commuter,
    Regular,
}

impl RentalType {
    pub const fn max_duration_secs(self) -> u64 {
        match self {
            RentalType::Commuter => COMMUTER_MAX_SECONDS,
            RentalType::Regular => REGULAR_MAX_SECONDS,
        }
    }
}

impl fmt::Display for RentalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RentalType::Commuter => f.write_str("commuter"),
            RentalType::Regular => f.write_str("regular"),
        }
    }
}

/// Rental lifecycle, in progression order. `Idle` means no rental exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RentalState {
    Idle,
    Assigned,
    ChecklistComplete,
    ChainUnlocked,
    ChainSecuredConfirmed,
    WheelUnlocked,
    InRide,
    Ending,
    Completed,
}

impl RentalState {
    /// The countdown only runs in this state.
    pub fn is_riding(self) -> bool {
        self == RentalState::InRide
    }

    /// States a rental may be canceled from.
    pub fn is_cancelable(self) -> bool {
        matches!(
            self,
            RentalState::Assigned
                | RentalState::ChecklistComplete
                | RentalState::ChainUnlocked
                | RentalState::ChainSecuredConfirmed
        )
    }

    /// States in which the per-rental timer must stay alive.
    pub fn holds_clock(self) -> bool {
        matches!(self, RentalState::InRide | RentalState::Ending)
    }
}

impl fmt::Display for RentalState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RentalState::Idle => "idle",
            RentalState::Assigned => "assigned",
            RentalState::ChecklistComplete => "checklist complete",
            RentalState::ChainUnlocked => "chain unlocked",
            RentalState::ChainSecuredConfirmed => "chain secured",
            RentalState::WheelUnlocked => "wheel unlocked",
            RentalState::InRide => "in ride",
            RentalState::Ending => "ending",
            RentalState::Completed => "completed",
        };
        f.write_str(name)
    }
}

/// Pre-ride checks the rider confirms before the chain is released.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SafetyChecklist {
    pub helmet_worn: bool,
    pub brakes_checked: bool,
    pub tires_checked: bool,
    pub lights_checked: bool,
}

impl SafetyChecklist {
    pub fn all_checked() -> Self {
        Self {
            helmet_worn: true,
            brakes_checked: true,
            tires_checked: true,
            lights_checked: true,
        }
    }

    /// Names of the unconfirmed checks; empty when the checklist passes.
    pub fn missing(&self) -> Vec<&'static str> {
        [
            (self.helmet_worn, "helmet"),
            (self.brakes_checked, "brakes"),
            (self.tires_checked, "tires"),
            (self.lights_checked, "lights"),
        ]
        .into_iter()
        .filter(|(ok, _)| !ok)
        .map(|(_, name)| name)
        .collect()
    }
}

#[derive(Debug, Clone)]
pub struct Rental {
    pub id: u64,
    pub rental_type: RentalType,
    pub bike_id: String,
    pub start: DateTime<Utc>,
    pub due: DateTime<Utc>,
    pub state: RentalState,
    pub chain_verified: bool,
    pub(crate) clock: CountdownClock,
}

impl Rental {
    pub fn new(
        id: u64,
        rental_type: RentalType,
        bike_id: String,
        allotted_secs: u64,
        warning_secs: u64,
        now: DateTime<Utc>,
    ) -> Self {
        let due = now + Duration::seconds(allotted_secs as i64);
        Self {
            id,
            rental_type,
            bike_id,
            start: now,
            due,
            state: RentalState::Assigned,
            chain_verified: false,
            clock: CountdownClock::new(allotted_secs, warning_secs),
        }
    }

    pub fn remaining_seconds(&self) -> u64 {
        self.clock.remaining()
    }

    pub fn allotted_seconds(&self) -> u64 {
        self.clock.allotted()
    }

    pub fn has_expired(&self) -> bool {
        self.clock.has_expired()
    }
}
