// Read-only views published to the presentation layer.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::fleet::FleetRegistry;
use super::rental::{Rental, RentalState, RentalType};

/// Session state after an operation or clock tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionSnapshot {
    pub rental_id: Option<u64>,
    pub rental_state: RentalState,
    pub rental_type: Option<RentalType>,
    pub bike_id: Option<String>,
    pub remaining_seconds: u64,
    pub due_at: Option<DateTime<Utc>>,
    pub expired: bool,
    pub available_bike_count: usize,
}

impl SessionSnapshot {
    pub(crate) fn capture(rental: Option<&Rental>, fleet: &FleetRegistry) -> Self {
        let available_bike_count = fleet.available_count();
        match rental {
            Some(r) => Self {
                rental_id: Some(r.id),
                rental_state: r.state,
                rental_type: Some(r.rental_type),
                bike_id: Some(r.bike_id.clone()),
                remaining_seconds: r.remaining_seconds(),
                due_at: Some(r.due),
                expired: r.has_expired(),
                available_bike_count,
            },
            None => Self::idle(available_bike_count),
        }
    }

    pub fn idle(available_bike_count: usize) -> Self {
        Self {
            rental_id: None,
            rental_state: RentalState::Idle,
            rental_type: None,
            bike_id: None,
            remaining_seconds: 0,
            due_at: None,
            expired: false,
            available_bike_count,
        }
    }

    pub fn has_rental(&self) -> bool {
        self.rental_id.is_some()
    }
}

/// Summary handed back when a ride ends with a verified chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RideReceipt {
    pub rental_id: u64,
    pub bike_id: String,
    pub rental_type: RentalType,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub allotted_seconds: u64,
    pub ridden_seconds: u64,
    pub overdue: bool,
}

impl RideReceipt {
    pub(crate) fn from_rental(rental: &Rental, ended_at: DateTime<Utc>) -> Self {
        Self {
            rental_id: rental.id,
            bike_id: rental.bike_id.clone(),
            rental_type: rental.rental_type,
            started_at: rental.start,
            ended_at,
            allotted_seconds: rental.allotted_seconds(),
            ridden_seconds: rental.clock.elapsed(),
            overdue: rental.has_expired(),
        }
    }
}
