// Fleet registry: bike availability and battery levels.

use std::collections::BTreeMap;

use serde::Serialize;

use super::error::RentalError;
use crate::config::BikeSeed;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Bike {
    pub id: String,
    pub available: bool,
    pub battery_percent: u8,
    pub condition_note: String,
}

impl From<&BikeSeed> for Bike {
    fn from(seed: &BikeSeed) -> Self {
        Self {
            id: seed.id.clone(),
            available: true,
            battery_percent: seed.battery_percent.min(100),
            condition_note: seed.condition_note.clone(),
        }
    }
}

/// Single source of truth for which bikes can be assigned.
///
/// Bikes are keyed by id in a `BTreeMap` so iteration order, and with it
/// tie-breaking in [`FleetRegistry::best_available`], is deterministic.
#[derive(Debug, Clone, Default)]
pub struct FleetRegistry {
    bikes: BTreeMap<String, Bike>,
}

impl FleetRegistry {
    pub fn new(seeds: &[BikeSeed]) -> Self {
        let bikes = seeds
            .iter()
            .map(|seed| (seed.id.clone(), Bike::from(seed)))
            .collect();
        Self { bikes }
    }

    /// All bikes with `available == true`, in id order.
    pub fn list_available(&self) -> Vec<Bike> {
        self.bikes.values().filter(|b| b.available).cloned().collect()
    }

    pub fn available_count(&self) -> usize {
        self.bikes.values().filter(|b| b.available).count()
    }

    /// Available bike with the highest battery, skipping `excluding`.
    /// Ties go to the lowest id.
    pub fn best_available(&self, excluding: Option<&str>) -> Option<&Bike> {
        self.bikes
            .values()
            .filter(|b| b.available && Some(b.id.as_str()) != excluding)
            // max_by_key keeps the last maximum; reverse so the lowest id wins.
            .rev()
            .max_by_key(|b| b.battery_percent)
    }

    /// Idempotent availability toggle.
    pub fn set_availability(&mut self, bike_id: &str, available: bool) -> Result<(), RentalError> {
        let bike = self.get_mut(bike_id)?;
        bike.available = available;
        Ok(())
    }

    pub fn set_condition_note(&mut self, bike_id: &str, note: &str) -> Result<(), RentalError> {
        let bike = self.get_mut(bike_id)?;
        bike.condition_note = note.to_string();
        Ok(())
    }

    pub fn get(&self, bike_id: &str) -> Option<&Bike> {
        self.bikes.get(bike_id)
    }

    pub fn bikes(&self) -> impl Iterator<Item = &Bike> {
        self.bikes.values()
    }

    pub fn len(&self) -> usize {
        self.bikes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bikes.is_empty()
    }

    fn get_mut(&mut self, bike_id: &str) -> Result<&mut Bike, RentalError> {
        self.bikes
            .get_mut(bike_id)
            .ok_or_else(|| RentalError::BikeNotFound {
                bike_id: bike_id.to_string(),
            })
    }
}
