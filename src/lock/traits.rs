use anyhow::Result;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WheelLockState {
    Locked,
    Unlocked,
}

/// Bike-side lock hardware. Every call is a single attempt; the engine does
/// not retry.
pub trait LockController: Send + Sync {
    fn unlock_chain(&self, bike_id: &str) -> Result<()>;
    fn unlock_wheel(&self, bike_id: &str) -> Result<()>;
    fn toggle_wheel_lock(&self, bike_id: &str) -> Result<WheelLockState>;
    /// Whether the chain is physically secured to the bike's slot.
    fn verify_chain_secured_to_slot(&self, bike_id: &str) -> Result<bool>;
}
