// In-memory lock controller used by the binary and tests in place of real hardware.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use anyhow::{anyhow, Result};
use parking_lot::Mutex;
use tracing::debug;

use super::traits::{LockController, WheelLockState};

pub struct MockLockController {
    chain_secured: AtomicBool,
    fail_next: Mutex<Option<String>>,
    wheel_locks: Mutex<HashMap<String, WheelLockState>>,
    calls: AtomicU32,
}

impl MockLockController {
    /// `chain_secured` is the answer `verify_chain_secured_to_slot` gives.
    pub fn new(chain_secured: bool) -> Self {
        Self {
            chain_secured: AtomicBool::new(chain_secured),
            fail_next: Mutex::new(None),
            wheel_locks: Mutex::new(HashMap::new()),
            calls: AtomicU32::new(0),
        }
    }

    pub fn set_chain_secured(&self, secured: bool) {
        self.chain_secured.store(secured, Ordering::Relaxed);
    }

    /// Make the next hardware call fail with `reason`.
    pub fn fail_next_call(&self, reason: &str) {
        *self.fail_next.lock() = Some(reason.to_string());
    }

    pub fn call_count(&self) -> u32 {
        self.calls.load(Ordering::Relaxed)
    }

    pub fn wheel_lock_state(&self, bike_id: &str) -> WheelLockState {
        self.wheel_locks
            .lock()
            .get(bike_id)
            .copied()
            .unwrap_or(WheelLockState::Locked)
    }

    fn enter(&self, action: &str, bike_id: &str) -> Result<()> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        debug!("mock lock: {} on {}", action, bike_id);
        match self.fail_next.lock().take() {
            Some(reason) => Err(anyhow!("{}", reason)),
            None => Ok(()),
        }
    }
}

impl Default for MockLockController {
    fn default() -> Self {
        Self::new(true)
    }
}

impl LockController for MockLockController {
    fn unlock_chain(&self, bike_id: &str) -> Result<()> {
        self.enter("unlock_chain", bike_id)
    }

    fn unlock_wheel(&self, bike_id: &str) -> Result<()> {
        self.enter("unlock_wheel", bike_id)?;
        self.wheel_locks
            .lock()
            .insert(bike_id.to_string(), WheelLockState::Unlocked);
        Ok(())
    }

    fn toggle_wheel_lock(&self, bike_id: &str) -> Result<WheelLockState> {
        self.enter("toggle_wheel_lock", bike_id)?;
        let mut locks = self.wheel_locks.lock();
        let state = locks
            .entry(bike_id.to_string())
            .or_insert(WheelLockState::Locked);
        *state = match *state {
            WheelLockState::Locked => WheelLockState::Unlocked,
            WheelLockState::Unlocked => WheelLockState::Locked,
        };
        Ok(*state)
    }

    fn verify_chain_secured_to_slot(&self, bike_id: &str) -> Result<bool> {
        self.enter("verify_chain_secured_to_slot", bike_id)?;
        Ok(self.chain_secured.load(Ordering::Relaxed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_toggle_flips_state() {
        let lock = MockLockController::default();
        assert_eq!(lock.wheel_lock_state("B"), WheelLockState::Locked);
        lock.unlock_wheel("B").unwrap();
        assert_eq!(lock.toggle_wheel_lock("B").unwrap(), WheelLockState::Locked);
        assert_eq!(lock.toggle_wheel_lock("B").unwrap(), WheelLockState::Unlocked);
        assert_eq!(lock.call_count(), 3);
    }

    #[test]
    fn test_fail_next_call_is_one_shot() {
        let lock = MockLockController::new(false);
        lock.fail_next_call("no signal");
        let err = lock.unlock_chain("B").unwrap_err();
        assert_eq!(err.to_string(), "no signal");
        lock.unlock_chain("B").unwrap();
        assert!(!lock.verify_chain_secured_to_slot("B").unwrap());
        lock.set_chain_secured(true);
        assert!(lock.verify_chain_secured_to_slot("B").unwrap());
    }
}
