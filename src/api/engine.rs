// Host-facing handle: owns the coordinator, its clock driver, and the event stream.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::sync::mpsc;

use crate::config::EngineConfig;
use crate::engine::coordinator::SessionCoordinator;
use crate::engine::events::{ChannelSink, FanoutSink, LogSink, NotificationSink, RideEvent};
use crate::engine::snapshot::SessionSnapshot;
use crate::engine::ticker::ClockDriver;
use crate::lock::traits::LockController;

pub struct RideEngine {
    coordinator: Arc<SessionCoordinator>,
    driver: ClockDriver,
    events: mpsc::UnboundedReceiver<RideEvent>,
}

impl RideEngine {
    /// Build the coordinator and start ticking. Events go both to the log
    /// and to [`RideEngine::next_event`].
    pub fn start(config: EngineConfig, lock: Arc<dyn LockController>) -> Result<Self> {
        let (channel, events) = ChannelSink::new();
        let sink: Arc<dyn NotificationSink> =
            Arc::new(FanoutSink::new(vec![Box::new(channel), Box::new(LogSink)]));
        let period = Duration::from_millis(config.tick_interval_ms);
        let coordinator = Arc::new(SessionCoordinator::new(config, lock, sink)?);
        let driver = ClockDriver::spawn(Arc::clone(&coordinator), period);
        Ok(Self {
            coordinator,
            driver,
            events,
        })
    }

    pub fn coordinator(&self) -> Arc<SessionCoordinator> {
        Arc::clone(&self.coordinator)
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.coordinator.snapshot()
    }

    /// Next notification, or `None` once the engine is gone.
    pub async fn next_event(&mut self) -> Option<RideEvent> {
        self.events.recv().await
    }

    /// Non-blocking variant of [`RideEngine::next_event`].
    pub fn try_next_event(&mut self) -> Option<RideEvent> {
        self.events.try_recv().ok()
    }

    /// Stop the clock driver and release the engine.
    pub async fn dispose(self) {
        self.driver.shutdown().await;
    }
}
