// Outbound notifications. Delivery is fire-and-forget from the engine's side.

use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{info, warn};

use super::rental::RentalType;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum RideEvent {
    RentalStarted {
        rental_id: u64,
        bike_id: String,
        rental_type: RentalType,
    },
    BikeReassigned {
        rental_id: u64,
        from: String,
        to: String,
    },
    AdminNotificationRequested {
        bike_id: String,
        reason: String,
    },
    RideStarted {
        rental_id: u64,
        bike_id: String,
    },
    RideEndingSoon {
        rental_id: u64,
        remaining_seconds: u64,
    },
    RideExpired {
        rental_id: u64,
        bike_id: String,
    },
    EndVerificationFailed {
        rental_id: u64,
        bike_id: String,
    },
    RideCompleted {
        rental_id: u64,
        bike_id: String,
    },
    RentalCanceled {
        rental_id: u64,
        bike_id: String,
    },
}

pub trait NotificationSink: Send + Sync {
    fn notify(&self, event: RideEvent);
}

/// Forwards events into an unbounded channel. A dropped receiver is ignored.
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<RideEvent>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<RideEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl NotificationSink for ChannelSink {
    fn notify(&self, event: RideEvent) {
        let _ = self.tx.send(event);
    }
}

/// Writes every event to the tracing log.
#[derive(Debug, Default)]
pub struct LogSink;

impl NotificationSink for LogSink {
    fn notify(&self, event: RideEvent) {
        match &event {
            RideEvent::RideExpired { rental_id, bike_id } => {
                warn!("rental {} on {} has expired", rental_id, bike_id);
            }
            RideEvent::EndVerificationFailed { rental_id, bike_id } => {
                warn!("rental {} on {}: chain not verified, ride continues", rental_id, bike_id);
            }
            other => info!("ride event: {:?}", other),
        }
    }
}

/// Drops every event.
#[derive(Debug, Default)]
pub struct NullSink;

impl NotificationSink for NullSink {
    fn notify(&self, _event: RideEvent) {}
}

/// Fans an event out to several sinks.
pub struct FanoutSink {
    sinks: Vec<Box<dyn NotificationSink>>,
}

impl FanoutSink {
    pub fn new(sinks: Vec<Box<dyn NotificationSink>>) -> Self {
        Self { sinks }
    }
}

impl NotificationSink for FanoutSink {
    fn notify(&self, event: RideEvent) {
        for sink in &self.sinks {
            sink.notify(event.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_sink_delivers_and_tolerates_closed_receiver() {
        let (sink, mut rx) = ChannelSink::new();
        sink.notify(RideEvent::RideExpired {
            rental_id: 1,
            bike_id: "B".into(),
        });
        assert_eq!(
            rx.try_recv().unwrap(),
            RideEvent::RideExpired {
                rental_id: 1,
                bike_id: "B".into()
            }
        );
        drop(rx);
        sink.notify(RideEvent::RideCompleted {
            rental_id: 1,
            bike_id: "B".into(),
        });
    }

    #[test]
    fn test_fanout_reaches_every_sink() {
        let (a, mut rx_a) = ChannelSink::new();
        let (b, mut rx_b) = ChannelSink::new();
        let fanout = FanoutSink::new(vec![Box::new(a), Box::new(b), Box::new(NullSink)]);
        fanout.notify(RideEvent::RentalCanceled {
            rental_id: 7,
            bike_id: "X".into(),
        });
        assert!(rx_a.try_recv().is_ok());
        assert!(rx_b.try_recv().is_ok());
    }

    #[test]
    fn test_event_serializes_with_tag() {
        let json = serde_json::to_value(RideEvent::AdminNotificationRequested {
            bike_id: "BIKE-003".into(),
            reason: "flat tire".into(),
        })
        .unwrap();
        assert_eq!(json["event"], "admin_notification_requested");
        assert_eq!(json["reason"], "flat tire");
    }
}
