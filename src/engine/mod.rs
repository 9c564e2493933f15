// Rental session engine: fleet allocation, the rental state machine, and the ride countdown.

pub mod clock;
pub mod coordinator;
pub mod error;
pub mod events;
pub mod fleet;
pub mod machine;
pub mod rental;
pub mod snapshot;
pub mod stats;
pub mod ticker;
