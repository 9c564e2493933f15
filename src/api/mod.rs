// Entry points for the host application.

pub mod engine;
pub mod telemetry;
