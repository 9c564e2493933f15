//! Rental session engine for a campus bike-share fleet.
//!
//! [`engine::coordinator::SessionCoordinator`] owns the fleet and the single
//! active rental and is the only way to change either. The rest of the crate
//! drives it: [`engine::ticker::ClockDriver`] feeds the ride countdown,
//! [`server`] exposes the operations over HTTP, and [`api::engine::RideEngine`]
//! bundles everything for a host application.

pub mod api;
pub mod config;
pub mod engine;
pub mod lock;
pub mod server;
