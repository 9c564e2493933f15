// HTTP surface for the rider app.

pub mod handler;
