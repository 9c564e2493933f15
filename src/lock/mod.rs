// Lock hardware abstraction: the controller trait and an in-memory stand-in.

pub mod mock;
pub mod traits;
