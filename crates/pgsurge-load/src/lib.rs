//! Load engine for pgsurge: the worker fleet, the rate-limit fabric, the
//! churn model, and the controller that reconciles a running fleet against
//! a declared configuration.

pub mod controller;
pub mod limiter;
pub mod worker;

pub use controller::{LoadConfig, LoadController};
pub use limiter::RateLimiter;
