//! Setpoint generation stage: consumes the navigator's triplet and
//! produces trajectory setpoints for the inner control loop.

pub mod avoidance;
pub mod generator;

pub use avoidance::AvoidanceService;
pub use generator::{GeneratorParams, SetpointGenerator};
