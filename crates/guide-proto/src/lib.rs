pub mod geo;
pub mod notice;
pub mod setpoint;
pub mod vehicle;

pub use notice::{Notice, Notices, Severity};
pub use setpoint::{
    Constraints, LandingGear, PositionWaypoint, SetpointTriplet, TrajectorySetpoint, WaypointKind,
};
pub use vehicle::{
    EmitterKind, FrameKind, Home, NavState, StickInput, TransponderReport, VehicleSample,
};
