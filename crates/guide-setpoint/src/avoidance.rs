//! Obstacle avoidance hook.

use guide_proto::{TrajectorySetpoint, WaypointKind};

/// External avoidance service consulted after the per-kind dispatch.
///
/// The service sees the tentative setpoint plus the waypoint kind it was
/// shaped for and may rewrite position, velocity, yaw and yaw rate. Its
/// output is applied as-is; the generator does not validate what comes
/// back.
pub trait AvoidanceService {
    fn inject(&mut self, desired: &mut TrajectorySetpoint, kind: WaypointKind);
}
