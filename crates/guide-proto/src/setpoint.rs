//! Setpoint records exchanged between the navigator and the setpoint
//! generator, and the generator's output for the inner control loop.
//!
//! NaN is a first-class sentinel here: a NaN axis means "the inner loop must
//! not constrain this axis" and has to be passed through untouched, never
//! collapsed to zero.

/// Discriminator selecting which setpoint-shaping policy applies to the
/// current target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaypointKind {
    Idle,
    Takeoff,
    Position,
    Loiter,
    Land,
    Velocity,
}

#[derive(Debug, Clone, Copy)]
pub struct PositionWaypoint {
    pub valid: bool,
    pub kind: WaypointKind,
    pub lat: f64,
    pub lon: f64,
    /// Altitude above mean sea level, meters.
    pub alt: f32,
    /// Radians, NaN = heading free.
    pub yaw: f32,
    /// Meters; sign selects loiter direction for fixed-wing.
    pub loiter_radius: f32,
    /// Meters; non-finite or <= 0 falls back to the parameter default.
    pub acceptance_radius: f32,
    /// m/s; NaN = use the parameter default for the active frame.
    pub cruising_speed: f32,
}

impl Default for PositionWaypoint {
    fn default() -> Self {
        Self {
            valid: false,
            kind: WaypointKind::Position,
            lat: f64::NAN,
            lon: f64::NAN,
            alt: f32::NAN,
            yaw: f32::NAN,
            loiter_radius: f32::NAN,
            acceptance_radius: f32::NAN,
            cruising_speed: f32::NAN,
        }
    }
}

impl PositionWaypoint {
    /// Back to safe defaults: invalid, position kind, everything NaN.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Previous/current/next waypoint record. Rewritten every cycle by the
/// active navigation mode, consumed read-only by the setpoint generator in
/// the same cycle.
#[derive(Debug, Clone, Copy, Default)]
pub struct SetpointTriplet {
    pub previous: PositionWaypoint,
    pub current: PositionWaypoint,
    pub next: PositionWaypoint,
}

impl SetpointTriplet {
    /// Invalidate all three waypoints.
    pub fn reset(&mut self) {
        self.previous.reset();
        self.current.reset();
        self.next.reset();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LandingGear {
    Up,
    Down,
    /// Leave the gear where it is.
    Keep,
}

/// Output limits the generator resets every cycle; the landing path narrows
/// them, nothing widens them.
#[derive(Debug, Clone, Copy)]
pub struct Constraints {
    /// Max climb speed, m/s (positive up).
    pub speed_up: f32,
    /// Max descent speed, m/s (positive down).
    pub speed_down: f32,
}

/// Final position/velocity/acceleration command for the inner loop.
/// Local NED frame, z down; NaN axes are unconstrained.
#[derive(Debug, Clone, Copy)]
pub struct TrajectorySetpoint {
    pub position: [f32; 3],
    pub velocity: [f32; 3],
    pub acceleration: [f32; 3],
    /// Radians, NaN = heading free.
    pub yaw: f32,
    /// Radians/s, NaN = unconstrained.
    pub yawspeed: f32,
    pub gear: LandingGear,
    pub constraints: Constraints,
}

impl TrajectorySetpoint {
    pub fn nan(constraints: Constraints) -> Self {
        Self {
            position: [f32::NAN; 3],
            velocity: [f32::NAN; 3],
            acceleration: [f32::NAN; 3],
            yaw: f32::NAN,
            yawspeed: f32::NAN,
            gear: LandingGear::Keep,
            constraints,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn waypoint_reset_is_invalid_nan() {
        let mut wp = PositionWaypoint {
            valid: true,
            kind: WaypointKind::Land,
            lat: 47.0,
            lon: 8.0,
            alt: 500.0,
            yaw: 1.0,
            loiter_radius: 50.0,
            acceptance_radius: 2.0,
            cruising_speed: 5.0,
        };
        wp.reset();
        assert!(!wp.valid);
        assert_eq!(wp.kind, WaypointKind::Position);
        assert!(wp.lat.is_nan() && wp.lon.is_nan() && wp.alt.is_nan());
        assert!(wp.cruising_speed.is_nan());
    }

    #[test]
    fn triplet_reset_invalidates_all() {
        let mut t = SetpointTriplet::default();
        t.previous.valid = true;
        t.current.valid = true;
        t.next.valid = true;
        t.reset();
        assert!(!t.previous.valid && !t.current.valid && !t.next.valid);
    }
}
