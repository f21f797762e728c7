//! Waypoint-kind dispatch turning the current triplet entry into an
//! inner-loop setpoint.
//!
//! One [`SetpointGenerator::update`] per cycle. Most kinds map straight
//! through; landing runs a small sub-machine with a latched horizontal
//! target, ground-proximity speed interpolation, optional pilot
//! assistance and a maximum-duration clamp.

use serde::Deserialize;
use time::OffsetDateTime;
use tracing::info;

use guide_proto::geo;
use guide_proto::{
    Constraints, LandingGear, Notices, PositionWaypoint, SetpointTriplet, TrajectorySetpoint,
    VehicleSample, WaypointKind,
};

use crate::avoidance::AvoidanceService;

/// Gear comes up above this height over ground, m.
const GEAR_UP_AGL_M: f32 = 2.0;

#[derive(Debug, Clone, Deserialize)]
pub struct GeneratorParams {
    /// Final touchdown speed, m/s.
    pub land_speed_mps: f32,
    /// Height over ground where the landing slowdown starts, m.
    pub land_alt1_m: f32,
    /// Height over ground where the final touchdown speed is reached, m.
    /// Clamped to stay at or below `land_alt1_m`.
    pub land_alt2_m: f32,
    /// Let the pilot scale and steer the final descent.
    pub land_rc_assist: bool,
    /// Maximum time below `land_alt1_m` before the descent is forced, s.
    /// Zero or less disables the limit.
    pub land_max_duration_s: f32,
    /// Horizontal speed of stick repositioning during assisted landing, m/s.
    pub rc_reposition_speed_mps: f32,
    /// Default climb limit, m/s.
    pub speed_up_mps: f32,
    /// Default descent limit, m/s.
    pub speed_down_mps: f32,
    /// Cruise speed for velocity waypoints without an override, m/s.
    pub cruise_speed_mps: f32,
    /// Route every setpoint through the avoidance service.
    pub obstacle_avoidance: bool,
}

impl Default for GeneratorParams {
    fn default() -> Self {
        Self {
            land_speed_mps: 0.7,
            land_alt1_m: 10.0,
            land_alt2_m: 5.0,
            land_rc_assist: false,
            land_max_duration_s: 0.0,
            rc_reposition_speed_mps: 5.0,
            speed_up_mps: 3.0,
            speed_down_mps: 1.0,
            cruise_speed_mps: 5.0,
            obstacle_avoidance: false,
        }
    }
}

/// Per-kind setpoint shaping with the cross-cycle state the landing and
/// idle paths need.
pub struct SetpointGenerator {
    params: GeneratorParams,
    prev_kind: WaypointKind,
    /// Only the idle path writes this; everything else flies with it NaN.
    acceleration: [f32; 3],
    /// Latched horizontal landing target, z stays NaN.
    land_position: [f32; 3],
    first_below_alt1: Option<OffsetDateTime>,
    forced_descent_notified: bool,
    prev_ts: OffsetDateTime,
    avoidance: Option<Box<dyn AvoidanceService>>,
}

impl SetpointGenerator {
    pub fn new(mut params: GeneratorParams) -> Self {
        params.land_alt1_m = params.land_alt1_m.max(params.land_alt2_m);
        Self {
            params,
            prev_kind: WaypointKind::Idle,
            acceleration: [f32::NAN; 3],
            land_position: [f32::NAN; 3],
            first_below_alt1: None,
            forced_descent_notified: false,
            prev_ts: OffsetDateTime::UNIX_EPOCH,
            avoidance: None,
        }
    }

    pub fn set_avoidance(&mut self, service: Box<dyn AvoidanceService>) {
        self.avoidance = Some(service);
    }

    /// Starts a fresh shaping episode; the driver calls this on every
    /// dispatcher mode change. Clears the landing sub-state and any sticky
    /// acceleration command.
    pub fn activate(&mut self, sample: &VehicleSample) {
        self.prev_kind = WaypointKind::Idle;
        self.acceleration = [f32::NAN; 3];
        self.land_position = [f32::NAN; 3];
        self.first_below_alt1 = None;
        self.forced_descent_notified = false;
        self.prev_ts = sample.ts;
    }

    /// Maps the current waypoint into a trajectory setpoint. Constraints
    /// restart from their defaults every cycle; an invalid current
    /// waypoint leaves every axis unconstrained.
    pub fn update(
        &mut self,
        sample: &VehicleSample,
        triplet: &SetpointTriplet,
        notices: &mut Notices,
    ) -> TrajectorySetpoint {
        let mut out = TrajectorySetpoint::nan(Constraints {
            speed_up: self.params.speed_up_mps,
            speed_down: self.params.speed_down_mps,
        });

        // Idle is the only kind that commands acceleration; drop the
        // stale command as soon as idle is left behind.
        if self.prev_kind == WaypointKind::Idle {
            self.acceleration = [f32::NAN; 3];
        }

        if !triplet.current.valid {
            self.prev_ts = sample.ts;
            return out;
        }
        let wp = &triplet.current;

        if sample.dist_to_ground > GEAR_UP_AGL_M {
            out.gear = LandingGear::Up;
        }

        match wp.kind {
            WaypointKind::Idle => self.prepare_idle(&mut out),
            WaypointKind::Land => self.prepare_land(sample, wp, notices, &mut out),
            WaypointKind::Takeoff => prepare_takeoff(sample, wp, &mut out),
            WaypointKind::Position | WaypointKind::Loiter => {
                prepare_position(sample, wp, &mut out)
            }
            WaypointKind::Velocity => self.prepare_velocity(sample, wp, &mut out),
        }
        out.acceleration = self.acceleration;

        if self.params.obstacle_avoidance {
            if let Some(service) = self.avoidance.as_mut() {
                service.inject(&mut out, wp.kind);
            }
        }

        self.prev_kind = wp.kind;
        self.prev_ts = sample.ts;
        out
    }

    fn prepare_idle(&mut self, out: &mut TrajectorySetpoint) {
        // Zero-thrust posture: nothing to track, a strong downward
        // acceleration command keeps the inner loop from producing lift.
        out.position = [f32::NAN; 3];
        out.velocity = [f32::NAN; 3];
        self.acceleration = [0.0, 0.0, 100.0];
    }

    // ----- Landing -----

    fn prepare_land(
        &mut self,
        sample: &VehicleSample,
        wp: &PositionWaypoint,
        notices: &mut Notices,
        out: &mut TrajectorySetpoint,
    ) {
        // Slow down close to the ground.
        let mut land_speed = gradual(
            sample.dist_to_ground,
            self.params.land_alt2_m,
            self.params.land_alt1_m,
            self.params.land_speed_mps,
            out.constraints.speed_down,
        );

        if self.prev_kind != WaypointKind::Land {
            // Latch onto the commanded point so e.g. RTL touches down on
            // home exactly, not wherever the vehicle drifted to.
            let target = target_local(sample, wp);
            self.land_position = [target[0], target[1], f32::NAN];
        }

        let below_alt1 = sample.dist_to_ground < self.params.land_alt1_m;
        if below_alt1 {
            if self.first_below_alt1.is_none() {
                self.first_below_alt1 = Some(sample.ts);
                self.forced_descent_notified = false;
            }
        } else {
            self.first_below_alt1 = None;
        }

        match sample.sticks {
            Some(sticks) if self.params.land_rc_assist && below_alt1 => {
                // Stick full up halts the descent, full down doubles it.
                land_speed *= 1.0 + sticks.z;

                if self.params.land_max_duration_s > 0.0 {
                    if let Some(since) = self.first_below_alt1 {
                        let elapsed = (sample.ts - since).as_seconds_f32();
                        let remaining = self.params.land_max_duration_s - elapsed;
                        let descended = self.params.land_alt1_m - sample.dist_to_ground;
                        let v_avg_cur = descended / elapsed.max(0.01);
                        let v_avg_min = sample.dist_to_ground / remaining.max(0.01);

                        if v_avg_cur < v_avg_min {
                            // The minimum rate wins over the doubled-speed
                            // cap when the two cross.
                            land_speed = land_speed
                                .min(2.0 * self.params.land_speed_mps)
                                .max(v_avg_min);
                            if !self.forced_descent_notified {
                                info!(elapsed, "landing duration limit hit");
                                notices.info("Maximum landing duration reached, descending");
                                self.forced_descent_notified = true;
                            }
                        }
                    }
                }

                // Horizontal stick input walks the latched target around.
                let dt = (sample.ts - self.prev_ts).as_seconds_f32().clamp(0.0, 0.5);
                let step = self.params.rc_reposition_speed_mps * dt;
                let (sin_yaw, cos_yaw) = sample.yaw.sin_cos();
                self.land_position[0] += (sticks.x * cos_yaw - sticks.y * sin_yaw) * step;
                self.land_position[1] += (sticks.x * sin_yaw + sticks.y * cos_yaw) * step;
            }
            _ => {
                // Keep a usable target even when RC drops out mid-landing.
                if !self.land_position[0].is_finite() {
                    self.land_position[0] = sample.local_pos[0];
                    self.land_position[1] = sample.local_pos[1];
                }
            }
        }

        out.position = self.land_position;
        out.velocity = [f32::NAN, f32::NAN, land_speed];
        out.yaw = wp.yaw;
        out.gear = LandingGear::Down;
    }

    fn prepare_velocity(
        &self,
        sample: &VehicleSample,
        wp: &PositionWaypoint,
        out: &mut TrajectorySetpoint,
    ) {
        // Direction-preserving speed command, altitude held.
        out.position = [f32::NAN, f32::NAN, sample.local_pos[2]];

        let speed = if wp.cruising_speed.is_finite() && wp.cruising_speed > 0.0 {
            wp.cruising_speed
        } else {
            self.params.cruise_speed_mps
        };
        let vn = sample.velocity[0];
        let ve = sample.velocity[1];
        let norm = (vn * vn + ve * ve).sqrt();
        let (un, ue) = if norm > f32::EPSILON { (vn / norm, ve / norm) } else { (0.0, 0.0) };
        out.velocity = [un * speed, ue * speed, f32::NAN];
    }
}

fn prepare_takeoff(sample: &VehicleSample, wp: &PositionWaypoint, out: &mut TrajectorySetpoint) {
    out.position = target_local(sample, wp);
    out.velocity = [f32::NAN; 3];
    out.yaw = wp.yaw;
    out.gear = LandingGear::Down;
}

fn prepare_position(sample: &VehicleSample, wp: &PositionWaypoint, out: &mut TrajectorySetpoint) {
    out.position = target_local(sample, wp);
    out.velocity = [f32::NAN; 3];
    out.yaw = wp.yaw;
}

// ----- Helpers -----

/// Waypoint position in the local NED frame, anchored on the vehicle's
/// own local/global pair so no shared map origin is needed. NaN waypoint
/// axes come out NaN.
fn target_local(sample: &VehicleSample, wp: &PositionWaypoint) -> [f32; 3] {
    let (east, north) = geo::to_xy(wp.lat, wp.lon, sample.lat, sample.lon);
    [
        sample.local_pos[0] + north as f32,
        sample.local_pos[1] + east as f32,
        sample.local_pos[2] - (wp.alt - sample.alt),
    ]
}

/// Linear interpolation of `value` from (x_low, y_low) to (x_high, y_high),
/// clamped at both ends.
fn gradual(value: f32, x_low: f32, x_high: f32, y_low: f32, y_high: f32) -> f32 {
    if value < x_low {
        y_low
    } else if value > x_high {
        y_high
    } else {
        let a = (value - x_low) / (x_high - x_low);
        y_low + a * (y_high - y_low)
    }
}
