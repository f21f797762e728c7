//! Externally sampled vehicle state, read-only to the decision core.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::geo::Point;

/// Discrete navigation state reported by the external commander. The
/// manual-class states bypass the navigator entirely.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavState {
    Manual,
    Stabilized,
    Acro,
    AltCtl,
    PosCtl,
    Offboard,
    Descend,
    Termination,
    AutoMission,
    AutoLoiter,
    AutoRtl,
    AutoTakeoff,
    AutoVtolTakeoff,
    AutoLand,
    AutoPrecland,
    AutoLandEngFail,
}

/// Flight regime currently active. A VTOL airframe switches between the two.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    RotaryWing,
    FixedWing,
}

/// Pilot stick positions, normalized to [-1, 1] per axis.
/// z: -1 is full up (halt descent), +1 is full down.
#[derive(Debug, Clone, Copy)]
pub struct StickInput {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

/// Home position for RTL. Validity is split because altitude can be known
/// before a full horizontal fix is.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Home {
    pub lat: f64,
    pub lon: f64,
    pub alt: f32,
    pub valid_xy: bool,
    pub valid_alt: bool,
}

impl Home {
    pub fn position_valid(&self) -> bool {
        self.valid_xy && self.valid_alt
    }

    pub fn alt_valid(&self) -> bool {
        self.valid_alt
    }
}

impl Default for Home {
    fn default() -> Self {
        Self { lat: 0.0, lon: 0.0, alt: 0.0, valid_xy: false, valid_alt: false }
    }
}

/// One per-cycle snapshot of everything the decision core reads.
#[derive(Debug, Clone)]
pub struct VehicleSample {
    pub ts: OffsetDateTime,
    pub nav_state: NavState,
    pub frame: FrameKind,
    pub is_vtol: bool,

    pub lat: f64,
    pub lon: f64,
    /// Altitude above mean sea level, meters.
    pub alt: f32,
    pub global_valid: bool,

    /// Local NED position, meters (z down).
    pub local_pos: [f32; 3],
    pub local_valid: bool,
    /// Local NED velocity, m/s.
    pub velocity: [f32; 3],
    /// Radians.
    pub yaw: f32,

    /// Meters above ground, from the external distance sensor/estimator.
    pub dist_to_ground: f32,
    pub landed: bool,

    /// None when RC input is absent or stale.
    pub sticks: Option<StickInput>,

    /// Precision landing beacon fix, when the tracker holds one.
    pub precision_target: Option<Point>,
}

impl Default for VehicleSample {
    fn default() -> Self {
        Self {
            ts: OffsetDateTime::UNIX_EPOCH,
            nav_state: NavState::Manual,
            frame: FrameKind::RotaryWing,
            is_vtol: false,
            lat: 0.0,
            lon: 0.0,
            alt: 0.0,
            global_valid: false,
            local_pos: [0.0; 3],
            local_valid: false,
            velocity: [0.0; 3],
            yaw: 0.0,
            dist_to_ground: f32::NAN,
            landed: false,
            sticks: None,
            precision_target: None,
        }
    }
}

impl VehicleSample {
    /// Horizontal ground speed, m/s.
    pub fn ground_speed(&self) -> f32 {
        (self.velocity[0] * self.velocity[0] + self.velocity[1] * self.velocity[1]).sqrt()
    }

    /// Ground-track heading in radians, or the vehicle yaw when not moving.
    pub fn ground_track(&self) -> f32 {
        if self.ground_speed() > 0.5 {
            self.velocity[1].atan2(self.velocity[0])
        } else {
            self.yaw
        }
    }
}

/// Transponder class, reduced to what the avoidance radius selection needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmitterKind {
    Manned,
    Uav,
    /// Treated as manned for avoidance purposes.
    Unknown,
}

/// ADS-B style traffic report from the external receiver.
#[derive(Debug, Clone)]
pub struct TransponderReport {
    pub icao_address: u32,
    pub callsign: String,
    pub lat: f64,
    pub lon: f64,
    pub alt: f32,
    /// Travel direction in earth frame, radians.
    pub heading: f32,
    pub hor_velocity: f32,
    pub ver_velocity: f32,
    pub emitter: EmitterKind,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn home_validity_requires_both_flags() {
        let mut home = Home::default();
        assert!(!home.position_valid());
        home.valid_alt = true;
        assert!(home.alt_valid());
        assert!(!home.position_valid());
        home.valid_xy = true;
        assert!(home.position_valid());
    }

    #[test]
    fn ground_track_falls_back_to_yaw_when_slow() {
        let mut sample = test_sample();
        sample.velocity = [0.1, 0.1, 0.0];
        sample.yaw = 1.2;
        assert_eq!(sample.ground_track(), 1.2);
        sample.velocity = [0.0, 3.0, 0.0];
        assert!((sample.ground_track() - core::f32::consts::FRAC_PI_2).abs() < 1e-6);
    }

    fn test_sample() -> VehicleSample {
        VehicleSample {
            lat: 47.0,
            lon: 8.0,
            alt: 500.0,
            global_valid: true,
            local_pos: [0.0, 0.0, -10.0],
            local_valid: true,
            dist_to_ground: 10.0,
            ..VehicleSample::default()
        }
    }
}
