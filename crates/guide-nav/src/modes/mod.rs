//! Flight mode strategies.
//!
//! Each automatic flight mode is a struct implementing [`NavMode`]. The
//! dispatcher in `navigator.rs` keeps one instance of every mode and
//! routes the per-cycle update to whichever one the reported vehicle
//! state selects. Modes talk to the rest of the system exclusively
//! through [`ModeContext`]: they read the vehicle sample and write the
//! setpoint triplet, cruising-speed overrides and operator notices.

use serde::Deserialize;

use guide_proto::geo;
use guide_proto::{
    FrameKind, Home, Notices, PositionWaypoint, SetpointTriplet, VehicleSample, WaypointKind,
};

use crate::speed::CruisingSpeeds;

mod engine_failure;
mod land;
mod loiter;
mod mission;
mod precland;
mod rtl;
mod takeoff;
mod vtol;

pub use engine_failure::EngineFailure;
pub use land::Land;
pub use loiter::Loiter;
pub use mission::{Mission, MissionItem, MissionPlan};
pub use precland::PrecLand;
pub use rtl::{Rtl, RtlParams};
pub use takeoff::Takeoff;
pub use vtol::{LandApproach, VtolLand, VtolParams, VtolTakeoff};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeKind {
    Mission,
    Loiter,
    Takeoff,
    Land,
    PrecLand,
    Rtl,
    VtolTakeoff,
    VtolLand,
    EngineFailure,
}

/// Lifecycle of a flight mode strategy.
///
/// `on_activation` runs once when the dispatcher hands control to the
/// mode, after the previously active mode got its `on_inactive`.
/// `on_active` then runs every cycle, including the activation cycle.
pub trait NavMode {
    fn kind(&self) -> ModeKind;
    fn on_activation(&mut self, ctx: &mut ModeContext<'_>);
    fn on_active(&mut self, ctx: &mut ModeContext<'_>);
    fn on_inactive(&mut self, _ctx: &mut ModeContext<'_>) {}
}

/// Navigation parameters shared by all modes.
#[derive(Debug, Clone, Deserialize)]
pub struct NavParams {
    /// Loiter radius written into loiter waypoints, m.
    pub loiter_radius_m: f32,
    /// Default horizontal acceptance radius, m.
    pub acceptance_radius_m: f32,
    /// Altitude acceptance, rotary wing, m.
    pub alt_acceptance_mc_m: f32,
    /// Altitude acceptance, fixed wing, m.
    pub alt_acceptance_fw_m: f32,
    /// Tighter fixed-wing altitude acceptance on a landing waypoint, m.
    pub alt_acceptance_fw_land_m: f32,
    /// Minimum climb above the takeoff point, m.
    pub takeoff_min_alt_m: f32,
}

impl Default for NavParams {
    fn default() -> Self {
        Self {
            loiter_radius_m: 80.0,
            acceptance_radius_m: 10.0,
            alt_acceptance_mc_m: 0.8,
            alt_acceptance_fw_m: 10.0,
            alt_acceptance_fw_land_m: 5.0,
            takeoff_min_alt_m: 2.5,
        }
    }
}

/// State shared between the dispatcher and the mode strategies.
pub struct NavCore {
    pub params: NavParams,
    pub home: Home,
    pub triplet: SetpointTriplet,
    /// Set by a reposition command, consumed by the loiter mode.
    pub reposition: Option<PositionWaypoint>,
    /// Set by a takeoff command, consumed by the takeoff mode.
    pub takeoff_request: Option<PositionWaypoint>,
    pub speeds: CruisingSpeeds,
    /// True while the current setpoint is a stable hold the vehicle may
    /// keep when switching into loiter.
    pub can_loiter_at_sp: bool,
    pub triplet_dirty: bool,
}

impl NavCore {
    pub fn new(params: NavParams, home: Home, speeds: CruisingSpeeds) -> Self {
        Self {
            params,
            home,
            triplet: SetpointTriplet::default(),
            reposition: None,
            takeoff_request: None,
            speeds,
            can_loiter_at_sp: false,
            triplet_dirty: false,
        }
    }

    /// Horizontal acceptance radius for the current waypoint: the
    /// per-waypoint override when one is set, the default otherwise.
    pub fn acceptance_radius(&self) -> f32 {
        let r = self.triplet.current.acceptance_radius;
        if r.is_finite() && r > 0.0 {
            r
        } else {
            self.params.acceptance_radius_m
        }
    }

    /// Altitude acceptance for the current waypoint. Fixed-wing landing
    /// waypoints get the tighter radius.
    pub fn altitude_acceptance(&self, sample: &VehicleSample) -> f32 {
        match sample.frame {
            FrameKind::RotaryWing => self.params.alt_acceptance_mc_m,
            FrameKind::FixedWing => {
                if self.triplet.current.kind == WaypointKind::Land {
                    self.params.alt_acceptance_fw_land_m
                } else {
                    self.params.alt_acceptance_fw_m
                }
            }
        }
    }

    pub fn reached_horizontal(&self, sample: &VehicleSample) -> bool {
        let wp = &self.triplet.current;
        wp.valid
            && geo::haversine_m(wp.lat, wp.lon, sample.lat, sample.lon)
                < f64::from(self.acceptance_radius())
    }

    pub fn reached_altitude(&self, sample: &VehicleSample) -> bool {
        let wp = &self.triplet.current;
        wp.valid && (sample.alt - wp.alt).abs() < self.altitude_acceptance(sample)
    }

    pub fn reached(&self, sample: &VehicleSample) -> bool {
        self.reached_horizontal(sample) && self.reached_altitude(sample)
    }

    /// Replaces the whole triplet.
    pub fn publish_triplet(
        &mut self,
        previous: PositionWaypoint,
        current: PositionWaypoint,
        next: PositionWaypoint,
    ) {
        self.triplet.previous = previous;
        self.triplet.current = current;
        self.triplet.next = next;
        self.triplet_dirty = true;
    }

    /// Publishes a single current waypoint with no leg context.
    pub fn publish_solo(&mut self, current: PositionWaypoint) {
        self.triplet.previous.reset();
        self.triplet.next.reset();
        self.triplet.current = current;
        self.triplet_dirty = true;
    }

    /// Latches a loiter at the present position and altitude.
    pub fn loiter_here(&mut self, sample: &VehicleSample) {
        let mut wp = position_waypoint(
            WaypointKind::Loiter,
            sample.lat,
            sample.lon,
            sample.alt,
            sample.yaw,
        );
        wp.loiter_radius = self.params.loiter_radius_m;
        self.publish_solo(wp);
        self.can_loiter_at_sp = true;
    }
}

/// What a mode sees each cycle.
pub struct ModeContext<'a> {
    pub sample: &'a VehicleSample,
    pub core: &'a mut NavCore,
    pub notices: &'a mut Notices,
}

// ----- Waypoint construction -----

pub(crate) fn position_waypoint(
    kind: WaypointKind,
    lat: f64,
    lon: f64,
    alt: f32,
    yaw: f32,
) -> PositionWaypoint {
    PositionWaypoint {
        valid: true,
        kind,
        lat,
        lon,
        alt,
        yaw,
        ..PositionWaypoint::default()
    }
}

pub(crate) fn loiter_waypoint(
    params: &NavParams,
    lat: f64,
    lon: f64,
    alt: f32,
    yaw: f32,
) -> PositionWaypoint {
    let mut wp = position_waypoint(WaypointKind::Loiter, lat, lon, alt, yaw);
    wp.loiter_radius = params.loiter_radius_m;
    wp
}
