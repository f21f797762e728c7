//! Flight mode dispatch.
//!
//! The navigator does not decide which automatic mode is wanted; the
//! external commander does, through the nav state carried on every
//! vehicle sample. The navigator's job is to run the matching mode
//! strategy with the right lifecycle, keep the auxiliary monitors fed
//! (geofence, traffic, custom actions, cruising speed), and let the
//! geofence veto whatever setpoint the mode produced.

use serde::Deserialize;
use time::OffsetDateTime;
use tracing::info;

use guide_proto::{
    FrameKind, Home, NavState, Notices, PositionWaypoint, SetpointTriplet, TransponderReport,
    VehicleSample, WaypointKind,
};

use crate::custom_action::CustomActionTracker;
use crate::geofence::{FenceCheck, GeofenceDefinition, GeofenceMonitor, GeofenceParams};
use crate::modes::{
    loiter_waypoint, EngineFailure, Land, Loiter, Mission, MissionPlan, ModeContext, ModeKind,
    NavCore, NavMode, NavParams, PrecLand, Rtl, RtlParams, Takeoff, VtolLand, VtolParams,
    VtolTakeoff,
};
use crate::speed::{CruiseParams, CruisingSpeeds};
use crate::traffic::{TrafficAction, TrafficConflict, TrafficMonitor, TrafficParams};

/// Everything the navigator needs at construction, one section per
/// concern so the pieces deserialize straight out of the config file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NavigatorConfig {
    pub nav: NavParams,
    pub cruise: CruiseParams,
    pub rtl: RtlParams,
    pub vtol: VtolParams,
    pub traffic: TrafficParams,
    pub geofence: GeofenceParams,
    pub mission: MissionPlan,
    pub home: Home,
}

/// Operator/link commands the navigator accepts between cycles.
#[derive(Debug, Clone)]
pub enum NavCommand {
    /// Move the hold position. Non-finite fields keep their current
    /// values. Consumed by the loiter mode.
    Reposition { lat: f64, lon: f64, alt: f32, yaw: f32, speed: f32, loiter_radius: f32 },
    /// Request a takeoff target. Non-finite fields fall back to the
    /// vehicle position and minimum climb. Consumed by the takeoff mode.
    Takeoff { lat: f64, lon: f64, alt: f32 },
    StartCustomAction { id: i8, timeout_s: f32 },
    AckCustomAction { id: i8 },
    ResetCustomAction,
    /// Cruising-speed override for the currently flown regime.
    SetCruiseSpeed { speed_mps: f32 },
    SetCruiseThrottle { throttle: f32 },
}

/// Per-cycle summary for the caller.
#[derive(Debug, Clone)]
pub struct NavigatorOutput {
    pub mode: Option<ModeKind>,
    pub mode_changed: bool,
    pub triplet_updated: bool,
    pub fence_breached: bool,
    pub traffic_conflict: Option<TrafficConflict>,
    /// True when a conflict wants the vehicle brought home; acting on it
    /// is the commander's call.
    pub rtl_demanded: bool,
}

struct ModeSet {
    mission: Mission,
    loiter: Loiter,
    takeoff: Takeoff,
    land: Land,
    precland: PrecLand,
    rtl: Rtl,
    vtol_takeoff: VtolTakeoff,
    vtol_land: VtolLand,
    engine_failure: EngineFailure,
}

impl ModeSet {
    fn get_mut(&mut self, kind: ModeKind) -> &mut dyn NavMode {
        match kind {
            ModeKind::Mission => &mut self.mission,
            ModeKind::Loiter => &mut self.loiter,
            ModeKind::Takeoff => &mut self.takeoff,
            ModeKind::Land => &mut self.land,
            ModeKind::PrecLand => &mut self.precland,
            ModeKind::Rtl => &mut self.rtl,
            ModeKind::VtolTakeoff => &mut self.vtol_takeoff,
            ModeKind::VtolLand => &mut self.vtol_land,
            ModeKind::EngineFailure => &mut self.engine_failure,
        }
    }
}

pub struct Navigator {
    core: NavCore,
    modes: ModeSet,
    active: Option<ModeKind>,
    geofence: Option<GeofenceMonitor>,
    custom_action: CustomActionTracker,
    traffic: TrafficMonitor,
    /// Route RTL through the VTOL landing sequence.
    vtol_rtl: bool,
    last_frame: FrameKind,
}

impl Navigator {
    pub fn new(config: NavigatorConfig, fence: Option<GeofenceDefinition>) -> Self {
        let vtol_rtl = config.vtol.land_approach.is_some();
        let modes = ModeSet {
            mission: Mission::new(config.mission),
            loiter: Loiter::new(),
            takeoff: Takeoff::new(),
            land: Land::new(),
            precland: PrecLand::new(),
            rtl: Rtl::new(config.rtl),
            vtol_takeoff: VtolTakeoff::new(config.vtol.clone()),
            vtol_land: VtolLand::new(config.vtol),
            engine_failure: EngineFailure::new(),
        };
        Self {
            core: NavCore::new(config.nav, config.home, CruisingSpeeds::new(config.cruise)),
            modes,
            active: None,
            geofence: fence.map(|f| GeofenceMonitor::new(f, config.geofence)),
            custom_action: CustomActionTracker::new(),
            traffic: TrafficMonitor::new(config.traffic),
            vtol_rtl,
            last_frame: FrameKind::RotaryWing,
        }
    }

    /// One decision cycle. Runs the auxiliary monitors, dispatches the
    /// mode selected by the sample's nav state (deactivation hook before
    /// activation hook, active hook every cycle), then applies the
    /// geofence hold on top of whatever the mode wrote.
    pub fn step(
        &mut self,
        sample: &VehicleSample,
        traffic_reports: &[TransponderReport],
        notices: &mut Notices,
    ) -> NavigatorOutput {
        self.core.triplet_dirty = false;
        self.last_frame = sample.frame;

        self.custom_action.update(sample.ts, notices);

        let mut conflict: Option<TrafficConflict> = None;
        for report in traffic_reports {
            if let Some(c) = self.traffic.check(sample, report, notices) {
                let closer = conflict
                    .as_ref()
                    .map_or(true, |prev| c.cpa_distance_m < prev.cpa_distance_m);
                if closer {
                    conflict = Some(c);
                }
            }
        }
        let rtl_demanded = conflict
            .as_ref()
            .is_some_and(|c| c.action == TrafficAction::ReturnHome);

        let fence = match &mut self.geofence {
            Some(monitor) => monitor.check(sample, &self.core.home, notices),
            None => FenceCheck::default(),
        };

        let target = self.mode_for_state(sample);
        let mode_changed = target != self.active;
        if mode_changed {
            info!(from = ?self.active, to = ?target, "flight mode change");
            let mut ctx = ModeContext { sample, core: &mut self.core, notices };
            if let Some(old) = self.active {
                self.modes.get_mut(old).on_inactive(&mut ctx);
            }
            if let Some(new) = target {
                self.modes.get_mut(new).on_activation(&mut ctx);
            }
            self.active = target;
        }
        if let Some(kind) = self.active {
            let mut ctx = ModeContext { sample, core: &mut self.core, notices };
            self.modes.get_mut(kind).on_active(&mut ctx);
        }

        let hold = self
            .geofence
            .as_ref()
            .is_some_and(GeofenceMonitor::hold_on_breach);
        if fence.breached && fence.hold_valid && hold && self.active.is_some() {
            let wp = loiter_waypoint(
                &self.core.params,
                fence.hold_lat,
                fence.hold_lon,
                fence.hold_alt,
                sample.yaw,
            );
            self.core.publish_solo(wp);
            self.core.can_loiter_at_sp = true;
        }

        NavigatorOutput {
            mode: self.active,
            mode_changed,
            triplet_updated: self.core.triplet_dirty,
            fence_breached: fence.breached,
            traffic_conflict: conflict,
            rtl_demanded,
        }
    }

    pub fn handle_command(
        &mut self,
        cmd: NavCommand,
        now: OffsetDateTime,
        notices: &mut Notices,
    ) {
        match cmd {
            NavCommand::Reposition { lat, lon, alt, yaw, speed, loiter_radius } => {
                if let Some(monitor) = &self.geofence {
                    let fence = monitor.fence();
                    let outside_hor = lat.is_finite()
                        && lon.is_finite()
                        && !fence.contains_horizontal(lat, lon, &self.core.home);
                    let outside_ver =
                        alt.is_finite() && !fence.contains_altitude(alt, &self.core.home);
                    if outside_hor || outside_ver {
                        notices.warning("Reposition rejected: outside geofence");
                        return;
                    }
                }
                info!(lat, lon, alt, "reposition request");
                let mut wp = PositionWaypoint::default();
                wp.valid = true;
                wp.kind = WaypointKind::Loiter;
                wp.lat = lat;
                wp.lon = lon;
                wp.alt = alt;
                wp.yaw = yaw;
                wp.cruising_speed = speed;
                wp.loiter_radius = loiter_radius;
                self.core.reposition = Some(wp);
            }
            NavCommand::Takeoff { lat, lon, alt } => {
                info!(alt, "takeoff request");
                let mut wp = PositionWaypoint::default();
                wp.valid = true;
                wp.kind = WaypointKind::Takeoff;
                wp.lat = lat;
                wp.lon = lon;
                wp.alt = alt;
                self.core.takeoff_request = Some(wp);
            }
            NavCommand::StartCustomAction { id, timeout_s } => {
                self.custom_action.start(id, timeout_s, now, notices);
            }
            NavCommand::AckCustomAction { id } => {
                self.custom_action.acknowledge(id, now, notices);
            }
            NavCommand::ResetCustomAction => self.custom_action.reset(),
            NavCommand::SetCruiseSpeed { speed_mps } => {
                info!(speed_mps, frame = ?self.last_frame, "cruise speed override");
                self.core.speeds.set(self.last_frame, speed_mps);
            }
            NavCommand::SetCruiseThrottle { throttle } => {
                self.core.speeds.set_throttle(throttle);
            }
        }
    }

    fn mode_for_state(&self, sample: &VehicleSample) -> Option<ModeKind> {
        use NavState::*;
        match sample.nav_state {
            AutoMission => Some(ModeKind::Mission),
            AutoLoiter => Some(ModeKind::Loiter),
            AutoTakeoff => Some(ModeKind::Takeoff),
            AutoVtolTakeoff => Some(ModeKind::VtolTakeoff),
            AutoLand => Some(ModeKind::Land),
            AutoPrecland => Some(ModeKind::PrecLand),
            AutoLandEngFail => Some(ModeKind::EngineFailure),
            AutoRtl => {
                if sample.is_vtol && self.vtol_rtl {
                    Some(ModeKind::VtolLand)
                } else {
                    Some(ModeKind::Rtl)
                }
            }
            Manual | Stabilized | Acro | AltCtl | PosCtl | Offboard | Descend | Termination => {
                None
            }
        }
    }

    // ----- Accessors -----

    pub fn triplet(&self) -> &SetpointTriplet {
        &self.core.triplet
    }

    pub fn active_mode(&self) -> Option<ModeKind> {
        self.active
    }

    pub fn home(&self) -> &Home {
        &self.core.home
    }

    pub fn set_home(&mut self, home: Home) {
        self.core.home = home;
    }

    pub fn cruising_speed(&self, frame: FrameKind) -> f32 {
        self.core.speeds.get(frame)
    }

    pub fn cruising_throttle(&self) -> f32 {
        self.core.speeds.throttle()
    }

    /// Horizontal acceptance radius in effect for the current waypoint.
    pub fn acceptance_radius(&self) -> f32 {
        self.core.acceptance_radius()
    }

    /// Default acceptance radius, ignoring per-waypoint overrides.
    pub fn default_acceptance_radius(&self) -> f32 {
        self.core.params.acceptance_radius_m
    }

    pub fn altitude_acceptance_radius(&self, sample: &VehicleSample) -> f32 {
        self.core.altitude_acceptance(sample)
    }

    pub fn custom_action_id(&self) -> Option<i8> {
        self.custom_action.active_id()
    }

    /// (next item index, finished) of the stored mission.
    pub fn mission_progress(&self) -> (usize, bool) {
        (self.modes.mission.index(), self.modes.mission.finished())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use guide_proto::geo::Point;
    use time::macros::datetime;

    fn sample(state: NavState) -> VehicleSample {
        let mut s = VehicleSample::default();
        s.ts = datetime!(2026-03-01 08:00:00 UTC);
        s.nav_state = state;
        s.lat = 47.40;
        s.lon = 8.55;
        s.alt = 520.0;
        s.global_valid = true;
        s
    }

    fn navigator() -> Navigator {
        let mut config = NavigatorConfig::default();
        config.home = Home { lat: 47.40, lon: 8.55, alt: 490.0, valid_xy: true, valid_alt: true };
        Navigator::new(config, None)
    }

    #[test]
    fn manual_states_leave_the_triplet_alone() {
        let mut nav = navigator();
        let mut notices = Notices::new();

        let out = nav.step(&sample(NavState::Manual), &[], &mut notices);
        assert_eq!(out.mode, None);
        assert!(!out.mode_changed);
        assert!(!out.triplet_updated);
        assert!(!nav.triplet().current.valid);

        let out = nav.step(&sample(NavState::PosCtl), &[], &mut notices);
        assert_eq!(out.mode, None);
        assert!(!out.mode_changed);
    }

    #[test]
    fn loiter_state_activates_and_latches() {
        let mut nav = navigator();
        let mut notices = Notices::new();

        let out = nav.step(&sample(NavState::AutoLoiter), &[], &mut notices);
        assert_eq!(out.mode, Some(ModeKind::Loiter));
        assert!(out.mode_changed);
        assert!(out.triplet_updated);
        assert_eq!(nav.triplet().current.kind, WaypointKind::Loiter);

        // Same state next cycle: no re-activation, hold stays put.
        let out = nav.step(&sample(NavState::AutoLoiter), &[], &mut notices);
        assert!(!out.mode_changed);
    }

    #[test]
    fn scripted_states_drive_exactly_one_activation_per_change() {
        let mut nav = navigator();
        let mut notices = Notices::new();
        let mut s = sample(NavState::Manual);

        let mut step = |nav: &mut Navigator, notices: &mut Notices, state| {
            s.ts += time::Duration::seconds(1);
            s.nav_state = state;
            nav.step(&s, &[], notices)
        };

        let out = step(&mut nav, &mut notices, NavState::Manual);
        assert!(!out.mode_changed && out.mode.is_none());
        assert!(!nav.triplet().current.valid);

        let out = step(&mut nav, &mut notices, NavState::AutoLoiter);
        assert!(out.mode_changed && out.triplet_updated);

        // Same state again: the hold must not be re-latched.
        let out = step(&mut nav, &mut notices, NavState::AutoLoiter);
        assert!(!out.mode_changed && !out.triplet_updated);

        // Two separate RTL episodes with a loiter in between. Each entry
        // restarts the ladder, so the climb announcement counts the
        // activation calls.
        let out = step(&mut nav, &mut notices, NavState::AutoRtl);
        assert!(out.mode_changed);
        let out = step(&mut nav, &mut notices, NavState::AutoRtl);
        assert!(!out.mode_changed);
        let out = step(&mut nav, &mut notices, NavState::AutoLoiter);
        assert!(out.mode_changed && out.triplet_updated);
        let out = step(&mut nav, &mut notices, NavState::AutoRtl);
        assert!(out.mode_changed);

        // Back to manual: the outgoing mode is closed out, nothing new
        // activates, the last setpoint stays untouched.
        let out = step(&mut nav, &mut notices, NavState::Manual);
        assert!(out.mode_changed && out.mode.is_none() && !out.triplet_updated);
        let alt = nav.triplet().current.alt;
        let out = step(&mut nav, &mut notices, NavState::Manual);
        assert!(!out.mode_changed && !out.triplet_updated);
        assert_eq!(nav.triplet().current.alt, alt);

        let climbs = notices
            .drain()
            .iter()
            .filter(|n| n.text.starts_with("RTL: climb"))
            .count();
        assert_eq!(climbs, 2);
    }

    #[test]
    fn rtl_routes_to_vtol_land_when_approach_defined() {
        let mut config = NavigatorConfig::default();
        config.home = Home { lat: 47.40, lon: 8.55, alt: 490.0, valid_xy: true, valid_alt: true };
        config.vtol.land_approach = Some(crate::modes::LandApproach {
            lat: 47.41,
            lon: 8.55,
            alt_above_home_m: 40.0,
        });
        let mut nav = Navigator::new(config, None);
        let mut notices = Notices::new();

        let mut s = sample(NavState::AutoRtl);
        s.is_vtol = true;
        s.frame = FrameKind::FixedWing;
        let out = nav.step(&s, &[], &mut notices);
        assert_eq!(out.mode, Some(ModeKind::VtolLand));

        // A plain multirotor with the same config flies normal RTL.
        let mut nav = navigator();
        let out = nav.step(&sample(NavState::AutoRtl), &[], &mut notices);
        assert_eq!(out.mode, Some(ModeKind::Rtl));
    }

    #[test]
    fn fence_breach_overrides_the_mode_setpoint() {
        let fence = GeofenceDefinition {
            polygon: Some(vec![
                Point { lat: 47.39, lon: 8.54 },
                Point { lat: 47.41, lon: 8.54 },
                Point { lat: 47.41, lon: 8.56 },
                Point { lat: 47.39, lon: 8.56 },
            ]),
            ..GeofenceDefinition::default()
        };
        let mut config = NavigatorConfig::default();
        config.home = Home { lat: 47.40, lon: 8.55, alt: 490.0, valid_xy: true, valid_alt: true };
        let mut nav = Navigator::new(config, Some(fence));
        let mut notices = Notices::new();

        // Outside the east edge in loiter: the hold point must be the
        // fence response, not the plain position latch.
        let mut s = sample(NavState::AutoLoiter);
        s.lon = 8.57;
        let out = nav.step(&s, &[], &mut notices);
        assert!(out.fence_breached);
        assert!(out.triplet_updated);
        assert_eq!(nav.triplet().current.kind, WaypointKind::Loiter);
        assert!(notices.drain().iter().any(|n| n.text.contains("Geofence")));
    }

    #[test]
    fn reposition_outside_fence_is_rejected() {
        let fence = GeofenceDefinition {
            polygon: Some(vec![
                Point { lat: 47.39, lon: 8.54 },
                Point { lat: 47.41, lon: 8.54 },
                Point { lat: 47.41, lon: 8.56 },
                Point { lat: 47.39, lon: 8.56 },
            ]),
            ..GeofenceDefinition::default()
        };
        let mut config = NavigatorConfig::default();
        config.home = Home { lat: 47.40, lon: 8.55, alt: 490.0, valid_xy: true, valid_alt: true };
        let mut nav = Navigator::new(config, Some(fence));
        let mut notices = Notices::new();
        let now = datetime!(2026-03-01 08:00:00 UTC);

        nav.handle_command(
            NavCommand::Reposition {
                lat: 47.50,
                lon: 8.55,
                alt: 520.0,
                yaw: f32::NAN,
                speed: f32::NAN,
                loiter_radius: f32::NAN,
            },
            now,
            &mut notices,
        );
        assert_eq!(notices.len(), 1);

        let out = nav.step(&sample(NavState::AutoLoiter), &[], &mut notices);
        assert_eq!(out.mode, Some(ModeKind::Loiter));
        // Hold latched at the vehicle, not at the rejected point.
        assert_eq!(nav.triplet().current.lat, 47.40);
    }

    #[test]
    fn cruise_speed_command_applies_to_flown_regime() {
        let mut nav = navigator();
        let mut notices = Notices::new();
        let now = datetime!(2026-03-01 08:00:00 UTC);

        let mut s = sample(NavState::AutoLoiter);
        s.frame = FrameKind::FixedWing;
        nav.step(&s, &[], &mut notices);
        nav.handle_command(NavCommand::SetCruiseSpeed { speed_mps: 19.0 }, now, &mut notices);

        assert_eq!(nav.cruising_speed(FrameKind::FixedWing), 19.0);
        assert_eq!(nav.cruising_speed(FrameKind::RotaryWing), 5.0);
    }
}
