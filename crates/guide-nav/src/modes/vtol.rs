use serde::Deserialize;
use tracing::info;

use guide_proto::{FrameKind, WaypointKind};

use super::{position_waypoint, ModeContext, ModeKind, NavMode};

/// Fixed approach fix flown before the backward transition.
#[derive(Debug, Clone, Deserialize)]
pub struct LandApproach {
    pub lat: f64,
    pub lon: f64,
    /// Height above home at the fix, m.
    pub alt_above_home_m: f32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VtolParams {
    /// Hover climb above home before the forward transition, m.
    pub transition_alt_m: f32,
    /// Deceleration assumed for the backward transition, m/s^2. Sizes the
    /// approach leg so the vehicle is hovering by the time it is home.
    pub back_trans_dec_mss: f32,
    /// Hover descent step above home after the backward transition, m.
    pub descend_alt_m: f32,
    pub land_approach: Option<LandApproach>,
}

impl Default for VtolParams {
    fn default() -> Self {
        Self {
            transition_alt_m: 50.0,
            back_trans_dec_mss: 2.0,
            descend_alt_m: 20.0,
            land_approach: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TakeoffPhase {
    Climb,
    Transition,
    Done,
}

/// Hover climb, forward transition, then hand over as a fixed-wing hold.
/// The rotary cruising-speed override is snapshotted before the regime
/// change and put back once the vehicle flies as a fixed wing.
#[derive(Debug)]
pub struct VtolTakeoff {
    params: VtolParams,
    phase: TakeoffPhase,
}

impl VtolTakeoff {
    pub fn new(params: VtolParams) -> Self {
        Self { params, phase: TakeoffPhase::Climb }
    }
}

impl NavMode for VtolTakeoff {
    fn kind(&self) -> ModeKind {
        ModeKind::VtolTakeoff
    }

    fn on_activation(&mut self, ctx: &mut ModeContext<'_>) {
        self.phase = TakeoffPhase::Climb;
        ctx.core.speeds.store(FrameKind::RotaryWing);

        let base_alt = if ctx.core.home.alt_valid() {
            ctx.core.home.alt
        } else {
            ctx.sample.alt
        };
        let alt = base_alt + self.params.transition_alt_m;
        ctx.notices.info(format!("VTOL takeoff to {:.0} m", alt));
        ctx.core.publish_solo(position_waypoint(
            WaypointKind::Takeoff,
            ctx.sample.lat,
            ctx.sample.lon,
            alt,
            ctx.sample.yaw,
        ));
        ctx.core.can_loiter_at_sp = false;
    }

    fn on_active(&mut self, ctx: &mut ModeContext<'_>) {
        match self.phase {
            TakeoffPhase::Climb => {
                if !ctx.core.reached_altitude(ctx.sample) {
                    return;
                }
                self.phase = TakeoffPhase::Transition;
                ctx.notices.info("VTOL takeoff: transition");
                let mut wp = ctx.core.triplet.current;
                wp.kind = WaypointKind::Position;
                ctx.core.publish_solo(wp);
            }
            TakeoffPhase::Transition => {
                if ctx.sample.frame != FrameKind::FixedWing {
                    return;
                }
                self.phase = TakeoffPhase::Done;
                ctx.core.speeds.restore();
                info!("forward transition complete");
                ctx.notices.info("VTOL takeoff complete");
                ctx.core.loiter_here(ctx.sample);
            }
            TakeoffPhase::Done => {}
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LandPhase {
    Approach,
    BackTransition,
    Descend,
    Land,
}

/// Fixed-wing approach to a fix near home, backward transition on the
/// way in, hover descent and landing. Without a configured approach it
/// degrades to a plain landing at home.
#[derive(Debug)]
pub struct VtolLand {
    params: VtolParams,
    phase: LandPhase,
    idled: bool,
}

impl VtolLand {
    pub fn new(params: VtolParams) -> Self {
        Self { params, phase: LandPhase::Approach, idled: false }
    }

    /// Horizontal distance needed to bleed off the approach speed.
    fn deceleration_distance(&self, speed: f32) -> f32 {
        let dec = self.params.back_trans_dec_mss.max(0.1);
        speed * speed / (2.0 * dec)
    }

    fn descend_at_home(&mut self, ctx: &mut ModeContext<'_>) {
        self.phase = LandPhase::Descend;
        let home = ctx.core.home;
        ctx.notices.info("VTOL land: descend");
        ctx.core.publish_solo(position_waypoint(
            WaypointKind::Position,
            home.lat,
            home.lon,
            home.alt + self.params.descend_alt_m,
            f32::NAN,
        ));
    }

    fn land_at_home(&mut self, ctx: &mut ModeContext<'_>) {
        self.phase = LandPhase::Land;
        let home = ctx.core.home;
        ctx.notices.info("VTOL land: final descent");
        ctx.core.publish_solo(position_waypoint(
            WaypointKind::Land,
            home.lat,
            home.lon,
            f32::NAN,
            f32::NAN,
        ));
        ctx.core.can_loiter_at_sp = false;
    }
}

impl NavMode for VtolLand {
    fn kind(&self) -> ModeKind {
        ModeKind::VtolLand
    }

    fn on_activation(&mut self, ctx: &mut ModeContext<'_>) {
        self.idled = false;
        ctx.core.speeds.store(FrameKind::FixedWing);

        let Some(approach) = self.params.land_approach.clone() else {
            ctx.notices.warning("VTOL land: no approach defined, landing at home");
            if ctx.core.home.position_valid() {
                self.land_at_home(ctx);
            } else {
                self.phase = LandPhase::Land;
                ctx.core.publish_solo(position_waypoint(
                    WaypointKind::Land,
                    ctx.sample.lat,
                    ctx.sample.lon,
                    f32::NAN,
                    ctx.sample.yaw,
                ));
            }
            return;
        };

        self.phase = LandPhase::Approach;
        let alt = ctx.core.home.alt + approach.alt_above_home_m;
        info!(lat = approach.lat, lon = approach.lon, alt, "vtol land approach");
        ctx.notices.info("VTOL land: approach");
        let prev = position_waypoint(
            WaypointKind::Position,
            ctx.sample.lat,
            ctx.sample.lon,
            ctx.sample.alt,
            f32::NAN,
        );
        ctx.core.publish_triplet(
            prev,
            position_waypoint(WaypointKind::Position, approach.lat, approach.lon, alt, f32::NAN),
            Default::default(),
        );
        ctx.core.can_loiter_at_sp = false;
    }

    fn on_active(&mut self, ctx: &mut ModeContext<'_>) {
        match self.phase {
            LandPhase::Approach => {
                // The back-transition starts one deceleration distance
                // before the approach fix, not on top of it.
                let wp = ctx.core.triplet.current;
                let slack = self.deceleration_distance(ctx.sample.ground_speed());
                let dist = guide_proto::geo::haversine_m(
                    wp.lat,
                    wp.lon,
                    ctx.sample.lat,
                    ctx.sample.lon,
                );
                if dist > f64::from(ctx.core.acceptance_radius() + slack) {
                    return;
                }
                self.phase = LandPhase::BackTransition;
                let home = ctx.core.home;
                ctx.notices.info("VTOL land: back-transition");
                ctx.core.publish_solo(position_waypoint(
                    WaypointKind::Position,
                    home.lat,
                    home.lon,
                    wp.alt,
                    f32::NAN,
                ));
            }
            LandPhase::BackTransition => {
                if ctx.sample.frame != FrameKind::RotaryWing {
                    return;
                }
                ctx.core.speeds.restore();
                info!("backward transition complete");
                self.descend_at_home(ctx);
            }
            LandPhase::Descend => {
                if ctx.core.reached(ctx.sample) {
                    self.land_at_home(ctx);
                }
            }
            LandPhase::Land => {
                if ctx.sample.landed && !self.idled {
                    self.idled = true;
                    ctx.notices.info("Landing completed");
                    let mut wp = ctx.core.triplet.current;
                    wp.kind = WaypointKind::Idle;
                    ctx.core.publish_solo(wp);
                }
            }
        }
    }
}
