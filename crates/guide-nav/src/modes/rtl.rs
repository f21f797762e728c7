use serde::Deserialize;
use time::OffsetDateTime;
use tracing::info;

use guide_proto::WaypointKind;

use super::{loiter_waypoint, position_waypoint, ModeContext, ModeKind, NavMode};

#[derive(Debug, Clone, Deserialize)]
pub struct RtlParams {
    /// Height above home flown on the return leg, m.
    pub return_alt_m: f32,
    /// Height above home at which the final descent starts, m.
    pub descend_alt_m: f32,
    /// Hover time above home before landing, s. Zero or less lands
    /// immediately.
    pub land_delay_s: f32,
}

impl Default for RtlParams {
    fn default() -> Self {
        Self { return_alt_m: 60.0, descend_alt_m: 30.0, land_delay_s: 0.0 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RtlPhase {
    Climb,
    Return,
    Descend,
    Hold,
    Land,
}

/// Return to launch: climb clear, fly home, step down, land. Without a
/// valid home position it degrades to landing in place.
#[derive(Debug)]
pub struct Rtl {
    params: RtlParams,
    phase: RtlPhase,
    climb_alt: f32,
    hold_since: Option<OffsetDateTime>,
    idled: bool,
}

impl Rtl {
    pub fn new(params: RtlParams) -> Self {
        Self {
            params,
            phase: RtlPhase::Climb,
            climb_alt: f32::NAN,
            hold_since: None,
            idled: false,
        }
    }

    fn land_at_home(&mut self, ctx: &mut ModeContext<'_>) {
        self.phase = RtlPhase::Land;
        let home = ctx.core.home;
        ctx.notices.info("RTL: landing at home");
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

impl NavMode for Rtl {
    fn kind(&self) -> ModeKind {
        ModeKind::Rtl
    }

    fn on_activation(&mut self, ctx: &mut ModeContext<'_>) {
        self.hold_since = None;
        self.idled = false;

        if !ctx.core.home.position_valid() {
            ctx.notices.critical("RTL: no valid home position, landing here");
            self.phase = RtlPhase::Land;
            ctx.core.publish_solo(position_waypoint(
                WaypointKind::Land,
                ctx.sample.lat,
                ctx.sample.lon,
                f32::NAN,
                ctx.sample.yaw,
            ));
            ctx.core.can_loiter_at_sp = false;
            return;
        }

        self.phase = RtlPhase::Climb;
        self.climb_alt = ctx.sample.alt.max(ctx.core.home.alt + self.params.return_alt_m);
        info!(climb_alt = self.climb_alt, "rtl engaged");
        ctx.notices.info(format!("RTL: climb to {:.0} m", self.climb_alt));
        ctx.core.publish_solo(position_waypoint(
            WaypointKind::Position,
            ctx.sample.lat,
            ctx.sample.lon,
            self.climb_alt,
            ctx.sample.yaw,
        ));
        ctx.core.can_loiter_at_sp = false;
    }

    fn on_active(&mut self, ctx: &mut ModeContext<'_>) {
        let home = ctx.core.home;
        match self.phase {
            RtlPhase::Climb => {
                if !ctx.core.reached_altitude(ctx.sample) {
                    return;
                }
                self.phase = RtlPhase::Return;
                ctx.notices.info(format!("RTL: return at {:.0} m", self.climb_alt));
                let prev = ctx.core.triplet.current;
                ctx.core.publish_triplet(
                    prev,
                    position_waypoint(
                        WaypointKind::Position,
                        home.lat,
                        home.lon,
                        self.climb_alt,
                        f32::NAN,
                    ),
                    Default::default(),
                );
            }
            RtlPhase::Return => {
                if !ctx.core.reached_horizontal(ctx.sample) {
                    return;
                }
                self.phase = RtlPhase::Descend;
                let descend_alt = home.alt + self.params.descend_alt_m;
                ctx.notices.info(format!("RTL: descend to {:.0} m", descend_alt));
                ctx.core.publish_solo(position_waypoint(
                    WaypointKind::Position,
                    home.lat,
                    home.lon,
                    descend_alt,
                    f32::NAN,
                ));
            }
            RtlPhase::Descend => {
                if !ctx.core.reached_altitude(ctx.sample) {
                    return;
                }
                if self.params.land_delay_s > 0.0 {
                    self.phase = RtlPhase::Hold;
                    self.hold_since = Some(ctx.sample.ts);
                    ctx.notices.info(format!(
                        "RTL: holding for {:.0} s",
                        self.params.land_delay_s
                    ));
                    let wp = loiter_waypoint(
                        &ctx.core.params,
                        home.lat,
                        home.lon,
                        home.alt + self.params.descend_alt_m,
                        f32::NAN,
                    );
                    ctx.core.publish_solo(wp);
                    ctx.core.can_loiter_at_sp = true;
                } else {
                    self.land_at_home(ctx);
                }
            }
            RtlPhase::Hold => {
                let Some(since) = self.hold_since else {
                    self.land_at_home(ctx);
                    return;
                };
                if (ctx.sample.ts - since).as_seconds_f32() >= self.params.land_delay_s {
                    self.land_at_home(ctx);
                }
            }
            RtlPhase::Land => {
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modes::{NavCore, NavParams};
    use crate::speed::{CruiseParams, CruisingSpeeds};
    use guide_proto::{Home, Notices, VehicleSample};
    use time::macros::datetime;

    fn home() -> Home {
        Home { lat: 47.40, lon: 8.55, alt: 490.0, valid_xy: true, valid_alt: true }
    }

    fn core_with_home() -> NavCore {
        NavCore::new(
            NavParams::default(),
            home(),
            CruisingSpeeds::new(CruiseParams::default()),
        )
    }

    fn airborne(lat: f64, lon: f64, alt: f32) -> VehicleSample {
        let mut s = VehicleSample::default();
        s.ts = datetime!(2026-03-01 09:00:00 UTC);
        s.lat = lat;
        s.lon = lon;
        s.alt = alt;
        s.global_valid = true;
        s
    }

    fn step(mode: &mut Rtl, core: &mut NavCore, notices: &mut Notices, s: &VehicleSample) {
        let mut ctx = ModeContext { sample: s, core, notices };
        mode.on_active(&mut ctx);
    }

    #[test]
    fn full_ladder_climb_return_descend_land() {
        let mut core = core_with_home();
        let mut notices = Notices::new();
        let mut rtl = Rtl::new(RtlParams::default());

        // 2 km out at 510 m; return altitude is 490 + 60 = 550.
        let mut s = airborne(47.42, 8.55, 510.0);
        {
            let mut ctx = ModeContext { sample: &s, core: &mut core, notices: &mut notices };
            rtl.on_activation(&mut ctx);
        }
        assert_eq!(core.triplet.current.alt, 550.0);
        assert_eq!(core.triplet.current.lat, 47.42);

        // Climb done: heads for home.
        s.alt = 550.0;
        step(&mut rtl, &mut core, &mut notices, &s);
        assert_eq!(core.triplet.current.lat, 47.40);
        assert_eq!(core.triplet.current.alt, 550.0);

        // Home overhead: step down.
        s.lat = 47.40;
        step(&mut rtl, &mut core, &mut notices, &s);
        assert_eq!(core.triplet.current.alt, 520.0);

        // Descend done: land immediately (no delay configured).
        s.alt = 520.0;
        step(&mut rtl, &mut core, &mut notices, &s);
        assert_eq!(core.triplet.current.kind, WaypointKind::Land);
        assert!(core.triplet.current.alt.is_nan());

        s.landed = true;
        step(&mut rtl, &mut core, &mut notices, &s);
        assert_eq!(core.triplet.current.kind, WaypointKind::Idle);
    }

    #[test]
    fn already_high_vehicle_keeps_its_altitude() {
        let mut core = core_with_home();
        let mut notices = Notices::new();
        let mut rtl = Rtl::new(RtlParams::default());

        let s = airborne(47.42, 8.55, 600.0);
        let mut ctx = ModeContext { sample: &s, core: &mut core, notices: &mut notices };
        rtl.on_activation(&mut ctx);
        assert_eq!(core.triplet.current.alt, 600.0);
    }

    #[test]
    fn hold_phase_delays_the_landing() {
        let mut core = core_with_home();
        let mut notices = Notices::new();
        let mut rtl = Rtl::new(RtlParams { land_delay_s: 5.0, ..RtlParams::default() });

        let mut s = airborne(47.40, 8.55, 550.0);
        {
            let mut ctx = ModeContext { sample: &s, core: &mut core, notices: &mut notices };
            rtl.on_activation(&mut ctx);
        }
        step(&mut rtl, &mut core, &mut notices, &s); // climb done
        step(&mut rtl, &mut core, &mut notices, &s); // at home
        s.alt = 520.0;
        step(&mut rtl, &mut core, &mut notices, &s); // descend done -> hold
        assert_eq!(core.triplet.current.kind, WaypointKind::Loiter);
        assert!(core.can_loiter_at_sp);

        s.ts += time::Duration::seconds(2);
        step(&mut rtl, &mut core, &mut notices, &s);
        assert_eq!(core.triplet.current.kind, WaypointKind::Loiter);

        s.ts += time::Duration::seconds(4);
        step(&mut rtl, &mut core, &mut notices, &s);
        assert_eq!(core.triplet.current.kind, WaypointKind::Land);
    }

    #[test]
    fn no_home_lands_in_place() {
        let mut core = NavCore::new(
            NavParams::default(),
            Home::default(),
            CruisingSpeeds::new(CruiseParams::default()),
        );
        let mut notices = Notices::new();
        let mut rtl = Rtl::new(RtlParams::default());

        let s = airborne(47.43, 8.56, 510.0);
        let mut ctx = ModeContext { sample: &s, core: &mut core, notices: &mut notices };
        rtl.on_activation(&mut ctx);

        assert_eq!(core.triplet.current.kind, WaypointKind::Land);
        assert_eq!(core.triplet.current.lat, 47.43);
        let drained = notices.drain();
        assert_eq!(drained.len(), 1);
        assert!(drained[0].text.contains("no valid home"));
    }
}
