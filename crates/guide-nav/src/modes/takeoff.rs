use tracing::info;

use guide_proto::WaypointKind;

use super::{position_waypoint, ModeContext, ModeKind, NavMode};

/// Vertical climb to a commanded or minimum altitude, then hold.
#[derive(Debug, Default)]
pub struct Takeoff {
    done: bool,
}

impl Takeoff {
    pub fn new() -> Self {
        Self::default()
    }
}

impl NavMode for Takeoff {
    fn kind(&self) -> ModeKind {
        ModeKind::Takeoff
    }

    fn on_activation(&mut self, ctx: &mut ModeContext<'_>) {
        self.done = false;

        let min_abs_alt = ctx.sample.alt + ctx.core.params.takeoff_min_alt_m;
        let request = ctx.core.takeoff_request.take();

        let mut alt = min_abs_alt;
        if let Some(req) = &request {
            if req.alt.is_finite() {
                if req.alt >= min_abs_alt {
                    alt = req.alt;
                } else {
                    ctx.notices.info("Using minimum takeoff altitude");
                }
            }
        }

        // Climb in place unless the request named a point.
        let (lat, lon) = match &request {
            Some(req) if req.lat.is_finite() && req.lon.is_finite() => (req.lat, req.lon),
            _ => (ctx.sample.lat, ctx.sample.lon),
        };
        let yaw = match &request {
            Some(req) if req.yaw.is_finite() => req.yaw,
            _ => ctx.sample.yaw,
        };

        info!(alt, "takeoff");
        ctx.notices.info(format!("Takeoff to {:.1} m", alt));
        ctx.core.publish_solo(position_waypoint(WaypointKind::Takeoff, lat, lon, alt, yaw));
        ctx.core.can_loiter_at_sp = false;
    }

    fn on_active(&mut self, ctx: &mut ModeContext<'_>) {
        if self.done || !ctx.core.reached_altitude(ctx.sample) {
            return;
        }
        self.done = true;
        info!("takeoff complete, holding");

        let mut hold = ctx.core.triplet.current;
        hold.kind = WaypointKind::Loiter;
        hold.loiter_radius = ctx.core.params.loiter_radius_m;
        ctx.core.publish_solo(hold);
        ctx.core.can_loiter_at_sp = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modes::{NavCore, NavParams};
    use crate::speed::{CruiseParams, CruisingSpeeds};
    use guide_proto::{Home, Notices, PositionWaypoint, VehicleSample};

    fn core() -> NavCore {
        NavCore::new(
            NavParams::default(),
            Home::default(),
            CruisingSpeeds::new(CruiseParams::default()),
        )
    }

    fn grounded() -> VehicleSample {
        let mut s = VehicleSample::default();
        s.lat = 47.4;
        s.lon = 8.55;
        s.alt = 490.0;
        s.global_valid = true;
        s.landed = true;
        s
    }

    #[test]
    fn uncommanded_takeoff_climbs_minimum() {
        let mut core = core();
        let mut notices = Notices::new();
        let sample = grounded();
        let mut mode = Takeoff::new();

        let mut ctx = ModeContext { sample: &sample, core: &mut core, notices: &mut notices };
        mode.on_activation(&mut ctx);

        let wp = &core.triplet.current;
        assert_eq!(wp.kind, WaypointKind::Takeoff);
        assert_eq!(wp.alt, 490.0 + 2.5);
        assert_eq!(wp.lat, 47.4);
    }

    #[test]
    fn commanded_altitude_wins_when_above_minimum() {
        let mut core = core();
        let mut notices = Notices::new();
        let sample = grounded();

        let mut req = PositionWaypoint::default();
        req.alt = 530.0;
        core.takeoff_request = Some(req);

        let mut ctx = ModeContext { sample: &sample, core: &mut core, notices: &mut notices };
        Takeoff::new().on_activation(&mut ctx);
        assert_eq!(core.triplet.current.alt, 530.0);
        assert!(core.takeoff_request.is_none());
    }

    #[test]
    fn too_low_command_is_raised_to_minimum() {
        let mut core = core();
        let mut notices = Notices::new();
        let sample = grounded();

        let mut req = PositionWaypoint::default();
        req.alt = 490.5;
        core.takeoff_request = Some(req);

        let mut ctx = ModeContext { sample: &sample, core: &mut core, notices: &mut notices };
        Takeoff::new().on_activation(&mut ctx);
        assert_eq!(core.triplet.current.alt, 492.5);
        // "Takeoff to ..." plus the minimum-altitude note.
        assert_eq!(notices.len(), 2);
    }

    #[test]
    fn converts_to_hold_once_altitude_reached() {
        let mut core = core();
        let mut notices = Notices::new();
        let sample = grounded();
        let mut mode = Takeoff::new();

        {
            let mut ctx =
                ModeContext { sample: &sample, core: &mut core, notices: &mut notices };
            mode.on_activation(&mut ctx);
        }

        let mut climbing = sample.clone();
        climbing.alt = 491.0;
        climbing.landed = false;
        {
            let mut ctx =
                ModeContext { sample: &climbing, core: &mut core, notices: &mut notices };
            mode.on_active(&mut ctx);
        }
        assert_eq!(core.triplet.current.kind, WaypointKind::Takeoff);

        let mut arrived = climbing.clone();
        arrived.alt = 492.4;
        let mut ctx = ModeContext { sample: &arrived, core: &mut core, notices: &mut notices };
        mode.on_active(&mut ctx);
        assert_eq!(core.triplet.current.kind, WaypointKind::Loiter);
        assert!(core.can_loiter_at_sp);
    }
}
