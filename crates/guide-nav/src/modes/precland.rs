use tracing::{debug, info};

use guide_proto::WaypointKind;

use super::{position_waypoint, ModeContext, ModeKind, NavMode};

/// Landing that chases a ground beacon. Starts as a plain descent at the
/// present position and retargets whenever the tracker reports a fix;
/// with no fix it behaves exactly like [`super::Land`].
#[derive(Debug, Default)]
pub struct PrecLand {
    had_target: bool,
    idled: bool,
}

impl PrecLand {
    pub fn new() -> Self {
        Self::default()
    }
}

impl NavMode for PrecLand {
    fn kind(&self) -> ModeKind {
        ModeKind::PrecLand
    }

    fn on_activation(&mut self, ctx: &mut ModeContext<'_>) {
        self.had_target = false;
        self.idled = false;
        ctx.notices.info("Precision landing");
        let wp = position_waypoint(
            WaypointKind::Land,
            ctx.sample.lat,
            ctx.sample.lon,
            f32::NAN,
            ctx.sample.yaw,
        );
        ctx.core.publish_solo(wp);
        ctx.core.can_loiter_at_sp = false;
    }

    fn on_active(&mut self, ctx: &mut ModeContext<'_>) {
        if ctx.sample.landed {
            if !self.idled {
                self.idled = true;
                ctx.notices.info("Landing completed");
                let mut wp = ctx.core.triplet.current;
                wp.kind = WaypointKind::Idle;
                ctx.core.publish_solo(wp);
            }
            return;
        }

        let Some(target) = ctx.sample.precision_target else {
            return;
        };
        let wp = &mut ctx.core.triplet.current;
        if wp.lat == target.lat && wp.lon == target.lon {
            return;
        }
        if !self.had_target {
            self.had_target = true;
            info!(lat = target.lat, lon = target.lon, "beacon acquired");
        } else {
            debug!(lat = target.lat, lon = target.lon, "beacon update");
        }
        wp.lat = target.lat;
        wp.lon = target.lon;
        ctx.core.triplet_dirty = true;
    }
}
