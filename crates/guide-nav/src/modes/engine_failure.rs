use guide_proto::WaypointKind;

use super::{loiter_waypoint, ModeContext, ModeKind, NavMode};

/// Loss of thrust. Circles the present position so the vehicle comes
/// down near where the failure happened instead of gliding away.
#[derive(Debug, Default)]
pub struct EngineFailure {
    idled: bool,
}

impl EngineFailure {
    pub fn new() -> Self {
        Self::default()
    }
}

impl NavMode for EngineFailure {
    fn kind(&self) -> ModeKind {
        ModeKind::EngineFailure
    }

    fn on_activation(&mut self, ctx: &mut ModeContext<'_>) {
        self.idled = false;
        ctx.notices.critical("Engine failure: circling down at current position");
        let wp = loiter_waypoint(
            &ctx.core.params,
            ctx.sample.lat,
            ctx.sample.lon,
            ctx.sample.alt,
            ctx.sample.yaw,
        );
        ctx.core.publish_solo(wp);
        ctx.core.can_loiter_at_sp = false;
    }

    fn on_active(&mut self, ctx: &mut ModeContext<'_>) {
        if ctx.sample.landed && !self.idled {
            self.idled = true;
            let mut wp = ctx.core.triplet.current;
            wp.kind = WaypointKind::Idle;
            ctx.core.publish_solo(wp);
        }
    }
}
