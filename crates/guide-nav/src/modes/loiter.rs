use tracing::info;

use guide_proto::WaypointKind;

use super::{loiter_waypoint, ModeContext, ModeKind, NavMode};

/// Position hold. Consumes reposition requests; without one it keeps an
/// existing stable setpoint or latches the present position.
#[derive(Debug, Default)]
pub struct Loiter;

impl Loiter {
    pub fn new() -> Self {
        Self
    }

    fn apply_reposition(&self, ctx: &mut ModeContext<'_>) -> bool {
        let Some(request) = ctx.core.reposition.take() else {
            return false;
        };

        // Requests may leave fields unset; holes are filled from the
        // current setpoint or, failing that, the vehicle itself.
        let fallback = if ctx.core.triplet.current.valid {
            let wp = &ctx.core.triplet.current;
            (wp.lat, wp.lon, wp.alt)
        } else {
            (ctx.sample.lat, ctx.sample.lon, ctx.sample.alt)
        };

        let lat = if request.lat.is_finite() { request.lat } else { fallback.0 };
        let lon = if request.lon.is_finite() { request.lon } else { fallback.1 };
        let alt = if request.alt.is_finite() { request.alt } else { fallback.2 };

        let mut wp = loiter_waypoint(&ctx.core.params, lat, lon, alt, request.yaw);
        if request.loiter_radius.is_finite() && request.loiter_radius > 0.0 {
            wp.loiter_radius = request.loiter_radius;
        }
        wp.cruising_speed = request.cruising_speed;

        info!(lat, lon, alt, "loiter: reposition");
        ctx.core.publish_solo(wp);
        ctx.core.can_loiter_at_sp = true;
        true
    }
}

impl NavMode for Loiter {
    fn kind(&self) -> ModeKind {
        ModeKind::Loiter
    }

    fn on_activation(&mut self, ctx: &mut ModeContext<'_>) {
        if self.apply_reposition(ctx) {
            return;
        }
        let keep = ctx.core.can_loiter_at_sp
            && ctx.core.triplet.current.valid
            && ctx.core.triplet.current.kind == WaypointKind::Loiter;
        if !keep {
            ctx.core.loiter_here(ctx.sample);
        }
    }

    fn on_active(&mut self, ctx: &mut ModeContext<'_>) {
        self.apply_reposition(ctx);
    }
}
