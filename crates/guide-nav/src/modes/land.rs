use tracing::info;

use guide_proto::WaypointKind;

use super::{position_waypoint, ModeContext, ModeKind, NavMode};

/// Descends at the present position. Once the vehicle reports landed the
/// setpoint degrades to idle so the inner loop can spin the motors down.
#[derive(Debug, Default)]
pub struct Land {
    idled: bool,
}

impl Land {
    pub fn new() -> Self {
        Self::default()
    }
}

impl NavMode for Land {
    fn kind(&self) -> ModeKind {
        ModeKind::Land
    }

    fn on_activation(&mut self, ctx: &mut ModeContext<'_>) {
        self.idled = false;
        ctx.notices.info("Landing at current position");
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
        if self.idled || !ctx.sample.landed {
            return;
        }
        self.idled = true;
        info!("landed, idling");
        ctx.notices.info("Landing completed");
        let mut wp = ctx.core.triplet.current;
        wp.kind = WaypointKind::Idle;
        ctx.core.publish_solo(wp);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modes::{NavCore, NavParams};
    use crate::speed::{CruiseParams, CruisingSpeeds};
    use guide_proto::{Home, Notices, VehicleSample};

    fn core() -> NavCore {
        NavCore::new(
            NavParams::default(),
            Home::default(),
            CruisingSpeeds::new(CruiseParams::default()),
        )
    }

    #[test]
    fn lands_where_it_is_with_open_altitude() {
        let mut core = core();
        let mut notices = Notices::new();
        let mut sample = VehicleSample::default();
        sample.lat = 47.4;
        sample.lon = 8.55;
        sample.alt = 520.0;
        sample.global_valid = true;

        let mut mode = Land::new();
        let mut ctx = ModeContext { sample: &sample, core: &mut core, notices: &mut notices };
        mode.on_activation(&mut ctx);

        let wp = &core.triplet.current;
        assert_eq!(wp.kind, WaypointKind::Land);
        assert_eq!(wp.lat, 47.4);
        assert!(wp.alt.is_nan());
    }

    #[test]
    fn touchdown_degrades_to_idle_once() {
        let mut core = core();
        let mut notices = Notices::new();
        let mut sample = VehicleSample::default();
        sample.global_valid = true;

        let mut mode = Land::new();
        {
            let mut ctx =
                ModeContext { sample: &sample, core: &mut core, notices: &mut notices };
            mode.on_activation(&mut ctx);
        }
        notices.drain();

        sample.landed = true;
        {
            let mut ctx =
                ModeContext { sample: &sample, core: &mut core, notices: &mut notices };
            mode.on_active(&mut ctx);
        }
        assert_eq!(core.triplet.current.kind, WaypointKind::Idle);
        assert_eq!(notices.len(), 1);

        let mut ctx = ModeContext { sample: &sample, core: &mut core, notices: &mut notices };
        mode.on_active(&mut ctx);
        assert_eq!(notices.len(), 1);
    }
}
