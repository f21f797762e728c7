use serde::Deserialize;
use tracing::info;

use guide_proto::{PositionWaypoint, WaypointKind};

use super::{position_waypoint, ModeContext, ModeKind, NavMode};

#[derive(Debug, Clone, Deserialize)]
pub struct MissionItem {
    pub lat: f64,
    pub lon: f64,
    /// Above mean sea level, m.
    pub alt_m: f32,
    pub yaw_deg: Option<f32>,
    /// Overrides the default acceptance radius for this item, m.
    pub acceptance_radius_m: Option<f32>,
    /// Cruising-speed change taking effect on the leg to this item, m/s.
    pub speed_mps: Option<f32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MissionPlan {
    pub items: Vec<MissionItem>,
}

impl MissionPlan {
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }
}

/// Flies the stored plan item by item, advancing on waypoint acceptance.
/// Progress survives leaving and re-entering the mode.
#[derive(Debug)]
pub struct Mission {
    plan: MissionPlan,
    index: usize,
    finished: bool,
}

impl Mission {
    pub fn new(plan: MissionPlan) -> Self {
        Self { plan, index: 0, finished: false }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn finished(&self) -> bool {
        self.finished
    }

    fn item_waypoint(&self, item: &MissionItem) -> PositionWaypoint {
        let yaw = item.yaw_deg.map_or(f32::NAN, f32::to_radians);
        let mut wp = position_waypoint(WaypointKind::Position, item.lat, item.lon, item.alt_m, yaw);
        if let Some(r) = item.acceptance_radius_m {
            wp.acceptance_radius = r;
        }
        if let Some(s) = item.speed_mps {
            wp.cruising_speed = s;
        }
        wp
    }

    /// Publishes the leg for `self.index`: previous is wherever the leg
    /// starts, next is the following item when there is one.
    fn publish_leg(&self, ctx: &mut ModeContext<'_>, leg_start: PositionWaypoint) {
        let item = &self.plan.items[self.index];
        let current = self.item_waypoint(item);
        let next = self
            .plan
            .items
            .get(self.index + 1)
            .map(|it| self.item_waypoint(it))
            .unwrap_or_default();

        if let Some(speed) = item.speed_mps {
            ctx.core.speeds.set(ctx.sample.frame, speed);
        }
        ctx.core.publish_triplet(leg_start, current, next);
        ctx.core.can_loiter_at_sp = false;
    }

    fn hold_at_end(&self, ctx: &mut ModeContext<'_>) {
        ctx.core.loiter_here(ctx.sample);
    }
}

impl NavMode for Mission {
    fn kind(&self) -> ModeKind {
        ModeKind::Mission
    }

    fn on_activation(&mut self, ctx: &mut ModeContext<'_>) {
        if self.plan.is_empty() {
            ctx.notices.warning("Mission: no mission stored, holding");
            self.finished = true;
            self.hold_at_end(ctx);
            return;
        }
        if self.finished {
            self.hold_at_end(ctx);
            return;
        }

        info!(item = self.index, total = self.plan.len(), "mission resumed");
        let here = position_waypoint(
            WaypointKind::Position,
            ctx.sample.lat,
            ctx.sample.lon,
            ctx.sample.alt,
            f32::NAN,
        );
        self.publish_leg(ctx, here);
    }

    fn on_active(&mut self, ctx: &mut ModeContext<'_>) {
        if self.finished || !ctx.core.reached(ctx.sample) {
            return;
        }

        let reached = ctx.core.triplet.current;
        self.index += 1;
        if self.index >= self.plan.len() {
            self.finished = true;
            ctx.notices.info("Mission complete, holding");
            self.hold_at_end(ctx);
            return;
        }

        info!(item = self.index, total = self.plan.len(), "mission item reached");
        self.publish_leg(ctx, reached);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modes::{NavCore, NavParams};
    use crate::speed::{CruiseParams, CruisingSpeeds};
    use guide_proto::{FrameKind, Home, Notices, VehicleSample};

    fn core() -> NavCore {
        NavCore::new(
            NavParams::default(),
            Home::default(),
            CruisingSpeeds::new(CruiseParams::default()),
        )
    }

    fn plan() -> MissionPlan {
        MissionPlan {
            items: vec![
                MissionItem {
                    lat: 47.40,
                    lon: 8.55,
                    alt_m: 520.0,
                    yaw_deg: None,
                    acceptance_radius_m: None,
                    speed_mps: Some(8.0),
                },
                MissionItem {
                    lat: 47.41,
                    lon: 8.55,
                    alt_m: 520.0,
                    yaw_deg: Some(90.0),
                    acceptance_radius_m: Some(25.0),
                    speed_mps: None,
                },
            ],
        }
    }

    fn sample_at(lat: f64, lon: f64, alt: f32) -> VehicleSample {
        let mut s = VehicleSample::default();
        s.lat = lat;
        s.lon = lon;
        s.alt = alt;
        s.global_valid = true;
        s
    }

    #[test]
    fn activation_publishes_first_leg_and_speed() {
        let mut core = core();
        let mut notices = Notices::new();
        let sample = sample_at(47.395, 8.55, 500.0);
        let mut mission = Mission::new(plan());

        let mut ctx = ModeContext { sample: &sample, core: &mut core, notices: &mut notices };
        mission.on_activation(&mut ctx);

        assert!(core.triplet.current.valid);
        assert_eq!(core.triplet.current.lat, 47.40);
        assert!(core.triplet.next.valid);
        assert_eq!(core.speeds.get(FrameKind::RotaryWing), 8.0);
        assert!(!core.can_loiter_at_sp);
    }

    #[test]
    fn advances_on_acceptance_and_finishes_with_hold() {
        let mut core = core();
        let mut notices = Notices::new();
        let mut mission = Mission::new(plan());

        let start = sample_at(47.395, 8.55, 500.0);
        {
            let mut ctx = ModeContext { sample: &start, core: &mut core, notices: &mut notices };
            mission.on_activation(&mut ctx);
        }

        // Reach item 0.
        let at_first = sample_at(47.40, 8.55, 520.0);
        {
            let mut ctx =
                ModeContext { sample: &at_first, core: &mut core, notices: &mut notices };
            mission.on_active(&mut ctx);
        }
        assert_eq!(mission.index(), 1);
        assert_eq!(core.triplet.current.lat, 47.41);
        assert_eq!(core.triplet.previous.lat, 47.40);
        assert!(!core.triplet.next.valid);

        // Within 25 m of item 1 counts as reached thanks to the override.
        let near_second = sample_at(47.40995, 8.55, 520.0);
        {
            let mut ctx =
                ModeContext { sample: &near_second, core: &mut core, notices: &mut notices };
            mission.on_active(&mut ctx);
        }
        assert!(mission.finished());
        assert_eq!(core.triplet.current.kind, WaypointKind::Loiter);
        assert!(core.can_loiter_at_sp);
        assert_eq!(notices.len(), 1);
    }

    #[test]
    fn far_from_waypoint_does_not_advance() {
        let mut core = core();
        let mut notices = Notices::new();
        let mut mission = Mission::new(plan());

        let start = sample_at(47.395, 8.55, 500.0);
        {
            let mut ctx = ModeContext { sample: &start, core: &mut core, notices: &mut notices };
            mission.on_activation(&mut ctx);
        }
        // Right position, 100 m low: altitude acceptance fails.
        let low = sample_at(47.40, 8.55, 420.0);
        let mut ctx = ModeContext { sample: &low, core: &mut core, notices: &mut notices };
        mission.on_active(&mut ctx);
        assert_eq!(mission.index(), 0);
    }

    #[test]
    fn empty_plan_warns_and_holds() {
        let mut core = core();
        let mut notices = Notices::new();
        let sample = sample_at(47.40, 8.55, 500.0);
        let mut mission = Mission::new(MissionPlan::default());

        let mut ctx = ModeContext { sample: &sample, core: &mut core, notices: &mut notices };
        mission.on_activation(&mut ctx);

        assert_eq!(core.triplet.current.kind, WaypointKind::Loiter);
        assert_eq!(notices.len(), 1);
        assert!(mission.finished());
    }

    #[test]
    fn progress_survives_mode_exit() {
        let mut core = core();
        let mut notices = Notices::new();
        let mut mission = Mission::new(plan());

        let start = sample_at(47.395, 8.55, 500.0);
        {
            let mut ctx = ModeContext { sample: &start, core: &mut core, notices: &mut notices };
            mission.on_activation(&mut ctx);
        }
        let at_first = sample_at(47.40, 8.55, 520.0);
        {
            let mut ctx =
                ModeContext { sample: &at_first, core: &mut core, notices: &mut notices };
            mission.on_active(&mut ctx);
        }
        assert_eq!(mission.index(), 1);

        {
            let mut ctx =
                ModeContext { sample: &at_first, core: &mut core, notices: &mut notices };
            mission.on_inactive(&mut ctx);
        }
        let mut ctx = ModeContext { sample: &at_first, core: &mut core, notices: &mut notices };
        mission.on_activation(&mut ctx);
        assert_eq!(mission.index(), 1);
        assert_eq!(core.triplet.current.lat, 47.41);
    }
}
