//! Transponder traffic screening.
//!
//! Each incoming transponder report is tested against the own-ship track:
//! a report conflicts when it is already inside the protection radius for
//! its emitter class, or when the closest point of approach over the
//! prediction horizon falls inside that radius with too little vertical
//! separation. Conflicts for the same aircraft are rate limited through a
//! small notify buffer so one intruder cannot flood the operator.

use serde::Deserialize;
use time::OffsetDateTime;
use tracing::warn;

use guide_proto::geo;
use guide_proto::{EmitterKind, Notices, TransponderReport, VehicleSample};

#[derive(Debug, Clone, Deserialize)]
pub struct TrafficParams {
    pub mode: String, // off | warn | rtl
    /// Protection radius against manned traffic, m.
    pub radius_manned_m: f64,
    /// Protection radius against unmanned traffic, m.
    pub radius_unmanned_m: f64,
    /// Vertical separation below which a horizontal conflict counts, m.
    pub alt_band_m: f32,
    /// Look-ahead for the closest-point-of-approach test, s.
    pub horizon_s: f64,
    /// Per-aircraft renotification cooldown, s.
    pub cooldown_s: f32,
    /// Number of recently notified aircraft remembered.
    pub buffer_cap: usize,
}

impl Default for TrafficParams {
    fn default() -> Self {
        Self {
            mode: "warn".into(),
            radius_manned_m: 500.0,
            radius_unmanned_m: 50.0,
            alt_band_m: 60.0,
            horizon_s: 60.0,
            cooldown_s: 10.0,
            buffer_cap: 8,
        }
    }
}

/// What the vehicle should do about a confirmed conflict.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrafficAction {
    Warn,
    ReturnHome,
}

/// A transponder report that crosses the protection thresholds.
#[derive(Debug, Clone)]
pub struct TrafficConflict {
    pub icao_address: u32,
    pub callsign: String,
    /// Horizontal distance at the closest point of approach, m.
    pub cpa_distance_m: f64,
    /// Seconds until the closest point of approach, zero when already
    /// inside the protection radius.
    pub cpa_in_s: f64,
    pub action: TrafficAction,
}

#[derive(Debug, Clone)]
struct NotifyEntry {
    icao_address: u32,
    last_notified: OffsetDateTime,
}

/// Screens transponder reports and rate-limits conflict notifications.
#[derive(Debug)]
pub struct TrafficMonitor {
    params: TrafficParams,
    action: Option<TrafficAction>,
    buffer: Vec<NotifyEntry>,
}

impl TrafficMonitor {
    pub fn new(params: TrafficParams) -> Self {
        let action = match params.mode.as_str() {
            "warn" => Some(TrafficAction::Warn),
            "rtl" => Some(TrafficAction::ReturnHome),
            _ => None,
        };
        Self { params, action, buffer: Vec::new() }
    }

    pub fn enabled(&self) -> bool {
        self.action.is_some()
    }

    /// Tests one report against the own-ship track. Returns a conflict at
    /// most once per aircraft per cooldown window; suppressed repeats
    /// produce neither a conflict nor a notice.
    pub fn check(
        &mut self,
        sample: &VehicleSample,
        report: &TransponderReport,
        notices: &mut Notices,
    ) -> Option<TrafficConflict> {
        let action = self.action?;
        if !sample.global_valid {
            return None;
        }

        let radius = match report.emitter {
            EmitterKind::Uav => self.params.radius_unmanned_m,
            EmitterKind::Manned | EmitterKind::Unknown => self.params.radius_manned_m,
        };

        let (cpa_dist, cpa_in) = self.closest_approach(sample, report)?;
        if cpa_dist >= radius {
            return None;
        }

        if !self.should_notify(report.icao_address, sample.ts) {
            return None;
        }

        let label = if report.callsign.is_empty() {
            format!("{:06X}", report.icao_address)
        } else {
            report.callsign.clone()
        };
        warn!(
            icao = report.icao_address,
            callsign = %label,
            cpa_m = cpa_dist,
            cpa_in_s = cpa_in,
            "traffic conflict"
        );
        match action {
            TrafficAction::Warn => notices.warning(format!(
                "Traffic alert: {label} within {cpa_dist:.0} m"
            )),
            TrafficAction::ReturnHome => notices.critical(format!(
                "Traffic alert: {label} within {cpa_dist:.0} m, returning home"
            )),
        }

        Some(TrafficConflict {
            icao_address: report.icao_address,
            callsign: report.callsign.clone(),
            cpa_distance_m: cpa_dist,
            cpa_in_s: cpa_in,
            action,
        })
    }

    /// Horizontal distance and time of the closest point of approach,
    /// with both tracks flown at constant velocity. `None` when vertical
    /// separation at that point stays outside the altitude band.
    fn closest_approach(
        &self,
        sample: &VehicleSample,
        report: &TransponderReport,
    ) -> Option<(f64, f64)> {
        let (px, py) = geo::to_xy(report.lat, report.lon, sample.lat, sample.lon);

        // Own velocity is NED, traffic velocity comes as heading + speed.
        let own_ve = sample.velocity[1] as f64;
        let own_vn = sample.velocity[0] as f64;
        let trf_ve = (report.heading as f64).sin() * report.hor_velocity as f64;
        let trf_vn = (report.heading as f64).cos() * report.hor_velocity as f64;
        let dvx = trf_ve - own_ve;
        let dvy = trf_vn - own_vn;

        let dv2 = dvx * dvx + dvy * dvy;
        let t = if dv2 > 1e-6 {
            (-(px * dvx + py * dvy) / dv2).clamp(0.0, self.params.horizon_s)
        } else {
            0.0
        };

        let cx = px + dvx * t;
        let cy = py + dvy * t;
        let cpa_dist = (cx * cx + cy * cy).sqrt();

        let own_climb = -sample.velocity[2];
        let alt_diff = (report.alt + report.ver_velocity * t as f32)
            - (sample.alt + own_climb * t as f32);
        if alt_diff.abs() > self.params.alt_band_m {
            return None;
        }
        Some((cpa_dist, t))
    }

    /// Cooldown gate per aircraft. New aircraft evict the entry that was
    /// quiet the longest once the buffer is full.
    fn should_notify(&mut self, icao_address: u32, now: OffsetDateTime) -> bool {
        if let Some(entry) = self.buffer.iter_mut().find(|e| e.icao_address == icao_address) {
            if (now - entry.last_notified).as_seconds_f32() < self.params.cooldown_s {
                return false;
            }
            entry.last_notified = now;
            return true;
        }
        if self.buffer.len() >= self.params.buffer_cap.max(1) {
            let oldest = self
                .buffer
                .iter()
                .enumerate()
                .min_by_key(|(_, e)| e.last_notified)
                .map(|(i, _)| i);
            if let Some(i) = oldest {
                self.buffer.swap_remove(i);
            }
        }
        self.buffer.push(NotifyEntry { icao_address, last_notified: now });
        true
    }
}

/// Builds a synthetic transponder report placed relative to the own ship.
///
/// `distance_m` and `direction_rad` (bearing from north) place the
/// intruder, `traffic_heading_rad` and the velocities fly it. Useful for
/// exercising the conflict logic without an ADS-B receiver.
#[allow(clippy::too_many_arguments)]
pub fn fake_traffic(
    callsign: &str,
    distance_m: f64,
    direction_rad: f64,
    traffic_heading_rad: f32,
    altitude_diff_m: f32,
    hor_velocity_mps: f32,
    ver_velocity_mps: f32,
    emitter: EmitterKind,
    own: &VehicleSample,
) -> TransponderReport {
    let north = direction_rad.cos() * distance_m;
    let east = direction_rad.sin() * distance_m;
    let (lat, lon) = geo::offset_m(own.lat, own.lon, north, east);
    let icao_address = callsign
        .bytes()
        .fold(0u32, |acc, b| acc.wrapping_mul(31).wrapping_add(b as u32));
    TransponderReport {
        icao_address,
        callsign: callsign.to_string(),
        lat,
        lon,
        alt: own.alt + altitude_diff_m,
        heading: traffic_heading_rad,
        hor_velocity: hor_velocity_mps,
        ver_velocity: ver_velocity_mps,
        emitter,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn own_ship() -> VehicleSample {
        let mut s = VehicleSample::default();
        s.ts = datetime!(2026-03-01 12:00:00 UTC);
        s.lat = 47.397;
        s.lon = 8.545;
        s.alt = 500.0;
        s.global_valid = true;
        s.velocity = [10.0, 0.0, 0.0]; // northbound
        s
    }

    fn monitor(mode: &str) -> TrafficMonitor {
        TrafficMonitor::new(TrafficParams { mode: mode.into(), ..TrafficParams::default() })
    }

    #[test]
    fn head_on_manned_traffic_conflicts() {
        let own = own_ship();
        let mut m = monitor("warn");
        let mut notices = Notices::new();

        // 2 km ahead flying straight at us: CPA well inside 500 m.
        let report = fake_traffic(
            "N123AB",
            2_000.0,
            0.0,
            std::f32::consts::PI,
            10.0,
            30.0,
            0.0,
            EmitterKind::Manned,
            &own,
        );
        let conflict = m.check(&own, &report, &mut notices).expect("conflict");
        assert!(conflict.cpa_distance_m < 500.0);
        assert!(conflict.cpa_in_s > 0.0);
        assert_eq!(conflict.action, TrafficAction::Warn);
        assert_eq!(notices.len(), 1);
    }

    #[test]
    fn parallel_distant_traffic_is_clear() {
        let own = own_ship();
        let mut m = monitor("warn");
        let mut notices = Notices::new();

        // 5 km east flying the same northbound track.
        let report = fake_traffic(
            "N55X",
            5_000.0,
            std::f64::consts::FRAC_PI_2,
            0.0,
            0.0,
            10.0,
            0.0,
            EmitterKind::Manned,
            &own,
        );
        assert!(m.check(&own, &report, &mut notices).is_none());
        assert!(notices.is_empty());
    }

    #[test]
    fn high_crosser_filtered_by_altitude_band() {
        let own = own_ship();
        let mut m = monitor("warn");
        let mut notices = Notices::new();

        let report = fake_traffic(
            "HIGH1",
            1_000.0,
            0.0,
            std::f32::consts::PI,
            300.0,
            30.0,
            0.0,
            EmitterKind::Manned,
            &own,
        );
        assert!(m.check(&own, &report, &mut notices).is_none());
    }

    #[test]
    fn repeat_report_suppressed_until_cooldown() {
        let mut own = own_ship();
        let mut m = monitor("warn");
        let mut notices = Notices::new();

        let report = fake_traffic(
            "N123AB",
            400.0,
            0.0,
            std::f32::consts::PI,
            0.0,
            30.0,
            0.0,
            EmitterKind::Manned,
            &own,
        );
        assert!(m.check(&own, &report, &mut notices).is_some());
        own.ts += time::Duration::seconds(2);
        assert!(m.check(&own, &report, &mut notices).is_none());
        assert_eq!(notices.len(), 1);

        own.ts += time::Duration::seconds(20);
        assert!(m.check(&own, &report, &mut notices).is_some());
        assert_eq!(notices.len(), 2);
    }

    #[test]
    fn buffer_evicts_quietest_aircraft() {
        let mut own = own_ship();
        let mut m = TrafficMonitor::new(TrafficParams {
            buffer_cap: 2,
            cooldown_s: 1_000.0,
            ..TrafficParams::default()
        });
        let mut notices = Notices::new();

        for (i, callsign) in ["A1", "B2", "C3"].iter().enumerate() {
            own.ts += time::Duration::seconds(i as i64);
            let report = fake_traffic(
                callsign,
                300.0,
                0.0,
                std::f32::consts::PI,
                0.0,
                30.0,
                0.0,
                EmitterKind::Manned,
                &own,
            );
            assert!(m.check(&own, &report, &mut notices).is_some(), "{callsign}");
        }

        // A1 was evicted for C3, so it notifies again despite the cooldown.
        own.ts += time::Duration::seconds(1);
        let report = fake_traffic(
            "A1",
            300.0,
            0.0,
            std::f32::consts::PI,
            0.0,
            30.0,
            0.0,
            EmitterKind::Manned,
            &own,
        );
        assert!(m.check(&own, &report, &mut notices).is_some());
    }

    #[test]
    fn disabled_mode_ignores_everything() {
        let own = own_ship();
        let mut m = monitor("off");
        let mut notices = Notices::new();

        let report = fake_traffic(
            "N1",
            100.0,
            0.0,
            std::f32::consts::PI,
            0.0,
            30.0,
            0.0,
            EmitterKind::Manned,
            &own,
        );
        assert!(m.check(&own, &report, &mut notices).is_none());
        assert!(!m.enabled());
    }

    #[test]
    fn uav_radius_is_tighter() {
        let own = own_ship();
        let mut m = monitor("warn");
        let mut notices = Notices::new();

        // 200 m abeam, stationary: outside the 50 m UAV radius but well
        // inside the manned one.
        let report = fake_traffic(
            "DRONE9",
            200.0,
            std::f64::consts::FRAC_PI_2,
            0.0,
            0.0,
            0.0,
            0.0,
            EmitterKind::Uav,
            &own,
        );
        assert!(m.check(&own, &report, &mut notices).is_none());

        let report = fake_traffic(
            "CESSNA",
            200.0,
            std::f64::consts::FRAC_PI_2,
            0.0,
            0.0,
            0.0,
            0.0,
            EmitterKind::Manned,
            &own,
        );
        assert!(m.check(&own, &report, &mut notices).is_some());
    }
}
