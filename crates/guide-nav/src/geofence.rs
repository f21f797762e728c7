//! Keep-in fence evaluation and breach response.
//!
//! A fence combines any of: a keep-in polygon, a keep-in circle, a
//! maximum horizontal distance from home and a maximum height above
//! home. The monitor evaluates the vehicle against all configured
//! constraints at a throttled rate and, on violation, proposes a hold
//! point the vehicle can actually reach: the braking stop point along
//! the current track, pulled back until it sits inside the fence with
//! margin.

use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;
use time::OffsetDateTime;
use tracing::warn;

use guide_proto::geo::{self, Point};
use guide_proto::{Home, Notices, VehicleSample};

#[derive(Debug, Clone, Deserialize)]
pub struct CircleFence {
    pub center: Point,
    pub radius_m: f64,
}

/// Static fence geometry, loaded from a TOML file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GeofenceDefinition {
    pub polygon: Option<Vec<Point>>,
    pub circle: Option<CircleFence>,
    /// Maximum horizontal distance from home, m.
    pub max_hor_dist_m: Option<f64>,
    /// Maximum height above home, m.
    pub max_ver_dist_m: Option<f32>,
}

impl GeofenceDefinition {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading fence file {}", path.display()))?;
        let def: Self = toml::from_str(&raw)
            .with_context(|| format!("parsing fence file {}", path.display()))?;
        def.validate()?;
        Ok(def)
    }

    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(
            self.polygon.is_some()
                || self.circle.is_some()
                || self.max_hor_dist_m.is_some()
                || self.max_ver_dist_m.is_some(),
            "fence defines no boundary"
        );
        if let Some(poly) = &self.polygon {
            anyhow::ensure!(poly.len() >= 3, "fence.polygon must have >= 3 points");
            for p in poly {
                anyhow::ensure!(
                    p.lat.abs() <= 90.0 && p.lon.abs() <= 180.0,
                    "fence.polygon vertex out of range"
                );
            }
        }
        if let Some(c) = &self.circle {
            anyhow::ensure!(c.radius_m > 0.0, "fence.circle.radius_m must be positive");
            anyhow::ensure!(
                c.center.lat.abs() <= 90.0 && c.center.lon.abs() <= 180.0,
                "fence.circle.center out of range"
            );
        }
        if let Some(d) = self.max_hor_dist_m {
            anyhow::ensure!(d > 0.0, "fence.max_hor_dist_m must be positive");
        }
        if let Some(v) = self.max_ver_dist_m {
            anyhow::ensure!(v > 0.0, "fence.max_ver_dist_m must be positive");
        }
        Ok(())
    }

    /// True when the position satisfies every configured horizontal
    /// constraint. Constraints that need home are skipped while home is
    /// not valid.
    pub fn contains_horizontal(&self, lat: f64, lon: f64, home: &Home) -> bool {
        if let Some(poly) = &self.polygon {
            if !geo::point_in_polygon(poly, lat, lon) {
                return false;
            }
        }
        if let Some(c) = &self.circle {
            if geo::haversine_m(c.center.lat, c.center.lon, lat, lon) > c.radius_m {
                return false;
            }
        }
        if let Some(d) = self.max_hor_dist_m {
            if home.position_valid() && geo::haversine_m(home.lat, home.lon, lat, lon) > d {
                return false;
            }
        }
        true
    }

    /// True when the altitude satisfies the vertical constraint.
    pub fn contains_altitude(&self, alt: f32, home: &Home) -> bool {
        match self.max_ver_dist_m {
            Some(v) if home.alt_valid() => alt - home.alt <= v,
            _ => true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeofenceParams {
    /// Minimum time between fence evaluations, s.
    pub check_interval_s: f32,
    /// Distance kept between the hold point and the boundary, m.
    pub margin_m: f64,
    /// Horizontal deceleration available for the braking stop, m/s^2.
    pub max_hor_accel_mss: f32,
    /// Pilot/controller reaction time before braking starts, s.
    pub reaction_delay_s: f32,
    /// When false, violations only warn and the setpoint is left alone.
    pub hold_on_breach: bool,
}

impl Default for GeofenceParams {
    fn default() -> Self {
        Self {
            check_interval_s: 0.2,
            margin_m: 5.0,
            max_hor_accel_mss: 3.0,
            reaction_delay_s: 0.5,
            hold_on_breach: true,
        }
    }
}

/// Result of the latest fence evaluation. Between evaluations the
/// monitor keeps serving this cached value.
#[derive(Debug, Clone, Copy, Default)]
pub struct FenceCheck {
    pub breached: bool,
    pub horizontal: bool,
    pub vertical: bool,
    /// Hold point inside the fence. Only meaningful when `hold_valid`.
    pub hold_lat: f64,
    pub hold_lon: f64,
    pub hold_alt: f32,
    pub hold_valid: bool,
}

/// Throttled fence monitor with edge-triggered operator warnings.
#[derive(Debug)]
pub struct GeofenceMonitor {
    fence: GeofenceDefinition,
    params: GeofenceParams,
    last_check: Option<OffsetDateTime>,
    warning_sent: bool,
    result: FenceCheck,
}

impl GeofenceMonitor {
    pub fn new(fence: GeofenceDefinition, params: GeofenceParams) -> Self {
        Self {
            fence,
            params,
            last_check: None,
            warning_sent: false,
            result: FenceCheck::default(),
        }
    }

    pub fn hold_on_breach(&self) -> bool {
        self.params.hold_on_breach
    }

    pub fn fence(&self) -> &GeofenceDefinition {
        &self.fence
    }

    /// Evaluates the fence at most once per `check_interval_s`; otherwise
    /// returns the cached result. The violation warning fires on the
    /// transition into breach and re-arms once the vehicle is compliant
    /// again.
    pub fn check(
        &mut self,
        sample: &VehicleSample,
        home: &Home,
        notices: &mut Notices,
    ) -> FenceCheck {
        if let Some(last) = self.last_check {
            if (sample.ts - last).as_seconds_f32() < self.params.check_interval_s {
                return self.result;
            }
        }
        self.last_check = Some(sample.ts);

        if !sample.global_valid {
            return self.result;
        }

        let horizontal = !self.fence.contains_horizontal(sample.lat, sample.lon, home);
        let vertical = !self.fence.contains_altitude(sample.alt, home);
        let breached = horizontal || vertical;

        let mut check = FenceCheck {
            breached,
            horizontal,
            vertical,
            ..FenceCheck::default()
        };
        if breached {
            let (lat, lon) = if horizontal {
                self.constrained_stop(sample, home)
            } else {
                (sample.lat, sample.lon)
            };
            check.hold_lat = lat;
            check.hold_lon = lon;
            check.hold_alt = match (vertical, self.fence.max_ver_dist_m, home.alt_valid()) {
                (true, Some(v), true) => home.alt + v - self.params.margin_m as f32,
                _ => sample.alt,
            };
            check.hold_valid = true;

            if !self.warning_sent {
                warn!(horizontal, vertical, "geofence violated");
                notices.warning("Geofence violation: holding position inside fence");
                self.warning_sent = true;
            }
        } else {
            self.warning_sent = false;
        }

        self.result = check;
        check
    }

    /// Stop point the vehicle can reach along its current track, pulled
    /// back toward the vehicle until it clears the fence with margin.
    /// Falls back to the current position when nothing along the track
    /// qualifies, which also covers being outside the fence already.
    fn constrained_stop(&self, sample: &VehicleSample, home: &Home) -> (f64, f64) {
        let speed = sample.ground_speed() as f64;
        let track = sample.ground_track() as f64;
        let accel = f64::from(self.params.max_hor_accel_mss.max(0.1));
        let delay = f64::from(self.params.reaction_delay_s.max(0.0));
        let stop_dist = speed * delay + speed * speed / (2.0 * accel);

        let (north, east) = (track.cos(), track.sin());
        for i in (0..=8).rev() {
            let d = stop_dist * f64::from(i) / 8.0;
            let (lat, lon) = geo::offset_m(sample.lat, sample.lon, north * d, east * d);
            // Probe one margin further out so the hold point keeps its
            // distance from the boundary.
            let probe = geo::offset_m(
                sample.lat,
                sample.lon,
                north * (d + self.params.margin_m),
                east * (d + self.params.margin_m),
            );
            if self.fence.contains_horizontal(probe.0, probe.1, home) {
                return (lat, lon);
            }
        }
        (sample.lat, sample.lon)
    }
}
