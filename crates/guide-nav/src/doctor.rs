use anyhow::Result;

use crate::geofence::{GeofenceDefinition, GeofenceParams};
use crate::modes::{MissionPlan, NavParams, RtlParams, VtolParams};
use crate::speed::CruiseParams;
use crate::traffic::TrafficParams;

pub fn check_nav(nav: &NavParams) -> Result<()> {
    anyhow::ensure!(nav.loiter_radius_m >= 20.0, "nav.loiter_radius_m too small");
    anyhow::ensure!(nav.acceptance_radius_m > 0.0, "nav.acceptance_radius_m must be positive");
    anyhow::ensure!(
        nav.alt_acceptance_mc_m > 0.0 && nav.alt_acceptance_fw_m > 0.0,
        "altitude acceptance radii must be positive"
    );
    anyhow::ensure!(
        nav.alt_acceptance_fw_land_m <= nav.alt_acceptance_fw_m,
        "nav.alt_acceptance_fw_land_m must not exceed nav.alt_acceptance_fw_m"
    );
    anyhow::ensure!(nav.takeoff_min_alt_m >= 1.0, "nav.takeoff_min_alt_m should be >= 1");
    Ok(())
}

pub fn check_cruise(cruise: &CruiseParams) -> Result<()> {
    anyhow::ensure!(cruise.default_mc_mps > 0.0, "cruise.default_mc_mps must be positive");
    anyhow::ensure!(cruise.default_fw_mps > 0.0, "cruise.default_fw_mps must be positive");
    anyhow::ensure!(
        cruise.default_throttle > 0.0 && cruise.default_throttle <= 1.0,
        "cruise.default_throttle out of range"
    );
    Ok(())
}

pub fn check_rtl(rtl: &RtlParams) -> Result<()> {
    anyhow::ensure!(rtl.return_alt_m >= 10.0, "rtl.return_alt_m should be >= 10");
    anyhow::ensure!(
        rtl.descend_alt_m > 0.0 && rtl.descend_alt_m <= rtl.return_alt_m,
        "rtl.descend_alt_m must be in (0, return_alt_m]"
    );
    Ok(())
}

pub fn check_vtol(vtol: &VtolParams) -> Result<()> {
    anyhow::ensure!(vtol.transition_alt_m >= 10.0, "vtol.transition_alt_m should be >= 10");
    anyhow::ensure!(vtol.back_trans_dec_mss > 0.0, "vtol.back_trans_dec_mss must be positive");
    anyhow::ensure!(vtol.descend_alt_m > 0.0, "vtol.descend_alt_m must be positive");
    if let Some(ap) = &vtol.land_approach {
        anyhow::ensure!(
            ap.lat.abs() <= 90.0 && ap.lon.abs() <= 180.0,
            "vtol.land_approach coordinates invalid"
        );
        anyhow::ensure!(ap.alt_above_home_m > 0.0, "vtol.land_approach.alt_above_home_m must be positive");
    }
    Ok(())
}

pub fn check_traffic(traffic: &TrafficParams) -> Result<()> {
    anyhow::ensure!(
        matches!(traffic.mode.as_str(), "off" | "warn" | "rtl"),
        "traffic.mode must be off|warn|rtl"
    );
    anyhow::ensure!(traffic.radius_manned_m > 0.0, "traffic.radius_manned_m must be positive");
    anyhow::ensure!(traffic.radius_unmanned_m > 0.0, "traffic.radius_unmanned_m must be positive");
    anyhow::ensure!(traffic.alt_band_m > 0.0, "traffic.alt_band_m must be positive");
    anyhow::ensure!(traffic.horizon_s > 0.0, "traffic.horizon_s must be positive");
    anyhow::ensure!(traffic.buffer_cap >= 1, "traffic.buffer_cap must be >= 1");
    Ok(())
}

pub fn check_geofence(params: &GeofenceParams, fence: Option<&GeofenceDefinition>) -> Result<()> {
    anyhow::ensure!(
        params.check_interval_s > 0.0 && params.check_interval_s <= 5.0,
        "geofence.check_interval_s should be in (0, 5]"
    );
    anyhow::ensure!(params.margin_m >= 0.0, "geofence.margin_m must not be negative");
    anyhow::ensure!(params.max_hor_accel_mss > 0.0, "geofence.max_hor_accel_mss must be positive");
    if let Some(def) = fence {
        def.validate()?;
    }
    Ok(())
}

pub fn check_mission(plan: &MissionPlan) -> Result<()> {
    for (i, item) in plan.items.iter().enumerate() {
        anyhow::ensure!(
            item.lat.abs() <= 90.0 && item.lon.abs() <= 180.0,
            "mission.items[{i}] coordinates invalid"
        );
        anyhow::ensure!(item.alt_m.is_finite(), "mission.items[{i}].alt_m must be finite");
        if let Some(r) = item.acceptance_radius_m {
            anyhow::ensure!(r > 0.0, "mission.items[{i}].acceptance_radius_m must be positive");
        }
        if let Some(s) = item.speed_mps {
            anyhow::ensure!(s > 0.0, "mission.items[{i}].speed_mps must be positive");
        }
    }
    Ok(())
}
