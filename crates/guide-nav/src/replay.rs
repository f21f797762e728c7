//! Flight-log replay feeding the navigator offline.
//!
//! One record per line, comma separated, `#` starts a comment:
//!
//! ```text
//! S,<t>,<state>,<frame>,<lat>,<lon>,<alt>,<vn>,<ve>,<vd>,<yaw>,<agl>,<landed>[,<sx>,<sy>,<sz>]
//! C,<t>,<verb>[,<args>...]
//! T,<t>,<icao>,<callsign>,<lat>,<lon>,<alt>,<heading>,<hvel>,<vvel>,<kind>
//! P,<t>,<lat>,<lon>        beacon fix, `P,<t>,-` drops it
//! ```
//!
//! `<t>` is seconds from replay start, angles are degrees. A `-` in a
//! numeric field reads as unset.

use anyhow::{Context, Result};
use time::{Duration, OffsetDateTime};
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader};

use guide_proto::geo::{self, Point};
use guide_proto::{
    EmitterKind, FrameKind, NavState, StickInput, TransponderReport, VehicleSample,
};

use crate::navigator::NavCommand;

/// One timed record from a replay file.
#[derive(Debug, Clone)]
pub enum ReplayEvent {
    Sample(VehicleSample),
    Command(NavCommand),
    Traffic(TransponderReport),
}

pub struct SampleSource {
    reader: BufReader<File>,
    parser: LineParser,
}

impl SampleSource {
    pub fn open(path: &str) -> Result<Self> {
        let f = std::fs::File::open(path).with_context(|| format!("open replay file {}", path))?;
        Ok(Self {
            reader: BufReader::new(File::from_std(f)),
            parser: LineParser::new(OffsetDateTime::now_utc()),
        })
    }

    /// Next record in file order, `None` at end of file.
    pub async fn next_event(&mut self) -> Result<Option<ReplayEvent>> {
        let mut line = String::new();
        loop {
            line.clear();
            let n = self.reader.read_line(&mut line).await?;
            if n == 0 {
                return Ok(None);
            }
            if let Some(ev) = self.parser.parse(line.trim())? {
                return Ok(Some(ev));
            }
        }
    }
}

/// Line-level parser. The local NED origin latches on the first valid
/// sample and the last beacon fix is carried into every later sample.
struct LineParser {
    start: OffsetDateTime,
    origin: Option<(f64, f64, f32)>,
    beacon: Option<Point>,
}

impl LineParser {
    fn new(start: OffsetDateTime) -> Self {
        Self { start, origin: None, beacon: None }
    }

    fn parse(&mut self, s: &str) -> Result<Option<ReplayEvent>> {
        if s.is_empty() || s.starts_with('#') {
            return Ok(None);
        }
        let parts: Vec<&str> = s.split(',').collect();
        match parts[0] {
            "S" => self.parse_sample(&parts),
            "C" => Ok(parse_command(&parts)),
            "T" => Ok(parse_traffic(&parts)),
            "P" => {
                self.beacon = if parts.len() >= 4 {
                    Some(Point { lat: num_f64(parts[2]), lon: num_f64(parts[3]) })
                } else {
                    None
                };
                Ok(None)
            }
            _ => {
                tracing::warn!(record = parts[0], "replay: unknown record");
                Ok(None)
            }
        }
    }

    fn parse_sample(&mut self, parts: &[&str]) -> Result<Option<ReplayEvent>> {
        anyhow::ensure!(parts.len() >= 13, "replay: short sample record {:?}", parts);

        let lat = num_f64(parts[4]);
        let lon = num_f64(parts[5]);
        let alt = num_f32(parts[6]);
        let global_valid = lat.is_finite() && lon.is_finite() && alt.is_finite();
        if global_valid && self.origin.is_none() {
            self.origin = Some((lat, lon, alt));
        }

        let local_pos = match self.origin {
            Some((lat0, lon0, alt0)) if global_valid => {
                let (x, y) = geo::to_xy(lat, lon, lat0, lon0);
                [y as f32, x as f32, -(alt - alt0)]
            }
            _ => [f32::NAN; 3],
        };

        let (frame, is_vtol) = parse_frame(parts[3]);
        let sticks = if parts.len() >= 16 {
            Some(StickInput {
                x: num_f32(parts[13]),
                y: num_f32(parts[14]),
                z: num_f32(parts[15]),
            })
        } else {
            None
        };

        Ok(Some(ReplayEvent::Sample(VehicleSample {
            ts: self.start + Duration::seconds_f64(num_f64(parts[1]).max(0.0)),
            nav_state: parse_state(parts[2]),
            frame,
            is_vtol,
            lat,
            lon,
            alt,
            global_valid,
            local_pos,
            local_valid: local_pos[0].is_finite(),
            velocity: [num_f32(parts[7]), num_f32(parts[8]), num_f32(parts[9])],
            yaw: num_f32(parts[10]).to_radians(),
            dist_to_ground: num_f32(parts[11]),
            landed: parts[12] == "1",
            sticks,
            precision_target: self.beacon,
        })))
    }
}

fn parse_command(parts: &[&str]) -> Option<ReplayEvent> {
    if parts.len() < 3 {
        return None;
    }
    let arg = |i: usize| parts.get(i).copied().unwrap_or("-");
    let cmd = match parts[2] {
        "reposition" => NavCommand::Reposition {
            lat: num_f64(arg(3)),
            lon: num_f64(arg(4)),
            alt: num_f32(arg(5)),
            yaw: num_f32(arg(6)).to_radians(),
            speed: num_f32(arg(7)),
            loiter_radius: num_f32(arg(8)),
        },
        "takeoff" => NavCommand::Takeoff {
            lat: num_f64(arg(3)),
            lon: num_f64(arg(4)),
            alt: num_f32(arg(5)),
        },
        "action" => NavCommand::StartCustomAction {
            id: arg(3).parse().unwrap_or(0),
            timeout_s: num_f32(arg(4)),
        },
        "ack" => NavCommand::AckCustomAction { id: arg(3).parse().unwrap_or(0) },
        "action-reset" => NavCommand::ResetCustomAction,
        "speed" => NavCommand::SetCruiseSpeed { speed_mps: num_f32(arg(3)) },
        "throttle" => NavCommand::SetCruiseThrottle { throttle: num_f32(arg(3)) },
        verb => {
            tracing::warn!(verb, "replay: unknown command");
            return None;
        }
    };
    Some(ReplayEvent::Command(cmd))
}

fn parse_traffic(parts: &[&str]) -> Option<ReplayEvent> {
    if parts.len() < 11 {
        return None;
    }
    Some(ReplayEvent::Traffic(TransponderReport {
        icao_address: parts[2].parse().unwrap_or(0),
        callsign: parts[3].to_string(),
        lat: num_f64(parts[4]),
        lon: num_f64(parts[5]),
        alt: num_f32(parts[6]),
        heading: num_f32(parts[7]).to_radians(),
        hor_velocity: num_f32(parts[8]),
        ver_velocity: num_f32(parts[9]),
        emitter: match parts[10] {
            "uav" => EmitterKind::Uav,
            "manned" => EmitterKind::Manned,
            _ => EmitterKind::Unknown,
        },
    }))
}

fn parse_state(s: &str) -> NavState {
    match s {
        "mission" => NavState::AutoMission,
        "loiter" => NavState::AutoLoiter,
        "rtl" => NavState::AutoRtl,
        "takeoff" => NavState::AutoTakeoff,
        "vtol-takeoff" => NavState::AutoVtolTakeoff,
        "land" => NavState::AutoLand,
        "precland" => NavState::AutoPrecland,
        "engine-fail" => NavState::AutoLandEngFail,
        "posctl" => NavState::PosCtl,
        "altctl" => NavState::AltCtl,
        "stab" => NavState::Stabilized,
        "acro" => NavState::Acro,
        "offboard" => NavState::Offboard,
        "descend" => NavState::Descend,
        "term" => NavState::Termination,
        _ => NavState::Manual,
    }
}

fn parse_frame(s: &str) -> (FrameKind, bool) {
    match s {
        "fw" => (FrameKind::FixedWing, false),
        "vtol-mc" => (FrameKind::RotaryWing, true),
        "vtol-fw" => (FrameKind::FixedWing, true),
        _ => (FrameKind::RotaryWing, false),
    }
}

fn num_f64(s: &str) -> f64 {
    s.parse().unwrap_or(f64::NAN)
}

fn num_f32(s: &str) -> f32 {
    s.parse().unwrap_or(f32::NAN)
}
