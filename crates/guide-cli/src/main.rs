use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use time::OffsetDateTime;
use tracing::{error, info, warn};

use guide_nav::doctor as nav_doctor;
use guide_nav::{
    CruiseParams, GeofenceDefinition, GeofenceParams, MissionPlan, NavParams, Navigator,
    NavigatorConfig, ReplayEvent, RtlParams, SampleSource, TrafficParams, VtolParams,
};
use guide_proto::geo;
use guide_proto::{Home, Notices, Severity, TransponderReport};
use guide_setpoint::{GeneratorParams, SetpointGenerator};

use std::path::Path;

#[derive(Debug, Parser)]
#[command(name = "guide", version, about = "NAVguide - Autonomous Flight Guidance & Safety")]
struct Cli {
    #[arg(long)]
    config: String,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    Doctor,
    Run,
    Mission { #[command(subcommand)] cmd: MissionCmd },
}

#[derive(Debug, Subcommand)]
enum MissionCmd {
    /// Print the stored plan with leg distances and headings.
    Inspect,
}

#[derive(Debug, serde::Deserialize)]
struct Config {
    nav: NavParams,
    cruise: CruiseParams,
    rtl: RtlParams,
    vtol: VtolParams,
    traffic: TrafficParams,
    geofence: GeofenceParams,
    mission: MissionPlan,
    home: Home,
    setpoint: GeneratorParams,
    replay: ReplayCfg,
}

#[derive(Debug, serde::Deserialize)]
struct ReplayCfg {
    sample_file: String,
    fence_file: Option<String>,
    /// Pace playback to the record timestamps instead of reading flat out.
    realtime: Option<bool>,
}

fn load_config(path: &str) -> Result<Config> {
    let s = std::fs::read_to_string(path).context("read config")?;
    Ok(toml::from_str(&s).context("parse config toml")?)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let cfg = load_config(&cli.config)?;

    match cli.cmd {
        Command::Doctor => doctor(&cfg).await?,
        Command::Run => run(&cfg).await?,
        Command::Mission { cmd } => mission_cmd(&cfg, cmd).await?,
    }
    Ok(())
}

async fn doctor(cfg: &Config) -> Result<()> {
    info!("doctor: starting");

    nav_doctor::check_nav(&cfg.nav)?;
    nav_doctor::check_cruise(&cfg.cruise)?;
    nav_doctor::check_rtl(&cfg.rtl)?;
    nav_doctor::check_vtol(&cfg.vtol)?;
    nav_doctor::check_traffic(&cfg.traffic)?;
    nav_doctor::check_mission(&cfg.mission)?;

    let fence = load_fence(&cfg.replay)?;
    nav_doctor::check_geofence(&cfg.geofence, fence.as_ref())?;

    anyhow::ensure!(
        cfg.home.lat.abs() <= 90.0 && cfg.home.lon.abs() <= 180.0,
        "home coordinates invalid"
    );
    anyhow::ensure!(cfg.setpoint.land_speed_mps > 0.0, "setpoint.land_speed_mps must be positive");
    anyhow::ensure!(
        cfg.setpoint.speed_up_mps > 0.0 && cfg.setpoint.speed_down_mps > 0.0,
        "setpoint speed limits must be positive"
    );
    anyhow::ensure!(cfg.setpoint.cruise_speed_mps > 0.0, "setpoint.cruise_speed_mps must be positive");
    anyhow::ensure!(!cfg.replay.sample_file.is_empty(), "replay.sample_file missing");

    info!("doctor: OK");
    Ok(())
}

async fn run(cfg: &Config) -> Result<()> {
    info!("run: starting");

    let fence = load_fence(&cfg.replay)?;
    let mut nav = Navigator::new(
        NavigatorConfig {
            nav: cfg.nav.clone(),
            cruise: cfg.cruise.clone(),
            rtl: cfg.rtl.clone(),
            vtol: cfg.vtol.clone(),
            traffic: cfg.traffic.clone(),
            geofence: cfg.geofence.clone(),
            mission: cfg.mission.clone(),
            home: cfg.home,
        },
        fence,
    );
    let mut generator = SetpointGenerator::new(cfg.setpoint.clone());

    let mut src = SampleSource::open(&cfg.replay.sample_file)?;
    let realtime = cfg.replay.realtime.unwrap_or(false);

    let mut notices = Notices::new();
    let mut traffic: Vec<TransponderReport> = Vec::new();
    // Commands are stamped with the replay clock, not the wall clock.
    let mut clock = OffsetDateTime::now_utc();
    let mut cycles = 0u64;

    while let Some(ev) = src.next_event().await? {
        match ev {
            ReplayEvent::Command(cmd) => nav.handle_command(cmd, clock, &mut notices),
            ReplayEvent::Traffic(report) => traffic.push(report),
            ReplayEvent::Sample(sample) => {
                if realtime {
                    let dt = sample.ts - clock;
                    if dt.is_positive() {
                        tokio::time::sleep(dt.unsigned_abs()).await;
                    }
                }
                clock = sample.ts;

                let out = nav.step(&sample, &traffic, &mut notices);
                traffic.clear();

                if out.mode_changed {
                    generator.activate(&sample);
                }
                let sp = generator.update(&sample, nav.triplet(), &mut notices);
                cycles += 1;

                tracing::debug!(
                    mode = ?out.mode,
                    kind = ?nav.triplet().current.kind,
                    pos = ?sp.position,
                    vel = ?sp.velocity,
                    yaw = sp.yaw,
                    gear = ?sp.gear,
                    "cycle"
                );
                if let Some(c) = &out.traffic_conflict {
                    warn!(callsign = %c.callsign, cpa_m = c.cpa_distance_m, "traffic conflict");
                }
            }
        }

        for n in notices.drain() {
            match n.severity {
                Severity::Info => info!("{}", n.text),
                Severity::Warning => warn!("{}", n.text),
                Severity::Critical => error!("{}", n.text),
            }
        }
    }

    let (next, finished) = nav.mission_progress();
    info!(cycles, mission_next = next, mission_finished = finished, "run: replay complete");
    Ok(())
}

async fn mission_cmd(cfg: &Config, cmd: MissionCmd) -> Result<()> {
    match cmd {
        MissionCmd::Inspect => {
            anyhow::ensure!(!cfg.mission.items.is_empty(), "mission has no items");
            let mut total = 0.0;
            let mut prev: Option<(f64, f64)> = None;
            for (i, item) in cfg.mission.items.iter().enumerate() {
                let (leg_m, heading) = match prev {
                    Some((plat, plon)) => (
                        geo::haversine_m(plat, plon, item.lat, item.lon),
                        geo::bearing_rad(plat, plon, item.lat, item.lon).to_degrees(),
                    ),
                    None => (0.0, 0.0),
                };
                total += leg_m;
                println!(
                    "item {} lat={:.6} lon={:.6} alt_m={:.1} leg_m={:.0} heading={:.0}",
                    i, item.lat, item.lon, item.alt_m, leg_m, heading
                );
                prev = Some((item.lat, item.lon));
            }
            println!("total items={} ground_track_m={:.0}", cfg.mission.items.len(), total);
            Ok(())
        }
    }
}

fn load_fence(replay: &ReplayCfg) -> Result<Option<GeofenceDefinition>> {
    let Some(path) = &replay.fence_file else { return Ok(None); };
    Ok(Some(GeofenceDefinition::load(Path::new(path))?))
}
