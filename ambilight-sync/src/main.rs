// Copyright 2024 ambilight-sync Authors
// SPDX-License-Identifier: Apache-2.0

//! ambilight-sync CLI entry point
//!
//! Mirrors the screen edges onto the LED strip until interrupted.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Context};
use clap::{Arg, ArgAction, ArgMatches, Command};
use log::{info, warn, LevelFilter};
use simple_logger::SimpleLogger;

use ambilight_sync::capture::DefaultCapture;
use ambilight_sync::config::SegmentRecord;
use ambilight_sync::engine::DEFAULT_STOP_TIMEOUT;
use ambilight_sync::flow::{layout, StartPosition};
use ambilight_sync::{
    CaptureRegion, ConfigSnapshot, PersistedConfig, SegmentEdge, StartOutcome, SyncEngine,
    Traversal, UdpTransmitter,
};

fn cli() -> Command {
    Command::new("ambilight-sync")
        .version(env!("CARGO_PKG_VERSION"))
        .author("ambilight-sync Authors")
        .about("Screen edge color sync for WLED strips")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("PATH")
                .global(true)
                .help("Configuration file written by the strip configurator"),
        )
        .arg(
            Arg::new("region")
                .short('r')
                .long("region")
                .value_name("X,Y,W,H")
                .global(true)
                .value_parser(|s: &str| s.parse::<CaptureRegion>().map_err(|e| e.to_string()))
                .help("Screen region to capture"),
        )
        .arg(
            Arg::new("host")
                .long("host")
                .value_name("HOST")
                .global(true)
                .help("Override the device address"),
        )
        .arg(
            Arg::new("port")
                .long("port")
                .value_name("PORT")
                .global(true)
                .value_parser(clap::value_parser!(u16))
                .help("Override the device UDP port"),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Enable verbose logging"),
        )
        .subcommand(Command::new("run").about("Run the sync loop until Ctrl+C (default)"))
        .subcommand(Command::new("layout").about("Print where each segment lands on the strip"))
        .subcommand(
            Command::new("flow")
                .about("Print a segment template for a starting position")
                .arg(
                    Arg::new("start")
                        .long("start")
                        .value_name("POSITION")
                        .required(true)
                        .value_parser(|s: &str| {
                            s.parse::<StartPosition>().map_err(|e| e.to_string())
                        })
                        .help("Corner or side where the strip begins, e.g. top_left_corner"),
                )
                .arg(
                    Arg::new("counter-clockwise")
                        .long("counter-clockwise")
                        .action(ArgAction::SetTrue)
                        .help("Walk the screen counter-clockwise"),
                ),
        )
}

fn main() -> anyhow::Result<()> {
    let matches = cli().get_matches();

    let log_level = if matches.get_flag("verbose") {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    SimpleLogger::new()
        .with_level(log_level)
        .init()
        .context("Failed to initialize logger")?;

    match matches.subcommand() {
        Some(("layout", _)) => print_layout(&load_config(&matches)?),
        Some(("flow", sub)) => print_flow(sub),
        _ => run(&matches),
    }
}

fn load_config(matches: &ArgMatches) -> anyhow::Result<PersistedConfig> {
    let path = matches
        .get_one::<String>("config")
        .ok_or_else(|| anyhow!("--config is required"))?;
    let mut config = PersistedConfig::load(Path::new(path))
        .with_context(|| format!("Failed to load configuration from {path}"))?;

    if let Some(host) = matches.get_one::<String>("host") {
        config.wled_ip = host.clone();
    }
    if let Some(port) = matches.get_one::<u16>("port") {
        config.wled_port = *port;
    }
    if let Some(region) = matches.get_one::<CaptureRegion>("region") {
        config.capture_region = Some(*region);
    }
    Ok(config)
}

#[cfg(all(target_os = "linux", feature = "x11"))]
fn screen_region(capture: &DefaultCapture) -> anyhow::Result<CaptureRegion> {
    capture
        .screen_region()
        .context("Failed to query the screen size")
}

#[cfg(not(all(target_os = "linux", feature = "x11")))]
fn screen_region(_capture: &DefaultCapture) -> anyhow::Result<CaptureRegion> {
    bail!("No capture region configured, pass --region")
}

fn run(matches: &ArgMatches) -> anyhow::Result<()> {
    let config = load_config(matches)?;
    let capture = DefaultCapture::default();
    let region = match config.capture_region {
        Some(region) => region,
        None => screen_region(&capture)?,
    };

    let snapshot =
        ConfigSnapshot::from_persisted(&config, region).context("Invalid configuration")?;
    let transmitter = UdpTransmitter::new(snapshot.device().host.clone(), snapshot.device().port);

    info!(
        "Starting ambilight-sync: {} LEDs to {}, region {},{} {}x{}",
        snapshot.num_leds(),
        snapshot.device(),
        region.x,
        region.y,
        region.width,
        region.height
    );

    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    })
    .context("Failed to install Ctrl+C handler")?;

    let mut engine = SyncEngine::new();
    match engine.start(snapshot, capture, transmitter)? {
        StartOutcome::Started => {}
        StartOutcome::AlreadyRunning => bail!("Sync engine already running"),
        StartOutcome::Stopping => bail!("Previous sync worker is still stopping"),
    }
    info!("Sync running, press Ctrl+C to stop");

    while running.load(Ordering::SeqCst) {
        if !engine.is_running() {
            warn!("Sync worker exited unexpectedly");
            break;
        }
        std::thread::sleep(Duration::from_millis(100));
    }

    info!("Stopping ambilight-sync...");
    if !engine.stop(DEFAULT_STOP_TIMEOUT) {
        warn!("Sync worker still busy after {:?}", DEFAULT_STOP_TIMEOUT);
    }
    info!("ambilight-sync stopped");
    Ok(())
}

fn print_layout(config: &PersistedConfig) -> anyhow::Result<()> {
    let flow = config.flow();
    let summary = layout(&flow, config.led_start_offset, config.num_leds);

    println!(
        "{} LEDs, offset {}, {}",
        config.num_leds,
        config.led_start_offset,
        serde_json::to_string(&config.traversal_direction)?.trim_matches('"')
    );
    for span in &summary.spans {
        let range = match span.last() {
            Some(last) => format!("{}-{}", span.first, last),
            None => "empty".to_string(),
        };
        let note = match &span.edge {
            SegmentEdge::Known(edge) => config.traversal_direction.describe(*edge),
            SegmentEdge::Unrecognized(_) => "unrecognized, left dark".to_string(),
        };
        println!(
            "  {:<14} {:>4} LEDs  {:<9}  {:?}  {}",
            span.edge, span.led_count, range, span.direction, note
        );
    }
    println!("Total active LEDs: {}", summary.active);
    if summary.remaining < 0 {
        println!(
            "Segments overrun the strip by {} LEDs, the excess is dropped",
            -summary.remaining
        );
    } else {
        println!("Remaining LEDs: {}", summary.remaining);
    }
    Ok(())
}

fn print_flow(matches: &ArgMatches) -> anyhow::Result<()> {
    let start = *matches
        .get_one::<StartPosition>("start")
        .ok_or_else(|| anyhow!("--start is required"))?;
    let traversal = if matches.get_flag("counter-clockwise") {
        Traversal::CounterClockwise
    } else {
        Traversal::Clockwise
    };

    let records: Vec<SegmentRecord> = start
        .template(traversal)
        .iter()
        .map(|segment| SegmentRecord::describe(segment, traversal))
        .collect();
    println!("{}", serde_json::to_string_pretty(&records)?);
    Ok(())
}
