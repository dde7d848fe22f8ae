//! Runner Binary
//!
//! Runs a small demo strategy against the replay connector until
//! SIGINT/SIGTERM.

use chrono::Utc;
use expert_core::{EventPayload, StreamEvent};
use expert_runner::{ProcessOrchestrator, ReplayConnector, RunnerConfig, load_config, load_default_config};
use expert_strategy::{Strategy, StrategyBuilder};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

fn print_help() {
    eprintln!(
        r#"Expert Runner - event dispatch demo

USAGE:
    expert-runner [OPTIONS]

OPTIONS:
    --config <PATH>     Load runner configuration from JSON file
    --replay <PATH>     Replay stream events from a JSON array file
    --help              Print this help message

ENVIRONMENT VARIABLES:
    RUST_LOG            Log level filter (overrides log_level)
"#
    );
}

fn demo_strategy() -> Strategy {
    let last_price = Arc::new(Mutex::new(Decimal::ZERO));
    let on_tick_price = Arc::clone(&last_price);
    let on_bar_price = Arc::clone(&last_price);

    StrategyBuilder::new("demo")
        .on_init("init", |_| {
            log::info!("[demo] Strategy initialized");
            Ok(())
        })
        .on_tick("track_price", move |payload| {
            let last_price = Arc::clone(&on_tick_price);
            async move {
                if let Some(StreamEvent::Tick(tick)) = payload.as_stream() {
                    *last_price.lock().unwrap_or_else(PoisonError::into_inner) = tick.price;
                    log::info!("[demo] {} @ {}", tick.symbol, tick.price);
                }
                Ok(())
            }
        })
        .on_bar("hourly_close", "1h", move |payload| {
            let last_price = Arc::clone(&on_bar_price);
            async move {
                if let EventPayload::Bar(bar) = payload {
                    let price = *last_price.lock().unwrap_or_else(PoisonError::into_inner);
                    log::info!("[demo] {} bar closed at {}: {}", bar.timeframe.name(), bar.closed_at, price);
                }
                Ok(())
            }
        })
        .on_timer("heartbeat", 5.0, |payload| async move {
            if let EventPayload::Timer(fire) = payload {
                log::info!("[demo] Heartbeat, {:?} elapsed", fire.elapsed);
            }
            Ok(())
        })
        .on_error("report", |payload| {
            if let EventPayload::Error(report) = payload {
                log::warn!("[demo] {} '{}' failed: {}", report.kind, report.callback, report.message);
            }
            Ok(())
        })
        .on_deinit("deinit", |payload| {
            if let EventPayload::Deinit { reason } = payload {
                log::info!("[demo] Strategy stopped: {}", reason);
            }
            Ok(())
        })
        .helper("format_price")
        .build()
}

fn demo_events() -> Vec<StreamEvent> {
    let now = Utc::now();
    [dec!(50000), dec!(50010.5), dec!(49995.25)]
        .into_iter()
        .map(|price| StreamEvent::tick("BTCUSDT", price, dec!(0.01), now))
        .collect()
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Parse command line arguments
    let args: Vec<String> = std::env::args().collect();
    let mut config_path: Option<String> = None;
    let mut replay_path: Option<String> = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--help" | "-h" => {
                print_help();
                return Ok(());
            }
            "--config" | "-c" => {
                i += 1;
                if i >= args.len() {
                    eprintln!("Error: --config requires a path argument");
                    std::process::exit(1);
                }
                config_path = Some(args[i].clone());
            }
            "--replay" | "-r" => {
                i += 1;
                if i >= args.len() {
                    eprintln!("Error: --replay requires a path argument");
                    std::process::exit(1);
                }
                replay_path = Some(args[i].clone());
            }
            arg => {
                eprintln!("Unknown argument: {}", arg);
                print_help();
                std::process::exit(1);
            }
        }
        i += 1;
    }

    let config: RunnerConfig = match &config_path {
        Some(path) => load_config(path)?,
        None => load_default_config()?,
    };

    // Initialize logging
    env_logger::Builder::new()
        .filter_level(config.level_filter()?)
        .parse_default_env()
        .init();

    if let Some(path) = &config_path {
        log::info!("Loaded configuration from: {}", path);
    }

    let connector = match &replay_path {
        Some(path) => ReplayConnector::from_json(&std::fs::read_to_string(path)?)?,
        None => ReplayConnector::new(demo_events()),
    }
    .with_pacing(Duration::from_millis(250))
    .hold_open();

    let descriptor = config.connection.clone().unwrap_or_default();
    let strategy = demo_strategy();
    let mut orchestrator = ProcessOrchestrator::new(&strategy, config).with_connector(connector);

    orchestrator.run_until_signal(&descriptor)?;
    log::info!("Runner exited cleanly");
    Ok(())
}
