//! Feeder binary: wires the control loop to the simulated rig (default)
//! or the HX711/GPIO backend (`hardware` feature), with structured
//! logging and JSON-lines telemetry on stdout.

mod cli;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use clap::Parser;
use eyre::{Result, WrapErr};
use feeder_config::Config;
use feeder_core::FeedingController;
use feeder_core::mocks::SimClock;
use feeder_hardware::SimRig;
use feeder_traits::{Clock, LimitSwitch, LoadcellAdc, MonotonicClock, MotorDrive};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

use crate::cli::{Cli, Commands};

struct RunOpts {
    ticks: u32,
    tick_ms: u32,
    feed: bool,
    grams_per_day: Option<i32>,
    adjust_deficit_mg: Option<i32>,
    reservoir_g: f32,
    bowl_g: f32,
    jam: bool,
    noise_counts: i32,
    telemetry_ms: u32,
    json: bool,
}

fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();

    let cfg = match &cli.config {
        Some(path) => Config::load(path)
            .wrap_err_with(|| format!("failed to load config {}", path.display()))?,
        None => Config::default(),
    };
    cfg.validate()?;

    init_tracing(&cli, &cfg);

    match cli.cmd {
        Commands::Run {
            ticks,
            tick_ms,
            feed,
            grams_per_day,
            adjust_deficit_mg,
            reservoir_g,
            bowl_g,
            jam,
            noise_counts,
            telemetry_ms,
        } => {
            let opts = RunOpts {
                ticks,
                tick_ms: tick_ms.max(1),
                feed,
                grams_per_day,
                adjust_deficit_mg,
                reservoir_g,
                bowl_g,
                jam,
                noise_counts,
                telemetry_ms,
                json: cli.json,
            };
            run(&cfg, &opts)
        }
        Commands::SelfCheck => self_check(&cfg),
    }
}

/// Console logging goes to stderr so stdout stays a clean telemetry
/// stream. An optional JSON file log is appended when `logging.file` is
/// configured. RUST_LOG overrides everything; otherwise an explicit
/// --log-level wins over the config's level.
fn init_tracing(cli: &Cli, cfg: &Config) {
    let level = if cli.log_level == "info" {
        cfg.logging.level.clone().unwrap_or_else(|| cli.log_level.clone())
    } else {
        cli.log_level.clone()
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let file_layer = cfg.logging.file.as_deref().map(|path| {
        let path = std::path::Path::new(path);
        let dir = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => std::path::Path::new("."),
        };
        let name = path
            .file_name()
            .map_or_else(|| std::ffi::OsString::from("feeder.log"), ToOwned::to_owned);
        let (writer, guard) =
            tracing_appender::non_blocking(tracing_appender::rolling::never(dir, name));
        let _ = cli::FILE_GUARD.set(guard);
        fmt::layer().json().with_writer(writer)
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with((!cli.json).then(|| fmt::layer().with_writer(std::io::stderr)))
        .with(cli.json.then(|| fmt::layer().json().with_writer(std::io::stderr)))
        .init();
}

fn build_controller<A, L, M>(
    adc: A,
    limit: L,
    motor: M,
    clock: Arc<dyn Clock + Send + Sync>,
    cfg: &Config,
    opts: &RunOpts,
) -> Result<FeedingController<A, L, M>>
where
    A: LoadcellAdc,
    L: LimitSwitch,
    M: MotorDrive,
{
    let mut ctl = FeedingController::new(
        adc,
        limit,
        motor,
        clock,
        cfg.sensor.clone().into(),
        cfg.feed.clone().into(),
        cfg.schedule.clone().into(),
    )?;
    if let Some(grams) = opts.grams_per_day {
        ctl.set_grams_per_day(grams);
    }
    if let Some(milligrams) = opts.adjust_deficit_mg {
        ctl.adjust_deficit_mg(milligrams);
    }
    if opts.feed {
        ctl.feed();
    }
    Ok(ctl)
}

#[cfg(not(feature = "hardware"))]
fn run(cfg: &Config, opts: &RunOpts) -> Result<()> {
    let rig = SimRig::new(opts.reservoir_g, opts.bowl_g);
    rig.set_jammed(opts.jam);
    rig.set_noise_counts(opts.noise_counts);

    let bounded = opts.ticks > 0;
    let sim_clock = SimClock::default();
    let clock: Arc<dyn Clock + Send + Sync> = if bounded {
        Arc::new(sim_clock.clone())
    } else {
        Arc::new(MonotonicClock::new())
    };
    let mut ctl = build_controller(rig.adc(), rig.switch(), rig.motor(), clock, cfg, opts)?;
    tracing::info!(
        ticks = opts.ticks,
        tick_ms = opts.tick_ms,
        jam = opts.jam,
        noise_counts = opts.noise_counts,
        "starting simulated control loop"
    );

    let stop = if bounded { None } else { Some(install_stop_handler()?) };
    let mut t_ms: u64 = 0;
    let mut since_telemetry = opts.telemetry_ms;
    let mut remaining = opts.ticks;
    loop {
        if bounded {
            if remaining == 0 {
                break;
            }
            remaining -= 1;
            sim_clock.advance(opts.tick_ms);
        } else {
            if stop.as_ref().is_some_and(|s| s.load(Ordering::SeqCst)) {
                break;
            }
            std::thread::sleep(Duration::from_millis(u64::from(opts.tick_ms)));
        }
        rig.tick(opts.tick_ms);
        ctl.update();
        t_ms += u64::from(opts.tick_ms);
        since_telemetry = since_telemetry.saturating_add(opts.tick_ms);
        if since_telemetry >= opts.telemetry_ms {
            since_telemetry = 0;
            emit_telemetry(&ctl, t_ms, opts.json);
        }
    }
    print_summary(&ctl, opts.json);
    Ok(())
}

#[cfg(feature = "hardware")]
fn run(cfg: &Config, opts: &RunOpts) -> Result<()> {
    use feeder_hardware::hx711::{GpioLimitSwitch, GpioMotor, Hx711};

    if opts.jam || opts.noise_counts != 0 || opts.reservoir_g != 500.0 || opts.bowl_g != 0.0 {
        tracing::warn!("simulation options are ignored on real hardware");
    }

    let adc = Hx711::new(cfg.pins.hx711_dt, cfg.pins.hx711_sck)?;
    let limit = GpioLimitSwitch::new(cfg.pins.limit_in)?;
    let motor = GpioMotor::new(cfg.pins.motor_en)?;
    let clock: Arc<dyn Clock + Send + Sync> = Arc::new(MonotonicClock::new());
    let mut ctl = build_controller(adc, limit, motor, clock, cfg, opts)?;

    let stop = install_stop_handler()?;
    let deadline_ms = u64::from(opts.ticks) * u64::from(opts.tick_ms);
    let mut t_ms: u64 = 0;
    let mut since_telemetry = opts.telemetry_ms;
    while !stop.load(Ordering::SeqCst) {
        std::thread::sleep(Duration::from_millis(u64::from(opts.tick_ms)));
        ctl.update();
        t_ms += u64::from(opts.tick_ms);
        since_telemetry = since_telemetry.saturating_add(opts.tick_ms);
        if since_telemetry >= opts.telemetry_ms {
            since_telemetry = 0;
            emit_telemetry(&ctl, t_ms, opts.json);
        }
        if opts.ticks > 0 && t_ms >= deadline_ms {
            break;
        }
    }
    print_summary(&ctl, opts.json);
    Ok(())
}

fn self_check(cfg: &Config) -> Result<()> {
    let rig = SimRig::new(500.0, 0.0);
    let clock = SimClock::default();
    let mut ctl = FeedingController::new(
        rig.adc(),
        rig.switch(),
        rig.motor(),
        Arc::new(clock.clone()),
        cfg.sensor.clone().into(),
        cfg.feed.clone().into(),
        cfg.schedule.clone().into(),
    )?;
    for _ in 0..50 {
        clock.advance(10);
        rig.tick(10);
        ctl.update();
    }
    println!("self-check: ok ({:?})", ctl.state());
    Ok(())
}

fn install_stop_handler() -> Result<Arc<AtomicBool>> {
    let stop = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&stop);
    ctrlc::set_handler(move || flag.store(true, Ordering::SeqCst))
        .wrap_err("failed to install Ctrl-C handler")?;
    Ok(stop)
}

fn emit_telemetry<A, L, M>(ctl: &FeedingController<A, L, M>, t_ms: u64, json: bool)
where
    A: LoadcellAdc,
    L: LimitSwitch,
    M: MotorDrive,
{
    if json {
        println!(
            "{}",
            serde_json::json!({
                "t_ms": t_ms,
                "state": format!("{:?}", ctl.state()),
                "feeding": ctl.feeding(),
                "deficit_mg": ctl.deficit_mg(),
                "reservoir_g": ctl.reservoir_weight_g(),
                "bowl_g": ctl.bowl_weight_g(),
                "last_feed_g": ctl.last_feed_grams(),
                "error": ctl.error_report().message,
            })
        );
    } else {
        let error = ctl.error_report();
        println!(
            "t={t_ms:>8}ms {:<24} deficit={:>6}mg R={:+7.1}g B={:+7.1}g {}",
            format!("{:?}", ctl.state()),
            ctl.deficit_mg(),
            ctl.reservoir_weight_g(),
            ctl.bowl_weight_g(),
            error.message.unwrap_or("ok"),
        );
    }
}

fn print_summary<A, L, M>(ctl: &FeedingController<A, L, M>, json: bool)
where
    A: LoadcellAdc,
    L: LimitSwitch,
    M: MotorDrive,
{
    let feed = ctl.feed_report();
    let error = ctl.error_report();
    if json {
        println!(
            "{}",
            serde_json::json!({
                "summary": true,
                "feed_result": format!("{:?}", feed.result),
                "feed_arg": feed.arg,
                "deficit_mg": ctl.deficit_mg(),
                "last_feed_g": ctl.last_feed_grams(),
                "error": error.message,
                "severity": format!("{:?}", error.severity),
            })
        );
    } else {
        let report = ctl.state_report();
        println!("{}", report.header);
        println!("{}", report.detail1);
        if !report.large {
            println!("{}", report.detail2);
        }
        println!(
            "feed: {:?} ({})  error: {}",
            feed.result,
            feed.arg,
            error.message.unwrap_or("none"),
        );
    }
}
