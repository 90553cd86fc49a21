//! pingmon - A cooperative ICMP liveness and latency monitor.
//!
//! This is the command-line interface for the pingmon library.

#![allow(clippy::uninlined_format_args)]

use anyhow::{Context, Result};
use clap::Parser;
use pingmon::dns::HostResolver;
use pingmon::public_ip::{HttpFetcher, PublicIpProvider, WhatsMyIp};
use pingmon::socket::utils::{has_non_root_capability, is_root};
use pingmon::socket::{IcmpEchoTransport, SocketMode};
use pingmon::{HostSource, MonitorConfig, ProbeScheduler, ProbeStats, SystemClock};
use std::rc::Rc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Timeout for one "what is my IP" request
const WHATSMYIP_TIMEOUT: Duration = Duration::from_secs(5);

/// Get the version string for pingmon
fn get_version() -> &'static str {
    if cfg!(debug_assertions) {
        concat!(env!("CARGO_PKG_VERSION"), "-UNRELEASED")
    } else {
        env!("CARGO_PKG_VERSION")
    }
}

/// Command-line arguments for the monitor.
#[derive(Parser, Debug)]
#[clap(author, version = get_version(), about = "Cooperative ICMP liveness and latency monitor", long_about = None)]
struct Args {
    /// Target to monitor, as NAME=HOST (repeatable)
    #[clap(short, long = "target", value_parser = parse_target)]
    targets: Vec<(String, String)>,

    /// Monitor this machine's public address under NAME
    #[clap(long, value_name = "NAME")]
    public_target: Option<String>,

    /// Public IP service: aws, ipify, icanhazip, or a URL answering in plain text
    #[clap(long, default_value = PublicIpProvider::AwsCheckIp.url())]
    whatsmyip_url: String,

    /// Pause between scheduler ticks in milliseconds
    #[clap(long, default_value_t = 100)]
    tick_interval_ms: u64,

    /// Soft time budget of one tick in milliseconds
    #[clap(long, default_value_t = 500)]
    tick_budget_ms: u64,

    /// Echo reply timeout in milliseconds
    #[clap(long, default_value_t = 1000)]
    probe_timeout_ms: u64,

    /// Exit after this many reports (0 runs forever)
    #[clap(short = 'n', long, default_value_t = 0)]
    rounds: u32,

    /// Socket mode to use (raw, dgram)
    #[clap(long, value_enum)]
    socket_mode: Option<SocketModeArg>,

    /// Output reports as JSON lines
    #[clap(long)]
    json: bool,

    /// Enable verbose logging (use -vv for trace output)
    #[clap(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum SocketModeArg {
    Raw,
    Dgram,
}

impl From<SocketModeArg> for SocketMode {
    fn from(arg: SocketModeArg) -> Self {
        match arg {
            SocketModeArg::Raw => SocketMode::Raw,
            SocketModeArg::Dgram => SocketMode::Dgram,
        }
    }
}

/// JSON output structure for one target
#[derive(Debug, serde::Serialize)]
struct JsonTarget {
    id: String,
    #[serde(flatten)]
    stats: ProbeStats,
}

/// JSON output structure for one report
#[derive(Debug, serde::Serialize)]
struct JsonReport {
    version: String,
    round: u32,
    socket_mode: String,
    targets: Vec<JsonTarget>,
}

/// Parse a `NAME=HOST` target specification
fn parse_target(spec: &str) -> Result<(String, String), String> {
    let (name, host) = spec
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=HOST, got '{spec}'"))?;
    let (name, host) = (name.trim(), host.trim());
    if name.is_empty() || host.is_empty() {
        return Err(format!("expected NAME=HOST, got '{spec}'"));
    }
    Ok((name.to_string(), host.to_string()))
}

/// Map `-v` flags to a default filter; `RUST_LOG` takes precedence
fn log_filter(verbose: u8) -> EnvFilter {
    let default = match verbose {
        0 => "pingmon=info,warn",
        1 => "pingmon=debug,warn",
        _ => "pingmon=trace,debug",
    };
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default))
}

fn init_logging(verbose: u8) {
    tracing_subscriber::fmt()
        .with_env_filter(log_filter(verbose))
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn monitor_config(args: &Args) -> Result<MonitorConfig> {
    let defaults = MonitorConfig::default();
    let config = MonitorConfig::builder()
        .tick_budget(Duration::from_millis(args.tick_budget_ms))
        .probe_timeout(Duration::from_millis(args.probe_timeout_ms))
        .burst_spacing(defaults.burst_spacing)
        .sweep_period(defaults.sweep_period)
        .poll_interval(defaults.poll_interval)
        .build()?;
    Ok(config)
}

fn main() {
    let args = Args::parse();
    init_logging(args.verbose);

    if args.targets.is_empty() && args.public_target.is_none() {
        eprintln!("Error: at least one --target or --public-target is required");
        std::process::exit(1);
    }

    if let Err(e) = run(&args) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run(args: &Args) -> Result<()> {
    let config = monitor_config(args)?;

    // One single-threaded runtime drives every DNS and HTTP lookup
    let runtime = Rc::new(
        tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .context("Failed to create Tokio runtime")?,
    );

    let resolver = HostResolver::new(Rc::clone(&runtime));
    if !is_root() && !has_non_root_capability() {
        tracing::warn!("not root and unprivileged ICMP is not enabled; only CAP_NET_RAW can help");
    }
    let transport = IcmpEchoTransport::open(resolver, args.socket_mode.map(SocketMode::from))?;
    let socket_mode = transport.mode();

    let mut scheduler = ProbeScheduler::new(transport, SystemClock::new(), config);

    for (name, host) in &args.targets {
        scheduler.add_target(name.clone(), host.as_str())?;
    }

    if let Some(name) = &args.public_target {
        let fetcher = HttpFetcher::new(Rc::clone(&runtime), WHATSMYIP_TIMEOUT)?;
        let mut lookup = WhatsMyIp::new(fetcher);
        let url = PublicIpProvider::lookup_url(&args.whatsmyip_url);
        let clock = SystemClock::new();
        scheduler.add_target(
            name.clone(),
            HostSource::resolver(move || lookup.get(&url, &clock).unwrap_or_default().to_string()),
        )?;
    }

    let interval = Duration::from_millis(args.tick_interval_ms);
    let mut round = 0u32;
    loop {
        let report = scheduler.tick()?;
        if report.published {
            round += 1;
            let rows: Vec<JsonTarget> = scheduler
                .targets()
                .map(|target| JsonTarget {
                    id: target.id().to_string(),
                    stats: target.stats(),
                })
                .collect();

            if args.json {
                display_json_report(round, socket_mode, rows)?;
            } else {
                display_text_report(round, &rows);
            }

            if args.rounds != 0 && round >= args.rounds {
                return Ok(());
            }
        }
        std::thread::sleep(interval);
    }
}

fn display_json_report(round: u32, socket_mode: SocketMode, targets: Vec<JsonTarget>) -> Result<()> {
    let report = JsonReport {
        version: get_version().to_string(),
        round,
        socket_mode: socket_mode.description().to_string(),
        targets,
    };
    println!("{}", serde_json::to_string(&report)?);
    Ok(())
}

fn format_row(row: &JsonTarget) -> String {
    let stats = &row.stats;
    if stats.is_down() {
        format!("{:<16} {:>5}/{:<3} {:>6.1}%  down", row.id, stats.lost, stats.sent, stats.loss_percent)
    } else {
        format!(
            "{:<16} {:>5}/{:<3} {:>6.1}%  {:>4} ms  ttl {}",
            row.id, stats.lost, stats.sent, stats.loss_percent, stats.avg_rtt_ms, stats.avg_ttl
        )
    }
}

fn display_text_report(round: u32, rows: &[JsonTarget]) {
    println!("report #{}", round);
    println!("{:<16} {:>9} {:>7}  rtt", "target", "lost/sent", "loss");
    for row in rows {
        println!("{}", format_row(row));
    }
    println!();
}

#[cfg(test)]
#[path = "main_tests.rs"]
mod main_tests;
