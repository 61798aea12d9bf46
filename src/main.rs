use anyhow::{Context, Result};
use auto_clicker::config::{format_duration, parse_duration, INTERVAL_PRESETS};
use auto_clicker::reporter::nominal_cps;
use auto_clicker::{
    ClickKind, ClickLimit, ClickerHandle, HotkeyBindings, HotkeyGateway, RunConfig, RunEnd,
    RunState, SchedulerEvent, Settings, SignalRouter, Status, SystemPlatform, TargetKind,
    TargetMode,
};
use clap::Parser;
use colored::Colorize;
use std::io::Write;
use std::mem;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "autoclick", version, about = "Automated mouse clicking with global hotkeys")]
struct Cli {
    /// Load settings from a JSON file
    #[arg(short, long)]
    config: Option<String>,

    /// Delay between clicks, e.g. "100ms", "2s"
    #[arg(short, long, value_parser = parse_duration_arg)]
    interval: Option<Duration>,

    /// Click kind: left, right or double
    #[arg(short, long)]
    kind: Option<ClickKind>,

    /// Number of clicks before stopping
    #[arg(short = 'n', long, conflicts_with = "continuous")]
    count: Option<u64>,

    /// Click until stopped
    #[arg(long)]
    continuous: bool,

    /// Safety countdown before clicking starts ("0" disables it)
    #[arg(long, value_parser = parse_duration_arg)]
    countdown: Option<Duration>,

    /// Target: follow-cursor, fixed-point, screen-center, active-window-center
    #[arg(short, long)]
    target: Option<TargetKind>,

    /// X coordinate for fixed-point targeting
    #[arg(short = 'x', long, allow_hyphen_values = true)]
    x: Option<i32>,

    /// Y coordinate for fixed-point targeting
    #[arg(short = 'y', long, allow_hyphen_values = true)]
    y: Option<i32>,

    /// Write the effective settings to this file
    #[arg(long)]
    save_config: Option<String>,

    /// Skip global hotkeys: start right away and exit when the run ends
    #[arg(long)]
    no_hotkeys: bool,

    /// Start clicking immediately instead of waiting for the start hotkey
    #[arg(long)]
    start: bool,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,

    /// List common click intervals and exit
    #[arg(long)]
    presets: bool,
}

impl Cli {
    fn apply(&self, settings: &mut Settings) {
        if let Some(interval) = self.interval {
            settings.interval = interval;
        }
        if let Some(kind) = self.kind {
            settings.kind = kind;
        }
        if let Some(count) = self.count {
            settings.count = count;
            settings.continuous = false;
        }
        if self.continuous {
            settings.continuous = true;
        }
        if let Some(countdown) = self.countdown {
            settings.countdown = countdown;
        }
        if let Some(target) = self.target {
            settings.target = target;
        }
        if let Some(x) = self.x {
            settings.x = x;
        }
        if let Some(y) = self.y {
            settings.y = y;
        }
        if self.verbose {
            settings.verbose = true;
        }
    }
}

fn parse_duration_arg(value: &str) -> std::result::Result<Duration, String> {
    parse_duration(value).map_err(|e| e.to_string())
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.presets {
        for interval in INTERVAL_PRESETS {
            println!(
                "{:>7}  {:>6.2} cps",
                format_duration(interval),
                nominal_cps(interval)
            );
        }
        return Ok(());
    }

    let mut settings = match &cli.config {
        Some(path) => Settings::from_file(path).context("Failed to load settings")?,
        None => Settings::default(),
    };
    cli.apply(&mut settings);
    init_tracing(settings.verbose);
    settings.validate().context("Invalid settings")?;

    if let Some(path) = &cli.save_config {
        settings
            .save_to_file(path)
            .context("Failed to save settings")?;
        println!("{} {}", "Settings saved to".green(), path);
    }

    let clicker = auto_clicker::spawn(Arc::new(SystemPlatform::new()));
    let run_config = settings.run_config();
    print_summary(&run_config);

    if cli.no_hotkeys {
        let events = clicker.subscribe();
        clicker.start(run_config).context("Start rejected")?;
        return watch_until_finished(&clicker, events).await;
    }

    clicker.configure(run_config).context("Start rejected")?;

    let bindings = HotkeyBindings::from_settings(&settings.hotkeys)?;
    let (router, mut picks) = SignalRouter::new(clicker.clone());
    let mut gateway = HotkeyGateway::start(bindings, router)?;

    println!(
        "{} {} start • {} stop • {} pick • {} panic-stop • Ctrl+C quit",
        "Hotkeys:".bold(),
        settings.hotkeys.start.to_uppercase().cyan(),
        settings.hotkeys.stop.to_uppercase().cyan(),
        settings.hotkeys.pick.to_uppercase().cyan(),
        settings.hotkeys.panic.to_uppercase().red(),
    );

    if cli.start {
        clicker.start_staged()?;
    }

    let mut status = clicker.status();
    let mut view = StatusView::default();
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            changed = status.changed() => {
                if changed.is_err() {
                    break;
                }
                view.render(&status.borrow_and_update());
            }
            Some(point) = picks.recv() => {
                println!("\n{} {}", "Picked".cyan(), point);
                settings.x = point.x;
                settings.y = point.y;
                if settings.target == TargetKind::FixedPoint {
                    if let Err(e) = clicker.configure(settings.run_config()) {
                        eprintln!("{} {}", "Cannot use picked point:".red(), e);
                    }
                }
            }
            _ = &mut ctrl_c => {
                clicker.panic()?;
                println!("\n{}", "Exiting".yellow());
                break;
            }
        }
    }

    gateway.shutdown();
    Ok(())
}

/// Show live status for a single run and return once it has ended.
async fn watch_until_finished(
    clicker: &ClickerHandle,
    mut events: tokio::sync::broadcast::Receiver<SchedulerEvent>,
) -> Result<()> {
    let mut status = clicker.status();
    let mut view = StatusView::default();
    let mut panic_sent = false;
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(SchedulerEvent::RunFinished { end, clicks }) => {
                    view.finish(end, clicks);
                    return Ok(());
                }
                Ok(_) | Err(RecvError::Lagged(_)) => {}
                Err(RecvError::Closed) => return Ok(()),
            },
            changed = status.changed() => {
                if changed.is_ok() {
                    view.render(&status.borrow_and_update());
                }
            }
            _ = &mut ctrl_c, if !panic_sent => {
                clicker.panic()?;
                panic_sent = true;
            }
        }
    }
}

fn print_summary(config: &RunConfig) {
    let limit = match config.limit {
        ClickLimit::Finite(n) => format!("{} clicks", n),
        ClickLimit::Continuous => "continuous".to_string(),
    };
    let target = match config.target {
        TargetMode::FixedPoint(p) => format!("fixed point {}", p),
        other => other.kind().to_string(),
    };
    println!(
        "{} {:?} every {} ({:.2} cps), {}, target {}, countdown {}",
        "Auto clicker:".bold(),
        config.kind,
        format_duration(config.interval),
        nominal_cps(config.interval),
        limit,
        target,
        format_duration(config.countdown),
    );
}

/// Console rendering of [`Status`] updates.
#[derive(Default)]
struct StatusView {
    last_state: Option<RunState>,
    last_warning: Option<String>,
}

impl StatusView {
    fn render(&mut self, status: &Status) {
        let state_changed = self
            .last_state
            .is_none_or(|s| mem::discriminant(&s) != mem::discriminant(&status.state));

        match status.state {
            RunState::CountingDown { remaining } => {
                if self.last_state != Some(status.state) {
                    println!("{} {}…", "Starting in".yellow(), remaining);
                }
            }
            RunState::Running { .. } => {
                if state_changed {
                    println!("{}", "Running".green().bold());
                }
                print!(
                    "\r  clicks: {:>8}   rate: {:>7.2} cps   missed: {}",
                    status.clicks_done, status.current_cps, status.missed_clicks
                );
                let _ = std::io::stdout().flush();
            }
            RunState::Stopping => {}
            RunState::Idle => {
                if state_changed && self.last_state.is_some() {
                    println!("\n{}", "Idle".dimmed());
                }
            }
        }

        if status.last_warning != self.last_warning {
            if let Some(warning) = &status.last_warning {
                println!("\n{} {}", "Warning:".yellow(), warning);
            }
            self.last_warning = status.last_warning.clone();
        }

        self.last_state = Some(status.state);
    }

    fn finish(&self, end: RunEnd, clicks: u64) {
        let message = match end {
            RunEnd::Completed => format!("Completed after {} clicks", clicks).green(),
            RunEnd::Stopped => format!("Stopped by user after {} clicks", clicks).yellow(),
            RunEnd::Panicked => format!("Panic stop after {} clicks", clicks).red(),
        };
        println!("\n{}", message.bold());
    }
}
