mod alarm;
mod bus;
mod clock;
mod config;
mod configure;
mod notify;

use alarm::types::{parse_time_of_day, AlarmDraft, RepeatRule};
use alarm::AlarmService;
use anyhow::{anyhow, Result};
use clap::{Args, Parser, Subcommand};
use notify::desktop::{CommandChannel, CommandPermission, HostBanner, HostWindow};
use notify::{DeliveryStyle, Notifier};
use std::sync::Arc;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "femtoalarm", version, about = "femtoalarm CLI")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the alarm scheduler in the foreground
    Run,
    Configure,
    /// Set the delivery style (system or alternate)
    Style { style: DeliveryStyle },
    /// Send a test notification through the system channel
    TestNotify,
    Alarm {
        #[command(subcommand)]
        command: AlarmCommands,
    },
}

#[derive(Subcommand)]
enum AlarmCommands {
    List,
    Status,
    Add(AlarmArgs),
    Edit {
        #[arg(long)]
        id: String,
        #[command(flatten)]
        fields: EditArgs,
    },
    Remove {
        #[arg(long)]
        id: String,
    },
    Toggle {
        #[arg(long)]
        id: String,
    },
}

#[derive(Args)]
struct AlarmArgs {
    /// Time of day, HH:MM
    #[arg(long)]
    at: String,
    #[arg(long, default_value = "")]
    label: String,
    /// once, daily, workdays, mon-sat, custom:0,6 or shift:YYYY-MM-DD:WORK:REST
    #[arg(long, default_value = "once")]
    repeat: RepeatRule,
    #[arg(long)]
    disabled: bool,
}

#[derive(Args)]
struct EditArgs {
    #[arg(long)]
    at: Option<String>,
    #[arg(long)]
    label: Option<String>,
    #[arg(long)]
    repeat: Option<RepeatRule>,
    #[arg(long)]
    disabled: Option<bool>,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();

    let cli = Cli::parse();
    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => run().await,
        Commands::Configure => configure::run(),
        Commands::Style { style } => configure::set_delivery_style(style),
        Commands::TestNotify => test_notify().await,
        Commands::Alarm { command } => handle_alarm(command).await,
    }
}

fn build_service(cfg: &config::AppConfig, bus: bus::HostBus) -> AlarmService {
    let notifier = Notifier::new(
        Arc::new(CommandChannel::new(&cfg.system)),
        Arc::new(CommandPermission::new(&cfg.system)),
        Arc::new(HostBanner::new(bus.clone())),
        Arc::new(HostWindow::new(bus)),
        cfg.delivery_style,
    );
    AlarmService::new(cfg, notifier, Arc::new(clock::SystemClock))
}

async fn run() -> Result<()> {
    let cfg = config::AppConfig::load()?;
    let (bus, host) = bus::HostBus::new();

    let service = build_service(&cfg, bus);
    info!(style = %service.delivery_style(), "Delivery style");
    let scheduler = service.start().await;

    // The terminal is the host surface: banners print, restores are no-ops.
    let host_task = tokio::spawn(async move {
        while let Some(event) = host.recv().await {
            match event {
                bus::HostEvent::Banner { title, body } => {
                    println!("\u{7}[{}] {}", title, body.replace('\n', " "));
                }
                bus::HostEvent::Restore => debug!("Host surface restore requested"),
            }
        }
    });

    wait_for_shutdown(&service).await?;
    service.stop();
    scheduler.await?;
    host_task.abort();
    Ok(())
}

/// Waits for Ctrl-C. On unix, SIGHUP re-reads the delivery style so
/// `femtoalarm style` applies to a running scheduler.
#[cfg(unix)]
async fn wait_for_shutdown(service: &AlarmService) -> Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut hangup = signal(SignalKind::hangup())?;
    loop {
        tokio::select! {
            res = tokio::signal::ctrl_c() => return Ok(res?),
            _ = hangup.recv() => match config::AppConfig::load() {
                Ok(cfg) => service.set_delivery_style(cfg.delivery_style),
                Err(e) => error!("Failed to reload config: {:#}", e),
            },
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_shutdown(_service: &AlarmService) -> Result<()> {
    tokio::signal::ctrl_c().await?;
    Ok(())
}

async fn test_notify() -> Result<()> {
    let cfg = config::AppConfig::load()?;
    let (bus, _host) = bus::HostBus::new();
    let service = build_service(&cfg, bus);
    match service.send_test_notification().await {
        Ok(()) => println!("Test notification sent via {}.", cfg.system.command),
        Err(e) => println!("Test notification failed: {}", e),
    }
    Ok(())
}

async fn handle_alarm(cmd: AlarmCommands) -> Result<()> {
    let cfg = config::AppConfig::load()?;
    // CLI operations act on the store only; nothing is delivered here.
    let (bus, _host) = bus::HostBus::new();
    let service = build_service(&cfg, bus);

    match cmd {
        AlarmCommands::List => {
            let alarms = service.list_alarms().await?;
            if alarms.is_empty() {
                println!("No alarms found.");
            } else {
                println!(
                    "{:<10} {:<6} {:<20} {:<24} {:<10} {:<20}",
                    "ID", "Time", "Label", "Repeat", "Status", "Next"
                );
                println!("{:-<90}", "");
                let now = service.now();
                for alarm in alarms {
                    let next = alarm::recurrence::next_occurrence(&alarm, now)
                        .map(|at| at.format("%Y-%m-%d %H:%M").to_string())
                        .unwrap_or_else(|| "N/A".to_string());
                    println!(
                        "{:<10} {:<6} {:<20} {:<24} {:<10} {:<20}",
                        alarm.id,
                        alarm.time_label(),
                        alarm.label,
                        alarm.repeat.to_string(),
                        if alarm.enabled { "Enabled" } else { "Disabled" },
                        next
                    );
                }
            }
        }
        AlarmCommands::Status => {
            let status = service.status().await?;
            let next = status
                .next_alarm
                .map(|(id, at)| format!("{} ({})", at.format("%Y-%m-%d %H:%M"), id))
                .unwrap_or_else(|| "N/A".to_string());
            println!("Alarms: {}", status.alarms);
            println!("Enabled alarms: {}", status.enabled_alarms);
            println!("Next alarm: {}", next);
            println!("Delivery style: {}", service.delivery_style());
        }
        AlarmCommands::Add(args) => {
            let (hour, minute) = parse_time_of_day(&args.at)?;
            let alarm = service
                .create_alarm(AlarmDraft {
                    hour,
                    minute,
                    label: args.label,
                    enabled: !args.disabled,
                    repeat: args.repeat,
                })
                .await?;
            println!("Alarm {} added for {}.", alarm.id, alarm.time_label());
        }
        AlarmCommands::Edit { id, fields } => {
            let current = service
                .get_alarm(&id)
                .await?
                .ok_or_else(|| anyhow!("Alarm not found: {}", id))?;
            let (hour, minute) = match fields.at {
                Some(at) => parse_time_of_day(&at)?,
                None => (current.hour, current.minute),
            };
            let alarm = service
                .update_alarm(
                    &id,
                    AlarmDraft {
                        hour,
                        minute,
                        label: fields.label.unwrap_or(current.label),
                        enabled: fields.disabled.map(|d| !d).unwrap_or(current.enabled),
                        repeat: fields.repeat.unwrap_or(current.repeat),
                    },
                )
                .await?;
            println!("Alarm {} updated ({} {}).", alarm.id, alarm.time_label(), alarm.repeat);
        }
        AlarmCommands::Remove { id } => match service.remove_alarm(&id).await {
            Ok(true) => println!("Alarm removed."),
            Ok(false) => println!("Alarm not found."),
            Err(e) => println!("Error removing alarm: {}", e),
        },
        AlarmCommands::Toggle { id } => {
            let alarm = service.toggle_alarm(&id).await?;
            println!(
                "Alarm {} {}.",
                alarm.id,
                if alarm.enabled { "enabled" } else { "disabled" }
            );
        }
    }
    Ok(())
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}
