mod api;
mod scheduler;
mod sweep;

use anyhow::Context as _;
use chrono::{DateTime, NaiveDate, Utc};
use clap::{Parser, Subcommand};
use followup_channels::{CommandHost, DesktopNotifier, EmailChannel, NotificationHost};
use followup_core::{
    config::{self, Config},
    record::{ApplicationStatus, NewApplication},
    reminder::{reminder_state, set_reminder},
    shellexpand,
    traits::RecordStore,
};
use followup_store::Store;
use std::sync::Arc;
use std::time::Duration;
use sweep::SweepCoordinator;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;

#[derive(Parser)]
#[command(
    name = "followup",
    version,
    about = "Follow-up reminders for job applications"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to config file.
    #[arg(short, long, env = "FOLLOWUP_CONFIG", default_value = "~/.followup/config.toml")]
    config: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the scheduler and the HTTP API until interrupted.
    Start,
    /// Run one sweep and print the report as JSON.
    Sweep {
        /// Evaluate as of this instant (RFC 3339 or YYYY-MM-DD) instead of now.
        #[arg(long)]
        now: Option<String>,
    },
    /// Show configuration and what is currently due.
    Status,
    /// Load an owner's records the way a client does: desktop notifications
    /// for what is due, then a sweep.
    Notify {
        #[arg(long)]
        owner: String,
        #[arg(long)]
        now: Option<String>,
        /// Stay until the shown notifications are clicked or closed, opening
        /// `[desktop].open_url` on each click.
        #[arg(long)]
        wait: bool,
    },
    /// Manage users.
    User {
        #[command(subcommand)]
        command: UserCommands,
    },
    /// Track a new application.
    Add {
        #[arg(long)]
        owner: String,
        #[arg(long)]
        company: String,
        #[arg(long)]
        position: String,
        #[arg(long, default_value = "wishlist")]
        status: ApplicationStatus,
        /// Date applied (RFC 3339 or YYYY-MM-DD). Defaults to now.
        #[arg(long)]
        applied: Option<String>,
        /// When to be reminded (RFC 3339 or YYYY-MM-DD).
        #[arg(long)]
        reminder: Option<String>,
        #[arg(long)]
        location: Option<String>,
        #[arg(long)]
        url: Option<String>,
        #[arg(long)]
        notes: Option<String>,
    },
    /// List an owner's applications.
    List {
        #[arg(long)]
        owner: String,
    },
    /// Set, move, or clear an application's reminder.
    Remind {
        id: String,
        #[arg(long)]
        owner: String,
        #[arg(long, conflicts_with = "clear", required_unless_present = "clear")]
        at: Option<String>,
        #[arg(long)]
        clear: bool,
    },
}

#[derive(Subcommand)]
enum UserCommands {
    /// Create or replace a user.
    Add {
        #[arg(long)]
        id: String,
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        name: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cfg = config::load(&shellexpand(&cli.config))?;
    let _guard = init_tracing(&cfg, matches!(cli.command, Commands::Start))?;

    match cli.command {
        Commands::Start => start(cfg).await?,
        Commands::Sweep { now } => {
            let now = parse_instant_or_now(now.as_deref())?;
            let store = Arc::new(Store::new(&cfg.store).await?);
            let report = build_sweeper(&cfg, store.clone())?.run_sweep(now).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            store.close().await;
        }
        Commands::Status => status(&cli.config, &cfg).await?,
        Commands::Notify { owner, now, wait } => {
            let now = parse_instant_or_now(now.as_deref())?;
            let store = Arc::new(Store::new(&cfg.store).await?);
            let records = store.list_for_owner(&owner).await?;

            let notifier = cfg.desktop.enabled.then(|| {
                let mut host = CommandHost::detect(&cfg.followup.name, cfg.desktop.permission);
                if wait {
                    host = host.with_click_actions(cfg.desktop.open_url.clone());
                }
                DesktopNotifier::new(host, &cfg.desktop)
            });
            let mut shown = 0;
            if let Some(ref notifier) = notifier {
                shown = notifier.notify_due(&records, now).await;
                println!("{shown} desktop notification(s) shown");
            }

            let report = build_sweeper(&cfg, store.clone())?.run_sweep(now).await?;
            println!(
                "sweep: {} processed, {} acknowledged",
                report.processed,
                report.acknowledged()
            );
            store.close().await;

            if let Some(notifier) = notifier.filter(|_| wait && shown > 0) {
                let clicked = notifier.handle_clicks().await;
                println!("{clicked} notification(s) clicked");
            }
        }
        Commands::User {
            command: UserCommands::Add { id, email, name },
        } => {
            let store = Store::new(&cfg.store).await?;
            store
                .upsert_user(&id, email.as_deref(), name.as_deref())
                .await?;
            println!("user {id} saved");
            store.close().await;
        }
        Commands::Add {
            owner,
            company,
            position,
            status,
            applied,
            reminder,
            location,
            url,
            notes,
        } => {
            let application = NewApplication {
                company,
                position,
                location,
                status,
                applied_date: applied.as_deref().map(parse_instant).transpose()?,
                notes,
                url,
                reminder: reminder.as_deref().map(parse_instant).transpose()?,
                ..Default::default()
            };
            let store = Store::new(&cfg.store).await?;
            let record = store.create(&owner, application).await?;
            println!("{}", record.id);
            store.close().await;
        }
        Commands::List { owner } => {
            let store = Store::new(&cfg.store).await?;
            let now = Utc::now();
            for record in store.list_for_owner(&owner).await? {
                let reminder = record
                    .reminder
                    .map(|r| r.format("%Y-%m-%d %H:%M").to_string())
                    .unwrap_or_else(|| "-".to_string());
                println!(
                    "{}  {:<24} {:<28} {:<10} {} ({:?})",
                    record.id,
                    record.company,
                    record.position,
                    record.status.label(),
                    reminder,
                    reminder_state(&record, now)
                );
            }
            store.close().await;
        }
        Commands::Remind {
            id,
            owner,
            at,
            clear,
        } => {
            let reminder = if clear {
                None
            } else {
                at.as_deref().map(parse_instant).transpose()?
            };
            let store = Store::new(&cfg.store).await?;
            let record = store
                .get(&id)
                .await?
                .filter(|r| r.owner_id == owner)
                .with_context(|| format!("no application {id} for owner {owner}"))?;
            let updated = store
                .update(&set_reminder(record, reminder))
                .await?
                .with_context(|| format!("application {id} disappeared"))?;
            match updated.reminder {
                Some(at) => println!("reminder for {id} set to {at}"),
                None => println!("reminder for {id} cleared"),
            }
            store.close().await;
        }
    }

    Ok(())
}

/// Console logging for every command; `start` also writes a daily log file.
fn init_tracing(cfg: &Config, to_file: bool) -> anyhow::Result<Option<WorkerGuard>> {
    use tracing_subscriber::fmt::writer::MakeWriterExt;

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cfg.followup.log_level));

    if !to_file {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
        return Ok(None);
    }

    let log_dir = std::path::PathBuf::from(shellexpand(&cfg.followup.data_dir)).join("logs");
    std::fs::create_dir_all(&log_dir)
        .with_context(|| format!("failed to create {}", log_dir.display()))?;
    let appender = tracing_appender::rolling::daily(log_dir, "followup.log");
    let (file, guard) = tracing_appender::non_blocking(appender);

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr.and(file))
        .init();
    Ok(Some(guard))
}

/// Wire the email channel into a coordinator over `store`.
fn build_sweeper(cfg: &Config, store: Arc<Store>) -> anyhow::Result<SweepCoordinator> {
    let email = EmailChannel::new(cfg.email.clone())?;
    if !email.is_configured() {
        tracing::warn!("email is disabled or has no API key; due reminders will fail delivery");
    }
    let timeout = match cfg.scheduler.delivery_timeout_secs {
        0 => None,
        secs => Some(Duration::from_secs(secs)),
    };
    Ok(SweepCoordinator::new(store.clone(), store, Arc::new(email)).with_delivery_timeout(timeout))
}

async fn start(cfg: Config) -> anyhow::Result<()> {
    let store = Arc::new(Store::new(&cfg.store).await?);
    let sweeper = build_sweeper(&cfg, store.clone())?;

    if !cfg.scheduler.enabled && !cfg.api.enabled {
        anyhow::bail!("Neither the scheduler nor the API is enabled. Enable one in the config.");
    }

    let sched_handle = cfg.scheduler.enabled.then(|| {
        let interval = Duration::from_secs(cfg.scheduler.poll_interval_secs.max(1));
        tokio::spawn(scheduler::scheduler_loop(sweeper.clone(), interval))
    });

    let api_handle = cfg.api.enabled.then(|| {
        let state = api::ApiState::new(&cfg.api, store.clone(), sweeper.clone());
        tokio::spawn(api::serve(cfg.api.clone(), state))
    });

    info!("{} started", cfg.followup.name);
    tokio::signal::ctrl_c().await?;
    info!("Received shutdown signal");

    for handle in [sched_handle, api_handle].into_iter().flatten() {
        handle.abort();
    }
    store.close().await;
    Ok(())
}

async fn status(config_path: &str, cfg: &Config) -> anyhow::Result<()> {
    println!("followup status\n");
    println!("Config: {config_path}");
    println!("Database: {}", shellexpand(&cfg.store.db_path));
    println!();

    let email = EmailChannel::new(cfg.email.clone())?;
    println!(
        "  email: {}",
        if email.is_configured() {
            "configured"
        } else if cfg.email.enabled {
            "enabled but missing api_key"
        } else {
            "disabled"
        }
    );
    println!(
        "  scheduler: {}",
        if cfg.scheduler.enabled {
            format!("every {}s", cfg.scheduler.poll_interval_secs)
        } else {
            "disabled".to_string()
        }
    );
    println!(
        "  api: {}",
        if cfg.api.enabled {
            format!("{}:{}", cfg.api.host, cfg.api.port)
        } else {
            "disabled".to_string()
        }
    );
    let host = CommandHost::detect(&cfg.followup.name, cfg.desktop.permission);
    println!(
        "  desktop: {}",
        match (cfg.desktop.enabled, host.is_supported()) {
            (false, _) => "disabled",
            (true, true) => "available",
            (true, false) => "not supported here",
        }
    );
    println!();

    let store = Store::new(&cfg.store).await?;
    let due = store.find_due_unsent(Utc::now()).await?;
    println!("Due and unsent: {}", due.len());
    store.close().await;
    Ok(())
}

/// Parse an RFC 3339 instant, or a bare date as midnight UTC.
fn parse_instant(raw: &str) -> anyhow::Result<DateTime<Utc>> {
    if let Ok(at) = DateTime::parse_from_rfc3339(raw) {
        return Ok(at.with_timezone(&Utc));
    }
    let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .with_context(|| format!("invalid date '{raw}', expected RFC 3339 or YYYY-MM-DD"))?;
    Ok(date.and_time(chrono::NaiveTime::MIN).and_utc())
}

fn parse_instant_or_now(raw: Option<&str>) -> anyhow::Result<DateTime<Utc>> {
    raw.map(parse_instant).transpose().map(|t| t.unwrap_or_else(Utc::now))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_parse_instant_rfc3339_normalizes_to_utc() {
        let at = parse_instant("2024-01-01T02:00:00+02:00").unwrap();
        assert_eq!(at, Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_parse_instant_bare_date_is_midnight_utc() {
        let at = parse_instant("2024-03-15").unwrap();
        assert_eq!(at, Utc.with_ymd_and_hms(2024, 3, 15, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_parse_instant_rejects_garbage() {
        assert!(parse_instant("next tuesday").is_err());
    }

    #[test]
    fn test_cli_remind_requires_at_or_clear() {
        assert!(Cli::try_parse_from(["followup", "remind", "A", "--owner", "u"]).is_err());
        assert!(Cli::try_parse_from([
            "followup", "remind", "A", "--owner", "u", "--at", "2024-01-01", "--clear"
        ])
        .is_err());
        assert!(Cli::try_parse_from(["followup", "remind", "A", "--owner", "u", "--clear"]).is_ok());
    }

    #[test]
    fn test_cli_notify_wait_flag() {
        let cli = Cli::try_parse_from(["followup", "notify", "--owner", "u", "--wait"]).unwrap();
        assert!(matches!(cli.command, Commands::Notify { wait: true, .. }));

        let cli = Cli::try_parse_from(["followup", "notify", "--owner", "u"]).unwrap();
        assert!(matches!(cli.command, Commands::Notify { wait: false, .. }));
    }

    #[test]
    fn test_cli_add_parses_status() {
        let cli = Cli::try_parse_from([
            "followup",
            "add",
            "--owner",
            "u",
            "--company",
            "Acme",
            "--position",
            "Engineer",
            "--status",
            "interview",
        ])
        .unwrap();
        match cli.command {
            Commands::Add { status, .. } => assert_eq!(status, ApplicationStatus::Interview),
            _ => panic!("expected add"),
        }
    }
}
