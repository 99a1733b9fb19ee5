//! # MechaHelper — class homework bot
//!
//! Keeps a date-keyed list of homework, lets students subscribe, and
//! broadcasts tomorrow's assignment once a day.
//!
//! Usage:
//!   mechahelper                          # Run the bot (reads ~/.mechahelper/config.toml + MECHA_* env)
//!   mechahelper --config ./bot.toml      # Custom config file
//!   mechahelper --broadcast-now          # Send tomorrow's homework once and exit

mod commands;

use anyhow::Result;
use chrono::Utc;
use clap::Parser;
use commands::CommandRouter;
use futures::StreamExt;
use mecha_channels::TelegramChannel;
use mecha_core::{MechaConfig, Transport};
use mecha_scheduler::{Broadcaster, DailyScheduler};
use mecha_store::{AssignmentService, Clock, MediaStore, RecordStore, SubscriberRegistry};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "mechahelper", version, about = "📘 MechaHelper — homework reminders for your class")]
struct Cli {
    /// Config file (default: ~/.mechahelper/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Broadcast tomorrow's homework immediately and exit
    #[arg(long)]
    broadcast_now: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        "mechahelper=debug,mecha_core=debug,mecha_store=debug,mecha_channels=debug,mecha_scheduler=debug"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_target(false)
        .init();

    let config = match &cli.config {
        Some(path) => {
            let mut config = MechaConfig::load_from(path)?;
            config.apply_env();
            config
        }
        None => MechaConfig::load()?,
    };
    config.validate()?;

    let tz: chrono_tz::Tz = config.tz()?;
    let fire_at = config.fire_time()?;

    // "Tomorrow" follows the class calendar, not the host's.
    let clock: Clock = Arc::new(move || Utc::now().with_timezone(&tz).date_naive());
    let assignments = Arc::new(
        AssignmentService::new(
            RecordStore::new(config.storage.homework_path()),
            MediaStore::new(config.storage.media_path()),
        )
        .with_clock(clock),
    );
    let subscribers = Arc::new(Mutex::new(SubscriberRegistry::open(
        config.storage.subscribers_path(),
    )));
    tracing::info!(
        "📂 {} assignment(s), {} subscriber(s)",
        assignments.list_dates().len(),
        subscribers.lock().await.len()
    );

    let telegram = Arc::new(TelegramChannel::new(config.bot_token.clone(), config.telegram.clone()));
    let transport: Arc<dyn Transport> = telegram.clone();

    let broadcaster = Arc::new(
        Broadcaster::new(assignments.clone(), subscribers.clone(), transport.clone())
            .with_collective(config.group_chat_id.clone()),
    );

    if cli.broadcast_now {
        match broadcaster.fire().await {
            Some(report) => println!(
                "📣 {}: {} delivered, {} failed",
                report.date,
                report.delivered.len(),
                report.failed.len()
            ),
            None => println!("🏖️ No homework for tomorrow."),
        }
        return Ok(());
    }

    match telegram.get_me().await {
        Ok(me) => tracing::info!(
            "🤖 Connected as @{}",
            me.username.as_deref().unwrap_or(&me.first_name)
        ),
        Err(e) => tracing::warn!("⚠️ getMe failed, continuing anyway: {e}"),
    }

    let scheduler = DailyScheduler::new(fire_at, tz);
    let job_broadcaster = broadcaster.clone();
    scheduler.start(move || {
        let broadcaster = job_broadcaster.clone();
        async move {
            broadcaster.fire().await;
        }
    });

    let router = Arc::new(CommandRouter::new(
        assignments,
        subscribers,
        transport,
        &config.admin_ids,
    ));
    let mut events = telegram.start_polling();

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            event = events.next() => {
                let Some(event) = event else {
                    tracing::warn!("⚠️ Update stream closed");
                    break;
                };
                let router = router.clone();
                tokio::spawn(async move {
                    if let Err(e) = router.handle(event).await {
                        tracing::warn!("⚠️ Failed to handle update: {e}");
                    }
                });
            }
            _ = &mut shutdown => {
                tracing::info!("👋 Shutting down");
                break;
            }
        }
    }

    Ok(())
}
