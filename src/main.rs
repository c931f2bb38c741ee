use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

use student_intake::bot::Bot;
use student_intake::channels::{Channel, CliChannel, TelegramChannel};
use student_intake::config::BotConfig;
use student_intake::dialogue::DialogueEngine;
use student_intake::store::{Database, LibSqlBackend};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = BotConfig::from_env().context("Invalid configuration")?;

    // ── Logging: stderr plus a daily-rotated file ────────────────────────
    std::fs::create_dir_all(&config.log_dir)
        .with_context(|| format!("Failed to create log directory {}", config.log_dir.display()))?;
    let file_appender = tracing_appender::rolling::daily(&config.log_dir, "bot.log");
    let (file_writer, _log_guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(fmt::layer().with_ansi(false).with_writer(file_writer))
        .init();

    eprintln!("🎓 Student Intake v{}", env!("CARGO_PKG_VERSION"));

    // ── Database ─────────────────────────────────────────────────────────
    let db: Arc<dyn Database> = Arc::new(
        LibSqlBackend::new_local(&config.db_path)
            .await
            .with_context(|| format!("Failed to open database at {}", config.db_path.display()))?,
    );
    eprintln!("   Database: {}", config.db_path.display());

    let engine = Arc::new(DialogueEngine::new(db));

    // ── Channel ──────────────────────────────────────────────────────────
    let channel: Arc<dyn Channel> = match config.telegram_token.clone() {
        Some(token) => {
            eprintln!("   Channel: telegram (poll timeout {}s)", config.poll_timeout_secs);
            Arc::new(TelegramChannel::new(token, config.poll_timeout_secs))
        }
        None => {
            eprintln!("   Channel: cli (set TELEGRAM_BOT_TOKEN to use Telegram)");
            eprintln!("   Type /start to begin. Press buttons with !confirm or !cancel.\n");
            Arc::new(CliChannel::new())
        }
    };

    Bot::new(engine, channel).run().await?;
    Ok(())
}
