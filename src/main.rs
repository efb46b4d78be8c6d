use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use teloxide::Bot;
use tg_postman::storage::FsBlobStore;
use tg_postman::translate::TranslateClient;
use tg_postman::transport::TelegramTransport;
use tg_postman::{config, db, worker};
use tracing::{error, info};

#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Args {
    /// Path to YAML config file
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();

    let args = Args::parse();
    let cfg = config::load(Some(&args.config))?;
    cfg.ensure_dirs()?;

    let database_url = std::env::var("DATABASE_URL")
        .unwrap_or_else(|_| format!("sqlite://{}/postman.db", cfg.app.data_dir));

    let pool = db::init_pool(&database_url).await?;
    db::run_migrations(&pool).await?;

    let transport = TelegramTransport::new(Bot::new(cfg.telegram.bot_token.clone()));
    let translator = TranslateClient::new(
        &cfg.translation.base_url,
        Some(cfg.translation.api_key.clone()),
    )?;
    let blobs = FsBlobStore::new(cfg.app.data_dir.clone());

    let poll_sleep = cfg.poll_interval();
    let send_timeout = cfg.send_timeout();

    // Spawn the delivery worker (single-threaded over posts)
    let worker_pool = pool.clone();
    tokio::spawn(async move {
        loop {
            match worker::process_due_post(
                &worker_pool,
                &transport,
                &translator,
                &blobs,
                send_timeout,
            )
            .await
            {
                Ok(processed) => {
                    if !processed {
                        tokio::time::sleep(poll_sleep).await;
                    }
                }
                Err(err) => {
                    error!(?err, "delivery worker error");
                    tokio::time::sleep(Duration::from_secs(1)).await;
                }
            }
        }
    });

    info!("post delivery worker started");
    tokio::signal::ctrl_c().await?;
    info!("shutting down");

    Ok(())
}
