use anyhow::{Context, Result};
use pitch_scorer::db::{establish_pool, run_migrations};
use pitch_scorer::embedding::EmbeddingHandle;
use pitch_scorer::settings::{settings, watch_settings};
use pitch_scorer::utils::{
    log_db_error, log_db_ready, log_init, log_settings_unwatched, log_shutdown, log_worker_error,
};
use pitch_scorer::worker::{prepare_dirs, process_inbox};
use std::time::Duration;
use tracing::subscriber::set_global_default;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let subscriber = tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive("pitch_scorer=info".parse()?))
        .with(
            fmt::layer()
                .with_target(false)
                .with_thread_ids(false)
                .with_file(false)
                .with_line_number(false)
                .compact(),
        );
    set_global_default(subscriber).context("failed to set tracing subscriber")?;

    let _watcher = match watch_settings() {
        Ok(watcher) => Some(watcher),
        Err(e) => {
            log_settings_unwatched(&e.to_string());
            None
        }
    };

    let s = settings();
    let database_url =
        std::env::var("DATABASE_URL").unwrap_or_else(|_| "evaluations.db".to_string());
    log_init(&database_url, &s.worker.inbox_dir);

    let pool = establish_pool(&database_url)?;
    {
        let mut conn = pool.get().context("failed to get initial connection")?;
        if let Err(e) = run_migrations(&mut conn) {
            log_db_error(&e.to_string());
            return Err(e);
        }
    }
    log_db_ready();

    let embeddings = EmbeddingHandle::spawn(&s.embeddings)?;
    embeddings.ready().await?;

    prepare_dirs(&s.worker).await?;

    let poll_interval = Duration::from_secs(s.worker.poll_interval_secs.max(1));
    let mut interval = tokio::time::interval(poll_interval);
    loop {
        tokio::select! {
            _ = interval.tick() => {
                if let Err(e) = process_inbox(&pool, &embeddings, &settings()).await {
                    log_worker_error(&format!("inbox error: {e:#}"));
                }
            }
            _ = tokio::signal::ctrl_c() => {
                log_shutdown();
                break;
            }
        }
    }

    Ok(())
}
