use std::path::PathBuf;
use tokio::signal;
use tracing::info;

use clap::Parser;
use misskey_poster::config::PosterConfig;
use misskey_poster::context::{CancelHandle, Context};
use misskey_poster::misskey::{Note, NoteSubmitter, Visibility};

#[derive(Parser)]
#[command(name = "misskey-poster", version, about = "Post a note to a Misskey instance")]
struct Args {
    /// Configuration file (YAML, TOML or JSON)
    #[arg(long, short)]
    config: Option<PathBuf>,

    /// Instance host name, overriding the configuration
    #[arg(long)]
    host: Option<String>,

    /// API access token, overriding the configuration
    #[arg(long, env = "MISSKEY_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Note visibility: public, home, followers or specified
    #[arg(long, default_value = "public")]
    visibility: Visibility,

    /// Give up if the note is not posted within this many seconds
    #[arg(long)]
    timeout_secs: Option<u64>,

    /// Note text
    text: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_target(false)
        .init();

    let args = Args::parse();

    let mut config = PosterConfig::load(args.config.as_deref())?;
    if let Some(host) = args.host {
        config.misskey.host = host;
    }
    if let Some(token) = args.token {
        config.misskey.auth_token = token;
    }
    config.misskey.validate()?;
    info!(host = %config.misskey.host, "Configuration loaded");

    let submitter = NoteSubmitter::new(&config.misskey)?;
    let note = Note::new(args.text, args.visibility)?;

    let (ctx, handle) = Context::with_cancel();
    let ctx = match args.timeout_secs {
        Some(secs) => ctx.with_timeout(std::time::Duration::from_secs(secs)),
        None => ctx,
    };
    tokio::spawn(cancel_on_shutdown(handle));

    submitter.post(&ctx, &note).await?;
    info!(endpoint = %submitter.endpoint(), "Note posted");

    Ok(())
}

/// Cancel in-flight work on a shutdown signal (Ctrl+C or SIGTERM).
async fn cancel_on_shutdown(handle: CancelHandle) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, cancelling");
        }
        _ = terminate => {
            info!("Received SIGTERM, cancelling");
        }
    }

    handle.cancel();
}
