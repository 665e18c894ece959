mod action;
mod app;
mod app_state;
mod components;
mod mpv;
mod session;
mod theme;
mod widgets;

use tokio::sync::{broadcast, mpsc};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let data_dir = zaptv_core::platform::data_dir();
    std::fs::create_dir_all(&data_dir)?;

    let log_path = data_dir.join("zaptv.log");
    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)?;

    // RUST_LOG overrides; default keeps app code chatty but silences HTTP
    // client internals.
    let log_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "debug,hyper_util=warn,reqwest=warn,hyper=warn".to_string());
    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_env_filter(log_filter.as_str())
        .with_ansi(false)
        .init();

    // Stderr so the operator can tail the log while the TUI owns the screen.
    eprintln!("zaptv log: {}", log_path.display());

    tracing::info!("zaptv starting…");

    let config = zaptv_core::config::Config::load().unwrap_or_default();

    // ── Broadcast channel (PlayerCore → TUI) ─────────────────────────────────
    let (broadcast_tx, broadcast_rx) = broadcast::channel::<session::PlayerMessage>(256);

    // ── SessionEvent channel (TUI → PlayerCore) ──────────────────────────────
    let (event_tx, event_rx) = mpsc::channel::<session::SessionEvent>(256);

    let player_core =
        session::PlayerCore::new(config.playback.clone(), broadcast_tx, event_tx.clone());
    let session_state = player_core.session_state();

    let core_task = tokio::spawn(async move {
        if let Err(e) = player_core.run(event_rx).await {
            tracing::error!("PlayerCore exited with error: {}", e);
        }
    });

    let app = app::App::new(config, event_tx, session_state);
    app.run(broadcast_rx).await?;

    // Give the core a moment to kill mpv after the Shutdown the app sent.
    let _ = tokio::time::timeout(std::time::Duration::from_secs(2), core_task).await;

    Ok(())
}
