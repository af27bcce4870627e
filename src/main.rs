//! Tally Back binary entrypoint wiring REST, SSE and the score store.

use std::{env, net::SocketAddr, sync::Arc};

use anyhow::{Context, bail};
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tally_back::{
    build_router,
    config::AppConfig,
    dao::{
        score_store::{ScoreStore, memory::MemoryScoreStore},
        storage::StorageError,
    },
    services::{sse_events, storage_supervisor},
    state::{AppState, SharedState},
};

const STORE_KIND_ENV: &str = "SCORE_STORE";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = AppConfig::load();
    let app_state = AppState::new(config);
    sse_events::spawn_degraded_notifier(app_state.clone());
    spawn_store_supervisor(app_state.clone())?;

    // Build the HTTP router once the shared state is ready.
    let app = build_router(app_state);

    let port = env::var("PORT")
        .or_else(|_| env::var("SERVER_PORT"))
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(8080);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(%addr, "starting server");

    let listener = TcpListener::bind(addr).await.context("binding server")?;
    let service = app.into_make_service();
    axum::serve(listener, service)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving axum")?;

    Ok(())
}

/// Pick the score store from `SCORE_STORE` and keep it connected in the background.
fn spawn_store_supervisor(state: SharedState) -> anyhow::Result<()> {
    let kind = env::var(STORE_KIND_ENV).unwrap_or_else(|_| "memory".into());
    match kind.as_str() {
        "memory" => {
            info!("using the in-memory score store");
            let store = MemoryScoreStore::new();
            tokio::spawn(storage_supervisor::run(state, move || {
                let store = store.clone();
                async move { Ok::<_, StorageError>(Arc::new(store) as Arc<dyn ScoreStore>) }
            }));
        }
        #[cfg(feature = "couch-store")]
        "couch" => {
            use tally_back::dao::score_store::couchdb::{CouchConfig, CouchScoreStore};

            let couch = CouchConfig::from_env().context("configuring the CouchDB score store")?;
            info!(base_url = %couch.base_url, database = %couch.database, "using the CouchDB score store");
            tokio::spawn(storage_supervisor::run(state, move || {
                let couch = couch.clone();
                async move {
                    let store = CouchScoreStore::connect(couch).await?;
                    Ok::<_, StorageError>(Arc::new(store) as Arc<dyn ScoreStore>)
                }
            }));
        }
        other => bail!("unknown {STORE_KIND_ENV} `{other}`; expected `memory` or `couch`"),
    }
    Ok(())
}

/// Configure tracing subscribers so logs include spans by default.
fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,tower_http=debug".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Wait for Ctrl+C or SIGTERM and shut the server down gracefully.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {},
                    _ = term.recv() => {},
                }
            }
            Err(err) => {
                warn!(error = %err, "failed to install SIGTERM handler; waiting for Ctrl+C only");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
