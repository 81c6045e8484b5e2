use anyhow::{Context, Result};
use clap::Parser;
use interview_orchestrator::{
    config::Config,
    create_router,
    recording::{UploadSettings, UploadWorker},
    tasks, AppState, Clock, ConversationService, EventPublisher, HttpCaptureProvider, LocalObjectStorage,
    LocalStore, LogPublisher, NatsPublisher, QuestionSource, RecordingManager, SessionRegistry,
    SessionService, SessionStore, StaticQuestionSource, SystemClock, UploadQueue,
};
use std::sync::Arc;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tower_http::services::ServeDir;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "interview-orchestrator")]
#[command(about = "Interview session orchestration service", long_about = None)]
struct Args {
    /// Configuration file, without extension
    #[arg(long, default_value = "config/interview-orchestrator")]
    config: String,

    /// Override the HTTP port
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let mut cfg = Config::load(&args.config)?;
    if let Some(port) = args.port {
        cfg.service.http.port = port;
    }

    init_logging(cfg.logging.json);

    info!("Interview Orchestrator v{}", env!("CARGO_PKG_VERSION"));
    info!("Loaded config: {}", cfg.service.name);

    let store: Arc<dyn SessionStore> = match &cfg.store.path {
        Some(path) => {
            info!("Session store: {}", path.display());
            Arc::new(LocalStore::open(path.clone()).await?)
        }
        None => {
            warn!("No store.path configured, sessions are kept in memory only");
            Arc::new(LocalStore::in_memory())
        }
    };

    let events: Arc<dyn EventPublisher> = match &cfg.nats.url {
        Some(url) => match NatsPublisher::connect(url).await {
            Ok(publisher) => Arc::new(publisher),
            Err(e) => {
                warn!("NATS unavailable, logging events instead: {:#}", e);
                Arc::new(LogPublisher)
            }
        },
        None => Arc::new(LogPublisher),
    };

    let questions: Arc<dyn QuestionSource> = match &cfg.questions.bank_path {
        Some(path) => Arc::new(StaticQuestionSource::from_json_file(path)?),
        None => Arc::new(StaticQuestionSource::builtin()),
    };

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let registry = Arc::new(SessionRegistry::new());

    let sessions = Arc::new(SessionService::new(
        &cfg,
        store.clone(),
        registry.clone(),
        events.clone(),
        clock.clone(),
    )?);

    let provider = Arc::new(
        HttpCaptureProvider::from_config(&cfg.recording)
            .context("Cloud recording is not configured")?,
    );
    let storage = Arc::new(LocalObjectStorage::from_config(&cfg.storage));

    let cancel_token = CancellationToken::new();

    let (uploads, upload_handle) = UploadQueue::start(
        UploadWorker {
            store: store.clone(),
            provider: provider.clone(),
            storage,
            registry: registry.clone(),
            events: events.clone(),
            clock: clock.clone(),
            settings: UploadSettings::from_config(&cfg.recording),
        },
        cancel_token.clone(),
    );
    uploads.recover(store.as_ref()).await?;

    let recordings = Arc::new(RecordingManager::new(
        provider,
        store.clone(),
        registry.clone(),
        uploads,
        events.clone(),
        clock.clone(),
    ));
    let conversations = Arc::new(ConversationService::new(
        registry.clone(),
        sessions.clone(),
        questions,
        clock.clone(),
    ));

    let sweeper_handle = tokio::spawn(tasks::start_registry_sweeper(
        registry.clone(),
        clock.clone(),
        cfg.registry.clone(),
        cancel_token.clone(),
    ));
    let reminder_handle = if cfg.reminders.enabled {
        Some(tokio::spawn(tasks::start_reminders(
            sessions.clone(),
            cfg.reminders.clone(),
            cancel_token.clone(),
        )))
    } else {
        info!("Interview reminders disabled");
        None
    };

    let app = create_router(AppState::new(sessions, conversations, recordings, registry))
        .nest_service("/files", ServeDir::new(&cfg.storage.root));

    let addr = format!("{}:{}", cfg.service.http.bind, cfg.service.http.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("HTTP server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;

    cancel_token.cancel();
    let _ = upload_handle.await;
    let _ = sweeper_handle.await;
    if let Some(handle) = reminder_handle {
        let _ = handle.await;
    }

    info!("Interview Orchestrator shutdown complete");
    Ok(())
}

fn init_logging(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    info!("Shutdown signal received, draining");
}
