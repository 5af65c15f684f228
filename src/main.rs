use std::{process, sync::Arc};

use showroom::{
    application::{
        catalog::CatalogSettings,
        error::AppError,
        repos::{InventoryRepo, InventoryWriteRepo},
    },
    cache::{CacheConfig, CacheStore, Clock, MemoryStore, SystemClock},
    config,
    infra::{
        bootstrap::{self, ApplicationContext, Components},
        error::InfraError,
        http,
        memory::MemoryInventory,
        telemetry,
    },
};
use tokio::signal;
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()
        .map_err(|err| AppError::unexpected(format!("failed to load configuration: {err}")))?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
    }
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let app = build_application_context(&settings).await;

    if settings.admin.token.is_none() {
        warn!(
            target = "showroom::serve",
            "No admin token configured; write and purge routes will reject every request"
        );
    }

    let result = serve_http(&settings, &app).await;

    let refresher = app.cache.refresher();
    if refresher.in_flight() > 0 {
        info!(
            target = "showroom::serve",
            in_flight = refresher.in_flight(),
            "Waiting for background refreshes"
        );
        if tokio::time::timeout(settings.server.graceful_shutdown, refresher.settle())
            .await
            .is_err()
        {
            warn!(
                target = "showroom::serve",
                in_flight = refresher.in_flight(),
                "Background refreshes still running at shutdown"
            );
        }
    }

    result
}

async fn build_application_context(settings: &config::Settings) -> ApplicationContext {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let cache_config = CacheConfig::from(&settings.cache);

    let inventory = if settings.catalog.seed_demo_data {
        Arc::new(MemoryInventory::with_demo_data(clock.now()).await)
    } else {
        Arc::new(MemoryInventory::new())
    };
    let reader: Arc<dyn InventoryRepo> = inventory.clone();
    let writer: Arc<dyn InventoryWriteRepo> = inventory;

    let store: Arc<dyn CacheStore> =
        Arc::new(MemoryStore::new(cache_config.store_capacity, clock.clone()));

    info!(
        target = "showroom::serve",
        cache_enabled = cache_config.is_enabled(),
        freshness_seconds = cache_config.freshness_window.as_secs(),
        stale_seconds = cache_config.stale_window.as_secs(),
        store_capacity = cache_config.store_capacity.get(),
        "Response cache configured"
    );

    bootstrap::assemble(Components {
        cache_config,
        catalog: CatalogSettings::from(&settings.catalog),
        admin_token: settings.admin.token.clone(),
        reader,
        writer,
        store,
        clock,
    })
}

async fn serve_http(settings: &config::Settings, app: &ApplicationContext) -> Result<(), AppError> {
    let router = http::build_router(app.http.clone());

    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;
    info!(
        target = "showroom::serve",
        addr = %settings.server.addr,
        "Listening"
    );

    axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|err| AppError::from(InfraError::server(err.to_string())))?;

    info!(target = "showroom::serve", "Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            error!(target = "showroom::serve", error = %err, "Failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                error!(target = "showroom::serve", error = %err, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!(target = "showroom::serve", "Shutdown signal received");
}
