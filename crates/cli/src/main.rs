//! Hook Delivery entry point.
//!
//! This binary is the composition root for the relay. Responsibilities:
//!
//! 1. **Parse flags and wire observability**: install the `tracing`
//!    subscriber (JSON or text) and, when an endpoint is given, the
//!    OpenTelemetry OTLP exporter.
//! 2. **Load configuration**: read the hook secret and the routing rules,
//!    then watch the rules file and swap in valid edits.
//! 3. **Construct infrastructure**: connect the [`broker::NatsPublisher`]
//!    and inject it into a [`delivery::DeliveryCoordinator`] served by the
//!    [`listener`] router.
//! 4. **Shut down gracefully**: on SIGINT or SIGTERM stop accepting
//!    connections, give open requests the grace period, wait for every
//!    in-flight publish, then flush the bus connection.

mod args;
mod config_source;
mod telemetry;

use std::future::{Future, IntoFuture};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use broker::{BrokerConfig, NatsPublisher};
use clap::Parser;
use delivery::DeliveryCoordinator;
use listener::{build_router, AppState, SecretProvider};
use routing::{PublishError, SharedConfig};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::args::Args;

const CONFIG_DEBOUNCE: Duration = Duration::from_millis(500);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let telemetry = telemetry::init(args.log_format, args.otlp_endpoint.as_deref())?;

    let result = run(args).await;
    if let Err(e) = &result {
        error!(error = %format!("{e:#}"), "hook delivery exited with an error");
    }

    telemetry.shutdown();
    result
}

async fn run(args: Args) -> anyhow::Result<()> {
    let secret = config_source::read_secret(&args.hmac_secret_file)?;
    let secret: SecretProvider = Arc::new(move || secret.clone());

    let shared = SharedConfig::new(config_source::load_config(&args.config_file)?);
    let _watcher =
        config_source::watch_config(args.config_file.clone(), shared.clone(), CONFIG_DEBOUNCE)?;

    let broker_config = BrokerConfig::from_server_list(&args.nats_servers)
        .context("invalid --nats-servers")?
        .with_name(args.client_name.clone());
    let publisher = Arc::new(
        NatsPublisher::connect(broker_config)
            .await
            .context("failed to connect to the message bus")?,
    );

    let coordinator = Arc::new(DeliveryCoordinator::new(
        publisher.clone(),
        Arc::new(shared),
    ));
    let app = build_router(AppState::new(coordinator.clone(), secret));

    let addr = SocketAddr::from(([0, 0, 0, 0], args.port));
    let tcp = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(%addr, "hook delivery listening");

    let shutdown = CancellationToken::new();
    let mut server = tokio::spawn(
        axum::serve(tcp, app)
            .with_graceful_shutdown(shutdown.clone().cancelled_owned())
            .into_future(),
    );

    let stopped_early = tokio::select! {
        result = &mut server => Some(result),
        () = shutdown_signal() => None,
    };

    let served = match stopped_early {
        // The server only returns on its own when it fails.
        Some(result) => server_outcome(result),
        None => {
            info!(grace_period_secs = args.grace_period, "shutdown requested; closing listener");
            shutdown.cancel();

            match tokio::time::timeout(args.grace_period(), &mut server).await {
                Ok(result) => server_outcome(result),
                Err(_) => {
                    warn!("grace period elapsed with requests still open; aborting them");
                    server.abort();
                    Ok(())
                }
            }
        }
    };

    finish(served, &coordinator, publisher.flush()).await?;
    info!("hook delivery stopped");
    Ok(())
}

/// Drains in-flight publishes and flushes the bus connection, then reports
/// how serving ended. Runs even when the server failed on its own.
async fn finish(
    served: anyhow::Result<()>,
    coordinator: &DeliveryCoordinator,
    flush: impl Future<Output = Result<(), PublishError>>,
) -> anyhow::Result<()> {
    info!(in_flight = coordinator.in_flight(), "waiting for in-flight publishes");
    coordinator.wait_for_drain().await;

    if let Err(e) = flush.await {
        warn!(error = %e, "final flush to the message bus failed");
    }

    served
}

fn server_outcome(
    result: Result<std::io::Result<()>, tokio::task::JoinError>,
) -> anyhow::Result<()> {
    result
        .context("server task panicked")?
        .context("server failed")
}

/// Resolves on SIGINT, or SIGTERM on unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}
