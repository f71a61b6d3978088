//! Server lifecycle: bind, wire up health and reflection, accept
//! connections, and shut down gracefully within a bounded grace period.
//! Grounded on `testing/bankdemo::main`'s ctrl_c + `CancellationToken`
//! shutdown pattern, generalized to also catch SIGTERM.

use std::net::SocketAddr;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tonic::transport::Server;
use tracing::{info, warn};

use crate::dispatch::InferenceService;
use crate::error::{BlazeError, Result};
use crate::idl;
use crate::registry::ModelRegistry;

/// How long `serve` waits for in-flight RPCs to drain after a shutdown
/// signal before giving up and returning anyway (SPEC_FULL.md §4.E "Server
/// startup sequence", step 5).
const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(5);

/// Bind, serve, and block until a shutdown signal is handled. `registry` is
/// read only to build the reflection descriptor set; the live dispatch
/// table is `service`.
pub async fn serve(app_name: &str, host: &str, port: u16, service: InferenceService, registry: &ModelRegistry) -> Result<()> {
    let addr: SocketAddr = format!("{host}:{port}")
        .parse()
        .map_err(|e| BlazeError::Configuration(format!("invalid bind address '{host}:{port}': {e}")))?;

    let (mut health_reporter, health_service) = tonic_health::server::health_reporter();
    health_reporter.set_serving::<InferenceService>().await;

    let descriptor_set = idl::encoded_file_descriptor_set(registry);
    let reflection_v1 = tonic_reflection::server::Builder::configure()
        .register_encoded_file_descriptor_set(&descriptor_set)
        .build_v1()
        .map_err(|e| BlazeError::Configuration(format!("failed to build reflection service: {e}")))?;
    let reflection_v1alpha = tonic_reflection::server::Builder::configure()
        .register_encoded_file_descriptor_set(&descriptor_set)
        .build_v1alpha()
        .map_err(|e| BlazeError::Configuration(format!("failed to build reflection service: {e}")))?;

    info!(app = app_name, %addr, models = registry.list().len(), "starting blazerpc server");

    let router = Server::builder()
        .add_service(health_service)
        .add_service(reflection_v1)
        .add_service(reflection_v1alpha)
        .add_service(service);

    let shutdown = CancellationToken::new();
    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        info!("shutdown signal received, draining in-flight requests");
        signal_token.cancel();
    });

    let serve_token = shutdown.clone();
    let serve_task = tokio::spawn(async move { router.serve_with_shutdown(addr, serve_token.cancelled()).await });

    tokio::select! {
        result = serve_task => {
            result
                .map_err(|e| BlazeError::Configuration(format!("server task panicked: {e}")))?
                .map_err(|e| BlazeError::Configuration(format!("server error: {e}")))?;
        }
        _ = grace_period_elapsed(&shutdown, DEFAULT_GRACE_PERIOD) => {
            warn!("grace period elapsed before in-flight requests drained; shutting down anyway");
        }
    }

    Ok(())
}

/// Resolves once the shutdown token has been cancelled *and* the grace
/// period has subsequently elapsed. Never resolves before cancellation, so
/// it never races a normal (non-shutdown) `serve_task` completion.
async fn grace_period_elapsed(shutdown: &CancellationToken, grace_period: Duration) {
    shutdown.cancelled().await;
    tokio::time::sleep(grace_period).await;
}

/// Waits for either Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.ok();
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
