use common::http_client::{HttpClient, HttpGet};
use common::tracing::init_from_format;
use std::future::IntoFuture;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use weather_service::config::Config;
use weather_service::provider::{OpenWeatherMap, WeatherProvider, WeatherStack};
use weather_service::service::WeatherService;

#[tokio::main]
async fn main() {
    init_from_format(std::env::var("LOG_FORMAT").ok().as_deref());

    if let Err(e) = run().await {
        error!(error = %e, "Weather service failed");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::from_env()?;

    let http: Arc<dyn HttpGet> = Arc::new(HttpClient::new(config.http_timeout)?);

    // Order is failover priority.
    let providers: Vec<Arc<dyn WeatherProvider>> = vec![
        Arc::new(
            OpenWeatherMap::new(config.openweather_app_id.clone(), http.clone())?
                .with_url(config.openweather_url.clone()),
        ),
        Arc::new(
            WeatherStack::new(config.weatherstack_access_key.clone(), http)?
                .with_url(config.weatherstack_url.clone()),
        ),
    ];

    let service = WeatherService::new(providers)?
        .with_min_gap(config.min_gap)
        .with_provider_timeout(config.provider_timeout);
    info!(providers = ?service.provider_names(), "Providers configured");

    let app = weather_service::router(Arc::new(service));

    let addr = SocketAddr::new(config.bind_addr, config.port);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Weather service listening on {}", addr);

    let shutdown = CancellationToken::new();
    let server = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown.clone()))
        .into_future();

    let drain_deadline = async {
        shutdown.cancelled().await;
        tokio::time::sleep(config.shutdown_timeout).await;
    };

    tokio::select! {
        result = server => result?,
        _ = drain_deadline => {
            warn!(
                timeout_secs = config.shutdown_timeout.as_secs_f64(),
                "In-flight requests did not finish in time, exiting anyway"
            );
        }
    }

    info!("Weather service stopped");
    Ok(())
}

async fn shutdown_signal(shutdown: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received SIGINT, starting graceful shutdown...");
        },
        _ = terminate => {
            info!("Received SIGTERM, starting graceful shutdown...");
        },
    }

    // Starts the drain deadline; the listener stops accepting once this returns.
    shutdown.cancel();
}
