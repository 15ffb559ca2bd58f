use std::sync::Arc;

use clap::Parser;
use signoz_metrics_adapter::{
    api,
    backend::HttpTransport,
    config::Cli,
    logging, metrics,
    provider::MetricsProvider,
    resolver::{ObjectResolver, StaticObjectResolver},
    AdapterError, Result,
};
use tokio::net::TcpListener;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let format = cli.log_format;

    if let Err(e) = logging::init_logger(format) {
        eprintln!("{}", e);
        std::process::exit(1);
    }

    if let Err(e) = run(cli).await {
        error!(error = %e, "adapter exited with error");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = Arc::new(cli.into_config()?);

    metrics::init_metrics(config.metrics.len());

    let transport = Arc::new(HttpTransport::new(
        &config.endpoint,
        &config.api_key,
        config.request_timeout,
    )?);

    let resolver: Arc<dyn ObjectResolver> = match &config.objects_file {
        Some(path) => Arc::new(StaticObjectResolver::from_file(path)?),
        None => {
            warn!("no object inventory configured, selector queries will return empty lists");
            Arc::new(StaticObjectResolver::empty())
        }
    };

    let provider = Arc::new(MetricsProvider::new(config.clone(), transport, resolver));
    let router = api::build_router(provider);

    info!(
        endpoint = %config.endpoint,
        metrics = ?config.metrics,
        api = config.query_api.as_str(),
        "starting signoz metrics adapter"
    );

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| AdapterError::Internal(format!("Failed to bind to {}: {}", addr, e)))?;

    api::serve(listener, router, async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to listen for shutdown signal");
            std::future::pending::<()>().await;
        }
        info!("shutdown signal received");
    })
    .await?;

    metrics::ADAPTER_UP.set(0);
    info!("signoz metrics adapter stopped");
    Ok(())
}
