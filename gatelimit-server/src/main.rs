use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;

use gatelimit_server::config::Config;
use gatelimit_server::http;
use gatelimit_server::service::RateLimiter;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse configuration from the file, environment variables and CLI arguments
    let config = Config::from_env_and_args()?;

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(format!("gatelimit={}", config.log_level).parse()?)
                .add_directive(format!("gatelimit_server={}", config.log_level).parse()?),
        )
        .init();

    // Build the admission service around the configured policy
    let policy = config.policy();
    tracing::info!(
        "Gatelimit server starting with preset: {} ({} requests per {}s)",
        config.preset,
        policy.max_requests,
        policy.window.as_secs()
    );
    tracing::info!(
        "Store capacity: {}, Buffer size: {}",
        config.store_capacity,
        config.buffer_size
    );

    let mut builder = RateLimiter::builder(policy)
        .buffer_size(config.buffer_size)
        .store_capacity(config.store_capacity);
    if let Some(secs) = config.sweep_interval {
        builder = builder.sweep_interval(Duration::from_secs(secs));
    }
    let limiter = Arc::new(builder.build()?);

    // Serve until ctrl-c
    http::serve(config.bind, Arc::clone(&limiter), config.protect).await?;

    // Drain the actor before exiting
    limiter.close().await;
    tracing::info!("Gatelimit server stopped");

    Ok(())
}
