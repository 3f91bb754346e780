//! Demo runner entry point.

use app::config::AppConfig;
use cart::CartContext;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[tokio::main]
async fn main() {
    let config = AppConfig::from_env();

    // 1. Initialize tracing
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // 2. Install Prometheus metrics recorder
    let metrics_handle = metrics_exporter_prometheus::PrometheusBuilder::new()
        .install_recorder()
        .expect("failed to install Prometheus recorder");

    // 3. Wire the engine over in-memory collaborators
    let checkout = app::create_default_checkout(&config)
        .await
        .expect("failed to create checkout");

    // 4. Run one guest checkout end to end
    let ctx = CartContext::guest(config.demo_session.clone());
    match app::run_demo_checkout(&checkout, &ctx).await {
        Ok(placed) => tracing::info!(
            order_number = %placed.order_number,
            total = %placed.payment.total_value(),
            transactions = placed.payment.transactions.len(),
            "demo checkout completed"
        ),
        Err(e) => tracing::error!(error = %e, class = ?e.class(), "demo checkout failed"),
    }

    tracing::info!(
        events = checkout.publisher.event_count().await,
        "events published"
    );
    println!("{}", metrics_handle.render());
}
