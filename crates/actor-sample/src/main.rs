//! # Shop Demo
//!
//! Walks through the runtime with two actors:
//! 1. Places orders that reserve stock through a nested actor call.
//! 2. Gets an out-of-stock order rejected without crashing anything.
//! 3. Crashes the inventory and watches the supervisor rebuild it.
//!
//! ```bash
//! RUST_LOG=info cargo run -p actor-sample
//! ACTOR_SHUTDOWN_TIMEOUT_MS=500 RUST_LOG=debug cargo run -p actor-sample
//! ```

use actor_runtime::{args, setup_tracing, ActorClient, SystemConfig};
use actor_sample::lifecycle::ShopSystem;
use std::time::Duration;
use tracing::{error, info, warn, Instrument};

#[tokio::main]
async fn main() -> Result<(), String> {
    setup_tracing();

    let config = SystemConfig::from_env();
    info!(?config, "Starting shop");
    let seed = vec![("widget".to_string(), 10), ("gadget".to_string(), 2)];
    let shop = ShopSystem::start(config, seed)
        .await
        .map_err(|e| e.to_string())?;

    let span = tracing::info_span!("ordering");
    async {
        for (sku, quantity) in [("widget", 3), ("gadget", 2), ("gadget", 1)] {
            match shop.orders.place_order(sku, quantity).await {
                Ok(order_id) => info!(%order_id, sku, quantity, "Order accepted"),
                Err(e) => warn!(error = %e, sku, quantity, "Order rejected"),
            }
        }
    }
    .instrument(span)
    .await;

    let inventory = shop.inventory().map_err(|e| e.to_string())?;
    let widgets = inventory.stock("widget").await.map_err(|e| e.to_string())?;
    info!(widgets, "Stock after ordering");

    let span = tracing::info_span!("recovery");
    async {
        if let Err(e) = inventory.actor().cast("corrupt", args![]) {
            error!(error = %e, "Could not reach inventory");
            return;
        }

        for _ in 0..50 {
            match shop.inventory() {
                Ok(current) if current.actor() != inventory.actor() => {
                    let widgets = current.stock("widget").await.unwrap_or_default();
                    info!(widgets, "Inventory restarted from its seed stock");
                    return;
                }
                _ => tokio::time::sleep(Duration::from_millis(20)).await,
            }
        }
        warn!("Inventory did not come back");
    }
    .instrument(span)
    .await;

    let orders = shop.orders.count().await.map_err(|e| e.to_string())?;
    info!(orders, "Orders placed");

    let report = shop.shutdown().await;
    info!(?report, "Application completed successfully");
    Ok(())
}
