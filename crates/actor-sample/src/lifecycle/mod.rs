//! # Shop Lifecycle
//!
//! [`ShopSystem`] boots an [`ActorSystem`], starts the inventory under the
//! system's supervisor and spawns the order desk next to it.
//!
//! ## Startup
//!
//! 1. **Inventory** - supervised as [`INVENTORY`]; a crash rebuilds it from
//!    the same seed stock.
//! 2. **Order desk** - a plain actor. It resolves the inventory by name on
//!    every order instead of holding a reference, so a restart is invisible
//!    to it.
//!
//! ## Shutdown
//!
//! [`ShopSystem::shutdown`] delegates to [`ActorSystem::shutdown`]: every actor
//! is asked to terminate, finalizers run, and anything still running after
//! the configured timeout is killed.

use actor_runtime::{args, ActorError, ActorSystem, ShutdownReport, SystemConfig};
use tracing::info;

use crate::clients::{InventoryClient, OrderClient};
use crate::model::{Inventory, OrderDesk, INVENTORY};

pub struct ShopSystem {
    pub system: ActorSystem,
    pub orders: OrderClient,
}

impl ShopSystem {
    pub async fn start(
        config: SystemConfig,
        seed: Vec<(String, u32)>,
    ) -> Result<Self, ActorError> {
        let system = ActorSystem::boot(config);
        system.supervise_as::<Inventory>(INVENTORY, args![seed]).await?;
        let desk = system.spawn(OrderDesk::new())?;
        info!(desk = %desk.id(), "Shop open");
        Ok(Self {
            orders: OrderClient::new(desk.into_ref()),
            system,
        })
    }

    /// Client for the current inventory instance.
    pub fn inventory(&self) -> Result<InventoryClient, ActorError> {
        Ok(InventoryClient::new(self.system.whereis(INVENTORY)?))
    }

    pub async fn shutdown(self) -> ShutdownReport {
        let report = self.system.shutdown().await;
        info!(terminated = report.terminated, killed = report.killed, "Shop closed");
        report
    }
}
