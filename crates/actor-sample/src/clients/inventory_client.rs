//! # Inventory Client
//!
//! Typed API over the inventory actor. Out-of-stock aborts become
//! [`InventoryError::OutOfStock`]; everything else is a communication error.
use actor_runtime::{args, AbortReason, ActorClient, ActorError, ActorRef, ActorSystem};
use tracing::instrument;

use crate::model::INVENTORY;

#[derive(Debug, thiserror::Error)]
pub enum InventoryError {
    #[error("out of stock: {0}")]
    OutOfStock(String),
    #[error("inventory unavailable: {0}")]
    Unavailable(#[from] ActorError),
}

#[derive(Clone, Debug)]
pub struct InventoryClient {
    actor: ActorRef,
}

impl InventoryClient {
    pub fn new(actor: ActorRef) -> Self {
        Self { actor }
    }

    /// Client for the instance currently registered as the inventory.
    pub fn lookup(system: &ActorSystem) -> Result<Self, InventoryError> {
        Ok(Self::new(system.whereis(INVENTORY)?))
    }

    #[instrument(skip(self))]
    pub async fn stock(&self, sku: &str) -> Result<u32, InventoryError> {
        self.call_as("stock", args![sku.to_string()]).await
    }

    #[instrument(skip(self))]
    pub async fn reserve(&self, sku: &str, quantity: u32) -> Result<u32, InventoryError> {
        self.call_as("reserve", args![sku.to_string(), quantity]).await
    }

    #[instrument(skip(self))]
    pub async fn restock(&self, sku: &str, quantity: u32) -> Result<u32, InventoryError> {
        self.call_as("restock", args![sku.to_string(), quantity]).await
    }
}

impl ActorClient for InventoryClient {
    type Error = InventoryError;

    fn actor(&self) -> &ActorRef {
        &self.actor
    }

    fn map_error(e: ActorError) -> Self::Error {
        match e {
            ActorError::Abort(AbortReason::Custom(reason)) => InventoryError::OutOfStock(reason),
            other => InventoryError::Unavailable(other),
        }
    }
}
