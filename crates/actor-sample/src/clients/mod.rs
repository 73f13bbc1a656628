//! # Clients
//!
//! Domain wrappers implementing [`ActorClient`](actor_runtime::ActorClient):
//! callers get typed results and domain errors instead of raw values.

pub mod inventory_client;
pub mod order_client;

pub use inventory_client::{InventoryClient, InventoryError};
pub use order_client::{OrderClient, OrderError};
