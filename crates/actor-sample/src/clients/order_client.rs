//! # Order Client
//!
//! Provides a high‑level API for the order desk actor.
use actor_runtime::{args, AbortReason, ActorClient, ActorError, ActorRef};
use tracing::instrument;

use crate::model::{Order, OrderId};

#[derive(Debug, thiserror::Error)]
pub enum OrderError {
    #[error("order rejected: {0}")]
    Rejected(String),
    #[error("actor communication error: {0}")]
    ActorCommunicationError(#[from] ActorError),
}

#[derive(Clone, Debug)]
pub struct OrderClient {
    actor: ActorRef,
}

impl OrderClient {
    pub fn new(actor: ActorRef) -> Self {
        Self { actor }
    }

    #[instrument(skip(self))]
    pub async fn place_order(&self, sku: &str, quantity: u32) -> Result<OrderId, OrderError> {
        self.call_as("place", args![sku.to_string(), quantity]).await
    }

    pub async fn get(&self, id: OrderId) -> Result<Option<Order>, OrderError> {
        self.call_as("get", args![id]).await
    }

    pub async fn count(&self) -> Result<usize, OrderError> {
        self.call_as("count", args![]).await
    }
}

impl ActorClient for OrderClient {
    type Error = OrderError;

    fn actor(&self) -> &ActorRef {
        &self.actor
    }

    fn map_error(e: ActorError) -> Self::Error {
        match e {
            ActorError::Abort(AbortReason::Custom(reason)) => OrderError::Rejected(reason),
            other => OrderError::ActorCommunicationError(other),
        }
    }
}
