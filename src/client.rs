//! # ActorClient Trait
//!
//! Domain wrappers around an [`ActorRef`] get typed helpers for free: decode a
//! reply into a concrete type, terminate the actor, check liveness. Each
//! wrapper maps [`ActorError`] into its own error type once, in `map_error`.
use crate::actor_ref::ActorRef;
use crate::error::ActorError;
use crate::value::Args;
use async_trait::async_trait;
use std::any::Any;
use std::time::Duration;

/// Trait for typed clients of a single actor.
///
/// # Example
///
/// ```rust
/// use actor_runtime::{args, ActorClient, ActorError, ActorRef};
///
/// #[derive(Debug, thiserror::Error)]
/// enum CounterError {
///     #[error("counter unavailable: {0}")]
///     Unavailable(#[from] ActorError),
/// }
///
/// struct CounterClient {
///     actor: ActorRef,
/// }
///
/// impl ActorClient for CounterClient {
///     type Error = CounterError;
///
///     fn actor(&self) -> &ActorRef {
///         &self.actor
///     }
///
///     fn map_error(e: ActorError) -> Self::Error {
///         CounterError::Unavailable(e)
///     }
/// }
///
/// impl CounterClient {
///     async fn increment(&self, by: i64) -> Result<i64, CounterError> {
///         self.call_as("increment", args![by]).await
///     }
/// }
/// ```
#[async_trait]
pub trait ActorClient: Send + Sync {
    /// The domain-specific error type.
    type Error: From<ActorError> + Send + Sync;

    /// The actor behind this client.
    fn actor(&self) -> &ActorRef;

    /// Map runtime errors to the domain error type.
    fn map_error(e: ActorError) -> Self::Error;

    /// Calls `method` and decodes the reply as `T`.
    #[tracing::instrument(skip(self, args), fields(actor = %self.actor().id()))]
    async fn call_as<T>(&self, method: &str, args: Args) -> Result<T, Self::Error>
    where
        T: Any + Clone + Send,
    {
        tracing::debug!("Sending request");
        self.actor()
            .call(method, args)
            .await
            .and_then(|value| value.get::<T>())
            .map_err(Self::map_error)
    }

    /// Stops the actor and waits up to `timeout` for it to exit.
    #[tracing::instrument(skip(self), fields(actor = %self.actor().id()))]
    async fn terminate(&self, timeout: Duration) -> Result<(), Self::Error> {
        tracing::debug!("Sending request");
        self.actor()
            .terminate(timeout)
            .await
            .map(|_| ())
            .map_err(Self::map_error)
    }

    fn is_alive(&self) -> bool {
        self.actor().is_alive()
    }
}
