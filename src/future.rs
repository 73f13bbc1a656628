//! # Call Futures
//!
//! [`CallFuture`] is the handle returned by a future call. The response lands
//! in a private mailbox; the first read waits for it and caches the outcome, so
//! every later read returns the same value or error without waiting.

use crate::actor_ref::ActorRef;
use crate::error::ActorError;
use crate::mailbox::Mailbox;
use crate::message::{Call, CallId, ChainId, Responder};
use crate::value::{Args, Value};
use std::time::Duration;
use tokio::sync::OnceCell;
use tokio::time::Instant;

pub struct CallFuture {
    call_id: CallId,
    method: String,
    target: ActorRef,
    mailbox: Mailbox,
    outcome: OnceCell<Result<Value, ActorError>>,
}

impl CallFuture {
    pub(crate) fn send(
        target: &ActorRef,
        method: &str,
        args: Args,
        chain_id: ChainId,
    ) -> Result<Self, ActorError> {
        let mailbox = Mailbox::new();
        let call = Call::new(
            method,
            args,
            chain_id,
            Some(Responder::new(mailbox.clone())),
        );
        let call_id = call.id;
        target.send_call(call)?;
        Ok(Self {
            call_id,
            method: method.to_string(),
            target: target.clone(),
            mailbox,
            outcome: OnceCell::new(),
        })
    }

    pub fn call_id(&self) -> CallId {
        self.call_id
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    /// `true` once the outcome is cached or the response has arrived.
    pub fn is_ready(&self) -> bool {
        // The private mailbox only ever receives this call's response.
        self.outcome.initialized() || !self.mailbox.is_empty()
    }

    /// Waits for the outcome. Inside an actor prefer
    /// [`Ctx::await_future`](crate::Ctx::await_future), which lets the actor
    /// serve other calls meanwhile.
    pub async fn value(&self) -> Result<Value, ActorError> {
        self.outcome
            .get_or_init(|| async {
                let outcome = self
                    .target
                    .wait_reply(&self.mailbox, self.call_id, None)
                    .await
                    .unwrap_or_else(Err);
                self.mailbox.shutdown();
                outcome
            })
            .await
            .clone()
    }

    /// Like [`CallFuture::value`], failing with [`ActorError::Timeout`] if no
    /// response arrives in time. A timeout is not cached: the future can be
    /// read again later.
    pub async fn value_timeout(&self, timeout: Duration) -> Result<Value, ActorError> {
        let deadline = Some((Instant::now() + timeout, timeout));
        self.outcome
            .get_or_try_init(|| async {
                let outcome = self
                    .target
                    .wait_reply(&self.mailbox, self.call_id, deadline)
                    .await?;
                self.mailbox.shutdown();
                Ok::<_, ActorError>(outcome)
            })
            .await
            .cloned()?
    }
}

impl std::fmt::Debug for CallFuture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallFuture")
            .field("call_id", &self.call_id)
            .field("target", &self.target.id())
            .field("ready", &self.outcome.initialized())
            .finish()
    }
}
