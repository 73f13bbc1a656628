//! # Conditions
//!
//! A [`Condition`] is a condition variable owned by one actor. Only tasks of
//! the owner may wait on it; anyone holding the condition may signal it. A
//! signal travels as a system event through the owner's mailbox and wakes one
//! waiter (`signal`) or all of them (`broadcast`). Signals nobody waits for are
//! lost.

use crate::actor_ref::ActorRef;
use crate::behavior::Behavior;
use crate::context::Ctx;
use crate::error::ActorError;
use crate::message::{Message, SystemEvent};
use crate::value::Value;
use std::any::Any;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

static NEXT_CONDITION_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConditionId(u64);

impl ConditionId {
    pub(crate) fn next() -> Self {
        Self(NEXT_CONDITION_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ConditionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "condition-{}", self.0)
    }
}

#[derive(Clone, Debug)]
pub struct Condition {
    id: ConditionId,
    owner: ActorRef,
}

impl Condition {
    pub(crate) fn new(owner: ActorRef) -> Self {
        Self {
            id: ConditionId::next(),
            owner,
        }
    }

    pub fn id(&self) -> ConditionId {
        self.id
    }

    pub fn owner(&self) -> &ActorRef {
        &self.owner
    }

    /// Suspends the calling task until the condition is signalled.
    pub async fn wait<B: Behavior>(&self, ctx: &Ctx<B>) -> Result<Value, ActorError> {
        self.check_owner(ctx)?;
        ctx.wait_condition(self.id, None).await
    }

    pub async fn wait_timeout<B: Behavior>(
        &self,
        ctx: &Ctx<B>,
        timeout: Duration,
    ) -> Result<Value, ActorError> {
        self.check_owner(ctx)?;
        ctx.wait_condition(self.id, Some(timeout)).await
    }

    /// Wakes one waiting task.
    pub fn signal<T: Any + Send + Sync>(&self, value: T) -> Result<(), ActorError> {
        self.send(Value::new(value), false)
    }

    /// Wakes every waiting task.
    pub fn broadcast<T: Any + Send + Sync>(&self, value: T) -> Result<(), ActorError> {
        self.send(Value::new(value), true)
    }

    fn send(&self, value: Value, broadcast: bool) -> Result<(), ActorError> {
        let event = SystemEvent::SignalCondition {
            condition: self.id,
            value,
            broadcast,
        };
        self.owner
            .mailbox()
            .send(Message::System(event))
            .map_err(ActorError::dead_target)
    }

    fn check_owner<B: Behavior>(&self, ctx: &Ctx<B>) -> Result<(), ActorError> {
        if ctx.current() != &self.owner {
            return Err(ActorError::abort(format!(
                "cannot wait on {} owned by {}",
                self.id,
                self.owner.id()
            )));
        }
        Ok(())
    }
}
