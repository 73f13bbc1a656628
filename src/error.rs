//! # Runtime Errors
//!
//! This module defines the error taxonomy shared by every actor, mailbox and
//! caller in the runtime. A single [`ActorError`] enum travels through call
//! responses, exit events and join results, so it is `Clone`: the same error can
//! be cached by a [`CallFuture`](crate::CallFuture) and fanned out to every link.
//!
//! ## Taxonomy
//!
//! | Kind | Variant | Callee survives? |
//! |------|---------|------------------|
//! | Protocol abort (caller mistake) | [`ActorError::Abort`] | yes |
//! | Abort received by a calling actor | [`ActorError::CallAborted`] | yes; the caller crashes unless it handles it |
//! | Application error | [`ActorError::Application`] | no, the callee crashes |
//! | Dead target | [`ActorError::DeadActor`], [`ActorError::MailboxDead`] | n/a |
//! | Timeout | [`ActorError::Timeout`] | remote side keeps running |

use crate::actor_ref::ActorId;
use crate::behavior::Arity;
use std::sync::Arc;
use std::time::Duration;

/// Why a call was rejected without crashing the callee.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AbortReason {
    #[error("undefined method `{method}`")]
    UnknownMethod { method: String },
    #[error("wrong number of arguments for `{method}` (given {given}, expected {expected})")]
    Arity {
        method: String,
        given: usize,
        expected: Arity,
    },
    #[error("missing argument {index}")]
    MissingArgument { index: usize },
    #[error("argument {index} has the wrong type (expected {expected}, found {found})")]
    ArgumentType {
        index: usize,
        expected: &'static str,
        found: &'static str,
    },
    #[error("{0}")]
    Custom(String),
}

/// Errors produced by the actor runtime and by the methods it dispatches.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ActorError {
    #[error("call aborted: {0}")]
    Abort(AbortReason),
    /// An abort that came back to an actor from one of its own calls. The
    /// mistake is the caller's, so this is not an abort for the caller.
    #[error("call to `{method}` was aborted: {reason}")]
    CallAborted { method: String, reason: AbortReason },
    #[error("{0}")]
    Application(Arc<dyn std::error::Error + Send + Sync>),
    #[error("attempted to call a dead actor")]
    DeadActor,
    #[error("mailbox is dead")]
    MailboxDead,
    #[error("mailbox is full (capacity {0})")]
    MailboxFull(usize),
    #[error("timed out after {0:?}")]
    Timeout(Duration),
    #[error("linked actor {actor} crashed: {reason}")]
    LinkedActorCrashed {
        actor: ActorId,
        reason: Box<ActorError>,
    },
    #[error("actor was killed")]
    Killed,
    #[error("no actor registered as `{0}`")]
    NotFound(String),
    #[error("actor `{0}` is restarting")]
    Restarting(String),
    #[error("cannot execute blocks on sender in exclusive mode")]
    ExclusiveBlock,
    #[error("invalid behavior: {0}")]
    InvalidBehavior(String),
    #[error("failed to spawn actor: {0}")]
    Spawn(String),
    #[error("unexpected value type (expected {expected}, found {found})")]
    UnexpectedType {
        expected: &'static str,
        found: &'static str,
    },
}

/// Plain-message failure used by [`ActorError::failure`].
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct Failure(pub String);

impl ActorError {
    /// Wraps any error as an application error (crashes the callee).
    pub fn app<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        ActorError::Application(Arc::new(error))
    }

    /// Application error built from a message.
    pub fn failure(message: impl Into<String>) -> Self {
        Self::app(Failure(message.into()))
    }

    /// Protocol abort: reported to the caller, the callee keeps running.
    pub fn abort(message: impl Into<String>) -> Self {
        ActorError::Abort(AbortReason::Custom(message.into()))
    }

    pub(crate) fn from_panic(payload: Box<dyn std::any::Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "unknown panic payload".to_string()
        };
        Self::failure(format!("task panicked: {message}"))
    }

    /// `true` for protocol aborts, which never crash the callee.
    pub fn is_abort(&self) -> bool {
        matches!(self, ActorError::Abort(_))
    }

    /// The abort reason, whether raised here or received from a nested call.
    pub fn abort_reason(&self) -> Option<&AbortReason> {
        match self {
            ActorError::Abort(reason) | ActorError::CallAborted { reason, .. } => Some(reason),
            _ => None,
        }
    }

    /// Re-raises an abort in the actor that made the call.
    pub(crate) fn raised_in_sender(self, method: &str) -> Self {
        match self {
            ActorError::Abort(reason) => ActorError::CallAborted {
                method: method.to_string(),
                reason,
            },
            other => other,
        }
    }

    /// `true` when the target actor or its mailbox is gone.
    pub fn is_dead_target(&self) -> bool {
        matches!(self, ActorError::DeadActor | ActorError::MailboxDead)
    }

    pub(crate) fn dead_target(self) -> Self {
        match self {
            ActorError::MailboxDead => ActorError::DeadActor,
            other => other,
        }
    }
}
