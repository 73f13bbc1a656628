//! # Messages
//!
//! Everything that travels through a [`Mailbox`] is a [`Message`]. Calls and
//! their responses are correlated by [`CallId`]; causal chains of nested calls
//! across actors share a [`ChainId`].
//!
//! ## Exactly One Response
//! A [`Call`] owns at most one [`Responder`], and [`Responder::respond`] consumes
//! it. Whoever ends up holding the call (the dispatching task, the actor cleanup
//! path, or the mailbox shutdown) can therefore answer it only once.

use crate::actor_ref::ActorRef;
use crate::block::Block;
use crate::condition::ConditionId;
use crate::error::ActorError;
use crate::mailbox::Mailbox;
use crate::value::{Args, Value};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;
use uuid::Uuid;

static NEXT_CALL_ID: AtomicU64 = AtomicU64::new(1);

/// Correlates a call (or block call) with its response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CallId(u64);

impl CallId {
    pub(crate) fn next() -> Self {
        Self(NEXT_CALL_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for CallId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "call-{}", self.0)
    }
}

/// Threads together a causal sequence of nested calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChainId(Uuid);

impl ChainId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ChainId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ChainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Delivers the single terminal response of a call to the caller's mailbox.
#[derive(Debug)]
pub struct Responder {
    mailbox: Mailbox,
}

impl Responder {
    pub fn new(mailbox: Mailbox) -> Self {
        Self { mailbox }
    }

    pub fn respond(self, call_id: CallId, outcome: Result<Value, ActorError>) {
        let response = Message::Response(Response { call_id, outcome });
        if let Err(e) = self.mailbox.send(response) {
            debug!(%call_id, error = %e, "Response dropped");
        }
    }
}

/// A request for an actor to run one of its methods.
#[derive(Debug)]
pub struct Call {
    pub id: CallId,
    pub method: String,
    pub args: Args,
    pub chain_id: ChainId,
    responder: Option<Responder>,
}

impl Call {
    pub fn new(
        method: impl Into<String>,
        args: Args,
        chain_id: ChainId,
        responder: Option<Responder>,
    ) -> Self {
        Self {
            id: CallId::next(),
            method: method.into(),
            args,
            chain_id,
            responder,
        }
    }

    /// Builds a call on behalf of a running task. Sender-executed blocks cannot
    /// be served while the sending task holds the actor exclusively.
    pub(crate) fn from_task(
        method: impl Into<String>,
        args: Args,
        chain_id: ChainId,
        responder: Option<Responder>,
        exclusive: bool,
    ) -> Result<Self, ActorError> {
        if exclusive && args.block().is_some() {
            return Err(ActorError::ExclusiveBlock);
        }
        Ok(Self::new(method, args, chain_id, responder))
    }

    pub fn expects_response(&self) -> bool {
        self.responder.is_some()
    }

    pub(crate) fn take_responder(&mut self) -> Option<Responder> {
        self.responder.take()
    }

    pub fn respond(&mut self, outcome: Result<Value, ActorError>) {
        if let Some(responder) = self.responder.take() {
            responder.respond(self.id, outcome);
        }
    }

    /// Fails the caller because the target died before answering.
    pub fn cleanup(mut self) {
        self.respond(Err(ActorError::DeadActor));
    }
}

/// Terminal outcome of a call.
#[derive(Debug)]
pub struct Response {
    pub call_id: CallId,
    pub outcome: Result<Value, ActorError>,
}

/// Request for the sender of a block to execute it.
#[derive(Debug)]
pub struct BlockCall {
    pub id: CallId,
    pub args: Args,
    block: Block,
    reply_to: Mailbox,
}

impl BlockCall {
    pub(crate) fn new(id: CallId, block: Block, args: Args, reply_to: Mailbox) -> Self {
        Self {
            id,
            args,
            block,
            reply_to,
        }
    }

    pub(crate) fn into_parts(self) -> (Block, Args, BlockReply) {
        let reply = BlockReply {
            id: self.id,
            reply_to: self.reply_to,
        };
        (self.block, self.args, reply)
    }

    /// Runs the block on the current thread and answers the callee.
    pub fn dispatch(self) {
        let (block, args, reply) = self.into_parts();
        reply.respond(block.invoke(args));
    }

    pub fn cleanup(self) {
        let (_, _, reply) = self.into_parts();
        reply.respond(Err(ActorError::DeadActor));
    }
}

/// The way back from an executed block to the task waiting on it.
#[derive(Debug)]
pub(crate) struct BlockReply {
    id: CallId,
    reply_to: Mailbox,
}

impl BlockReply {
    pub(crate) fn respond(self, outcome: Result<Value, ActorError>) {
        let id = self.id;
        let response = Message::BlockResponse(BlockResponse { id, outcome });
        if let Err(e) = self.reply_to.send(response) {
            debug!(call_id = %id, error = %e, "Block response dropped");
        }
    }
}

/// Result of a block executed on the sender.
#[derive(Debug)]
pub struct BlockResponse {
    pub id: CallId,
    pub outcome: Result<Value, ActorError>,
}

/// Notification that an actor has terminated.
#[derive(Debug, Clone)]
pub struct ExitEvent {
    pub actor: ActorRef,
    /// `None` for a normal exit.
    pub reason: Option<ActorError>,
    /// `true` when the receiver was linked (rather than only monitoring).
    pub linked: bool,
}

/// Exit notification for an actor that was registered under a name.
#[derive(Debug, Clone)]
pub struct NamedExitEvent {
    pub name: String,
    pub event: ExitEvent,
}

/// Out-of-band events, always delivered ahead of ordinary messages.
#[derive(Debug)]
pub enum SystemEvent {
    Exit(ExitEvent),
    NamedExit(NamedExitEvent),
    Terminate,
    SignalCondition {
        condition: ConditionId,
        value: Value,
        broadcast: bool,
    },
}

/// Anything that can sit in a mailbox.
#[derive(Debug)]
pub enum Message {
    Call(Call),
    Response(Response),
    BlockCall(BlockCall),
    BlockResponse(BlockResponse),
    System(SystemEvent),
    /// A plain message consumed by selective receive.
    Info(Value),
}

impl Message {
    pub fn is_system(&self) -> bool {
        matches!(self, Message::System(_))
    }

    /// Replies are owed to someone already waiting, so they ignore capacity.
    pub(crate) fn is_bounded(&self) -> bool {
        matches!(
            self,
            Message::Call(_) | Message::BlockCall(_) | Message::Info(_)
        )
    }

    pub fn is_response_for(&self, id: CallId) -> bool {
        matches!(self, Message::Response(r) if r.call_id == id)
    }

    /// Fails whatever responder the message carries with `DeadActor`.
    pub(crate) fn cleanup(self) {
        match self {
            Message::Call(call) => call.cleanup(),
            Message::BlockCall(block_call) => block_call.cleanup(),
            _ => {}
        }
    }
}
