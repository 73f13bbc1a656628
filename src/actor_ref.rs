//! # Actor Handles
//!
//! [`ActorRef`] is the untyped, cloneable address of an actor: it can call,
//! cast, tell, terminate, kill and join. [`Actor<B>`] is what spawning
//! returns; it dereferences to the `ActorRef` and remembers the behavior type.
//!
//! ## Calling From Outside an Actor
//!
//! A caller outside any actor has no mailbox of its own, so each synchronous
//! call gets a private one. While waiting, the caller executes blocks that the
//! callee sends back to it, which keeps sender-executed blocks working from
//! plain async code. Inside an actor use [`Ctx::call`](crate::Ctx::call)
//! instead, which suspends only the calling task.

use crate::behavior::Behavior;
use crate::block::{Block, BlockRef};
use crate::error::ActorError;
use crate::future::CallFuture;
use crate::links::{self, Relations};
use crate::mailbox::Mailbox;
use crate::message::{Call, CallId, ChainId, Message, Responder, SystemEvent};
use crate::system::SystemInner;
use crate::value::{Args, Value};
use parking_lot::Mutex;
use std::any::Any;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::Deref;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::{watch, Notify};
use tokio::time::Instant;
use tracing::{debug, warn};

static NEXT_ACTOR_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of an actor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ActorId(u64);

impl ActorId {
    pub(crate) fn next() -> Self {
        Self(NEXT_ACTOR_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "actor-{}", self.0)
    }
}

/// Lifecycle of an actor. States only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ActorState {
    Starting,
    Running,
    Terminating,
    Dead,
}

/// Why an actor stopped.
#[derive(Debug, Clone)]
pub enum ExitReason {
    Normal,
    Crashed(ActorError),
    /// Hard kill; the finalizer did not run.
    Killed,
}

impl ExitReason {
    pub fn is_normal(&self) -> bool {
        matches!(self, ExitReason::Normal)
    }

    /// The error carried by exit events, `None` for a normal exit.
    pub fn error(&self) -> Option<ActorError> {
        match self {
            ExitReason::Normal => None,
            ExitReason::Crashed(e) => Some(e.clone()),
            ExitReason::Killed => Some(ActorError::Killed),
        }
    }
}

pub(crate) struct ActorCell {
    id: ActorId,
    type_name: &'static str,
    mailbox: Mailbox,
    relations: Mutex<Relations>,
    state: watch::Sender<ActorState>,
    exit: Mutex<Option<ExitReason>>,
    released: AtomicBool,
    kill: Notify,
    name: Mutex<Option<String>>,
    call_timeout: Option<Duration>,
    system: Weak<SystemInner>,
}

/// Address of a live (or dead) actor.
#[derive(Clone)]
pub struct ActorRef {
    cell: Arc<ActorCell>,
}

impl ActorRef {
    pub(crate) fn new(
        type_name: &'static str,
        mailbox: Mailbox,
        call_timeout: Option<Duration>,
        system: Weak<SystemInner>,
    ) -> Self {
        let (state, _) = watch::channel(ActorState::Starting);
        Self {
            cell: Arc::new(ActorCell {
                id: ActorId::next(),
                type_name,
                mailbox,
                relations: Mutex::new(Relations::default()),
                state,
                exit: Mutex::new(None),
                released: AtomicBool::new(false),
                kill: Notify::new(),
                name: Mutex::new(None),
                call_timeout,
                system,
            }),
        }
    }

    pub fn id(&self) -> ActorId {
        self.cell.id
    }

    /// Short type name of the wrapped behavior.
    pub fn type_name(&self) -> &'static str {
        self.cell.type_name
    }

    /// Name under which the actor is registered, if any.
    pub fn name(&self) -> Option<String> {
        self.cell.name.lock().clone()
    }

    pub fn state(&self) -> ActorState {
        *self.cell.state.borrow()
    }

    pub fn is_alive(&self) -> bool {
        self.state() < ActorState::Terminating && self.cell.mailbox.is_alive()
    }

    /// How the actor stopped; `None` while it is still running.
    pub fn exit_reason(&self) -> Option<ExitReason> {
        self.cell.exit.lock().clone()
    }

    pub(crate) fn mailbox(&self) -> &Mailbox {
        &self.cell.mailbox
    }

    pub(crate) fn relations(&self) -> &Mutex<Relations> {
        &self.cell.relations
    }

    pub(crate) fn default_call_timeout(&self) -> Option<Duration> {
        self.cell.call_timeout
    }

    pub(crate) fn killed(&self) -> &Notify {
        &self.cell.kill
    }

    pub(crate) fn set_name(&self, name: Option<String>) {
        *self.cell.name.lock() = name;
    }

    pub(crate) fn is_released(&self) -> bool {
        self.cell.released.load(Ordering::Acquire)
    }

    pub(crate) fn set_state(&self, next: ActorState) {
        self.cell.state.send_if_modified(|state| {
            if *state < next {
                *state = next;
                true
            } else {
                false
            }
        });
    }

    /// Publishes the exit to the outside world exactly once: vacates the
    /// registry name, leaves the live table, notifies links and monitors and
    /// marks the actor dead.
    pub(crate) fn release(&self, reason: &ExitReason) {
        if self.cell.released.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Some(system) = self.cell.system.upgrade() {
            system.registry.vacate(self);
            system.forget(self.id());
        }
        links::notify_exit(self, reason);
        self.finish(reason.clone());
    }

    pub(crate) fn finish(&self, reason: ExitReason) {
        {
            let mut exit = self.cell.exit.lock();
            if exit.is_none() {
                *exit = Some(reason);
            }
        }
        self.set_state(ActorState::Dead);
    }

    pub(crate) fn send_call(&self, call: Call) -> Result<(), ActorError> {
        self.cell
            .mailbox
            .send(Message::Call(call))
            .map_err(ActorError::dead_target)
    }

    /// Sends a synchronous call and waits for its response.
    ///
    /// Uses the actor's configured call timeout, if any.
    pub async fn call(&self, method: &str, args: Args) -> Result<Value, ActorError> {
        self.call_from_outside(method, args, None, self.default_call_timeout())
            .await
    }

    pub async fn call_timeout(
        &self,
        method: &str,
        args: Args,
        timeout: Duration,
    ) -> Result<Value, ActorError> {
        self.call_from_outside(method, args, None, Some(timeout))
            .await
    }

    /// Sends a call carrying `block`. Unless the method runs blocks on the
    /// receiver, the callee sends the block back and this caller executes it
    /// while waiting.
    pub async fn call_with_block(
        &self,
        method: &str,
        args: Args,
        block: Block,
    ) -> Result<Value, ActorError> {
        self.call_from_outside(method, args, Some(block), self.default_call_timeout())
            .await
    }

    async fn call_from_outside(
        &self,
        method: &str,
        mut args: Args,
        block: Option<Block>,
        timeout: Option<Duration>,
    ) -> Result<Value, ActorError> {
        if !self.is_alive() {
            return Err(ActorError::DeadActor);
        }
        let mailbox = Mailbox::new();
        if let Some(block) = block {
            args.set_block(BlockRef::new(block, mailbox.clone()));
        }
        let call = Call::new(
            method,
            args,
            ChainId::new(),
            Some(Responder::new(mailbox.clone())),
        );
        let call_id = call.id;
        debug!(actor = %self.id(), method, %call_id, "Sending call");
        self.send_call(call)?;

        let deadline = timeout.map(|t| (Instant::now() + t, t));
        let outcome = self.wait_reply(&mailbox, call_id, deadline).await;
        for late in mailbox.shutdown() {
            late.cleanup();
        }
        outcome?
    }

    /// Waits on a private reply mailbox for the response to `call_id`,
    /// executing block calls addressed to the caller meanwhile.
    ///
    /// The outer error is a local failure (timeout, closed mailbox); the inner
    /// result is the call's own outcome.
    pub(crate) async fn wait_reply(
        &self,
        mailbox: &Mailbox,
        call_id: CallId,
        deadline: Option<(Instant, Duration)>,
    ) -> Result<Result<Value, ActorError>, ActorError> {
        let mut state = self.cell.state.subscribe();
        loop {
            let is_reply = |m: &Message| m.is_response_for(call_id) || matches!(m, Message::BlockCall(_));
            let message = tokio::select! {
                received = mailbox.receive_until(deadline, is_reply) => received?,
                _ = wait_dead(&mut state) => {
                    // A reply sent just before the actor died still wins.
                    match mailbox.try_receive(|m| m.is_response_for(call_id))? {
                        Some(message) => message,
                        None => return Ok(Err(ActorError::DeadActor)),
                    }
                }
            };
            match message {
                Message::Response(response) => return Ok(response.outcome),
                Message::BlockCall(block_call) => block_call.dispatch(),
                other => other.cleanup(),
            }
        }
    }

    /// Fire-and-forget call. Errors raised by the method crash the callee but
    /// are not reported back.
    pub fn cast(&self, method: &str, args: Args) -> Result<(), ActorError> {
        self.send_call(Call::new(method, args, ChainId::new(), None))
    }

    /// Sends a call whose outcome is read later through the returned future.
    pub fn future(&self, method: &str, args: Args) -> Result<CallFuture, ActorError> {
        CallFuture::send(self, method, args, ChainId::new())
    }

    /// Delivers a plain message, consumed by
    /// [`Ctx::receive`](crate::Ctx::receive).
    pub fn tell<T: Any + Send + Sync>(&self, message: T) -> Result<(), ActorError> {
        self.cell
            .mailbox
            .send(Message::Info(Value::new(message)))
            .map_err(ActorError::dead_target)
    }

    /// Asks the actor to stop once it reaches the message. Returns immediately.
    pub fn request_termination(&self) -> Result<(), ActorError> {
        self.cell
            .mailbox
            .send(Message::System(SystemEvent::Terminate))
            .map_err(ActorError::dead_target)
    }

    /// Requests termination and waits until the actor is dead.
    pub async fn terminate(&self, timeout: Duration) -> Result<ExitReason, ActorError> {
        self.request_termination()?;
        self.join(timeout).await
    }

    /// Stops the actor without running its finalizer. Queued calls fail with
    /// [`ActorError::DeadActor`] and links and monitors see a `Killed` exit.
    pub fn kill(&self) {
        if self.is_released() {
            return;
        }
        warn!(actor = %self.id(), "Killing actor");
        self.cell.kill.notify_one();
        for message in self.cell.mailbox.shutdown() {
            message.cleanup();
        }
        self.release(&ExitReason::Killed);
    }

    /// Waits until the actor is dead.
    pub async fn join(&self, timeout: Duration) -> Result<ExitReason, ActorError> {
        let mut state = self.cell.state.subscribe();
        match tokio::time::timeout(timeout, wait_dead(&mut state)).await {
            Ok(()) => Ok(self.exit_reason().unwrap_or(ExitReason::Normal)),
            Err(_) => Err(ActorError::Timeout(timeout)),
        }
    }
}

async fn wait_dead(state: &mut watch::Receiver<ActorState>) {
    let _ = state.wait_for(|s| *s == ActorState::Dead).await;
}

impl PartialEq for ActorRef {
    fn eq(&self, other: &Self) -> bool {
        self.cell.id == other.cell.id
    }
}

impl Eq for ActorRef {}

impl Hash for ActorRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.cell.id.hash(state);
    }
}

impl fmt::Debug for ActorRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = f.debug_struct("ActorRef");
        out.field("id", &self.cell.id)
            .field("type", &self.cell.type_name)
            .field("state", &self.state());
        if let Some(name) = self.name() {
            out.field("name", &name);
        }
        out.finish()
    }
}

/// Typed handle returned by spawning a [`Behavior`].
pub struct Actor<B> {
    actor: ActorRef,
    behavior: Arc<Mutex<B>>,
}

impl<B> Clone for Actor<B> {
    fn clone(&self) -> Self {
        Self {
            actor: self.actor.clone(),
            behavior: self.behavior.clone(),
        }
    }
}

impl<B: Behavior> Actor<B> {
    pub(crate) fn new(actor: ActorRef, behavior: Arc<Mutex<B>>) -> Self {
        Self { actor, behavior }
    }

    pub fn actor_ref(&self) -> &ActorRef {
        &self.actor
    }

    pub fn into_ref(self) -> ActorRef {
        self.actor
    }

    /// Direct access to the wrapped value, bypassing the mailbox.
    ///
    /// Locking it from outside races with the actor's own tasks; only the
    /// mutex protects the value, not the actor's sequencing guarantees.
    pub fn bare_object(&self) -> Arc<Mutex<B>> {
        warn!(
            actor = %self.actor.id(),
            "Bare object accessed; actor isolation no longer holds for this value"
        );
        self.behavior.clone()
    }
}

impl<B> Deref for Actor<B> {
    type Target = ActorRef;

    fn deref(&self) -> &ActorRef {
        &self.actor
    }
}

impl<B> fmt::Debug for Actor<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.actor.fmt(f)
    }
}
