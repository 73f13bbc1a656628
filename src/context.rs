//! # Task Context
//!
//! A [`Ctx`] is handed to every task handler. It is the only way to reach the
//! actor from inside: its state, its identity, and every operation that may
//! suspend the running task.
//!
//! ## Suspension Points
//!
//! | Operation | Task status while parked |
//! |-----------|--------------------------|
//! | [`Ctx::call`], [`Ctx::call_timeout`], [`Ctx::call_with_block`] | `Callwait` |
//! | [`Ctx::sleep`] | `Sleeping` |
//! | [`Ctx::await_future`] | `Futurewait` |
//! | [`Ctx::yield_block`] (sender-executed block) | `Blockwait` |
//! | [`Ctx::wait`], [`Condition::wait`] | `Signalwait` |
//! | [`Ctx::receive`] | `Receiving` |
//!
//! While a task is parked the actor keeps dispatching: other calls run, and
//! nested calls coming back into this actor are served. Inside
//! [`Ctx::exclusive`] the task keeps the actor to itself instead.

use crate::actor::ActorShared;
use crate::actor_ref::{Actor, ActorRef};
use crate::behavior::Behavior;
use crate::block::{Block, BlockExecution, BlockRef};
use crate::condition::{Condition, ConditionId};
use crate::config::ActorOptions;
use crate::error::ActorError;
use crate::future::CallFuture;
use crate::links;
use crate::mailbox::Mailbox;
use crate::message::{BlockCall, Call, CallId, ChainId, Message, Responder};
use crate::system::ActorSystem;
use crate::task::{TaskHandle, TaskId, TaskInfo, TaskStatus};
use crate::value::{Args, Value};
use std::any::Any;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::debug;

/// Handle of the running task on its actor.
pub struct Ctx<B: Behavior> {
    shared: Arc<ActorShared<B>>,
    task: Arc<TaskHandle>,
    chain_id: ChainId,
}

impl<B: Behavior> Clone for Ctx<B> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
            task: self.task.clone(),
            chain_id: self.chain_id,
        }
    }
}

impl<B: Behavior> Ctx<B> {
    pub(crate) fn new(shared: Arc<ActorShared<B>>, task: Arc<TaskHandle>, chain_id: ChainId) -> Self {
        Self {
            shared,
            task,
            chain_id,
        }
    }

    /// The actor running this task.
    pub fn current(&self) -> &ActorRef {
        &self.shared.actor
    }

    pub fn system(&self) -> &ActorSystem {
        &self.shared.system
    }

    pub fn task_id(&self) -> TaskId {
        self.task.id()
    }

    /// Chain id of the call this task serves; nested calls inherit it.
    pub fn call_chain_id(&self) -> ChainId {
        self.chain_id
    }

    fn mailbox(&self) -> &Mailbox {
        self.shared.actor.mailbox()
    }

    /// Runs `f` with exclusive access to the behavior.
    pub fn state<R>(&self, f: impl FnOnce(&mut B) -> R) -> R {
        let mut behavior = self.shared.behavior.lock();
        f(&mut behavior)
    }

    pub fn is_exclusive(&self) -> bool {
        self.task.is_exclusive()
    }

    /// Runs `fut` without letting other tasks of this actor interleave, even
    /// when it suspends.
    pub async fn exclusive<F: Future>(&self, fut: F) -> F::Output {
        self.task.enter_exclusive();
        let output = fut.await;
        self.task.leave_exclusive();
        output
    }

    /// `true` when another live task of this actor serves the same call
    /// chain, i.e. the chain has come back into this actor.
    pub fn detect_recursion(&self) -> bool {
        self.shared
            .tasks
            .lock()
            .shares_chain(self.task.id(), self.chain_id)
    }

    /// Snapshot of the actor's live tasks.
    pub fn tasks(&self) -> Vec<TaskInfo> {
        self.shared.tasks.lock().snapshot()
    }

    pub(crate) async fn suspend<F: Future>(&self, status: TaskStatus, fut: F) -> F::Output {
        self.task.suspend(status, fut).await
    }

    pub async fn sleep(&self, duration: Duration) {
        self.suspend(TaskStatus::Sleeping, tokio::time::sleep(duration))
            .await
    }

    // ---------------------------------------------------------------------
    // Calls
    // ---------------------------------------------------------------------

    /// Synchronous call from inside the actor. Only this task waits; the actor
    /// keeps serving other messages, including calls that come back to it.
    ///
    /// An abort from `target` comes back as [`ActorError::CallAborted`]: it
    /// crashes this actor if the task returns it.
    pub async fn call(&self, target: &ActorRef, method: &str, args: Args) -> Result<Value, ActorError> {
        self.call_inner(target, method, args, None, target.default_call_timeout())
            .await
    }

    pub async fn call_timeout(
        &self,
        target: &ActorRef,
        method: &str,
        args: Args,
        timeout: Duration,
    ) -> Result<Value, ActorError> {
        self.call_inner(target, method, args, None, Some(timeout))
            .await
    }

    pub async fn call_with_block(
        &self,
        target: &ActorRef,
        method: &str,
        args: Args,
        block: Block,
    ) -> Result<Value, ActorError> {
        self.call_inner(target, method, args, Some(block), target.default_call_timeout())
            .await
    }

    async fn call_inner(
        &self,
        target: &ActorRef,
        method: &str,
        mut args: Args,
        block: Option<Block>,
        timeout: Option<Duration>,
    ) -> Result<Value, ActorError> {
        if let Some(block) = block {
            args.set_block(BlockRef::new(block, self.mailbox().clone()));
        }
        if target == self.current() {
            return self.invoke_inline(method, args).await;
        }
        if !target.is_alive() {
            return Err(ActorError::DeadActor);
        }

        let responder = Responder::new(self.mailbox().clone());
        let call = Call::from_task(method, args, self.chain_id, Some(responder), self.is_exclusive())?;
        let call_id = call.id;
        let reply = self.expect_reply(call_id);
        if let Err(e) = target.send_call(call) {
            self.forget_reply(call_id);
            return Err(e);
        }
        debug!(actor = %self.current().id(), target = %target.id(), method, %call_id, "Waiting for response");

        let outcome = match timeout {
            None => self
                .suspend(TaskStatus::Callwait, reply)
                .await
                .unwrap_or(Err(ActorError::DeadActor)),
            Some(timeout) => {
                let waited = self
                    .suspend(TaskStatus::Callwait, tokio::time::timeout(timeout, reply))
                    .await;
                match waited {
                    Ok(outcome) => outcome.unwrap_or(Err(ActorError::DeadActor)),
                    Err(_) => {
                        self.forget_reply(call_id);
                        Err(ActorError::Timeout(timeout))
                    }
                }
            }
        };
        outcome.map_err(|e| e.raised_in_sender(method))
    }

    /// Calls a method of this very actor on the current task.
    async fn invoke_inline(&self, method: &str, mut args: Args) -> Result<Value, ActorError> {
        let entry = self
            .shared
            .descriptor
            .resolve(method, args.len())
            .map_err(ActorError::Abort)?
            .clone();
        if self.shared.descriptor.executes_block_on_receiver(method) {
            if let Some(block) = args.block_mut() {
                block.execute_on_receiver();
            }
        }
        entry.handler.invoke(self.clone(), args).await
    }

    fn expect_reply(&self, call_id: CallId) -> oneshot::Receiver<Result<Value, ActorError>> {
        let (tx, rx) = oneshot::channel();
        self.shared.pending.lock().insert(call_id, tx);
        rx
    }

    fn forget_reply(&self, call_id: CallId) {
        self.shared.pending.lock().remove(&call_id);
    }

    /// Fire-and-forget call carrying this task's chain id.
    pub fn cast(&self, target: &ActorRef, method: &str, args: Args) -> Result<(), ActorError> {
        let call = Call::from_task(method, args, self.chain_id, None, self.is_exclusive())?;
        target.send_call(call)
    }

    pub fn cast_with_block(
        &self,
        target: &ActorRef,
        method: &str,
        mut args: Args,
        block: Block,
    ) -> Result<(), ActorError> {
        args.set_block(BlockRef::new(block, self.mailbox().clone()));
        self.cast(target, method, args)
    }

    pub fn future(&self, target: &ActorRef, method: &str, args: Args) -> Result<CallFuture, ActorError> {
        CallFuture::send(target, method, args, self.chain_id)
    }

    /// Reads a future, suspending only this task while it is pending.
    pub async fn await_future(&self, future: &CallFuture) -> Result<Value, ActorError> {
        let outcome = if future.is_ready() {
            future.value().await
        } else {
            self.suspend(TaskStatus::Futurewait, future.value()).await
        };
        outcome.map_err(|e| e.raised_in_sender(future.method()))
    }

    /// Executes a block received with a call. Receiver-executed blocks run
    /// right here; others are sent back to the caller, and this task waits
    /// for the result.
    pub async fn yield_block(&self, block: &BlockRef, args: Args) -> Result<Value, ActorError> {
        if block.execution() == BlockExecution::Receiver || block.sender() == self.mailbox() {
            return block.block().invoke(args);
        }
        let call_id = CallId::next();
        let reply = self.expect_reply(call_id);
        let block_call = BlockCall::new(call_id, block.block().clone(), args, self.mailbox().clone());
        if let Err(e) = block.sender().send(Message::BlockCall(block_call)) {
            self.forget_reply(call_id);
            return Err(e.dead_target());
        }
        self.suspend(TaskStatus::Blockwait, reply)
            .await
            .unwrap_or(Err(ActorError::DeadActor))
    }

    // ---------------------------------------------------------------------
    // Links and lifecycle
    // ---------------------------------------------------------------------

    pub fn link(&self, other: &ActorRef) -> Result<(), ActorError> {
        links::link(self.current(), other)
    }

    pub fn unlink(&self, other: &ActorRef) {
        links::unlink(self.current(), other)
    }

    pub fn monitor(&self, other: &ActorRef) -> Result<(), ActorError> {
        links::monitor(self.current(), other)
    }

    pub fn unmonitor(&self, other: &ActorRef) {
        links::unmonitor(self.current(), other)
    }

    /// Spawns an actor already linked to this one.
    pub fn spawn_link<C: Behavior>(&self, behavior: C) -> Result<Actor<C>, ActorError> {
        let options = ActorOptions::from_config(self.system().config());
        self.spawn_link_with(behavior, options)
    }

    pub fn spawn_link_with<C: Behavior>(
        &self,
        behavior: C,
        options: ActorOptions,
    ) -> Result<Actor<C>, ActorError> {
        self.system().start(behavior, options, Some(self.current()))
    }

    /// Asks this actor to stop once the current message queue reaches the
    /// request.
    pub fn terminate(&self) -> Result<(), ActorError> {
        self.current().request_termination()
    }

    /// Builds an error that fails the current call without crashing the actor.
    pub fn abort(&self, reason: impl Into<String>) -> ActorError {
        let error = ActorError::abort(reason);
        debug!(actor = %self.current().id(), task = %self.task.id(), error = %error, "Aborting call");
        error
    }

    // ---------------------------------------------------------------------
    // Signals, conditions and selective receive
    // ---------------------------------------------------------------------

    /// Wakes every task of this actor waiting on `name`. Returns whether any
    /// task was waiting.
    pub fn signal<T: Any + Send + Sync>(&self, name: &str, value: T) -> bool {
        let waiters = self.shared.signals.lock().remove(name).unwrap_or_default();
        let value = Value::new(value);
        let mut woken = false;
        for waiter in waiters {
            woken |= waiter.send(value.clone()).is_ok();
        }
        woken
    }

    /// Suspends until [`Ctx::signal`] is called with `name`.
    pub async fn wait(&self, name: &str) -> Result<Value, ActorError> {
        let (tx, rx) = oneshot::channel();
        self.shared
            .signals
            .lock()
            .entry(name.to_string())
            .or_default()
            .push(tx);
        self.suspend(TaskStatus::Signalwait, rx)
            .await
            .map_err(|_| ActorError::DeadActor)
    }

    /// A new condition owned by this actor.
    pub fn condition(&self) -> Condition {
        Condition::new(self.current().clone())
    }

    pub(crate) async fn wait_condition(
        &self,
        condition: ConditionId,
        timeout: Option<Duration>,
    ) -> Result<Value, ActorError> {
        let (tx, rx) = oneshot::channel();
        self.shared
            .conditions
            .lock()
            .entry(condition)
            .or_default()
            .push_back(tx);
        match timeout {
            None => self
                .suspend(TaskStatus::Signalwait, rx)
                .await
                .map_err(|_| ActorError::DeadActor),
            Some(timeout) => {
                match self
                    .suspend(TaskStatus::Signalwait, tokio::time::timeout(timeout, rx))
                    .await
                {
                    Ok(value) => value.map_err(|_| ActorError::DeadActor),
                    Err(_) => {
                        if let Some(waiters) = self.shared.conditions.lock().get_mut(&condition) {
                            waiters.retain(|waiter| !waiter.is_closed());
                        }
                        Err(ActorError::Timeout(timeout))
                    }
                }
            }
        }
    }

    /// Waits for a plain message (sent with [`ActorRef::tell`]) accepted by
    /// `predicate`. Messages that arrive while no receiver accepts them are
    /// discarded.
    pub async fn receive<P>(&self, timeout: Option<Duration>, predicate: P) -> Result<Value, ActorError>
    where
        P: FnMut(&Value) -> bool + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let id = self.shared.receivers.lock().push(Box::new(predicate), tx);
        match timeout {
            None => self
                .suspend(TaskStatus::Receiving, rx)
                .await
                .map_err(|_| ActorError::DeadActor),
            Some(timeout) => {
                match self
                    .suspend(TaskStatus::Receiving, tokio::time::timeout(timeout, rx))
                    .await
                {
                    Ok(value) => value.map_err(|_| ActorError::DeadActor),
                    Err(_) => {
                        self.shared.receivers.lock().remove(id);
                        Err(ActorError::Timeout(timeout))
                    }
                }
            }
        }
    }
}
