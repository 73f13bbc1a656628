//! # Actor Dispatch Loop
//!
//! Each actor owns one OS thread running a single-threaded tokio runtime. The
//! thread drives [`ActorLoop::run`], which repeatedly:
//!
//! 1. receives the next message (system events first),
//! 2. routes responses, block results, signals and plain messages to the tasks
//!    waiting for them,
//! 3. dispatches calls, exit notifications and incoming blocks as new tasks,
//! 4. reaps finished tasks, delivering their one response.
//!
//! The loop itself never holds the run token, so it keeps receiving while
//! tasks are parked. That is what lets an actor serve a call that comes back
//! to it in the middle of one of its own synchronous calls.
//!
//! ## Crash Model
//!
//! | Outcome of a task | Caller sees | Actor |
//! |-------------------|-------------|-------|
//! | `Ok(value)` | the value | keeps running |
//! | `Err(ActorError::Abort(_))` | the abort | keeps running |
//! | any other `Err`, or a panic | the error | crashes |
//!
//! A crash (or a termination request) runs [`ActorLoop::shutdown`]: abort the
//! tasks, fail every pending responder with `DeadActor`, run the finalizer,
//! vacate the registry, notify links and monitors, mark the actor dead.

use crate::actor_ref::{ActorRef, ActorState, ExitReason};
use crate::behavior::{Behavior, BehaviorDescriptor};
use crate::block::Block;
use crate::condition::ConditionId;
use crate::config::{ActorOptions, TaskBackend};
use crate::context::Ctx;
use crate::error::ActorError;
use crate::message::{
    BlockCall, BlockReply, Call, CallId, ChainId, ExitEvent, Message, SystemEvent,
};
use crate::system::ActorSystem;
use crate::task::{Reply, TaskEntry, TaskHandle, TaskId, TaskInfo, TaskStatus, TaskTable};
use crate::value::{Args, Value};
use futures::FutureExt;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::{oneshot, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

pub(crate) type ReplySender = oneshot::Sender<Result<Value, ActorError>>;

type Predicate = Box<dyn FnMut(&Value) -> bool + Send>;

pub(crate) struct PendingReceive {
    id: u64,
    predicate: Predicate,
    reply: oneshot::Sender<Value>,
}

/// Tasks blocked in selective receive, in arrival order.
#[derive(Default)]
pub(crate) struct Receivers {
    next_id: u64,
    waiting: Vec<PendingReceive>,
}

impl Receivers {
    pub(crate) fn push(&mut self, predicate: Predicate, reply: oneshot::Sender<Value>) -> u64 {
        self.next_id += 1;
        self.waiting.push(PendingReceive {
            id: self.next_id,
            predicate,
            reply,
        });
        self.next_id
    }

    pub(crate) fn remove(&mut self, id: u64) {
        self.waiting.retain(|receiver| receiver.id != id);
    }

    /// Hands `value` to the first receiver accepting it. Gives the value back
    /// when nobody does. A panicking predicate is reported as an error.
    fn deliver(&mut self, value: Value) -> Result<Option<Value>, ActorError> {
        self.waiting.retain(|receiver| !receiver.reply.is_closed());
        let waiting = &mut self.waiting;
        let index = std::panic::catch_unwind(AssertUnwindSafe(|| {
            waiting
                .iter_mut()
                .position(|receiver| (receiver.predicate)(&value))
        }))
        .map_err(ActorError::from_panic)?;
        match index {
            Some(index) => {
                let receiver = self.waiting.remove(index);
                let _ = receiver.reply.send(value);
                Ok(None)
            }
            None => Ok(Some(value)),
        }
    }

    fn clear(&mut self) {
        self.waiting.clear();
    }
}

/// State of an actor shared between its loop and its tasks.
pub(crate) struct ActorShared<B: Behavior> {
    pub(crate) actor: ActorRef,
    pub(crate) system: ActorSystem,
    pub(crate) behavior: Arc<Mutex<B>>,
    pub(crate) descriptor: BehaviorDescriptor<B>,
    pub(crate) options: ActorOptions,
    pub(crate) run_token: Arc<Semaphore>,
    pub(crate) tasks: Arc<Mutex<TaskTable>>,
    pub(crate) pending: Mutex<HashMap<CallId, ReplySender>>,
    pub(crate) signals: Mutex<HashMap<String, Vec<oneshot::Sender<Value>>>>,
    pub(crate) conditions: Mutex<HashMap<ConditionId, VecDeque<oneshot::Sender<Value>>>>,
    pub(crate) receivers: Mutex<Receivers>,
}

impl<B: Behavior> ActorShared<B> {
    pub(crate) fn new(
        actor: ActorRef,
        system: ActorSystem,
        behavior: Arc<Mutex<B>>,
        descriptor: BehaviorDescriptor<B>,
        options: ActorOptions,
    ) -> Self {
        Self {
            actor,
            system,
            behavior,
            descriptor,
            options,
            run_token: Arc::new(Semaphore::new(1)),
            tasks: Arc::new(Mutex::new(TaskTable::default())),
            pending: Mutex::new(HashMap::new()),
            signals: Mutex::new(HashMap::new()),
            conditions: Mutex::new(HashMap::new()),
            receivers: Mutex::new(Receivers::default()),
        }
    }
}

type TaskOutcome = (TaskId, Result<Value, ActorError>);

/// Description of a task about to be spawned.
struct TaskSpec {
    label: String,
    chain_id: ChainId,
    exclusive: bool,
    reply: Reply,
    crash_on_error: bool,
}

pub(crate) struct ActorLoop<B: Behavior> {
    shared: Arc<ActorShared<B>>,
    tasks: JoinSet<TaskOutcome>,
}

impl<B: Behavior> ActorLoop<B> {
    pub(crate) fn new(shared: Arc<ActorShared<B>>) -> Self {
        Self {
            shared,
            tasks: JoinSet::new(),
        }
    }

    fn actor(&self) -> &ActorRef {
        &self.shared.actor
    }

    pub(crate) async fn run(mut self) -> ExitReason {
        let actor = self.actor().clone();
        actor.set_state(ActorState::Running);
        info!(actor = %actor.id(), behavior = actor.type_name(), "Actor started");

        let reason = loop {
            tokio::select! {
                biased;
                _ = actor.killed().notified() => break ExitReason::Killed,
                Some(joined) = self.tasks.join_next(), if !self.tasks.is_empty() => {
                    match joined {
                        Ok((id, outcome)) => {
                            if let Some(reason) = self.reap(id, outcome) {
                                break reason;
                            }
                        }
                        Err(e) => warn!(actor = %actor.id(), error = %e, "Task did not complete"),
                    }
                }
                received = actor.mailbox().receive(None, |_| true) => match received {
                    Ok(message) => {
                        if let Some(reason) = self.handle_message(message) {
                            break reason;
                        }
                    }
                    Err(_) => break ExitReason::Killed,
                },
            }
        };

        self.shutdown(&reason);
        reason
    }

    fn handle_message(&mut self, message: Message) -> Option<ExitReason> {
        match message {
            Message::Call(call) => {
                self.dispatch_call(call);
                None
            }
            Message::Response(response) => {
                self.resolve_pending(response.call_id, response.outcome);
                None
            }
            Message::BlockResponse(response) => {
                self.resolve_pending(response.id, response.outcome);
                None
            }
            Message::BlockCall(block_call) => {
                self.run_block(block_call);
                None
            }
            Message::Info(value) => {
                let delivered = self.shared.receivers.lock().deliver(value);
                match delivered {
                    Ok(None) => None,
                    Ok(Some(value)) => {
                        debug!(actor = %self.actor().id(), message = ?value, "Discarded message");
                        None
                    }
                    Err(e) => {
                        error!(actor = %self.actor().id(), error = %e, "Receive predicate panicked");
                        Some(ExitReason::Crashed(e))
                    }
                }
            }
            Message::System(event) => self.handle_system_event(event),
        }
    }

    fn resolve_pending(&self, call_id: CallId, outcome: Result<Value, ActorError>) {
        let waiter = self.shared.pending.lock().remove(&call_id);
        match waiter {
            Some(waiter) => {
                let _ = waiter.send(outcome);
            }
            None => debug!(actor = %self.actor().id(), %call_id, "Discarded response"),
        }
    }

    fn dispatch_call(&mut self, mut call: Call) {
        let descriptor = &self.shared.descriptor;
        let method = match descriptor.resolve(&call.method, call.args.len()) {
            Ok(method) => method.clone(),
            Err(reason) => {
                debug!(actor = %self.actor().id(), method = %call.method, %reason, "Call aborted");
                call.respond(Err(ActorError::Abort(reason)));
                return;
            }
        };
        if descriptor.executes_block_on_receiver(&method.name) {
            if let Some(block) = call.args.block_mut() {
                block.execute_on_receiver();
            }
        }
        let exclusive = self.shared.options.exclusive || descriptor.is_exclusive(&method.name);
        let reply = match call.take_responder() {
            Some(responder) => Reply::Call(call.id, responder),
            None => Reply::None,
        };
        let spec = TaskSpec {
            label: method.name.clone(),
            chain_id: call.chain_id,
            exclusive,
            reply,
            crash_on_error: true,
        };
        let args = call.args;
        self.spawn_task(spec, move |ctx| method.handler.invoke(ctx, args));
    }

    /// Runs a block this actor sent along with one of its calls.
    fn run_block(&mut self, block_call: BlockCall) {
        let (block, args, reply): (Block, Args, BlockReply) = block_call.into_parts();
        let spec = TaskSpec {
            label: "block".to_string(),
            chain_id: ChainId::new(),
            exclusive: false,
            reply: Reply::Block(reply),
            crash_on_error: false,
        };
        self.spawn_task(spec, move |_ctx| async move { block.invoke(args) });
    }

    fn handle_system_event(&mut self, event: SystemEvent) -> Option<ExitReason> {
        match event {
            SystemEvent::Terminate => {
                debug!(actor = %self.actor().id(), "Termination requested");
                Some(ExitReason::Normal)
            }
            SystemEvent::Exit(event) => self.handle_exit(event, None),
            SystemEvent::NamedExit(named) => self.handle_exit(named.event, Some(named.name)),
            SystemEvent::SignalCondition {
                condition,
                value,
                broadcast,
            } => {
                let mut conditions = self.shared.conditions.lock();
                let mut woken = 0usize;
                if let Some(waiters) = conditions.get_mut(&condition) {
                    while let Some(waiter) = waiters.pop_front() {
                        if waiter.send(value.clone()).is_ok() {
                            woken += 1;
                            if !broadcast {
                                break;
                            }
                        }
                    }
                    if waiters.is_empty() {
                        conditions.remove(&condition);
                    }
                }
                if woken == 0 {
                    debug!(actor = %self.actor().id(), %condition, "Signal with no waiters");
                }
                None
            }
        }
    }

    fn handle_exit(&mut self, event: ExitEvent, name: Option<String>) -> Option<ExitReason> {
        let actor = self.actor().clone();
        if let Some(handler) = self.shared.descriptor.exit_handler_name() {
            let method = match self.shared.descriptor.resolve(handler, 2) {
                Ok(method) => method.clone(),
                Err(reason) => {
                    error!(actor = %actor.id(), %reason, "Exit handler unusable");
                    return Some(ExitReason::Crashed(ActorError::Abort(reason)));
                }
            };
            debug!(actor = %actor.id(), peer = %event.actor.id(), name = ?name, "Trapped exit");
            let args = crate::args![event.actor, event.reason];
            let spec = TaskSpec {
                label: method.name.clone(),
                chain_id: ChainId::new(),
                exclusive: self.shared.options.exclusive
                    || self.shared.descriptor.is_exclusive(&method.name),
                reply: Reply::None,
                crash_on_error: true,
            };
            self.spawn_task(spec, move |ctx| method.handler.invoke(ctx, args));
            return None;
        }
        match event.reason {
            Some(reason) if event.linked => {
                warn!(
                    actor = %actor.id(),
                    peer = %event.actor.id(),
                    error = %reason,
                    "Linked actor crashed"
                );
                Some(ExitReason::Crashed(ActorError::LinkedActorCrashed {
                    actor: event.actor.id(),
                    reason: Box::new(reason),
                }))
            }
            reason => {
                debug!(
                    actor = %actor.id(),
                    peer = %event.actor.id(),
                    linked = event.linked,
                    abnormal = reason.is_some(),
                    "Peer exited"
                );
                None
            }
        }
    }

    fn spawn_task<F, Fut>(&mut self, spec: TaskSpec, body: F)
    where
        F: FnOnce(Ctx<B>) -> Fut + Send + 'static,
        Fut: Future<Output = Result<Value, ActorError>> + Send + 'static,
    {
        let id = TaskId::next();
        self.shared.tasks.lock().insert(TaskEntry {
            info: TaskInfo {
                id,
                status: TaskStatus::Idle,
                chain_id: spec.chain_id,
                method: spec.label,
                exclusive: spec.exclusive,
            },
            reply: spec.reply,
            crash_on_error: spec.crash_on_error,
        });

        let handle = Arc::new(TaskHandle::new(
            id,
            self.shared.run_token.clone(),
            self.shared.tasks.clone(),
            spec.exclusive,
        ));
        let ctx = Ctx::new(self.shared.clone(), handle.clone(), spec.chain_id);
        let task = async move {
            handle.acquire().await;
            let outcome = AssertUnwindSafe(async move { body(ctx).await })
                .catch_unwind()
                .await
                .unwrap_or_else(|panic| Err(ActorError::from_panic(panic)));
            handle.release();
            (id, outcome)
        };

        match self.shared.options.task_backend {
            TaskBackend::Fiber => {
                self.tasks.spawn(task);
            }
            TaskBackend::Threaded => {
                let runtime = Handle::current();
                self.tasks.spawn_blocking(move || runtime.block_on(task));
            }
        }
    }

    /// Delivers the outcome of a finished task. Returns the exit reason when
    /// the outcome crashes the actor.
    fn reap(&mut self, id: TaskId, outcome: Result<Value, ActorError>) -> Option<ExitReason> {
        let entry = self.shared.tasks.lock().remove(id)?;
        let crash = match &outcome {
            Err(e) if entry.crash_on_error && !e.is_abort() => Some(e.clone()),
            Err(e) => {
                debug!(actor = %self.actor().id(), task = %id, method = %entry.info.method, error = %e, "Task failed");
                None
            }
            Ok(_) => None,
        };
        entry.reply.send(outcome);
        crash.map(|e| {
            error!(
                actor = %self.actor().id(),
                method = %entry.info.method,
                error = %e,
                "Actor crashed"
            );
            ExitReason::Crashed(e)
        })
    }

    fn shutdown(&mut self, reason: &ExitReason) {
        let actor = self.actor().clone();
        actor.set_state(ActorState::Terminating);
        self.tasks.abort_all();

        let orphaned = self.shared.tasks.lock().drain();
        if !orphaned.is_empty() {
            debug!(actor = %actor.id(), tasks = orphaned.len(), "Failing tasks of exiting actor");
        }
        for entry in orphaned {
            entry.reply.send(Err(ActorError::DeadActor));
        }
        self.shared.pending.lock().clear();
        self.shared.signals.lock().clear();
        self.shared.conditions.lock().clear();
        self.shared.receivers.lock().clear();
        for message in actor.mailbox().shutdown() {
            message.cleanup();
        }

        if !matches!(reason, ExitReason::Killed) {
            if let Some(finalizer) = self.shared.descriptor.finalizer_fn() {
                let behavior = self.shared.behavior.clone();
                let finalized = std::panic::catch_unwind(AssertUnwindSafe(|| {
                    finalizer(&mut behavior.lock());
                }));
                if finalized.is_err() {
                    error!(actor = %actor.id(), "Finalizer panicked");
                }
            }
        }

        match reason {
            ExitReason::Normal => info!(actor = %actor.id(), "Actor terminated"),
            ExitReason::Crashed(e) => error!(actor = %actor.id(), error = %e, "Actor exited after crash"),
            ExitReason::Killed => warn!(actor = %actor.id(), "Actor killed"),
        }
        actor.release(reason);
    }
}

/// Starts the actor's thread and its dispatch loop.
pub(crate) fn run_thread<B: Behavior>(shared: Arc<ActorShared<B>>) -> std::io::Result<()> {
    let thread_name = shared.actor.id().to_string();
    let task_thread_name = format!("{thread_name}-task");
    std::thread::Builder::new()
        .name(thread_name)
        .spawn(move || {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .thread_name(task_thread_name)
                .build();
            let runtime = match runtime {
                Ok(runtime) => runtime,
                Err(e) => {
                    let actor = shared.actor.clone();
                    error!(actor = %actor.id(), error = %e, "Failed to build actor runtime");
                    for message in actor.mailbox().shutdown() {
                        message.cleanup();
                    }
                    actor.release(&ExitReason::Crashed(ActorError::Spawn(e.to_string())));
                    return;
                }
            };
            let guard = shared.clone();
            let ran = std::panic::catch_unwind(AssertUnwindSafe(|| {
                runtime.block_on(ActorLoop::new(shared).run())
            }));
            if let Err(panic) = ran {
                let reason = ExitReason::Crashed(ActorError::from_panic(panic));
                error!(actor = %guard.actor.id(), "Dispatch loop panicked");
                for entry in guard.tasks.lock().drain() {
                    entry.reply.send(Err(ActorError::DeadActor));
                }
                guard.pending.lock().clear();
                for message in guard.actor.mailbox().shutdown() {
                    message.cleanup();
                }
                guard.actor.release(&reason);
            }
            runtime.shutdown_background();
        })?;
    Ok(())
}
