//! # Tasks
//!
//! Every dispatched call, exit-handler invocation and block executed on behalf
//! of another actor runs as a task. All tasks of an actor share one *run
//! token*, a single-permit semaphore: a task holds it while it executes and
//! hands it back at each suspension point, so exactly one task touches the
//! behavior at a time while others sit parked waiting for replies.
//!
//! In exclusive mode a task keeps the token across suspension points. Other
//! calls are still received and dispatched, but their tasks stay parked until
//! the exclusive task finishes.

use crate::error::ActorError;
use crate::message::{BlockReply, CallId, ChainId, Responder};
use crate::value::Value;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

static NEXT_TASK_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskId(u64);

impl TaskId {
    pub(crate) fn next() -> Self {
        Self(NEXT_TASK_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task-{}", self.0)
    }
}

/// What a task is currently doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    /// Waiting for the run token.
    Idle,
    Running,
    Callwait,
    Sleeping,
    Futurewait,
    Blockwait,
    Signalwait,
    Receiving,
    Iowait,
    Dead,
}

/// Snapshot of one live task.
#[derive(Debug, Clone)]
pub struct TaskInfo {
    pub id: TaskId,
    pub status: TaskStatus,
    pub chain_id: ChainId,
    /// Method name, or the kind of work for internal tasks.
    pub method: String,
    pub exclusive: bool,
}

/// Where the outcome of a finished task goes.
pub(crate) enum Reply {
    None,
    Call(CallId, Responder),
    Block(BlockReply),
}

impl Reply {
    pub(crate) fn send(self, outcome: Result<Value, ActorError>) {
        match self {
            Reply::None => {}
            Reply::Call(call_id, responder) => responder.respond(call_id, outcome),
            Reply::Block(reply) => reply.respond(outcome),
        }
    }
}

pub(crate) struct TaskEntry {
    pub(crate) info: TaskInfo,
    pub(crate) reply: Reply,
    /// Whether an application error from this task crashes the actor.
    pub(crate) crash_on_error: bool,
}

/// Live tasks of one actor.
#[derive(Default)]
pub(crate) struct TaskTable {
    entries: HashMap<TaskId, TaskEntry>,
}

impl TaskTable {
    pub(crate) fn insert(&mut self, entry: TaskEntry) {
        self.entries.insert(entry.info.id, entry);
    }

    pub(crate) fn remove(&mut self, id: TaskId) -> Option<TaskEntry> {
        self.entries.remove(&id)
    }

    pub(crate) fn drain(&mut self) -> Vec<TaskEntry> {
        self.entries.drain().map(|(_, entry)| entry).collect()
    }

    pub(crate) fn set_status(&mut self, id: TaskId, status: TaskStatus) {
        if let Some(entry) = self.entries.get_mut(&id) {
            entry.info.status = status;
        }
    }

    pub(crate) fn snapshot(&self) -> Vec<TaskInfo> {
        let mut tasks: Vec<TaskInfo> = self.entries.values().map(|e| e.info.clone()).collect();
        tasks.sort_by_key(|info| info.id.0);
        tasks
    }

    /// `true` when a task other than `current` belongs to `chain_id`.
    pub(crate) fn shares_chain(&self, current: TaskId, chain_id: ChainId) -> bool {
        self.entries
            .values()
            .any(|e| e.info.id != current && e.info.chain_id == chain_id)
    }
}

/// A running task's grip on the run token.
pub(crate) struct TaskHandle {
    id: TaskId,
    run_token: Arc<Semaphore>,
    permit: Mutex<Option<OwnedSemaphorePermit>>,
    exclusive_depth: AtomicUsize,
    table: Arc<Mutex<TaskTable>>,
}

impl TaskHandle {
    pub(crate) fn new(
        id: TaskId,
        run_token: Arc<Semaphore>,
        table: Arc<Mutex<TaskTable>>,
        exclusive: bool,
    ) -> Self {
        Self {
            id,
            run_token,
            permit: Mutex::new(None),
            exclusive_depth: AtomicUsize::new(usize::from(exclusive)),
            table,
        }
    }

    pub(crate) fn id(&self) -> TaskId {
        self.id
    }

    pub(crate) fn is_exclusive(&self) -> bool {
        self.exclusive_depth.load(Ordering::Acquire) > 0
    }

    pub(crate) fn enter_exclusive(&self) {
        self.exclusive_depth.fetch_add(1, Ordering::AcqRel);
    }

    pub(crate) fn leave_exclusive(&self) {
        self.exclusive_depth.fetch_sub(1, Ordering::AcqRel);
    }

    fn set_status(&self, status: TaskStatus) {
        self.table.lock().set_status(self.id, status);
    }

    /// Waits for the run token (FIFO among waiting tasks).
    pub(crate) async fn acquire(&self) {
        if let Ok(permit) = self.run_token.clone().acquire_owned().await {
            *self.permit.lock() = Some(permit);
        }
        self.set_status(TaskStatus::Running);
    }

    pub(crate) fn release(&self) {
        self.permit.lock().take();
    }

    /// Parks the task on `fut`, letting other tasks of the actor run unless the
    /// task is exclusive.
    pub(crate) async fn suspend<F: Future>(&self, status: TaskStatus, fut: F) -> F::Output {
        self.set_status(status);
        if self.is_exclusive() {
            let output = fut.await;
            self.set_status(TaskStatus::Running);
            return output;
        }
        self.release();
        let output = fut.await;
        self.acquire().await;
        output
    }
}
