//! # Actor Runtime
//!
//! > **Concurrent objects with their own thread, mailbox and cooperative tasks.**
//!
//! Each actor owns its state and a dedicated OS thread. Callers talk to it only
//! through its [`ActorRef`]: synchronous [`call`](ActorRef::call)s,
//! fire-and-forget [`cast`](ActorRef::cast)s and [`future`](ActorRef::future)s.
//! Inside the actor, every call is served by a task. A task that waits on
//! another actor suspends, and the actor keeps serving other calls, including
//! calls that come back to it from the actor it is waiting on. Call cycles
//! therefore do not deadlock.
//!
//! ## 🏗️ Design Philosophy
//!
//! ### One thread, one run token
//!
//! An actor may hold several live tasks but only one of them runs at a time.
//! Tasks hand over the actor at suspension points: calls, sleeps, futures,
//! signals, selective receive. A task can opt out with [`Ctx::exclusive`] and
//! keep the actor to itself while it waits.
//!
//! ### Abort vs crash
//!
//! An error returned by a method crashes the actor and propagates through
//! links. An [abort](ActorError::Abort) (unknown method, wrong arity, bad
//! argument, [`Ctx::abort`]) fails only the call: the caller receives the
//! error and the actor keeps running.
//!
//! ### Supervision
//!
//! Actors can be [linked](links::link) (abnormal exits propagate) or
//! [monitored](links::monitor) (exits are only reported). A [`Supervisor`]
//! links to its children, traps their exits and restarts crashed ones from
//! the same [`ChildSpec`], keeping registered names stable.
//!
//! ## 🗺️ Module Tour
//!
//! ### 1. The Engine (`actor`, [`task`], [`mailbox`])
//! - **Role**: The per-actor dispatch loop, task bookkeeping and the two-level
//!   (system before ordinary) mailbox.
//!
//! ### 2. The Surface ([`actor_ref`], [`context`], [`behavior`])
//! - **Role**: How callers reach an actor, how handlers reach their actor,
//!   and how a type declares its methods.
//! - **Key items**: [`ActorRef`], [`Ctx`], [`Behavior`], [`BehaviorDescriptor`].
//!
//! ### 3. The Orchestrator ([`system`], [`supervisor`], [`registry`], [`links`])
//! - **Role**: Spawning, naming, failure propagation, restarts and shutdown.
//! - **Key items**: [`ActorSystem`], [`Supervisor`], [`Registry`].
//!
//! ### 4. Tooling ([`client`], [`mock`], [`config`], [`observability`])
//! - **Role**: Typed clients, scripted test actors, configuration and logging.
//!
//! ## 🚀 Quick Start
//!
//! ```rust
//! use actor_runtime::{args, ActorError, ActorSystem, Arity, Behavior,
//!     BehaviorDescriptor, SystemConfig, Value};
//!
//! struct Counter {
//!     count: i64,
//! }
//!
//! impl Behavior for Counter {
//!     fn describe(&self) -> BehaviorDescriptor<Self> {
//!         BehaviorDescriptor::new()
//!             .method("increment", Arity::Exact(1), |counter: &mut Counter, args| {
//!                 counter.count += args.get::<i64>(0)?;
//!                 Ok(Value::new(counter.count))
//!             })
//!             .method("value", Arity::Exact(0), |counter: &mut Counter, _| {
//!                 Ok(Value::new(counter.count))
//!             })
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), ActorError> {
//!     let system = ActorSystem::boot(SystemConfig::default());
//!     let counter = system.spawn(Counter { count: 0 })?;
//!
//!     counter.call("increment", args![5i64]).await?;
//!     let value = counter.call("value", args![]).await?.get::<i64>()?;
//!     assert_eq!(value, 5);
//!
//!     // Unknown methods abort the call; the actor survives.
//!     assert!(counter.call("reset", args![]).await.unwrap_err().is_abort());
//!     assert!(counter.is_alive());
//!
//!     system.shutdown().await;
//!     Ok(())
//! }
//! ```
//!
//! ### Running the Demo
//!
//! ```bash
//! RUST_LOG=info cargo run -p actor-sample
//! ```

mod actor;
pub mod actor_ref;
pub mod behavior;
pub mod block;
pub mod client;
pub mod condition;
pub mod config;
pub mod context;
pub mod error;
pub mod future;
pub mod links;
pub mod mailbox;
pub mod message;
pub mod mock;
pub mod observability;
pub mod registry;
pub mod supervisor;
pub mod system;
pub mod task;
pub mod value;

pub use actor_ref::{Actor, ActorId, ActorRef, ActorState, ExitReason};
pub use behavior::{Arity, Behavior, BehaviorDescriptor};
pub use block::{Block, BlockExecution, BlockRef};
pub use client::ActorClient;
pub use condition::{Condition, ConditionId};
pub use config::{ActorOptions, SystemConfig, TaskBackend};
pub use context::Ctx;
pub use error::{AbortReason, ActorError, Failure};
pub use future::CallFuture;
pub use links::{is_linked, is_monitoring, link, links_of, monitor, unlink, unmonitor};
pub use mailbox::Mailbox;
pub use message::{CallId, ChainId, ExitEvent, Message, NamedExitEvent, SystemEvent};
pub use mock::MockActor;
pub use observability::setup_tracing;
pub use registry::Registry;
pub use supervisor::{ChildSpec, Construct, RestartPolicy, SupervisionGroup, Supervisor};
pub use system::{ActorSystem, ShutdownReport};
pub use task::{TaskId, TaskInfo, TaskStatus};
pub use value::{Args, Value};
