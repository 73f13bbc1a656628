//! # Supervision
//!
//! A [`SupervisionGroup`] is an ordinary actor that owns [`ChildSpec`]s. It
//! links to every child it starts and traps their exits:
//!
//! - an **abnormal** exit restarts the child from the same spec (same
//!   constructor, same arguments) and re-registers its name,
//! - a **normal** exit removes the child for good,
//! - more than [`RestartPolicy::max_restarts`] restarts within
//!   [`RestartPolicy::within`] crash the supervisor itself.
//!
//! While a named child is being replaced, [`ActorSystem::whereis`] fails with
//! [`ActorError::Restarting`] instead of returning the dead instance.
//!
//! ```rust,no_run
//! use actor_runtime::{args, ActorError, ActorSystem, Arity, Args, Behavior,
//!     BehaviorDescriptor, Construct, SystemConfig, Value};
//!
//! struct Cache {
//!     capacity: usize,
//! }
//!
//! impl Behavior for Cache {
//!     fn describe(&self) -> BehaviorDescriptor<Self> {
//!         BehaviorDescriptor::new().method("capacity", Arity::Exact(0), |cache: &mut Cache, _| {
//!             Ok(Value::new(cache.capacity))
//!         })
//!     }
//! }
//!
//! impl Construct for Cache {
//!     fn construct(args: &Args) -> Result<Self, ActorError> {
//!         Ok(Cache { capacity: args.get(0)? })
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), ActorError> {
//!     let system = ActorSystem::boot(SystemConfig::default());
//!     system.supervise_as::<Cache>("cache", args![64usize]).await?;
//!     let cache = system.whereis("cache")?;
//!     assert_eq!(cache.call("capacity", args![]).await?.get::<usize>()?, 64);
//!     system.shutdown().await;
//!     Ok(())
//! }
//! ```

use crate::actor_ref::{Actor, ActorRef};
use crate::behavior::{Arity, Behavior, BehaviorDescriptor};
use crate::config::ActorOptions;
use crate::context::Ctx;
use crate::error::ActorError;
use crate::registry::Registry;
use crate::system::ActorSystem;
use crate::value::{Args, Value};
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// A behavior that can be rebuilt from its constructor arguments.
pub trait Construct: Behavior {
    fn construct(args: &Args) -> Result<Self, ActorError>;
}

type StartFn =
    dyn Fn(&Ctx<SupervisionGroup>, &Args, ActorOptions) -> Result<ActorRef, ActorError> + Send + Sync;

/// How to (re)start one supervised actor.
#[derive(Clone)]
pub struct ChildSpec {
    name: Option<String>,
    args: Args,
    options: Option<ActorOptions>,
    start: Arc<StartFn>,
}

impl ChildSpec {
    /// Spec building a `B` from `args` on every start.
    pub fn of<B: Construct>(args: Args) -> Self {
        Self::from_fn(args, |ctx, args, options| {
            let behavior = B::construct(args)?;
            Ok(ctx.spawn_link_with(behavior, options)?.into_ref())
        })
    }

    /// Spec with a custom start function. The function must link the new
    /// actor to the supervisor, which [`Ctx::spawn_link_with`] does.
    pub fn from_fn<F>(args: Args, start: F) -> Self
    where
        F: Fn(&Ctx<SupervisionGroup>, &Args, ActorOptions) -> Result<ActorRef, ActorError>
            + Send
            + Sync
            + 'static,
    {
        Self {
            name: None,
            args,
            options: None,
            start: Arc::new(start),
        }
    }

    /// Registers every instance under `name`.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn options(mut self, options: ActorOptions) -> Self {
        self.options = Some(options);
        self
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    fn start(&self, ctx: &Ctx<SupervisionGroup>) -> Result<ActorRef, ActorError> {
        let options = self
            .options
            .clone()
            .unwrap_or_else(|| ActorOptions::from_config(ctx.system().config()));
        let actor = (self.start)(ctx, &self.args, options)?;
        if let Some(name) = &self.name {
            let registry = ctx.system().registry();
            registry.supervise(name);
            if let Err(e) = registry.register(name, &actor) {
                // Already dead again: the slot stays restarting until its exit
                // event is handled.
                debug!(name, actor = %actor.id(), error = %e, "Child died before registration");
            }
        }
        Ok(actor)
    }
}

impl fmt::Debug for ChildSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChildSpec")
            .field("name", &self.name)
            .field("args", &self.args)
            .finish()
    }
}

/// Restart intensity limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RestartPolicy {
    pub max_restarts: usize,
    pub within: Duration,
}

impl Default for RestartPolicy {
    fn default() -> Self {
        Self {
            max_restarts: 3,
            within: Duration::from_secs(5),
        }
    }
}

struct Member {
    spec: ChildSpec,
    actor: ActorRef,
}

/// Behavior of a supervisor actor.
pub struct SupervisionGroup {
    members: Vec<Member>,
    policy: RestartPolicy,
    restarts: VecDeque<Instant>,
    registry: Arc<Registry>,
}

impl SupervisionGroup {
    pub(crate) fn new(policy: RestartPolicy, registry: Arc<Registry>) -> Self {
        Self {
            members: Vec::new(),
            policy,
            restarts: VecDeque::new(),
            registry,
        }
    }

    fn take_member(&mut self, actor: &ActorRef) -> Option<Member> {
        let index = self.members.iter().position(|m| &m.actor == actor)?;
        Some(self.members.remove(index))
    }

    /// Records a restart; `false` when the policy's intensity is exceeded.
    fn record_restart(&mut self, now: Instant) -> bool {
        while let Some(oldest) = self.restarts.front() {
            if now.duration_since(*oldest) > self.policy.within {
                self.restarts.pop_front();
            } else {
                break;
            }
        }
        self.restarts.push_back(now);
        self.restarts.len() <= self.policy.max_restarts
    }

    fn release_name(&self, spec: &ChildSpec) {
        if let Some(name) = spec.name() {
            self.registry.release(name);
        }
    }

    async fn supervise(ctx: Ctx<Self>, args: Args) -> Result<Value, ActorError> {
        let spec: ChildSpec = args.get(0)?;
        let actor = spec.start(&ctx)?;
        info!(supervisor = %ctx.current().id(), actor = %actor.id(), name = ?spec.name(), "Supervising actor");
        ctx.state(|group| {
            group.members.push(Member {
                spec,
                actor: actor.clone(),
            })
        });
        Ok(Value::new(actor))
    }

    async fn restart_actor(ctx: Ctx<Self>, args: Args) -> Result<Value, ActorError> {
        let actor: ActorRef = args.get(0)?;
        let reason: Option<ActorError> = args.get(1)?;
        let Some(member) = ctx.state(|group| group.take_member(&actor)) else {
            debug!(supervisor = %ctx.current().id(), actor = %actor.id(), "Exit of unsupervised actor");
            return Ok(Value::unit());
        };

        let Some(reason) = reason else {
            debug!(actor = %actor.id(), name = ?member.spec.name(), "Supervised actor exited normally");
            ctx.state(|group| group.release_name(&member.spec));
            return Ok(Value::unit());
        };
        if ctx.system().is_shut_down() {
            ctx.state(|group| group.release_name(&member.spec));
            return Ok(Value::unit());
        }

        let within_limits = ctx.state(|group| group.record_restart(Instant::now()));
        if !within_limits {
            let policy = ctx.state(|group| {
                group.release_name(&member.spec);
                group.policy
            });
            error!(
                supervisor = %ctx.current().id(),
                max_restarts = policy.max_restarts,
                within = ?policy.within,
                "Restart intensity exceeded"
            );
            return Err(ActorError::failure(format!(
                "more than {} restarts within {:?}",
                policy.max_restarts, policy.within
            )));
        }

        warn!(actor = %actor.id(), name = ?member.spec.name(), error = %reason, "Restarting crashed actor");
        let replacement = member.spec.start(&ctx)?;
        debug!(actor = %replacement.id(), name = ?member.spec.name(), "Restarted");
        ctx.state(|group| {
            group.members.push(Member {
                spec: member.spec,
                actor: replacement,
            })
        });
        Ok(Value::unit())
    }

    fn terminate_members(&mut self) {
        for member in self.members.drain(..).rev() {
            let _ = member.actor.request_termination();
            if let Some(name) = member.spec.name() {
                self.registry.release(name);
            }
        }
    }
}

impl Behavior for SupervisionGroup {
    fn describe(&self) -> BehaviorDescriptor<Self> {
        BehaviorDescriptor::new()
            .task("supervise", Arity::Exact(1), Self::supervise)
            .task("restart_actor", Arity::Exact(2), Self::restart_actor)
            .method("members", Arity::Exact(0), |group: &mut Self, _| {
                let members: Vec<ActorRef> = group.members.iter().map(|m| m.actor.clone()).collect();
                Ok(Value::new(members))
            })
            .exit_handler("restart_actor")
            .finalizer(Self::terminate_members)
    }
}

/// Typed handle on a supervisor actor.
#[derive(Clone, Debug)]
pub struct Supervisor {
    group: Actor<SupervisionGroup>,
}

impl Supervisor {
    pub fn start(system: &ActorSystem, policy: RestartPolicy) -> Result<Self, ActorError> {
        let group = SupervisionGroup::new(policy, system.registry().clone());
        Ok(Self {
            group: system.spawn(group)?,
        })
    }

    pub async fn supervise(&self, spec: ChildSpec) -> Result<ActorRef, ActorError> {
        self.group
            .call("supervise", crate::args![spec])
            .await?
            .get::<ActorRef>()
    }

    pub async fn members(&self) -> Result<Vec<ActorRef>, ActorError> {
        self.group
            .call("members", Args::new())
            .await?
            .get::<Vec<ActorRef>>()
    }

    pub fn actor(&self) -> &ActorRef {
        self.group.actor_ref()
    }

    /// Stops the supervisor and, through its finalizer, every child.
    pub async fn terminate(&self, timeout: Duration) -> Result<(), ActorError> {
        self.group.terminate(timeout).await.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_restart_intensity_window() {
        let policy = RestartPolicy {
            max_restarts: 2,
            within: Duration::from_secs(1),
        };
        let mut group = SupervisionGroup::new(policy, Arc::new(Registry::new()));
        let start = Instant::now();
        assert!(group.record_restart(start));
        assert!(group.record_restart(start + Duration::from_millis(100)));
        assert!(!group.record_restart(start + Duration::from_millis(200)));
        // Old restarts fall out of the window.
        assert!(group.record_restart(start + Duration::from_secs(3)));
    }
}
