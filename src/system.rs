//! # Actor System
//!
//! [`ActorSystem`] is the explicit runtime object: it spawns actors, owns the
//! name registry and the table of live actors, and coordinates shutdown.
//! Nothing is global; independent systems can coexist in one process (tests
//! boot one each).
//!
//! ## Shutdown
//!
//! [`ActorSystem::shutdown`] asks every live actor to terminate, waits for them
//! within [`SystemConfig::shutdown_timeout`], and hard-kills whatever is still
//! running afterwards. It is idempotent and cheap when no actor is alive.

use crate::actor::{self, ActorShared};
use crate::actor_ref::{Actor, ActorId, ActorRef, ExitReason};
use crate::behavior::Behavior;
use crate::config::{ActorOptions, SystemConfig};
use crate::error::ActorError;
use crate::links;
use crate::registry::Registry;
use crate::supervisor::{ChildSpec, Construct, RestartPolicy, SupervisionGroup};
use crate::value::Args;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{error, info, warn};

pub(crate) struct SystemInner {
    config: SystemConfig,
    pub(crate) registry: Arc<Registry>,
    actors: Mutex<HashMap<ActorId, ActorRef>>,
    root_supervisor: Mutex<Option<ActorRef>>,
    shut_down: AtomicBool,
}

impl SystemInner {
    pub(crate) fn forget(&self, id: ActorId) {
        self.actors.lock().remove(&id);
    }
}

/// Result of [`ActorSystem::shutdown`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ShutdownReport {
    /// Actors that stopped within the timeout.
    pub terminated: usize,
    /// Stragglers that had to be killed.
    pub killed: usize,
}

#[derive(Clone)]
pub struct ActorSystem {
    inner: Arc<SystemInner>,
}

impl ActorSystem {
    pub fn boot(config: SystemConfig) -> Self {
        info!(
            shutdown_timeout = ?config.shutdown_timeout,
            task_backend = %config.default_task_backend,
            "Actor system booted"
        );
        Self {
            inner: Arc::new(SystemInner {
                config,
                registry: Arc::new(Registry::new()),
                actors: Mutex::new(HashMap::new()),
                root_supervisor: Mutex::new(None),
                shut_down: AtomicBool::new(false),
            }),
        }
    }

    pub fn config(&self) -> &SystemConfig {
        &self.inner.config
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.inner.registry
    }

    pub fn is_shut_down(&self) -> bool {
        self.inner.shut_down.load(Ordering::Acquire)
    }

    /// Spawns `behavior` as a new actor with the system's default options.
    pub fn spawn<B: Behavior>(&self, behavior: B) -> Result<Actor<B>, ActorError> {
        self.start(behavior, ActorOptions::from_config(&self.inner.config), None)
    }

    pub fn spawn_with<B: Behavior>(
        &self,
        behavior: B,
        options: ActorOptions,
    ) -> Result<Actor<B>, ActorError> {
        self.start(behavior, options, None)
    }

    /// Spawns an actor, optionally linked to `link` before it starts running.
    pub(crate) fn start<B: Behavior>(
        &self,
        behavior: B,
        options: ActorOptions,
        link: Option<&ActorRef>,
    ) -> Result<Actor<B>, ActorError> {
        if self.is_shut_down() {
            return Err(ActorError::Spawn("actor system is shut down".to_string()));
        }
        let descriptor = behavior.describe();
        descriptor.validate()?;

        let type_name = std::any::type_name::<B>()
            .split("::")
            .last()
            .unwrap_or("Unknown");
        let mailbox = crate::mailbox::Mailbox::with_capacity(options.mailbox_capacity);
        let actor = ActorRef::new(
            type_name,
            mailbox,
            options.call_timeout,
            Arc::downgrade(&self.inner),
        );
        if let Some(peer) = link {
            links::link(peer, &actor)?;
        }

        let behavior = Arc::new(Mutex::new(behavior));
        let shared = Arc::new(ActorShared::new(
            actor.clone(),
            self.clone(),
            behavior.clone(),
            descriptor,
            options,
        ));
        self.inner.actors.lock().insert(actor.id(), actor.clone());

        if let Err(e) = actor::run_thread(shared) {
            error!(actor = %actor.id(), error = %e, "Failed to spawn actor thread");
            self.inner.forget(actor.id());
            links::detach_all(&actor);
            actor.mailbox().shutdown();
            let error = ActorError::Spawn(e.to_string());
            actor.finish(ExitReason::Crashed(error.clone()));
            return Err(error);
        }
        Ok(Actor::new(actor, behavior))
    }

    /// Looks an actor up by registered name.
    pub fn whereis(&self, name: &str) -> Result<ActorRef, ActorError> {
        self.inner.registry.get(name)
    }

    pub fn register(&self, name: &str, actor: &ActorRef) -> Result<(), ActorError> {
        self.inner.registry.register(name, actor)
    }

    pub fn unregister(&self, name: &str) -> Option<ActorRef> {
        self.inner.registry.unregister(name)
    }

    pub fn registered(&self) -> Vec<String> {
        self.inner.registry.names()
    }

    /// Live actors, oldest first.
    pub fn actors(&self) -> Vec<ActorRef> {
        let mut actors: Vec<ActorRef> = self.inner.actors.lock().values().cloned().collect();
        actors.sort_by_key(|actor| actor.id());
        actors
    }

    pub(crate) fn forget(&self, id: ActorId) {
        self.inner.forget(id);
    }

    /// Starts `spec` under the system's root supervisor, created on first use.
    pub async fn supervise(&self, spec: ChildSpec) -> Result<ActorRef, ActorError> {
        let supervisor = self.root_supervisor()?;
        supervisor
            .call("supervise", crate::args![spec])
            .await?
            .get::<ActorRef>()
    }

    /// Supervises a `B` built from `args` and registered as `name`; crashed
    /// instances are rebuilt from the same arguments.
    pub async fn supervise_as<B: Construct>(
        &self,
        name: &str,
        args: Args,
    ) -> Result<ActorRef, ActorError> {
        self.supervise(ChildSpec::of::<B>(args).named(name)).await
    }

    fn root_supervisor(&self) -> Result<ActorRef, ActorError> {
        let mut root = self.inner.root_supervisor.lock();
        if let Some(supervisor) = root.as_ref().filter(|s| s.is_alive()) {
            return Ok(supervisor.clone());
        }
        let group = SupervisionGroup::new(RestartPolicy::default(), self.inner.registry.clone());
        let supervisor = self.spawn(group)?.into_ref();
        *root = Some(supervisor.clone());
        Ok(supervisor)
    }

    /// Terminates every live actor, killing those that outlast the configured
    /// timeout.
    pub async fn shutdown(&self) -> ShutdownReport {
        if self.inner.shut_down.swap(true, Ordering::AcqRel) {
            return ShutdownReport::default();
        }
        let actors = self.actors();
        if actors.is_empty() {
            info!("Shutdown complete, no actors running");
            return ShutdownReport::default();
        }

        let timeout = self.inner.config.shutdown_timeout;
        info!(count = actors.len(), ?timeout, "Terminating actors");
        for actor in actors.iter().rev() {
            let _ = actor.request_termination();
        }

        let deadline = Instant::now() + timeout;
        let mut report = ShutdownReport::default();
        let mut stragglers = Vec::new();
        for actor in &actors {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match actor.join(remaining).await {
                Ok(_) => report.terminated += 1,
                Err(_) => stragglers.push(actor.clone()),
            }
        }

        if !stragglers.is_empty() {
            error!(count = stragglers.len(), "Couldn't cleanly terminate all actors");
            for actor in &stragglers {
                warn!(actor = %actor.id(), behavior = actor.type_name(), "Killing straggler");
                actor.kill();
            }
            report.killed = stragglers.len();
        }
        *self.inner.root_supervisor.lock() = None;
        info!(terminated = report.terminated, killed = report.killed, "Shutdown complete");
        report
    }
}

impl std::fmt::Debug for ActorSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActorSystem")
            .field("actors", &self.inner.actors.lock().len())
            .field("shut_down", &self.is_shut_down())
            .finish()
    }
}
