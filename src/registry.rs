//! # Registry
//!
//! Name → actor lookup, one per [`ActorSystem`](crate::ActorSystem).
//!
//! Names owned by a supervisor are marked *supervised*. When the actor holding
//! a supervised name dies, its slot turns into `Restarting` before the exit
//! event reaches the supervisor, so lookups in the gap fail with
//! [`ActorError::Restarting`] instead of returning a dead actor.

use crate::actor_ref::ActorRef;
use crate::error::ActorError;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use tracing::debug;

enum Slot {
    Live(ActorRef),
    Restarting,
}

#[derive(Default)]
struct Names {
    slots: HashMap<String, Slot>,
    supervised: HashSet<String>,
}

#[derive(Default)]
pub struct Registry {
    names: Mutex<Names>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `name` to `actor`, replacing any previous holder.
    pub fn register(&self, name: &str, actor: &ActorRef) -> Result<(), ActorError> {
        let mut names = self.names.lock();
        // Checked under the lock: an actor that exits afterwards vacates the slot.
        if actor.is_released() {
            return Err(ActorError::DeadActor);
        }
        let previous = names
            .slots
            .insert(name.to_string(), Slot::Live(actor.clone()));
        if let Some(Slot::Live(previous)) = previous {
            if &previous != actor {
                previous.set_name(None);
            }
        }
        actor.set_name(Some(name.to_string()));
        debug!(name, actor = %actor.id(), "Registered");
        Ok(())
    }

    pub fn unregister(&self, name: &str) -> Option<ActorRef> {
        let mut names = self.names.lock();
        match names.slots.remove(name) {
            Some(Slot::Live(actor)) => {
                actor.set_name(None);
                Some(actor)
            }
            _ => None,
        }
    }

    pub fn get(&self, name: &str) -> Result<ActorRef, ActorError> {
        match self.names.lock().slots.get(name) {
            Some(Slot::Live(actor)) => Ok(actor.clone()),
            Some(Slot::Restarting) => Err(ActorError::Restarting(name.to_string())),
            None => Err(ActorError::NotFound(name.to_string())),
        }
    }

    /// Names currently bound to a live actor.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .names
            .lock()
            .slots
            .iter()
            .filter(|(_, slot)| matches!(slot, Slot::Live(_)))
            .map(|(name, _)| name.clone())
            .collect();
        names.sort();
        names
    }

    pub(crate) fn supervise(&self, name: &str) {
        self.names.lock().supervised.insert(name.to_string());
    }

    /// Gives up supervision of `name`; a pending restart slot is dropped.
    pub(crate) fn release(&self, name: &str) {
        let mut names = self.names.lock();
        names.supervised.remove(name);
        if matches!(names.slots.get(name), Some(Slot::Restarting)) {
            names.slots.remove(name);
        }
    }

    /// Frees the name of an exiting actor.
    pub(crate) fn vacate(&self, actor: &ActorRef) {
        let Some(name) = actor.name() else {
            return;
        };
        let mut names = self.names.lock();
        let holds_name = matches!(names.slots.get(&name), Some(Slot::Live(holder)) if holder == actor);
        if !holds_name {
            return;
        }
        if names.supervised.contains(&name) {
            names.slots.insert(name, Slot::Restarting);
        } else {
            names.slots.remove(&name);
        }
    }
}
