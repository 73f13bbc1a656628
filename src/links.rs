//! # Links and Monitors
//!
//! A link is bidirectional: when either side exits, the other receives an exit
//! event and, unless it handles exits itself, crashes too if the exit was
//! abnormal. A monitor is one-way and never crashes the watcher.
//!
//! Relation sets live in each actor's cell. Operations touching two actors lock
//! both cells in [`ActorId`] order so concurrent link/exit traffic cannot
//! deadlock.

use crate::actor_ref::{ActorId, ActorRef, ExitReason};
use crate::error::ActorError;
use crate::message::{ExitEvent, Message, NamedExitEvent, SystemEvent};
use parking_lot::MutexGuard;
use std::collections::HashMap;
use tracing::debug;

#[derive(Default)]
pub(crate) struct Relations {
    links: HashMap<ActorId, ActorRef>,
    /// Actors monitoring this one.
    watchers: HashMap<ActorId, ActorRef>,
    /// Actors this one monitors.
    watching: HashMap<ActorId, ActorRef>,
    /// Set once the owner has exited; no new relations are accepted.
    closed: bool,
}

fn lock_pair<'a>(
    a: &'a ActorRef,
    b: &'a ActorRef,
) -> (MutexGuard<'a, Relations>, MutexGuard<'a, Relations>) {
    if a.id() < b.id() {
        let first = a.relations().lock();
        let second = b.relations().lock();
        (first, second)
    } else {
        let second = b.relations().lock();
        let first = a.relations().lock();
        (first, second)
    }
}

/// Links `a` and `b`. Linking an actor to itself is a no-op.
pub fn link(a: &ActorRef, b: &ActorRef) -> Result<(), ActorError> {
    if a == b {
        return Ok(());
    }
    let (mut ra, mut rb) = lock_pair(a, b);
    if ra.closed || rb.closed {
        return Err(ActorError::DeadActor);
    }
    ra.links.insert(b.id(), b.clone());
    rb.links.insert(a.id(), a.clone());
    debug!(actor = %a.id(), peer = %b.id(), "Linked");
    Ok(())
}

pub fn unlink(a: &ActorRef, b: &ActorRef) {
    if a == b {
        return;
    }
    let (mut ra, mut rb) = lock_pair(a, b);
    ra.links.remove(&b.id());
    rb.links.remove(&a.id());
}

/// `watcher` gets an exit event when `watched` stops.
pub fn monitor(watcher: &ActorRef, watched: &ActorRef) -> Result<(), ActorError> {
    if watcher == watched {
        return Ok(());
    }
    let (mut rw, mut rd) = lock_pair(watcher, watched);
    if rw.closed || rd.closed {
        return Err(ActorError::DeadActor);
    }
    rw.watching.insert(watched.id(), watched.clone());
    rd.watchers.insert(watcher.id(), watcher.clone());
    Ok(())
}

pub fn unmonitor(watcher: &ActorRef, watched: &ActorRef) {
    if watcher == watched {
        return;
    }
    let (mut rw, mut rd) = lock_pair(watcher, watched);
    rw.watching.remove(&watched.id());
    rd.watchers.remove(&watcher.id());
}

pub fn is_linked(a: &ActorRef, b: &ActorRef) -> bool {
    a.relations().lock().links.contains_key(&b.id())
}

pub fn is_monitoring(watcher: &ActorRef, watched: &ActorRef) -> bool {
    watcher.relations().lock().watching.contains_key(&watched.id())
}

/// Actors linked to `actor`.
pub fn links_of(actor: &ActorRef) -> Vec<ActorRef> {
    actor.relations().lock().links.values().cloned().collect()
}

/// Closes the relation sets of `actor` and returns the peers to notify, each
/// with its `linked` flag.
fn close(actor: &ActorRef) -> Vec<(ActorRef, bool)> {
    let (links, watchers, watching) = {
        let mut relations = actor.relations().lock();
        relations.closed = true;
        (
            std::mem::take(&mut relations.links),
            std::mem::take(&mut relations.watchers),
            std::mem::take(&mut relations.watching),
        )
    };
    for watched in watching.values() {
        watched.relations().lock().watchers.remove(&actor.id());
    }
    for peer in links.values() {
        peer.relations().lock().links.remove(&actor.id());
    }
    for watcher in watchers.values() {
        watcher.relations().lock().watching.remove(&actor.id());
    }

    let mut peers: Vec<(ActorRef, bool)> = links.into_values().map(|peer| (peer, true)).collect();
    for (id, watcher) in watchers {
        if !peers.iter().any(|(peer, _)| peer.id() == id) {
            peers.push((watcher, false));
        }
    }
    peers
}

/// Sends the exit event of `actor` to every link and monitor.
pub(crate) fn notify_exit(actor: &ActorRef, reason: &ExitReason) {
    let peers = close(actor);
    if peers.is_empty() {
        return;
    }
    let error = reason.error();
    let name = actor.name();
    for (peer, linked) in peers {
        let event = ExitEvent {
            actor: actor.clone(),
            reason: error.clone(),
            linked,
        };
        let event = match &name {
            Some(name) => SystemEvent::NamedExit(NamedExitEvent {
                name: name.clone(),
                event,
            }),
            None => SystemEvent::Exit(event),
        };
        if peer.mailbox().send(Message::System(event)).is_err() {
            debug!(actor = %actor.id(), peer = %peer.id(), "Exit event dropped, peer is dead");
        }
    }
}

/// Drops every relation of `actor` without notifying anyone.
pub(crate) fn detach_all(actor: &ActorRef) {
    close(actor);
}
