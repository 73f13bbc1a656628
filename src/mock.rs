//! # Mock Actors & Testing Guide
//!
//! [`MockActor`] is a scripted behavior: you list the calls it should receive
//! and what each one returns, spawn it like any other actor, hand its
//! [`ActorRef`] to the code under test, and finally [`verify`](MockActor::verify)
//! that every expectation was consumed.
//!
//! ## When to use Mocks vs Real Actors
//!
//! | Feature | MockActor | Real Actor |
//! |---------|-----------|------------|
//! | **State** | None (scripted replies) | Real state management |
//! | **Determinism** | Replies fixed up front | Depends on the behavior |
//! | **Use Case** | Testing an actor *against* its collaborators | Testing the actor itself |
//! | **Error Injection** | Easy (`return_err`) | Needs specific state |
//!
//! ## Example
//!
//! ```rust
//! use actor_runtime::mock::MockActor;
//! use actor_runtime::{args, ActorError, ActorSystem, SystemConfig, Value};
//!
//! #[tokio::main]
//! async fn main() {
//!     let system = ActorSystem::boot(SystemConfig::default());
//!
//!     // 1. Script the collaborator
//!     let mock = MockActor::new();
//!     mock.expect("price").return_ok(Value::new(25.0f64));
//!     mock.expect("reserve").return_err(ActorError::abort("out of stock"));
//!
//!     // 2. Spawn it and talk to it like a real actor
//!     let inventory = mock.spawn(&system).unwrap();
//!     let price = inventory.call("price", args!["sku-1".to_string()]).await.unwrap();
//!     assert_eq!(price.get::<f64>().unwrap(), 25.0);
//!     assert!(inventory.call("reserve", args![3u32]).await.is_err());
//!
//!     // 3. Everything scripted was used
//!     mock.verify();
//!     assert_eq!(mock.calls(), vec!["price".to_string(), "reserve".to_string()]);
//!     system.shutdown().await;
//! }
//! ```
//!
//! Expectations are consumed in order. A call that does not match the next
//! expectation is answered with an abort, so the mock stays alive and the
//! test sees the mismatch as an error.

use crate::actor_ref::ActorRef;
use crate::behavior::{Arity, Behavior, BehaviorDescriptor};
use crate::error::ActorError;
use crate::system::ActorSystem;
use crate::value::{Args, Value};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

struct Expectation {
    method: String,
    response: Result<Value, ActorError>,
}

#[derive(Default)]
struct Script {
    expectations: VecDeque<Expectation>,
    methods: Vec<String>,
    calls: Vec<(String, Args)>,
}

/// A scripted actor for tests.
#[derive(Clone, Default)]
pub struct MockActor {
    script: Arc<Mutex<Script>>,
}

impl MockActor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Expects a call to `method`.
    pub fn expect(&self, method: &str) -> ExpectationBuilder {
        ExpectationBuilder {
            method: method.to_string(),
            script: self.script.clone(),
        }
    }

    /// Spawns the mock. Only methods with an expectation at this point are
    /// understood; anything else is aborted as an unknown method.
    pub fn spawn(&self, system: &ActorSystem) -> Result<ActorRef, ActorError> {
        Ok(system.spawn(self.clone())?.into_ref())
    }

    /// Method names received so far, in order.
    pub fn calls(&self) -> Vec<String> {
        self.script
            .lock()
            .calls
            .iter()
            .map(|(method, _)| method.clone())
            .collect()
    }

    /// Arguments of the `index`-th call received.
    pub fn call_args(&self, index: usize) -> Option<Args> {
        self.script.lock().calls.get(index).map(|(_, args)| args.clone())
    }

    /// Panics unless every expectation was consumed.
    pub fn verify(&self) {
        let script = self.script.lock();
        if !script.expectations.is_empty() {
            panic!(
                "Not all expectations were met. {} remaining",
                script.expectations.len()
            );
        }
    }

    fn respond(&self, method: &str, args: Args) -> Result<Value, ActorError> {
        let mut script = self.script.lock();
        script.calls.push((method.to_string(), args));
        match script.expectations.pop_front() {
            Some(expectation) if expectation.method == method => expectation.response,
            Some(expectation) => {
                let expected = expectation.method.clone();
                script.expectations.push_front(expectation);
                Err(ActorError::abort(format!(
                    "unexpected call `{method}`, expected `{expected}`"
                )))
            }
            None => Err(ActorError::abort(format!("unexpected call `{method}`"))),
        }
    }
}

impl Behavior for MockActor {
    fn describe(&self) -> BehaviorDescriptor<Self> {
        let methods = self.script.lock().methods.clone();
        methods
            .into_iter()
            .fold(BehaviorDescriptor::new(), |descriptor, method| {
                let name = method.clone();
                descriptor.method(method, Arity::AtLeast(0), move |mock: &mut MockActor, args| {
                    mock.respond(&name, args)
                })
            })
    }
}

/// Builder for one expectation.
pub struct ExpectationBuilder {
    method: String,
    script: Arc<Mutex<Script>>,
}

impl ExpectationBuilder {
    /// The call succeeds with `value`.
    pub fn return_ok(self, value: Value) {
        self.push(Ok(value));
    }

    /// The call fails with `error`. Non-abort errors crash the mock, just
    /// like they would crash a real actor.
    pub fn return_err(self, error: ActorError) {
        self.push(Err(error));
    }

    fn push(self, response: Result<Value, ActorError>) {
        let mut script = self.script.lock();
        if !script.methods.contains(&self.method) {
            script.methods.push(self.method.clone());
        }
        script.expectations.push_back(Expectation {
            method: self.method,
            response,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SystemConfig;
    use crate::args;

    #[tokio::test]
    async fn test_mock_answers_in_order_and_records_calls() {
        let system = ActorSystem::boot(SystemConfig::default());
        let mock = MockActor::new();
        mock.expect("get").return_ok(Value::new(1u32));
        mock.expect("get").return_ok(Value::new(2u32));

        let actor = mock.spawn(&system).unwrap();
        let first = actor.call("get", args![]).await.unwrap();
        let second = actor.call("get", args!["again"]).await.unwrap();
        assert_eq!(first.get::<u32>().unwrap(), 1);
        assert_eq!(second.get::<u32>().unwrap(), 2);

        mock.verify();
        assert_eq!(mock.call_args(1).unwrap().get::<&str>(0).unwrap(), "again");
        system.shutdown().await;
    }

    #[tokio::test]
    async fn test_mismatched_call_is_aborted_and_mock_survives() {
        let system = ActorSystem::boot(SystemConfig::default());
        let mock = MockActor::new();
        mock.expect("open").return_ok(Value::unit());
        mock.expect("close").return_ok(Value::unit());

        let actor = mock.spawn(&system).unwrap();
        let err = actor.call("close", args![]).await.unwrap_err();
        assert!(err.is_abort());
        assert!(actor.is_alive());

        actor.call("open", args![]).await.unwrap();
        actor.call("close", args![]).await.unwrap();
        mock.verify();
        system.shutdown().await;
    }

    #[tokio::test]
    #[should_panic(expected = "Not all expectations were met")]
    async fn test_verify_panics_on_leftovers() {
        let mock = MockActor::new();
        mock.expect("never").return_ok(Value::unit());
        mock.verify();
    }
}
