//! # Behaviors
//!
//! A [`Behavior`] is the plain value wrapped by an actor. The runtime never
//! calls its Rust methods directly: at spawn it asks for a
//! [`BehaviorDescriptor`], an explicit method table plus the policies attached
//! to it, and resolves every incoming call against that table.
//!
//! ## Two Kinds of Handlers
//!
//! | Registration | Signature | Use when |
//! |--------------|-----------|----------|
//! | [`BehaviorDescriptor::method`] | `Fn(&mut B, Args) -> Result<Value, ActorError>` | The method only touches its own state |
//! | [`BehaviorDescriptor::task`] | `Fn(Ctx<B>, Args) -> impl Future` | The method calls other actors, sleeps, waits on signals |
//!
//! Sync handlers run to completion while holding the state. Task handlers get a
//! [`Ctx`] and reach their state through [`Ctx::state`], which makes it
//! impossible to hold the state across a suspension point.
//!
//! ```rust
//! use actor_runtime::{Arity, Behavior, BehaviorDescriptor, Value};
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
//!             .method("count", Arity::Exact(0), |counter: &mut Counter, _| {
//!                 Ok(Value::new(counter.count))
//!             })
//!     }
//! }
//!
//! let descriptor = Counter { count: 0 }.describe();
//! assert!(descriptor.responds_to("increment"));
//! assert!(descriptor.validate().is_ok());
//! ```

use crate::context::Ctx;
use crate::error::{AbortReason, ActorError};
use crate::value::{Args, Value};
use futures::future::BoxFuture;
use futures::FutureExt;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::future::Future;
use std::sync::Arc;

/// A value that can be turned into an actor.
pub trait Behavior: Send + Sized + 'static {
    /// Builds the method table used to dispatch calls to this value.
    ///
    /// Called once, when the actor is spawned.
    fn describe(&self) -> BehaviorDescriptor<Self>;
}

/// Number of positional arguments a method accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Exact(usize),
    AtLeast(usize),
}

impl Arity {
    pub fn accepts(&self, given: usize) -> bool {
        match *self {
            Arity::Exact(n) => given == n,
            Arity::AtLeast(n) => given >= n,
        }
    }
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arity::Exact(n) => write!(f, "{n}"),
            Arity::AtLeast(n) => write!(f, "{n}+"),
        }
    }
}

type SyncFn<B> = dyn Fn(&mut B, Args) -> Result<Value, ActorError> + Send + Sync;
type TaskFn<B> = dyn Fn(Ctx<B>, Args) -> BoxFuture<'static, Result<Value, ActorError>> + Send + Sync;
type FinalizerFn<B> = dyn Fn(&mut B) + Send + Sync;

pub(crate) enum Handler<B: Behavior> {
    Sync(Arc<SyncFn<B>>),
    Task(Arc<TaskFn<B>>),
}

impl<B: Behavior> Clone for Handler<B> {
    fn clone(&self) -> Self {
        match self {
            Handler::Sync(f) => Handler::Sync(f.clone()),
            Handler::Task(f) => Handler::Task(f.clone()),
        }
    }
}

impl<B: Behavior> Handler<B> {
    /// Runs the handler on behalf of the task owning `ctx`.
    pub(crate) fn invoke(&self, ctx: Ctx<B>, args: Args) -> BoxFuture<'static, Result<Value, ActorError>> {
        match self {
            Handler::Sync(f) => {
                let f = f.clone();
                async move { ctx.state(|behavior| f(behavior, args)) }.boxed()
            }
            Handler::Task(f) => f(ctx, args),
        }
    }
}

/// One entry of the method table.
pub(crate) struct Method<B: Behavior> {
    pub(crate) name: String,
    pub(crate) arity: Arity,
    pub(crate) handler: Handler<B>,
}

impl<B: Behavior> Clone for Method<B> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            arity: self.arity,
            handler: self.handler.clone(),
        }
    }
}

/// Method table and dispatch policies of a [`Behavior`].
pub struct BehaviorDescriptor<B: Behavior> {
    methods: HashMap<String, Method<B>>,
    exclusive_methods: HashSet<String>,
    receiver_block_executions: HashSet<String>,
    finalizer: Option<Arc<FinalizerFn<B>>>,
    exit_handler: Option<String>,
}

impl<B: Behavior> Default for BehaviorDescriptor<B> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: Behavior> BehaviorDescriptor<B> {
    pub fn new() -> Self {
        Self {
            methods: HashMap::new(),
            exclusive_methods: HashSet::new(),
            receiver_block_executions: HashSet::new(),
            finalizer: None,
            exit_handler: None,
        }
    }

    /// Registers a handler that runs to completion with exclusive access to
    /// the state.
    pub fn method<F>(mut self, name: impl Into<String>, arity: Arity, handler: F) -> Self
    where
        F: Fn(&mut B, Args) -> Result<Value, ActorError> + Send + Sync + 'static,
    {
        let name = name.into();
        self.methods.insert(
            name.clone(),
            Method {
                name,
                arity,
                handler: Handler::Sync(Arc::new(handler)),
            },
        );
        self
    }

    /// Registers an asynchronous handler. Its task may suspend (calling other
    /// actors, sleeping, waiting), letting the actor serve other calls
    /// meanwhile.
    pub fn task<F, Fut>(mut self, name: impl Into<String>, arity: Arity, handler: F) -> Self
    where
        F: Fn(Ctx<B>, Args) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, ActorError>> + Send + 'static,
    {
        let name = name.into();
        let boxed: Arc<TaskFn<B>> =
            Arc::new(move |ctx: Ctx<B>, args: Args| handler(ctx, args).boxed());
        self.methods.insert(
            name.clone(),
            Method {
                name,
                arity,
                handler: Handler::Task(boxed),
            },
        );
        self
    }

    /// Tasks dispatched for `name` keep the actor to themselves until they
    /// finish, even across suspension points.
    pub fn exclusive(mut self, name: impl Into<String>) -> Self {
        self.exclusive_methods.insert(name.into());
        self
    }

    /// Blocks passed to `name` run inline on this actor instead of being sent
    /// back to the caller.
    pub fn execute_block_on_receiver(mut self, name: impl Into<String>) -> Self {
        self.receiver_block_executions.insert(name.into());
        self
    }

    /// Runs when the actor terminates or crashes; skipped on a hard kill.
    pub fn finalizer<F>(mut self, finalizer: F) -> Self
    where
        F: Fn(&mut B) + Send + Sync + 'static,
    {
        self.finalizer = Some(Arc::new(finalizer));
        self
    }

    /// Routes exit notifications of linked and monitored actors to the method
    /// `name`, called with `(ActorRef, Option<ActorError>)`.
    pub fn exit_handler(mut self, name: impl Into<String>) -> Self {
        self.exit_handler = Some(name.into());
        self
    }

    /// Checks that the policies only name methods that exist.
    pub fn validate(&self) -> Result<(), ActorError> {
        if let Some(name) = &self.exit_handler {
            match self.methods.get(name) {
                None => {
                    return Err(ActorError::InvalidBehavior(format!(
                        "exit handler `{name}` is not a method"
                    )))
                }
                Some(method) if !method.arity.accepts(2) => {
                    return Err(ActorError::InvalidBehavior(format!(
                        "exit handler `{name}` must accept 2 arguments, accepts {}",
                        method.arity
                    )))
                }
                Some(_) => {}
            }
        }
        if let Some(name) = self
            .exclusive_methods
            .iter()
            .find(|name| !self.methods.contains_key(*name))
        {
            return Err(ActorError::InvalidBehavior(format!(
                "exclusive method `{name}` is not a method"
            )));
        }
        Ok(())
    }

    pub fn responds_to(&self, method: &str) -> bool {
        self.methods.contains_key(method)
    }

    pub fn method_names(&self) -> Vec<&str> {
        self.methods.keys().map(String::as_str).collect()
    }

    pub fn is_exclusive(&self, method: &str) -> bool {
        self.exclusive_methods.contains(method)
    }

    pub fn executes_block_on_receiver(&self, method: &str) -> bool {
        self.receiver_block_executions.contains(method)
    }

    pub fn exit_handler_name(&self) -> Option<&str> {
        self.exit_handler.as_deref()
    }

    pub(crate) fn finalizer_fn(&self) -> Option<Arc<FinalizerFn<B>>> {
        self.finalizer.clone()
    }

    /// Looks a call up in the table. Unknown methods and wrong arity are
    /// caller mistakes.
    pub(crate) fn resolve(&self, method: &str, given: usize) -> Result<&Method<B>, AbortReason> {
        let entry = self
            .methods
            .get(method)
            .ok_or_else(|| AbortReason::UnknownMethod {
                method: method.to_string(),
            })?;
        if !entry.arity.accepts(given) {
            return Err(AbortReason::Arity {
                method: method.to_string(),
                given,
                expected: entry.arity,
            });
        }
        Ok(entry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Echo;

    impl Behavior for Echo {
        fn describe(&self) -> BehaviorDescriptor<Self> {
            BehaviorDescriptor::new()
                .method("echo", Arity::Exact(1), |_, args| {
                    Ok(args.value(0).cloned().unwrap_or_else(Value::unit))
                })
                .method("sum", Arity::AtLeast(1), |_, args| {
                    let mut total = 0i64;
                    for i in 0..args.len() {
                        total += args.get::<i64>(i)?;
                    }
                    Ok(Value::new(total))
                })
        }
    }

    #[test]
    fn test_resolve_reports_unknown_method_and_arity() {
        let descriptor = Echo.describe();
        assert!(descriptor.resolve("echo", 1).is_ok());
        assert!(matches!(
            descriptor.resolve("missing", 0),
            Err(AbortReason::UnknownMethod { .. })
        ));
        assert!(matches!(
            descriptor.resolve("echo", 3),
            Err(AbortReason::Arity { given: 3, expected: Arity::Exact(1), .. })
        ));
        assert!(descriptor.resolve("sum", 4).is_ok());
        assert!(descriptor.resolve("sum", 0).is_err());
    }

    #[test]
    fn test_validate_rejects_unknown_policies() {
        let descriptor = Echo.describe().exit_handler("on_exit");
        assert!(matches!(
            descriptor.validate(),
            Err(ActorError::InvalidBehavior(_))
        ));

        let descriptor = Echo.describe().exit_handler("echo");
        assert!(descriptor.validate().is_err());

        let descriptor = Echo.describe().exclusive("nope");
        assert!(descriptor.validate().is_err());

        let descriptor = Echo.describe().exclusive("echo").exit_handler("sum");
        assert!(descriptor.validate().is_ok());
    }

    #[test]
    fn test_arity_display() {
        assert_eq!(Arity::Exact(2).to_string(), "2");
        assert_eq!(Arity::AtLeast(1).to_string(), "1+");
    }
}
