//! # Message Payloads
//!
//! Calls between actors carry native Rust values, never serialized bytes. A
//! [`Value`] is a cheaply clonable, type-erased handle (`Arc<dyn Any>`), and
//! [`Args`] is the ordered argument list of one call plus its optional
//! callback block.
//!
//! Reading an argument with the wrong type is a *caller* mistake, so
//! [`Args::get`] reports it as a protocol abort: the callee answers with an
//! error and keeps running.

use crate::block::BlockRef;
use crate::error::{AbortReason, ActorError};
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// A type-erased, shareable payload.
#[derive(Clone)]
pub struct Value {
    inner: Arc<dyn Any + Send + Sync>,
    type_name: &'static str,
}

impl Value {
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self {
            inner: Arc::new(value),
            type_name: std::any::type_name::<T>(),
        }
    }

    /// The `()` value returned by methods with nothing to say.
    pub fn unit() -> Self {
        Self::new(())
    }

    pub fn is<T: Any>(&self) -> bool {
        self.inner.is::<T>()
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.inner.downcast_ref::<T>()
    }

    /// Clones the payload out as `T`.
    pub fn get<T: Any + Clone>(&self) -> Result<T, ActorError> {
        self.downcast_ref::<T>()
            .cloned()
            .ok_or(ActorError::UnexpectedType {
                expected: std::any::type_name::<T>(),
                found: self.type_name,
            })
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Value<{}>", self.type_name)
    }
}

/// Ordered call arguments plus an optional callback block.
#[derive(Clone, Default)]
pub struct Args {
    values: Vec<Value>,
    block: Option<BlockRef>,
}

impl Args {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_values(values: Vec<Value>) -> Self {
        Self {
            values,
            block: None,
        }
    }

    pub fn push(&mut self, value: Value) {
        self.values.push(value);
    }

    /// Number of positional arguments (the block is not counted).
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn value(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Reads argument `index` as `T`; mistakes abort the call.
    pub fn get<T: Any + Clone>(&self, index: usize) -> Result<T, ActorError> {
        let value = self
            .values
            .get(index)
            .ok_or(ActorError::Abort(AbortReason::MissingArgument { index }))?;
        value.downcast_ref::<T>().cloned().ok_or_else(|| {
            ActorError::Abort(AbortReason::ArgumentType {
                index,
                expected: std::any::type_name::<T>(),
                found: value.type_name(),
            })
        })
    }

    pub fn block(&self) -> Option<&BlockRef> {
        self.block.as_ref()
    }

    pub(crate) fn block_mut(&mut self) -> Option<&mut BlockRef> {
        self.block.as_mut()
    }

    pub(crate) fn set_block(&mut self, block: BlockRef) {
        self.block = Some(block);
    }
}

impl fmt::Debug for Args {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Args")
            .field("values", &self.values)
            .field("block", &self.block.is_some())
            .finish()
    }
}

/// Builds [`Args`] from plain Rust values.
///
/// ```
/// use actor_runtime::args;
///
/// let args = args![1i64, "two".to_string()];
/// assert_eq!(args.len(), 2);
/// assert_eq!(args.get::<i64>(0).unwrap(), 1);
/// ```
#[macro_export]
macro_rules! args {
    () => {
        $crate::Args::new()
    };
    ($($value:expr),+ $(,)?) => {
        $crate::Args::from_values(vec![$($crate::Value::new($value)),+])
    };
}
