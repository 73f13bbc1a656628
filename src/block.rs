//! # Callback Blocks
//!
//! A caller may attach a [`Block`] to a call. Where the block body runs is a
//! per-method policy of the callee: methods listed with
//! [`BehaviorDescriptor::execute_block_on_receiver`](crate::BehaviorDescriptor::execute_block_on_receiver)
//! run it inline on the callee, every other method sends a
//! [`BlockCall`](crate::message::BlockCall) back to the sender's mailbox and
//! waits for the correlated [`BlockResponse`](crate::message::BlockResponse).

use crate::error::ActorError;
use crate::mailbox::Mailbox;
use crate::value::{Args, Value};
use std::fmt;
use std::sync::Arc;

type BlockFn = dyn Fn(Args) -> Result<Value, ActorError> + Send + Sync;

/// A callback passed along with a call.
#[derive(Clone)]
pub struct Block(Arc<BlockFn>);

impl Block {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(Args) -> Result<Value, ActorError> + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    pub fn invoke(&self, args: Args) -> Result<Value, ActorError> {
        (self.0)(args)
    }
}

impl fmt::Debug for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Block")
    }
}

/// Which side of a call executes the block body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockExecution {
    Sender,
    Receiver,
}

/// A block as seen by the callee: the callback plus the way back to its sender.
#[derive(Clone, Debug)]
pub struct BlockRef {
    block: Block,
    sender: Mailbox,
    execution: BlockExecution,
}

impl BlockRef {
    pub(crate) fn new(block: Block, sender: Mailbox) -> Self {
        Self {
            block,
            sender,
            execution: BlockExecution::Sender,
        }
    }

    pub fn execution(&self) -> BlockExecution {
        self.execution
    }

    pub(crate) fn execute_on_receiver(&mut self) {
        self.execution = BlockExecution::Receiver;
    }

    pub(crate) fn block(&self) -> &Block {
        &self.block
    }

    pub(crate) fn sender(&self) -> &Mailbox {
        &self.sender
    }

    /// Runs the block inline. Only legal for receiver-executed blocks; sender
    /// blocks must go through [`Ctx::yield_block`](crate::Ctx::yield_block).
    pub fn call_local(&self, args: Args) -> Result<Value, ActorError> {
        match self.execution {
            BlockExecution::Receiver => self.block.invoke(args),
            BlockExecution::Sender => Err(ActorError::abort(
                "block executes on the sender; use Ctx::yield_block",
            )),
        }
    }
}
