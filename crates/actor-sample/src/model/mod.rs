//! # Shop Domain
//!
//! Two behaviors: [`Inventory`] holds stock and is supervised under the name
//! [`INVENTORY`]; [`OrderDesk`] reserves stock from it for every order.

mod inventory;
mod order_desk;

pub use inventory::Inventory;
pub use order_desk::{Order, OrderDesk, OrderId, INVENTORY};
