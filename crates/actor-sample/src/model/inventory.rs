use actor_runtime::{ActorError, Args, Arity, Behavior, BehaviorDescriptor, Construct, Value};
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Stock levels per SKU.
///
/// Rebuilt from its seed stock when it crashes, see [`Construct`].
#[derive(Debug)]
pub struct Inventory {
    stock: BTreeMap<String, u32>,
}

impl Inventory {
    pub fn new(seed: Vec<(String, u32)>) -> Self {
        Self {
            stock: seed.into_iter().collect(),
        }
    }

    fn level(&self, sku: &str) -> u32 {
        self.stock.get(sku).copied().unwrap_or(0)
    }

    fn reserve(&mut self, args: Args) -> Result<Value, ActorError> {
        let sku: String = args.get(0)?;
        let quantity: u32 = args.get(1)?;
        let available = self.level(&sku);
        if available < quantity {
            return Err(ActorError::abort(format!(
                "{sku}: requested {quantity}, {available} in stock"
            )));
        }
        let remaining = available - quantity;
        self.stock.insert(sku.clone(), remaining);
        debug!(%sku, quantity, remaining, "Reserved");
        Ok(Value::new(remaining))
    }

    fn restock(&mut self, args: Args) -> Result<Value, ActorError> {
        let sku: String = args.get(0)?;
        let quantity: u32 = args.get(1)?;
        let level = self.stock.entry(sku.clone()).or_insert(0);
        *level += quantity;
        info!(%sku, quantity, level = *level, "Restocked");
        Ok(Value::new(*level))
    }
}

impl Behavior for Inventory {
    fn describe(&self) -> BehaviorDescriptor<Self> {
        BehaviorDescriptor::new()
            .method("stock", Arity::Exact(1), |inventory: &mut Inventory, args| {
                let sku: String = args.get(0)?;
                Ok(Value::new(inventory.level(&sku)))
            })
            .method("reserve", Arity::Exact(2), Inventory::reserve)
            .method("restock", Arity::Exact(2), Inventory::restock)
            .method("corrupt", Arity::Exact(0), |_: &mut Inventory, _| {
                Err(ActorError::failure("inventory ledger corrupted"))
            })
    }
}

impl Construct for Inventory {
    fn construct(args: &Args) -> Result<Self, ActorError> {
        Ok(Self::new(args.get(0)?))
    }
}
