use actor_runtime::{args, ActorError, Args, Arity, Behavior, BehaviorDescriptor, Ctx, Value};
use std::fmt;
use tracing::{info, warn};

pub const INVENTORY: &str = "inventory";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OrderId(pub u64);

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "order_{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    pub id: OrderId,
    pub sku: String,
    pub quantity: u32,
}

/// Takes orders and reserves their stock from the inventory registered as
/// [`INVENTORY`].
///
/// The inventory is looked up on every order, so orders keep working after a
/// supervised restart of the inventory.
#[derive(Debug, Default)]
pub struct OrderDesk {
    orders: Vec<Order>,
    next_id: u64,
}

impl OrderDesk {
    pub fn new() -> Self {
        Self::default()
    }

    async fn place(ctx: Ctx<Self>, args: Args) -> Result<Value, ActorError> {
        let sku: String = args.get(0)?;
        let quantity: u32 = args.get(1)?;
        if quantity == 0 {
            return Err(ctx.abort("quantity must be positive"));
        }

        let inventory = ctx.system().whereis(INVENTORY).map_err(|e| {
            warn!(error = %e, "Inventory unavailable");
            ctx.abort(e.to_string())
        })?;
        // Another order may be placed while this one waits on the inventory.
        ctx.call(&inventory, "reserve", args![sku.clone(), quantity])
            .await
            .map_err(|e| match e {
                // The inventory refused the reservation; refuse the order.
                ActorError::CallAborted { reason, .. } => ActorError::Abort(reason),
                e => ctx.abort(format!("inventory failed: {e}")),
            })?;

        let order = ctx.state(|desk| {
            desk.next_id += 1;
            let order = Order {
                id: OrderId(desk.next_id),
                sku,
                quantity,
            };
            desk.orders.push(order.clone());
            order
        });
        info!(order_id = %order.id, sku = %order.sku, quantity, "Order placed");
        Ok(Value::new(order.id))
    }
}

impl Behavior for OrderDesk {
    fn describe(&self) -> BehaviorDescriptor<Self> {
        BehaviorDescriptor::new()
            .task("place", Arity::Exact(2), Self::place)
            .method("get", Arity::Exact(1), |desk: &mut OrderDesk, args| {
                let id: OrderId = args.get(0)?;
                Ok(Value::new(desk.orders.iter().find(|o| o.id == id).cloned()))
            })
            .method("count", Arity::Exact(0), |desk: &mut OrderDesk, _| {
                Ok(Value::new(desk.orders.len()))
            })
            .finalizer(|desk: &mut OrderDesk| {
                info!(orders = desk.orders.len(), "Order desk closing");
            })
    }
}
