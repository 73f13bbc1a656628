use actor_runtime::{
    args, is_linked, link, monitor, setup_tracing, ActorError, ActorId, ActorRef, ActorState, ActorSystem,
    Args, Arity, Behavior, BehaviorDescriptor, ChildSpec, Construct, Ctx, ExitReason, MockActor,
    RestartPolicy, Supervisor, SystemConfig, Value,
};
use std::sync::{Arc, Mutex};
use std::time::Duration;

struct Counter {
    count: i64,
}

impl Counter {
    async fn stop(ctx: Ctx<Self>, _args: Args) -> Result<Value, ActorError> {
        ctx.terminate()?;
        Ok(Value::unit())
    }
}

impl Behavior for Counter {
    fn describe(&self) -> BehaviorDescriptor<Self> {
        BehaviorDescriptor::new()
            .method("value", Arity::Exact(0), |counter: &mut Counter, _| {
                Ok(Value::new(counter.count))
            })
            .method("increment", Arity::Exact(0), |counter: &mut Counter, _| {
                counter.count += 1;
                Ok(Value::new(counter.count))
            })
            .method("crash", Arity::Exact(0), |_: &mut Counter, _| {
                Err(ActorError::failure("counter corrupted"))
            })
            .task("stop", Arity::Exact(0), Self::stop)
    }
}

impl Construct for Counter {
    fn construct(args: &Args) -> Result<Self, ActorError> {
        Ok(Counter {
            count: args.get(0)?,
        })
    }
}

/// Traps exits of linked actors instead of dying with them.
#[derive(Default)]
struct Trapper {
    exits: Vec<(ActorId, bool)>,
}

impl Trapper {
    async fn on_exit(ctx: Ctx<Self>, args: Args) -> Result<Value, ActorError> {
        let actor: ActorRef = args.get(0)?;
        let reason: Option<ActorError> = args.get(1)?;
        ctx.state(|trapper| trapper.exits.push((actor.id(), reason.is_some())));
        Ok(Value::unit())
    }
}

impl Behavior for Trapper {
    fn describe(&self) -> BehaviorDescriptor<Self> {
        BehaviorDescriptor::new()
            .method("exits", Arity::Exact(0), |trapper: &mut Trapper, _| {
                Ok(Value::new(trapper.exits.clone()))
            })
            .task("on_exit", Arity::Exact(2), Self::on_exit)
            .exit_handler("on_exit")
    }
}

/// Handles exits in an exclusive handler that takes its time.
struct Mourner {
    log: Arc<Mutex<Vec<String>>>,
}

impl Mourner {
    async fn on_exit(ctx: Ctx<Self>, _args: Args) -> Result<Value, ActorError> {
        let log = ctx.state(|mourner| mourner.log.clone());
        log.lock().unwrap().push("mourn:start".to_string());
        ctx.sleep(Duration::from_millis(200)).await;
        log.lock().unwrap().push("mourn:end".to_string());
        Ok(Value::unit())
    }
}

impl Behavior for Mourner {
    fn describe(&self) -> BehaviorDescriptor<Self> {
        BehaviorDescriptor::new()
            .method("note", Arity::Exact(1), |mourner: &mut Mourner, args| {
                mourner.log.lock().unwrap().push(args.get::<String>(0)?);
                Ok(Value::unit())
            })
            .task("on_exit", Arity::Exact(2), Self::on_exit)
            .exclusive("on_exit")
            .exit_handler("on_exit")
    }
}

/// Asks an inventory actor before accepting an order.
struct Checkout {
    inventory: ActorRef,
}

impl Checkout {
    async fn place(ctx: Ctx<Self>, args: Args) -> Result<Value, ActorError> {
        let sku: String = args.get(0)?;
        let inventory = ctx.state(|checkout| checkout.inventory.clone());
        let in_stock = ctx
            .call(&inventory, "in_stock", args![sku.clone()])
            .await?
            .get::<bool>()?;
        if !in_stock {
            return Err(ctx.abort(format!("{sku} is out of stock")));
        }
        ctx.call(&inventory, "reserve", args![sku]).await
    }
}

impl Behavior for Checkout {
    fn describe(&self) -> BehaviorDescriptor<Self> {
        BehaviorDescriptor::new().task("place", Arity::Exact(1), Self::place)
    }
}

fn boot() -> ActorSystem {
    setup_tracing();
    ActorSystem::boot(SystemConfig::default())
}

/// Polls the registry until `name` resolves to an actor other than `old`.
async fn wait_for_replacement(system: &ActorSystem, name: &str, old: &ActorRef) -> ActorRef {
    for _ in 0..200 {
        match system.whereis(name) {
            Ok(actor) if &actor != old => return actor,
            // A dead instance has already given up its name.
            Ok(_) if old.state() == ActorState::Dead => panic!("{name} still resolves to a dead actor"),
            Ok(_) | Err(ActorError::Restarting(_)) => {}
            Err(e) => panic!("unexpected lookup error for {name}: {e}"),
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("{name} was not restarted");
}

#[tokio::test]
async fn test_linked_crash_takes_peer_down() {
    let system = boot();
    let a = system.spawn(Counter { count: 0 }).unwrap().into_ref();
    let b = system.spawn(Counter { count: 0 }).unwrap().into_ref();
    link(&a, &b).unwrap();
    assert!(is_linked(&b, &a));

    let _ = a.call("crash", args![]).await;

    let reason = b.join(Duration::from_secs(2)).await.unwrap();
    match reason {
        ExitReason::Crashed(ActorError::LinkedActorCrashed { actor, .. }) => assert_eq!(actor, a.id()),
        other => panic!("expected linked crash, got {other:?}"),
    }
    system.shutdown().await;
}

#[tokio::test]
async fn test_normal_exit_does_not_propagate_through_link() {
    let system = boot();
    let a = system.spawn(Counter { count: 0 }).unwrap().into_ref();
    let b = system.spawn(Counter { count: 0 }).unwrap().into_ref();
    link(&a, &b).unwrap();

    let reason = a.terminate(Duration::from_secs(2)).await.unwrap();
    assert!(reason.is_normal());
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert!(b.is_alive());
    assert!(!is_linked(&b, &a));
    system.shutdown().await;
}

#[tokio::test]
async fn test_monitor_reports_without_crashing() {
    let system = boot();
    let watched = system.spawn(Counter { count: 0 }).unwrap().into_ref();
    let watcher = system.spawn(Counter { count: 0 }).unwrap().into_ref();
    monitor(&watcher, &watched).unwrap();

    let _ = watched.call("crash", args![]).await;
    watched.join(Duration::from_secs(2)).await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert!(watcher.is_alive());
    system.shutdown().await;
}

#[tokio::test]
async fn test_exit_handler_traps_linked_crash() {
    let system = boot();
    let trapper = system.spawn(Trapper::default()).unwrap().into_ref();
    let worker = system.spawn(Counter { count: 0 }).unwrap().into_ref();
    let quitter = system.spawn(Counter { count: 0 }).unwrap().into_ref();
    link(&trapper, &worker).unwrap();
    monitor(&trapper, &quitter).unwrap();

    let _ = worker.call("crash", args![]).await;
    let _ = quitter.call("stop", args![]).await;

    let mut exits = Vec::new();
    for _ in 0..100 {
        exits = trapper
            .call("exits", args![])
            .await
            .unwrap()
            .get::<Vec<(ActorId, bool)>>()
            .unwrap();
        if exits.len() == 2 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    exits.sort();
    assert_eq!(exits, vec![(worker.id(), true), (quitter.id(), false)]);
    assert!(trapper.is_alive());

    system.shutdown().await;
}

#[tokio::test]
async fn test_exclusive_exit_handler_keeps_the_actor() {
    let system = boot();
    let log = Arc::new(Mutex::new(Vec::new()));
    let mourner = system
        .spawn(Mourner { log: log.clone() })
        .unwrap()
        .into_ref();
    let worker = system.spawn(Counter { count: 0 }).unwrap().into_ref();
    link(&mourner, &worker).unwrap();

    let _ = worker.call("crash", args![]).await;
    for _ in 0..100 {
        if !log.lock().unwrap().is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    mourner.call("note", args!["visitor".to_string()]).await.unwrap();

    assert_eq!(*log.lock().unwrap(), vec!["mourn:start", "mourn:end", "visitor"]);
    assert!(mourner.is_alive());
    system.shutdown().await;
}

#[tokio::test]
async fn test_supervised_actor_is_rebuilt_from_same_args() {
    let system = boot();
    system.supervise_as::<Counter>("counter", args![10i64]).await.unwrap();

    let first = system.whereis("counter").unwrap();
    first.call("increment", args![]).await.unwrap();
    let _ = first.call("crash", args![]).await;
    let reason = first.join(Duration::from_secs(2)).await.unwrap();
    assert!(matches!(reason, ExitReason::Crashed(_)));

    match system.whereis("counter") {
        Err(ActorError::Restarting(name)) => assert_eq!(name, "counter"),
        Ok(actor) => {
            assert_ne!(actor, first, "the name must never resolve to the crashed instance");
            assert!(actor.is_alive());
        }
        Err(e) => panic!("unexpected lookup error: {e}"),
    }

    let second = wait_for_replacement(&system, "counter", &first).await;
    let value = second.call("value", args![]).await.unwrap().get::<i64>().unwrap();
    assert_eq!(value, 10);
    assert_eq!(second.name().as_deref(), Some("counter"));

    system.shutdown().await;
}

#[tokio::test]
async fn test_normal_exit_removes_supervised_actor() {
    let system = boot();
    let supervisor = Supervisor::start(&system, RestartPolicy::default()).unwrap();
    let child = supervisor
        .supervise(ChildSpec::of::<Counter>(args![0i64]).named("short-lived"))
        .await
        .unwrap();
    assert_eq!(supervisor.members().await.unwrap(), vec![child.clone()]);

    let _ = child.call("stop", args![]).await;
    child.join(Duration::from_secs(2)).await.unwrap();

    let mut members = supervisor.members().await.unwrap();
    for _ in 0..100 {
        if members.is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
        members = supervisor.members().await.unwrap();
    }
    assert!(members.is_empty());
    assert!(matches!(system.whereis("short-lived"), Err(ActorError::NotFound(_))));

    system.shutdown().await;
}

#[tokio::test]
async fn test_restart_intensity_crashes_supervisor() {
    let system = boot();
    let policy = RestartPolicy {
        max_restarts: 1,
        within: Duration::from_secs(5),
    };
    let supervisor = Supervisor::start(&system, policy).unwrap();
    supervisor
        .supervise(ChildSpec::of::<Counter>(args![0i64]).named("flaky"))
        .await
        .unwrap();

    let first = system.whereis("flaky").unwrap();
    let _ = first.call("crash", args![]).await;
    let second = wait_for_replacement(&system, "flaky", &first).await;
    let _ = second.call("crash", args![]).await;

    let reason = supervisor.actor().join(Duration::from_secs(2)).await.unwrap();
    assert!(matches!(reason, ExitReason::Crashed(_)));
    assert!(system.whereis("flaky").is_err());

    system.shutdown().await;
}

#[tokio::test]
async fn test_checkout_against_mocked_inventory() {
    let system = boot();
    let inventory = MockActor::new();
    inventory.expect("in_stock").return_ok(Value::new(true));
    inventory.expect("reserve").return_ok(Value::new(1u64));
    inventory.expect("in_stock").return_ok(Value::new(false));

    let inventory_ref = inventory.spawn(&system).unwrap();
    let checkout = system
        .spawn(Checkout {
            inventory: inventory_ref,
        })
        .unwrap();

    let reservation = checkout.call("place", args!["sku-1".to_string()]).await.unwrap();
    assert_eq!(reservation.get::<u64>().unwrap(), 1);

    let err = checkout.call("place", args!["sku-2".to_string()]).await.unwrap_err();
    assert!(err.is_abort());
    assert!(checkout.is_alive());

    inventory.verify();
    assert_eq!(inventory.calls(), vec!["in_stock", "reserve", "in_stock"]);
    system.shutdown().await;
}
