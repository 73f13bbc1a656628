use actor_runtime::{
    args, setup_tracing, ActorError, ActorOptions, ActorRef, ActorSystem, Args, Arity, Behavior,
    BehaviorDescriptor, Condition, Ctx, ExitReason, SystemConfig, Value,
};
use futures::future::join_all;
use std::time::Duration;

/// Talks to a peer that calls straight back into this actor.
struct Echo {
    value: i64,
}

impl Echo {
    async fn roundtrip(ctx: Ctx<Self>, args: Args) -> Result<Value, ActorError> {
        let peer: ActorRef = args.get(0)?;
        let me = ctx.current().clone();
        ctx.call(&peer, "bounce", args![me]).await
    }

    async fn bounce(ctx: Ctx<Self>, args: Args) -> Result<Value, ActorError> {
        let origin: ActorRef = args.get(0)?;
        ctx.call(&origin, "probe", args![]).await
    }

    async fn probe(ctx: Ctx<Self>, _args: Args) -> Result<Value, ActorError> {
        let value = ctx.state(|echo| echo.value);
        Ok(Value::new((value, ctx.detect_recursion())))
    }
}

impl Behavior for Echo {
    fn describe(&self) -> BehaviorDescriptor<Self> {
        BehaviorDescriptor::new()
            .task("roundtrip", Arity::Exact(1), Self::roundtrip)
            .task("bounce", Arity::Exact(1), Self::bounce)
            .task("probe", Arity::Exact(0), Self::probe)
    }
}

/// Records the order in which work happens.
#[derive(Default)]
struct Journal {
    entries: Vec<String>,
    condition: Option<Condition>,
}

impl Journal {
    fn note(ctx: &Ctx<Self>, entry: &str) {
        ctx.state(|journal| journal.entries.push(entry.to_string()));
    }

    async fn nap(ctx: Ctx<Self>, args: Args) -> Result<Value, ActorError> {
        let millis: u64 = args.get(0)?;
        Self::note(&ctx, "nap:start");
        ctx.sleep(Duration::from_millis(millis)).await;
        Self::note(&ctx, "nap:end");
        Ok(Value::unit())
    }

    async fn thread_name(_ctx: Ctx<Self>, _args: Args) -> Result<Value, ActorError> {
        let name = std::thread::current().name().unwrap_or("").to_string();
        Ok(Value::new(name))
    }

    async fn await_go(ctx: Ctx<Self>, _args: Args) -> Result<Value, ActorError> {
        ctx.wait("go").await
    }

    async fn go(ctx: Ctx<Self>, args: Args) -> Result<Value, ActorError> {
        let value: i64 = args.get(0)?;
        Ok(Value::new(ctx.signal("go", value)))
    }

    async fn await_condition(ctx: Ctx<Self>, _args: Args) -> Result<Value, ActorError> {
        let condition = ctx.condition();
        ctx.state(|journal| journal.condition = Some(condition.clone()));
        condition.wait_timeout(&ctx, Duration::from_secs(5)).await
    }

    async fn await_greeting(ctx: Ctx<Self>, _args: Args) -> Result<Value, ActorError> {
        ctx.receive(Some(Duration::from_secs(5)), |message| message.is::<String>())
            .await
    }

    async fn await_text_only(ctx: Ctx<Self>, _args: Args) -> Result<Value, ActorError> {
        ctx.receive(None, |message| {
            if message.is::<u8>() {
                panic!("bytes are not accepted");
            }
            message.is::<String>()
        })
        .await
    }
}

impl Behavior for Journal {
    fn describe(&self) -> BehaviorDescriptor<Self> {
        BehaviorDescriptor::new()
            .method("note", Arity::Exact(1), |journal: &mut Journal, args| {
                journal.entries.push(args.get::<String>(0)?);
                Ok(Value::unit())
            })
            .method("entries", Arity::Exact(0), |journal: &mut Journal, _| {
                Ok(Value::new(journal.entries.clone()))
            })
            .method("condition", Arity::Exact(0), |journal: &mut Journal, _| {
                Ok(Value::new(journal.condition.clone()))
            })
            .task("nap", Arity::Exact(1), Self::nap)
            .task("exclusive_nap", Arity::Exact(1), Self::nap)
            .task("thread_name", Arity::Exact(0), Self::thread_name)
            .task("await_go", Arity::Exact(0), Self::await_go)
            .task("go", Arity::Exact(1), Self::go)
            .task("await_condition", Arity::Exact(0), Self::await_condition)
            .task("await_greeting", Arity::Exact(0), Self::await_greeting)
            .task("await_text_only", Arity::Exact(0), Self::await_text_only)
            .exclusive("exclusive_nap")
    }
}

fn boot() -> ActorSystem {
    setup_tracing();
    ActorSystem::boot(SystemConfig::default())
}

async fn entries(journal: &ActorRef) -> Vec<String> {
    journal
        .call("entries", args![])
        .await
        .unwrap()
        .get::<Vec<String>>()
        .unwrap()
}

#[tokio::test]
async fn test_call_cycle_does_not_deadlock() {
    let system = boot();
    let a = system.spawn(Echo { value: 1 }).unwrap();
    let b = system.spawn(Echo { value: 2 }).unwrap();

    let reply = tokio::time::timeout(
        Duration::from_secs(2),
        a.call("roundtrip", args![b.actor_ref().clone()]),
    )
    .await
    .expect("call cycle deadlocked")
    .unwrap();

    // `probe` ran on A while A's `roundtrip` task was still waiting on B.
    let (value, recursion) = reply.get::<(i64, bool)>().unwrap();
    assert_eq!(value, 1);
    assert!(recursion);

    system.shutdown().await;
}

#[tokio::test]
async fn test_no_recursion_for_fresh_call_chain() {
    let system = boot();
    let a = system.spawn(Echo { value: 1 }).unwrap();

    let (_, recursion) = a
        .call("probe", args![])
        .await
        .unwrap()
        .get::<(i64, bool)>()
        .unwrap();
    assert!(!recursion);

    system.shutdown().await;
}

#[tokio::test]
async fn test_concurrent_callers_are_serialized() {
    let system = boot();
    let journal = system.spawn(Journal::default()).unwrap().into_ref();

    let callers = (0..4).map(|caller| {
        let journal = journal.clone();
        tokio::spawn(async move {
            for i in 0..25 {
                journal
                    .call("note", args![format!("{caller}-{i}")])
                    .await
                    .unwrap();
            }
        })
    });
    for joined in join_all(callers).await {
        joined.unwrap();
    }

    assert_eq!(entries(&journal).await.len(), 100);
    system.shutdown().await;
}

#[tokio::test]
async fn test_sleeping_task_lets_other_calls_run() {
    let system = boot();
    let journal = system.spawn(Journal::default()).unwrap().into_ref();

    let nap = journal.future("nap", args![100u64]).unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;
    journal.call("note", args!["visitor".to_string()]).await.unwrap();
    nap.value().await.unwrap();

    assert_eq!(entries(&journal).await, vec!["nap:start", "visitor", "nap:end"]);
    system.shutdown().await;
}

#[tokio::test]
async fn test_exclusive_task_keeps_the_actor() {
    let system = boot();
    let journal = system.spawn(Journal::default()).unwrap().into_ref();

    let nap = journal.future("exclusive_nap", args![100u64]).unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;
    journal.call("note", args!["visitor".to_string()]).await.unwrap();
    nap.value().await.unwrap();

    assert_eq!(entries(&journal).await, vec!["nap:start", "nap:end", "visitor"]);
    system.shutdown().await;
}

#[tokio::test]
async fn test_exclusive_actor_option_applies_to_every_task() {
    let system = boot();
    let options = ActorOptions::from_config(system.config()).exclusive();
    let journal = system.spawn_with(Journal::default(), options).unwrap().into_ref();

    let nap = journal.future("nap", args![80u64]).unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;
    journal.call("note", args!["visitor".to_string()]).await.unwrap();
    nap.value().await.unwrap();

    assert_eq!(entries(&journal).await, vec!["nap:start", "nap:end", "visitor"]);
    system.shutdown().await;
}

#[tokio::test]
async fn test_threaded_backend_runs_tasks_on_their_own_threads() {
    let system = boot();
    let fiber = system.spawn(Journal::default()).unwrap();
    let options = ActorOptions::from_config(system.config()).threaded();
    let threaded = system.spawn_with(Journal::default(), options).unwrap();

    let fiber_thread = fiber
        .call("thread_name", args![])
        .await
        .unwrap()
        .get::<String>()
        .unwrap();
    assert_eq!(fiber_thread, fiber.id().to_string());

    let task_thread = threaded
        .call("thread_name", args![])
        .await
        .unwrap()
        .get::<String>()
        .unwrap();
    assert_eq!(task_thread, format!("{}-task", threaded.id()));

    system.shutdown().await;
}

#[tokio::test]
async fn test_signal_wakes_waiting_task() {
    let system = boot();
    let journal = system.spawn(Journal::default()).unwrap();

    let waiting = journal.future("await_go", args![]).unwrap();
    let mut woken = false;
    for _ in 0..50 {
        woken = journal.call("go", args![7i64]).await.unwrap().get::<bool>().unwrap();
        if woken {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(woken);
    assert_eq!(waiting.value().await.unwrap().get::<i64>().unwrap(), 7);

    system.shutdown().await;
}

#[tokio::test]
async fn test_condition_signal_resumes_owner_task() {
    let system = boot();
    let journal = system.spawn(Journal::default()).unwrap();

    let waiting = journal.future("await_condition", args![]).unwrap();
    let condition = loop {
        let current = journal
            .call("condition", args![])
            .await
            .unwrap()
            .get::<Option<Condition>>()
            .unwrap();
        if let Some(condition) = current {
            break condition;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    };
    assert_eq!(condition.owner(), journal.actor_ref());

    condition.signal("ready".to_string()).unwrap();
    let value = waiting.value().await.unwrap();
    assert_eq!(value.get::<String>().unwrap(), "ready");

    system.shutdown().await;
}

#[tokio::test]
async fn test_receive_skips_unmatched_messages() {
    let system = boot();
    let journal = system.spawn(Journal::default()).unwrap();

    let greeting = journal.future("await_greeting", args![]).unwrap();
    for _ in 0..100 {
        if greeting.is_ready() {
            break;
        }
        journal.tell(42u32).unwrap();
        journal.tell("hello".to_string()).unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    let value = greeting.value().await.unwrap();
    assert_eq!(value.get::<String>().unwrap(), "hello");
    assert!(journal.is_alive());

    system.shutdown().await;
}

#[tokio::test]
async fn test_panicking_receive_predicate_crashes_the_actor() {
    let system = boot();
    let journal = system.spawn(Journal::default()).unwrap();

    let waiting = journal.future("await_text_only", args![]).unwrap();
    for _ in 0..100 {
        if !journal.is_alive() || journal.tell(7u8).is_err() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    let reason = journal.join(Duration::from_secs(2)).await.unwrap();
    assert!(matches!(reason, ExitReason::Crashed(_)), "got {reason:?}");
    assert!(!journal.is_alive());
    assert!(matches!(waiting.value().await, Err(ActorError::DeadActor)));

    let late = tokio::time::timeout(Duration::from_secs(2), journal.call("entries", args![]))
        .await
        .expect("call on a crashed actor must not hang");
    assert!(late.unwrap_err().is_dead_target());

    system.shutdown().await;
}
