use actor_runtime::{
    args, link, setup_tracing, ActorError, ActorOptions, ActorRef, ActorState, ActorSystem, Args,
    Arity, Behavior, BehaviorDescriptor, Ctx, ExitReason, ShutdownReport, SystemConfig,
    TaskBackend, Value,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Blocks its own thread on demand and records whether it was finalized.
struct Sleeper {
    finalized: Arc<AtomicBool>,
}

impl Sleeper {
    fn new() -> (Self, Arc<AtomicBool>) {
        let finalized = Arc::new(AtomicBool::new(false));
        (
            Sleeper {
                finalized: finalized.clone(),
            },
            finalized,
        )
    }

    async fn nap(ctx: Ctx<Self>, args: Args) -> Result<Value, ActorError> {
        ctx.sleep(Duration::from_millis(args.get::<u64>(0)?)).await;
        Ok(Value::unit())
    }

    /// Waits on a nap of another actor.
    async fn ask(ctx: Ctx<Self>, args: Args) -> Result<Value, ActorError> {
        let peer: ActorRef = args.get(0)?;
        ctx.call(&peer, "nap", args![args.get::<u64>(1)?]).await
    }
}

impl Behavior for Sleeper {
    fn describe(&self) -> BehaviorDescriptor<Self> {
        BehaviorDescriptor::new()
            .method("ping", Arity::Exact(0), |_: &mut Sleeper, _| {
                Ok(Value::new("pong"))
            })
            .method("block_thread", Arity::Exact(1), |_: &mut Sleeper, args| {
                std::thread::sleep(Duration::from_millis(args.get::<u64>(0)?));
                Ok(Value::unit())
            })
            .method("fail", Arity::Exact(0), |_: &mut Sleeper, _| {
                Err(ActorError::failure("worn out"))
            })
            .task("nap", Arity::Exact(1), Self::nap)
            .task("ask", Arity::Exact(2), Self::ask)
            .finalizer(|sleeper: &mut Sleeper| sleeper.finalized.store(true, Ordering::SeqCst))
    }
}

fn boot(config: SystemConfig) -> ActorSystem {
    setup_tracing();
    ActorSystem::boot(config)
}

#[tokio::test]
async fn test_shutdown_without_actors() {
    let system = boot(SystemConfig::default());
    assert_eq!(system.shutdown().await, ShutdownReport::default());
    assert!(system.is_shut_down());
}

#[tokio::test]
async fn test_shutdown_is_idempotent_and_stops_spawning() {
    let system = boot(SystemConfig::default());
    let (sleeper, finalized) = Sleeper::new();
    let actor = system.spawn(sleeper).unwrap();

    let report = system.shutdown().await;
    assert_eq!(report.terminated, 1);
    assert_eq!(report.killed, 0);
    assert!(finalized.load(Ordering::SeqCst));
    assert_eq!(actor.state(), ActorState::Dead);
    assert!(matches!(actor.exit_reason(), Some(ExitReason::Normal)));

    assert_eq!(system.shutdown().await, ShutdownReport::default());
    let (late, _) = Sleeper::new();
    assert!(matches!(system.spawn(late), Err(ActorError::Spawn(_))));
}

#[tokio::test]
async fn test_shutdown_kills_stragglers() {
    let system = boot(SystemConfig::default().with_shutdown_timeout(Duration::from_millis(100)));
    let (sleeper, finalized) = Sleeper::new();
    let actor = system.spawn(sleeper).unwrap();
    actor.cast("block_thread", args![1_000u64]).unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;

    let report = system.shutdown().await;
    assert_eq!(report.killed, 1);
    assert!(matches!(actor.exit_reason(), Some(ExitReason::Killed)));
    assert!(!finalized.load(Ordering::SeqCst));
    assert!(system.actors().is_empty());
}

#[tokio::test]
async fn test_kill_fails_queued_calls_and_crashes_links() {
    let system = boot(SystemConfig::default());
    let (sleeper, finalized) = Sleeper::new();
    let busy = system.spawn(sleeper).unwrap().into_ref();
    let (peer, _) = Sleeper::new();
    let peer = system.spawn(peer).unwrap().into_ref();
    link(&busy, &peer).unwrap();

    busy.cast("block_thread", args![300u64]).unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;
    let queued = busy.future("ping", args![]).unwrap();

    busy.kill();
    assert!(matches!(queued.value().await, Err(ActorError::DeadActor)));
    assert!(matches!(busy.exit_reason(), Some(ExitReason::Killed)));
    assert!(!finalized.load(Ordering::SeqCst));

    let reason = peer.join(Duration::from_secs(2)).await.unwrap();
    assert!(matches!(
        reason,
        ExitReason::Crashed(ActorError::LinkedActorCrashed { .. })
    ));
    system.shutdown().await;
}

#[tokio::test]
async fn test_crash_fails_callers_of_suspended_tasks() {
    let system = boot(SystemConfig::default());
    let (worker, finalized) = Sleeper::new();
    let worker = system.spawn(worker).unwrap().into_ref();
    let (peer, _) = Sleeper::new();
    let peer = system.spawn(peer).unwrap().into_ref();

    let sleeping = worker.future("nap", args![10_000u64]).unwrap();
    let calling = worker.future("ask", args![peer.clone(), 10_000u64]).unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(!sleeping.is_ready());
    assert!(!calling.is_ready());

    let err = worker.call("fail", args![]).await.unwrap_err();
    assert!(err.to_string().contains("worn out"));

    let outcomes = tokio::time::timeout(Duration::from_secs(2), async {
        (sleeping.value().await, calling.value().await)
    })
    .await
    .expect("parked callers must be released");
    assert!(matches!(outcomes.0, Err(ActorError::DeadActor)));
    assert!(matches!(outcomes.1, Err(ActorError::DeadActor)));
    // Outcomes are final.
    assert!(matches!(sleeping.value().await, Err(ActorError::DeadActor)));

    assert!(matches!(worker.exit_reason(), Some(ExitReason::Crashed(_))));
    assert!(finalized.load(Ordering::SeqCst));
    assert!(peer.is_alive());
    system.shutdown().await;
}

#[tokio::test]
async fn test_join_times_out_on_running_actor() {
    let system = boot(SystemConfig::default());
    let (sleeper, _) = Sleeper::new();
    let actor = system.spawn(sleeper).unwrap();

    let err = actor.join(Duration::from_millis(20)).await.unwrap_err();
    assert!(matches!(err, ActorError::Timeout(_)));

    let reason = actor.terminate(Duration::from_secs(2)).await.unwrap();
    assert!(reason.is_normal());
    assert!(system.actors().is_empty());
    system.shutdown().await;
}

#[tokio::test]
async fn test_bounded_mailbox_rejects_overflow() {
    let system = boot(SystemConfig::default());
    let (sleeper, _) = Sleeper::new();
    let options = ActorOptions::from_config(system.config()).mailbox_capacity(1);
    let actor = system.spawn_with(sleeper, options).unwrap();

    actor.cast("block_thread", args![200u64]).unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;
    actor.cast("ping", args![]).unwrap();
    let err = actor.cast("ping", args![]).unwrap_err();
    assert!(matches!(err, ActorError::MailboxFull(1)));

    // Termination requests bypass the bound.
    let reason = actor.terminate(Duration::from_secs(2)).await.unwrap();
    assert!(reason.is_normal());
    system.shutdown().await;
}

#[tokio::test]
async fn test_default_call_timeout_from_config() {
    let config = SystemConfig::default().with_call_timeout(Duration::from_millis(30));
    let system = boot(config);
    let (sleeper, _) = Sleeper::new();
    let actor = system.spawn(sleeper).unwrap();

    let err = actor.call("block_thread", args![200u64]).await.unwrap_err();
    assert!(matches!(err, ActorError::Timeout(_)));
    system.shutdown().await;
}

#[tokio::test]
async fn test_registry_tracks_live_actors() {
    let system = boot(SystemConfig::default());
    let (sleeper, _) = Sleeper::new();
    let actor = system.spawn(sleeper).unwrap().into_ref();

    system.register("sleeper", &actor).unwrap();
    assert_eq!(system.whereis("sleeper").unwrap(), actor);
    assert_eq!(system.registered(), vec!["sleeper".to_string()]);
    assert_eq!(actor.name().as_deref(), Some("sleeper"));

    actor.terminate(Duration::from_secs(2)).await.unwrap();
    assert!(matches!(system.whereis("sleeper"), Err(ActorError::NotFound(_))));
    assert!(matches!(
        system.register("sleeper", &actor),
        Err(ActorError::DeadActor)
    ));
    system.shutdown().await;
}

#[test]
fn test_config_deserializes_from_json() {
    let config: SystemConfig = serde_json::from_str(
        r#"{
            "shutdown_timeout_ms": 250,
            "default_task_backend": "threaded",
            "default_mailbox_capacity": 64
        }"#,
    )
    .unwrap();
    assert_eq!(config.shutdown_timeout, Duration::from_millis(250));
    assert_eq!(config.default_task_backend, TaskBackend::Threaded);
    assert_eq!(config.default_mailbox_capacity, Some(64));
    assert_eq!(config.default_call_timeout, None);

    let defaults: SystemConfig = serde_json::from_str("{}").unwrap();
    assert_eq!(defaults, SystemConfig::default());
}
