// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! End-to-end orchestration scenarios: TOML job definitions loaded into
//! the service, fired by timers and events, executed over a fake catalog.

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use drover_api::{Service, TaskDeleteRequest};
use drover_core::{
    jobs_from_toml, Action, ActionMessage, ActionOutput, Clock, CtrlAction, CtrlCommand, Event,
    EventBus, FakeClock, FiringKind, JobId, MemoryStore, SequentialIdGen, Subscription, TaskStatus,
};
use drover_engine::{
    ActionHandler, AllowAll, ChainExecutor, EngineConfig, FakeCatalog, HandlerRegistry,
    RecordingHandler, Resolver, SubstringQueries, Supervisor, Sweeper,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

/// Blocks every invocation until the test releases a permit
struct GateHandler {
    gate: Arc<Semaphore>,
}

#[async_trait]
impl ActionHandler for GateHandler {
    async fn invoke(&self, _action: &Action, _message: &ActionMessage) -> ActionOutput {
        let permit = self.gate.acquire().await.unwrap();
        permit.forget();
        ActionOutput::text("released")
    }
}

struct World {
    svc: Service<FakeClock, SequentialIdGen>,
    bus: EventBus,
    clock: FakeClock,
    recorder: Arc<RecordingHandler>,
    gate: Arc<Semaphore>,
}

fn world() -> World {
    let store = Arc::new(MemoryStore::new());
    let bus = EventBus::new();
    let clock = FakeClock::at(Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap());
    let recorder = Arc::new(RecordingHandler::new());
    let gate = Arc::new(Semaphore::new(0));

    let mut handlers = HandlerRegistry::new();
    handlers.register("deploy", recorder.clone());
    handlers.register("verify", recorder.clone());
    handlers.register("gate", Arc::new(GateHandler { gate: gate.clone() }));

    let catalog = FakeCatalog::with_nodes(&["web-1", "web-2"]);
    let queries = SubstringQueries {
        catalog: catalog.clone(),
    };
    let resolver = Resolver::new(Arc::new(catalog), Arc::new(queries));
    let executor = ChainExecutor::new(resolver, handlers, clock.clone());

    let sup = Supervisor::new(
        store.clone(),
        store.clone(),
        bus.clone(),
        executor,
        clock.clone(),
        SequentialIdGen::default(),
        Arc::new(AllowAll),
        EngineConfig::default(),
    );
    let sweeper = Sweeper::new(store.clone(), sup.clone(), clock.clone());
    let svc = Service::new(store.clone(), store, bus.clone(), sup, sweeper, clock.clone());
    World {
        svc,
        bus,
        clock,
        recorder,
        gate,
    }
}

async fn recv_matching(
    rx: &mut drover_core::events::EventReceiver,
    pred: impl Fn(&Event) -> bool,
) -> Event {
    loop {
        let event = rx.recv().await.unwrap();
        if pred(&event) {
            return event;
        }
    }
}

#[tokio::test]
async fn scheduled_job_fans_out_over_resolved_nodes() {
    let w = world();
    let jobs = jobs_from_toml(
        r#"
        [job.rollout]
        owner = "ops"
        schedule = { interval = "R/2026-01-01T01:00:00Z/PT1H", min_delta = "PT30M" }

        [[job.rollout.action]]
        handler = "deploy"
        nodes = { paths = ["web-1", "web-2"] }

        [[job.rollout.action.next]]
        handler = "verify"
        "#,
    )
    .unwrap();
    for job in &jobs {
        w.svc.put_job(job).unwrap();
    }

    let mut finished = w.bus.subscribe(Subscription::on("w", "task:finished"));
    w.clock.advance(Duration::from_secs(3700));
    let fired = w.svc.poll_timers(w.clock.now_utc()).unwrap();
    assert_eq!(fired.len(), 1);

    recv_matching(&mut finished, |e| matches!(e, Event::TaskFinished { .. })).await;
    let task = w.svc.get_task(&fired[0]).unwrap();
    assert_eq!(task.status, TaskStatus::Finished);
    assert!(matches!(task.fired_by, FiringKind::Schedule));
    assert!((task.progress - 1.0).abs() < f32::EPSILON);
    assert_eq!(task.action_logs.len(), 4);

    // One deploy per node, each followed by its own verify in the same scope
    let calls = w.recorder.calls();
    let mut deploys: Vec<Vec<String>> = calls
        .iter()
        .filter(|c| c.action_id == "deploy")
        .map(|c| c.scope.clone())
        .collect();
    deploys.sort();
    assert_eq!(deploys, vec![vec!["web-1".to_string()], vec!["web-2".to_string()]]);
    let verifies: Vec<&Vec<String>> = calls
        .iter()
        .filter(|c| c.action_id == "verify")
        .map(|c| &c.scope)
        .collect();
    assert_eq!(verifies.len(), 2);
    assert!(verifies.iter().all(|s| s.len() == 1));
}

#[tokio::test]
async fn event_firings_respect_the_concurrency_ceiling() {
    let w = world();
    let jobs = jobs_from_toml(
        r#"
        [job.ingest]
        owner = "ops"
        events = ["upload:done"]
        max_concurrency = 1

        [[job.ingest.action]]
        handler = "gate"
        "#,
    )
    .unwrap();
    for job in &jobs {
        w.svc.put_job(job).unwrap();
    }

    let first = w
        .svc
        .emit_event("upload:done", serde_json::json!({"batch": 1}))
        .unwrap();
    let second = w
        .svc
        .emit_event("upload:done", serde_json::json!({"batch": 2}))
        .unwrap();
    assert_eq!(first.len(), 1);
    assert_eq!(second.len(), 1);

    assert_eq!(
        w.svc.get_task(&first[0]).unwrap().status,
        TaskStatus::Running
    );
    assert_eq!(
        w.svc.get_task(&second[0]).unwrap().status,
        TaskStatus::Queued
    );

    let mut finished = w.bus.subscribe(Subscription::on("w", "task:finished"));
    w.gate.add_permits(2);
    recv_matching(&mut finished, |e| {
        matches!(e, Event::TaskFinished { id, .. } if *id == second[0])
    })
    .await;
    assert_eq!(
        w.svc.get_task(&first[0]).unwrap().status,
        TaskStatus::Finished
    );
}

#[tokio::test]
async fn repeated_runs_can_be_pruned_down_to_recent_history() {
    let w = world();
    let jobs = jobs_from_toml(
        r#"
        [job.sweep]
        owner = "ops"

        [[job.sweep.action]]
        handler = "deploy"
        "#,
    )
    .unwrap();
    for job in &jobs {
        w.svc.put_job(job).unwrap();
    }

    let mut finished = w.bus.subscribe(Subscription::on("w", "task:finished"));
    let job_id = JobId::from("sweep");
    for _ in 0..4 {
        w.clock.advance(Duration::from_secs(60));
        w.svc
            .control(CtrlCommand::for_job(CtrlAction::RunOnce, "sweep", "ops"))
            .unwrap();
    }
    for _ in 0..4 {
        recv_matching(&mut finished, |e| matches!(e, Event::TaskFinished { .. })).await;
    }

    let deleted = w
        .svc
        .delete_tasks(
            &TaskDeleteRequest::by_status(job_id.clone(), vec![TaskStatus::Finished]).keeping(1),
        )
        .unwrap();
    assert_eq!(deleted.len(), 3);

    let remaining = w.svc.list_tasks(Some(&job_id), &[]).unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].status, TaskStatus::Finished);
}
