use super::*;
use crate::clock::FakeClock;
use crate::task::FiringKind;
use std::time::Duration;

fn job(id: &str) -> Job {
    Job::new(id, format!("job {}", id), "admin")
}

fn task(id: &str, job_id: &str, clock: &FakeClock) -> Task {
    Task::new(id, JobId::from(job_id), "admin", FiringKind::RunOnce, clock)
}

#[test]
fn jobs_round_trip_and_delete() {
    let store = MemoryStore::new();
    store.put_job(&job("j-1")).unwrap();

    let loaded = store.get_job(&JobId::from("j-1")).unwrap();
    assert_eq!(loaded.label, "job j-1");

    store.delete_job(&JobId::from("j-1")).unwrap();
    assert!(matches!(
        store.get_job(&JobId::from("j-1")),
        Err(StoreError::NotFound { kind: "job", .. })
    ));
}

#[test]
fn delete_missing_job_is_not_found() {
    let store = MemoryStore::new();
    assert!(store.delete_job(&JobId::from("ghost")).is_err());
}

#[test]
fn list_jobs_is_ordered_by_id() {
    let store = MemoryStore::new();
    store.put_job(&job("j-c")).unwrap();
    store.put_job(&job("j-a")).unwrap();
    store.put_job(&job("j-b")).unwrap();

    let ids: Vec<String> = store
        .list_jobs()
        .unwrap()
        .into_iter()
        .map(|j| j.id.0)
        .collect();
    assert_eq!(ids, vec!["j-a", "j-b", "j-c"]);
}

#[test]
fn list_tasks_filters_by_job_and_orders_by_creation() {
    let clock = FakeClock::new();
    let store = MemoryStore::new();

    store.put_task(&task("t-1", "j-1", &clock)).unwrap();
    clock.advance(Duration::from_secs(1));
    store.put_task(&task("t-2", "j-2", &clock)).unwrap();
    clock.advance(Duration::from_secs(1));
    store.put_task(&task("t-3", "j-1", &clock)).unwrap();

    let for_j1: Vec<String> = store
        .list_tasks(Some(&JobId::from("j-1")))
        .unwrap()
        .into_iter()
        .map(|t| t.id.0)
        .collect();
    assert_eq!(for_j1, vec!["t-1", "t-3"]);

    assert_eq!(store.list_tasks(None).unwrap().len(), 3);
}

#[test]
fn tasks_with_status_restricts_to_given_set() {
    let clock = FakeClock::new();
    let store = MemoryStore::new();

    let queued = task("t-1", "j-1", &clock);
    let (running, _) = task("t-2", "j-1", &clock).transition(crate::task::TaskEvent::Start, &clock);

    store.put_task(&queued).unwrap();
    store.put_task(&running).unwrap();

    let running_only = store
        .tasks_with_status(&JobId::from("j-1"), &[TaskStatus::Running])
        .unwrap();
    assert_eq!(running_only.len(), 1);
    assert_eq!(running_only[0].id.0, "t-2");
}
