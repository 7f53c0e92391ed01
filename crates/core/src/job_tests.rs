use super::*;
use crate::action::Action;

#[test]
fn job_builder_defaults_are_quiet() {
    let job = Job::new("j-1", "Nightly archive", "admin");
    assert!(!job.inactive);
    assert!(!job.auto_start);
    assert_eq!(job.max_concurrency, 0);
    assert!(job.actions.is_empty());
}

#[test]
fn concurrency_limit_prefers_job_ceiling() {
    let job = Job::new("j-1", "archive", "admin").with_max_concurrency(3);
    assert_eq!(job.concurrency_limit(10), Some(3));
}

#[test]
fn concurrency_limit_falls_back_to_engine_default() {
    let job = Job::new("j-1", "archive", "admin");
    assert_eq!(job.concurrency_limit(10), Some(10));
}

#[test]
fn concurrency_limit_unbounded_when_both_zero() {
    let job = Job::new("j-1", "archive", "admin");
    assert_eq!(job.concurrency_limit(0), None);
}

#[test]
fn negative_ceiling_means_default() {
    let job = Job::new("j-1", "archive", "admin").with_max_concurrency(-1);
    assert_eq!(job.concurrency_limit(4), Some(4));
}

#[test]
fn listens_for_matches_exact_event_names() {
    let job = Job::new("j-1", "archive", "admin")
        .with_events(vec!["node:created".to_string(), "node:updated".to_string()]);
    assert!(job.listens_for("node:created"));
    assert!(!job.listens_for("node:deleted"));
}

#[test]
fn job_round_trips_through_serde() {
    let mut actions = ActionArena::new();
    let root = actions.push_root(Action::new("copy"));
    actions.chain(root, Action::new("notify"));

    let job = Job::new("j-1", "archive", "admin")
        .with_actions(actions)
        .with_max_concurrency(2)
        .silent_task_updates();

    let json = serde_json::to_string(&job).unwrap();
    let back: Job = serde_json::from_str(&json).unwrap();
    assert_eq!(back, job);
}
