use super::*;
use drover_core::Job;

fn utc(s: &str) -> DateTime<Utc> {
    s.parse().unwrap()
}

fn scheduled_job(id: &str, interval: &str) -> Job {
    Job::new(id, id, "admin").with_schedule(Schedule::new(interval))
}

#[test]
fn arming_pushes_the_next_future_instant() {
    let mut timers = JobTimers::new();
    let job = scheduled_job("j", "R/2026-01-01T00:00:00Z/PT1H");

    timers.arm(&job, utc("2026-01-01T05:30:00Z")).unwrap();
    assert_eq!(timers.next_due(), Some(utc("2026-01-01T06:00:00Z")));
}

#[test]
fn schedule_less_job_is_never_armed() {
    let mut timers = JobTimers::new();
    timers
        .arm(&Job::new("j", "j", "admin"), utc("2026-01-01T00:00:00Z"))
        .unwrap();
    assert_eq!(timers.armed_count(), 0);
    assert!(timers.next_due().is_none());
}

#[test]
fn malformed_schedule_fails_arming() {
    let mut timers = JobTimers::new();
    let job = scheduled_job("j", "soon");
    assert!(timers.arm(&job, utc("2026-01-01T00:00:00Z")).is_err());
}

#[test]
fn poll_drains_due_entries_and_rearms() {
    let mut timers = JobTimers::new();
    let job = scheduled_job("j", "R/2026-01-01T00:00:00Z/PT1H");
    timers.arm(&job, utc("2025-12-31T00:00:00Z")).unwrap();

    let fired = timers.poll(utc("2026-01-01T00:00:00Z"));
    assert_eq!(fired.len(), 1);
    assert_eq!(fired[0].job_id, JobId::from("j"));
    assert!(!fired[0].run_now);
    assert!(fired[0].schedule.is_some());

    assert_eq!(timers.next_due(), Some(utc("2026-01-01T01:00:00Z")));
    assert!(timers.poll(utc("2026-01-01T00:30:00Z")).is_empty());
}

#[test]
fn jobs_due_at_the_same_instant_all_fire() {
    let mut timers = JobTimers::new();
    timers
        .arm(&scheduled_job("a", "R/2026-01-01T00:00:00Z/PT1H"), utc("2025-12-31T00:00:00Z"))
        .unwrap();
    timers
        .arm(&scheduled_job("b", "R/2026-01-01T00:00:00Z/PT1H"), utc("2025-12-31T00:00:00Z"))
        .unwrap();

    // Equal fire instants fall back to epoch and id ordering in the heap
    let fired = timers.poll(utc("2026-01-01T00:00:00Z"));
    let mut ids: Vec<&str> = fired.iter().map(|s| s.job_id.0.as_str()).collect();
    ids.sort_unstable();
    assert_eq!(ids, vec!["a", "b"]);
}

#[test]
fn bounded_schedule_disarms_after_the_last_occurrence() {
    let mut timers = JobTimers::new();
    let job = scheduled_job("j", "R2/2026-01-01T00:00:00Z/PT1H");
    timers.arm(&job, utc("2025-12-31T00:00:00Z")).unwrap();

    assert_eq!(timers.poll(utc("2026-01-01T00:00:00Z")).len(), 1);
    assert_eq!(timers.poll(utc("2026-01-01T01:00:00Z")).len(), 1);
    assert_eq!(timers.armed_count(), 0);
    assert!(timers.next_due().is_none());
}

#[test]
fn late_poll_pushes_the_next_fire_past_the_min_delta() {
    let mut timers = JobTimers::new();
    let job = Job::new("j", "j", "admin").with_schedule(
        Schedule::new("R/2026-01-01T00:00:00Z/PT5S").with_min_delta("PT4S"),
    );
    timers.arm(&job, utc("2025-12-31T00:00:00Z")).unwrap();

    // Polled 3s late; the raw next instant (t+5s) is only 2s away from the
    // actual firing, so it is deferred to actual + 4s
    let fired = timers.poll(utc("2026-01-01T00:00:03Z"));
    assert_eq!(fired.len(), 1);
    assert_eq!(timers.next_due(), Some(utc("2026-01-01T00:00:07Z")));
}

#[test]
fn rearming_replaces_the_previous_schedule() {
    let mut timers = JobTimers::new();
    let job = scheduled_job("j", "R/2026-01-01T00:00:00Z/PT1H");
    timers.arm(&job, utc("2026-01-01T00:30:00Z")).unwrap();

    let updated = scheduled_job("j", "R/2026-01-01T00:00:00Z/PT10M");
    timers.arm(&updated, utc("2026-01-01T00:30:00Z")).unwrap();

    let fired = timers.poll(utc("2026-01-01T00:40:00Z"));
    assert_eq!(fired.len(), 1);
    assert_eq!(timers.armed_count(), 1);

    // The stale hourly entry surfaces at 01:00 and is skipped; the
    // 10-minute cadence catches up its two due occurrences (00:50, 01:00)
    let fired = timers.poll(utc("2026-01-01T01:00:00Z"));
    assert_eq!(fired.len(), 2);
    assert!(fired.iter().all(|s| s.job_id == JobId::from("j")));
}

#[test]
fn fully_elapsed_bounded_schedule_never_arms() {
    let mut timers = JobTimers::new();
    let job = scheduled_job("j", "R2/2026-01-01T00:00:00Z/PT1H");
    timers.arm(&job, utc("2026-06-01T00:00:00Z")).unwrap();
    assert_eq!(timers.armed_count(), 0);
}
