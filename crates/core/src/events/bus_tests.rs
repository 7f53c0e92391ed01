use super::*;
use crate::events::subscription::Subscription;
use crate::job::JobId;
use crate::task::TaskId;

fn task_finished(id: &str) -> Event {
    Event::TaskFinished {
        id: TaskId::from(id),
        job_id: JobId::from("j-1"),
    }
}

#[test]
fn delivers_only_to_matching_subscribers() {
    let bus = EventBus::new();
    let mut tasks = bus.subscribe(Subscription::on("tasks", "task:**"));
    let mut jobs = bus.subscribe(Subscription::on("jobs", "job:*"));

    bus.publish(task_finished("t-1"));

    assert!(matches!(
        tasks.try_recv(),
        Ok(Event::TaskFinished { .. })
    ));
    assert!(jobs.try_recv().is_err());
}

#[test]
fn unsubscribe_stops_delivery() {
    let bus = EventBus::new();
    let mut rx = bus.subscribe(Subscription::on("tasks", "task:**"));
    bus.unsubscribe(&SubscriberId("tasks".to_string()));

    bus.publish(task_finished("t-1"));
    assert!(rx.try_recv().is_err());
    assert_eq!(bus.subscriber_count(), 0);
}

#[test]
fn resubscribing_with_same_id_replaces_the_old_channel() {
    let bus = EventBus::new();
    let mut old = bus.subscribe(Subscription::on("w", "task:**"));
    let mut new = bus.subscribe(Subscription::on("w", "task:**"));

    bus.publish(task_finished("t-1"));

    assert!(new.try_recv().is_ok());
    assert!(matches!(
        old.try_recv(),
        Err(tokio::sync::mpsc::error::TryRecvError::Disconnected)
    ));
    assert_eq!(bus.subscriber_count(), 1);
}

#[test]
fn dropped_receivers_are_pruned_on_publish() {
    let bus = EventBus::new();
    let rx = bus.subscribe(Subscription::on("gone", "task:**"));
    drop(rx);

    bus.publish(task_finished("t-1"));
    assert_eq!(bus.subscriber_count(), 0);
}

#[test]
fn clones_share_the_subscriber_table() {
    let bus = EventBus::new();
    let other = bus.clone();
    let mut rx = bus.subscribe(Subscription::on("w", "**"));

    other.publish(task_finished("t-1"));
    assert!(rx.try_recv().is_ok());
}
