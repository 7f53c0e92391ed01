use super::*;

#[test]
fn fake_clock_advances_both_domains() {
    let clock = FakeClock::new();
    let i0 = clock.now();
    let u0 = clock.now_utc();

    clock.advance(Duration::from_secs(90));

    assert_eq!(clock.now() - i0, Duration::from_secs(90));
    assert_eq!(clock.now_utc() - u0, chrono::Duration::seconds(90));
}

#[test]
fn fake_clock_clones_share_time() {
    let a = FakeClock::new();
    let b = a.clone();

    a.advance(Duration::from_secs(5));
    assert_eq!(a.now(), b.now());
}

#[test]
fn fake_clock_at_pins_wall_clock() {
    let start = "2026-03-01T12:00:00Z"
        .parse::<DateTime<Utc>>()
        .unwrap();
    let clock = FakeClock::at(start);
    assert_eq!(clock.now_utc(), start);

    clock.advance(Duration::from_secs(60));
    assert_eq!(clock.now_utc(), start + chrono::Duration::seconds(60));
}

#[test]
fn system_clock_is_monotonic() {
    let clock = SystemClock;
    let a = clock.now();
    let b = clock.now();
    assert!(b >= a);
}
