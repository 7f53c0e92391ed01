use super::*;
use proptest::prelude::*;
use yare::parameterized;

fn utc(s: &str) -> DateTime<Utc> {
    s.parse().unwrap()
}

#[parameterized(
    seconds = { "PT5S", 5 },
    minutes = { "PT15M", 900 },
    hours_minutes = { "PT1H30M", 5400 },
    days = { "P1D", 86_400 },
    weeks = { "P2W", 1_209_600 },
    mixed = { "P1DT12H", 129_600 },
)]
fn iso_durations_parse(input: &str, expect_secs: u64) {
    assert_eq!(
        parse_iso_duration(input).unwrap(),
        Duration::from_secs(expect_secs)
    );
}

#[test]
fn iso_duration_fractional_seconds() {
    assert_eq!(
        parse_iso_duration("PT0.5S").unwrap(),
        Duration::from_millis(500)
    );
}

#[parameterized(
    no_p = { "T5S" },
    empty = { "P" },
    bare_t = { "PT" },
    calendar_year = { "P1Y" },
    calendar_month = { "P2M" },
    trailing = { "PT5" },
    not_a_number = { "PT.S" },
    minutes_outside_time = { "PT5H3D" },
)]
fn iso_duration_rejects_malformed(input: &str) {
    assert!(parse_iso_duration(input).is_err());
}

#[test]
fn schedule_parses_bounded_interval() {
    let schedule = Schedule::new("R3/2026-01-01T00:00:00Z/PT5S").with_min_delta("PT2S");
    let parsed = schedule.parse().unwrap();

    assert_eq!(parsed.repeat, Some(3));
    assert_eq!(parsed.start, utc("2026-01-01T00:00:00Z"));
    assert_eq!(parsed.period, Duration::from_secs(5));
    assert_eq!(parsed.min_delta, Duration::from_secs(2));
}

#[parameterized(
    bare_r = { "R/2026-01-01T00:00:00Z/PT1H" },
    r_zero = { "R0/2026-01-01T00:00:00Z/PT1H" },
)]
fn repeat_zero_or_absent_means_unbounded(input: &str) {
    let parsed = Schedule::new(input).parse().unwrap();
    assert_eq!(parsed.repeat, None);
}

#[parameterized(
    two_parts = { "R3/PT5S" },
    no_r = { "3/2026-01-01T00:00:00Z/PT5S" },
    bad_count = { "Rx/2026-01-01T00:00:00Z/PT5S" },
    bad_start = { "R3/yesterday/PT5S" },
    zero_period = { "R3/2026-01-01T00:00:00Z/PT0S" },
)]
fn malformed_schedules_fail_fast(input: &str) {
    assert!(Schedule::new(input).parse().is_err());
}

#[test]
fn bounded_schedule_emits_exactly_n_instants() {
    let parsed = Schedule::new("R3/2026-01-01T00:00:00Z/PT5S")
        .with_min_delta("PT2S")
        .parse()
        .unwrap();

    let fires: Vec<_> = parsed.fire_times().collect();
    assert_eq!(
        fires,
        vec![
            utc("2026-01-01T00:00:00Z"),
            utc("2026-01-01T00:00:05Z"),
            utc("2026-01-01T00:00:10Z"),
        ]
    );
}

#[test]
fn unbounded_schedule_keeps_producing() {
    let parsed = Schedule::new("R/2026-01-01T00:00:00Z/PT1H").parse().unwrap();
    let fires: Vec<_> = parsed.fire_times().take(100).collect();
    assert_eq!(fires.len(), 100);
    assert_eq!(fires[99], utc("2026-01-05T03:00:00Z"));
}

#[test]
fn min_delta_throttles_a_tight_period() {
    // Period says every second; min delta stretches to 2s
    let parsed = Schedule::new("R4/2026-01-01T00:00:00Z/PT1S")
        .with_min_delta("PT2S")
        .parse()
        .unwrap();

    let fires: Vec<_> = parsed.fire_times().collect();
    assert_eq!(
        fires,
        vec![
            utc("2026-01-01T00:00:00Z"),
            utc("2026-01-01T00:00:02Z"),
            utc("2026-01-01T00:00:04Z"),
            utc("2026-01-01T00:00:06Z"),
        ]
    );
}

#[test]
fn min_delta_measures_from_actual_firing() {
    let parsed = Schedule::new("R3/2026-01-01T00:00:00Z/PT5S")
        .with_min_delta("PT2S")
        .parse()
        .unwrap();

    let mut times = parsed.fire_times();
    let first = times.next().unwrap();
    assert_eq!(first, utc("2026-01-01T00:00:00Z"));

    // Engine actually fired 4s late; the next raw instant (t+5s) would be
    // only 1s after that, so it is pushed to actual + 2s
    times.record_fired(utc("2026-01-01T00:00:04Z"));
    let second = times.next().unwrap();
    assert_eq!(second, utc("2026-01-01T00:00:06Z"));

    // Third instant follows the raw plan again
    let third = times.next().unwrap();
    assert_eq!(third, utc("2026-01-01T00:00:10Z"));
    assert!(times.next().is_none());
}

#[test]
fn fire_times_after_consumes_past_occurrences() {
    let parsed = Schedule::new("R3/2026-01-01T00:00:00Z/PT5S").parse().unwrap();

    let fires: Vec<_> = parsed
        .fire_times_after(utc("2026-01-01T00:00:05Z"))
        .collect();
    assert_eq!(fires, vec![utc("2026-01-01T00:00:10Z")]);
}

#[test]
fn fire_times_after_the_whole_window_is_empty() {
    let parsed = Schedule::new("R2/2026-01-01T00:00:00Z/PT5S").parse().unwrap();
    let mut times = parsed.fire_times_after(utc("2026-02-01T00:00:00Z"));
    assert!(times.next().is_none());
}

proptest! {
    /// Consecutive fire times never come closer together than the min delta
    #[test]
    fn consecutive_fires_respect_min_delta(
        period_secs in 1u64..120,
        delta_secs in 0u64..240,
        count in 1u64..50,
    ) {
        let schedule = Schedule::new(
            format!("R{}/2026-01-01T00:00:00Z/PT{}S", count, period_secs),
        )
        .with_min_delta(format!("PT{}S", delta_secs));
        let parsed = schedule.parse().unwrap();

        let fires: Vec<_> = parsed.fire_times().collect();
        prop_assert_eq!(fires.len() as u64, count);
        for pair in fires.windows(2) {
            let gap = pair[1] - pair[0];
            prop_assert!(gap >= chrono::Duration::seconds(delta_secs as i64));
        }
    }
}
