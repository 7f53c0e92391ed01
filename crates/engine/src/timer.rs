// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scheduled job timers
//!
//! A binary heap of next fire instants, one per armed job. `poll` drains
//! due entries into trigger signals and re-arms each job from its fire
//! time iterator, reporting the actual poll instant so the minimum delta
//! throttles against reality when the caller lagged.

use chrono::{DateTime, Utc};
use drover_core::{FireTimes, Job, JobId, JobTriggerSignal, Schedule, ScheduleError};
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};

struct ArmedJob {
    times: FireTimes,
    schedule: Schedule,
    /// Bumped on every re-arm so stale heap entries are skippable
    epoch: u64,
}

/// Timer heap for every scheduled job
#[derive(Default)]
pub struct JobTimers {
    heap: BinaryHeap<Reverse<(DateTime<Utc>, u64, JobId)>>,
    armed: HashMap<JobId, ArmedJob>,
    next_epoch: u64,
}

impl JobTimers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm a job's schedule, replacing any previous arming.
    ///
    /// Occurrences already in the past are consumed, budget included; a
    /// schedule with nothing left simply never fires.
    pub fn arm(&mut self, job: &Job, now: DateTime<Utc>) -> Result<(), ScheduleError> {
        let Some(schedule) = &job.schedule else {
            self.disarm(&job.id);
            return Ok(());
        };
        let parsed = schedule.parse()?;
        let mut times = parsed.fire_times_after(now);
        self.disarm(&job.id);
        if let Some(next) = times.next() {
            self.next_epoch += 1;
            let epoch = self.next_epoch;
            self.heap.push(Reverse((next, epoch, job.id.clone())));
            self.armed.insert(
                job.id.clone(),
                ArmedJob {
                    times,
                    schedule: schedule.clone(),
                    epoch,
                },
            );
        }
        Ok(())
    }

    pub fn disarm(&mut self, id: &JobId) {
        self.armed.remove(id);
    }

    /// Next instant anything is due, for sleep calculations
    pub fn next_due(&self) -> Option<DateTime<Utc>> {
        self.heap.peek().map(|Reverse((at, _, _))| *at)
    }

    pub fn armed_count(&self) -> usize {
        self.armed.len()
    }

    /// Drain every due entry into trigger signals and re-arm
    pub fn poll(&mut self, now: DateTime<Utc>) -> Vec<JobTriggerSignal> {
        let mut fired = Vec::new();
        while let Some(Reverse((at, _, _))) = self.heap.peek() {
            if *at > now {
                break;
            }
            let Some(Reverse((_, epoch, job_id))) = self.heap.pop() else {
                break;
            };
            // Disarmed or re-armed entries linger in the heap until they
            // surface here
            let Some(entry) = self.armed.get_mut(&job_id) else {
                continue;
            };
            if entry.epoch != epoch {
                continue;
            }
            entry.times.record_fired(now);
            fired.push(JobTriggerSignal {
                job_id: job_id.clone(),
                schedule: Some(entry.schedule.clone()),
                run_now: false,
            });
            match entry.times.next() {
                Some(next) => self.heap.push(Reverse((next, epoch, job_id))),
                None => {
                    self.armed.remove(&job_id);
                }
            }
        }
        fired
    }
}

#[cfg(test)]
#[path = "timer_tests.rs"]
mod tests;
