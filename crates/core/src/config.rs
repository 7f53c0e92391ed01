// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! TOML job definitions
//!
//! Parsing is syntactic only; validation turns raw definitions into [`Job`]
//! values and rejects what the engine could not execute. A malformed
//! schedule fails the whole file, not just the one job, so an operator sees
//! the problem at load time instead of at the missed firing.

use crate::action::{Action, ActionArena, ActionIdx};
use crate::job::{Job, JobId};
use crate::schedule::{Schedule, ScheduleError};
use crate::selector::{NodesSelector, SourceFilter, TargetSelector, UsersSelector};
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("TOML syntax error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("IO error reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("job {job:?}: {source}")]
    Schedule {
        job: String,
        #[source]
        source: ScheduleError,
    },
    #[error("job {job:?} has no owner")]
    MissingOwner { job: String },
    #[error("job {job:?}, action {action:?}: more than one selector")]
    SelectorConflict { job: String, action: String },
    #[error("job {job:?} has an action with an empty handler")]
    EmptyHandler { job: String },
}

/// Raw file as deserialized, before validation
#[derive(Debug, Default, Deserialize)]
pub struct RawConfig {
    #[serde(default)]
    pub job: BTreeMap<String, RawJob>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawJob {
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub owner: Option<String>,
    #[serde(default)]
    pub inactive: bool,
    #[serde(default)]
    pub events: Vec<String>,
    #[serde(default)]
    pub schedule: Option<RawSchedule>,
    #[serde(default)]
    pub auto_start: bool,
    #[serde(default)]
    pub auto_clean: bool,
    #[serde(default)]
    pub max_concurrency: i32,
    #[serde(default)]
    pub tasks_silent_update: bool,
    #[serde(default)]
    pub action: Vec<RawAction>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawSchedule {
    pub interval: String,
    #[serde(default)]
    pub min_delta: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawAction {
    pub handler: String,
    #[serde(default)]
    pub params: HashMap<String, String>,
    #[serde(default)]
    pub continue_on_failure: bool,
    #[serde(default)]
    pub nodes: Option<NodesSelector>,
    #[serde(default)]
    pub users: Option<UsersSelector>,
    #[serde(default)]
    pub nodes_filter: Option<SourceFilter>,
    #[serde(default)]
    pub users_filter: Option<SourceFilter>,
    /// Successors, run with this action's output
    #[serde(default)]
    pub next: Vec<RawAction>,
}

/// Parse TOML content without validating it
pub fn parse_config(content: &str) -> Result<RawConfig, ConfigError> {
    Ok(toml::from_str(content)?)
}

/// Parse and validate a job definition file
pub fn load_config(path: &Path) -> Result<Vec<Job>, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
        path: path.display().to_string(),
        source: e,
    })?;
    jobs_from_toml(&content)
}

/// Parse and validate TOML content into job definitions
pub fn jobs_from_toml(content: &str) -> Result<Vec<Job>, ConfigError> {
    let raw = parse_config(content)?;
    raw.job
        .into_iter()
        .map(|(name, raw_job)| validate_job(&name, raw_job))
        .collect()
}

fn validate_job(name: &str, raw: RawJob) -> Result<Job, ConfigError> {
    let owner = raw.owner.ok_or_else(|| ConfigError::MissingOwner {
        job: name.to_string(),
    })?;

    let schedule = match raw.schedule {
        Some(s) => {
            let schedule = Schedule {
                iso8601: s.interval,
                min_delta: s.min_delta,
            };
            // Fail fast on schedules that would never fire
            schedule.parse().map_err(|e| ConfigError::Schedule {
                job: name.to_string(),
                source: e,
            })?;
            Some(schedule)
        }
        None => None,
    };

    let mut actions = ActionArena::new();
    for raw_action in raw.action {
        push_action(name, &mut actions, None, raw_action)?;
    }

    let mut job = Job::new(
        JobId::from(name),
        raw.label.unwrap_or_else(|| name.to_string()),
        owner,
    )
    .with_events(raw.events)
    .with_actions(actions)
    .with_max_concurrency(raw.max_concurrency);
    job.inactive = raw.inactive;
    job.auto_start = raw.auto_start;
    job.auto_clean = raw.auto_clean;
    job.tasks_silent_update = raw.tasks_silent_update;
    job.schedule = schedule;
    Ok(job)
}

fn push_action(
    job: &str,
    arena: &mut ActionArena,
    parent: Option<ActionIdx>,
    raw: RawAction,
) -> Result<(), ConfigError> {
    if raw.handler.is_empty() {
        return Err(ConfigError::EmptyHandler {
            job: job.to_string(),
        });
    }

    let handler = raw.handler.clone();
    let selector = action_selector(job, &handler, &raw)?;
    let mut action = Action::new(raw.handler);
    action.params = raw.params;
    action.continue_on_failure = raw.continue_on_failure;
    action.selector = selector;

    let idx = match parent {
        Some(p) => arena.chain(p, action),
        None => arena.push_root(action),
    };
    for child in raw.next {
        push_action(job, arena, Some(idx), child)?;
    }
    Ok(())
}

fn action_selector(
    job: &str,
    handler: &str,
    raw: &RawAction,
) -> Result<Option<TargetSelector>, ConfigError> {
    let set = usize::from(raw.nodes.is_some())
        + usize::from(raw.users.is_some())
        + usize::from(raw.nodes_filter.is_some())
        + usize::from(raw.users_filter.is_some());
    if set > 1 {
        return Err(ConfigError::SelectorConflict {
            job: job.to_string(),
            action: handler.to_string(),
        });
    }

    Ok(if let Some(s) = raw.nodes.clone() {
        Some(TargetSelector::Nodes(s))
    } else if let Some(s) = raw.users.clone() {
        Some(TargetSelector::Users(s))
    } else if let Some(f) = raw.nodes_filter.clone() {
        Some(TargetSelector::NodesFilter(f))
    } else {
        raw.users_filter.clone().map(TargetSelector::UsersFilter)
    })
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
