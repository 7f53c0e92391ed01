// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Action chains and the message threaded through them
//!
//! Actions form a forward-only tree: a node's children are the next actions
//! to run with its output, and multiple children fan out in parallel. The
//! tree is stored as an arena of nodes addressed by index, so traversal and
//! parallel dispatch never touch recursive ownership.

use crate::selector::{Node, TargetSelector, User};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Index of an action inside its arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActionIdx(pub usize);

/// A single unit of work within a job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Action {
    /// Handler key - which pluggable operation to invoke
    pub id: String,
    /// Optional target resolution for this action
    #[serde(default)]
    pub selector: Option<TargetSelector>,
    /// String parameters passed to the handler
    #[serde(default)]
    pub params: HashMap<String, String>,
    /// A failed invocation halts only itself, not the branch
    #[serde(default)]
    pub continue_on_failure: bool,
    /// Chained successors, run with this action's output
    #[serde(default)]
    pub children: Vec<ActionIdx>,
}

impl Action {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            selector: None,
            params: HashMap::new(),
            continue_on_failure: false,
            children: Vec::new(),
        }
    }

    pub fn with_selector(mut self, selector: TargetSelector) -> Self {
        self.selector = Some(selector);
        self
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    pub fn tolerant(mut self) -> Self {
        self.continue_on_failure = true;
        self
    }
}

/// Arena of action nodes for one job
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionArena {
    nodes: Vec<Action>,
    roots: Vec<ActionIdx>,
}

impl ActionArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a top-level action
    pub fn push_root(&mut self, action: Action) -> ActionIdx {
        let idx = self.push(action);
        self.roots.push(idx);
        idx
    }

    /// Add an action chained after `parent`
    pub fn chain(&mut self, parent: ActionIdx, action: Action) -> ActionIdx {
        let idx = self.push(action);
        if let Some(node) = self.nodes.get_mut(parent.0) {
            node.children.push(idx);
        }
        idx
    }

    fn push(&mut self, action: Action) -> ActionIdx {
        let idx = ActionIdx(self.nodes.len());
        self.nodes.push(action);
        idx
    }

    pub fn get(&self, idx: ActionIdx) -> Option<&Action> {
        self.nodes.get(idx.0)
    }

    pub fn roots(&self) -> &[ActionIdx] {
        &self.roots
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// How an action's result body is encoded
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutputBody {
    #[default]
    Empty,
    Raw(Vec<u8>),
    Text(String),
    Json(serde_json::Value),
}

/// A single action invocation's result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionOutput {
    pub success: bool,
    #[serde(default)]
    pub body: OutputBody,
    #[serde(default)]
    pub error: Option<String>,
    /// Action intentionally skipped - not a failure
    #[serde(default)]
    pub ignored: bool,
    #[serde(with = "humantime_serde", default)]
    pub elapsed: Duration,
}

impl ActionOutput {
    pub fn text(body: impl Into<String>) -> Self {
        Self {
            success: true,
            body: OutputBody::Text(body.into()),
            error: None,
            ignored: false,
            elapsed: Duration::ZERO,
        }
    }

    pub fn json(body: serde_json::Value) -> Self {
        Self {
            success: true,
            body: OutputBody::Json(body),
            error: None,
            ignored: false,
            elapsed: Duration::ZERO,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            body: OutputBody::Empty,
            error: Some(error.into()),
            ignored: false,
            elapsed: Duration::ZERO,
        }
    }

    /// Selector matched nothing - skipped, counts as completed
    pub fn ignored() -> Self {
        Self {
            success: true,
            body: OutputBody::Empty,
            error: None,
            ignored: true,
            elapsed: Duration::ZERO,
        }
    }

    pub fn with_elapsed(mut self, elapsed: Duration) -> Self {
        self.elapsed = elapsed;
        self
    }
}

/// The value threaded through a chain of actions.
///
/// The output chain is append-only: every output produced so far stays
/// visible to downstream actions. Parallel branches each derive their own
/// copy - no branch mutates a message another branch can see.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionMessage {
    /// Originating event payload, if the task was event-triggered
    #[serde(default)]
    pub event: Option<serde_json::Value>,
    /// Nodes currently in scope
    #[serde(default)]
    pub nodes: Vec<Node>,
    /// Users currently in scope
    #[serde(default)]
    pub users: Vec<User>,
    /// Every output produced so far, in execution order for this branch
    #[serde(default)]
    pub output_chain: Vec<ActionOutput>,
}

impl ActionMessage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_event(mut self, event: serde_json::Value) -> Self {
        self.event = Some(event);
        self
    }

    pub fn with_nodes(mut self, nodes: Vec<Node>) -> Self {
        self.nodes = nodes;
        self
    }

    pub fn with_users(mut self, users: Vec<User>) -> Self {
        self.users = users;
        self
    }

    /// Derive the message a successor receives: same scope, output appended
    pub fn with_output(&self, output: ActionOutput) -> Self {
        let mut next = self.clone();
        next.output_chain.push(output);
        next
    }

    pub fn last_output(&self) -> Option<&ActionOutput> {
        self.output_chain.last()
    }
}

/// One executed action's record inside a task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionLog {
    pub action_id: String,
    pub input: ActionMessage,
    pub output: ActionMessage,
}

#[cfg(test)]
#[path = "action_tests.rs"]
mod tests;
