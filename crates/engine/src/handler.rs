// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pluggable action handlers
//!
//! A handler is the operation behind an action id. Handlers report failure
//! through [`ActionOutput::failure`]; the executor records it into the task
//! instead of propagating it as an error.

use async_trait::async_trait;
use drover_core::{Action, ActionMessage, ActionOutput};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// The operation invoked for an action.
///
/// The message carries the entities resolution narrowed to this invocation
/// plus the branch's output chain so far.
#[async_trait]
pub trait ActionHandler: Send + Sync {
    async fn invoke(&self, action: &Action, message: &ActionMessage) -> ActionOutput;
}

/// Handlers keyed by action id
#[derive(Default, Clone)]
pub struct HandlerRegistry {
    handlers: HashMap<String, Arc<dyn ActionHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, id: impl Into<String>, handler: Arc<dyn ActionHandler>) {
        self.handlers.insert(id.into(), handler);
    }

    pub fn get(&self, id: &str) -> Option<Arc<dyn ActionHandler>> {
        self.handlers.get(id).cloned()
    }
}

/// One observed invocation, for assertions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    pub action_id: String,
    /// Idents of the entities in scope, in order
    pub scope: Vec<String>,
}

/// Records every invocation and replies with a fixed output
pub struct RecordingHandler {
    pub calls: Arc<Mutex<Vec<RecordedCall>>>,
    reply: ActionOutput,
}

impl RecordingHandler {
    pub fn new() -> Self {
        Self {
            calls: Arc::new(Mutex::new(Vec::new())),
            reply: ActionOutput::text("ok"),
        }
    }

    pub fn replying(reply: ActionOutput) -> Self {
        Self {
            calls: Arc::new(Mutex::new(Vec::new())),
            reply,
        }
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl Default for RecordingHandler {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ActionHandler for RecordingHandler {
    async fn invoke(&self, action: &Action, message: &ActionMessage) -> ActionOutput {
        let scope = message
            .nodes
            .iter()
            .map(|n| n.path.clone())
            .chain(message.users.iter().map(|u| u.login.clone()))
            .collect();
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(RecordedCall {
                action_id: action.id.clone(),
                scope,
            });
        self.reply.clone()
    }
}

/// Always fails, for failure-path tests
pub struct FailingHandler;

#[async_trait]
impl ActionHandler for FailingHandler {
    async fn invoke(&self, action: &Action, _message: &ActionMessage) -> ActionOutput {
        ActionOutput::failure(format!("{} refused", action.id))
    }
}
