// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Action chain execution
//!
//! Depth-first per branch, breadth-parallel across chained siblings. Each
//! invocation appends an [`ActionLog`] through the update channel; an
//! unhandled failure halts only its own branch while already-dispatched
//! siblings run to completion. Pause and stop are cooperative, checked
//! between invocations; a handler result that lands after a stop is still
//! logged but never chained.

use crate::handler::HandlerRegistry;
use crate::resolver::Resolver;
use drover_core::{
    Action, ActionArena, ActionIdx, ActionLog, ActionMessage, ActionOutput, Clock, Entity,
};
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinSet;

/// Cooperative control signal for a running chain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunSignal {
    Run,
    Pause,
    Stop,
}

/// Shared invocation counters; the denominator grows as selectors resolve
#[derive(Debug, Default)]
pub struct Progress {
    completed: AtomicUsize,
    planned: AtomicUsize,
}

impl Progress {
    pub fn plan(&self, n: usize) {
        self.planned.fetch_add(n, Ordering::Relaxed);
    }

    pub fn complete_one(&self) {
        self.completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn ratio(&self) -> f32 {
        let planned = self.planned.load(Ordering::Relaxed);
        if planned == 0 {
            return 0.0;
        }
        let completed = self.completed.load(Ordering::Relaxed);
        (completed as f32 / planned as f32).clamp(0.0, 1.0)
    }
}

/// Executor-to-supervisor updates for one task
#[derive(Debug, Clone)]
pub enum ExecUpdate {
    Log(ActionLog),
    Progress(f32),
}

/// How a chain (or one branch of it) ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainStatus {
    Completed,
    /// At least one branch hit an unhandled failure
    Failed,
    /// A stop signal was observed before the chain finished
    Stopped,
}

impl ChainStatus {
    fn merge(self, other: ChainStatus) -> ChainStatus {
        match (self, other) {
            (ChainStatus::Failed, _) | (_, ChainStatus::Failed) => ChainStatus::Failed,
            (ChainStatus::Stopped, _) | (_, ChainStatus::Stopped) => ChainStatus::Stopped,
            _ => ChainStatus::Completed,
        }
    }
}

/// What selector resolution decided for one action node
enum Resolution {
    /// One scoped message per planned invocation
    Invocations(Vec<ActionMessage>),
    /// Nothing matched; the message children receive, ignored output appended
    Skipped(ActionMessage),
    /// The query itself was unusable
    Failed,
}

/// Per-task execution context handed to every branch
#[derive(Clone)]
pub struct ExecContext {
    pub signal: watch::Receiver<RunSignal>,
    pub progress: Arc<Progress>,
    pub updates: mpsc::UnboundedSender<ExecUpdate>,
}

impl ExecContext {
    fn log(&self, log: ActionLog) {
        let _ = self.updates.send(ExecUpdate::Log(log));
    }

    fn completed_one(&self) {
        self.progress.complete_one();
        let _ = self.updates.send(ExecUpdate::Progress(self.progress.ratio()));
    }

    fn stop_requested(&self) -> bool {
        *self.signal.borrow() == RunSignal::Stop
    }
}

struct Inner<C: Clock> {
    resolver: Resolver,
    handlers: HandlerRegistry,
    clock: C,
}

/// Runs a job's action arena for one task
pub struct ChainExecutor<C: Clock> {
    inner: Arc<Inner<C>>,
}

impl<C: Clock> Clone for ChainExecutor<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

type BranchFuture = Pin<Box<dyn Future<Output = ChainStatus> + Send>>;

impl<C: Clock + 'static> ChainExecutor<C> {
    pub fn new(resolver: Resolver, handlers: HandlerRegistry, clock: C) -> Self {
        Self {
            inner: Arc::new(Inner {
                resolver,
                handlers,
                clock,
            }),
        }
    }

    /// Run every root in order, fanning out below each one
    pub async fn execute(
        &self,
        arena: Arc<ActionArena>,
        message: ActionMessage,
        ctx: ExecContext,
    ) -> ChainStatus {
        let mut status = ChainStatus::Completed;
        for &root in arena.roots() {
            let branch = self
                .run_node(Arc::clone(&arena), root, message.clone(), ctx.clone())
                .await;
            status = status.merge(branch);
            if status == ChainStatus::Stopped {
                break;
            }
        }
        status
    }

    fn run_node(
        &self,
        arena: Arc<ActionArena>,
        idx: ActionIdx,
        message: ActionMessage,
        ctx: ExecContext,
    ) -> BranchFuture {
        let this = self.clone();
        Box::pin(async move {
            let mut signal = ctx.signal.clone();
            if wait_for_run(&mut signal).await == RunSignal::Stop {
                return ChainStatus::Stopped;
            }

            let Some(action) = arena.get(idx).cloned() else {
                return ChainStatus::Completed;
            };

            let invocations = match this.invocations_for(&action, &message, &ctx) {
                Resolution::Invocations(invocations) => invocations,
                // Skipped counts as completed; children still run with the
                // ignored output in their chain
                Resolution::Skipped(next_message) => {
                    return this.descend(arena, &action.children, next_message, ctx).await;
                }
                Resolution::Failed => return ChainStatus::Failed,
            };

            if invocations.len() == 1 {
                let Some(scoped) = invocations.into_iter().next() else {
                    return ChainStatus::Completed;
                };
                return this.invoke_and_descend(arena, action, scoped, ctx).await;
            }

            let mut branches: JoinSet<ChainStatus> = JoinSet::new();
            for scoped in invocations {
                let this = this.clone();
                let arena = Arc::clone(&arena);
                let action = action.clone();
                let ctx = ctx.clone();
                branches
                    .spawn(async move { this.invoke_and_descend(arena, action, scoped, ctx).await });
            }

            let mut status = ChainStatus::Completed;
            while let Some(joined) = branches.join_next().await {
                status = status.merge(joined.unwrap_or(ChainStatus::Failed));
            }
            status
        })
    }

    /// Resolve the action's selector into per-invocation messages
    fn invocations_for(
        &self,
        action: &Action,
        message: &ActionMessage,
        ctx: &ExecContext,
    ) -> Resolution {
        let Some(selector) = &action.selector else {
            ctx.progress.plan(1);
            return Resolution::Invocations(vec![message.clone()]);
        };

        let resolved = match self.inner.resolver.resolve(selector, message) {
            Ok(resolved) => resolved,
            Err(e) => {
                ctx.progress.plan(1);
                ctx.completed_one();
                let output = ActionOutput::failure(e.to_string());
                ctx.log(ActionLog {
                    action_id: action.id.clone(),
                    input: message.clone(),
                    output: message.with_output(output),
                });
                return Resolution::Failed;
            }
        };

        if resolved.is_empty() {
            tracing::debug!(action = %action.id, "selector matched nothing, skipping");
            ctx.progress.plan(1);
            ctx.completed_one();
            let next_message = message.with_output(ActionOutput::ignored());
            ctx.log(ActionLog {
                action_id: action.id.clone(),
                input: message.clone(),
                output: next_message.clone(),
            });
            return Resolution::Skipped(next_message);
        }

        if resolved.collect {
            ctx.progress.plan(1);
            Resolution::Invocations(vec![scoped(message, &resolved.entities)])
        } else {
            ctx.progress.plan(resolved.entities.len());
            Resolution::Invocations(
                resolved
                    .entities
                    .iter()
                    .map(|e| scoped(message, std::slice::from_ref(e)))
                    .collect(),
            )
        }
    }

    async fn invoke_and_descend(
        &self,
        arena: Arc<ActionArena>,
        action: Action,
        message: ActionMessage,
        ctx: ExecContext,
    ) -> ChainStatus {
        let started = self.inner.clock.now();
        let output = match self.inner.handlers.get(&action.id) {
            Some(handler) => handler.invoke(&action, &message).await,
            None => ActionOutput::failure(format!("no handler registered for {:?}", action.id)),
        };
        let output = output.with_elapsed(self.inner.clock.now().duration_since(started));
        ctx.completed_one();

        let next_message = message.with_output(output.clone());
        ctx.log(ActionLog {
            action_id: action.id.clone(),
            input: message,
            output: next_message.clone(),
        });

        // A result landing after a stop is logged but never chained
        if ctx.stop_requested() {
            return ChainStatus::Stopped;
        }

        if !output.success && !action.continue_on_failure {
            tracing::debug!(action = %action.id, error = ?output.error, "branch halted");
            return ChainStatus::Failed;
        }

        self.descend(arena, &action.children, next_message, ctx).await
    }

    async fn descend(
        &self,
        arena: Arc<ActionArena>,
        children: &[ActionIdx],
        message: ActionMessage,
        ctx: ExecContext,
    ) -> ChainStatus {
        match children {
            [] => ChainStatus::Completed,
            [only] => {
                self.run_node(arena, *only, message, ctx).await
            }
            many => {
                let mut branches: JoinSet<ChainStatus> = JoinSet::new();
                for &child in many {
                    let this = self.clone();
                    let arena = Arc::clone(&arena);
                    let message = message.clone();
                    let ctx = ctx.clone();
                    branches.spawn(async move { this.run_node(arena, child, message, ctx).await });
                }
                let mut status = ChainStatus::Completed;
                while let Some(joined) = branches.join_next().await {
                    status = status.merge(joined.unwrap_or(ChainStatus::Failed));
                }
                status
            }
        }
    }
}

/// Narrow the message's scope to the given entities
fn scoped(message: &ActionMessage, entities: &[Entity]) -> ActionMessage {
    let mut nodes = Vec::new();
    let mut users = Vec::new();
    for entity in entities {
        match entity {
            Entity::Node(n) => nodes.push(n.clone()),
            Entity::User(u) => users.push(u.clone()),
        }
    }
    let mut next = message.clone();
    next.nodes = nodes;
    next.users = users;
    next
}

/// Block while paused; resolve to Run or Stop
async fn wait_for_run(signal: &mut watch::Receiver<RunSignal>) -> RunSignal {
    loop {
        let current = *signal.borrow_and_update();
        match current {
            RunSignal::Run => return RunSignal::Run,
            RunSignal::Stop => return RunSignal::Stop,
            RunSignal::Pause => {
                // Sender dropped while paused means the task is going away
                if signal.changed().await.is_err() {
                    return RunSignal::Stop;
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "executor_tests.rs"]
mod tests;
