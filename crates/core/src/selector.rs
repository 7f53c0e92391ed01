// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Target selectors and the entities they resolve to
//!
//! An action operates on a resolved set of filesystem-like nodes or users.
//! A selector picks "all", an explicit preset, or an opaque query; the
//! filter variants narrow entities already carried by the triggering event
//! instead of scanning the catalog. The query grammar itself is opaque to
//! this crate - evaluation is an injected collaborator.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A filesystem-like node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub uuid: String,
    pub path: String,
    #[serde(default)]
    pub meta: HashMap<String, String>,
}

impl Node {
    pub fn new(path: impl Into<String>) -> Self {
        let path = path.into();
        Self {
            uuid: path.clone(),
            path,
            meta: HashMap::new(),
        }
    }
}

/// A user known to the system
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub uuid: String,
    pub login: String,
    #[serde(default)]
    pub attributes: HashMap<String, String>,
}

impl User {
    pub fn new(login: impl Into<String>) -> Self {
        let login = login.into();
        Self {
            uuid: login.clone(),
            login,
            attributes: HashMap::new(),
        }
    }
}

/// A resolved target entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Entity {
    Node(Node),
    User(User),
}

impl Entity {
    /// Stable identity for logging and ordering checks
    pub fn ident(&self) -> &str {
        match self {
            Entity::Node(n) => &n.path,
            Entity::User(u) => &u.login,
        }
    }
}

/// Selects nodes from the catalog or an explicit preset
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodesSelector {
    /// Match the whole catalog, ignoring every other field
    pub all: bool,
    /// Explicit preset, returned verbatim in the given order
    pub paths: Vec<String>,
    /// Opaque query for the injected evaluator
    pub query: Option<String>,
    /// Deliver the whole resolved set in one invocation
    pub collect: bool,
}

/// Selects users from the catalog or an explicit preset
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UsersSelector {
    pub all: bool,
    pub logins: Vec<String>,
    pub query: Option<String>,
    pub collect: bool,
}

/// Filters entities carried by the triggering event against a query
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceFilter {
    pub query: String,
    #[serde(default)]
    pub collect: bool,
}

/// What an action resolves its targets against.
///
/// One variant per resolution target: an action never mixes node and user
/// resolution in a single execution, so "both set" is unrepresentable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TargetSelector {
    Nodes(NodesSelector),
    Users(UsersSelector),
    /// Filter the event's nodes instead of scanning the catalog
    NodesFilter(SourceFilter),
    /// Filter the event's users instead of scanning the catalog
    UsersFilter(SourceFilter),
}

impl TargetSelector {
    /// Whether resolution delivers one batch instead of fanning out
    pub fn collect(&self) -> bool {
        match self {
            TargetSelector::Nodes(s) => s.collect,
            TargetSelector::Users(s) => s.collect,
            TargetSelector::NodesFilter(f) | TargetSelector::UsersFilter(f) => f.collect,
        }
    }
}

#[cfg(test)]
#[path = "selector_tests.rs"]
mod tests;
