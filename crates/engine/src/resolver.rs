// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Target resolution
//!
//! Turns a selector into the ordered set of entities an action operates
//! on. Catalog access and query evaluation are injected; the engine never
//! interprets the query grammar itself. Resolution is read-only, so
//! resolving the same selector against an unchanged catalog is idempotent
//! and order-stable.

use drover_core::{ActionMessage, Entity, Node, TargetSelector, User};
use std::sync::Arc;
use thiserror::Error;

/// A query the evaluator could not process
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("query {query:?}: {reason}")]
pub struct QueryError {
    pub query: String,
    pub reason: String,
}

/// Read access to the node and user catalogs
pub trait Catalog: Send + Sync {
    /// All nodes, in catalog order
    fn nodes(&self) -> Vec<Node>;
    /// Nodes for an explicit preset, in the preset's order; unknown paths
    /// are skipped
    fn nodes_by_path(&self, paths: &[String]) -> Vec<Node>;
    fn users(&self) -> Vec<User>;
    fn users_by_login(&self, logins: &[String]) -> Vec<User>;
}

/// Evaluates opaque queries against the catalog or single entities
pub trait QueryEvaluator: Send + Sync {
    fn nodes_matching(&self, query: &str) -> Result<Vec<Node>, QueryError>;
    fn users_matching(&self, query: &str) -> Result<Vec<User>, QueryError>;
    fn node_matches(&self, query: &str, node: &Node) -> Result<bool, QueryError>;
    fn user_matches(&self, query: &str, user: &User) -> Result<bool, QueryError>;
}

/// The outcome of resolving one selector
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    /// Ordered entities the action operates on
    pub entities: Vec<Entity>,
    /// Deliver the whole set in one invocation instead of fanning out
    pub collect: bool,
}

impl Resolved {
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

/// Resolves selectors against the injected catalog and evaluator
#[derive(Clone)]
pub struct Resolver {
    catalog: Arc<dyn Catalog>,
    queries: Arc<dyn QueryEvaluator>,
}

impl Resolver {
    pub fn new(catalog: Arc<dyn Catalog>, queries: Arc<dyn QueryEvaluator>) -> Self {
        Self { catalog, queries }
    }

    /// Resolve a selector with the inbound message as event context.
    ///
    /// `all` wins over everything, then a non-empty explicit preset, then
    /// the query. Filter variants intersect the message's entities against
    /// the query instead of scanning the catalog. Zero matches is not an
    /// error; the caller skips the action with an ignored output.
    pub fn resolve(
        &self,
        selector: &TargetSelector,
        message: &ActionMessage,
    ) -> Result<Resolved, QueryError> {
        let collect = selector.collect();
        let entities = match selector {
            TargetSelector::Nodes(s) => {
                let nodes = if s.all {
                    self.catalog.nodes()
                } else if !s.paths.is_empty() {
                    self.catalog.nodes_by_path(&s.paths)
                } else if let Some(query) = &s.query {
                    self.queries.nodes_matching(query)?
                } else {
                    Vec::new()
                };
                nodes.into_iter().map(Entity::Node).collect()
            }
            TargetSelector::Users(s) => {
                let users = if s.all {
                    self.catalog.users()
                } else if !s.logins.is_empty() {
                    self.catalog.users_by_login(&s.logins)
                } else if let Some(query) = &s.query {
                    self.queries.users_matching(query)?
                } else {
                    Vec::new()
                };
                users.into_iter().map(Entity::User).collect()
            }
            TargetSelector::NodesFilter(f) => {
                let mut kept = Vec::new();
                for node in &message.nodes {
                    if self.queries.node_matches(&f.query, node)? {
                        kept.push(Entity::Node(node.clone()));
                    }
                }
                kept
            }
            TargetSelector::UsersFilter(f) => {
                let mut kept = Vec::new();
                for user in &message.users {
                    if self.queries.user_matches(&f.query, user)? {
                        kept.push(Entity::User(user.clone()));
                    }
                }
                kept
            }
        };
        Ok(Resolved { entities, collect })
    }
}

/// Fixed in-memory catalog for tests and embedding
#[derive(Default, Clone)]
pub struct FakeCatalog {
    pub nodes: Vec<Node>,
    pub users: Vec<User>,
}

impl FakeCatalog {
    pub fn with_nodes(paths: &[&str]) -> Self {
        Self {
            nodes: paths.iter().copied().map(Node::new).collect(),
            users: Vec::new(),
        }
    }

    pub fn with_users(logins: &[&str]) -> Self {
        Self {
            nodes: Vec::new(),
            users: logins.iter().copied().map(User::new).collect(),
        }
    }
}

impl Catalog for FakeCatalog {
    fn nodes(&self) -> Vec<Node> {
        self.nodes.clone()
    }

    fn nodes_by_path(&self, paths: &[String]) -> Vec<Node> {
        paths
            .iter()
            .filter_map(|p| self.nodes.iter().find(|n| &n.path == p).cloned())
            .collect()
    }

    fn users(&self) -> Vec<User> {
        self.users.clone()
    }

    fn users_by_login(&self, logins: &[String]) -> Vec<User> {
        logins
            .iter()
            .filter_map(|l| self.users.iter().find(|u| &u.login == l).cloned())
            .collect()
    }
}

/// Substring evaluator over paths and logins, for tests
#[derive(Clone)]
pub struct SubstringQueries {
    pub catalog: FakeCatalog,
}

impl QueryEvaluator for SubstringQueries {
    fn nodes_matching(&self, query: &str) -> Result<Vec<Node>, QueryError> {
        Ok(self
            .catalog
            .nodes
            .iter()
            .filter(|n| n.path.contains(query))
            .cloned()
            .collect())
    }

    fn users_matching(&self, query: &str) -> Result<Vec<User>, QueryError> {
        Ok(self
            .catalog
            .users
            .iter()
            .filter(|u| u.login.contains(query))
            .cloned()
            .collect())
    }

    fn node_matches(&self, query: &str, node: &Node) -> Result<bool, QueryError> {
        Ok(node.path.contains(query))
    }

    fn user_matches(&self, query: &str, user: &User) -> Result<bool, QueryError> {
        Ok(user.login.contains(query))
    }
}

#[cfg(test)]
#[path = "resolver_tests.rs"]
mod tests;
