//! Directed-graph workflow engine.
//!
//! A [`WorkflowGraph`] holds named nodes, each backed by a [`Step`], and at
//! most one outgoing edge per node. Edges are either unconditional or guarded
//! by a router returning a [`RouteLabel`]. A node without an outgoing edge is
//! terminal; reaching it ends the run.

use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info};
use uuid::Uuid;

use crate::{Error, Result};

/// A unit of work executed when the engine visits a node.
///
/// Steps receive the current state by value and hand back the updated state.
/// The context is shared, read-only configuration (services, schema) passed
/// explicitly to every invocation.
#[async_trait]
pub trait Step<S, C>: Send + Sync
where
    S: Send + 'static,
    C: Send + Sync + 'static,
{
    async fn run(&self, state: S, ctx: &C) -> Result<S>;
}

/// Closed set of outcomes a router can produce.
///
/// `variants` must list every value so the engine can check at registration
/// time that each outcome has a destination.
pub trait RouteLabel: Copy + Eq + Hash + Debug + Send + Sync + 'static {
    fn variants() -> &'static [Self];
    fn as_str(&self) -> &'static str;
}

type Resolver<S> = Box<dyn Fn(&S) -> std::result::Result<String, String> + Send + Sync>;

enum Edge<S> {
    Direct(String),
    Conditional(Resolver<S>),
}

/// Record of a single traversal.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionTrace {
    pub run_id: Uuid,
    pub visited: Vec<String>,
    /// Set once a node without an outgoing edge has run.
    pub terminal_node: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl ExecutionTrace {
    fn new() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            visited: Vec::new(),
            terminal_node: None,
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    /// Node the run ended on.
    pub fn terminal(&self) -> Option<&str> {
        self.terminal_node.as_deref()
    }

    pub fn steps(&self) -> usize {
        self.visited.len()
    }
}

pub struct WorkflowGraph<S, C>
where
    S: Send + 'static,
    C: Send + Sync + 'static,
{
    nodes: HashMap<String, Arc<dyn Step<S, C>>>,
    edges: HashMap<String, Edge<S>>,
    entry: Option<String>,
    step_limit: Option<usize>,
}

impl<S, C> Default for WorkflowGraph<S, C>
where
    S: Send + 'static,
    C: Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<S, C> WorkflowGraph<S, C>
where
    S: Send + 'static,
    C: Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            nodes: HashMap::new(),
            edges: HashMap::new(),
            entry: None,
            step_limit: None,
        }
    }

    /// Abort runs that execute more than `limit` steps. Unlimited by default.
    pub fn with_step_limit(mut self, limit: usize) -> Self {
        self.step_limit = Some(limit);
        self
    }

    pub fn register_node(
        &mut self,
        name: &str,
        step: impl Step<S, C> + 'static,
    ) -> Result<&mut Self> {
        if self.nodes.contains_key(name) {
            return Err(Error::DuplicateNode(name.to_string()));
        }
        self.nodes.insert(name.to_string(), Arc::new(step));
        Ok(self)
    }

    pub fn add_edge(&mut self, from: &str, to: &str) -> Result<&mut Self> {
        self.ensure_node(from)?;
        self.ensure_node(to)?;
        self.ensure_no_edge(from)?;
        self.edges
            .insert(from.to_string(), Edge::Direct(to.to_string()));
        Ok(self)
    }

    /// Route out of `from` by evaluating `router` against the state.
    ///
    /// Every variant of `L` must appear in `mapping` and every destination
    /// must already be registered.
    pub fn add_conditional_edges<'a, L, R, I>(
        &mut self,
        from: &str,
        router: R,
        mapping: I,
    ) -> Result<&mut Self>
    where
        L: RouteLabel,
        R: Fn(&S) -> L + Send + Sync + 'static,
        I: IntoIterator<Item = (L, &'a str)>,
    {
        self.ensure_node(from)?;
        self.ensure_no_edge(from)?;

        let mut destinations = HashMap::new();
        for (label, to) in mapping {
            self.ensure_node(to)?;
            destinations.insert(label, to.to_string());
        }
        if let Some(missing) = L::variants()
            .iter()
            .find(|label| !destinations.contains_key(*label))
        {
            return Err(Error::UnknownLabel {
                node: from.to_string(),
                label: missing.as_str().to_string(),
            });
        }

        let resolver: Resolver<S> = Box::new(move |state: &S| {
            let label = router(state);
            destinations
                .get(&label)
                .cloned()
                .ok_or_else(|| label.as_str().to_string())
        });
        self.edges
            .insert(from.to_string(), Edge::Conditional(resolver));
        Ok(self)
    }

    pub fn set_entry(&mut self, name: &str) -> Result<&mut Self> {
        self.ensure_node(name)?;
        self.entry = Some(name.to_string());
        Ok(self)
    }

    pub fn is_terminal(&self, name: &str) -> bool {
        self.nodes.contains_key(name) && !self.edges.contains_key(name)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub async fn run(&self, ctx: &C, initial: S) -> Result<S> {
        self.run_traced(ctx, initial).await.map(|(state, _)| state)
    }

    /// Walk the graph from the entry node until a terminal node has run.
    pub async fn run_traced(&self, ctx: &C, initial: S) -> Result<(S, ExecutionTrace)> {
        let mut current = self
            .entry
            .clone()
            .ok_or_else(|| Error::Validation("workflow has no entry node".to_string()))?;
        let mut trace = ExecutionTrace::new();
        let mut state = initial;

        info!("Starting workflow run {}", trace.run_id);

        loop {
            if let Some(limit) = self.step_limit {
                if trace.visited.len() >= limit {
                    return Err(Error::StepLimitExceeded(limit));
                }
            }

            let step = self
                .nodes
                .get(&current)
                .ok_or_else(|| Error::UnknownNode(current.clone()))?;

            debug!("Executing node {} ({} steps so far)", current, trace.visited.len());
            state = step.run(state, ctx).await?;
            trace.visited.push(current.clone());

            current = match self.edges.get(&current) {
                None => break,
                Some(Edge::Direct(next)) => next.clone(),
                Some(Edge::Conditional(resolve)) => {
                    resolve(&state).map_err(|label| Error::UnknownLabel {
                        node: current.clone(),
                        label,
                    })?
                }
            };
        }

        trace.finished_at = Some(Utc::now());
        trace.terminal_node = Some(current.clone());
        info!(
            "Workflow run {} finished at {} after {} steps",
            trace.run_id,
            current,
            trace.visited.len()
        );

        Ok((state, trace))
    }

    fn ensure_node(&self, name: &str) -> Result<()> {
        if self.nodes.contains_key(name) {
            Ok(())
        } else {
            Err(Error::UnknownNode(name.to_string()))
        }
    }

    fn ensure_no_edge(&self, from: &str) -> Result<()> {
        if self.edges.contains_key(from) {
            return Err(Error::Validation(format!(
                "node {} already has an outgoing edge",
                from
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Add(u32);

    #[async_trait]
    impl Step<u32, ()> for Add {
        async fn run(&self, state: u32, _ctx: &()) -> Result<u32> {
            Ok(state + self.0)
        }
    }

    struct Fail;

    #[async_trait]
    impl Step<u32, ()> for Fail {
        async fn run(&self, _state: u32, _ctx: &()) -> Result<u32> {
            Err(Error::Reasoning("service unavailable".to_string()))
        }
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    enum Size {
        Small,
        Large,
    }

    impl RouteLabel for Size {
        fn variants() -> &'static [Self] {
            &[Size::Small, Size::Large]
        }

        fn as_str(&self) -> &'static str {
            match self {
                Size::Small => "small",
                Size::Large => "large",
            }
        }
    }

    fn by_size(state: &u32) -> Size {
        if *state < 10 {
            Size::Small
        } else {
            Size::Large
        }
    }

    #[test]
    fn test_duplicate_node_rejected() {
        let mut graph: WorkflowGraph<u32, ()> = WorkflowGraph::new();
        graph.register_node("a", Add(1)).unwrap();
        let err = graph.register_node("a", Add(2)).err().unwrap();
        assert!(matches!(err, Error::DuplicateNode(name) if name == "a"));
    }

    #[test]
    fn test_entry_must_be_registered() {
        let mut graph: WorkflowGraph<u32, ()> = WorkflowGraph::new();
        let err = graph.set_entry("missing").err().unwrap();
        assert!(matches!(err, Error::UnknownNode(name) if name == "missing"));
    }

    #[test]
    fn test_edge_endpoints_must_be_registered() {
        let mut graph: WorkflowGraph<u32, ()> = WorkflowGraph::new();
        graph.register_node("a", Add(1)).unwrap();
        assert!(matches!(graph.add_edge("a", "b"), Err(Error::UnknownNode(_))));
        assert!(matches!(graph.add_edge("b", "a"), Err(Error::UnknownNode(_))));
    }

    #[test]
    fn test_second_outgoing_edge_rejected() {
        let mut graph: WorkflowGraph<u32, ()> = WorkflowGraph::new();
        graph.register_node("a", Add(1)).unwrap();
        graph.register_node("b", Add(1)).unwrap();
        graph.add_edge("a", "b").unwrap();
        assert!(matches!(graph.add_edge("a", "a"), Err(Error::Validation(_))));
    }

    #[test]
    fn test_missing_label_rejected_at_registration() {
        let mut graph: WorkflowGraph<u32, ()> = WorkflowGraph::new();
        graph.register_node("start", Add(0)).unwrap();
        graph.register_node("small", Add(1)).unwrap();

        let err = graph
            .add_conditional_edges("start", by_size, [(Size::Small, "small")])
            .err()
            .unwrap();
        match err {
            Error::UnknownLabel { node, label } => {
                assert_eq!(node, "start");
                assert_eq!(label, "large");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_run_without_entry_fails() {
        let mut graph: WorkflowGraph<u32, ()> = WorkflowGraph::new();
        graph.register_node("a", Add(1)).unwrap();
        assert!(matches!(graph.run(&(), 0).await, Err(Error::Validation(_))));
    }

    #[tokio::test]
    async fn test_conditional_routing() {
        let mut graph: WorkflowGraph<u32, ()> = WorkflowGraph::new();
        graph
            .register_node("start", Add(0))
            .unwrap()
            .register_node("small", Add(100))
            .unwrap()
            .register_node("large", Add(1000))
            .unwrap();
        graph
            .add_conditional_edges(
                "start",
                by_size,
                [(Size::Small, "small"), (Size::Large, "large")],
            )
            .unwrap();
        graph.set_entry("start").unwrap();

        let (state, trace) = graph.run_traced(&(), 3).await.unwrap();
        assert_eq!(state, 103);
        assert_eq!(trace.visited, vec!["start", "small"]);
        assert_eq!(trace.terminal(), Some("small"));
        assert!(trace.finished_at.is_some());

        let json = serde_json::to_value(&trace).unwrap();
        assert_eq!(json["terminal_node"], "small");
        assert_eq!(json["visited"], serde_json::json!(["start", "small"]));

        assert_eq!(graph.run(&(), 42).await.unwrap(), 1042);
        assert!(graph.is_terminal("large"));
        assert!(!graph.is_terminal("start"));
    }

    #[tokio::test]
    async fn test_loop_until_condition() {
        let mut graph: WorkflowGraph<u32, ()> = WorkflowGraph::new();
        graph.register_node("inc", Add(3)).unwrap();
        graph.register_node("done", Add(0)).unwrap();
        graph
            .add_conditional_edges("inc", by_size, [(Size::Small, "inc"), (Size::Large, "done")])
            .unwrap();
        graph.set_entry("inc").unwrap();

        let (state, trace) = graph.run_traced(&(), 0).await.unwrap();
        assert_eq!(state, 12);
        assert_eq!(trace.steps(), 5);
    }

    #[tokio::test]
    async fn test_step_limit_stops_runaway_loop() {
        let mut graph: WorkflowGraph<u32, ()> = WorkflowGraph::new().with_step_limit(4);
        graph.register_node("a", Add(0)).unwrap();
        graph.register_node("b", Add(0)).unwrap();
        graph.add_edge("a", "b").unwrap();
        graph.add_edge("b", "a").unwrap();
        graph.set_entry("a").unwrap();

        let err = graph.run(&(), 0).await.err().unwrap();
        assert!(matches!(err, Error::StepLimitExceeded(4)));
    }

    #[tokio::test]
    async fn test_step_error_propagates() {
        let mut graph: WorkflowGraph<u32, ()> = WorkflowGraph::new();
        graph.register_node("a", Add(1)).unwrap();
        graph.register_node("b", Fail).unwrap();
        graph.add_edge("a", "b").unwrap();
        graph.set_entry("a").unwrap();

        let err = graph.run(&(), 0).await.err().unwrap();
        assert!(matches!(err, Error::Reasoning(_)));
    }
}
