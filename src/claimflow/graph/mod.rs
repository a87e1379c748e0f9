// SPDX-License-Identifier: MIT

//! Explicit finite-state workflow graph
//!
//! A registry of named nodes (each `WorkflowState -> WorkflowState`), an
//! edge table with direct and conditional edges, and a driver loop that
//! walks edges from the entry until the terminal marker. Graph construction
//! statically verifies that every node has an outgoing path to the
//! terminal, so no invocation can wedge in a dead end.
//!
//! Node failures flagged retry-eligible are re-run with bounded exponential
//! backoff; everything else propagates out of `invoke` for the session
//! layer to surface.

pub mod nodes;

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

use super::error::ClaimflowError;
use super::events::SessionEvent;
use super::state::WorkflowState;

/// Terminal marker. Not a node: reaching it ends the invocation.
pub const END: &str = "end";

/// Per-invocation context handed to every node.
#[derive(Clone, Default)]
pub struct InvocationCtx {
    /// Live event channel for forwarding model increments; absent for
    /// detached invocations (tests, CLI one-shots without streaming).
    pub events: Option<mpsc::Sender<SessionEvent>>,
}

impl InvocationCtx {
    pub fn detached() -> Self {
        Self::default()
    }

    pub fn streaming(events: mpsc::Sender<SessionEvent>) -> Self {
        Self {
            events: Some(events),
        }
    }
}

/// A named unit of work in the graph.
#[async_trait]
pub trait Node: Send + Sync {
    fn name(&self) -> &'static str;

    async fn run(
        &self,
        state: WorkflowState,
        ctx: &InvocationCtx,
    ) -> Result<WorkflowState, ClaimflowError>;
}

type Selector = Box<dyn Fn(&WorkflowState) -> String + Send + Sync>;

enum Edge {
    /// Unconditional transition.
    Direct(String),
    /// The selector's output keys into `targets` for the next node.
    Conditional {
        selector: Selector,
        targets: HashMap<String, String>,
    },
}

impl Edge {
    /// All possible targets, for the static reachability check.
    fn targets(&self) -> Vec<&str> {
        match self {
            Edge::Direct(to) => vec![to.as_str()],
            Edge::Conditional { targets, .. } => targets.values().map(|s| s.as_str()).collect(),
        }
    }
}

#[derive(Default)]
pub struct GraphBuilder {
    nodes: HashMap<String, Arc<dyn Node>>,
    edges: HashMap<String, Edge>,
    entry: Option<String>,
}

impl GraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(mut self, node: Arc<dyn Node>) -> Self {
        self.nodes.insert(node.name().to_string(), node);
        self
    }

    pub fn set_entry(mut self, name: &str) -> Self {
        self.entry = Some(name.to_string());
        self
    }

    pub fn add_edge(mut self, from: &str, to: &str) -> Self {
        self.edges.insert(from.to_string(), Edge::Direct(to.to_string()));
        self
    }

    pub fn add_conditional_edges(
        mut self,
        from: &str,
        selector: impl Fn(&WorkflowState) -> String + Send + Sync + 'static,
        targets: &[(&str, &str)],
    ) -> Self {
        self.edges.insert(
            from.to_string(),
            Edge::Conditional {
                selector: Box::new(selector),
                targets: targets
                    .iter()
                    .map(|(key, to)| (key.to_string(), to.to_string()))
                    .collect(),
            },
        );
        self
    }

    /// Validate the graph shape and produce an executable workflow.
    pub fn compile(self) -> Result<WorkflowGraph, ClaimflowError> {
        let entry = self
            .entry
            .ok_or_else(|| ClaimflowError::graph("no entry node set"))?;
        if !self.nodes.contains_key(&entry) {
            return Err(ClaimflowError::graph(format!(
                "entry node '{}' is not registered",
                entry
            )));
        }

        for name in self.nodes.keys() {
            if !self.edges.contains_key(name) {
                return Err(ClaimflowError::graph(format!(
                    "node '{}' has no outgoing edge",
                    name
                )));
            }
        }
        for (from, edge) in &self.edges {
            if !self.nodes.contains_key(from) {
                return Err(ClaimflowError::graph(format!(
                    "edge from unregistered node '{}'",
                    from
                )));
            }
            for target in edge.targets() {
                if target != END && !self.nodes.contains_key(target) {
                    return Err(ClaimflowError::graph(format!(
                        "edge from '{}' to unregistered node '{}'",
                        from, target
                    )));
                }
            }
        }

        // Fixpoint over "can reach the terminal": a node qualifies when any
        // outgoing target is END or already qualifies.
        let mut reaches_end: HashSet<&str> = HashSet::new();
        loop {
            let mut changed = false;
            for (from, edge) in &self.edges {
                if reaches_end.contains(from.as_str()) {
                    continue;
                }
                let ok = edge
                    .targets()
                    .iter()
                    .any(|t| *t == END || reaches_end.contains(t));
                if ok {
                    reaches_end.insert(from.as_str());
                    changed = true;
                }
            }
            if !changed {
                break;
            }
        }
        for name in self.nodes.keys() {
            if !reaches_end.contains(name.as_str()) {
                return Err(ClaimflowError::graph(format!(
                    "node '{}' has no path to the terminal",
                    name
                )));
            }
        }

        Ok(WorkflowGraph {
            nodes: self.nodes,
            edges: self.edges,
            entry,
            max_attempts: 2,
            backoff_base: Duration::from_millis(250),
            backoff_cap: Duration::from_secs(1),
            max_steps: 16,
        })
    }
}

pub struct WorkflowGraph {
    nodes: HashMap<String, Arc<dyn Node>>,
    edges: HashMap<String, Edge>,
    entry: String,
    max_attempts: u32,
    backoff_base: Duration,
    backoff_cap: Duration,
    max_steps: usize,
}

impl WorkflowGraph {
    /// Run the graph from the entry node, threading `state` through each
    /// node in turn until the terminal marker.
    pub async fn invoke(
        &self,
        state: WorkflowState,
        ctx: &InvocationCtx,
    ) -> Result<WorkflowState, ClaimflowError> {
        let mut current = self.entry.clone();
        let mut state = state;

        for _step in 0..self.max_steps {
            let node = self
                .nodes
                .get(&current)
                .ok_or_else(|| ClaimflowError::graph(format!("unknown node '{}'", current)))?;

            log::info!("executing node: {}", current);
            state = self.run_with_retry(node.as_ref(), state, ctx).await?;

            let next = self.next_node(&current, &state)?;
            if next == END {
                return Ok(state);
            }
            current = next;
        }

        Err(ClaimflowError::graph(format!(
            "exceeded {} steps without reaching the terminal",
            self.max_steps
        )))
    }

    fn next_node(&self, current: &str, state: &WorkflowState) -> Result<String, ClaimflowError> {
        let edge = self
            .edges
            .get(current)
            .ok_or_else(|| ClaimflowError::graph(format!("node '{}' has no edge", current)))?;

        match edge {
            Edge::Direct(to) => Ok(to.clone()),
            Edge::Conditional { selector, targets } => {
                let key = selector(state);
                targets.get(&key).cloned().ok_or_else(|| {
                    ClaimflowError::graph(format!("no edge from '{}' for '{}'", current, key))
                })
            }
        }
    }

    async fn run_with_retry(
        &self,
        node: &dyn Node,
        state: WorkflowState,
        ctx: &InvocationCtx,
    ) -> Result<WorkflowState, ClaimflowError> {
        let mut attempt: u32 = 0;
        loop {
            match node.run(state.clone(), ctx).await {
                Ok(next) => return Ok(next),
                Err(e) if e.is_retryable() && attempt + 1 < self.max_attempts => {
                    let delay = self
                        .backoff_base
                        .saturating_mul(2u32.saturating_pow(attempt))
                        .min(self.backoff_cap);
                    log::warn!(
                        "node {} failed (attempt {}/{}), retrying in {:?}: {}",
                        node.name(),
                        attempt + 1,
                        self.max_attempts,
                        delay,
                        e
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::claimflow::state::Route;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Node that appends its name to the question, recording call counts.
    struct TraceNode {
        name: &'static str,
        calls: AtomicUsize,
        fail_first: bool,
        retryable: bool,
    }

    impl TraceNode {
        fn ok(name: &'static str) -> Arc<Self> {
            Arc::new(Self {
                name,
                calls: AtomicUsize::new(0),
                fail_first: false,
                retryable: false,
            })
        }

        fn flaky(name: &'static str, retryable: bool) -> Arc<Self> {
            Arc::new(Self {
                name,
                calls: AtomicUsize::new(0),
                fail_first: true,
                retryable,
            })
        }
    }

    #[async_trait]
    impl Node for TraceNode {
        fn name(&self) -> &'static str {
            self.name
        }

        async fn run(
            &self,
            mut state: WorkflowState,
            _ctx: &InvocationCtx,
        ) -> Result<WorkflowState, ClaimflowError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_first && call == 0 {
                return Err(ClaimflowError::responder(
                    self.name,
                    "transient failure",
                    self.retryable,
                ));
            }
            state.question = format!("{}>{}", state.question, self.name);
            Ok(state)
        }
    }

    fn two_step_graph(first: Arc<TraceNode>, second: Arc<TraceNode>) -> WorkflowGraph {
        GraphBuilder::new()
            .add_node(first.clone())
            .add_node(second.clone())
            .set_entry(first.name())
            .add_edge(first.name(), second.name())
            .add_edge(second.name(), END)
            .compile()
            .expect("valid graph")
    }

    #[tokio::test]
    async fn test_direct_edges_run_in_order() {
        let a = TraceNode::ok("a");
        let b = TraceNode::ok("b");
        let graph = two_step_graph(a.clone(), b.clone());

        let state = WorkflowState::new("s", "u", "start");
        let final_state = graph
            .invoke(state, &InvocationCtx::detached())
            .await
            .unwrap();

        assert_eq!(final_state.question, "start>a>b");
        assert_eq!(a.calls.load(Ordering::SeqCst), 1);
        assert_eq!(b.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_conditional_edge_follows_selector() {
        let entry = TraceNode::ok("entry");
        let left = TraceNode::ok("left");
        let right = TraceNode::ok("right");

        let graph = GraphBuilder::new()
            .add_node(entry.clone())
            .add_node(left.clone())
            .add_node(right.clone())
            .set_entry("entry")
            .add_conditional_edges(
                "entry",
                |s| s.route.as_str().to_string(),
                &[("benefit", "left"), ("claim", "right")],
            )
            .add_edge("left", END)
            .add_edge("right", END)
            .compile()
            .unwrap();

        let mut state = WorkflowState::new("s", "u", "q");
        state.route = Route::Claim;
        graph.invoke(state, &InvocationCtx::detached()).await.unwrap();

        assert_eq!(left.calls.load(Ordering::SeqCst), 0);
        assert_eq!(right.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_selector_without_matching_target_errors() {
        let entry = TraceNode::ok("entry");
        let next = TraceNode::ok("next");

        let graph = GraphBuilder::new()
            .add_node(entry)
            .add_node(next)
            .set_entry("entry")
            .add_conditional_edges("entry", |_| "missing".to_string(), &[("known", "next")])
            .add_edge("next", END)
            .compile()
            .unwrap();

        let result = graph
            .invoke(WorkflowState::new("s", "u", "q"), &InvocationCtx::detached())
            .await;
        assert!(matches!(result, Err(ClaimflowError::Graph(_))));
    }

    #[tokio::test]
    async fn test_retryable_failure_is_retried_once() {
        let flaky = TraceNode::flaky("flaky", true);
        let tail = TraceNode::ok("tail");
        let graph = two_step_graph(flaky.clone(), tail.clone());

        let final_state = graph
            .invoke(WorkflowState::new("s", "u", "q"), &InvocationCtx::detached())
            .await
            .unwrap();

        assert_eq!(flaky.calls.load(Ordering::SeqCst), 2);
        assert_eq!(final_state.question, "q>flaky>tail");
    }

    #[tokio::test]
    async fn test_non_retryable_failure_propagates_immediately() {
        let fatal = TraceNode::flaky("fatal", false);
        let tail = TraceNode::ok("tail");
        let graph = two_step_graph(fatal.clone(), tail.clone());

        let result = graph
            .invoke(WorkflowState::new("s", "u", "q"), &InvocationCtx::detached())
            .await;

        assert!(result.is_err());
        assert_eq!(fatal.calls.load(Ordering::SeqCst), 1);
        assert_eq!(tail.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_retry_gives_up_after_max_attempts() {
        /// Always fails with a retryable error.
        struct AlwaysFailing {
            calls: AtomicUsize,
        }

        #[async_trait]
        impl Node for AlwaysFailing {
            fn name(&self) -> &'static str {
                "hopeless"
            }

            async fn run(
                &self,
                _state: WorkflowState,
                _ctx: &InvocationCtx,
            ) -> Result<WorkflowState, ClaimflowError> {
                self.calls.fetch_add(1, Ordering::SeqCst);
                Err(ClaimflowError::responder("hopeless", "down", true))
            }
        }

        let node = Arc::new(AlwaysFailing {
            calls: AtomicUsize::new(0),
        });
        let graph = GraphBuilder::new()
            .add_node(node.clone())
            .set_entry("hopeless")
            .add_edge("hopeless", END)
            .compile()
            .unwrap();

        let result = graph
            .invoke(WorkflowState::new("s", "u", "q"), &InvocationCtx::detached())
            .await;

        assert!(result.is_err());
        assert_eq!(node.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_compile_rejects_dead_end_node() {
        // "loop" only points at itself, so it can never reach the terminal.
        struct Named(&'static str);

        #[async_trait]
        impl Node for Named {
            fn name(&self) -> &'static str {
                self.0
            }

            async fn run(
                &self,
                state: WorkflowState,
                _ctx: &InvocationCtx,
            ) -> Result<WorkflowState, ClaimflowError> {
                Ok(state)
            }
        }

        let result = GraphBuilder::new()
            .add_node(Arc::new(Named("entry")))
            .add_node(Arc::new(Named("loop")))
            .set_entry("entry")
            .add_edge("entry", "loop")
            .add_edge("loop", "loop")
            .compile();

        match result {
            Err(ClaimflowError::Graph(msg)) => {
                assert!(msg.contains("no path to the terminal"))
            }
            _ => panic!("expected dead-end rejection"),
        }
    }

    #[test]
    fn test_compile_rejects_missing_edge_and_unknown_target() {
        struct Named(&'static str);

        #[async_trait]
        impl Node for Named {
            fn name(&self) -> &'static str {
                self.0
            }

            async fn run(
                &self,
                state: WorkflowState,
                _ctx: &InvocationCtx,
            ) -> Result<WorkflowState, ClaimflowError> {
                Ok(state)
            }
        }

        let missing_edge = GraphBuilder::new()
            .add_node(Arc::new(Named("only")))
            .set_entry("only")
            .compile();
        assert!(missing_edge.is_err());

        let unknown_target = GraphBuilder::new()
            .add_node(Arc::new(Named("only")))
            .set_entry("only")
            .add_edge("only", "ghost")
            .compile();
        assert!(unknown_target.is_err());
    }

    #[tokio::test]
    async fn test_cycle_with_exit_hits_step_bound() {
        // A structurally valid cycle (it can reach END) whose selector
        // never takes the exit must be stopped by the step bound.
        struct Loopy;

        #[async_trait]
        impl Node for Loopy {
            fn name(&self) -> &'static str {
                "loopy"
            }

            async fn run(
                &self,
                state: WorkflowState,
                _ctx: &InvocationCtx,
            ) -> Result<WorkflowState, ClaimflowError> {
                Ok(state)
            }
        }

        let graph = GraphBuilder::new()
            .add_node(Arc::new(Loopy))
            .set_entry("loopy")
            .add_conditional_edges(
                "loopy",
                |_| "again".to_string(),
                &[("again", "loopy"), ("exit", END)],
            )
            .compile()
            .unwrap();

        let result = graph
            .invoke(WorkflowState::new("s", "u", "q"), &InvocationCtx::detached())
            .await;
        assert!(matches!(result, Err(ClaimflowError::Graph(_))));
    }

    #[tokio::test]
    async fn test_state_mutations_visible_to_successor() {
        struct Writer;
        struct Reader {
            seen: Mutex<Option<String>>,
        }

        #[async_trait]
        impl Node for Writer {
            fn name(&self) -> &'static str {
                "writer"
            }

            async fn run(
                &self,
                mut state: WorkflowState,
                _ctx: &InvocationCtx,
            ) -> Result<WorkflowState, ClaimflowError> {
                state.benefit_result = Some("written".into());
                Ok(state)
            }
        }

        #[async_trait]
        impl Node for Reader {
            fn name(&self) -> &'static str {
                "reader"
            }

            async fn run(
                &self,
                state: WorkflowState,
                _ctx: &InvocationCtx,
            ) -> Result<WorkflowState, ClaimflowError> {
                *self.seen.lock().unwrap() = state.benefit_result.clone();
                Ok(state)
            }
        }

        let reader = Arc::new(Reader {
            seen: Mutex::new(None),
        });
        let graph = GraphBuilder::new()
            .add_node(Arc::new(Writer))
            .add_node(reader.clone())
            .set_entry("writer")
            .add_edge("writer", "reader")
            .add_edge("reader", END)
            .compile()
            .unwrap();

        graph
            .invoke(WorkflowState::new("s", "u", "q"), &InvocationCtx::detached())
            .await
            .unwrap();

        assert_eq!(reader.seen.lock().unwrap().as_deref(), Some("written"));
    }
}
