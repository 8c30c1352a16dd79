//! Committed, immutable workflow plans
//!
//! A plan is an indexable arena of [`PlanNode`]s. Sequencing, branches and
//! loop-back edges are stored as node indices, so the run engine can walk the
//! plan with a cursor instead of recursing.

use crate::workflow::shape::Shape;
use crate::workflow::step::Step;
use crate::workflow::types::Condition;
use petgraph::algo::is_cyclic_directed;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::Dfs;
use std::{collections::BTreeSet, fmt, sync::Arc};

/// Re-entry edge of a loop node
#[derive(Debug, Clone, PartialEq)]
pub struct LoopEdge {
    /// Loop ends once this evaluates true
    pub condition: Condition,
    /// Node index to resume at while the condition is false
    pub target: usize,
}

/// A step placed in the plan, with its outgoing edges
#[derive(Debug, Clone, PartialEq)]
pub struct PlanNode {
    pub(crate) step: Step,
    pub(crate) next: Option<usize>,
    pub(crate) branches: Vec<usize>,
    pub(crate) loop_edge: Option<LoopEdge>,
}

impl PlanNode {
    pub(crate) fn new(step: Step) -> Self {
        Self {
            step,
            next: None,
            branches: Vec::new(),
            loop_edge: None,
        }
    }

    /// Step executed at this node
    pub fn step(&self) -> &Step {
        &self.step
    }

    /// Sequential successor
    pub fn next(&self) -> Option<usize> {
        self.next
    }

    /// Successors attached through `after()`, in creation order
    pub fn branches(&self) -> &[usize] {
        &self.branches
    }

    /// Re-entry edge when this node closes a loop
    pub fn loop_edge(&self) -> Option<&LoopEdge> {
        self.loop_edge.as_ref()
    }

    /// A node is terminal when nothing follows it
    pub fn is_terminal(&self) -> bool {
        self.next.is_none() && self.branches.is_empty()
    }

    /// Forward successors: `next` first, then branches
    pub fn successors(&self) -> impl Iterator<Item = usize> + '_ {
        self.next.into_iter().chain(self.branches.iter().copied())
    }
}

struct PlanInner {
    name: String,
    trigger_shape: Option<Arc<dyn Shape>>,
    nodes: Vec<PlanNode>,
}

/// Frozen execution plan produced by `WorkflowBuilder::commit()`
///
/// Cheap to clone; every clone shares the same nodes. Runs created from the
/// plan only ever read it.
#[derive(Clone)]
pub struct WorkflowPlan {
    inner: Arc<PlanInner>,
}

impl WorkflowPlan {
    pub(crate) fn new(
        name: String,
        trigger_shape: Option<Arc<dyn Shape>>,
        nodes: Vec<PlanNode>,
    ) -> Self {
        Self {
            inner: Arc::new(PlanInner {
                name,
                trigger_shape,
                nodes,
            }),
        }
    }

    /// Workflow name
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Shape trigger data is validated against, if declared
    pub fn trigger_shape(&self) -> Option<&dyn Shape> {
        self.inner.trigger_shape.as_deref()
    }

    /// All nodes, indexed by the ids edges refer to
    pub fn nodes(&self) -> &[PlanNode] {
        &self.inner.nodes
    }

    /// Node at `index`
    pub fn node(&self, index: usize) -> Option<&PlanNode> {
        self.inner.nodes.get(index)
    }

    /// Index of the entry node
    pub fn head(&self) -> usize {
        0
    }

    /// Whether two handles point at the same committed plan
    pub fn ptr_eq(&self, other: &WorkflowPlan) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Whether the plan contains at least one loop-back edge
    pub fn has_loops(&self) -> bool {
        is_cyclic_directed(&build_graph(self.nodes()))
    }

    /// Node indices reachable from `start`, following every edge kind
    pub fn reachable_from(&self, start: usize) -> BTreeSet<usize> {
        reachable_nodes(self.nodes(), start)
    }
}

impl PartialEq for WorkflowPlan {
    fn eq(&self, other: &Self) -> bool {
        self.inner.name == other.inner.name && self.inner.nodes == other.inner.nodes
    }
}

impl fmt::Debug for WorkflowPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkflowPlan")
            .field("name", &self.inner.name)
            .field("trigger_shape", &self.inner.trigger_shape)
            .field("nodes", &self.inner.nodes)
            .finish()
    }
}

/// Build a petgraph view of the nodes; node weights are arena indices
fn build_graph(nodes: &[PlanNode]) -> DiGraph<usize, ()> {
    let mut graph = DiGraph::with_capacity(nodes.len(), nodes.len());
    for index in 0..nodes.len() {
        graph.add_node(index);
    }

    for (index, node) in nodes.iter().enumerate() {
        for successor in node.successors() {
            graph.add_edge(NodeIndex::new(index), NodeIndex::new(successor), ());
        }
        if let Some(edge) = &node.loop_edge {
            graph.add_edge(NodeIndex::new(index), NodeIndex::new(edge.target), ());
        }
    }

    graph
}

/// Find all nodes reachable from the starting node using DFS
pub(crate) fn reachable_nodes(nodes: &[PlanNode], start: usize) -> BTreeSet<usize> {
    let mut reachable = BTreeSet::new();
    if start >= nodes.len() {
        return reachable;
    }

    let graph = build_graph(nodes);
    let mut dfs = Dfs::new(&graph, NodeIndex::new(start));
    while let Some(index) = dfs.next(&graph) {
        reachable.insert(graph[index]);
    }

    reachable
}
