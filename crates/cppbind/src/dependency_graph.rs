//! Registration dependency graph
//!
//! Nodes are wrap-plan entries (or modules); edges run from a dependency to
//! its dependent, so a topological sort yields a legal registration order.
//! Sorting is a Kahn traversal that always releases the ready node with the
//! smallest key, which makes the order independent of insertion and hashing.

use std::{cmp::Reverse, collections::BinaryHeap, hash::Hash};

use log::trace;
use petgraph::{
    Direction,
    graph::{DiGraph, NodeIndex},
};
use rustc_hash::FxHashMap;

use crate::{
    cpp_types,
    plan::{EntryId, EntryKind, WrapPlan, WrapPlanEntry},
};

/// Why one node must be registered after another
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DependencyKind {
    /// The dependency is a base class of the dependent
    Base,
    /// The dependency is a template instantiation named in a signature
    Signature,
    /// The dependent module imports the dependency module
    Import,
}

/// Directed graph of registration constraints
#[derive(Debug)]
pub struct DependencyGraph<N> {
    graph: DiGraph<N, DependencyKind>,
    node_indices: FxHashMap<N, NodeIndex>,
}

impl<N> Default for DependencyGraph<N> {
    fn default() -> Self {
        Self {
            graph: DiGraph::new(),
            node_indices: FxHashMap::default(),
        }
    }
}

struct TarjanState {
    index_counter: usize,
    stack: Vec<NodeIndex>,
    indices: FxHashMap<NodeIndex, usize>,
    lowlinks: FxHashMap<NodeIndex, usize>,
    on_stack: FxHashMap<NodeIndex, bool>,
    components: Vec<Vec<NodeIndex>>,
}

impl<N: Copy + Eq + Hash> DependencyGraph<N> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(&mut self, node: N) -> NodeIndex {
        if let Some(&idx) = self.node_indices.get(&node) {
            return idx;
        }
        let idx = self.graph.add_node(node);
        self.node_indices.insert(node, idx);
        idx
    }

    /// Record that `dependent` must be registered after `dependency`
    pub fn add_dependency(&mut self, dependent: N, dependency: N, kind: DependencyKind) {
        if dependent == dependency {
            return;
        }
        let from = self.add_node(dependency);
        let to = self.add_node(dependent);
        if !self.graph.contains_edge(from, to) {
            self.graph.add_edge(from, to, kind);
        }
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Direct dependencies of `node`
    pub fn dependencies(&self, node: N) -> Vec<N> {
        self.node_indices.get(&node).map_or_else(Vec::new, |&idx| {
            self.graph
                .neighbors_directed(idx, Direction::Incoming)
                .map(|dep| self.graph[dep])
                .collect()
        })
    }

    /// Every edge as `(dependent, dependency, kind)`
    pub fn edges(&self) -> impl Iterator<Item = (N, N, DependencyKind)> + '_ {
        self.graph.edge_indices().filter_map(|edge| {
            let (from, to) = self.graph.edge_endpoints(edge)?;
            Some((self.graph[to], self.graph[from], self.graph[edge]))
        })
    }

    /// Kahn topological order, ready nodes released by ascending `key`
    ///
    /// Returns `None` if the graph has a cycle.
    pub fn topological_order<K: Ord>(&self, key: impl Fn(N) -> K) -> Option<Vec<N>> {
        let mut in_degree: FxHashMap<NodeIndex, usize> = self
            .graph
            .node_indices()
            .map(|idx| {
                (
                    idx,
                    self.graph.neighbors_directed(idx, Direction::Incoming).count(),
                )
            })
            .collect();

        let mut ready: BinaryHeap<Reverse<(K, usize)>> = in_degree
            .iter()
            .filter(|&(_, degree)| *degree == 0)
            .map(|(idx, _)| Reverse((key(self.graph[*idx]), idx.index())))
            .collect();

        let mut order = Vec::with_capacity(self.graph.node_count());
        while let Some(Reverse((_, raw))) = ready.pop() {
            let idx = NodeIndex::new(raw);
            order.push(self.graph[idx]);
            for next in self.graph.neighbors_directed(idx, Direction::Outgoing) {
                if let Some(degree) = in_degree.get_mut(&next) {
                    *degree -= 1;
                    if *degree == 0 {
                        ready.push(Reverse((key(self.graph[next]), next.index())));
                    }
                }
            }
        }

        (order.len() == self.graph.node_count()).then_some(order)
    }

    /// Strongly connected components with more than one member (Tarjan)
    pub fn find_cycles(&self) -> Vec<Vec<N>> {
        let mut state = TarjanState {
            index_counter: 0,
            stack: Vec::new(),
            indices: FxHashMap::default(),
            lowlinks: FxHashMap::default(),
            on_stack: FxHashMap::default(),
            components: Vec::new(),
        };

        for node_index in self.graph.node_indices() {
            if !state.indices.contains_key(&node_index) {
                self.strongconnect(node_index, &mut state);
            }
        }

        state
            .components
            .into_iter()
            .map(|component| component.into_iter().map(|idx| self.graph[idx]).collect())
            .collect()
    }

    fn strongconnect(&self, v: NodeIndex, state: &mut TarjanState) {
        let index = state.index_counter;
        state.indices.insert(v, index);
        state.lowlinks.insert(v, index);
        state.index_counter += 1;
        state.stack.push(v);
        state.on_stack.insert(v, true);

        for w in self.graph.neighbors_directed(v, Direction::Outgoing) {
            if !state.indices.contains_key(&w) {
                self.strongconnect(w, state);
                let low = state.lowlinks[&v].min(state.lowlinks[&w]);
                state.lowlinks.insert(v, low);
            } else if state.on_stack.get(&w).copied().unwrap_or(false) {
                let low = state.lowlinks[&v].min(state.indices[&w]);
                state.lowlinks.insert(v, low);
            }
        }

        if state.lowlinks[&v] == state.indices[&v] {
            let mut component = Vec::new();
            while let Some(w) = state.stack.pop() {
                state.on_stack.insert(w, false);
                component.push(w);
                if w == v {
                    break;
                }
            }
            if component.len() > 1 {
                state.components.push(component);
            }
        }
    }
}

/// Type spellings named by the registered surface of an entry
fn signature_spellings(entry: &WrapPlanEntry) -> Vec<&str> {
    let mut spellings: Vec<&str> = entry
        .callables()
        .flat_map(|c| c.node.signature_types())
        .collect();
    if let EntryKind::Class(class) = &entry.kind
        && let Some(trampoline) = &class.trampoline
    {
        spellings.extend(trampoline.methods.iter().flat_map(|m| m.signature_types()));
    }
    spellings
}

/// Entry-level graph of `plan`: base links plus template instantiations
/// mentioned in signatures
pub fn build_entry_graph(plan: &WrapPlan) -> DependencyGraph<EntryId> {
    let mut graph = DependencyGraph::new();
    let instances: Vec<&WrapPlanEntry> = plan
        .entries
        .iter()
        .filter(|e| e.as_class().is_some_and(|c| c.template.is_some()))
        .collect();

    for entry in &plan.entries {
        graph.add_node(entry.id);
        if let Some(class) = entry.as_class() {
            for base in &class.bases {
                trace!("{} depends on base {}", entry.cpp_name, base.cpp_name);
                graph.add_dependency(entry.id, base.entry, DependencyKind::Base);
            }
        }
        let spellings = signature_spellings(entry);
        for instance in &instances {
            if instance.id != entry.id
                && spellings
                    .iter()
                    .any(|s| cpp_types::mentions_type(s, &instance.cpp_name))
            {
                trace!(
                    "{} depends on instantiation {} named in a signature",
                    entry.cpp_name, instance.cpp_name
                );
                graph.add_dependency(entry.id, instance.id, DependencyKind::Signature);
            }
        }
    }
    graph
}
