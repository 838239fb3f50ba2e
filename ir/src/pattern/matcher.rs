//! Structural matcher and binder.
//!
//! Matching is read-only and single-solution: `Or` commits to the first
//! alternative that matches and `Commutable` to the first operand order that
//! matches (declared order first). Each attempt works on a scratch copy of
//! the binding store so that a failed branch leaves nothing behind.

use std::sync::Arc;

use smallvec::SmallVec;

use super::{Pattern, PatternId, PatternKind, PatternTable};
use crate::graph::{ArgId, Graph, NodeId};

/// Matched graph entity: the producing node (absent for graph inputs and
/// initializers) and the node-argument. Both are absent for ids that were
/// not bound on the chosen path.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct NodeInput {
    pub node: Option<NodeId>,
    pub arg: Option<ArgId>,
}

impl NodeInput {
    pub fn is_bound(&self) -> bool {
        self.arg.is_some()
    }
}

/// Single binding entry: (pattern id, matched entity).
pub type BindingEntry = (PatternId, NodeInput);

/// Stack-allocated binding storage for typical patterns (up to 8 ids).
pub type BindingStore = SmallVec<[BindingEntry; 8]>;

/// Extension methods for BindingStore.
pub trait BindingStoreExt {
    fn get_by_id(&self, id: PatternId) -> Option<&NodeInput>;

    /// Insert or update binding for id.
    fn set_binding(&mut self, id: PatternId, input: NodeInput);

    fn contains_id(&self, id: PatternId) -> bool;
}

impl BindingStoreExt for BindingStore {
    fn get_by_id(&self, id: PatternId) -> Option<&NodeInput> {
        self.iter().find(|(i, _)| *i == id).map(|(_, input)| input)
    }

    fn set_binding(&mut self, id: PatternId, input: NodeInput) {
        for (i, existing) in self.iter_mut() {
            if *i == id {
                *existing = input;
                return;
            }
        }
        self.push((id, input));
    }

    fn contains_id(&self, id: PatternId) -> bool {
        self.iter().any(|(i, _)| *i == id)
    }
}

/// Result of a successful match. Holds an entry for every id reachable from
/// the pattern root, sorted by id.
#[derive(Debug, Clone)]
pub struct Binder {
    table: Arc<PatternTable>,
    store: BindingStore,
}

impl Binder {
    pub fn get(&self, id: PatternId) -> Option<NodeInput> {
        self.store.get_by_id(id).copied()
    }

    pub fn node(&self, id: PatternId) -> Option<NodeId> {
        self.get(id).and_then(|b| b.node)
    }

    pub fn arg(&self, id: PatternId) -> Option<ArgId> {
        self.get(id).and_then(|b| b.arg)
    }

    pub fn named(&self, name: &str) -> Option<NodeInput> {
        self.table.find(name).and_then(|id| self.get(id))
    }

    pub fn named_node(&self, name: &str) -> Option<NodeId> {
        self.named(name).and_then(|b| b.node)
    }

    pub fn named_arg(&self, name: &str) -> Option<ArgId> {
        self.named(name).and_then(|b| b.arg)
    }

    pub fn contains(&self, id: PatternId) -> bool {
        self.store.contains_id(id)
    }

    pub fn ids(&self) -> impl Iterator<Item = PatternId> + '_ {
        self.store.iter().map(|(id, _)| *id)
    }

    pub fn entries(&self) -> &[BindingEntry] {
        &self.store
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }
}

impl Pattern {
    /// Match the root against the first output of `node`.
    pub fn match_node(&self, graph: &Graph, node: NodeId) -> Option<Binder> {
        let arg = graph.node(node).output(0)?;
        self.match_arg(graph, arg)
    }

    /// Match the root against an arbitrary node-argument.
    pub fn match_arg(&self, graph: &Graph, arg: ArgId) -> Option<Binder> {
        let mut store = BindingStore::new();
        let matched = self.match_internal(self.root(), graph, arg, &mut store);
        tracing::trace!(pattern = %self.root(), arg = %graph.arg(arg).name, matched, "pattern match");
        if !matched {
            return None;
        }
        for &id in self.reachable_ids() {
            if !store.contains_id(id) {
                store.push((id, NodeInput::default()));
            }
        }
        store.sort_by_key(|(id, _)| *id);
        Some(Binder { table: self.table().clone(), store })
    }

    fn match_internal(&self, id: PatternId, graph: &Graph, arg: ArgId, store: &mut BindingStore) -> bool {
        // A repeated id must bind the same node-argument everywhere.
        if let Some(existing) = store.get_by_id(id) {
            return existing.arg == Some(arg);
        }
        let bound = NodeInput { node: graph.producer(arg), arg: Some(arg) };

        match self.kind(id) {
            PatternKind::Wildcard => {}

            PatternKind::Constant => {
                if !graph.is_constant(arg) {
                    return false;
                }
            }

            PatternKind::GraphInput => {
                if !graph.is_graph_input(arg) {
                    return false;
                }
            }

            PatternKind::Node { op_type, domain, operands, optional, attrs } => {
                let Some(producer) = bound.node else { return false };
                let node = graph.node(producer);
                if node.op_type != *op_type || node.domain != *domain {
                    return false;
                }
                if attrs.iter().any(|(name, value)| node.attr(name) != Some(value)) {
                    return false;
                }
                if node.inputs.iter().skip(operands.len()).any(Option::is_some) {
                    return false;
                }
                store.set_binding(id, bound);
                for (slot, operand) in operands.iter().enumerate() {
                    match node.input(slot) {
                        None if optional[slot] => {}
                        None => return false,
                        Some(input) => {
                            if !self.match_internal(*operand, graph, input, store) {
                                return false;
                            }
                        }
                    }
                }
                return true;
            }

            PatternKind::Commutable { op_type, domain, lhs, rhs } => {
                let Some(producer) = bound.node else { return false };
                let node = graph.node(producer);
                if node.op_type != *op_type || node.domain != *domain || node.inputs.len() != 2 {
                    return false;
                }
                let (Some(a), Some(b)) = (node.input(0), node.input(1)) else { return false };
                store.set_binding(id, bound);

                // Try declared order first, then swapped.
                for (first, second) in [(a, b), (b, a)] {
                    let mut scratch = store.clone();
                    if self.match_internal(*lhs, graph, first, &mut scratch)
                        && self.match_internal(*rhs, graph, second, &mut scratch)
                    {
                        *store = scratch;
                        return true;
                    }
                }
                return false;
            }

            PatternKind::Or(alternatives) => {
                for alt in alternatives {
                    let mut scratch = store.clone();
                    if self.match_internal(*alt, graph, arg, &mut scratch) {
                        *store = scratch;
                        store.set_binding(id, bound);
                        return true;
                    }
                }
                return false;
            }

            PatternKind::Sequence(items) => {
                for item in items {
                    if !self.match_internal(*item, graph, arg, store) {
                        return false;
                    }
                }
            }
        }

        store.set_binding(id, bound);
        true
    }
}
