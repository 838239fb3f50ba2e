//! Deterministic topological ordering.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};

use super::{Graph, NodeId};
use crate::error::{CycleDetectedSnafu, Result};

impl Graph {
    /// Kahn order over live nodes; ready nodes are emitted lowest handle first.
    pub fn try_topological_order(&self) -> Result<Vec<NodeId>> {
        let mut pending: HashMap<NodeId, usize> = HashMap::with_capacity(self.num_nodes());
        let mut ready = BinaryHeap::new();

        for node in self.nodes() {
            let deps = node.present_inputs().filter(|arg| self.producer(*arg).is_some()).count();
            if deps == 0 {
                ready.push(Reverse(node.id));
            } else {
                pending.insert(node.id, deps);
            }
        }

        let mut order = Vec::with_capacity(self.num_nodes());
        while let Some(Reverse(id)) = ready.pop() {
            order.push(id);
            for arg in self.node(id).present_outputs() {
                for user in self.consumers(arg) {
                    let uses = self.node(user).present_inputs().filter(|a| *a == arg).count();
                    if let Some(count) = pending.get_mut(&user) {
                        *count -= uses;
                        if *count == 0 {
                            pending.remove(&user);
                            ready.push(Reverse(user));
                        }
                    }
                }
            }
        }

        if !pending.is_empty() {
            let mut nodes: Vec<NodeId> = pending.into_keys().collect();
            nodes.sort();
            let nodes: Vec<String> = nodes.into_iter().map(|id| self.node(id).name.clone()).collect();
            return CycleDetectedSnafu { nodes }.fail();
        }
        Ok(order)
    }

    /// Topological order of the live nodes.
    ///
    /// # Panics
    ///
    /// Panics if the graph has a cycle; rewrites must never introduce one.
    pub fn nodes_in_topological_order(&self) -> Vec<NodeId> {
        match self.try_topological_order() {
            Ok(order) => order,
            Err(e) => panic!("graph '{}' is not a DAG: {e}", self.name()),
        }
    }

    /// Nodes reading any output of `node`, ascending by handle.
    pub fn successors(&self, node: NodeId) -> Vec<NodeId> {
        let mut out: Vec<NodeId> = self.node(node).present_outputs().flat_map(|arg| self.consumers(arg)).collect();
        out.sort();
        out.dedup();
        out
    }

    /// Producers of any input of `node`, ascending by handle.
    pub fn predecessors(&self, node: NodeId) -> Vec<NodeId> {
        let mut out: Vec<NodeId> = self.node(node).present_inputs().filter_map(|arg| self.producer(arg)).collect();
        out.sort();
        out.dedup();
        out
    }
}
