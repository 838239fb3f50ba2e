//! Index validation, type propagation and garbage collection.

use std::collections::{BTreeMap, HashMap, HashSet};

use graft_dtype::{Dims, ElemType, TensorType, permute_shape};

use super::{ArgId, Graph, NodeId, schema};
use crate::error::{DanglingInputSnafu, Result};

impl Graph {
    /// Re-validate the graph after a batch of mutations.
    ///
    /// Cross-checks the incremental producer/consumer indices against the node
    /// arena (a mismatch is an engine bug and panics), rejects inputs that have
    /// no source and cycles, then fills in unknown output types of ops whose
    /// output type follows from their input.
    pub fn resolve(&mut self) -> Result<()> {
        self.check_indices();

        for node in self.nodes() {
            for arg in node.present_inputs() {
                if self.producer(arg).is_none() && !self.is_graph_input(arg) && !self.is_initializer(arg) {
                    return DanglingInputSnafu { node: &node.name, input: &self.arg(arg).name }.fail();
                }
            }
        }

        let order = self.try_topological_order()?;
        let mut inferred = 0usize;
        for id in order {
            if let Some((out, ty)) = self.infer_output_type(id) {
                self.set_arg_type(out, ty);
                inferred += 1;
            }
        }
        tracing::debug!(graph = %self.name(), nodes = self.num_nodes(), inferred, "graph resolved");
        Ok(())
    }

    fn check_indices(&self) {
        let mut producers: HashMap<ArgId, NodeId> = HashMap::new();
        let mut consumers: HashMap<ArgId, BTreeMap<NodeId, u32>> = HashMap::new();
        for node in self.nodes() {
            for arg in node.present_outputs() {
                if let Some(other) = producers.insert(arg, node.id) {
                    panic!("arg {} produced by both {} and {}", self.arg(arg).name, self.node(other).name, node.name);
                }
            }
            for arg in node.present_inputs() {
                *consumers.entry(arg).or_default().entry(node.id).or_default() += 1;
            }
        }
        assert_eq!(producers, self.producers, "producer index out of sync in graph '{}'", self.name());
        assert_eq!(consumers, self.consumers, "consumer index out of sync in graph '{}'", self.name());
    }

    fn infer_output_type(&self, id: NodeId) -> Option<(ArgId, TensorType)> {
        let node = self.node(id);
        let out = node.output(0)?;
        let current = &self.arg(out).ty;
        if current.elem != ElemType::Undefined && current.shape.is_some() {
            return None;
        }
        let input = &self.arg(node.input(0)?).ty;

        let derived = if schema::lookup(&node.domain, &node.op_type).is_some_and(|s| s.preserves_type) {
            input.clone()
        } else if node.is_op(schema::DOMAIN_ONNX, "Transpose") {
            let shape = match (&input.shape, node.attr_ints("perm")) {
                (Some(shape), Some(perm)) => permute_shape(shape, perm),
                (Some(shape), None) => Some(shape.iter().rev().copied().collect()),
                _ => None,
            };
            TensorType { elem: input.elem, shape }
        } else if node.is_op(schema::DOMAIN_ONNX, "Reshape") {
            let shape = node.input(1).and_then(|s| self.constant_value(s)).and_then(|c| c.as_i64("shape").ok());
            let shape: Option<Dims> = shape.filter(|s| s.iter().all(|&d| d > 0)).map(|s| s.iter().copied().collect());
            TensorType { elem: input.elem, shape }
        } else {
            return None;
        };

        let merged = TensorType {
            elem: if current.elem == ElemType::Undefined { derived.elem } else { current.elem },
            shape: current.shape.clone().or(derived.shape),
        };
        (merged != *current).then_some((out, merged))
    }

    /// Remove dead nodes, then orphaned args, then provenance nobody can reach.
    ///
    /// A node is dead when none of its outputs is consumed or a graph output.
    /// Returns the number of removed nodes.
    pub fn gc(&mut self) -> usize {
        let mut removed = 0;
        loop {
            let dead: Vec<NodeId> = self
                .nodes()
                .filter(|n| n.present_outputs().all(|a| !self.has_consumers(a) && !self.is_graph_output(a)))
                .map(|n| n.id)
                .collect();
            if dead.is_empty() {
                break;
            }
            for id in dead {
                self.remove_node(id);
                removed += 1;
            }
        }

        let orphans: Vec<ArgId> = self
            .args()
            .map(|a| a.id)
            .filter(|&a| {
                self.producer(a).is_none()
                    && !self.has_consumers(a)
                    && !self.is_graph_input(a)
                    && !self.is_graph_output(a)
            })
            .collect();
        for &arg in &orphans {
            self.remove_arg(arg);
        }

        let live: HashSet<ArgId> = self.args().map(|a| a.id).collect();
        let pruned = self.provenance.retain_reachable(&live);
        tracing::debug!(removed_nodes = removed, removed_args = orphans.len(), pruned_provenance = pruned, "gc");
        removed
    }
}
