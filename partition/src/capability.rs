//! Device-capability driven partitioning.
//!
//! A [`DeviceCapability`] says which nodes a device can run. Supported nodes
//! are grouped into connected components, and each component is offered to
//! [`try_fuse`]. Components that would need a loop through the host are
//! skipped and reported, not treated as errors.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use bon::bon;
use enumset::EnumSet;
use graft_ir::{ElemType, Graph, NodeId, OpKey};
use tracing::debug;

use crate::error::*;
use crate::fuse::{fuse, try_fuse};

/// Oracle deciding which nodes a device accepts.
pub trait DeviceCapability {
    fn name(&self) -> &str;

    fn supports(&self, graph: &Graph, node: NodeId) -> bool;
}

/// Accepts a fixed set of operators over a set of element types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpSetCapability {
    name: String,
    ops: BTreeSet<OpKey>,
    elem_types: EnumSet<ElemType>,
}

#[bon]
impl OpSetCapability {
    #[builder]
    pub fn new(
        #[builder(into)] name: String,
        #[builder(default)] ops: BTreeSet<OpKey>,
        #[builder(default = EnumSet::all())] elem_types: EnumSet<ElemType>,
    ) -> Self {
        Self { name, ops, elem_types }
    }

    /// Parse `domain::op_type` entries; entries without `::` are ONNX ops.
    pub fn from_op_list<S: AsRef<str>>(name: impl Into<String>, entries: impl IntoIterator<Item = S>) -> Self {
        let ops = entries
            .into_iter()
            .map(|entry| {
                let entry = entry.as_ref().trim();
                match entry.rsplit_once("::") {
                    Some((domain, op_type)) => OpKey::new(domain, op_type),
                    None => OpKey::onnx(entry),
                }
            })
            .collect();
        Self { name: name.into(), ops, elem_types: EnumSet::all() }
    }

    pub fn ops(&self) -> &BTreeSet<OpKey> {
        &self.ops
    }

    pub fn elem_types(&self) -> EnumSet<ElemType> {
        self.elem_types
    }
}

impl DeviceCapability for OpSetCapability {
    fn name(&self) -> &str {
        &self.name
    }

    /// Known element types of every present operand and result must be accepted.
    fn supports(&self, graph: &Graph, node: NodeId) -> bool {
        let node = graph.node(node);
        if !self.ops.contains(&node.key()) {
            return false;
        }
        node.present_inputs()
            .chain(node.present_outputs())
            .map(|arg| graph.arg(arg).ty.elem)
            .all(|elem| elem == ElemType::Undefined || self.elem_types.contains(elem))
    }
}

/// Supported nodes grouped into components connected by producer/consumer
/// edges. Each component is ascending; components are ordered by their
/// smallest node.
pub fn find_candidates(graph: &Graph, capability: &dyn DeviceCapability) -> Vec<Vec<NodeId>> {
    let supported: Vec<NodeId> = graph.node_ids().into_iter().filter(|n| capability.supports(graph, *n)).collect();
    let mut parent: HashMap<NodeId, NodeId> = supported.iter().map(|n| (*n, *n)).collect();

    fn root(parent: &mut HashMap<NodeId, NodeId>, mut node: NodeId) -> NodeId {
        while parent[&node] != node {
            let grand = parent[&parent[&node]];
            parent.insert(node, grand);
            node = grand;
        }
        node
    }

    for node in &supported {
        for next in graph.successors(*node) {
            if parent.contains_key(&next) {
                let (a, b) = (root(&mut parent, *node), root(&mut parent, next));
                if a != b {
                    parent.insert(a.max(b), a.min(b));
                }
            }
        }
    }

    let mut components: BTreeMap<NodeId, Vec<NodeId>> = BTreeMap::new();
    for node in &supported {
        let r = root(&mut parent, *node);
        components.entry(r).or_default().push(*node);
    }
    components.into_values().collect()
}

/// Outcome of one [`partition`] run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartitionReport {
    /// `(fused node name, number of covered nodes)`.
    pub fused: Vec<(String, usize)>,
    /// `(candidate name, reason)`.
    pub skipped: Vec<(String, String)>,
}

/// Boundary names of a component: args it reads from outside (initializers
/// excluded, [`try_fuse`] collects those) and args it exposes.
fn component_boundary(graph: &Graph, nodes: &[NodeId]) -> (Vec<String>, Vec<String>) {
    let inside: BTreeSet<NodeId> = nodes.iter().copied().collect();
    let mut inputs = BTreeSet::new();
    let mut outputs = BTreeSet::new();
    for node in nodes {
        let node = graph.node(*node);
        for arg in node.present_inputs() {
            if graph.producer(arg).is_none_or(|p| !inside.contains(&p)) && !graph.is_initializer(arg) {
                inputs.insert(graph.arg(arg).name.clone());
            }
        }
        for arg in node.present_outputs() {
            if graph.is_graph_output(arg) || graph.consumers(arg).iter().any(|c| !inside.contains(c)) {
                outputs.insert(graph.arg(arg).name.clone());
            }
        }
    }
    (inputs.into_iter().collect(), outputs.into_iter().collect())
}

/// Fuse every component the capability accepts.
///
/// Components rejected with "loop detected" are skipped; other fusion errors
/// propagate.
pub fn partition(graph: &mut Graph, capability: &dyn DeviceCapability) -> Result<PartitionReport> {
    let mut report = PartitionReport::default();
    let candidates = find_candidates(graph, capability);
    for (i, nodes) in candidates.iter().enumerate() {
        let name = format!("{}_{i}", capability.name());
        let (inputs, outputs) = component_boundary(graph, nodes);
        if outputs.is_empty() {
            report.skipped.push((name, "no live outputs".to_string()));
            continue;
        }
        match try_fuse(graph, &name, &inputs, &outputs, Vec::<String>::new(), capability.name()) {
            Ok(subgraph) => {
                let covered = subgraph.len();
                let node = fuse(graph, &subgraph)?;
                report.fused.push((graph.node(node).name.clone(), covered));
            }
            Err(e) if e.is_loop() => {
                debug!(candidate = %name, nodes = nodes.len(), reason = %e, "skipping partition candidate");
                report.skipped.push((name, e.comments()));
            }
            Err(e) => return Err(e.into()),
        }
    }
    Ok(report)
}
