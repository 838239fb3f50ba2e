//! Arena graph of operator nodes and node-arguments.
//!
//! Nodes and node-arguments live in append-only arenas addressed by [`NodeId`]
//! and [`ArgId`]. Handles are allocated monotonically and never reused, so a
//! handle held across a mutation either still names the same entity or names
//! a tombstone. Producer and consumer indices are updated by every mutation.
//!
//! Accessors taking a handle (`node`, `arg`) panic on tombstones; that is a
//! rule-author bug, not a runtime condition. Use the `try_*` variants when a
//! handle may have been invalidated by an earlier rewrite.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use derive_more::Display;
use graft_dtype::TensorType;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use snafu::{OptionExt, ensure};

use crate::attr::{AttrValue, Attrs};
use crate::error::*;
use crate::provenance::ProvenanceLog;
use crate::tensor::ConstTensor;

pub mod io;
pub mod resolve;
pub mod schema;
pub mod topo;

pub use schema::{DOMAIN_GRAFT, DOMAIN_ONNX, OpSchema};

/// Stable node handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, Serialize, Deserialize)]
#[display("n{_0}")]
pub struct NodeId(u32);

/// Stable node-argument handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, Serialize, Deserialize)]
#[display("a{_0}")]
pub struct ArgId(u32);

impl NodeId {
    pub const fn raw(self) -> u32 {
        self.0
    }

    fn index(self) -> usize {
        self.0 as usize
    }
}

impl ArgId {
    pub const fn raw(self) -> u32 {
        self.0
    }

    fn index(self) -> usize {
        self.0 as usize
    }
}

/// Operator dispatch key: `(domain, op_type)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OpKey {
    pub domain: String,
    pub op_type: String,
}

impl OpKey {
    pub fn new(domain: impl Into<String>, op_type: impl Into<String>) -> Self {
        Self { domain: domain.into(), op_type: op_type.into() }
    }

    pub fn onnx(op_type: impl Into<String>) -> Self {
        Self::new(DOMAIN_ONNX, op_type)
    }
}

impl fmt::Display for OpKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.domain.is_empty() {
            write!(f, "{}", self.op_type)
        } else {
            write!(f, "{}::{}", self.domain, self.op_type)
        }
    }
}

/// Typed edge of the graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeArg {
    pub id: ArgId,
    pub name: String,
    pub ty: TensorType,
}

/// Operator node. Absent optional operands and outputs are `None`.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub id: NodeId,
    pub name: String,
    pub op_type: String,
    pub domain: String,
    pub inputs: SmallVec<[Option<ArgId>; 4]>,
    pub outputs: SmallVec<[Option<ArgId>; 2]>,
    pub attrs: Attrs,
}

impl Node {
    pub fn key(&self) -> OpKey {
        OpKey::new(self.domain.clone(), self.op_type.clone())
    }

    pub fn is_op(&self, domain: &str, op_type: &str) -> bool {
        self.domain == domain && self.op_type == op_type
    }

    pub fn input(&self, slot: usize) -> Option<ArgId> {
        self.inputs.get(slot).copied().flatten()
    }

    pub fn output(&self, slot: usize) -> Option<ArgId> {
        self.outputs.get(slot).copied().flatten()
    }

    pub fn present_inputs(&self) -> impl Iterator<Item = ArgId> + '_ {
        self.inputs.iter().flatten().copied()
    }

    pub fn present_outputs(&self) -> impl Iterator<Item = ArgId> + '_ {
        self.outputs.iter().flatten().copied()
    }

    pub fn attr(&self, name: &str) -> Option<&AttrValue> {
        self.attrs.get(name)
    }

    pub fn attr_int(&self, name: &str) -> Option<i64> {
        self.attrs.get(name).and_then(AttrValue::as_int)
    }

    pub fn attr_ints(&self, name: &str) -> Option<&[i64]> {
        self.attrs.get(name).and_then(AttrValue::as_ints)
    }
}

/// Description of a node to insert with [`Graph::add_node`].
///
/// Passes go through [`crate::NodeBuilder`]; this is the raw form used by the
/// builder, the model loader and the fusion engine.
#[derive(Debug, Clone, Default)]
pub struct NodeDef {
    pub name: String,
    pub op_type: String,
    pub domain: String,
    pub inputs: SmallVec<[Option<ArgId>; 4]>,
    pub outputs: SmallVec<[Option<ArgId>; 2]>,
    pub attrs: Attrs,
}

#[derive(Debug, Clone, Default)]
pub struct Graph {
    name: String,
    nodes: Vec<Option<Node>>,
    args: Vec<Option<NodeArg>>,
    node_by_name: HashMap<String, NodeId>,
    arg_by_name: HashMap<String, ArgId>,
    producers: HashMap<ArgId, NodeId>,
    /// Consumer node -> number of input slots reading the arg.
    consumers: HashMap<ArgId, BTreeMap<NodeId, u32>>,
    inputs: Vec<ArgId>,
    outputs: Vec<ArgId>,
    initializers: BTreeMap<ArgId, ConstTensor>,
    provenance: ProvenanceLog,
}

impl Graph {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), ..Default::default() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    // =========================================================================
    // Node-arguments
    // =========================================================================

    /// Create a node-argument with no producer and no consumers.
    pub fn new_arg(&mut self, name: impl Into<String>, ty: TensorType) -> Result<ArgId> {
        let name = name.into();
        ensure!(!self.arg_by_name.contains_key(&name), DuplicateNodeArgSnafu { name });
        let id = ArgId(self.args.len() as u32);
        self.arg_by_name.insert(name.clone(), id);
        self.args.push(Some(NodeArg { id, name, ty }));
        Ok(id)
    }

    /// Declare a graph input.
    pub fn add_input(&mut self, name: impl Into<String>, ty: TensorType) -> Result<ArgId> {
        let id = self.new_arg(name, ty)?;
        self.inputs.push(id);
        Ok(id)
    }

    /// Declare a constant initializer; the arg type is taken from the tensor.
    pub fn add_initializer(&mut self, name: impl Into<String>, tensor: ConstTensor) -> Result<ArgId> {
        let name = name.into();
        tensor.validate(&name)?;
        let id = self.new_arg(name, tensor.tensor_type())?;
        self.initializers.insert(id, tensor);
        Ok(id)
    }

    /// Replace the payload of an initializer (or turn an unproduced arg into one).
    pub fn set_initializer(&mut self, arg: ArgId, tensor: ConstTensor) {
        assert!(self.producers.get(&arg).is_none(), "cannot make produced arg {} an initializer", self.arg(arg).name);
        self.arg_mut(arg).ty = tensor.tensor_type();
        self.initializers.insert(arg, tensor);
    }

    pub fn remove_initializer(&mut self, arg: ArgId) -> Option<ConstTensor> {
        self.initializers.remove(&arg)
    }

    /// Append `arg` to the graph outputs unless it is already one.
    pub fn add_output(&mut self, arg: ArgId) {
        assert!(self.contains_arg(arg), "stale arg handle {arg}");
        if !self.outputs.contains(&arg) {
            self.outputs.push(arg);
        }
    }

    pub fn arg(&self, id: ArgId) -> &NodeArg {
        self.try_arg(id).unwrap_or_else(|| panic!("stale arg handle {id}"))
    }

    pub fn try_arg(&self, id: ArgId) -> Option<&NodeArg> {
        self.args.get(id.index()).and_then(Option::as_ref)
    }

    fn arg_mut(&mut self, id: ArgId) -> &mut NodeArg {
        self.args.get_mut(id.index()).and_then(Option::as_mut).unwrap_or_else(|| panic!("stale arg handle {id}"))
    }

    pub fn contains_arg(&self, id: ArgId) -> bool {
        self.try_arg(id).is_some()
    }

    pub fn set_arg_type(&mut self, id: ArgId, ty: TensorType) {
        self.arg_mut(id).ty = ty;
    }

    pub fn args(&self) -> impl Iterator<Item = &NodeArg> {
        self.args.iter().flatten()
    }

    pub fn num_args(&self) -> usize {
        self.arg_by_name.len()
    }

    /// A name derived from `base` that no live arg uses.
    pub fn fresh_arg_name(&self, base: &str) -> String {
        fresh_name(base, |n| self.arg_by_name.contains_key(n))
    }

    /// A name derived from `base` that no live node uses.
    pub fn fresh_node_name(&self, base: &str) -> String {
        fresh_name(base, |n| self.node_by_name.contains_key(n))
    }

    fn rename_arg(&mut self, id: ArgId, name: String) {
        let old = std::mem::replace(&mut self.arg_mut(id).name, name.clone());
        self.arg_by_name.remove(&old);
        self.arg_by_name.insert(name, id);
    }

    pub(crate) fn remove_arg(&mut self, id: ArgId) {
        if let Some(arg) = self.args.get_mut(id.index()).and_then(Option::take) {
            self.arg_by_name.remove(&arg.name);
            self.initializers.remove(&id);
            self.producers.remove(&id);
            self.consumers.remove(&id);
        }
    }

    // =========================================================================
    // Nodes
    // =========================================================================

    /// Insert a node. An empty name is replaced by a fresh one derived from the op type.
    pub fn add_node(&mut self, def: NodeDef) -> Result<NodeId> {
        let name = if def.name.is_empty() { self.fresh_node_name(&def.op_type) } else { def.name };
        ensure!(!self.node_by_name.contains_key(&name), DuplicateNodeSnafu { name });

        for arg in def.inputs.iter().flatten() {
            ensure!(self.contains_arg(*arg), UnknownNodeArgSnafu { name: arg.to_string() });
        }
        for arg in def.outputs.iter().flatten() {
            let arg_name = &self.try_arg(*arg).context(UnknownNodeArgSnafu { name: arg.to_string() })?.name;
            if let Some(producer) = self.producers.get(arg) {
                return ArgAlreadyProducedSnafu { name: arg_name, producer: &self.node(*producer).name }.fail();
            }
            if self.is_graph_input(*arg) || self.is_initializer(*arg) {
                return ArgAlreadyProducedSnafu { name: arg_name, producer: "<graph>" }.fail();
            }
        }

        let id = NodeId(self.nodes.len() as u32);
        for arg in def.inputs.iter().flatten() {
            *self.consumers.entry(*arg).or_default().entry(id).or_default() += 1;
        }
        for arg in def.outputs.iter().flatten() {
            self.producers.insert(*arg, id);
        }
        tracing::trace!(node = %name, op = %def.op_type, id = %id, "add node");
        self.node_by_name.insert(name.clone(), id);
        self.nodes.push(Some(Node {
            id,
            name,
            op_type: def.op_type,
            domain: def.domain,
            inputs: def.inputs,
            outputs: def.outputs,
            attrs: def.attrs,
        }));
        Ok(id)
    }

    /// Remove a node. Its output args stay alive (without producer) until [`Graph::gc`].
    pub fn remove_node(&mut self, id: NodeId) -> Node {
        let node =
            self.nodes.get_mut(id.index()).and_then(Option::take).unwrap_or_else(|| panic!("stale node handle {id}"));
        tracing::trace!(node = %node.name, id = %id, "remove node");
        self.node_by_name.remove(&node.name);
        for arg in node.present_outputs() {
            self.producers.remove(&arg);
        }
        for arg in node.present_inputs() {
            self.drop_consumer(arg, id);
        }
        node
    }

    fn drop_consumer(&mut self, arg: ArgId, node: NodeId) {
        if let Some(users) = self.consumers.get_mut(&arg) {
            if let Some(count) = users.get_mut(&node) {
                *count -= 1;
                if *count == 0 {
                    users.remove(&node);
                }
            }
            if users.is_empty() {
                self.consumers.remove(&arg);
            }
        }
    }

    pub fn node(&self, id: NodeId) -> &Node {
        self.try_node(id).unwrap_or_else(|| panic!("stale node handle {id}"))
    }

    pub fn try_node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.index()).and_then(Option::as_ref)
    }

    pub fn contains_node(&self, id: NodeId) -> bool {
        self.try_node(id).is_some()
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter().flatten()
    }

    /// Live node handles in allocation order.
    pub fn node_ids(&self) -> Vec<NodeId> {
        self.nodes().map(|n| n.id).collect()
    }

    pub fn num_nodes(&self) -> usize {
        self.node_by_name.len()
    }

    /// Rewire one input slot of a node. `None` marks the operand absent.
    pub fn set_input(&mut self, node: NodeId, slot: usize, arg: Option<ArgId>) {
        if let Some(arg) = arg {
            assert!(self.contains_arg(arg), "stale arg handle {arg}");
        }
        let slots = &mut self.nodes[node.index()].as_mut().unwrap_or_else(|| panic!("stale node handle {node}")).inputs;
        if slots.len() <= slot {
            slots.resize(slot + 1, None);
        }
        let previous = std::mem::replace(&mut slots[slot], arg);
        if let Some(previous) = previous {
            self.drop_consumer(previous, node);
        }
        if let Some(arg) = arg {
            *self.consumers.entry(arg).or_default().entry(node).or_default() += 1;
        }
    }

    /// Point every consumer of `old` at `new`.
    ///
    /// When `old` is a graph output, `new` takes over its output slot and, when
    /// `new` is an internal arg, its name, so the graph interface is unchanged.
    pub fn replace_all_uses(&mut self, old: ArgId, new: ArgId) {
        assert!(self.contains_arg(old) && self.contains_arg(new), "stale arg handle in replace_all_uses({old}, {new})");
        if old == new {
            return;
        }
        let users: Vec<NodeId> = self.consumers(old);
        for user in users {
            let slots: SmallVec<[usize; 4]> = self
                .node(user)
                .inputs
                .iter()
                .enumerate()
                .filter_map(|(i, a)| (*a == Some(old)).then_some(i))
                .collect();
            for slot in slots {
                self.set_input(user, slot, Some(new));
            }
        }

        if self.is_graph_output(old) {
            let was_output = self.is_graph_output(new);
            for slot in self.outputs.iter_mut().filter(|o| **o == old) {
                *slot = new;
            }
            if !was_output && !self.is_graph_input(new) && !self.is_initializer(new) {
                let old_name = self.arg(old).name.clone();
                let parked = self.fresh_arg_name(&format!("{old_name}_replaced"));
                self.rename_arg(old, parked);
                self.rename_arg(new, old_name);
            }
        }
    }

    // =========================================================================
    // Queries
    // =========================================================================

    pub fn find_node(&self, name: &str) -> Option<NodeId> {
        self.node_by_name.get(name).copied()
    }

    pub fn find_node_arg(&self, name: &str) -> Option<ArgId> {
        self.arg_by_name.get(name).copied()
    }

    /// Producer of the named arg.
    pub fn producer_node(&self, name: &str) -> Option<NodeId> {
        self.find_node_arg(name).and_then(|arg| self.producer(arg))
    }

    /// Consumers of the named arg, ascending by handle.
    pub fn consumer_nodes(&self, name: &str) -> Vec<NodeId> {
        self.find_node_arg(name).map(|arg| self.consumers(arg)).unwrap_or_default()
    }

    pub fn producer(&self, arg: ArgId) -> Option<NodeId> {
        self.producers.get(&arg).copied()
    }

    /// Distinct consumers of `arg`, ascending by handle.
    pub fn consumers(&self, arg: ArgId) -> Vec<NodeId> {
        self.consumers.get(&arg).map(|users| users.keys().copied().collect()).unwrap_or_default()
    }

    pub fn has_consumers(&self, arg: ArgId) -> bool {
        self.consumers.contains_key(&arg)
    }

    pub fn inputs(&self) -> &[ArgId] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[ArgId] {
        &self.outputs
    }

    pub fn is_graph_input(&self, arg: ArgId) -> bool {
        self.inputs.contains(&arg)
    }

    pub fn is_graph_output(&self, arg: ArgId) -> bool {
        self.outputs.contains(&arg)
    }

    pub fn is_initializer(&self, arg: ArgId) -> bool {
        self.initializers.contains_key(&arg)
    }

    pub fn initializer(&self, arg: ArgId) -> Option<&ConstTensor> {
        self.initializers.get(&arg)
    }

    pub fn initializers(&self) -> impl Iterator<Item = (ArgId, &ConstTensor)> {
        self.initializers.iter().map(|(id, t)| (*id, t))
    }

    /// Initializer or output of a `Constant` node.
    pub fn is_constant(&self, arg: ArgId) -> bool {
        self.constant_value(arg).is_some()
    }

    pub fn constant_value(&self, arg: ArgId) -> Option<&ConstTensor> {
        if let Some(tensor) = self.initializers.get(&arg) {
            return Some(tensor);
        }
        let producer = self.node(self.producer(arg)?);
        if producer.is_op(DOMAIN_ONNX, "Constant") {
            return producer.attr("value").and_then(AttrValue::as_tensor);
        }
        None
    }

    pub fn provenance(&self) -> &ProvenanceLog {
        &self.provenance
    }

    pub fn provenance_mut(&mut self) -> &mut ProvenanceLog {
        &mut self.provenance
    }
}

fn fresh_name(base: &str, taken: impl Fn(&str) -> bool) -> String {
    if !base.is_empty() && !taken(base) {
        return base.to_string();
    }
    (1..).map(|i| format!("{base}_{i}")).find(|n| !taken(n)).unwrap_or_default()
}
