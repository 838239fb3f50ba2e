//! NodeBuilder: the only supported way to add operator nodes from a pass.
//!
//! A builder accumulates facets (op type, inputs, attributes, output types)
//! and commits exactly one node on [`NodeBuilder::build`]. Facets can be
//! copied from existing nodes (`clone_*`) so a rule can express "same inputs,
//! new op type, same shape" without restating them.
//!
//! When the new node stands in for an existing tensor, anchor it with
//! `set_anchor_point1/2/3`; the anchor is recorded in the graph's provenance
//! log against the new node's first output, and any fix-point carried by the
//! old tensor's producer is captured before the producer goes away.
//!
//! Output type of the first output is taken from, in order: the explicit
//! `set_data_type` / `set_shape` facets, the anchored tensor's type replayed
//! through the anchor, and the first input's type.
//!
//! Violations (missing op type, missing required operand, dead input handle,
//! shape contradicting the anchor) panic: they are bugs in the calling rule.

use graft_dtype::{Dims, ElemType, TensorType, is_permutation};
use smallvec::SmallVec;

use crate::attr::{AttrValue, Attrs};
use crate::graph::schema::{self, FIX_POINT_ATTR};
use crate::graph::{ArgId, Graph, NodeDef, NodeId, OpKey};
use crate::provenance::{AnchorEvent, AnchorKind};

#[derive(Debug, Clone)]
enum OutputSlot {
    Fresh(Option<String>),
    Reuse(ArgId),
    Absent,
}

pub struct NodeBuilder<'g> {
    graph: &'g mut Graph,
    pass: String,
    name: Option<String>,
    op_type: String,
    domain: String,
    inputs: SmallVec<[Option<ArgId>; 4]>,
    attrs: Attrs,
    outputs: SmallVec<[OutputSlot; 2]>,
    elem: Option<ElemType>,
    shape: Option<Option<Dims>>,
    anchor: Option<(ArgId, AnchorKind)>,
}

impl<'g> NodeBuilder<'g> {
    pub fn new(graph: &'g mut Graph, pass: impl Into<String>) -> Self {
        Self {
            graph,
            pass: pass.into(),
            name: None,
            op_type: String::new(),
            domain: String::new(),
            inputs: SmallVec::new(),
            attrs: Attrs::new(),
            outputs: SmallVec::new(),
            elem: None,
            shape: None,
            anchor: None,
        }
    }

    pub fn set_op_type(mut self, op_type: impl Into<String>) -> Self {
        self.op_type = op_type.into();
        self
    }

    pub fn set_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = domain.into();
        self
    }

    pub fn set_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn set_input_node_args(mut self, args: impl IntoIterator<Item = ArgId>) -> Self {
        self.inputs = args.into_iter().map(Some).collect();
        self
    }

    /// Inputs are the first outputs of `nodes`.
    pub fn set_input_nodes(mut self, nodes: impl IntoIterator<Item = NodeId>) -> Self {
        let graph = &*self.graph;
        self.inputs = nodes.into_iter().map(|n| graph.node(n).output(0)).collect();
        self
    }

    pub fn append_input(mut self, arg: ArgId) -> Self {
        self.inputs.push(Some(arg));
        self
    }

    /// Leave the next operand slot empty (optional operand not supplied).
    pub fn append_absent_input(mut self) -> Self {
        self.inputs.push(None);
        self
    }

    pub fn add(mut self, name: impl Into<String>, value: impl Into<AttrValue>) -> Self {
        self.attrs.insert(name.into(), value.into());
        self
    }

    /// Op type, domain, inputs and attributes of `node`.
    pub fn clone_node(self, node: NodeId) -> Self {
        self.clone_op_type(node).clone_inputs(node).clone_attrs(node)
    }

    pub fn clone_inputs(mut self, node: NodeId) -> Self {
        self.inputs = self.graph.node(node).inputs.clone();
        self
    }

    pub fn clone_attrs(mut self, node: NodeId) -> Self {
        self.attrs = self.graph.node(node).attrs.clone();
        self
    }

    pub fn clone_op_type(mut self, node: NodeId) -> Self {
        let node = self.graph.node(node);
        self.op_type = node.op_type.clone();
        self.domain = node.domain.clone();
        self
    }

    pub fn clone_shape(mut self, arg: ArgId) -> Self {
        self.shape = Some(self.graph.arg(arg).ty.shape.clone());
        self
    }

    pub fn clone_data_type(mut self, arg: ArgId) -> Self {
        self.elem = Some(self.graph.arg(arg).ty.elem);
        self
    }

    pub fn set_shape(mut self, shape: impl IntoIterator<Item = i64>) -> Self {
        self.shape = Some(Some(shape.into_iter().collect()));
        self
    }

    pub fn set_data_type(mut self, elem: ElemType) -> Self {
        self.elem = Some(elem);
        self
    }

    /// Add an output with an explicit name.
    pub fn add_output(mut self, name: impl Into<String>) -> Self {
        self.outputs.push(OutputSlot::Fresh(Some(name.into())));
        self
    }

    /// Add an output with a generated name.
    pub fn add_fresh_output(mut self) -> Self {
        self.outputs.push(OutputSlot::Fresh(None));
        self
    }

    /// Produce an existing arg whose producer has been removed.
    pub fn reuse_output(mut self, arg: ArgId) -> Self {
        self.outputs.push(OutputSlot::Reuse(arg));
        self
    }

    /// Leave the next output slot empty.
    pub fn skip_optional_output(mut self) -> Self {
        self.outputs.push(OutputSlot::Absent);
        self
    }

    /// The new node replaces `old` outright.
    pub fn set_anchor_point1(mut self, old: ArgId) -> Self {
        self.anchor = Some((old, AnchorKind::Identity));
        self
    }

    /// The new node carries `old` with a metadata record (transpose order, fix-point, custom bag).
    pub fn set_anchor_point2(mut self, old: ArgId, kind: AnchorKind) -> Self {
        assert!(
            !matches!(kind, AnchorKind::Identity | AnchorKind::Reshape { .. }),
            "set_anchor_point2 takes a metadata anchor, got {kind}"
        );
        self.anchor = Some((old, kind));
        self
    }

    /// The new node holds `old`'s data with an explicit new shape.
    pub fn set_anchor_point3(mut self, old: ArgId, shape: impl IntoIterator<Item = i64>) -> Self {
        self.anchor = Some((old, AnchorKind::reshape(shape)));
        self
    }

    pub fn build(self) -> NodeId {
        self.build_ex().0
    }

    /// Commit the node; returns it together with its output slots.
    pub fn build_ex(mut self) -> (NodeId, SmallVec<[Option<ArgId>; 2]>) {
        let key = OpKey::new(self.domain.clone(), self.op_type.clone());
        assert!(!self.op_type.is_empty(), "pass '{}' built a node without op type", self.pass);
        if let Some(schema) = schema::lookup(&self.domain, &self.op_type) {
            assert!(
                self.inputs.len() <= schema.max_inputs,
                "pass '{}': {key} takes at most {} inputs, got {}",
                self.pass,
                schema.max_inputs,
                self.inputs.len()
            );
            for slot in 0..schema.min_inputs {
                assert!(
                    self.inputs.get(slot).copied().flatten().is_some(),
                    "pass '{}': required operand {slot} of {key} is missing",
                    self.pass
                );
            }
        }
        for arg in self.inputs.iter().flatten() {
            assert!(self.graph.contains_arg(*arg), "pass '{}': input {arg} of {key} is not live", self.pass);
        }
        if let Some((old, kind)) = &self.anchor {
            assert!(self.graph.contains_arg(*old), "pass '{}': anchor {old} of {key} is not live", self.pass);
            if let AnchorKind::Transpose { order } = kind {
                let rank = self.graph.arg(*old).ty.rank();
                assert!(
                    is_permutation(order) && rank.is_none_or(|rank| rank == order.len()),
                    "pass '{}': transpose anchor {order:?} of {key} does not permute a rank {rank:?} tensor",
                    self.pass
                );
            }
        }

        let primary = self.primary_type(&key);
        let name = match self.name.take() {
            Some(name) => name,
            None => self.graph.fresh_node_name(&format!("{}/{}", self.pass, self.op_type)),
        };
        if self.outputs.is_empty() {
            self.outputs.push(OutputSlot::Fresh(None));
        }

        let mut outputs: SmallVec<[Option<ArgId>; 2]> = SmallVec::new();
        for (i, slot) in std::mem::take(&mut self.outputs).into_iter().enumerate() {
            let ty = if i == 0 { primary.clone() } else { TensorType::unknown(ElemType::Undefined) };
            let arg = match slot {
                OutputSlot::Absent => None,
                OutputSlot::Reuse(arg) => {
                    if i == 0 && primary.elem != ElemType::Undefined {
                        self.graph.set_arg_type(arg, primary.clone());
                    }
                    Some(arg)
                }
                OutputSlot::Fresh(arg_name) => {
                    let arg_name = arg_name.unwrap_or_else(|| self.graph.fresh_arg_name(&format!("{name}:{i}")));
                    let arg = self
                        .graph
                        .new_arg(arg_name, ty)
                        .unwrap_or_else(|e| panic!("pass '{}': output {i} of '{name}': {e}", self.pass));
                    Some(arg)
                }
            };
            outputs.push(arg);
        }

        let def = NodeDef {
            name: name.clone(),
            op_type: std::mem::take(&mut self.op_type),
            domain: std::mem::take(&mut self.domain),
            inputs: std::mem::take(&mut self.inputs),
            outputs: outputs.clone(),
            attrs: std::mem::take(&mut self.attrs),
        };
        let id = self.graph.add_node(def).unwrap_or_else(|e| panic!("pass '{}': cannot add '{name}': {e}", self.pass));

        if let Some((old, kind)) = self.anchor.take()
            && let Some(out) = outputs.first().copied().flatten()
        {
            self.capture_fix_point(old);
            let event = AnchorEvent { from: Some(old), kind, pass: self.pass.clone() };
            self.graph.provenance_mut().record(out, event);
        }
        tracing::debug!(pass = %self.pass, node = %name, op = %key, "node built");
        (id, outputs)
    }

    fn primary_type(&self, key: &OpKey) -> TensorType {
        let anchored = self.anchor.as_ref().map(|(old, kind)| {
            let ty = &self.graph.arg(*old).ty;
            TensorType { elem: ty.elem, shape: kind.replay_shape(ty.shape.clone()) }
        });
        let input = self.inputs.first().copied().flatten().map(|arg| self.graph.arg(arg).ty.clone());

        let elem = self
            .elem
            .or(anchored.as_ref().map(|t| t.elem).filter(|e| *e != ElemType::Undefined))
            .or(input.as_ref().map(|t| t.elem))
            .unwrap_or(ElemType::Undefined);

        let anchored_shape = anchored.and_then(|t| t.shape);
        let shape = match &self.shape {
            Some(explicit) => {
                if let (Some(explicit), Some(anchored)) = (explicit, &anchored_shape) {
                    assert_eq!(
                        explicit, anchored,
                        "pass '{}': shape of {key} conflicts with its anchor",
                        self.pass
                    );
                }
                explicit.clone()
            }
            None => anchored_shape.or(input.and_then(|t| t.shape)),
        };
        TensorType { elem, shape }
    }

    /// Move a fix-point held as a producer attribute into the log so it
    /// survives the producer's removal.
    fn capture_fix_point(&mut self, old: ArgId) {
        if self.graph.provenance().fix_point(old).is_some() {
            return;
        }
        let attr = self.graph.producer(old).and_then(|p| self.graph.node(p).attr_int(FIX_POINT_ATTR));
        if let Some(fix_point) = attr {
            let pass = self.pass.clone();
            self.graph.provenance_mut().annotate(old, AnchorKind::FixPoint { fix_point }, pass);
        }
    }
}

impl Graph {
    /// Fix-point of `arg`: its producer's `fix_point` attribute, else the
    /// latest one along its provenance chain.
    pub fn fix_point(&self, arg: ArgId) -> Option<i64> {
        self.producer(arg)
            .and_then(|p| self.node(p).attr_int(FIX_POINT_ATTR))
            .or_else(|| self.provenance().fix_point(arg))
    }
}
