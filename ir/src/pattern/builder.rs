//! Interning pattern builder.

use std::collections::HashMap;
use std::sync::Arc;

use smallvec::SmallVec;

use super::{Pattern, PatternId, PatternKind, PatternTable};
use crate::attr::AttrValue;
use crate::graph::DOMAIN_ONNX;

/// Builds pattern tables.
///
/// Structurally identical non-leaf patterns share one id. Leaves are always
/// fresh so that two wildcards stay two independent variables; reuse an id to
/// require that both occurrences bind the same node-argument.
///
/// Malformed input (unknown child ids, empty alternations, conflicting names)
/// is a rule-author bug and panics.
#[derive(Debug, Default, Clone)]
pub struct PatternBuilder {
    kinds: Vec<PatternKind>,
    names: Vec<Option<String>>,
    intern: HashMap<PatternKind, PatternId>,
}

impl PatternBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }

    fn push(&mut self, kind: PatternKind) -> PatternId {
        for child in kind.children() {
            assert!(child.index() < self.kinds.len(), "unknown child pattern {child} (builder has {})", self.len());
        }
        if !kind.is_leaf()
            && let Some(&existing) = self.intern.get(&kind)
        {
            return existing;
        }
        let id = PatternId::from_raw(self.kinds.len() as u32);
        if !kind.is_leaf() {
            self.intern.insert(kind.clone(), id);
        }
        self.kinds.push(kind);
        self.names.push(None);
        id
    }

    pub fn wildcard(&mut self) -> PatternId {
        self.push(PatternKind::Wildcard)
    }

    pub fn constant(&mut self) -> PatternId {
        self.push(PatternKind::Constant)
    }

    pub fn graph_input(&mut self) -> PatternId {
        self.push(PatternKind::GraphInput)
    }

    /// ONNX-domain node with required operands.
    pub fn node(&mut self, op_type: &str, operands: impl IntoIterator<Item = PatternId>) -> PatternId {
        self.node_in(DOMAIN_ONNX, op_type, operands)
    }

    pub fn node_in(&mut self, domain: &str, op_type: &str, operands: impl IntoIterator<Item = PatternId>) -> PatternId {
        let mut op = self.op(op_type).domain(domain);
        for operand in operands {
            op = op.operand(operand);
        }
        op.finish()
    }

    /// Node pattern with optional operands or attribute constraints.
    pub fn op(&mut self, op_type: &str) -> NodePatternBuilder<'_> {
        NodePatternBuilder {
            builder: self,
            op_type: op_type.to_string(),
            domain: DOMAIN_ONNX.to_string(),
            operands: SmallVec::new(),
            optional: SmallVec::new(),
            attrs: Vec::new(),
        }
    }

    pub fn commutable(&mut self, op_type: &str, lhs: PatternId, rhs: PatternId) -> PatternId {
        self.commutable_in(DOMAIN_ONNX, op_type, lhs, rhs)
    }

    pub fn commutable_in(&mut self, domain: &str, op_type: &str, lhs: PatternId, rhs: PatternId) -> PatternId {
        self.push(PatternKind::Commutable { op_type: op_type.to_string(), domain: domain.to_string(), lhs, rhs })
    }

    pub fn or(&mut self, alternatives: impl IntoIterator<Item = PatternId>) -> PatternId {
        let alternatives: SmallVec<[PatternId; 4]> = alternatives.into_iter().collect();
        assert!(!alternatives.is_empty(), "empty alternation");
        self.push(PatternKind::Or(alternatives))
    }

    pub fn sequence(&mut self, items: impl IntoIterator<Item = PatternId>) -> PatternId {
        let items: SmallVec<[PatternId; 4]> = items.into_iter().collect();
        assert!(!items.is_empty(), "empty sequence");
        self.push(PatternKind::Sequence(items))
    }

    /// Attach a name to `id`; returns `id` for chaining.
    pub fn named(&mut self, id: PatternId, name: impl Into<String>) -> PatternId {
        let name = name.into();
        assert!(id.index() < self.kinds.len(), "unknown pattern {id}");
        if let Some(other) = self.names.iter().position(|n| n.as_deref() == Some(name.as_str())) {
            assert_eq!(other, id.index(), "pattern name '{name}' already used by p{other}");
        }
        if let Some(existing) = &self.names[id.index()] {
            assert_eq!(*existing, name, "pattern {id} already named '{existing}'");
        }
        self.names[id.index()] = Some(name);
        id
    }

    /// Freeze the current table with `root` as the entry point.
    ///
    /// The builder stays usable; later patterns get later ids.
    pub fn build(&self, root: PatternId) -> Pattern {
        let table = PatternTable::new(self.kinds.clone(), self.names.clone());
        Pattern::new(Arc::new(table), root)
    }
}

/// Fluent builder for one [`PatternKind::Node`].
pub struct NodePatternBuilder<'b> {
    builder: &'b mut PatternBuilder,
    op_type: String,
    domain: String,
    operands: SmallVec<[PatternId; 4]>,
    optional: SmallVec<[bool; 4]>,
    attrs: Vec<(String, AttrValue)>,
}

impl NodePatternBuilder<'_> {
    pub fn domain(mut self, domain: &str) -> Self {
        self.domain = domain.to_string();
        self
    }

    pub fn operand(mut self, id: PatternId) -> Self {
        self.operands.push(id);
        self.optional.push(false);
        self
    }

    /// Operand that may be absent in the matched node.
    pub fn optional_operand(mut self, id: PatternId) -> Self {
        self.operands.push(id);
        self.optional.push(true);
        self
    }

    /// Require attribute `name` to equal `value`.
    pub fn attr(mut self, name: &str, value: impl Into<AttrValue>) -> Self {
        self.attrs.retain(|(n, _)| n != name);
        self.attrs.push((name.to_string(), value.into()));
        self
    }

    pub fn finish(mut self) -> PatternId {
        self.attrs.sort_by(|a, b| a.0.cmp(&b.0));
        self.builder.push(PatternKind::Node {
            op_type: self.op_type,
            domain: self.domain,
            operands: self.operands,
            optional: self.optional,
            attrs: self.attrs,
        })
    }
}
