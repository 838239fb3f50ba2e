//! Pattern algebra over operator graphs.
//!
//! A pattern is a DAG of [`PatternKind`] entries stored in a [`PatternTable`]
//! and addressed by dense [`PatternId`]s. Ids are assigned in creation order,
//! so a parent always has a larger id than its children. After a successful
//! match the [`Binder`] maps every id reachable from the root to the graph
//! entity it matched.
//!
//! # Example
//!
//! ```ignore
//! // fix2float(float2fix(x))
//! let mut p = PatternBuilder::new();
//! let x = p.wildcard();
//! let x = p.named(x, "x");
//! let quant = p.node_in(DOMAIN_GRAFT, "float2fix", [x]);
//! let root = p.node_in(DOMAIN_GRAFT, "fix2float", [quant]);
//! let pattern = p.build(root);
//! ```

pub mod binary;
pub mod builder;
pub mod helpers;
pub mod matcher;
pub mod tree;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use derive_more::Display;
use serde::{Deserialize, Serialize};
use smallvec::{SmallVec, smallvec};

use crate::attr::AttrValue;
use crate::graph::OpKey;

pub use builder::{NodePatternBuilder, PatternBuilder};
pub use matcher::{Binder, BindingEntry, BindingStore, BindingStoreExt, NodeInput};

/// Dense pattern identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, Serialize, Deserialize)]
#[display("p{_0}")]
#[serde(transparent)]
pub struct PatternId(u32);

impl PatternId {
    pub const fn raw(self) -> u32 {
        self.0
    }

    pub(crate) const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

/// Pattern variants.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PatternKind {
    /// Any node-argument.
    Wildcard,
    /// An initializer or the output of a `Constant` node.
    Constant,
    /// A declared graph input.
    GraphInput,
    /// Output of a node with this op type; `optional[i]` lets operand `i` be absent.
    Node {
        op_type: String,
        domain: String,
        operands: SmallVec<[PatternId; 4]>,
        optional: SmallVec<[bool; 4]>,
        /// Attribute equality constraints, sorted by name.
        attrs: Vec<(String, AttrValue)>,
    },
    /// Output of a two-operand node whose operands may appear in either order.
    Commutable { op_type: String, domain: String, lhs: PatternId, rhs: PatternId },
    /// First alternative that matches, in declared order.
    Or(SmallVec<[PatternId; 4]>),
    /// Every item matches the same node-argument, in declared order.
    Sequence(SmallVec<[PatternId; 4]>),
}

impl PatternKind {
    pub fn children(&self) -> SmallVec<[PatternId; 4]> {
        match self {
            Self::Wildcard | Self::Constant | Self::GraphInput => SmallVec::new(),
            Self::Node { operands, .. } => operands.clone(),
            Self::Commutable { lhs, rhs, .. } => smallvec![*lhs, *rhs],
            Self::Or(items) | Self::Sequence(items) => items.clone(),
        }
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self, Self::Wildcard | Self::Constant | Self::GraphInput)
    }

    fn op_key(&self) -> Option<OpKey> {
        match self {
            Self::Node { op_type, domain, .. } | Self::Commutable { op_type, domain, .. } => {
                Some(OpKey::new(domain.clone(), op_type.clone()))
            }
            _ => None,
        }
    }
}

/// Storage shared by every [`Pattern`] built from one builder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternTable {
    kinds: Vec<PatternKind>,
    names: Vec<Option<String>>,
    by_name: HashMap<String, PatternId>,
}

impl PatternTable {
    pub(crate) fn new(kinds: Vec<PatternKind>, names: Vec<Option<String>>) -> Self {
        debug_assert_eq!(kinds.len(), names.len());
        let by_name = names
            .iter()
            .enumerate()
            .filter_map(|(i, n)| n.as_ref().map(|n| (n.clone(), PatternId(i as u32))))
            .collect();
        Self { kinds, names, by_name }
    }

    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }

    pub fn kind(&self, id: PatternId) -> &PatternKind {
        &self.kinds[id.index()]
    }

    pub fn name(&self, id: PatternId) -> Option<&str> {
        self.names[id.index()].as_deref()
    }

    pub fn find(&self, name: &str) -> Option<PatternId> {
        self.by_name.get(name).copied()
    }

    pub(crate) fn kinds(&self) -> &[PatternKind] {
        &self.kinds
    }

    pub(crate) fn names(&self) -> &[Option<String>] {
        &self.names
    }
}

/// Immutable pattern: a root inside a shared table.
///
/// Patterns never reference live graph entities and can be cached and shared
/// across passes.
#[derive(Debug, Clone)]
pub struct Pattern {
    table: Arc<PatternTable>,
    root: PatternId,
    reachable: Arc<[PatternId]>,
}

impl Pattern {
    pub(crate) fn new(table: Arc<PatternTable>, root: PatternId) -> Self {
        assert!(root.index() < table.len(), "pattern root {root} outside table of {} entries", table.len());
        let mut seen = vec![false; table.len()];
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            if !std::mem::replace(&mut seen[id.index()], true) {
                stack.extend(table.kind(id).children());
            }
        }
        let reachable = seen.iter().enumerate().filter(|(_, s)| **s).map(|(i, _)| PatternId(i as u32)).collect();
        Self { table, root, reachable }
    }

    pub fn root(&self) -> PatternId {
        self.root
    }

    pub fn table(&self) -> &Arc<PatternTable> {
        &self.table
    }

    pub fn kind(&self, id: PatternId) -> &PatternKind {
        self.table.kind(id)
    }

    pub fn name_of(&self, id: PatternId) -> Option<&str> {
        self.table.name(id)
    }

    pub fn id_of(&self, name: &str) -> Option<PatternId> {
        self.table.find(name)
    }

    /// Ids reachable from the root, ascending.
    pub fn reachable_ids(&self) -> &[PatternId] {
        &self.reachable
    }

    /// Dispatch keys of the root; `None` when the root can match any op.
    pub fn op_key(&self) -> Option<SmallVec<[OpKey; 2]>> {
        self.keys_of(self.root)
    }

    fn keys_of(&self, id: PatternId) -> Option<SmallVec<[OpKey; 2]>> {
        match self.kind(id) {
            PatternKind::Or(alts) => {
                let mut keys: SmallVec<[OpKey; 2]> = SmallVec::new();
                for alt in alts {
                    for key in self.keys_of(*alt)? {
                        if !keys.contains(&key) {
                            keys.push(key);
                        }
                    }
                }
                Some(keys)
            }
            PatternKind::Sequence(items) => items.iter().find_map(|item| self.keys_of(*item)),
            kind => kind.op_key().map(|k| smallvec![k]),
        }
    }

    fn write_expr(&self, f: &mut fmt::Formatter<'_>, id: PatternId) -> fmt::Result {
        if let Some(name) = self.name_of(id) {
            write!(f, "{name}:")?;
        }
        match self.kind(id) {
            PatternKind::Wildcard => write!(f, "_"),
            PatternKind::Constant => write!(f, "const"),
            PatternKind::GraphInput => write!(f, "input"),
            PatternKind::Node { op_type, domain, operands, optional, .. } => {
                write!(f, "{}(", OpKey::new(domain.clone(), op_type.clone()))?;
                for (i, operand) in operands.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    self.write_expr(f, *operand)?;
                    if optional[i] {
                        write!(f, "?")?;
                    }
                }
                write!(f, ")")
            }
            PatternKind::Commutable { op_type, domain, lhs, rhs } => {
                write!(f, "{}{{", OpKey::new(domain.clone(), op_type.clone()))?;
                self.write_list(f, &[*lhs, *rhs], ", ")?;
                write!(f, "}}")
            }
            PatternKind::Or(alts) => {
                write!(f, "(")?;
                self.write_list(f, alts, " | ")?;
                write!(f, ")")
            }
            PatternKind::Sequence(items) => {
                write!(f, "(")?;
                self.write_list(f, items, " & ")?;
                write!(f, ")")
            }
        }
    }

    fn write_list(&self, f: &mut fmt::Formatter<'_>, items: &[PatternId], sep: &str) -> fmt::Result {
        for (i, item) in items.iter().enumerate() {
            if i > 0 {
                write!(f, "{sep}")?;
            }
            self.write_expr(f, *item)?;
        }
        Ok(())
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write_expr(f, self.root)
    }
}

/// Same table contents and same root.
impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool {
        self.root == other.root && (Arc::ptr_eq(&self.table, &other.table) || self.table == other.table)
    }
}

impl Eq for Pattern {}
