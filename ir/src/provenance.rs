//! Anchor-point provenance for node-arguments.
//!
//! When a rewrite replaces a tensor, the replacement is anchored to the arg it
//! stands in for. Each anchor is an append-only event on the new arg:
//!
//! - `Identity` (point 1): same shape and meaning, the old arg is replaced outright
//! - `Transpose`, `FixPoint`, `Custom` (point 2): same tensor with a metadata record
//! - `Reshape` (point 3): same data with an explicit new shape
//!
//! Events with no `from` annotate the tensor itself (e.g. the fix-point of a
//! folded constant). Queries walk the log functionally; nothing is mutated
//! after it is recorded.
//!
//! The log lives in the [`crate::Graph`]; [`crate::Graph::gc`] drops entries
//! that no live arg can reach.

use std::collections::{HashMap, HashSet};
use std::fmt;

use derive_more::Display;
use graft_dtype::{Dims, compose_permutations, is_identity_permutation, permute_shape};
use serde::{Deserialize, Serialize};

use crate::attr::{AttrValue, Attrs};
use crate::graph::ArgId;

/// Transform recorded by an anchor.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
pub enum AnchorKind {
    #[display("identity")]
    Identity,
    /// `order` is a permutation of the annotated tensor's rank.
    #[display("transpose{order:?}")]
    Transpose { order: Dims },
    #[display("fix_point({fix_point})")]
    FixPoint { fix_point: i64 },
    #[display("{op_type}{attrs:?}")]
    Custom { op_type: String, attrs: Attrs },
    #[display("reshape{shape:?}")]
    Reshape { shape: Dims },
}

impl AnchorKind {
    pub fn transpose(order: impl IntoIterator<Item = i64>) -> Self {
        Self::Transpose { order: order.into_iter().collect() }
    }

    pub fn reshape(shape: impl IntoIterator<Item = i64>) -> Self {
        Self::Reshape { shape: shape.into_iter().collect() }
    }

    pub fn custom<K: Into<String>>(
        op_type: impl Into<String>,
        attrs: impl IntoIterator<Item = (K, AttrValue)>,
    ) -> Self {
        Self::Custom { op_type: op_type.into(), attrs: attrs.into_iter().map(|(k, v)| (k.into(), v)).collect() }
    }

    /// Shape of the anchored tensor given the shape of the tensor it derives from.
    pub fn replay_shape(&self, shape: Option<Dims>) -> Option<Dims> {
        match self {
            Self::Identity | Self::FixPoint { .. } | Self::Custom { .. } => shape,
            Self::Transpose { order } => permute_shape(&shape?, order),
            Self::Reshape { shape } => Some(shape.clone()),
        }
    }
}

/// One provenance record on an arg.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnchorEvent {
    pub from: Option<ArgId>,
    pub kind: AnchorKind,
    pub pass: String,
}

impl fmt::Display for AnchorEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.from {
            Some(from) => write!(f, "{} from {} by {}", self.kind, from, self.pass),
            None => write!(f, "{} by {}", self.kind, self.pass),
        }
    }
}

/// Flattened provenance: the root arg plus the transforms applied since, oldest first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AnchorPoint {
    pub origin: Option<ArgId>,
    pub steps: Vec<AnchorKind>,
}

impl AnchorPoint {
    pub fn new(origin: Option<ArgId>, steps: impl IntoIterator<Item = AnchorKind>) -> Self {
        Self { origin, steps: steps.into_iter().collect() }
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// `self` followed by `other`. Concatenation, hence associative.
    pub fn append(&self, other: &AnchorPoint) -> AnchorPoint {
        let mut steps = self.steps.clone();
        steps.extend(other.steps.iter().cloned());
        AnchorPoint { origin: self.origin.or(other.origin), steps }
    }

    /// Normal form of the step list.
    ///
    /// Identities and identity transposes vanish, adjacent transposes of equal
    /// rank compose (and vanish when the result is the identity permutation),
    /// and of two adjacent reshapes or two adjacent fix-points only the later
    /// survives.
    ///
    /// Replaying the normal form gives the same shape as replaying `self` when
    /// the chain is rank-consistent, i.e. every transpose order has the rank of
    /// the tensor it is applied to. A rank-mismatched transpose replays to an
    /// unknown shape, which dropping an identity transpose would hide.
    pub fn optimize(&self) -> AnchorPoint {
        let mut out: Vec<AnchorKind> = Vec::with_capacity(self.steps.len());
        for step in &self.steps {
            match (out.last(), step) {
                (_, AnchorKind::Identity) => {}
                (_, AnchorKind::Transpose { order }) if is_identity_permutation(order) => {}
                (Some(AnchorKind::Transpose { order: prev }), AnchorKind::Transpose { order }) => {
                    match compose_permutations(prev, order) {
                        Some(composed) => {
                            out.pop();
                            if !is_identity_permutation(&composed) {
                                out.push(AnchorKind::Transpose { order: composed });
                            }
                        }
                        None => out.push(step.clone()),
                    }
                }
                (Some(AnchorKind::Reshape { .. }), AnchorKind::Reshape { .. })
                | (Some(AnchorKind::FixPoint { .. }), AnchorKind::FixPoint { .. }) => {
                    out.pop();
                    out.push(step.clone());
                }
                _ => out.push(step.clone()),
            }
        }
        AnchorPoint { origin: self.origin, steps: out }
    }

    /// Shape after replaying every step on `shape`.
    pub fn replay_shape(&self, shape: Option<Dims>) -> Option<Dims> {
        self.steps.iter().fold(shape, |acc, step| step.replay_shape(acc))
    }

    /// Latest fix-point along the steps.
    pub fn fix_point(&self) -> Option<i64> {
        self.steps.iter().rev().find_map(|s| match s {
            AnchorKind::FixPoint { fix_point } => Some(*fix_point),
            _ => None,
        })
    }
}

impl fmt::Display for AnchorPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.origin {
            Some(origin) => write!(f, "{origin}")?,
            None => write!(f, "?")?,
        }
        for step in &self.steps {
            write!(f, " -> {step}")?;
        }
        Ok(())
    }
}

/// Append-only log `ArgId -> [AnchorEvent]`.
#[derive(Debug, Clone, Default)]
pub struct ProvenanceLog {
    events: HashMap<ArgId, Vec<AnchorEvent>>,
}

impl ProvenanceLog {
    pub fn record(&mut self, arg: ArgId, event: AnchorEvent) {
        tracing::trace!(arg = %arg, event = %event, "anchor recorded");
        self.events.entry(arg).or_default().push(event);
    }

    /// Record metadata on `arg` itself.
    pub fn annotate(&mut self, arg: ArgId, kind: AnchorKind, pass: impl Into<String>) {
        self.record(arg, AnchorEvent { from: None, kind, pass: pass.into() });
    }

    pub fn events(&self, arg: ArgId) -> &[AnchorEvent] {
        self.events.get(&arg).map(Vec::as_slice).unwrap_or_default()
    }

    /// Full history of `arg`: every ancestor's events first, then its own.
    pub fn chain(&self, arg: ArgId) -> AnchorPoint {
        let mut point = AnchorPoint::default();
        self.collect_chain(arg, &mut point, &mut HashSet::new());
        if point.origin.is_none() {
            point.origin = Some(arg);
        }
        point
    }

    fn collect_chain(&self, arg: ArgId, point: &mut AnchorPoint, visited: &mut HashSet<ArgId>) {
        if !visited.insert(arg) {
            return;
        }
        let events = self.events(arg);
        let mut has_parent = false;
        for event in events {
            if let Some(from) = event.from {
                has_parent = true;
                self.collect_chain(from, point, visited);
            }
        }
        if !has_parent && point.origin.is_none() {
            point.origin = Some(arg);
        }
        point.steps.extend(events.iter().map(|e| e.kind.clone()));
    }

    /// Latest fix-point recorded anywhere along the history of `arg`.
    pub fn fix_point(&self, arg: ArgId) -> Option<i64> {
        self.chain(arg).fix_point()
    }

    /// Root-most ancestor of `arg` (`arg` itself when it was never anchored).
    pub fn origin(&self, arg: ArgId) -> ArgId {
        self.chain(arg).origin.unwrap_or(arg)
    }

    /// Drop events of args that neither are live nor are ancestors of a live arg.
    /// Returns the number of args whose events were dropped.
    pub fn retain_reachable(&mut self, live: &HashSet<ArgId>) -> usize {
        let mut reachable: HashSet<ArgId> = HashSet::new();
        let mut stack: Vec<ArgId> = live.iter().copied().collect();
        while let Some(arg) = stack.pop() {
            if reachable.insert(arg) {
                stack.extend(self.events(arg).iter().filter_map(|e| e.from));
            }
        }
        let before = self.events.len();
        self.events.retain(|arg, _| reachable.contains(arg));
        before - self.events.len()
    }

    /// Number of args with at least one event.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}

/// Multi-line rendering of an arg's events and flattened chain.
pub fn format_chain(log: &ProvenanceLog, arg: ArgId) -> String {
    let mut output = format!("{arg}: {}", log.chain(arg));
    for (i, event) in log.events(arg).iter().enumerate() {
        output.push_str(&format!("\n  [{i}] {event}"));
    }
    output
}
