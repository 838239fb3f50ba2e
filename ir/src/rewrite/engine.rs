//! Rule chain engine.
//!
//! # Algorithm
//!
//! Each scan walks the live nodes in (reverse) topological order and offers
//! every node to the rules registered for its `(domain, op_type)` key, then
//! to the wildcard-rooted rules, in registration order. The first rule whose
//! action reports a mutation wins; the scan is abandoned and restarted from a
//! fresh order, because handles and ownership may have changed.
//!
//! - [`ChainMode::FixedPoint`]: stop when a full scan fires nothing.
//! - [`ChainMode::Once`]: every node that existed when `apply` started is
//!   offered to the rules at most once; nodes created by rewrites are not.
//!
//! A chain that keeps firing past its rewrite budget panics; that is a rule
//! set creating an infinite loop, not a recoverable condition.
//!
//! # Example
//!
//! ```ignore
//! let mut chain = RuleChain::new("fix_cleanup");
//! chain.add(Rule::new("merge_fix", pattern, merge_fix));
//! let stats = chain.apply(&mut graph, &mut ctx);
//! assert_eq!(chain.apply(&mut graph, &mut ctx).rewrites, 0);
//! ```

use std::collections::{BTreeMap, HashMap, HashSet};

use smallvec::SmallVec;

use super::rule::Rule;
use crate::graph::{Graph, Node, NodeId, OpKey};

/// Rewrites allowed per `apply` before the chain is declared non-terminating.
pub const DEFAULT_MAX_REWRITES: usize = 10_000;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, strum::Display, strum::EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum ChainMode {
    #[default]
    FixedPoint,
    Once,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, strum::Display, strum::EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum ScanOrder {
    /// Producers before consumers ("top anchored" rewrites).
    #[default]
    Topological,
    /// Consumers before producers ("bottom anchored" rewrites).
    ReverseTopological,
}

/// What one `apply` did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChainStats {
    pub scans: usize,
    pub rewrites: usize,
    pub per_rule: BTreeMap<String, usize>,
}

impl ChainStats {
    pub fn fired(&self, rule: &str) -> usize {
        self.per_rule.get(rule).copied().unwrap_or(0)
    }

    pub fn merge(&mut self, other: &ChainStats) {
        self.scans += other.scans;
        self.rewrites += other.rewrites;
        for (rule, count) in &other.per_rule {
            *self.per_rule.entry(rule.clone()).or_default() += count;
        }
    }
}

/// Ordered rule set with key-indexed dispatch.
pub struct RuleChain<C = ()> {
    name: String,
    rules: Vec<Rule<C>>,
    /// Rules indexed by root OpKey - tried first
    indexed: HashMap<OpKey, Vec<usize>>,
    /// Rules whose root can match any op - tried after indexed rules
    wildcards: Vec<usize>,
    mode: ChainMode,
    order: ScanOrder,
    max_rewrites: usize,
}

impl<C> RuleChain<C> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            rules: Vec::new(),
            indexed: HashMap::new(),
            wildcards: Vec::new(),
            mode: ChainMode::default(),
            order: ScanOrder::default(),
            max_rewrites: DEFAULT_MAX_REWRITES,
        }
    }

    pub fn with_mode(mut self, mode: ChainMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_order(mut self, order: ScanOrder) -> Self {
        self.order = order;
        self
    }

    pub fn with_max_rewrites(mut self, max_rewrites: usize) -> Self {
        self.max_rewrites = max_rewrites;
        self
    }

    /// Register a rule under every dispatch key of its pattern root.
    pub fn add(&mut self, rule: Rule<C>) -> &mut Self {
        let idx = self.rules.len();
        match rule.pattern().op_key() {
            Some(keys) => {
                for key in keys {
                    self.indexed.entry(key).or_default().push(idx);
                }
            }
            None => self.wildcards.push(idx),
        }
        self.rules.push(rule);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mode(&self) -> ChainMode {
        self.mode
    }

    pub fn order(&self) -> ScanOrder {
        self.order
    }

    pub fn rules(&self) -> &[Rule<C>] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    fn candidates(&self, node: &Node) -> SmallVec<[usize; 4]> {
        let mut out: SmallVec<[usize; 4]> = SmallVec::new();
        if let Some(indexed) = self.indexed.get(&node.key()) {
            out.extend(indexed.iter().copied());
        }
        out.extend(self.wildcards.iter().copied());
        out
    }

    /// Run the chain over `graph`.
    ///
    /// # Tracing
    ///
    /// ```bash
    /// RUST_LOG=graft_ir::rewrite=debug
    /// ```
    pub fn apply(&self, graph: &mut Graph, ctx: &mut C) -> ChainStats {
        run_scans(
            &self.name,
            &self.rules,
            |node| self.candidates(node),
            graph,
            ctx,
            self.mode,
            self.order,
            self.max_rewrites,
        )
    }
}

/// Apply `chain` to `graph`; equivalent to `chain.apply(graph, ctx)`.
pub fn graph_rewrite<C>(chain: &RuleChain<C>, graph: &mut Graph, ctx: &mut C) -> ChainStats {
    chain.apply(graph, ctx)
}

#[allow(clippy::too_many_arguments)]
pub(crate) fn run_scans<C>(
    name: &str,
    rules: &[Rule<C>],
    candidates: impl Fn(&Node) -> SmallVec<[usize; 4]>,
    graph: &mut Graph,
    ctx: &mut C,
    mode: ChainMode,
    order: ScanOrder,
    max_rewrites: usize,
) -> ChainStats {
    let mut stats = ChainStats::default();
    let mut pending: HashSet<NodeId> = match mode {
        ChainMode::Once => graph.node_ids().into_iter().collect(),
        ChainMode::FixedPoint => HashSet::new(),
    };

    loop {
        stats.scans += 1;
        let mut nodes = graph.nodes_in_topological_order();
        if order == ScanOrder::ReverseTopological {
            nodes.reverse();
        }
        tracing::trace!(chain = name, scan = stats.scans, nodes = nodes.len(), "scan started");

        let mut fired = false;
        'scan: for id in nodes {
            let Some(node) = graph.try_node(id) else { continue };
            if mode == ChainMode::Once && !pending.remove(&id) {
                continue;
            }
            let node_name = node.name.clone();
            for idx in candidates(node) {
                let rule = &rules[idx];
                if !rule.try_apply(graph, id, ctx) {
                    continue;
                }
                stats.rewrites += 1;
                *stats.per_rule.entry(rule.name().to_string()).or_default() += 1;
                tracing::debug!(chain = name, rule = rule.name(), node = %node_name, "rule fired");
                if stats.rewrites > max_rewrites {
                    panic!(
                        "rewrite budget ({max_rewrites}) exceeded in chain '{name}': rule '{}' still firing on node \
                         '{node_name}'; rules may be creating an infinite loop",
                        rule.name()
                    );
                }
                fired = true;
                break 'scan;
            }
        }

        if !fired {
            break;
        }
    }

    tracing::debug!(chain = name, scans = stats.scans, rewrites = stats.rewrites, "chain finished");
    stats
}
