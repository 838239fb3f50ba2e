//! Pass registry.
//!
//! Passes are registered by name. Most passes are a rule set run as one
//! [`RuleChain`]; the chain dispatches rules by the `(domain, op_type)` of
//! their pattern root, so adding rules does not slow unrelated nodes down.

use std::collections::BTreeMap;

use graft_ir::{Binder, ChainMode, Graph, Pattern, Rule, RuleChain, ScanOrder};
use snafu::OptionExt;
use strum::IntoEnumIterator;
use tracing::trace;

use crate::artifacts::{ArtifactStore, PatternCache};
use crate::config::CompileConfig;
use crate::context::PassContext;
use crate::error::*;
use crate::passes;

/// What a pass run needs besides the graph.
pub struct PassEnv<'a> {
    pub config: &'a CompileConfig,
    pub store: &'a mut dyn ArtifactStore,
    pub patterns: &'a mut PatternCache,
}

/// Summary of one pass run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassReport {
    pub pass: String,
    pub scans: usize,
    pub rewrites: usize,
    /// Rule firings and pass-specific counters.
    pub counters: BTreeMap<String, usize>,
    /// Nodes and args dropped by the garbage collection after the pass.
    pub collected: usize,
}

pub trait Pass {
    fn name(&self) -> &str;

    fn run(&self, graph: &mut Graph, env: &mut PassEnv<'_>) -> Result<PassReport>;
}

pub type RuleFn = fn(&mut Graph, &Binder, &mut PassContext) -> bool;

/// One rule of a [`RulePass`]: its pattern is compiled through the pattern cache.
#[derive(Clone, Copy)]
pub struct RuleSpec {
    pub name: &'static str,
    pub pattern: fn() -> Pattern,
    pub action: RuleFn,
}

/// Pass running a fixed rule set, to a fixed point unless another
/// [`ChainMode`] is set.
pub struct RulePass {
    name: &'static str,
    rules: &'static [RuleSpec],
    mode: ChainMode,
    order: ScanOrder,
}

impl RulePass {
    pub const fn new(name: &'static str, rules: &'static [RuleSpec]) -> Self {
        Self { name, rules, mode: ChainMode::FixedPoint, order: ScanOrder::Topological }
    }

    pub const fn with_mode(mut self, mode: ChainMode) -> Self {
        self.mode = mode;
        self
    }

    pub const fn with_order(mut self, order: ScanOrder) -> Self {
        self.order = order;
        self
    }

    pub fn rules(&self) -> &[RuleSpec] {
        self.rules
    }

    pub fn mode(&self) -> ChainMode {
        self.mode
    }

    pub fn order(&self) -> ScanOrder {
        self.order
    }

    /// Compile the rule chain, going through the pattern cache.
    pub fn chain(&self, env: &mut PassEnv<'_>) -> Result<RuleChain<PassContext>> {
        let mut chain = RuleChain::new(self.name)
            .with_mode(self.mode)
            .with_order(self.order)
            .with_max_rewrites(env.config.max_rewrites);
        for spec in self.rules {
            let key = format!("{}.{}", self.name, spec.name);
            let pattern = env.patterns.get_or_compile(env.store, &key, spec.pattern)?;
            trace!(rule = %key, pattern = %pattern.tree(), "rule ready");
            chain.add(Rule::new(spec.name, pattern, spec.action));
        }
        Ok(chain)
    }
}

impl Pass for RulePass {
    fn name(&self) -> &str {
        self.name
    }

    fn run(&self, graph: &mut Graph, env: &mut PassEnv<'_>) -> Result<PassReport> {
        let chain = self.chain(env)?;
        let mut ctx = PassContext::new(self.name);
        let stats = chain.apply(graph, &mut ctx);
        let mut counters = ctx.into_counters();
        counters.extend(stats.per_rule);
        Ok(PassReport {
            pass: self.name.to_string(),
            scans: stats.scans,
            rewrites: stats.rewrites,
            counters,
            collected: 0,
        })
    }
}

/// Passes shipped with the compiler, in default pipeline order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::EnumString, strum::EnumIter)]
#[strum(serialize_all = "snake_case")]
pub enum BuiltinPass {
    RemoveIdentity,
    QdqToFix,
    FixCleanup,
    FoldFixConstant,
    MergeTranspose,
    MergeReshape,
    FoldAddZero,
    Partition,
}

impl BuiltinPass {
    pub fn instantiate(self) -> Box<dyn Pass> {
        match self {
            Self::RemoveIdentity => Box::new(passes::remove_identity::PASS),
            Self::QdqToFix => Box::new(passes::qdq_to_fix::PASS),
            Self::FixCleanup => Box::new(passes::fix_cleanup::PASS),
            Self::FoldFixConstant => Box::new(passes::fold_fix_constant::PASS),
            Self::MergeTranspose => Box::new(passes::merge_transpose::PASS),
            Self::MergeReshape => Box::new(passes::merge_reshape::PASS),
            Self::FoldAddZero => Box::new(passes::fold_add_zero::PASS),
            Self::Partition => Box::new(passes::partition::PartitionPass),
        }
    }
}

#[derive(Default)]
pub struct PassRegistry {
    passes: BTreeMap<String, Box<dyn Pass>>,
}

impl PassRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every built-in pass.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        for builtin in BuiltinPass::iter() {
            registry.register_boxed(builtin.instantiate());
        }
        registry
    }

    /// Register `pass`, replacing any pass of the same name.
    pub fn register(&mut self, pass: impl Pass + 'static) -> &mut Self {
        self.register_boxed(Box::new(pass))
    }

    pub fn register_boxed(&mut self, pass: Box<dyn Pass>) -> &mut Self {
        self.passes.insert(pass.name().to_string(), pass);
        self
    }

    pub fn get(&self, name: &str) -> Result<&dyn Pass> {
        self.passes.get(name).map(|p| &**p).context(UnknownPassSnafu { name })
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.passes.keys().map(String::as_str)
    }
}
