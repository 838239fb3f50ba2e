use std::fmt;

use crate::graph::{Graph, NodeId};
use crate::pattern::{Binder, Pattern};

use super::engine::{ChainMode, ChainStats, DEFAULT_MAX_REWRITES, ScanOrder, run_scans};

/// Rule action: returns true iff it mutated the graph.
///
/// An action must check every precondition before its first mutation; there
/// is no rollback. Context is passed at apply time, so actions are plain
/// functions rather than capturing closures.
pub type RuleAction<C> = Box<dyn Fn(&mut Graph, &Binder, &mut C) -> bool>;

pub struct Rule<C = ()> {
    name: String,
    pattern: Pattern,
    action: RuleAction<C>,
}

impl<C> Rule<C> {
    pub fn new<F>(name: impl Into<String>, pattern: Pattern, action: F) -> Self
    where
        F: Fn(&mut Graph, &Binder, &mut C) -> bool + 'static,
    {
        Self { name: name.into(), pattern, action: Box::new(action) }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn pattern(&self) -> &Pattern {
        &self.pattern
    }

    /// Match against `node` and run the action on success.
    pub fn try_apply(&self, graph: &mut Graph, node: NodeId, ctx: &mut C) -> bool {
        let Some(binder) = self.pattern.match_node(graph, node) else {
            return false;
        };
        (self.action)(graph, &binder, ctx)
    }

    /// Apply this rule alone until a scan over the graph fires nothing.
    pub fn apply(&self, graph: &mut Graph, order: ScanOrder, ctx: &mut C) -> ChainStats {
        run_scans(
            &self.name,
            std::slice::from_ref(self),
            |_| smallvec::smallvec![0],
            graph,
            ctx,
            ChainMode::FixedPoint,
            order,
            DEFAULT_MAX_REWRITES,
        )
    }
}

impl<C> fmt::Debug for Rule<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rule").field("name", &self.name).field("pattern", &self.pattern.to_string()).finish()
    }
}
