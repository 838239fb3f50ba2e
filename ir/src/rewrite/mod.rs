//! Rules and rule chains.
//!
//! A [`Rule`] pairs a [`crate::Pattern`] with an action that may mutate the
//! graph through [`crate::NodeBuilder`]. A [`RuleChain`] scans the graph and
//! applies its rules until a scan completes without a rewrite.

pub mod engine;
pub mod rule;

pub use engine::{ChainMode, ChainStats, DEFAULT_MAX_REWRITES, RuleChain, ScanOrder, graph_rewrite};
pub use rule::{Rule, RuleAction};
