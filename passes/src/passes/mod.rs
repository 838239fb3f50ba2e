//! Built-in passes.
//!
//! - [`remove_identity`] - Bypass `Identity` nodes
//! - [`qdq_to_fix`] - `DequantizeLinear(QuantizeLinear(x))` with power-of-two scales to `fix`
//! - [`fix_cleanup`] - Collapse redundant fixed-point conversions
//! - [`fold_fix_constant`] - Quantize float initializers read by `float2fix`
//! - [`merge_transpose`] - Compose consecutive transposes
//! - [`merge_reshape`] - Drop the inner of two consecutive reshapes
//! - [`fold_add_zero`] - Bypass additions of an all-zero constant
//! - [`partition`] - Fuse device-supported regions

use graft_ir::{ArgId, Graph, NodeId};

pub mod fix_cleanup;
pub mod fold_add_zero;
pub mod fold_fix_constant;
pub mod merge_reshape;
pub mod merge_transpose;
pub mod partition;
pub mod qdq_to_fix;
pub mod remove_identity;

/// Route every use of `node`'s output `out` to `survivor` and drop `node`.
///
/// Declines when `out` is a graph output that `survivor` cannot stand in for
/// without changing the graph interface: graph inputs, initializers and other
/// graph outputs keep their own names.
pub(crate) fn bypass(graph: &mut Graph, node: NodeId, out: ArgId, survivor: ArgId) -> bool {
    if graph.is_graph_output(out) && (graph.producer(survivor).is_none() || graph.is_graph_output(survivor)) {
        return false;
    }
    graph.replace_all_uses(out, survivor);
    graph.remove_node(node);
    true
}
