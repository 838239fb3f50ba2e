//! Feasibility check and extraction of fused regions.
//!
//! [`try_fuse`] is pure: it derives the covered node set from the requested
//! boundary and proves the region can become one node without a cycle.
//! [`fuse`] is the only call that mutates the graph.
//!
//! The cycle check runs in two stages. The fast path compares the sorted list
//! of boundary inputs the node set actually reads against the sorted declared
//! inputs (`std::includes` style): an undeclared boundary input means the
//! region needs a value it cannot receive. The authoritative check walks
//! forward from the covered nodes; if a declared input is produced by a node
//! reachable from the region, the fused node would consume its own output.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use graft_ir::{ArgId, AttrValue, Attrs, FUSED_SUBGRAPH, Graph, NodeDef, NodeId};
use snafu::{OptionExt, ResultExt, ensure};
use tracing::{debug, trace};

use crate::error::*;
use crate::meta_def::{IndexedSubGraph, MetaDef};

/// Attribute carrying [`MetaDef::tag`] on the fused node.
pub const TAG_ATTR: &str = "tag";

type Boundary = BTreeMap<String, ArgId>;

fn lookup<S: AsRef<str>>(
    graph: &Graph,
    name: &str,
    names: impl IntoIterator<Item = S>,
) -> Result<Boundary, FuseError> {
    names
        .into_iter()
        .map(|n| {
            let n = n.as_ref();
            let arg = graph.find_node_arg(n).context(UnknownArgSnafu { name, arg: n })?;
            Ok((n.to_string(), arg))
        })
        .collect()
}

/// First element of sorted `needle` missing from sorted `haystack`.
fn first_missing<'a>(haystack: &[&str], needle: &[&'a str]) -> Option<&'a str> {
    let mut hay = haystack.iter().peekable();
    for item in needle {
        while hay.next_if(|h| **h < *item).is_some() {}
        if hay.next_if(|h| **h == *item).is_none() {
            return Some(*item);
        }
    }
    None
}

/// Check that the region between `inputs`/`constant_initializers` and
/// `outputs` can be fused into one node named `name`.
///
/// The covered set is everything reachable backwards from the outputs without
/// crossing a declared boundary arg. Undeclared initializers the set reads are
/// added to the constant list; outputs of covered nodes that are read outside
/// the set, or are graph outputs, are added to the output list.
pub fn try_fuse<I, O, C>(
    graph: &Graph,
    name: &str,
    inputs: I,
    outputs: O,
    constant_initializers: C,
    tag: &str,
) -> Result<IndexedSubGraph, FuseError>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
    O: IntoIterator,
    O::Item: AsRef<str>,
    C: IntoIterator,
    C::Item: AsRef<str>,
{
    let declared_inputs = lookup(graph, name, inputs)?;
    let mut outputs = lookup(graph, name, outputs)?;
    let mut constants = lookup(graph, name, constant_initializers)?;
    ensure!(!outputs.is_empty(), EmptyOutputsSnafu { name });

    let boundary: HashSet<ArgId> = declared_inputs.values().chain(constants.values()).copied().collect();

    let mut covered: BTreeSet<NodeId> = BTreeSet::new();
    let mut stack: Vec<NodeId> = Vec::new();
    for (output, arg) in &outputs {
        let producer = graph.producer(*arg).filter(|_| !boundary.contains(arg));
        stack.push(producer.context(OutputOutsideSetSnafu { name, output })?);
    }
    while let Some(node) = stack.pop() {
        if !covered.insert(node) {
            continue;
        }
        for arg in graph.node(node).present_inputs() {
            if !boundary.contains(&arg)
                && let Some(producer) = graph.producer(arg)
            {
                stack.push(producer);
            }
        }
    }

    // Boundary inputs the covered set actually reads.
    let mut read: Boundary = BTreeMap::new();
    for node in &covered {
        for arg in graph.node(*node).present_inputs() {
            if graph.producer(arg).is_none_or(|p| !covered.contains(&p)) {
                read.insert(graph.arg(arg).name.clone(), arg);
            }
        }
    }
    for (arg_name, arg) in &read {
        if graph.is_initializer(*arg) && !declared_inputs.contains_key(arg_name) && !constants.contains_key(arg_name) {
            trace!(fuse = name, constant = %arg_name, "reached undeclared constant");
            constants.insert(arg_name.clone(), *arg);
        }
    }

    let declared: Vec<&str> = declared_inputs.keys().map(String::as_str).collect();
    let required: Vec<&str> = read.keys().map(String::as_str).filter(|n| !constants.contains_key(*n)).collect();
    if let Some(via) = first_missing(&declared, &required) {
        debug!(fuse = name, via, "boundary input not declared");
        return LoopDetectedSnafu { name, via }.fail();
    }

    let mut reachable: HashSet<NodeId> = covered.iter().copied().collect();
    let mut stack: Vec<NodeId> = covered.iter().copied().collect();
    while let Some(node) = stack.pop() {
        for next in graph.successors(node) {
            if reachable.insert(next) {
                stack.push(next);
            }
        }
    }
    for (input, arg) in declared_inputs.iter().chain(&constants) {
        if let Some(producer) = graph.producer(*arg)
            && reachable.contains(&producer)
        {
            debug!(fuse = name, via = %input, producer = %graph.node(producer).name, "input depends on the region");
            return LoopDetectedSnafu { name, via: input }.fail();
        }
    }

    for node in &covered {
        for arg in graph.node(*node).present_outputs() {
            let escapes = graph.is_graph_output(arg) || graph.consumers(arg).iter().any(|c| !covered.contains(c));
            if escapes {
                outputs.entry(graph.arg(arg).name.clone()).or_insert(arg);
            }
        }
    }

    let meta_def = MetaDef::new(
        graph,
        name,
        tag,
        declared_inputs.into_keys().collect(),
        outputs.into_keys().collect(),
        constants.into_keys().collect(),
    );
    trace!(fuse = name, nodes = covered.len(), inputs = ?meta_def.inputs, outputs = ?meta_def.outputs, "fusable");
    Ok(IndexedSubGraph { nodes: covered.into_iter().collect(), meta_def })
}

/// Replace the covered nodes with one `com.graft::FusedSubgraph` node.
///
/// The descriptor is re-derived against the live graph first. The fused node
/// reads the inputs followed by the constant initializers and produces the
/// existing output args, so downstream consumers stay wired. Internal args are
/// left for [`Graph::gc`].
pub fn fuse(graph: &mut Graph, subgraph: &IndexedSubGraph) -> Result<NodeId> {
    let meta = &subgraph.meta_def;
    let fresh = try_fuse(graph, &meta.name, &meta.inputs, &meta.outputs, &meta.constant_initializers, &meta.tag)?;
    ensure!(
        fresh.nodes == subgraph.nodes
            && fresh.meta_def.outputs == meta.outputs
            && fresh.meta_def.constant_initializers == meta.constant_initializers,
        StaleDescriptorSnafu { name: &meta.name }
    );

    let arg = |n: &String| graph.find_node_arg(n);
    let inputs = meta.inputs.iter().chain(&meta.constant_initializers).map(arg).collect();
    let outputs = meta.outputs.iter().map(arg).collect();

    let mut attrs: Attrs = meta.generic_params.iter().map(|(k, v)| (k.clone(), AttrValue::String(v.clone()))).collect();
    if !meta.tag.is_empty() {
        attrs.insert(TAG_ATTR.to_string(), AttrValue::String(meta.tag.clone()));
    }

    for node in &subgraph.nodes {
        graph.remove_node(*node);
    }
    let node = graph
        .add_node(NodeDef {
            name: graph.fresh_node_name(&meta.name),
            op_type: FUSED_SUBGRAPH.to_string(),
            domain: meta.domain.clone(),
            inputs,
            outputs,
            attrs,
        })
        .context(GraphSnafu { name: &meta.name })?;
    debug!(fuse = %meta.name, covered = subgraph.len(), node = %node, "fused");
    Ok(node)
}
