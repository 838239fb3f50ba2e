//! Descriptors of a fusable subgraph.

use std::collections::BTreeMap;

use graft_ir::{DOMAIN_GRAFT, Graph, NodeId, TensorType};
use serde::{Deserialize, Serialize};

/// Types of the fused node's boundary, aligned with [`MetaDef::inputs`] and
/// [`MetaDef::outputs`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceParams {
    pub input_types: Vec<TensorType>,
    pub output_types: Vec<TensorType>,
}

/// Boundary of a fused region.
///
/// `inputs`, `outputs` and `constant_initializers` are node-arg names sorted
/// lexicographically; containment checks rely on it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetaDef {
    pub name: String,
    pub domain: String,
    pub tag: String,
    pub inputs: Vec<String>,
    pub outputs: Vec<String>,
    pub constant_initializers: Vec<String>,
    /// Opaque key/value bag for codegen; becomes string attributes of the fused node.
    pub generic_params: BTreeMap<String, String>,
    pub device_params: DeviceParams,
}

impl MetaDef {
    pub(crate) fn new(
        graph: &Graph,
        name: &str,
        tag: &str,
        inputs: Vec<String>,
        outputs: Vec<String>,
        constant_initializers: Vec<String>,
    ) -> Self {
        let types = |names: &[String]| -> Vec<TensorType> {
            names.iter().filter_map(|n| graph.find_node_arg(n)).map(|a| graph.arg(a).ty.clone()).collect()
        };
        let device_params = DeviceParams { input_types: types(&inputs), output_types: types(&outputs) };
        Self {
            name: name.to_string(),
            domain: DOMAIN_GRAFT.to_string(),
            tag: tag.to_string(),
            inputs,
            outputs,
            constant_initializers,
            generic_params: BTreeMap::new(),
            device_params,
        }
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.generic_params.insert(key.into(), value.into());
        self
    }
}

/// Node set covered by a fused region plus its boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexedSubGraph {
    /// Covered nodes, ascending.
    pub nodes: Vec<NodeId>,
    pub meta_def: MetaDef,
}

impl IndexedSubGraph {
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}
