//! JSON model files and canonical text form.
//!
//! A model file lists args by name with their types, the graph inputs and
//! outputs, initializers and nodes in topological order. Initializers larger
//! than the size threshold can be moved to a raw little-endian data file and
//! referenced by offset and length. A relative data file path is taken
//! relative to the directory of the model file.
//!
//! Provenance is not persisted.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use graft_dtype::{Dims, ElemType, TensorType};
use serde::{Deserialize, Serialize};
use snafu::{OptionExt, ResultExt, ensure};

use super::{ArgId, Graph, NodeDef};
use crate::attr::Attrs;
use crate::error::*;
use crate::tensor::{ConstTensor, TensorData};

const FORMAT: &str = "graft-model";
const VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct ModelFile {
    format: String,
    version: u32,
    name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    external_data: Option<PathBuf>,
    inputs: Vec<String>,
    outputs: Vec<String>,
    args: Vec<ArgEntry>,
    initializers: Vec<InitializerEntry>,
    nodes: Vec<NodeEntry>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ArgEntry {
    name: String,
    #[serde(rename = "type")]
    ty: TensorType,
}

#[derive(Debug, Serialize, Deserialize)]
struct InitializerEntry {
    name: String,
    dims: Dims,
    location: DataLocation,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
enum DataLocation {
    Inline(TensorData),
    External { elem: ElemType, offset: u64, length: u64 },
}

#[derive(Debug, Serialize, Deserialize)]
struct NodeEntry {
    name: String,
    op_type: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    domain: String,
    inputs: Vec<Option<String>>,
    outputs: Vec<Option<String>>,
    #[serde(default, skip_serializing_if = "Attrs::is_empty")]
    attrs: Attrs,
}

fn model_dir(path: &Path) -> &Path {
    path.parent().unwrap_or_else(|| Path::new(""))
}

impl Graph {
    /// Write the graph to `path`.
    ///
    /// With `external_data_path`, initializers whose byte size exceeds
    /// `size_threshold` go to that file instead of the JSON document.
    pub fn save(&self, path: impl AsRef<Path>, external_data_path: Option<&Path>, size_threshold: usize) -> Result<()> {
        let path = path.as_ref();
        let name_of = |arg: Option<ArgId>| arg.map(|a| self.arg(a).name.clone());

        let mut external = Vec::new();
        let mut initializers = Vec::new();
        for (arg, tensor) in self.initializers() {
            let location = match external_data_path {
                Some(_) if tensor.byte_size() > size_threshold => {
                    let bytes = tensor.data.to_le_bytes();
                    let offset = external.len() as u64;
                    external.extend_from_slice(&bytes);
                    DataLocation::External { elem: tensor.elem(), offset, length: bytes.len() as u64 }
                }
                _ => DataLocation::Inline(tensor.data.clone()),
            };
            let name = self.arg(arg).name.clone();
            initializers.push(InitializerEntry { name, dims: tensor.dims.clone(), location });
        }

        let model = ModelFile {
            format: FORMAT.to_string(),
            version: VERSION,
            name: self.name.clone(),
            external_data: external_data_path.filter(|_| !external.is_empty()).map(Path::to_path_buf),
            inputs: self.inputs.iter().map(|a| self.arg(*a).name.clone()).collect(),
            outputs: self.outputs.iter().map(|a| self.arg(*a).name.clone()).collect(),
            args: self.args().map(|a| ArgEntry { name: a.name.clone(), ty: a.ty.clone() }).collect(),
            initializers,
            nodes: self
                .nodes_in_topological_order()
                .into_iter()
                .map(|id| {
                    let node = self.node(id);
                    NodeEntry {
                        name: node.name.clone(),
                        op_type: node.op_type.clone(),
                        domain: node.domain.clone(),
                        inputs: node.inputs.iter().map(|a| name_of(*a)).collect(),
                        outputs: node.outputs.iter().map(|a| name_of(*a)).collect(),
                        attrs: node.attrs.clone(),
                    }
                })
                .collect(),
        };

        if let Some(data_path) = &model.external_data {
            let data_path = model_dir(path).join(data_path);
            let mut file = fs::File::create(&data_path).context(IoSnafu { path: &data_path })?;
            file.write_all(&external).context(IoSnafu { path: &data_path })?;
        }
        let json = serde_json::to_vec_pretty(&model).context(JsonSnafu { path })?;
        fs::write(path, json).context(IoSnafu { path })?;

        tracing::debug!(
            path = %path.display(),
            nodes = model.nodes.len(),
            external_bytes = external.len(),
            "graph saved"
        );
        Ok(())
    }

    /// Read a graph written by [`Graph::save`].
    pub fn load(path: impl AsRef<Path>) -> Result<Graph> {
        let path = path.as_ref();
        let bytes = fs::read(path).context(IoSnafu { path })?;
        let model: ModelFile = serde_json::from_slice(&bytes).context(JsonSnafu { path })?;
        ensure!(
            model.format == FORMAT && model.version == VERSION,
            ModelFormatSnafu { path, format: model.format.clone(), version: model.version }
        );

        let external = match &model.external_data {
            Some(data_path) => {
                let data_path = model_dir(path).join(data_path);
                Some(fs::read(&data_path).context(IoSnafu { path: &data_path })?)
            }
            None => None,
        };

        let mut graph = Graph::new(model.name);
        for entry in model.args {
            graph.new_arg(entry.name, entry.ty)?;
        }
        let lookup = |graph: &Graph, name: &str| graph.find_node_arg(name).context(UnknownNodeArgSnafu { name });

        for name in &model.inputs {
            let arg = lookup(&graph, name)?;
            graph.inputs.push(arg);
        }
        for entry in model.initializers {
            let arg = lookup(&graph, &entry.name)?;
            let data = match entry.location {
                DataLocation::Inline(data) => data,
                DataLocation::External { elem, offset, length } => {
                    let bytes = external.as_deref().context(MissingExternalDataSnafu { name: &entry.name })?;
                    let available = bytes.len() as u64;
                    let range = offset
                        .checked_add(length)
                        .filter(|end| *end <= available)
                        .map(|end| offset as usize..end as usize)
                        .context(ExternalDataRangeSnafu { name: &entry.name, offset, length, available })?;
                    TensorData::from_le_bytes(elem, &bytes[range])
                        .context(ExternalDataDecodeSnafu { name: &entry.name, elem })?
                }
            };
            let tensor = ConstTensor { dims: entry.dims, data };
            tensor.validate(&entry.name)?;
            graph.set_initializer(arg, tensor);
        }
        for entry in model.nodes {
            let resolve = |names: Vec<Option<String>>| -> Result<Vec<Option<ArgId>>> {
                names.into_iter().map(|n| n.map(|n| lookup(&graph, &n)).transpose()).collect()
            };
            let def = NodeDef {
                inputs: resolve(entry.inputs)?.into_iter().collect(),
                outputs: resolve(entry.outputs)?.into_iter().collect(),
                name: entry.name,
                op_type: entry.op_type,
                domain: entry.domain,
                attrs: entry.attrs,
            };
            graph.add_node(def)?;
        }
        for name in &model.outputs {
            let arg = lookup(&graph, name)?;
            graph.add_output(arg);
        }

        tracing::debug!(path = %path.display(), nodes = graph.num_nodes(), "graph loaded");
        Ok(graph)
    }

    /// Handle-independent text form of the graph.
    ///
    /// Two graphs with equal canonical forms have the same inputs, outputs,
    /// initializers and nodes (by name, op, wiring, types and attributes),
    /// regardless of the order in which their entities were created.
    pub fn canonical_form(&self) -> String {
        let describe = |arg: Option<ArgId>| match arg {
            Some(arg) => {
                let arg = self.arg(arg);
                format!("{}: {}", arg.name, arg.ty)
            }
            None => "_".to_string(),
        };

        let mut lines = vec![format!("graph {}", self.name)];
        lines.extend(self.inputs.iter().map(|a| format!("input {}", describe(Some(*a)))));
        lines.extend(self.outputs.iter().map(|a| format!("output {}", describe(Some(*a)))));

        let mut initializers: Vec<String> = self
            .initializers()
            .map(|(arg, tensor)| {
                let digest = xxhash_rust::xxh64::xxh64(&tensor.data.to_le_bytes(), 0);
                format!("initializer {} #{digest:016x}", describe(Some(arg)))
            })
            .collect();
        initializers.sort();
        lines.extend(initializers);

        let mut nodes: Vec<String> = self
            .nodes()
            .map(|node| {
                let inputs: Vec<String> = node.inputs.iter().map(|a| describe(*a)).collect();
                let outputs: Vec<String> = node.outputs.iter().map(|a| describe(*a)).collect();
                let attrs: Vec<String> = node.attrs.iter().map(|(k, v)| format!("{k}={v}")).collect();
                format!(
                    "node {} {}({}) -> ({}) [{}]",
                    node.name,
                    node.key(),
                    inputs.join(", "),
                    outputs.join(", "),
                    attrs.join(", ")
                )
            })
            .collect();
        nodes.sort();
        lines.extend(nodes);
        lines.join("\n")
    }
}
