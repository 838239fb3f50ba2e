use std::path::PathBuf;

use graft_dtype::ElemType;
use snafu::Snafu;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum Error {
    /// No node-argument with this name exists.
    #[snafu(display("unknown node-arg '{name}'"))]
    UnknownNodeArg { name: String },

    /// No node with this name exists.
    #[snafu(display("unknown node '{name}'"))]
    UnknownNode { name: String },

    #[snafu(display("node-arg '{name}' already exists"))]
    DuplicateNodeArg { name: String },

    #[snafu(display("node '{name}' already exists"))]
    DuplicateNode { name: String },

    /// An output arg can have only one producer.
    #[snafu(display("node-arg '{name}' is already produced by node '{producer}'"))]
    ArgAlreadyProduced { name: String, producer: String },

    /// Node input refers to an arg that has no producer and is neither a graph input nor an initializer.
    #[snafu(display("node '{node}' reads '{input}' which has no producer, graph input or initializer"))]
    DanglingInput { node: String, input: String },

    #[snafu(display("graph contains a cycle through nodes {nodes:?}"))]
    CycleDetected { nodes: Vec<String> },

    #[snafu(display("constant '{name}' holds {actual} data, expected {expected}"))]
    ConstDataType { name: String, expected: ElemType, actual: ElemType },

    #[snafu(display("constant '{name}' has {actual} elements but its dims need {expected}"))]
    ConstDataLength { name: String, expected: usize, actual: usize },

    // Pattern codec
    #[snafu(display("failed to encode pattern: {source}"))]
    PatternEncode { source: ciborium::ser::Error<std::io::Error> },

    #[snafu(display("failed to decode pattern: {source}"))]
    PatternDecode { source: ciborium::de::Error<std::io::Error> },

    #[snafu(display("not a pattern blob: format tag '{format}'"))]
    PatternFormat { format: String },

    #[snafu(display("unsupported pattern blob version {version}"))]
    PatternVersion { version: u32 },

    #[snafu(display("malformed pattern blob: {reason}"))]
    PatternMalformed { reason: String },

    // Model files
    #[snafu(display("I/O error on {}: {source}", path.display()))]
    Io { path: PathBuf, source: std::io::Error },

    #[snafu(display("invalid model file {}: {source}", path.display()))]
    Json { path: PathBuf, source: serde_json::Error },

    #[snafu(display("{} is not a graft model ({format} v{version})", path.display()))]
    ModelFormat { path: PathBuf, format: String, version: u32 },

    #[snafu(display("external data for '{name}' is out of range ({offset}+{length} > {available})"))]
    ExternalDataRange { name: String, offset: u64, length: u64, available: u64 },

    #[snafu(display("initializer '{name}' refers to external data but the model has no external data file"))]
    MissingExternalData { name: String },

    #[snafu(display("external data for '{name}' cannot be decoded as {elem}"))]
    ExternalDataDecode { name: String, elem: ElemType },
}
