//! Graph IR and rewrite core of the graft compiler.
//!
//! # Module Organization
//!
//! - [`graph`] - Arena graph facade: nodes, node-args, producer/consumer indices, resolve, save/load
//! - [`attr`] / [`tensor`] - Node attributes and constant tensors
//! - [`pattern`] - Pattern algebra, matcher and binary codec
//! - [`rewrite`] - Rules and rule chains
//! - [`builder`] - NodeBuilder, the way passes add nodes
//! - [`provenance`] - Anchor-point provenance log
//! - [`error`] - Error types and result handling

pub mod attr;
pub mod builder;
pub mod error;
pub mod graph;
pub mod pattern;
pub mod provenance;
pub mod rewrite;
pub mod tensor;


pub use attr::{AttrValue, Attrs};
pub use builder::NodeBuilder;
pub use error::{Error, Result};
pub use graph::schema::{FIX, FIX_POINT_ATTR, FIX2FLOAT, FLOAT2FIX, FUSED_SUBGRAPH};
pub use graph::{ArgId, DOMAIN_GRAFT, DOMAIN_ONNX, Graph, Node, NodeArg, NodeDef, NodeId, OpKey};
pub use pattern::{Binder, NodeInput, Pattern, PatternBuilder, PatternId, PatternKind};
pub use provenance::{AnchorEvent, AnchorKind, AnchorPoint, ProvenanceLog};
pub use rewrite::{ChainMode, ChainStats, Rule, RuleChain, ScanOrder, graph_rewrite};
pub use tensor::{ConstTensor, TensorData};

pub use graft_dtype::{Dims, ElemType, TensorType};
