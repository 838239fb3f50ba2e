use snafu::Snafu;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Comment attached to a rejected candidate whose fused node would feed itself.
pub const LOOP_DETECTED: &str = "loop detected";

/// Why a candidate node set cannot become one fused node.
#[derive(Debug, Clone, PartialEq, Eq, Snafu)]
#[snafu(visibility(pub))]
pub enum FuseError {
    /// The fused node would need one of its own outputs as an input.
    #[snafu(display("cannot fuse '{name}': {LOOP_DETECTED} through '{via}'"))]
    LoopDetected { name: String, via: String },

    #[snafu(display("cannot fuse '{name}': unknown node-arg '{arg}'"))]
    UnknownArg { name: String, arg: String },

    #[snafu(display("cannot fuse '{name}': no outputs requested"))]
    EmptyOutputs { name: String },

    /// A requested output is a boundary arg or has no producer.
    #[snafu(display("cannot fuse '{name}': output '{output}' is not produced inside the subgraph"))]
    OutputOutsideSet { name: String, output: String },

    /// The descriptor no longer describes the live graph.
    #[snafu(display("cannot fuse '{name}': descriptor is stale"))]
    StaleDescriptor { name: String },
}

impl FuseError {
    /// Short reason recorded by callers that skip the candidate.
    pub fn comments(&self) -> String {
        match self {
            Self::LoopDetected { .. } => LOOP_DETECTED.to_string(),
            other => other.to_string(),
        }
    }

    pub fn is_loop(&self) -> bool {
        matches!(self, Self::LoopDetected { .. })
    }
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum Error {
    #[snafu(transparent)]
    Fuse { source: FuseError },

    #[snafu(display("graph update failed while fusing '{name}': {source}"))]
    Graph { name: String, source: graft_ir::Error },
}
