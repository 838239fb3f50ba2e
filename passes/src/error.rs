use std::path::PathBuf;

use snafu::Snafu;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum Error {
    #[snafu(display("unknown pass '{name}'"))]
    UnknownPass { name: String },

    #[snafu(display("artifact I/O on {}: {source}", path.display()))]
    Artifact { path: PathBuf, source: std::io::Error },

    #[snafu(display("pattern '{key}': {source}"))]
    PatternCache { key: String, source: graft_ir::Error },

    /// The graph no longer resolves after a pass.
    #[snafu(display("graph invalid after pass '{pass}': {source}"))]
    Resolve { pass: String, source: graft_ir::Error },

    #[snafu(display("cannot dump graph after pass '{pass}': {source}"))]
    Dump { pass: String, source: graft_ir::Error },

    #[snafu(display("partitioning failed: {source}"))]
    Partition { source: graft_partition::Error },
}
