//! Compilation configuration.
//!
//! Provides typed configuration with a bon builder and environment variable
//! fallbacks.

use std::collections::BTreeSet;
use std::path::PathBuf;

use bon::bon;
use graft_ir::rewrite::DEFAULT_MAX_REWRITES;

/// Passes run when no explicit pipeline is configured, in order.
pub const DEFAULT_PIPELINE: [&str; 8] = [
    "remove_identity",
    "qdq_to_fix",
    "fix_cleanup",
    "fold_fix_constant",
    "merge_transpose",
    "merge_reshape",
    "fold_add_zero",
    "partition",
];

/// Initializers larger than this many bytes go to the external data file when dumping.
pub const DEFAULT_EXTERNAL_DATA_THRESHOLD: usize = 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileConfig {
    /// Pipeline, in order.
    pub passes: Vec<String>,
    /// Passes skipped even when listed in the pipeline.
    pub disabled: BTreeSet<String>,
    /// Rewrite budget of each rule chain.
    pub max_rewrites: usize,
    /// Save the graph after every pass into this directory.
    pub dump_dir: Option<PathBuf>,
    pub external_data_threshold: usize,
    /// Re-resolve the graph after every pass.
    pub resolve: bool,
    /// `domain::op_type` entries accepted by the partition pass.
    pub device_ops: Vec<String>,
}

impl Default for CompileConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

fn split_list(value: &str) -> impl Iterator<Item = String> + '_ {
    value.split(',').map(str::trim).filter(|s| !s.is_empty()).map(str::to_string)
}

#[bon]
impl CompileConfig {
    /// Create a configuration with builder pattern.
    #[builder]
    pub fn builder(
        passes: Option<Vec<String>>,
        #[builder(default)] disabled: BTreeSet<String>,
        #[builder(default = DEFAULT_MAX_REWRITES)] max_rewrites: usize,
        dump_dir: Option<PathBuf>,
        #[builder(default = DEFAULT_EXTERNAL_DATA_THRESHOLD)] external_data_threshold: usize,
        #[builder(default = true)] resolve: bool,
        #[builder(default)] device_ops: Vec<String>,
    ) -> Self {
        let passes = passes.unwrap_or_else(|| DEFAULT_PIPELINE.iter().map(|p| p.to_string()).collect());
        Self { passes, disabled, max_rewrites, dump_dir, external_data_threshold, resolve, device_ops }
    }

    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// * `GRAFT_PASSES` - Comma list replacing the default pipeline
    /// * `GRAFT_DISABLE_PASSES` - Comma list of passes to skip
    /// * `GRAFT_MAX_REWRITES` - Rewrite budget per rule chain (default: 10000)
    /// * `GRAFT_DUMP_DIR` - Save the graph after each pass
    /// * `GRAFT_EXTERNAL_DATA_THRESHOLD` - External data threshold for dumps, in bytes (default: 1024)
    /// * `GRAFT_NO_RESOLVE` - Skip re-resolving between passes if set
    /// * `GRAFT_DEVICE_OPS` - Comma list of `domain::op_type` accepted by the partition pass
    pub fn from_env() -> Self {
        let var = |name: &str| std::env::var(name).ok();
        Self::builder()
            .maybe_passes(var("GRAFT_PASSES").map(|v| split_list(&v).collect()))
            .disabled(var("GRAFT_DISABLE_PASSES").map(|v| split_list(&v).collect()).unwrap_or_default())
            .max_rewrites(var("GRAFT_MAX_REWRITES").and_then(|s| s.parse().ok()).unwrap_or(DEFAULT_MAX_REWRITES))
            .maybe_dump_dir(var("GRAFT_DUMP_DIR").map(PathBuf::from))
            .external_data_threshold(
                var("GRAFT_EXTERNAL_DATA_THRESHOLD")
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(DEFAULT_EXTERNAL_DATA_THRESHOLD),
            )
            .resolve(var("GRAFT_NO_RESOLVE").is_none())
            .device_ops(var("GRAFT_DEVICE_OPS").map(|v| split_list(&v).collect()).unwrap_or_default())
            .build()
    }

    /// Passes that will actually run, in order.
    pub fn pipeline(&self) -> Vec<&str> {
        self.passes.iter().map(String::as_str).filter(|p| !self.disabled.contains(*p)).collect()
    }
}
