//! Fuse the regions a device accepts, driven by `CompileConfig::device_ops`.

use graft_ir::Graph;
use graft_partition::{OpSetCapability, partition};
use snafu::ResultExt;
use tracing::info;

use crate::error::*;
use crate::registry::{Pass, PassEnv, PassReport};

/// Name of the device capability, and prefix of the fused node names.
pub const DEVICE: &str = "device";

pub struct PartitionPass;

impl Pass for PartitionPass {
    fn name(&self) -> &str {
        "partition"
    }

    fn run(&self, graph: &mut Graph, env: &mut PassEnv<'_>) -> Result<PassReport> {
        let mut report = PassReport { pass: self.name().to_string(), ..Default::default() };
        if env.config.device_ops.is_empty() {
            return Ok(report);
        }
        let capability = OpSetCapability::from_op_list(DEVICE, &env.config.device_ops);
        let outcome = partition(graph, &capability).context(PartitionSnafu)?;
        for (fused, covered) in &outcome.fused {
            info!(node = %fused, covered, "fused region");
        }
        report.rewrites = outcome.fused.len();
        report.counters.insert("regions_fused".to_string(), outcome.fused.len());
        report.counters.insert("regions_skipped".to_string(), outcome.skipped.len());
        Ok(report)
    }
}
