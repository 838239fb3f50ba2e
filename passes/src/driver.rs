//! Pipeline driver: runs the configured passes in order over one graph.
//!
//! After every pass the graph is garbage collected and, unless disabled,
//! re-resolved. With a dump directory configured, the graph is saved as
//! `NN_<pass>.json` (large initializers in `NN_<pass>.bin`) after each pass.

use std::path::PathBuf;

use graft_ir::Graph;
use snafu::ResultExt;
use tracing::{info, info_span};

use crate::artifacts::{ArtifactStore, PatternCache};
use crate::config::CompileConfig;
use crate::error::*;
use crate::registry::{PassEnv, PassRegistry, PassReport};

pub struct Driver {
    config: CompileConfig,
    registry: PassRegistry,
    patterns: PatternCache,
}

impl Driver {
    /// Driver over the built-in passes.
    pub fn new(config: CompileConfig) -> Self {
        Self::with_registry(config, PassRegistry::with_defaults())
    }

    pub fn with_registry(config: CompileConfig, registry: PassRegistry) -> Self {
        Self { config, registry, patterns: PatternCache::new() }
    }

    pub fn config(&self) -> &CompileConfig {
        &self.config
    }

    pub fn registry_mut(&mut self) -> &mut PassRegistry {
        &mut self.registry
    }

    pub fn patterns(&self) -> &PatternCache {
        &self.patterns
    }

    /// Run the pipeline. Every pass name is checked before the first pass runs.
    pub fn run(&mut self, graph: &mut Graph, store: &mut dyn ArtifactStore) -> Result<Vec<PassReport>> {
        let pipeline: Vec<String> = self.config.pipeline().into_iter().map(str::to_string).collect();
        for name in &pipeline {
            self.registry.get(name)?;
        }
        if let Some(dir) = &self.config.dump_dir {
            std::fs::create_dir_all(dir).context(ArtifactSnafu { path: dir })?;
        }

        let mut reports = Vec::with_capacity(pipeline.len());
        for (i, name) in pipeline.iter().enumerate() {
            let _span = info_span!("pass", name = %name).entered();
            let pass = self.registry.get(name)?;
            let mut env = PassEnv { config: &self.config, store: &mut *store, patterns: &mut self.patterns };
            let mut report = pass.run(graph, &mut env)?;
            report.collected = graph.gc();

            if self.config.resolve {
                graph.resolve().context(ResolveSnafu { pass: name })?;
            }
            if let Some(dir) = &self.config.dump_dir {
                let path = dir.join(format!("{i:02}_{name}.json"));
                let data = PathBuf::from(format!("{i:02}_{name}.bin"));
                graph
                    .save(&path, Some(data.as_path()), self.config.external_data_threshold)
                    .context(DumpSnafu { pass: name })?;
            }
            info!(
                scans = report.scans,
                rewrites = report.rewrites,
                collected = report.collected,
                nodes = graph.num_nodes(),
                "pass finished"
            );
            reports.push(report);
        }
        Ok(reports)
    }
}
