//! Rewrite passes and pipeline driver of the graft compiler.
//!
//! # Module Organization
//!
//! - [`config`] - Typed pipeline configuration with environment fallbacks
//! - [`registry`] - Pass trait, rule-set passes and the name registry
//! - [`passes`] - Built-in passes
//! - [`driver`] - Runs a pipeline over a graph
//! - [`artifacts`] - Artifact stores and the compiled-pattern cache
//! - [`context`] - Per-pass context handed to rule actions
//! - [`error`] - Error types and result handling
//!
//! # Example
//!
//! ```ignore
//! let mut driver = Driver::new(CompileConfig::from_env());
//! let reports = driver.run(&mut graph, &mut MemoryStore::new())?;
//! ```

pub mod artifacts;
pub mod config;
pub mod context;
pub mod driver;
pub mod error;
pub mod passes;
pub mod registry;


pub use artifacts::{ArtifactStore, DirStore, MemoryStore, PatternCache};
pub use config::{CompileConfig, DEFAULT_EXTERNAL_DATA_THRESHOLD, DEFAULT_PIPELINE};
pub use context::PassContext;
pub use driver::Driver;
pub use error::{Error, Result};
pub use registry::{BuiltinPass, Pass, PassEnv, PassRegistry, PassReport, RulePass, RuleSpec};
