// Spellpipe Core Library
//
// Extracts spell-checkable prose from source files through configurable
// filter pipelines and feeds it to Aspell or Hunspell.
// Main interface for running spelling tasks from a YAML configuration.

pub mod types;
pub mod error;
pub mod options;
pub mod encoding;
pub mod filters;
pub mod flow_control;
pub mod registry;
pub mod pipeline;
pub mod spelling;
pub mod cache;
pub mod config;
pub mod sources;
pub mod runner;

// Re-export main types and functions for easy use
pub use types::*;
pub use error::SpellError;
pub use filters::Filter;
pub use flow_control::FlowControl;
pub use registry::StageRegistry;
pub use pipeline::{Pipeline, PipelineRun, Stage};
pub use spelling::{Aspell, Checker, Hunspell, SpellingAdapter};
pub use config::{PipelineSetting, SpellingConfig, TaskConfig};
pub use sources::resolve_sources;
pub use runner::{RunOptions, TaskReport, TaskRunner};
