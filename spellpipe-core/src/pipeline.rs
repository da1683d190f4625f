//! Pipeline engine
//!
//! Threads fragments through an ordered list of filter and flow-control
//! stages. Every filter stage may fan a fragment out into many; each output
//! continues through the remaining stages on its own.
//!
//! ## Routing
//!
//! For a fragment entering stage `i` with flow status `s`:
//!
//! ```text
//! error set            → emit (Failed)
//! i == stages.len()    → emit (Completed, Halted when s == Halt, or
//!                        Skipped when the last filter stage was skipped)
//! content is bytes     → emit (Bypassed)
//! flow control         → s' = adjust_flow(category); continue at i+1 with s'
//! filter, s == Allow   → run; each output continues at i+1 with Allow
//! filter, s == Skip    → same fragment continues at i+1 with Allow
//! filter, s == Halt    → emit (Halted)
//! ```
//!
//! Stage errors become error fragments that keep the input's context.
//!
//! ## Ordering
//!
//! [`PipelineRun`] keeps an explicit stack of pending fragment lists, so
//! terminal fragments come out in depth-first, left-to-right fan-out order
//! and deep fan-out trees never grow the call stack.

use crate::error::SpellError;
use crate::filters::Filter;
use crate::flow_control::FlowControl;
use crate::registry::{StageFactory, StageRegistry};
use crate::types::{Disposition, Emitted, FlowStatus, Fragment};
use serde_yaml::{Mapping, Value};
use std::path::{Path, PathBuf};

pub enum Stage {
    Filter(Box<dyn Filter>),
    FlowControl(Box<dyn FlowControl>),
}

impl Stage {
    pub fn name(&self) -> &str {
        match self {
            Stage::Filter(filter) => filter.name(),
            Stage::FlowControl(flow) => flow.name(),
        }
    }
}

pub struct Pipeline {
    stages: Vec<Stage>,
    debug: bool,
}

impl Pipeline {
    pub fn new(stages: Vec<Stage>) -> Result<Self, SpellError> {
        match stages.first() {
            None => return Err(SpellError::config("a pipeline needs at least one stage")),
            Some(Stage::FlowControl(flow)) => {
                return Err(SpellError::config(format!(
                    "the first pipeline stage must be a filter, found flow control '{}'",
                    flow.name()
                )))
            }
            Some(Stage::Filter(_)) => {}
        }
        Ok(Self {
            stages,
            debug: false,
        })
    }

    /// Build the stage list from configuration descriptors.
    ///
    /// A descriptor is either a bare stage name or a mapping with exactly one
    /// key, the stage name, whose value is the stage's option mapping (or
    /// null for defaults).
    pub fn build(
        descriptors: &[Value],
        registry: &StageRegistry,
        default_encoding: &str,
    ) -> Result<Self, SpellError> {
        let mut stages = Vec::with_capacity(descriptors.len());
        for (position, descriptor) in descriptors.iter().enumerate() {
            let (name, options) = parse_descriptor(position, descriptor)?;
            let stage = match registry.resolve(&name) {
                Some(StageFactory::Filter(factory)) => Stage::Filter(factory(&options, default_encoding)?),
                Some(StageFactory::FlowControl(factory)) => Stage::FlowControl(factory(&options)?),
                None => {
                    return Err(SpellError::config(format!(
                        "pipeline stage {position}: '{name}' is neither a filter nor a flow control"
                    )))
                }
            };
            tracing::debug!("pipeline stage {}: {}", position, stage.name());
            stages.push(stage);
        }
        Self::new(stages)
    }

    /// Render stage errors with their full debug output instead of the message chain
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    pub fn stage_names(&self) -> Vec<&str> {
        self.stages.iter().map(Stage::name).collect()
    }

    /// Run a file through the pipeline, starting with the first stage's `run_first`
    pub fn process_file(&self, path: impl Into<PathBuf>) -> PipelineRun<'_> {
        PipelineRun {
            pipeline: self,
            start: Some(Start::File(path.into())),
            stack: Vec::new(),
        }
    }

    /// Run an existing fragment through every stage
    pub fn process_fragment(&self, fragment: Fragment) -> PipelineRun<'_> {
        PipelineRun {
            pipeline: self,
            start: Some(Start::Fragment(fragment)),
            stack: Vec::new(),
        }
    }

    fn render_error(&self, error: &anyhow::Error) -> String {
        if self.debug {
            format!("{error:?}")
        } else {
            format!("{error:#}")
        }
    }
}

fn parse_descriptor(position: usize, descriptor: &Value) -> Result<(String, Mapping), SpellError> {
    match descriptor {
        Value::String(name) => Ok((name.clone(), Mapping::new())),
        Value::Mapping(entry) => {
            if entry.len() != 1 {
                return Err(SpellError::config(format!(
                    "pipeline stage {position}: each stage needs exactly one key, found {}",
                    entry.len()
                )));
            }
            let Some((key, value)) = entry.iter().next() else {
                return Err(SpellError::config(format!("pipeline stage {position} is empty")));
            };
            let name = key.as_str().ok_or_else(|| {
                SpellError::config(format!("pipeline stage {position}: stage names must be strings"))
            })?;
            let options = match value {
                Value::Null => Mapping::new(),
                Value::Mapping(options) => options.clone(),
                other => {
                    return Err(SpellError::config(format!(
                        "pipeline stage {position}: options for '{name}' must be a mapping, found {other:?}"
                    )))
                }
            };
            Ok((name.to_string(), options))
        }
        other => Err(SpellError::config(format!(
            "pipeline stage {position}: expected a stage name or a mapping, found {other:?}"
        ))),
    }
}

enum Start {
    File(PathBuf),
    Fragment(Fragment),
}

/// Fragments produced by one filter call, waiting to enter stage `index`
struct Frame {
    fragments: std::vec::IntoIter<Fragment>,
    index: usize,
}

/// Lazy, depth-first stream of terminal fragments for one input
pub struct PipelineRun<'p> {
    pipeline: &'p Pipeline,
    start: Option<Start>,
    stack: Vec<Frame>,
}

impl PipelineRun<'_> {
    fn begin(&mut self, start: Start) -> Option<Emitted> {
        match start {
            Start::Fragment(fragment) => {
                self.stack.push(Frame {
                    fragments: vec![fragment].into_iter(),
                    index: 0,
                });
                None
            }
            Start::File(path) => self.run_first(&path),
        }
    }

    fn run_first(&mut self, path: &Path) -> Option<Emitted> {
        let context = path.display().to_string();
        let pipeline = self.pipeline;
        let Some(Stage::Filter(filter)) = pipeline.stages.first() else {
            return Some(failed(Fragment::error(context, "pipeline has no entry filter")));
        };

        match filter.run_first(path) {
            Ok(fragments) => {
                tracing::debug!("{}: {} produced {} fragment(s)", filter.name(), context, fragments.len());
                self.stack.push(Frame {
                    fragments: fragments.into_iter(),
                    index: 1,
                });
                None
            }
            Err(e) => {
                tracing::warn!("{}: {} failed: {:#}", filter.name(), context, e);
                Some(failed(Fragment::error(context, pipeline.render_error(&e))))
            }
        }
    }

    /// Move one fragment forward until it terminates or fans out
    fn route(&mut self, fragment: Fragment, mut index: usize) -> Option<Emitted> {
        let pipeline = self.pipeline;
        let stages = &pipeline.stages;
        let mut flow = FlowStatus::Allow;
        let mut skipped = false;

        loop {
            if fragment.has_error() {
                return Some(failed(fragment));
            }
            if index >= stages.len() {
                let disposition = if flow == FlowStatus::Halt {
                    Disposition::Halted
                } else if skipped {
                    Disposition::Skipped
                } else {
                    Disposition::Completed
                };
                return Some(Emitted {
                    fragment,
                    disposition,
                });
            }
            if fragment.is_bytes() {
                return Some(Emitted {
                    fragment,
                    disposition: Disposition::Bypassed,
                });
            }

            match &stages[index] {
                Stage::FlowControl(control) => match control.adjust_flow(&fragment.category) {
                    Ok(status) => {
                        flow = status;
                        index += 1;
                    }
                    Err(e) => {
                        tracing::warn!("{}: {} failed: {:#}", control.name(), fragment.context, e);
                        let message = pipeline.render_error(&e);
                        return Some(failed(Fragment::error(fragment.context, message)));
                    }
                },
                Stage::Filter(filter) => match flow {
                    FlowStatus::Halt => {
                        return Some(Emitted {
                            fragment,
                            disposition: Disposition::Halted,
                        })
                    }
                    FlowStatus::Skip => {
                        flow = FlowStatus::Allow;
                        skipped = true;
                        index += 1;
                    }
                    FlowStatus::Allow => match filter.run(&fragment) {
                        Ok(outputs) => {
                            self.stack.push(Frame {
                                fragments: outputs.into_iter(),
                                index: index + 1,
                            });
                            return None;
                        }
                        Err(e) => {
                            tracing::warn!("{}: {} failed: {:#}", filter.name(), fragment.context, e);
                            let message = pipeline.render_error(&e);
                            return Some(failed(Fragment::error(fragment.context, message)));
                        }
                    },
                },
            }
        }
    }
}

fn failed(fragment: Fragment) -> Emitted {
    Emitted {
        fragment,
        disposition: Disposition::Failed,
    }
}

impl Iterator for PipelineRun<'_> {
    type Item = Emitted;

    fn next(&mut self) -> Option<Emitted> {
        loop {
            if let Some(start) = self.start.take() {
                if let Some(emitted) = self.begin(start) {
                    return Some(emitted);
                }
                continue;
            }

            let frame = self.stack.last_mut()?;
            let Some(fragment) = frame.fragments.next() else {
                self.stack.pop();
                continue;
            };
            let index = frame.index;
            if let Some(emitted) = self.route(fragment, index) {
                return Some(emitted);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptors(yaml: &str) -> Vec<Value> {
        serde_yaml::from_str(yaml).unwrap()
    }

    #[test]
    fn test_descriptor_forms() {
        let registry = StageRegistry::builtin();
        let pipeline = Pipeline::build(
            &descriptors("[text, {url: null}, {wildcard: {allow: ['*']}}, {context: {}}]"),
            &registry,
            "utf-8",
        )
        .unwrap();
        assert_eq!(pipeline.stage_names(), vec!["text", "url", "wildcard", "context"]);
    }

    #[test]
    fn test_build_rejections() {
        let registry = StageRegistry::builtin();
        for yaml in [
            "[]",
            "[wildcard, text]",
            "[{text: {}}, {text: {}, url: {}}]",
            "[{text: [1, 2]}]",
            "[{1: {}}]",
            "[42]",
            "[spelling]",
            "[{text: {bogus: true}}]",
        ] {
            let result = Pipeline::build(&descriptors(yaml), &registry, "utf-8");
            assert!(
                matches!(result, Err(SpellError::Configuration(_))),
                "expected configuration error for {yaml}"
            );
        }
    }

    #[test]
    fn test_error_fragment_passes_through() {
        let registry = StageRegistry::builtin();
        let pipeline = Pipeline::build(&descriptors("[text, url]"), &registry, "utf-8").unwrap();
        let emitted: Vec<_> = pipeline
            .process_fragment(Fragment::error("broken.txt", "boom"))
            .collect();
        assert_eq!(emitted.len(), 1);
        assert_eq!(emitted[0].disposition, Disposition::Failed);
        assert_eq!(emitted[0].fragment.context, "broken.txt");
        assert_eq!(emitted[0].fragment.error.as_deref(), Some("boom"));
    }

    #[test]
    fn test_missing_file_becomes_error_fragment() {
        let registry = StageRegistry::builtin();
        let pipeline = Pipeline::build(&descriptors("[text]"), &registry, "utf-8").unwrap();
        let emitted: Vec<_> = pipeline.process_file("/definitely/not/here.txt").collect();
        assert_eq!(emitted.len(), 1);
        assert_eq!(emitted[0].disposition, Disposition::Failed);
        assert!(emitted[0]
            .fragment
            .error
            .as_deref()
            .unwrap()
            .contains("Failed to read"));
    }
}
