// Wildcard flow control
//
// Categories are matched against three glob lists. A category that matches
// no `allow` pattern is skipped. A matching `allow` is downgraded to `Skip`
// when a `skip` pattern also matches, and to `Halt` when a `halt` pattern
// matches; halt wins over skip. Allow patterns are tried in order and the
// first match that gets downgraded ends the evaluation.

use super::FlowControl;
use crate::error::SpellError;
use crate::options::{seq, Options};
use crate::types::FlowStatus;
use anyhow::Result;
use globset::{Glob, GlobMatcher, GlobSet, GlobSetBuilder};
use serde_yaml::Mapping;

pub struct WildcardFlowControl {
    allow: Vec<GlobMatcher>,
    skip: GlobSet,
    halt: GlobSet,
}

impl WildcardFlowControl {
    pub const NAME: &'static str = "wildcard";

    pub fn new(options: &Mapping) -> Result<Self, SpellError> {
        let opts = Options::configure(
            Self::NAME,
            vec![
                ("allow", seq(["*"])),
                ("skip", seq(Vec::<String>::new())),
                ("halt", seq(Vec::<String>::new())),
            ],
            options,
        )?;

        let allow = opts
            .get_str_list("allow")?
            .iter()
            .map(|pattern| compile(&opts, "allow", pattern).map(|glob| glob.compile_matcher()))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            allow,
            skip: compile_set(&opts, "skip")?,
            halt: compile_set(&opts, "halt")?,
        })
    }
}

fn compile(opts: &Options, key: &str, pattern: &str) -> Result<Glob, SpellError> {
    Glob::new(pattern)
        .map_err(|e| opts.invalid(key, &format!("has an invalid pattern '{pattern}': {e}")))
}

fn compile_set(opts: &Options, key: &str) -> Result<GlobSet, SpellError> {
    let mut builder = GlobSetBuilder::new();
    for pattern in opts.get_str_list(key)? {
        builder.add(compile(opts, key, &pattern)?);
    }
    builder
        .build()
        .map_err(|e| opts.invalid(key, &format!("could not be compiled: {e}")))
}

impl FlowControl for WildcardFlowControl {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn adjust_flow(&self, category: &str) -> Result<FlowStatus> {
        let mut status = FlowStatus::Skip;
        for allow in &self.allow {
            if !allow.is_match(category) {
                continue;
            }
            status = FlowStatus::Allow;
            if self.skip.is_match(category) {
                status = FlowStatus::Skip;
            }
            if self.halt.is_match(category) {
                status = FlowStatus::Halt;
            }
            if status != FlowStatus::Allow {
                break;
            }
        }
        tracing::trace!("wildcard: {} -> {}", category, status);
        Ok(status)
    }
}
