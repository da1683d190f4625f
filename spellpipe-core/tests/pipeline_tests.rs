//! Pipeline engine tests: routing, fan-out order, flow control and error
//! isolation, exercised with small purpose-built stages registered next to
//! the built-in ones.

use anyhow::{bail, Result};
use serde_yaml::{Mapping, Value};
use spellpipe_core::{
    Disposition, Emitted, Filter, FlowControl, FlowStatus, Fragment, Pipeline, SpellError, StageRegistry,
};
use std::sync::{Arc, Mutex};

// ============================================================================
// Test stages
// ============================================================================

/// Splits text on `|`; each piece's category is its first word
struct Splitter;

impl Filter for Splitter {
    fn name(&self) -> &str {
        "splitter"
    }

    fn default_encoding(&self) -> &str {
        "utf-8"
    }

    fn run(&self, fragment: &Fragment) -> Result<Vec<Fragment>> {
        Ok(fragment
            .text_or_empty()
            .split('|')
            .map(|piece| {
                let category = piece.split_whitespace().next().unwrap_or("empty");
                fragment.derive(piece.trim(), format!("{}:{}", fragment.context, category), category)
            })
            .collect())
    }
}

/// Passes fragments through unchanged and records what it saw
struct Recorder {
    seen: Arc<Mutex<Vec<String>>>,
}

impl Filter for Recorder {
    fn name(&self) -> &str {
        "recorder"
    }

    fn default_encoding(&self) -> &str {
        "utf-8"
    }

    fn run(&self, fragment: &Fragment) -> Result<Vec<Fragment>> {
        self.seen.lock().unwrap().push(fragment.text_or_empty().to_string());
        Ok(vec![fragment.clone()])
    }
}

/// Fails on fragments containing "boom"
struct Exploder;

impl Filter for Exploder {
    fn name(&self) -> &str {
        "exploder"
    }

    fn default_encoding(&self) -> &str {
        "utf-8"
    }

    fn run(&self, fragment: &Fragment) -> Result<Vec<Fragment>> {
        if fragment.text_or_empty().contains("boom") {
            bail!("cannot handle '{}'", fragment.text_or_empty());
        }
        Ok(vec![fragment.clone()])
    }
}

/// Turns every fragment into raw bytes
struct Binarizer;

impl Filter for Binarizer {
    fn name(&self) -> &str {
        "binarizer"
    }

    fn default_encoding(&self) -> &str {
        "utf-8"
    }

    fn run(&self, fragment: &Fragment) -> Result<Vec<Fragment>> {
        Ok(vec![Fragment::bytes(
            fragment.text_or_empty().as_bytes().to_vec(),
            fragment.context.clone(),
            "raw",
        )])
    }
}

/// Flow control that fails for one category
struct Picky;

impl FlowControl for Picky {
    fn name(&self) -> &str {
        "picky"
    }

    fn adjust_flow(&self, category: &str) -> Result<FlowStatus> {
        if category == "bad" {
            bail!("refusing category '{category}'");
        }
        Ok(FlowStatus::Allow)
    }
}

struct Harness {
    registry: StageRegistry,
    seen: Arc<Mutex<Vec<String>>>,
}

impl Harness {
    fn new() -> Self {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut registry = StageRegistry::builtin();
        registry.register_filter("splitter", |_: &Mapping, _: &str| {
            Ok(Box::new(Splitter) as Box<dyn Filter>)
        });
        let recorder_seen = Arc::clone(&seen);
        registry.register_filter("recorder", move |_: &Mapping, _: &str| {
            Ok(Box::new(Recorder {
                seen: Arc::clone(&recorder_seen),
            }) as Box<dyn Filter>)
        });
        registry.register_filter("exploder", |_: &Mapping, _: &str| {
            Ok(Box::new(Exploder) as Box<dyn Filter>)
        });
        registry.register_filter("binarizer", |_: &Mapping, _: &str| {
            Ok(Box::new(Binarizer) as Box<dyn Filter>)
        });
        registry.register_flow_control("picky", |_: &Mapping| {
            Ok(Box::new(Picky) as Box<dyn FlowControl>)
        });
        Self { registry, seen }
    }

    fn pipeline(&self, yaml: &str) -> Pipeline {
        let descriptors: Vec<Value> = serde_yaml::from_str(yaml).unwrap();
        Pipeline::build(&descriptors, &self.registry, "utf-8").unwrap()
    }

    fn run(&self, yaml: &str, text: &str) -> Vec<Emitted> {
        self.pipeline(yaml)
            .process_fragment(Fragment::text(text, "input", "utf-8", "text"))
            .collect()
    }

    fn seen(&self) -> Vec<String> {
        self.seen.lock().unwrap().clone()
    }
}

fn texts(emitted: &[Emitted]) -> Vec<&str> {
    emitted.iter().map(|e| e.fragment.text_or_empty()).collect()
}

fn dispositions(emitted: &[Emitted]) -> Vec<Disposition> {
    emitted.iter().map(|e| e.disposition).collect()
}

// ============================================================================
// Fan-out ordering
// ============================================================================

mod fan_out {
    use super::*;

    #[test]
    fn split_then_identity_keeps_order() {
        let harness = Harness::new();
        let emitted = harness.run("[splitter, recorder]", "alpha one|beta two");
        assert_eq!(texts(&emitted), vec!["alpha one", "beta two"]);
        assert_eq!(harness.seen(), vec!["alpha one", "beta two"]);
        assert!(emitted.iter().all(|e| e.disposition == Disposition::Completed));
    }

    #[test]
    fn nested_fan_out_is_depth_first() {
        let harness = Harness::new();
        // second splitter sees each piece on its own; nothing left to split
        let emitted = harness.run("[splitter, splitter, recorder]", "a|b|c");
        assert_eq!(texts(&emitted), vec!["a", "b", "c"]);
        assert_eq!(
            emitted.iter().map(|e| e.fragment.context.as_str()).collect::<Vec<_>>(),
            vec!["input:a:a", "input:b:b", "input:c:c"]
        );
    }

    #[test]
    fn empty_fan_out_emits_nothing() {
        let harness = Harness::new();
        let pipeline = harness.pipeline("[splitter, python]");
        let emitted: Vec<_> = pipeline
            .process_fragment(Fragment::text("x = 1", "input", "utf-8", "text"))
            .collect();
        assert!(emitted.is_empty());
    }

    #[test]
    fn run_is_lazy() {
        let harness = Harness::new();
        let pipeline = harness.pipeline("[splitter, recorder]");
        let mut run = pipeline.process_fragment(Fragment::text("a|b|c", "input", "utf-8", "text"));
        let first = run.next().unwrap();
        assert_eq!(first.fragment.text_or_empty(), "a");
        assert_eq!(harness.seen(), vec!["a"]);
    }
}

// ============================================================================
// Flow control
// ============================================================================

mod flow_control {
    use super::*;

    #[test]
    fn skip_bypasses_exactly_one_filter() {
        let harness = Harness::new();
        let emitted = harness.run(
            "[splitter, {wildcard: {allow: [keep]}}, recorder, recorder]",
            "keep this|drop that",
        );
        assert_eq!(texts(&emitted), vec!["keep this", "drop that"]);
        // "drop that" skipped the first recorder only
        assert_eq!(harness.seen(), vec!["keep this", "keep this", "drop that"]);
        assert!(emitted.iter().all(|e| e.disposition == Disposition::Completed));
    }

    #[test]
    fn skip_past_the_last_filter_is_not_completed() {
        let harness = Harness::new();
        let emitted = harness.run(
            "[splitter, {wildcard: {allow: [keep]}}, recorder]",
            "keep this|drop that",
        );
        assert_eq!(texts(&emitted), vec!["keep this", "drop that"]);
        assert_eq!(
            dispositions(&emitted),
            vec![Disposition::Completed, Disposition::Skipped]
        );
        assert_eq!(harness.seen(), vec!["keep this"]);
    }

    #[test]
    fn trailing_flow_control_does_not_skip() {
        let harness = Harness::new();
        let emitted = harness.run(
            "[splitter, recorder, {wildcard: {allow: [keep]}}]",
            "keep this|drop that",
        );
        assert!(emitted.iter().all(|e| e.disposition == Disposition::Completed));
    }

    #[test]
    fn halt_wins_over_skip() {
        let harness = Harness::new();
        let emitted = harness.run(
            "[splitter, {wildcard: {allow: ['*'], skip: [both], halt: [both]}}, recorder]",
            "both words|other words",
        );
        assert_eq!(
            dispositions(&emitted),
            vec![Disposition::Halted, Disposition::Completed]
        );
        assert_eq!(harness.seen(), vec!["other words"]);
    }

    #[test]
    fn halted_fragment_is_yielded_unchanged() {
        let harness = Harness::new();
        let emitted = harness.run(
            "[splitter, {wildcard: {halt: [stop]}}, recorder, url]",
            "stop here",
        );
        assert_eq!(emitted.len(), 1);
        assert_eq!(emitted[0].disposition, Disposition::Halted);
        assert_eq!(emitted[0].fragment.category, "stop");
        assert_eq!(emitted[0].fragment.text_or_empty(), "stop here");
        assert!(emitted[0].fragment.error.is_none());
        assert!(harness.seen().is_empty());
    }

    #[test]
    fn halt_before_end_of_stages_counts_as_halted() {
        let harness = Harness::new();
        let emitted = harness.run("[splitter, {wildcard: {halt: [stop]}}]", "stop|go");
        assert_eq!(
            dispositions(&emitted),
            vec![Disposition::Halted, Disposition::Completed]
        );
    }

    #[test]
    fn flow_status_resets_after_gated_filter() {
        let harness = Harness::new();
        harness.run("[splitter, {wildcard: {allow: [none]}}, url, recorder]", "plain text");
        assert_eq!(harness.seen(), vec!["plain text"]);
    }

    #[test]
    fn flow_control_errors_become_error_fragments() {
        let harness = Harness::new();
        let emitted = harness.run("[splitter, picky, recorder]", "bad one|good one");
        assert_eq!(
            dispositions(&emitted),
            vec![Disposition::Failed, Disposition::Completed]
        );
        assert_eq!(emitted[0].fragment.context, "input:bad");
        assert!(emitted[0]
            .fragment
            .error
            .as_deref()
            .unwrap()
            .contains("refusing category 'bad'"));
        assert_eq!(harness.seen(), vec!["good one"]);
    }
}

// ============================================================================
// Error isolation
// ============================================================================

mod errors {
    use super::*;

    #[test]
    fn failing_branch_does_not_stop_siblings() {
        let harness = Harness::new();
        let emitted = harness.run("[splitter, exploder, recorder]", "fine|boom now|also fine");
        assert_eq!(
            dispositions(&emitted),
            vec![Disposition::Completed, Disposition::Failed, Disposition::Completed]
        );
        assert_eq!(emitted[1].fragment.context, "input:boom");
        assert_eq!(
            emitted[1].fragment.error.as_deref(),
            Some("cannot handle 'boom now'")
        );
        assert_eq!(harness.seen(), vec!["fine", "also fine"]);
    }

    #[test]
    fn error_fragment_passes_every_stage_unchanged() {
        let harness = Harness::new();
        let pipeline = harness.pipeline("[recorder, splitter, {wildcard: {halt: ['*']}}, recorder]");
        let input = Fragment::error("broken.py", "decode failed");
        let emitted: Vec<_> = pipeline.process_fragment(input.clone()).collect();
        assert_eq!(emitted.len(), 1);
        assert_eq!(emitted[0].fragment, input);
        assert_eq!(emitted[0].disposition, Disposition::Failed);
        assert!(harness.seen().is_empty());
    }

    #[test]
    fn debug_mode_renders_error_details() {
        let harness = Harness::new();
        let pipeline = harness.pipeline("[exploder]").with_debug(true);
        let emitted: Vec<_> = pipeline
            .process_fragment(Fragment::text("boom", "input", "utf-8", "text"))
            .collect();
        assert!(emitted[0].fragment.error.as_deref().unwrap().contains("cannot handle"));
    }
}

// ============================================================================
// Binary content
// ============================================================================

mod binary {
    use super::*;

    #[test]
    fn bytes_bypass_remaining_filters() {
        let harness = Harness::new();
        let emitted = harness.run("[binarizer, recorder, url]", "raw data");
        assert_eq!(emitted.len(), 1);
        assert_eq!(emitted[0].disposition, Disposition::Bypassed);
        assert!(emitted[0].fragment.is_bytes());
        assert!(harness.seen().is_empty());
    }

    #[test]
    fn bytes_at_last_stage_complete() {
        let harness = Harness::new();
        let emitted = harness.run("[recorder, binarizer]", "raw data");
        assert_eq!(dispositions(&emitted), vec![Disposition::Completed]);
    }

    #[test]
    fn binary_file_from_first_stage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("image.bin");
        std::fs::write(&path, b"\x89PNG\x00\x00\x01garbage").unwrap();

        let harness = Harness::new();
        let pipeline = harness.pipeline("[text, recorder]");
        let emitted: Vec<_> = pipeline.process_file(&path).collect();
        assert_eq!(emitted.len(), 1);
        assert_eq!(emitted[0].disposition, Disposition::Bypassed);
        assert_eq!(emitted[0].fragment.category, "binary");
        assert!(harness.seen().is_empty());
    }
}

// ============================================================================
// Build-time validation
// ============================================================================

mod validation {
    use super::*;

    #[test]
    fn two_keys_in_one_descriptor_is_rejected() {
        let harness = Harness::new();
        let descriptors: Vec<Value> =
            serde_yaml::from_str("[{recorder: {}}, {recorder: {}, splitter: {}}]").unwrap();
        let result = Pipeline::build(&descriptors, &harness.registry, "utf-8");
        assert!(matches!(result, Err(SpellError::Configuration(_))));
    }

    #[test]
    fn leading_flow_control_is_rejected() {
        let harness = Harness::new();
        let descriptors: Vec<Value> = serde_yaml::from_str("[picky, recorder]").unwrap();
        assert!(matches!(
            Pipeline::build(&descriptors, &harness.registry, "utf-8"),
            Err(SpellError::Configuration(_))
        ));
    }

    #[test]
    fn bad_stage_options_are_rejected() {
        let harness = Harness::new();
        for yaml in [
            "[{wildcard: {allow: 'py-*'}}]",
            "[text, {wildcard: {deny: [x]}}]",
            "[{python: {comments: 'yes'}}]",
            "[{text: {errors: loud}}]",
        ] {
            let descriptors: Vec<Value> = serde_yaml::from_str(yaml).unwrap();
            assert!(
                matches!(
                    Pipeline::build(&descriptors, &harness.registry, "utf-8"),
                    Err(SpellError::Configuration(_))
                ),
                "{yaml} should be rejected"
            );
        }
    }

    #[test]
    fn namespaced_and_bare_names_resolve_alike() {
        let harness = Harness::new();
        let pipeline = harness.pipeline(
            "[spellpipe.filters.text, {spellpipe.flow_control.wildcard: {allow: ['*']}}, url]",
        );
        assert_eq!(pipeline.stage_names(), vec!["text", "wildcard", "url"]);
        assert_eq!(pipeline.len(), 3);
    }
}
