use crate::cache::DictionaryCacheKey;
use crate::config::{DictionaryConfig, SpellingConfig, TaskConfig};
use crate::error::SpellError;
use crate::pipeline::Pipeline;
use crate::registry::StageRegistry;
use crate::sources::resolve_sources;
use crate::spelling::{parse_words, Aspell, Checker, Hunspell, SpellingAdapter};
use crate::types::{BinaryPolicy, SpellResult};
use rayon::prelude::*;
use rayon::ThreadPoolBuilder;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

/// Run-wide choices, usually taken from the command line
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Run only tasks with these names (hidden tasks included)
    pub names: Vec<String>,
    /// Run only tasks in these groups (hidden tasks included)
    pub groups: Vec<String>,
    /// Binary policy for tasks that do not set `binary_content`
    pub binary_content: BinaryPolicy,
    /// Overrides the configured spellchecker
    pub spellchecker: Option<String>,
    pub jobs: Option<usize>,
    /// Render stage errors with their debug representation
    pub debug: bool,
    /// Reuse existing dictionaries instead of compiling them
    pub skip_dict_compile: bool,
    /// Replaces every task's own sources when non-empty
    pub sources: Vec<String>,
    /// Directory that source patterns and dictionary paths are relative to
    pub root: PathBuf,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            names: Vec::new(),
            groups: Vec::new(),
            binary_content: BinaryPolicy::default(),
            spellchecker: None,
            jobs: None,
            debug: false,
            skip_dict_compile: false,
            sources: Vec::new(),
            root: PathBuf::new(),
        }
    }
}

/// Results of one task, in source enumeration order
#[derive(Debug, Clone, Serialize)]
pub struct TaskReport {
    pub name: String,
    pub results: Vec<SpellResult>,
}

impl TaskReport {
    pub fn is_failure(&self) -> bool {
        self.results.iter().any(SpellResult::is_failure)
    }
}

pub struct TaskRunner {
    config: SpellingConfig,
    options: RunOptions,
    registry: StageRegistry,
    checker: Option<Arc<dyn Checker>>,
}

impl TaskRunner {
    pub fn new(config: SpellingConfig, options: RunOptions) -> Self {
        Self {
            config,
            options,
            registry: StageRegistry::builtin(),
            checker: None,
        }
    }

    /// Use a registry with extra stages
    pub fn with_registry(mut self, registry: StageRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Use `checker` for every task instead of spawning Aspell or Hunspell
    pub fn with_checker(mut self, checker: Arc<dyn Checker>) -> Self {
        self.checker = Some(checker);
        self
    }

    /// Tasks to run: the named or grouped ones, otherwise every visible task
    pub fn select_tasks(&self) -> Result<Vec<&TaskConfig>, SpellError> {
        let filtered = !self.options.names.is_empty() || !self.options.groups.is_empty();
        let tasks: Vec<&TaskConfig> = self
            .config
            .matrix
            .iter()
            .filter(|task| {
                if filtered {
                    self.options.names.contains(&task.name) || self.options.groups.contains(&task.group)
                } else {
                    !task.hidden
                }
            })
            .collect();

        if tasks.is_empty() {
            return Err(SpellError::NoTask);
        }
        Ok(tasks)
    }

    pub fn run(&self) -> Result<Vec<TaskReport>, SpellError> {
        self.select_tasks()?
            .into_iter()
            .map(|task| self.run_task(task))
            .collect()
    }

    pub fn run_task(&self, task: &TaskConfig) -> Result<TaskReport, SpellError> {
        let start = Instant::now();
        tracing::info!("Running task: {}", task.display_name());

        let pipeline = match task.pipeline.descriptors() {
            Some(descriptors) => Some(
                Pipeline::build(&descriptors, &self.registry, &task.default_encoding)?
                    .with_debug(self.options.debug),
            ),
            None => None,
        };
        if let Some(pipeline) = &pipeline {
            tracing::debug!("pipeline: {}", pipeline.stage_names().join(" → "));
        }

        let checker = self.checker_for(task)?;
        let binary = task.binary_content.unwrap_or(self.options.binary_content);
        let adapter = SpellingAdapter::new(checker.as_ref(), binary);

        let patterns = if self.options.sources.is_empty() {
            &task.sources
        } else {
            &self.options.sources
        };
        let files = resolve_sources(patterns, &self.options.root, task.glob_hidden, task.expect_match)?;
        let jobs = self.jobs_for(task);
        tracing::info!("{} file(s) to check with {} job(s)", files.len(), jobs);

        let check = |path: &PathBuf| check_file(path, pipeline.as_ref(), &adapter);
        let per_file: Vec<Vec<SpellResult>> = if jobs > 1 && files.len() > 1 {
            let pool = ThreadPoolBuilder::new()
                .num_threads(jobs)
                .thread_name(|i| format!("spellpipe-{i}"))
                .build()
                .map_err(|e| SpellError::config(format!("Failed to create thread pool: {e}")))?;
            pool.install(|| files.par_iter().map(check).collect())
        } else {
            files.iter().map(check).collect()
        };

        let results: Vec<SpellResult> = per_file.into_iter().flatten().collect();
        tracing::info!(
            "Task {} finished: {} result(s) in {:.0}ms",
            task.display_name(),
            results.len(),
            start.elapsed().as_millis()
        );
        Ok(TaskReport {
            name: task.name.clone(),
            results,
        })
    }

    /// Worker count: task setting, then the command line, then the top-level setting
    fn jobs_for(&self, task: &TaskConfig) -> usize {
        task.jobs
            .or(self.options.jobs)
            .or(self.config.jobs)
            .unwrap_or(1)
            .max(1)
    }

    fn checker_for(&self, task: &TaskConfig) -> Result<Arc<dyn Checker>, SpellError> {
        let name = self
            .options
            .spellchecker
            .as_deref()
            .unwrap_or(&self.config.spellchecker);

        let dictionary = match &task.dictionary {
            Some(dictionary) => self.prepare_dictionary(task, dictionary, name)?,
            None => None,
        };

        let checker: Arc<dyn Checker> = match (&self.checker, name) {
            (Some(checker), _) => Arc::clone(checker),
            (None, Aspell::NAME) => Arc::new(Aspell::new(&task.aspell, dictionary.clone())?),
            (None, Hunspell::NAME) => Arc::new(Hunspell::new(&task.hunspell, dictionary.clone())?),
            (None, other) => {
                return Err(SpellError::config(format!(
                    "unknown spellchecker '{other}', expected aspell or hunspell"
                )))
            }
        };

        if let (Some(config), Some(output)) = (&task.dictionary, &dictionary) {
            self.compile_if_stale(checker.as_ref(), task, config, output)?;
        }
        Ok(checker)
    }

    /// Resolve the dictionary output path; `None` when skipping compilation left nothing to use
    fn prepare_dictionary(
        &self,
        task: &TaskConfig,
        dictionary: &DictionaryConfig,
        checker: &str,
    ) -> Result<Option<PathBuf>, SpellError> {
        let output = self.options.root.join(&dictionary.output);
        if self.options.skip_dict_compile && !output.exists() {
            tracing::warn!(
                "{}: dictionary {} does not exist and compilation is skipped",
                task.display_name(),
                output.display()
            );
            return Ok(None);
        }
        tracing::debug!("{}: {} dictionary at {}", task.display_name(), checker, output.display());
        Ok(Some(output))
    }

    fn compile_if_stale(
        &self,
        checker: &dyn Checker,
        task: &TaskConfig,
        dictionary: &DictionaryConfig,
        output: &Path,
    ) -> Result<(), SpellError> {
        if self.options.skip_dict_compile {
            return Ok(());
        }

        let words = self.read_wordlists(dictionary)?;
        let lang = task
            .aspell
            .get("lang")
            .or_else(|| task.hunspell.get("d"))
            .and_then(|value| value.as_str())
            .unwrap_or("");
        let key = DictionaryCacheKey::new(&words, checker.name(), &dictionary.encoding, lang);
        if key.is_fresh(output) {
            tracing::info!("Dictionary {} is up to date", output.display());
            return Ok(());
        }

        if let Some(parent) = output.parent() {
            std::fs::create_dir_all(parent)?;
        }
        checker.compile_dictionary(&words, output, &dictionary.encoding)?;
        key.store(output)?;
        Ok(())
    }

    /// Words from every wordlist, sorted and deduplicated
    fn read_wordlists(&self, dictionary: &DictionaryConfig) -> Result<Vec<String>, SpellError> {
        let mut all = String::new();
        for wordlist in &dictionary.wordlists {
            let path = self.options.root.join(wordlist);
            let content = std::fs::read_to_string(&path).map_err(|e| {
                SpellError::Io(std::io::Error::new(
                    e.kind(),
                    format!("Failed to read wordlist {}: {e}", path.display()),
                ))
            })?;
            for line in content.lines() {
                all.push_str(line.trim());
                all.push('\n');
            }
        }
        Ok(parse_words(&all))
    }
}

/// Every result for one file; failures stay inside the results
fn check_file(path: &Path, pipeline: Option<&Pipeline>, adapter: &SpellingAdapter<'_>) -> Vec<SpellResult> {
    tracing::info!("Checking {}", path.display());
    match pipeline {
        Some(pipeline) => pipeline
            .process_file(path)
            .filter_map(|emitted| adapter.check_emitted(&emitted))
            .collect(),
        None => vec![adapter.check_file(path)],
    }
}
