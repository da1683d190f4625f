use thiserror::Error;

/// Failures that stop a task or a whole run.
///
/// Errors raised while a stage processes a fragment are plain
/// `anyhow::Error`s; the pipeline turns them into error fragments so they
/// never show up here.
#[derive(Debug, Error)]
pub enum SpellError {
    /// Invalid pipeline or option configuration, detected before any file is read
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Source patterns that did not match a single file
    #[error("no files matched the source pattern(s): {}", .patterns.join(", "))]
    NoMatch { patterns: Vec<String> },

    /// Task selection by name/group came up empty
    #[error(
        "no tasks to run: the configuration has no tasks, or all tasks are hidden or filtered out by name/group"
    )]
    NoTask,

    /// The external spell checker could not be run or exited with an error
    #[error("spell checker failed: {0}")]
    CheckerProcess(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl SpellError {
    pub fn config(message: impl Into<String>) -> Self {
        SpellError::Configuration(message.into())
    }
}
