use crate::error::SpellError;
use crate::types::BinaryPolicy;
use serde::{Deserialize, Deserializer, Serialize};
use serde_yaml::{Mapping, Value};
use std::path::{Path, PathBuf};

/// Files looked up in the working directory when no config path is given
pub const DEFAULT_CONFIG_NAMES: &[&str] = &[
    ".spellpipe.yml",
    ".spellpipe.yaml",
    "spellpipe.yml",
    "spellpipe.yaml",
];

// Default value functions for serde
fn default_true() -> bool {
    true
}

fn default_encoding() -> String {
    "utf-8".to_string()
}

fn default_spellchecker() -> String {
    "aspell".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpellingConfig {
    /// `aspell` or `hunspell`
    #[serde(default = "default_spellchecker")]
    pub spellchecker: String,
    /// Worker threads per task unless the task sets its own
    #[serde(default)]
    pub jobs: Option<usize>,
    #[serde(default)]
    pub matrix: Vec<TaskConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskConfig {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub group: String,
    /// Hidden tasks only run when selected by name or group
    #[serde(default)]
    pub hidden: bool,
    #[serde(default)]
    pub sources: Vec<String>,
    /// Fail when an include pattern matches nothing
    #[serde(default = "default_true")]
    pub expect_match: bool,
    #[serde(default = "default_encoding")]
    pub default_encoding: String,
    /// Falls back to the command line choice when unset
    #[serde(default)]
    pub binary_content: Option<BinaryPolicy>,
    /// Let wildcards match dot files and dot directories
    #[serde(default)]
    pub glob_hidden: bool,
    #[serde(default)]
    pub jobs: Option<usize>,
    #[serde(default)]
    pub aspell: Mapping,
    #[serde(default)]
    pub hunspell: Mapping,
    #[serde(default)]
    pub dictionary: Option<DictionaryConfig>,
    #[serde(default, deserialize_with = "deserialize_pipeline")]
    pub pipeline: PipelineSetting,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DictionaryConfig {
    #[serde(default)]
    pub wordlists: Vec<PathBuf>,
    pub output: PathBuf,
    #[serde(default = "default_encoding")]
    pub encoding: String,
}

/// The `pipeline` key of a task
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub enum PipelineSetting {
    /// Key missing or empty: a lone `text` stage
    #[default]
    Default,
    /// `pipeline: null`: files go to the checker unfiltered
    Disabled,
    Stages(Vec<Value>),
}

impl PipelineSetting {
    /// Stage descriptors to build, or `None` when the pipeline is disabled
    pub fn descriptors(&self) -> Option<Vec<Value>> {
        match self {
            PipelineSetting::Default => Some(vec![Value::String("text".to_string())]),
            PipelineSetting::Disabled => None,
            PipelineSetting::Stages(stages) => Some(stages.clone()),
        }
    }
}

// Only called when the key is present, so a missing key stays `Default`
fn deserialize_pipeline<'de, D>(deserializer: D) -> Result<PipelineSetting, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Vec<Value>>::deserialize(deserializer)?;
    Ok(match value {
        None => PipelineSetting::Disabled,
        Some(stages) if stages.is_empty() => PipelineSetting::Default,
        Some(stages) => PipelineSetting::Stages(stages),
    })
}

impl SpellingConfig {
    /// Load configuration from YAML file
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, SpellError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> Result<Self, SpellError> {
        let config: SpellingConfig = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// First default config file present in `dir`
    pub fn find_default(dir: impl AsRef<Path>) -> Option<PathBuf> {
        DEFAULT_CONFIG_NAMES
            .iter()
            .map(|name| dir.as_ref().join(name))
            .find(|path| path.is_file())
    }

    fn validate(&self) -> Result<(), SpellError> {
        match self.spellchecker.as_str() {
            "aspell" | "hunspell" => {}
            other => {
                return Err(SpellError::config(format!(
                    "unknown spellchecker '{other}', expected aspell or hunspell"
                )))
            }
        }
        if self.jobs == Some(0) {
            return Err(SpellError::config("jobs must be at least 1"));
        }
        for (i, task) in self.matrix.iter().enumerate() {
            if task.jobs == Some(0) {
                return Err(SpellError::config(format!(
                    "task {} ({}): jobs must be at least 1",
                    i,
                    task.display_name()
                )));
            }
        }
        Ok(())
    }
}

impl TaskConfig {
    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            "<unnamed>"
        } else {
            &self.name
        }
    }
}
