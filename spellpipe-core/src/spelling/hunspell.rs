// Hunspell checker
//
// hunspell -l [-i E] [-p DICT] <options>

use super::process::{decode_output, encode_words, render_options, run_checker};
use super::Checker;
use crate::error::SpellError;
use serde_yaml::Mapping;
use std::path::{Path, PathBuf};

const PROGRAM: &str = "hunspell";

const ALLOWED_OPTIONS: &[&str] = &[
    "check-apostrophe",
    "check-url",
    "d",
    "H",
    "n",
    "O",
    "p",
    "r",
    "t",
    "X",
];

pub struct Hunspell {
    options: Vec<String>,
    dictionary: Option<PathBuf>,
}

impl Hunspell {
    pub const NAME: &'static str = "hunspell";

    pub fn new(options: &Mapping, dictionary: Option<PathBuf>) -> Result<Self, SpellError> {
        Ok(Self {
            options: render_options(Self::NAME, options, ALLOWED_OPTIONS, hunspell_flag, false)?,
            dictionary,
        })
    }

    pub fn arguments(&self, encoding: Option<&str>) -> Vec<String> {
        let mut args = vec!["-l".to_string()];
        if let Some(encoding) = encoding {
            args.push("-i".to_string());
            args.push(encoding.to_uppercase());
        }
        if let Some(dictionary) = &self.dictionary {
            args.push("-p".to_string());
            args.push(dictionary.display().to_string());
        }
        args.extend(self.options.iter().cloned());
        args
    }
}

// Hunspell spells every option with a single dash, values as a separate argument
fn hunspell_flag(key: &str) -> String {
    format!("-{key}")
}

impl Checker for Hunspell {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn check(&self, payload: &[u8], encoding: Option<&str>) -> Result<String, SpellError> {
        let stdout = run_checker(PROGRAM, &self.arguments(encoding), payload)?;
        Ok(decode_output(&stdout, encoding))
    }

    /// Hunspell loads a personal dictionary (`-p`) as a plain word list
    fn compile_dictionary(&self, words: &[String], output: &Path, encoding: &str) -> Result<(), SpellError> {
        if let Some(parent) = output.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(output, encode_words(words, encoding)?)?;
        tracing::info!("wrote {} word(s) to {}", words.len(), output.display());
        Ok(())
    }
}
