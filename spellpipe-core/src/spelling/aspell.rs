// Aspell checker
//
// aspell list [--encoding=E] [--add-extra-dicts=DICT] <options>
//
// Options map onto Aspell's command line flags: single letter keys become
// `-k value`, longer ones `--key=value`. `true` adds a bare flag, `false`
// the `--dont-` form, and lists repeat the flag once per item.

use super::process::{decode_output, encode_words, render_options, run_checker};
use super::Checker;
use crate::error::SpellError;
use serde_yaml::Mapping;
use std::path::{Path, PathBuf};

const PROGRAM: &str = "aspell";

const ALLOWED_OPTIONS: &[&str] = &[
    "add-filter",
    "add-filter-path",
    "add-extra-dicts",
    "add-word-list-path",
    "camel-case",
    "d",
    "dict-dir",
    "ignore",
    "ignore-accents",
    "ignore-case",
    "keymapping",
    "l",
    "lang",
    "local-data-dir",
    "master",
    "mode",
    "normalize",
    "norm-required",
    "norm-form",
    "p",
    "personal",
    "rem-filter",
    "run-together",
    "run-together-limit",
    "run-together-min",
    "size",
    "sug-mode",
    "variety",
];

pub struct Aspell {
    options: Vec<String>,
    lang: Option<String>,
    dictionary: Option<PathBuf>,
}

impl Aspell {
    pub const NAME: &'static str = "aspell";

    pub fn new(options: &Mapping, dictionary: Option<PathBuf>) -> Result<Self, SpellError> {
        let options = render_options(Self::NAME, options, ALLOWED_OPTIONS, aspell_flag, true)?;
        let lang = find_value(&options, "--lang=").or_else(|| find_separate(&options, "-l"));
        Ok(Self {
            options,
            lang,
            dictionary,
        })
    }

    /// Full argument list for a `list` run
    pub fn arguments(&self, encoding: Option<&str>) -> Vec<String> {
        let mut args = vec!["list".to_string()];
        if let Some(encoding) = encoding {
            args.push(format!("--encoding={}", aspell_encoding(encoding)));
        }
        if let Some(dictionary) = &self.dictionary {
            args.push(format!("--add-extra-dicts={}", dictionary.display()));
        }
        args.extend(self.options.iter().cloned());
        args
    }
}

/// Aspell spells some encodings its own way
fn aspell_encoding(label: &str) -> String {
    match label {
        "utf-8" => "utf-8".to_string(),
        other if other.starts_with("iso-8859-") => other.replacen("iso-8859-", "iso8859-", 1),
        other if other.starts_with("windows-") => other.replacen("windows-", "cp", 1),
        other => other.to_string(),
    }
}

fn aspell_flag(key: &str) -> String {
    if key.chars().count() == 1 {
        format!("-{key}")
    } else {
        format!("--{key}")
    }
}

fn find_value(options: &[String], prefix: &str) -> Option<String> {
    options
        .iter()
        .find_map(|option| option.strip_prefix(prefix))
        .map(str::to_string)
}

fn find_separate(options: &[String], flag: &str) -> Option<String> {
    options
        .iter()
        .position(|option| option == flag)
        .and_then(|i| options.get(i + 1))
        .cloned()
}

impl Checker for Aspell {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn check(&self, payload: &[u8], encoding: Option<&str>) -> Result<String, SpellError> {
        let stdout = run_checker(PROGRAM, &self.arguments(encoding), payload)?;
        Ok(decode_output(&stdout, encoding))
    }

    fn compile_dictionary(&self, words: &[String], output: &Path, encoding: &str) -> Result<(), SpellError> {
        let lang = self.lang.as_deref().unwrap_or("en");
        let args = vec![
            format!("--lang={lang}"),
            format!("--encoding={}", aspell_encoding(encoding)),
            "create".to_string(),
            "master".to_string(),
            output.display().to_string(),
        ];
        let payload = encode_words(words, encoding)?;
        run_checker(PROGRAM, &args, &payload)?;
        tracing::info!("compiled {} word(s) into {}", words.len(), output.display());
        Ok(())
    }
}
