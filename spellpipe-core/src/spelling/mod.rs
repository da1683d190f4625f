//! Spelling engine adapter
//!
//! Turns terminal pipeline items into [`SpellResult`]s by feeding their
//! content to an external checker (Aspell or Hunspell) and collecting the
//! words it reports.

pub mod aspell;
pub mod hunspell;
pub mod process;

use crate::encoding;
use crate::error::SpellError;
use crate::types::{BinaryPolicy, Content, Disposition, Emitted, SpellResult};
use std::collections::BTreeSet;
use std::path::Path;

pub use aspell::Aspell;
pub use hunspell::Hunspell;

/// External spell checker
pub trait Checker: Send + Sync {
    fn name(&self) -> &str;

    /// Check `payload` and return the checker's raw output, one word per line.
    ///
    /// `encoding` is the payload's encoding, or `None` for raw bytes.
    fn check(&self, payload: &[u8], encoding: Option<&str>) -> Result<String, SpellError>;

    /// Compile `words` into a dictionary the checker can load from `output`
    fn compile_dictionary(&self, words: &[String], output: &Path, encoding: &str) -> Result<(), SpellError>;
}

/// Split checker output into sorted, unique words
pub fn parse_words(output: &str) -> Vec<String> {
    output
        .split('\n')
        .map(|line| line.trim_end_matches('\r'))
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Checker encoding for a fragment encoding; wide Unicode forms go out as UTF-8
fn checker_encoding(label: &str) -> String {
    if label.is_empty() || encoding::is_wide_unicode(label) {
        "utf-8".to_string()
    } else {
        label.to_string()
    }
}

pub struct SpellingAdapter<'c> {
    checker: &'c dyn Checker,
    binary: BinaryPolicy,
}

impl<'c> SpellingAdapter<'c> {
    pub fn new(checker: &'c dyn Checker, binary: BinaryPolicy) -> Self {
        Self { checker, binary }
    }

    /// Check one terminal pipeline item. Items with nothing to check yield `None`.
    pub fn check_emitted(&self, emitted: &Emitted) -> Option<SpellResult> {
        let fragment = &emitted.fragment;

        if let Some(error) = &fragment.error {
            return Some(SpellResult::failed(&fragment.context, &fragment.category, error));
        }
        if matches!(emitted.disposition, Disposition::Halted | Disposition::Skipped)
            || fragment.content.is_blank()
        {
            return None;
        }

        let (payload, encoding) = match &fragment.content {
            Content::Bytes(bytes) => {
                if !self.binary.should_check(emitted.disposition) {
                    tracing::debug!("{}: not checking binary content", fragment.context);
                    return None;
                }
                (bytes.clone(), None)
            }
            Content::Text(text) => {
                let encoding = checker_encoding(&fragment.encoding);
                match encoding::encode(text, &encoding) {
                    Ok(bytes) => (bytes, Some(encoding)),
                    Err(e) => {
                        return Some(SpellResult::failed(
                            &fragment.context,
                            &fragment.category,
                            format!("{e:#}"),
                        ))
                    }
                }
            }
        };

        Some(self.run(&payload, encoding.as_deref(), &fragment.context, &fragment.category))
    }

    /// Check a whole file without filtering, as done for tasks with the pipeline disabled
    pub fn check_file(&self, path: &Path) -> SpellResult {
        let context = path.display().to_string();
        match std::fs::read(path) {
            Ok(bytes) => self.run(&bytes, None, &context, ""),
            Err(e) => SpellResult::failed(context, "", format!("Failed to read {}: {e}", path.display())),
        }
    }

    fn run(&self, payload: &[u8], encoding: Option<&str>, context: &str, category: &str) -> SpellResult {
        match self.checker.check(payload, encoding) {
            Ok(output) => SpellResult::new(parse_words(&output), context, category),
            Err(e) => {
                tracing::warn!("{}: {} failed: {}", self.checker.name(), context, e);
                SpellResult::failed(context, category, e.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_words() {
        assert_eq!(
            parse_words("helo\r\nbegn\n\nhelo\n"),
            vec!["begn".to_string(), "helo".to_string()]
        );
        assert!(parse_words("").is_empty());
    }

    #[test]
    fn test_checker_encoding() {
        assert_eq!(checker_encoding("utf-16-le"), "utf-8");
        assert_eq!(checker_encoding("utf-32-be"), "utf-8");
        assert_eq!(checker_encoding(""), "utf-8");
        assert_eq!(checker_encoding("windows-1252"), "windows-1252");
    }
}
