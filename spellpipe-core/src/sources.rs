//! Source enumeration
//!
//! Expands a task's `sources` patterns into a sorted list of files. Patterns
//! are globs relative to a root directory unless absolute; a leading `!`
//! turns a pattern into an exclusion that applies to every include pattern.

use crate::error::SpellError;
use globset::{Glob, GlobBuilder, GlobMatcher, GlobSet, GlobSetBuilder};
use std::collections::BTreeSet;
use std::path::{Component, Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

const GLOB_META: &[char] = &['*', '?', '[', '{'];

fn build_glob(pattern: &str) -> Result<Glob, SpellError> {
    GlobBuilder::new(pattern)
        .literal_separator(true)
        .backslash_escape(true)
        .build()
        .map_err(|e| SpellError::config(format!("invalid source pattern '{pattern}': {e}")))
}

/// Leading directory components that contain no wildcard, including any
/// root of an absolute pattern
fn literal_prefix(pattern: &str) -> PathBuf {
    let mut prefix = PathBuf::new();
    let mut parts = Path::new(pattern).components().peekable();
    while let Some(part) = parts.next() {
        // the last component names files, not a directory to walk from
        if parts.peek().is_none() || part.as_os_str().to_string_lossy().contains(GLOB_META) {
            break;
        }
        prefix.push(part);
    }
    prefix
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry.depth() > 0
        && entry
            .file_name()
            .to_str()
            .map(|name| name.starts_with('.'))
            .unwrap_or(false)
}

/// Compiled include and exclude patterns of one task
#[derive(Debug)]
pub struct SourceSet {
    includes: Vec<(String, GlobMatcher)>,
    excludes: GlobSet,
    glob_hidden: bool,
}

impl SourceSet {
    pub fn new(patterns: &[String], glob_hidden: bool) -> Result<Self, SpellError> {
        let mut includes = Vec::new();
        let mut excludes = GlobSetBuilder::new();

        for pattern in patterns {
            let pattern = pattern.trim();
            if pattern.is_empty() {
                continue;
            }
            match pattern.strip_prefix('!') {
                Some(excluded) => {
                    excludes.add(build_glob(excluded.trim_start_matches("./"))?);
                }
                None => {
                    let normalized = pattern.trim_start_matches("./");
                    includes.push((
                        normalized.to_string(),
                        build_glob(normalized)?.compile_matcher(),
                    ));
                }
            }
        }

        let excludes = excludes
            .build()
            .map_err(|e| SpellError::config(format!("invalid source exclusions: {e}")))?;

        Ok(Self {
            includes,
            excludes,
            glob_hidden,
        })
    }

    /// Files under `root` matched by the include patterns and not excluded.
    ///
    /// With `expect_match`, include patterns that matched nothing are reported
    /// as [`SpellError::NoMatch`].
    pub fn resolve(&self, root: &Path, expect_match: bool) -> Result<Vec<PathBuf>, SpellError> {
        let mut files = BTreeSet::new();
        let mut unmatched = Vec::new();

        for (pattern, matcher) in &self.includes {
            let before = files.len();
            let mut matched_any = false;
            for relative in self.walk(root, pattern) {
                if !matcher.is_match(&relative) || self.excludes.is_match(&relative) {
                    continue;
                }
                matched_any = true;
                files.insert(join_root(root, &relative));
            }
            tracing::debug!("source '{}' matched {} new file(s)", pattern, files.len() - before);
            if !matched_any {
                unmatched.push(pattern.clone());
            }
        }

        if expect_match && !unmatched.is_empty() {
            return Err(SpellError::NoMatch { patterns: unmatched });
        }
        Ok(files.into_iter().collect())
    }

    /// Candidate files for one pattern, relative to `root` unless the
    /// pattern is absolute
    fn walk(&self, root: &Path, pattern: &str) -> Vec<PathBuf> {
        let prefix = literal_prefix(pattern);
        let start = if prefix.is_absolute() {
            prefix.clone()
        } else {
            root.join(&prefix)
        };
        if !start.is_dir() {
            return Vec::new();
        }

        let glob_hidden = self.glob_hidden;
        WalkDir::new(&start)
            .follow_links(true)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(move |entry| glob_hidden || !is_hidden(entry))
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(e) => {
                    tracing::warn!("skipping unreadable entry: {}", e);
                    None
                }
            })
            .filter(|entry| entry.file_type().is_file())
            .filter_map(|entry| {
                entry
                    .path()
                    .strip_prefix(&start)
                    .ok()
                    .map(|rest| prefix.join(rest))
            })
            .collect()
    }
}

fn join_root(root: &Path, relative: &Path) -> PathBuf {
    if relative.is_absolute()
        || root.as_os_str().is_empty()
        || root.components().all(|c| c == Component::CurDir)
    {
        relative.to_path_buf()
    } else {
        root.join(relative)
    }
}

/// Expand `patterns` under `root` in one go
pub fn resolve_sources(
    patterns: &[String],
    root: &Path,
    glob_hidden: bool,
    expect_match: bool,
) -> Result<Vec<PathBuf>, SpellError> {
    SourceSet::new(patterns, glob_hidden)?.resolve(root, expect_match)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn tree() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        for file in [
            "src/a.py",
            "src/pkg/b.py",
            "src/vendor/c.py",
            "src/.hidden/d.py",
            "src/.e.py",
            "docs/readme.md",
            "top.txt",
        ] {
            let path = dir.path().join(file);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, "text").unwrap();
        }
        dir
    }

    fn patterns(list: &[&str]) -> Vec<String> {
        list.iter().map(|p| p.to_string()).collect()
    }

    fn relative(dir: &Path, files: Vec<PathBuf>) -> Vec<String> {
        files
            .into_iter()
            .map(|f| f.strip_prefix(dir).unwrap().to_string_lossy().replace('\\', "/"))
            .collect()
    }

    #[test]
    fn test_literal_prefix() {
        assert_eq!(literal_prefix("src/**/*.py"), PathBuf::from("src"));
        assert_eq!(literal_prefix("src/pkg/b.py"), PathBuf::from("src/pkg"));
        assert_eq!(literal_prefix("*.txt"), PathBuf::new());
        assert_eq!(literal_prefix("{src,docs}/*"), PathBuf::new());
        assert_eq!(literal_prefix("/srv/docs/**/*.md"), PathBuf::from("/srv/docs"));
    }

    #[test]
    fn test_absolute_pattern() {
        let dir = tree();
        let pattern = format!("{}/src/*.py", dir.path().display());
        let files = resolve_sources(&patterns(&[pattern.as_str()]), Path::new(""), false, true).unwrap();
        assert_eq!(files, vec![dir.path().join("src/a.py")]);

        // an unrelated root does not get in the way
        let files = resolve_sources(&patterns(&[pattern.as_str()]), Path::new("elsewhere"), false, true).unwrap();
        assert_eq!(files, vec![dir.path().join("src/a.py")]);
    }

    #[test]
    fn test_includes_excludes_and_hidden() {
        let dir = tree();
        let files = resolve_sources(
            &patterns(&["src/**/*.py", "!src/vendor/**"]),
            dir.path(),
            false,
            true,
        )
        .unwrap();
        assert_eq!(relative(dir.path(), files), vec!["src/a.py", "src/pkg/b.py"]);

        let files = resolve_sources(&patterns(&["src/**/*.py"]), dir.path(), true, true).unwrap();
        assert_eq!(
            relative(dir.path(), files),
            vec!["src/.e.py", "src/.hidden/d.py", "src/a.py", "src/pkg/b.py", "src/vendor/c.py"]
        );
    }

    #[test]
    fn test_star_does_not_cross_directories() {
        let dir = tree();
        let files = resolve_sources(&patterns(&["*.txt", "src/*.py"]), dir.path(), false, true).unwrap();
        assert_eq!(relative(dir.path(), files), vec!["src/a.py", "top.txt"]);
    }

    #[test]
    fn test_sorted_and_deduplicated() {
        let dir = tree();
        let files = resolve_sources(
            &patterns(&["src/pkg/*.py", "src/**/b.py", "docs/*.md"]),
            dir.path(),
            false,
            true,
        )
        .unwrap();
        assert_eq!(relative(dir.path(), files), vec!["docs/readme.md", "src/pkg/b.py"]);
    }

    #[test]
    fn test_no_match() {
        let dir = tree();
        let err = resolve_sources(
            &patterns(&["src/*.py", "missing/**/*.rs", "*.nope"]),
            dir.path(),
            false,
            true,
        )
        .unwrap_err();
        match err {
            SpellError::NoMatch { patterns } => {
                assert_eq!(patterns, vec!["missing/**/*.rs", "*.nope"])
            }
            other => panic!("expected NoMatch, got {other:?}"),
        }

        let files = resolve_sources(&patterns(&["*.nope"]), dir.path(), false, false).unwrap();
        assert!(files.is_empty());
    }

    #[test]
    fn test_invalid_pattern() {
        assert!(matches!(
            SourceSet::new(&patterns(&["src/[a"]), false),
            Err(SpellError::Configuration(_))
        ));
    }
}
