// Context filter
//
// Keeps or drops text between configurable delimiters. With
// `context_visible_first: false` only the delimited content survives; with
// `true` the text outside the delimiters survives and the delimited regions
// are dropped. Escape patterns are consumed before delimiters are tried.
//
// Delimiters are regexes: `open` and `close` are required, `content`
// defaults to a lazy match of anything up to the closing pattern (or the end
// of the text). Patterns are compiled in multi-line mode.

use super::Filter;
use crate::encoding;
use crate::error::SpellError;
use crate::options::{seq, Options};
use crate::types::Fragment;
use anyhow::Result;
use regex::Regex;
use serde_yaml::{Mapping, Value};

const CONTENT_GROUP: &str = "content";
const DEFAULT_CONTENT: &str = ".*?";

pub struct ContextFilter {
    default_encoding: String,
    context_visible_first: bool,
    normalize_line_endings: bool,
    escapes: Option<Regex>,
    delimiters: Vec<Regex>,
}

impl ContextFilter {
    pub const NAME: &'static str = "context";

    pub fn new(options: &Mapping, default_encoding: &str) -> Result<Self, SpellError> {
        let opts = Options::configure(
            Self::NAME,
            vec![
                ("context_visible_first", Value::Bool(false)),
                ("delimiters", seq(Vec::<String>::new())),
                ("escapes", Value::String(String::new())),
                ("normalize_line_endings", Value::Bool(true)),
            ],
            options,
        )?;

        let escapes = match opts.get_str("escapes") {
            "" => None,
            pattern => Some(
                Regex::new(&format!("(?m){pattern}"))
                    .map_err(|e| opts.invalid("escapes", &format!("is not a valid pattern: {e}")))?,
            ),
        };

        let delimiters = opts
            .get_list("delimiters")
            .iter()
            .map(|delimiter| compile_delimiter(&opts, delimiter))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            default_encoding: default_encoding.to_string(),
            context_visible_first: opts.get_bool("context_visible_first"),
            normalize_line_endings: opts.get_bool("normalize_line_endings"),
            escapes,
            delimiters,
        })
    }

    /// Apply the delimiter rules to `text`
    pub fn extract(&self, text: &str) -> String {
        let normalized;
        let text = if self.normalize_line_endings {
            normalized = encoding::normalize_eol(text);
            normalized.as_str()
        } else {
            text
        };

        let mut kept = Vec::new();
        let mut index = 0;
        let mut last = 0;
        let mut escape_cache = MatchCache::default();
        let mut caches = vec![MatchCache::default(); self.delimiters.len()];

        'scan: while index < text.len() {
            if let Some(escapes) = &self.escapes {
                if let Some((_, end)) = escape_cache.match_at(escapes, text, index) {
                    if end > index {
                        index = end;
                        continue;
                    }
                }
            }

            for (regex, cache) in self.delimiters.iter().zip(caches.iter_mut()) {
                let Some(caps) = cache.captures_at(regex, text, index) else {
                    continue;
                };
                let Some(whole) = caps.get(0) else {
                    continue;
                };
                if whole.end() == index {
                    continue;
                }
                if self.context_visible_first {
                    kept.push(&text[last..whole.start()]);
                } else if let Some(content) = caps.name(CONTENT_GROUP) {
                    kept.push(content.as_str());
                }
                index = whole.end();
                last = index;
                continue 'scan;
            }

            index += text[index..].chars().next().map(char::len_utf8).unwrap_or(1);
        }

        if self.context_visible_first && last < text.len() {
            kept.push(&text[last..]);
        }
        kept.join(" ")
    }
}

fn compile_delimiter(opts: &Options, delimiter: &Value) -> Result<Regex, SpellError> {
    let mapping = delimiter
        .as_mapping()
        .ok_or_else(|| opts.invalid("delimiters", "entries must be mappings"))?;

    let mut open = None;
    let mut close = None;
    let mut content = DEFAULT_CONTENT.to_string();
    for (key, value) in mapping {
        let key = key.as_str().unwrap_or_default();
        let value = value
            .as_str()
            .ok_or_else(|| opts.invalid("delimiters", &format!("key '{key}' must have a string value")))?
            .to_string();
        match key {
            "open" => open = Some(value),
            "close" => close = Some(value),
            "content" => content = value,
            other => {
                return Err(opts.invalid("delimiters", &format!("has unknown key '{other}'")));
            }
        }
    }

    let (Some(open), Some(close)) = (open, close) else {
        return Err(opts.invalid("delimiters", "entries need both 'open' and 'close'"));
    };

    let pattern = format!("(?m){open}(?P<{CONTENT_GROUP}>{content})(?:{close}|\\z)");
    Regex::new(&pattern)
        .map_err(|e| opts.invalid("delimiters", &format!("has an invalid pattern: {e}")))
}

/// Remembers the next match start of one regex so the scan stays linear
#[derive(Debug, Clone, Default)]
struct MatchCache {
    searched_from: Option<usize>,
    next_start: Option<usize>,
}

impl MatchCache {
    fn stale(&self, index: usize) -> bool {
        match (self.searched_from, self.next_start) {
            (None, _) => true,
            (Some(from), _) if from > index => true,
            (Some(_), Some(start)) => start < index,
            (Some(_), None) => false,
        }
    }

    fn captures_at<'t>(
        &mut self,
        regex: &Regex,
        text: &'t str,
        index: usize,
    ) -> Option<regex::Captures<'t>> {
        if !self.stale(index) && self.next_start != Some(index) {
            return None;
        }
        let caps = regex.captures_at(text, index);
        self.searched_from = Some(index);
        self.next_start = caps.as_ref().and_then(|c| c.get(0)).map(|m| m.start());
        caps.filter(|c| c.get(0).map(|m| m.start()) == Some(index))
    }

    fn match_at(&mut self, regex: &Regex, text: &str, index: usize) -> Option<(usize, usize)> {
        if !self.stale(index) && self.next_start != Some(index) {
            return None;
        }
        let found = regex.find_at(text, index);
        self.searched_from = Some(index);
        self.next_start = found.map(|m| m.start());
        found
            .filter(|m| m.start() == index)
            .map(|m| (m.start(), m.end()))
    }
}

impl Filter for ContextFilter {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn default_encoding(&self) -> &str {
        &self.default_encoding
    }

    fn run(&self, fragment: &Fragment) -> Result<Vec<Fragment>> {
        let text = self.extract(fragment.text_or_empty());
        Ok(vec![fragment.derive(text, fragment.context.clone(), "context")])
    }
}
