//! Python comment, docstring and string filter
//!
//! A small tokenizer walks the source once and tracks just enough structure
//! to tell docstrings from other strings:
//!
//! - logical lines (bracket depth and backslash continuations),
//! - indentation of each logical line (tabs advance to the next multiple of 8),
//! - a stack of enclosing `class`/`def` headers, popped when a logical line
//!   starts at or left of the header's indentation.
//!
//! A docstring is a string that opens the first logical line of a module or
//! of a `class`/`def` body. Contexts read `path(line)`, or
//! `path(line): Outer.method` inside a class or function.

use super::{clike, line_context, Filter};
use crate::error::SpellError;
use crate::options::Options;
use crate::types::Fragment;
use anyhow::Result;
use regex::bytes::Regex as BytesRegex;
use regex::Regex;
use serde_yaml::{Mapping, Value};
use std::sync::LazyLock;

static CODING_REGEX: LazyLock<BytesRegex> =
    LazyLock::new(|| BytesRegex::new(r"^[ \t\x0c]*#.*?coding[:=][ \t]*([-\w.]+)").unwrap());

static NAMED_ESCAPE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\\N\{[^}]*\}").unwrap());

const STRING_TYPES: &str = "bfru*";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PyKind {
    Comment,
    Docstring,
    String,
}

#[derive(Debug, Clone)]
struct PyToken {
    kind: PyKind,
    /// Lowercased string prefix (`rb`, `f`, ...); empty for comments
    prefix: String,
    body: String,
    line: usize,
    end_line: usize,
    /// Dotted chain of enclosing class/def names
    scope: String,
}

#[derive(Debug)]
struct Scope {
    indent: usize,
    name: String,
}

pub struct PythonFilter {
    default_encoding: String,
    comments: bool,
    docstrings: bool,
    strings: bool,
    string_types: String,
    group_comments: bool,
    decode_escapes: bool,
}

impl PythonFilter {
    pub const NAME: &'static str = "python";

    pub fn new(options: &Mapping, default_encoding: &str) -> Result<Self, SpellError> {
        let opts = Options::configure(
            Self::NAME,
            vec![
                ("comments", Value::Bool(true)),
                ("docstrings", Value::Bool(true)),
                ("strings", Value::Bool(false)),
                ("string_types", Value::String("fu".into())),
                ("group_comments", Value::Bool(false)),
                ("decode_escapes", Value::Bool(true)),
            ],
            options,
        )?;

        let string_types = opts.get_str("string_types").to_lowercase();
        if let Some(bad) = string_types.chars().find(|c| !STRING_TYPES.contains(*c)) {
            return Err(opts.invalid(
                "string_types",
                &format!("has unknown type '{bad}'; use any of '{STRING_TYPES}'"),
            ));
        }

        Ok(Self {
            default_encoding: default_encoding.to_string(),
            comments: opts.get_bool("comments"),
            docstrings: opts.get_bool("docstrings"),
            strings: opts.get_bool("strings"),
            string_types,
            group_comments: opts.get_bool("group_comments"),
            decode_escapes: opts.get_bool("decode_escapes"),
        })
    }

    /// Whether a string with `prefix` is selected by `string_types`
    fn wants_string_type(&self, prefix: &str) -> bool {
        if self.string_types.contains('*') {
            return true;
        }
        let mut kinds = Vec::with_capacity(2);
        if prefix.contains('b') {
            kinds.push('b');
        } else if prefix.contains('f') || prefix.contains('t') {
            kinds.push('f');
        } else {
            kinds.push('u');
        }
        if prefix.contains('r') {
            kinds.push('r');
        }
        kinds.iter().all(|k| self.string_types.contains(*k))
    }

    fn string_text(&self, token: &PyToken) -> String {
        let mut body = token.body.clone();
        if token.prefix.contains('f') || token.prefix.contains('t') {
            body = strip_replacement_fields(&body);
        }
        if self.decode_escapes && !token.prefix.contains('r') {
            body = NAMED_ESCAPE_REGEX.replace_all(&body, "").into_owned();
            body = clike::decode_escapes(&body);
        }
        body
    }
}

impl Filter for PythonFilter {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn default_encoding(&self) -> &str {
        &self.default_encoding
    }

    /// PEP 263 coding declaration on one of the first two lines
    fn header_check(&self, head: &[u8]) -> Option<String> {
        head.split(|&b| b == b'\n').take(2).find_map(|line| {
            CODING_REGEX
                .captures(line)
                .and_then(|caps| caps.get(1))
                .map(|m| String::from_utf8_lossy(m.as_bytes()).into_owned())
        })
    }

    fn run(&self, fragment: &Fragment) -> Result<Vec<Fragment>> {
        let mut tokens = tokenize(fragment.text_or_empty());
        if self.group_comments {
            tokens = group_comments(tokens);
        }

        let mut fragments = Vec::new();
        for token in tokens {
            let (category, text) = match token.kind {
                PyKind::Comment if self.comments => ("py-comment", token.body.clone()),
                PyKind::Docstring if self.docstrings => ("py-docstring", self.string_text(&token)),
                PyKind::Docstring | PyKind::String
                    if self.strings && self.wants_string_type(&token.prefix) =>
                {
                    ("py-string", self.string_text(&token))
                }
                _ => continue,
            };

            let mut context = line_context(&fragment.context, token.line);
            if !token.scope.is_empty() {
                context = format!("{context}: {}", token.scope);
            }
            fragments.push(fragment.derive(text, context, category));
        }
        Ok(fragments)
    }
}

fn is_string_prefix(word: &str) -> bool {
    if word.is_empty() || word.len() > 3 {
        return false;
    }
    let lowered = word.to_lowercase();
    matches!(
        lowered.as_str(),
        "r" | "u" | "b" | "f" | "t" | "br" | "rb" | "fr" | "rf" | "tr" | "rt"
    )
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Identifier that follows a `def`/`class` keyword
fn header_name(after_keyword: &str) -> Option<String> {
    if after_keyword.starts_with(is_ident_char) {
        return None;
    }
    let trimmed = after_keyword.trim_start_matches([' ', '\t']);
    let end = trimmed.find(|c: char| !is_ident_char(c)).unwrap_or(trimmed.len());
    (end > 0).then(|| trimmed[..end].to_string())
}

fn scope_chain(scopes: &[Scope], column: Option<usize>) -> String {
    scopes
        .iter()
        .filter(|scope| column.map_or(true, |c| scope.indent < c))
        .map(|scope| scope.name.as_str())
        .collect::<Vec<_>>()
        .join(".")
}

/// Consumed length and body of the string literal at the start of `rest`
fn scan_string(rest: &str) -> (usize, &str) {
    let quote = if rest.starts_with("\"\"\"") || rest.starts_with("'''") {
        &rest[..3]
    } else {
        &rest[..1]
    };
    let triple = quote.len() == 3;
    let start = quote.len();

    let mut chars = rest[start..].char_indices();
    while let Some((i, c)) = chars.next() {
        let at = start + i;
        match c {
            '\\' => {
                chars.next();
            }
            '\n' if !triple => return (at, &rest[start..at]),
            _ if rest[at..].starts_with(quote) => return (at + quote.len(), &rest[start..at]),
            _ => {}
        }
    }
    (rest.len(), &rest[start..])
}

fn tokenize(text: &str) -> Vec<PyToken> {
    let mut tokens = Vec::new();
    let mut scopes: Vec<Scope> = Vec::new();
    let mut pos = 0;
    let mut line = 1;
    let mut depth = 0usize;
    let mut at_line_start = true;
    let mut column = 0usize;
    let mut line_indent = 0usize;
    let mut significant = 0usize;
    let mut header: Option<String> = None;
    let mut expect_docstring = true;

    if text.starts_with("#!") {
        pos = text.find('\n').unwrap_or(text.len());
    }

    while pos < text.len() {
        let rest = &text[pos..];
        let Some(ch) = rest.chars().next() else {
            break;
        };

        if at_line_start {
            match ch {
                ' ' => {
                    column += 1;
                    pos += 1;
                    continue;
                }
                '\t' => {
                    column = (column / 8 + 1) * 8;
                    pos += 1;
                    continue;
                }
                '\x0c' | '\r' => {
                    if ch == '\x0c' {
                        column = 0;
                    }
                    pos += 1;
                    continue;
                }
                '\n' | '#' => {}
                _ => {
                    at_line_start = false;
                    line_indent = column;
                    while scopes.last().is_some_and(|s| s.indent >= line_indent) {
                        scopes.pop();
                    }
                }
            }
        }

        match ch {
            '#' => {
                let end = rest.find('\n').unwrap_or(rest.len());
                let limit = at_line_start.then_some(column);
                tokens.push(PyToken {
                    kind: PyKind::Comment,
                    prefix: String::new(),
                    body: rest[1..end].to_string(),
                    line,
                    end_line: line,
                    scope: scope_chain(&scopes, limit),
                });
                pos += end;
            }
            '\n' => {
                line += 1;
                pos += 1;
                if depth == 0 {
                    if significant > 0 {
                        if let Some(name) = header.take() {
                            scopes.push(Scope {
                                indent: line_indent,
                                name,
                            });
                            expect_docstring = true;
                        }
                    }
                    significant = 0;
                    at_line_start = true;
                    column = 0;
                }
            }
            '\\' if rest[1..].starts_with('\n') => {
                line += 1;
                pos += 2;
            }
            '"' | '\'' => {
                let (len, body) = scan_string(rest);
                push_string(
                    &mut tokens,
                    "",
                    body,
                    line,
                    &scopes,
                    significant == 0 && depth == 0 && expect_docstring,
                );
                line += rest[..len].matches('\n').count();
                significant += 1;
                expect_docstring = false;
                pos += len;
            }
            c if is_ident_char(c) && !c.is_ascii_digit() => {
                let word_len = rest.find(|c: char| !is_ident_char(c)).unwrap_or(rest.len());
                let word = &rest[..word_len];
                let after = &rest[word_len..];

                if is_string_prefix(word) && after.starts_with(['"', '\'']) {
                    let (len, body) = scan_string(after);
                    push_string(
                        &mut tokens,
                        &word.to_lowercase(),
                        body,
                        line,
                        &scopes,
                        significant == 0 && depth == 0 && expect_docstring,
                    );
                    line += after[..len].matches('\n').count();
                    pos += word_len + len;
                } else {
                    if depth == 0 && significant == 0 {
                        match word {
                            "def" | "class" => header = header_name(after),
                            "async" => {
                                let next = after.trim_start_matches([' ', '\t']);
                                if let Some(rest_of_def) = next.strip_prefix("def") {
                                    header = header_name(rest_of_def);
                                }
                            }
                            _ => {}
                        }
                    }
                    pos += word_len;
                }
                significant += 1;
                expect_docstring = false;
            }
            '(' | '[' | '{' => {
                depth += 1;
                significant += 1;
                expect_docstring = false;
                pos += 1;
            }
            ')' | ']' | '}' => {
                depth = depth.saturating_sub(1);
                significant += 1;
                pos += 1;
            }
            c => {
                if !c.is_whitespace() {
                    significant += 1;
                    expect_docstring = false;
                }
                pos += c.len_utf8();
            }
        }
    }

    tokens
}

fn push_string(
    tokens: &mut Vec<PyToken>,
    prefix: &str,
    body: &str,
    line: usize,
    scopes: &[Scope],
    docstring: bool,
) {
    tokens.push(PyToken {
        kind: if docstring {
            PyKind::Docstring
        } else {
            PyKind::String
        },
        prefix: prefix.to_string(),
        body: body.to_string(),
        line,
        end_line: line + body.matches('\n').count(),
        scope: scope_chain(scopes, None),
    });
}

fn group_comments(tokens: Vec<PyToken>) -> Vec<PyToken> {
    let mut grouped: Vec<PyToken> = Vec::with_capacity(tokens.len());
    for token in tokens {
        if let Some(prev) = grouped.last_mut() {
            if token.kind == PyKind::Comment
                && prev.kind == PyKind::Comment
                && prev.end_line + 1 == token.line
            {
                prev.body.push('\n');
                prev.body.push_str(&token.body);
                prev.end_line = token.line;
                continue;
            }
        }
        grouped.push(token);
    }
    grouped
}

/// Drop `{...}` replacement fields from an f-string body, keeping `{{`/`}}`
fn strip_replacement_fields(body: &str) -> String {
    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars().peekable();
    let mut depth = 0usize;
    while let Some(c) = chars.next() {
        match c {
            '{' if depth == 0 && chars.peek() == Some(&'{') => {
                chars.next();
                out.push('{');
            }
            '}' if depth == 0 && chars.peek() == Some(&'}') => {
                chars.next();
                out.push('}');
            }
            '{' => depth += 1,
            '}' if depth > 0 => depth -= 1,
            _ if depth > 0 => {}
            _ => out.push(c),
        }
    }
    out
}
