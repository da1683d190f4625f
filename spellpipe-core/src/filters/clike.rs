// Shared scanner for C-like syntaxes
//
// Finds block comments, line comments and string literals in C/C++,
// JavaScript and stylesheet sources. Everything else is skipped. Tokens carry
// the 1-based line they start on so the filters can annotate context.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    BlockComment,
    LineComment,
    String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    /// Comment or string body without delimiters
    pub text: String,
    pub line: usize,
    pub end_line: usize,
    /// Block comment opened with `/**`
    pub doc: bool,
    /// Opening quote of a string token
    pub quote: char,
}

/// Lexical features of one C-like language
#[derive(Debug, Clone, Copy)]
pub struct Syntax {
    pub line_comment: Option<&'static str>,
    pub quotes: &'static [char],
    /// Backtick strings that may span lines
    pub template_literals: bool,
    /// C++11 `R"delim( ... )delim"` literals
    pub raw_strings: bool,
}

pub const C_SYNTAX: Syntax = Syntax {
    line_comment: Some("//"),
    quotes: &['"', '\''],
    template_literals: false,
    raw_strings: true,
};

pub const JS_SYNTAX: Syntax = Syntax {
    line_comment: Some("//"),
    quotes: &['"', '\''],
    template_literals: true,
    raw_strings: false,
};

pub const CSS_SYNTAX: Syntax = Syntax {
    line_comment: None,
    quotes: &['"', '\''],
    template_literals: false,
    raw_strings: false,
};

pub const SCSS_SYNTAX: Syntax = Syntax {
    line_comment: Some("//"),
    ..CSS_SYNTAX
};

pub fn scan(text: &str, syntax: &Syntax) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut line = 1;
    let mut pos = 0;

    while pos < text.len() {
        let rest = &text[pos..];

        if rest.starts_with("/*") {
            let end = rest[2..].find("*/").map(|i| i + 4).unwrap_or(rest.len());
            let raw = &rest[..end];
            let newlines = raw.matches('\n').count();
            tokens.push(Token {
                kind: TokenKind::BlockComment,
                text: clean_block(raw),
                line,
                end_line: line + newlines,
                doc: raw.starts_with("/**") && !raw.starts_with("/**/"),
                quote: '\0',
            });
            line += newlines;
            pos += end;
            continue;
        }

        if let Some(marker) = syntax.line_comment {
            if rest.starts_with(marker) {
                let end = rest.find('\n').unwrap_or(rest.len());
                tokens.push(Token {
                    kind: TokenKind::LineComment,
                    text: rest[marker.len()..end].to_string(),
                    line,
                    end_line: line,
                    doc: false,
                    quote: '\0',
                });
                pos += end;
                continue;
            }
        }

        if syntax.raw_strings && rest.starts_with("R\"") && !preceded_by_ident(text, pos) {
            if let Some((len, body)) = scan_raw_string(rest) {
                let newlines = rest[..len].matches('\n').count();
                tokens.push(Token {
                    kind: TokenKind::String,
                    text: body.to_string(),
                    line,
                    end_line: line + newlines,
                    doc: false,
                    quote: '"',
                });
                line += newlines;
                pos += len;
                continue;
            }
        }

        let Some(ch) = rest.chars().next() else {
            break;
        };

        let is_template = syntax.template_literals && ch == '`';
        if is_template || syntax.quotes.contains(&ch) {
            let (len, body) = scan_string(rest, ch, is_template);
            let newlines = rest[..len].matches('\n').count();
            tokens.push(Token {
                kind: TokenKind::String,
                text: body.to_string(),
                line,
                end_line: line + newlines,
                doc: false,
                quote: ch,
            });
            line += newlines;
            pos += len;
            continue;
        }

        if ch == '\n' {
            line += 1;
        }
        pos += ch.len_utf8();
    }

    tokens
}

fn preceded_by_ident(text: &str, pos: usize) -> bool {
    text[..pos]
        .chars()
        .next_back()
        .map(|c| c.is_alphanumeric() || c == '_')
        .unwrap_or(false)
}

/// Returns the consumed length and the raw body of a quoted string.
/// Unterminated strings end at the newline (or end of text).
fn scan_string(rest: &str, quote: char, multiline: bool) -> (usize, &str) {
    let body_start = quote.len_utf8();
    let mut chars = rest.char_indices().skip(1);
    while let Some((i, c)) = chars.next() {
        match c {
            '\\' => {
                chars.next();
            }
            '\n' if !multiline => return (i, &rest[body_start..i]),
            c if c == quote => return (i + c.len_utf8(), &rest[body_start..i]),
            _ => {}
        }
    }
    (rest.len(), &rest[body_start..])
}

fn scan_raw_string(rest: &str) -> Option<(usize, &str)> {
    let open = rest[2..].find('(')?;
    let delimiter = &rest[2..2 + open];
    if delimiter.len() > 16 || delimiter.contains(|c: char| c.is_whitespace() || c == '\\') {
        return None;
    }
    let body_start = 2 + open + 1;
    let closing = format!("){delimiter}\"");
    match rest[body_start..].find(&closing) {
        Some(i) => Some((body_start + i + closing.len(), &rest[body_start..body_start + i])),
        None => Some((rest.len(), &rest[body_start..])),
    }
}

/// Strip `/* */` and the leading `*` decoration of each line
fn clean_block(raw: &str) -> String {
    let inner = raw.strip_prefix("/*").unwrap_or(raw);
    let inner = inner.strip_suffix("*/").unwrap_or(inner);
    inner
        .split('\n')
        .map(|line| line.trim_start().strip_prefix('*').unwrap_or(line))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Merge line comments on consecutive lines into one token
pub fn group_line_comments(tokens: Vec<Token>) -> Vec<Token> {
    let mut grouped: Vec<Token> = Vec::with_capacity(tokens.len());
    for token in tokens {
        if let Some(prev) = grouped.last_mut() {
            if token.kind == TokenKind::LineComment
                && prev.kind == TokenKind::LineComment
                && prev.end_line + 1 == token.line
            {
                prev.text.push('\n');
                prev.text.push_str(&token.text);
                prev.end_line = token.line;
                continue;
            }
        }
        grouped.push(token);
    }
    grouped
}

/// Decode backslash escapes found in string literals.
///
/// Handles the common single-character escapes, octal, `\xHH`, `\uHHHH`,
/// `\u{H..}` and `\UHHHHHHHH`. Escaped newlines are line continuations.
/// Unknown escapes keep the escaped character.
pub fn decode_escapes(body: &str) -> String {
    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        let Some(next) = chars.next() else {
            out.push('\\');
            break;
        };
        match next {
            'n' => out.push('\n'),
            'r' => out.push('\r'),
            't' => out.push('\t'),
            'b' => out.push('\u{8}'),
            'f' => out.push('\u{c}'),
            'v' => out.push('\u{b}'),
            'a' => out.push('\u{7}'),
            '\n' => {}
            '0'..='7' => {
                let mut value = next.to_digit(8).unwrap_or(0);
                for _ in 0..2 {
                    match chars.peek().and_then(|d| d.to_digit(8)) {
                        Some(d) => {
                            value = value * 8 + d;
                            chars.next();
                        }
                        None => break,
                    }
                }
                out.extend(char::from_u32(value));
            }
            'x' => push_hex(&mut out, &mut chars, 2, 'x'),
            'U' => push_hex(&mut out, &mut chars, 8, 'U'),
            'u' if chars.peek() == Some(&'{') => {
                chars.next();
                let digits: String = chars.by_ref().take_while(|&d| d != '}').collect();
                match u32::from_str_radix(&digits, 16).ok().and_then(char::from_u32) {
                    Some(decoded) => out.push(decoded),
                    None => out.push_str(&format!("\\u{{{digits}}}")),
                }
            }
            'u' => push_hex(&mut out, &mut chars, 4, 'u'),
            other => out.push(other),
        }
    }
    out
}

fn push_hex<I>(out: &mut String, chars: &mut std::iter::Peekable<I>, width: usize, marker: char)
where
    I: Iterator<Item = char>,
{
    let mut digits = String::with_capacity(width);
    while digits.len() < width {
        match chars.peek() {
            Some(d) if d.is_ascii_hexdigit() => {
                digits.push(*d);
                chars.next();
            }
            _ => break,
        }
    }
    let decoded = (digits.len() == width)
        .then(|| u32::from_str_radix(&digits, 16).ok())
        .flatten()
        .and_then(char::from_u32);
    match decoded {
        Some(c) => out.push(c),
        None => {
            out.push('\\');
            out.push(marker);
            out.push_str(&digits);
        }
    }
}
