// JavaScript comment and string filter
//
// JSDoc blocks (`/** ... */`) are reported as `js-docstring` when `jsdocs`
// is enabled and as ordinary block comments otherwise.

use super::clike::{self, TokenKind, JS_SYNTAX};
use super::{line_context, Filter};
use crate::error::SpellError;
use crate::options::Options;
use crate::types::Fragment;
use anyhow::Result;
use serde_yaml::{Mapping, Value};

pub struct JavaScriptFilter {
    default_encoding: String,
    jsdocs: bool,
    block_comments: bool,
    line_comments: bool,
    strings: bool,
    group_comments: bool,
    decode_escapes: bool,
}

impl JavaScriptFilter {
    pub const NAME: &'static str = "javascript";

    pub fn new(options: &Mapping, default_encoding: &str) -> Result<Self, SpellError> {
        let opts = Options::configure(
            Self::NAME,
            vec![
                ("jsdocs", Value::Bool(false)),
                ("block_comments", Value::Bool(true)),
                ("line_comments", Value::Bool(true)),
                ("strings", Value::Bool(false)),
                ("group_comments", Value::Bool(false)),
                ("decode_escapes", Value::Bool(true)),
            ],
            options,
        )?;
        Ok(Self {
            default_encoding: default_encoding.to_string(),
            jsdocs: opts.get_bool("jsdocs"),
            block_comments: opts.get_bool("block_comments"),
            line_comments: opts.get_bool("line_comments"),
            strings: opts.get_bool("strings"),
            group_comments: opts.get_bool("group_comments"),
            decode_escapes: opts.get_bool("decode_escapes"),
        })
    }
}

impl Filter for JavaScriptFilter {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn default_encoding(&self) -> &str {
        &self.default_encoding
    }

    fn run(&self, fragment: &Fragment) -> Result<Vec<Fragment>> {
        let mut tokens = clike::scan(fragment.text_or_empty(), &JS_SYNTAX);
        if self.group_comments {
            tokens = clike::group_line_comments(tokens);
        }

        let mut fragments = Vec::new();
        for token in tokens {
            let category = match token.kind {
                TokenKind::BlockComment if token.doc && self.jsdocs => "js-docstring",
                TokenKind::BlockComment if self.block_comments => "js-block-comment",
                TokenKind::LineComment if self.line_comments => "js-line-comment",
                TokenKind::String if self.strings => "js-string",
                _ => continue,
            };
            let text = if token.kind == TokenKind::String && self.decode_escapes {
                clike::decode_escapes(&token.text)
            } else {
                token.text
            };
            fragments.push(fragment.derive(
                text,
                line_context(&fragment.context, token.line),
                category,
            ));
        }
        Ok(fragments)
    }
}
