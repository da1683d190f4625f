// C/C++ comment and string filter

use super::clike::{self, TokenKind, C_SYNTAX};
use super::{line_context, Filter};
use crate::error::SpellError;
use crate::options::Options;
use crate::types::Fragment;
use anyhow::Result;
use serde_yaml::{Mapping, Value};

pub struct CppFilter {
    default_encoding: String,
    block_comments: bool,
    line_comments: bool,
    strings: bool,
    group_comments: bool,
}

impl CppFilter {
    pub const NAME: &'static str = "cpp";

    pub fn new(options: &Mapping, default_encoding: &str) -> Result<Self, SpellError> {
        let opts = Options::configure(
            Self::NAME,
            vec![
                ("block_comments", Value::Bool(true)),
                ("line_comments", Value::Bool(true)),
                ("strings", Value::Bool(false)),
                ("group_comments", Value::Bool(false)),
            ],
            options,
        )?;
        Ok(Self {
            default_encoding: default_encoding.to_string(),
            block_comments: opts.get_bool("block_comments"),
            line_comments: opts.get_bool("line_comments"),
            strings: opts.get_bool("strings"),
            group_comments: opts.get_bool("group_comments"),
        })
    }
}

impl Filter for CppFilter {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn default_encoding(&self) -> &str {
        &self.default_encoding
    }

    fn run(&self, fragment: &Fragment) -> Result<Vec<Fragment>> {
        let mut tokens = clike::scan(fragment.text_or_empty(), &C_SYNTAX);
        if self.group_comments {
            tokens = clike::group_line_comments(tokens);
        }

        let fragments = tokens
            .into_iter()
            .filter_map(|token| {
                let category = match token.kind {
                    TokenKind::BlockComment if self.block_comments => "cpp-block-comment",
                    TokenKind::LineComment if self.line_comments => "cpp-line-comment",
                    TokenKind::String if self.strings && token.quote == '"' => "cpp-string",
                    _ => return None,
                };
                Some(fragment.derive(
                    token.text,
                    line_context(&fragment.context, token.line),
                    category,
                ))
            })
            .collect();
        Ok(fragments)
    }
}
