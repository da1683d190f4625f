// CSS, SCSS and Sass comment filter

use super::clike::{self, Syntax, TokenKind, CSS_SYNTAX, SCSS_SYNTAX};
use super::{line_context, Filter};
use crate::error::SpellError;
use crate::options::Options;
use crate::types::Fragment;
use anyhow::Result;
use regex::bytes::Regex;
use serde_yaml::{Mapping, Value};
use std::sync::LazyLock;

static CHARSET_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"^@charset "([-\w.:]+)";"#).unwrap());

pub struct StylesheetsFilter {
    default_encoding: String,
    syntax: Syntax,
    block_comments: bool,
    line_comments: bool,
    group_comments: bool,
}

impl StylesheetsFilter {
    pub const NAME: &'static str = "stylesheets";

    pub fn new(options: &Mapping, default_encoding: &str) -> Result<Self, SpellError> {
        let opts = Options::configure(
            Self::NAME,
            vec![
                ("stylesheets", Value::String("css".into())),
                ("block_comments", Value::Bool(true)),
                ("line_comments", Value::Bool(true)),
                ("group_comments", Value::Bool(false)),
            ],
            options,
        )?;

        let syntax = match opts
            .expect_one_of("stylesheets", &["css", "scss", "sass"])?
            .as_str()
        {
            "css" => CSS_SYNTAX,
            _ => SCSS_SYNTAX,
        };

        Ok(Self {
            default_encoding: default_encoding.to_string(),
            syntax,
            block_comments: opts.get_bool("block_comments"),
            line_comments: opts.get_bool("line_comments"),
            group_comments: opts.get_bool("group_comments"),
        })
    }
}

impl Filter for StylesheetsFilter {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn default_encoding(&self) -> &str {
        &self.default_encoding
    }

    fn header_check(&self, head: &[u8]) -> Option<String> {
        CHARSET_REGEX
            .captures(head)
            .and_then(|caps| caps.get(1))
            .map(|m| String::from_utf8_lossy(m.as_bytes()).into_owned())
    }

    fn run(&self, fragment: &Fragment) -> Result<Vec<Fragment>> {
        let mut tokens = clike::scan(fragment.text_or_empty(), &self.syntax);
        if self.group_comments {
            tokens = clike::group_line_comments(tokens);
        }

        let fragments = tokens
            .into_iter()
            .filter_map(|token| {
                let category = match token.kind {
                    TokenKind::BlockComment if self.block_comments => "css-block-comment",
                    TokenKind::LineComment if self.line_comments => "css-line-comment",
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scss_line_comments() {
        let options: Mapping = serde_yaml::from_str("stylesheets: scss").unwrap();
        let filter = StylesheetsFilter::new(&options, "utf-8").unwrap();
        let source = "// heder\n.a { color: red; /* bodi */ content: \"/* no */\"; }";
        let fragments = filter
            .run(&Fragment::text(source, "a.scss", "utf-8", "text"))
            .unwrap();
        assert_eq!(fragments.len(), 2);
        assert_eq!(fragments[0].category, "css-line-comment");
        assert_eq!(fragments[1].text_or_empty(), " bodi ");
        assert_eq!(fragments[1].context, "a.scss(2)");
    }

    #[test]
    fn test_charset_header() {
        let filter = StylesheetsFilter::new(&Mapping::new(), "utf-8").unwrap();
        assert_eq!(
            filter.header_check(b"@charset \"ISO-8859-1\";\nbody {}"),
            Some("ISO-8859-1".to_string())
        );
        assert_eq!(filter.header_check(b"body {}"), None);
    }

    #[test]
    fn test_unknown_flavor_rejected() {
        let options: Mapping = serde_yaml::from_str("stylesheets: less").unwrap();
        assert!(StylesheetsFilter::new(&options, "utf-8").is_err());
    }
}
