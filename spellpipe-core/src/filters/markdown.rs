// Markdown filter
//
// Renders Markdown to HTML so an `html` stage downstream can pick the prose
// out of it.

use super::Filter;
use crate::error::SpellError;
use crate::options::{seq, Options};
use crate::types::Fragment;
use anyhow::Result;
use pulldown_cmark::{html, Options as CmarkOptions, Parser};
use serde_yaml::Mapping;

pub struct MarkdownFilter {
    default_encoding: String,
    extensions: CmarkOptions,
}

impl MarkdownFilter {
    pub const NAME: &'static str = "markdown";

    pub fn new(options: &Mapping, default_encoding: &str) -> Result<Self, SpellError> {
        let opts = Options::configure(
            Self::NAME,
            vec![("extensions", seq(Vec::<String>::new()))],
            options,
        )?;

        let mut extensions = CmarkOptions::empty();
        for name in opts.get_str_list("extensions")? {
            extensions |= match name.to_lowercase().as_str() {
                "tables" => CmarkOptions::ENABLE_TABLES,
                "footnotes" => CmarkOptions::ENABLE_FOOTNOTES,
                "strikethrough" => CmarkOptions::ENABLE_STRIKETHROUGH,
                "tasklists" => CmarkOptions::ENABLE_TASKLISTS,
                "smart_punctuation" => CmarkOptions::ENABLE_SMART_PUNCTUATION,
                other => {
                    return Err(opts.invalid("extensions", &format!("has unknown extension '{other}'")));
                }
            };
        }

        Ok(Self {
            default_encoding: default_encoding.to_string(),
            extensions,
        })
    }

    pub fn render(&self, markdown: &str) -> String {
        let parser = Parser::new_ext(markdown, self.extensions);
        let mut out = String::with_capacity(markdown.len() * 3 / 2);
        html::push_html(&mut out, parser);
        out
    }
}

impl Filter for MarkdownFilter {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn default_encoding(&self) -> &str {
        &self.default_encoding
    }

    fn run(&self, fragment: &Fragment) -> Result<Vec<Fragment>> {
        let rendered = self.render(fragment.text_or_empty());
        Ok(vec![fragment.derive(rendered, fragment.context.clone(), Self::NAME)])
    }
}
