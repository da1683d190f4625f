// HTML filter
//
// Parses with scraper (html5ever), tags elements with CSS selectors from the
// `ignores` and `captures` options, and extracts content blocks, comments
// and chosen attributes. Script, style and template contents are never
// treated as prose.

use super::markup::{self, Element, ExtractOptions, Node};
use super::Filter;
use crate::error::SpellError;
use crate::options::{seq, Options};
use crate::types::Fragment;
use anyhow::Result;
use regex::bytes::Regex;
use scraper::{ElementRef, Html, Selector};
use serde_yaml::{Mapping, Value};
use std::collections::HashSet;
use std::sync::LazyLock;

static META_CHARSET_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<meta[^>]+charset\s*=\s*["']?([-\w.:]+)"#).unwrap()
});

const BLOCK_TAGS: &[&str] = &[
    "address", "article", "aside", "blockquote", "caption", "dd", "details", "dialog", "div",
    "dl", "dt", "fieldset", "figcaption", "figure", "footer", "form", "h1", "h2", "h3", "h4",
    "h5", "h6", "header", "hgroup", "hr", "li", "main", "nav", "ol", "p", "pre", "section",
    "table", "td", "th", "title", "tr", "ul",
];

const NON_PROSE_TAGS: &[&str] = &["script", "style", "template"];

pub struct HtmlFilter {
    default_encoding: String,
    extract: ExtractOptions,
    captures: Vec<Selector>,
    ignores: Vec<Selector>,
    break_tags: HashSet<String>,
}

impl HtmlFilter {
    pub const NAME: &'static str = "html";

    pub fn new(options: &Mapping, default_encoding: &str) -> Result<Self, SpellError> {
        let opts = Options::configure(
            Self::NAME,
            vec![
                ("comments", Value::Bool(true)),
                ("attributes", seq(Vec::<String>::new())),
                ("break_tags", seq(Vec::<String>::new())),
                ("ignores", seq(Vec::<String>::new())),
                ("captures", seq(["*"])),
            ],
            options,
        )?;

        let mut break_tags: HashSet<String> = BLOCK_TAGS.iter().map(|t| t.to_string()).collect();
        break_tags.extend(
            opts.get_str_list("break_tags")?
                .into_iter()
                .map(|t| t.to_lowercase()),
        );

        Ok(Self {
            default_encoding: default_encoding.to_string(),
            extract: ExtractOptions {
                comments: opts.get_bool("comments"),
                attributes: opts.get_str_list("attributes")?,
                case_insensitive_attributes: true,
            },
            captures: parse_selectors(&opts, "captures")?,
            ignores: parse_selectors(&opts, "ignores")?,
            break_tags,
        })
    }

    /// Parse `html` into the shared markup tree
    pub fn parse(&self, html: &str) -> Vec<Node> {
        let document = Html::parse_document(html);
        let mut nodes = Vec::new();
        for child in document.tree.root().children() {
            if let Some(element) = ElementRef::wrap(child) {
                nodes.push(Node::Element(self.convert(element)));
            } else if let scraper::Node::Comment(comment) = child.value() {
                nodes.push(Node::Comment(comment.to_string()));
            }
        }
        nodes
    }

    fn convert(&self, element: ElementRef<'_>) -> Element {
        let name = element.value().name().to_lowercase();
        let attrs = element
            .value()
            .attrs()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        let mut converted = Element::new(name, attrs);
        converted.captured = self.captures.iter().any(|s| s.matches(&element));
        converted.ignored = self.ignores.iter().any(|s| s.matches(&element));
        converted.breaks = self.break_tags.contains(&converted.name);
        let prose = !NON_PROSE_TAGS.contains(&converted.name.as_str());

        for child in element.children() {
            match child.value() {
                scraper::Node::Text(text) if prose => {
                    converted.children.push(Node::Text(text.to_string()));
                }
                scraper::Node::Comment(comment) => {
                    converted.children.push(Node::Comment(comment.to_string()));
                }
                scraper::Node::Element(_) => {
                    if let Some(child_element) = ElementRef::wrap(child) {
                        converted
                            .children
                            .push(Node::Element(self.convert(child_element)));
                    }
                }
                _ => {}
            }
        }
        converted
    }
}

fn parse_selectors(opts: &Options, key: &str) -> Result<Vec<Selector>, SpellError> {
    opts.get_str_list(key)?
        .iter()
        .map(|raw| {
            Selector::parse(raw)
                .map_err(|e| opts.invalid(key, &format!("has an invalid selector '{raw}': {e:?}")))
        })
        .collect()
}

impl Filter for HtmlFilter {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn default_encoding(&self) -> &str {
        &self.default_encoding
    }

    fn header_check(&self, head: &[u8]) -> Option<String> {
        META_CHARSET_REGEX
            .captures(head)
            .and_then(|caps| caps.get(1))
            .map(|m| String::from_utf8_lossy(m.as_bytes()).into_owned())
    }

    fn run(&self, fragment: &Fragment) -> Result<Vec<Fragment>> {
        let nodes = self.parse(fragment.text_or_empty());
        let extracted = markup::extract(&nodes, &self.extract);
        Ok(extracted.into_fragments(fragment, Self::NAME, &fragment.context))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"<!DOCTYPE html>
<html>
<head><title>Pge title</title><style>.x { color: red }</style></head>
<body>
<!-- revew later -->
<p>First <b>paragraf</b> here.</p>
<div class="skip"><p>ignord text</p></div>
<img src="a.png" alt="Alt txt">
<script>var notProse = 1;</script>
</body>
</html>
"#;

    fn run(yaml: &str) -> Vec<Fragment> {
        let options: Mapping = serde_yaml::from_str(yaml).unwrap();
        let filter = HtmlFilter::new(&options, "utf-8").unwrap();
        filter
            .run(&Fragment::text(PAGE, "index.html", "utf-8", "text"))
            .unwrap()
    }

    #[test]
    fn test_blocks_comments_and_attributes() {
        let fragments = run("{attributes: [alt], ignores: ['.skip']}");
        let summary: Vec<_> = fragments
            .iter()
            .map(|f| (f.category.as_str(), f.context.as_str(), f.text_or_empty().trim()))
            .collect();

        assert!(summary.contains(&(
            "html-comment",
            "index.html: html>body<!--comment-->",
            "revew later"
        )));
        assert!(summary.contains(&("html-attribute", "index.html: html>body>img[alt]", "Alt txt")));
        assert!(summary.contains(&("html-content", "index.html: html>head>title", "Pge title")));
        assert!(summary.contains(&("html-content", "index.html: html>body>p", "First paragraf here.")));
        assert!(!summary.iter().any(|(_, _, text)| text.contains("ignord")));
        assert!(!summary.iter().any(|(_, _, text)| text.contains("notProse")));
        assert!(!summary.iter().any(|(_, _, text)| text.contains("color")));
        assert_eq!(fragments[0].category, "html-comment");
    }

    #[test]
    fn test_comments_disabled() {
        let fragments = run("comments: false");
        assert!(fragments.iter().all(|f| f.category != "html-comment"));
    }

    #[test]
    fn test_invalid_selector_rejected() {
        let options: Mapping = serde_yaml::from_str("ignores: ['p[']").unwrap();
        assert!(HtmlFilter::new(&options, "utf-8").is_err());
    }

    #[test]
    fn test_meta_charset() {
        let filter = HtmlFilter::new(&Mapping::new(), "utf-8").unwrap();
        assert_eq!(
            filter.header_check(br#"<html><head><meta charset="windows-1252">"#),
            Some("windows-1252".to_string())
        );
    }
}
