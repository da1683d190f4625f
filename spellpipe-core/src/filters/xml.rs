// XML filter
//
// quick-xml event reader feeding the shared markup extractor. Tag rules match
// qualified names with globs. The same parser backs the ODF and OOXML
// filters, which only differ in their defaults and category prefix.

use super::markup::{self, Element, ExtractOptions, Node, TagRules};
use super::Filter;
use crate::error::SpellError;
use crate::options::{seq, Options};
use crate::types::Fragment;
use anyhow::Result;
use quick_xml::events::Event;
use quick_xml::Reader;
use regex::bytes::Regex;
use serde_yaml::{Mapping, Value};
use std::sync::LazyLock;

static XML_DECL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^\s*<\?xml[^>]*?encoding\s*=\s*["']([-\w.:]+)["']"#).unwrap()
});

/// Tag rules plus extraction options, shared by the XML family
pub struct XmlExtractor {
    pub rules: TagRules,
    pub extract: ExtractOptions,
}

impl XmlExtractor {
    /// Build from the common option set
    /// (`comments`, `attributes`, `captures`, `ignores`, `break_tags`)
    pub fn from_options(opts: &Options) -> Result<Self, SpellError> {
        Self::with_tags(
            opts,
            &opts.get_str_list("captures")?,
            &opts.get_str_list("ignores")?,
            &opts.get_str_list("break_tags")?,
        )
    }

    /// Build with explicit tag lists
    pub fn with_tags(
        opts: &Options,
        captures: &[String],
        ignores: &[String],
        break_tags: &[String],
    ) -> Result<Self, SpellError> {
        Ok(Self {
            rules: TagRules::new(opts, captures, ignores, break_tags)?,
            extract: ExtractOptions {
                comments: opts.get_bool("comments"),
                attributes: opts.get_str_list("attributes")?,
                case_insensitive_attributes: false,
            },
        })
    }

    pub fn parse(&self, xml: &str) -> Result<Vec<Node>> {
        let mut reader = Reader::from_str(xml);
        reader
            .trim_text(false)
            .expand_empty_elements(true)
            .check_end_names(false);

        let mut stack: Vec<Element> = Vec::new();
        let mut top: Vec<Node> = Vec::new();

        loop {
            match reader.read_event()? {
                Event::Start(start) => {
                    let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
                    let mut attrs = Vec::new();
                    for attr in start.attributes() {
                        let attr = attr?;
                        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
                        attrs.push((key, attr.unescape_value()?.into_owned()));
                    }
                    let mut element = Element::new(name, attrs);
                    self.rules.tag(&mut element);
                    stack.push(element);
                }
                Event::End(_) => {
                    if let Some(element) = stack.pop() {
                        attach(&mut stack, &mut top, Node::Element(element));
                    }
                }
                Event::Text(text) => {
                    let text = text.unescape()?.into_owned();
                    attach(&mut stack, &mut top, Node::Text(text));
                }
                Event::CData(data) => {
                    let text = String::from_utf8_lossy(&data.into_inner()).into_owned();
                    attach(&mut stack, &mut top, Node::Text(text));
                }
                Event::Comment(comment) => {
                    let text = String::from_utf8_lossy(&comment).into_owned();
                    attach(&mut stack, &mut top, Node::Comment(text));
                }
                Event::Eof => break,
                _ => {}
            }
        }

        // Unclosed elements at end of input
        while let Some(element) = stack.pop() {
            attach(&mut stack, &mut top, Node::Element(element));
        }
        Ok(top)
    }

    pub fn fragments(&self, xml: &str, parent: &Fragment, prefix: &str, context: &str) -> Result<Vec<Fragment>> {
        let nodes = self.parse(xml)?;
        Ok(markup::extract(&nodes, &self.extract).into_fragments(parent, prefix, context))
    }
}

fn attach(stack: &mut [Element], top: &mut Vec<Node>, node: Node) {
    match stack.last_mut() {
        Some(parent) => parent.children.push(node),
        None => {
            // Whitespace between top-level nodes carries no prose
            if !matches!(&node, Node::Text(text) if text.trim().is_empty()) {
                top.push(node);
            }
        }
    }
}

pub(crate) fn xml_defaults() -> Vec<(&'static str, Value)> {
    vec![
        ("comments", Value::Bool(true)),
        ("attributes", seq(Vec::<String>::new())),
        ("break_tags", seq(Vec::<String>::new())),
        ("ignores", seq(Vec::<String>::new())),
        ("captures", seq(["*"])),
    ]
}

pub(crate) fn declared_encoding(head: &[u8]) -> Option<String> {
    XML_DECL_REGEX
        .captures(head)
        .and_then(|caps| caps.get(1))
        .map(|m| String::from_utf8_lossy(m.as_bytes()).into_owned())
}

pub struct XmlFilter {
    default_encoding: String,
    extractor: XmlExtractor,
}

impl XmlFilter {
    pub const NAME: &'static str = "xml";

    pub fn new(options: &Mapping, default_encoding: &str) -> Result<Self, SpellError> {
        let opts = Options::configure(Self::NAME, xml_defaults(), options)?;
        Ok(Self {
            default_encoding: default_encoding.to_string(),
            extractor: XmlExtractor::from_options(&opts)?,
        })
    }
}

impl Filter for XmlFilter {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn default_encoding(&self) -> &str {
        &self.default_encoding
    }

    fn header_check(&self, head: &[u8]) -> Option<String> {
        declared_encoding(head)
    }

    fn run(&self, fragment: &Fragment) -> Result<Vec<Fragment>> {
        self.extractor
            .fragments(fragment.text_or_empty(), fragment, Self::NAME, &fragment.context)
    }
}
