//! Shared markup extraction
//!
//! HTML and the XML family parse into the same small tree. Each element is
//! tagged while parsing with three flags:
//!
//! - `ignored`: the subtree contributes no content or attributes (comments
//!   inside it are still reported),
//! - `captured`: the element's own text nodes are kept,
//! - `breaks`: text gathered below the element is flushed as one block when
//!   the element closes.
//!
//! Extraction yields comments, then attributes, then content blocks, each
//! with a `>`-joined selector for context.

use crate::error::SpellError;
use crate::options::Options;
use crate::types::Fragment;
use globset::{Glob, GlobSet, GlobSetBuilder};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Element(Element),
    Text(String),
    Comment(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Element {
    pub name: String,
    pub attrs: Vec<(String, String)>,
    pub children: Vec<Node>,
    pub ignored: bool,
    pub captured: bool,
    pub breaks: bool,
}

impl Element {
    pub fn new(name: impl Into<String>, attrs: Vec<(String, String)>) -> Self {
        Self {
            name: name.into(),
            attrs,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Extracted {
    pub comments: Vec<(String, String)>,
    pub attributes: Vec<(String, String)>,
    pub blocks: Vec<(String, String)>,
}

impl Extracted {
    /// Turn the extracted pieces into fragments derived from `parent`.
    ///
    /// `prefix` names the categories (`html-content`, `xml-comment`, ...);
    /// `context` is the base provenance the selectors are appended to.
    pub fn into_fragments(self, parent: &Fragment, prefix: &str, context: &str) -> Vec<Fragment> {
        let with_selector = |selector: &str| {
            if selector.is_empty() {
                context.to_string()
            } else {
                format!("{context}: {selector}")
            }
        };

        let mut fragments = Vec::new();
        for (selector, text) in self.comments {
            fragments.push(parent.derive(text, with_selector(&selector), format!("{prefix}-comment")));
        }
        for (selector, text) in self.attributes {
            fragments.push(parent.derive(
                text,
                with_selector(&selector),
                format!("{prefix}-attribute"),
            ));
        }
        for (selector, text) in self.blocks {
            fragments.push(parent.derive(text, with_selector(&selector), format!("{prefix}-content")));
        }
        fragments
    }
}

/// What to pull out of a tagged tree
#[derive(Debug, Clone, Default)]
pub struct ExtractOptions {
    pub comments: bool,
    /// Attribute names collected from captured elements
    pub attributes: Vec<String>,
    pub case_insensitive_attributes: bool,
}

impl ExtractOptions {
    fn wants_attribute(&self, name: &str) -> bool {
        self.attributes.iter().any(|wanted| {
            if self.case_insensitive_attributes {
                wanted.eq_ignore_ascii_case(name)
            } else {
                wanted == name
            }
        })
    }
}

/// Extract comments, attributes and content blocks from top-level nodes
pub fn extract(nodes: &[Node], options: &ExtractOptions) -> Extracted {
    let mut out = Extracted::default();
    let mut path = Vec::new();
    for node in nodes {
        match node {
            Node::Element(element) => {
                let pending = walk(element, &mut path, &mut out, options, false);
                flush(&mut out, element.name.clone(), pending);
            }
            Node::Comment(text) if options.comments => {
                out.comments.push(("<!--comment-->".to_string(), text.clone()));
            }
            _ => {}
        }
    }
    out
}

fn flush(out: &mut Extracted, selector: String, text: String) {
    if !text.trim().is_empty() {
        out.blocks.push((selector, text));
    }
}

/// Returns text gathered below `element` that has not been flushed yet
fn walk(
    element: &Element,
    path: &mut Vec<String>,
    out: &mut Extracted,
    options: &ExtractOptions,
    inherited_ignore: bool,
) -> String {
    path.push(element.name.clone());
    let selector = path.join(">");
    let ignored = inherited_ignore || element.ignored;

    if !ignored && element.captured && !options.attributes.is_empty() {
        for (name, value) in &element.attrs {
            if options.wants_attribute(name) && !value.trim().is_empty() {
                out.attributes.push((format!("{selector}[{name}]"), value.clone()));
            }
        }
    }

    let mut pending = String::new();
    for child in &element.children {
        match child {
            Node::Text(text) if !ignored && element.captured => pending.push_str(text),
            Node::Text(_) => {}
            Node::Element(child_element) => {
                pending.push_str(&walk(child_element, path, out, options, ignored));
            }
            Node::Comment(text) if options.comments => {
                out.comments.push((format!("{selector}<!--comment-->"), text.clone()));
            }
            Node::Comment(_) => {}
        }
    }

    path.pop();
    if element.breaks {
        flush(out, selector, pending);
        String::new()
    } else {
        pending
    }
}

/// Name-based tagging rules for the XML family.
///
/// Patterns are globs over qualified names (`w:t`, `text:*`, `*`).
#[derive(Debug, Clone)]
pub struct TagRules {
    pub captures: GlobSet,
    pub ignores: GlobSet,
    pub breaks: GlobSet,
}

impl TagRules {
    pub fn new(
        opts: &Options,
        captures: &[String],
        ignores: &[String],
        breaks: &[String],
    ) -> Result<Self, SpellError> {
        Ok(Self {
            captures: build_globs(opts, "captures", captures)?,
            ignores: build_globs(opts, "ignores", ignores)?,
            breaks: build_globs(opts, "break_tags", breaks)?,
        })
    }

    pub fn tag(&self, element: &mut Element) {
        element.captured = self.captures.is_match(&element.name);
        element.ignored = self.ignores.is_match(&element.name);
        element.breaks = self.breaks.is_match(&element.name);
    }
}

fn build_globs(opts: &Options, key: &str, patterns: &[String]) -> Result<GlobSet, SpellError> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern)
            .map_err(|e| opts.invalid(key, &format!("has an invalid pattern '{pattern}': {e}")))?;
        builder.add(glob);
    }
    builder
        .build()
        .map_err(|e| opts.invalid(key, &format!("could not be compiled: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn element(name: &str, children: Vec<Node>) -> Element {
        Element {
            name: name.to_string(),
            children,
            captured: true,
            ..Default::default()
        }
    }

    fn text(t: &str) -> Node {
        Node::Text(t.to_string())
    }

    #[test]
    fn test_breaks_flush_blocks() {
        let mut p1 = element("p", vec![text("first "), text("para")]);
        p1.breaks = true;
        let mut p2 = element("p", vec![text("second")]);
        p2.breaks = true;
        let body = element(
            "body",
            vec![Node::Element(p1), text("loose"), Node::Element(p2)],
        );
        let out = extract(&[Node::Element(body)], &ExtractOptions::default());
        assert_eq!(
            out.blocks,
            vec![
                ("body>p".to_string(), "first para".to_string()),
                ("body>p".to_string(), "second".to_string()),
                ("body".to_string(), "loose".to_string()),
            ]
        );
    }

    #[test]
    fn test_ignored_subtree_keeps_comments() {
        let mut code = element(
            "code",
            vec![text("skipme"), Node::Comment("remark".into())],
        );
        code.ignored = true;
        code.attrs = vec![("title".into(), "hidden".into())];
        let root = element("div", vec![Node::Element(code), text("kept")]);
        let options = ExtractOptions {
            comments: true,
            attributes: vec!["title".into()],
            case_insensitive_attributes: false,
        };
        let out = extract(&[Node::Element(root)], &options);
        assert_eq!(out.blocks, vec![("div".to_string(), "kept".to_string())]);
        assert_eq!(
            out.comments,
            vec![("div>code<!--comment-->".to_string(), "remark".to_string())]
        );
        assert!(out.attributes.is_empty());
    }

    #[test]
    fn test_uncaptured_text_dropped_but_children_walked() {
        let mut outer = element("outer", vec![text("noise"), Node::Element(element("t", vec![text("signal")]))]);
        outer.captured = false;
        let out = extract(&[Node::Element(outer)], &ExtractOptions::default());
        assert_eq!(out.blocks, vec![("outer".to_string(), "signal".to_string())]);
    }

    #[test]
    fn test_fragment_order_and_context() {
        let mut img = element("img", vec![]);
        img.attrs = vec![("ALT".into(), "pictur".into())];
        let root = element(
            "p",
            vec![Node::Element(img), text("body"), Node::Comment("note".into())],
        );
        let options = ExtractOptions {
            comments: true,
            attributes: vec!["alt".into()],
            case_insensitive_attributes: true,
        };
        let parent = Fragment::text("", "page.html", "utf-8", "text");
        let fragments = extract(&[Node::Element(root)], &options).into_fragments(&parent, "html", "page.html");
        let summary: Vec<_> = fragments
            .iter()
            .map(|f| (f.category.as_str(), f.context.as_str()))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("html-comment", "page.html: p<!--comment-->"),
                ("html-attribute", "page.html: p>img[ALT]"),
                ("html-content", "page.html: p"),
            ]
        );
    }
}
