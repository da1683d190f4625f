//! Filters
//!
//! A filter turns a file (first stage) or a fragment (any later stage) into
//! zero or more fragments. Fan-out is the normal case: one source file
//! becomes one fragment per comment, docstring or markup block.
//!
//! ## Architecture
//!
//! ```text
//! file on disk
//!     ↓  run_first: read → detect encoding → decode → filter_text
//! Vec<Fragment>
//!     ↓  run (every later filter stage)
//! Vec<Fragment>
//! ```
//!
//! Filters are configured once when the pipeline is built and hold no
//! per-call state, so one instance can be shared by every worker.

pub mod clike;
pub mod context;
pub mod cpp;
pub mod html;
pub mod javascript;
pub mod markdown;
pub mod markup;
#[cfg(feature = "office")]
pub mod odf;
#[cfg(feature = "office")]
pub mod ooxml;
pub mod python;
pub mod stylesheets;
pub mod text;
pub mod url;
pub mod xml;

use crate::encoding::{self, Detected};
use crate::types::Fragment;
use anyhow::{Context, Result};
use std::path::Path;

pub use context::ContextFilter;
pub use cpp::CppFilter;
pub use html::HtmlFilter;
pub use javascript::JavaScriptFilter;
pub use markdown::MarkdownFilter;
#[cfg(feature = "office")]
pub use odf::OdfFilter;
#[cfg(feature = "office")]
pub use ooxml::OoxmlFilter;
pub use python::PythonFilter;
pub use stylesheets::StylesheetsFilter;
pub use text::TextFilter;
pub use url::UrlFilter;
pub use xml::XmlFilter;

/// Category given to undecodable files by the generic entry point
pub const BINARY_CATEGORY: &str = "binary";

/// Filter trait - transforms files and fragments into fragments
///
/// Only `run` is mandatory. The default `run_first` handles reading and
/// decoding, then hands the text to `filter_text`, which by default wraps it
/// in a `text` fragment and calls `run`.
pub trait Filter: Send + Sync {
    /// Stage name for logging
    fn name(&self) -> &str;

    /// Encoding assumed when nothing in the file declares one
    fn default_encoding(&self) -> &str;

    /// Look for an in-band encoding declaration in the file head
    fn header_check(&self, _head: &[u8]) -> Option<String> {
        None
    }

    /// Transform one fragment into any number of fragments
    fn run(&self, fragment: &Fragment) -> Result<Vec<Fragment>>;

    /// Filter a freshly decoded file
    fn filter_text(&self, text: String, context: &str, encoding: &str) -> Result<Vec<Fragment>> {
        self.run(&Fragment::text(text, context, encoding, "text"))
    }

    /// Entry point used when this filter is the first pipeline stage
    fn run_first(&self, path: &Path) -> Result<Vec<Fragment>> {
        let bytes =
            std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
        let context = path.display().to_string();

        match encoding::detect_encoding(&bytes, |head| self.header_check(head), self.default_encoding())? {
            Detected::Binary => {
                tracing::debug!("{}: {} looks binary", self.name(), context);
                Ok(vec![Fragment::bytes(bytes, context, BINARY_CATEGORY)])
            }
            Detected::Text { encoding, bom_len } => {
                tracing::debug!("{}: decoding {} as {}", self.name(), context, encoding);
                let text = encoding::decode(&bytes[bom_len..], &encoding)
                    .with_context(|| format!("Could not decode {context} as {encoding}"))?;
                self.filter_text(encoding::normalize_eol(&text), &context, &encoding)
            }
        }
    }
}

/// Context for content found at `line` of `context`
pub(crate) fn line_context(context: &str, line: usize) -> String {
    format!("{context}({line})")
}
