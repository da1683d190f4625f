use serde::{Deserialize, Serialize};
use std::fmt;

/// Encoding label carried by fragments whose content is raw bytes
pub const BINARY_ENCODING: &str = "bin";

// ===== FRAGMENT TYPES =====
// A fragment is the unit that flows between pipeline stages. Filters create
// them, the pipeline routes them, and the spelling adapter consumes them.

/// Payload of a fragment: decoded prose or opaque bytes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Content {
    Text(String),
    /// Bytes bypass every text-oriented stage after the one that produced them
    Bytes(Vec<u8>),
}

impl Content {
    pub fn is_blank(&self) -> bool {
        match self {
            Content::Text(text) => text.trim().is_empty(),
            Content::Bytes(bytes) => bytes.iter().all(|b| b.is_ascii_whitespace()),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Content::Text(text) => Some(text),
            Content::Bytes(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    pub content: Content,
    /// Human readable provenance (path, line, selector, ...)
    pub context: String,
    /// Normalized encoding label of `content`
    pub encoding: String,
    /// Short tag describing where the fragment came from, used for routing
    pub category: String,
    /// Set when this fragment is a terminal error record
    pub error: Option<String>,
}

impl Fragment {
    pub fn text(
        text: impl Into<String>,
        context: impl Into<String>,
        encoding: impl Into<String>,
        category: impl Into<String>,
    ) -> Self {
        Self {
            content: Content::Text(text.into()),
            context: context.into(),
            encoding: encoding.into(),
            category: category.into(),
            error: None,
        }
    }

    pub fn bytes(bytes: Vec<u8>, context: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            content: Content::Bytes(bytes),
            context: context.into(),
            encoding: BINARY_ENCODING.to_string(),
            category: category.into(),
            error: None,
        }
    }

    /// Error record: only the context survives alongside the message
    pub fn error(context: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            content: Content::Text(String::new()),
            context: context.into(),
            encoding: String::new(),
            category: String::new(),
            error: Some(message.into()),
        }
    }

    pub fn has_error(&self) -> bool {
        self.error.is_some()
    }

    pub fn is_bytes(&self) -> bool {
        matches!(self.content, Content::Bytes(_))
    }

    /// Text content, or an empty string for bytes fragments
    pub fn text_or_empty(&self) -> &str {
        self.content.as_text().unwrap_or("")
    }

    /// Build a narrower fragment that keeps this fragment's encoding
    pub fn derive(
        &self,
        text: impl Into<String>,
        context: impl Into<String>,
        category: impl Into<String>,
    ) -> Self {
        Self::text(text, context, self.encoding.clone(), category)
    }
}

// ===== FLOW CONTROL =====

/// Decision produced by a flow-control stage for the next filter stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlowStatus {
    /// Run the next filter stage
    Allow,
    /// Hand the fragment past the next filter stage untouched
    Skip,
    /// Stop routing the fragment; it never reaches the spelling engine
    Halt,
}

impl fmt::Display for FlowStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlowStatus::Allow => write!(f, "allow"),
            FlowStatus::Skip => write!(f, "skip"),
            FlowStatus::Halt => write!(f, "halt"),
        }
    }
}

/// How a fragment left the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Disposition {
    /// Went through every configured stage
    Completed,
    /// Carries an error raised by a stage
    Failed,
    /// Bytes fragment that skipped the remaining filter stages
    Bypassed,
    /// Stopped by flow control
    Halted,
    /// Flow control skipped it past the last filter stage
    Skipped,
}

/// Terminal item yielded by a pipeline run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Emitted {
    pub fragment: Fragment,
    pub disposition: Disposition,
}

// ===== RESULTS =====

/// Outcome of spell checking one terminal fragment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpellResult {
    /// Misspelled words, sorted and unique
    pub words: Vec<String>,
    pub context: String,
    pub category: String,
    pub error: Option<String>,
}

impl SpellResult {
    pub fn new(words: Vec<String>, context: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            words,
            context: context.into(),
            category: category.into(),
            error: None,
        }
    }

    pub fn failed(
        context: impl Into<String>,
        category: impl Into<String>,
        error: impl Into<String>,
    ) -> Self {
        Self {
            words: Vec::new(),
            context: context.into(),
            category: category.into(),
            error: Some(error.into()),
        }
    }

    /// Results with misspellings or errors fail the run
    pub fn is_failure(&self) -> bool {
        self.error.is_some() || !self.words.is_empty()
    }
}

/// What to do with bytes fragments once they reach the spelling adapter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BinaryPolicy {
    /// Check bytes only when they came out of the last stage
    #[default]
    Legacy,
    /// Never send bytes to the checker
    Skip,
    /// Always send bytes to the checker verbatim
    Check,
}

impl BinaryPolicy {
    pub fn should_check(&self, disposition: Disposition) -> bool {
        match self {
            BinaryPolicy::Legacy => disposition == Disposition::Completed,
            BinaryPolicy::Skip => false,
            BinaryPolicy::Check => matches!(
                disposition,
                Disposition::Completed | Disposition::Bypassed
            ),
        }
    }
}
