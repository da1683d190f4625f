// URL and e-mail stripping filter

use super::Filter;
use crate::error::SpellError;
use crate::options::Options;
use crate::types::Fragment;
use anyhow::Result;
use regex::Regex;
use serde_yaml::{Mapping, Value};
use std::sync::LazyLock;

static URL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)\b(?:(?:https?|ftps?|file)://|www\d{0,3}\.)[^\s<>"'`]+"#).unwrap()
});

static EMAIL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:mailto:)?[\w.+-]+@[\w-]+(?:\.[\w-]+)+\b").unwrap()
});

pub struct UrlFilter {
    default_encoding: String,
    urls: bool,
    emails: bool,
}

impl UrlFilter {
    pub const NAME: &'static str = "url";

    pub fn new(options: &Mapping, default_encoding: &str) -> Result<Self, SpellError> {
        let opts = Options::configure(
            Self::NAME,
            vec![("urls", Value::Bool(true)), ("emails", Value::Bool(true))],
            options,
        )?;
        Ok(Self {
            default_encoding: default_encoding.to_string(),
            urls: opts.get_bool("urls"),
            emails: opts.get_bool("emails"),
        })
    }

    pub fn strip(&self, text: &str) -> String {
        let mut text = text.to_string();
        if self.emails {
            text = EMAIL_REGEX.replace_all(&text, "").into_owned();
        }
        if self.urls {
            text = URL_REGEX.replace_all(&text, "").into_owned();
        }
        text
    }
}

impl Filter for UrlFilter {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn default_encoding(&self) -> &str {
        &self.default_encoding
    }

    fn run(&self, fragment: &Fragment) -> Result<Vec<Fragment>> {
        let text = self.strip(fragment.text_or_empty());
        Ok(vec![fragment.derive(text, fragment.context.clone(), "url-free")])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strips_urls_and_emails() {
        let filter = UrlFilter::new(&Mapping::new(), "utf-8").unwrap();
        let text = filter.strip("See https://exmaple.com/pth?q=1 or mail me@exmaple.org today");
        assert!(!text.contains("exmaple"));
        assert!(text.contains("See"));
        assert!(text.contains("today"));
    }

    #[test]
    fn test_url_only() {
        let options: Mapping = serde_yaml::from_str("emails: false").unwrap();
        let filter = UrlFilter::new(&options, "utf-8").unwrap();
        let text = filter.strip("www.somwhere.net and me@somwhere.net");
        assert_eq!(text, " and me@somwhere.net");
    }
}
