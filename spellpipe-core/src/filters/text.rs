// Plain text filter
//
// Passes text through, optionally applying Unicode normalization and a
// conversion to another encoding. Characters the target encoding cannot hold
// are handled by the `errors` policy.

use super::Filter;
use crate::encoding;
use crate::error::SpellError;
use crate::options::Options;
use crate::types::Fragment;
use anyhow::{bail, Result};
use serde_yaml::{Mapping, Value};
use unicode_normalization::UnicodeNormalization;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NormalizationForm {
    Nfc,
    Nfd,
    Nfkc,
    Nfkd,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodeErrors {
    Strict,
    Replace,
    Ignore,
    BackslashReplace,
}

pub struct TextFilter {
    default_encoding: String,
    normalize: Option<NormalizationForm>,
    convert_encoding: Option<String>,
    errors: EncodeErrors,
}

impl TextFilter {
    pub const NAME: &'static str = "text";

    pub fn new(options: &Mapping, default_encoding: &str) -> Result<Self, SpellError> {
        let opts = Options::configure(
            Self::NAME,
            vec![
                ("normalize", Value::String(String::new())),
                ("convert_encoding", Value::String(String::new())),
                ("errors", Value::String("strict".into())),
            ],
            options,
        )?;

        let normalize = if opts.get_str("normalize").is_empty() {
            None
        } else {
            Some(
                match opts.expect_one_of("normalize", &["nfc", "nfd", "nfkc", "nfkd"])?.as_str() {
                    "nfc" => NormalizationForm::Nfc,
                    "nfd" => NormalizationForm::Nfd,
                    "nfkc" => NormalizationForm::Nfkc,
                    _ => NormalizationForm::Nfkd,
                },
            )
        };

        let convert_encoding = match opts.get_str("convert_encoding") {
            "" => None,
            label => Some(
                encoding::normalize_label(label)
                    .ok_or_else(|| opts.invalid("convert_encoding", &format!("names an unknown encoding '{label}'")))?,
            ),
        };

        let errors = match opts
            .expect_one_of("errors", &["strict", "replace", "ignore", "backslashreplace"])?
            .as_str()
        {
            "strict" => EncodeErrors::Strict,
            "replace" => EncodeErrors::Replace,
            "ignore" => EncodeErrors::Ignore,
            _ => EncodeErrors::BackslashReplace,
        };

        Ok(Self {
            default_encoding: default_encoding.to_string(),
            normalize,
            convert_encoding,
            errors,
        })
    }

    /// Apply normalization and encoding conversion
    pub fn convert(&self, text: &str, encoding: &str) -> Result<(String, String)> {
        let text = match self.normalize {
            Some(NormalizationForm::Nfc) => text.nfc().collect(),
            Some(NormalizationForm::Nfd) => text.nfd().collect(),
            Some(NormalizationForm::Nfkc) => text.nfkc().collect(),
            Some(NormalizationForm::Nfkd) => text.nfkd().collect(),
            None => text.to_string(),
        };

        match &self.convert_encoding {
            Some(target) => Ok((self.reencode(&text, target)?, target.clone())),
            None => Ok((text, encoding.to_string())),
        }
    }

    fn reencode(&self, text: &str, target: &str) -> Result<String> {
        let mut converted = String::with_capacity(text.len());
        for ch in text.chars() {
            if encoding::can_encode(target, ch) {
                converted.push(ch);
                continue;
            }
            match self.errors {
                EncodeErrors::Strict => {
                    bail!("'{}' codec can't encode character {:?}", target, ch)
                }
                EncodeErrors::Replace => converted.push('?'),
                EncodeErrors::Ignore => {}
                EncodeErrors::BackslashReplace => {
                    let code = ch as u32;
                    let escaped = if code <= 0xff {
                        format!("\\x{code:02x}")
                    } else if code <= 0xffff {
                        format!("\\u{code:04x}")
                    } else {
                        format!("\\U{code:08x}")
                    };
                    converted.push_str(&escaped);
                }
            }
        }
        Ok(converted)
    }
}

impl Filter for TextFilter {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn default_encoding(&self) -> &str {
        &self.default_encoding
    }

    fn run(&self, fragment: &Fragment) -> Result<Vec<Fragment>> {
        let (text, encoding) = self.convert(fragment.text_or_empty(), &fragment.encoding)?;
        Ok(vec![Fragment::text(text, fragment.context.clone(), encoding, "text")])
    }
}
