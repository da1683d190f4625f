// OpenDocument filter
//
// Opens .odt/.ods/.odp archives and extracts text from `content.xml`. Flat
// OpenDocument files (.fodt, ...) are plain XML and go through `run`.

use super::xml::{declared_encoding, xml_defaults, XmlExtractor};
use super::{Filter, BINARY_CATEGORY};
use crate::encoding::{self, Detected};
use crate::error::SpellError;
use crate::options::Options;
use crate::types::Fragment;
use anyhow::{Context, Result};
use serde_yaml::Mapping;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

const CONTENT_PART: &str = "content.xml";
const ODF_CAPTURES: &[&str] = &["*"];
const ODF_IGNORES: &[&str] = &["office:font-face-decls", "office:automatic-styles", "office:styles"];
const ODF_BREAKS: &[&str] = &["text:p", "text:h", "text:list-item", "table:table-cell"];

pub struct OdfFilter {
    default_encoding: String,
    extractor: XmlExtractor,
}

impl OdfFilter {
    pub const NAME: &'static str = "odf";

    pub fn new(options: &Mapping, default_encoding: &str) -> Result<Self, SpellError> {
        let opts = Options::configure(Self::NAME, xml_defaults(), options)?;
        let extractor = XmlExtractor::with_tags(
            &opts,
            &override_or(opts.get_str_list("captures")?, ODF_CAPTURES),
            &merged(opts.get_str_list("ignores")?, ODF_IGNORES),
            &merged(opts.get_str_list("break_tags")?, ODF_BREAKS),
        )?;
        Ok(Self {
            default_encoding: default_encoding.to_string(),
            extractor,
        })
    }

    fn run_archive(&self, path: &Path, context: &str) -> Result<Vec<Fragment>> {
        let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
        let mut archive = zip::ZipArchive::new(BufReader::new(file))
            .with_context(|| format!("{} is not a valid OpenDocument archive", path.display()))?;

        let mut xml = String::new();
        archive
            .by_name(CONTENT_PART)
            .with_context(|| format!("{context} has no {CONTENT_PART}"))?
            .read_to_string(&mut xml)
            .with_context(|| format!("Failed to read {CONTENT_PART} from {context}"))?;

        let parent = Fragment::text("", context, "utf-8", "text");
        let part_context = format!("{context}: {CONTENT_PART}");
        self.extractor
            .fragments(&xml, &parent, Self::NAME, &part_context)
    }
}

/// User list if given, otherwise the built-in one
pub(crate) fn override_or(user: Vec<String>, builtin: &[&str]) -> Vec<String> {
    if user.is_empty() || user == ["*"] {
        builtin.iter().map(|s| s.to_string()).collect()
    } else {
        user
    }
}

/// Built-in list extended with the user's entries
pub(crate) fn merged(user: Vec<String>, builtin: &[&str]) -> Vec<String> {
    let mut all: Vec<String> = builtin.iter().map(|s| s.to_string()).collect();
    all.extend(user);
    all
}

impl Filter for OdfFilter {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn default_encoding(&self) -> &str {
        &self.default_encoding
    }

    fn header_check(&self, head: &[u8]) -> Option<String> {
        declared_encoding(head)
    }

    fn run_first(&self, path: &Path) -> Result<Vec<Fragment>> {
        let context = path.display().to_string();
        let bytes = std::fs::read(path).with_context(|| format!("Failed to read {context}"))?;

        if bytes.starts_with(encoding::ZIP_MAGIC) {
            tracing::debug!("odf: reading archive {}", context);
            return self.run_archive(path, &context);
        }

        match encoding::detect_encoding(&bytes, |head| self.header_check(head), &self.default_encoding)? {
            Detected::Binary => Ok(vec![Fragment::bytes(bytes, context, BINARY_CATEGORY)]),
            Detected::Text { encoding, bom_len } => {
                let text = encoding::decode(&bytes[bom_len..], &encoding)
                    .with_context(|| format!("Could not decode {context} as {encoding}"))?;
                self.filter_text(encoding::normalize_eol(&text), &context, &encoding)
            }
        }
    }

    fn run(&self, fragment: &Fragment) -> Result<Vec<Fragment>> {
        self.extractor
            .fragments(fragment.text_or_empty(), fragment, Self::NAME, &fragment.context)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::FileOptions;

    const CONTENT: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<office:document-content xmlns:office="o" xmlns:text="t" xmlns:style="s">
  <office:automatic-styles><style:style style:name="P1"/></office:automatic-styles>
  <office:body><office:text>
    <text:h>Headng</text:h>
    <text:p>Frist <text:span>line</text:span></text:p>
    <text:p>Second</text:p>
  </office:text></office:body>
</office:document-content>"#;

    #[test]
    fn test_reads_archive_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.odt");
        let mut writer = zip::ZipWriter::new(File::create(&path).unwrap());
        writer
            .start_file("mimetype", FileOptions::default())
            .unwrap();
        writer
            .write_all(b"application/vnd.oasis.opendocument.text")
            .unwrap();
        writer
            .start_file("content.xml", FileOptions::default())
            .unwrap();
        writer.write_all(CONTENT.as_bytes()).unwrap();
        writer.finish().unwrap();

        let filter = OdfFilter::new(&Mapping::new(), "utf-8").unwrap();
        let fragments = filter.run_first(&path).unwrap();
        let texts: Vec<_> = fragments.iter().map(|f| f.text_or_empty()).collect();
        assert_eq!(texts, vec!["Headng", "Frist line", "Second"]);
        assert!(fragments[0].context.ends_with("doc.odt: content.xml: office:document-content>office:body>office:text>text:h"));
        assert_eq!(fragments[1].category, "odf-content");
    }

    #[test]
    fn test_flat_document_via_run() {
        let filter = OdfFilter::new(&Mapping::new(), "utf-8").unwrap();
        let fragments = filter
            .run(&Fragment::text(CONTENT, "doc.fodt", "utf-8", "text"))
            .unwrap();
        assert_eq!(fragments.len(), 3);
    }
}
