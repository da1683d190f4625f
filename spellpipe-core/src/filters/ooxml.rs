// Office Open XML filter (.docx, .pptx, .xlsx)
//
// The archive layout decides the document kind; each kind has its own parts
// and its own text and paragraph tags. User `captures` replace the built-in
// text tags and user `break_tags`/`ignores` extend the built-in ones.

use super::odf::{merged, override_or};
use super::xml::{declared_encoding, xml_defaults, XmlExtractor};
use super::{Filter, BINARY_CATEGORY};
use crate::encoding::{self, Detected};
use crate::error::SpellError;
use crate::options::Options;
use crate::types::Fragment;
use anyhow::{bail, Context, Result};
use regex::Regex;
use serde_yaml::Mapping;
use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::Path;
use std::sync::LazyLock;

static DOCX_PART_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^word/(?:document|header\d*|footer\d*|footnotes|endnotes|comments)\.xml$").unwrap()
});

static PPTX_PART_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^ppt/(?:slides/slide|notesSlides/notesSlide)(\d+)\.xml$").unwrap()
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OfficeKind {
    Docx,
    Pptx,
    Xlsx,
}

impl OfficeKind {
    fn captures(self) -> &'static [&'static str] {
        match self {
            OfficeKind::Docx => &["w:t"],
            OfficeKind::Pptx => &["a:t"],
            OfficeKind::Xlsx => &["t"],
        }
    }

    fn breaks(self) -> &'static [&'static str] {
        match self {
            OfficeKind::Docx => &["w:p"],
            OfficeKind::Pptx => &["a:p"],
            OfficeKind::Xlsx => &["si"],
        }
    }

    /// Detect the kind from the archive's entry names
    pub fn detect<'a>(names: impl IntoIterator<Item = &'a str>) -> Option<Self> {
        for name in names {
            if name == "word/document.xml" {
                return Some(OfficeKind::Docx);
            }
            if name.starts_with("ppt/slides/") {
                return Some(OfficeKind::Pptx);
            }
            if name == "xl/sharedStrings.xml" || name == "xl/workbook.xml" {
                return Some(OfficeKind::Xlsx);
            }
        }
        None
    }

    /// Parts holding prose, in reading order
    pub fn parts(self, names: &[String]) -> Vec<String> {
        match self {
            OfficeKind::Docx => {
                let mut parts: Vec<String> = names
                    .iter()
                    .filter(|name| DOCX_PART_REGEX.is_match(name))
                    .cloned()
                    .collect();
                // document first, then the rest alphabetically
                parts.sort_by_key(|name| (name != "word/document.xml", name.clone()));
                parts
            }
            OfficeKind::Pptx => {
                let mut parts: Vec<(bool, u32, String)> = names
                    .iter()
                    .filter_map(|name| {
                        let caps = PPTX_PART_REGEX.captures(name)?;
                        let number = caps.get(1)?.as_str().parse().ok()?;
                        Some((name.contains("notesSlide"), number, name.clone()))
                    })
                    .collect();
                parts.sort();
                parts.into_iter().map(|(_, _, name)| name).collect()
            }
            OfficeKind::Xlsx => names
                .iter()
                .filter(|name| name.as_str() == "xl/sharedStrings.xml")
                .cloned()
                .collect(),
        }
    }
}

pub struct OoxmlFilter {
    default_encoding: String,
    docx: XmlExtractor,
    pptx: XmlExtractor,
    xlsx: XmlExtractor,
}

impl OoxmlFilter {
    pub const NAME: &'static str = "ooxml";

    pub fn new(options: &Mapping, default_encoding: &str) -> Result<Self, SpellError> {
        let opts = Options::configure(Self::NAME, xml_defaults(), options)?;
        let build = |kind: OfficeKind| -> Result<XmlExtractor, SpellError> {
            XmlExtractor::with_tags(
                &opts,
                &override_or(opts.get_str_list("captures")?, kind.captures()),
                &opts.get_str_list("ignores")?,
                &merged(opts.get_str_list("break_tags")?, kind.breaks()),
            )
        };
        Ok(Self {
            default_encoding: default_encoding.to_string(),
            docx: build(OfficeKind::Docx)?,
            pptx: build(OfficeKind::Pptx)?,
            xlsx: build(OfficeKind::Xlsx)?,
        })
    }

    fn extractor(&self, kind: OfficeKind) -> &XmlExtractor {
        match kind {
            OfficeKind::Docx => &self.docx,
            OfficeKind::Pptx => &self.pptx,
            OfficeKind::Xlsx => &self.xlsx,
        }
    }

    fn run_archive(&self, path: &Path, context: &str) -> Result<Vec<Fragment>> {
        let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
        let mut archive = zip::ZipArchive::new(BufReader::new(file))
            .with_context(|| format!("{} is not a valid Office Open XML archive", path.display()))?;

        let names: Vec<String> = archive.file_names().map(str::to_string).collect();
        let Some(kind) = OfficeKind::detect(names.iter().map(String::as_str)) else {
            bail!("{context} is not a Word, PowerPoint or Excel document");
        };
        tracing::debug!("ooxml: {} is {:?}", context, kind);

        let parent = Fragment::text("", context, "utf-8", "text");
        let mut fragments = Vec::new();
        for part in kind.parts(&names) {
            let xml = read_part(&mut archive, &part)
                .with_context(|| format!("Failed to read {part} from {context}"))?;
            let part_context = format!("{context}: {part}");
            fragments.extend(self.extractor(kind).fragments(&xml, &parent, Self::NAME, &part_context)?);
        }
        Ok(fragments)
    }
}

fn read_part<R: Read + Seek>(archive: &mut zip::ZipArchive<R>, name: &str) -> Result<String> {
    let mut xml = String::new();
    archive.by_name(name)?.read_to_string(&mut xml)?;
    Ok(xml)
}

impl Filter for OoxmlFilter {
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

    /// A bare part (for example a word/document.xml extracted by hand)
    fn run(&self, fragment: &Fragment) -> Result<Vec<Fragment>> {
        let text = fragment.text_or_empty();
        let kind = if text.contains("<w:") {
            OfficeKind::Docx
        } else if text.contains("<a:") {
            OfficeKind::Pptx
        } else {
            OfficeKind::Xlsx
        };
        self.extractor(kind)
            .fragments(text, fragment, Self::NAME, &fragment.context)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::FileOptions;

    fn write_archive(path: &Path, entries: &[(&str, &str)]) {
        let mut writer = zip::ZipWriter::new(File::create(path).unwrap());
        for (name, body) in entries {
            writer.start_file(*name, FileOptions::default()).unwrap();
            writer.write_all(body.as_bytes()).unwrap();
        }
        writer.finish().unwrap();
    }

    #[test]
    fn test_docx_paragraphs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.docx");
        write_archive(
            &path,
            &[
                ("[Content_Types].xml", "<Types/>"),
                (
                    "word/document.xml",
                    r#"<w:document xmlns:w="w"><w:body>
<w:p><w:r><w:t>Helo </w:t></w:r><w:r><w:instrText>PAGE</w:instrText><w:t>world</w:t></w:r></w:p>
<w:p><w:r><w:t>Secnd</w:t></w:r></w:p>
</w:body></w:document>"#,
                ),
                (
                    "word/footer1.xml",
                    r#"<w:ftr xmlns:w="w"><w:p><w:r><w:t>Foter</w:t></w:r></w:p></w:ftr>"#,
                ),
            ],
        );

        let filter = OoxmlFilter::new(&Mapping::new(), "utf-8").unwrap();
        let fragments = filter.run_first(&path).unwrap();
        let texts: Vec<_> = fragments.iter().map(|f| f.text_or_empty()).collect();
        assert_eq!(texts, vec!["Helo world", "Secnd", "Foter"]);
        assert!(fragments[2].context.contains("word/footer1.xml: w:ftr>w:p"));
        assert!(fragments.iter().all(|f| f.category == "ooxml-content"));
    }

    #[test]
    fn test_pptx_slide_order() {
        let names: Vec<String> = [
            "ppt/slides/slide10.xml",
            "ppt/slides/slide2.xml",
            "ppt/notesSlides/notesSlide1.xml",
            "ppt/slides/slide1.xml",
            "ppt/presentation.xml",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        let kind = OfficeKind::detect(names.iter().map(String::as_str)).unwrap();
        assert_eq!(kind, OfficeKind::Pptx);
        assert_eq!(
            kind.parts(&names),
            vec![
                "ppt/slides/slide1.xml",
                "ppt/slides/slide2.xml",
                "ppt/slides/slide10.xml",
                "ppt/notesSlides/notesSlide1.xml",
            ]
        );
    }

    #[test]
    fn test_unknown_archive_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("other.zip");
        write_archive(&path, &[("readme.txt", "hi")]);
        let filter = OoxmlFilter::new(&Mapping::new(), "utf-8").unwrap();
        assert!(filter.run_first(&path).is_err());
    }
}
