//! Encoding detection and conversion
//!
//! Picks a decoding for a file from its leading bytes: byte order marks
//! first, then an in-band declaration the owning filter knows how to read
//! (PEP 263 comment, `<meta charset>`, XML declaration, `@charset`), then the
//! configured default. Zip containers and NUL-bearing heads are flagged as
//! binary instead of being decoded.
//!
//! Labels are normalized to lowercase names: `utf-8`, `utf-16-le`,
//! `utf-16-be`, `utf-32-le`, `utf-32-be`, or the WHATWG name `encoding_rs`
//! reports for everything else (`windows-1252`, `shift_jis`, ...).

use anyhow::{anyhow, bail, Result};
use encoding_rs::Encoding;

/// Bytes inspected by header checks
pub const HEADER_LEN: usize = 1024;

/// Bytes inspected when looking for NUL bytes
const BINARY_SNIFF_LEN: usize = 8000;

/// Leading bytes of zip containers (ODF, OOXML)
pub const ZIP_MAGIC: &[u8] = b"PK\x03\x04";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Detected {
    /// Decode with `encoding` after dropping `bom_len` leading bytes
    Text { encoding: String, bom_len: usize },
    Binary,
}

/// Normalize an encoding label; `None` for labels nobody recognizes
pub fn normalize_label(label: &str) -> Option<String> {
    let lowered = label.trim().to_lowercase();
    let canonical = match lowered.replace('_', "-").as_str() {
        "utf8" | "utf-8" | "utf-8-sig" | "u8" => "utf-8",
        "utf16" | "utf-16" | "utf-16le" | "utf-16-le" => "utf-16-le",
        "utf-16be" | "utf-16-be" => "utf-16-be",
        "utf32" | "utf-32" | "utf-32le" | "utf-32-le" => "utf-32-le",
        "utf-32be" | "utf-32-be" => "utf-32-be",
        "latin-1" | "latin1" | "iso8859-1" => "windows-1252",
        _ => return Encoding::for_label(lowered.as_bytes()).map(canonical_name),
    };
    Some(canonical.to_string())
}

fn canonical_name(codec: &'static Encoding) -> String {
    if codec == encoding_rs::UTF_16LE {
        "utf-16-le".to_string()
    } else if codec == encoding_rs::UTF_16BE {
        "utf-16-be".to_string()
    } else {
        codec.name().to_lowercase()
    }
}

/// `encoding_rs` codec for a normalized label
fn codec_for(label: &str) -> Option<&'static Encoding> {
    match label {
        "utf-16-le" => Some(encoding_rs::UTF_16LE),
        "utf-16-be" => Some(encoding_rs::UTF_16BE),
        other => Encoding::for_label(other.as_bytes()),
    }
}

pub fn is_wide_unicode(label: &str) -> bool {
    label.starts_with("utf-16") || label.starts_with("utf-32")
}

/// Encoding and length of a leading byte order mark
pub fn detect_bom(bytes: &[u8]) -> Option<(&'static str, usize)> {
    const BOMS: [(&[u8], &str); 5] = [
        (b"\x00\x00\xfe\xff", "utf-32-be"),
        (b"\xff\xfe\x00\x00", "utf-32-le"),
        (b"\xef\xbb\xbf", "utf-8"),
        (b"\xfe\xff", "utf-16-be"),
        (b"\xff\xfe", "utf-16-le"),
    ];
    BOMS.iter()
        .find(|(bom, _)| bytes.starts_with(bom))
        .map(|(bom, encoding)| (*encoding, bom.len()))
}

pub fn looks_binary(bytes: &[u8]) -> bool {
    if bytes.starts_with(ZIP_MAGIC) {
        return true;
    }
    let head = &bytes[..bytes.len().min(BINARY_SNIFF_LEN)];
    head.contains(&0)
}

/// Detect how `bytes` should be decoded.
///
/// `header_check` receives at most [`HEADER_LEN`] leading bytes and may return
/// a declared encoding label.
pub fn detect_encoding<F>(bytes: &[u8], header_check: F, default_encoding: &str) -> Result<Detected>
where
    F: FnOnce(&[u8]) -> Option<String>,
{
    if let Some((encoding, bom_len)) = detect_bom(bytes) {
        return Ok(Detected::Text {
            encoding: encoding.to_string(),
            bom_len,
        });
    }

    if looks_binary(bytes) {
        return Ok(Detected::Binary);
    }

    let head = &bytes[..bytes.len().min(HEADER_LEN)];
    if let Some(declared) = header_check(head) {
        match normalize_label(&declared) {
            Some(encoding) => return Ok(Detected::Text { encoding, bom_len: 0 }),
            None => tracing::warn!("Ignoring unknown declared encoding '{}'", declared),
        }
    }

    let encoding = normalize_label(default_encoding)
        .ok_or_else(|| anyhow!("Unknown default encoding '{}'", default_encoding))?;
    Ok(Detected::Text { encoding, bom_len: 0 })
}

/// Strict decode; malformed input is an error
pub fn decode(bytes: &[u8], label: &str) -> Result<String> {
    let encoding =
        normalize_label(label).ok_or_else(|| anyhow!("Unknown encoding '{}'", label))?;

    match encoding.as_str() {
        "utf-32-le" => decode_utf32(bytes, u32::from_le_bytes),
        "utf-32-be" => decode_utf32(bytes, u32::from_be_bytes),
        other => {
            let codec = codec_for(other).ok_or_else(|| anyhow!("Unknown encoding '{}'", other))?;
            codec
                .decode_without_bom_handling_and_without_replacement(bytes)
                .map(|text| text.into_owned())
                .ok_or_else(|| anyhow!("'{}' codec can't decode the content", other))
        }
    }
}

fn decode_utf32(bytes: &[u8], to_u32: fn([u8; 4]) -> u32) -> Result<String> {
    if bytes.len() % 4 != 0 {
        bail!("'utf-32' codec can't decode a truncated code unit");
    }
    bytes
        .chunks_exact(4)
        .map(|chunk| {
            let value = to_u32([chunk[0], chunk[1], chunk[2], chunk[3]]);
            char::from_u32(value).ok_or_else(|| anyhow!("invalid code point 0x{value:x}"))
        })
        .collect()
}

/// Strict encode; characters the target cannot represent are an error
pub fn encode(text: &str, label: &str) -> Result<Vec<u8>> {
    let encoding =
        normalize_label(label).ok_or_else(|| anyhow!("Unknown encoding '{}'", label))?;

    let bytes = match encoding.as_str() {
        "utf-8" => text.as_bytes().to_vec(),
        "utf-16-le" => text.encode_utf16().flat_map(u16::to_le_bytes).collect(),
        "utf-16-be" => text.encode_utf16().flat_map(u16::to_be_bytes).collect(),
        "utf-32-le" => text.chars().flat_map(|c| (c as u32).to_le_bytes()).collect(),
        "utf-32-be" => text.chars().flat_map(|c| (c as u32).to_be_bytes()).collect(),
        other => {
            let codec = codec_for(other).ok_or_else(|| anyhow!("Unknown encoding '{}'", other))?;
            let (bytes, _, had_errors) = codec.encode(text);
            if had_errors {
                bail!("'{}' codec can't encode the content", other);
            }
            bytes.into_owned()
        }
    };
    Ok(bytes)
}

/// Whether `ch` survives a round trip through `label` (a normalized label)
pub fn can_encode(label: &str, ch: char) -> bool {
    if label.starts_with("utf-") {
        return true;
    }
    match codec_for(label) {
        Some(codec) => {
            let mut buf = [0u8; 4];
            let (_, _, had_errors) = codec.encode(ch.encode_utf8(&mut buf));
            !had_errors
        }
        None => false,
    }
}

/// Convert `\r\n` and lone `\r` line endings to `\n`
pub fn normalize_eol(text: &str) -> String {
    if !text.contains('\r') {
        return text.to_string();
    }
    text.replace("\r\n", "\n").replace('\r', "\n")
}
