use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

/// Version constants for cache invalidation
pub mod versions {
    pub const SPELLPIPE_VERSION: &str = env!("CARGO_PKG_VERSION");
    pub const DICTIONARY_FORMAT_VERSION: &str = "1.1.0";
}

/// Fingerprint of everything that goes into a compiled dictionary
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct DictionaryCacheKey {
    pub wordlist_hash: String,
    pub checker: String,
    pub encoding: String,
    pub lang: String,
    pub spellpipe_version: String,
    pub format_version: String,
}

impl DictionaryCacheKey {
    pub fn new(words: &[String], checker: &str, encoding: &str, lang: &str) -> Self {
        Self {
            wordlist_hash: calculate_wordlist_hash(words),
            checker: checker.to_string(),
            encoding: encoding.to_string(),
            lang: lang.to_string(),
            spellpipe_version: versions::SPELLPIPE_VERSION.to_string(),
            format_version: versions::DICTIONARY_FORMAT_VERSION.to_string(),
        }
    }

    /// Compute cache key hash for storage
    pub fn to_cache_hash(&self) -> String {
        let mut hasher = Sha256::new();
        for field in [
            &self.wordlist_hash,
            &self.checker,
            &self.encoding,
            &self.lang,
            &self.spellpipe_version,
            &self.format_version,
        ] {
            hasher.update(field.as_bytes());
            // field terminator
            hasher.update([0u8]);
        }
        format!("{:x}", hasher.finalize())
    }

    /// Whether `output` was compiled from exactly these inputs
    pub fn is_fresh(&self, output: &Path) -> bool {
        if !output.exists() {
            return false;
        }
        match std::fs::read_to_string(sidecar_path(output)) {
            Ok(stored) => stored.trim() == self.to_cache_hash(),
            Err(_) => false,
        }
    }

    pub fn store(&self, output: &Path) -> std::io::Result<()> {
        std::fs::write(sidecar_path(output), self.to_cache_hash())
    }
}

pub fn calculate_wordlist_hash(words: &[String]) -> String {
    let mut hasher = Sha256::new();
    for word in words {
        hasher.update(word.as_bytes());
        hasher.update(b"\n");
    }
    format!("{:x}", hasher.finalize())
}

/// `OUTPUT.sha256` next to the compiled dictionary
pub fn sidecar_path(output: &Path) -> PathBuf {
    let mut name = output.as_os_str().to_os_string();
    name.push(".sha256");
    PathBuf::from(name)
}
