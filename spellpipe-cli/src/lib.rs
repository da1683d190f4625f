// All core functionality is in spellpipe-core
// This CLI acts as a thin wrapper around the core library

// CLI-specific modules
pub mod report;

// Re-export core types for convenience
pub use spellpipe_core::*;

// Re-export CLI utilities
pub use report::{render_json, render_text};
