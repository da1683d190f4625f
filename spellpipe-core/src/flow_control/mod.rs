//! Flow control
//!
//! A flow-control stage looks at a fragment's category and decides how the
//! next filter stage treats it: run it (`Allow`), hand the fragment past it
//! (`Skip`), or stop routing the fragment (`Halt`).

pub mod wildcard;

use crate::types::FlowStatus;
use anyhow::Result;

pub use wildcard::WildcardFlowControl;

pub trait FlowControl: Send + Sync {
    /// Stage name for logging
    fn name(&self) -> &str;

    /// Decide the flow status for a fragment of `category`
    fn adjust_flow(&self, category: &str) -> Result<FlowStatus>;
}
