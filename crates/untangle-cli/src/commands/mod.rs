//! CLI command implementations
//!
//! Commands are organized by domain:
//! - `scan` - Full analysis run with human or JSON report output
//! - `canonicalize` - Canonical-key and exclusion debugging helper
//! - `modes` - Scan-mode decision transparency

pub mod canonicalize;
pub mod modes;
pub mod scan;

// Re-export command functions for main.rs
pub use canonicalize::*;
pub use modes::*;
pub use scan::*;
