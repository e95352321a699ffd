//! Canonicalize command: debugging helper for the grouping key

use anyhow::Result;
use untangle_core::{canonicalize, exclusion};

pub fn cmd_canonicalize(description: &str) -> Result<()> {
    match canonicalize(description) {
        Some(canonical) => {
            println!("Canonical: {}", canonical);
            match exclusion::classify(&canonical, Some(description)) {
                Some(e) => println!("Excluded:  yes ({}, matched \"{}\")", e.reason, e.pattern),
                None => println!("Excluded:  no"),
            }
        }
        None => println!("Nothing meaningful remains after normalization"),
    }
    Ok(())
}
