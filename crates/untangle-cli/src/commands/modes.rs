//! Modes command: explain the scan-mode decision for a fact file

use std::path::Path;

use anyhow::Result;
use untangle_core::{direction_coverage, select_scan_mode};

use super::load_facts;

pub fn cmd_modes(file: &Path) -> Result<()> {
    let facts = load_facts(file)?;
    let coverage = direction_coverage(&facts);
    let mode = select_scan_mode(&facts);

    println!("Facts:           {}", facts.len());
    println!("Known direction: {:.1}%", coverage * 100.0);
    println!("Bank threshold:  more than 80%");
    println!("Scan mode:       {}", mode);
    Ok(())
}
