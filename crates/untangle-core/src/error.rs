//! Error types for untangle
//!
//! Malformed business data (missing dates, amounts, currencies) is never an
//! error here. It propagates as `None` and shows up as "cannot compute
//! impact" or "not eligible" outcomes. The variants below cover the only
//! failure modes the library surfaces to a host: reading and parsing
//! configuration.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config parse error: {0}")]
    Config(#[from] toml::de::Error),

    #[error("Invalid data: {0}")]
    InvalidData(String),
}

pub type Result<T> = std::result::Result<T, Error>;
