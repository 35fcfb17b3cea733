use crate::ber::DEFAULT_MAX_DECODE_DEPTH;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;
use std::fs;
use anyhow::Result;

/// Options shared by the compiler and the decompiler.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterConfig {
    /// Maximum filter nesting depth. `(sn=x)` has depth 1, `(!(sn=x))` depth 2. No limit when unset.
    #[serde(default)]
    pub max_depth: Option<usize>,
    /// Escape every non-ASCII byte in rendered values instead of writing UTF-8 as is.
    #[serde(default)]
    pub escape_non_ascii: bool,
}

impl FilterConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: FilterConfig = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = Some(max_depth);
        self
    }

    /// BER nesting allowed when decoding filter bytes. A substrings leaf adds two levels
    /// (the segment SEQUENCE and its elements) below its filter node.
    pub fn decode_depth(&self) -> usize {
        self.max_depth
            .map_or(DEFAULT_MAX_DECODE_DEPTH, |depth| depth.saturating_add(2))
    }
}

impl FromStr for FilterConfig {
    type Err = anyhow::Error;

    fn from_str(content: &str) -> Result<Self> {
        let config: FilterConfig = serde_yaml::from_str(content)?;
        Ok(config)
    }
}
