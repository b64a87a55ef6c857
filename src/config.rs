// src/config.rs
//
// YAML settings file loader. Sections and fields are all optional;
// anything missing keeps its default from types.rs.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

use crate::types::Config;

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("can't read settings file {}", path.display()))?;
        let config: Config = serde_yaml::from_str(&contents)
            .with_context(|| format!("can't parse settings file {}", path.display()))?;
        Ok(config)
    }
}
