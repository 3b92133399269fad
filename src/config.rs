use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// SQLite file holding clients and events.
    pub database: PathBuf,
    /// Drop and recreate every table before seeding. Dev/test only.
    pub reset_on_start: bool,
    /// Clients inserted at bootstrap if not already there.
    pub seed_clients: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: PathBuf::from("bank.db"),
            reset_on_start: false,
            seed_clients: vec!["John Jones".to_string(), "Jane Doe".to_string()],
        }
    }
}

pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let Some(p) = path else {
        return Ok(Config::default());
    };
    let s = fs::read_to_string(p).with_context(|| format!("read {}", p.display()))?;
    parse_config(&s).with_context(|| format!("parse {}", p.display()))
}

fn parse_config(s: &str) -> Result<Config> {
    Ok(toml::from_str(s)?)
}
