//! nyx configuration
//!
//! Loaded from TOML. Lookup order: an explicit path, then `./nyx.toml`,
//! then `<config dir>/nyx/config.toml`. `NYX_DATABASE_URL` overrides the
//! file's `database_url`.
//!
//! ```toml
//! database_url = "mysql://root@localhost/shop"
//! dialect = "mysql"
//!
//! [schema]
//! users = ["id", "name", "email"]
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{NyxError, NyxResult};
use crate::transpiler::Dialect;

pub const DATABASE_URL_ENV: &str = "NYX_DATABASE_URL";

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Connection URL. Without one, statements are only compiled.
    pub database_url: Option<String>,

    /// Output dialect when not connected. A connection's URL wins.
    pub dialect: Dialect,

    /// Tables known up front, name → columns.
    pub schema: BTreeMap<String, Vec<String>>,
}

impl Config {
    pub fn from_toml(text: &str) -> NyxResult<Self> {
        toml::from_str(text).map_err(|e| NyxError::Config(e.to_string()))
    }

    pub fn from_file(path: &Path) -> NyxResult<Self> {
        let text = std::fs::read_to_string(path)?;
        let config = Self::from_toml(&text)?;
        tracing::debug!(path = %path.display(), "loaded config");
        Ok(config)
    }

    /// Load from `explicit`, or the first default location that exists,
    /// or fall back to defaults. Applies the environment override.
    pub fn load(explicit: Option<&Path>) -> NyxResult<Self> {
        let mut config = match explicit {
            Some(path) => Self::from_file(path)?,
            None => match default_paths().into_iter().find(|p| p.is_file()) {
                Some(path) => Self::from_file(&path)?,
                None => Self::default(),
            },
        };

        if let Ok(url) = std::env::var(DATABASE_URL_ENV) {
            if !url.trim().is_empty() {
                config.database_url = Some(url);
            }
        }
        Ok(config)
    }
}

fn default_paths() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from("nyx.toml")];
    if let Some(dir) = dirs::config_dir() {
        paths.push(dir.join("nyx").join("config.toml"));
    }
    paths
}
