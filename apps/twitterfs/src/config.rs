// Author: Lukas Bower
// Purpose: Load the twitterfs credential and listen configuration.

//! Configuration loading.
//!
//! The config lives at `$HOME/lib/twitterfs/config` as JSON. Keys and
//! tokens come from the upstream developer console; `screen_name` is the
//! account whose follows seed `/users`.

use std::fs::File;
use std::path::PathBuf;

use anyhow::Context;
use serde::Deserialize;

/// Default TCP endpoint when the config leaves `listen_address` empty.
pub const DEFAULT_LISTEN_ADDRESS: &str = "localhost:7731";

/// twitterfs configuration file contents.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// OAuth consumer key.
    pub api_key: String,
    /// OAuth consumer secret.
    pub api_secret_key: String,
    /// OAuth access token for the configured account.
    pub access_token: String,
    /// OAuth access token secret.
    pub access_token_secret: String,
    /// Screen name of the configured account.
    pub screen_name: String,
    /// TCP listen address; defaults to [`DEFAULT_LISTEN_ADDRESS`].
    #[serde(default)]
    pub listen_address: String,
}

impl Config {
    /// Load the config from its default path under `$HOME`.
    pub fn load_default() -> anyhow::Result<Self> {
        let home = std::env::var_os("HOME").context("HOME is not set")?;
        let mut path = PathBuf::from(home);
        path.push("lib");
        path.push("twitterfs");
        path.push("config");
        Self::load(&path)
    }

    /// Load the config from an explicit path.
    pub fn load(path: &std::path::Path) -> anyhow::Result<Self> {
        let file =
            File::open(path).with_context(|| format!("open config {}", path.display()))?;
        let mut config: Config = serde_json::from_reader(file)
            .with_context(|| format!("parse config {}", path.display()))?;
        if config.listen_address.is_empty() {
            config.listen_address = DEFAULT_LISTEN_ADDRESS.to_owned();
        }
        Ok(config)
    }
}
