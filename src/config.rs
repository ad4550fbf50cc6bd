//! Configuration — the host's key/value store plus CLI flags for the binary.
//!
//! The [`ConfigStore`] is what resolution reads from. It is filled from a TOML
//! file (top-level keys map straight to entries) and then from prefixed
//! environment variables, which win over the file.

use clap::Parser;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::document::DocumentClass;
use crate::error::{Error, Result};

/// Default prefix used when none is given.
pub const DEFAULT_PREFIX: &str = "MONGO";

// ─── Values ─────────────────────────────────────────────────────────────────

/// A single configuration value. Keys are untyped; resolution coerces.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigValue {
    String(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    DocumentClass(DocumentClass),
}

impl ConfigValue {
    /// Human-readable rendering used in error messages.
    pub fn describe(&self) -> String {
        match self {
            ConfigValue::String(s) => s.clone(),
            ConfigValue::Integer(i) => i.to_string(),
            ConfigValue::Float(f) => f.to_string(),
            ConfigValue::Boolean(b) => b.to_string(),
            ConfigValue::DocumentClass(c) => format!("<class {}>", c.name()),
        }
    }

    /// The string payload, without coercing other types.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ConfigValue::String(s) => Some(s),
            _ => None,
        }
    }
}

impl From<&str> for ConfigValue {
    fn from(v: &str) -> Self {
        ConfigValue::String(v.to_string())
    }
}

impl From<String> for ConfigValue {
    fn from(v: String) -> Self {
        ConfigValue::String(v)
    }
}

impl From<i64> for ConfigValue {
    fn from(v: i64) -> Self {
        ConfigValue::Integer(v)
    }
}

impl From<i32> for ConfigValue {
    fn from(v: i32) -> Self {
        ConfigValue::Integer(i64::from(v))
    }
}

impl From<u16> for ConfigValue {
    fn from(v: u16) -> Self {
        ConfigValue::Integer(i64::from(v))
    }
}

impl From<f64> for ConfigValue {
    fn from(v: f64) -> Self {
        ConfigValue::Float(v)
    }
}

impl From<bool> for ConfigValue {
    fn from(v: bool) -> Self {
        ConfigValue::Boolean(v)
    }
}

impl From<DocumentClass> for ConfigValue {
    fn from(v: DocumentClass) -> Self {
        ConfigValue::DocumentClass(v)
    }
}

// ─── Store ──────────────────────────────────────────────────────────────────

/// Host-owned mapping from configuration key to value.
#[derive(Debug, Clone, Default)]
pub struct ConfigStore {
    entries: BTreeMap<String, ConfigValue>,
}

impl ConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<ConfigValue>) {
        self.entries.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&ConfigValue> {
        self.entries.get(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<ConfigValue> {
        self.entries.remove(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Parse TOML content. Only top-level scalar keys are accepted.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        parse_toml("<inline>", content)
    }

    /// Load a TOML config file.
    pub fn load_file(path: &Path) -> Result<Self> {
        let display = path.display().to_string();
        let content = fs::read_to_string(path).map_err(|e| Error::ConfigFile {
            path: display.clone(),
            message: e.to_string(),
        })?;
        parse_toml(&display, &content)
    }

    /// Copy `{PREFIX}_*` environment variables into the store as strings.
    pub fn apply_env(&mut self, prefixes: &[String]) {
        self.apply_vars(prefixes, std::env::vars());
    }

    /// Copy every `{PREFIX}_*` pair from `vars` into the store.
    /// Later values overwrite earlier ones and anything already present.
    pub fn apply_vars<I, K, V>(&mut self, prefixes: &[String], vars: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        for (key, value) in vars {
            let key = key.into();
            let matched = prefixes.iter().any(|p| {
                key.strip_prefix(p.as_str())
                    .is_some_and(|rest| rest.len() > 1 && rest.starts_with('_'))
            });
            if matched {
                self.entries.insert(key, ConfigValue::String(value.into()));
            }
        }
    }
}

fn parse_toml(path: &str, content: &str) -> Result<ConfigStore> {
    let table: toml::Table = toml::from_str(content).map_err(|e| Error::ConfigFile {
        path: path.to_string(),
        message: e.to_string(),
    })?;

    let mut store = ConfigStore::new();
    for (key, value) in table {
        let value = match value {
            toml::Value::String(s) => ConfigValue::String(s),
            toml::Value::Integer(i) => ConfigValue::Integer(i),
            toml::Value::Float(f) => ConfigValue::Float(f),
            toml::Value::Boolean(b) => ConfigValue::Boolean(b),
            other => {
                return Err(Error::ConfigFile {
                    path: path.to_string(),
                    message: format!("key '{key}' must be a scalar, found {}", other.type_str()),
                });
            }
        };
        store.entries.insert(key, value);
    }
    Ok(store)
}

// ─── CLI ────────────────────────────────────────────────────────────────────

/// mongolink — resolve and open prefix-scoped MongoDB connections
#[derive(Parser, Debug)]
#[command(name = "mongolink", version, about)]
pub struct Cli {
    /// Config file path
    #[arg(long)]
    pub config: Option<String>,

    /// Connection prefix to bind (repeatable)
    #[arg(long = "prefix", short = 'p')]
    pub prefixes: Vec<String>,

    /// Host application name (fallback database name)
    #[arg(long)]
    pub app_name: Option<String>,

    /// Log level
    #[arg(long)]
    pub log_level: Option<String>,

    /// Ping each bound connection
    #[arg(long)]
    pub ping: bool,
}

/// Binary settings, resolved from defaults, env, and CLI flags.
#[derive(Debug, Clone)]
pub struct Settings {
    pub config_path: String,
    pub prefixes: Vec<String>,
    pub app_name: Option<String>,
    pub log_level: String,
    pub ping: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            config_path: "mongolink.toml".into(),
            prefixes: vec![DEFAULT_PREFIX.into()],
            app_name: None,
            log_level: "info".into(),
            ping: false,
        }
    }
}

impl Settings {
    /// Load settings: defaults → env vars → CLI flags.
    pub fn load() -> Self {
        Self::from_sources(Cli::parse(), |name| std::env::var(name).ok())
    }

    fn from_sources(cli: Cli, env: impl Fn(&str) -> Option<String>) -> Self {
        let mut settings = Settings::default();

        if let Some(v) = env("MONGOLINK_CONFIG") {
            settings.config_path = v;
        }
        if let Some(v) = env("MONGOLINK_APP_NAME") {
            settings.app_name = Some(v);
        }
        if let Some(v) = env("MONGOLINK_LOG_LEVEL") {
            settings.log_level = v;
        }

        if let Some(v) = cli.config {
            settings.config_path = v;
        }
        if !cli.prefixes.is_empty() {
            settings.prefixes = cli.prefixes;
        }
        if let Some(v) = cli.app_name {
            settings.app_name = Some(v);
        }
        if let Some(v) = cli.log_level {
            settings.log_level = v;
        }
        if cli.ping {
            settings.ping = true;
        }

        settings
    }
}

// ─── Tests ──────────────────────────────────────────────────────────────────
