//! Layered configuration
//!
//! Values are looked up in this order, first hit wins:
//!
//! 1. OS environment variable (the key uppercased when `AGENT_OS=Linux`)
//! 2. process properties supplied by the harness
//! 3. the properties file (with its `.secrets` sibling overlaid)
//!
//! The base file is `configuration.properties`; the environment file
//! `<environment>.env.properties` is only read the first time it is asked for.

use once_cell::sync::OnceCell;
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::{Error, Result};

const BASE_FILE: &str = "configuration.properties";

/// Known configuration properties
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConfigKey {
    ApiBaseUrl,
    ApiKey,
    ApiTimeout,
    ApiRetryLoopTimeout,
    ApiClient,
    Environment,
    LogToFileOnFailure,
    LogToFileAlways,
    MinimumLogLevelConsole,
    MinimumLogLevelFile,
}

impl ConfigKey {
    pub const ALL: [ConfigKey; 10] = [
        ConfigKey::ApiBaseUrl,
        ConfigKey::ApiKey,
        ConfigKey::ApiTimeout,
        ConfigKey::ApiRetryLoopTimeout,
        ConfigKey::ApiClient,
        ConfigKey::Environment,
        ConfigKey::LogToFileOnFailure,
        ConfigKey::LogToFileAlways,
        ConfigKey::MinimumLogLevelConsole,
        ConfigKey::MinimumLogLevelFile,
    ];

    /// Property name as written in the properties files
    pub fn property(&self) -> &'static str {
        match self {
            ConfigKey::ApiBaseUrl => "apiBaseURL",
            ConfigKey::ApiKey => "apiKey",
            ConfigKey::ApiTimeout => "apiTimeout",
            ConfigKey::ApiRetryLoopTimeout => "apiRetryLoopTimeout",
            ConfigKey::ApiClient => "apiClient",
            ConfigKey::Environment => "environment",
            ConfigKey::LogToFileOnFailure => "logToFileOnFailure",
            ConfigKey::LogToFileAlways => "logToFileAlways",
            ConfigKey::MinimumLogLevelConsole => "minimumLogLevelConsole",
            ConfigKey::MinimumLogLevelFile => "minimumLogLevelFile",
        }
    }

    /// Case-insensitive lookup by property name (`apiTimeout`) or constant
    /// style name (`API_TIMEOUT`).
    pub fn from_name(name: &str) -> Option<Self> {
        let wanted = normalize(name);
        Self::ALL
            .into_iter()
            .find(|key| normalize(key.property()) == wanted)
    }
}

impl fmt::Display for ConfigKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.property())
    }
}

fn normalize(name: &str) -> String {
    name.chars()
        .filter(|c| *c != '_')
        .flat_map(char::to_lowercase)
        .collect()
}

/// One properties file, with its `.secrets` sibling already merged in
#[derive(Debug, Clone, Default)]
pub struct PropertyFile {
    path: PathBuf,
    values: HashMap<String, String>,
}

impl PropertyFile {
    /// Load `path`, then overlay `<stem>.secrets` if it exists.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Configuration(format!(
                "There was an error loading the property file at path: {}: {}",
                path.display(),
                e
            ))
        })?;
        let mut values = parse_properties(&content);

        let secrets = path.with_extension("secrets");
        if secrets.exists() {
            let content = std::fs::read_to_string(&secrets).map_err(|e| {
                Error::Configuration(format!(
                    "There was an error loading the property file at path: {}: {}",
                    secrets.display(),
                    e
                ))
            })?;
            values.extend(parse_properties(&content));
        }

        Ok(Self {
            path: path.to_path_buf(),
            values,
        })
    }

    /// Build from in-memory pairs (no file behind it)
    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            path: PathBuf::new(),
            values: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }
}

/// Parse the Java properties line format.
///
/// Keys end at the first unescaped `=`, `:` or whitespace. A line ending in
/// an odd number of backslashes continues on the next line, whose leading
/// whitespace is dropped. `\t`, `\n`, `\r`, `\f` and `\uXXXX` are
/// unescaped, any other `\x` becomes `x`. Trailing whitespace is trimmed
/// from values.
pub fn parse_properties(content: &str) -> HashMap<String, String> {
    let mut values = HashMap::new();

    for line in logical_lines(content) {
        let (key, value) = split_entry(&line);
        if key.is_empty() {
            continue;
        }
        values.insert(unescape(key), unescape(value).trim_end().to_string());
    }

    values
}

/// Join continuation lines and drop blanks and comments.
fn logical_lines(content: &str) -> Vec<String> {
    let mut lines = Vec::new();
    let mut pending: Option<String> = None;

    for physical in content.lines() {
        let trimmed = physical.trim_start();
        let line = match pending.take() {
            Some(mut joined) => {
                joined.push_str(trimmed);
                joined
            }
            None => {
                if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with('!') {
                    continue;
                }
                trimmed.to_string()
            }
        };

        let trailing = line.chars().rev().take_while(|c| *c == '\\').count();
        if trailing % 2 == 1 {
            pending = Some(line[..line.len() - 1].to_string());
        } else {
            lines.push(line);
        }
    }
    lines.extend(pending);
    lines
}

fn split_entry(line: &str) -> (&str, &str) {
    let mut escaped = false;
    let mut key_end = line.len();
    for (idx, c) in line.char_indices() {
        if escaped {
            escaped = false;
        } else if c == '\\' {
            escaped = true;
        } else if c == '=' || c == ':' || c.is_whitespace() {
            key_end = idx;
            break;
        }
    }

    let rest = line[key_end..].trim_start();
    let rest = rest
        .strip_prefix(['=', ':'])
        .map(str::trim_start)
        .unwrap_or(rest);
    (&line[..key_end], rest)
}

fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('t') => out.push('\t'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('f') => out.push('\u{c}'),
            Some('u') => {
                let hex: String = chars.clone().take(4).collect();
                let decoded = (hex.len() == 4 && hex.chars().all(|c| c.is_ascii_hexdigit()))
                    .then(|| u32::from_str_radix(&hex, 16).ok())
                    .flatten()
                    .and_then(char::from_u32);
                match decoded {
                    Some(decoded) => {
                        out.push(decoded);
                        chars.nth(3);
                    }
                    _ => out.push('u'),
                }
            }
            Some(other) => out.push(other),
            None => {}
        }
    }
    out
}

type EnvLookup = Arc<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Process-wide configuration, built once by the harness and shared read-only.
pub struct ConfigurationManager {
    config_dir: PathBuf,
    configuration: PropertyFile,
    environment: OnceCell<PropertyFile>,
    properties: HashMap<String, String>,
    env_lookup: EnvLookup,
}

impl fmt::Debug for ConfigurationManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigurationManager")
            .field("config_dir", &self.config_dir)
            .field("environment_loaded", &self.environment.get().is_some())
            .field("properties", &self.properties.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl ConfigurationManager {
    /// Load `<config_dir>/configuration.properties`.
    pub fn load(config_dir: impl Into<PathBuf>) -> Result<Self> {
        let config_dir = config_dir.into();
        let configuration = PropertyFile::load(&config_dir.join(BASE_FILE))?;
        Ok(Self::from_parts(config_dir, configuration))
    }

    /// Build from an already loaded base file. The environment file is still
    /// looked up under `config_dir` on first use.
    pub fn from_parts(config_dir: impl Into<PathBuf>, configuration: PropertyFile) -> Self {
        Self {
            config_dir: config_dir.into(),
            configuration,
            environment: OnceCell::new(),
            properties: HashMap::new(),
            env_lookup: Arc::new(|name| std::env::var(name).ok()),
        }
    }

    /// Set a process property. These beat both files but lose to the OS
    /// environment.
    pub fn with_property(mut self, key: ConfigKey, value: impl Into<String>) -> Self {
        self.properties.insert(key.property().to_string(), value.into());
        self
    }

    /// Replace the OS environment source (tests use a fixed map).
    pub fn with_env_lookup<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String> + Send + Sync + 'static,
    {
        self.env_lookup = Arc::new(lookup);
        self
    }

    /// Provide the environment overlay directly instead of reading it from disk.
    pub fn with_environment_file(self, file: PropertyFile) -> Self {
        // Fresh cell, so this cannot already be set.
        let _ = self.environment.set(file);
        self
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    /// Settings from `configuration.properties`
    pub fn configuration(&self) -> PropertyHandler<'_> {
        PropertyHandler {
            file: &self.configuration,
            manager: self,
        }
    }

    /// Settings from `<environment>.env.properties`, loaded on first call
    pub fn environment(&self) -> Result<PropertyHandler<'_>> {
        let file = self.environment.get_or_try_init(|| {
            let name = self.configuration().required_string(ConfigKey::Environment)?;
            let path = self.config_dir.join(format!("{name}.env.properties"));
            tracing::debug!("Loading environment properties from {}", path.display());
            PropertyFile::load(&path)
        })?;

        Ok(PropertyHandler {
            file,
            manager: self,
        })
    }

    fn env_name(&self, property: &str) -> String {
        match (self.env_lookup)("AGENT_OS").as_deref() {
            Some("Linux") => property.to_uppercase(),
            _ => property.to_string(),
        }
    }

    fn lookup(&self, file: &PropertyFile, key: ConfigKey) -> Option<String> {
        let property = key.property();
        (self.env_lookup)(&self.env_name(property))
            .or_else(|| self.properties.get(property).cloned())
            .or_else(|| file.get(property).map(str::to_string))
    }
}

/// Typed accessors over one properties file plus the override layers
#[derive(Clone, Copy)]
pub struct PropertyHandler<'a> {
    file: &'a PropertyFile,
    manager: &'a ConfigurationManager,
}

impl<'a> PropertyHandler<'a> {
    pub fn string(&self, key: ConfigKey) -> Option<String> {
        self.manager.lookup(self.file, key)
    }

    pub fn string_or(&self, key: ConfigKey, default: &str) -> String {
        self.string(key).unwrap_or_else(|| default.to_string())
    }

    pub fn required_string(&self, key: ConfigKey) -> Result<String> {
        self.string(key)
            .ok_or_else(|| Error::MissingProperty(key.property().to_string()))
    }

    /// `true` only for a case-insensitive "true", like `Boolean.parseBoolean`
    pub fn flag(&self, key: ConfigKey) -> Option<bool> {
        self.string(key).map(|v| v.trim().eq_ignore_ascii_case("true"))
    }

    pub fn flag_or(&self, key: ConfigKey, default: bool) -> bool {
        self.flag(key).unwrap_or(default)
    }

    pub fn integer(&self, key: ConfigKey) -> Result<Option<i64>> {
        self.string(key)
            .map(|v| parse_integer(key, &v))
            .transpose()
    }

    pub fn required_integer(&self, key: ConfigKey) -> Result<i64> {
        let value = self.required_string(key)?;
        parse_integer(key, &value)
    }

    pub fn source(&self) -> &'a Path {
        self.file.path()
    }
}

fn parse_integer(key: ConfigKey, value: &str) -> Result<i64> {
    value.trim().parse().map_err(|_| {
        Error::Configuration(format!("{} must be an integer but was `{}`", key, value))
    })
}
