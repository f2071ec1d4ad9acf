//! `${Key:Arg}` placeholder expansion
//!
//! Step text and table cells may embed tokens such as
//! `${Configuration:apiTimeout}`. Each token is replaced by the value its
//! resolver produces. Up to three `:`-separated arguments are accepted.

use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;

use crate::config::{ConfigKey, ConfigurationManager};
use crate::error::{Error, Result};

static PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$\{(.*?)\}").expect("placeholder pattern is valid"));

/// Expands placeholders using the process configuration
#[derive(Debug, Clone, Copy)]
pub struct ValueResolver<'a> {
    config: &'a ConfigurationManager,
}

impl<'a> ValueResolver<'a> {
    pub fn new(config: &'a ConfigurationManager) -> Self {
        Self { config }
    }

    /// Replace every placeholder in `text`. `None` stays `None`.
    pub fn resolve(&self, text: Option<&str>) -> Result<Option<String>> {
        text.map(|t| self.resolve_str(t)).transpose()
    }

    pub fn resolve_str(&self, text: &str) -> Result<String> {
        let mut resolved = text.to_string();

        for captures in PLACEHOLDER.captures_iter(text) {
            let token = &captures[0];
            let value = self.resolve_token(&captures[1])?;
            tracing::trace!("Resolved {} to {}", token, value);
            resolved = resolved.replace(token, &value);
        }

        Ok(resolved)
    }

    fn resolve_token(&self, body: &str) -> Result<String> {
        let parts: Vec<&str> = body.split(':').collect();
        let (key, args) = match parts.as_slice() {
            [key, args @ ..] if (1..=3).contains(&args.len()) => (*key, args),
            _ => return Err(Error::MalformedPlaceholder(format!("${{{}}}", body))),
        };

        match key {
            "Configuration" => self.configuration(args[0]),
            other => Err(Error::UnknownResolver(other.to_string())),
        }
    }

    /// Process configuration first, then the environment file.
    fn configuration(&self, name: &str) -> Result<String> {
        let key = ConfigKey::from_name(name)
            .ok_or_else(|| Error::UnresolvableReference(name.to_string()))?;

        if let Some(value) = self.config.configuration().string(key) {
            return Ok(value);
        }

        self.config
            .environment()?
            .string(key)
            .ok_or_else(|| Error::UnresolvableReference(name.to_string()))
    }
}

/// A step argument after placeholder expansion, with the text it came from
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ResolvedString {
    pub value: String,
    pub expression: String,
}

impl ResolvedString {
    /// Strip one pair of surrounding double quotes, then expand
    /// placeholders. Quotes inside the cell are kept.
    pub fn resolve(resolver: &ValueResolver<'_>, raw: &str) -> Result<Self> {
        let expression = unquote(raw).to_string();
        let value = resolver.resolve_str(&expression)?;
        Ok(Self { value, expression })
    }
}

/// `"text"` becomes `text`; anything else is returned as is.
pub fn unquote(raw: &str) -> &str {
    raw.strip_prefix('"')
        .and_then(|inner| inner.strip_suffix('"'))
        .unwrap_or(raw)
}

impl fmt::Display for ResolvedString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)
    }
}
