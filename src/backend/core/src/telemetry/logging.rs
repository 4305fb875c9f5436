//! `tracing` subscriber setup and credential masking.
//!
//! Logs go to stderr so CLI output on stdout stays machine-readable. Bearer
//! tokens reach log lines in two places (backend construction and guard
//! decisions); both pass through [`TokenRedactor`] first.

use regex::Regex;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::OnceLock;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

static REDACTOR: OnceLock<TokenRedactor> = OnceLock::new();

/// JWT compact serialization: three base64url segments, header starting `eyJ`.
const JWT_PATTERN: &str = r"eyJ[a-zA-Z0-9_-]+\.[a-zA-Z0-9_-]+\.[a-zA-Z0-9_-]+";
/// `Authorization` header value.
const BEARER_PATTERN: &str = r"(?i)bearer\s+[a-zA-Z0-9._~+/=-]+";

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// `EnvFilter` directive for everything not listed in `module_levels`
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub format: LogFormat,

    /// e.g. `rolesync_core::sync = "debug"`
    #[serde(default)]
    pub module_levels: HashMap<String, String>,

    /// Emit file and line of each event
    #[serde(default)]
    pub include_location: bool,

    #[serde(default = "default_true")]
    pub include_target: bool,

    #[serde(default)]
    pub redaction: RedactionConfig,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
            module_levels: HashMap::new(),
            include_location: false,
            include_target: true,
            redaction: RedactionConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Json,
    Pretty,
    Compact,
}

/// Which values never reach a log line in clear text.
#[derive(Debug, Clone, Deserialize)]
pub struct RedactionConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Field names masked outright (case-insensitive substring match)
    #[serde(default = "default_secret_fields")]
    pub secret_fields: Vec<String>,

    /// Extra regexes masked inside any value, on top of JWTs and bearer headers
    #[serde(default)]
    pub value_patterns: Vec<String>,

    #[serde(default = "default_mask")]
    pub mask: String,
}

impl Default for RedactionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            secret_fields: default_secret_fields(),
            value_patterns: Vec::new(),
            mask: default_mask(),
        }
    }
}

/// Masks auth tokens by field name and by value shape.
#[derive(Debug, Clone)]
pub struct TokenRedactor {
    secret_fields: Vec<String>,
    value_rules: Vec<Regex>,
    mask: String,
    enabled: bool,
}

impl TokenRedactor {
    /// Invalid entries in `value_patterns` are skipped with a warning.
    pub fn new(config: &RedactionConfig) -> Self {
        let value_rules = [JWT_PATTERN, BEARER_PATTERN]
            .into_iter()
            .chain(config.value_patterns.iter().map(String::as_str))
            .filter_map(|pattern| match Regex::new(pattern) {
                Ok(regex) => Some(regex),
                Err(e) => {
                    tracing::warn!(pattern, error = %e, "Ignoring invalid redaction pattern");
                    None
                }
            })
            .collect();

        Self {
            secret_fields: config.secret_fields.iter().map(|f| f.to_lowercase()).collect(),
            value_rules,
            mask: config.mask.clone(),
            enabled: config.enabled,
        }
    }

    pub fn is_secret_field(&self, field_name: &str) -> bool {
        let lower = field_name.to_lowercase();
        self.enabled && self.secret_fields.iter().any(|f| lower.contains(f))
    }

    /// Mask token-shaped substrings of `value`.
    pub fn redact_value(&self, value: &str) -> String {
        if !self.enabled {
            return value.to_string();
        }
        self.value_rules
            .iter()
            .fold(value.to_string(), |acc, rule| {
                rule.replace_all(&acc, self.mask.as_str()).into_owned()
            })
    }

    /// Mask `value` entirely if `field_name` is secret, else mask token shapes in it.
    pub fn redact(&self, field_name: &str, value: &str) -> String {
        if self.is_secret_field(field_name) {
            self.mask.clone()
        } else {
            self.redact_value(value)
        }
    }

    /// The redactor installed by [`init_logging`], or the default one.
    pub fn global() -> &'static TokenRedactor {
        REDACTOR.get_or_init(|| TokenRedactor::new(&RedactionConfig::default()))
    }
}

fn default_log_level() -> String {
    std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string())
}

fn default_true() -> bool {
    true
}

fn default_mask() -> String {
    "[REDACTED]".to_string()
}

fn default_secret_fields() -> Vec<String> {
    ["token", "authorization", "bearer", "jwt", "password", "secret"]
        .into_iter()
        .map(String::from)
        .collect()
}

/// Install the global subscriber, writing to stderr.
///
/// # Errors
///
/// Returns an error if a level directive is malformed or a global subscriber
/// is already installed.
pub fn init_logging(config: &LoggingConfig) -> anyhow::Result<()> {
    let _ = REDACTOR.set(TokenRedactor::new(&config.redaction));

    let mut filter = EnvFilter::try_new(&config.level)?;
    for (module, level) in &config.module_levels {
        filter = filter.add_directive(format!("{}={}", module, level).parse()?);
    }

    let layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_file(config.include_location)
        .with_line_number(config.include_location)
        .with_target(config.include_target);
    let layer = match config.format {
        LogFormat::Json => layer.json().boxed(),
        LogFormat::Pretty => layer.pretty().boxed(),
        LogFormat::Compact => layer.compact().boxed(),
    };

    tracing_subscriber::registry()
        .with(layer)
        .with(filter)
        .try_init()?;
    Ok(())
}
