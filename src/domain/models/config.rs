use std::collections::BTreeSet;
use std::fmt;

use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

use super::severity::Severity;

/// Main logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LoggingConfig {
    /// Sensitive data masking
    #[serde(default)]
    pub masking: MaskingConfig,

    /// Levels applied to third-party `log` targets
    #[serde(default, alias = "propogate")]
    pub propagate: PropagateConfig,

    /// Output handlers, in emission order
    #[serde(default = "default_handlers")]
    pub handlers: Vec<HandlerConfig>,

    /// Process-wide default context
    #[serde(default = "default_extra")]
    pub extra: Map<String, Value>,

    /// Per-module enable/disable overrides, as `[name, enabled]` pairs
    #[serde(default = "default_activation")]
    pub activation: Vec<(String, bool)>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            masking: MaskingConfig::default(),
            propagate: PropagateConfig::default(),
            handlers: default_handlers(),
            extra: default_extra(),
            activation: default_activation(),
        }
    }
}

fn default_handlers() -> Vec<HandlerConfig> {
    vec![HandlerConfig::default()]
}

fn default_extra() -> Map<String, Value> {
    let mut extra = Map::new();
    extra.insert("env".to_string(), Value::from("override me please"));
    extra
}

fn default_activation() -> Vec<(String, bool)> {
    vec![
        ("hyper::proto".to_string(), false),
        ("h2::codec".to_string(), false),
        ("notify".to_string(), false),
    ]
}

/// Masking configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct MaskingConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Apply the regex rules to the message text
    #[serde(default = "default_true")]
    pub mask_message: bool,

    /// Apply field and regex masking to bound fields
    #[serde(default = "default_true")]
    pub mask_extra: bool,

    /// Replacement token
    #[serde(default = "default_mask")]
    pub default_mask: String,

    /// Named patterns, applied in document order
    #[serde(default = "default_mask_regex")]
    pub mask_regex: MaskPatterns,

    /// Field names whose values are replaced wholesale
    #[serde(default = "default_mask_fields")]
    pub mask_fields: BTreeSet<String>,
}

impl Default for MaskingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            mask_message: true,
            mask_extra: true,
            default_mask: default_mask(),
            mask_regex: default_mask_regex(),
            mask_fields: default_mask_fields(),
        }
    }
}

fn default_mask() -> String {
    "XXXXXXXX".to_string()
}

fn default_mask_regex() -> MaskPatterns {
    [
        (
            "credit_card",
            r"\b\d{4}[\s-]?\d{4}[\s-]?\d{4}[\s-]?\d{4}\b",
        ),
        ("email", r"\b[\w.-]+@[\w.-]+\.\w+\b"),
        ("password", r"(?i)password\s*:\s*\S+"),
        ("token", r"(?i)token\s*:\s*\S+"),
    ]
    .into_iter()
    .collect()
}

fn default_mask_fields() -> BTreeSet<String> {
    ["password", "token", "secret", "card"]
        .into_iter()
        .map(str::to_string)
        .collect()
}

const fn default_true() -> bool {
    true
}

/// Ordered `name -> pattern` map.
///
/// Rule application order is the order the names appear in the config
/// document, so overlapping patterns redact the same way on every run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MaskPatterns(Vec<(String, String)>);

impl MaskPatterns {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a rule. A replaced rule keeps its position.
    pub fn insert(&mut self, name: impl Into<String>, pattern: impl Into<String>) {
        let name = name.into();
        let pattern = pattern.into();
        match self.0.iter_mut().find(|(existing, _)| *existing == name) {
            Some(slot) => slot.1 = pattern,
            None => self.0.push((name, pattern)),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(name, pattern)| (name.as_str(), pattern.as_str()))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(name, _)| name.as_str())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<N: Into<String>, P: Into<String>> FromIterator<(N, P)> for MaskPatterns {
    fn from_iter<I: IntoIterator<Item = (N, P)>>(iter: I) -> Self {
        let mut patterns = Self::new();
        for (name, pattern) in iter {
            patterns.insert(name, pattern);
        }
        patterns
    }
}

impl Serialize for MaskPatterns {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(self.iter())
    }
}

impl<'de> Deserialize<'de> for MaskPatterns {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct PatternsVisitor;

        impl<'de> Visitor<'de> for PatternsVisitor {
            type Value = MaskPatterns;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of rule names to regex patterns")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
                let mut patterns = MaskPatterns::new();
                while let Some((name, pattern)) = map.next_entry::<String, String>()? {
                    patterns.insert(name, pattern);
                }
                Ok(patterns)
            }

            fn visit_unit<E: serde::de::Error>(self) -> Result<Self::Value, E> {
                Ok(MaskPatterns::new())
            }
        }

        deserializer.deserialize_map(PatternsVisitor)
    }
}

/// Propagation of third-party `log` targets
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct PropagateConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Minimum severity forwarded for the listed targets; `None` forwards all
    #[serde(default = "default_level_to_pass")]
    pub level_to_pass: Option<Severity>,

    /// Target names (and their children) the level applies to
    #[serde(default = "default_loggers_name")]
    pub loggers_name: Vec<String>,
}

impl Default for PropagateConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            level_to_pass: default_level_to_pass(),
            loggers_name: default_loggers_name(),
        }
    }
}

#[allow(clippy::unnecessary_wraps)]
const fn default_level_to_pass() -> Option<Severity> {
    Some(Severity::INFO)
}

fn default_loggers_name() -> Vec<String> {
    ["hyper", "hyper_util", "h2", "reqwest", "rustls", "tower", "mio"]
        .into_iter()
        .map(str::to_string)
        .collect()
}

/// One output sink
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct HandlerConfig {
    /// Sink target, resolved through the sink registry
    #[serde(default = "default_sink")]
    pub sink: String,

    #[serde(default)]
    pub level: Severity,

    /// Format template
    #[serde(default = "default_format")]
    pub format: String,

    /// Hand records to a background writer instead of writing inline
    #[serde(default = "default_true")]
    pub enqueue: bool,

    /// Append the error's debug representation to exceptions
    #[serde(default = "default_true")]
    pub diagnose: bool,

    /// Append the error's source chain to exceptions
    #[serde(default = "default_true")]
    pub backtrace: bool,

    /// ANSI styling; unset means "when the sink is a terminal"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub colorize: Option<bool>,
}

impl Default for HandlerConfig {
    fn default() -> Self {
        Self {
            sink: default_sink(),
            level: Severity::DEBUG,
            format: default_format(),
            enqueue: true,
            diagnose: true,
            backtrace: true,
            colorize: None,
        }
    }
}

fn default_sink() -> String {
    "ext://sys.stdout".to_string()
}

/// Default handler template.
pub const DEFAULT_FORMAT: &str = "<level>{level: <8}</level>| <magenta>{name}</magenta>:<bold>{function}</bold>:<magenta>{line}</magenta> | <level>{message}</level> | <dim>{extra}</dim>";

fn default_format() -> String {
    DEFAULT_FORMAT.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = LoggingConfig::default();
        assert!(config.masking.enabled);
        assert_eq!(config.masking.default_mask, "XXXXXXXX");
        assert_eq!(
            config.masking.mask_regex.names().collect::<Vec<_>>(),
            vec!["credit_card", "email", "password", "token"]
        );
        assert!(config.masking.mask_fields.contains("secret"));
        assert!(config.propagate.enabled);
        assert_eq!(config.propagate.level_to_pass, Some(Severity::INFO));
        assert_eq!(config.handlers.len(), 1);
        assert_eq!(config.handlers[0].sink, "ext://sys.stdout");
        assert_eq!(config.handlers[0].level, Severity::DEBUG);
        assert!(config.handlers[0].enqueue);
    }

    #[test]
    fn test_yaml_parsing() {
        let yaml = r#"
masking:
  default_mask: "***"
  mask_regex:
    zeta: "z+"
    alpha: "a+"
  mask_fields: [api_key]
propogate:
  level_to_pass: WARNING
  loggers_name: [sqlx]
handlers:
  - sink: ext://sys.stderr
    level: 15
    enqueue: false
activation:
  - [noisy, false]
extra:
  service: billing
"#;

        let config: LoggingConfig = serde_yaml::from_str(yaml).expect("YAML should parse");

        assert_eq!(config.masking.default_mask, "***");
        assert!(config.masking.mask_message, "unset toggles keep defaults");
        assert_eq!(
            config.masking.mask_regex.names().collect::<Vec<_>>(),
            vec!["zeta", "alpha"],
            "document order is rule order"
        );
        assert_eq!(config.propagate.level_to_pass, Some(Severity::WARNING));
        assert_eq!(config.propagate.loggers_name, vec!["sqlx".to_string()]);
        assert_eq!(config.handlers[0].level, Severity::Numeric(15));
        assert!(!config.handlers[0].enqueue);
        assert_eq!(config.handlers[0].format, DEFAULT_FORMAT);
        assert_eq!(config.activation, vec![("noisy".to_string(), false)]);
        assert_eq!(config.extra["service"], "billing");
    }

    #[test]
    fn test_empty_handler_list_is_kept() {
        let config: LoggingConfig = serde_yaml::from_str("handlers: []").unwrap();
        assert!(config.handlers.is_empty());
    }

    #[test]
    fn test_mask_patterns_insert_keeps_position() {
        let mut patterns: MaskPatterns = [("a", "1"), ("b", "2")].into_iter().collect();
        patterns.insert("a", "3");
        assert_eq!(patterns.iter().collect::<Vec<_>>(), vec![("a", "3"), ("b", "2")]);
    }
}
