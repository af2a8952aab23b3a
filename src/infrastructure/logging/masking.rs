use std::collections::BTreeSet;
use std::fmt;

use regex::{NoExpand, Regex};
use serde_json::{Map, Value};

use crate::domain::errors::MaskRuleError;
use crate::domain::models::{LogRecord, MaskPatterns, MaskingConfig};

/// Nesting depth past which a field object is replaced wholesale.
pub const MAX_MASK_DEPTH: usize = 32;

/// Compiled masking rules, in application order
#[derive(Clone, Default)]
pub struct MaskRules {
    rules: Vec<(String, Regex)>,
}

impl MaskRules {
    /// Compile every pattern, skipping the ones that do not compile
    ///
    /// The skipped rules are returned so the caller can report them; they do
    /// not prevent the remaining rules from being used.
    pub fn compile(patterns: &MaskPatterns) -> (Self, Vec<MaskRuleError>) {
        let mut rules = Vec::with_capacity(patterns.len());
        let mut errors = Vec::new();

        for (name, pattern) in patterns.iter() {
            match Regex::new(pattern) {
                Ok(regex) => rules.push((name.to_string(), regex)),
                Err(source) => errors.push(MaskRuleError {
                    name: name.to_string(),
                    source,
                }),
            }
        }

        (Self { rules }, errors)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    fn regexes(&self) -> impl Iterator<Item = &Regex> {
        self.rules.iter().map(|(_, regex)| regex)
    }
}

impl fmt::Debug for MaskRules {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.rules.iter().map(|(name, _)| name))
            .finish()
    }
}

/// Replace every rule match in `message` with `token`
///
/// Rules run in order, each on the output of the previous one.
pub fn mask_message(message: &str, rules: &MaskRules, token: &str) -> String {
    rules.regexes().fold(message.to_string(), |text, regex| {
        regex.replace_all(&text, NoExpand(token)).into_owned()
    })
}

/// Mask a field map, consuming it
///
/// Keys in `mask_fields` get `token` whatever their value; nested objects
/// are masked recursively with the same rules; strings get every rule in
/// order. Other values are left alone.
pub fn mask_extra(
    mut fields: Map<String, Value>,
    mask_fields: &BTreeSet<String>,
    rules: &MaskRules,
    token: &str,
) -> Map<String, Value> {
    mask_object(&mut fields, mask_fields, rules, token, 0);
    fields
}

fn mask_object(
    fields: &mut Map<String, Value>,
    mask_fields: &BTreeSet<String>,
    rules: &MaskRules,
    token: &str,
    depth: usize,
) {
    for (key, value) in fields.iter_mut() {
        if mask_fields.contains(key) {
            *value = Value::String(token.to_string());
            continue;
        }

        let too_deep = value.is_object() && depth + 1 >= MAX_MASK_DEPTH;
        if too_deep {
            *value = Value::String(token.to_string());
            continue;
        }

        match value {
            Value::Object(nested) => mask_object(nested, mask_fields, rules, token, depth + 1),
            Value::String(text) => *text = mask_message(text, rules, token),
            _ => {}
        }
    }
}

/// Apply the masking configuration to one record
pub fn apply_masking(record: &mut LogRecord, config: &MaskingConfig, rules: &MaskRules) {
    if !config.enabled {
        return;
    }

    if config.mask_message {
        record.message = mask_message(&record.message, rules, &config.default_mask);
        if let Some(exception) = record.exception.as_mut() {
            exception.message = mask_message(&exception.message, rules, &config.default_mask);
            for cause in &mut exception.chain {
                *cause = mask_message(cause, rules, &config.default_mask);
            }
            if let Some(debug) = exception.debug.as_mut() {
                *debug = mask_message(debug, rules, &config.default_mask);
            }
        }
    }

    if config.mask_extra {
        let fields = std::mem::take(&mut record.extra);
        record.extra = mask_extra(fields, &config.mask_fields, rules, &config.default_mask);
    }
}

/// Masking configuration bundled with its compiled rules
#[derive(Debug, Clone)]
pub struct Masker {
    config: MaskingConfig,
    rules: MaskRules,
}

impl Masker {
    pub fn new(config: MaskingConfig) -> (Self, Vec<MaskRuleError>) {
        let (rules, errors) = MaskRules::compile(&config.mask_regex);
        (Self { config, rules }, errors)
    }

    pub fn apply(&self, record: &mut LogRecord) {
        apply_masking(record, &self.config, &self.rules);
    }

    pub fn mask_message(&self, message: &str) -> String {
        mask_message(message, &self.rules, &self.config.default_mask)
    }

    pub const fn config(&self) -> &MaskingConfig {
        &self.config
    }

    pub const fn rules(&self) -> &MaskRules {
        &self.rules
    }
}
