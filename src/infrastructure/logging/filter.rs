use crate::domain::models::{PropagateConfig, Severity};

/// Split a logger name into segments; `::` and `.` both separate
fn segments(name: &str) -> Vec<&str> {
    name.split("::")
        .flat_map(|part| part.split('.'))
        .filter(|segment| !segment.is_empty())
        .collect()
}

fn is_prefix(prefix: &[String], name: &[&str]) -> bool {
    prefix.len() <= name.len() && prefix.iter().zip(name).all(|(a, b)| a == b)
}

fn owned_segments(name: &str) -> Vec<String> {
    segments(name).into_iter().map(str::to_string).collect()
}

/// Per-module enable/disable overrides
///
/// The most specific matching entry wins; among equally specific entries the
/// later one wins. Names without a matching entry are enabled.
#[derive(Debug, Clone, Default)]
pub struct Activation {
    rules: Vec<(Vec<String>, bool)>,
}

impl Activation {
    pub fn new(rules: &[(String, bool)]) -> Self {
        Self {
            rules: rules
                .iter()
                .map(|(name, enabled)| (owned_segments(name), *enabled))
                .collect(),
        }
    }

    pub fn is_enabled(&self, name: &str) -> bool {
        let name = segments(name);
        let mut best: Option<(usize, bool)> = None;

        for (prefix, enabled) in &self.rules {
            if !is_prefix(prefix, &name) {
                continue;
            }
            if best.map_or(true, |(len, _)| prefix.len() >= len) {
                best = Some((prefix.len(), *enabled));
            }
        }

        best.map_or(true, |(_, enabled)| enabled)
    }
}

/// Severity floor for third-party `log` targets
#[derive(Debug, Clone, Default)]
pub struct Propagation {
    level: Option<Severity>,
    targets: Vec<Vec<String>>,
}

impl Propagation {
    pub fn new(config: &PropagateConfig) -> Self {
        if !config.enabled {
            return Self::default();
        }
        Self {
            level: config.level_to_pass,
            targets: config
                .loggers_name
                .iter()
                .map(String::as_str)
                .map(owned_segments)
                .collect(),
        }
    }

    /// Whether a record from `target` at `severity` is forwarded
    pub fn admits(&self, target: &str, severity: Severity) -> bool {
        let Some(level) = self.level else {
            return true;
        };
        let target = segments(target);
        let listed = self.targets.iter().any(|prefix| is_prefix(prefix, &target));
        !listed || severity.admits(level)
    }
}
