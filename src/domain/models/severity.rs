//! Severity scale shared by direct and bridged records.
//!
//! Named levels carry fixed numbers (`TRACE` 5 through `CRITICAL` 50) so that
//! handler thresholds can compare named and purely numeric severities.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::domain::errors::SeverityError;

/// A named severity level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Level {
    Trace,
    Debug,
    Info,
    Success,
    Warning,
    Error,
    Critical,
}

impl Level {
    /// Every named level, lowest first.
    pub const ALL: [Self; 7] = [
        Self::Trace,
        Self::Debug,
        Self::Info,
        Self::Success,
        Self::Warning,
        Self::Error,
        Self::Critical,
    ];

    pub const fn no(self) -> u32 {
        match self {
            Self::Trace => 5,
            Self::Debug => 10,
            Self::Info => 20,
            Self::Success => 25,
            Self::Warning => 30,
            Self::Error => 40,
            Self::Critical => 50,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::Trace => "TRACE",
            Self::Debug => "DEBUG",
            Self::Info => "INFO",
            Self::Success => "SUCCESS",
            Self::Warning => "WARNING",
            Self::Error => "ERROR",
            Self::Critical => "CRITICAL",
        }
    }

    /// Case-insensitive lookup; `WARN` and `FATAL` are accepted aliases.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_uppercase().as_str() {
            "TRACE" => Some(Self::Trace),
            "DEBUG" => Some(Self::Debug),
            "INFO" => Some(Self::Info),
            "SUCCESS" => Some(Self::Success),
            "WARN" | "WARNING" => Some(Self::Warning),
            "ERROR" => Some(Self::Error),
            "CRITICAL" | "FATAL" => Some(Self::Critical),
            _ => None,
        }
    }

    pub fn from_no(no: u32) -> Option<Self> {
        Self::ALL.into_iter().find(|level| level.no() == no)
    }
}

/// Severity of a record or threshold of a handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Severity {
    Named(Level),
    /// A level with no name on the scale; the number is kept as-is.
    Numeric(u32),
}

impl Severity {
    pub const TRACE: Self = Self::Named(Level::Trace);
    pub const DEBUG: Self = Self::Named(Level::Debug);
    pub const INFO: Self = Self::Named(Level::Info);
    pub const SUCCESS: Self = Self::Named(Level::Success);
    pub const WARNING: Self = Self::Named(Level::Warning);
    pub const ERROR: Self = Self::Named(Level::Error);
    pub const CRITICAL: Self = Self::Named(Level::Critical);

    pub const fn no(self) -> u32 {
        match self {
            Self::Named(level) => level.no(),
            Self::Numeric(no) => no,
        }
    }

    pub const fn name(self) -> Option<&'static str> {
        match self {
            Self::Named(level) => Some(level.name()),
            Self::Numeric(_) => None,
        }
    }

    /// Named level when `no` is on the scale, numeric otherwise.
    pub fn from_number(no: u32) -> Self {
        Level::from_no(no).map_or(Self::Numeric(no), Self::Named)
    }

    /// Translate a foreign severity: by name first, by number when the name
    /// is not on the scale.
    pub fn translate(name: &str, no: u32) -> Self {
        Level::from_name(name).map_or_else(|| Self::from_number(no), Self::Named)
    }

    /// Translate a `log` crate level.
    pub fn from_legacy(level: log::Level) -> Self {
        Self::translate(level.as_str(), Self::legacy_number(level))
    }

    /// Numeric value of a `log` crate level on this scale.
    pub const fn legacy_number(level: log::Level) -> u32 {
        match level {
            log::Level::Error => 40,
            log::Level::Warn => 30,
            log::Level::Info => 20,
            log::Level::Debug => 10,
            log::Level::Trace => 5,
        }
    }

    pub fn from_tracing(level: &tracing::Level) -> Self {
        if *level == tracing::Level::ERROR {
            Self::ERROR
        } else if *level == tracing::Level::WARN {
            Self::WARNING
        } else if *level == tracing::Level::INFO {
            Self::INFO
        } else if *level == tracing::Level::DEBUG {
            Self::DEBUG
        } else {
            Self::TRACE
        }
    }

    /// Whether a record at this severity passes a `threshold`.
    pub const fn admits(self, threshold: Self) -> bool {
        self.no() >= threshold.no()
    }
}

impl Default for Severity {
    fn default() -> Self {
        Self::DEBUG
    }
}

impl From<Level> for Severity {
    fn from(level: Level) -> Self {
        Self::Named(level)
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Named(level) => f.pad(level.name()),
            Self::Numeric(no) => f.pad(&format!("Level {no}")),
        }
    }
}

impl FromStr for Severity {
    type Err = SeverityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if let Ok(no) = trimmed.parse::<u32>() {
            return Ok(Self::from_number(no));
        }
        Level::from_name(trimmed)
            .map(Self::Named)
            .ok_or_else(|| SeverityError::Unknown(s.to_string()))
    }
}

impl Serialize for Severity {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Named(level) => serializer.serialize_str(level.name()),
            Self::Numeric(no) => serializer.serialize_u32(*no),
        }
    }
}

impl<'de> Deserialize<'de> for Severity {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Number(u32),
            Name(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Number(no) => Ok(Self::from_number(no)),
            Raw::Name(name) => name.parse().map_err(serde::de::Error::custom),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_legacy_level_maps_to_a_named_level() {
        for level in [
            log::Level::Error,
            log::Level::Warn,
            log::Level::Info,
            log::Level::Debug,
            log::Level::Trace,
        ] {
            let severity = Severity::from_legacy(level);
            assert!(severity.name().is_some(), "{level} should map to a name");
        }
        assert_eq!(Severity::from_legacy(log::Level::Warn), Severity::WARNING);
    }

    #[test]
    fn test_translate_falls_back_to_number() {
        assert_eq!(Severity::translate("VERBOSE", 15), Severity::Numeric(15));
        assert_eq!(Severity::translate("VERBOSE", 40), Severity::ERROR);
        assert_eq!(Severity::translate("info", 99), Severity::INFO);
    }

    #[test]
    fn test_parse_names_and_numbers() {
        assert_eq!("warning".parse::<Severity>(), Ok(Severity::WARNING));
        assert_eq!("WARN".parse::<Severity>(), Ok(Severity::WARNING));
        assert_eq!("fatal".parse::<Severity>(), Ok(Severity::CRITICAL));
        assert_eq!("25".parse::<Severity>(), Ok(Severity::SUCCESS));
        assert_eq!("7".parse::<Severity>(), Ok(Severity::Numeric(7)));
        assert!("loud".parse::<Severity>().is_err());
    }

    #[test]
    fn test_admits_compares_numbers() {
        assert!(Severity::ERROR.admits(Severity::INFO));
        assert!(Severity::INFO.admits(Severity::INFO));
        assert!(!Severity::DEBUG.admits(Severity::INFO));
        assert!(Severity::Numeric(21).admits(Severity::INFO));
    }

    #[test]
    fn test_display_pads() {
        assert_eq!(format!("{:<8}|", Severity::INFO), "INFO    |");
        assert_eq!(Severity::Numeric(15).to_string(), "Level 15");
    }

    #[test]
    fn test_yaml_round_trip() {
        let levels: Vec<Severity> = serde_yaml::from_str("[INFO, 15, debug]").unwrap();
        assert_eq!(
            levels,
            vec![Severity::INFO, Severity::Numeric(15), Severity::DEBUG]
        );
        let yaml = serde_yaml::to_string(&levels).unwrap();
        assert!(yaml.contains("INFO"));
        assert!(yaml.contains("15"));
    }
}
