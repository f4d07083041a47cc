//! Settings
//!
//! YAML-backed settings for the caches and the user service. Every field has
//! a default, so an empty document (or no file at all) is a valid
//! configuration.
//!
//! ```yaml
//! leaderboard:
//!   query_limit: 30
//!   cache_expire_after: 10m
//!   query_timeout: 3s
//! identity:
//!   expire_after_write: 12h
//!   expire_after_access: 2h
//!   sweep_interval: 1m
//! service:
//!   repository_timeout: 2s
//! ```
//!
//! Durations use Go-style strings (`90s`, `10m`, `1h30m`, `2d`). A bare
//! number is read as seconds.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::cache::IdentityCacheConfig;
use crate::error::{Error, Result};
use crate::leaderboard::LeaderboardConfig;
use crate::service::ServiceConfig;

// =============================================================================
// Settings
// =============================================================================

/// Top-level settings document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub leaderboard: LeaderboardConfig,
    pub identity: IdentityCacheConfig,
    pub service: ServiceConfig,
}

impl Settings {
    /// Parse and validate settings from a YAML string
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let settings: Settings = if yaml.trim().is_empty() {
            Settings::default()
        } else {
            serde_yaml::from_str(yaml)?
        };
        settings.validate()?;
        Ok(settings)
    }

    /// Load settings from a YAML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        debug!("Loading settings from {}", path.display());

        let yaml = std::fs::read_to_string(path)?;
        let settings = Self::from_yaml_str(&yaml)?;

        info!(
            query_limit = settings.leaderboard.query_limit,
            cache_expire_after = %format_duration(settings.leaderboard.cache_expire_after),
            query_timeout = %format_duration(settings.leaderboard.query_timeout),
            "Loaded settings from {}",
            path.display()
        );
        Ok(settings)
    }

    /// Render as YAML
    pub fn to_yaml_string(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Check cross-field constraints
    pub fn validate(&self) -> Result<()> {
        self.leaderboard.validate()?;
        self.identity.validate()?;
        self.service.validate()
    }
}

// =============================================================================
// Duration Parsing
// =============================================================================

/// Parse a Go-style duration string (e.g., "1h", "30m", "1h30m", "0").
///
/// Zero is accepted; callers that need a positive bound check for it.
pub fn parse_duration(s: &str) -> Result<Duration> {
    let s = s.trim();
    if s.is_empty() {
        return Err(Error::DurationParse("empty duration string".to_string()));
    }

    let mut total_secs: u64 = 0;
    let mut num_buf = String::new();

    for c in s.chars() {
        if c.is_ascii_digit() {
            num_buf.push(c);
        } else {
            let num: u64 = num_buf
                .parse()
                .map_err(|_| Error::DurationParse(format!("invalid number in duration: {}", s)))?;
            num_buf.clear();

            let multiplier = match c {
                'd' | 'D' => 86_400,
                'h' | 'H' => 3_600,
                'm' | 'M' => 60,
                's' | 'S' => 1,
                _ => {
                    return Err(Error::DurationParse(format!(
                        "unknown duration unit: {}",
                        c
                    )))
                }
            };

            total_secs = num
                .checked_mul(multiplier)
                .and_then(|secs| total_secs.checked_add(secs))
                .ok_or_else(|| Error::DurationParse(format!("duration overflows: {}", s)))?;
        }
    }

    // Trailing number without unit is seconds
    if !num_buf.is_empty() {
        let num: u64 = num_buf
            .parse()
            .map_err(|_| Error::DurationParse(format!("invalid number in duration: {}", s)))?;
        total_secs = total_secs
            .checked_add(num)
            .ok_or_else(|| Error::DurationParse(format!("duration overflows: {}", s)))?;
    }

    Ok(Duration::from_secs(total_secs))
}

/// Format a duration in the same Go-style notation `parse_duration` reads.
pub fn format_duration(duration: Duration) -> String {
    let mut secs = duration.as_secs();
    if secs == 0 {
        return "0s".to_string();
    }

    let mut out = String::new();
    for (unit, size) in [("d", 86_400), ("h", 3_600), ("m", 60), ("s", 1)] {
        if secs >= size {
            out.push_str(&format!("{}{}", secs / size, unit));
            secs %= size;
        }
    }
    out
}

/// Serde adapter storing a `Duration` as a Go-style string.
pub(crate) mod duration_str {
    use std::time::Duration;

    use serde::de::{self, Deserializer, Visitor};
    use serde::Serializer;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::format_duration(*duration))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        struct DurationVisitor;

        impl<'de> Visitor<'de> for DurationVisitor {
            type Value = Duration;

            fn expecting(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str("a duration such as \"30s\", \"10m\" or a number of seconds")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Duration, E> {
                super::parse_duration(v).map_err(E::custom)
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Duration, E> {
                Ok(Duration::from_secs(v))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<Duration, E> {
                // Negative means "disabled", same as zero
                Ok(Duration::from_secs(u64::try_from(v).unwrap_or(0)))
            }
        }

        deserializer.deserialize_any(DurationVisitor)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn test_parse_duration_units() {
        assert_eq!(parse_duration("1h").unwrap(), Duration::from_secs(3600));
        assert_eq!(parse_duration("30m").unwrap(), Duration::from_secs(1800));
        assert_eq!(parse_duration("45s").unwrap(), Duration::from_secs(45));
        assert_eq!(parse_duration("2d").unwrap(), Duration::from_secs(172_800));
        assert_eq!(parse_duration("1H").unwrap(), Duration::from_secs(3600));
    }

    #[test]
    fn test_parse_duration_compound_and_bare() {
        assert_eq!(parse_duration("1h30m").unwrap(), Duration::from_secs(5400));
        assert_eq!(parse_duration("90").unwrap(), Duration::from_secs(90));
        assert_eq!(parse_duration("0").unwrap(), Duration::ZERO);
        assert_eq!(parse_duration(" 10m ").unwrap(), Duration::from_secs(600));
    }

    #[test]
    fn test_parse_duration_errors() {
        assert_matches!(parse_duration(""), Err(Error::DurationParse(_)));
        assert_matches!(parse_duration("10x"), Err(Error::DurationParse(_)));
        assert_matches!(parse_duration("h"), Err(Error::DurationParse(_)));
        assert_matches!(parse_duration("-5m"), Err(Error::DurationParse(_)));
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::ZERO), "0s");
        assert_eq!(format_duration(Duration::from_secs(600)), "10m");
        assert_eq!(format_duration(Duration::from_secs(5400)), "1h30m");
        assert_eq!(format_duration(Duration::from_secs(90_061)), "1d1h1m1s");
    }

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.leaderboard.query_limit, 30);
        assert_eq!(settings.leaderboard.cache_expire_after, Duration::from_secs(600));
        assert_eq!(settings.leaderboard.query_timeout, Duration::from_secs(3));
        assert_eq!(settings.identity.expire_after_write, Duration::from_secs(12 * 3600));
        assert_eq!(settings.identity.expire_after_access, Duration::from_secs(2 * 3600));
        assert_eq!(settings.service.repository_timeout, Duration::from_secs(2));
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_empty_document_is_default() {
        assert_eq!(Settings::from_yaml_str("").unwrap(), Settings::default());
        assert_eq!(Settings::from_yaml_str("{}").unwrap(), Settings::default());
    }

    #[test]
    fn test_partial_document() {
        let yaml = r#"
leaderboard:
  query_limit: 50
  cache_expire_after: 0
identity:
  expire_after_access: 30m
"#;
        let settings = Settings::from_yaml_str(yaml).unwrap();
        assert_eq!(settings.leaderboard.query_limit, 50);
        assert_eq!(settings.leaderboard.cache_expire_after, Duration::ZERO);
        assert_eq!(settings.leaderboard.query_timeout, Duration::from_secs(3));
        assert_eq!(settings.identity.expire_after_access, Duration::from_secs(1800));
        assert_eq!(settings.identity.expire_after_write, Duration::from_secs(12 * 3600));
    }

    #[test]
    fn test_negative_expiry_means_never() {
        let settings = Settings::from_yaml_str("leaderboard:\n  cache_expire_after: -1\n").unwrap();
        assert_eq!(settings.leaderboard.cache_expire_after, Duration::ZERO);
    }

    #[test]
    fn test_rejects_invalid_values() {
        assert_matches!(
            Settings::from_yaml_str("leaderboard:\n  query_limit: 0\n"),
            Err(Error::Config(_))
        );
        assert_matches!(
            Settings::from_yaml_str("leaderboard:\n  query_timeout: 0s\n"),
            Err(Error::Config(_))
        );
        assert_matches!(
            Settings::from_yaml_str("service:\n  repository_timeout: 0\n"),
            Err(Error::Config(_))
        );
        assert_matches!(
            Settings::from_yaml_str("leaderboard:\n  query_timeout: soon\n"),
            Err(Error::Yaml(_))
        );
    }

    #[test]
    fn test_yaml_roundtrip_keeps_values() {
        let mut settings = Settings::default();
        settings.leaderboard.query_limit = 12;
        settings.leaderboard.cache_expire_after = Duration::from_secs(5400);

        let yaml = settings.to_yaml_string().unwrap();
        assert!(yaml.contains("1h30m"));
        assert_eq!(Settings::from_yaml_str(&yaml).unwrap(), settings);
    }
}
