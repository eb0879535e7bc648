//! Built-in time-zone tables.
//!
//! Structured queries (UTC offsets and zone abbreviations) are answered from
//! these tables without touching the network. The tables are built once at
//! startup, optionally extended from configuration, and never change after.

use std::collections::HashMap;
use std::sync::LazyLock;

use chrono_tz::Tz;
use regex::Regex;
use tracing::warn;

use crate::candidate::Candidate;

/// Abbreviation -> representative IANA zone.
const ABBREVIATIONS: &[(&str, &str)] = &[
    ("ACDT", "Australia/Adelaide"),
    ("ACST", "Australia/Darwin"),
    ("ADT", "America/Halifax"),
    ("AEDT", "Australia/Sydney"),
    ("AEST", "Australia/Brisbane"),
    ("AKDT", "America/Anchorage"),
    ("AKST", "America/Anchorage"),
    ("ART", "America/Argentina/Buenos_Aires"),
    ("AST", "America/Halifax"),
    ("AWST", "Australia/Perth"),
    ("BDT", "Asia/Dhaka"),
    ("BRT", "America/Sao_Paulo"),
    ("BST", "Europe/London"),
    ("CAT", "Africa/Maputo"),
    ("CDT", "America/Chicago"),
    ("CEST", "Europe/Paris"),
    ("CET", "Europe/Paris"),
    ("CLT", "America/Santiago"),
    ("COT", "America/Bogota"),
    ("CST", "America/Chicago"),
    ("EAT", "Africa/Nairobi"),
    ("EDT", "America/New_York"),
    ("EEST", "Europe/Athens"),
    ("EET", "Europe/Athens"),
    ("EST", "America/New_York"),
    ("GMT", "Etc/GMT"),
    ("GST", "Asia/Dubai"),
    ("HKT", "Asia/Hong_Kong"),
    ("HST", "Pacific/Honolulu"),
    ("ICT", "Asia/Bangkok"),
    ("IRST", "Asia/Tehran"),
    ("IST", "Asia/Kolkata"),
    ("JST", "Asia/Tokyo"),
    ("KST", "Asia/Seoul"),
    ("MDT", "America/Denver"),
    ("MSK", "Europe/Moscow"),
    ("MST", "America/Phoenix"),
    ("NZDT", "Pacific/Auckland"),
    ("NZST", "Pacific/Auckland"),
    ("PDT", "America/Los_Angeles"),
    ("PET", "America/Lima"),
    ("PHT", "Asia/Manila"),
    ("PKT", "Asia/Karachi"),
    ("PST", "America/Los_Angeles"),
    ("SGT", "Asia/Singapore"),
    ("TRT", "Europe/Istanbul"),
    ("UTC", "Etc/UTC"),
    ("WAT", "Africa/Lagos"),
    ("WEST", "Europe/Lisbon"),
    ("WET", "Europe/Lisbon"),
    ("WIB", "Asia/Jakarta"),
];

/// Offsets (minutes east of UTC) that are not whole hours. There is no
/// fixed-offset `Etc/` zone for these, so each maps to a zone observing it.
const FRACTIONAL_OFFSETS: &[(i32, &str)] = &[
    (-570, "Pacific/Marquesas"),
    (-210, "America/St_Johns"),
    (210, "Asia/Tehran"),
    (270, "Asia/Kabul"),
    (330, "Asia/Kolkata"),
    (345, "Asia/Kathmandu"),
    (390, "Asia/Yangon"),
    (525, "Australia/Eucla"),
    (570, "Australia/Darwin"),
    (630, "Australia/Lord_Howe"),
    (765, "Pacific/Chatham"),
];

const MIN_OFFSET_MINUTES: i32 = -12 * 60;
const MAX_OFFSET_MINUTES: i32 = 14 * 60;

static OFFSET_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(?:(?:utc|gmt)\s*)?([+-])\s*(\d{1,2})(?::?(\d{2}))?$")
        .expect("offset pattern compiles")
});

/// Check that an identifier names a zone in the bundled IANA database.
pub fn is_known_zone(identifier: &str) -> bool {
    identifier.parse::<Tz>().is_ok()
}

/// A UTC offset typed by the user, in minutes east of Greenwich.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UtcOffset {
    minutes: i32,
}

impl UtcOffset {
    /// Parse `UTC+3`, `gmt-5`, `+05:30`, `UTC+0545` and friends.
    ///
    /// Returns `None` for anything that is not a well-formed offset inside
    /// the range real zones use (-12:00 ..= +14:00).
    pub fn parse(input: &str) -> Option<Self> {
        let caps = OFFSET_PATTERN.captures(input.trim())?;
        let hours: i32 = caps.get(2)?.as_str().parse().ok()?;
        let minutes: i32 = match caps.get(3) {
            Some(m) => m.as_str().parse().ok()?,
            None => 0,
        };
        if minutes >= 60 {
            return None;
        }
        let magnitude = hours * 60 + minutes;
        let total = if &caps[1] == "-" { -magnitude } else { magnitude };
        if !(MIN_OFFSET_MINUTES..=MAX_OFFSET_MINUTES).contains(&total) {
            return None;
        }
        Some(Self { minutes: total })
    }

    #[cfg(test)]
    pub fn minutes(&self) -> i32 {
        self.minutes
    }

    /// Display form, e.g. `UTC+3` or `UTC-3:30`.
    pub fn title(&self) -> String {
        let sign = if self.minutes < 0 { '-' } else { '+' };
        let hours = self.minutes.abs() / 60;
        let minutes = self.minutes.abs() % 60;
        if minutes == 0 {
            format!("UTC{sign}{hours}")
        } else {
            format!("UTC{sign}{hours}:{minutes:02}")
        }
    }

    /// The zone identifier for this offset, if one exists.
    ///
    /// Whole hours map to the POSIX-style `Etc/GMT` zones, whose sign is
    /// inverted (`UTC+3` is `Etc/GMT-3`).
    pub fn zone(&self) -> Option<String> {
        if self.minutes == 0 {
            return Some("Etc/UTC".to_string());
        }
        if self.minutes % 60 == 0 {
            let hours = self.minutes / 60;
            let zone = if hours > 0 {
                format!("Etc/GMT-{hours}")
            } else {
                format!("Etc/GMT+{}", -hours)
            };
            return is_known_zone(&zone).then_some(zone);
        }
        FRACTIONAL_OFFSETS
            .iter()
            .find(|(minutes, _)| *minutes == self.minutes)
            .map(|(_, zone)| zone.to_string())
    }
}

/// Lookup tables for structured (non-place) queries.
#[derive(Debug, Clone)]
pub struct ZoneTables {
    abbreviations: HashMap<String, String>,
}

impl Default for ZoneTables {
    fn default() -> Self {
        Self::builtin()
    }
}

impl ZoneTables {
    pub fn builtin() -> Self {
        let abbreviations = ABBREVIATIONS
            .iter()
            .map(|(abbr, zone)| (abbr.to_string(), zone.to_string()))
            .collect();
        Self { abbreviations }
    }

    /// Built-in table extended with user entries. Entries whose key is not
    /// an abbreviation or whose zone is unknown are skipped with a warning.
    pub fn with_overrides(overrides: &HashMap<String, String>) -> Self {
        let mut tables = Self::builtin();
        for (abbr, zone) in overrides {
            let key = abbr.trim().to_ascii_uppercase();
            if !is_abbreviation_shaped(&key) {
                warn!(abbreviation = %abbr, "ignoring abbreviation override: expected 2-5 letters");
                continue;
            }
            let zone = zone.trim();
            if !is_known_zone(zone) {
                warn!(abbreviation = %key, zone = %zone, "ignoring abbreviation override: unknown time zone");
                continue;
            }
            tables.abbreviations.insert(key, zone.to_string());
        }
        tables
    }

    /// Zone for an abbreviation, matched case-insensitively.
    pub fn abbreviation(&self, text: &str) -> Option<&str> {
        let key = text.trim().to_ascii_uppercase();
        if !is_abbreviation_shaped(&key) {
            return None;
        }
        self.abbreviations.get(&key).map(String::as_str)
    }

    /// Number of known abbreviations, built-in and configured.
    pub fn abbreviation_count(&self) -> usize {
        self.abbreviations.len()
    }

    /// Classify a query as a UTC offset or a known abbreviation.
    ///
    /// `None` means "no structured match": the query should be treated as a
    /// place name. Malformed offsets end up here too.
    pub fn classify(&self, text: &str) -> Option<Candidate> {
        let text = text.trim();
        if let Some(offset) = UtcOffset::parse(text) {
            if let Some(identifier) = offset.zone() {
                return Some(Candidate::UtcOffset {
                    title: offset.title(),
                    identifier,
                });
            }
        }
        self.abbreviation(text).map(|zone| Candidate::Abbreviation {
            title: text.to_ascii_uppercase(),
            identifier: zone.to_string(),
        })
    }
}

fn is_abbreviation_shaped(text: &str) -> bool {
    (2..=5).contains(&text.len()) && text.chars().all(|c| c.is_ascii_alphabetic())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_tables_are_valid_zones() {
        for (abbr, zone) in ABBREVIATIONS {
            assert!(is_known_zone(zone), "{abbr} maps to unknown zone {zone}");
        }
        for (minutes, zone) in FRACTIONAL_OFFSETS {
            assert!(is_known_zone(zone), "{minutes} maps to unknown zone {zone}");
        }
    }

    #[test]
    fn test_parse_offset_forms() {
        assert_eq!(UtcOffset::parse("UTC+3").map(|o| o.minutes()), Some(180));
        assert_eq!(UtcOffset::parse("utc+3").map(|o| o.minutes()), Some(180));
        assert_eq!(UtcOffset::parse("GMT-5").map(|o| o.minutes()), Some(-300));
        assert_eq!(UtcOffset::parse("UTC +05:30").map(|o| o.minutes()), Some(330));
        assert_eq!(UtcOffset::parse("+0545").map(|o| o.minutes()), Some(345));
        assert_eq!(UtcOffset::parse("-3:30").map(|o| o.minutes()), Some(-210));
    }

    #[test]
    fn test_parse_offset_rejects_malformed() {
        assert_eq!(UtcOffset::parse("UTC"), None);
        assert_eq!(UtcOffset::parse("UTC+"), None);
        assert_eq!(UtcOffset::parse("UTC+3:75"), None);
        assert_eq!(UtcOffset::parse("UTC+15"), None);
        assert_eq!(UtcOffset::parse("UTC-13"), None);
        assert_eq!(UtcOffset::parse("3"), None);
        assert_eq!(UtcOffset::parse("UTC+3 Berlin"), None);
    }

    #[test]
    fn test_offset_zone_inverts_sign() {
        let zone = |s: &str| UtcOffset::parse(s).and_then(|o| o.zone());
        assert_eq!(zone("UTC+3").as_deref(), Some("Etc/GMT-3"));
        assert_eq!(zone("UTC-7").as_deref(), Some("Etc/GMT+7"));
        assert_eq!(zone("UTC+0").as_deref(), Some("Etc/UTC"));
        assert_eq!(zone("UTC+14").as_deref(), Some("Etc/GMT-14"));
        assert_eq!(zone("UTC+5:30").as_deref(), Some("Asia/Kolkata"));
        assert_eq!(zone("UTC+2:15"), None);
    }

    #[test]
    fn test_offset_title() {
        assert_eq!(UtcOffset::parse("gmt+03").unwrap().title(), "UTC+3");
        assert_eq!(UtcOffset::parse("-0330").unwrap().title(), "UTC-3:30");
    }

    #[test]
    fn test_classify() {
        let tables = ZoneTables::builtin();
        assert_eq!(
            tables.classify("UTC+3"),
            Some(Candidate::UtcOffset {
                title: "UTC+3".into(),
                identifier: "Etc/GMT-3".into(),
            })
        );
        assert_eq!(
            tables.classify("pst"),
            Some(Candidate::Abbreviation {
                title: "PST".into(),
                identifier: "America/Los_Angeles".into(),
            })
        );
        assert_eq!(
            tables.classify("UTC"),
            Some(Candidate::Abbreviation {
                title: "UTC".into(),
                identifier: "Etc/UTC".into(),
            })
        );
        // Malformed offsets and unknown words fall through to place search
        assert_eq!(tables.classify("UTC+99"), None);
        assert_eq!(tables.classify("Berlin"), None);
        assert_eq!(tables.classify("XYZ"), None);
    }

    #[test]
    fn test_overrides() {
        let overrides = HashMap::from([
            ("sast".to_string(), "Africa/Johannesburg".to_string()),
            ("IST".to_string(), "Asia/Jerusalem".to_string()),
            ("BAD".to_string(), "Mars/Olympus_Mons".to_string()),
            ("TOOLONG".to_string(), "Europe/Berlin".to_string()),
        ]);
        let tables = ZoneTables::with_overrides(&overrides);
        assert_eq!(tables.abbreviation("SAST"), Some("Africa/Johannesburg"));
        assert_eq!(tables.abbreviation("ist"), Some("Asia/Jerusalem"));
        assert_eq!(tables.abbreviation("BAD"), None);
        assert_eq!(tables.abbreviation("TOOLONG"), None);
        assert_eq!(
            tables.abbreviation_count(),
            ZoneTables::builtin().abbreviation_count() + 1
        );
    }
}
