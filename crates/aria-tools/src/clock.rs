//! Timezone-aware current time.
//!
//! Resolution order mirrors the assistant's behavior: a named zone (via a
//! small alias map), then a configured default zone, then an explicit UTC
//! offset, then UTC. Named zones resolve through fixed offsets — good enough
//! for a voice reply, with the explicit numeric offset as the escape hatch.

use chrono::{FixedOffset, Utc};

/// Parameters for a current-time request.
#[derive(Debug, Clone, Default)]
pub struct TimeQuery {
    /// Zone name or common alias ("Africa/Nairobi", "kenya", "utc").
    pub timezone: Option<String>,
    /// Numeric UTC offset in hours; used when no zone resolves.
    pub utc_offset_hours: Option<f64>,
    /// Deployment default zone, consulted after the explicit zone.
    pub default_timezone: Option<String>,
    /// Deployment default offset, consulted last before UTC.
    pub default_utc_offset_hours: Option<f64>,
}

/// Known zone names and aliases with their UTC offsets in hours.
const ZONE_ALIASES: &[(&str, f64)] = &[
    ("utc", 0.0),
    ("gmt", 0.0),
    ("kenya", 3.0),
    ("nairobi", 3.0),
    ("eat", 3.0),
    ("east africa", 3.0),
    ("africa/nairobi", 3.0),
    ("europe/london", 0.0),
    ("europe/berlin", 1.0),
    ("europe/paris", 1.0),
    ("america/new_york", -5.0),
    ("america/los_angeles", -8.0),
    ("asia/kolkata", 5.5),
    ("asia/tokyo", 9.0),
];

fn lookup_zone(name: &str) -> Option<f64> {
    let key = name.trim().to_lowercase();
    ZONE_ALIASES
        .iter()
        .find(|(alias, _)| *alias == key)
        .map(|(_, hours)| *hours)
}

fn offset_from_hours(hours: f64) -> Option<FixedOffset> {
    FixedOffset::east_opt((hours * 3600.0) as i32)
}

/// Resolves the effective offset for a query. `None` means plain UTC.
fn resolve_offset(query: &TimeQuery) -> Option<FixedOffset> {
    if let Some(zone) = &query.timezone {
        match lookup_zone(zone) {
            Some(hours) => return offset_from_hours(hours),
            None => {
                tracing::warn!(zone = %zone, "unknown timezone, trying defaults");
            }
        }
    }

    if let Some(zone) = &query.default_timezone {
        if let Some(hours) = lookup_zone(zone) {
            return offset_from_hours(hours);
        }
        tracing::warn!(zone = %zone, "unknown default timezone, ignoring");
    }

    query
        .utc_offset_hours
        .or(query.default_utc_offset_hours)
        .and_then(offset_from_hours)
}

/// Formats the current time for the resolved zone.
pub fn current_time(query: &TimeQuery) -> String {
    match resolve_offset(query) {
        Some(offset) => Utc::now()
            .with_timezone(&offset)
            .format("%Y-%m-%d %H:%M:%S %z")
            .to_string(),
        None => Utc::now().format("%Y-%m-%d %H:%M:%S UTC").to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alias_resolution_is_case_insensitive() {
        assert_eq!(lookup_zone("Kenya"), Some(3.0));
        assert_eq!(lookup_zone("AFRICA/NAIROBI"), Some(3.0));
        assert_eq!(lookup_zone("nowhere/special"), None);
    }

    #[test]
    fn explicit_zone_wins_over_offset() {
        let query = TimeQuery {
            timezone: Some("nairobi".to_string()),
            utc_offset_hours: Some(-5.0),
            ..TimeQuery::default()
        };
        let offset = resolve_offset(&query).expect("offset expected");
        assert_eq!(offset.local_minus_utc(), 3 * 3600);
    }

    #[test]
    fn unknown_zone_falls_back_to_default_then_offset() {
        let query = TimeQuery {
            timezone: Some("atlantis".to_string()),
            default_timezone: Some("also-unknown".to_string()),
            utc_offset_hours: Some(5.5),
            ..TimeQuery::default()
        };
        let offset = resolve_offset(&query).expect("offset expected");
        assert_eq!(offset.local_minus_utc(), 5 * 3600 + 1800);
    }

    #[test]
    fn no_hints_means_utc() {
        assert_eq!(resolve_offset(&TimeQuery::default()), None);
        let formatted = current_time(&TimeQuery::default());
        assert!(formatted.ends_with("UTC"), "got {}", formatted);
    }

    #[test]
    fn formatted_time_carries_the_offset() {
        let query = TimeQuery {
            timezone: Some("asia/tokyo".to_string()),
            ..TimeQuery::default()
        };
        let formatted = current_time(&query);
        assert!(formatted.contains("+0900"), "got {}", formatted);
    }
}
