//! Instants used for record ordering.

use crate::error::{ProtocolError, ProtocolResult};
use chrono::{DateTime, Utc};

/// A UTC instant, serialized as RFC 3339.
pub type Timestamp = DateTime<Utc>;

/// Returns the current instant.
pub fn now() -> Timestamp {
    Utc::now()
}

/// Parses an RFC 3339 string into a UTC instant.
///
/// Offsets are normalized, so `2024-03-01T12:00:00+02:00` and
/// `2024-03-01T10:00:00Z` parse to the same instant.
///
/// # Errors
///
/// Returns [`ProtocolError::InvalidTimestamp`] for anything that is not
/// RFC 3339.
pub fn parse_timestamp(value: &str) -> ProtocolResult<Timestamp> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|_| ProtocolError::InvalidTimestamp(value.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offsets_compare_as_instants() {
        let shifted = parse_timestamp("2024-03-01T12:00:00+02:00").unwrap();
        let utc = parse_timestamp("2024-03-01T10:00:00Z").unwrap();
        assert_eq!(shifted, utc);

        // Lexically larger, chronologically earlier.
        let later = parse_timestamp("2024-03-01T10:30:00Z").unwrap();
        let earlier = parse_timestamp("2024-03-01T11:00:00+01:00").unwrap();
        assert!(later > earlier);
    }

    #[test]
    fn rejects_non_rfc3339() {
        assert!(matches!(
            parse_timestamp("yesterday"),
            Err(ProtocolError::InvalidTimestamp(_))
        ));
        assert!(parse_timestamp("2024-03-01").is_err());
    }
}
