use crate::responses::{FromFieldValue, TypedResponseError};

/// A modification timestamp, as returned in the `Last-Modified` field of song responses.
///
/// This is a thin wrapper around the raw string MPD sends (an RFC 3339 timestamp) -- it is kept
/// around unparsed rather than converted into a richer date/time type, since nothing in this
/// crate needs more than string comparison and ordering for cutoff checks.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct Timestamp(String);

impl Timestamp {
    /// The timestamp string as it was returned by the server (RFC 3339).
    pub fn raw(&self) -> &str {
        &self.0
    }
}

impl FromFieldValue for Timestamp {
    fn from_value(v: String, field: &str) -> Result<Self, TypedResponseError> {
        if v.len() < "YYYY-MM-DDTHH:MM:SSZ".len() {
            return Err(TypedResponseError::invalid_value(field, v));
        }

        Ok(Timestamp(v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_and_orders() {
        let a = Timestamp::from_value("2020-01-01T00:00:00Z".into(), "Last-Modified").unwrap();
        let b = Timestamp::from_value("2021-06-12T17:53:00Z".into(), "Last-Modified").unwrap();
        assert!(a < b);
    }

    #[test]
    fn rejects_short_values() {
        assert!(Timestamp::from_value("nope".into(), "Last-Modified").is_err());
    }
}
