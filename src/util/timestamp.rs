use time::{
    format_description::well_known::{Rfc2822, Rfc3339},
    macros::format_description,
    OffsetDateTime, PrimitiveDateTime,
};

/// Parses a backend timestamp into seconds since the unix epoch.
///
/// Accepts RFC 3339 (listings), RFC 2822 and the HTTP-date form used in
/// `Last-Modified` headers, e.g. `Wed, 21 Oct 2015 07:28:00 GMT`.
pub fn parse_epoch_seconds(value: &str) -> Option<i64> {
    let value = value.trim();

    if let Ok(dt) = OffsetDateTime::parse(value, &Rfc3339) {
        return Some(dt.unix_timestamp());
    }

    if let Ok(dt) = OffsetDateTime::parse(value, &Rfc2822) {
        return Some(dt.unix_timestamp());
    }

    let http_date = format_description!(
        "[weekday repr:short], [day] [month repr:short] [year] [hour]:[minute]:[second] GMT"
    );
    PrimitiveDateTime::parse(value, &http_date)
        .ok()
        .map(|dt| dt.assume_utc().unix_timestamp())
}

/// Formats a timestamp the way `parse_epoch_seconds` reads it back.
pub fn format_rfc3339(dt: OffsetDateTime) -> String {
    dt.format(&Rfc3339)
        .unwrap_or_else(|_| dt.unix_timestamp().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_epoch_seconds() {
        let cases = vec![
            ("2015-10-21T07:28:00Z", Some(1445412480)),
            ("2015-10-21T07:28:00.000Z", Some(1445412480)),
            ("Wed, 21 Oct 2015 07:28:00 GMT", Some(1445412480)),
            ("Wed, 21 Oct 2015 07:28:00 +0000", Some(1445412480)),
            (" 2015-10-21T09:28:00+02:00 ", Some(1445412480)),
            ("yesterday", None),
            ("", None),
        ];

        for (input, expected) in cases {
            assert_eq!(parse_epoch_seconds(input), expected, "failed for case: {}", input);
        }
    }

    #[test]
    fn test_format_round_trip() {
        let dt = OffsetDateTime::from_unix_timestamp(1445412480).unwrap();

        assert_eq!(parse_epoch_seconds(&format_rfc3339(dt)), Some(1445412480));
    }
}
