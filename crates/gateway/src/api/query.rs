//! Query-string parsing conventions shared across admin handlers: boolean
//! flags, CSV lists, and millisecond timestamps.

/// Parse a boolean query value against the `1|true|yes|on` /
/// `0|false|no|off` vocabulary. Anything else returns `default`.
pub fn parse_bool(value: Option<&str>, default: bool) -> bool {
    match value.map(str::trim).map(str::to_lowercase).as_deref() {
        Some("1" | "true" | "yes" | "on") => true,
        Some("0" | "false" | "no" | "off") => false,
        _ => default,
    }
}

/// Parse a CSV query value: split on commas, trim whitespace, drop empties,
/// dedupe while preserving first-seen order.
pub fn parse_csv(value: Option<&str>) -> Vec<String> {
    let Some(raw) = value else {
        return Vec::new();
    };
    let mut seen = std::collections::HashSet::new();
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .filter(|s| seen.insert(s.to_string()))
        .map(str::to_string)
        .collect()
}

/// Parse a millisecond-timestamp query value. Requires a non-negative
/// integer; returns `None` if absent, `Some(Err(..))` if present but
/// malformed or negative.
pub fn parse_timestamp_ms(value: Option<&str>) -> Option<Result<i64, String>> {
    let raw = value?.trim();
    match raw.parse::<i64>() {
        Ok(n) if n >= 0 => Some(Ok(n)),
        Ok(_) => Some(Err(format!("timestamp must be non-negative: {raw}"))),
        Err(_) => Some(Err(format!("timestamp must be an integer: {raw}"))),
    }
}
