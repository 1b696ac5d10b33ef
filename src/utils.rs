//! General utilities, not particular to any one stage of the encoder.
use std::sync::OnceLock;

use chrono::{DateTime, SecondsFormat, Utc};

static URL_SCHEME_REGEX: OnceLock<regex::Regex> = OnceLock::new();
static UNSAFE_NAME_CHARS_REGEX: OnceLock<regex::Regex> = OnceLock::new();
static UNSAFE_FILE_CHARS_REGEX: OnceLock<regex::Regex> = OnceLock::new();

/// Format a time as an ISO-8601 string with second precision, e.g. `2024-05-01T12:00:00Z`.
pub fn iso8601(t: &DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Format the span between two times as an ISO-8601 duration, e.g. `P1DT2H0M30S`.
///
/// A negative span is formatted as zero.
pub fn iso8601_duration(start: &DateTime<Utc>, end: &DateTime<Utc>) -> String {
    let total = (*end - *start).num_seconds().max(0);
    let days = total / 86_400;
    let hours = (total % 86_400) / 3_600;
    let minutes = (total % 3_600) / 60;
    let seconds = total % 60;
    format!("P{days}DT{hours}H{minutes}M{seconds}S")
}

/// Like [`iso8601`], but with the colons removed so the result can go in a file name.
pub fn filename_timestamp(t: &DateTime<Utc>) -> String {
    iso8601(t).replace(':', "")
}

/// Turn a sensor identifier into something that can be used in a file name.
///
/// A leading URL scheme (`http://`, `https://`, ...) is dropped and path
/// separators, colons and other unsafe characters become underscores, so
/// `http://example.org/sensors/ctd:1` becomes `example.org_sensors_ctd_1`.
pub fn filename_safe_identifier(identifier: &str) -> String {
    let scheme_re = URL_SCHEME_REGEX.get_or_init(|| {
        regex::Regex::new(r"^[A-Za-z][A-Za-z0-9+.\-]*://").expect("Could not compile URL scheme regex")
    });
    let unsafe_re = UNSAFE_FILE_CHARS_REGEX.get_or_init(|| {
        regex::Regex::new(r"[^A-Za-z0-9._\-]+").expect("Could not compile unsafe file character regex")
    });

    let without_scheme = scheme_re.replace(identifier, "");
    let cleaned = unsafe_re.replace_all(&without_scheme, "_");
    cleaned.trim_matches('_').to_string()
}

/// Turn an arbitrary string into a valid netCDF/CF variable name: only ASCII
/// letters, digits and underscores, starting with a letter.
pub fn netcdf_safe_name(name: &str) -> String {
    let re = UNSAFE_NAME_CHARS_REGEX.get_or_init(|| {
        regex::Regex::new(r"[^A-Za-z0-9_]+").expect("Could not compile unsafe name character regex")
    });

    let cleaned = re.replace_all(name, "_");
    let cleaned = cleaned.trim_matches('_');
    match cleaned.chars().next() {
        None => "var".to_string(),
        Some(c) if c.is_ascii_alphabetic() => cleaned.to_string(),
        Some(_) => format!("v_{cleaned}"),
    }
}
