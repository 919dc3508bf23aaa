use chrono::{DateTime, Utc};

/// Current UTC time formatted as ISO-8601 with a literal `Z` suffix, matching
/// the timestamp convention required for evidence pack manifests and HAR
/// exports.
pub fn now_utc_iso8601() -> String {
    format_iso8601(Utc::now())
}

pub fn format_iso8601(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}
