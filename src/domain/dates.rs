use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde_json::Value;

/// Zone every date field is rendered in.
pub const DISPLAY_TZ: Tz = chrono_tz::US::Alaska;

/// Display format for converted date fields.
///
/// `%H:%S` prints hours then seconds; minutes never appear. Existing reports
/// are built on this output, so it is kept as-is.
pub const DISPLAY_FORMAT: &str = "%B %d, %Y   %H:%S";

/// Render epoch milliseconds (UTC) as Alaska local time in [`DISPLAY_FORMAT`].
///
/// Returns `None` when the instant is out of chrono's range.
pub fn format_epoch_millis(ms: i64) -> Option<String> {
    let utc = DateTime::<Utc>::from_timestamp_millis(ms)?;
    Some(utc.with_timezone(&DISPLAY_TZ).format(DISPLAY_FORMAT).to_string())
}

/// Convert a date cell. Numeric cells are epoch milliseconds; anything else
/// (already-rendered strings, unparseable values) is returned unchanged.
pub fn convert_date_value(v: &Value) -> Value {
    let ms = v.as_i64().or_else(|| v.as_f64().map(|f| f as i64));
    match ms.and_then(format_epoch_millis) {
        Some(s) => Value::String(s),
        None => v.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn epoch_zero_regression() {
        // 1969-12-31 14:00:00 AHST (UTC-10)
        assert_eq!(
            format_epoch_millis(0).as_deref(),
            Some("December 31, 1969   14:00")
        );
    }

    #[test]
    fn seconds_slot_shows_seconds_not_minutes() {
        // 2024-01-15 12:34:56 UTC = 03:34:56 AKST
        assert_eq!(
            format_epoch_millis(1_705_322_096_000).as_deref(),
            Some("January 15, 2024   03:56")
        );
    }

    #[test]
    fn daylight_saving_offset_applies() {
        // 2024-07-03 09:46:40 UTC = 01:46:40 AKDT
        assert_eq!(
            format_epoch_millis(1_720_000_000_000).as_deref(),
            Some("July 03, 2024   01:40")
        );
    }

    #[test]
    fn non_numeric_passes_through() {
        assert_eq!(convert_date_value(&json!("already")), json!("already"));
        assert_eq!(
            convert_date_value(&json!(0.0)),
            json!("December 31, 1969   14:00")
        );
    }
}
