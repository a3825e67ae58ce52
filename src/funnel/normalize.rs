use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime};

/// Strips invisible characters and collapses runs of whitespace, keeping case.
pub(crate) fn normalize_label(value: &str) -> String {
    let cleaned = value.replace(['\u{feff}', '\u{200b}'], "");
    cleaned.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Lower-cased [`normalize_label`] for matching against known synonyms.
pub(crate) fn normalize_token(value: &str) -> String {
    normalize_label(value).to_lowercase()
}

/// Parses a monetary amount that may carry thousands separators.
pub(crate) fn parse_amount(value: &str) -> Option<f64> {
    let cleaned: String = value
        .chars()
        .filter(|ch| !matches!(ch, ',' | '\u{ff0c}' | '_') && !ch.is_whitespace())
        .collect();
    if cleaned.is_empty() {
        return None;
    }

    cleaned.parse::<f64>().ok().filter(|amount| amount.is_finite())
}

/// Parses an instant as wall-clock time in the reporting offset.
///
/// Values carrying a UTC offset are converted into `offset`; naive values are
/// taken to be reporting-local already.
pub(crate) fn parse_instant(value: &str, offset: FixedOffset) -> Option<NaiveDateTime> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt.with_timezone(&offset).naive_local());
    }

    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y/%m/%d %H:%M:%S"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Some(dt);
        }
    }

    for format in ["%Y-%m-%d", "%Y/%m/%d"] {
        if let Ok(date) = NaiveDate::parse_from_str(trimmed, format) {
            return date.and_hms_opt(0, 0, 0);
        }
    }

    None
}

pub(crate) fn parse_date(value: &str, offset: FixedOffset) -> Option<NaiveDate> {
    parse_instant(value, offset).map(|dt| dt.date())
}

pub(crate) fn parse_flag(value: &str) -> Option<bool> {
    match normalize_token(value).as_str() {
        "true" | "t" | "1" | "yes" | "y" => Some(true),
        "false" | "f" | "0" | "no" | "n" | "" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::funnel::domain::default_report_offset;

    fn instant(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .expect("valid date")
            .and_hms_opt(h, min, 0)
            .expect("valid time")
    }

    #[test]
    fn amount_parsing_strips_separators() {
        assert_eq!(parse_amount("1,200,000"), Some(1_200_000.0));
        assert_eq!(parse_amount(" 365000 "), Some(365_000.0));
        assert_eq!(parse_amount("30\u{ff0c}000.5"), Some(30_000.5));
        assert_eq!(parse_amount("about 5k"), None);
        assert_eq!(parse_amount(""), None);
        assert_eq!(parse_amount("NaN"), None);
    }

    #[test]
    fn instants_accept_common_export_formats() {
        let jst = default_report_offset();
        let expected = instant(2026, 2, 10, 9, 30);
        assert_eq!(parse_instant("2026-02-10T09:30:00+09:00", jst), Some(expected));
        assert_eq!(parse_instant("2026-02-10 09:30:00", jst), Some(expected));
        assert_eq!(
            parse_date("2026/02/10", jst),
            NaiveDate::from_ymd_opt(2026, 2, 10)
        );
        assert!(parse_instant("  ", jst).is_none());
        assert!(parse_instant("next tuesday", jst).is_none());
    }

    #[test]
    fn zoned_instants_convert_into_the_reporting_offset() {
        let jst = default_report_offset();
        let expected = instant(2026, 2, 1, 5, 0);
        assert_eq!(parse_instant("2026-01-31T20:00:00Z", jst), Some(expected));
        assert_eq!(parse_instant("2026-02-01T05:00:00+09:00", jst), Some(expected));
        assert_eq!(
            parse_date("2026-01-31T20:00:00Z", jst),
            NaiveDate::from_ymd_opt(2026, 2, 1)
        );

        let utc = FixedOffset::east_opt(0).expect("valid offset");
        assert_eq!(
            parse_instant("2026-02-01T05:00:00+09:00", utc),
            Some(instant(2026, 1, 31, 20, 0))
        );
        assert_eq!(parse_instant("2026-02-01 05:00:00", utc), Some(expected));
    }

    #[test]
    fn labels_lose_invisible_characters() {
        assert_eq!(normalize_label("\u{feff}Job  Board\u{200b} A "), "Job Board A");
        assert_eq!(normalize_token(" Monthly "), "monthly");
    }

    #[test]
    fn flags_accept_yes_no_variants() {
        assert_eq!(parse_flag("TRUE"), Some(true));
        assert_eq!(parse_flag("no"), Some(false));
        assert_eq!(parse_flag("maybe"), None);
    }
}
