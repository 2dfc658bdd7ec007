use jiff::Span;
use jiff::civil::Date;

/// Parse a `YYYY-MM-DD` date typed by the user. Blank input yields `None`.
pub fn parse_date_input(value: &str) -> Option<Date> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    value.parse::<Date>().ok()
}

/// `date` shifted by a signed number of days, `None` when the result leaves the
/// supported calendar range
pub fn offset_date(date: Date, days: i32) -> Option<Date> {
    let span = Span::new().try_days(i64::from(days)).ok()?;
    date.checked_add(span).ok()
}

/// Whole days from `reference` to `target`, negative when `target` is earlier
pub fn days_between(reference: Date, target: Date) -> i64 {
    target.duration_since(reference).as_hours() / 24
}

/// "today", "N days later" or "N days ago"
pub fn describe_offset(days: i64) -> String {
    match days {
        0 => "today".to_string(),
        1 => "1 day later".to_string(),
        -1 => "1 day ago".to_string(),
        d if d > 0 => format!("{} days later", d),
        d => format!("{} days ago", d.unsigned_abs()),
    }
}

pub fn describe_relative_days(target: Date, reference: Date) -> String {
    describe_offset(days_between(reference, target))
}

/// Week breakdown of a template offset, keeping the sign on every component:
/// "-55 days before (-7 weeks -6 days before)", "-56 days before (-8 weeks before)",
/// "-3 days before", or "unset" when there is no offset.
pub fn describe_offset_in_weeks(days: Option<i32>) -> String {
    let Some(n) = days else {
        return "unset".to_string();
    };

    let magnitude = n.unsigned_abs();
    let sign: i64 = if n < 0 { -1 } else { 1 };
    let weeks = i64::from(magnitude / 7) * sign;
    let rest = i64::from(magnitude % 7) * sign;

    match (weeks, rest) {
        (0, _) => format!("{} days before", n),
        (w, 0) => format!("{} days before ({} weeks before)", n, w),
        (w, d) => format!("{} days before ({} weeks {} days before)", n, w, d),
    }
}

/// e.g. "2025/03/01 (Sat)"
pub fn format_date_with_weekday(date: Date) -> String {
    date.strftime("%Y/%m/%d (%a)").to_string()
}
