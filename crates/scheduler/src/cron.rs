// A five-field cron parser (minute hour day-of-month month day-of-week),
// the `@yearly/@monthly/@weekly/@daily/@hourly` aliases, comma lists, ranges,
// `*/n` steps, and named months/weekdays. Day-of-month and day-of-week
// combine with OR per Unix convention when both are restricted.

use std::collections::BTreeSet;

use chrono::{DateTime, Datelike, Duration, Timelike, Utc};

use crate::error::{Result, SchedulerError};

#[derive(Debug, Clone)]
struct Field {
    /// `None` means the field was the unrestricted wildcard `*`.
    values: Option<BTreeSet<u32>>,
}

impl Field {
    fn wildcard() -> Self {
        Self { values: None }
    }

    fn is_wildcard(&self) -> bool {
        self.values.is_none()
    }

    fn matches(&self, value: u32) -> bool {
        match &self.values {
            None => true,
            Some(set) => set.contains(&value),
        }
    }
}

/// A parsed five-field cron expression, ready for repeated `matches`/`next_after` queries.
#[derive(Debug, Clone)]
pub struct ParsedCron {
    minute: Field,
    hour: Field,
    day_of_month: Field,
    month: Field,
    day_of_week: Field,
    source: String,
}

fn expand_alias(expr: &str) -> &str {
    match expr.trim() {
        "@yearly" | "@annually" => "0 0 1 1 *",
        "@monthly" => "0 0 1 * *",
        "@weekly" => "0 0 * * 0",
        "@daily" | "@midnight" => "0 0 * * *",
        "@hourly" => "0 * * * *",
        other => other,
    }
}

fn month_name_to_num(name: &str) -> Option<u32> {
    const NAMES: [&str; 12] =
        ["jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec"];
    NAMES.iter().position(|n| *n == name.to_ascii_lowercase()).map(|i| i as u32 + 1)
}

fn weekday_name_to_num(name: &str) -> Option<u32> {
    const NAMES: [&str; 7] = ["sun", "mon", "tue", "wed", "thu", "fri", "sat"];
    NAMES.iter().position(|n| *n == name.to_ascii_lowercase()).map(|i| i as u32)
}

fn parse_atom(token: &str, min: u32, max: u32, names: fn(&str) -> Option<u32>) -> Result<u32> {
    if let Ok(n) = token.parse::<u32>() {
        if n < min || n > max {
            return Err(SchedulerError::InvalidCron(
                token.to_string(),
                format!("value out of range [{min},{max}]"),
            ));
        }
        return Ok(n);
    }
    names(token).ok_or_else(|| SchedulerError::InvalidCron(token.to_string(), "unrecognized value".to_string()))
}

fn parse_field(raw: &str, min: u32, max: u32, names: fn(&str) -> Option<u32>) -> Result<Field> {
    if raw == "*" {
        return Ok(Field::wildcard());
    }

    let mut values = BTreeSet::new();
    for part in raw.split(',') {
        let (range_part, step) = match part.split_once('/') {
            Some((r, s)) => {
                let step: u32 = s
                    .parse()
                    .map_err(|_| SchedulerError::InvalidCron(part.to_string(), "bad step".to_string()))?;
                if step == 0 {
                    return Err(SchedulerError::InvalidCron(part.to_string(), "step cannot be zero".to_string()));
                }
                (r, step)
            }
            None => (part, 1),
        };

        let (lo, hi) = if range_part == "*" {
            (min, max)
        } else if let Some((a, b)) = range_part.split_once('-') {
            let lo = parse_atom(a, min, max, names)?;
            let hi = parse_atom(b, min, max, names)?;
            if lo > hi {
                return Err(SchedulerError::InvalidCron(part.to_string(), "range start exceeds end".to_string()));
            }
            (lo, hi)
        } else {
            let v = parse_atom(range_part, min, max, names)?;
            (v, v)
        };

        let mut v = lo;
        while v <= hi {
            values.insert(v);
            v += step;
        }
    }

    Ok(Field { values: Some(values) })
}

impl ParsedCron {
    pub fn parse(expr: &str) -> Result<Self> {
        let expanded = expand_alias(expr);
        let fields: Vec<&str> = expanded.split_whitespace().collect();
        if fields.len() != 5 {
            return Err(SchedulerError::InvalidCron(
                expr.to_string(),
                format!("expected 5 fields, got {}", fields.len()),
            ));
        }

        Ok(Self {
            minute: parse_field(fields[0], 0, 59, |_| None)?,
            hour: parse_field(fields[1], 0, 23, |_| None)?,
            day_of_month: parse_field(fields[2], 1, 31, |_| None)?,
            month: parse_field(fields[3], 1, 12, month_name_to_num)?,
            day_of_week: parse_field(fields[4], 0, 6, weekday_name_to_num)?,
            source: expr.to_string(),
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Whether `when` (truncated to the minute) satisfies every field.
    /// Day-of-month and day-of-week combine with OR when both are
    /// restricted, matching cron(8)'s historical behavior.
    pub fn matches(&self, when: DateTime<Utc>) -> bool {
        if !self.minute.matches(when.minute()) {
            return false;
        }
        if !self.hour.matches(when.hour()) {
            return false;
        }
        if !self.month.matches(when.month()) {
            return false;
        }

        let dom_restricted = !self.day_of_month.is_wildcard();
        let dow_restricted = !self.day_of_week.is_wildcard();
        let dom_matches = self.day_of_month.matches(when.day());
        // chrono's `Weekday::num_days_from_sunday()` matches cron's 0=Sunday convention.
        let dow_matches = self.day_of_week.matches(when.weekday().num_days_from_sunday());

        match (dom_restricted, dow_restricted) {
            (true, true) => dom_matches || dow_matches,
            (true, false) => dom_matches,
            (false, true) => dow_matches,
            (false, false) => true,
        }
    }

    /// The next minute strictly after `from` that matches this expression.
    /// Searches forward minute-by-minute, bounded to four years out so a
    /// malformed-but-parseable expression (e.g. Feb 30 only) cannot hang.
    pub fn next_after(&self, from: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let start = truncate_to_minute(from) + Duration::minutes(1);
        let limit = start + Duration::days(4 * 366);
        let mut candidate = start;
        while candidate < limit {
            if self.matches(candidate) {
                return Some(candidate);
            }
            candidate += Duration::minutes(1);
        }
        None
    }
}

fn truncate_to_minute(t: DateTime<Utc>) -> DateTime<Utc> {
    t - Duration::seconds(t.second() as i64) - Duration::nanoseconds(t.nanosecond() as i64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn dt(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
    }

    #[test]
    fn every_minute_matches_every_minute() {
        let cron = ParsedCron::parse("* * * * *").unwrap();
        assert!(cron.matches(dt(2025, 1, 6, 9, 7)));
        assert!(cron.matches(dt(2025, 6, 30, 23, 59)));
    }

    #[test]
    fn quarter_hour_weekday_schedule_matches_expected_slots() {
        // S3: */15 * * * 1-5 ; now = Mon 2025-01-06T09:07:00Z
        let cron = ParsedCron::parse("*/15 * * * 1-5").unwrap();
        let now = dt(2025, 1, 6, 9, 7);
        let next = cron.next_after(now).unwrap();
        assert_eq!(next, dt(2025, 1, 6, 9, 15));
        assert!(cron.matches(dt(2025, 1, 6, 9, 15)));
        assert!(!cron.matches(dt(2025, 1, 6, 9, 20)));
        // Saturday 2025-01-11 at 09:15 must not match (day-of-week excludes it).
        assert!(!cron.matches(dt(2025, 1, 11, 9, 15)));
    }

    #[test]
    fn day_of_month_and_day_of_week_combine_with_or() {
        // 0 0 1 * mon: fires on the 1st of every month OR every Monday.
        let cron = ParsedCron::parse("0 0 1 * mon").unwrap();
        assert!(cron.matches(dt(2025, 3, 1, 0, 0))); // the 1st, a Saturday
        assert!(cron.matches(dt(2025, 3, 3, 0, 0))); // a Monday, not the 1st
        assert!(!cron.matches(dt(2025, 3, 4, 0, 0))); // neither
    }

    #[test]
    fn aliases_expand_correctly() {
        assert!(ParsedCron::parse("@hourly").unwrap().matches(dt(2025, 1, 1, 5, 0)));
        assert!(!ParsedCron::parse("@hourly").unwrap().matches(dt(2025, 1, 1, 5, 1)));
        assert!(ParsedCron::parse("@daily").unwrap().matches(dt(2025, 1, 1, 0, 0)));
        assert!(ParsedCron::parse("@weekly").unwrap().matches(dt(2025, 1, 5, 0, 0))); // a Sunday
    }

    #[test]
    fn named_months_and_weekdays_parse() {
        let cron = ParsedCron::parse("0 9 * jan,jul mon-fri").unwrap();
        assert!(cron.matches(dt(2025, 1, 6, 9, 0)));
        assert!(!cron.matches(dt(2025, 2, 6, 9, 0)));
    }

    #[test]
    fn invalid_field_count_is_rejected() {
        assert!(ParsedCron::parse("* * *").is_err());
    }

    #[test]
    fn out_of_range_value_is_rejected() {
        assert!(ParsedCron::parse("60 * * * *").is_err());
    }

    #[test]
    fn next_occurrence_is_always_strictly_after_input() {
        let cron = ParsedCron::parse("0 0 * * *").unwrap();
        let now = dt(2025, 1, 6, 9, 7);
        let next = cron.next_after(now).unwrap();
        assert!(next > now);
        assert!(cron.matches(next));
    }

    #[test]
    fn parse_then_describe_then_reparse_matches_same_instants() {
        let cron = ParsedCron::parse("*/15 * * * 1-5").unwrap();
        let reparsed = ParsedCron::parse(cron.source()).unwrap();
        let probe = dt(2025, 1, 6, 9, 15);
        assert_eq!(cron.matches(probe), reparsed.matches(probe));
    }
}
