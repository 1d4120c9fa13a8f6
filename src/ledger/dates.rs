//! Explicit calendar dates mentioned in free text.
//!
//! Recognizes `3rd feb` / `3 february` and `feb 3` / `february 3rd`, nothing
//! else. Relative expressions ("yesterday", "last friday") are not supported.

use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;

/// Any word starting with a three-letter month prefix: `feb`, `febr`,
/// `feburary`.
const MONTH: &str = r"((?:jan|feb|mar|apr|may|jun|jul|aug|sep|oct|nov|dec)[a-z]*)";

static DAY_MONTH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"(?i)(?-u:\b)([0-9]{{1,2}})(?:st|nd|rd|th)?\s+{MONTH}(?-u:\b)"))
        .expect("day-month pattern is valid")
});

static MONTH_DAY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"(?i)(?-u:\b){MONTH}\s+([0-9]{{1,2}})(?:st|nd|rd|th)?(?-u:\b)"))
        .expect("month-day pattern is valid")
});

/// Resolves the first explicit `<day> <month>` or `<month> <day>` mention.
#[derive(Debug, Clone, Copy, Default)]
pub struct DateResolver;

impl DateResolver {
    pub fn new() -> Self {
        Self
    }

    /// Resolve a date in `year`, or `None` when no valid mention exists.
    ///
    /// Day-month is tried before month-day; only the first instance of each
    /// pattern is considered. A candidate that does not exist in `year`
    /// (e.g. `30 feb`) falls through instead of rolling over.
    pub fn resolve(&self, text: &str, year: i32) -> Option<NaiveDate> {
        if let Some(caps) = DAY_MONTH.captures(text) {
            if let Some(date) = candidate(year, &caps[2], &caps[1]) {
                return Some(date);
            }
        }

        if let Some(caps) = MONTH_DAY.captures(text) {
            if let Some(date) = candidate(year, &caps[1], &caps[2]) {
                return Some(date);
            }
        }

        None
    }
}

/// Build a date from captured month and day text.
fn candidate(year: i32, month: &str, day: &str) -> Option<NaiveDate> {
    let month = month_number(month)?;
    let day: u32 = day.parse().ok()?;
    if !(1..=31).contains(&day) {
        return None;
    }
    // from_ymd_opt rejects days past the end of the month, no rollover.
    NaiveDate::from_ymd_opt(year, month, day)
}

fn month_number(name: &str) -> Option<u32> {
    let prefix: String = name.chars().take(3).collect::<String>().to_ascii_lowercase();
    let n = match prefix.as_str() {
        "jan" => 1,
        "feb" => 2,
        "mar" => 3,
        "apr" => 4,
        "may" => 5,
        "jun" => 6,
        "jul" => 7,
        "aug" => 8,
        "sep" => 9,
        "oct" => 10,
        "nov" => 11,
        "dec" => 12,
        _ => return None,
    };
    Some(n)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn day_month_and_month_day_agree() {
        let r = DateResolver::new();
        assert_eq!(r.resolve("3rd feb", 2025), Some(ymd(2025, 2, 3)));
        assert_eq!(r.resolve("feb 3rd", 2025), Some(ymd(2025, 2, 3)));
        assert_eq!(r.resolve("3 feb", 2025), r.resolve("feb 3", 2025));
    }

    #[test]
    fn full_and_abbreviated_month_names() {
        let r = DateResolver::new();
        assert_eq!(r.resolve("paid rent on 1st September", 2025), Some(ymd(2025, 9, 1)));
        assert_eq!(r.resolve("sept 21", 2025), Some(ymd(2025, 9, 21)));
        assert_eq!(r.resolve("December 25th dinner", 2025), Some(ymd(2025, 12, 25)));
        assert_eq!(r.resolve("12 JUN", 2025), Some(ymd(2025, 6, 12)));
    }

    #[test]
    fn any_word_with_a_month_prefix_counts() {
        let r = DateResolver::new();
        assert_eq!(r.resolve("3 decem", 2025), Some(ymd(2025, 12, 3)));
        assert_eq!(r.resolve("3rd feburary", 2025), Some(ymd(2025, 2, 3)));
        assert_eq!(r.resolve("janu 5", 2025), Some(ymd(2025, 1, 5)));
        assert_eq!(r.resolve("5 octob", 2025), Some(ymd(2025, 10, 5)));
    }

    #[test]
    fn day_next_to_non_ascii_text_still_matches() {
        let r = DateResolver::new();
        assert_eq!(r.resolve("किराया 3 feb", 2025), Some(ymd(2025, 2, 3)));
        assert_eq!(r.resolve("feb 3रुपये", 2025), Some(ymd(2025, 2, 3)));
    }

    #[test]
    fn impossible_day_is_rejected_not_rolled_over() {
        let r = DateResolver::new();
        assert_eq!(r.resolve("30 feb", 2025), None);
        assert_eq!(r.resolve("31 apr", 2025), None);
        assert_eq!(r.resolve("0 mar", 2025), None);
    }

    #[test]
    fn leap_day_depends_on_year() {
        let r = DateResolver::new();
        assert_eq!(r.resolve("29 feb", 2024), Some(ymd(2024, 2, 29)));
        assert_eq!(r.resolve("29 feb", 2025), None);
    }

    #[test]
    fn invalid_day_month_falls_through_to_month_day() {
        let r = DateResolver::new();
        // "30 feb" is impossible, "feb 2" is the next pattern's match.
        assert_eq!(r.resolve("30 feb 2 coffees", 2025), Some(ymd(2025, 2, 2)));
    }

    #[test]
    fn first_instance_wins() {
        let r = DateResolver::new();
        assert_eq!(r.resolve("5 jan and 6 jan", 2025), Some(ymd(2025, 1, 5)));
    }

    #[test]
    fn no_mention_or_relative_words() {
        let r = DateResolver::new();
        assert_eq!(r.resolve("500 groceries", 2025), None);
        assert_eq!(r.resolve("spent 200 yesterday", 2025), None);
        assert_eq!(r.resolve("marks 500", 2025), None);
        assert_eq!(r.resolve("500 may", 2025), None);
    }
}
