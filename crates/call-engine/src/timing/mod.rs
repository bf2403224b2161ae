//! Timing rule evaluation
//!
//! Queues carry operating hours and agents carry shift windows, both written
//! in a small rule language. A rule string is either `24/7` or a
//! pipe-separated list of rules of the form `<time-ranges>;<day-spec>`:
//!
//! ```text
//! 09:00-12:00,13:00-17:30;Mon-Fri
//! 10:00-16:00;Sat,Sun
//! ```
//!
//! Any rule admitting an instant admits the whole string. Within a time
//! range the start minute is inclusive and the end minute exclusive; an end
//! of `00:00` with a nonzero start means end of day. Day ranges wrap across
//! the week boundary (`Fri-Mon` covers Fri, Sat, Sun, Mon). An inverted
//! range on a single day (`22:00-02:00`) admits nothing; overnight windows
//! are written as two day-rules joined with `|`.
//!
//! Malformed rules, ranges, and day segments are skipped with a warning, so
//! one bad segment never takes a whole queue out of service.

use chrono::{DateTime, Datelike, TimeZone, Timelike};
use tracing::warn;

/// Minutes in a day; the exclusive upper bound of any time range.
const END_OF_DAY: u16 = 1440;

/// Day names in store order, `Sun` first.
const DAY_NAMES: [&str; 7] = ["sun", "mon", "tue", "wed", "thu", "fri", "sat"];

/// A parsed timing rule string
///
/// Parsing never fails: unusable segments are dropped with a warning and an
/// empty or fully-malformed string admits no instant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimingRules {
    always: bool,
    rules: Vec<TimingRule>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct TimingRule {
    ranges: Vec<MinuteRange>,
    /// Bitmask over day indices, bit 0 = Sun.
    days: u8,
}

/// Minute-of-day range, start inclusive, end exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct MinuteRange {
    start: u16,
    end: u16,
}

impl TimingRules {
    /// Parse a rule string
    pub fn parse(input: &str) -> Self {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Self { always: false, rules: Vec::new() };
        }
        if trimmed.eq_ignore_ascii_case("24/7") {
            return Self { always: true, rules: Vec::new() };
        }

        let mut rules = Vec::new();
        for rule_text in trimmed.split('|') {
            match parse_rule(rule_text) {
                Some(rule) => rules.push(rule),
                None => warn!("Skipping malformed timing rule: {:?}", rule_text),
            }
        }
        Self { always: false, rules }
    }

    /// Does any rule admit this instant?
    pub fn admits<Tz: TimeZone>(&self, instant: &DateTime<Tz>) -> bool {
        if self.always {
            return true;
        }
        let day_bit = 1u8 << instant.weekday().num_days_from_sunday();
        let minute = (instant.hour() * 60 + instant.minute()) as u16;

        self.rules.iter().any(|rule| {
            rule.days & day_bit != 0
                && rule
                    .ranges
                    .iter()
                    .any(|range| minute >= range.start && minute < range.end)
        })
    }

    /// True when no instant can be admitted
    pub fn is_empty(&self) -> bool {
        !self.always && self.rules.iter().all(|rule| rule.ranges.is_empty())
    }
}

fn parse_rule(text: &str) -> Option<TimingRule> {
    let mut parts = text.trim().splitn(2, ';');
    let ranges_text = parts.next()?.trim();
    let days_text = parts.next()?.trim();
    if ranges_text.is_empty() || days_text.is_empty() {
        return None;
    }

    let mut ranges = Vec::new();
    for range_text in ranges_text.split(',') {
        match parse_range(range_text) {
            Some(range) => ranges.push(range),
            None => warn!("Skipping malformed time range: {:?}", range_text),
        }
    }

    let mut days = 0u8;
    for segment in days_text.split(',') {
        match parse_day_segment(segment) {
            Some(bits) => days |= bits,
            None => warn!("Skipping malformed day segment: {:?}", segment),
        }
    }

    if ranges.is_empty() || days == 0 {
        return None;
    }
    Some(TimingRule { ranges, days })
}

fn parse_range(text: &str) -> Option<MinuteRange> {
    let mut parts = text.trim().splitn(2, '-');
    let start = parse_minute(parts.next()?)?;
    let mut end = parse_minute(parts.next()?)?;

    // An end of 00:00 after a nonzero start means end of day.
    if end == 0 && start != 0 {
        end = END_OF_DAY;
    }
    if start > end {
        warn!(
            "Inverted time range {:?} admits nothing; split overnight windows into per-day rules",
            text.trim()
        );
        return None;
    }
    Some(MinuteRange { start, end })
}

fn parse_minute(text: &str) -> Option<u16> {
    let mut parts = text.trim().splitn(2, ':');
    let hours: u16 = parts.next()?.trim().parse().ok()?;
    let minutes: u16 = parts.next()?.trim().parse().ok()?;
    if hours > 24 || minutes > 59 {
        return None;
    }
    let total = hours * 60 + minutes;
    // 24:00 is accepted as a spelling of end of day.
    if total > END_OF_DAY {
        return None;
    }
    Some(total)
}

fn parse_day_segment(text: &str) -> Option<u8> {
    let segment = text.trim();
    if let Some((start_name, end_name)) = segment.split_once('-') {
        let start = day_index(start_name)?;
        let end = day_index(end_name)?;
        let mut bits = 0u8;
        let mut day = start;
        loop {
            bits |= 1 << day;
            if day == end {
                break;
            }
            day = (day + 1) % 7;
        }
        Some(bits)
    } else {
        day_index(segment).map(|day| 1 << day)
    }
}

fn day_index(name: &str) -> Option<u8> {
    let lower = name.trim().to_ascii_lowercase();
    DAY_NAMES.iter().position(|d| *d == lower).map(|i| i as u8)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    // 2026-01-05 is a Monday; 2026-01-03 a Saturday; 2026-01-04 a Sunday.
    fn at(day: u32, hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, day, hour, minute, 0).unwrap()
    }

    #[test]
    fn always_admits_every_instant() {
        let rules = TimingRules::parse("24/7");
        assert!(rules.admits(&at(5, 0, 0)));
        assert!(rules.admits(&at(3, 23, 59)));
        assert!(TimingRules::parse(" 24/7 ").admits(&at(4, 12, 0)));
    }

    #[test]
    fn weekday_window() {
        let rules = TimingRules::parse("09:00-17:00;Mon-Fri");
        assert!(rules.admits(&at(5, 9, 0)));
        assert!(rules.admits(&at(5, 16, 59)));
        // End minute is exclusive.
        assert!(!rules.admits(&at(5, 17, 0)));
        assert!(!rules.admits(&at(5, 8, 59)));
        // Saturday is outside the day set.
        assert!(!rules.admits(&at(3, 14, 0)));
    }

    #[test]
    fn day_range_wraps_week_boundary() {
        let rules = TimingRules::parse("00:00-24:00;Fri-Mon");
        assert!(rules.admits(&at(2, 12, 0))); // Fri
        assert!(rules.admits(&at(3, 12, 0))); // Sat
        assert!(rules.admits(&at(4, 12, 0))); // Sun
        assert!(rules.admits(&at(5, 12, 0))); // Mon
        assert!(!rules.admits(&at(6, 12, 0))); // Tue
    }

    #[test]
    fn zero_end_means_end_of_day() {
        let rules = TimingRules::parse("22:00-00:00;Mon");
        assert!(rules.admits(&at(5, 22, 0)));
        assert!(rules.admits(&at(5, 23, 59)));
        assert!(!rules.admits(&at(5, 21, 59)));
    }

    #[test]
    fn inverted_range_admits_nothing() {
        let rules = TimingRules::parse("22:00-02:00;Mon");
        assert!(!rules.admits(&at(5, 23, 0)));
        assert!(!rules.admits(&at(5, 1, 0)));
        // The supported overnight spelling.
        let split = TimingRules::parse("22:00-00:00;Mon|00:00-02:00;Tue");
        assert!(split.admits(&at(5, 23, 0)));
        assert!(split.admits(&at(6, 1, 0)));
        assert!(!split.admits(&at(6, 3, 0)));
    }

    #[test]
    fn multiple_ranges_and_rules_union() {
        let rules = TimingRules::parse("09:00-12:00,13:00-17:00;Mon-Fri|10:00-14:00;Sat");
        assert!(rules.admits(&at(5, 9, 30)));
        assert!(!rules.admits(&at(5, 12, 30)));
        assert!(rules.admits(&at(5, 13, 0)));
        assert!(rules.admits(&at(3, 11, 0)));
        assert!(!rules.admits(&at(4, 11, 0)));
    }

    #[test]
    fn adding_a_rule_is_monotone() {
        let narrow = TimingRules::parse("09:00-17:00;Mon-Fri");
        let wide = TimingRules::parse("09:00-17:00;Mon-Fri|00:00-24:00;Sat");
        for (day, hour) in [(5u32, 10u32), (5, 18), (3, 10), (4, 10)] {
            let instant = at(day, hour, 0);
            if narrow.admits(&instant) {
                assert!(wide.admits(&instant));
            }
        }
    }

    #[test]
    fn malformed_segments_are_skipped() {
        // Bad range in one rule does not break the other rule.
        let rules = TimingRules::parse("9am-5pm;Mon|10:00-12:00;Tue");
        assert!(!rules.admits(&at(5, 10, 0)));
        assert!(rules.admits(&at(6, 10, 0)));

        // Unknown day names are dropped from the segment list.
        let rules = TimingRules::parse("10:00-12:00;Funday,Wed");
        assert!(rules.admits(&at(7, 11, 0)));
    }

    #[test]
    fn empty_input_admits_nothing() {
        assert!(!TimingRules::parse("").admits(&at(5, 12, 0)));
        assert!(!TimingRules::parse("   ").admits(&at(5, 12, 0)));
        assert!(TimingRules::parse("").is_empty());
    }
}
