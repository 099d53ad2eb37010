//! Temporal expression rules.
//!
//! Each [`TemporalRule`] recognises one class of expression and resolves it
//! against the reference date in [`TemporalContext`]. The extractor tries the
//! rules in [`TemporalRule::ORDERED`] order and keeps the first hit.

use chrono::{Datelike, Days, Months, NaiveDate};
use regex::{Captures, Regex};
use std::sync::OnceLock;

use super::periods::NamedPeriodTable;
use super::Hit;
use crate::types::TemporalInterval;

const MONTH: &str = r"(?:jan(?:uary)?|feb(?:ruary)?|mar(?:ch)?|apr(?:il)?|may|june?|july?|aug(?:ust)?|sep(?:t(?:ember)?)?|oct(?:ober)?|nov(?:ember)?|dec(?:ember)?)";
const YEAR: &str = r"(?:19|20)\d{2}";
const COUNT: &str = r"\d{1,3}|one|two|three|four|five|six|seven|eight|nine|ten|eleven|twelve|fifteen|twenty|thirty|fifty";
const MAX_SEASONS: u32 = 200;

/// Inputs a temporal rule resolves against.
#[derive(Debug, Clone, Copy)]
pub struct TemporalContext<'a> {
    pub today: NaiveDate,
    pub periods: &'a NamedPeriodTable,
}

/// Which end of a date token's period to resolve to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bound {
    /// First day of the period (`2020` → 2020-01-01).
    Start,
    /// Last day of the period (`2020` → 2020-12-31).
    End,
}

/// One class of temporal expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemporalRule {
    /// A phenomenon from the named-period table ("El Niño").
    NamedPeriod,
    /// `from X to Y`, `between X and Y`, `X/Y`, `2019-2021`.
    ExplicitRange,
    /// `last N summers`, `past winter`.
    SeasonalRelative,
    /// `last N years`, `last month`, `today`, `this year`.
    Relative,
    /// `since X`, `after X`, `before X`.
    OpenEnded,
    /// `in 2021`, `during June 2020`.
    SinglePeriod,
    /// Any date token on its own.
    BareDate,
}

impl TemporalRule {
    /// Rules in evaluation order.
    pub const ORDERED: &'static [TemporalRule] = &[
        Self::NamedPeriod,
        Self::ExplicitRange,
        Self::SeasonalRelative,
        Self::Relative,
        Self::OpenEnded,
        Self::SinglePeriod,
        Self::BareDate,
    ];

    /// Short rule name for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Self::NamedPeriod => "named_period",
            Self::ExplicitRange => "explicit_range",
            Self::SeasonalRelative => "seasonal_relative",
            Self::Relative => "relative",
            Self::OpenEnded => "open_ended",
            Self::SinglePeriod => "single_period",
            Self::BareDate => "bare_date",
        }
    }

    /// Apply this rule to `text`, returning the resolved intervals and the
    /// byte span of the matched expression.
    pub fn apply(&self, text: &str, ctx: &TemporalContext<'_>) -> Option<Hit<Vec<TemporalInterval>>> {
        match self {
            Self::NamedPeriod => {
                let (span, period) = ctx.periods.find(text)?;
                Some(Hit {
                    value: period.intervals.clone(),
                    span,
                })
            }
            Self::ExplicitRange => first_hit(range_patterns(), text, |caps| {
                let start = parse_date(caps.get(1)?.as_str(), Bound::Start)?;
                let end = parse_date(caps.get(2)?.as_str(), Bound::End)?;
                TemporalInterval::closed(start, end).map(|i| vec![i])
            }),
            Self::SeasonalRelative => first_hit(seasonal_patterns(), text, |caps| {
                let count = caps.get(1).map_or(Some(1), |m| parse_count(m.as_str()))?;
                let season = Season::parse(caps.get(2)?.as_str())?;
                last_seasons(season, count, ctx.today)
            }),
            Self::Relative => first_hit(relative_patterns(), text, |caps| {
                resolve_relative(caps, ctx.today).map(|i| vec![i])
            }),
            Self::OpenEnded => first_hit(open_ended_patterns(), text, |caps| {
                let keyword = caps.get(1)?.as_str().to_lowercase();
                let token = caps.get(2)?.as_str();
                resolve_open_ended(&keyword, token, ctx.today).map(|i| vec![i])
            }),
            Self::SinglePeriod => first_hit(single_patterns(), text, |caps| {
                period_of(caps.get(1)?.as_str()).map(|i| vec![i])
            }),
            Self::BareDate => first_hit(bare_patterns(), text, |caps| {
                period_of(caps.get(1)?.as_str()).map(|i| vec![i])
            }),
        }
    }
}

/// Run every pattern in order over `text` and return the first match that
/// `resolve` accepts.
fn first_hit<F>(patterns: &[Regex], text: &str, resolve: F) -> Option<Hit<Vec<TemporalInterval>>>
where
    F: Fn(&Captures<'_>) -> Option<Vec<TemporalInterval>>,
{
    for pattern in patterns {
        for caps in pattern.captures_iter(text) {
            let Some(whole) = caps.get(0) else { continue };
            if inside_number(text, whole.start()) {
                continue;
            }
            if let Some(value) = resolve(&caps).filter(|v| !v.is_empty()) {
                return Some(Hit {
                    value,
                    span: whole.range(),
                });
            }
        }
    }
    None
}

/// A match starting right after a digit or decimal point is the tail of a
/// number such as `37.2019`, not a date.
fn inside_number(text: &str, start: usize) -> bool {
    text[..start]
        .chars()
        .next_back()
        .is_some_and(|c| c == '.' || c.is_ascii_digit())
}

// ── Patterns ────────────────────────────────────────────────────────────

fn date_token() -> String {
    format!(
        r"\b(?:{YEAR}[-/]\d{{1,2}}[-/]\d{{1,2}}|{MONTH}\.?\s+\d{{1,2}}(?:st|nd|rd|th)?,?\s+{YEAR}|\d{{1,2}}(?:st|nd|rd|th)?\s+{MONTH}\.?,?\s+{YEAR}|{MONTH}\.?,?\s+{YEAR}|{YEAR}-\d{{1,2}}|{YEAR})\b"
    )
}

fn compile(cell: &'static OnceLock<Vec<Regex>>, sources: impl FnOnce() -> Vec<String>) -> &'static [Regex] {
    cell.get_or_init(|| {
        sources()
            .iter()
            .filter_map(|p| Regex::new(p).ok())
            .collect()
    })
}

fn range_sources() -> Vec<String> {
    let date = date_token();
    vec![
        format!(
            r"(?i)\b(?:from|between)\s+({date})\s*(?:\bto\b|\band\b|\buntil\b|\btill\b|\bthrough\b|\bthru\b|-|–)\s*({date})"
        ),
        format!(r"(?i)({date})\s*(?:/|--|–|\bto\b|\buntil\b|\bthrough\b)\s*({date})"),
        format!(r"(?i)\b({YEAR})\s*[-–]\s*({YEAR})\b"),
    ]
}

fn seasonal_sources() -> Vec<String> {
    vec![format!(
        r"(?i)\b(?:last|past|previous|recent)\s+(?:({COUNT})\s+)?(summers?|winters?|springs?|autumns?|falls?)\b"
    )]
}

fn relative_sources() -> Vec<String> {
    vec![
        format!(
            r"(?i)\b(?:last|past|previous)\s+({COUNT})\s+(days?|weeks?|months?|years?|decades?)\b"
        ),
        r"(?i)\b(?:last|past|previous)\s+()(day|week|month|year|decade)\b".to_string(),
        r"(?i)\b()(today|yesterday|this\s+week|this\s+month|this\s+year)\b".to_string(),
    ]
}

fn open_ended_sources() -> Vec<String> {
    let date = date_token();
    vec![format!(
        r"(?i)\b(since|after|before|until|till|prior\s+to)\s+({date})"
    )]
}

fn single_sources() -> Vec<String> {
    let date = date_token();
    vec![format!(
        r"(?i)\b(?:in|during|for|from|of|throughout|within)\s+({date})"
    )]
}

fn bare_sources() -> Vec<String> {
    vec![format!(r"(?i)({})", date_token())]
}

fn range_patterns() -> &'static [Regex] {
    static CELL: OnceLock<Vec<Regex>> = OnceLock::new();
    compile(&CELL, range_sources)
}

fn seasonal_patterns() -> &'static [Regex] {
    static CELL: OnceLock<Vec<Regex>> = OnceLock::new();
    compile(&CELL, seasonal_sources)
}

fn relative_patterns() -> &'static [Regex] {
    static CELL: OnceLock<Vec<Regex>> = OnceLock::new();
    compile(&CELL, relative_sources)
}

fn open_ended_patterns() -> &'static [Regex] {
    static CELL: OnceLock<Vec<Regex>> = OnceLock::new();
    compile(&CELL, open_ended_sources)
}

fn single_patterns() -> &'static [Regex] {
    static CELL: OnceLock<Vec<Regex>> = OnceLock::new();
    compile(&CELL, single_sources)
}

fn bare_patterns() -> &'static [Regex] {
    static CELL: OnceLock<Vec<Regex>> = OnceLock::new();
    compile(&CELL, bare_sources)
}

fn date_parts() -> Option<&'static Regex> {
    static CELL: OnceLock<Option<Regex>> = OnceLock::new();
    CELL.get_or_init(|| {
        Regex::new(&format!(
            r"(?i)^(?:(?P<y1>{YEAR})[-/](?P<m1>\d{{1,2}})[-/](?P<d1>\d{{1,2}})|(?P<mon2>{MONTH})\.?\s+(?P<d2>\d{{1,2}})(?:st|nd|rd|th)?,?\s+(?P<y2>{YEAR})|(?P<d3>\d{{1,2}})(?:st|nd|rd|th)?\s+(?P<mon3>{MONTH})\.?,?\s+(?P<y3>{YEAR})|(?P<mon4>{MONTH})\.?,?\s+(?P<y4>{YEAR})|(?P<y5>{YEAR})-(?P<m5>\d{{1,2}})|(?P<y6>{YEAR}))$"
        ))
        .ok()
    })
    .as_ref()
}

// ── Date tokens ─────────────────────────────────────────────────────────

/// Parse one date token, resolving coarse tokens (a year, a month) to the
/// first or last day of their period.
pub fn parse_date(token: &str, bound: Bound) -> Option<NaiveDate> {
    let caps = date_parts()?.captures(token.trim())?;
    let num = |name: &str| caps.name(name).and_then(|m| m.as_str().parse::<u32>().ok());
    let year = |name: &str| caps.name(name).and_then(|m| m.as_str().parse::<i32>().ok());
    let month = |name: &str| caps.name(name).and_then(|m| month_number(m.as_str()));

    if let (Some(y), Some(m), Some(d)) = (year("y1"), num("m1"), num("d1")) {
        return NaiveDate::from_ymd_opt(y, m, d);
    }
    if let (Some(y), Some(m), Some(d)) = (year("y2"), month("mon2"), num("d2")) {
        return NaiveDate::from_ymd_opt(y, m, d);
    }
    if let (Some(y), Some(m), Some(d)) = (year("y3"), month("mon3"), num("d3")) {
        return NaiveDate::from_ymd_opt(y, m, d);
    }
    if let (Some(y), Some(m)) = (year("y4"), month("mon4")) {
        return month_bound(y, m, bound);
    }
    if let (Some(y), Some(m)) = (year("y5"), num("m5")) {
        return month_bound(y, m, bound);
    }
    let y = year("y6")?;
    match bound {
        Bound::Start => NaiveDate::from_ymd_opt(y, 1, 1),
        Bound::End => NaiveDate::from_ymd_opt(y, 12, 31),
    }
}

/// The whole period a date token names: a day, a month or a year.
fn period_of(token: &str) -> Option<TemporalInterval> {
    TemporalInterval::closed(parse_date(token, Bound::Start)?, parse_date(token, Bound::End)?)
}

fn month_number(name: &str) -> Option<u32> {
    let prefix: String = name.chars().take(3).collect::<String>().to_lowercase();
    let month = match prefix.as_str() {
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
    Some(month)
}

fn month_bound(year: i32, month: u32, bound: Bound) -> Option<NaiveDate> {
    match bound {
        Bound::Start => NaiveDate::from_ymd_opt(year, month, 1),
        Bound::End => last_day_of_month(year, month),
    }
}

/// Last calendar day of `month` in `year`.
pub fn last_day_of_month(year: i32, month: u32) -> Option<NaiveDate> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)?;
    first.checked_add_months(Months::new(1))?.pred_opt()
}

fn parse_count(raw: &str) -> Option<u32> {
    let lower = raw.to_lowercase();
    let count = match lower.as_str() {
        "one" => 1,
        "two" => 2,
        "three" => 3,
        "four" => 4,
        "five" => 5,
        "six" => 6,
        "seven" => 7,
        "eight" => 8,
        "nine" => 9,
        "ten" => 10,
        "eleven" => 11,
        "twelve" => 12,
        "fifteen" => 15,
        "twenty" => 20,
        "thirty" => 30,
        "fifty" => 50,
        digits => digits.parse().ok()?,
    };
    Some(count)
}

// ── Relative expressions ────────────────────────────────────────────────

/// A meteorological season.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Season {
    Spring,
    Summer,
    Autumn,
    Winter,
}

impl Season {
    fn parse(word: &str) -> Option<Self> {
        let lower = word.to_lowercase();
        let season = match lower.trim_end_matches('s') {
            "spring" => Self::Spring,
            "summer" => Self::Summer,
            "autumn" | "fall" => Self::Autumn,
            "winter" => Self::Winter,
            _ => return None,
        };
        Some(season)
    }

    /// The season ending in `year`. Winter starts in December of the
    /// previous year.
    pub fn in_year(&self, year: i32) -> Option<TemporalInterval> {
        let (start, end) = match self {
            Self::Spring => (NaiveDate::from_ymd_opt(year, 3, 1)?, NaiveDate::from_ymd_opt(year, 5, 31)?),
            Self::Summer => (NaiveDate::from_ymd_opt(year, 6, 1)?, NaiveDate::from_ymd_opt(year, 8, 31)?),
            Self::Autumn => (NaiveDate::from_ymd_opt(year, 9, 1)?, NaiveDate::from_ymd_opt(year, 11, 30)?),
            Self::Winter => (NaiveDate::from_ymd_opt(year - 1, 12, 1)?, last_day_of_month(year, 2)?),
        };
        TemporalInterval::closed(start, end)
    }
}

/// The `count` most recent occurrences of `season` that ended on or before
/// `today`, oldest first.
pub fn last_seasons(season: Season, count: u32, today: NaiveDate) -> Option<Vec<TemporalInterval>> {
    if count == 0 || count > MAX_SEASONS {
        return None;
    }
    let mut latest = today.year();
    if season.in_year(latest)?.end? > today {
        latest -= 1;
    }
    let first = latest - (count as i32 - 1);
    (first..=latest).map(|year| season.in_year(year)).collect()
}

/// Step back `count` units from `today`.
pub fn shift_back(today: NaiveDate, count: u32, unit: &str) -> Option<NaiveDate> {
    let unit = unit.to_lowercase();
    match unit.trim_end_matches('s') {
        "day" => today.checked_sub_days(Days::new(u64::from(count))),
        "week" => today.checked_sub_days(Days::new(7 * u64::from(count))),
        "month" => today.checked_sub_months(Months::new(count)),
        "year" => today.checked_sub_months(Months::new(count.checked_mul(12)?)),
        "decade" => today.checked_sub_months(Months::new(count.checked_mul(120)?)),
        _ => None,
    }
}

fn resolve_relative(caps: &Captures<'_>, today: NaiveDate) -> Option<TemporalInterval> {
    let unit = caps.get(2)?.as_str().to_lowercase();
    let unit = unit.split_whitespace().collect::<Vec<_>>().join(" ");
    let count = caps
        .get(1)
        .map(|m| m.as_str())
        .filter(|s| !s.is_empty())
        .map_or(Some(1), parse_count)?;

    match unit.as_str() {
        "today" => TemporalInterval::closed(today, today),
        "yesterday" => TemporalInterval::closed(today.pred_opt()?, today),
        "this week" => {
            let offset = u64::from(today.weekday().num_days_from_monday());
            TemporalInterval::closed(today.checked_sub_days(Days::new(offset))?, today)
        }
        "this month" => TemporalInterval::closed(today.with_day(1)?, today),
        "this year" => TemporalInterval::closed(NaiveDate::from_ymd_opt(today.year(), 1, 1)?, today),
        _ => {
            if count == 0 {
                return None;
            }
            TemporalInterval::closed(shift_back(today, count, &unit)?, today)
        }
    }
}

fn resolve_open_ended(keyword: &str, token: &str, today: NaiveDate) -> Option<TemporalInterval> {
    let keyword = keyword.split_whitespace().collect::<Vec<_>>().join(" ");
    match keyword.as_str() {
        "since" | "after" => {
            let start = if keyword == "since" {
                parse_date(token, Bound::Start)?
            } else {
                parse_date(token, Bound::End)?.succ_opt()?
            };
            // A start in the future leaves the end open.
            let end = (start <= today).then_some(today);
            TemporalInterval::new(Some(start), end)
        }
        "before" | "prior to" => {
            let end = parse_date(token, Bound::Start)?.pred_opt()?;
            TemporalInterval::new(None, Some(end))
        }
        "until" | "till" => TemporalInterval::new(None, Some(parse_date(token, Bound::End)?)),
        _ => None,
    }
}
