//! Static lookup table of named multi-year phenomena.
//!
//! A named period ("El Niño", "La Niña", ...) resolves to a fixed list of
//! disjoint, chronologically sorted intervals. The built-in table can be
//! extended or overridden from [`ExtractorConfig`](crate::ExtractorConfig).

use chrono::NaiveDate;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::ops::Range;

use crate::types::TemporalInterval;

/// A recurring phenomenon with pre-defined active intervals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedPeriod {
    /// Canonical display name.
    pub name: String,
    /// Phrases that refer to this period, matched case-insensitively on
    /// word boundaries. The name itself always matches.
    #[serde(default)]
    pub aliases: Vec<String>,
    /// Disjoint intervals in chronological order.
    pub intervals: Vec<TemporalInterval>,
}

impl NamedPeriod {
    /// Checks the name is non-empty and the intervals are closed, sorted and
    /// disjoint.
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("named period has an empty name".into());
        }
        if self.intervals.is_empty() {
            return Err(format!("named period `{}` has no intervals", self.name));
        }
        for interval in &self.intervals {
            if interval.start.is_none() || interval.end.is_none() {
                return Err(format!(
                    "named period `{}` contains an open-ended interval",
                    self.name
                ));
            }
        }
        for pair in self.intervals.windows(2) {
            if pair[0].end >= pair[1].start {
                return Err(format!(
                    "named period `{}` intervals must be sorted and disjoint",
                    self.name
                ));
            }
        }
        Ok(())
    }

    fn phrases(&self) -> impl Iterator<Item = String> + '_ {
        std::iter::once(&self.name)
            .chain(self.aliases.iter())
            .map(|phrase| normalize_ws(&phrase.to_lowercase()))
    }
}

/// `(name, aliases, [(start y/m/d, end y/m/d)])`
type PeriodSeed = (
    &'static str,
    &'static [&'static str],
    &'static [((i32, u32, u32), (i32, u32, u32))],
);

const BUILTIN: &[PeriodSeed] = &[
    (
        "El Niño",
        &["el nino", "el niño events", "el nino events"],
        &[
            ((1982, 4, 1), (1983, 6, 30)),
            ((1997, 5, 1), (1998, 5, 31)),
            ((2015, 3, 1), (2016, 5, 31)),
            ((2023, 6, 1), (2024, 5, 31)),
        ],
    ),
    (
        "La Niña",
        &["la nina", "la niña events", "la nina events"],
        &[
            ((1988, 5, 1), (1989, 5, 31)),
            ((1998, 7, 1), (2001, 3, 31)),
            ((2010, 6, 1), (2011, 5, 31)),
            ((2020, 8, 1), (2023, 3, 31)),
        ],
    ),
    (
        "Global warming hiatus",
        &["warming hiatus", "hiatus period"],
        &[((1998, 1, 1), (2012, 12, 31))],
    ),
];

fn ymd((y, m, d): (i32, u32, u32)) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(y, m, d)
}

/// The built-in named periods.
pub fn builtin_periods() -> Vec<NamedPeriod> {
    BUILTIN
        .iter()
        .map(|(name, aliases, spans)| NamedPeriod {
            name: (*name).to_string(),
            aliases: aliases.iter().map(|a| (*a).to_string()).collect(),
            intervals: spans
                .iter()
                .filter_map(|(s, e)| TemporalInterval::closed(ymd(*s)?, ymd(*e)?))
                .collect(),
        })
        .collect()
}

/// A compiled set of named periods.
#[derive(Debug, Clone)]
pub struct NamedPeriodTable {
    periods: Vec<NamedPeriod>,
    /// Lowercased phrase → index into `periods`, longest phrase first.
    phrases: Vec<(String, usize)>,
    pattern: Option<Regex>,
}

impl NamedPeriodTable {
    /// Compile a table. Later entries replace earlier ones with the same
    /// (case-insensitive) name.
    pub fn new(periods: Vec<NamedPeriod>) -> Self {
        let mut merged: Vec<NamedPeriod> = Vec::with_capacity(periods.len());
        for period in periods {
            match merged
                .iter_mut()
                .find(|p| p.name.eq_ignore_ascii_case(&period.name))
            {
                Some(existing) => *existing = period,
                None => merged.push(period),
            }
        }

        let mut phrases: Vec<(String, usize)> = merged
            .iter()
            .enumerate()
            .flat_map(|(i, p)| p.phrases().map(move |phrase| (phrase, i)))
            .filter(|(phrase, _)| !phrase.trim().is_empty())
            .collect();
        phrases.sort_by(|a, b| b.0.len().cmp(&a.0.len()).then_with(|| a.0.cmp(&b.0)));
        phrases.dedup_by(|a, b| a.0 == b.0);

        let pattern = if phrases.is_empty() {
            None
        } else {
            let alternation = phrases
                .iter()
                .map(|(phrase, _)| regex::escape(phrase).replace(' ', r"\s+"))
                .collect::<Vec<_>>()
                .join("|");
            Regex::new(&format!(r"(?i)\b(?:{alternation})\b")).ok()
        };

        Self {
            periods: merged,
            phrases,
            pattern,
        }
    }

    /// The built-in table.
    pub fn builtin() -> Self {
        Self::new(builtin_periods())
    }

    /// The built-in table extended with `extra`.
    pub fn with_extra(extra: &[NamedPeriod]) -> Self {
        let mut periods = builtin_periods();
        periods.extend(extra.iter().cloned());
        Self::new(periods)
    }

    /// All periods in the table.
    pub fn periods(&self) -> &[NamedPeriod] {
        &self.periods
    }

    /// Look up a period by name or alias.
    pub fn get(&self, phrase: &str) -> Option<&NamedPeriod> {
        let wanted = normalize_ws(&phrase.to_lowercase());
        self.phrases
            .iter()
            .find(|(p, _)| *p == wanted)
            .map(|(_, i)| &self.periods[*i])
    }

    /// Find the first mention of any period in `text`.
    pub fn find(&self, text: &str) -> Option<(Range<usize>, &NamedPeriod)> {
        let pattern = self.pattern.as_ref()?;
        let m = pattern.find(text)?;
        let period = self.get(m.as_str())?;
        Some((m.range(), period))
    }
}

impl Default for NamedPeriodTable {
    fn default() -> Self {
        Self::builtin()
    }
}

fn normalize_ws(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}
