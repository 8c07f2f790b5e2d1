//! Reporting periods: one `(year, quarter)` pair per quarterly data release.

use chrono::{Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::PipelineError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Period {
    pub year: i32,
    pub quarter: u8,
}

impl Period {
    /// Builds a period from explicit values; the quarter must be 1..=4.
    pub fn new(year: i32, quarter: u8) -> Result<Self, PipelineError> {
        if !(1..=4).contains(&quarter) {
            return Err(PipelineError::Config(format!(
                "quarter must be between 1 and 4, got {}",
                quarter
            )));
        }
        Ok(Self { year, quarter })
    }

    /// Quarter containing `date`: `((month - 1) / 3) + 1`.
    pub fn from_date(date: NaiveDate) -> Self {
        let quarter = ((date.month() - 1) / 3 + 1) as u8;
        Self { year: date.year(), quarter }
    }

    /// Period of the current UTC wall-clock date.
    pub fn current() -> Self {
        Self::from_date(Utc::now().date_naive())
    }

    /// Compact identifier used by the upstream archive, e.g. `2023q1`.
    pub fn slug(&self) -> String {
        format!("{}q{}", self.year, self.quarter)
    }

    pub fn archive_name(&self) -> String {
        format!("{}.zip", self.slug())
    }

    /// File name of the published artifact, e.g. `2023_Q1_processed.parquet`.
    pub fn artifact_name(&self) -> String {
        format!("{}_Q{}_processed.parquet", self.year, self.quarter)
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} Q{}", self.year, self.quarter)
    }
}

impl FromStr for Period {
    type Err = PipelineError;

    /// Accepts `2023q1`, `2023Q1` and `2023-Q1`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        let (year, quarter) = lower
            .split_once('q')
            .ok_or_else(|| PipelineError::Config(format!("invalid period '{}'", s)))?;
        let year: i32 = year
            .trim_end_matches('-')
            .parse()
            .map_err(|_| PipelineError::Config(format!("invalid year in period '{}'", s)))?;
        let quarter: u8 = quarter
            .parse()
            .map_err(|_| PipelineError::Config(format!("invalid quarter in period '{}'", s)))?;
        Period::new(year, quarter)
    }
}

/// Statically configured set of periods to iterate, in chronological order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeriodRange {
    pub years: Vec<i32>,
    pub quarters: Vec<u8>,
    /// Latest period known to exist upstream; later periods are skipped silently.
    pub until: Period,
}

impl PeriodRange {
    pub fn new(years: Vec<i32>, quarters: Vec<u8>, until: Period) -> Result<Self, PipelineError> {
        for q in &quarters {
            Period::new(0, *q)?;
        }
        Ok(Self { years, quarters, until })
    }

    /// Single-period range.
    pub fn single(period: Period) -> Self {
        Self { years: vec![period.year], quarters: vec![period.quarter], until: period }
    }

    pub fn periods(&self) -> Vec<Period> {
        let mut out: Vec<Period> = self
            .years
            .iter()
            .flat_map(|y| self.quarters.iter().map(move |q| Period { year: *y, quarter: *q }))
            .filter(|p| *p <= self.until)
            .collect();
        out.sort();
        out.dedup();
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quarter_from_month() {
        let cases = [(1, 1), (3, 1), (4, 2), (6, 2), (7, 3), (9, 3), (10, 4), (12, 4)];
        for (month, quarter) in cases {
            let date = NaiveDate::from_ymd_opt(2024, month, 15).unwrap();
            assert_eq!(Period::from_date(date), Period { year: 2024, quarter });
        }
    }

    #[test]
    fn names_are_derived_from_period() {
        let p = Period::new(2023, 2).unwrap();
        assert_eq!(p.archive_name(), "2023q2.zip");
        assert_eq!(p.artifact_name(), "2023_Q2_processed.parquet");
        assert_eq!(p.to_string(), "2023 Q2");
    }

    #[test]
    fn parses_period_strings() {
        assert_eq!("2024q1".parse::<Period>().unwrap(), Period { year: 2024, quarter: 1 });
        assert_eq!("2024-Q3".parse::<Period>().unwrap(), Period { year: 2024, quarter: 3 });
        assert!("2024q5".parse::<Period>().is_err());
        assert!("garbage".parse::<Period>().is_err());
    }

    #[test]
    fn range_skips_periods_after_cutoff() {
        let until = Period::new(2024, 1).unwrap();
        let range = PeriodRange::new(vec![2023, 2024], vec![1, 2, 3, 4], until).unwrap();
        let periods = range.periods();
        assert_eq!(periods.len(), 5);
        assert_eq!(periods.first(), Some(&Period { year: 2023, quarter: 1 }));
        assert_eq!(periods.last(), Some(&until));
    }
}
