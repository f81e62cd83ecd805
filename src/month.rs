use std::fmt;
use std::str::FromStr;

use anyhow::{bail, Result};
use chrono::{Datelike, Local, NaiveDate};

/// A calendar month, as used by the Hub metrics API and the PID reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Month {
    pub year: i32,
    pub month: u32,
}

impl Month {
    pub fn new(year: i32, month: u32) -> Result<Self> {
        if !(1..=12).contains(&month) {
            bail!("Month out of range: {month}");
        }
        Ok(Self { year, month })
    }

    pub fn current() -> Self {
        Local::now().date_naive().into()
    }

    /// The most recent month that has fully elapsed.
    pub fn previous() -> Self {
        Self::current().prev()
    }

    pub fn next(self) -> Self {
        if self.month == 12 {
            Self {
                year: self.year + 1,
                month: 1,
            }
        } else {
            Self {
                month: self.month + 1,
                ..self
            }
        }
    }

    pub fn prev(self) -> Self {
        if self.month == 1 {
            Self {
                year: self.year - 1,
                month: 12,
            }
        } else {
            Self {
                month: self.month - 1,
                ..self
            }
        }
    }

    /// `MM_YYYY`, the spelling used in report file names.
    pub fn underscored(&self) -> String {
        format!("{:02}_{:04}", self.month, self.year)
    }

    /// Parses the `MM_YYYY` spelling.
    pub fn parse_underscored(s: &str) -> Result<Self> {
        let parsed = s
            .trim()
            .split_once('_')
            .and_then(|(m, y)| Some((y.parse::<i32>().ok()?, m.parse::<u32>().ok()?)));
        match parsed {
            Some((year, month)) => Self::new(year, month),
            None => bail!("Invalid month: {s}. Expected format is MM_YYYY."),
        }
    }
}

impl From<NaiveDate> for Month {
    fn from(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }
}

impl FromStr for Month {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match NaiveDate::parse_from_str(&format!("{s}-01"), "%Y-%m-%d") {
            Ok(date) if s.len() == 7 => Ok(date.into()),
            _ => bail!("Invalid date format: {s}. Expected format is YYYY-MM."),
        }
    }
}

impl fmt::Display for Month {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

/// The `fromDate`/`toDate` pair covering exactly one month.
pub fn window_query(month: Month) -> String {
    format!("fromDate={month}&toDate={}", month.next())
}
