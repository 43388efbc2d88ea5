use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::SalesRecord;

/// Aggregation window over the append-only sales log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LookbackWindow {
    /// Every row, including rows whose date did not parse.
    Unbounded,
    /// The `n` calendar days ending at (and including) the evaluation date.
    TrailingDays(u32),
}

impl LookbackWindow {
    pub fn contains(&self, sales_date: Option<NaiveDate>, as_of: NaiveDate) -> bool {
        match self {
            LookbackWindow::Unbounded => true,
            LookbackWindow::TrailingDays(days) => match sales_date {
                Some(date) => date <= as_of && date > as_of - Duration::days(i64::from(*days)),
                None => false,
            },
        }
    }

    pub fn select<'a>(&self, sales: &'a [SalesRecord], as_of: NaiveDate) -> Vec<&'a SalesRecord> {
        sales
            .iter()
            .filter(|s| self.contains(s.sales_date, as_of))
            .collect()
    }
}
