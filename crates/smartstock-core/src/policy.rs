//! Fixed heuristic constants for health scoring, flagging and forecasting.
//!
//! The weights are a business heuristic, not a fitted model. Defaults must stay
//! exactly as they are; a policy file may restate them but is not meant for tuning.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

fn default_reference_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 7, 1).unwrap_or(NaiveDate::MIN)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthPolicy {
    pub dead_stock_penalty: i64,
    pub overstock_penalty: i64,
    pub understock_penalty: i64,
    pub balanced_ratio_min: f64,
    pub balanced_ratio_max: f64,
    pub balanced_ratio_bonus: i64,
    pub trend_bonus_threshold: f64,
    pub trend_bonus: i64,
    pub overstock_ratio: f64,
    pub understock_min_sold: i64,
    /// Recency calculations use this date instead of the wall clock.
    pub reference_date: NaiveDate,
    pub last_week_days: u32,
    pub top_n: usize,
    pub overstock_top_n: usize,
}

impl Default for HealthPolicy {
    fn default() -> Self {
        Self {
            dead_stock_penalty: 5,
            overstock_penalty: 3,
            understock_penalty: 2,
            balanced_ratio_min: 0.5,
            balanced_ratio_max: 1.5,
            balanced_ratio_bonus: 10,
            trend_bonus_threshold: 150.0,
            trend_bonus: 5,
            overstock_ratio: 2.0,
            understock_min_sold: 10,
            reference_date: default_reference_date(),
            last_week_days: 7,
            top_n: 5,
            overstock_top_n: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForecastPolicy {
    pub festival_multiplier: f64,
    pub trailing_window_days: u32,
    pub low_demand_buffer: i64,
    pub max_months: usize,
}

impl Default for ForecastPolicy {
    fn default() -> Self {
        Self {
            festival_multiplier: 1.2,
            trailing_window_days: 365,
            low_demand_buffer: 5,
            max_months: 12,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyticsPolicy {
    pub health: HealthPolicy,
    pub forecast: ForecastPolicy,
}
