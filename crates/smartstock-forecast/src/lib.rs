//! Demand forecasting and restock planning.

pub mod demand;
pub mod forecast;
pub mod patterns;
pub mod restock;

pub use demand::{historical_demand, DemandProfile};
pub use forecast::{round_demand, DemandForecaster, ForecastRequest};
pub use patterns::{festival_patterns, FestivalPattern};
pub use restock::{summarize, top_categories, CategoryFocus, RestockPlanner};

pub const CRATE_NAME: &str = "smartstock-forecast";

/// Number of categories the restock focus list reports.
pub const FOCUS_CATEGORIES: usize = 3;
