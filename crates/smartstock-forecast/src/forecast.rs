use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use chrono::{Datelike, NaiveDate};
use smartstock_core::{
    next_month, DemandForecast, FestivalTag, ForecastEntry, ForecastPolicy, LookbackWindow,
    MonthForecast, PipelineError, Product, ProductId, SalesRecord,
};
use tracing::{debug, info};

/// Forecast request parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ForecastRequest {
    pub months_ahead: usize,
    /// First target month; the evaluation month when absent.
    pub start_month: Option<u32>,
    /// Evaluation time for the trailing window.
    pub as_of: NaiveDate,
}

#[derive(Debug, Clone)]
pub struct DemandForecaster {
    policy: ForecastPolicy,
}

impl DemandForecaster {
    pub fn new(policy: ForecastPolicy) -> Self {
        Self { policy }
    }

    /// Seasonal month-by-month demand for every catalog product.
    pub fn forecast(
        &self,
        sales: &[SalesRecord],
        festivals: &[FestivalTag],
        catalog: &[Product],
        request: ForecastRequest,
    ) -> Result<DemandForecast, PipelineError> {
        let mut month = match request.start_month {
            Some(m) if (1..=12).contains(&m) => m,
            Some(m) => {
                return Err(PipelineError::InvalidRequest {
                    message: format!("start month {m} is not in 1..=12"),
                })
            }
            None => request.as_of.month(),
        };
        let window = LookbackWindow::TrailingDays(self.policy.trailing_window_days);
        let recent = window.select(sales, request.as_of);
        let ever_sold: HashSet<ProductId> = sales.iter().map(|s| s.product_id).collect();

        let mut by_product_month: HashMap<(ProductId, u32), (i64, usize)> = HashMap::new();
        let mut by_product: HashMap<ProductId, (i64, usize)> = HashMap::new();
        for sale in &recent {
            let overall = by_product.entry(sale.product_id).or_default();
            overall.0 = overall.0.saturating_add(sale.quantity_sold);
            overall.1 += 1;
            if let Some(month) = sale.month() {
                let monthly = by_product_month.entry((sale.product_id, month)).or_default();
                monthly.0 = monthly.0.saturating_add(sale.quantity_sold);
                monthly.1 += 1;
            }
        }
        let events = events_by_month_and_name(festivals);

        // month keys must stay unique in the serialized forecast
        let months_ahead = request.months_ahead.min(self.policy.max_months).min(12);

        let mut months = Vec::with_capacity(months_ahead);
        for _ in 0..months_ahead {
            let products: BTreeMap<ProductId, ForecastEntry> = catalog
                .iter()
                .map(|product| {
                    let entry = if ever_sold.contains(&product.product_id) {
                        let estimate = by_product_month
                            .get(&(product.product_id, month))
                            .or_else(|| by_product.get(&product.product_id))
                            .map(|(sum, n)| *sum as f64 / *n as f64)
                            .unwrap_or(0.0);
                        self.entry(product, month, estimate, &events)
                    } else {
                        ForecastEntry {
                            product_id: product.product_id,
                            target_month: month,
                            forecasted_demand: 0,
                            reason: String::new(),
                        }
                    };
                    (product.product_id, entry)
                })
                .collect();
            debug!(month, products = products.len(), "month forecast built");
            months.push(MonthForecast { month, products });
            month = next_month(month);
        }

        info!(
            months = months.len(),
            products = catalog.len(),
            trailing_rows = recent.len(),
            "demand forecast complete"
        );
        Ok(DemandForecast { months })
    }

    fn entry(
        &self,
        product: &Product,
        month: u32,
        estimate: f64,
        events: &HashMap<(u32, &str), BTreeSet<&str>>,
    ) -> ForecastEntry {
        let matched = events.get(&(month, product.name.as_str()));
        let (estimate, reason) = match matched {
            Some(names) if !names.is_empty() => (
                estimate * self.policy.festival_multiplier,
                names.iter().copied().collect::<Vec<_>>().join(", "),
            ),
            _ => (estimate, String::new()),
        };
        ForecastEntry {
            product_id: product.product_id,
            target_month: month,
            forecasted_demand: round_demand(estimate),
            reason,
        }
    }
}

/// Festival and season names registered per (month, product name).
fn events_by_month_and_name(festivals: &[FestivalTag]) -> HashMap<(u32, &str), BTreeSet<&str>> {
    let mut out: HashMap<(u32, &str), BTreeSet<&str>> = HashMap::new();
    for row in festivals {
        let names = out.entry((row.month, row.product_name.as_str())).or_default();
        names.extend(row.festival.as_deref());
        names.extend(row.season.as_deref());
    }
    out
}

/// Round half to even; demand is never negative.
pub fn round_demand(estimate: f64) -> u64 {
    if !estimate.is_finite() || estimate <= 0.0 {
        return 0;
    }
    estimate.round_ties_even() as u64
}
