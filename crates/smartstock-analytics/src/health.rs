//! Fleet summary statistics and the 0-100 health score.
//!
//! The score is a fixed business heuristic, not a statistically derived measure:
//!
//! | rule | points |
//! |---|---|
//! | start | 100 |
//! | each dead-stock product | -5 |
//! | each overstocked product | -3 |
//! | each understocked product | -2 |
//! | fleet stock/sold ratio within [0.5, 1.5] | +10 |
//! | mean trend score above 150 | +5 |
//!
//! The result is clamped to [0, 100]. An empty record set scores 0.

use serde::Serialize;
use smartstock_core::{saturating_total, FusedProductRecord, HealthPolicy};

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct InventorySummary {
    pub total_products: usize,
    pub total_stock: i64,
    pub total_sold: i64,
    pub total_value: f64,
    pub dead_stock_count: usize,
    pub overstocked_count: usize,
    pub understocked_count: usize,
    pub avg_stock: f64,
    pub avg_sold: f64,
    /// Zero when nothing has sold.
    pub stock_to_sales_ratio: f64,
}

#[derive(Debug, Clone)]
pub struct HealthScorer {
    policy: HealthPolicy,
}

impl HealthScorer {
    pub fn new(policy: HealthPolicy) -> Self {
        Self { policy }
    }

    pub fn summarize(&self, records: &[FusedProductRecord]) -> InventorySummary {
        let total_products = records.len();
        let total_stock = saturating_total(records.iter().map(|r| r.product.stock_quantity));
        let total_sold = saturating_total(records.iter().map(|r| r.total_sold));
        let total_value: f64 = records
            .iter()
            .map(|r| r.product.stock_quantity as f64 * r.product.price)
            .sum();
        let per_product = |total: i64| {
            if total_products == 0 {
                0.0
            } else {
                total as f64 / total_products as f64
            }
        };

        InventorySummary {
            total_products,
            total_stock,
            total_sold,
            total_value,
            dead_stock_count: records.iter().filter(|r| r.flags.is_dead_stock).count(),
            overstocked_count: records.iter().filter(|r| r.flags.is_overstocked).count(),
            understocked_count: records.iter().filter(|r| r.flags.is_understocked).count(),
            avg_stock: per_product(total_stock),
            avg_sold: per_product(total_sold),
            stock_to_sales_ratio: if total_sold > 0 {
                total_stock as f64 / total_sold as f64
            } else {
                0.0
            },
        }
    }

    pub fn score(&self, records: &[FusedProductRecord]) -> u8 {
        if records.is_empty() {
            return 0;
        }
        let summary = self.summarize(records);
        let mean_trend =
            records.iter().map(|r| r.trend_score).sum::<f64>() / records.len() as f64;
        self.score_from(&summary, mean_trend)
    }

    /// Apply the rule table to precomputed aggregates.
    pub fn score_from(&self, summary: &InventorySummary, mean_trend: f64) -> u8 {
        let p = &self.policy;
        let mut score: i64 = 100;
        score -= p.dead_stock_penalty * summary.dead_stock_count as i64;
        score -= p.overstock_penalty * summary.overstocked_count as i64;
        score -= p.understock_penalty * summary.understocked_count as i64;

        if summary.total_sold > 0 {
            let ratio = summary.total_stock as f64 / summary.total_sold as f64;
            if (p.balanced_ratio_min..=p.balanced_ratio_max).contains(&ratio) {
                score += p.balanced_ratio_bonus;
            }
        }
        if mean_trend > p.trend_bonus_threshold {
            score += p.trend_bonus;
        }

        score.clamp(0, 100) as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(dead: usize, over: usize, under: usize, stock: i64, sold: i64) -> InventorySummary {
        InventorySummary {
            total_products: 10,
            total_stock: stock,
            total_sold: sold,
            dead_stock_count: dead,
            overstocked_count: over,
            understocked_count: under,
            ..Default::default()
        }
    }

    fn scorer() -> HealthScorer {
        HealthScorer::new(HealthPolicy::default())
    }

    #[test]
    fn each_rule_moves_the_score_by_its_exact_weight() {
        let s = scorer();
        // ratio 3.0 is outside the balanced band
        assert_eq!(s.score_from(&summary(0, 0, 0, 30, 10), 0.0), 100);
        assert_eq!(s.score_from(&summary(1, 0, 0, 30, 10), 0.0), 95);
        assert_eq!(s.score_from(&summary(0, 1, 0, 30, 10), 0.0), 97);
        assert_eq!(s.score_from(&summary(0, 0, 1, 30, 10), 0.0), 98);
        assert_eq!(s.score_from(&summary(4, 0, 0, 10, 10), 0.0), 90);
        assert_eq!(s.score_from(&summary(4, 0, 0, 30, 10), 151.0), 85);
        assert_eq!(s.score_from(&summary(4, 0, 0, 30, 10), 150.0), 80);
    }

    #[test]
    fn ratio_band_is_inclusive() {
        let s = scorer();
        assert_eq!(s.score_from(&summary(5, 0, 0, 5, 10), 0.0), 85);
        assert_eq!(s.score_from(&summary(5, 0, 0, 15, 10), 0.0), 85);
        assert_eq!(s.score_from(&summary(5, 0, 0, 16, 10), 0.0), 75);
        assert_eq!(s.score_from(&summary(5, 0, 0, 0, 0), 0.0), 75);
    }

    #[test]
    fn score_is_clamped() {
        let s = scorer();
        assert_eq!(s.score_from(&summary(30, 0, 0, 30, 10), 0.0), 0);
        assert_eq!(s.score_from(&summary(0, 0, 0, 10, 10), 500.0), 100);
    }

    #[test]
    fn score_never_increases_with_more_flagged_products() {
        let s = scorer();
        for base in 0..5 {
            for extra in 1..4 {
                let before = s.score_from(&summary(base, base, base, 12, 10), 160.0);
                assert!(s.score_from(&summary(base + extra, base, base, 12, 10), 160.0) <= before);
                assert!(s.score_from(&summary(base, base + extra, base, 12, 10), 160.0) <= before);
                assert!(s.score_from(&summary(base, base, base + extra, 12, 10), 160.0) <= before);
            }
        }
    }

    #[test]
    fn empty_records_score_zero_and_summarize_to_zeroes() {
        let s = scorer();
        assert_eq!(s.score(&[]), 0);
        let summary = s.summarize(&[]);
        assert_eq!(summary.total_products, 0);
        assert_eq!(summary.avg_stock, 0.0);
        assert_eq!(summary.stock_to_sales_ratio, 0.0);
    }
}
