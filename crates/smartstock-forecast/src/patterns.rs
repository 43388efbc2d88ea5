//! Festival and season demand patterns keyed by calendar month.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use smartstock_core::{FestivalTag, SalesRecord};

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct FestivalPattern {
    pub festivals: BTreeSet<String>,
    pub seasons: BTreeSet<String>,
    pub products: BTreeSet<String>,
    pub total_sales: i64,
    /// Month total over the mean quantity of a single sales row.
    pub demand_boost: f64,
}

/// Patterns for festival-table months that also appear in the sales log.
///
/// Blank festival and season cells are left out of the name sets.
pub fn festival_patterns(
    festivals: &[FestivalTag],
    sales: &[SalesRecord],
) -> BTreeMap<u32, FestivalPattern> {
    let mut monthly: BTreeMap<u32, i64> = BTreeMap::new();
    for sale in sales {
        if let Some(month) = sale.month() {
            let sum = monthly.entry(month).or_default();
            *sum = sum.saturating_add(sale.quantity_sold);
        }
    }
    let mean_row = if sales.is_empty() {
        0.0
    } else {
        sales.iter().map(|s| s.quantity_sold as f64).sum::<f64>() / sales.len() as f64
    };

    let mut patterns: BTreeMap<u32, FestivalPattern> = BTreeMap::new();
    for tag in festivals {
        let Some(total) = monthly.get(&tag.month) else {
            continue;
        };
        let pattern = patterns.entry(tag.month).or_insert_with(|| FestivalPattern {
            total_sales: *total,
            demand_boost: if mean_row > 0.0 { *total as f64 / mean_row } else { 1.0 },
            ..Default::default()
        });
        pattern.festivals.extend(tag.festival.clone());
        pattern.seasons.extend(tag.season.clone());
        pattern.products.insert(tag.product_name.clone());
    }
    patterns
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn sale(qty: i64, m: u32) -> SalesRecord {
        SalesRecord {
            product_id: 1,
            quantity_sold: qty,
            sales_date: NaiveDate::from_ymd_opt(2025, m, 3),
            sales_month: None,
        }
    }

    fn tag(name: &str, month: u32, festival: Option<&str>, season: Option<&str>) -> FestivalTag {
        FestivalTag {
            product_name: name.into(),
            month,
            festival: festival.map(Into::into),
            season: season.map(Into::into),
            tags: None,
        }
    }

    #[test]
    fn boost_compares_month_total_with_mean_row() {
        let sales = vec![sale(10, 10), sale(20, 10), sale(6, 3)];
        let festivals = vec![
            tag("Silk Saree", 10, Some("Diwali"), None),
            tag("Lamp", 10, Some("Diwali"), Some("Autumn")),
            tag("Shawl", 12, Some("Christmas"), Some("Winter")),
        ];
        let patterns = festival_patterns(&festivals, &sales);

        // December has no sales rows
        assert_eq!(patterns.keys().copied().collect::<Vec<_>>(), vec![10]);
        let october = &patterns[&10];
        assert_eq!(october.total_sales, 30);
        // mean row = 36 / 3
        assert!((october.demand_boost - 2.5).abs() < 1e-9);
        assert_eq!(october.festivals.len(), 1);
        assert_eq!(october.seasons.iter().collect::<Vec<_>>(), vec!["Autumn"]);
        assert_eq!(october.products.len(), 2);
    }

    #[test]
    fn non_positive_mean_gives_neutral_boost() {
        let sales = vec![sale(0, 5)];
        let patterns = festival_patterns(&[tag("Fan", 5, None, Some("Summer"))], &sales);
        assert_eq!(patterns[&5].demand_boost, 1.0);
        assert!(patterns[&5].festivals.is_empty());
    }
}
