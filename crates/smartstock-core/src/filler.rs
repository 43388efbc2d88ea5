//! Backfill for catalog cells the source did not provide.
//!
//! Every product must come out fully populated. The strategy is injected so that
//! tests and production runs choose between a seeded RNG and a fixed table.

use std::collections::BTreeMap;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use tracing::warn;

use crate::{CatalogColumn, CatalogRow, Product, ProductId};

pub const FILLER_CATEGORIES: [&str; 11] = [
    "T-shirt",
    "Kurti",
    "Jacket",
    "Kidswear",
    "Sleepwear",
    "Ethnicwear",
    "Winterwear",
    "Saree",
    "Rainwear",
    "Western",
    "Shorts",
];

pub const FILLER_STATUSES: [&str; 2] = ["active", "paused"];

pub trait FillerStrategy {
    fn product_id(&mut self) -> ProductId;
    fn name(&mut self) -> String;
    fn category(&mut self) -> String;
    fn price(&mut self) -> f64;
    fn cost(&mut self) -> f64;
    fn status(&mut self) -> String;
    fn stock_quantity(&mut self) -> i64;
    fn restock_threshold(&mut self) -> i64;
}

/// Random values within the documented ranges, reproducible for a given seed.
///
/// | column | range |
/// |---|---|
/// | product_id | 1000..=9999 |
/// | name | `Product{1..=100}` |
/// | category | one of [`FILLER_CATEGORIES`] |
/// | price | 100..=2000 |
/// | cost | 50..=1500 |
/// | status | `active` or `paused` |
/// | stock_quantity | 0..=50 |
/// | restock_threshold | 1..=10 |
#[derive(Debug, Clone)]
pub struct SeededFiller {
    rng: StdRng,
}

impl SeededFiller {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    fn pick(&mut self, values: &[&str]) -> String {
        values
            .choose(&mut self.rng)
            .map(|v| v.to_string())
            .unwrap_or_default()
    }
}

impl FillerStrategy for SeededFiller {
    fn product_id(&mut self) -> ProductId {
        self.rng.gen_range(1000..=9999)
    }

    fn name(&mut self) -> String {
        format!("Product{}", self.rng.gen_range(1..=100))
    }

    fn category(&mut self) -> String {
        self.pick(&FILLER_CATEGORIES)
    }

    fn price(&mut self) -> f64 {
        f64::from(self.rng.gen_range(100..=2000_i32))
    }

    fn cost(&mut self) -> f64 {
        f64::from(self.rng.gen_range(50..=1500_i32))
    }

    fn status(&mut self) -> String {
        self.pick(&FILLER_STATUSES)
    }

    fn stock_quantity(&mut self) -> i64 {
        self.rng.gen_range(0..=50)
    }

    fn restock_threshold(&mut self) -> i64 {
        self.rng.gen_range(1..=10)
    }
}

/// Fixed defaults; ids are handed out sequentially so they stay unique.
#[derive(Debug, Clone)]
pub struct FixedFiller {
    next_id: ProductId,
}

impl FixedFiller {
    pub const FIRST_ID: ProductId = 1000;
    pub const RESTOCK_THRESHOLD: i64 = 5;
}

impl Default for FixedFiller {
    fn default() -> Self {
        Self {
            next_id: Self::FIRST_ID,
        }
    }
}

impl FillerStrategy for FixedFiller {
    fn product_id(&mut self) -> ProductId {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn name(&mut self) -> String {
        "Unnamed product".to_string()
    }

    fn category(&mut self) -> String {
        "Uncategorized".to_string()
    }

    fn price(&mut self) -> f64 {
        0.0
    }

    fn cost(&mut self) -> f64 {
        0.0
    }

    fn status(&mut self) -> String {
        "active".to_string()
    }

    fn stock_quantity(&mut self) -> i64 {
        0
    }

    fn restock_threshold(&mut self) -> i64 {
        Self::RESTOCK_THRESHOLD
    }
}

/// Turn raw catalog rows into complete products, backfilling every missing cell.
pub fn normalize_catalog(rows: &[CatalogRow], filler: &mut dyn FillerStrategy) -> Vec<Product> {
    let mut filled: BTreeMap<&'static str, usize> = BTreeMap::new();
    let mut note = |column: CatalogColumn| *filled.entry(column.as_str()).or_default() += 1;

    let products = rows
        .iter()
        .map(|row| Product {
            product_id: row.product_id.unwrap_or_else(|| {
                note(CatalogColumn::ProductId);
                filler.product_id()
            }),
            name: row.name.clone().unwrap_or_else(|| {
                note(CatalogColumn::Name);
                filler.name()
            }),
            category: row.category.clone().unwrap_or_else(|| {
                note(CatalogColumn::Category);
                filler.category()
            }),
            price: row.price.unwrap_or_else(|| {
                note(CatalogColumn::Price);
                filler.price()
            }),
            cost: row.cost.unwrap_or_else(|| {
                note(CatalogColumn::Cost);
                filler.cost()
            }),
            stock_quantity: row.stock_quantity.unwrap_or_else(|| {
                note(CatalogColumn::StockQuantity);
                filler.stock_quantity()
            }),
            restock_threshold: row.restock_threshold.unwrap_or_else(|| {
                note(CatalogColumn::RestockThreshold);
                filler.restock_threshold()
            }),
            status: row.status.clone().unwrap_or_else(|| {
                note(CatalogColumn::Status);
                filler.status()
            }),
        })
        .collect();

    for (column, count) in filled {
        warn!(column, rows = count, "backfilled catalog cells");
    }
    products
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sparse_rows() -> Vec<CatalogRow> {
        vec![
            CatalogRow {
                product_id: Some(7),
                name: Some("Denim Jacket".into()),
                ..Default::default()
            },
            CatalogRow::default(),
        ]
    }

    #[test]
    fn seeded_filler_is_reproducible() {
        let rows = sparse_rows();
        let a = normalize_catalog(&rows, &mut SeededFiller::new(42));
        let b = normalize_catalog(&rows, &mut SeededFiller::new(42));
        assert_eq!(a, b);
    }

    #[test]
    fn seeded_values_stay_in_documented_ranges() {
        let rows = vec![CatalogRow::default(); 50];
        for p in normalize_catalog(&rows, &mut SeededFiller::new(7)) {
            assert!((1000..=9999).contains(&p.product_id));
            assert!(p.name.starts_with("Product"));
            assert!(FILLER_CATEGORIES.contains(&p.category.as_str()));
            assert!((100.0..=2000.0).contains(&p.price));
            assert!((50.0..=1500.0).contains(&p.cost));
            assert!(FILLER_STATUSES.contains(&p.status.as_str()));
            assert!((0..=50).contains(&p.stock_quantity));
            assert!((1..=10).contains(&p.restock_threshold));
        }
    }

    #[test]
    fn present_cells_are_never_overwritten() {
        let products = normalize_catalog(&sparse_rows(), &mut FixedFiller::default());
        assert_eq!(products[0].product_id, 7);
        assert_eq!(products[0].name, "Denim Jacket");
        assert_eq!(products[0].restock_threshold, FixedFiller::RESTOCK_THRESHOLD);
        assert_eq!(products[1].product_id, FixedFiller::FIRST_ID);
        assert_eq!(products[1].status, "active");
    }
}
