//! Festival-driven recommendations and structured advice derived from an analysis.

use std::collections::BTreeSet;

use serde::Serialize;
use smartstock_core::{next_month, FestivalTag};

use crate::health::InventorySummary;

/// Festivals whose new-product recommendations are prioritized.
pub const PRIORITY_FESTIVALS: [&str; 3] = ["Diwali", "Christmas", "Eid al-Fitr"];

pub const UPCOMING_MONTHS: usize = 3;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FestivalRecommendation {
    pub product: String,
    pub festival: Option<String>,
    pub season: Option<String>,
    pub tags: Option<String>,
}

/// Festival rows registered for `month`, in table order.
pub fn festival_recommendations(festivals: &[FestivalTag], month: u32) -> Vec<FestivalRecommendation> {
    festivals
        .iter()
        .filter(|f| f.month == month)
        .map(|f| FestivalRecommendation {
            product: f.product_name.clone(),
            festival: f.festival.clone(),
            season: f.season.clone(),
            tags: f.tags.clone(),
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum InvestmentPriority {
    High,
    Medium,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewProductRecommendation {
    pub festival: String,
    pub month: u32,
    pub recommended_product_type: String,
    pub reason: String,
    pub estimated_demand: String,
    pub investment_priority: InvestmentPriority,
}

/// One recommendation per distinct tag of each festival in the months following `current_month`.
pub fn new_product_recommendations(
    festivals: &[FestivalTag],
    current_month: u32,
) -> Vec<NewProductRecommendation> {
    let mut out = Vec::new();
    let mut month = current_month;
    for _ in 0..UPCOMING_MONTHS {
        month = next_month(month);
        let mut seen = BTreeSet::new();
        for festival in festivals
            .iter()
            .filter(|f| f.month == month)
            .filter_map(|f| f.festival.as_deref())
        {
            if !seen.insert(festival) {
                continue;
            }
            let tags: BTreeSet<&str> = festivals
                .iter()
                .filter(|f| f.festival.as_deref() == Some(festival))
                .flat_map(FestivalTag::tag_values)
                .collect();
            let priority = if PRIORITY_FESTIVALS.contains(&festival) {
                InvestmentPriority::High
            } else {
                InvestmentPriority::Medium
            };
            out.extend(tags.into_iter().map(|tag| NewProductRecommendation {
                festival: festival.to_string(),
                month,
                recommended_product_type: tag.to_string(),
                reason: format!("High demand during {festival}"),
                estimated_demand: "High".to_string(),
                investment_priority: priority,
            }));
        }
    }
    out
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthBand {
    Excellent,
    Good,
    NeedsAttention,
}

impl HealthBand {
    pub fn for_score(score: u8) -> Self {
        match score {
            80.. => HealthBand::Excellent,
            60..=79 => HealthBand::Good,
            _ => HealthBand::NeedsAttention,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Advice {
    Health { band: HealthBand },
    LiquidateDeadStock { products: usize },
    ReduceOverstock { products: usize },
    IncreaseUnderstock { products: usize },
    FleetStockHigh,
    FleetStockLow,
}

/// Ratio above which fleet stock is called high, and below which it is called low.
const FLEET_RATIO_HIGH: f64 = 2.0;
const FLEET_RATIO_LOW: f64 = 0.5;

pub fn advice(
    score: u8,
    summary: &InventorySummary,
    dead_stock: usize,
    overstocked: usize,
    understocked: usize,
) -> Vec<Advice> {
    let mut out = vec![Advice::Health {
        band: HealthBand::for_score(score),
    }];
    if dead_stock > 0 {
        out.push(Advice::LiquidateDeadStock { products: dead_stock });
    }
    if overstocked > 0 {
        out.push(Advice::ReduceOverstock { products: overstocked });
    }
    if understocked > 0 {
        out.push(Advice::IncreaseUnderstock { products: understocked });
    }
    let ratio = summary.stock_to_sales_ratio;
    if ratio > FLEET_RATIO_HIGH {
        out.push(Advice::FleetStockHigh);
    } else if ratio < FLEET_RATIO_LOW {
        out.push(Advice::FleetStockLow);
    }
    out
}
