use std::collections::{BTreeMap, HashSet};

use serde::Serialize;
use smartstock_core::{FestivalTag, Product};
use strsim::jaro_winkler;
use tracing::warn;

pub const SUGGESTION_THRESHOLD: f64 = 0.85;

/// A festival-table product name with no exact catalog match.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnmatchedName {
    pub product_name: String,
    pub rows: usize,
    pub suggestion: Option<String>,
    pub similarity: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct NameJoinReport {
    pub matched_names: usize,
    pub unmatched: Vec<UnmatchedName>,
}

impl NameJoinReport {
    pub fn is_clean(&self) -> bool {
        self.unmatched.is_empty()
    }
}

/// Report festival rows whose product name joins to nothing in the catalog.
pub fn validate_festival_names(catalog: &[Product], festivals: &[FestivalTag]) -> NameJoinReport {
    let known: HashSet<&str> = catalog.iter().map(|p| p.name.as_str()).collect();
    let mut rows_by_name: BTreeMap<&str, usize> = BTreeMap::new();
    for row in festivals {
        *rows_by_name.entry(row.product_name.as_str()).or_default() += 1;
    }

    let mut report = NameJoinReport::default();
    for (name, rows) in rows_by_name {
        if known.contains(name) {
            report.matched_names += 1;
            continue;
        }
        let best = catalog
            .iter()
            .map(|p| (p.name.as_str(), jaro_winkler(name, &p.name)))
            .filter(|(_, score)| *score >= SUGGESTION_THRESHOLD)
            .fold(None::<(&str, f64)>, |best, candidate| match best {
                Some((_, s)) if s >= candidate.1 => best,
                _ => Some(candidate),
            });
        report.unmatched.push(UnmatchedName {
            product_name: name.to_string(),
            rows,
            suggestion: best.map(|(n, _)| n.to_string()),
            similarity: best.map(|(_, s)| s),
        });
    }

    if !report.unmatched.is_empty() {
        warn!(
            unmatched = report.unmatched.len(),
            matched = report.matched_names,
            "festival product names without a catalog match"
        );
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;

    fn product(name: &str) -> Product {
        Product {
            product_id: 1,
            name: name.into(),
            category: "Saree".into(),
            price: 1.0,
            cost: 1.0,
            stock_quantity: 1,
            restock_threshold: 1,
            status: "active".into(),
        }
    }

    fn row(name: &str) -> FestivalTag {
        FestivalTag {
            product_name: name.into(),
            month: 10,
            festival: Some("Diwali".into()),
            season: None,
            tags: None,
        }
    }

    #[test]
    fn reports_misspelled_names_with_suggestion() {
        let catalog = vec![product("Silk Saree"), product("Denim Jacket")];
        let festivals = vec![row("Silk Saree"), row("Silk Sarees"), row("Silk Sarees"), row("Umbrella")];
        let report = validate_festival_names(&catalog, &festivals);

        assert_eq!(report.matched_names, 1);
        assert_eq!(report.unmatched.len(), 2);
        let typo = report
            .unmatched
            .iter()
            .find(|u| u.product_name == "Silk Sarees")
            .unwrap();
        assert_eq!(typo.rows, 2);
        assert_eq!(typo.suggestion.as_deref(), Some("Silk Saree"));
        let unknown = report
            .unmatched
            .iter()
            .find(|u| u.product_name == "Umbrella")
            .unwrap();
        assert_eq!(unknown.suggestion, None);
    }

    #[test]
    fn clean_when_every_name_joins() {
        let report = validate_festival_names(&[product("Shawl")], &[row("Shawl")]);
        assert!(report.is_clean());
    }
}
