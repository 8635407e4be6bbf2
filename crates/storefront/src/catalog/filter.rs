//! Filter criteria and the visible-subset computation.

use std::time::Duration;

use medmart_core::Product;
use serde::{Deserialize, Serialize};

/// Quiet period a presentation layer should wait after the last filter
/// change before re-fetching from the server.
pub const FILTER_DEBOUNCE: Duration = Duration::from_millis(300);

/// One dimension of [`ProductFilters`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterKind {
    Search,
    Category,
    Pharmacy,
}

/// Active catalog filters. An empty string means "no constraint".
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProductFilters {
    pub search: String,
    pub category: String,
    pub pharmacy: String,
}

impl ProductFilters {
    /// Whether no dimension constrains the result.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.search.is_empty() && self.category.is_empty() && self.pharmacy.is_empty()
    }

    /// Current value of one dimension.
    #[must_use]
    pub fn get(&self, kind: FilterKind) -> &str {
        match kind {
            FilterKind::Search => &self.search,
            FilterKind::Category => &self.category,
            FilterKind::Pharmacy => &self.pharmacy,
        }
    }

    /// Replace one dimension. Returns whether the value changed.
    pub fn set(&mut self, kind: FilterKind, value: impl Into<String>) -> bool {
        let value = value.into();
        let slot = match kind {
            FilterKind::Search => &mut self.search,
            FilterKind::Category => &mut self.category,
            FilterKind::Pharmacy => &mut self.pharmacy,
        };
        if *slot == value {
            return false;
        }
        *slot = value;
        true
    }

    /// Whether `product` passes every non-empty dimension.
    ///
    /// Search matches name or description case-insensitively; category and
    /// pharmacy are exact matches.
    #[must_use]
    pub fn matches(&self, product: &Product) -> bool {
        if !self.search.is_empty() {
            let needle = self.search.to_lowercase();
            if !product.name.to_lowercase().contains(&needle)
                && !product.description.to_lowercase().contains(&needle)
            {
                return false;
            }
        }
        if !self.category.is_empty() && product.category != self.category {
            return false;
        }
        if !self.pharmacy.is_empty() && product.pharmacy_name() != self.pharmacy {
            return false;
        }
        true
    }
}

/// The items passing `filters`, in their original order.
#[must_use]
pub fn filter_products<'a>(items: &'a [Product], filters: &ProductFilters) -> Vec<&'a Product> {
    items.iter().filter(|product| filters.matches(product)).collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::api::fixtures;

    #[test]
    fn test_empty_filters_keep_everything() {
        let items = fixtures::products();
        let visible = filter_products(&items, &ProductFilters::default());
        assert_eq!(visible.len(), items.len());
    }

    #[test]
    fn test_search_is_case_insensitive_on_name_and_description() {
        let items = fixtures::products();
        let mut filters = ProductFilters::default();

        filters.set(FilterKind::Search, "ASPIRIN");
        let names: Vec<&str> = filter_products(&items, &filters)
            .iter()
            .map(|p| p.name.as_str())
            .collect();
        assert_eq!(names, vec!["Aspirin 325mg"]);

        filters.set(FilterKind::Search, "bone");
        assert_eq!(filter_products(&items, &filters).len(), 1);
    }

    #[test]
    fn test_search_ignores_generic_name() {
        let items = fixtures::products();
        let filters = ProductFilters {
            search: "cholecalciferol".to_string(),
            ..ProductFilters::default()
        };
        assert!(filter_products(&items, &filters).is_empty());
    }

    #[test]
    fn test_dimensions_combine() {
        let items = fixtures::products();
        let filters = ProductFilters {
            search: String::new(),
            category: "Pain Relief".to_string(),
            pharmacy: "MedMart Pharmacy".to_string(),
        };
        let visible = filter_products(&items, &filters);
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].id.as_str(), "1");
    }

    #[test]
    fn test_category_is_exact() {
        let items = fixtures::products();
        let filters = ProductFilters {
            category: "pain relief".to_string(),
            ..ProductFilters::default()
        };
        assert!(filter_products(&items, &filters).is_empty());
    }

    #[test]
    fn test_visible_is_ordered_subset_for_all_combinations() {
        let items = fixtures::products();
        let searches = ["", "mg", "zzz"];
        let categories = ["", "Pain Relief", "Medical Devices"];
        let pharmacies = ["", "MedMart Pharmacy", "WellCare Drugstore"];

        for search in searches {
            for category in categories {
                for pharmacy in pharmacies {
                    let filters = ProductFilters {
                        search: search.to_string(),
                        category: category.to_string(),
                        pharmacy: pharmacy.to_string(),
                    };
                    let visible = filter_products(&items, &filters);
                    let mut cursor = items.iter();
                    for product in visible {
                        assert!(cursor.any(|item| item == product), "{filters:?}");
                    }
                }
            }
        }
    }

    #[test]
    fn test_set_reports_change() {
        let mut filters = ProductFilters::default();
        assert!(filters.set(FilterKind::Category, "Vitamins"));
        assert!(!filters.set(FilterKind::Category, "Vitamins"));
        assert_eq!(filters.get(FilterKind::Category), "Vitamins");
        assert!(!filters.is_empty());
    }
}
