//! Pagination cursor for the product listing.

use serde::Serialize;

use crate::api::{DEFAULT_PAGE_SIZE, ProductPage};

/// Position within a paginated listing.
///
/// `has_more` is derived from the page counters and never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Pagination {
    current_page: u32,
    total_pages: u32,
    total_items: u64,
    page_size: u32,
}

impl Default for Pagination {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE_SIZE)
    }
}

impl Pagination {
    /// An empty cursor on page 1.
    #[must_use]
    pub const fn new(page_size: u32) -> Self {
        Self {
            current_page: 1,
            total_pages: 0,
            total_items: 0,
            page_size,
        }
    }

    /// Cursor positioned at the page described by `page`.
    #[must_use]
    pub fn from_page(page: &ProductPage, page_size: u32) -> Self {
        Self {
            current_page: page.page.max(1),
            total_pages: page.total_pages,
            total_items: page.total,
            page_size,
        }
    }

    /// Cursor covering a single, locally supplied page of `count` items.
    #[must_use]
    pub fn single_page(count: usize, page_size: u32) -> Self {
        Self {
            current_page: 1,
            total_pages: u32::from(count > 0),
            total_items: u64::try_from(count).unwrap_or(u64::MAX),
            page_size,
        }
    }

    #[must_use]
    pub const fn current_page(&self) -> u32 {
        self.current_page
    }

    #[must_use]
    pub const fn total_pages(&self) -> u32 {
        self.total_pages
    }

    #[must_use]
    pub const fn total_items(&self) -> u64 {
        self.total_items
    }

    #[must_use]
    pub const fn page_size(&self) -> u32 {
        self.page_size
    }

    /// Whether another page can be requested.
    #[must_use]
    pub const fn has_more(&self) -> bool {
        self.current_page < self.total_pages
    }

    /// The page a load-more request should ask for.
    #[must_use]
    pub const fn next_page(&self) -> u32 {
        self.current_page.saturating_add(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(page: u32, total_pages: u32, total: u64) -> ProductPage {
        ProductPage {
            products: Vec::new(),
            page,
            total_pages,
            total,
        }
    }

    #[test]
    fn test_default_has_no_more() {
        let cursor = Pagination::default();
        assert_eq!(cursor.current_page(), 1);
        assert_eq!(cursor.page_size(), 20);
        assert!(!cursor.has_more());
    }

    #[test]
    fn test_has_more_is_derived() {
        let cursor = Pagination::from_page(&page(1, 3, 45), 20);
        assert!(cursor.has_more());
        assert_eq!(cursor.next_page(), 2);

        let cursor = Pagination::from_page(&page(3, 3, 45), 20);
        assert!(!cursor.has_more());
        assert_eq!(cursor.total_items(), 45);
    }

    #[test]
    fn test_page_zero_is_clamped() {
        let cursor = Pagination::from_page(&page(0, 2, 30), 20);
        assert_eq!(cursor.current_page(), 1);
    }

    #[test]
    fn test_single_page() {
        let cursor = Pagination::single_page(3, 20);
        assert_eq!(cursor.total_pages(), 1);
        assert!(!cursor.has_more());
        assert_eq!(Pagination::single_page(0, 20).total_pages(), 0);
    }
}
