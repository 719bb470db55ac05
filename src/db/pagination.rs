// Pagination
// Page/offset arithmetic and the summary handed to entity consumers

use serde::{Deserialize, Serialize};

/// Pagination request stored on a data provider until the next execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaginationSpec {
    pub page: u32,
    pub per_page: u32,
    pub prev_count: u32,
    pub next_count: u32,
}

impl Default for PaginationSpec {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: 15,
            prev_count: 5,
            next_count: 5,
        }
    }
}

/// Pagination metadata for one executed page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaginationSummary {
    pub page: u32,
    pub per_page: u32,
    pub total_count: u64,
    pub total_pages: u32,
    pub returned_count: usize,
    /// Up to `prev_count` page numbers before the current one
    pub prev_pages: Vec<u32>,
    /// Up to `next_count` page numbers after the current one
    pub next_pages: Vec<u32>,
}

/// Pagination collaborator used by data providers
pub trait Paginate {
    fn offset(&self) -> u64;

    fn to_summary(&self, returned_count: usize, prev_count: u32, next_count: u32) -> PaginationSummary;
}

/// Builds a paginator from `(page, per_page, total_count)`
pub type PaginatorFactory = fn(u32, u32, u64) -> Box<dyn Paginate>;

/// Default paginator; the page is clamped into the existing range
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Paginator {
    page: u32,
    per_page: u32,
    total_count: u64,
    total_pages: u32,
}

impl Paginator {
    pub fn new(page: u32, per_page: u32, total_count: u64) -> Self {
        let per_page = per_page.max(1);
        let total_pages = total_count
            .div_ceil(u64::from(per_page))
            .clamp(1, u64::from(u32::MAX)) as u32;
        Self {
            page: page.clamp(1, total_pages),
            per_page,
            total_count,
            total_pages,
        }
    }

    pub fn boxed(page: u32, per_page: u32, total_count: u64) -> Box<dyn Paginate> {
        Box::new(Self::new(page, per_page, total_count))
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn total_pages(&self) -> u32 {
        self.total_pages
    }
}

impl Paginate for Paginator {
    fn offset(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.per_page)
    }

    fn to_summary(&self, returned_count: usize, prev_count: u32, next_count: u32) -> PaginationSummary {
        let first_prev = self.page.saturating_sub(prev_count).max(1);
        let last_next = self.page.saturating_add(next_count).min(self.total_pages);
        PaginationSummary {
            page: self.page,
            per_page: self.per_page,
            total_count: self.total_count,
            total_pages: self.total_pages,
            returned_count,
            prev_pages: (first_prev..self.page).collect(),
            next_pages: (self.page..last_next).map(|p| p + 1).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offsets() {
        assert_eq!(Paginator::new(1, 5, 10).offset(), 0);
        assert_eq!(Paginator::new(2, 5, 10).offset(), 5);
        assert_eq!(Paginator::new(3, 15, 100).offset(), 30);
    }

    #[test]
    fn test_page_is_clamped() {
        let past_end = Paginator::new(9, 5, 10);
        assert_eq!(past_end.page(), 2);
        assert_eq!(past_end.offset(), 5);

        let zero = Paginator::new(0, 5, 10);
        assert_eq!(zero.page(), 1);

        let empty = Paginator::new(3, 5, 0);
        assert_eq!(empty.total_pages(), 1);
        assert_eq!(empty.offset(), 0);
    }

    #[test]
    fn test_zero_per_page_is_treated_as_one() {
        let paginator = Paginator::new(4, 0, 10);
        assert_eq!(paginator.offset(), 3);
        assert_eq!(paginator.total_pages(), 10);
    }

    #[test]
    fn test_summary_neighbours() {
        let summary = Paginator::new(5, 10, 95).to_summary(10, 2, 3);
        assert_eq!(summary.total_pages, 10);
        assert_eq!(summary.prev_pages, vec![3, 4]);
        assert_eq!(summary.next_pages, vec![6, 7, 8]);

        let edge = Paginator::new(2, 5, 10).to_summary(5, 5, 5);
        assert_eq!(edge.prev_pages, vec![1]);
        assert!(edge.next_pages.is_empty());
        assert_eq!(edge.total_count, 10);
        assert_eq!(edge.returned_count, 5);
    }
}
