//! Shared plumbing for the paginated listing stores

use std::sync::atomic::{AtomicU64, Ordering};

/// What happened to a fetch response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    /// The response replaced the store's contents
    Applied,
    /// A newer fetch was started meanwhile; the response was dropped
    Stale,
}

/// Monotonic fetch counter. Only the most recently started fetch may write.
#[derive(Debug, Default)]
pub(crate) struct Generation(AtomicU64);

impl Generation {
    pub(crate) fn begin(&self) -> u64 {
        self.0.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub(crate) fn is_current(&self, generation: u64) -> bool {
        self.0.load(Ordering::SeqCst) == generation
    }
}

/// Page navigation derived from a listing's total
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pagination {
    pub current_page: u32,
    pub total_pages: u32,
    /// Page numbers to offer: up to two either side of the current page
    pub window: Vec<u32>,
    pub has_previous: bool,
    pub has_next: bool,
}

impl Pagination {
    pub fn new(current_page: u32, total: u64, page_size: u32) -> Self {
        let total_pages = total_pages(total, page_size);
        let current_page = current_page.clamp(1, total_pages);
        let start = current_page.saturating_sub(2).max(1);
        let end = current_page.saturating_add(2).min(total_pages);

        Self {
            current_page,
            total_pages,
            window: (start..=end).collect(),
            has_previous: current_page > 1,
            has_next: current_page < total_pages,
        }
    }
}

/// `ceil(total / page_size)`, never less than one
pub fn total_pages(total: u64, page_size: u32) -> u32 {
    let page_size = u64::from(page_size.max(1));
    let pages = total / page_size + u64::from(total % page_size != 0);
    u32::try_from(pages).unwrap_or(u32::MAX).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_total_pages() {
        assert_eq!(total_pages(57, 20), 3);
        assert_eq!(total_pages(60, 20), 3);
        assert_eq!(total_pages(61, 20), 4);
        assert_eq!(total_pages(0, 20), 1);
        assert_eq!(total_pages(5, 0), 5);
    }

    #[test]
    fn test_window_is_clamped() {
        let first = Pagination::new(1, 57, 20);
        assert_eq!(first.window, vec![1, 2, 3]);
        assert!(!first.has_previous);
        assert!(first.has_next);

        let middle = Pagination::new(5, 200, 20);
        assert_eq!(middle.window, vec![3, 4, 5, 6, 7]);

        let last = Pagination::new(10, 200, 20);
        assert_eq!(last.window, vec![8, 9, 10]);
        assert!(!last.has_next);
    }

    #[test]
    fn test_huge_total_saturates() {
        assert_eq!(total_pages(u64::MAX, 20), u32::MAX);
        assert_eq!(total_pages(u64::MAX, 1), u32::MAX);

        let pagination = Pagination::new(1, u64::MAX, 20);
        assert_eq!(pagination.total_pages, u32::MAX);
        assert_eq!(pagination.window, vec![1, 2, 3]);
    }

    #[test]
    fn test_page_past_the_end_is_clamped() {
        let empty = Pagination::new(5, 0, 20);
        assert_eq!(empty.current_page, 1);
        assert_eq!(empty.window, vec![1]);
        assert!(!empty.has_previous);
        assert!(!empty.has_next);

        let beyond = Pagination::new(9, 57, 20);
        assert_eq!(beyond.current_page, 3);
        assert_eq!(beyond.window, vec![1, 2, 3]);
    }

    #[test]
    fn test_only_latest_generation_is_current() {
        let generation = Generation::default();
        let first = generation.begin();
        let second = generation.begin();
        assert!(!generation.is_current(first));
        assert!(generation.is_current(second));
    }
}
