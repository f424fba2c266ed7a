//! Pagination over list queries.
//!
//! Every listing is produced under one fixed sort key, `(created_at, id)`
//! ascending, so pages are stable across calls. Cursors are stringified
//! offsets: `next_cursor` exists iff another full or partial page follows,
//! `prev_cursor` exists iff the current offset is past the start, clamped
//! to zero.

use serde::{Deserialize, Serialize};

const DEFAULT_LIMIT: usize = 100;

/// A requested window into a result set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub limit: usize,
    pub offset: usize,
}

impl Page {
    /// A window by explicit limit and offset.
    pub fn new(limit: usize, offset: usize) -> Self {
        Self { limit, offset }
    }
}

impl Default for Page {
    fn default() -> Self {
        Self {
            limit: DEFAULT_LIMIT,
            offset: 0,
        }
    }
}

/// Window metadata returned alongside every page of results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub limit: usize,
    pub offset: usize,
    /// Count of the unpaginated filtered set.
    pub total_count: usize,
    pub next_cursor: Option<String>,
    pub prev_cursor: Option<String>,
}

impl Pagination {
    /// Builds the metadata for a window over `total_count` filtered rows.
    pub fn for_window(page: Page, total_count: usize) -> Self {
        let next_cursor = if page.offset + page.limit < total_count {
            Some((page.offset + page.limit).to_string())
        } else {
            None
        };
        let prev_cursor = if page.offset > 0 {
            Some(page.offset.saturating_sub(page.limit).to_string())
        } else {
            None
        };
        Self {
            limit: page.limit,
            offset: page.offset,
            total_count,
            next_cursor,
            prev_cursor,
        }
    }
}

/// Applies a window to an already-sorted, already-filtered result set.
///
/// Used by the in-memory store; SQL backends push the window into the query
/// and only use [`Pagination::for_window`].
pub fn window<T>(rows: Vec<T>, page: Page) -> (Vec<T>, Pagination) {
    let total_count = rows.len();
    let windowed: Vec<T> = rows
        .into_iter()
        .skip(page.offset)
        .take(page.limit)
        .collect();
    (windowed, Pagination::for_window(page, total_count))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_page_starts_at_zero() {
        let page = Page::default();
        assert_eq!(page.limit, DEFAULT_LIMIT);
        assert_eq!(page.offset, 0);
    }

    #[test]
    fn cursors_for_middle_window() {
        let info = Pagination::for_window(Page::new(10, 10), 25);
        assert_eq!(info.total_count, 25);
        assert_eq!(info.next_cursor.as_deref(), Some("20"));
        assert_eq!(info.prev_cursor.as_deref(), Some("0"));
    }

    #[test]
    fn first_window_has_no_prev_cursor() {
        let info = Pagination::for_window(Page::new(10, 0), 25);
        assert_eq!(info.next_cursor.as_deref(), Some("10"));
        assert_eq!(info.prev_cursor, None);
    }

    #[test]
    fn last_window_has_no_next_cursor() {
        let info = Pagination::for_window(Page::new(10, 20), 25);
        assert_eq!(info.next_cursor, None);
        assert_eq!(info.prev_cursor.as_deref(), Some("10"));
    }

    #[test]
    fn prev_cursor_clamps_to_zero() {
        let info = Pagination::for_window(Page::new(10, 5), 25);
        assert_eq!(info.prev_cursor.as_deref(), Some("0"));
    }

    #[test]
    fn offset_past_the_end_returns_empty_window() {
        let rows: Vec<u32> = (0..25).collect();
        let (page, info) = window(rows, Page::new(10, 30));
        assert!(page.is_empty());
        assert_eq!(info.total_count, 25);
        assert_eq!(info.next_cursor, None);
        assert_eq!(info.prev_cursor.as_deref(), Some("20"));
    }

    #[test]
    fn window_slices_in_order() {
        let rows: Vec<u32> = (0..25).collect();
        let (page, info) = window(rows, Page::new(10, 20));
        assert_eq!(page, (20..25).collect::<Vec<u32>>());
        assert_eq!(info.total_count, 25);
        assert_eq!(info.next_cursor, None);
    }
}
