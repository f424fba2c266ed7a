//! Route handlers.

pub mod health;
pub mod items;
pub mod metrics;
pub mod orders;

use common::Page;

/// Builds a window from optional `limit`/`offset` query parameters.
fn page_from(limit: Option<usize>, offset: Option<usize>) -> Page {
    let mut page = Page::default();
    if let Some(limit) = limit {
        page.limit = limit;
    }
    if let Some(offset) = offset {
        page.offset = offset;
    }
    page
}
