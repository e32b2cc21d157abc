//! Page slicing shared by every listing.

use serde::{Deserialize, Serialize};

pub const DEFAULT_PAGE_SIZE: usize = 20;
pub const MAX_PAGE_SIZE: usize = 100;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: usize,
    pub page: usize,
    pub page_size: usize,
    pub total_pages: usize,
}

impl<T> Page<T> {
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            page: self.page,
            page_size: self.page_size,
            total_pages: self.total_pages,
        }
    }
}

/// Slice `items` into the requested page.
///
/// `page` 0 is treated as 1 and a page past the end yields the last page;
/// `page_size` is clamped to `1..=MAX_PAGE_SIZE`.
pub fn paginate<T>(items: Vec<T>, page: usize, page_size: usize) -> Page<T> {
    let page = if page == 0 { 1 } else { page };
    let page_size = page_size.clamp(1, MAX_PAGE_SIZE);
    let total = items.len();

    let total_pages = if total == 0 {
        0
    } else {
        ((total - 1) / page_size) + 1
    };

    let current_page = if total_pages == 0 {
        1
    } else {
        page.min(total_pages)
    };

    let start_index = (current_page - 1).saturating_mul(page_size);
    let items = items
        .into_iter()
        .skip(start_index)
        .take(page_size)
        .collect();

    Page {
        items,
        total,
        page: current_page,
        page_size,
        total_pages,
    }
}
