//! Offset pagination for catalog listings.

use serde::Serialize;

/// One-based page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub per_page: u32,
}

impl PageRequest {
    pub fn new(page: u32, per_page: u32) -> Self {
        Self {
            page: page.max(1),
            per_page: per_page.max(1),
        }
    }

    fn offset(&self) -> usize {
        (self.page as usize - 1).saturating_mul(self.per_page as usize)
    }
}

/// Pagination block rendered under `meta.pagination`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PaginationMeta {
    pub current_page: u32,
    pub per_page: u32,
    pub total: usize,
    pub last_page: u32,
    /// One-based position of the first item, `null` on an empty page.
    pub from: Option<usize>,
    pub to: Option<usize>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub meta: PaginationMeta,
}

/// Cuts `request`'s page out of `items`.
pub fn paginate<T>(items: Vec<T>, request: PageRequest) -> Page<T> {
    let total = items.len();
    let per_page = request.per_page as usize;
    let last_page = u32::try_from(total.div_ceil(per_page).max(1)).unwrap_or(u32::MAX);
    let offset = request.offset();

    let items: Vec<T> = items.into_iter().skip(offset).take(per_page).collect();
    let (from, to) = if items.is_empty() {
        (None, None)
    } else {
        (Some(offset + 1), Some(offset + items.len()))
    };

    Page {
        items,
        meta: PaginationMeta {
            current_page: request.page,
            per_page: request.per_page,
            total,
            last_page,
            from,
            to,
        },
    }
}
