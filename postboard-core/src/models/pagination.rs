//! Offset pagination

use serde::{Deserialize, Serialize};

pub const DEFAULT_PAGE_SIZE: u32 = 10;
pub const MAX_PAGE_SIZE: u32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PaginationParams {
    pub page: u32,
    pub page_size: u32,
    pub offset: u64,
}

impl PaginationParams {
    /// Clamp the inputs: a page below 1 becomes 1, a page size outside
    /// `1..=100` becomes 10.
    pub fn new(page: i64, page_size: i64) -> Self {
        let page = if page < 1 {
            1
        } else {
            u32::try_from(page).unwrap_or(u32::MAX)
        };
        let page_size = if (1..=MAX_PAGE_SIZE as i64).contains(&page_size) {
            page_size as u32
        } else {
            DEFAULT_PAGE_SIZE
        };

        Self {
            page,
            page_size,
            offset: u64::from(page - 1) * u64::from(page_size),
        }
    }

    pub fn limit(&self) -> usize {
        self.page_size as usize
    }
}

impl Default for PaginationParams {
    fn default() -> Self {
        Self::new(1, DEFAULT_PAGE_SIZE as i64)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaginationMeta {
    pub page: u32,
    pub page_size: u32,
    pub total: u64,
    pub total_pages: u64,
    pub has_next: bool,
    pub has_previous: bool,
}

impl PaginationMeta {
    pub fn new(page: u32, page_size: u32, total: u64) -> Self {
        let size = u64::from(page_size.max(1));
        let total_pages = total.div_ceil(size);
        Self {
            page,
            page_size,
            total,
            total_pages,
            has_next: u64::from(page) < total_pages,
            has_previous: page > 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaginatedResponse<T> {
    pub data: Vec<T>,
    pub pagination: PaginationMeta,
}

/// Raw `page` / `page_size` query values.
///
/// Kept as strings so a malformed number falls back to the default instead
/// of rejecting the request.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PaginationQuery {
    pub page: Option<String>,
    pub page_size: Option<String>,
}

impl PaginationQuery {
    /// `None` when neither parameter was supplied
    pub fn params(&self) -> Option<PaginationParams> {
        if is_blank(&self.page) && is_blank(&self.page_size) {
            return None;
        }

        let page = parse_positive(&self.page).unwrap_or(1);
        let page_size = parse_positive(&self.page_size).unwrap_or(DEFAULT_PAGE_SIZE as i64);
        Some(PaginationParams::new(page, page_size))
    }
}

fn is_blank(raw: &Option<String>) -> bool {
    raw.as_deref().map_or(true, |s| s.trim().is_empty())
}

fn parse_positive(raw: &Option<String>) -> Option<i64> {
    raw.as_deref()
        .and_then(|s| s.trim().parse::<i64>().ok())
        .filter(|v| *v > 0)
}
