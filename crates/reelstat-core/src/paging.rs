//! Pagination types shared by the listing queries.

use serde::{Deserialize, Serialize};

/// Bounds applied to a requested page size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageLimits {
    #[serde(default = "default_min")]
    pub min: u32,
    #[serde(default = "default_max")]
    pub max: u32,
    /// Page size used when the caller asks for none.
    #[serde(default = "default_size")]
    pub default: u32,
}

const fn default_min() -> u32 {
    10
}

const fn default_max() -> u32 {
    100
}

const fn default_size() -> u32 {
    20
}

impl Default for PageLimits {
    fn default() -> Self {
        Self {
            min: default_min(),
            max: default_max(),
            default: default_size(),
        }
    }
}

impl PageLimits {
    /// Resolve a request into a concrete 1-based page and a clamped size.
    pub fn resolve(&self, page: Option<u32>, items_per_page: Option<u32>) -> PageWindow {
        let per_page = items_per_page
            .unwrap_or(self.default)
            .clamp(self.min, self.max.max(self.min));
        let page = page.filter(|p| *p > 0).unwrap_or(1);
        PageWindow { page, per_page }
    }
}

/// A resolved page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    pub page: u32,
    pub per_page: u32,
}

impl PageWindow {
    /// Number of rows to skip: `(page - 1) * per_page`.
    pub fn offset(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.per_page)
    }

    pub fn limit(&self) -> u64 {
        u64::from(self.per_page)
    }

    /// Paging summary for a result set of `count` rows.
    pub fn pagination(&self, count: u64) -> Pagination {
        Pagination {
            count,
            page_count: count.div_ceil(u64::from(self.per_page)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub count: u64,
    pub page_count: u64,
}

/// One page of results plus the totals needed to navigate the rest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub pagination: Pagination,
    pub items: Vec<T>,
}
