use serde::{Deserialize, Serialize};

/// Page size used when the caller does not ask for one.
pub const DEFAULT_LIMIT: u32 = 20;

/// Largest page size a caller may request.
pub const MAX_LIMIT: u32 = 50;

/// Error returned for out-of-range pagination parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaginationError {
    /// `limit` was outside `1..=MAX_LIMIT`.
    Limit(u32),
    /// `page` was zero.
    Page(u32),
}

impl std::fmt::Display for PaginationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaginationError::Limit(limit) => {
                write!(f, "limit must be between 1 and {MAX_LIMIT}, got {limit}")
            }
            PaginationError::Page(page) => write!(f, "page must be at least 1, got {page}"),
        }
    }
}

impl std::error::Error for PaginationError {}

/// A validated page request (1-based page number).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    page: u32,
    limit: u32,
}

impl Pagination {
    /// Validates optional page and limit values, applying defaults for missing ones.
    pub fn new(page: Option<u32>, limit: Option<u32>) -> Result<Self, PaginationError> {
        let page = page.unwrap_or(1);
        let limit = limit.unwrap_or(DEFAULT_LIMIT);

        if page == 0 {
            return Err(PaginationError::Page(page));
        }
        if limit == 0 || limit > MAX_LIMIT {
            return Err(PaginationError::Limit(limit));
        }

        Ok(Self { page, limit })
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    /// Number of records to skip before this page.
    pub fn offset(&self) -> usize {
        (self.page as usize - 1) * self.limit as usize
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page: 1,
            limit: DEFAULT_LIMIT,
        }
    }
}

/// Paging metadata returned alongside a page of results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageInfo {
    pub page: u32,
    pub limit: u32,
    pub total: u64,
    pub pages: u64,
}

/// One page of results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub pagination: PageInfo,
}

impl<T> Page<T> {
    /// Builds a page from its items, the request that produced it and the total match count.
    pub fn new(items: Vec<T>, request: Pagination, total: u64) -> Self {
        let limit = u64::from(request.limit());
        Self {
            items,
            pagination: PageInfo {
                page: request.page(),
                limit: request.limit(),
                total,
                pages: total.div_ceil(limit),
            },
        }
    }

    /// Maps the items, keeping the paging metadata.
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            pagination: self.pagination,
        }
    }
}
