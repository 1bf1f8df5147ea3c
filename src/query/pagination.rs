//! Paged access over a model's finder
//!
//! The paginator owns the base options of a built query (with the paging
//! keys removed) and a paging control derived from them. Offset arithmetic
//! accepts either an explicit offset or a page number, never both; the
//! builder enforces that exclusivity before constructing one.

use std::sync::Arc;

use crate::error::OrmResult;
use crate::model::{FieldMap, Finder, Record};
use crate::query::options::QueryOptions;

/// Records per page when no limit was requested.
pub const DEFAULT_PAGE_SIZE: u64 = 10;

/// Paging keys extracted from a built query.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PagingControl {
    pub limit: Option<u64>,
    pub offset: Option<u64>,
    pub page: Option<u64>,
}

/// Pageable data source over one model.
pub struct Paginator {
    model: String,
    finder: Arc<dyn Finder>,
    base_options: QueryOptions,
    page_size: u64,
    offset: u64,
}

impl Paginator {
    pub(crate) fn new(
        model: &str,
        finder: Arc<dyn Finder>,
        base_options: QueryOptions,
        control: PagingControl,
    ) -> Self {
        let page_size = control.limit.unwrap_or(DEFAULT_PAGE_SIZE).max(1);
        let offset = match (control.offset, control.page) {
            (Some(offset), _) => offset,
            (None, Some(page)) => page.saturating_sub(1) * page_size,
            (None, None) => 0,
        };

        Self {
            model: model.to_string(),
            finder,
            base_options,
            page_size,
            offset,
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn page_size(&self) -> u64 {
        self.page_size
    }

    pub fn current_offset(&self) -> u64 {
        self.offset
    }

    /// 1-based page number implied by the current offset.
    pub fn current_page(&self) -> u64 {
        self.offset / self.page_size + 1
    }

    pub fn base_options(&self) -> &QueryOptions {
        &self.base_options
    }

    /// Fetches the current page of records.
    pub fn records(&self) -> OrmResult<Vec<Record>> {
        let mut options = self.base_options.clone();
        options.limit = Some(self.page_size);
        options.offset = Some(self.offset);
        self.finder.find_all(&FieldMap::new(), &options)
    }

    /// Fetches a specific 1-based page.
    pub fn records_for_page(&mut self, page: u64) -> OrmResult<Vec<Record>> {
        self.offset = page.saturating_sub(1) * self.page_size;
        self.records()
    }
}
