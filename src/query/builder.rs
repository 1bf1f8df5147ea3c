//! Fluent query builder over a model's finder
//!
//! Each clause may be set at most once per builder; a second invocation is
//! a usage error at the call site. Cross-clause invariants (`having`
//! requires `group_by`, `offset` and `page` are mutually exclusive) are
//! validated once, at the first terminal operation.

use std::sync::Arc;

use crate::error::{OrmError, OrmResult};
use crate::model::{FieldMap, Finder, ModelRegistry, Record};
use crate::query::options::{JoinType, QueryOptions};
use crate::query::pagination::{Paginator, PagingControl};

/// Builds a query against one model's finder surface.
pub struct QueryBuilder {
    model: String,
    finder: Arc<dyn Finder>,
    options: QueryOptions,
    used_where: bool,
    used_includes: bool,
    used_group_by: bool,
    used_having: bool,
    used_order_by: bool,
    used_limit: bool,
    used_offset: bool,
    used_page: bool,
}

impl std::fmt::Debug for QueryBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryBuilder")
            .field("model", &self.model)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl QueryBuilder {
    pub fn new(model: &str, finder: Arc<dyn Finder>) -> Self {
        Self {
            model: model.to_string(),
            finder,
            options: QueryOptions::default(),
            used_where: false,
            used_includes: false,
            used_group_by: false,
            used_having: false,
            used_order_by: false,
            used_limit: false,
            used_offset: false,
            used_page: false,
        }
    }

    /// Builds a query for a registered model.
    pub fn for_model(registry: &ModelRegistry, model: &str) -> OrmResult<Self> {
        Ok(Self::new(model, registry.finder(model)?))
    }

    /// Sets the where clause.
    pub fn where_clause(self, conditions_sql: &str) -> OrmResult<Self> {
        self.where_with_data(conditions_sql, FieldMap::new())
    }

    /// Sets the where clause with named placeholder data.
    pub fn where_with_data(mut self, conditions_sql: &str, data: FieldMap) -> OrmResult<Self> {
        if self.used_where {
            return Err(OrmError::DuplicateClause("where_clause"));
        }
        self.used_where = true;
        self.options.conditions_sql = Some(conditions_sql.to_string());
        self.options.conditions_data = data;
        Ok(self)
    }

    /// Sets associations to eager-load with relaxed (outer join) semantics.
    pub fn includes(mut self, includes: &str) -> OrmResult<Self> {
        self.mark_includes()?;
        self.options.include = Some(includes.to_string());
        Ok(self)
    }

    /// Sets associations to eager-load with an explicit join type.
    pub fn includes_with_join_type(mut self, includes: &str, join_type: &str) -> OrmResult<Self> {
        self.mark_includes()?;
        self.options.include = Some(includes.to_string());
        self.options.join_type = Some(JoinType::parse(join_type)?);
        Ok(self)
    }

    /// Sets associations to eager-load; `strict` selects inner-join
    /// semantics, stored under the strict-include key so downstream query
    /// assembly can pick the join type.
    pub fn includes_strict(mut self, includes: &str, strict: bool) -> OrmResult<Self> {
        self.mark_includes()?;
        if strict {
            self.options.strict_include = Some(includes.to_string());
        } else {
            self.options.include = Some(includes.to_string());
        }
        Ok(self)
    }

    fn mark_includes(&mut self) -> OrmResult<()> {
        if self.used_includes {
            return Err(OrmError::DuplicateClause("includes"));
        }
        self.used_includes = true;
        Ok(())
    }

    pub fn group_by(mut self, group_by: &str) -> OrmResult<Self> {
        if self.used_group_by {
            return Err(OrmError::DuplicateClause("group_by"));
        }
        self.used_group_by = true;
        self.options.group_by = Some(group_by.to_string());
        Ok(self)
    }

    pub fn having(mut self, having: &str) -> OrmResult<Self> {
        if self.used_having {
            return Err(OrmError::DuplicateClause("having"));
        }
        self.used_having = true;
        self.options.having = Some(having.to_string());
        Ok(self)
    }

    pub fn order_by(mut self, order_by: &str) -> OrmResult<Self> {
        if self.used_order_by {
            return Err(OrmError::DuplicateClause("order_by"));
        }
        self.used_order_by = true;
        self.options.order_by = Some(order_by.to_string());
        Ok(self)
    }

    pub fn limit(mut self, limit: u64) -> OrmResult<Self> {
        if self.used_limit {
            return Err(OrmError::DuplicateClause("limit"));
        }
        self.used_limit = true;
        self.options.limit = Some(limit);
        Ok(self)
    }

    pub fn offset(mut self, offset: u64) -> OrmResult<Self> {
        if self.used_offset {
            return Err(OrmError::DuplicateClause("offset"));
        }
        self.used_offset = true;
        self.options.offset = Some(offset);
        Ok(self)
    }

    /// Sets the page number; all records of previous pages are skipped.
    pub fn page(mut self, page: u64) -> OrmResult<Self> {
        if self.used_page {
            return Err(OrmError::DuplicateClause("page"));
        }
        self.used_page = true;
        self.options.page = Some(page);
        Ok(self)
    }

    /// Returns all records satisfying the built query.
    pub fn records(self) -> OrmResult<Vec<Record>> {
        self.validate_build()?;
        self.finder.find_all(&FieldMap::new(), &self.options)
    }

    /// Returns the first record satisfying the built query, if any.
    pub fn record(self) -> OrmResult<Option<Record>> {
        self.validate_build()?;
        self.finder.find_first(&FieldMap::new(), &self.options)
    }

    /// Returns a paginator over the built query. Limit, offset, and page
    /// move into the paging control and are excluded from the base options.
    pub fn paginator(self) -> OrmResult<Paginator> {
        self.validate_build()?;

        let control = PagingControl {
            limit: self.options.limit,
            offset: self.options.offset,
            page: self.options.page,
        };

        let mut base = self.options;
        base.limit = None;
        base.offset = None;
        base.page = None;

        Ok(Paginator::new(&self.model, self.finder, base, control))
    }

    fn validate_build(&self) -> OrmResult<()> {
        if self.used_having && !self.used_group_by {
            return Err(OrmError::IncompatibleClauses(
                "having() must be used together with group_by()".to_string(),
            ));
        }
        if self.used_offset && self.used_page {
            return Err(OrmError::IncompatibleClauses(
                "offset() and page() cannot both be set".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockFinder;

    fn builder(finder: &Arc<MockFinder>) -> QueryBuilder {
        QueryBuilder::new("post", Arc::clone(finder) as Arc<dyn Finder>)
    }

    #[test]
    fn where_clause_twice_fails() {
        let finder = Arc::new(MockFinder::new());
        let err = builder(&finder)
            .where_clause("status = 'open'")
            .unwrap()
            .where_clause("status = 'closed'")
            .unwrap_err();
        assert_eq!(err, OrmError::DuplicateClause("where_clause"));
    }

    #[test]
    fn includes_overloads_share_one_use() {
        let finder = Arc::new(MockFinder::new());
        let err = builder(&finder)
            .includes("category")
            .unwrap()
            .includes_strict("user", true)
            .unwrap_err();
        assert_eq!(err, OrmError::DuplicateClause("includes"));
    }

    #[test]
    fn strict_includes_use_the_strict_key() {
        let finder = Arc::new(MockFinder::new());
        let qb = builder(&finder).includes_strict("category", true).unwrap();
        assert_eq!(qb.options.strict_include.as_deref(), Some("category"));
        assert!(qb.options.include.is_none());
    }

    #[test]
    fn having_without_group_by_fails_at_terminal() {
        let finder = Arc::new(MockFinder::new());
        let qb = builder(&finder).having("count(*) > 1").unwrap();
        let err = qb.records().unwrap_err();
        assert!(matches!(err, OrmError::IncompatibleClauses(_)));
        assert_eq!(finder.fetch_count(), 0);
    }

    #[test]
    fn offset_and_page_together_fail_at_terminal() {
        let finder = Arc::new(MockFinder::new());
        let qb = builder(&finder)
            .offset(10)
            .unwrap()
            .page(2)
            .unwrap();
        assert!(matches!(qb.record(), Err(OrmError::IncompatibleClauses(_))));
    }

    #[test]
    fn records_delegates_to_find_all() {
        let finder = Arc::new(MockFinder::new());
        finder.stub_all(vec![crate::testing::record("post", &[("id", 1)])]);

        let records = builder(&finder)
            .where_clause("id > 0")
            .unwrap()
            .order_by("id")
            .unwrap()
            .records()
            .unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(finder.fetch_count(), 1);
        let opts = finder.last_options().unwrap();
        assert_eq!(opts.conditions_sql.as_deref(), Some("id > 0"));
        assert_eq!(opts.order_by.as_deref(), Some("id"));
    }

    #[test]
    fn paginator_strips_paging_keys_from_base_options() {
        let finder = Arc::new(MockFinder::new());
        let paginator = builder(&finder)
            .order_by("id")
            .unwrap()
            .limit(5)
            .unwrap()
            .page(3)
            .unwrap()
            .paginator()
            .unwrap();

        assert_eq!(paginator.page_size(), 5);
        assert_eq!(paginator.current_offset(), 10);
        assert!(paginator.base_options().limit.is_none());
        assert!(paginator.base_options().page.is_none());
        assert_eq!(paginator.base_options().order_by.as_deref(), Some("id"));
    }
}
