//! Canonical query options
//!
//! High-level option strings use the shared textual convention
//! `"key: value; key: value"` (pairs split on `;`, key and value on the
//! first `:`). They are parsed once at the boundary into [`QueryOptions`],
//! a closed, typed key set; raw strings never travel further into the
//! engine. Relation-level properties and caller-supplied options are both
//! `QueryOptions` values merged with caller precedence.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{OrmError, OrmResult};

/// Join selection for eager includes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JoinType {
    /// Left outer join, the default
    Relaxed,
    /// Inner join
    Strict,
}

impl JoinType {
    pub fn parse(value: &str) -> OrmResult<Self> {
        match value {
            "relaxed" => Ok(Self::Relaxed),
            "strict" => Ok(Self::Strict),
            other => Err(OrmError::Configuration(format!(
                "unknown join type '{}', expected 'relaxed' or 'strict'",
                other
            ))),
        }
    }
}

/// Typed option map for a single fetch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryOptions {
    /// Extra conditional SQL appended to the query
    pub conditions_sql: Option<String>,
    /// Named data for placeholders in `conditions_sql`
    pub conditions_data: HashMap<String, Value>,
    /// Associations to eager-load with relaxed join semantics
    pub include: Option<String>,
    /// Associations to eager-load with inner-join semantics
    pub strict_include: Option<String>,
    pub join_type: Option<JoinType>,
    pub group_by: Option<String>,
    pub having: Option<String>,
    pub order_by: Option<String>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
    pub page: Option<u64>,
    /// Adds `DISTINCT` to the query when true
    pub unique: bool,
}

/// Splits an option string into raw `(key, value)` pairs.
///
/// Pairs are separated by `;`; key and value by the first `:`, so values
/// may contain commas (`"include: category, user"`) and `=` signs
/// (`"mapping: order_id=id"`). Segments without a `:` are skipped.
pub(crate) fn parse_option_pairs(options: &str) -> Vec<(String, String)> {
    let mut pairs = Vec::new();
    for segment in options.split(';') {
        let segment = segment.trim();
        if segment.is_empty() {
            continue;
        }
        if let Some((key, value)) = segment.split_once(':') {
            pairs.push((key.trim().to_string(), value.trim().to_string()));
        }
    }
    pairs
}

impl QueryOptions {
    /// Parses an option string. Empty input yields the default options.
    pub fn parse(options: &str) -> OrmResult<Self> {
        Self::from_pairs(parse_option_pairs(options))
    }

    /// Builds options from raw pairs, rejecting keys outside the known set.
    pub(crate) fn from_pairs(
        pairs: impl IntoIterator<Item = (String, String)>,
    ) -> OrmResult<Self> {
        let mut opts = Self::default();
        for (key, value) in pairs {
            opts.set(&key, &value)?;
        }
        Ok(opts)
    }

    fn set(&mut self, key: &str, value: &str) -> OrmResult<()> {
        match key {
            "conditions_sql" => self.conditions_sql = Some(value.to_string()),
            "include" => self.include = Some(value.to_string()),
            "strict_include" => self.strict_include = Some(value.to_string()),
            "join_type" => self.join_type = Some(JoinType::parse(value)?),
            "group_by" => self.group_by = Some(value.to_string()),
            "having" => self.having = Some(value.to_string()),
            "order_by" => self.order_by = Some(value.to_string()),
            "limit" => self.limit = Some(parse_number(key, value)?),
            "offset" => self.offset = Some(parse_number(key, value)?),
            "page" => self.page = Some(parse_number(key, value)?),
            "unique" => self.unique = value.eq_ignore_ascii_case("true"),
            other => {
                return Err(OrmError::Configuration(format!(
                    "unknown query option '{}'",
                    other
                )))
            }
        }
        Ok(())
    }

    /// Merges `overrides` over `self`, returning the combined options.
    /// Keys present in `overrides` win; `conditions_data` entries are
    /// unioned with override precedence.
    pub fn merge(&self, overrides: &Self) -> Self {
        let mut conditions_data = self.conditions_data.clone();
        conditions_data.extend(
            overrides
                .conditions_data
                .iter()
                .map(|(k, v)| (k.clone(), v.clone())),
        );

        Self {
            conditions_sql: overrides
                .conditions_sql
                .clone()
                .or_else(|| self.conditions_sql.clone()),
            conditions_data,
            include: overrides.include.clone().or_else(|| self.include.clone()),
            strict_include: overrides
                .strict_include
                .clone()
                .or_else(|| self.strict_include.clone()),
            join_type: overrides.join_type.or(self.join_type),
            group_by: overrides.group_by.clone().or_else(|| self.group_by.clone()),
            having: overrides.having.clone().or_else(|| self.having.clone()),
            order_by: overrides.order_by.clone().or_else(|| self.order_by.clone()),
            limit: overrides.limit.or(self.limit),
            offset: overrides.offset.or(self.offset),
            page: overrides.page.or(self.page),
            unique: overrides.unique || self.unique,
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

fn parse_number(key: &str, value: &str) -> OrmResult<u64> {
    value.parse().map_err(|_| {
        OrmError::Configuration(format!("option '{}' expects a number, got '{}'", key, value))
    })
}
