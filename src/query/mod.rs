//! Query option set, fluent builder, and pagination

pub mod builder;
pub mod options;
pub mod pagination;

pub use builder::QueryBuilder;
pub use options::{JoinType, QueryOptions};
pub use pagination::{Paginator, PagingControl, DEFAULT_PAGE_SIZE};
