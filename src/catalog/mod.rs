use crate::{error::AppResult, models::Movie};

pub mod filter;
pub mod memory;
pub mod postgres;

pub use filter::{Field, Filter, FilterError, Pattern, Predicate, Range, Scalar};
pub use memory::InMemoryCatalog;
pub use postgres::PgCatalog;

/// Sort direction for one key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Ascending,
    Descending,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortKey {
    pub field: Field,
    pub direction: Direction,
}

/// A filter plus ordering and a result cap
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogQuery {
    pub filter: Filter,
    pub sort: Vec<SortKey>,
    pub limit: Option<usize>,
}

impl CatalogQuery {
    pub fn new(filter: Filter) -> Self {
        Self {
            filter,
            sort: Vec::new(),
            limit: None,
        }
    }

    pub fn sort_by(mut self, field: Field, direction: Direction) -> Self {
        self.sort.push(SortKey { field, direction });
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Best rated first, newest first among equals
    pub fn best_rated(filter: Filter, limit: usize) -> Self {
        Self::new(filter)
            .sort_by(Field::AverageRating, Direction::Descending)
            .sort_by(Field::StartYear, Direction::Descending)
            .limit(limit)
    }
}

/// Trait for catalog stores
///
/// Implementations translate a [`CatalogQuery`] into their native query
/// language (SQL for Postgres, predicate evaluation in memory). Stores are shared across requests behind an `Arc` and must be safe to call
/// concurrently. They are never written to by this service.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait CatalogStore: Send + Sync {
    /// Returns the movies matching the query, sorted and capped as requested
    async fn find(&self, query: &CatalogQuery) -> AppResult<Vec<Movie>>;

    /// Returns the distinct values of a field, sorted
    ///
    /// List fields are flattened. Used for diagnostics only.
    async fn distinct(&self, field: Field) -> AppResult<Vec<String>>;

    /// Store name for logging and debugging
    fn name(&self) -> &'static str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_best_rated_query_shape() {
        let query = CatalogQuery::best_rated(Filter::match_all(), 80);
        assert_eq!(query.limit, Some(80));
        assert_eq!(
            query.sort,
            vec![
                SortKey {
                    field: Field::AverageRating,
                    direction: Direction::Descending
                },
                SortKey {
                    field: Field::StartYear,
                    direction: Direction::Descending
                },
            ]
        );
    }
}
