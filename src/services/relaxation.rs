use crate::catalog::{CatalogQuery, Field, Filter};

/// Cap on the primary query, which feeds the ranking stage
pub const PRIMARY_LIMIT: usize = 80;

/// Cap on the relaxed retry
pub const RELAXED_LIMIT: usize = 5;

/// Fields dropped by relaxation
pub const RELAXED_FIELDS: [Field; 3] = [Field::Genres, Field::AllPeople, Field::StreamingServices];

pub fn primary_query(filter: Filter) -> CatalogQuery {
    CatalogQuery::best_rated(filter, PRIMARY_LIMIT)
}

/// Removes every relaxed field from the filter at once
///
/// Used when the primary query finds nothing; there is no per-constraint
/// backoff. Other constraints, including the year ceiling, are kept.
pub fn relax(filter: &Filter) -> Filter {
    filter.without_fields(&RELAXED_FIELDS)
}

pub fn relaxed_query(filter: &Filter) -> CatalogQuery {
    CatalogQuery::best_rated(relax(filter), RELAXED_LIMIT)
}
