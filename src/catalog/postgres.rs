use sqlx::{PgPool, Postgres, QueryBuilder};

use crate::{
    catalog::{
        filter::FieldKind, CatalogQuery, CatalogStore, Direction, Field, Filter, Predicate, Range,
        Scalar,
    },
    error::AppResult,
    models::Movie,
};

const SELECT_MOVIES: &str = "SELECT primary_title, \
     COALESCE(start_year, 0) AS start_year, \
     COALESCE(average_rating, 0)::float8 AS average_rating, \
     COALESCE(genres, '{}') AS genres, \
     COALESCE(all_people, '{}') AS all_people, \
     COALESCE(streaming_services, '{}') AS streaming_services, \
     COALESCE(runtime_minutes, 0) AS runtime_minutes, \
     COALESCE(is_adult, 0) AS is_adult, \
     COALESCE(tropes, '{}') AS tropes \
     FROM movies WHERE ";

/// Catalog backed by a Postgres `movies` table
///
/// Scalar document fields map to columns of the same (snake_case) name and
/// list fields map to `text[]` columns. Filters are rendered to SQL with
/// bound parameters; only static column names are interpolated.
#[derive(Clone)]
pub struct PgCatalog {
    pool: PgPool,
}

impl PgCatalog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Builds the SELECT for a catalog query
pub fn build_find_query(query: &CatalogQuery) -> QueryBuilder<'static, Postgres> {
    let mut builder = QueryBuilder::new(SELECT_MOVIES);
    push_filter(&mut builder, &query.filter);

    let order: Vec<String> = query
        .sort
        .iter()
        .filter(|key| key.field.kind() != FieldKind::TextList)
        .map(|key| {
            let direction = match key.direction {
                Direction::Ascending => "ASC",
                Direction::Descending => "DESC",
            };
            format!("{} {} NULLS LAST", key.field.column(), direction)
        })
        .collect();

    if !order.is_empty() {
        builder.push(" ORDER BY ");
        builder.push(order.join(", "));
    }

    if let Some(limit) = query.limit {
        builder.push(" LIMIT ");
        builder.push_bind(limit as i64);
    }

    builder
}

fn push_filter(builder: &mut QueryBuilder<'static, Postgres>, filter: &Filter) {
    match filter {
        Filter::And(clauses) if clauses.is_empty() => {
            builder.push("TRUE");
        }
        Filter::Or(clauses) if clauses.is_empty() => {
            builder.push("FALSE");
        }
        Filter::And(clauses) | Filter::Or(clauses) => {
            let joiner = if matches!(filter, Filter::And(_)) {
                " AND "
            } else {
                " OR "
            };
            builder.push("(");
            for (i, clause) in clauses.iter().enumerate() {
                if i > 0 {
                    builder.push(joiner);
                }
                push_filter(builder, clause);
            }
            builder.push(")");
        }
        Filter::Field(field, predicate) => push_predicate(builder, *field, predicate),
    }
}

fn texts(scalars: &[Scalar]) -> Vec<String> {
    scalars
        .iter()
        .filter_map(Scalar::as_text)
        .map(str::to_string)
        .collect()
}

fn numbers(scalars: &[Scalar]) -> Vec<f64> {
    scalars.iter().filter_map(Scalar::as_number).collect()
}

fn push_predicate(builder: &mut QueryBuilder<'static, Postgres>, field: Field, predicate: &Predicate) {
    let column = field.column();

    match (field.kind(), predicate) {
        (FieldKind::Text, Predicate::Eq(Scalar::Text(value))) => {
            builder.push(format!("{} = ", column));
            builder.push_bind(value.clone());
        }
        (FieldKind::Text, Predicate::In(values)) => {
            builder.push(format!("{} = ANY(", column));
            builder.push_bind(texts(values));
            builder.push(")");
        }
        (FieldKind::Text, Predicate::Nin(values)) => {
            builder.push(format!("NOT ({} = ANY(", column));
            builder.push_bind(texts(values));
            builder.push("))");
        }
        (FieldKind::Text, Predicate::All(values)) => {
            builder.push(format!("{} = ALL(", column));
            builder.push_bind(texts(values));
            builder.push(")");
        }
        (FieldKind::Text, Predicate::Regex(pattern)) => {
            let op = if pattern.is_case_insensitive() { "~*" } else { "~" };
            builder.push(format!("{} {} ", column, op));
            builder.push_bind(pattern.as_str().to_string());
        }

        (FieldKind::Number, Predicate::Eq(Scalar::Number(value))) => {
            builder.push(format!("{}::float8 = ", column));
            builder.push_bind(*value);
        }
        (FieldKind::Number, Predicate::In(values)) => {
            builder.push(format!("{}::float8 = ANY(", column));
            builder.push_bind(numbers(values));
            builder.push(")");
        }
        (FieldKind::Number, Predicate::Nin(values)) => {
            builder.push(format!("NOT ({}::float8 = ANY(", column));
            builder.push_bind(numbers(values));
            builder.push("))");
        }
        (FieldKind::Number, Predicate::All(values)) => {
            builder.push(format!("{}::float8 = ALL(", column));
            builder.push_bind(numbers(values));
            builder.push(")");
        }
        (FieldKind::Number, Predicate::Range(range)) => push_range(builder, column, range),

        (FieldKind::TextList, Predicate::Eq(Scalar::Text(value))) => {
            builder.push_bind(value.clone());
            builder.push(format!(" = ANY(COALESCE({}, '{{}}'))", column));
        }
        (FieldKind::TextList, Predicate::In(values)) => {
            builder.push(format!("COALESCE({}, '{{}}') && ", column));
            builder.push_bind(texts(values));
        }
        (FieldKind::TextList, Predicate::Nin(values)) => {
            builder.push(format!("NOT (COALESCE({}, '{{}}') && ", column));
            builder.push_bind(texts(values));
            builder.push(")");
        }
        (FieldKind::TextList, Predicate::All(values)) => {
            builder.push(format!("COALESCE({}, '{{}}') @> ", column));
            builder.push_bind(texts(values));
        }
        (FieldKind::TextList, Predicate::Regex(pattern)) => {
            let op = if pattern.is_case_insensitive() { "~*" } else { "~" };
            builder.push(format!(
                "EXISTS (SELECT 1 FROM unnest({}) AS v WHERE v {} ",
                column, op
            ));
            builder.push_bind(pattern.as_str().to_string());
            builder.push(")");
        }

        // validation never produces these combinations
        (kind, predicate) => {
            tracing::warn!(
                field = %field,
                kind = ?kind,
                predicate = ?predicate,
                "Predicate does not apply to field type"
            );
            builder.push("FALSE");
        }
    }
}

fn push_range(builder: &mut QueryBuilder<'static, Postgres>, column: &str, range: &Range) {
    let bounds = [
        (">", range.gt),
        (">=", range.gte),
        ("<", range.lt),
        ("<=", range.lte),
    ];

    builder.push("(");
    let mut first = true;
    for (op, bound) in bounds {
        if let Some(value) = bound {
            if !first {
                builder.push(" AND ");
            }
            first = false;
            builder.push(format!("{}::float8 {} ", column, op));
            builder.push_bind(value);
        }
    }
    if first {
        builder.push("TRUE");
    }
    builder.push(")");
}

#[async_trait::async_trait]
impl CatalogStore for PgCatalog {
    async fn find(&self, query: &CatalogQuery) -> AppResult<Vec<Movie>> {
        let mut builder = build_find_query(query);
        tracing::debug!(sql = %builder.sql(), "Catalog query");

        let movies = builder
            .build_query_as::<Movie>()
            .fetch_all(&self.pool)
            .await?;

        Ok(movies)
    }

    async fn distinct(&self, field: Field) -> AppResult<Vec<String>> {
        let column = field.column();
        let sql = match field.kind() {
            FieldKind::TextList => format!(
                "SELECT DISTINCT v FROM movies, unnest({}) AS v ORDER BY v",
                column
            ),
            _ => format!(
                "SELECT DISTINCT {}::text AS v FROM movies WHERE {} IS NOT NULL ORDER BY v",
                column, column
            ),
        };

        let values = sqlx::query_scalar::<_, String>(&sql)
            .fetch_all(&self.pool)
            .await?;

        Ok(values)
    }

    fn name(&self) -> &'static str {
        "postgres"
    }
}
