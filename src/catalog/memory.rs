use std::{cmp::Ordering, collections::BTreeSet, path::Path};

use crate::{
    catalog::{CatalogQuery, CatalogStore, Direction, Field, SortKey},
    error::{AppError, AppResult},
    models::Movie,
};

/// Catalog held in memory
///
/// Loaded from a JSON array of catalog documents. Serves local runs without a
/// database and backs the test suite.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCatalog {
    movies: Vec<Movie>,
}

impl InMemoryCatalog {
    pub fn new(movies: Vec<Movie>) -> Self {
        Self { movies }
    }

    /// Loads a catalog from a JSON file containing an array of movie documents
    pub fn from_json_file(path: impl AsRef<Path>) -> AppResult<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            AppError::Catalog(format!("Failed to read catalog seed {}: {}", path.display(), e))
        })?;
        let movies: Vec<Movie> = serde_json::from_str(&contents).map_err(|e| {
            AppError::Catalog(format!("Invalid catalog seed {}: {}", path.display(), e))
        })?;

        tracing::info!(
            path = %path.display(),
            movies = movies.len(),
            "Loaded in-memory catalog"
        );

        Ok(Self::new(movies))
    }
}

fn compare(a: &Movie, b: &Movie, sort: &[SortKey]) -> Ordering {
    for key in sort {
        let ordering = match key.field {
            Field::PrimaryTitle => a.primary_title.cmp(&b.primary_title),
            Field::StartYear => a.start_year.cmp(&b.start_year),
            Field::AverageRating => a.average_rating.total_cmp(&b.average_rating),
            Field::RuntimeMinutes => a.runtime_minutes.cmp(&b.runtime_minutes),
            Field::IsAdult => a.is_adult.cmp(&b.is_adult),
            // list fields carry no natural order
            Field::Genres | Field::AllPeople | Field::StreamingServices | Field::Tropes => {
                Ordering::Equal
            }
        };
        let ordering = match key.direction {
            Direction::Ascending => ordering,
            Direction::Descending => ordering.reverse(),
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

#[async_trait::async_trait]
impl CatalogStore for InMemoryCatalog {
    async fn find(&self, query: &CatalogQuery) -> AppResult<Vec<Movie>> {
        let mut matched: Vec<&Movie> = self
            .movies
            .iter()
            .filter(|movie| query.filter.matches(movie))
            .collect();

        // stable sort keeps catalog order among ties
        matched.sort_by(|a, b| compare(a, b, &query.sort));

        let limit = query.limit.unwrap_or(matched.len());
        Ok(matched.into_iter().take(limit).cloned().collect())
    }

    async fn distinct(&self, field: Field) -> AppResult<Vec<String>> {
        let mut values = BTreeSet::new();
        for movie in &self.movies {
            match field {
                Field::PrimaryTitle => {
                    values.insert(movie.primary_title.clone());
                }
                Field::StartYear => {
                    values.insert(movie.start_year.to_string());
                }
                Field::AverageRating => {
                    values.insert(movie.average_rating.to_string());
                }
                Field::RuntimeMinutes => {
                    values.insert(movie.runtime_minutes.to_string());
                }
                Field::IsAdult => {
                    values.insert(movie.is_adult.to_string());
                }
                Field::Genres => values.extend(movie.genres.iter().cloned()),
                Field::AllPeople => values.extend(movie.all_people.iter().cloned()),
                Field::StreamingServices => values.extend(movie.streaming_services.iter().cloned()),
                Field::Tropes => values.extend(movie.tropes.iter().cloned()),
            }
        }
        Ok(values.into_iter().collect())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Filter, Predicate, Range, Scalar};

    fn movie(title: &str, year: i32, rating: f64, genres: &[&str]) -> Movie {
        Movie {
            primary_title: title.to_string(),
            start_year: year,
            average_rating: rating,
            genres: genres.iter().map(|s| s.to_string()).collect(),
            all_people: vec![],
            streaming_services: vec!["Netflix".to_string()],
            runtime_minutes: 90,
            is_adult: 0,
            tropes: vec![],
        }
    }

    fn catalog() -> InMemoryCatalog {
        InMemoryCatalog::new(vec![
            movie("Airplane!", 1980, 7.7, &["Comedy"]),
            movie("Game Night", 2018, 6.9, &["Comedy", "Crime"]),
            movie("The Grand Budapest Hotel", 2014, 8.1, &["Comedy", "Drama"]),
            movie("Alien", 1979, 8.5, &["Horror", "Sci-Fi"]),
            movie("Palm Springs", 2020, 7.4, &["Comedy", "Romance"]),
            movie("Booksmart", 2019, 7.1, &["Comedy"]),
            movie("Booksmart", 2019, 7.1, &["Comedy"]),
        ])
    }

    #[tokio::test]
    async fn test_find_filters_sorts_and_limits() {
        let filter = Filter::field(
            Field::Genres,
            Predicate::In(vec![Scalar::Text("Comedy".to_string())]),
        );
        let results = catalog()
            .find(&CatalogQuery::best_rated(filter, 3))
            .await
            .unwrap();

        let titles: Vec<&str> = results.iter().map(|m| m.primary_title.as_str()).collect();
        assert_eq!(titles, vec!["The Grand Budapest Hotel", "Airplane!", "Palm Springs"]);
    }

    #[tokio::test]
    async fn test_find_secondary_sort_by_year() {
        let catalog = InMemoryCatalog::new(vec![
            movie("Older", 1990, 8.0, &[]),
            movie("Newer", 2010, 8.0, &[]),
        ]);

        let results = catalog
            .find(&CatalogQuery::best_rated(Filter::match_all(), 10))
            .await
            .unwrap();
        assert_eq!(results[0].primary_title, "Newer");
    }

    #[tokio::test]
    async fn test_find_without_limit_returns_all_matches() {
        let filter = Filter::field(Field::StartYear, Predicate::Range(Range::at_least(2018.0)));
        let results = catalog().find(&CatalogQuery::new(filter)).await.unwrap();
        assert_eq!(results.len(), 4);
    }

    #[tokio::test]
    async fn test_distinct_flattens_lists() {
        let genres = catalog().distinct(Field::Genres).await.unwrap();
        assert_eq!(
            genres,
            vec!["Comedy", "Crime", "Drama", "Horror", "Romance", "Sci-Fi"]
        );

        let titles = catalog().distinct(Field::PrimaryTitle).await.unwrap();
        assert_eq!(titles.len(), 6);
    }

    #[test]
    fn test_from_json_file_missing_path() {
        let result = InMemoryCatalog::from_json_file("/nonexistent/catalog.json");
        assert!(matches!(result, Err(AppError::Catalog(_))));
    }
}
