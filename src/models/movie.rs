use serde::{Deserialize, Serialize};

/// Closed genre vocabulary used by the catalog (IMDb genre list)
pub const GENRES: &[&str] = &[
    "Action",
    "Adult",
    "Adventure",
    "Animation",
    "Biography",
    "Comedy",
    "Crime",
    "Documentary",
    "Drama",
    "Family",
    "Fantasy",
    "Film-Noir",
    "Game-Show",
    "History",
    "Horror",
    "Music",
    "Musical",
    "Mystery",
    "News",
    "Reality-TV",
    "Romance",
    "Sci-Fi",
    "Short",
    "Sport",
    "Talk-Show",
    "Thriller",
    "War",
    "Western",
];

/// A catalog movie document
///
/// Field names on the wire follow the catalog documents exactly, which mixes
/// camelCase and PascalCase. Column names in Postgres are the snake_case
/// field names.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, sqlx::FromRow)]
pub struct Movie {
    #[serde(rename = "primaryTitle")]
    pub primary_title: String,
    #[serde(rename = "startYear", default)]
    pub start_year: i32,
    #[serde(rename = "averageRating", default)]
    pub average_rating: f64,
    #[serde(default)]
    pub genres: Vec<String>,
    #[serde(rename = "AllPeople", default)]
    pub all_people: Vec<String>,
    #[serde(rename = "StreamingServices", default)]
    pub streaming_services: Vec<String>,
    #[serde(rename = "runtimeMinutes", default)]
    pub runtime_minutes: i32,
    #[serde(rename = "isAdult", default)]
    pub is_adult: i32,
    #[serde(rename = "Tropes", default)]
    pub tropes: Vec<String>,
}

/// Card returned by the structured-preferences flow
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct MovieCard {
    #[serde(rename = "primaryTitle")]
    pub primary_title: String,
    #[serde(rename = "startYear")]
    pub start_year: i32,
    #[serde(rename = "averageRating")]
    pub average_rating: f64,
    pub genres: Vec<String>,
    #[serde(rename = "AllPeople")]
    pub all_people: Vec<String>,
    #[serde(rename = "StreamingServices")]
    pub streaming_services: Vec<String>,
}

impl From<Movie> for MovieCard {
    fn from(movie: Movie) -> Self {
        Self {
            primary_title: movie.primary_title,
            start_year: movie.start_year,
            average_rating: movie.average_rating,
            genres: movie.genres,
            all_people: movie.all_people,
            streaming_services: movie.streaming_services,
        }
    }
}

/// Metadata-only projection embedded in the ranking prompt
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct MovieSummary<'a> {
    #[serde(rename = "primaryTitle")]
    pub primary_title: &'a str,
    pub genres: &'a [String],
    #[serde(rename = "startYear")]
    pub start_year: i32,
    #[serde(rename = "averageRating")]
    pub average_rating: f64,
    #[serde(rename = "AllPeople")]
    pub all_people: &'a [String],
    #[serde(rename = "Tropes", skip_serializing_if = "no_tropes")]
    pub tropes: &'a [String],
    #[serde(rename = "runtimeMinutes")]
    pub runtime_minutes: i32,
}

fn no_tropes(tropes: &&[String]) -> bool {
    tropes.is_empty()
}

impl<'a> From<&'a Movie> for MovieSummary<'a> {
    fn from(movie: &'a Movie) -> Self {
        Self {
            primary_title: &movie.primary_title,
            genres: &movie.genres,
            start_year: movie.start_year,
            average_rating: movie.average_rating,
            all_people: &movie.all_people,
            tropes: &movie.tropes,
            runtime_minutes: movie.runtime_minutes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_movie_from_catalog_document() {
        let doc = json!({
            "primaryTitle": "Frozen II",
            "startYear": 2019,
            "averageRating": 6.8,
            "genres": ["Adventure", "Animation", "Comedy"],
            "AllPeople": ["Kristen Bell", "Idina Menzel", "Chris Buck"],
            "StreamingServices": ["Disney+"],
            "runtimeMinutes": 103,
            "isAdult": 0
        });

        let movie: Movie = serde_json::from_value(doc).unwrap();
        assert_eq!(movie.primary_title, "Frozen II");
        assert_eq!(movie.start_year, 2019);
        assert_eq!(movie.all_people.len(), 3);
        assert_eq!(movie.streaming_services, vec!["Disney+".to_string()]);
        assert!(movie.tropes.is_empty());
    }

    #[test]
    fn test_sparse_document_uses_defaults() {
        let movie: Movie = serde_json::from_value(json!({ "primaryTitle": "Untitled" })).unwrap();
        assert_eq!(movie.start_year, 0);
        assert_eq!(movie.average_rating, 0.0);
        assert!(movie.genres.is_empty());
    }

    #[test]
    fn test_summary_omits_streaming_and_empty_tropes() {
        let movie: Movie = serde_json::from_value(json!({
            "primaryTitle": "Heat",
            "startYear": 1995,
            "averageRating": 8.3,
            "genres": ["Crime"],
            "AllPeople": ["Michael Mann"],
            "StreamingServices": ["Max"],
            "runtimeMinutes": 170
        }))
        .unwrap();

        let summary = serde_json::to_value(MovieSummary::from(&movie)).unwrap();
        assert_eq!(summary["primaryTitle"], "Heat");
        assert_eq!(summary["runtimeMinutes"], 170);
        assert!(summary.get("StreamingServices").is_none());
        assert!(summary.get("Tropes").is_none());
    }

    #[test]
    fn test_card_keeps_display_fields() {
        let movie: Movie = serde_json::from_value(json!({
            "primaryTitle": "Heat",
            "startYear": 1995,
            "averageRating": 8.3,
            "Tropes": ["Heist"]
        }))
        .unwrap();

        let card = serde_json::to_value(MovieCard::from(movie)).unwrap();
        assert_eq!(card["startYear"], 1995);
        assert!(card.get("Tropes").is_none());
    }
}
