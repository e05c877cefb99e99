use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{Movie, MovieCard};

/// One entry of the ranking stage's reply
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct RankedPick {
    #[serde(rename = "primaryTitle")]
    pub primary_title: String,
    pub reason: String,
}

/// A catalog movie joined with the model's justification
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RankedMovie {
    #[serde(flatten)]
    pub movie: Movie,
    pub reason: String,
}

/// Response of the structured-preferences flow
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PreferenceRecommendations {
    pub recommendations: Vec<MovieCard>,
}

/// Response of the natural-language and feedback flows
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RankedRecommendations {
    pub recommendations: Vec<RankedMovie>,
    /// The synthesized catalog query, in document form
    #[serde(rename = "parsedQuery")]
    pub parsed_query: Value,
    /// Whether the primary query came back empty and was relaxed
    pub relaxed: bool,
}

/// Result of a recommendation flow
///
/// An empty result is a legitimate outcome rather than an error.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<T> {
    Found(T),
    NoResults,
}

impl<T> Outcome<T> {
    pub fn is_found(&self) -> bool {
        matches!(self, Outcome::Found(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_ranked_movie_flattens_record() {
        let movie: Movie = serde_json::from_value(json!({
            "primaryTitle": "Paddington 2",
            "startYear": 2017,
            "averageRating": 7.8
        }))
        .unwrap();

        let ranked = RankedMovie {
            movie,
            reason: "You will love its warmth.".to_string(),
        };

        let value = serde_json::to_value(&ranked).unwrap();
        assert_eq!(value["primaryTitle"], "Paddington 2");
        assert_eq!(value["startYear"], 2017);
        assert_eq!(value["reason"], "You will love its warmth.");
    }

    #[test]
    fn test_ranked_pick_requires_both_fields() {
        assert!(serde_json::from_value::<RankedPick>(json!({ "primaryTitle": "Up" })).is_err());
        assert!(serde_json::from_value::<RankedPick>(json!({ "primaryTitle": 3, "reason": "x" })).is_err());
    }
}
