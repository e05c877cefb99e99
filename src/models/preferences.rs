use serde::{de, Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Body of `POST /api/recommend`
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct PreferenceRequest {
    /// Comma-separated genre names
    #[serde(default)]
    pub genres: String,
    /// Comma-separated actor or director names
    #[serde(default)]
    pub actors: String,
    /// Accepts a number or a numeric string; the web form sends either
    #[serde(default, deserialize_with = "deserialize_rating")]
    pub min_rating: Option<f64>,
    #[serde(default)]
    pub streaming_services: Vec<String>,
}

/// Body of the natural-language recommendation endpoint
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct NaturalLanguageRequest {
    #[serde(default)]
    pub natural_language_query: String,
    #[serde(default)]
    pub streaming_services: Vec<String>,
}

/// Body of `POST /api/feedback`
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct FeedbackRequest {
    #[serde(default)]
    pub feedback: String,
    #[serde(rename = "originalPreferences", default)]
    pub original_preferences: Option<Value>,
}

impl FeedbackRequest {
    /// Streaming services carried over from the original preferences, if any
    pub fn streaming_services(&self) -> Vec<String> {
        self.original_preferences
            .as_ref()
            .and_then(|prefs| prefs.get("streaming_services"))
            .and_then(Value::as_array)
            .map(|services| {
                services
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Normalized structured preferences
///
/// Each dimension is either populated or empty; empty dimensions are left
/// unconstrained when the catalog filter is built.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Preferences {
    pub genres: Vec<String>,
    pub people: Vec<String>,
    pub min_rating: Option<f64>,
    pub streaming_services: Vec<String>,
}

impl Preferences {
    /// Returns true when no dimension is populated
    pub fn is_empty(&self) -> bool {
        self.genres.is_empty()
            && self.people.is_empty()
            && self.min_rating.is_none()
            && self.streaming_services.is_empty()
    }
}

impl From<PreferenceRequest> for Preferences {
    fn from(request: PreferenceRequest) -> Self {
        Self {
            genres: split_tokens(&request.genres),
            people: split_tokens(&request.actors),
            // A floor of zero excludes nothing
            min_rating: request.min_rating.filter(|rating| *rating > 0.0),
            streaming_services: request
                .streaming_services
                .iter()
                .map(|s| s.trim())
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
        }
    }
}

/// Splits a comma-separated field, trimming tokens and discarding empty ones
pub fn split_tokens(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(str::to_string)
        .collect()
}

fn deserialize_rating<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n
            .as_f64()
            .map(Some)
            .ok_or_else(|| de::Error::custom("min_rating is not a finite number")),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(Value::String(s)) => s
            .trim()
            .parse::<f64>()
            .map(Some)
            .map_err(|_| de::Error::custom(format!("min_rating is not a number: {}", s))),
        Some(other) => Err(de::Error::custom(format!(
            "min_rating must be a number, got {}",
            other
        ))),
    }
}
