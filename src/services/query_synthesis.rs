use chrono::{Datelike, Utc};
use serde_json::Value;
use std::{sync::Arc, time::Duration};

use crate::{
    catalog::{Field, Filter, Predicate, Range, Scalar},
    error::{AppError, AppResult},
    llm::{self, LlmClient, ReplyCache},
    models::{Preferences, GENRES},
    services::sanitizer,
};

/// Builds a catalog filter straight from structured preferences
///
/// Each populated dimension becomes one any-of constraint; empty dimensions
/// are left out entirely rather than matched against empty values.
pub fn filter_from_preferences(preferences: &Preferences) -> Filter {
    let texts = |values: &[String]| values.iter().cloned().map(Scalar::Text).collect::<Vec<_>>();
    let mut clauses = Vec::new();

    if !preferences.genres.is_empty() {
        clauses.push(Filter::field(
            Field::Genres,
            Predicate::In(texts(&preferences.genres)),
        ));
    }
    if !preferences.people.is_empty() {
        clauses.push(Filter::field(
            Field::AllPeople,
            Predicate::In(texts(&preferences.people)),
        ));
    }
    if let Some(min_rating) = preferences.min_rating {
        clauses.push(Filter::field(
            Field::AverageRating,
            Predicate::Range(Range::at_least(min_rating)),
        ));
    }
    if !preferences.streaming_services.is_empty() {
        clauses.push(Filter::field(
            Field::StreamingServices,
            Predicate::In(texts(&preferences.streaming_services)),
        ));
    }

    Filter::And(clauses)
}

pub fn current_year() -> i32 {
    Utc::now().year()
}

/// Caps `startYear` at `year`, conjunctively
pub fn apply_year_ceiling(filter: Filter, year: i32) -> Filter {
    filter.and(Filter::field(
        Field::StartYear,
        Predicate::Range(Range::at_most(year as f64)),
    ))
}

/// Requires one of `services` unless the filter already guarantees it
fn enforce_services(filter: Filter, services: &[String]) -> Filter {
    if services.is_empty() || requires_any_of(&filter, services) {
        return filter;
    }
    filter.and(Filter::field(
        Field::StreamingServices,
        Predicate::In(services.iter().cloned().map(Scalar::Text).collect()),
    ))
}

/// True when a top-level conjunct only admits movies on one of `services`
///
/// Exclusions and disjunctions never qualify: `$nin` or a services branch
/// inside `$or` still lets other services through.
fn requires_any_of(filter: &Filter, services: &[String]) -> bool {
    let requested = |scalar: &Scalar| {
        scalar
            .as_text()
            .is_some_and(|name| services.iter().any(|s| s == name))
    };

    match filter {
        Filter::And(clauses) => clauses.iter().any(|c| requires_any_of(c, services)),
        Filter::Or(_) => false,
        Filter::Field(Field::StreamingServices, predicate) => match predicate {
            Predicate::Eq(scalar) => requested(scalar),
            Predicate::In(scalars) => !scalars.is_empty() && scalars.iter().all(requested),
            Predicate::All(scalars) => scalars.iter().any(requested),
            _ => false,
        },
        Filter::Field(..) => false,
    }
}

fn schema_section() -> String {
    format!(
        "The movie catalog has these fields:\n\
         - primaryTitle (string)\n\
         - startYear (integer)\n\
         - averageRating (float, 0 to 10)\n\
         - genres (list of strings, only from: {genres})\n\
         - AllPeople (list of strings: actors and directors together)\n\
         - StreamingServices (list of strings)\n\
         - runtimeMinutes (integer)\n\
         - isAdult (integer, 0 or 1)\n\
         - Tropes (list of strings, often missing)\n\n\
         Supported operators: $in, $nin, $all, $gt, $gte, $lt, $lte, $and, $or, and $regex with $options.\n",
        genres = GENRES.join(", ")
    )
}

fn rules_section(services: &[String]) -> String {
    let services_rule = if services.is_empty() {
        "- The user has not limited the streaming services.\n".to_string()
    } else {
        format!(
            "- Only include movies available on at least one of these streaming services: {}. \
             Use StreamingServices with $in.\n",
            services.join(", ")
        )
    };

    format!(
        "Rules:\n\
         - Use $regex on primaryTitle only when the user names an exact title or explicitly asks \
         for a sequel or a franchise. Never use $regex on any other field.\n\
         - Always constrain at least one of genres or AllPeople (actors or directors).\n\
         - When the intent is ambiguous, use your judgment about what the user most likely wants.\n\
         {services_rule}\
         - Respond with the JSON object only: no explanation and no code fences.\n"
    )
}

/// Prompt asking the model to translate a free-text request into a filter
pub fn build_synthesis_prompt(query: &str, services: &[String]) -> String {
    format!(
        "Convert this natural language movie request into a catalog query, written as a \
         MongoDB-style JSON filter object.\n\n\
         {schema}\n\
         {rules}\n\
         User request: \"{query}\"\n",
        schema = schema_section(),
        rules = rules_section(services),
        query = query.trim(),
    )
}

/// Prompt asking the model to refine earlier preferences using feedback
pub fn build_feedback_prompt(feedback: &str, original_preferences: &Value, services: &[String]) -> String {
    format!(
        "A user rated earlier movie recommendations and left feedback. Write a refined catalog \
         query, as a MongoDB-style JSON filter object, that keeps what still applies from their \
         original preferences and adjusts for the feedback.\n\n\
         {schema}\n\
         {rules}\n\
         Original preferences: {preferences}\n\
         Feedback: \"{feedback}\"\n",
        schema = schema_section(),
        rules = rules_section(services),
        preferences = original_preferences,
        feedback = feedback.trim(),
    )
}

/// Turns free text into a validated catalog filter through the model
#[derive(Clone)]
pub struct QuerySynthesizer {
    llm: Arc<dyn LlmClient>,
    cache: Option<Arc<dyn ReplyCache>>,
    timeout: Duration,
}

impl QuerySynthesizer {
    pub fn new(llm: Arc<dyn LlmClient>, timeout: Duration) -> Self {
        Self {
            llm,
            cache: None,
            timeout,
        }
    }

    pub fn with_cache(mut self, cache: Arc<dyn ReplyCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Sends `prompt` and validates the reply into a filter
    ///
    /// The returned filter always requires one of `services` (when any are
    /// given) and never admits movies dated after the current year. Only
    /// replies that validate are cached.
    pub async fn synthesize(&self, prompt: &str, services: &[String]) -> AppResult<Filter> {
        let cached = llm::recall(self.cache.as_deref(), "synthesis", prompt).await;
        let from_cache = cached.is_some();
        let raw = match cached {
            Some(raw) => raw,
            None => self.generate(prompt).await?,
        };

        let document = sanitizer::parse_mapping(&raw).map_err(|e| {
            tracing::error!(stage = "synthesis", error = %e, raw = %raw, "Unparsable query reply");
            AppError::synthesis(format!("Unparsable query reply: {}", e), Some(raw.clone()))
        })?;

        let filter = Filter::from_document(&document).map_err(|e| {
            tracing::error!(stage = "synthesis", error = %e, raw = %raw, "Invalid query filter");
            AppError::synthesis(format!("Invalid query filter: {}", e), Some(raw.clone()))
        })?;

        if !from_cache {
            if let Some(cache) = &self.cache {
                cache.store(prompt, &raw);
            }
        }

        if filter == Filter::match_all() {
            tracing::warn!(stage = "synthesis", raw = %raw, "Synthesized filter has no usable constraints");
        }

        let filter = apply_year_ceiling(enforce_services(filter, services), current_year());
        tracing::info!(stage = "synthesis", filter = %filter.to_document(), "Synthesized catalog query");

        Ok(filter)
    }

    async fn generate(&self, prompt: &str) -> AppResult<String> {
        match tokio::time::timeout(self.timeout, self.llm.generate(prompt)).await {
            Ok(Ok(raw)) => Ok(raw),
            Ok(Err(e)) => {
                tracing::error!(stage = "synthesis", llm = self.llm.name(), error = %e, "LLM call failed");
                Err(AppError::synthesis(format!("LLM call failed: {}", e), None))
            }
            Err(_) => {
                tracing::error!(
                    stage = "synthesis",
                    timeout_secs = self.timeout.as_secs_f64(),
                    "LLM call timed out"
                );
                Err(AppError::synthesis("LLM call timed out", None))
            }
        }
    }
}
