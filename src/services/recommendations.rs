use serde_json::Value;
use std::{sync::Arc, time::Duration};

use crate::{
    catalog::{CatalogQuery, CatalogStore, Filter},
    error::{AppError, AppResult},
    llm::{LlmClient, ReplyCache},
    models::{
        FeedbackRequest, Movie, MovieCard, NaturalLanguageRequest, Outcome, PreferenceRecommendations,
        PreferenceRequest, Preferences, RankedRecommendations,
    },
    services::{
        query_synthesis::{self, QuerySynthesizer},
        ranking::Ranker,
        relaxation,
    },
};

/// Most movies the structured-preferences flow returns
pub const PREFERENCE_LIMIT: usize = 5;

/// Composes synthesis, retrieval, relaxation and ranking into the
/// recommendation flows
///
/// Holds no per-request state; one instance serves every request.
#[derive(Clone)]
pub struct Recommender {
    catalog: Arc<dyn CatalogStore>,
    synthesizer: QuerySynthesizer,
    ranker: Ranker,
    catalog_timeout: Duration,
}

impl Recommender {
    pub fn new(
        catalog: Arc<dyn CatalogStore>,
        llm: Arc<dyn LlmClient>,
        llm_timeout: Duration,
        catalog_timeout: Duration,
    ) -> Self {
        Self {
            catalog,
            synthesizer: QuerySynthesizer::new(llm.clone(), llm_timeout),
            ranker: Ranker::new(llm, llm_timeout),
            catalog_timeout,
        }
    }

    /// Caches validated model replies for both stages
    pub fn with_reply_cache(mut self, cache: Arc<dyn ReplyCache>) -> Self {
        self.synthesizer = self.synthesizer.with_cache(cache.clone());
        self.ranker = self.ranker.with_cache(cache);
        self
    }

    /// Recommends from structured preferences alone, without the model
    pub async fn recommend_by_preferences(
        &self,
        request: PreferenceRequest,
    ) -> AppResult<Outcome<PreferenceRecommendations>> {
        if let Some(rating) = request.min_rating {
            if !(0.0..=10.0).contains(&rating) {
                return Err(AppError::InvalidInput(
                    "min_rating must be between 0 and 10".to_string(),
                ));
            }
        }

        let preferences = Preferences::from(request);
        if preferences.is_empty() {
            return Err(AppError::InvalidInput(
                "At least one of genres, actors, min_rating or streaming_services is required"
                    .to_string(),
            ));
        }

        let filter = query_synthesis::filter_from_preferences(&preferences);
        let movies = self
            .find(CatalogQuery::best_rated(filter, PREFERENCE_LIMIT))
            .await?;

        tracing::info!(found = movies.len(), "Preference recommendations");

        if movies.is_empty() {
            return Ok(Outcome::NoResults);
        }

        Ok(Outcome::Found(PreferenceRecommendations {
            recommendations: movies.into_iter().map(MovieCard::from).collect(),
        }))
    }

    /// Recommends from a free-text request
    pub async fn recommend_by_query(
        &self,
        request: NaturalLanguageRequest,
    ) -> AppResult<Outcome<RankedRecommendations>> {
        let query = request.natural_language_query.trim();
        if query.is_empty() {
            return Err(AppError::InvalidInput(
                "Missing natural_language_query".to_string(),
            ));
        }

        let services = clean_services(&request.streaming_services);
        tracing::info!(query = %query, services = ?services, "Natural language recommendation");

        let prompt = query_synthesis::build_synthesis_prompt(query, &services);
        let filter = self.synthesizer.synthesize(&prompt, &services).await?;

        self.retrieve_and_rank(query, filter).await
    }

    /// Refines earlier preferences with free-text feedback
    pub async fn refine_with_feedback(
        &self,
        request: FeedbackRequest,
    ) -> AppResult<Outcome<RankedRecommendations>> {
        let feedback = request.feedback.trim();
        let preferences = request
            .original_preferences
            .as_ref()
            .filter(|prefs| !is_blank(prefs));

        let (false, Some(preferences)) = (feedback.is_empty(), preferences) else {
            return Err(AppError::InvalidInput(
                "Feedback or preferences are missing.".to_string(),
            ));
        };

        let services = request.streaming_services();
        tracing::info!(feedback = %feedback, services = ?services, "Feedback refinement");

        let prompt = query_synthesis::build_feedback_prompt(feedback, preferences, &services);
        let filter = self.synthesizer.synthesize(&prompt, &services).await?;

        let ranking_request = format!("{} (original preferences: {})", feedback, preferences);
        self.retrieve_and_rank(&ranking_request, filter).await
    }

    /// Runs the primary query, relaxes it when empty, and ranks the candidates
    async fn retrieve_and_rank(
        &self,
        request: &str,
        filter: Filter,
    ) -> AppResult<Outcome<RankedRecommendations>> {
        let parsed_query = filter.to_document();

        let mut candidates = self.find(relaxation::primary_query(filter.clone())).await?;
        let relaxed = candidates.is_empty();

        if relaxed {
            let query = relaxation::relaxed_query(&filter);
            tracing::info!(filter = %query.filter.to_document(), "Primary query empty, relaxing");
            candidates = self.find(query).await?;
        }

        if candidates.is_empty() {
            tracing::info!(relaxed, "No candidates found");
            return Ok(Outcome::NoResults);
        }

        let recommendations = self.ranker.rank(request, &candidates).await?;
        if recommendations.is_empty() {
            tracing::warn!(
                stage = "ranking",
                candidates = candidates.len(),
                "No ranked pick matched a candidate"
            );
            return Ok(Outcome::NoResults);
        }

        Ok(Outcome::Found(RankedRecommendations {
            recommendations,
            parsed_query,
            relaxed,
        }))
    }

    async fn find(&self, query: CatalogQuery) -> AppResult<Vec<Movie>> {
        match tokio::time::timeout(self.catalog_timeout, self.catalog.find(&query)).await {
            Ok(Ok(movies)) => Ok(movies),
            Ok(Err(e)) => {
                tracing::error!(stage = "catalog", store = self.catalog.name(), error = %e, "Catalog query failed");
                Err(e)
            }
            Err(_) => {
                tracing::error!(
                    stage = "catalog",
                    store = self.catalog.name(),
                    timeout_secs = self.catalog_timeout.as_secs_f64(),
                    "Catalog query timed out"
                );
                Err(AppError::Catalog("Catalog query timed out".to_string()))
            }
        }
    }
}

fn clean_services(services: &[String]) -> Vec<String> {
    services
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        Value::Bool(_) | Value::Number(_) => false,
    }
}
