use std::{collections::HashMap, collections::HashSet, sync::Arc, time::Duration};

use crate::{
    error::{AppError, AppResult},
    llm::{self, LlmClient, ReplyCache},
    models::{Movie, MovieSummary, RankedMovie, RankedPick},
    services::sanitizer::{self, ParseError},
};

/// Most titles the ranking stage returns
pub const RANKED_LIMIT: usize = 20;

/// Prompt asking the model to pick and justify the best candidates
pub fn build_ranking_prompt(request: &str, candidates: &[Movie]) -> AppResult<String> {
    let summaries: Vec<MovieSummary<'_>> = candidates.iter().map(MovieSummary::from).collect();
    let catalog = serde_json::to_string_pretty(&summaries)
        .map_err(|e| AppError::Internal(format!("Failed to serialize candidates: {}", e)))?;

    Ok(format!(
        "You are a film critic helping someone choose what to watch.\n\n\
         Their request: \"{request}\"\n\n\
         Candidate movies from our catalog:\n{catalog}\n\n\
         Select up to {limit} candidates that best match the request, best match first. \
         For each, write one or two sentences addressed to the user as \"you\" about why they \
         will enjoy it: its themes, critical standing or style. Do not just restate the genres, \
         year or cast.\n\n\
         Use each primaryTitle exactly as it appears above. Respond with a JSON array only, \
         no explanation and no code fences, in this form:\n\
         [{{\"primaryTitle\": \"...\", \"reason\": \"...\"}}]\n",
        request = request.trim(),
        catalog = catalog,
        limit = RANKED_LIMIT,
    ))
}

/// Parses the ranking reply into picks
///
/// Every element must carry string `primaryTitle` and `reason` fields.
pub fn parse_ranked_picks(raw: &str) -> Result<Vec<RankedPick>, ParseError> {
    sanitizer::parse_list_of_mappings(raw)?
        .into_iter()
        .map(|item| {
            serde_json::from_value::<RankedPick>(serde_json::Value::Object(item))
                .map_err(ParseError::from)
        })
        .collect()
}

/// Joins picks back to candidate records by exact title
///
/// Picks naming no candidate, and repeated picks, are dropped. The model's
/// order is kept. When candidates share a title the first one wins.
pub fn reconcile(picks: Vec<RankedPick>, candidates: &[Movie]) -> Vec<RankedMovie> {
    let mut by_title: HashMap<&str, &Movie> = HashMap::with_capacity(candidates.len());
    for movie in candidates {
        by_title.entry(movie.primary_title.as_str()).or_insert(movie);
    }

    let mut seen = HashSet::new();
    let mut ranked = Vec::new();

    for pick in picks {
        let Some(movie) = by_title.get(pick.primary_title.as_str()) else {
            tracing::debug!(title = %pick.primary_title, "Dropping pick with no matching candidate");
            continue;
        };
        if !seen.insert(pick.primary_title.clone()) {
            continue;
        }

        ranked.push(RankedMovie {
            movie: (*movie).clone(),
            reason: pick.reason,
        });
        if ranked.len() == RANKED_LIMIT {
            break;
        }
    }

    ranked
}

/// Model-backed selection and explanation of candidates
#[derive(Clone)]
pub struct Ranker {
    llm: Arc<dyn LlmClient>,
    cache: Option<Arc<dyn ReplyCache>>,
    timeout: Duration,
}

impl Ranker {
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

    /// Ranks `candidates` against `request`
    ///
    /// Any failure aborts ranking; there is no fallback to unranked candidates.
    pub async fn rank(&self, request: &str, candidates: &[Movie]) -> AppResult<Vec<RankedMovie>> {
        let prompt = build_ranking_prompt(request, candidates)?;

        let cached = llm::recall(self.cache.as_deref(), "ranking", &prompt).await;
        let from_cache = cached.is_some();
        let raw = match cached {
            Some(raw) => raw,
            None => self.generate(&prompt).await?,
        };

        let picks = parse_ranked_picks(&raw).map_err(|e| {
            tracing::error!(stage = "ranking", error = %e, raw = %raw, "Unparsable ranking reply");
            AppError::enrichment(format!("Unparsable ranking reply: {}", e), Some(raw.clone()))
        })?;

        if !from_cache {
            if let Some(cache) = &self.cache {
                cache.store(&prompt, &raw);
            }
        }

        let pick_count = picks.len();
        let ranked = reconcile(picks, candidates);

        tracing::info!(
            stage = "ranking",
            candidates = candidates.len(),
            picks = pick_count,
            matched = ranked.len(),
            "Ranked candidates"
        );

        Ok(ranked)
    }

    async fn generate(&self, prompt: &str) -> AppResult<String> {
        match tokio::time::timeout(self.timeout, self.llm.generate(prompt)).await {
            Ok(Ok(raw)) => Ok(raw),
            Ok(Err(e)) => {
                tracing::error!(stage = "ranking", llm = self.llm.name(), error = %e, "LLM call failed");
                Err(AppError::enrichment(format!("LLM call failed: {}", e), None))
            }
            Err(_) => {
                tracing::error!(
                    stage = "ranking",
                    timeout_secs = self.timeout.as_secs_f64(),
                    "LLM call timed out"
                );
                Err(AppError::enrichment("LLM call timed out", None))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{cached::MockReplyCache, MockLlmClient};

    fn movie(title: &str, year: i32) -> Movie {
        Movie {
            primary_title: title.to_string(),
            start_year: year,
            average_rating: 7.5,
            genres: vec!["Drama".to_string()],
            all_people: vec![],
            streaming_services: vec!["Max".to_string()],
            runtime_minutes: 120,
            is_adult: 0,
            tropes: vec![],
        }
    }

    fn pick(title: &str) -> RankedPick {
        RankedPick {
            primary_title: title.to_string(),
            reason: format!("You will love {}.", title),
        }
    }

    fn ranker(reply: &'static str) -> Ranker {
        let mut mock = MockLlmClient::new();
        mock.expect_generate()
            .returning(move |_| Ok(reply.to_string()));
        mock.expect_name().return_const("mock");
        Ranker::new(Arc::new(mock), Duration::from_secs(5))
    }

    #[test]
    fn test_prompt_embeds_metadata_projection() {
        let mut candidate = movie("Past Lives", 2023);
        candidate.tropes = vec!["Childhood Friends".to_string()];

        let prompt = build_ranking_prompt("a quiet love story", &[candidate]).unwrap();
        assert!(prompt.contains("\"primaryTitle\": \"Past Lives\""));
        assert!(prompt.contains("Childhood Friends"));
        assert!(prompt.contains("a quiet love story"));
        assert!(prompt.contains("up to 20"));
        // availability is not ranking metadata
        assert!(!prompt.contains("Max"));
    }

    #[test]
    fn test_parse_ranked_picks_is_strict() {
        let picks = parse_ranked_picks(
            "```json\n[{\"primaryTitle\": \"Heat\", \"reason\": \"You get Pacino and De Niro.\"}]\n```",
        )
        .unwrap();
        assert_eq!(picks, vec![RankedPick {
            primary_title: "Heat".to_string(),
            reason: "You get Pacino and De Niro.".to_string(),
        }]);

        assert!(parse_ranked_picks(r#"[{"primaryTitle": "Heat"}]"#).is_err());
        assert!(parse_ranked_picks(r#"[{"title": "Heat", "reason": "x"}]"#).is_err());
        assert!(parse_ranked_picks(r#"[{"primaryTitle": 7, "reason": "x"}]"#).is_err());
    }

    #[test]
    fn test_reconcile_drops_unknown_and_keeps_model_order() {
        let candidates = vec![movie("Alien", 1979), movie("Heat", 1995), movie("Arrival", 2016)];
        let picks = vec![pick("Arrival"), pick("Solaris"), pick("Alien")];

        let ranked = reconcile(picks, &candidates);
        let titles: Vec<&str> = ranked.iter().map(|r| r.movie.primary_title.as_str()).collect();
        assert_eq!(titles, vec!["Arrival", "Alien"]);
        assert_eq!(ranked[0].reason, "You will love Arrival.");
    }

    #[test]
    fn test_reconcile_is_exact_match() {
        let candidates = vec![movie("The Thing", 1982)];
        assert!(reconcile(vec![pick("the thing"), pick("The Thing ")], &candidates).is_empty());
    }

    #[test]
    fn test_reconcile_duplicate_titles() {
        let candidates = vec![movie("Dune", 2021), movie("Dune", 1984)];
        let ranked = reconcile(vec![pick("Dune"), pick("Dune")], &candidates);

        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].movie.start_year, 2021);
    }

    #[test]
    fn test_reconcile_caps_output() {
        let candidates: Vec<Movie> = (0..30).map(|i| movie(&format!("Movie {}", i), 2000)).collect();
        let picks = candidates.iter().map(|m| pick(&m.primary_title)).collect();
        assert_eq!(reconcile(picks, &candidates).len(), RANKED_LIMIT);
    }

    #[tokio::test]
    async fn test_rank_drops_title_missing_from_candidates() {
        let candidates = vec![movie("Heat", 1995), movie("Thief", 1981)];
        let ranked = ranker(
            r#"[
                {"primaryTitle": "Collateral", "reason": "You would like the night photography."},
                {"primaryTitle": "Thief", "reason": "You get Mann's first feature at full power."}
            ]"#,
        )
        .rank("Michael Mann crime films", &candidates)
        .await
        .unwrap();

        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].movie.primary_title, "Thief");
    }

    #[tokio::test]
    async fn test_rank_unparsable_reply_is_enrichment_failure() {
        let err = ranker("1. Heat\n2. Thief")
            .rank("Michael Mann crime films", &[movie("Heat", 1995)])
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Enrichment { .. }));
        assert_eq!(err.raw_response(), Some("1. Heat\n2. Thief"));
    }

    #[tokio::test]
    async fn test_rank_transport_failure_is_enrichment_failure() {
        let mut mock = MockLlmClient::new();
        mock.expect_generate()
            .returning(|_| Err(AppError::ExternalApi("status 429".to_string())));
        mock.expect_name().return_const("mock");

        let result = Ranker::new(Arc::new(mock), Duration::from_secs(5))
            .rank("anything", &[movie("Heat", 1995)])
            .await;
        assert!(matches!(result, Err(AppError::Enrichment { raw: None, .. })));
    }

    #[tokio::test]
    async fn test_rank_caches_only_parsed_replies() {
        let mut cache = MockReplyCache::new();
        cache.expect_lookup().returning(|_| Ok(None));
        cache
            .expect_store()
            .withf(|prompt: &str, reply: &str| prompt.contains("\"Heat\"") && reply.contains("Thief"))
            .times(1)
            .return_const(());

        let ranked = ranker(r#"[{"primaryTitle": "Thief", "reason": "You get Mann's first heist."}]"#)
            .with_cache(Arc::new(cache))
            .rank("Michael Mann crime films", &[movie("Heat", 1995), movie("Thief", 1981)])
            .await
            .unwrap();
        assert_eq!(ranked.len(), 1);

        let mut cache = MockReplyCache::new();
        cache.expect_lookup().returning(|_| Ok(None));
        cache.expect_store().times(0).return_const(());

        let result = ranker("Heat, then Thief.")
            .with_cache(Arc::new(cache))
            .rank("Michael Mann crime films", &[movie("Heat", 1995)])
            .await;
        assert!(matches!(result, Err(AppError::Enrichment { .. })));
    }
}
