pub mod movie;
pub mod preferences;
pub mod recommendation;

pub use movie::{Movie, MovieCard, MovieSummary, GENRES};
pub use preferences::{
    split_tokens, FeedbackRequest, NaturalLanguageRequest, PreferenceRequest, Preferences,
};
pub use recommendation::{
    Outcome, PreferenceRecommendations, RankedMovie, RankedPick, RankedRecommendations,
};
