pub mod query_synthesis;
pub mod ranking;
pub mod recommendations;
pub mod relaxation;
pub mod sanitizer;

pub use query_synthesis::QuerySynthesizer;
pub use ranking::Ranker;
pub use recommendations::Recommender;
