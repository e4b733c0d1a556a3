pub mod assets;
pub mod intent_agent;
pub mod sales_agent;
pub mod sentiment_agent;

pub use assets::{rank_assets, AssetCandidate, AssetsClient, CachedAssetsClient, NullAssetsClient};
pub use intent_agent::IntentAgent;
pub use sales_agent::SalesAgent;
pub use sentiment_agent::SentimentAgent;
