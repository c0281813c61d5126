use async_trait::async_trait;
use thiserror::Error;

/// The "Hot Path" check run for every recommendation tile.
pub trait ChannelMatcher: Send + Sync {
    /// True if the (un-normalized) channel name is blocked.
    fn contains(&self, name: &str) -> bool;
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("reading list body failed: {0}")]
    Body(#[from] std::io::Error),
}

/// Where the primary list comes from.
#[async_trait]
pub trait ListSource: Send + Sync {
    /// Returns the raw entries. A non-success response is not an error: it
    /// yields an empty list so the stored list stays as it is.
    async fn fetch(&self) -> Result<Vec<String>, FetchError>;
}
