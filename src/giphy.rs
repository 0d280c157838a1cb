use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;
use ureq::Agent;

use crate::model::Gif;

const API_BASE_URL: &str = "https://api.giphy.com/v1/gifs/search";

/// Where requests go and the key they carry. Immutable once the client is
/// built; without a key no request can ever be formed.
#[derive(Debug, Clone)]
pub struct RequestConfig {
    pub api_key: Option<String>,
    pub base_url: String,
}

impl RequestConfig {
    pub fn with_api_key(api_key: Option<String>) -> Self {
        Self {
            api_key,
            ..Self::default()
        }
    }
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: API_BASE_URL.to_string(),
        }
    }
}

#[derive(Debug, Error)]
pub enum GiphyError {
    #[error("No Giphy API key configured")]
    MissingApiKey,
    #[error("Search request failed: {0}")]
    Transport(String),
    #[error("Unexpected search response: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Builds the search URL for one page of results. Pure; fails without an
/// API key, in which case no request is ever sent.
pub fn build_request_url(
    config: &RequestConfig,
    query: &str,
    limit: usize,
    offset: usize,
) -> Result<String, GiphyError> {
    let api_key = config.api_key.as_deref().ok_or(GiphyError::MissingApiKey)?;
    Ok(format!(
        "{}?api_key={}&q={}&limit={}&offset={}",
        config.base_url,
        api_key,
        urlencoding::encode(query),
        limit,
        offset
    ))
}

// Response envelope. Only `data[].images.original.url` is consumed; every
// other field Giphy sends is ignored. An entry missing the expected path
// fails the whole response.
#[derive(Debug, Deserialize)]
struct SearchResponse {
    data: Vec<GifEntry>,
}

#[derive(Debug, Deserialize)]
struct GifEntry {
    images: ImageVariants,
}

#[derive(Debug, Deserialize)]
struct ImageVariants {
    original: ImageVariant,
}

#[derive(Debug, Deserialize)]
struct ImageVariant {
    url: String,
}

/// Seam between the search session and the network, so tests can drive the
/// session with a double.
pub trait GifFetcher: Send + Sync {
    fn search(&self, query: &str, limit: usize, offset: usize) -> Result<Vec<Gif>, GiphyError>;
}

#[derive(Clone)]
pub struct GiphyClient {
    agent: Agent,
    config: RequestConfig,
}

impl GiphyClient {
    pub fn new(config: RequestConfig) -> Self {
        let agent = Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(10)))
            .build()
            .new_agent();
        Self { agent, config }
    }
}

impl GifFetcher for GiphyClient {
    fn search(&self, query: &str, limit: usize, offset: usize) -> Result<Vec<Gif>, GiphyError> {
        let url = build_request_url(&self.config, query, limit, offset)?;
        debug!("Request URL: {}", url);

        let mut resp = self
            .agent
            .get(&url)
            .call()
            .map_err(|err| GiphyError::Transport(err.to_string()))?;
        let body = resp
            .body_mut()
            .read_to_string()
            .map_err(|err| GiphyError::Transport(err.to_string()))?;

        let parsed: SearchResponse = serde_json::from_str(&body)?;
        let gifs: Vec<Gif> = parsed
            .data
            .into_iter()
            .map(|entry| Gif::new(entry.images.original.url))
            .collect();
        debug!(
            "Giphy returned {} GIF(s) for '{}' at offset {}",
            gifs.len(),
            query,
            offset
        );
        Ok(gifs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with_key() -> RequestConfig {
        RequestConfig::with_api_key(Some("test-key".to_string()))
    }

    #[test]
    fn test_build_request_url() {
        let url = build_request_url(&config_with_key(), "Chihuahua", 50, 0).unwrap();
        assert_eq!(
            url,
            "https://api.giphy.com/v1/gifs/search?api_key=test-key&q=Chihuahua&limit=50&offset=0"
        );
    }

    #[test]
    fn test_build_request_url_percent_encodes_query() {
        let url = build_request_url(&config_with_key(), "funny cats & dogs?", 25, 100).unwrap();
        assert!(
            url.ends_with("&q=funny%20cats%20%26%20dogs%3F&limit=25&offset=100"),
            "unexpected url: {url}"
        );
    }

    #[test]
    fn test_build_request_url_without_key() {
        let result = build_request_url(&RequestConfig::default(), "Pomeranian", 50, 0);
        assert!(matches!(result, Err(GiphyError::MissingApiKey)));
    }

    #[test]
    fn test_parse_envelope() {
        let body = r#"{"data":[{"images":{"original":{"url":"https://x/1.gif"}}}]}"#;
        let parsed: SearchResponse = serde_json::from_str(body).unwrap();
        let urls: Vec<&str> = parsed
            .data
            .iter()
            .map(|entry| entry.images.original.url.as_str())
            .collect();
        assert_eq!(urls, vec!["https://x/1.gif"]);
    }

    #[test]
    fn test_parse_envelope_ignores_other_fields() {
        // Trimmed-down shape of a real response: ids, titles and the other
        // image sizes are all present but unused.
        let body = r#"{
            "data": [
                {
                    "id": "abc123",
                    "title": "happy dance",
                    "images": {
                        "original": {"url": "https://x/1.gif", "width": "480", "height": "270"},
                        "fixed_width": {"url": "https://x/1-fw.gif"}
                    }
                }
            ],
            "pagination": {"total_count": 1234, "count": 1, "offset": 0},
            "meta": {"status": 200, "msg": "OK"}
        }"#;
        let parsed: SearchResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.data.len(), 1);
        assert_eq!(parsed.data[0].images.original.url, "https://x/1.gif");
    }

    #[test]
    fn test_missing_url_fails_whole_batch() {
        let body = r#"{"data":[
            {"images":{"original":{"url":"https://x/1.gif"}}},
            {"images":{"original":{}}}
        ]}"#;
        assert!(serde_json::from_str::<SearchResponse>(body).is_err());
    }
}
