/// How many GIFs to load in a single call, max 50 for Giphy beta keys.
pub const PAGE_LIMIT: usize = 50;

/// Longest query the search accepts; anything longer is rejected before a
/// request is built.
pub const MAX_QUERY_LEN: usize = 50;

/// A single search result. GIFs have no identity beyond their URL and the
/// API may return duplicates; insertion order drives grid position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Gif {
    pub url: String,
}

impl Gif {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}
