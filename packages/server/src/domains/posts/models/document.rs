use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;

use super::post::PostEntry;

/// Platform key → ordered posts, ready for rendering.
///
/// Keys are lowercase. Every key maps to at least one post; a platform with
/// no posts is absent, and the normalizer never hands out an empty document.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct PostsDocument {
    platforms: IndexMap<String, Vec<PostEntry>>,
}

impl PostsDocument {
    pub fn get(&self, platform: &str) -> Option<&[PostEntry]> {
        self.platforms
            .get(&platform.to_lowercase())
            .map(Vec::as_slice)
    }

    pub fn platforms(&self) -> impl Iterator<Item = &str> {
        self.platforms.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[PostEntry])> {
        self.platforms
            .iter()
            .map(|(platform, posts)| (platform.as_str(), posts.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.platforms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.platforms.is_empty()
    }

    pub fn post_count(&self) -> usize {
        self.platforms.values().map(Vec::len).sum()
    }
}

/// Accumulates posts per platform, then drops empty platforms.
#[derive(Debug, Default)]
pub(crate) struct DocumentBuilder {
    platforms: IndexMap<String, Vec<PostEntry>>,
}

impl DocumentBuilder {
    /// Append `posts` under `platform` (lowercased). Repeated keys extend.
    pub(crate) fn extend<'a>(&mut self, platform: &str, posts: impl IntoIterator<Item = &'a Value>) {
        let key = platform.trim().to_lowercase();
        self.platforms
            .entry(key)
            .or_default()
            .extend(posts.into_iter().map(PostEntry::from_value));
    }

    pub(crate) fn build(mut self) -> PostsDocument {
        self.platforms.retain(|_, posts| !posts.is_empty());
        PostsDocument {
            platforms: self.platforms,
        }
    }
}
