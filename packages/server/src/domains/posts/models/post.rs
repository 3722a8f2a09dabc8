use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

const HOOK_FIELDS: &[&str] = &["hook", "title", "headline"];
const BODY_FIELDS: &[&str] = &["body", "content", "text", "description"];
const CTA_FIELDS: &[&str] = &["cta", "call_to_action"];
const HASHTAG_FIELDS: &[&str] = &["hashtags", "tags"];

/// A social post in canonical form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hook: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cta: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub hashtags: Vec<String>,
}

impl Post {
    /// Read a post from a loosely shaped record.
    ///
    /// Canonical field names win over their synonyms. Hashtags given as one
    /// string are split on whitespace.
    pub fn from_record(record: &Map<String, Value>) -> Self {
        Self {
            hook: first_text(record, HOOK_FIELDS),
            body: first_text(record, BODY_FIELDS),
            cta: first_text(record, CTA_FIELDS),
            hashtags: first_hashtags(record),
        }
    }

    pub fn has_content(&self) -> bool {
        self.hook.is_some() || self.body.is_some() || self.cta.is_some()
    }
}

/// One entry of a platform's post list.
///
/// Records without a hook, body or call to action are kept in their raw form
/// so the renderer can still show them.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum PostEntry {
    Post(Post),
    Raw(Value),
}

impl PostEntry {
    pub fn from_value(value: &Value) -> Self {
        if let Some(record) = value.as_object() {
            let post = Post::from_record(record);
            if post.has_content() {
                return PostEntry::Post(post);
            }
        }
        PostEntry::Raw(value.clone())
    }

    pub fn as_post(&self) -> Option<&Post> {
        match self {
            PostEntry::Post(post) => Some(post),
            PostEntry::Raw(_) => None,
        }
    }
}

fn first_text(record: &Map<String, Value>, fields: &[&str]) -> Option<String> {
    fields.iter().find_map(|field| match record.get(*field) {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.clone()),
        _ => None,
    })
}

fn first_hashtags(record: &Map<String, Value>) -> Vec<String> {
    HASHTAG_FIELDS
        .iter()
        .map(|field| match record.get(*field) {
            Some(Value::String(s)) => s.split_whitespace().map(str::to_string).collect(),
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(Value::as_str)
                .map(str::trim)
                .filter(|tag| !tag.is_empty())
                .map(str::to_string)
                .collect(),
            _ => Vec::new(),
        })
        .find(|tags: &Vec<String>| !tags.is_empty())
        .unwrap_or_default()
}
