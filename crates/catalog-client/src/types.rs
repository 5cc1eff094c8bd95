//! Catalog wire types and normalized records

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Separator between playback lines in `vod_play_from` / `vod_play_url`
const PLAY_GROUP_SEPARATOR: &str = "$$$";

/// One registered upstream catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    pub key: String,
    pub name: String,
    pub api: String,
}

/// The two query shapes every catalog supports
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogQuery {
    Search { keyword: String },
    Detail { id: String },
}

impl CatalogQuery {
    pub fn search(keyword: impl Into<String>) -> Self {
        Self::Search {
            keyword: keyword.into(),
        }
    }

    pub fn detail(id: impl Into<String>) -> Self {
        Self::Detail { id: id.into() }
    }

    /// Query-string pairs appended to the source's endpoint
    pub fn params(&self) -> [(&'static str, &str); 2] {
        match self {
            Self::Search { keyword } => [("ac", "detail"), ("wd", keyword.as_str())],
            Self::Detail { id } => [("ac", "detail"), ("ids", id.as_str())],
        }
    }
}

/// Envelope returned by catalog endpoints. Items stay untyped so detail
/// records can be passed through verbatim.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CatalogResponse {
    #[serde(default)]
    pub list: Vec<Value>,
}

/// Playback line name and its delimited episode/URL list, passed through as-is
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpisodeGroup {
    pub name: String,
    pub episodes: String,
}

/// Normalized search hit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResultItem {
    pub id: String,
    pub title: String,
    pub cover_image: String,
    pub remarks: String,
    pub year: String,
    pub type_name: String,
    pub content_summary: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub episode_groups: Option<Vec<EpisodeGroup>>,
    pub source_key: String,
    pub source_name: String,
}

impl SearchResultItem {
    /// Map one upstream list item. Items without a `vod_id` cannot be
    /// resolved later and are dropped.
    pub fn from_upstream(item: &Value, source: &Source) -> Option<Self> {
        let id = field(item, "vod_id").filter(|id| !id.is_empty())?;

        let play_from = field(item, "vod_play_from").unwrap_or_default();
        let play_url = field(item, "vod_play_url").unwrap_or_default();

        Some(Self {
            id,
            title: field(item, "vod_name").unwrap_or_default(),
            cover_image: field(item, "vod_pic").unwrap_or_default(),
            remarks: field(item, "vod_remarks").unwrap_or_default(),
            year: field(item, "vod_year").unwrap_or_default(),
            type_name: field(item, "type_name").unwrap_or_default(),
            content_summary: field(item, "vod_content").unwrap_or_default(),
            episode_groups: Some(episode_groups(&play_from, &play_url)),
            source_key: source.key.clone(),
            source_name: source.name.clone(),
        })
    }

    pub fn map_list(items: &[Value], source: &Source) -> Vec<Self> {
        items
            .iter()
            .filter_map(|item| Self::from_upstream(item, source))
            .collect()
    }

    /// Reduced form used by the single-source search path
    pub fn without_episodes(mut self) -> Self {
        self.episode_groups = None;
        self
    }
}

/// Extract a scalar field as a string; catalogs mix numbers and strings freely
fn field(item: &Value, name: &str) -> Option<String> {
    match item.get(name)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn episode_groups(play_from: &str, play_url: &str) -> Vec<EpisodeGroup> {
    if play_url.is_empty() {
        return Vec::new();
    }

    let names: Vec<&str> = play_from.split(PLAY_GROUP_SEPARATOR).collect();
    play_url
        .split(PLAY_GROUP_SEPARATOR)
        .enumerate()
        .map(|(i, episodes)| EpisodeGroup {
            name: names
                .get(i)
                .filter(|n| !n.is_empty())
                .map(|n| n.to_string())
                .unwrap_or_else(|| format!("line{}", i + 1)),
            episodes: episodes.to_string(),
        })
        .collect()
}
