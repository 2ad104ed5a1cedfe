//! steamdeckrepo post listing → catalog entries

use serde::Deserialize;
use tracing::warn;

use crate::constants::catalog::{BOOT_KIND, DOWNLOAD_URL_PREFIX, MANIFEST_VERSION, SUSPEND_KIND};
use crate::platform::is_plain_name;
use crate::types::{CatalogEntry, Target};

#[derive(Debug, Deserialize)]
pub struct PostsResponse {
    pub posts: Vec<Post>,
}

#[derive(Debug, Deserialize)]
pub struct Post {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub thumbnail: String,
    #[serde(default)]
    pub video: String,
    pub user: PostUser,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub updated_at: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub likes: u64,
    #[serde(default)]
    pub downloads: u64,
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Debug, Deserialize)]
pub struct PostUser {
    #[serde(default)]
    pub steam_name: String,
}

fn target_for_kind(kind: &str) -> Option<Target> {
    match kind {
        BOOT_KIND => Some(Target::Boot),
        SUSPEND_KIND => Some(Target::Suspend),
        _ => None,
    }
}

impl Post {
    /// `None` for post kinds that are not animations and for ids that
    /// cannot name a file under the downloads directory
    pub fn into_entry(self) -> Option<CatalogEntry> {
        let target = target_for_kind(&self.kind)?;
        if !is_plain_name(&self.id) {
            warn!(id = %self.id, "Skipping catalog post with unusable id");
            return None;
        }
        Some(CatalogEntry {
            download_url: format!("{}{}", DOWNLOAD_URL_PREFIX, self.id),
            id: self.id,
            name: self.title,
            preview_image: self.thumbnail,
            preview_video: self.video,
            author: self.user.steam_name,
            description: self.content,
            last_changed: self.updated_at,
            source: self.url,
            likes: self.likes,
            downloads: self.downloads,
            version: String::new(),
            target,
            manifest_version: MANIFEST_VERSION,
        })
    }
}

/// Translate a listing body, dropping unrecognized kinds
pub fn parse_posts(body: serde_json::Value) -> Result<Vec<CatalogEntry>, serde_json::Error> {
    let response: PostsResponse = serde_json::from_value(body)?;
    Ok(response.posts.into_iter().filter_map(Post::into_entry).collect())
}
