//! Shared test fixtures

use crate::types::{CatalogEntry, Target};

pub fn catalog_entry(id: &str, target: Target) -> CatalogEntry {
    CatalogEntry {
        id: id.to_string(),
        name: id.to_string(),
        preview_image: String::new(),
        preview_video: String::new(),
        author: String::new(),
        description: String::new(),
        last_changed: String::new(),
        source: String::new(),
        download_url: format!("https://example.invalid/{id}"),
        likes: 0,
        downloads: 0,
        version: String::new(),
        target,
        manifest_version: 1,
    }
}
