use serde::Deserialize;
use std::{sync::Arc, thread, time::Duration};
use tracing::{debug, warn};

use crate::config::{append_image_lookup_log, now_ms};
use crate::types::*;

/// Resolves a display name to an image URL. `Ok(None)` means the lookup
/// worked but nothing matched.
pub trait ImageLookup: Send + Sync {
    fn lookup(&self, name: &str) -> Result<Option<String>, String>;
}

// ── Jikan (MyAnimeList) search ─────────────────────────────────────────

pub struct JikanImageLookup {
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct JikanSearchResponse {
    #[serde(default)]
    data: Vec<JikanAnime>,
}

#[derive(Debug, Deserialize)]
struct JikanAnime {
    images: Option<JikanImages>,
}

#[derive(Debug, Deserialize)]
struct JikanImages {
    jpg: Option<JikanImageSet>,
    webp: Option<JikanImageSet>,
}

#[derive(Debug, Deserialize)]
struct JikanImageSet {
    image_url: Option<String>,
    large_image_url: Option<String>,
}

impl JikanImageLookup {
    pub fn new(base_url: &str) -> Self {
        JikanImageLookup { base_url: base_url.trim_end_matches('/').to_string() }
    }

    pub fn search_url(&self) -> String {
        format!("{}/anime", self.base_url)
    }
}

impl ImageLookup for JikanImageLookup {
    fn lookup(&self, name: &str) -> Result<Option<String>, String> {
        let url = self.search_url();
        // Blocking client lives and dies on the lookup thread.
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_millis(IMAGE_LOOKUP_TIMEOUT_MS))
            .user_agent("anime-bracket")
            .build()
            .map_err(|e| format!("build image client: {e}"))?;
        let resp = client
            .get(&url)
            .query(&[("q", name), ("limit", "1")])
            .send()
            .map_err(|e| format!("fetch {url} for {name:?}: {e}"))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(format!("Image search for {name:?} returned {status}"));
        }
        let parsed: JikanSearchResponse = resp
            .json()
            .map_err(|e| format!("parse image search for {name:?}: {e}"))?;
        Ok(first_image_url(parsed))
    }
}

fn first_image_url(response: JikanSearchResponse) -> Option<String> {
    let images = response.data.into_iter().next()?.images?;
    let pick = |set: Option<JikanImageSet>| set.and_then(|set| set.large_image_url.or(set.image_url));
    pick(images.jpg).or_else(|| pick(images.webp))
}

// ── Session cache ──────────────────────────────────────────────────────

pub fn cached_image(cache: &SharedImageCache, name: &str) -> Option<ImageStatus> {
    let guard = cache.lock().unwrap_or_else(|e| e.into_inner());
    guard.entries.get(name).cloned()
}

/// Return the cached status for `name`, starting a background lookup the
/// first time a name is seen. Results are cached even if the name has left
/// the screen by the time the lookup finishes.
pub fn request_image(
    cache: &SharedImageCache,
    lookup: &Arc<dyn ImageLookup>,
    name: &str,
) -> ImageStatus {
    {
        let mut guard = cache.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(status) = guard.entries.get(name) {
            return status.clone();
        }
        guard.entries.insert(name.to_string(), ImageStatus::Pending);
        guard.lookups_started += 1;
    }

    let cache = cache.clone();
    let lookup = lookup.clone();
    let name = name.to_string();
    thread::spawn(move || {
        let started = now_ms();
        let result = lookup.lookup(&name);
        debug!("Image lookup for {name:?} took {}ms", now_ms().saturating_sub(started));
        store_image_result(&cache, &name, result);
    });
    ImageStatus::Pending
}

pub fn store_image_result(cache: &SharedImageCache, name: &str, result: Result<Option<String>, String>) {
    let status = match result {
        Ok(Some(url)) => ImageStatus::Found(url),
        Ok(None) => {
            append_image_lookup_log("Image not found", name);
            ImageStatus::Missing
        }
        Err(err) => {
            warn!("Image lookup failed: {err}");
            append_image_lookup_log("Image lookup error", &err);
            ImageStatus::Missing
        }
    };
    let mut guard = cache.lock().unwrap_or_else(|e| e.into_inner());
    guard.entries.insert(name.to_string(), status);
}

/// Image status for each name on screen. With lookups disabled every
/// uncached name reports `Missing`.
pub fn pair_images(
    cache: &SharedImageCache,
    lookup: Option<&Arc<dyn ImageLookup>>,
    names: &[String],
) -> Vec<PairImage> {
    names
        .iter()
        .map(|name| {
            let image = match lookup {
                Some(lookup) => request_image(cache, lookup, name),
                None => cached_image(cache, name).unwrap_or(ImageStatus::Missing),
            };
            PairImage { name: name.clone(), image }
        })
        .collect()
}
