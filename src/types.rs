use serde::{Deserialize, Serialize};
use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use crate::bracket::BracketEngine;

// ── Constants ──────────────────────────────────────────────────────────

pub const APP_TITLE: &str = "Larry 2選1";
pub const STAGE_SIZES: [u32; 8] = [128, 64, 32, 16, 8, 4, 2, 1];
pub const RANKING_LIMIT: usize = 16;
pub const PODIUM_PLACES: usize = 3;
pub const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:17880";
pub const DEFAULT_UI_DIR: &str = "ui";
pub const DEFAULT_IMAGE_API_URL: &str = "https://api.jikan.moe/v4";
pub const IMAGE_LOOKUP_TIMEOUT_MS: u64 = 10_000;

// ── Shared state type aliases ──────────────────────────────────────────

pub type SharedBracket = Arc<Mutex<BracketEngine>>;
pub type SharedImageCache = Arc<Mutex<ImageCache>>;

// ── Config ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AppConfig {
    pub entrants_path: String,
    pub listen_addr: String,
    pub ui_dir: String,
    pub image_api_url: String,
    pub image_lookup: bool,
    pub ranking_limit: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            entrants_path: String::new(),
            listen_addr: String::new(),
            ui_dir: String::new(),
            image_api_url: String::new(),
            image_lookup: true,
            ranking_limit: RANKING_LIMIT,
        }
    }
}

// ── Bracket payloads ───────────────────────────────────────────────────

/// Two entrants currently presented for a choice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pairing {
    pub left: String,
    pub right: String,
}

impl Pairing {
    /// The member that is not `name`, if `name` is in the pairing.
    pub fn opponent_of(&self, name: &str) -> Option<&str> {
        if self.left == name {
            Some(&self.right)
        } else if self.right == name {
            Some(&self.left)
        } else {
            None
        }
    }

    pub fn members(&self) -> [&str; 2] {
        [&self.left, &self.right]
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChoiceOutcome {
    pub winner: String,
    pub loser: String,
    pub loser_rank: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StageProgress {
    /// 1-based, as shown to the player.
    pub number: usize,
    pub survivors: usize,
    pub stage_size: Option<u32>,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RankingEntry {
    pub place: usize,
    pub name: String,
    pub rank: u32,
    pub podium: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BracketSnapshot {
    pub title: String,
    pub stage: StageProgress,
    pub current_pair: Vec<String>,
    pub remaining_count: usize,
    pub survivor_count: usize,
    pub eliminated_count: usize,
    pub finished: bool,
    pub champion: Option<String>,
    pub ranking: Vec<RankingEntry>,
}

// ── Image lookup types ─────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "url", rename_all = "camelCase")]
pub enum ImageStatus {
    Pending,
    Found(String),
    Missing,
}

#[derive(Debug, Default)]
pub struct ImageCache {
    pub entries: HashMap<String, ImageStatus>,
    pub lookups_started: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PairImage {
    pub name: String,
    #[serde(flatten)]
    pub image: ImageStatus,
}

/// What `/state.json` returns: the bracket plus image status for the pair on screen.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BracketView {
    #[serde(flatten)]
    pub snapshot: BracketSnapshot,
    pub images: Vec<PairImage>,
}

// ── HTTP bodies ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChooseRequest {
    pub selected: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ResetRequest {
    pub confirm: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ImageQuery {
    pub name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorPayload {
    pub error: String,
}

#[derive(Clone)]
pub struct ServerState {
    pub bracket: SharedBracket,
    pub images: SharedImageCache,
    pub lookup: Option<Arc<dyn crate::images::ImageLookup>>,
    pub ranking_limit: usize,
}
