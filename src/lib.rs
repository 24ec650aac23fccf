pub mod types;
pub mod config;
pub mod bracket;
pub mod bracket_commands;
pub mod entrants;
pub mod images;

use types::*;
use config::*;
use bracket::BracketEngine;
use bracket_commands::{bracket_choose, bracket_image, bracket_ranking, bracket_reset, bracket_view};
use entrants::EntrantList;
use images::{ImageLookup, JikanImageLookup};

use serde::Serialize;
use std::{
    fs,
    path::PathBuf,
    sync::{Arc, Mutex},
};
use axum::{
    extract::{Query, State as AxumState},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, get_service, post},
    Json, Router,
};
use tokio::net::TcpListener;
use tower_http::services::ServeDir;
use tracing::{info, error};
use tracing_subscriber::EnvFilter;

const NO_STORE_HEADERS: [(&str, &str); 3] = [
    ("Cache-Control", "no-store"),
    ("Pragma", "no-cache"),
    ("Expires", "0"),
];

fn json_reply<T: Serialize>(result: Result<T, String>, error_status: StatusCode) -> Response {
    match result {
        Ok(body) => (NO_STORE_HEADERS, Json(body)).into_response(),
        Err(error) => (error_status, NO_STORE_HEADERS, Json(ErrorPayload { error })).into_response(),
    }
}

// ── Bracket HTTP handlers ──────────────────────────────────────────────

async fn get_state_json(AxumState(state): AxumState<ServerState>) -> Response {
    json_reply(bracket_view(&state), StatusCode::INTERNAL_SERVER_ERROR)
}

async fn post_choose(
    AxumState(state): AxumState<ServerState>,
    Json(body): Json<ChooseRequest>,
) -> Response {
    json_reply(
        bracket_choose(&state.bracket, &body.selected, state.ranking_limit),
        StatusCode::CONFLICT,
    )
}

async fn post_reset(
    AxumState(state): AxumState<ServerState>,
    Json(body): Json<ResetRequest>,
) -> Response {
    json_reply(
        bracket_reset(&state.bracket, body.confirm, state.ranking_limit),
        StatusCode::BAD_REQUEST,
    )
}

async fn get_ranking(AxumState(state): AxumState<ServerState>) -> Response {
    json_reply(
        bracket_ranking(&state.bracket, state.ranking_limit),
        StatusCode::INTERNAL_SERVER_ERROR,
    )
}

async fn get_image(
    AxumState(state): AxumState<ServerState>,
    Query(query): Query<ImageQuery>,
) -> Response {
    json_reply(bracket_image(&state, &query.name), StatusCode::NOT_FOUND)
}

// ── Bracket HTTP server ────────────────────────────────────────────────

pub fn bracket_router(state: ServerState, ui_dir: PathBuf) -> Router {
    let static_files = get_service(ServeDir::new(ui_dir));

    Router::new()
        .route("/state.json", get(get_state_json))
        .route("/api/choose", post(post_choose))
        .route("/api/reset", post(post_reset))
        .route("/api/ranking", get(get_ranking))
        .route("/api/image", get(get_image))
        .fallback_service(static_files)
        .with_state(state)
}

async fn start_bracket_server(state: ServerState, ui_dir: PathBuf, addr: &str) {
    let app = bracket_router(state, ui_dir);
    let listener = match TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Bracket server failed to bind {addr}: {e}");
            return;
        }
    };
    info!("Bracket server listening at http://{addr}/");
    if let Err(e) = axum::serve(listener, app).await {
        error!("Bracket server error: {e}");
    }
}

// ── Entry point ────────────────────────────────────────────────────────

pub fn run() {
    load_env_file();

    // Initialize tracing with daily rolling file output
    let logs_dir = logs_dir();
    fs::create_dir_all(&logs_dir).ok();
    let file_appender = tracing_appender::rolling::daily(&logs_dir, "app.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(non_blocking)
        .with_ansi(false)
        .init();
    info!("Anime bracket starting");

    let config = match load_app_config() {
        Ok(config) => config,
        Err(e) => {
            error!("{e}");
            return;
        }
    };
    log_env_warnings(&config);

    let entrants = match EntrantList::load(&config) {
        Ok(list) => list,
        Err(e) => {
            error!("{e}");
            return;
        }
    };
    info!("Bracket seeded with {} entrants", entrants.len());

    let bracket: SharedBracket = Arc::new(Mutex::new(BracketEngine::new(entrants.into_titles())));
    let images: SharedImageCache = Arc::new(Mutex::new(ImageCache::default()));
    let lookup: Option<Arc<dyn ImageLookup>> = if config.image_lookup {
        Some(Arc::new(JikanImageLookup::new(&config.image_api_url)) as Arc<dyn ImageLookup>)
    } else {
        info!("Image lookups disabled");
        None
    };
    let state = ServerState {
        bracket,
        images,
        lookup,
        ranking_limit: config.ranking_limit,
    };

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to start async runtime: {e}");
            return;
        }
    };
    runtime.block_on(start_bracket_server(
        state,
        resolve_repo_path(&config.ui_dir),
        &config.listen_addr,
    ));
}
