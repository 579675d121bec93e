#![forbid(unsafe_code)]

//! Axum backend serving the OpenTube catalog and the SPA bundle.
//!
//! The interesting logic lives in the library crate (keyword extraction,
//! predicate matching, category classification, feed partitioning); this
//! binary wires it to HTTP. Reads go through a small cache invalidated by
//! the SQLite data version; mutations write through `CatalogStore` and the
//! cache notices on the next read.

use std::{
    collections::{HashMap, HashSet},
    net::{IpAddr, SocketAddr},
    path::{Component, Path, PathBuf},
    sync::Arc,
};

use anyhow::{Context, Result, anyhow};
use axum::{
    Json, Router,
    body::Body,
    extract::{Path as AxumPath, State},
    http::{HeaderMap, Request, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use mime_guess::MimeGuess;
use opentube_tools::ai::{GeminiGenerator, TextGenerator, keyword_prompt};
use opentube_tools::catalog::{
    CatalogReader, CatalogStore, ChannelRecord, ContentKind, ContentRecord, HistoryEntry,
    PlaylistRecord,
};
use opentube_tools::config::{RuntimeOverrides, resolve_runtime_config};
use opentube_tools::keywords::keywords_from_reply;
use opentube_tools::matching::{MatchPredicate, select_with_channel_expansion};
use opentube_tools::otp::{Mailer, OtpRegistry, StderrMailer, VerifyOutcome};
use opentube_tools::recommend::{RecommendationFeed, recommendations_for_user};
use opentube_tools::security::ensure_not_root;
use opentube_tools::taxonomy::{ALL_SENTINEL, classify_categories};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio::{fs::File, signal};
use tokio_util::io::ReaderStream;

// SQLite database file relative to the data root.
const CATALOG_DB_FILE: &str = "catalog.db";

#[derive(Debug, Clone)]
struct BackendArgs {
    data_root: PathBuf,
    www_root: PathBuf,
    opentube_port: u16,
    listen_host: IpAddr,
    ai_api_key: Option<String>,
    ai_model: String,
}

impl BackendArgs {
    fn parse() -> Result<Self> {
        Self::from_iter(std::env::args().skip(1))
    }

    fn from_iter<I>(iter: I) -> Result<Self>
    where
        I: IntoIterator<Item = String>,
    {
        let mut data_root_override: Option<PathBuf> = None;
        let mut www_root_override: Option<PathBuf> = None;
        let mut port_override: Option<u16> = None;
        let mut host_override: Option<String> = None;
        let mut args = iter.into_iter();
        while let Some(arg) = args.next() {
            if let Some(value) = arg.strip_prefix("--data-root=") {
                data_root_override = Some(PathBuf::from(value));
                continue;
            }
            if let Some(value) = arg.strip_prefix("--www-root=") {
                www_root_override = Some(PathBuf::from(value));
                continue;
            }
            if let Some(value) = arg.strip_prefix("--port=") {
                port_override = Some(parse_port_arg(value)?);
                continue;
            }
            if let Some(value) = arg.strip_prefix("--host=") {
                host_override = Some(value.to_string());
                continue;
            }

            match arg.as_str() {
                "--data-root" => {
                    let value = args
                        .next()
                        .ok_or_else(|| anyhow!("--data-root requires a value"))?;
                    data_root_override = Some(PathBuf::from(value));
                }
                "--www-root" => {
                    let value = args
                        .next()
                        .ok_or_else(|| anyhow!("--www-root requires a value"))?;
                    www_root_override = Some(PathBuf::from(value));
                }
                "--port" => {
                    let value = args
                        .next()
                        .ok_or_else(|| anyhow!("--port requires a value"))?;
                    port_override = Some(parse_port_arg(&value)?);
                }
                "--host" => {
                    let value = args
                        .next()
                        .ok_or_else(|| anyhow!("--host requires a value"))?;
                    host_override = Some(value);
                }
                _ => return Err(anyhow!("unknown argument: {arg}")),
            }
        }

        let config = resolve_runtime_config(RuntimeOverrides {
            data_root: data_root_override,
            www_root: www_root_override,
            opentube_port: port_override,
            opentube_host: host_override,
            ..RuntimeOverrides::default()
        })?;
        let listen_host = parse_host_arg(&config.opentube_host)?;

        Ok(Self {
            data_root: config.data_root,
            www_root: config.www_root,
            opentube_port: config.opentube_port,
            listen_host,
            ai_api_key: config.ai_api_key,
            ai_model: config.ai_model,
        })
    }
}

fn parse_port_arg(value: &str) -> Result<u16> {
    value
        .parse::<u16>()
        .context("expected a numeric port between 0 and 65535")
}

fn parse_host_arg(value: &str) -> Result<IpAddr> {
    value
        .parse::<IpAddr>()
        .context("expected a valid IPv4 or IPv6 address for --host/OPENTUBE_HOST")
}

/// Shared state injected into every Axum handler.
///
/// * `reader` performs the SQLite reads; `store` applies mutations.
/// * `cache` keeps full listings in memory; the data-version check throws it
///   away whenever another connection commits.
/// * `generator` is absent when no API key is configured; search then skips
///   keyword cleanup and category filtering reports the collaborator as
///   unavailable.
#[derive(Clone)]
struct AppState {
    reader: Arc<CatalogReader>,
    store: Arc<CatalogStore>,
    cache: Arc<ApiCache>,
    generator: Option<Arc<dyn TextGenerator>>,
    mailer: Arc<dyn Mailer>,
    otp: Arc<OtpRegistry>,
    www_root: Arc<PathBuf>,
}

/// Very small in-memory cache to avoid re-querying SQLite on every request.
struct ApiCache {
    videos: RwLock<Option<Vec<ContentRecord>>>,
    shorts: RwLock<Option<Vec<ContentRecord>>>,
    channels: RwLock<Option<Vec<ChannelRecord>>>,
    playlists: RwLock<Option<Vec<PlaylistRecord>>>,
    content_details: RwLock<HashMap<(ContentKind, String), ContentRecord>>,
    last_db_version: RwLock<Option<i64>>,
}

impl ApiCache {
    fn new() -> Self {
        Self {
            videos: RwLock::new(None),
            shorts: RwLock::new(None),
            channels: RwLock::new(None),
            playlists: RwLock::new(None),
            content_details: RwLock::new(HashMap::new()),
            last_db_version: RwLock::new(None),
        }
    }

    fn content_list(&self, kind: ContentKind) -> &RwLock<Option<Vec<ContentRecord>>> {
        match kind {
            ContentKind::Video => &self.videos,
            ContentKind::Short => &self.shorts,
        }
    }

    fn clear(&self) {
        self.videos.write().take();
        self.shorts.write().take();
        self.channels.write().take();
        self.playlists.write().take();
        self.content_details.write().clear();
    }
}

#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
        }
    }

    fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
        }
    }

    /// The external classifier failed or is not configured; the request
    /// cannot be served without it.
    fn bad_gateway(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_GATEWAY,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, "application/json".parse().unwrap());
        let body = serde_json::json!({
            "error": self.message,
        });
        (self.status, headers, Json(body)).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

#[tokio::main]
async fn main() -> Result<()> {
    let BackendArgs {
        data_root,
        www_root,
        opentube_port,
        listen_host,
        ai_api_key,
        ai_model,
    } = BackendArgs::parse()?;

    ensure_not_root("backend")?;

    let catalog_path = data_root.join(CATALOG_DB_FILE);
    let store = CatalogStore::open(&catalog_path)
        .await
        .context("opening catalog store")?;
    let reader = CatalogReader::new(&catalog_path)
        .await
        .context("initializing catalog reader")?;

    let generator: Option<Arc<dyn TextGenerator>> = match ai_api_key {
        Some(key) => Some(Arc::new(GeminiGenerator::new(key, ai_model))),
        None => {
            eprintln!(
                "OPENTUBE_AI_KEY not set; search keyword cleanup and category filtering are disabled"
            );
            None
        }
    };

    let state = AppState {
        reader: Arc::new(reader),
        store: Arc::new(store),
        cache: Arc::new(ApiCache::new()),
        generator,
        mailer: Arc::new(StderrMailer),
        otp: Arc::new(OtpRegistry::new()),
        www_root: Arc::new(www_root),
    };

    // Each route is extremely small; helpers supplement anything that is
    // shared between videos and shorts.
    let app = Router::new()
        .route("/api/search", post(search))
        .route("/api/filter", post(filter_by_category))
        .route("/api/videos", get(list_videos))
        .route("/api/videos/{id}", get(get_video))
        .route("/api/videos/{id}/like", post(like_video))
        .route("/api/videos/{id}/dislike", post(dislike_video))
        .route("/api/videos/{id}/save", post(save_video))
        .route("/api/shorts", get(list_shorts))
        .route("/api/shorts/{id}", get(get_short))
        .route("/api/shorts/{id}/like", post(like_short))
        .route("/api/shorts/{id}/dislike", post(dislike_short))
        .route("/api/shorts/{id}/save", post(save_short))
        .route("/api/channels", get(list_channels))
        .route("/api/channels/{id}", get(get_channel))
        .route("/api/channels/{id}/subscribe", post(subscribe_channel))
        .route("/api/playlists", get(list_playlists))
        .route("/api/users/{id}/recommendations", get(get_recommendations))
        .route(
            "/api/users/{id}/history",
            get(get_history).post(add_history),
        )
        .route("/api/users/{id}/feed", get(get_feed))
        .route("/api/auth/otp/request", post(request_otp))
        .route("/api/auth/otp/verify", post(verify_otp))
        .fallback(static_fallback)
        .with_state(state);

    let addr = SocketAddr::new(listen_host, opentube_port);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding to {}", addr))?;
    println!("API server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("running API server")?;

    Ok(())
}

async fn shutdown_signal() {
    // We do not propagate this error up because it only affects graceful
    // shutdown; the process still terminates when Ctrl+C fires.
    if let Err(err) = signal::ctrl_c().await {
        eprintln!("Failed to install Ctrl+C handler: {}", err);
    }
}

#[derive(Deserialize)]
struct QueryRequest {
    #[serde(default)]
    input: String,
}

#[derive(Debug, Serialize)]
struct SearchResponse {
    keyword: String,
    channels: Vec<ChannelRecord>,
    videos: Vec<ContentRecord>,
    shorts: Vec<ContentRecord>,
    playlists: Vec<PlaylistRecord>,
}

#[derive(Debug, Serialize)]
struct FilterResponse {
    videos: Vec<ContentRecord>,
    shorts: Vec<ContentRecord>,
    channels: Vec<ChannelRecord>,
    keywords: Vec<String>,
}

/// Keyword search across all four collections with channel expansion: when
/// a channel matches, everything it owns rides along. The generator reply
/// is advisory; when it is missing or fails the raw query is the keyword.
async fn search(
    State(state): State<AppState>,
    Json(payload): Json<QueryRequest>,
) -> ApiResult<Json<SearchResponse>> {
    let input = payload.input.trim().to_string();
    if input.is_empty() {
        return Err(ApiError::bad_request("search input is required"));
    }

    let reply = match &state.generator {
        Some(generator) => {
            let generator = generator.clone();
            let prompt = keyword_prompt(&input);
            let result = tokio::task::spawn_blocking(move || generator.generate(&prompt))
                .await
                .map_err(|err| ApiError::internal(err.to_string()))?;
            match result {
                Ok(text) => Some(text),
                Err(err) => {
                    eprintln!("keyword generator unavailable, using raw query: {err}");
                    None
                }
            }
        }
        None => None,
    };

    let keywords = keywords_from_reply(&input, reply.as_deref());
    let keyword = match reply {
        Some(text) if !text.trim().is_empty() => {
            text.replace(['\n', '\r'], " ").trim().to_string()
        }
        _ => input,
    };
    let predicate = MatchPredicate::new(&keywords);

    let channels = state.get_channel_list().await?;
    let videos = state.get_content_list(ContentKind::Video).await?;
    let shorts = state.get_content_list(ContentKind::Short).await?;
    let playlists = state.get_playlist_list().await?;

    // Channels are searched by name only; category and description count
    // toward the category filter, not free-text search.
    let matched_channels: Vec<ChannelRecord> = channels
        .into_iter()
        .filter(|channel| predicate.matches_fields(&[&channel.name]))
        .collect();
    let matched_channel_ids: HashSet<String> = matched_channels
        .iter()
        .map(|channel| channel.id.clone())
        .collect();

    let videos = select_with_channel_expansion(
        &videos,
        &matched_channel_ids,
        |record| record.channel_id.as_str(),
        |record| record.id.as_str(),
        |record| predicate.matches_content(record),
    );
    let shorts = select_with_channel_expansion(
        &shorts,
        &matched_channel_ids,
        |record| record.channel_id.as_str(),
        |record| record.id.as_str(),
        |record| predicate.matches_content(record),
    );
    let playlists = select_with_channel_expansion(
        &playlists,
        &matched_channel_ids,
        |record| record.channel_id.as_str(),
        |record| record.id.as_str(),
        |record| predicate.matches_fields(&[&record.title, &record.description]),
    );

    Ok(Json(SearchResponse {
        keyword,
        channels: matched_channels,
        videos,
        shorts,
        playlists,
    }))
}

/// Category filtering: classify the query onto the taxonomy, then use the
/// category names as keywords. No channel expansion here; shorts match on
/// title and tags only. The classifier has no local fallback, so its
/// failure fails the request.
async fn filter_by_category(
    State(state): State<AppState>,
    Json(payload): Json<QueryRequest>,
) -> ApiResult<Json<FilterResponse>> {
    let input = payload.input.trim().to_string();
    if input.is_empty() {
        return Err(ApiError::bad_request("filter input is required"));
    }

    let generator = state
        .generator
        .clone()
        .ok_or_else(|| ApiError::bad_gateway("category classifier is not configured"))?;
    let result = tokio::task::spawn_blocking(move || classify_categories(&*generator, &input))
        .await
        .map_err(|err| ApiError::internal(err.to_string()))?;
    let keywords = result.map_err(|err| ApiError::bad_gateway(err.to_string()))?;

    let videos = state.get_content_list(ContentKind::Video).await?;
    let shorts = state.get_content_list(ContentKind::Short).await?;
    let channels = state.get_channel_list().await?;

    // "All" disables filtering entirely.
    if keywords.iter().any(|name| name == ALL_SENTINEL) {
        return Ok(Json(FilterResponse {
            videos,
            shorts,
            channels,
            keywords,
        }));
    }

    let predicate = MatchPredicate::new(&keywords);
    let videos = videos
        .into_iter()
        .filter(|record| predicate.matches_content(record))
        .collect();
    let shorts = shorts
        .into_iter()
        .filter(|record| predicate.matches_content_title_tags(record))
        .collect();
    let channels = channels
        .into_iter()
        .filter(|channel| channel_matches(&predicate, channel))
        .collect();

    Ok(Json(FilterResponse {
        videos,
        shorts,
        channels,
        keywords,
    }))
}

/// Category filtering sees the wider channel surface: name, assigned
/// category and description.
fn channel_matches(predicate: &MatchPredicate, channel: &ChannelRecord) -> bool {
    predicate.matches_fields(&[&channel.name, &channel.category, &channel.description])
}

async fn get_recommendations(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<String>,
) -> ApiResult<Json<RecommendationFeed>> {
    let feed = recommendations_for_user(&state.reader, &id)
        .await
        .map_err(|err| ApiError::internal(err.to_string()))?
        .ok_or_else(|| ApiError::not_found("user not found"))?;
    Ok(Json(feed))
}

async fn list_videos(State(state): State<AppState>) -> ApiResult<Json<Vec<ContentRecord>>> {
    let videos = state.get_content_list(ContentKind::Video).await?;
    Ok(Json(videos))
}

async fn list_shorts(State(state): State<AppState>) -> ApiResult<Json<Vec<ContentRecord>>> {
    let shorts = state.get_content_list(ContentKind::Short).await?;
    Ok(Json(shorts))
}

async fn get_video(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<String>,
) -> ApiResult<Json<ContentRecord>> {
    let record = state.get_content(ContentKind::Video, &id).await?;
    Ok(Json(record))
}

async fn get_short(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<String>,
) -> ApiResult<Json<ContentRecord>> {
    let record = state.get_content(ContentKind::Short, &id).await?;
    Ok(Json(record))
}

async fn list_channels(State(state): State<AppState>) -> ApiResult<Json<Vec<ChannelRecord>>> {
    let channels = state.get_channel_list().await?;
    Ok(Json(channels))
}

async fn get_channel(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<String>,
) -> ApiResult<Json<ChannelRecord>> {
    let channel = state
        .reader
        .get_channel(&id)
        .await
        .map_err(|err| ApiError::internal(err.to_string()))?
        .ok_or_else(|| ApiError::not_found("channel not found"))?;
    Ok(Json(channel))
}

async fn list_playlists(State(state): State<AppState>) -> ApiResult<Json<Vec<PlaylistRecord>>> {
    let playlists = state.get_playlist_list().await?;
    Ok(Json(playlists))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UserActionRequest {
    user_id: String,
}

#[derive(Clone, Copy)]
enum Reaction {
    Like,
    Dislike,
    Save,
}

async fn like_video(
    state: State<AppState>,
    id: AxumPath<String>,
    payload: Json<UserActionRequest>,
) -> ApiResult<Json<ContentRecord>> {
    toggle_reaction(state.0, ContentKind::Video, id.0, payload.0, Reaction::Like).await
}

async fn dislike_video(
    state: State<AppState>,
    id: AxumPath<String>,
    payload: Json<UserActionRequest>,
) -> ApiResult<Json<ContentRecord>> {
    toggle_reaction(
        state.0,
        ContentKind::Video,
        id.0,
        payload.0,
        Reaction::Dislike,
    )
    .await
}

async fn save_video(
    state: State<AppState>,
    id: AxumPath<String>,
    payload: Json<UserActionRequest>,
) -> ApiResult<Json<ContentRecord>> {
    toggle_reaction(state.0, ContentKind::Video, id.0, payload.0, Reaction::Save).await
}

async fn like_short(
    state: State<AppState>,
    id: AxumPath<String>,
    payload: Json<UserActionRequest>,
) -> ApiResult<Json<ContentRecord>> {
    toggle_reaction(state.0, ContentKind::Short, id.0, payload.0, Reaction::Like).await
}

async fn dislike_short(
    state: State<AppState>,
    id: AxumPath<String>,
    payload: Json<UserActionRequest>,
) -> ApiResult<Json<ContentRecord>> {
    toggle_reaction(
        state.0,
        ContentKind::Short,
        id.0,
        payload.0,
        Reaction::Dislike,
    )
    .await
}

async fn save_short(
    state: State<AppState>,
    id: AxumPath<String>,
    payload: Json<UserActionRequest>,
) -> ApiResult<Json<ContentRecord>> {
    toggle_reaction(state.0, ContentKind::Short, id.0, payload.0, Reaction::Save).await
}

async fn toggle_reaction(
    state: AppState,
    kind: ContentKind,
    id: String,
    payload: UserActionRequest,
    reaction: Reaction,
) -> ApiResult<Json<ContentRecord>> {
    let user_id = payload.user_id.trim();
    if user_id.is_empty() {
        return Err(ApiError::bad_request("userId is required"));
    }

    state
        .reader
        .get_content(kind, &id)
        .await
        .map_err(|err| ApiError::internal(err.to_string()))?
        .ok_or_else(|| ApiError::not_found("content not found"))?;

    let updated = match reaction {
        Reaction::Like => state.store.toggle_like(kind, &id, user_id).await,
        Reaction::Dislike => state.store.toggle_dislike(kind, &id, user_id).await,
        Reaction::Save => state.store.toggle_save(kind, &id, user_id).await,
    }
    .map_err(|err| ApiError::internal(err.to_string()))?;

    Ok(Json(updated))
}

async fn subscribe_channel(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<String>,
    Json(payload): Json<UserActionRequest>,
) -> ApiResult<Json<ChannelRecord>> {
    let user_id = payload.user_id.trim();
    if user_id.is_empty() {
        return Err(ApiError::bad_request("userId is required"));
    }

    state
        .reader
        .get_channel(&id)
        .await
        .map_err(|err| ApiError::internal(err.to_string()))?
        .ok_or_else(|| ApiError::not_found("channel not found"))?;

    let updated = state
        .store
        .toggle_subscription(&id, user_id)
        .await
        .map_err(|err| ApiError::internal(err.to_string()))?;
    Ok(Json(updated))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct HistoryRequest {
    content_id: String,
    content_type: String,
}

/// Records a watch and bumps the view counter. Re-watching moves the entry
/// to the front of the history rather than duplicating it.
async fn add_history(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<String>,
    Json(payload): Json<HistoryRequest>,
) -> ApiResult<Json<Vec<HistoryEntry>>> {
    let kind = ContentKind::parse(&payload.content_type)
        .ok_or_else(|| ApiError::bad_request("contentType must be \"video\" or \"short\""))?;
    if payload.content_id.trim().is_empty() {
        return Err(ApiError::bad_request("contentId is required"));
    }

    state
        .reader
        .get_user(&id)
        .await
        .map_err(|err| ApiError::internal(err.to_string()))?
        .ok_or_else(|| ApiError::not_found("user not found"))?;

    state
        .store
        .record_watch(&id, &payload.content_id, kind)
        .await
        .map_err(|err| ApiError::internal(err.to_string()))?;
    state
        .store
        .increment_view_count(kind, &payload.content_id)
        .await
        .map_err(|err| ApiError::internal(err.to_string()))?;

    let history = state
        .reader
        .history(&id)
        .await
        .map_err(|err| ApiError::internal(err.to_string()))?;
    Ok(Json(history))
}

async fn get_history(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<String>,
) -> ApiResult<Json<Vec<HistoryEntry>>> {
    state
        .reader
        .get_user(&id)
        .await
        .map_err(|err| ApiError::internal(err.to_string()))?
        .ok_or_else(|| ApiError::not_found("user not found"))?;

    let history = state
        .reader
        .history(&id)
        .await
        .map_err(|err| ApiError::internal(err.to_string()))?;
    Ok(Json(history))
}

#[derive(Serialize)]
struct FeedResponse {
    channels: Vec<ChannelRecord>,
    videos: Vec<ContentRecord>,
    shorts: Vec<ContentRecord>,
}

/// Subscription feed: everything published by channels the user subscribes
/// to, newest first.
async fn get_feed(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<String>,
) -> ApiResult<Json<FeedResponse>> {
    state
        .reader
        .get_user(&id)
        .await
        .map_err(|err| ApiError::internal(err.to_string()))?
        .ok_or_else(|| ApiError::not_found("user not found"))?;

    let channels: Vec<ChannelRecord> = state
        .get_channel_list()
        .await?
        .into_iter()
        .filter(|channel| channel.subscriber_ids.iter().any(|sub| sub == &id))
        .collect();
    let channel_ids: HashSet<&str> = channels
        .iter()
        .map(|channel| channel.id.as_str())
        .collect();

    let videos = state
        .get_content_list(ContentKind::Video)
        .await?
        .into_iter()
        .filter(|record| channel_ids.contains(record.channel_id.as_str()))
        .collect();
    let shorts = state
        .get_content_list(ContentKind::Short)
        .await?
        .into_iter()
        .filter(|record| channel_ids.contains(record.channel_id.as_str()))
        .collect();

    Ok(Json(FeedResponse {
        channels,
        videos,
        shorts,
    }))
}

#[derive(Deserialize)]
struct OtpRequest {
    #[serde(default)]
    email: String,
}

#[derive(Deserialize)]
struct OtpVerifyRequest {
    #[serde(default)]
    email: String,
    #[serde(default)]
    otp: String,
}

async fn request_otp(
    State(state): State<AppState>,
    Json(payload): Json<OtpRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    let email = payload.email.trim();
    if email.is_empty() {
        return Err(ApiError::bad_request("email is required"));
    }

    state
        .otp
        .issue(email, &*state.mailer)
        .map_err(|err| ApiError::internal(err.to_string()))?;
    Ok(Json(serde_json::json!({ "message": "code sent" })))
}

async fn verify_otp(
    State(state): State<AppState>,
    Json(payload): Json<OtpVerifyRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    let email = payload.email.trim();
    if email.is_empty() {
        return Err(ApiError::bad_request("email is required"));
    }

    match state.otp.verify(email, &payload.otp) {
        VerifyOutcome::Accepted => Ok(Json(serde_json::json!({ "verified": true }))),
        VerifyOutcome::NotRequested => Err(ApiError::bad_request("no code was requested")),
        VerifyOutcome::Expired => Err(ApiError::bad_request("code expired, request a new one")),
        VerifyOutcome::Mismatch => Err(ApiError::bad_request("incorrect code")),
    }
}

impl AppState {
    async fn ensure_fresh_cache(&self) -> ApiResult<()> {
        let version = self
            .reader
            .data_version()
            .await
            .map_err(|err| ApiError::internal(err.to_string()))?;

        let mut last = self.cache.last_db_version.write();
        if let Some(previous) = *last
            && version != previous
        {
            self.cache.clear();
        }
        *last = Some(version);
        Ok(())
    }

    /// Retrieves every video/short record, memoizing both the list and the
    /// individual details map for quick follow-up lookups.
    async fn get_content_list(&self, kind: ContentKind) -> ApiResult<Vec<ContentRecord>> {
        self.ensure_fresh_cache().await?;
        if let Some(cached) = self.cache.content_list(kind).read().clone() {
            return Ok(cached);
        }

        let records = self
            .reader
            .list_content(kind)
            .await
            .map_err(|err| ApiError::internal(err.to_string()))?;

        self.cache
            .content_list(kind)
            .write()
            .replace(records.clone());

        let mut details = self.cache.content_details.write();
        for record in &records {
            details.insert((kind, record.id.clone()), record.clone());
        }

        Ok(records)
    }

    /// Loads a single video or short, preferring the cache before falling
    /// back to SQLite.
    async fn get_content(&self, kind: ContentKind, id: &str) -> ApiResult<ContentRecord> {
        self.ensure_fresh_cache().await?;
        if let Some(record) = self
            .cache
            .content_details
            .read()
            .get(&(kind, id.to_owned()))
            .cloned()
        {
            return Ok(record);
        }

        let record = self
            .reader
            .get_content(kind, id)
            .await
            .map_err(|err| ApiError::internal(err.to_string()))?
            .ok_or_else(|| ApiError::not_found("content not found"))?;

        self.cache
            .content_details
            .write()
            .insert((kind, id.to_owned()), record.clone());

        Ok(record)
    }

    async fn get_channel_list(&self) -> ApiResult<Vec<ChannelRecord>> {
        self.ensure_fresh_cache().await?;
        if let Some(cached) = self.cache.channels.read().clone() {
            return Ok(cached);
        }

        let channels = self
            .reader
            .list_channels()
            .await
            .map_err(|err| ApiError::internal(err.to_string()))?;
        self.cache.channels.write().replace(channels.clone());
        Ok(channels)
    }

    async fn get_playlist_list(&self) -> ApiResult<Vec<PlaylistRecord>> {
        self.ensure_fresh_cache().await?;
        if let Some(cached) = self.cache.playlists.read().clone() {
            return Ok(cached);
        }

        let playlists = self
            .reader
            .list_playlists()
            .await
            .map_err(|err| ApiError::internal(err.to_string()))?;
        self.cache.playlists.write().replace(playlists.clone());
        Ok(playlists)
    }
}

async fn static_fallback(State(state): State<AppState>, req: Request<Body>) -> Response {
    let path = req.uri().path();
    if path == "/api" || path.starts_with("/api/") {
        return ApiError::not_found("endpoint not found").into_response();
    }

    match serve_www_path(&state.www_root, path).await {
        Ok(response) => response,
        Err(err) => err.into_response(),
    }
}

async fn serve_www_path(root: &Path, request_path: &str) -> ApiResult<Response> {
    let target = resolve_www_path(root, request_path)?;
    let metadata = tokio::fs::metadata(&target).await;

    match metadata {
        Ok(meta) if meta.is_dir() => {
            let index = root.join("index.html");
            stream_file(index).await
        }
        Ok(_) => stream_file(target).await,
        Err(_) => {
            // Extensionless paths are SPA client-side routes.
            if should_fallback_to_index(request_path) {
                let index = root.join("index.html");
                stream_file(index).await
            } else {
                Err(ApiError::not_found("file not found"))
            }
        }
    }
}

fn resolve_www_path(root: &Path, request_path: &str) -> ApiResult<PathBuf> {
    let trimmed = request_path.trim_start_matches('/');
    if trimmed.is_empty() {
        return Ok(root.join("index.html"));
    }
    let candidate = Path::new(trimmed);
    if candidate
        .components()
        .any(|component| !matches!(component, Component::Normal(_)))
    {
        return Err(ApiError::not_found("file not found"));
    }
    Ok(root.join(candidate))
}

fn should_fallback_to_index(request_path: &str) -> bool {
    let trimmed = request_path.trim_start_matches('/');
    if trimmed.is_empty() {
        return true;
    }
    let candidate = Path::new(trimmed);
    let has_extension = candidate.extension().is_some();
    !has_extension
}

async fn stream_file(path: PathBuf) -> ApiResult<Response> {
    let file = File::open(&path)
        .await
        .map_err(|_| ApiError::not_found("file not found"))?;

    let guessed = MimeGuess::from_path(&path).first();
    let stream = ReaderStream::new(file);
    let body = Body::from_stream(stream);
    let mut response = body.into_response();
    if let Some(mime) = guessed
        && let Ok(value) = mime.to_string().parse()
    {
        response.headers_mut().insert(header::CONTENT_TYPE, value);
    }

    Ok(response)
}
