// HTTP API routes (players, matches, leaderboard, archives, tournament badges).

use axum::{
    extract::{Json, Path, Query, State},
    http::{header, StatusCode},
    middleware,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Router,
};
use axum_extra::extract::WithRejection;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, services::ServeDir};

use crate::auth::{self, AdminUser};
use crate::db::{self, Database, PlayerRef, PlayerSort};
use crate::error::RatingError;
use crate::metrics;

// ── Extractors ────────────────────────────────────────────────────────

/// Extractors whose rejections come back in the error envelope.
pub type ApiJson<T> = WithRejection<Json<T>, RatingError>;
pub type ApiQuery<T> = WithRejection<Query<T>, RatingError>;
pub type ApiPath<T> = WithRejection<Path<T>, RatingError>;

// ── Request types ─────────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct CreatePlayerRequest {
    pub name: Option<String>,
    pub points: Option<i64>,
}

#[derive(Deserialize)]
pub struct RecordMatchRequest {
    pub winner_id: Option<i64>,
    pub loser_id: Option<i64>,
    pub winner_name: Option<String>,
    pub loser_name: Option<String>,
}

#[derive(Deserialize)]
pub struct CreateArchiveRequest {
    pub month: Option<String>,
    pub first_id: Option<i64>,
    pub second_id: Option<i64>,
    pub third_id: Option<i64>,
}

#[derive(Deserialize)]
pub struct AddBadgeRequest {
    pub player_id: Option<i64>,
    pub player_name: Option<String>,
    pub tournament_name: Option<String>,
    pub won_on: Option<String>,
}

#[derive(Deserialize)]
pub struct UpdateBadgeRequest {
    pub tournament_name: Option<String>,
    pub won_on: Option<String>,
}

#[derive(Deserialize)]
pub struct ListPlayersParams {
    pub sort: Option<PlayerSort>,
}

#[derive(Deserialize)]
pub struct LimitParams {
    pub limit: Option<i64>,
}

#[derive(Deserialize)]
pub struct ListBadgesParams {
    pub player_id: Option<i64>,
}

// ── Shared application state ─────────────────────────────────────────

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Database>,
    /// Argon2 hash of the admin password; `None` disables admin login.
    pub admin_password_hash: Option<String>,
    pub token_ttl_hours: i64,
}

// ── Response helper ───────────────────────────────────────────────────

/// Wrap a payload in the success envelope. Object payloads are merged,
/// anything else lands under `data`.
fn success(status: StatusCode, payload: Value) -> Response {
    let mut body = match payload {
        Value::Object(map) => map,
        other => {
            let mut map = Map::new();
            map.insert("data".into(), other);
            map
        }
    };
    body.insert("success".into(), Value::Bool(true));
    (status, Json(Value::Object(body))).into_response()
}

type ApiResult = Result<Response, RatingError>;

// ── Router ────────────────────────────────────────────────────────────

pub fn router(state: AppState, static_dir: Option<PathBuf>) -> Router {
    let api = Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(metrics_endpoint))
        // Admin session
        .route("/api/admin/login", post(auth::login))
        // Players
        .route("/api/players", get(list_players).post(create_player))
        .route("/api/players/{id}", get(get_player).delete(delete_player))
        .route(
            "/api/players/{id}/tournament-wins",
            delete(delete_player_badges),
        )
        // Matches
        .route("/api/matches", get(list_matches).post(record_match))
        .route("/api/matches/{id}", get(get_match))
        // Leaderboard
        .route("/api/leaderboard", get(leaderboard))
        .route("/api/leaderboard/top3", get(leaderboard_top3))
        // Monthly archives
        .route("/api/archives", get(list_archives).post(create_archive))
        .route(
            "/api/archives/{id}",
            get(get_archive).delete(delete_archive),
        )
        // Tournament winner badges
        .route(
            "/api/tournament-winners",
            get(list_badges).post(add_badge).delete(delete_all_badges),
        )
        .route(
            "/api/tournament-winners/{id}",
            get(get_badge).put(update_badge).delete(delete_badge),
        );

    let api = match static_dir {
        Some(dir) => api.fallback_service(ServeDir::new(dir)),
        None => api,
    };

    api.with_state(state)
        .layer(middleware::from_fn(metrics::track_requests))
        .layer(CorsLayer::permissive())
}

// ── Service handlers ──────────────────────────────────────────────────

async fn health_check() -> Response {
    success(
        StatusCode::OK,
        json!({ "status": "ok", "service": "chess-club-backend" }),
    )
}

async fn metrics_endpoint() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        metrics::gather_metrics(),
    )
}

// ── Player handlers ───────────────────────────────────────────────────

async fn list_players(
    State(state): State<AppState>,
    WithRejection(Query(params), _): ApiQuery<ListPlayersParams>,
) -> ApiResult {
    let players = state
        .db
        .list_players(params.sort.unwrap_or_default())
        .await?;
    Ok(success(StatusCode::OK, json!({ "players": players })))
}

async fn create_player(
    State(state): State<AppState>,
    _admin: AdminUser,
    WithRejection(Json(req), _): ApiJson<CreatePlayerRequest>,
) -> ApiResult {
    let name = req.name.unwrap_or_default();
    let player = state.db.create_player(&name, req.points).await?;
    Ok(success(StatusCode::CREATED, json!({ "player": player })))
}

async fn get_player(
    State(state): State<AppState>,
    WithRejection(Path(id), _): ApiPath<i64>,
    WithRejection(Query(params), _): ApiQuery<LimitParams>,
) -> ApiResult {
    let detail = state
        .db
        .player_detail(id, db::history_limit(params.limit))
        .await?;
    Ok(success(StatusCode::OK, json!(detail)))
}

async fn delete_player(
    State(state): State<AppState>,
    _admin: AdminUser,
    WithRejection(Path(id), _): ApiPath<i64>,
) -> ApiResult {
    state.db.deactivate_player(id).await?;
    Ok(success(
        StatusCode::OK,
        json!({ "message": "Player deactivated" }),
    ))
}

async fn delete_player_badges(
    State(state): State<AppState>,
    _admin: AdminUser,
    WithRejection(Path(id), _): ApiPath<i64>,
) -> ApiResult {
    let removed = state.db.remove_badges_for_player(id).await?;
    Ok(success(StatusCode::OK, json!({ "removed": removed })))
}

// ── Match handlers ────────────────────────────────────────────────────

async fn list_matches(
    State(state): State<AppState>,
    WithRejection(Query(params), _): ApiQuery<LimitParams>,
) -> ApiResult {
    let matches = state
        .db
        .recent_matches(db::history_limit(params.limit))
        .await?;
    let total = state.db.count_matches().await?;
    Ok(success(
        StatusCode::OK,
        json!({ "matches": matches, "total": total }),
    ))
}

async fn record_match(
    State(state): State<AppState>,
    _admin: AdminUser,
    WithRejection(Json(req), _): ApiJson<RecordMatchRequest>,
) -> ApiResult {
    let winner = PlayerRef::from_parts(req.winner_id, req.winner_name.as_deref());
    let loser = PlayerRef::from_parts(req.loser_id, req.loser_name.as_deref());
    let (Some(winner), Some(loser)) = (winner, loser) else {
        return Err(RatingError::validation(
            "winner and loser are required (ids or names)",
        ));
    };

    let recorded = state.db.record_match(&winner, &loser).await?;
    Ok(success(StatusCode::CREATED, json!(recorded)))
}

async fn get_match(
    State(state): State<AppState>,
    WithRejection(Path(id), _): ApiPath<i64>,
) -> ApiResult {
    let record = state.db.get_match(id).await?;
    Ok(success(StatusCode::OK, json!({ "match": record })))
}

// ── Leaderboard handlers ──────────────────────────────────────────────

async fn leaderboard(State(state): State<AppState>) -> ApiResult {
    let entries = state.db.leaderboard().await?;
    Ok(success(StatusCode::OK, json!({ "leaderboard": entries })))
}

async fn leaderboard_top3(State(state): State<AppState>) -> ApiResult {
    let entries = state.db.top_three().await?;
    Ok(success(StatusCode::OK, json!({ "leaderboard": entries })))
}

// ── Archive handlers ──────────────────────────────────────────────────

async fn list_archives(State(state): State<AppState>) -> ApiResult {
    let archives = state.db.list_archives().await?;
    Ok(success(StatusCode::OK, json!({ "archives": archives })))
}

async fn create_archive(
    State(state): State<AppState>,
    _admin: AdminUser,
    WithRejection(Json(req), _): ApiJson<CreateArchiveRequest>,
) -> ApiResult {
    let Some(month) = req.month else {
        return Err(RatingError::validation("month is required"));
    };
    let (Some(first), Some(second), Some(third)) = (req.first_id, req.second_id, req.third_id)
    else {
        return Err(RatingError::validation(
            "first_id, second_id and third_id are required",
        ));
    };

    let archive = state
        .db
        .create_archive(&month, [first, second, third])
        .await?;
    Ok(success(StatusCode::CREATED, json!({ "archive": archive })))
}

async fn get_archive(
    State(state): State<AppState>,
    WithRejection(Path(id), _): ApiPath<i64>,
) -> ApiResult {
    let archive = state.db.get_archive(id).await?;
    Ok(success(StatusCode::OK, json!({ "archive": archive })))
}

async fn delete_archive(
    State(state): State<AppState>,
    _admin: AdminUser,
    WithRejection(Path(id), _): ApiPath<i64>,
) -> ApiResult {
    state.db.delete_archive(id).await?;
    Ok(success(StatusCode::OK, json!({ "message": "Archive deleted" })))
}

// ── Tournament badge handlers ─────────────────────────────────────────

async fn list_badges(
    State(state): State<AppState>,
    WithRejection(Query(params), _): ApiQuery<ListBadgesParams>,
) -> ApiResult {
    let badges = state.db.list_badges(params.player_id).await?;
    Ok(success(
        StatusCode::OK,
        json!({ "tournament_winners": badges }),
    ))
}

async fn get_badge(
    State(state): State<AppState>,
    WithRejection(Path(id), _): ApiPath<i64>,
) -> ApiResult {
    let badge = state.db.get_badge(id).await?;
    Ok(success(StatusCode::OK, json!({ "tournament_winner": badge })))
}

async fn add_badge(
    State(state): State<AppState>,
    _admin: AdminUser,
    WithRejection(Json(req), _): ApiJson<AddBadgeRequest>,
) -> ApiResult {
    let Some(player) = PlayerRef::from_parts(req.player_id, req.player_name.as_deref()) else {
        return Err(RatingError::validation(
            "player_id or player_name is required",
        ));
    };
    let tournament_name = req.tournament_name.unwrap_or_default();

    let badge = state
        .db
        .add_badge(&player, &tournament_name, req.won_on.as_deref())
        .await?;
    Ok(success(
        StatusCode::CREATED,
        json!({ "tournament_winner": badge }),
    ))
}

async fn update_badge(
    State(state): State<AppState>,
    _admin: AdminUser,
    WithRejection(Path(id), _): ApiPath<i64>,
    WithRejection(Json(req), _): ApiJson<UpdateBadgeRequest>,
) -> ApiResult {
    if req.tournament_name.is_none() && req.won_on.is_none() {
        return Err(RatingError::validation(
            "tournament_name or won_on is required",
        ));
    }
    let badge = state
        .db
        .update_badge(id, req.tournament_name.as_deref(), req.won_on.as_deref())
        .await?;
    Ok(success(StatusCode::OK, json!({ "tournament_winner": badge })))
}

async fn delete_badge(
    State(state): State<AppState>,
    _admin: AdminUser,
    WithRejection(Path(id), _): ApiPath<i64>,
) -> ApiResult {
    state.db.remove_badge(id).await?;
    Ok(success(
        StatusCode::OK,
        json!({ "message": "Tournament win removed" }),
    ))
}

async fn delete_all_badges(State(state): State<AppState>, _admin: AdminUser) -> ApiResult {
    let removed = state.db.remove_all_badges().await?;
    Ok(success(StatusCode::OK, json!({ "removed": removed })))
}
