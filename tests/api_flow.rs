// Integration tests driving the HTTP router end to end: admin login, player
// management, match recording, leaderboard, archives and tournament badges.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::util::ServiceExt;

use chess_club_backend::api::{self, AppState};
use chess_club_backend::auth;
use chess_club_backend::db::Database;

const ADMIN_PASSWORD: &str = "rook-and-roll";

async fn test_app() -> Router {
    let db = Database::new("sqlite::memory:").await.unwrap();
    let state = AppState {
        db: Arc::new(db),
        admin_password_hash: Some(auth::hash_password(ADMIN_PASSWORD).unwrap()),
        token_ttl_hours: 1,
    };
    api::router(state, None)
}

async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let resp = app.clone().oneshot(request).await.unwrap();
    let status = resp.status();
    let body = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    let json: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);
    (status, json)
}

async fn send_raw(
    app: &Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: &str,
) -> (StatusCode, Value) {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    let resp = app
        .clone()
        .oneshot(builder.body(Body::from(body.to_string())).unwrap())
        .await
        .unwrap();
    let status = resp.status();
    let body = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    let json: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);
    (status, json)
}

fn assert_failure_envelope(status: StatusCode, body: &Value) {
    assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
    assert_eq!(body["success"], false, "{body}");
    assert!(body["error"].is_string(), "{body}");
}

async fn login(app: &Router) -> String {
    let (status, body) = send(
        app,
        "POST",
        "/api/admin/login",
        None,
        Some(json!({ "password": ADMIN_PASSWORD })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    body["token"].as_str().unwrap().to_string()
}

async fn create_player(app: &Router, token: &str, name: &str, points: i64) -> i64 {
    let (status, body) = send(
        app,
        "POST",
        "/api/players",
        Some(token),
        Some(json!({ "name": name, "points": points })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    body["player"]["id"].as_i64().unwrap()
}

// ── Service & auth ───────────────────────────────────────────────────

#[tokio::test]
async fn test_health() {
    let app = test_app().await;
    let (status, body) = send(&app, "GET", "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["success"], true);
}

#[tokio::test]
async fn test_login_rejects_wrong_password() {
    let app = test_app().await;
    let (status, body) = send(
        &app,
        "POST",
        "/api/admin/login",
        None,
        Some(json!({ "password": "wrong" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["success"], false);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_login_returns_expiry() {
    let app = test_app().await;
    let (_, body) = send(
        &app,
        "POST",
        "/api/admin/login",
        None,
        Some(json!({ "password": ADMIN_PASSWORD })),
    )
    .await;
    assert_eq!(body["expires_in"], 3600);
}

#[tokio::test]
async fn test_admin_routes_require_token() {
    let app = test_app().await;
    let (status, body) = send(
        &app,
        "POST",
        "/api/players",
        None,
        Some(json!({ "name": "Magnus" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["success"], false);

    let (status, _) = send(
        &app,
        "POST",
        "/api/players",
        Some("not.a.token"),
        Some(json!({ "name": "Magnus" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // Nothing was created.
    let (_, body) = send(&app, "GET", "/api/players", None, None).await;
    assert_eq!(body["players"], json!([]));
}

#[tokio::test]
async fn test_malformed_input_uses_envelope() {
    let app = test_app().await;
    let token = login(&app).await;

    let (status, body) = send_raw(&app, "POST", "/api/players", Some(&token), "{not json").await;
    assert_failure_envelope(status, &body);

    let (status, body) = send_raw(
        &app,
        "POST",
        "/api/players",
        Some(&token),
        r#"{"name": "Spassky", "points": "ten"}"#,
    )
    .await;
    assert_failure_envelope(status, &body);

    let (status, body) = send_raw(&app, "POST", "/api/admin/login", None, "{}").await;
    assert_failure_envelope(status, &body);

    let (status, body) = send(&app, "GET", "/api/players?sort=elo", None, None).await;
    assert_failure_envelope(status, &body);

    let (status, body) = send(&app, "GET", "/api/matches/abc", None, None).await;
    assert_failure_envelope(status, &body);

    // Nothing was created by the rejected bodies.
    let (_, body) = send(&app, "GET", "/api/players", None, None).await;
    assert_eq!(body["players"], json!([]));
}

// ── Players ──────────────────────────────────────────────────────────

#[tokio::test]
async fn test_player_validation_errors_use_envelope() {
    let app = test_app().await;
    let token = login(&app).await;

    let (status, body) = send(
        &app,
        "POST",
        "/api/players",
        Some(&token),
        Some(json!({ "points": 3 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "name is required");

    let (status, _) = send(
        &app,
        "POST",
        "/api/players",
        Some(&token),
        Some(json!({ "name": "Anand", "points": 50 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    create_player(&app, &token, "Anand", 5).await;
    let (status, body) = send(
        &app,
        "POST",
        "/api/players",
        Some(&token),
        Some(json!({ "name": "Anand" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "Player name already exists");
}

#[tokio::test]
async fn test_list_players_sorted_and_soft_delete() {
    let app = test_app().await;
    let token = login(&app).await;
    let low = create_player(&app, &token, "Alekhine", 2).await;
    create_player(&app, &token, "Botvinnik", 30).await;

    let (_, body) = send(&app, "GET", "/api/players?sort=points", None, None).await;
    let names: Vec<_> = body["players"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["name"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(names, ["Botvinnik", "Alekhine"]);
    assert_eq!(body["players"][0]["tier"], "rook");

    let (status, _) = send(
        &app,
        "DELETE",
        &format!("/api/players/{low}"),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = send(&app, "GET", "/api/players", None, None).await;
    assert_eq!(body["players"].as_array().unwrap().len(), 1);

    // Detail stays readable, without a rank.
    let (status, body) = send(&app, "GET", &format!("/api/players/{low}"), None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["player"]["active"], false);
    assert_eq!(body["rank"], Value::Null);

    let (status, _) = send(&app, "GET", "/api/players/9999", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// ── Matches & leaderboard ────────────────────────────────────────────

#[tokio::test]
async fn test_record_match_by_id_moves_points_and_tiers() {
    let app = test_app().await;
    let token = login(&app).await;
    let a = create_player(&app, &token, "Capablanca", 10).await;
    let b = create_player(&app, &token, "Lasker", 8).await;

    let (status, body) = send(
        &app,
        "POST",
        "/api/matches",
        Some(&token),
        Some(json!({ "winner_id": a, "loser_id": b })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["success"], true);
    assert_eq!(body["winner"]["points"], 11);
    assert_eq!(body["loser"]["points"], 7);
    assert_eq!(body["match"]["winner_tier_before"], "knight");
    assert_eq!(body["match"]["loser_tier_before"], "pawn");
    assert_eq!(body["match"]["winner_points_change"], 1);
    assert_eq!(body["match"]["loser_points_change"], -1);

    let match_id = body["match"]["id"].as_i64().unwrap();
    let (status, body) = send(&app, "GET", &format!("/api/matches/{match_id}"), None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["match"]["winner_name"], "Capablanca");
}

#[tokio::test]
async fn test_record_match_by_name_and_rejections() {
    let app = test_app().await;
    let token = login(&app).await;
    create_player(&app, &token, "Tal", 49).await;
    create_player(&app, &token, "Petrosian", 0).await;

    let (status, body) = send(
        &app,
        "POST",
        "/api/matches",
        Some(&token),
        Some(json!({ "winner_name": "Tal", "loser_name": "Petrosian" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    // Both sides clamp.
    assert_eq!(body["winner"]["points"], 49);
    assert_eq!(body["loser"]["points"], 0);
    assert_eq!(body["match"]["winner_points_change"], 0);
    assert_eq!(body["match"]["loser_points_change"], 0);

    let (status, body) = send(
        &app,
        "POST",
        "/api/matches",
        Some(&token),
        Some(json!({ "winner_name": "Tal", "loser_name": "Tal" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);

    let (status, body) = send(
        &app,
        "POST",
        "/api/matches",
        Some(&token),
        Some(json!({ "winner_name": "Tal", "loser_name": "Nobody" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Loser not found");

    let (status, _) = send(
        &app,
        "POST",
        "/api/matches",
        Some(&token),
        Some(json!({ "winner_name": "Tal" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, body) = send(&app, "GET", "/api/matches", None, None).await;
    assert_eq!(body["total"], 1);
    assert_eq!(body["matches"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_leaderboard_and_player_history() {
    let app = test_app().await;
    let token = login(&app).await;
    let a = create_player(&app, &token, "Carlsen", 20).await;
    let b = create_player(&app, &token, "Caruana", 20).await;
    let c = create_player(&app, &token, "Ding", 5).await;

    for (w, l) in [(a, b), (a, c), (b, c)] {
        let (status, _) = send(
            &app,
            "POST",
            "/api/matches",
            Some(&token),
            Some(json!({ "winner_id": w, "loser_id": l })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (_, body) = send(&app, "GET", "/api/leaderboard", None, None).await;
    let board = body["leaderboard"].as_array().unwrap();
    assert_eq!(board.len(), 3);
    assert_eq!(board[0]["name"], "Carlsen");
    assert_eq!(board[0]["rank"], 1);
    assert_eq!(board[0]["points"], 22);
    assert_eq!(board[0]["wins"], 2);
    assert_eq!(board[0]["win_percentage"], 100.0);
    assert_eq!(board[1]["name"], "Caruana");
    assert_eq!(board[1]["win_percentage"], 50.0);
    assert_eq!(board[2]["name"], "Ding");
    assert_eq!(board[2]["rank"], 3);

    let (_, body) = send(&app, "GET", "/api/leaderboard/top3", None, None).await;
    assert_eq!(body["leaderboard"].as_array().unwrap().len(), 3);

    let (_, body) = send(&app, "GET", &format!("/api/players/{b}?limit=1"), None, None).await;
    assert_eq!(body["rank"], 2);
    assert_eq!(body["stats"]["wins"], 1);
    assert_eq!(body["stats"]["losses"], 1);
    let history = body["recent_matches"].as_array().unwrap();
    assert_eq!(history.len(), 1);
    // Newest first: the win over Ding.
    assert_eq!(history[0]["result"], "win");
    assert_eq!(history[0]["opponent_name"], "Ding");
    assert_eq!(history[0]["points_change"], 1);
}

// ── Archives ─────────────────────────────────────────────────────────

#[tokio::test]
async fn test_archive_lifecycle() {
    let app = test_app().await;
    let token = login(&app).await;
    let a = create_player(&app, &token, "Kasparov", 40).await;
    let b = create_player(&app, &token, "Karpov", 35).await;
    let c = create_player(&app, &token, "Kramnik", 30).await;

    let (status, body) = send(
        &app,
        "POST",
        "/api/archives",
        Some(&token),
        Some(json!({ "month": "2024-05", "first_id": a, "second_id": a, "third_id": c })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Archive players must be distinct");
    let (_, body) = send(&app, "GET", "/api/archives", None, None).await;
    assert_eq!(body["archives"], json!([]));

    let (status, body) = send(
        &app,
        "POST",
        "/api/archives",
        Some(&token),
        Some(json!({ "month": "2024-05", "first_id": a, "second_id": b, "third_id": c })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["archive"]["first_points"], 40);
    assert_eq!(body["archive"]["third_player_name"], "Kramnik");
    let archive_id = body["archive"]["id"].as_i64().unwrap();

    let (status, body) = send(
        &app,
        "POST",
        "/api/archives",
        Some(&token),
        Some(json!({ "month": "2024-05", "first_id": c, "second_id": b, "third_id": a })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["success"], false);

    let (_, body) = send(&app, "GET", "/api/leaderboard", None, None).await;
    assert!(body["leaderboard"]
        .as_array()
        .unwrap()
        .iter()
        .all(|e| e["is_champion"] == true));

    let (status, _) = send(
        &app,
        "DELETE",
        &format!("/api/archives/{archive_id}"),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send(&app, "GET", &format!("/api/archives/{archive_id}"), None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // Champion flags survive archive deletion.
    let (_, body) = send(&app, "GET", &format!("/api/players/{a}"), None, None).await;
    assert_eq!(body["player"]["is_champion"], true);
}

// ── Tournament badges ────────────────────────────────────────────────

#[tokio::test]
async fn test_tournament_badges() {
    let app = test_app().await;
    let token = login(&app).await;
    let a = create_player(&app, &token, "Polgar", 25).await;

    let (status, body) = send(
        &app,
        "POST",
        "/api/tournament-winners",
        Some(&token),
        Some(json!({ "player_name": "Polgar", "tournament_name": "Club Open", "won_on": "2024-03-10" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    let badge_id = body["tournament_winner"]["id"].as_i64().unwrap();

    let (status, _) = send(
        &app,
        "POST",
        "/api/tournament-winners",
        Some(&token),
        Some(json!({ "player_id": a, "tournament_name": "Club Open", "won_on": "2024-03-10" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (_, body) = send(&app, "GET", "/api/leaderboard", None, None).await;
    assert_eq!(body["leaderboard"][0]["is_tournament_winner"], true);
    // Badges never move points.
    assert_eq!(body["leaderboard"][0]["points"], 25);

    let (status, body) = send(
        &app,
        "PUT",
        &format!("/api/tournament-winners/{badge_id}"),
        Some(&token),
        Some(json!({ "tournament_name": "Winter Open" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["tournament_winner"]["tournament_name"], "Winter Open");

    let (_, body) = send(
        &app,
        "GET",
        &format!("/api/tournament-winners?player_id={a}"),
        None,
        None,
    )
    .await;
    assert_eq!(body["tournament_winners"].as_array().unwrap().len(), 1);

    let (status, body) = send(
        &app,
        "DELETE",
        &format!("/api/players/{a}/tournament-wins"),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["removed"], 1);

    let (status, _) = send(
        &app,
        "DELETE",
        &format!("/api/tournament-winners/{badge_id}"),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = send(&app, "DELETE", "/api/tournament-winners", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["removed"], 0);
}
