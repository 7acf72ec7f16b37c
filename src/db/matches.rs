// Match Recorder: the only writer of match rows and of player points.

use serde::Serialize;
use sqlx::SqliteConnection;

use super::players::{PlayerRef, PlayerSnapshot};
use super::Database;
use crate::error::{RatingError, Result};
use crate::metrics;
use crate::rating::{self, Tier};

const MATCH_COLUMNS: &str = "m.id, m.winner_id, w.name AS winner_name, m.loser_id, \
     l.name AS loser_name, m.winner_tier_before, m.loser_tier_before, \
     m.winner_points_change, m.loser_points_change, m.played_at";

const MATCH_JOINS: &str =
    "FROM matches m JOIN players w ON w.id = m.winner_id JOIN players l ON l.id = m.loser_id";

/// One immutable ledger row, joined with both player names.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct MatchRecord {
    pub id: i64,
    pub winner_id: i64,
    pub winner_name: String,
    pub loser_id: i64,
    pub loser_name: String,
    pub winner_tier_before: Tier,
    pub loser_tier_before: Tier,
    pub winner_points_change: i64,
    pub loser_points_change: i64,
    pub played_at: String,
}

/// Result of `record_match`: the ledger row plus both post-match snapshots.
#[derive(Debug, Clone, Serialize)]
pub struct RecordedMatch {
    #[serde(rename = "match")]
    pub record: MatchRecord,
    pub winner: PlayerSnapshot,
    pub loser: PlayerSnapshot,
}

/// Resolve an active player and take the write lock on its row.
///
/// The no-op update must be the first statement of the transaction: SQLite
/// then holds the write lock before anything is read, so a concurrent
/// recorder waits here instead of working from stale points.
async fn claim_player(
    conn: &mut SqliteConnection,
    player: &PlayerRef,
) -> Result<Option<(i64, String, i64)>> {
    let (id, name) = player.bind_parts();
    let row = sqlx::query_as::<_, (i64, String, i64)>(
        "UPDATE players SET points = points WHERE active = 1 AND (id = ? OR name = ?) RETURNING id, name, points",
    )
    .bind(id)
    .bind(name)
    .fetch_optional(&mut *conn)
    .await?;
    Ok(row)
}

async fn fetch_match(conn: &mut SqliteConnection, id: i64) -> Result<Option<MatchRecord>> {
    let row = sqlx::query_as::<_, MatchRecord>(&format!(
        "SELECT {MATCH_COLUMNS} {MATCH_JOINS} WHERE m.id = ?"
    ))
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;
    Ok(row)
}

impl Database {
    /// Record a win for `winner` over `loser` and move points between them.
    ///
    /// Identical references are rejected before any lookup, so the same
    /// unknown name on both sides is a `Validation` error, not `NotFound`.
    /// Resolution, point exchange and the ledger insert run in one
    /// transaction; on any error nothing is written.
    pub async fn record_match(&self, winner: &PlayerRef, loser: &PlayerRef) -> Result<RecordedMatch> {
        if winner == loser {
            return Err(RatingError::validation(
                "Winner and loser must be different players",
            ));
        }

        let mut tx = self.pool.begin().await?;

        let (winner_id, winner_name, winner_points) = claim_player(&mut tx, winner)
            .await?
            .ok_or_else(|| RatingError::not_found("Winner not found"))?;
        let (loser_id, loser_name, loser_points) = claim_player(&mut tx, loser)
            .await?
            .ok_or_else(|| RatingError::not_found("Loser not found"))?;

        // Same player reached through an id and a name.
        if winner_id == loser_id {
            return Err(RatingError::validation(
                "Winner and loser must be different players",
            ));
        }

        let exchange = rating::exchange(winner_points, loser_points);

        for (id, points) in [
            (winner_id, exchange.winner_after),
            (loser_id, exchange.loser_after),
        ] {
            sqlx::query("UPDATE players SET points = ? WHERE id = ?")
                .bind(points)
                .bind(id)
                .execute(&mut *tx)
                .await?;
        }

        let match_id: i64 = sqlx::query_scalar(
            "INSERT INTO matches (winner_id, loser_id, winner_tier_before, loser_tier_before, winner_points_change, loser_points_change) VALUES (?, ?, ?, ?, ?, ?) RETURNING id",
        )
        .bind(winner_id)
        .bind(loser_id)
        .bind(exchange.winner_tier_before())
        .bind(exchange.loser_tier_before())
        .bind(exchange.winner_change())
        .bind(exchange.loser_change())
        .fetch_one(&mut *tx)
        .await?;

        let record = fetch_match(&mut tx, match_id)
            .await?
            .ok_or(RatingError::Storage(sqlx::Error::RowNotFound))?;

        tx.commit().await?;

        metrics::MATCHES_RECORDED_TOTAL.inc();
        tracing::info!(
            match_id,
            winner_id,
            loser_id,
            winner_points = exchange.winner_after,
            loser_points = exchange.loser_after,
            "Match recorded"
        );

        Ok(RecordedMatch {
            record,
            winner: PlayerSnapshot::new(winner_id, winner_name, exchange.winner_after),
            loser: PlayerSnapshot::new(loser_id, loser_name, exchange.loser_after),
        })
    }

    pub async fn get_match(&self, id: i64) -> Result<MatchRecord> {
        let mut conn = self.pool.acquire().await?;
        fetch_match(&mut conn, id)
            .await?
            .ok_or_else(|| RatingError::not_found("Match not found"))
    }

    /// Most recent matches first.
    pub async fn recent_matches(&self, limit: i64) -> Result<Vec<MatchRecord>> {
        let rows = sqlx::query_as::<_, MatchRecord>(&format!(
            "SELECT {MATCH_COLUMNS} {MATCH_JOINS} ORDER BY m.id DESC LIMIT ?"
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn count_matches(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM matches")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}
