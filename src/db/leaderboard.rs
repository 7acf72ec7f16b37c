// Leaderboard Projector: read-only rankings and per-player history.

use serde::Serialize;

use super::players::Player;
use super::Database;
use crate::error::Result;
use crate::rating::{self, Tier};

#[derive(Debug, sqlx::FromRow)]
struct StandingRow {
    id: i64,
    name: String,
    points: i64,
    is_champion: i64,
    is_tournament_winner: i64,
    wins: i64,
    losses: i64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct LeaderboardEntry {
    pub rank: i64,
    pub id: i64,
    pub name: String,
    pub points: i64,
    pub tier: Tier,
    pub wins: i64,
    pub losses: i64,
    pub win_percentage: f64,
    pub is_champion: bool,
    pub is_tournament_winner: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum MatchResult {
    Win,
    Loss,
}

/// One match seen from a single player's side.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct PlayerHistoryEntry {
    pub match_id: i64,
    pub result: MatchResult,
    pub opponent_id: i64,
    pub opponent_name: String,
    /// Opponent's tier when the match was played.
    pub opponent_tier: Tier,
    pub points_change: i64,
    pub played_at: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PlayerStats {
    pub wins: i64,
    pub losses: i64,
    pub win_percentage: f64,
}

impl PlayerStats {
    fn new(wins: i64, losses: i64) -> Self {
        Self {
            wins,
            losses,
            win_percentage: rating::win_percentage(wins, losses),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PlayerDetail {
    pub player: Player,
    /// Leaderboard position; `None` for inactive players.
    pub rank: Option<i64>,
    pub stats: PlayerStats,
    pub recent_matches: Vec<PlayerHistoryEntry>,
}

/// Sort standings into leaderboard order and number them from 1.
fn rank_standings(mut rows: Vec<StandingRow>) -> Vec<LeaderboardEntry> {
    rows.sort_by(|a, b| {
        rating::standing_order(
            (a.points, a.wins, a.name.as_str()),
            (b.points, b.wins, b.name.as_str()),
        )
    });
    rows.into_iter()
        .enumerate()
        .map(|(i, row)| LeaderboardEntry {
            rank: i as i64 + 1,
            id: row.id,
            tier: rating::tier_for(row.points),
            name: row.name,
            points: row.points,
            wins: row.wins,
            losses: row.losses,
            win_percentage: rating::win_percentage(row.wins, row.losses),
            is_champion: row.is_champion != 0,
            is_tournament_winner: row.is_tournament_winner != 0,
        })
        .collect()
}

impl Database {
    pub async fn leaderboard(&self) -> Result<Vec<LeaderboardEntry>> {
        let rows = sqlx::query_as::<_, StandingRow>(
            r#"
            SELECT p.id, p.name, p.points, p.is_champion,
                   EXISTS(SELECT 1 FROM tournament_winners tw WHERE tw.player_id = p.id) AS is_tournament_winner,
                   (SELECT COUNT(*) FROM matches m WHERE m.winner_id = p.id) AS wins,
                   (SELECT COUNT(*) FROM matches m WHERE m.loser_id = p.id) AS losses
            FROM players p
            WHERE p.active = 1
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rank_standings(rows))
    }

    pub async fn top_three(&self) -> Result<Vec<LeaderboardEntry>> {
        let mut entries = self.leaderboard().await?;
        entries.truncate(3);
        Ok(entries)
    }

    /// Stats plus the `limit` most recent matches of one player.
    pub async fn player_detail(&self, id: i64, limit: i64) -> Result<PlayerDetail> {
        let player = self.get_player(id).await?;

        let (wins, losses): (i64, i64) = sqlx::query_as(
            r#"
            SELECT
                (SELECT COUNT(*) FROM matches WHERE winner_id = ?),
                (SELECT COUNT(*) FROM matches WHERE loser_id = ?)
            "#,
        )
        .bind(id)
        .bind(id)
        .fetch_one(&self.pool)
        .await?;

        let recent_matches = sqlx::query_as::<_, PlayerHistoryEntry>(
            r#"
            WITH me(id) AS (SELECT ?)
            SELECT m.id AS match_id,
                   CASE WHEN m.winner_id = me.id THEN 'win' ELSE 'loss' END AS result,
                   o.id AS opponent_id,
                   o.name AS opponent_name,
                   CASE WHEN m.winner_id = me.id THEN m.loser_tier_before ELSE m.winner_tier_before END AS opponent_tier,
                   CASE WHEN m.winner_id = me.id THEN m.winner_points_change ELSE m.loser_points_change END AS points_change,
                   m.played_at
            FROM matches m
            JOIN me ON m.winner_id = me.id OR m.loser_id = me.id
            JOIN players o ON o.id = CASE WHEN m.winner_id = me.id THEN m.loser_id ELSE m.winner_id END
            ORDER BY m.id DESC
            LIMIT ?
            "#,
        )
        .bind(id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        let rank = if player.active {
            self.leaderboard()
                .await?
                .iter()
                .find(|e| e.id == id)
                .map(|e| e.rank)
        } else {
            None
        };

        Ok(PlayerDetail {
            player,
            rank,
            stats: PlayerStats::new(wins, losses),
            recent_matches,
        })
    }
}
