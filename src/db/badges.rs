// Tournament Badge Registry: (player, tournament, date) tags, independent of points.

use chrono::NaiveDate;
use serde::Serialize;

use super::players::PlayerRef;
use super::Database;
use crate::error::{conflict_on_unique, RatingError, Result};
use crate::metrics;

const DUPLICATE_BADGE: &str = "Player already holds this tournament win";

const BADGE_SELECT: &str = "SELECT tw.id, tw.player_id, p.name AS player_name, tw.tournament_name, \
     tw.won_on, tw.created_at FROM tournament_winners tw JOIN players p ON p.id = tw.player_id";

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct TournamentBadge {
    pub id: i64,
    pub player_id: i64,
    pub player_name: String,
    pub tournament_name: String,
    pub won_on: String,
    pub created_at: String,
}

fn validate_tournament_name(name: &str) -> Result<&str> {
    let name = name.trim();
    if name.is_empty() {
        return Err(RatingError::validation("tournament_name is required"));
    }
    Ok(name)
}

/// Normalize a `YYYY-MM-DD` date.
pub fn parse_won_on(date: &str) -> Result<String> {
    NaiveDate::parse_from_str(date.trim(), "%Y-%m-%d")
        .map(|d| d.format("%Y-%m-%d").to_string())
        .map_err(|_| RatingError::validation("won_on must be in YYYY-MM-DD format"))
}

impl Database {
    /// Award a badge. `won_on` defaults to today (UTC).
    pub async fn add_badge(
        &self,
        player: &PlayerRef,
        tournament_name: &str,
        won_on: Option<&str>,
    ) -> Result<TournamentBadge> {
        let tournament_name = validate_tournament_name(tournament_name)?;
        let won_on = match won_on {
            Some(date) => parse_won_on(date)?,
            None => chrono::Utc::now().date_naive().format("%Y-%m-%d").to_string(),
        };
        let player_id = self.resolve_player(player).await?;

        let id: i64 = sqlx::query_scalar(
            "INSERT INTO tournament_winners (player_id, tournament_name, won_on) VALUES (?, ?, ?) RETURNING id",
        )
        .bind(player_id)
        .bind(tournament_name)
        .bind(&won_on)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| conflict_on_unique(e, DUPLICATE_BADGE))?;

        metrics::BADGES_AWARDED_TOTAL.inc();
        tracing::info!(badge_id = id, player_id, tournament_name, "Tournament badge awarded");
        self.get_badge(id).await
    }

    pub async fn get_badge(&self, id: i64) -> Result<TournamentBadge> {
        sqlx::query_as::<_, TournamentBadge>(&format!("{BADGE_SELECT} WHERE tw.id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| RatingError::not_found("Tournament win not found"))
    }

    /// Change the tournament name and/or date of an existing badge.
    pub async fn update_badge(
        &self,
        id: i64,
        tournament_name: Option<&str>,
        won_on: Option<&str>,
    ) -> Result<TournamentBadge> {
        let current = self.get_badge(id).await?;
        let tournament_name = match tournament_name {
            Some(name) => validate_tournament_name(name)?.to_string(),
            None => current.tournament_name,
        };
        let won_on = match won_on {
            Some(date) => parse_won_on(date)?,
            None => current.won_on,
        };

        let result = sqlx::query(
            "UPDATE tournament_winners SET tournament_name = ?, won_on = ? WHERE id = ?",
        )
        .bind(&tournament_name)
        .bind(&won_on)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|e| conflict_on_unique(e, DUPLICATE_BADGE))?;
        if result.rows_affected() == 0 {
            return Err(RatingError::not_found("Tournament win not found"));
        }
        self.get_badge(id).await
    }

    /// All badges, or only those of `player_id`; newest win first.
    pub async fn list_badges(&self, player_id: Option<i64>) -> Result<Vec<TournamentBadge>> {
        let rows = sqlx::query_as::<_, TournamentBadge>(&format!(
            "{BADGE_SELECT} WHERE (? IS NULL OR tw.player_id = ?) ORDER BY tw.won_on DESC, tw.id DESC"
        ))
        .bind(player_id)
        .bind(player_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn remove_badge(&self, id: i64) -> Result<()> {
        let result = sqlx::query("DELETE FROM tournament_winners WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(RatingError::not_found("Tournament win not found"));
        }
        Ok(())
    }

    /// Returns the number of badges removed.
    pub async fn remove_badges_for_player(&self, player_id: i64) -> Result<u64> {
        // Unknown ids are an error; a player with no badges is not.
        self.get_player(player_id).await?;
        let result = sqlx::query("DELETE FROM tournament_winners WHERE player_id = ?")
            .bind(player_id)
            .execute(&self.pool)
            .await?;
        tracing::info!(
            player_id,
            removed = result.rows_affected(),
            "Tournament badges cleared for player"
        );
        Ok(result.rows_affected())
    }

    /// Returns the number of badges removed.
    pub async fn remove_all_badges(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM tournament_winners")
            .execute(&self.pool)
            .await?;
        tracing::info!(removed = result.rows_affected(), "All tournament badges cleared");
        Ok(result.rows_affected())
    }
}
