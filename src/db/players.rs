// Player Store: identity, points and the soft-delete flag.

use serde::{Deserialize, Serialize};

use super::Database;
use crate::error::{conflict_on_unique, RatingError, Result};
use crate::metrics;
use crate::rating::{self, Tier};

pub const MAX_NAME_LEN: usize = 50;

/// Columns selected for every `Player` read. Expects the players table aliased as `p`.
pub(super) const PLAYER_COLUMNS: &str = "p.id, p.name, p.points, p.active, p.is_champion, \
     EXISTS(SELECT 1 FROM tournament_winners tw WHERE tw.player_id = p.id) AS is_tournament_winner, \
     p.created_at";

/// How a request identifies a player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlayerRef {
    ById(i64),
    ByName(String),
}

impl PlayerRef {
    /// Build a reference from the optional id/name pair of a request body.
    /// The id wins when both are present.
    pub fn from_parts(id: Option<i64>, name: Option<&str>) -> Option<Self> {
        match (id, name.map(str::trim)) {
            (Some(id), _) => Some(PlayerRef::ById(id)),
            (None, Some(name)) if !name.is_empty() => Some(PlayerRef::ByName(name.to_string())),
            _ => None,
        }
    }

    /// `(id, name)` bind values for `WHERE id = ? OR name = ?` lookups.
    pub(super) fn bind_parts(&self) -> (Option<i64>, Option<&str>) {
        match self {
            PlayerRef::ById(id) => (Some(*id), None),
            PlayerRef::ByName(name) => (None, Some(name.as_str())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlayerSort {
    #[default]
    Name,
    Points,
}

#[derive(Debug, sqlx::FromRow)]
pub(super) struct PlayerRow {
    pub id: i64,
    pub name: String,
    pub points: i64,
    pub active: i64,
    pub is_champion: i64,
    pub is_tournament_winner: i64,
    pub created_at: String,
}

/// A player as returned to callers. `tier` is derived from `points` on every read.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Player {
    pub id: i64,
    pub name: String,
    pub points: i64,
    pub tier: Tier,
    pub active: bool,
    pub is_champion: bool,
    pub is_tournament_winner: bool,
    pub created_at: String,
}

impl From<PlayerRow> for Player {
    fn from(row: PlayerRow) -> Self {
        Player {
            id: row.id,
            tier: rating::tier_for(row.points),
            name: row.name,
            points: row.points,
            active: row.active != 0,
            is_champion: row.is_champion != 0,
            is_tournament_winner: row.is_tournament_winner != 0,
            created_at: row.created_at,
        }
    }
}

/// Post-match view of one side of a match.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PlayerSnapshot {
    pub id: i64,
    pub name: String,
    pub points: i64,
    pub tier: Tier,
}

impl PlayerSnapshot {
    pub fn new(id: i64, name: String, points: i64) -> Self {
        Self {
            id,
            name,
            points,
            tier: rating::tier_for(points),
        }
    }
}

fn validate_name(name: &str) -> Result<&str> {
    let name = name.trim();
    if name.is_empty() {
        return Err(RatingError::validation("name is required"));
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err(RatingError::validation(format!(
            "name must be at most {MAX_NAME_LEN} characters"
        )));
    }
    Ok(name)
}

impl Database {
    pub async fn create_player(&self, name: &str, points: Option<i64>) -> Result<Player> {
        let name = validate_name(name)?;
        let points = points.unwrap_or(rating::STARTING_POINTS);
        if !rating::points_in_range(points) {
            return Err(RatingError::validation(format!(
                "points must be between {} and {}",
                rating::MIN_POINTS,
                rating::MAX_POINTS
            )));
        }

        let id: i64 =
            sqlx::query_scalar("INSERT INTO players (name, points) VALUES (?, ?) RETURNING id")
                .bind(name)
                .bind(points)
                .fetch_one(&self.pool)
                .await
                .map_err(|e| conflict_on_unique(e, "Player name already exists"))?;

        metrics::PLAYERS_CREATED_TOTAL.inc();
        tracing::info!(player_id = id, name, points, "Player created");
        self.get_player(id).await
    }

    /// Fetch any player by id, active or not.
    pub async fn get_player(&self, id: i64) -> Result<Player> {
        let row = sqlx::query_as::<_, PlayerRow>(&format!(
            "SELECT {PLAYER_COLUMNS} FROM players p WHERE p.id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(Player::from)
            .ok_or_else(|| RatingError::not_found("Player not found"))
    }

    pub async fn list_players(&self, sort: PlayerSort) -> Result<Vec<Player>> {
        let order = match sort {
            PlayerSort::Name => "p.name ASC",
            PlayerSort::Points => "p.points DESC, p.name ASC",
        };
        let rows = sqlx::query_as::<_, PlayerRow>(&format!(
            "SELECT {PLAYER_COLUMNS} FROM players p WHERE p.active = 1 ORDER BY {order}"
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Player::from).collect())
    }

    /// Resolve a reference to the id of an active player.
    pub async fn resolve_player(&self, player: &PlayerRef) -> Result<i64> {
        let (id, name) = player.bind_parts();
        sqlx::query_scalar::<_, i64>(
            "SELECT id FROM players WHERE active = 1 AND (id = ? OR name = ?)",
        )
        .bind(id)
        .bind(name)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| RatingError::not_found("Player not found"))
    }

    /// Soft delete: the row stays so historical matches keep their references.
    pub async fn deactivate_player(&self, id: i64) -> Result<()> {
        let result = sqlx::query("UPDATE players SET active = 0 WHERE id = ? AND active = 1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(RatingError::not_found("Player not found"));
        }
        metrics::PLAYERS_DEACTIVATED_TOTAL.inc();
        tracing::info!(player_id = id, "Player deactivated");
        Ok(())
    }
}
