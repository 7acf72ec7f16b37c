// Database access layer (SQLite via sqlx).
//
// `Database` is the store capability handed to every component. Each
// component adds its own `impl Database` block in a submodule.

mod archives;
mod badges;
mod leaderboard;
mod matches;
mod players;

pub use archives::MonthlyArchive;
pub use badges::TournamentBadge;
pub use leaderboard::{LeaderboardEntry, MatchResult, PlayerDetail, PlayerHistoryEntry, PlayerStats};
pub use matches::{MatchRecord, RecordedMatch};
pub use players::{Player, PlayerRef, PlayerSnapshot, PlayerSort};

use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};

pub const DEFAULT_HISTORY_LIMIT: i64 = 20;
pub const MAX_HISTORY_LIMIT: i64 = 100;

/// Clamp a caller-supplied row limit into `1..=MAX_HISTORY_LIMIT`.
pub fn history_limit(requested: Option<i64>) -> i64 {
    requested
        .unwrap_or(DEFAULT_HISTORY_LIMIT)
        .clamp(1, MAX_HISTORY_LIMIT)
}

pub struct Database {
    pool: SqlitePool,
}

impl Database {
    pub async fn new(database_url: &str) -> Result<Self, sqlx::Error> {
        let options = SqliteConnectOptions::from_str(database_url)?
            .foreign_keys(true)
            .busy_timeout(Duration::from_secs(5));
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;
        let db = Self { pool };
        db.run_migrations().await?;
        Ok(db)
    }

    /// Close every pooled connection. Called once on shutdown.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    async fn run_migrations(&self) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS players (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                points INTEGER NOT NULL DEFAULT 0 CHECK (points BETWEEN 0 AND 49),
                active INTEGER NOT NULL DEFAULT 1,
                is_champion INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL DEFAULT (datetime('now'))
            )
        "#,
        )
        .execute(&self.pool)
        .await?;

        // Names only need to be unique among active players.
        sqlx::query(
            "CREATE UNIQUE INDEX IF NOT EXISTS idx_players_active_name ON players(name) WHERE active = 1",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS matches (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                winner_id INTEGER NOT NULL REFERENCES players(id),
                loser_id INTEGER NOT NULL REFERENCES players(id),
                winner_tier_before TEXT NOT NULL,
                loser_tier_before TEXT NOT NULL,
                winner_points_change INTEGER NOT NULL,
                loser_points_change INTEGER NOT NULL,
                played_at TEXT NOT NULL DEFAULT (datetime('now')),
                CHECK (winner_id <> loser_id)
            )
        "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_matches_winner ON matches(winner_id)")
            .execute(&self.pool)
            .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_matches_loser ON matches(loser_id)")
            .execute(&self.pool)
            .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS monthly_archives (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                month TEXT NOT NULL UNIQUE,
                first_player_id INTEGER NOT NULL REFERENCES players(id),
                first_points INTEGER NOT NULL,
                second_player_id INTEGER NOT NULL REFERENCES players(id),
                second_points INTEGER NOT NULL,
                third_player_id INTEGER NOT NULL REFERENCES players(id),
                third_points INTEGER NOT NULL,
                created_at TEXT NOT NULL DEFAULT (datetime('now')),
                CHECK (
                    first_player_id <> second_player_id
                    AND first_player_id <> third_player_id
                    AND second_player_id <> third_player_id
                )
            )
        "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS tournament_winners (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                player_id INTEGER NOT NULL REFERENCES players(id),
                tournament_name TEXT NOT NULL,
                won_on TEXT NOT NULL,
                created_at TEXT NOT NULL DEFAULT (datetime('now')),
                UNIQUE(player_id, tournament_name, won_on)
            )
        "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
