// Archive Curator: monthly top-3 snapshots and the champion flag.

use std::collections::HashMap;

use chrono::NaiveDate;
use serde::Serialize;

use super::Database;
use crate::error::{conflict_on_unique, RatingError, Result};
use crate::metrics;

const DUPLICATE_MONTH: &str = "Archive for this month already exists";

const ARCHIVE_SELECT: &str = r#"
    SELECT a.id, a.month,
           a.first_player_id, f.name AS first_player_name, a.first_points,
           a.second_player_id, s.name AS second_player_name, a.second_points,
           a.third_player_id, t.name AS third_player_name, a.third_points,
           a.created_at
    FROM monthly_archives a
    JOIN players f ON f.id = a.first_player_id
    JOIN players s ON s.id = a.second_player_id
    JOIN players t ON t.id = a.third_player_id
"#;

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct MonthlyArchive {
    pub id: i64,
    pub month: String,
    pub first_player_id: i64,
    pub first_player_name: String,
    pub first_points: i64,
    pub second_player_id: i64,
    pub second_player_name: String,
    pub second_points: i64,
    pub third_player_id: i64,
    pub third_player_name: String,
    pub third_points: i64,
    pub created_at: String,
}

/// Normalize a `YYYY-MM` month, rejecting anything that is not a real month.
pub fn parse_month(month: &str) -> Result<String> {
    let month = month.trim();
    NaiveDate::parse_from_str(&format!("{month}-01"), "%Y-%m-%d")
        .map(|d| d.format("%Y-%m").to_string())
        .map_err(|_| RatingError::validation("month must be in YYYY-MM format"))
}

impl Database {
    /// Snapshot three placed players for `month` and flag them as champions.
    pub async fn create_archive(&self, month: &str, placed: [i64; 3]) -> Result<MonthlyArchive> {
        let month = parse_month(month)?;
        let [first, second, third] = placed;
        if first == second || first == third || second == third {
            return Err(RatingError::validation("Archive players must be distinct"));
        }

        let mut tx = self.pool.begin().await?;

        // Writing first takes the lock before the point snapshot is read.
        let rows: Vec<(i64, i64)> = sqlx::query_as(
            "UPDATE players SET is_champion = 1 WHERE active = 1 AND id IN (?, ?, ?) RETURNING id, points",
        )
        .bind(first)
        .bind(second)
        .bind(third)
        .fetch_all(&mut *tx)
        .await?;
        let points: HashMap<i64, i64> = rows.into_iter().collect();

        let snapshot = |id: i64| {
            points
                .get(&id)
                .copied()
                .ok_or_else(|| RatingError::not_found(format!("Player {id} not found")))
        };
        let (first_points, second_points, third_points) =
            (snapshot(first)?, snapshot(second)?, snapshot(third)?);

        let existing: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM monthly_archives WHERE month = ?")
                .bind(&month)
                .fetch_one(&mut *tx)
                .await?;
        if existing > 0 {
            return Err(RatingError::conflict(DUPLICATE_MONTH));
        }

        let id: i64 = sqlx::query_scalar(
            "INSERT INTO monthly_archives (month, first_player_id, first_points, second_player_id, second_points, third_player_id, third_points) VALUES (?, ?, ?, ?, ?, ?, ?) RETURNING id",
        )
        .bind(&month)
        .bind(first)
        .bind(first_points)
        .bind(second)
        .bind(second_points)
        .bind(third)
        .bind(third_points)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| conflict_on_unique(e, DUPLICATE_MONTH))?;

        tx.commit().await?;

        metrics::ARCHIVES_CREATED_TOTAL.inc();
        tracing::info!(archive_id = id, month = %month, "Monthly archive created");
        self.get_archive(id).await
    }

    pub async fn get_archive(&self, id: i64) -> Result<MonthlyArchive> {
        sqlx::query_as::<_, MonthlyArchive>(&format!("{ARCHIVE_SELECT} WHERE a.id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| RatingError::not_found("Archive not found"))
    }

    /// Newest month first.
    pub async fn list_archives(&self) -> Result<Vec<MonthlyArchive>> {
        let rows =
            sqlx::query_as::<_, MonthlyArchive>(&format!("{ARCHIVE_SELECT} ORDER BY a.month DESC"))
                .fetch_all(&self.pool)
                .await?;
        Ok(rows)
    }

    /// Removes the archive row only. Champion flags it granted stay set.
    pub async fn delete_archive(&self, id: i64) -> Result<()> {
        let result = sqlx::query("DELETE FROM monthly_archives WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(RatingError::not_found("Archive not found"));
        }
        metrics::ARCHIVES_DELETED_TOTAL.inc();
        tracing::info!(archive_id = id, "Monthly archive deleted");
        Ok(())
    }
}
