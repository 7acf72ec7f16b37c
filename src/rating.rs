// Point and tier rules for club matches.
//
// Points live in [MIN_POINTS, MAX_POINTS]. A win moves a fixed number of
// points from the loser to the winner, each side clamped to the range on its
// own, so the exchange is zero-sum except at the boundaries.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

pub const MIN_POINTS: i64 = 0;
pub const MAX_POINTS: i64 = 49;
pub const STARTING_POINTS: i64 = 0;

/// Points gained by the winner (and lost by the loser) per match.
pub const POINTS_PER_WIN: i64 = 1;

// Lower bound of each tier above Pawn.
const KNIGHT_FLOOR: i64 = 10;
const BISHOP_FLOOR: i64 = 20;
const ROOK_FLOOR: i64 = 30;
const QUEEN_FLOOR: i64 = 40;

/// Ordered classification derived from a point total.
/// Stored as its lowercase label in match rows.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, sqlx::Type,
)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum Tier {
    Pawn,
    Knight,
    Bishop,
    Rook,
    Queen,
}

impl Tier {
    pub fn as_str(self) -> &'static str {
        match self {
            Tier::Pawn => "pawn",
            Tier::Knight => "knight",
            Tier::Bishop => "bishop",
            Tier::Rook => "rook",
            Tier::Queen => "queen",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tier for a point total. Out-of-range input is clamped first.
pub fn tier_for(points: i64) -> Tier {
    let points = clamp_points(points);
    if points >= QUEEN_FLOOR {
        Tier::Queen
    } else if points >= ROOK_FLOOR {
        Tier::Rook
    } else if points >= BISHOP_FLOOR {
        Tier::Bishop
    } else if points >= KNIGHT_FLOOR {
        Tier::Knight
    } else {
        Tier::Pawn
    }
}

pub fn clamp_points(points: i64) -> i64 {
    points.clamp(MIN_POINTS, MAX_POINTS)
}

pub fn points_in_range(points: i64) -> bool {
    (MIN_POINTS..=MAX_POINTS).contains(&points)
}

/// Result of applying one match to both players' point totals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PointExchange {
    pub winner_before: i64,
    pub loser_before: i64,
    pub winner_after: i64,
    pub loser_after: i64,
}

impl PointExchange {
    /// Signed change applied to the winner (never negative).
    pub fn winner_change(&self) -> i64 {
        self.winner_after - self.winner_before
    }

    /// Signed change applied to the loser (never positive).
    pub fn loser_change(&self) -> i64 {
        self.loser_after - self.loser_before
    }

    pub fn winner_tier_before(&self) -> Tier {
        tier_for(self.winner_before)
    }

    pub fn loser_tier_before(&self) -> Tier {
        tier_for(self.loser_before)
    }
}

/// Compute the exchange for a match between the given point totals.
pub fn exchange(winner_points: i64, loser_points: i64) -> PointExchange {
    PointExchange {
        winner_before: winner_points,
        loser_before: loser_points,
        winner_after: clamp_points(winner_points + POINTS_PER_WIN),
        loser_after: clamp_points(loser_points - POINTS_PER_WIN),
    }
}

/// Win percentage rounded to two decimals; 0 when no games were played.
pub fn win_percentage(wins: i64, losses: i64) -> f64 {
    let games = wins + losses;
    if games <= 0 {
        return 0.0;
    }
    let pct = wins as f64 / games as f64 * 100.0;
    (pct * 100.0).round() / 100.0
}

/// Leaderboard order: points desc, wins desc, name asc.
pub fn standing_order(
    (a_points, a_wins, a_name): (i64, i64, &str),
    (b_points, b_wins, b_name): (i64, i64, &str),
) -> Ordering {
    b_points
        .cmp(&a_points)
        .then_with(|| b_wins.cmp(&a_wins))
        .then_with(|| a_name.cmp(b_name))
}
