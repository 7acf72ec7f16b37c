// Concurrent writes against one shared store: no lost updates, exactly one
// ledger row per recorded match, one archive per month.

use std::sync::Arc;

use futures::future::join_all;

use chess_club_backend::db::{Database, PlayerRef, PlayerSort};
use chess_club_backend::error::RatingError;

async fn test_db() -> Arc<Database> {
    Arc::new(Database::new("sqlite::memory:").await.unwrap())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_matches_on_same_pair() {
    let db = test_db().await;
    let a = db.create_player("Anand", Some(20)).await.unwrap();
    let b = db.create_player("Gelfand", Some(20)).await.unwrap();

    let tasks = (0..15).map(|_| {
        let db = db.clone();
        tokio::spawn(async move {
            db.record_match(&PlayerRef::ById(a.id), &PlayerRef::ById(b.id))
                .await
        })
    });
    for result in join_all(tasks).await {
        result.unwrap().unwrap();
    }

    assert_eq!(db.count_matches().await.unwrap(), 15);
    assert_eq!(db.get_player(a.id).await.unwrap().points, 35);
    assert_eq!(db.get_player(b.id).await.unwrap().points, 5);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_matches_around_one_player() {
    let db = test_db().await;
    let hub = db.create_player("Hub", Some(20)).await.unwrap();
    let mut opponents = Vec::new();
    for i in 0..10 {
        opponents.push(db.create_player(&format!("Opponent {i}"), Some(20)).await.unwrap());
    }

    // Hub wins against every opponent and every opponent also loses once to
    // the next one, all at the same time.
    let mut pairs: Vec<(i64, i64)> = opponents.iter().map(|o| (hub.id, o.id)).collect();
    for w in opponents.windows(2) {
        pairs.push((w[1].id, w[0].id));
    }

    let tasks = pairs.iter().map(|&(winner, loser)| {
        let db = db.clone();
        tokio::spawn(async move {
            db.record_match(&PlayerRef::ById(winner), &PlayerRef::ById(loser))
                .await
        })
    });
    for result in join_all(tasks).await {
        result.unwrap().unwrap();
    }

    assert_eq!(db.count_matches().await.unwrap(), pairs.len() as i64);
    assert_eq!(db.get_player(hub.id).await.unwrap().points, 30);

    // No clamping happened, so points are conserved.
    let total: i64 = db
        .list_players(PlayerSort::Name)
        .await
        .unwrap()
        .iter()
        .map(|p| p.points)
        .sum();
    assert_eq!(total, 20 * 11);

    // Every player's points match their recorded wins and losses.
    for entry in db.leaderboard().await.unwrap() {
        assert_eq!(entry.points, 20 + entry.wins - entry.losses, "{}", entry.name);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_archives_for_same_month() {
    let db = test_db().await;
    let mut ids = Vec::new();
    for (name, points) in [("Gold", 30), ("Silver", 20), ("Bronze", 10)] {
        ids.push(db.create_player(name, Some(points)).await.unwrap().id);
    }
    let placed = [ids[0], ids[1], ids[2]];

    let tasks = (0..6).map(|_| {
        let db = db.clone();
        tokio::spawn(async move { db.create_archive("2024-01", placed).await })
    });
    let results: Vec<_> = join_all(tasks)
        .await
        .into_iter()
        .map(|r| r.unwrap())
        .collect();

    let created = results.iter().filter(|r| r.is_ok()).count();
    let conflicts = results
        .iter()
        .filter(|r| {
            matches!(r, Err(RatingError::Conflict(m)) if m == "Archive for this month already exists")
        })
        .count();
    assert_eq!(created, 1);
    assert_eq!(conflicts, 5);

    let archives = db.list_archives().await.unwrap();
    assert_eq!(archives.len(), 1);
    assert_eq!(archives[0].first_points, 30);
}
