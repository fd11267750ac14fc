use std::fs;
use std::time::{Duration, Instant};

use lib_common::configs::AggregationPolicy;
use lib_common::games::{GamesPipeline, Snapshot};
use project_tests::{Endpoint, FakeGame, MockRoblox, Scripted};
use serde_json::Value;

fn read_json(path: &std::path::Path) -> Value {
    serde_json::from_str(&fs::read_to_string(path).expect("snapshot exists")).expect("valid json")
}

#[tokio::test]
async fn failed_batch_is_skipped_and_the_rest_is_ranked() {
    let mut unnamed = FakeGame::new(5, 1, 2, 0, 0);
    unnamed.icon = None;
    let mock = MockRoblox::start(vec![
        FakeGame::new(1, 10, 1_000, 1, 1),
        FakeGame::new(2, 30, 3_000, 3, 1),
        // 3 is unknown upstream
        FakeGame::new(4, 99, 9_900, 1, 0),
        unnamed,
    ])
    .await;
    mock.fail_batches_containing(Endpoint::Games, 4);

    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("public").join("games.json");
    let config = mock.config(vec![1, 2, 3, 4, 5], 3, &output);

    let pipeline = GamesPipeline::from_config(&config).unwrap();
    let report = pipeline
        .run_and_write(&config.universe_ids, &config.output_path)
        .await
        .unwrap();

    assert_eq!(report.batches, 2);
    assert_eq!(report.failed_batches, vec![1]);
    assert_eq!(report.records, 2);
    assert_eq!(report.output_path, output);

    // one call for the healthy batch, max_attempts for the failing one
    assert_eq!(mock.hit_count(Endpoint::Games), 1 + 3);

    let json = read_json(&output);
    let games = json["games"].as_array().unwrap();
    let ids: Vec<u64> = games.iter().map(|g| g["id"].as_u64().unwrap()).collect();
    assert_eq!(ids, vec![2, 1]);

    assert_eq!(games[0]["rootPlaceId"], 20);
    assert_eq!(games[0]["name"], "Game 2");
    assert_eq!(games[0]["playing"], 30);
    assert_eq!(games[0]["visits"], 3_000);
    assert_eq!(games[0]["likeRatio"], 75);
    assert_eq!(games[0]["icon"], "https://img.example/2.png");
    assert_eq!(games[1]["likeRatio"], 50);
}

#[tokio::test]
async fn rejected_endpoint_only_blanks_its_own_fields() {
    let mock = MockRoblox::start(vec![
        FakeGame::new(1, 10, 100, 9, 1),
        FakeGame::new(2, 20, 200, 1, 1),
    ])
    .await;
    mock.script(Endpoint::Votes, Scripted::status(400));

    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("games.json");
    let config = mock.config(vec![1, 2], 75, &output);

    let pipeline = GamesPipeline::from_config(&config).unwrap();
    let (snapshot, results) = pipeline.run(&config.universe_ids).await;

    assert!(results.failed_batches.is_empty());
    assert_eq!(mock.hit_count(Endpoint::Votes), 1);

    let records = snapshot.records();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].id, 2);
    assert!(records.iter().all(|r| r.like_ratio == 0));
    assert!(records.iter().all(|r| !r.icon.is_empty()));
}

#[tokio::test]
async fn zero_fill_summary_keeps_every_requested_id() {
    let mock = MockRoblox::start(vec![
        FakeGame::new(1, 10, 100, 9, 1),
        FakeGame::new(2, 20, 200, 1, 1),
        FakeGame::new(4, 5, 50, 3, 1),
    ])
    .await;
    mock.fail_batches_containing(Endpoint::Votes, 4);

    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("games.json");
    let mut config = mock.config(vec![1, 2, 3, 4], 2, &output);
    config.aggregation = AggregationPolicy::ZeroFillSummary;

    let pipeline = GamesPipeline::from_config(&config).unwrap();
    let report = pipeline
        .run_and_write(&config.universe_ids, &config.output_path)
        .await
        .unwrap();
    assert_eq!(report.failed_batches, vec![1]);
    assert_eq!(report.records, 4);

    let json = read_json(&output);
    assert_eq!(json["totalPlayers"], 30);
    assert_eq!(json["totalVisits"], 300);
    // 90 and 50 rated, the lowest is discarded
    assert_eq!(json["averageRating"], 90);
    assert_eq!(json["gamesCreated"], 4);
    assert!(json["updatedAt"].as_str().is_some());

    let per_game = json["perGame"].as_array().unwrap();
    let ids: Vec<u64> = per_game.iter().map(|g| g["id"].as_u64().unwrap()).collect();
    assert_eq!(ids, vec![1, 2, 3, 4]);
    for zeroed in &per_game[2..] {
        assert_eq!(zeroed["playing"], 0);
        assert_eq!(zeroed["visits"], 0);
        assert_eq!(zeroed["likeRatio"], 0);
        assert_eq!(zeroed["name"], "");
        assert_eq!(zeroed["icon"], "");
    }

    match lib_common::games::snapshot::read_snapshot(&output).unwrap() {
        Snapshot::Summary(summary) => assert_eq!(summary.per_game.len(), 4),
        other => panic!("expected summary snapshot, got {other:?}"),
    }
}

#[tokio::test]
async fn pipeline_routes_every_endpoint_through_the_relay() {
    let mock = MockRoblox::start(vec![FakeGame::new(8, 1, 1, 1, 0)]).await;

    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("games.json");
    let mut config = mock.config(vec![8], 75, &output);
    config.relay_url = Some(mock.relay_prefix());

    let pipeline = GamesPipeline::from_config(&config).unwrap();
    let (snapshot, _) = pipeline.run(&config.universe_ids).await;

    assert_eq!(snapshot.len(), 1);
    let hits = mock.hits();
    assert_eq!(hits.len(), 3);
    assert!(hits.iter().all(|h| h.via_relay && h.origin.as_deref() == Some("null")));
}

#[tokio::test]
async fn no_ids_still_writes_an_empty_snapshot() {
    let mock = MockRoblox::start(vec![]).await;

    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("games.json");
    let config = mock.config(vec![], 75, &output);

    let pipeline = GamesPipeline::from_config(&config).unwrap();
    let report = pipeline.run_and_write(&[], &output).await.unwrap();

    assert_eq!(report.batches, 0);
    assert!(mock.hits().is_empty());
    assert_eq!(read_json(&output), serde_json::json!({"games": []}));
}

#[tokio::test]
async fn batches_respect_the_configured_size() {
    let ids: Vec<u64> = (1..=7).collect();
    let games = ids.iter().map(|id| FakeGame::new(*id, *id, 1, 1, 0)).collect();
    let mock = MockRoblox::start(games).await;

    let dir = tempfile::tempdir().unwrap();
    let config = mock.config(ids.clone(), 3, &dir.path().join("games.json"));

    let pipeline = GamesPipeline::from_config(&config).unwrap();
    let (snapshot, _) = pipeline.run(&ids).await;

    let batches: Vec<Vec<u64>> = mock
        .hits()
        .into_iter()
        .filter(|h| h.endpoint == Endpoint::Games)
        .map(|h| h.ids)
        .collect();
    assert_eq!(batches, vec![vec![1, 2, 3], vec![4, 5, 6], vec![7]]);

    let ranked: Vec<u64> = snapshot.records().iter().map(|r| r.id).collect();
    assert_eq!(ranked, vec![7, 6, 5, 4, 3, 2, 1]);
}

#[tokio::test]
async fn pause_follows_every_batch_including_abandoned_ones() {
    let mock = MockRoblox::start(vec![
        FakeGame::new(1, 10, 1, 1, 0),
        FakeGame::new(2, 20, 1, 1, 0),
        FakeGame::new(3, 30, 1, 1, 0),
    ])
    .await;
    mock.fail_batches_containing(Endpoint::Games, 1);

    let dir = tempfile::tempdir().unwrap();
    let mut config = mock.config(vec![1, 2, 3], 1, &dir.path().join("games.json"));
    config.inter_batch_pause_ms = 300;
    let pause = Duration::from_millis(300);

    let pipeline = GamesPipeline::from_config(&config).unwrap();
    let started = Instant::now();
    let (snapshot, results) = pipeline.run(&config.universe_ids).await;
    let elapsed = started.elapsed();

    assert_eq!(results.failed_batches, vec![0]);
    assert_eq!(results.batch_count, 3);
    // every batch, the last one included, is followed by the pause
    assert!(elapsed >= pause * 3, "run took only {elapsed:?}");

    let games_hits: Vec<_> = mock
        .hits()
        .into_iter()
        .filter(|h| h.endpoint == Endpoint::Games)
        .collect();
    let first_hit = |id: u64| games_hits.iter().find(|h| h.ids == vec![id]).unwrap().at;
    let last_failed = games_hits.iter().rev().find(|h| h.ids == vec![1]).unwrap().at;

    assert!(first_hit(2).duration_since(last_failed) >= pause);
    assert!(first_hit(3).duration_since(first_hit(2)) >= pause);

    let ranked: Vec<u64> = snapshot.records().iter().map(|r| r.id).collect();
    assert_eq!(ranked, vec![3, 2]);
}
