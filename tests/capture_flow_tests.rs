// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! End-to-end capture flow tests: trek in, zones and counters out.

use chrono::Utc;
use territory::db::Store;
use territory::error::AppError;
use territory::models::{Team, TrekStatus, ZoneAction, ZoneKind};
use territory::services::Closure;

mod common;
use common::{
    faulty_state, geo, offset, player_on_team, square_loop, straight_walk, submission,
    test_state, ORIGIN,
};

#[tokio::test]
async fn test_closed_square_creates_zone() {
    let (state, _rx) = test_state();
    player_on_team(&state, 1, Team::Green).await;

    let outcome = state
        .capture
        .finish_capture_flow(1, submission(&square_loop(ORIGIN, 100.0)))
        .await
        .unwrap();

    assert_eq!(outcome.point_count, 10);
    assert_eq!(outcome.team, Team::Green);
    assert!((outcome.distance_m - 400.0).abs() < 2.0);

    let Closure::Closed {
        zone_id,
        area_m2,
        captured,
    } = &outcome.closure
    else {
        panic!("loop should close");
    };
    assert!(
        (area_m2 - 10_000.0).abs() <= 1_000.0,
        "area {} not within 10% of 10,000 m²",
        area_m2
    );
    assert!(captured.is_empty());

    let zone = state.zones.zone(*zone_id).await.unwrap();
    assert_eq!(zone.kind(), ZoneKind::Polygon);
    assert_eq!(zone.owner, Some(1));
    assert_eq!(zone.team, Some(Team::Green));

    let player = state.ledger.get(1).await.unwrap();
    assert_eq!(player.zones_owned, 1);
    assert!((player.total_distance_m - outcome.distance_m).abs() < 1e-9);
    assert_eq!(outcome.new_achievements, vec!["first_zone".to_string()]);

    let trek = state.store.get_trek(outcome.trek_id).await.unwrap().unwrap();
    assert_eq!(trek.status, TrekStatus::Finished);
}

#[tokio::test]
async fn test_loop_captures_exactly_the_enclosed_rival() {
    let (state, _rx) = test_state();
    player_on_team(&state, 1, Team::Red).await;
    player_on_team(&state, 2, Team::Blue).await;

    // Rival zone centered inside the walk, another well outside it
    let inside = state
        .zones
        .create_circle(2, Team::Blue, geo(offset(ORIGIN, 50.0, 50.0)), 30.0, None)
        .await
        .unwrap();
    let outside = state
        .zones
        .create_circle(2, Team::Blue, geo(offset(ORIGIN, 500.0, 500.0)), 30.0, None)
        .await
        .unwrap();

    let outcome = state
        .capture
        .finish_capture_flow(1, submission(&square_loop(ORIGIN, 100.0)))
        .await
        .unwrap();

    let captured = outcome.captured();
    assert_eq!(captured.len(), 1);
    assert_eq!(captured[0].zone_id, inside.id);
    assert_eq!(captured[0].previous_owner, Some(2));
    assert_eq!(captured[0].previous_team, Some(Team::Blue));

    assert_eq!(state.zones.zone(inside.id).await.unwrap().owner, Some(1));
    assert_eq!(state.zones.zone(outside.id).await.unwrap().owner, Some(2));

    let winner = state.ledger.get(1).await.unwrap();
    let loser = state.ledger.get(2).await.unwrap();
    // The new polygon plus the captured circle
    assert_eq!(winner.zones_owned, 2);
    assert_eq!(winner.zones_captured_count, 1);
    assert_eq!(loser.zones_owned, 1);

    assert!(outcome.new_achievements.contains(&"first_zone".to_string()));
    assert!(outcome
        .new_achievements
        .contains(&"first_capture".to_string()));

    let history = state.zones.history(inside.id).await.unwrap();
    assert_eq!(history.last().unwrap().action, ZoneAction::Captured);
}

#[tokio::test]
async fn test_loop_skips_own_zones() {
    let (state, _rx) = test_state();
    player_on_team(&state, 1, Team::Red).await;

    let own = state
        .zones
        .create_circle(1, Team::Red, geo(offset(ORIGIN, 50.0, 50.0)), 30.0, None)
        .await
        .unwrap();

    let outcome = state
        .capture
        .finish_capture_flow(1, submission(&square_loop(ORIGIN, 100.0)))
        .await
        .unwrap();

    assert!(outcome.captured().is_empty());
    assert_eq!(state.zones.history(own.id).await.unwrap().len(), 1);
    assert_eq!(state.ledger.get(1).await.unwrap().zones_captured_count, 0);
}

#[tokio::test]
async fn test_open_walk_reports_remaining_gap() {
    let (state, _rx) = test_state();
    player_on_team(&state, 1, Team::Yellow).await;

    let outcome = state
        .capture
        .finish_capture_flow(1, submission(&straight_walk(ORIGIN, 20.0)))
        .await
        .unwrap();

    match outcome.closure {
        Closure::Open { remaining_m } => assert!((remaining_m - 180.0).abs() < 1.0),
        Closure::Closed { .. } => panic!("a straight walk cannot close"),
    }
    assert!(state.zones.active_zones().await.unwrap().is_empty());

    // Distance still counts
    let player = state.ledger.get(1).await.unwrap();
    assert!((player.total_distance_m - 180.0).abs() < 1.0);
}

#[tokio::test]
async fn test_claimed_values_are_not_trusted() {
    let (state, _rx) = test_state();
    player_on_team(&state, 1, Team::Red).await;
    player_on_team(&state, 2, Team::Blue).await;

    let rival = state
        .zones
        .create_circle(2, Team::Blue, geo(offset(ORIGIN, 50.0, 50.0)), 30.0, None)
        .await
        .unwrap();

    let mut lying = submission(&straight_walk(ORIGIN, 20.0));
    lying.team = Some("blue".to_string());
    lying.closed = true;
    lying.distance_m = 99_999.0;

    let outcome = state.capture.finish_capture_flow(1, lying).await.unwrap();
    assert!(matches!(outcome.closure, Closure::Open { .. }));
    assert_eq!(outcome.team, Team::Red);
    assert!(outcome.distance_m < 200.0);
    assert_eq!(state.zones.zone(rival.id).await.unwrap().owner, Some(2));
}

#[tokio::test]
async fn test_short_trek_rejected_without_mutation() {
    let (state, _rx) = test_state();
    player_on_team(&state, 1, Team::Red).await;

    let walk = square_loop(ORIGIN, 100.0);
    let err = state
        .capture
        .finish_capture_flow(1, submission(&walk[..4]))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    let player = state.ledger.get(1).await.unwrap();
    assert_eq!(player.total_distance_m, 0.0);
    assert!(state.store.list_active_treks().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_player_without_team_rejected_without_mutation() {
    let (state, _rx) = test_state();
    state.ledger.get_or_create(1, "Nomad").await.unwrap();

    let err = state
        .capture
        .finish_capture_flow(1, submission(&square_loop(ORIGIN, 100.0)))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    assert!(state.zones.active_zones().await.unwrap().is_empty());
    assert_eq!(state.ledger.get(1).await.unwrap().total_distance_m, 0.0);
}

#[tokio::test]
async fn test_submission_cancels_recorded_trek() {
    let (state, _rx) = test_state();
    player_on_team(&state, 1, Team::Red).await;

    let recording = state.treks.start_trek(1).await.unwrap();
    state
        .capture
        .finish_capture_flow(1, submission(&straight_walk(ORIGIN, 20.0)))
        .await
        .unwrap();

    let recording = state.store.get_trek(recording.id).await.unwrap().unwrap();
    assert_eq!(recording.status, TrekStatus::Cancelled);
}

#[tokio::test]
async fn test_recorded_trek_completes_through_capture() {
    let (state, _rx) = test_state();
    player_on_team(&state, 1, Team::Red).await;
    player_on_team(&state, 2, Team::Blue).await;

    let rival = state
        .zones
        .create_circle(2, Team::Blue, geo(offset(ORIGIN, 50.0, 50.0)), 30.0, None)
        .await
        .unwrap();

    state.treks.start_trek(1).await.unwrap();
    for &(lat, lng) in &square_loop(ORIGIN, 100.0) {
        state.treks.add_point(1, lat, lng, Utc::now()).await.unwrap();
    }

    let outcome = state.capture.complete_trek(1).await.unwrap();
    assert_eq!(outcome.captured().len(), 1);
    assert_eq!(state.zones.zone(rival.id).await.unwrap().owner, Some(1));
}

#[tokio::test]
async fn test_complete_without_active_trek() {
    let (state, _rx) = test_state();
    player_on_team(&state, 1, Team::Red).await;

    let err = state.capture.complete_trek(1).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn test_failed_capture_is_skipped_and_scan_continues() {
    let (state, store) = faulty_state();
    player_on_team(&state, 1, Team::Red).await;
    player_on_team(&state, 2, Team::Blue).await;

    // Both rivals sit inside the loop; the first one loses a write race
    let contested = state
        .zones
        .create_circle(2, Team::Blue, geo(offset(ORIGIN, 30.0, 30.0)), 10.0, None)
        .await
        .unwrap();
    let taken = state
        .zones
        .create_circle(2, Team::Blue, geo(offset(ORIGIN, 70.0, 70.0)), 10.0, None)
        .await
        .unwrap();
    store.conflicting_zones.insert(contested.id);

    let outcome = state
        .capture
        .finish_capture_flow(1, submission(&square_loop(ORIGIN, 100.0)))
        .await
        .unwrap();

    let captured: Vec<u64> = outcome.captured().iter().map(|c| c.zone_id).collect();
    assert_eq!(captured, vec![taken.id]);

    let contested_now = state.zones.zone(contested.id).await.unwrap();
    assert_eq!(contested_now.owner, Some(2));
    assert_eq!(state.zones.history(contested.id).await.unwrap().len(), 1);
    assert_eq!(state.zones.zone(taken.id).await.unwrap().owner, Some(1));

    let winner = state.ledger.get(1).await.unwrap();
    assert_eq!(winner.zones_captured_count, 1);
    assert_eq!(state.ledger.get(2).await.unwrap().zones_owned, 1);
}
