use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;

use game_services::backends::{
    LocalGameServiceClient, MockGameServiceClient, NoGameServiceClient, PortalSession,
    StatsTransport, WebStatsClient,
};
use game_services::{
    ChannelListener, ConnectionEvent, ErrorKind, GameServiceClient, GameServiceError,
    GameServiceFeature, Response, Result,
};

struct SignedInPortal;

#[async_trait]
impl StatsTransport for SignedInPortal {
    async fn load_session(&self) -> Result<PortalSession> {
        Ok(PortalSession {
            username: Some("portal_player".to_string()),
            guest: false,
        })
    }

    async fn show_login(&self) -> Result<()> {
        Ok(())
    }

    async fn submit_stat(&self, _name: &str, _value: i64) -> Result<()> {
        Ok(())
    }
}

fn counting<T>(fired: &Arc<AtomicUsize>) -> Response<T> {
    let fired = Arc::clone(fired);
    Response::new(move |_| {
        fired.fetch_add(1, Ordering::SeqCst);
    })
}

async fn connect(client: &dyn GameServiceClient) -> ConnectionEvent {
    let (listener, mut events) = ChannelListener::channel();
    client.set_listener(listener);
    client.connect(true);
    tokio::time::timeout(Duration::from_secs(2), events.recv())
        .await
        .expect("no connection outcome")
        .expect("listener closed")
}

async fn all_backends() -> Vec<Arc<dyn GameServiceClient>> {
    let clients: Vec<Arc<dyn GameServiceClient>> = vec![
        Arc::new(NoGameServiceClient::new()),
        Arc::new(
            MockGameServiceClient::new(Handle::current())
                .with_features([GameServiceFeature::FetchAchievements, GameServiceFeature::SubmitEvents]),
        ),
        Arc::new(LocalGameServiceClient::open(":memory:").unwrap()),
        Arc::new(WebStatsClient::new(Arc::new(SignedInPortal), Handle::current())),
    ];
    for client in &clients {
        connect(client.as_ref()).await;
    }
    clients
}

/// Invoke the call guarded by `feature`; returns its synchronous error, if any
fn call_feature(client: &dyn GameServiceClient, feature: GameServiceFeature, fired: &Arc<AtomicUsize>) -> Option<GameServiceError> {
    match feature {
        GameServiceFeature::FetchAchievements => client.fetch_achievements(counting(fired)).err(),
        GameServiceFeature::FetchLeaderboardEntries => client
            .fetch_leaderboard_entries("HighScore", 10, false, counting(fired))
            .err(),
        GameServiceFeature::ShowAchievementsUi => client.show_achievements().err(),
        GameServiceFeature::ShowLeaderboardUi => client.show_leaderboards(Some("HighScore")).err(),
        GameServiceFeature::ShowAllLeaderboardsUi => client.show_leaderboards(None).err(),
        GameServiceFeature::GameStateStorage => {
            let save = client.save_game_state("slot1", vec![1], 0, counting(fired)).err();
            let load = client.load_game_state("slot1", counting(fired)).err();
            assert_eq!(save.is_some(), load.is_some());
            save
        }
        GameServiceFeature::GameStateDelete => client.delete_game_state("slot1", counting(fired)).err(),
        GameServiceFeature::FetchGameStates => client.fetch_game_states(counting(fired)).err(),
        GameServiceFeature::SubmitEvents
        | GameServiceFeature::GameStateMultipleFiles
        | GameServiceFeature::PlayerLogOut => None,
    }
}

#[tokio::test]
async fn test_unsupported_features_rejected_without_response() {
    for client in all_backends().await {
        for feature in GameServiceFeature::ALL {
            if client.is_feature_supported(feature) {
                continue;
            }

            let fired = Arc::new(AtomicUsize::new(0));
            let err = call_feature(client.as_ref(), feature, &fired);
            match feature {
                GameServiceFeature::SubmitEvents => assert!(!client.submit_event("unsupported_event", 1)),
                GameServiceFeature::GameStateMultipleFiles | GameServiceFeature::PlayerLogOut => {
                    assert!(err.is_none())
                }
                _ => {
                    let err = err.unwrap_or_else(|| {
                        panic!("{} {:?}: unsupported call accepted", client.game_service_id(), feature)
                    });
                    assert!(
                        err.is_not_supported(),
                        "{} {:?}: expected NotSupported, got {}",
                        client.game_service_id(),
                        feature,
                        err
                    );
                    assert_eq!(err.kind(), ErrorKind::NotSupported);
                }
            }

            tokio::time::sleep(Duration::from_millis(10)).await;
            assert_eq!(fired.load(Ordering::SeqCst), 0, "{} {:?}", client.game_service_id(), feature);
        }
    }
}

#[tokio::test]
async fn test_supported_features_match_queries() {
    for client in all_backends().await {
        let supported = client.supported_features();
        for feature in GameServiceFeature::ALL {
            assert_eq!(supported.contains(&feature), client.is_feature_supported(feature));
            assert_eq!(client.ensure_supported(feature).is_ok(), client.is_feature_supported(feature));
        }
    }
}

#[tokio::test]
async fn test_unlock_equals_full_increment() {
    let client = MockGameServiceClient::new(Handle::current());
    assert_eq!(connect(&client).await, ConnectionEvent::Connected);

    assert!(client.unlock_achievement("BeatBoss"));
    assert!(client.increment_achievement("Collector", 1, 1.0));

    let unlocked = client.achievement("BeatBoss").unwrap();
    let incremented = client.achievement("Collector").unwrap();
    assert!(unlocked.is_unlocked());
    assert!(incremented.is_unlocked());
    assert_eq!(unlocked.completion_percentage(), incremented.completion_percentage());
}

#[tokio::test]
async fn test_connect_while_pending_starts_no_second_attempt() {
    let client = MockGameServiceClient::new(Handle::current()).with_latency(Duration::from_millis(50));
    let (listener, mut events) = ChannelListener::channel();
    client.set_listener(listener);

    assert!(!client.connect(true));
    assert!(client.is_connection_pending());
    assert!(!client.connect(false));
    assert_eq!(client.backend_calls(), 1);

    assert_eq!(events.recv().await, Some(ConnectionEvent::Connected));
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(events.try_recv().is_err());
    assert!(client.is_connected());
}

#[tokio::test]
async fn test_not_connected_submits_nothing() {
    let mock = MockGameServiceClient::new(Handle::current());
    assert!(!mock.submit_to_leaderboard("HighScore", 100, None));
    assert!(!mock.submit_event("coins", 1));
    assert!(!mock.unlock_achievement("BeatBoss"));
    assert_eq!(mock.backend_calls(), 0);

    let local = LocalGameServiceClient::open(":memory:").unwrap();
    assert!(!local.submit_to_leaderboard("HighScore", 100, None));
}

#[tokio::test]
async fn test_fetch_respects_limit() {
    let mut client = MockGameServiceClient::new(Handle::current()).with_player("p10", "Player 10");
    for i in 0..20 {
        let id = format!("p{}", i);
        client = client.with_score("HighScore", &format!("Player {}", i), Some(id.as_str()), i * 100);
    }
    assert_eq!(connect(&client).await, ConnectionEvent::Connected);

    let (response, rx) = Response::channel();
    assert!(client.fetch_leaderboard_entries("HighScore", 5, false, response).unwrap());
    let top = rx.await.unwrap().unwrap();
    assert_eq!(top.len(), 5);
    assert!(top.iter().all(|e| !e.formatted_value().is_empty()));
    assert_eq!(top[0].sort_value(), 1900);
    assert_eq!(top[0].score_rank(), Some(1));

    let (response, rx) = Response::channel();
    assert!(client.fetch_leaderboard_entries("HighScore", 5, true, response).unwrap());
    let around = rx.await.unwrap().unwrap();
    assert_eq!(around.len(), 5);
    assert!(around.iter().any(|e| e.user_id() == Some("p10")));

    let (response, rx) = Response::channel();
    client.fetch_leaderboard_entries("HighScore", 0, false, response).unwrap();
    assert!(rx.await.unwrap().unwrap().is_empty());
}

#[tokio::test]
async fn test_guest_entry_is_not_an_error() {
    let client = MockGameServiceClient::new(Handle::current())
        .with_score("HighScore", "Guest", None, 500)
        .with_score("HighScore", "Alice", Some("alice"), 300);
    assert_eq!(connect(&client).await, ConnectionEvent::Connected);

    let (response, rx) = Response::channel();
    client.fetch_leaderboard_entries("HighScore", 10, false, response).unwrap();
    let entries = rx.await.unwrap().unwrap();

    assert_eq!(entries.len(), 2);
    assert!(entries[0].is_guest());
    assert_eq!(entries[0].user_id(), None);
    assert_eq!(entries[0].user_display_name(), "Guest");
    assert!(!entries[1].is_guest());
}

#[tokio::test]
async fn test_every_call_answers_exactly_once() {
    let client = MockGameServiceClient::new(Handle::current()).with_latency(Duration::from_millis(20));

    // rejected: not connected
    let not_connected = Arc::new(AtomicUsize::new(0));
    assert!(!client.fetch_achievements(counting(&not_connected)).unwrap());
    assert_eq!(not_connected.load(Ordering::SeqCst), 1);

    assert_eq!(connect(&client).await, ConnectionEvent::Connected);

    // accepted, then a same-kind call while the first is pending
    let first = Arc::new(AtomicUsize::new(0));
    let second = Arc::new(AtomicUsize::new(0));
    assert!(client.fetch_achievements(counting(&first)).unwrap());
    assert!(!client.fetch_achievements(counting(&second)).unwrap());
    assert_eq!(second.load(Ordering::SeqCst), 1);

    // different kinds may overlap
    let states = Arc::new(AtomicUsize::new(0));
    assert!(client.fetch_game_states(counting(&states)).unwrap());

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(first.load(Ordering::SeqCst), 1);
    assert_eq!(second.load(Ordering::SeqCst), 1);
    assert_eq!(states.load(Ordering::SeqCst), 1);

    // the slot is free again
    let third = Arc::new(AtomicUsize::new(0));
    assert!(client.fetch_achievements(counting(&third)).unwrap());
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(third.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_pending_rejection_carries_reason() {
    let client = MockGameServiceClient::new(Handle::current()).with_latency(Duration::from_millis(20));
    assert_eq!(connect(&client).await, ConnectionEvent::Connected);

    let (first, first_rx) = Response::channel();
    let (second, second_rx) = Response::channel();
    client.load_game_state("missing", first).unwrap();
    client.load_game_state("missing", second).unwrap();

    assert!(matches!(
        second_rx.await.unwrap(),
        Err(GameServiceError::OperationPending(_))
    ));
    let err = first_rx.await.unwrap().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::LoadFailed);
}

#[tokio::test]
async fn test_null_backend_never_connects() {
    let client = NoGameServiceClient::new();
    assert_eq!(connect(&client).await, ConnectionEvent::Disconnected);
    assert!(!client.is_connected());
    assert!(!client.is_connection_pending());
    assert_eq!(client.player_display_name(), None);
}

#[tokio::test]
async fn test_failed_login_reported_once() {
    let client = MockGameServiceClient::new(Handle::current()).failing_login();
    match connect(&client).await {
        ConnectionEvent::Error { kind, .. } => assert_eq!(kind, ErrorKind::LoginFailed),
        other => panic!("unexpected event {:?}", other),
    }
    assert!(!client.is_connected());
    assert!(!client.is_connection_pending());
}
