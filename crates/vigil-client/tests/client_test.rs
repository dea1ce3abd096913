//! Client against a live server on an ephemeral port.

use vigil_client::InsightClient;
use vigil_core::{
    CheckRequest, EngagementLevel, Exchange, InsightSource, Resolution, ResolveOutcome,
    SignalCategory, VigilError,
};
use vigil_server::{create_server, AppState};

async fn spawn_server() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = create_server(AppState::in_memory());
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

#[tokio::test]
async fn test_ingest_check_resolve_round_trip() {
    let client = InsightClient::new(&spawn_server().await).unwrap();

    let entries = client
        .ingest_exchange(&Exchange::new(
            "team/alpha",
            "Actually, I meant the other approach",
            "conv-1",
        ))
        .await
        .unwrap();
    assert!(entries
        .iter()
        .any(|e| e.category() == SignalCategory::Contradiction));

    let peeked = client
        .check(&CheckRequest::new("team/alpha", 120, EngagementLevel::Idle))
        .await
        .unwrap();
    let entry = peeked.insight.unwrap();
    assert_eq!(entry.workspace_id, "team/alpha");

    let deep = client
        .check(&CheckRequest::new("team/alpha", 120, EngagementLevel::Deep))
        .await
        .unwrap();
    assert!(!deep.has_insight);

    // Through the trait, as a bubble session would call it.
    let source: &dyn InsightSource = &client;
    assert_eq!(
        source.resolve(entry.id, Resolution::Delivered).await.unwrap(),
        ResolveOutcome::MarkedDelivered
    );
    assert_eq!(
        source.resolve(entry.id, Resolution::Dismissed).await.unwrap(),
        ResolveOutcome::Resolved
    );
    assert_eq!(
        client.resolve(entry.id, Resolution::Dismissed).await.unwrap(),
        ResolveOutcome::AlreadyResolved
    );

    let open = client.list("team/alpha", false).await.unwrap();
    assert!(open.iter().all(|e| e.id != entry.id));
    let all = client.list("team/alpha", true).await.unwrap();
    assert!(all.iter().any(|e| e.id == entry.id && e.is_resolved()));
}

#[tokio::test]
async fn test_server_errors_map_to_vigil_errors() {
    let client = InsightClient::new(&spawn_server().await).unwrap();
    let err = client
        .ingest_exchange(&Exchange::new("", "I'll send it tomorrow", "c"))
        .await
        .unwrap_err();
    match err {
        VigilError::Validation { message, .. } => assert!(message.contains("workspace_id")),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_unreachable_server_is_network_error() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let client = InsightClient::new(&format!("http://127.0.0.1:{}", port)).unwrap();
    let err = client
        .check(&CheckRequest::new("ws", 0, EngagementLevel::Idle))
        .await
        .unwrap_err();
    assert!(matches!(err, VigilError::Network { .. }));
}
