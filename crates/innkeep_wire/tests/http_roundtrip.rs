//! End-to-end tests: HTTP client against the in-memory endpoint served over TCP.

use innkeep_wire::{
    serve, ClientConfig, HttpQueryClient, MemorySqlServer, QueryClient, QueryRequest, WireError,
};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

async fn start() -> (Arc<MemorySqlServer>, HttpQueryClient) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap();
    let server = Arc::new(MemorySqlServer::new());
    tokio::spawn(serve(listener, Arc::clone(&server)));

    let config = ClientConfig::new(format!("http://{address}"))
        .with_request_timeout(Duration::from_secs(5));
    (server, HttpQueryClient::new(config).unwrap())
}

#[tokio::test]
async fn health_and_queries_over_http() {
    let (_server, client) = start().await;
    client.health().await.unwrap();

    client
        .execute(&QueryRequest::new(
            "CREATE TABLE IF NOT EXISTS expenses (id INTEGER PRIMARY KEY AUTOINCREMENT, category)",
        ))
        .await
        .unwrap();

    let inserted = client
        .execute(&QueryRequest::with_params(
            "INSERT INTO expenses (category, amount) VALUES (?, ?)",
            vec![json!("listrik"), json!(250000)],
        ))
        .await
        .unwrap();
    assert_eq!(inserted.inserted_id(), Some(&json!(1)));

    let rows = client
        .execute(&QueryRequest::with_params(
            "SELECT * FROM expenses WHERE category = ?",
            vec![json!("listrik")],
        ))
        .await
        .unwrap()
        .into_rows();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["amount"], json!(250000));
}

#[tokio::test]
async fn query_errors_come_back_as_query_errors() {
    let (_server, client) = start().await;
    let err = client
        .execute(&QueryRequest::new("SELECT * FROM missing"))
        .await
        .unwrap_err();
    assert!(matches!(err, WireError::Query(ref m) if m == "no such table: missing"));
}

#[tokio::test]
async fn offline_endpoint_fails_health() {
    let (server, client) = start().await;
    server.set_available(false);

    let err = client.health().await.unwrap_err();
    assert!(matches!(err, WireError::Status { status: 503, .. }));

    server.set_available(true);
    client.health().await.unwrap();
}

#[tokio::test]
async fn refused_connection_is_a_transport_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap();
    drop(listener);

    let client = HttpQueryClient::new(ClientConfig::new(format!("http://{address}"))).unwrap();
    let err = client.health().await.unwrap_err();
    assert!(err.is_retryable());
}
