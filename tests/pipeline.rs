//! End-to-end tests for the window -> relay -> ingestion -> query pipeline.
//!
//! Both tiers run on ephemeral localhost ports.

use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use bearwatch::domain::{PacketRecord, Protocol, StoredPacket};
use bearwatch::error::{RelayError, StoreError};
use bearwatch::ingest::IngestionService;
use bearwatch::query::QueryService;
use bearwatch::relay::{RelayOutcome, RelayScheduler};
use bearwatch::routes::{self, StoreState};
use bearwatch::store::{MemoryStore, PacketStore};
use bearwatch::window::PacketWindow;
use serde_json::{json, Value};
use tokio::net::TcpListener;

async fn serve(app: axum::Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

async fn start_store() -> (Arc<MemoryStore>, SocketAddr) {
    let store = Arc::new(MemoryStore::new());
    let state = StoreState::new(
        IngestionService::new(store.clone()),
        QueryService::new(store.clone()),
    );
    let addr = serve(routes::store_router(state)).await;
    (store, addr)
}

fn record(length: u32, protocol: Protocol) -> PacketRecord {
    PacketRecord::new(
        length,
        Ipv4Addr::new(192, 168, 0, 102),
        Ipv4Addr::new(20, 198, 210, 174),
        protocol,
        1693,
        443,
    )
}

fn relay_to(window: Arc<PacketWindow>, addr: SocketAddr) -> RelayScheduler {
    RelayScheduler::new(
        window,
        format!("http://{}/save-packets", addr),
        Duration::from_secs(5),
        Duration::from_secs(2),
    )
    .unwrap()
}

async fn get_all(addr: SocketAddr) -> Vec<Value> {
    let body: Value = reqwest::get(format!("http://{}/get-all-packets", addr))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    body["packets"]["results"].as_array().unwrap().clone()
}

#[tokio::test]
async fn relay_tick_delivers_window_to_store() {
    let (store, addr) = start_store().await;

    let window = Arc::new(PacketWindow::new());
    window.append(record(60, Protocol::Tcp));
    window.append(record(1500, Protocol::Udp));
    window.append(record(74, Protocol::Tcp));

    let relay = relay_to(Arc::clone(&window), addr);
    assert_eq!(relay.tick().await.unwrap(), RelayOutcome::Delivered(3));
    assert_eq!(store.len().unwrap(), 3);

    let results = get_all(addr).await;
    assert_eq!(results.len(), 3);

    let lengths: Vec<u64> = results.iter().map(|r| r["length"].as_u64().unwrap()).collect();
    assert_eq!(lengths, vec![60, 1500, 74]);
    assert_eq!(results[1]["protocol"], "UDP");
    assert_eq!(results[1]["srcaddr"], "192.168.0.102");
    for r in &results {
        assert!(r["id"].as_u64().is_some());
    }
}

#[tokio::test]
async fn unreachable_store_does_not_break_relay() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let dead = listener.local_addr().unwrap();
    drop(listener);

    let window = Arc::new(PacketWindow::new());
    window.append(record(60, Protocol::Tcp));
    let relay = relay_to(Arc::clone(&window), dead);

    assert!(matches!(relay.tick().await, Err(RelayError::Transport(_))));
    // The next tick proceeds normally
    assert!(matches!(relay.tick().await, Err(RelayError::Transport(_))));
    assert_eq!(window.len(), 1);
}

#[tokio::test]
async fn repeated_batches_are_not_deduplicated() {
    let (store, addr) = start_store().await;

    let window = Arc::new(PacketWindow::new());
    window.append(record(60, Protocol::Tcp));
    window.append(record(61, Protocol::Tcp));

    let relay = relay_to(window, addr);
    relay.tick().await.unwrap();
    relay.tick().await.unwrap();

    let all = store.all().unwrap();
    assert_eq!(all.len(), 4);
    assert_eq!(all[0].record, all[2].record);
    assert_ne!(all[0].id, all[2].id);
}

#[tokio::test]
async fn save_packets_acknowledges_partial_batch() {
    let (store, addr) = start_store().await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("http://{}/save-packets", addr))
        .json(&json!([
            {"length": "66", "srcaddr": "10.0.0.1", "dstaddr": "10.0.0.2",
             "protocol": "TCP", "srcport": "443", "dstport": "51000"},
            {"length": 66, "srcaddr": "10.0.0.1", "dstaddr": "10.0.0.2",
             "protocol": "ICMP", "srcport": 0, "dstport": 0}
        ]))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body, json!({"message": "saved"}));
    assert_eq!(store.len().unwrap(), 1);
}

/// Store that has lost its backing storage.
struct FailingStore;

impl PacketStore for FailingStore {
    fn append(&self, _packet: StoredPacket) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("store offline".to_string()))
    }

    fn all(&self) -> Result<Vec<StoredPacket>, StoreError> {
        Ok(Vec::new())
    }

    fn len(&self) -> Result<usize, StoreError> {
        Ok(0)
    }
}

#[tokio::test]
async fn store_failure_is_reported_to_relay() {
    let store: Arc<dyn PacketStore> = Arc::new(FailingStore);
    let state = StoreState::new(
        IngestionService::new(Arc::clone(&store)),
        QueryService::new(store),
    );
    let addr = serve(routes::store_router(state)).await;

    let window = Arc::new(PacketWindow::new());
    window.append(record(60, Protocol::Tcp));
    window.append(record(61, Protocol::Udp));

    let relay = relay_to(Arc::clone(&window), addr);
    assert!(matches!(
        relay.tick().await,
        Err(RelayError::Rejected { status: 503 })
    ));
    assert_eq!(window.len(), 2);
}

#[tokio::test]
async fn save_packets_rejects_non_array_body() {
    let (store, addr) = start_store().await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("http://{}/save-packets", addr))
        .json(&json!({"length": 66}))
        .send()
        .await
        .unwrap();

    assert!(response.status().is_client_error());
    assert!(store.is_empty().unwrap());
}

#[tokio::test]
async fn info_and_cors() {
    let (_store, addr) = start_store().await;

    let client = reqwest::Client::new();
    let response = client
        .get(format!("http://{}/info", addr))
        .header("origin", "http://localhost:8080")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(response.headers()["access-control-allow-origin"], "*");
    let body: Value = response.json().await.unwrap();
    assert_eq!(body, json!({"message": "database server"}));

    let preflight = client
        .request(
            reqwest::Method::OPTIONS,
            format!("http://{}/save-packets", addr),
        )
        .header("origin", "http://localhost:8080")
        .header("access-control-request-method", "POST")
        .header("access-control-request-headers", "content-type")
        .send()
        .await
        .unwrap();
    assert!(preflight.status().is_success());
    assert_eq!(preflight.headers()["access-control-allow-origin"], "*");
    assert!(preflight
        .headers()
        .contains_key("access-control-allow-methods"));
}

#[tokio::test]
async fn capture_tier_serves_window() {
    let window = Arc::new(PacketWindow::new());
    for length in 1..=150 {
        window.append(record(length, Protocol::Tcp));
    }
    let addr = serve(routes::capture_router(Arc::clone(&window))).await;

    let body: Value = reqwest::get(format!("http://{}/packets", addr))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    let records = body.as_array().unwrap();
    assert_eq!(records.len(), 100);
    assert_eq!(records[0]["length"], 51);
    assert_eq!(records[99]["length"], 150);
    assert!(records[0].get("id").is_none());
}
