use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::{SinkExt, StreamExt};
use portvakt_core::{AlertKind, AlertRecord, BroadcastHub};
use portvakt_engine::SubscriberServer;
use portvakt_telemetry::MetricsRecorder;
use serde_json::{Map, Value};
use tokio::sync::watch;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};

fn record(id: i64) -> AlertRecord {
    let mut details = Map::new();
    details.insert("type".into(), Value::from("PORT_SCAN"));
    details.insert("src".into(), Value::from("10.0.0.5"));
    details.insert("count".into(), Value::from(3));
    details.insert("window_sec".into(), Value::from(10));
    AlertRecord {
        id,
        timestamp: Utc::now(),
        kind: AlertKind::PortScan,
        source: Some("10.0.0.5".into()),
        details,
    }
}

async fn wait_for_subscribers(hub: &BroadcastHub, count: usize) {
    for _ in 0..200 {
        if hub.len() == count {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("hub never reached {count} subscribers (has {})", hub.len());
}

async fn start() -> (
    Arc<BroadcastHub>,
    std::net::SocketAddr,
    watch::Sender<bool>,
    tokio::task::JoinHandle<()>,
) {
    let hub = Arc::new(BroadcastHub::new(16));
    let metrics = Arc::new(MetricsRecorder::new().unwrap());
    let server = SubscriberServer::bind(
        "127.0.0.1:0".parse().unwrap(),
        "/ws/alerts",
        hub.clone(),
        metrics,
    )
    .await
    .unwrap();
    let addr = server.local_addr().unwrap();
    let (stop, stopped) = watch::channel(false);
    let task = tokio::spawn(server.serve(stopped));
    (hub, addr, stop, task)
}

#[tokio::test]
async fn subscribers_receive_wire_messages() {
    let (hub, addr, stop, task) = start().await;

    let (mut first, _) = connect_async(format!("ws://{addr}/ws/alerts")).await.unwrap();
    let (mut second, _) = connect_async(format!("ws://{addr}/ws/alerts")).await.unwrap();
    wait_for_subscribers(&hub, 2).await;

    // Keep-alive text is accepted and ignored.
    first.send(Message::text("ping")).await.unwrap();

    let report = hub.broadcast(&record(7)).unwrap();
    assert_eq!(report.delivered, 2);

    for client in [&mut first, &mut second] {
        let message = client.next().await.unwrap().unwrap();
        let wire: Value = serde_json::from_str(message.to_text().unwrap()).unwrap();
        assert_eq!(wire["id"], 7);
        assert_eq!(wire["type"], "PORT_SCAN");
        assert_eq!(wire["src"], "10.0.0.5");
        assert_eq!(wire["details"]["count"], 3);
        assert!(wire["ts"].as_str().unwrap().ends_with('Z'));
    }

    stop.send(true).unwrap();
    task.await.unwrap();
}

#[tokio::test]
async fn closed_session_leaves_the_hub() {
    let (hub, addr, stop, task) = start().await;

    let (mut leaving, _) = connect_async(format!("ws://{addr}/ws/alerts")).await.unwrap();
    let (mut staying, _) = connect_async(format!("ws://{addr}/ws/alerts")).await.unwrap();
    wait_for_subscribers(&hub, 2).await;

    leaving.close(None).await.unwrap();
    wait_for_subscribers(&hub, 1).await;

    let report = hub.broadcast(&record(1)).unwrap();
    assert_eq!(report.delivered, 1);
    let message = staying.next().await.unwrap().unwrap();
    assert!(message.is_text());

    stop.send(true).unwrap();
    task.await.unwrap();
}

#[tokio::test]
async fn other_paths_are_refused() {
    let (hub, addr, stop, task) = start().await;

    match connect_async(format!("ws://{addr}/elsewhere")).await {
        Err(WsError::Http(response)) => assert_eq!(response.status(), 404),
        Err(e) => panic!("expected a 404 refusal, got {e}"),
        Ok(_) => panic!("handshake on an unknown path succeeded"),
    }
    assert!(hub.is_empty());

    stop.send(true).unwrap();
    task.await.unwrap();
}
