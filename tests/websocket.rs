//! End-to-end tests over real WebSocket connections

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use ws_broker::{Broker, BrokerServer, RegistryConfig, ServerConfig};

type Ws = WebSocketStream<MaybeTlsStream<TcpStream>>;

const WAIT: Duration = Duration::from_secs(5);

async fn start(registry_config: RegistryConfig) -> (SocketAddr, Arc<Broker>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = BrokerServer::with_registry_config(ServerConfig::with_addr(addr), registry_config);
    let broker = Arc::clone(server.broker());

    tokio::spawn(async move {
        server.serve(listener, std::future::pending()).await.unwrap();
    });

    (addr, broker)
}

async fn connect(addr: SocketAddr, path: &str) -> Ws {
    let (ws, _) = connect_async(format!("ws://{}{}", addr, path)).await.unwrap();
    ws
}

async fn wait_for_clients(broker: &Broker, count: usize) {
    tokio::time::timeout(WAIT, async {
        while broker.clients().count().await != count {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("client count never reached");
}

async fn next_text(ws: &mut Ws) -> String {
    loop {
        let message = tokio::time::timeout(WAIT, ws.next())
            .await
            .expect("timed out waiting for a frame")
            .expect("stream ended")
            .expect("read failed");
        if let Message::Text(text) = message {
            return text.as_str().to_owned();
        }
    }
}

#[tokio::test]
async fn relays_between_clients_on_same_channel() {
    let (addr, broker) = start(RegistryConfig::default()).await;
    let mut a = connect(addr, "/t/room").await;
    let mut b = connect(addr, "/t/room").await;
    wait_for_clients(&broker, 2).await;

    a.send(Message::text("hello")).await.unwrap();
    assert_eq!(next_text(&mut b).await, "hello");

    b.send(Message::binary(vec![1u8, 2, 3])).await.unwrap();
    let frame = tokio::time::timeout(WAIT, a.next()).await.unwrap().unwrap().unwrap();
    assert_eq!(frame, Message::binary(vec![1u8, 2, 3]));
}

#[tokio::test]
async fn echo_endpoint_returns_frames() {
    let (addr, _) = start(RegistryConfig::default()).await;
    let mut ws = connect(addr, "/test/echo").await;

    ws.send(Message::text("ping")).await.unwrap();

    assert_eq!(next_text(&mut ws).await, "ping");
}

#[tokio::test]
async fn unknown_path_is_refused() {
    let (addr, _) = start(RegistryConfig::default()).await;

    let result = connect_async(format!("ws://{}/nowhere", addr)).await;

    assert!(result.is_err());
}

#[tokio::test]
async fn over_capacity_connection_gets_notice() {
    let (addr, broker) = start(RegistryConfig::default().max_clients(1)).await;
    let _first = connect(addr, "/t/room").await;
    wait_for_clients(&broker, 1).await;

    let mut second = connect(addr, "/t/room").await;

    assert_eq!(next_text(&mut second).await, ws_broker::client::CAPACITY_NOTICE);
    assert_eq!(broker.clients().count().await, 1);
}

#[tokio::test]
async fn disconnect_detaches_client() {
    let (addr, broker) = start(RegistryConfig::default()).await;
    let mut ws = connect(addr, "/t/room").await;
    wait_for_clients(&broker, 1).await;

    ws.close(None).await.unwrap();

    wait_for_clients(&broker, 0).await;
    assert_eq!(broker.channels().sweep().await, 1);
}

#[tokio::test]
async fn forced_removal_notifies_members() {
    let (addr, broker) = start(RegistryConfig::default()).await;
    let mut ws = connect(addr, "/t/ops").await;
    wait_for_clients(&broker, 1).await;

    broker.remove_channel("ops", "maintenance").await.unwrap();

    let notice = next_text(&mut ws).await;
    assert!(notice.contains("maintenance"));
    assert_eq!(broker.clients().count().await, 0);
    assert!(broker.channels().get("ops").await.is_none());
}
