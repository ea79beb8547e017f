//! End-to-end scenarios over real TCP sockets (spec §8).

use mos_protocol::Framer;
use mos_protocol::messages::{Message, NcsReqStoryAction, RoStorySend, StoryBody};
use mos_server::config::Config;
use mos_server::events::EventBus;
use mos_server::repository::memory::InMemoryRepository;
use mos_server::server::Server;
use mos_server::service::MosService;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio_util::sync::CancellationToken;

async fn spawn_server() -> (
    std::net::SocketAddr,
    CancellationToken,
    tokio::task::JoinHandle<()>,
) {
    let mut config = Config::default();
    config.server.port = 0;
    config.mos.client_timeout = Duration::from_millis(300);
    config.mos.heartbeat_interval = Duration::from_millis(50);

    let events = EventBus::new();
    let repo = Arc::new(InMemoryRepository::new());
    let service = MosService::new(repo, events.clone(), config.mos.id.clone());
    let server = Server::new(config, service, events);

    let listener = server.bind().await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = CancellationToken::new();
    let server_shutdown = shutdown.clone();
    let handle = tokio::spawn(async move {
        server.serve(listener, server_shutdown).await.unwrap();
    });
    (addr, shutdown, handle)
}

/// A raw MOS client wrapping a socket and the leftover bytes of whatever
/// hasn't been parsed into a message yet, mirroring the server's own framer.
struct Client {
    stream: TcpStream,
    framer: Framer,
}

impl Client {
    async fn connect(addr: std::net::SocketAddr) -> Self {
        Self {
            stream: TcpStream::connect(addr).await.unwrap(),
            framer: Framer::new(),
        }
    }

    async fn send(&mut self, xml: &str) {
        self.stream.write_all(xml.as_bytes()).await.unwrap();
    }

    async fn read_one(&mut self) -> Message {
        let mut buf = [0u8; 4096];
        loop {
            if self.framer.has_complete_message() {
                return self.framer.parse().unwrap();
            }
            let n = tokio::time::timeout(Duration::from_millis(500), self.stream.read(&mut buf))
                .await
                .expect("timed out waiting for a reply")
                .unwrap();
            assert!(n > 0, "peer closed before a full message arrived");
            self.framer.append(&buf[..n]);
        }
    }

    /// Reads messages until one satisfies `pred`, discarding any others (used
    /// where a client may also observe its own pub/sub push alongside a
    /// direct request/response reply).
    async fn read_until(&mut self, pred: impl Fn(&Message) -> bool) -> Message {
        for _ in 0..10 {
            let message = self.read_one().await;
            if pred(&message) {
                return message;
            }
        }
        panic!("no matching message arrived after 10 reads");
    }
}

#[tokio::test]
async fn heartbeat_echo() {
    let (addr, shutdown, _server) = spawn_server().await;
    let mut client = Client::connect(addr).await;

    client
        .send(r#"<heartbeat requestID="H1" source="ncs1"/>"#)
        .await;
    match client.read_one().await {
        Message::Heartbeat(hb) => assert_eq!(hb.request_id.as_deref(), Some("H1")),
        other => panic!("expected heartbeat, got {other:?}"),
    }

    shutdown.cancel();
}

#[tokio::test]
async fn create_then_list() {
    let (addr, shutdown, _server) = spawn_server().await;
    let mut client = Client::connect(addr).await;

    client
        .send("<roCreate><roID>RO42</roID><roSlug>Evening</roSlug><roDur>1800</roDur></roCreate>")
        .await;
    match client.read_one().await {
        Message::MosAck(ack) => assert_eq!(ack.status, "ACK"),
        other => panic!("expected mosAck, got {other:?}"),
    }

    client.send(r#"<roReq requestID="Q1"/>"#).await;
    match client
        .read_until(|m| matches!(m, Message::RunningOrderList(_)))
        .await
    {
        Message::RunningOrderList(list) => {
            assert!(list.running_orders.iter().any(|ro| ro.id == "RO42"));
        }
        other => panic!("expected roList, got {other:?}"),
    }

    shutdown.cancel();
}

#[tokio::test]
async fn upsert_idempotence() {
    let (addr, shutdown, _server) = spawn_server().await;
    let mut client = Client::connect(addr).await;

    let ro_create =
        "<roCreate><roID>RO7</roID><roSlug>Morning</roSlug><roDur>900</roDur></roCreate>";
    client.send(ro_create).await;
    client.read_until(|m| matches!(m, Message::MosAck(_))).await;
    client.send(ro_create).await;
    client.read_until(|m| matches!(m, Message::MosAck(_))).await;

    client.send(r#"<roReq requestID="Q2"/>"#).await;
    match client
        .read_until(|m| matches!(m, Message::RunningOrderList(_)))
        .await
    {
        Message::RunningOrderList(list) => {
            let matches: Vec<_> = list
                .running_orders
                .iter()
                .filter(|ro| ro.id == "RO7")
                .collect();
            assert_eq!(matches.len(), 1);
        }
        other => panic!("expected roList, got {other:?}"),
    }

    shutdown.cancel();
}

#[tokio::test]
async fn fan_out_push_to_uninvolved_client() {
    let (addr, shutdown, _server) = spawn_server().await;
    let mut client_a = Client::connect(addr).await;
    let mut client_b = Client::connect(addr).await;
    tokio::time::sleep(Duration::from_millis(20)).await;

    client_a
        .send("<roCreate><roID>RO7</roID><roSlug>Evening</roSlug><roDur>1800</roDur></roCreate>")
        .await;
    client_a
        .read_until(|m| matches!(m, Message::MosAck(_)))
        .await;

    match client_b
        .read_until(|m| matches!(m, Message::RunningOrderInfo(_)))
        .await
    {
        Message::RunningOrderInfo(info) => assert_eq!(info.id, "RO7"),
        other => panic!("expected unsolicited roCreate push, got {other:?}"),
    }

    shutdown.cancel();
}

#[tokio::test]
async fn malformed_frame_survival() {
    let (addr, shutdown, _server) = spawn_server().await;
    let mut client = Client::connect(addr).await;

    client
        .send(r#"<heartbeat requestID="H0"/>@@@<heartbeat requestID="H2"/>"#)
        .await;

    match client.read_one().await {
        Message::Heartbeat(hb) => assert_eq!(hb.request_id.as_deref(), Some("H0")),
        other => panic!("expected heartbeat H0, got {other:?}"),
    }
    match client.read_one().await {
        Message::Heartbeat(hb) => assert_eq!(hb.request_id.as_deref(), Some("H2")),
        other => panic!("expected heartbeat H2, got {other:?}"),
    }

    // the garbage between them did not close the session
    client.send(r#"<heartbeat requestID="H3"/>"#).await;
    match client.read_one().await {
        Message::Heartbeat(hb) => assert_eq!(hb.request_id.as_deref(), Some("H3")),
        other => panic!("expected heartbeat H3, got {other:?}"),
    }

    shutdown.cancel();
}

#[tokio::test]
async fn graceful_shutdown_closes_connected_clients() {
    let (addr, shutdown, server) = spawn_server().await;
    let mut clients = Vec::new();
    for _ in 0..3 {
        clients.push(TcpStream::connect(addr).await.unwrap());
    }
    tokio::time::sleep(Duration::from_millis(20)).await;

    shutdown.cancel();
    tokio::time::timeout(Duration::from_secs(5), server)
        .await
        .unwrap()
        .unwrap();

    for mut client in clients {
        let mut buf = [0u8; 16];
        let n = client.read(&mut buf).await.unwrap();
        assert_eq!(n, 0, "expected EOF after graceful shutdown");
    }

    assert!(
        TcpStream::connect(addr).await.is_err(),
        "listener should no longer accept"
    );
}

#[tokio::test]
async fn ncs_story_action_acks_with_echoed_username_and_message_id() {
    let (addr, shutdown, _server) = spawn_server().await;
    let mut client = Client::connect(addr).await;

    let action = NcsReqStoryAction {
        operation: "NEW".into(),
        lease_lock: None,
        username: Some("ncs1".into()),
        ro_story_send: RoStorySend {
            ro_id: "RO9".into(),
            story_id: "S1".into(),
            story_slug: "Intro".into(),
            story_num: String::new(),
            story_body: StoryBody::default(),
        },
    };
    client.send(&mos_protocol::encode(&action).unwrap()).await;

    match client.read_until(|m| matches!(m, Message::NcsAck(_))).await {
        Message::NcsAck(ack) => {
            assert_eq!(ack.ncs_id.as_deref(), Some("ncs1"));
            assert_eq!(ack.message_id.as_deref(), Some("1"));
            assert_eq!(ack.status, "ACK");
        }
        other => panic!("expected ncsAck, got {other:?}"),
    }

    shutdown.cancel();
}

#[tokio::test]
async fn ncs_ack_message_id_increments_per_session() {
    let (addr, shutdown, _server) = spawn_server().await;
    let mut client = Client::connect(addr).await;

    for i in 0..2 {
        let action = NcsReqStoryAction {
            operation: "NEW".into(),
            lease_lock: None,
            username: Some("ncs1".into()),
            ro_story_send: RoStorySend {
                ro_id: "RO10".into(),
                story_id: format!("S{i}"),
                story_slug: "Segment".into(),
                story_num: String::new(),
                story_body: StoryBody::default(),
            },
        };
        client.send(&mos_protocol::encode(&action).unwrap()).await;
        match client.read_until(|m| matches!(m, Message::NcsAck(_))).await {
            Message::NcsAck(ack) => assert_eq!(
                ack.message_id.as_deref(),
                Some((i + 1).to_string().as_str())
            ),
            other => panic!("expected ncsAck, got {other:?}"),
        }
    }

    shutdown.cancel();
}
