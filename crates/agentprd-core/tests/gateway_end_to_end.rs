//! The client and the gateway talking over a real local socket.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use agentprd_core::agent::Agent;
use agentprd_core::client::{AgentClient, Conversation};
use agentprd_core::config::{ClientConfig, GatewayConfig};
use agentprd_core::error::ClientError;
use agentprd_core::gateway;
use agentprd_core::kv::{KvStore, MemoryKvStore, namespaces};
use agentprd_core::protocol::{DecoderUpdate, ToolEventKind};
use agentprd_core::providers::{ScriptedProvider, StreamChunk};
use tokio::sync::oneshot;
use warp::Filter;

struct TestGateway {
    addr: SocketAddr,
    kv: Arc<MemoryKvStore>,
    _shutdown: oneshot::Sender<()>,
}

impl TestGateway {
    fn start(provider: ScriptedProvider) -> Self {
        let kv = Arc::new(MemoryKvStore::new());
        let agent = Arc::new(Agent::new(
            Arc::new(provider),
            kv.clone(),
            &GatewayConfig::default(),
        ));
        let (tx, rx) = oneshot::channel::<()>();
        let (addr, server) = gateway::bind(([127, 0, 0, 1], 0).into(), agent, async {
            rx.await.ok();
        })
        .unwrap();
        tokio::spawn(server);
        Self {
            addr,
            kv,
            _shutdown: tx,
        }
    }

    fn client(&self) -> AgentClient {
        AgentClient::new(&ClientConfig {
            gateway_url: format!("http://{}/chat", self.addr),
            timeout_secs: 10,
            ..Default::default()
        })
        .unwrap()
    }
}

fn tool_step(id: &str, name: &str, args: &str) -> Vec<StreamChunk> {
    vec![
        StreamChunk::ToolCallStart {
            index: 0,
            id: id.into(),
            name: name.into(),
        },
        StreamChunk::ToolCallDelta {
            index: 0,
            arguments: args.into(),
        },
    ]
}

#[tokio::test]
async fn streamed_turn_with_tool_call() {
    let gw = TestGateway::start(ScriptedProvider::new(vec![
        tool_step(
            "call-1",
            "store_prd",
            r##"{"title":"Checkout Redesign","content":"# Goals"}"##,
        ),
        vec![
            StreamChunk::Text("Saved ".into()),
            StreamChunk::Text("your PRD.".into()),
        ],
    ]));
    let client = gw.client();
    let mut conv = Conversation::new();

    let mut live_text = String::new();
    let mut tool_kinds = Vec::new();
    let decoded = client
        .send_turn("Save the checkout PRD", &mut conv, |update| match update {
            DecoderUpdate::Text(t) => live_text.push_str(t),
            DecoderUpdate::ToolEvent(e) => tool_kinds.push(e.kind),
            DecoderUpdate::Metadata(_) => {}
        })
        .await
        .unwrap();

    assert_eq!(decoded.content, "Saved your PRD.");
    assert_eq!(live_text, decoded.content);
    assert_eq!(
        tool_kinds,
        vec![
            ToolEventKind::CallStart,
            ToolEventKind::Call,
            ToolEventKind::Result,
            ToolEventKind::StepFinish,
            ToolEventKind::StepFinish,
        ]
    );
    assert!(decoded.active_tool_calls.is_empty());

    let meta = decoded.metadata.unwrap();
    assert_eq!(conv.session_id(), meta.session_id);
    assert_eq!(conv.history().len(), 2);

    let stored = gw.kv.get(namespaces::PRDS, "checkout-redesign").await.unwrap();
    assert!(stored.exists);
}

#[tokio::test]
async fn session_continues_across_turns() {
    let gw = TestGateway::start(ScriptedProvider::echo("echo: "));
    let client = gw.client();
    let mut conv = Conversation::new();
    let provisional = conv.session_id().to_string();

    client.send_turn("first", &mut conv, |_| {}).await.unwrap();
    assert_eq!(conv.session_id(), provisional);
    client.send_turn("second", &mut conv, |_| {}).await.unwrap();

    let contents: Vec<&str> = conv.history().iter().map(|m| m.content.as_str()).collect();
    assert_eq!(contents, vec!["first", "echo: first", "second", "echo: second"]);
}

#[tokio::test]
async fn buffered_turn() {
    let gw = TestGateway::start(ScriptedProvider::echo("you said "));
    let client = gw.client();
    let mut conv = Conversation::with_session("buffered-1");
    let reply = client.send_buffered("hello", &mut conv).await.unwrap();
    assert_eq!(reply.content, "you said hello");
    assert_eq!(reply.session_id, "buffered-1");
    assert_eq!(conv.history().len(), 2);
}

#[tokio::test]
async fn approval_mode_round_trip() {
    let gw = TestGateway::start(ScriptedProvider::new(vec![
        tool_step("c1", "save_note", r#"{"title":"Idea","content":"Dark mode"}"#),
        vec![StreamChunk::Text("Waiting for your approval.".into())],
    ]));
    let mut client = gw.client();
    client.set_approval_mode(true);
    let mut conv = Conversation::new();
    let decoded = client.send_turn("note dark mode", &mut conv, |_| {}).await.unwrap();

    assert!(decoded.metadata.unwrap().needs_approval);
    let stored = gw.kv.get(namespaces::NOTES, "idea").await.unwrap();
    assert!(!stored.exists);
}

/// Serve a bare filter that misbehaves in a way the client must classify.
macro_rules! stub_server {
    ($filter:expr $(,)?) => {{
        let (addr, server) = warp::serve($filter).bind_ephemeral(([127, 0, 0, 1], 0));
        tokio::spawn(server);
        addr
    }};
}

fn client_for(addr: SocketAddr, timeout_secs: u64) -> AgentClient {
    AgentClient::new(&ClientConfig {
        gateway_url: format!("http://{addr}/chat"),
        timeout_secs,
        ..Default::default()
    })
    .unwrap()
}

#[tokio::test]
async fn slow_gateway_times_out_with_specific_message() {
    let addr = stub_server!(warp::path("chat").and_then(|| async {
        tokio::time::sleep(Duration::from_secs(5)).await;
        Ok::<_, warp::Rejection>("too late")
    }));
    let client = client_for(addr, 1);
    let mut conv = Conversation::with_session("s1");

    let err = client.send_turn("hi", &mut conv, |_| {}).await.unwrap_err();
    assert!(matches!(err, ClientError::Timeout(_)), "got {err:?}");
    assert!(err.user_message().contains("timed out after 1 seconds"));
    // Failed turns leave the conversation untouched
    assert_eq!(conv.session_id(), "s1");
    assert!(conv.history().is_empty());
}

#[tokio::test]
async fn rate_limit_and_server_errors_are_classified() {
    let addr = stub_server!(
        warp::path("chat")
            .map(|| warp::reply::with_status("slow down", warp::http::StatusCode::TOO_MANY_REQUESTS)),
    );
    let err = client_for(addr, 5)
        .send_turn("hi", &mut Conversation::new(), |_| {})
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::RateLimited));

    let addr = stub_server!(
        warp::path("chat")
            .map(|| warp::reply::with_status("boom", warp::http::StatusCode::BAD_GATEWAY)),
    );
    let err = client_for(addr, 5)
        .send_turn("hi", &mut Conversation::new(), |_| {})
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Status { code: 502, ref body } if body == "boom"));
}

#[tokio::test]
async fn unreachable_gateway_is_network_error() {
    // Bind and immediately drop a listener to get a closed port
    let addr = std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap();
    let err = client_for(addr, 5)
        .send_turn("hi", &mut Conversation::new(), |_| {})
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Network(_)), "got {err:?}");
    assert!(err.user_message().contains("Could not reach"));
}

#[tokio::test]
async fn truncated_stream_takes_degraded_path() {
    let addr = stub_server!(warp::path("chat").map(|| "partial reply without metadata"));
    let mut conv = Conversation::with_session("s1");
    let decoded = client_for(addr, 5)
        .send_turn("hi", &mut conv, |_| {})
        .await
        .unwrap();
    assert_eq!(decoded.content, "partial reply without metadata");
    assert!(decoded.metadata.is_none());
    assert_ne!(conv.session_id(), "s1");
    assert_eq!(conv.history().len(), 2);
}
