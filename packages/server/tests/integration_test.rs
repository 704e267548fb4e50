//! Integration tests for the multiplayer server over real HTTP and WebSocket connections.
//!
//! Each test serves the router on an ephemeral port in-process and talks to it with
//! `reqwest` and `tokio-tungstenite`.

use std::{collections::VecDeque, net::SocketAddr, sync::Arc, time::Duration};

use futures_util::{SinkExt, StreamExt};
use hiroba_server::{
    domain::Timestamp,
    infrastructure::{
        database::{InMemoryMultiplayerDatabase, Seed},
        message_pusher::WebSocketMessagePusher,
    },
    ui::{AppState, build_router},
    usecase::{HubOptions, MultiplayerHub},
};
use hiroba_shared::time::FixedClock;
use serde_json::{Value, json};
use tokio::{net::TcpStream, task::JoinHandle};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message};

const TIMEOUT: Duration = Duration::from_secs(5);

const SEED: &str = r#"{
    "beatmaps": [
        {"beatmap_id": 100, "checksum": "checksum-100"},
        {"beatmap_id": 200, "checksum": "checksum-200"}
    ],
    "rooms": [
        {
            "room_id": 1,
            "name": "host only",
            "queue_mode": "host_only",
            "playlist": [{"owner_id": 1, "beatmap_id": 100}]
        },
        {"room_id": 2, "name": "ended", "ended": true}
    ]
}"#;

/// Helper struct to manage the in-process server lifecycle
struct TestServer {
    addr: SocketAddr,
    handle: JoinHandle<()>,
}

impl TestServer {
    /// Start a seeded server on an ephemeral port
    async fn start() -> Self {
        let seed = Seed::from_json(SEED).expect("seed should parse");
        let database = InMemoryMultiplayerDatabase::from_seed(&seed, Timestamp::new(1_700_000_000_000))
            .expect("seed should be valid");
        let hub = Arc::new(MultiplayerHub::new(
            Arc::new(database),
            Arc::new(WebSocketMessagePusher::new()),
            Arc::new(FixedClock::new(1_700_000_000_000)),
            HubOptions::default(),
        ));
        let app = build_router(Arc::new(AppState::new(hub)));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind");
        let addr = listener.local_addr().expect("Failed to get local address");
        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.expect("Server failed");
        });

        TestServer { addr, handle }
    }

    fn http_url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    fn ws_url(&self, user_id: i64) -> String {
        format!("ws://{}/ws?user_id={}", self.addr, user_id)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Helper struct wrapping a WebSocket connection as one user
struct TestClient {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    next_invocation_id: u64,
    /// Events received while waiting for a completion
    events: VecDeque<Value>,
}

impl TestClient {
    async fn connect(server: &TestServer, user_id: i64) -> Self {
        let (stream, _) = connect_async(server.ws_url(user_id))
            .await
            .expect("Failed to connect");
        TestClient {
            stream,
            next_invocation_id: 1,
            events: VecDeque::new(),
        }
    }

    async fn send_text(&mut self, text: String) {
        self.stream
            .send(Message::Text(text.into()))
            .await
            .expect("Failed to send");
    }

    async fn recv_json(&mut self) -> Value {
        loop {
            let msg = tokio::time::timeout(TIMEOUT, self.stream.next())
                .await
                .expect("Timed out waiting for a message")
                .expect("Connection closed")
                .expect("WebSocket error");
            if let Message::Text(text) = msg {
                return serde_json::from_str(text.as_str()).expect("Invalid JSON from server");
            }
        }
    }

    /// Wait for the next completion, buffering any events that arrive first
    async fn recv_completion(&mut self) -> Value {
        loop {
            let msg = self.recv_json().await;
            match msg["type"].as_str() {
                Some("completion") => return msg,
                Some("event") => self.events.push_back(msg["event"].clone()),
                other => panic!("Unexpected message type: {:?}", other),
            }
        }
    }

    /// Invoke a hub method and return its completion
    async fn invoke(&mut self, method: &str, params: Value) -> Value {
        let invocation_id = self.next_invocation_id;
        self.next_invocation_id += 1;

        let request = if params.is_null() {
            json!({"method": method})
        } else {
            json!({"method": method, "params": params})
        };
        self.send_text(json!({"invocation_id": invocation_id, "request": request}).to_string())
            .await;

        let completion = self.recv_completion().await;
        assert_eq!(completion["invocation_id"], json!(invocation_id));
        completion
    }

    /// Next event, either buffered or freshly received
    async fn next_event(&mut self) -> Value {
        if let Some(event) = self.events.pop_front() {
            return event;
        }
        let msg = self.recv_json().await;
        assert_eq!(msg["type"], "event", "Expected an event, got {}", msg);
        msg["event"].clone()
    }

    /// Names of all events buffered so far
    fn drain_event_names(&mut self) -> Vec<String> {
        self.events
            .drain(..)
            .filter_map(|event| event["name"].as_str().map(str::to_string))
            .collect()
    }
}

#[tokio::test]
async fn test_health_check() {
    // テスト項目: ヘルスチェックがルーム数と接続ユーザー数を返す
    // given (前提条件):
    let server = TestServer::start().await;

    // when (操作):
    let response = reqwest::get(server.http_url("/api/health")).await.unwrap();

    // then (期待する結果):
    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["rooms"], 0);
    assert_eq!(body["active_users"], 0);
}

#[tokio::test]
async fn test_rooms_endpoints_reflect_joined_room() {
    // テスト項目: 参加されたルームが一覧と詳細に現れ、未知のルームは 404 になる
    // given (前提条件):
    let server = TestServer::start().await;
    let mut alice = TestClient::connect(&server, 1).await;
    let completion = alice.invoke("JoinRoom", json!({"room_id": 1})).await;
    assert!(completion.get("error").is_none(), "{}", completion);

    // when (操作):
    let rooms: Value = reqwest::get(server.http_url("/api/rooms"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let detail = reqwest::get(server.http_url("/api/rooms/1")).await.unwrap();
    let missing = reqwest::get(server.http_url("/api/rooms/99")).await.unwrap();

    // then (期待する結果):
    assert_eq!(rooms.as_array().unwrap().len(), 1);
    assert_eq!(rooms[0]["room_id"], 1);
    assert_eq!(rooms[0]["host"], 1);
    assert_eq!(rooms[0]["users"], json!([1]));

    assert_eq!(detail.status(), 200);
    let detail: Value = detail.json().await.unwrap();
    assert_eq!(detail["name"], "host only");
    assert_eq!(detail["queue_mode"], "host_only");
    assert_eq!(detail["current_playlist_item_id"], 1);
    assert_eq!(detail["users"][0]["state"], "Idle");
    assert_eq!(detail["playlist"][0]["beatmap_id"], 100);

    assert_eq!(missing.status(), 404);
}

#[tokio::test]
async fn test_join_room_returns_room_and_notifies_others() {
    // テスト項目: ルームへの参加でルームが返り、既存のメンバーに UserJoined が届く
    // given (前提条件):
    let server = TestServer::start().await;
    let mut alice = TestClient::connect(&server, 1).await;
    alice.invoke("JoinRoom", json!({"room_id": 1})).await;

    // when (操作):
    let mut bob = TestClient::connect(&server, 2).await;
    let completion = bob.invoke("JoinRoom", json!({"room_id": 1})).await;

    // then (期待する結果):
    let room = &completion["result"];
    assert_eq!(room["room_id"], 1);
    assert_eq!(room["host"], 1);
    assert_eq!(room["users"].as_array().unwrap().len(), 2);

    let event = alice.next_event().await;
    assert_eq!(event["name"], "UserJoined");
    assert_eq!(event["args"]["user"]["user_id"], 2);
}

#[tokio::test]
async fn test_invalid_call_reports_invalid_state() {
    // テスト項目: 不正な呼び出しは invalid_state のエラーで完了する
    // given (前提条件):
    let server = TestServer::start().await;
    let mut alice = TestClient::connect(&server, 1).await;

    // when (操作):
    let leave = alice.invoke("LeaveRoom", Value::Null).await;
    let ended = alice.invoke("JoinRoom", json!({"room_id": 2})).await;

    // then (期待する結果):
    assert_eq!(leave["error"]["kind"], "invalid_state");
    assert!(leave.get("result").is_none());
    assert_eq!(ended["error"]["kind"], "invalid_state");
}

#[tokio::test]
async fn test_malformed_message_reports_invalid_request() {
    // テスト項目: 解釈できないメッセージは invalid_request で完了し、接続は維持される
    // given (前提条件):
    let server = TestServer::start().await;
    let mut alice = TestClient::connect(&server, 1).await;

    // when (操作):
    alice.send_text("not json".to_string()).await;
    let completion = alice.recv_completion().await;

    // then (期待する結果):
    assert_eq!(completion["invocation_id"], Value::Null);
    assert_eq!(completion["error"]["kind"], "invalid_request");

    let join = alice.invoke("JoinRoom", json!({"room_id": 1})).await;
    assert_eq!(join["result"]["room_id"], 1);
}

#[tokio::test]
async fn test_disconnect_removes_user_from_room() {
    // テスト項目: 切断したユーザーはルームから外れ、残りのメンバーに UserLeft と HostChanged が届く
    // given (前提条件):
    let server = TestServer::start().await;
    let mut alice = TestClient::connect(&server, 1).await;
    alice.invoke("JoinRoom", json!({"room_id": 1})).await;
    let mut bob = TestClient::connect(&server, 2).await;
    bob.invoke("JoinRoom", json!({"room_id": 1})).await;

    // when (操作):
    alice.stream.close(None).await.unwrap();

    // then (期待する結果):
    let left = bob.next_event().await;
    assert_eq!(left["name"], "UserLeft");
    assert_eq!(left["args"]["user"]["user_id"], 1);

    let host_changed = bob.next_event().await;
    assert_eq!(host_changed["name"], "HostChanged");
    assert_eq!(host_changed["args"]["user_id"], 2);
}

#[tokio::test]
async fn test_sole_member_plays_a_match() {
    // テスト項目: 1 人のルームで試合を始めて結果発表まで進む
    // given (前提条件):
    let server = TestServer::start().await;
    let mut alice = TestClient::connect(&server, 1).await;
    alice.invoke("JoinRoom", json!({"room_id": 1})).await;

    // when (操作):
    alice.invoke("ChangeState", json!({"state": "Ready"})).await;
    let start = alice.invoke("StartMatch", Value::Null).await;
    alice.invoke("ChangeState", json!({"state": "Loaded"})).await;
    let finish = alice.invoke("ChangeState", json!({"state": "FinishedPlay"})).await;

    // then (期待する結果):
    assert_eq!(start["result"], Value::Null);
    assert!(finish.get("error").is_none(), "{}", finish);
    assert_eq!(
        alice.drain_event_names(),
        vec![
            "UserStateChanged",
            "UserStateChanged",
            "RoomStateChanged",
            "LoadRequested",
            "UserStateChanged",
            "UserStateChanged",
            "RoomStateChanged",
            "MatchStarted",
            "UserStateChanged",
            "RoomStateChanged",
            "ResultsReady",
        ]
    );

    let detail: Value = reqwest::get(server.http_url("/api/rooms/1"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(detail["state"], "Idle");
    assert_eq!(detail["playlist"][0]["expired"], true);
}
