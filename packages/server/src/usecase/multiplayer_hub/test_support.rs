//! MultiplayerHub のテスト用の部品

use std::sync::Arc;

use async_trait::async_trait;
use hiroba_shared::time::FixedClock;
use tokio::sync::Mutex;

use super::{HubOptions, MultiplayerHub};
use crate::{
    domain::{
        ClientEvent, ConnectionId, MessagePushError, MessagePusher, MultiplayerDatabase,
        PusherChannel, Timestamp, UserId,
    },
    infrastructure::database::{InMemoryMultiplayerDatabase, Seed},
    usecase::stateful_user_hub::HubCallerContext,
};

pub const NOW: i64 = 1_700_000_000_000;

pub const HOST_ONLY_ROOM: i64 = 1;
pub const ALL_PLAYERS_ROOM: i64 = 2;
pub const ENDED_ROOM: i64 = 3;
pub const EMPTY_ROOM: i64 = 4;

const SEED: &str = r#"{
    "beatmaps": [
        {"beatmap_id": 100, "checksum": "checksum-100"},
        {"beatmap_id": 200, "checksum": "checksum-200"},
        {"beatmap_id": 300, "checksum": "checksum-300"}
    ],
    "rooms": [
        {
            "room_id": 1,
            "name": "host only",
            "queue_mode": "host_only",
            "playlist": [{"owner_id": 1, "beatmap_id": 100}]
        },
        {
            "room_id": 2,
            "name": "all players",
            "queue_mode": "all_players",
            "playlist": [
                {"owner_id": 1, "beatmap_id": 100},
                {"owner_id": 2, "beatmap_id": 200}
            ]
        },
        {"room_id": 3, "name": "ended", "ended": true},
        {"room_id": 4, "name": "empty"}
    ]
}"#;

/// MessagePusher への呼び出し（呼ばれた順に記録する）
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PusherCall {
    Register(ConnectionId),
    Unregister(ConnectionId),
    PushTo(ConnectionId, String),
    Broadcast(String),
}

/// 送信されたイベントを記録する MessagePusher
#[derive(Default)]
pub struct RecordingMessagePusher {
    registered: Mutex<Vec<ConnectionId>>,
    events: Mutex<Vec<(ConnectionId, ClientEvent)>>,
    calls: Mutex<Vec<PusherCall>>,
}

fn event_name(event: &ClientEvent) -> String {
    serde_json::to_value(event).unwrap()["name"]
        .as_str()
        .unwrap()
        .to_string()
}

impl RecordingMessagePusher {
    /// 呼び出しの履歴
    pub async fn calls(&self) -> Vec<PusherCall> {
        self.calls.lock().await.clone()
    }

    /// `push_to` で個別に送られたイベントの名前
    pub async fn direct_pushes_for(&self, connection_id: &ConnectionId) -> Vec<String> {
        self.calls
            .lock()
            .await
            .iter()
            .filter_map(|call| match call {
                PusherCall::PushTo(target, name) if target == connection_id => Some(name.clone()),
                _ => None,
            })
            .collect()
    }

    /// 接続ごとに受け取ったイベント
    pub async fn events_for(&self, connection_id: &ConnectionId) -> Vec<ClientEvent> {
        self.events
            .lock()
            .await
            .iter()
            .filter(|(target, _)| target == connection_id)
            .map(|(_, event)| event.clone())
            .collect()
    }

    /// 接続ごとに受け取ったイベントの名前
    pub async fn names_for(&self, connection_id: &ConnectionId) -> Vec<String> {
        self.events_for(connection_id)
            .await
            .iter()
            .map(event_name)
            .collect()
    }

    pub async fn is_registered(&self, connection_id: &ConnectionId) -> bool {
        self.registered.lock().await.contains(connection_id)
    }

    pub async fn clear(&self) {
        self.events.lock().await.clear();
        self.calls.lock().await.clear();
    }
}

#[async_trait]
impl MessagePusher for RecordingMessagePusher {
    async fn register_connection(&self, connection_id: ConnectionId, _sender: PusherChannel) {
        self.calls
            .lock()
            .await
            .push(PusherCall::Register(connection_id.clone()));
        self.registered.lock().await.push(connection_id);
    }

    async fn unregister_connection(&self, connection_id: &ConnectionId) {
        self.calls
            .lock()
            .await
            .push(PusherCall::Unregister(connection_id.clone()));
        self.registered
            .lock()
            .await
            .retain(|registered| registered != connection_id);
    }

    async fn push_to(
        &self,
        connection_id: &ConnectionId,
        event: &ClientEvent,
    ) -> Result<(), MessagePushError> {
        self.calls
            .lock()
            .await
            .push(PusherCall::PushTo(connection_id.clone(), event_name(event)));
        self.events
            .lock()
            .await
            .push((connection_id.clone(), event.clone()));
        Ok(())
    }

    async fn broadcast(
        &self,
        targets: Vec<ConnectionId>,
        event: &ClientEvent,
    ) -> Result<(), MessagePushError> {
        self.calls
            .lock()
            .await
            .push(PusherCall::Broadcast(event_name(event)));
        let mut events = self.events.lock().await;
        for target in targets {
            events.push((target, event.clone()));
        }
        Ok(())
    }
}

pub struct TestHub {
    pub hub: Arc<MultiplayerHub>,
    pub pusher: Arc<RecordingMessagePusher>,
    pub database: Arc<InMemoryMultiplayerDatabase>,
}

pub fn seeded_database() -> InMemoryMultiplayerDatabase {
    let seed = Seed::from_json(SEED).unwrap();
    InMemoryMultiplayerDatabase::from_seed(&seed, Timestamp::new(NOW)).unwrap()
}

pub fn create_test_hub() -> TestHub {
    create_test_hub_with(HubOptions::default())
}

pub fn create_test_hub_with(options: HubOptions) -> TestHub {
    let database = Arc::new(seeded_database());
    let pusher = Arc::new(RecordingMessagePusher::default());
    let hub = create_hub_with_database(database.clone(), pusher.clone(), options);
    TestHub {
        hub,
        pusher,
        database,
    }
}

pub fn create_hub_with_database(
    database: Arc<dyn MultiplayerDatabase>,
    pusher: Arc<RecordingMessagePusher>,
    options: HubOptions,
) -> Arc<MultiplayerHub> {
    Arc::new(MultiplayerHub::new(
        database,
        pusher,
        Arc::new(FixedClock::new(NOW + 1)),
        options,
    ))
}

/// ユーザー `user_id` の接続 `conn-{user_id}`
pub fn ctx(user_id: i64) -> HubCallerContext {
    HubCallerContext::new(
        UserId::new(user_id),
        ConnectionId::new(format!("conn-{}", user_id)),
    )
}

/// 接続して送信チャンネルを登録する
pub async fn connect(hub: &MultiplayerHub, ctx: &HubCallerContext) {
    let (tx, _rx) = tokio::sync::mpsc::unbounded_channel();
    hub.on_connected(ctx, tx).await.unwrap();
}
