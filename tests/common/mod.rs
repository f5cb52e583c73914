#![allow(dead_code)]

use anyhow::Result;
use async_trait::async_trait;
use chat_sync_core_rust::im::conversation::types::CreateConversationReq;
use chat_sync_core_rust::{
    BannedUser, ConversationKind, ConversationListener, ConversationMutations, ConversationQuery,
    ConversationSyncer, ConversationSyncerConfig, LocalConversation, LocalMessage, PresenceStatus,
};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Once};

static INIT_LOGGER: Once = Once::new();

pub fn init_test_logger() {
    INIT_LOGGER.call_once(|| {
        use tracing_subscriber::prelude::*;
        use tracing_subscriber::EnvFilter;

        let filter_layer = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("info,chat_sync_core_rust=debug"));

        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_file(true)
            .with_line_number(true)
            .with_target(false)
            .with_test_writer();

        tracing_subscriber::registry()
            .with(filter_layer)
            .with(fmt_layer)
            .init();
    });
}

/// 内存中的服务端：会话按数组顺序分页，可切换为离线
#[derive(Default)]
pub struct FakeServer {
    pub conversations: Mutex<Vec<LocalConversation>>,
    pub messages: Mutex<Vec<LocalMessage>>,
    pub offline: AtomicBool,
    pub calls: AtomicUsize,
}

impl FakeServer {
    pub fn with_conversations(conversations: Vec<LocalConversation>) -> Arc<Self> {
        let server = Self::default();
        *server.conversations.lock().unwrap() = conversations;
        Arc::new(server)
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    fn call(&self) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.offline.load(Ordering::SeqCst) {
            anyhow::bail!("network unreachable");
        }
        Ok(())
    }
}

#[async_trait]
impl ConversationQuery for FakeServer {
    async fn fetch_conversations_page(
        &self,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<LocalConversation>> {
        self.call()?;
        let all = self.conversations.lock().unwrap().clone();
        Ok(all.into_iter().skip(offset).take(limit).collect())
    }

    async fn fetch_messages_page(
        &self,
        conversation_id: &str,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<LocalMessage>> {
        self.call()?;
        let all = self.messages.lock().unwrap().clone();
        Ok(all
            .into_iter()
            .filter(|m| m.conversation_id == conversation_id)
            .skip(offset)
            .take(limit)
            .collect())
    }
}

#[async_trait]
impl ConversationMutations for FakeServer {
    async fn create_conversation(&self, req: &CreateConversationReq) -> Result<LocalConversation> {
        self.call()?;
        let id = format!("conv-{}", req.display_name);
        Ok(LocalConversation::new(id, req.display_name.clone(), req.kind)
            .with_members(req.member_ids.clone()))
    }

    async fn join_conversation(&self, conversation_id: &str) -> Result<LocalConversation> {
        self.call()?;
        Ok(
            LocalConversation::new(conversation_id, conversation_id, ConversationKind::Open)
                .with_members(["me"]),
        )
    }

    async fn create_message(&self, conversation_id: &str, content: &str) -> Result<LocalMessage> {
        self.call()?;
        let n = self.calls.load(Ordering::SeqCst);
        Ok(LocalMessage::new(
            format!("msg-{n}"),
            conversation_id,
            "me",
            content,
            1_000 + n as i64,
        ))
    }

    async fn set_pinned(&self, _conversation_id: &str, _is_pinned: bool) -> Result<()> {
        self.call()
    }

    async fn ban_user(&self, _conversation_id: &str, _ban: &BannedUser) -> Result<()> {
        self.call()
    }

    async fn unban_user(&self, _conversation_id: &str, _user_id: &str) -> Result<()> {
        self.call()
    }

    async fn add_member(&self, _conversation_id: &str, _user_id: &str) -> Result<()> {
        self.call()
    }

    async fn remove_member(&self, _conversation_id: &str, _user_id: &str) -> Result<()> {
        self.call()
    }
}

/// 记录回调次数的监听器
#[derive(Default)]
pub struct RecordingListener {
    pub new_conversations: Mutex<Vec<String>>,
    pub discoverable_added: Mutex<Vec<String>>,
    pub changed: AtomicUsize,
    pub deleted: Mutex<Vec<String>>,
    pub sync_failed: AtomicUsize,
    pub sync_finished: AtomicUsize,
}

#[async_trait]
impl ConversationListener for RecordingListener {
    async fn on_sync_server_start(&self, _full_refresh: bool) {}

    async fn on_sync_server_finish(&self, _full_refresh: bool) {
        self.sync_finished.fetch_add(1, Ordering::SeqCst);
    }

    async fn on_sync_server_failed(&self, _full_refresh: bool) {
        self.sync_failed.fetch_add(1, Ordering::SeqCst);
    }

    async fn on_new_conversation(&self, conversation_list: String) {
        self.new_conversations.lock().unwrap().push(conversation_list);
    }

    async fn on_discoverable_conversation_added(&self, conversation_list: String) {
        self.discoverable_added
            .lock()
            .unwrap()
            .push(conversation_list);
    }

    async fn on_conversation_changed(&self, _conversation_list: String) {
        self.changed.fetch_add(1, Ordering::SeqCst);
    }

    async fn on_conversation_deleted(&self, conversation_id: String) {
        self.deleted.lock().unwrap().push(conversation_id);
    }

    async fn on_user_status_changed(&self, _user_id: String, _status: PresenceStatus) {}
}

pub fn syncer(server: &Arc<FakeServer>) -> ConversationSyncer {
    init_test_logger();
    let config = ConversationSyncerConfig::new("me", "test-token").with_page_size(2);
    ConversationSyncer::new(config, server.clone(), server.clone())
}

pub fn conv(id: &str) -> LocalConversation {
    LocalConversation::new(id, id, ConversationKind::Private)
}

pub fn ids(conversations: &[LocalConversation]) -> Vec<String> {
    conversations
        .iter()
        .map(|c| c.conversation_id.clone())
        .collect()
}
