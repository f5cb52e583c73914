//! 会话同步服务层
//!
//! 持有本次会话期间唯一的缓存存储，负责把分页拉取结果、推送事件和变更接口的
//! 返回值合并进缓存，并在锁释放后触发监听器回调。

use crate::im::conversation::api::{ConversationApi, ConversationMutations, ConversationQuery};
use crate::im::conversation::listener::{ConversationListener, EmptyConversationListener};
use crate::im::conversation::models::ConversationSyncerConfig;
use crate::im::conversation::pagination::{MergeMode, MergeSummary, PageRequest};
use crate::im::conversation::session::SyncSession;
use crate::im::conversation::types::CreateConversationReq;
use crate::im::dedup::DedupGuard;
use crate::im::error::{SyncError, SyncResult};
use crate::im::event::{
    Change, EventRouter, PushEvent, PushEventSource, ReconcileOutcome, SubscriptionSet,
};
use crate::im::message::listener::{EmptyMessageListener, MessageListener};
use crate::im::message::models::LocalMessage;
use crate::im::store::{CacheSnapshot, RecordStore};
use crate::im::types::{BanDelta, BannedUser, LocalConversation, MembershipDelta, PresenceStatus};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, error, info, warn};

/// 会话同步器
pub struct ConversationSyncer {
    config: ConversationSyncerConfig,
    query: Arc<dyn ConversationQuery>,
    mutations: Arc<dyn ConversationMutations>,
    /// 所有写操作经由这把锁串行化
    store: Mutex<RecordStore>,
    listener: Arc<dyn ConversationListener>,
    msg_listener: Arc<dyn MessageListener>,
}

impl ConversationSyncer {
    /// 创建新的会话同步器（使用默认空监听器）
    pub fn new(
        config: ConversationSyncerConfig,
        query: Arc<dyn ConversationQuery>,
        mutations: Arc<dyn ConversationMutations>,
    ) -> Self {
        info!(
            "[ConvSync] 创建会话同步器，用户ID: {}, 每页: {}, 全量阈值: {}",
            config.user_id, config.page_size, config.full_snapshot_threshold
        );
        Self {
            config,
            query,
            mutations,
            store: Mutex::new(RecordStore::new()),
            listener: Arc::new(EmptyConversationListener),
            msg_listener: Arc::new(EmptyMessageListener),
        }
    }

    /// 使用 HTTP API 创建会话同步器（token 通过默认请求头自动添加）
    pub fn from_config(config: ConversationSyncerConfig) -> anyhow::Result<Self> {
        let http_client = ConversationApi::build_http_client(&config.token)?;
        let api = Arc::new(ConversationApi::new(
            http_client,
            config.api_base_url.clone(),
            config.user_id.clone(),
        ));
        Ok(Self::new(config, api.clone(), api))
    }

    pub fn with_listener(mut self, listener: Arc<dyn ConversationListener>) -> Self {
        self.listener = listener;
        self
    }

    pub fn with_message_listener(mut self, msg_listener: Arc<dyn MessageListener>) -> Self {
        self.msg_listener = msg_listener;
        self
    }

    pub fn config(&self) -> &ConversationSyncerConfig {
        &self.config
    }

    // ========== 读取 ==========

    /// 按排序规则返回全部会话
    pub async fn get_conversations(&self) -> Vec<LocalConversation> {
        self.store.lock().await.get_conversations()
    }

    pub async fn get_conversation(&self, conversation_id: &str) -> Option<LocalConversation> {
        self.store
            .lock()
            .await
            .get_conversation(conversation_id)
            .cloned()
    }

    /// 可发现的公开 / 开放会话
    pub async fn discoverable_conversations(&self) -> Vec<LocalConversation> {
        self.store.lock().await.discoverable_conversations()
    }

    pub async fn get_messages(&self, conversation_id: &str) -> Vec<LocalMessage> {
        self.store.lock().await.get_messages(conversation_id)
    }

    pub async fn presence_of(&self, user_id: &str) -> PresenceStatus {
        self.store.lock().await.presence_of(user_id)
    }

    pub async fn loaded_len(&self) -> usize {
        self.store.lock().await.loaded_len()
    }

    pub async fn snapshot(&self) -> CacheSnapshot {
        self.store.lock().await.snapshot()
    }

    /// 用户当前是否在该会话中处于封禁状态
    pub async fn is_user_banned(&self, conversation_id: &str, user_id: &str) -> bool {
        let now = chrono::Utc::now().timestamp_millis();
        self.store
            .lock()
            .await
            .get_conversation(conversation_id)
            .is_some_and(|conv| conv.is_user_banned(user_id, now))
    }

    // ========== 分页 ==========

    /// 全量刷新：结果整体替换本地会话列表
    pub async fn refresh_conversations(&self) -> SyncResult<MergeSummary> {
        let limit = self.config.full_snapshot_threshold.saturating_add(1);
        self.fetch_and_merge(PageRequest::full_snapshot(limit)).await
    }

    pub async fn load_conversations(&self, offset: usize, limit: usize) -> SyncResult<MergeSummary> {
        self.fetch_and_merge(PageRequest::new(offset, limit)).await
    }

    /// 从已加载数量处继续拉取下一页
    pub async fn load_more_conversations(&self) -> SyncResult<MergeSummary> {
        let offset = self.store.lock().await.loaded_len();
        debug!("[ConvSync] 加载更多会话，偏移: {}", offset);
        self.fetch_and_merge(PageRequest::new(offset, self.config.page_size))
            .await
    }

    /// 合并调用方自行获取的一批会话
    pub async fn merge_conversations(
        &self,
        page: Vec<LocalConversation>,
        request: PageRequest,
    ) -> MergeSummary {
        let summary = {
            let mut store = self.store.lock().await;
            store.merge_conversation_page(page, request, self.config.full_snapshot_threshold)
        };
        self.notify_merge(&summary).await;
        summary
    }

    async fn fetch_and_merge(&self, request: PageRequest) -> SyncResult<MergeSummary> {
        let full_refresh =
            request.mode(self.config.full_snapshot_threshold) == MergeMode::FullSnapshot;
        self.listener.on_sync_server_start(full_refresh).await;

        let page = match self
            .query
            .fetch_conversations_page(request.offset.unwrap_or(0), request.limit)
            .await
        {
            Ok(page) => page,
            Err(e) => {
                self.listener.on_sync_server_failed(full_refresh).await;
                return Err(transport_error("拉取会话分页", e));
            }
        };
        info!("[ConvSync] 从服务器获取到 {} 个会话", page.len());

        let summary = self.merge_conversations(page, request).await;
        self.listener.on_sync_server_finish(full_refresh).await;
        Ok(summary)
    }

    /// 拉取一页消息并按 ID 合并进会话消息列表，返回新写入的消息
    pub async fn load_messages(
        &self,
        conversation_id: &str,
        offset: usize,
        limit: usize,
    ) -> SyncResult<Vec<LocalMessage>> {
        let page = self
            .query
            .fetch_messages_page(conversation_id, offset, limit)
            .await
            .map_err(|e| transport_error("拉取消息分页", e))?;

        let (fresh, changed) = {
            let mut store = self.store.lock().await;
            if !store.contains_conversation(conversation_id) {
                warn!(
                    "[ConvSync] 会话 {} 不在本地，丢弃 {} 条分页消息",
                    conversation_id,
                    page.len()
                );
                return Ok(Vec::new());
            }

            let page: Vec<LocalMessage> = page
                .into_iter()
                .filter(|m| {
                    let matches = m.conversation_id == conversation_id;
                    if !matches {
                        warn!(
                            "[ConvSync] 消息 {} 属于会话 {}，不在本次分页范围内，忽略",
                            m.message_id, m.conversation_id
                        );
                    }
                    matches
                })
                .collect();
            let fresh = DedupGuard::new(&store).filter_new_messages(page);
            for message in &fresh {
                store.upsert_message(message.clone());
            }

            let newest = fresh.iter().max_by(|a, b| a.timeline_cmp(b));
            let changed = match newest {
                Some(newest) => match store.update_conversation(conversation_id, |conv| {
                    conv.advance_latest_message(newest)
                }) {
                    Some(true) => store.get_conversation(conversation_id).cloned(),
                    _ => None,
                },
                None => None,
            };
            (fresh, changed)
        };

        debug!(
            "[ConvSync] 会话 {} 新写入 {} 条消息",
            conversation_id,
            fresh.len()
        );
        self.msg_listener
            .on_messages_loaded(conversation_id.to_string(), fresh.len())
            .await;
        if let Some(conv) = changed {
            self.listener
                .on_conversation_changed(conversation_list_json(&[conv]))
                .await;
        }
        Ok(fresh)
    }

    // ========== 推送事件 ==========

    /// 应用一个推送事件（或变更接口的返回值）
    pub async fn apply_event(&self, event: PushEvent) -> ReconcileOutcome {
        let outcome = {
            let mut store = self.store.lock().await;
            EventRouter::dispatch(&mut store, event)
        };
        if let ReconcileOutcome::Applied(change) = &outcome {
            self.notify(change).await;
        }
        outcome
    }

    /// 应用一个 JSON 格式的原始推送事件
    pub async fn apply_raw_event(&self, payload: &str) -> ReconcileOutcome {
        let outcome = {
            let mut store = self.store.lock().await;
            EventRouter::dispatch_json(&mut store, payload)
        };
        if let ReconcileOutcome::Applied(change) = &outcome {
            self.notify(change).await;
        }
        outcome
    }

    /// 订阅推送事件源的所有事件类型，返回持有订阅的会话句柄
    ///
    /// 必须在 tokio 运行时内调用；句柄被丢弃或关闭时退订全部事件
    pub fn attach(self: &Arc<Self>, source: Arc<dyn PushEventSource>) -> SyncSession {
        let (tx, mut rx) = mpsc::unbounded_channel::<PushEvent>();
        let subscriptions = SubscriptionSet::subscribe_all(source, tx);
        info!(
            "[ConvSync] 挂载推送事件源，订阅 {} 种事件",
            subscriptions.len()
        );

        let syncer = Arc::clone(self);
        let task = tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                syncer.apply_event(event).await;
            }
            debug!("[ConvSync] 推送事件通道已关闭，退出事件循环");
        });

        SyncSession::new(subscriptions, task)
    }

    // ========== 变更接口 ==========

    pub async fn create_conversation(
        &self,
        req: CreateConversationReq,
    ) -> SyncResult<LocalConversation> {
        let conversation = self
            .mutations
            .create_conversation(&req)
            .await
            .map_err(|e| transport_error("创建会话", e))?;
        self.apply_event(PushEvent::ConversationAdded {
            conversation: conversation.clone(),
        })
        .await;
        Ok(conversation)
    }

    pub async fn join_conversation(&self, conversation_id: &str) -> SyncResult<LocalConversation> {
        let conversation = self
            .mutations
            .join_conversation(conversation_id)
            .await
            .map_err(|e| transport_error("加入会话", e))?;
        self.apply_event(PushEvent::ConversationAdded {
            conversation: conversation.clone(),
        })
        .await;
        Ok(conversation)
    }

    /// 发送消息；服务端回执与随后的推送回显只会写入一次
    pub async fn send_message(
        &self,
        conversation_id: &str,
        content: &str,
    ) -> SyncResult<LocalMessage> {
        let message = self
            .mutations
            .create_message(conversation_id, content)
            .await
            .map_err(|e| transport_error("发送消息", e))?;
        self.apply_event(PushEvent::MessageCreated {
            message: message.clone(),
        })
        .await;
        Ok(message)
    }

    /// 置顶 / 取消置顶：先写本地，请求失败时恢复原值
    pub async fn set_pinned(&self, conversation_id: &str, is_pinned: bool) -> SyncResult<()> {
        let (previous, outcome) = {
            let mut store = self.store.lock().await;
            let previous = store
                .get_conversation(conversation_id)
                .map(|conv| conv.is_pinned);
            let outcome = EventRouter::dispatch(
                &mut store,
                PushEvent::PinChanged {
                    conversation_id: conversation_id.to_string(),
                    is_pinned,
                },
            );
            (previous, outcome)
        };
        if let ReconcileOutcome::Applied(change) = &outcome {
            self.notify(change).await;
        }

        if let Err(e) = self.mutations.set_pinned(conversation_id, is_pinned).await {
            if let Some(previous) = previous {
                warn!(
                    "[ConvSync] 置顶请求失败，恢复会话 {} 的置顶状态为 {}",
                    conversation_id, previous
                );
                self.apply_event(PushEvent::PinChanged {
                    conversation_id: conversation_id.to_string(),
                    is_pinned: previous,
                })
                .await;
            }
            return Err(transport_error("设置置顶", e));
        }
        Ok(())
    }

    pub async fn ban_user(&self, conversation_id: &str, ban: BannedUser) -> SyncResult<()> {
        self.mutations
            .ban_user(conversation_id, &ban)
            .await
            .map_err(|e| transport_error("封禁用户", e))?;
        self.apply_event(PushEvent::BanChanged {
            conversation_id: conversation_id.to_string(),
            delta: BanDelta::Banned { ban },
        })
        .await;
        Ok(())
    }

    pub async fn unban_user(&self, conversation_id: &str, user_id: &str) -> SyncResult<()> {
        self.mutations
            .unban_user(conversation_id, user_id)
            .await
            .map_err(|e| transport_error("解除封禁", e))?;
        self.apply_event(PushEvent::BanChanged {
            conversation_id: conversation_id.to_string(),
            delta: BanDelta::Unbanned {
                user_id: user_id.to_string(),
            },
        })
        .await;
        Ok(())
    }

    pub async fn add_member(&self, conversation_id: &str, user_id: &str) -> SyncResult<()> {
        self.mutations
            .add_member(conversation_id, user_id)
            .await
            .map_err(|e| transport_error("添加成员", e))?;
        self.apply_event(PushEvent::MembershipChanged {
            conversation_id: conversation_id.to_string(),
            delta: MembershipDelta {
                added: vec![user_id.to_string()],
                removed: Vec::new(),
            },
        })
        .await;
        Ok(())
    }

    pub async fn remove_member(&self, conversation_id: &str, user_id: &str) -> SyncResult<()> {
        self.mutations
            .remove_member(conversation_id, user_id)
            .await
            .map_err(|e| transport_error("移除成员", e))?;
        self.apply_event(PushEvent::MembershipChanged {
            conversation_id: conversation_id.to_string(),
            delta: MembershipDelta {
                added: Vec::new(),
                removed: vec![user_id.to_string()],
            },
        })
        .await;
        Ok(())
    }

    /// 清理所有会话中已过期的封禁
    pub async fn prune_expired_bans(&self) -> usize {
        let now = chrono::Utc::now().timestamp_millis();
        let pruned = self.store.lock().await.prune_expired_bans(now);
        if pruned > 0 {
            info!("[ConvSync] 清理过期封禁 {} 条", pruned);
        }
        pruned
    }

    // ========== 回调 ==========

    async fn notify(&self, change: &Change) {
        match change {
            Change::ConversationAdded(conv) => {
                self.listener
                    .on_new_conversation(conversation_list_json(std::slice::from_ref(conv)))
                    .await;
            }
            Change::DiscoverableAdded(conv) => {
                self.listener
                    .on_discoverable_conversation_added(conversation_list_json(
                        std::slice::from_ref(conv),
                    ))
                    .await;
            }
            Change::ConversationChanged(conv) => {
                self.listener
                    .on_conversation_changed(conversation_list_json(std::slice::from_ref(conv)))
                    .await;
            }
            Change::ConversationDeleted(conversation_id) => {
                self.listener
                    .on_conversation_deleted(conversation_id.clone())
                    .await;
            }
            Change::MessageAppended {
                message,
                conversation,
            } => {
                let json = serde_json::to_string(message).unwrap_or_else(|_| "{}".to_string());
                self.msg_listener.on_recv_new_message(json).await;
                self.listener
                    .on_conversation_changed(conversation_list_json(std::slice::from_ref(
                        conversation,
                    )))
                    .await;
            }
            Change::PresenceChanged { user_id, status } => {
                self.listener
                    .on_user_status_changed(user_id.clone(), *status)
                    .await;
            }
        }
    }

    async fn notify_merge(&self, summary: &MergeSummary) {
        if !summary.inserted.is_empty() {
            info!(
                "[ConvSync] 📢 触发新会话回调，数量: {}",
                summary.inserted.len()
            );
            self.listener
                .on_new_conversation(conversation_list_json(&summary.inserted))
                .await;
        }
        if !summary.updated.is_empty() {
            info!(
                "[ConvSync] 📢 触发会话变更回调，数量: {}",
                summary.updated.len()
            );
            self.listener
                .on_conversation_changed(conversation_list_json(&summary.updated))
                .await;
        }
        for conversation_id in &summary.removed {
            self.listener
                .on_conversation_deleted(conversation_id.clone())
                .await;
        }
    }
}

fn conversation_list_json(conversations: &[LocalConversation]) -> String {
    serde_json::to_string(conversations).unwrap_or_else(|_| "[]".to_string())
}

fn transport_error(operation: &'static str, e: anyhow::Error) -> SyncError {
    error!("[ConvSync] {}失败: {:?}", operation, e);
    SyncError::transport(operation, e)
}
