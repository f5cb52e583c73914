//! 会话缓存存储
//!
//! 持有会话与消息的规范记录（按 ID 索引）。所有写操作都是同步且完整的：
//! 要么全部生效，要么保持原状；写入完成前会按会话排序规则重新排序，
//! 因此读者永远看不到未排序的中间状态。

use crate::im::conversation::pagination::{merge_page, MergeSummary, PageRequest};
use crate::im::conversation::sort::compare_conversations;
use crate::im::message::models::LocalMessage;
use crate::im::types::{LocalConversation, PresenceStatus};
use serde::Serialize;
use std::collections::HashMap;
use tracing::{debug, warn};

/// 一组按会话排序规则维护的会话记录
///
/// `slots` 是分页使用的工作数组（按插入顺序），与 `records` 的键集合始终一致；
/// `ordered` 是排序后的展示顺序。
#[derive(Debug, Clone, Default)]
pub struct ConversationCollection {
    pub(crate) records: HashMap<String, LocalConversation>,
    pub(crate) slots: Vec<String>,
    ordered: Vec<String>,
}

impl ConversationCollection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.records.contains_key(id)
    }

    pub fn get(&self, id: &str) -> Option<&LocalConversation> {
        self.records.get(id)
    }

    /// 工作数组长度，即下一次"加载更多"的偏移量
    pub fn loaded_len(&self) -> usize {
        self.slots.len()
    }

    /// 按展示顺序返回会话
    pub fn ordered(&self) -> Vec<LocalConversation> {
        self.ordered
            .iter()
            .filter_map(|id| self.records.get(id).cloned())
            .collect()
    }

    /// 按展示顺序返回会话 ID
    pub fn ordered_ids(&self) -> &[String] {
        &self.ordered
    }

    /// 插入或覆盖一条会话记录，返回是否为新插入
    pub fn upsert(&mut self, conv: LocalConversation) -> bool {
        let id = conv.conversation_id.clone();
        let is_new = self.records.insert(id.clone(), conv).is_none();
        if is_new {
            self.slots.push(id);
        }
        self.resort();
        is_new
    }

    /// 在副本上修改会话，只有 `f` 返回 true 时才提交
    ///
    /// 返回 None 表示会话不存在；Some(changed) 表示是否发生了变化
    pub fn update<F>(&mut self, id: &str, f: F) -> Option<bool>
    where
        F: FnOnce(&mut LocalConversation) -> bool,
    {
        let mut draft = self.records.get(id)?.clone();
        if !f(&mut draft) {
            return Some(false);
        }
        self.records.insert(id.to_string(), draft);
        self.resort();
        Some(true)
    }

    pub fn remove(&mut self, id: &str) -> Option<LocalConversation> {
        let removed = self.records.remove(id)?;
        self.slots.retain(|slot| slot != id);
        self.ordered.retain(|ordered_id| ordered_id != id);
        Some(removed)
    }

    /// 用新的记录集合和工作数组整体替换（供分页合并一次性提交）
    pub(crate) fn commit(
        &mut self,
        records: HashMap<String, LocalConversation>,
        slots: Vec<String>,
    ) {
        self.records = records;
        self.slots = slots;
        self.resort();
    }

    /// 按会话排序规则重建展示顺序
    pub(crate) fn resort(&mut self) {
        let records = &self.records;
        let mut ordered: Vec<String> = records.keys().cloned().collect();
        ordered.sort_by(|a, b| compare_conversations(&records[a], &records[b]));
        self.ordered = ordered;
    }
}

/// 供 UI 读取的缓存快照
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheSnapshot {
    pub conversations: Vec<LocalConversation>,
    pub discoverable: Vec<LocalConversation>,
    pub presence: HashMap<String, PresenceStatus>,
}

/// 会话缓存存储（每个会话期间显式创建一次，不作为全局状态）
#[derive(Debug, Default)]
pub struct RecordStore {
    conversations: ConversationCollection,
    /// 可发现会话投影（公开 / 开放会话）
    discoverable: ConversationCollection,
    /// 会话 ID -> 按时间排序的消息列表
    messages: HashMap<String, Vec<LocalMessage>>,
    /// 用户 ID -> 在线状态
    presence: HashMap<String, PresenceStatus>,
}

impl RecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    // ========== 会话 ==========

    /// 按排序规则返回全部会话
    pub fn get_conversations(&self) -> Vec<LocalConversation> {
        self.conversations.ordered()
    }

    pub fn get_conversation(&self, id: &str) -> Option<&LocalConversation> {
        self.conversations.get(id)
    }

    pub fn contains_conversation(&self, id: &str) -> bool {
        self.conversations.contains(id)
    }

    pub fn conversation_count(&self) -> usize {
        self.conversations.len()
    }

    /// 分页工作数组长度
    pub fn loaded_len(&self) -> usize {
        self.conversations.loaded_len()
    }

    pub fn conversations(&self) -> &ConversationCollection {
        &self.conversations
    }

    /// 插入或覆盖会话（最后写入者胜出），返回是否为新插入
    ///
    /// 若该会话已在可发现投影中，同步更新投影里的记录
    pub fn upsert_conversation(&mut self, conv: LocalConversation) -> bool {
        if self.discoverable.contains(&conv.conversation_id) {
            self.discoverable.upsert(conv.clone());
        }
        let is_new = self.conversations.upsert(conv);
        debug!(
            "[Store] upsert 会话完成，当前会话数: {}",
            self.conversations.len()
        );
        is_new
    }

    /// 修改会话字段；投影中存在同 ID 记录时一并修改
    ///
    /// 返回 None 表示会话不存在；Some(changed) 表示是否发生了变化
    pub fn update_conversation<F>(&mut self, id: &str, f: F) -> Option<bool>
    where
        F: Fn(&mut LocalConversation) -> bool,
    {
        let changed = self.conversations.update(id, &f)?;
        if changed && self.discoverable.contains(id) {
            self.discoverable.update(id, &f);
        }
        Some(changed)
    }

    /// 合并一页会话拉取结果；全量快照删除的会话同时丢弃其消息列表
    ///
    /// 新增或更新的记录若已在可发现投影中，投影里的记录一并刷新
    pub fn merge_conversation_page(
        &mut self,
        page: Vec<LocalConversation>,
        request: PageRequest,
        full_snapshot_threshold: usize,
    ) -> MergeSummary {
        let summary = merge_page(
            &mut self.conversations,
            page,
            request,
            full_snapshot_threshold,
        );
        for id in &summary.removed {
            self.messages.remove(id);
        }
        for conv in summary.inserted.iter().chain(&summary.updated) {
            if self.discoverable.contains(&conv.conversation_id) {
                debug!("[Store] 同步刷新可发现投影中的会话: {}", conv.conversation_id);
                self.discoverable.upsert(conv.clone());
            }
        }
        summary
    }

    /// 删除会话及其消息列表和投影记录；删除不存在的 ID 为无操作
    pub fn remove_conversation(&mut self, id: &str) -> Option<LocalConversation> {
        let removed_projection = self.discoverable.remove(id);
        self.messages.remove(id);
        let removed = self.conversations.remove(id);
        if removed.is_none() && removed_projection.is_none() {
            debug!("[Store] 删除会话 {} 时本地不存在，忽略", id);
        }
        removed.or(removed_projection)
    }

    /// 清理所有会话中已过期的封禁，返回清理条数
    pub fn prune_expired_bans(&mut self, now_ms: i64) -> usize {
        let expired: Vec<(String, usize)> = self
            .conversations
            .records
            .values()
            .map(|conv| {
                let n = conv
                    .banned_users
                    .iter()
                    .filter(|b| !b.is_active(now_ms))
                    .count();
                (conv.conversation_id.clone(), n)
            })
            .filter(|(_, n)| *n > 0)
            .collect();

        for (id, _) in &expired {
            self.update_conversation(id, |conv| conv.prune_expired_bans(now_ms) > 0);
        }
        expired.iter().map(|(_, n)| n).sum()
    }

    // ========== 可发现会话投影 ==========

    pub fn discoverable_conversations(&self) -> Vec<LocalConversation> {
        self.discoverable.ordered()
    }

    pub fn contains_discoverable(&self, id: &str) -> bool {
        self.discoverable.contains(id)
    }

    pub fn upsert_discoverable(&mut self, conv: LocalConversation) -> bool {
        self.discoverable.upsert(conv)
    }

    // ========== 消息 ==========

    /// 按时间顺序返回某会话的消息
    pub fn get_messages(&self, conversation_id: &str) -> Vec<LocalMessage> {
        self.messages
            .get(conversation_id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn contains_message(&self, conversation_id: &str, message_id: &str) -> bool {
        self.messages
            .get(conversation_id)
            .is_some_and(|list| list.iter().any(|m| m.message_id == message_id))
    }

    /// 插入或覆盖一条消息；所属会话不在本地时拒绝写入并返回 false
    pub fn upsert_message(&mut self, message: LocalMessage) -> bool {
        if !self.conversations.contains(&message.conversation_id) {
            warn!(
                "[Store] 消息 {} 所属会话 {} 不在本地，拒绝写入",
                message.message_id, message.conversation_id
            );
            return false;
        }
        let list = self
            .messages
            .entry(message.conversation_id.clone())
            .or_default();
        list.retain(|m| m.message_id != message.message_id);
        let pos = list.partition_point(|m| m.timeline_cmp(&message).is_lt());
        list.insert(pos, message);
        true
    }

    // ========== 在线状态 ==========

    pub fn presence_of(&self, user_id: &str) -> PresenceStatus {
        self.presence.get(user_id).copied().unwrap_or_default()
    }

    /// 更新在线状态，返回是否发生了变化
    pub fn set_presence(&mut self, user_id: &str, status: PresenceStatus) -> bool {
        self.presence.insert(user_id.to_string(), status) != Some(status)
    }

    // ========== 快照 ==========

    pub fn snapshot(&self) -> CacheSnapshot {
        CacheSnapshot {
            conversations: self.get_conversations(),
            discoverable: self.discoverable_conversations(),
            presence: self.presence.clone(),
        }
    }
}
