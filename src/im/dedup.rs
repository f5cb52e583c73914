//! 幂等检查：插入前按 ID 判断记录是否已存在
//!
//! 同一条消息可能先通过本地发送回执写入，再通过推送回显到达；
//! 已存在的记录直接跳过（不是错误）。

use crate::im::message::models::LocalMessage;
use crate::im::store::RecordStore;
use std::collections::HashSet;
use tracing::debug;

pub struct DedupGuard<'a> {
    store: &'a RecordStore,
}

impl<'a> DedupGuard<'a> {
    pub fn new(store: &'a RecordStore) -> Self {
        Self { store }
    }

    /// 会话是否允许插入（本地尚不存在）
    pub fn admits_conversation(&self, conversation_id: &str) -> bool {
        let fresh = !self.store.contains_conversation(conversation_id);
        if !fresh {
            debug!("[Dedup] 会话 {} 已存在，跳过插入", conversation_id);
        }
        fresh
    }

    /// 会话是否允许插入可发现投影
    pub fn admits_discoverable(&self, conversation_id: &str) -> bool {
        !self.store.contains_discoverable(conversation_id)
    }

    /// 消息是否允许插入其会话的消息列表
    pub fn admits_message(&self, message: &LocalMessage) -> bool {
        let fresh = !self
            .store
            .contains_message(&message.conversation_id, &message.message_id);
        if !fresh {
            debug!(
                "[Dedup] 消息 {} 已存在于会话 {}，跳过插入",
                message.message_id, message.conversation_id
            );
        }
        fresh
    }

    /// 过滤一批消息：去掉本地已有的和批内重复的
    pub fn filter_new_messages(&self, messages: Vec<LocalMessage>) -> Vec<LocalMessage> {
        let mut seen: HashSet<(String, String)> = HashSet::new();
        messages
            .into_iter()
            .filter(|m| {
                self.admits_message(m)
                    && seen.insert((m.conversation_id.clone(), m.message_id.clone()))
            })
            .collect()
    }
}
